mod disasm;
use disasm::disasm;
mod dump_header;
use dump_header::dump_header;
mod dump_xrefs;
use dump_xrefs::dump_xrefs;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mzdasm::mz::MzFile;

/// Disassemble DOS MZ executables and dump their structure
#[derive(Clone, Debug, Parser)]
struct Args {
    /// input executable to analyze
    #[arg(default_value = "data/H.EXE")]
    input: PathBuf,
    /// operation to execute; the default prints the disassembly
    /// listing
    #[command(subcommand)]
    operation: Option<Operation>,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Analyze from the program entry and print the listing
    Disasm,
    /// Dump the MZ header fields and relocation entries
    DumpHeader,
    /// Dump every cross reference found by the analysis
    DumpXrefs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let file = MzFile::open(&args.input)
        .context("The file format is not supported")?;
    match args.operation.unwrap_or(Operation::Disasm) {
        Operation::Disasm => disasm(&file),
        Operation::DumpHeader => dump_header(&file),
        Operation::DumpXrefs => dump_xrefs(&file),
    }
}
