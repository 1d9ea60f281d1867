use anyhow::Result;

use mzdasm::analyzer::Analyzer;
use mzdasm::mz::MzFile;

pub fn dump_xrefs(file: &MzFile) -> Result<()> {
    let mut analyzer = Analyzer::new(file.image());
    analyzer.analyze(file.entry());

    for diag in analyzer.diagnostics() {
        eprintln!("{diag}");
    }
    for xref in analyzer.xrefs() {
        println!(
            "{} <- {}  {}",
            xref.target,
            xref.source,
            xref.kind.name()
        );
    }
    Ok(())
}
