use anyhow::Result;

use mzdasm::analyzer::Analyzer;
use mzdasm::attr::ByteType;
use mzdasm::decode::decode;
use mzdasm::format::{format_insn, FormatFlags};
use mzdasm::insn::CpuMode;
use mzdasm::mz::MzFile;

/// Analyze the executable from its entry point, then emit a linear
/// listing driven by the byte-attribute map: instructions at code
/// boundaries, `dw` items for jump-table words, incoming xrefs as
/// comment lines. Diagnostics and statistics go to stderr.
pub fn disasm(file: &MzFile) -> Result<()> {
    let image = file.image();
    let mut analyzer = Analyzer::new(image);
    analyzer.analyze(file.entry());

    for diag in analyzer.diagnostics() {
        eprintln!("{diag}");
    }

    let mut off = 0usize;
    while off < image.len() {
        let attr = analyzer.byte_attr(off as u32);
        if !attr.is_boundary() {
            off += 1;
            continue;
        }
        for xref in analyzer.xrefs_to(off as u32) {
            println!(
                "{}  ; -- {} FROM {} --",
                addr(off),
                xref.kind.name(),
                xref.source
            );
        }
        match attr.byte_type() {
            ByteType::Code => {
                match decode(&image[off..], CpuMode::Bits16) {
                    Ok((insn, count)) => {
                        let text =
                            format_insn(&insn, FormatFlags::default());
                        print_line(image, off, count, &text);
                        off += count;
                    }
                    Err(_) => {
                        // A committed instruction re-decodes; if the
                        // map and image disagree, keep the listing
                        // moving byte by byte.
                        print_line(image, off, 1, "(bad)");
                        off += 1;
                    }
                }
            }
            ByteType::Data => {
                if off + 1 < image.len() {
                    let word = u16::from_le_bytes([
                        image[off],
                        image[off + 1],
                    ]);
                    print_line(image, off, 2, &format!("dw {word:04x}h"));
                    off += 2;
                } else {
                    print_line(
                        image,
                        off,
                        1,
                        &format!("db {:02x}h", image[off]),
                    );
                    off += 1;
                }
            }
            ByteType::Unknown | ByteType::Pending => off += 1,
        }
    }

    let stats = analyzer.stats();
    eprintln!("Image size: {} bytes", stats.image_size);
    eprintln!("Code size : {} bytes", stats.code_bytes);
    eprintln!("Data size : {} bytes", stats.data_bytes);
    eprintln!("# Instructions: {}", stats.instructions);
    eprintln!("Jump tables: {}", stats.jump_tables);
    Ok(())
}

fn addr(off: usize) -> String {
    format!("0000:{off:04X}")
}

/// One listing line: address, up to 8 raw bytes, text.
fn print_line(image: &[u8], off: usize, count: usize, text: &str) {
    let mut line = format!("{}  ", addr(off));
    for i in 0..8 {
        if i < count && off + i < image.len() {
            line.push_str(&format!("{:02x} ", image[off + i]));
        } else {
            line.push_str("   ");
        }
    }
    println!("{line} {text}");
}
