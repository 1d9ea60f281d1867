use anyhow::Result;

use mzdasm::mz::MzFile;

pub fn dump_header(file: &MzFile) -> Result<()> {
    let h = file.header();
    println!("signature      : {:#06X}", h.signature);
    println!("last_page_size : {}", h.last_page_size);
    println!("page_count     : {}", h.page_count);
    println!("reloc_count    : {}", h.reloc_count);
    println!("header_size    : {} paragraphs", h.header_size);
    println!("min_alloc      : {} paragraphs", h.min_alloc);
    println!("max_alloc      : {} paragraphs", h.max_alloc);
    println!("ss:sp          : {:04X}:{:04X}", h.reg_ss, h.reg_sp);
    println!("checksum       : {:#06X}", h.checksum);
    println!("cs:ip          : {}", file.entry());
    println!("reloc_off      : {:#06X}", h.reloc_off);
    println!("overlay        : {}", h.overlay);
    println!("image size     : {} bytes", file.image_size());

    for (i, offset) in file.relocations().enumerate() {
        println!("reloc {i:4}: {offset:05X}");
    }
    Ok(())
}
