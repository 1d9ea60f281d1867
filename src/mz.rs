//! Loading of DOS MZ executables (.EXE).

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::FarPtr;

/// File header of a DOS MZ executable: fourteen little-endian words.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct MzHeader {
    /// File format signature, `MZ` (0x5A4D) or the swapped `ZM`.
    pub signature: u16,
    /// Size of the last 512-byte page in bytes; 0 means a full page.
    pub last_page_size: u16,
    /// Number of 512-byte pages, including the last one.
    pub page_count: u16,
    /// Number of relocation entries; may be 0.
    pub reloc_count: u16,
    /// Header size in 16-byte paragraphs; the executable image starts
    /// here.
    pub header_size: u16,
    /// Minimum memory required beyond the image, in paragraphs.
    pub min_alloc: u16,
    /// Maximum memory requested, in paragraphs; usually 0xFFFF.
    pub max_alloc: u16,
    /// Initial SS, relative to the image; relocated by the loader.
    pub reg_ss: u16,
    /// Initial SP.
    pub reg_sp: u16,
    /// File checksum; usually unused.
    pub checksum: u16,
    /// Initial IP.
    pub reg_ip: u16,
    /// Initial CS, relative to the image; relocated by the loader.
    pub reg_cs: u16,
    /// File offset of the relocation table.
    pub reloc_off: u16,
    /// Overlay number; 0 for the main module.
    pub overlay: u16,
}

const HEADER_LEN: usize = 28;

/// A loaded MZ executable: the raw file plus the validated header and
/// the bounds of the executable image inside it.
pub struct MzFile {
    header: MzHeader,
    data: Vec<u8>,
    start: usize,
    size: usize,
}

impl MzFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("Unable to read {}", path.display()))?;
        Self::parse(data)
    }

    pub fn parse(data: Vec<u8>) -> Result<Self> {
        ensure!(
            data.len() >= HEADER_LEN,
            "File too short for an MZ header: {} bytes",
            data.len()
        );
        let header: MzHeader = bincode::deserialize_from(&data[..])?;

        ensure!(
            header.signature == 0x5A4D || header.signature == 0x4D5A,
            "Invalid MZ signature {:#06X}",
            header.signature
        );

        ensure!(header.page_count > 0, "MZ header declares zero pages");
        let size = header.page_count as usize * 512
            - if header.last_page_size != 0 {
                512 - header.last_page_size as usize
            } else {
                0
            };
        ensure!(
            size <= data.len(),
            "MZ header declares {size} bytes but the file has {}",
            data.len()
        );

        let start = header.header_size as usize * 16;
        ensure!(
            start <= size,
            "MZ header size {start} exceeds the used file size {size}"
        );

        // The relocation table must fit inside the header area.
        ensure!(
            header.reloc_off as usize + header.reloc_count as usize * 4
                <= start,
            "MZ relocation table runs past the header area"
        );

        Ok(Self {
            header,
            data,
            start,
            size,
        })
    }

    pub fn header(&self) -> &MzHeader {
        &self.header
    }

    /// The executable image, past the header and relocation table.
    pub fn image(&self) -> &[u8] {
        &self.data[self.start..self.size]
    }

    pub fn image_size(&self) -> usize {
        self.size - self.start
    }

    /// Program entry as the CPU would see it after loading at segment
    /// zero.
    pub fn entry(&self) -> FarPtr {
        FarPtr::new(self.header.reg_cs, self.header.reg_ip)
    }

    /// Image-relative linear offsets of the relocation words. The
    /// loader adds the load segment to the word at each offset.
    pub fn relocations(&self) -> impl Iterator<Item = u32> + '_ {
        let table = &self.data[self.header.reloc_off as usize..];
        (0..self.header.reloc_count as usize).map(move |i| {
            let raw = &table[i * 4..i * 4 + 4];
            let off = u16::from_le_bytes([raw[0], raw[1]]);
            let seg = u16::from_le_bytes([raw[2], raw[3]]);
            FarPtr::new(seg, off).linear()
        })
    }
}
