//! Per-byte classification of the executable image.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

/// Attribute byte layout.
pub mod flag {
    /// Mask for the classification field.
    pub const ATTR_TYPE: u8 = 0x03;
    /// Not yet examined.
    pub const TYPE_UNKNOWN: u8 = 0x00;
    /// Queued for analysis.
    pub const TYPE_PENDING: u8 = 0x01;
    /// Covered by a decoded instruction.
    pub const TYPE_CODE: u8 = 0x02;
    /// Part of a data item.
    pub const TYPE_DATA: u8 = 0x03;
    /// The byte has been classified as code or data.
    pub const ATTR_PROCESSED: u8 = 0x04;
    /// First byte of an instruction or data item.
    pub const ATTR_BOUNDARY: u8 = 0x08;
}

/// Classification of a single image byte.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, Serialize,
)]
#[repr(u8)]
pub enum ByteType {
    Unknown = 0,
    Pending = 1,
    Code = 2,
    Data = 3,
}

/// One byte of the attribute map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ByteAttr(u8);

impl ByteAttr {
    pub fn from_raw(value: u8) -> Self {
        Self(value)
    }

    pub fn into_raw(self) -> u8 {
        self.0
    }

    pub fn byte_type(self) -> ByteType {
        ByteType::try_from_primitive(self.0 & flag::ATTR_TYPE).unwrap()
    }

    pub fn is_processed(self) -> bool {
        self.0 & flag::ATTR_PROCESSED != 0
    }

    pub fn is_boundary(self) -> bool {
        self.0 & flag::ATTR_BOUNDARY != 0
    }
}

/// Span of linear addresses the map covers: the full 20-bit space.
pub const ADDRESS_SPACE: usize = 1 << 20;

/// Dense map from linear address to [`ByteAttr`].
///
/// One byte per address over the whole 20-bit space, trading a fixed
/// 1 MiB allocation for O(1) classification queries. Owned by a single
/// analyzer; never shared between analyses.
pub struct AttrMap(Box<[u8]>);

impl AttrMap {
    pub fn new() -> Self {
        Self(vec![0; ADDRESS_SPACE].into_boxed_slice())
    }

    /// Whether a linear address falls inside the mapped space.
    pub fn contains(&self, linear: u32) -> bool {
        (linear as usize) < ADDRESS_SPACE
    }

    /// Attributes of a linear address. Addresses outside the 20-bit
    /// space read as unknown.
    pub fn get(&self, linear: u32) -> ByteAttr {
        self.0
            .get(linear as usize)
            .copied()
            .map(ByteAttr::from_raw)
            .unwrap_or_default()
    }

    /// Classify a byte as code; clears any boundary mark.
    pub(crate) fn mark_code(&mut self, linear: u32) {
        let b = &mut self.0[linear as usize];
        *b &= !(flag::ATTR_TYPE | flag::ATTR_BOUNDARY);
        *b |= flag::TYPE_CODE | flag::ATTR_PROCESSED;
    }

    /// Classify a byte as data, optionally as the item's first byte.
    pub(crate) fn mark_data(&mut self, linear: u32, boundary: bool) {
        let b = &mut self.0[linear as usize];
        *b &= !(flag::ATTR_TYPE | flag::ATTR_BOUNDARY);
        *b |= flag::TYPE_DATA | flag::ATTR_PROCESSED;
        if boundary {
            *b |= flag::ATTR_BOUNDARY;
        }
    }

    /// Mark an already-classified code byte as an instruction start.
    pub(crate) fn set_boundary(&mut self, linear: u32) {
        self.0[linear as usize] |= flag::ATTR_BOUNDARY;
    }
}

impl Default for AttrMap {
    fn default() -> Self {
        Self::new()
    }
}
