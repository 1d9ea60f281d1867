//! Cross references between code locations.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

use crate::FarPtr;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, Serialize,
)]
#[repr(u8)]
pub enum XrefKind {
    /// The entry point supplied by the caller of `analyze`.
    UserSpecified = 0,
    FunctionCall = 1,
    ConditionalJump = 2,
    UnconditionalJump = 3,
    /// A jump-table entry feeding a recognized indirect jump.
    IndirectJump = 4,
}

impl XrefKind {
    /// Stable uppercase name, used by listing comments.
    pub fn name(self) -> &'static str {
        match self {
            XrefKind::UserSpecified => "XREF_USER_SPECIFIED",
            XrefKind::FunctionCall => "XREF_FUNCTION_CALL",
            XrefKind::ConditionalJump => "XREF_CONDITIONAL_JUMP",
            XrefKind::UnconditionalJump => "XREF_UNCONDITIONAL_JUMP",
            XrefKind::IndirectJump => "XREF_INDIRECT_JUMP",
        }
    }
}

/// A control-flow edge from `source` to `target`. Every xref other
/// than the user-specified entry has its source at the first byte of a
/// decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Xref {
    pub source: FarPtr,
    pub target: FarPtr,
    pub kind: XrefKind,
}

impl Xref {
    /// Sentinel source of a user-specified entry point.
    pub const USER_SOURCE: FarPtr = FarPtr::new(0xFFFF, 0xFFFF);

    pub fn user_entry(target: FarPtr) -> Self {
        Self {
            source: Self::USER_SOURCE,
            target,
            kind: XrefKind::UserSpecified,
        }
    }

    /// Key of the post-analysis ordering.
    pub(crate) fn sort_key(&self) -> (u32, u32) {
        (self.target.linear(), self.source.linear())
    }
}

/// Index of the first xref in a `(target, source)`-sorted slice whose
/// target is not below `target`. Ties resolve to the first match, so
/// no backwards walk is needed afterwards.
pub(crate) fn lower_bound(xrefs: &[Xref], target: u32) -> usize {
    xrefs.partition_point(|x| x.target.linear() < target)
}
