//! Instruction model: registers, operands, and decoded instructions.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

use crate::FarPtr;

/// Decoding mode of the processor.
///
/// The analyzer always decodes in 16-bit real mode; the decoder keeps
/// the mode as a parameter so the operand machinery can grow the other
/// modes later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CpuMode {
    Bits16,
    Bits32,
    Bits64,
}

impl CpuMode {
    /// Native word size of the mode.
    pub fn word_size(self) -> OprSize {
        match self {
            CpuMode::Bits16 => OprSize::Word,
            CpuMode::Bits32 => OprSize::Dword,
            CpuMode::Bits64 => OprSize::Qword,
        }
    }

    /// Size of the `z` operand family: word in 16-bit mode, dword in
    /// the larger modes.
    pub fn z_size(self) -> OprSize {
        match self {
            CpuMode::Bits16 => OprSize::Word,
            CpuMode::Bits32 | CpuMode::Bits64 => OprSize::Dword,
        }
    }
}

/// Operand and register sizes. The discriminants are the values stored
/// in the `size` nibble of a packed register identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, Serialize,
)]
#[repr(u8)]
pub enum OprSize {
    Byte = 3,
    Word = 4,
    Dword = 5,
    Qword = 6,
    Dqword = 7,
}

/// Register classes, stored in the `type` nibble of a packed register
/// identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, Serialize,
)]
#[repr(u8)]
pub enum RegClass {
    Special = 0,
    General = 1,
    Segment = 2,
    Control = 3,
    Debug = 4,
    Mmx = 5,
    Xmm = 6,
    Ymm = 7,
}

/// Packed register identifier.
///
/// Layout, from the high nibble down: `offset | size | type | number`.
/// `type` and `number` name the physical register; `size` and `offset`
/// select the view of it, with offset 1 marking the high byte of
/// AH/CH/DH/BH. The low byte alone therefore compares physical
/// registers regardless of the sub-register view.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Reg(u16);

impl Reg {
    /// The absent register, used for empty base/index/segment slots.
    pub const NONE: Reg = Reg(0);

    pub const fn make(class: RegClass, number: u8, size: OprSize) -> Reg {
        Reg(((size as u16) << 8) | ((class as u16) << 4) | number as u16)
    }

    const fn make_hibyte(number: u8) -> Reg {
        Reg((1 << 12)
            | ((OprSize::Byte as u16) << 8)
            | ((RegClass::General as u16) << 4)
            | number as u16)
    }

    /// Byte GPR from its machine encoding: 0-3 are AL/CL/DL/BL, 4-7
    /// are the high bytes AH/CH/DH/BH.
    pub const fn byte_gpr(encoding: u8) -> Reg {
        if encoding < 4 {
            Reg::make(RegClass::General, encoding, OprSize::Byte)
        } else {
            Reg::make_hibyte(encoding - 4)
        }
    }

    pub const AX: Reg = Reg::make(RegClass::General, 0, OprSize::Word);
    pub const CX: Reg = Reg::make(RegClass::General, 1, OprSize::Word);
    pub const DX: Reg = Reg::make(RegClass::General, 2, OprSize::Word);
    pub const BX: Reg = Reg::make(RegClass::General, 3, OprSize::Word);
    pub const SP: Reg = Reg::make(RegClass::General, 4, OprSize::Word);
    pub const BP: Reg = Reg::make(RegClass::General, 5, OprSize::Word);
    pub const SI: Reg = Reg::make(RegClass::General, 6, OprSize::Word);
    pub const DI: Reg = Reg::make(RegClass::General, 7, OprSize::Word);

    pub const AL: Reg = Reg::byte_gpr(0);
    pub const CL: Reg = Reg::byte_gpr(1);

    pub const ES: Reg = Reg::make(RegClass::Segment, 0, OprSize::Word);
    pub const CS: Reg = Reg::make(RegClass::Segment, 1, OprSize::Word);
    pub const SS: Reg = Reg::make(RegClass::Segment, 2, OprSize::Word);
    pub const DS: Reg = Reg::make(RegClass::Segment, 3, OprSize::Word);
    pub const FS: Reg = Reg::make(RegClass::Segment, 4, OprSize::Word);
    pub const GS: Reg = Reg::make(RegClass::Segment, 5, OprSize::Word);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn class(self) -> RegClass {
        RegClass::try_from_primitive(((self.0 >> 4) & 0xF) as u8).unwrap()
    }

    pub fn number(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    pub fn size(self) -> OprSize {
        OprSize::try_from_primitive(((self.0 >> 8) & 0xF) as u8).unwrap()
    }

    pub fn is_hibyte(self) -> bool {
        (self.0 >> 12) & 0xF == 1
    }

    /// Whether two identifiers name the same physical register,
    /// ignoring the sub-register view.
    pub fn same_physical(self, other: Reg) -> bool {
        self.0 & 0xFF == other.0 & 0xFF
    }

    pub fn into_raw(self) -> u16 {
        self.0
    }
}

impl std::fmt::Debug for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reg({})", crate::format::reg_name(*self))
    }
}

/// A memory reference. Absent registers are [`Reg::NONE`]; in 16-bit
/// addressing the scale is always 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MemRef {
    pub size: OprSize,
    pub segment: Reg,
    pub base: Reg,
    pub index: Reg,
    pub scale: u8,
    pub disp: i32,
}

/// An immediate value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Imm {
    pub value: u32,
    pub size: OprSize,
}

/// A PC-relative displacement. The base is the address of the byte
/// after the instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Rel {
    pub value: i32,
    pub size: OprSize,
}

/// One operand of a decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Operand {
    None,
    Reg(Reg),
    Mem(MemRef),
    Imm(Imm),
    Rel(Rel),
    /// A `seg:off` literal, used by far `JMP`/`CALL`.
    FarLit(FarPtr),
}

impl Operand {
    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }
}

/// Legacy prefix bytes, one slot per prefix group (the fifth slot is
/// REX, read only in 64-bit mode). A zero slot means the group is
/// absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Prefixes([u8; 5]);

impl Prefixes {
    /// Record a prefix byte for a group. Returns false if the group is
    /// already occupied.
    pub(crate) fn set(&mut self, group: usize, byte: u8) -> bool {
        if self.0[group] != 0 {
            return false;
        }
        self.0[group] = byte;
        true
    }

    /// Group-1 byte: LOCK (F0), REPNZ (F2) or REP (F3).
    pub fn group1(self) -> Option<u8> {
        (self.0[0] != 0).then_some(self.0[0])
    }

    /// Segment override carried by the group-2 prefix, if any.
    pub fn segment_override(self) -> Option<Reg> {
        match self.0[1] {
            0x26 => Some(Reg::ES),
            0x2E => Some(Reg::CS),
            0x36 => Some(Reg::SS),
            0x3E => Some(Reg::DS),
            0x64 => Some(Reg::FS),
            0x65 => Some(Reg::GS),
            _ => None,
        }
    }

    /// Operand-size override (66) present.
    pub fn operand_size(self) -> bool {
        self.0[2] != 0
    }

    /// Address-size override (67) present.
    pub fn address_size(self) -> bool {
        self.0[3] != 0
    }

    pub fn rex(self) -> Option<u8> {
        (self.0[4] != 0).then_some(self.0[4])
    }
}

/// A decoded instruction. Unused operand slots hold [`Operand::None`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub prefixes: Prefixes,
    pub mnemonic: Mnemonic,
    pub operands: [Operand; 4],
}

/// Instruction mnemonics reachable from the one-byte opcode map and
/// its extension groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Mnemonic {
    // arithmetic and logic
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
    Inc,
    Dec,
    Neg,
    Not,
    Mul,
    Imul,
    Div,
    Idiv,
    Test,
    // shifts and rotates
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sar,
    // BCD adjustments
    Daa,
    Das,
    Aaa,
    Aas,
    Aam,
    Aad,
    // stack
    Push,
    Pop,
    Pusha,
    Popa,
    Pushf,
    Popf,
    Enter,
    Leave,
    // moves
    Mov,
    Xchg,
    Lea,
    Les,
    Lds,
    Xlat,
    // string operations
    Movs,
    Cmps,
    Stos,
    Lods,
    Scas,
    Ins,
    Outs,
    // conversions
    Cbw,
    Cwd,
    // flags
    Sahf,
    Lahf,
    Cmc,
    Clc,
    Stc,
    Cli,
    Sti,
    Cld,
    Std,
    // control transfer
    Call,
    Calln,
    Callf,
    Retn,
    Retf,
    Jmp,
    Jmpn,
    Jmpf,
    Int,
    Into,
    Iret,
    // conditional jumps
    Jo,
    Jno,
    Jb,
    Jnb,
    Je,
    Jne,
    Jbe,
    Jnbe,
    Js,
    Jns,
    Jp,
    Jnp,
    Jl,
    Jnl,
    Jle,
    Jnle,
    Jcxz,
    // loops
    Loopne,
    Loope,
    Loop,
    // I/O
    In,
    Out,
    // protected mode / misc
    Bound,
    Arpl,
    Nop,
    Fwait,
    Hlt,
    Xabort,
    Xbegin,
}
