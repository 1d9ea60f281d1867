//! Static encoding specifications for one-byte opcodes, including the
//! ModR/M-reg extension groups.

use crate::insn::Mnemonic;

/// Encoding specification for a single operand.
///
/// The generic forms follow the Intel reference abbreviations (Volume
/// 2, Appendix A.2): the letter picks the addressing method, the
/// suffix the width. The remaining variants are literal immediates and
/// named registers baked into the opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OprSpec {
    None,
    /// Far pointer literal `seg:off` in the instruction bytes.
    Ap,
    /// ModR/M register-or-memory, byte.
    Eb,
    /// ModR/M register-or-memory, native size.
    Ev,
    /// ModR/M register-or-memory, word.
    Ew,
    /// Flags register image on the stack (PUSHF/POPF); not decoded.
    Fv,
    /// ModR/M reg field, byte GPR.
    Gb,
    /// ModR/M reg field, native-size GPR.
    Gv,
    /// ModR/M reg field, word GPR.
    Gw,
    /// ModR/M reg field, word-or-dword GPR.
    Gz,
    /// Immediate, byte.
    Ib,
    /// Immediate, native size.
    Iv,
    /// Immediate, word.
    Iw,
    /// Immediate, word-or-dword.
    Iz,
    /// Relative offset, byte.
    Jb,
    /// Relative offset, word-or-dword.
    Jz,
    /// ModR/M memory-only, bounds pair.
    Ma,
    /// ModR/M memory-only, far pointer.
    Mp,
    /// ModR/M memory-only, word.
    Mw,
    /// Direct memory address, byte data.
    Ob,
    /// Direct memory address, native-size data.
    Ov,
    /// ModR/M rm field, register only; not decoded.
    Rv,
    /// ModR/M reg field, segment register.
    Sw,
    /// DS:SI string source, byte; not decoded.
    Xb,
    /// DS:SI string source, native; not decoded.
    Xv,
    /// DS:SI string source, word-or-dword; not decoded.
    Xz,
    /// ES:DI string destination, byte; not decoded.
    Yb,
    /// ES:DI string destination, native; not decoded.
    Yv,
    /// ES:DI string destination, word-or-dword; not decoded.
    Yz,
    /// Literal immediate baked into the opcode (INT 3, shift by 1).
    Imm(u8),
    /// Segment register by number (ES CS SS DS).
    SegReg(u8),
    /// Byte GPR by machine encoding (AL..BL, AH..BH).
    ByteReg(u8),
    /// Word GPR (AX..DI).
    WordReg(u8),
    /// eAX..eDI: word in 16-bit mode, dword above.
    NativeReg(u8),
    /// rAX..rDI: the mode's full word size.
    WideReg(u8),
}

/// Opcode-extension groups, selected by the primary opcode and indexed
/// by the `reg` field of the following ModR/M byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExtGroup {
    Group1,
    Group1A,
    Group2,
    Group3,
    Group4,
    Group5,
    Group11,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum TableOp {
    /// Prefix byte, escape byte, or unassigned opcode.
    None,
    Insn(Mnemonic),
    Ext(ExtGroup),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct OpcodeEntry {
    pub op: TableOp,
    pub operands: [OprSpec; 4],
}

pub(crate) const EMPTY: OpcodeEntry = OpcodeEntry {
    op: TableOp::None,
    operands: [OprSpec::None; 4],
};

const fn op0(m: Mnemonic) -> OpcodeEntry {
    OpcodeEntry {
        op: TableOp::Insn(m),
        operands: [OprSpec::None; 4],
    }
}

const fn op1(m: Mnemonic, a: OprSpec) -> OpcodeEntry {
    OpcodeEntry {
        op: TableOp::Insn(m),
        operands: [a, OprSpec::None, OprSpec::None, OprSpec::None],
    }
}

const fn op2(m: Mnemonic, a: OprSpec, b: OprSpec) -> OpcodeEntry {
    OpcodeEntry {
        op: TableOp::Insn(m),
        operands: [a, b, OprSpec::None, OprSpec::None],
    }
}

const fn op3(m: Mnemonic, a: OprSpec, b: OprSpec, c: OprSpec) -> OpcodeEntry {
    OpcodeEntry {
        op: TableOp::Insn(m),
        operands: [a, b, c, OprSpec::None],
    }
}

const fn ext(g: ExtGroup) -> OpcodeEntry {
    OpcodeEntry {
        op: TableOp::Ext(g),
        operands: [OprSpec::None; 4],
    }
}

const fn ext1(g: ExtGroup, a: OprSpec) -> OpcodeEntry {
    OpcodeEntry {
        op: TableOp::Ext(g),
        operands: [a, OprSpec::None, OprSpec::None, OprSpec::None],
    }
}

const fn ext2(g: ExtGroup, a: OprSpec, b: OprSpec) -> OpcodeEntry {
    OpcodeEntry {
        op: TableOp::Ext(g),
        operands: [a, b, OprSpec::None, OprSpec::None],
    }
}

use ExtGroup::*;
use Mnemonic as M;
// everything except `OprSpec::None`, which stays qualified so the
// option `None` keeps its usual meaning below
use OprSpec::{
    Ap, ByteReg, Eb, Ev, Ew, Fv, Gb, Gv, Gw, Gz, Ib, Imm, Iv, Iw, Iz, Jb,
    Jz, Ma, Mp, NativeReg, Ob, Ov, SegReg, Sw, WideReg, WordReg, Xb, Xv, Xz,
    Yb, Yv, Yz,
};

/// Encoding specifications for one-byte opcodes.
/// See Table A-2 in Intel Reference, Volume 2, Appendix A.
pub(crate) static ONE_BYTE: [OpcodeEntry; 256] = [
    /* 00 */ op2(M::Add, Eb, Gb),
    /* 01 */ op2(M::Add, Ev, Gv),
    /* 02 */ op2(M::Add, Gb, Eb),
    /* 03 */ op2(M::Add, Gv, Ev),
    /* 04 */ op2(M::Add, ByteReg(0), Ib),
    /* 05 */ op2(M::Add, WideReg(0), Iz),
    /* 06 */ op1(M::Push, SegReg(0)),
    /* 07 */ op1(M::Pop, SegReg(0)),
    /* 08 */ op2(M::Or, Eb, Gb),
    /* 09 */ op2(M::Or, Ev, Gv),
    /* 0A */ op2(M::Or, Gb, Eb),
    /* 0B */ op2(M::Or, Gv, Ev),
    /* 0C */ op2(M::Or, ByteReg(0), Ib),
    /* 0D */ op2(M::Or, WideReg(0), Iz),
    /* 0E */ op1(M::Push, SegReg(1)),
    /* 0F */ EMPTY, // 2-byte escape
    /* 10 */ op2(M::Adc, Eb, Gb),
    /* 11 */ op2(M::Adc, Ev, Gv),
    /* 12 */ op2(M::Adc, Gb, Eb),
    /* 13 */ op2(M::Adc, Gv, Ev),
    /* 14 */ op2(M::Adc, ByteReg(0), Ib),
    /* 15 */ op2(M::Adc, WideReg(0), Iz),
    /* 16 */ op1(M::Push, SegReg(2)),
    /* 17 */ op1(M::Pop, SegReg(2)),
    /* 18 */ op2(M::Sbb, Eb, Gb),
    /* 19 */ op2(M::Sbb, Ev, Gv),
    /* 1A */ op2(M::Sbb, Gb, Eb),
    /* 1B */ op2(M::Sbb, Gv, Ev),
    /* 1C */ op2(M::Sbb, ByteReg(0), Ib),
    /* 1D */ op2(M::Sbb, WideReg(0), Iz),
    /* 1E */ op1(M::Push, SegReg(3)),
    /* 1F */ op1(M::Pop, SegReg(3)),
    /* 20 */ op2(M::And, Eb, Gb),
    /* 21 */ op2(M::And, Ev, Gv),
    /* 22 */ op2(M::And, Gb, Eb),
    /* 23 */ op2(M::And, Gv, Ev),
    /* 24 */ op2(M::And, ByteReg(0), Ib),
    /* 25 */ op2(M::And, WideReg(0), Iz),
    /* 26 */ EMPTY, // SEG=ES (prefix)
    /* 27 */ op0(M::Daa),
    /* 28 */ op2(M::Sub, Eb, Gb),
    /* 29 */ op2(M::Sub, Ev, Gv),
    /* 2A */ op2(M::Sub, Gb, Eb),
    /* 2B */ op2(M::Sub, Gv, Ev),
    /* 2C */ op2(M::Sub, ByteReg(0), Ib),
    /* 2D */ op2(M::Sub, WideReg(0), Iz),
    /* 2E */ EMPTY, // SEG=CS (prefix)
    /* 2F */ op0(M::Das),
    /* 30 */ op2(M::Xor, Eb, Gb),
    /* 31 */ op2(M::Xor, Ev, Gv),
    /* 32 */ op2(M::Xor, Gb, Eb),
    /* 33 */ op2(M::Xor, Gv, Ev),
    /* 34 */ op2(M::Xor, ByteReg(0), Ib),
    /* 35 */ op2(M::Xor, WideReg(0), Iz),
    /* 36 */ EMPTY, // SEG=SS (prefix)
    /* 37 */ op0(M::Aaa),
    /* 38 */ op2(M::Cmp, Eb, Gb),
    /* 39 */ op2(M::Cmp, Ev, Gv),
    /* 3A */ op2(M::Cmp, Gb, Eb),
    /* 3B */ op2(M::Cmp, Gv, Ev),
    /* 3C */ op2(M::Cmp, ByteReg(0), Ib),
    /* 3D */ op2(M::Cmp, WideReg(0), Iz),
    /* 3E */ EMPTY, // SEG=DS (prefix)
    /* 3F */ op0(M::Aas),
    /* 40 */ op1(M::Inc, NativeReg(0)), // REX in 64-bit mode
    /* 41 */ op1(M::Inc, NativeReg(1)),
    /* 42 */ op1(M::Inc, NativeReg(2)),
    /* 43 */ op1(M::Inc, NativeReg(3)),
    /* 44 */ op1(M::Inc, NativeReg(4)),
    /* 45 */ op1(M::Inc, NativeReg(5)),
    /* 46 */ op1(M::Inc, NativeReg(6)),
    /* 47 */ op1(M::Inc, NativeReg(7)),
    /* 48 */ op1(M::Dec, NativeReg(0)),
    /* 49 */ op1(M::Dec, NativeReg(1)),
    /* 4A */ op1(M::Dec, NativeReg(2)),
    /* 4B */ op1(M::Dec, NativeReg(3)),
    /* 4C */ op1(M::Dec, NativeReg(4)),
    /* 4D */ op1(M::Dec, NativeReg(5)),
    /* 4E */ op1(M::Dec, NativeReg(6)),
    /* 4F */ op1(M::Dec, NativeReg(7)),
    /* 50 */ op1(M::Push, WideReg(0)),
    /* 51 */ op1(M::Push, WideReg(1)),
    /* 52 */ op1(M::Push, WideReg(2)),
    /* 53 */ op1(M::Push, WideReg(3)),
    /* 54 */ op1(M::Push, WideReg(4)),
    /* 55 */ op1(M::Push, WideReg(5)),
    /* 56 */ op1(M::Push, WideReg(6)),
    /* 57 */ op1(M::Push, WideReg(7)),
    /* 58 */ op1(M::Pop, WideReg(0)),
    /* 59 */ op1(M::Pop, WideReg(1)),
    /* 5A */ op1(M::Pop, WideReg(2)),
    /* 5B */ op1(M::Pop, WideReg(3)),
    /* 5C */ op1(M::Pop, WideReg(4)),
    /* 5D */ op1(M::Pop, WideReg(5)),
    /* 5E */ op1(M::Pop, WideReg(6)),
    /* 5F */ op1(M::Pop, WideReg(7)),
    /* 60 */ op0(M::Pusha),
    /* 61 */ op0(M::Popa),
    /* 62 */ op2(M::Bound, Gv, Ma),
    /* 63 */ op2(M::Arpl, Ew, Gw),
    /* 64 */ EMPTY, // SEG=FS (prefix)
    /* 65 */ EMPTY, // SEG=GS (prefix)
    /* 66 */ EMPTY, // operand size (prefix)
    /* 67 */ EMPTY, // address size (prefix)
    /* 68 */ op1(M::Push, Iz),
    /* 69 */ op3(M::Imul, Gv, Ev, Iz),
    /* 6A */ op1(M::Push, Ib),
    /* 6B */ op3(M::Imul, Gv, Ev, Ib),
    /* 6C */ op2(M::Ins, Yb, WordReg(2)),
    /* 6D */ op2(M::Ins, Yz, WordReg(2)),
    /* 6E */ op2(M::Outs, WordReg(2), Xb),
    /* 6F */ op2(M::Outs, WordReg(2), Xz),
    /* 70 */ op1(M::Jo, Jb),
    /* 71 */ op1(M::Jno, Jb),
    /* 72 */ op1(M::Jb, Jb),
    /* 73 */ op1(M::Jnb, Jb),
    /* 74 */ op1(M::Je, Jb),
    /* 75 */ op1(M::Jne, Jb),
    /* 76 */ op1(M::Jbe, Jb),
    /* 77 */ op1(M::Jnbe, Jb),
    /* 78 */ op1(M::Js, Jb),
    /* 79 */ op1(M::Jns, Jb),
    /* 7A */ op1(M::Jp, Jb),
    /* 7B */ op1(M::Jnp, Jb),
    /* 7C */ op1(M::Jl, Jb),
    /* 7D */ op1(M::Jnl, Jb),
    /* 7E */ op1(M::Jle, Jb),
    /* 7F */ op1(M::Jnle, Jb),
    /* 80 */ ext2(Group1, Eb, Ib),
    /* 81 */ ext2(Group1, Ev, Iz),
    /* 82 */ ext2(Group1, Eb, Ib),
    /* 83 */ ext2(Group1, Ev, Ib),
    /* 84 */ op2(M::Test, Eb, Gb),
    /* 85 */ op2(M::Test, Ev, Gv),
    /* 86 */ op2(M::Xchg, Eb, Gb),
    /* 87 */ op2(M::Xchg, Ev, Gv),
    /* 88 */ op2(M::Mov, Eb, Gb),
    /* 89 */ op2(M::Mov, Ev, Gv),
    /* 8A */ op2(M::Mov, Gb, Eb),
    /* 8B */ op2(M::Mov, Gv, Ev),
    /* 8C */ op2(M::Mov, Ev, Sw),
    /* 8D */ op2(M::Lea, Gv, Mp),
    /* 8E */ op2(M::Mov, Sw, Ew),
    /* 8F */ ext1(Group1A, Ev),
    /* 90 */ op0(M::Nop),
    /* 91 */ op2(M::Xchg, WideReg(1), WideReg(0)),
    /* 92 */ op2(M::Xchg, WideReg(2), WideReg(0)),
    /* 93 */ op2(M::Xchg, WideReg(3), WideReg(0)),
    /* 94 */ op2(M::Xchg, WideReg(4), WideReg(0)),
    /* 95 */ op2(M::Xchg, WideReg(5), WideReg(0)),
    /* 96 */ op2(M::Xchg, WideReg(6), WideReg(0)),
    /* 97 */ op2(M::Xchg, WideReg(7), WideReg(0)),
    /* 98 */ op0(M::Cbw),
    /* 99 */ op0(M::Cwd),
    /* 9A */ op1(M::Callf, Ap),
    /* 9B */ op0(M::Fwait),
    /* 9C */ op1(M::Pushf, Fv),
    /* 9D */ op1(M::Popf, Fv),
    /* 9E */ op0(M::Sahf),
    /* 9F */ op0(M::Lahf),
    /* A0 */ op2(M::Mov, ByteReg(0), Ob),
    /* A1 */ op2(M::Mov, WideReg(0), Ov),
    /* A2 */ op2(M::Mov, Ob, ByteReg(0)),
    /* A3 */ op2(M::Mov, Ov, WideReg(0)),
    /* A4 */ op2(M::Movs, Yb, Xb),
    /* A5 */ op2(M::Movs, Yv, Xv),
    /* A6 */ op2(M::Cmps, Xb, Yb),
    /* A7 */ op2(M::Cmps, Xv, Yv),
    /* A8 */ op2(M::Test, ByteReg(0), Ib),
    /* A9 */ op2(M::Test, WideReg(0), Iz),
    /* AA */ op2(M::Stos, Yb, ByteReg(0)),
    /* AB */ op2(M::Stos, Yv, WideReg(0)),
    /* AC */ op2(M::Lods, ByteReg(0), Xb),
    /* AD */ op2(M::Lods, WideReg(0), Xv),
    /* AE */ op2(M::Scas, ByteReg(0), Yb),
    /* AF */ op2(M::Scas, WideReg(0), Xv),
    /* B0 */ op2(M::Mov, ByteReg(0), Ib),
    /* B1 */ op2(M::Mov, ByteReg(1), Ib),
    /* B2 */ op2(M::Mov, ByteReg(2), Ib),
    /* B3 */ op2(M::Mov, ByteReg(3), Ib),
    /* B4 */ op2(M::Mov, ByteReg(4), Ib),
    /* B5 */ op2(M::Mov, ByteReg(5), Ib),
    /* B6 */ op2(M::Mov, ByteReg(6), Ib),
    /* B7 */ op2(M::Mov, ByteReg(7), Ib),
    /* B8 */ op2(M::Mov, WideReg(0), Iv),
    /* B9 */ op2(M::Mov, WideReg(1), Iv),
    /* BA */ op2(M::Mov, WideReg(2), Iv),
    /* BB */ op2(M::Mov, WideReg(3), Iv),
    /* BC */ op2(M::Mov, WideReg(4), Iv),
    /* BD */ op2(M::Mov, WideReg(5), Iv),
    /* BE */ op2(M::Mov, WideReg(6), Iv),
    /* BF */ op2(M::Mov, WideReg(7), Iv),
    /* C0 */ ext2(Group2, Eb, Ib),
    /* C1 */ ext2(Group2, Ev, Ib),
    /* C2 */ op1(M::Retn, Iw),
    /* C3 */ op0(M::Retn),
    /* C4 */ op2(M::Les, Gz, Mp),
    /* C5 */ op2(M::Lds, Gz, Mp),
    /* C6 */ ext2(Group11, Eb, Ib),
    /* C7 */ ext2(Group11, Ev, Iz),
    /* C8 */ op2(M::Enter, Iw, Ib),
    /* C9 */ op0(M::Leave),
    /* CA */ op1(M::Retf, Iw),
    /* CB */ op0(M::Retf),
    /* CC */ op1(M::Int, Imm(3)),
    /* CD */ op1(M::Int, Ib),
    /* CE */ op0(M::Into),
    /* CF */ op0(M::Iret),
    /* D0 */ ext2(Group2, Eb, Imm(1)),
    /* D1 */ ext2(Group2, Ev, Imm(1)),
    /* D2 */ ext2(Group2, Eb, ByteReg(1)),
    /* D3 */ ext2(Group2, Ev, ByteReg(1)),
    /* D4 */ op1(M::Aam, Ib),
    /* D5 */ op1(M::Aad, Ib),
    /* D6 */ EMPTY,
    /* D7 */ op0(M::Xlat),
    /* D8 */ EMPTY, // escape to x87 fpu
    /* D9 */ EMPTY,
    /* DA */ EMPTY,
    /* DB */ EMPTY,
    /* DC */ EMPTY,
    /* DD */ EMPTY,
    /* DE */ EMPTY,
    /* DF */ EMPTY,
    /* E0 */ op1(M::Loopne, Jb),
    /* E1 */ op1(M::Loope, Jb),
    /* E2 */ op1(M::Loop, Jb),
    /* E3 */ op1(M::Jcxz, Jb),
    /* E4 */ op2(M::In, ByteReg(0), Ib),
    /* E5 */ op2(M::In, NativeReg(0), Ib),
    /* E6 */ op2(M::Out, Ib, ByteReg(0)),
    /* E7 */ op2(M::Out, Ib, NativeReg(0)),
    /* E8 */ op1(M::Call, Jz),
    /* E9 */ op1(M::Jmp, Jz), // near
    /* EA */ op1(M::Jmp, Ap), // far
    /* EB */ op1(M::Jmp, Jb), // short
    /* EC */ op2(M::In, ByteReg(0), WordReg(2)),
    /* ED */ op2(M::In, NativeReg(0), WordReg(2)),
    /* EE */ op2(M::Out, WordReg(2), ByteReg(0)),
    /* EF */ op2(M::Out, WordReg(2), NativeReg(0)),
    /* F0 */ EMPTY, // LOCK (prefix)
    /* F1 */ EMPTY,
    /* F2 */ EMPTY, // REPNE (prefix)
    /* F3 */ EMPTY, // REPE (prefix)
    /* F4 */ op0(M::Hlt),
    /* F5 */ op0(M::Cmc),
    /* F6 */ ext1(Group3, Eb),
    /* F7 */ ext1(Group3, Ev),
    /* F8 */ op0(M::Clc),
    /* F9 */ op0(M::Stc),
    /* FA */ op0(M::Cli),
    /* FB */ op0(M::Sti),
    /* FC */ op0(M::Cld),
    /* FD */ op0(M::Std),
    /* FE */ ext(Group4),
    /* FF */ ext(Group5),
];

/// Keep the primary entry's operand specs, replacing the mnemonic with
/// the one selected by the group table.
const fn with_mnemonic(m: Mnemonic, base: OpcodeEntry) -> OpcodeEntry {
    OpcodeEntry {
        op: TableOp::Insn(m),
        operands: base.operands,
    }
}

/// Resolve an extension-group entry against the `reg` field of the
/// ModR/M byte. Returns [`EMPTY`] for unassigned combinations, which
/// the decoder reports as invalid.
pub(crate) fn resolve_group(
    group: ExtGroup,
    opcode: u8,
    modrm: u8,
    base: OpcodeEntry,
) -> OpcodeEntry {
    let reg = (modrm >> 3) & 0x7;
    match group {
        ExtGroup::Group1 => {
            const MAP: [Mnemonic; 8] = [
                M::Add,
                M::Or,
                M::Adc,
                M::Sbb,
                M::And,
                M::Sub,
                M::Xor,
                M::Cmp,
            ];
            with_mnemonic(MAP[reg as usize], base)
        }
        ExtGroup::Group1A => match reg {
            0 => with_mnemonic(M::Pop, base),
            _ => EMPTY,
        },
        ExtGroup::Group2 => {
            const MAP: [Option<Mnemonic>; 8] = [
                Some(M::Rol),
                Some(M::Ror),
                Some(M::Rcl),
                Some(M::Rcr),
                Some(M::Shl),
                Some(M::Shr),
                None,
                Some(M::Sar),
            ];
            match MAP[reg as usize] {
                Some(m) => with_mnemonic(m, base),
                None => EMPTY,
            }
        }
        // NOTE the byte and native maps carry their widths explicitly,
        // duplicating the primary entry's Eb/Ev.
        ExtGroup::Group3 => {
            const MAP_F6: [OpcodeEntry; 8] = [
                op2(M::Test, Eb, Ib),
                EMPTY,
                op1(M::Not, Eb),
                op1(M::Neg, Eb),
                op2(M::Mul, Eb, ByteReg(0)),
                op2(M::Imul, Eb, ByteReg(0)),
                op2(M::Div, Eb, ByteReg(0)),
                op2(M::Idiv, Eb, ByteReg(0)),
            ];
            const MAP_F7: [OpcodeEntry; 8] = [
                op2(M::Test, Ev, Iz),
                EMPTY,
                op1(M::Not, Ev),
                op1(M::Neg, Ev),
                op2(M::Mul, Ev, WideReg(0)),
                op2(M::Imul, Ev, WideReg(0)),
                op2(M::Div, Ev, WideReg(0)),
                op2(M::Idiv, Ev, WideReg(0)),
            ];
            if opcode == 0xF6 {
                MAP_F6[reg as usize]
            } else {
                MAP_F7[reg as usize]
            }
        }
        ExtGroup::Group4 => {
            const MAP: [OpcodeEntry; 8] = [
                op1(M::Inc, Eb),
                op1(M::Dec, Eb),
                EMPTY,
                EMPTY,
                EMPTY,
                EMPTY,
                EMPTY,
                EMPTY,
            ];
            MAP[reg as usize]
        }
        ExtGroup::Group5 => {
            const MAP: [OpcodeEntry; 8] = [
                op1(M::Inc, Ev),
                op1(M::Dec, Ev),
                op1(M::Calln, Ev),
                op1(M::Callf, Mp),
                op1(M::Jmpn, Ev),
                op1(M::Jmpf, Mp),
                op1(M::Push, Ev),
                EMPTY,
            ];
            MAP[reg as usize]
        }
        ExtGroup::Group11 => {
            if reg == 0 {
                with_mnemonic(M::Mov, base)
            } else if modrm == 0xF8 {
                match opcode {
                    0xC6 => op1(M::Xabort, Ib),
                    0xC7 => op1(M::Xbegin, Jz),
                    _ => EMPTY,
                }
            } else {
                EMPTY
            }
        }
    }
}
