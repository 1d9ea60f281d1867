//! Instruction decoder: prefix scan, opcode dispatch, and operand
//! decoding over a bounded byte window.

use crate::insn::{
    CpuMode, Imm, Instruction, MemRef, Operand, OprSize, Prefixes, Reg,
    RegClass, Rel,
};
use crate::opcode::{self, OpcodeEntry, OprSpec, TableOp};
use crate::FarPtr;

/// The single decoder-level failure: bad prefixes, an unassigned
/// opcode or group slot, a register where memory is required, an
/// operand form outside the implemented set, or a truncated stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidInstruction;

impl std::fmt::Display for InvalidInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("invalid instruction")
    }
}

impl std::error::Error for InvalidInstruction {}

/// Largest byte window a single decode can touch. A 16-bit instruction
/// with every prefix group filled stays well under this.
const WINDOW: usize = 20;

/// Reader over the instruction window. `modrm` and `end` are cursors
/// into `data`; the prefix cursor is always 0, so the consumed length
/// reported to the caller is just `end`.
struct InsnReader<'a> {
    data: &'a [u8],
    modrm: usize,
    end: usize,
}

impl<'a> InsnReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            modrm: 0,
            end: 0,
        }
    }

    fn peek(&self) -> Result<u8, InvalidInstruction> {
        self.data.get(self.end).copied().ok_or(InvalidInstruction)
    }

    fn read_u8(&mut self) -> Result<u8, InvalidInstruction> {
        let b = self.peek()?;
        self.end += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16, InvalidInstruction> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from(lo) | (u16::from(hi) << 8))
    }

    fn read_u32(&mut self) -> Result<u32, InvalidInstruction> {
        let lo = self.read_u16()?;
        let hi = self.read_u16()?;
        Ok(u32::from(lo) | (u32::from(hi) << 16))
    }

    fn read_imm(&mut self, size: OprSize) -> Result<u32, InvalidInstruction> {
        match size {
            OprSize::Byte => self.read_u8().map(u32::from),
            OprSize::Word => self.read_u16().map(u32::from),
            OprSize::Dword => self.read_u32(),
            _ => Err(InvalidInstruction),
        }
    }

    /// Mark the current position as the ModR/M candidate.
    fn mark_modrm(&mut self) {
        self.modrm = self.end;
    }

    /// Read the ModR/M byte. The first read consumes it; later reads
    /// return the same byte without advancing.
    fn read_modrm(&mut self) -> Result<u8, InvalidInstruction> {
        if self.end == self.modrm {
            self.end += 1;
        }
        self.data
            .get(self.modrm)
            .copied()
            .ok_or(InvalidInstruction)
    }
}

/// Prefix group of a byte: groups 1-4 are the legacy prefixes, group 5
/// is REX (a prefix only in 64-bit mode).
fn prefix_group(byte: u8) -> Option<usize> {
    match byte {
        0xF0 | 0xF2 | 0xF3 => Some(0),
        0x26 | 0x2E | 0x36 | 0x3E | 0x64 | 0x65 => Some(1),
        0x66 => Some(2),
        0x67 => Some(3),
        0x40..=0x4F => Some(4),
        _ => None,
    }
}

/// Decode one instruction from the start of `code`.
///
/// Returns the instruction and the number of bytes consumed. The
/// decoder is pure: the same bytes and mode always produce the same
/// result and length.
pub fn decode(
    code: &[u8],
    mode: CpuMode,
) -> Result<(Instruction, usize), InvalidInstruction> {
    // Work over a padded local window when few bytes remain, so reads
    // never index past the input. The final length check rejects any
    // decode that ran into the padding.
    let mut buf = [0xCC_u8; WINDOW];
    let window: &[u8] = if code.len() < WINDOW {
        buf[..code.len()].copy_from_slice(code);
        &buf
    } else {
        code
    };

    let mut rd = InsnReader::new(window);
    let mut prefixes = Prefixes::default();
    decode_prefixes(&mut rd, &mut prefixes, mode)?;

    let (mnemonic, specs) = decode_opcode(&mut rd)?;

    let mut operands = [Operand::None; 4];
    for (slot, spec) in operands.iter_mut().zip(specs) {
        if spec == OprSpec::None {
            break;
        }
        *slot = decode_operand(&mut rd, spec, prefixes, mode)?;
    }

    let count = rd.end;
    if count > code.len() {
        return Err(InvalidInstruction);
    }
    Ok((
        Instruction {
            prefixes,
            mnemonic,
            operands,
        },
        count,
    ))
}

/// Walk the prefix bytes. At most one prefix per group; a duplicate
/// fails the decode. REX terminates the scan and is only a prefix in
/// 64-bit mode.
fn decode_prefixes(
    rd: &mut InsnReader,
    prefixes: &mut Prefixes,
    mode: CpuMode,
) -> Result<(), InvalidInstruction> {
    loop {
        let byte = rd.peek()?;
        let Some(group) = prefix_group(byte) else {
            return Ok(());
        };
        if group == 4 && mode != CpuMode::Bits64 {
            return Ok(());
        }
        if !prefixes.set(group, byte) {
            return Err(InvalidInstruction);
        }
        rd.end += 1;
        if group == 4 {
            return Ok(());
        }
    }
}

/// Read the opcode byte and resolve its encoding spec, consulting the
/// ModR/M `reg` field for the extension groups.
fn decode_opcode(
    rd: &mut InsnReader,
) -> Result<(crate::insn::Mnemonic, [OprSpec; 4]), InvalidInstruction> {
    let byte = rd.read_u8()?;
    rd.mark_modrm();
    let entry: OpcodeEntry = opcode::ONE_BYTE[byte as usize];
    let entry = match entry.op {
        TableOp::Insn(_) => entry,
        TableOp::Ext(group) => {
            let modrm = rd.read_modrm()?;
            opcode::resolve_group(group, byte, modrm, entry)
        }
        TableOp::None => return Err(InvalidInstruction),
    };
    match entry.op {
        TableOp::Insn(m) => Ok((m, entry.operands)),
        _ => Err(InvalidInstruction),
    }
}

fn decode_operand(
    rd: &mut InsnReader,
    spec: OprSpec,
    prefixes: Prefixes,
    mode: CpuMode,
) -> Result<Operand, InvalidInstruction> {
    let native = mode.word_size();
    match spec {
        OprSpec::None => Ok(Operand::None),

        // named registers baked into the opcode
        OprSpec::SegReg(n) => {
            Ok(Operand::Reg(Reg::make(RegClass::Segment, n, OprSize::Word)))
        }
        OprSpec::ByteReg(n) => Ok(Operand::Reg(Reg::byte_gpr(n))),
        OprSpec::WordReg(n) => {
            Ok(Operand::Reg(Reg::make(RegClass::General, n, OprSize::Word)))
        }
        OprSpec::NativeReg(n) => {
            Ok(Operand::Reg(Reg::make(RegClass::General, n, mode.z_size())))
        }
        OprSpec::WideReg(n) => {
            Ok(Operand::Reg(Reg::make(RegClass::General, n, native)))
        }

        OprSpec::Imm(n) => Ok(Operand::Imm(Imm {
            value: u32::from(n),
            size: OprSize::Byte,
        })),

        // ModR/M reg field
        OprSpec::Gb => {
            let modrm = rd.read_modrm()?;
            Ok(Operand::Reg(Reg::byte_gpr(reg_field(modrm))))
        }
        OprSpec::Gv => {
            let modrm = rd.read_modrm()?;
            Ok(Operand::Reg(Reg::make(
                RegClass::General,
                reg_field(modrm),
                native,
            )))
        }
        OprSpec::Gw => {
            let modrm = rd.read_modrm()?;
            Ok(Operand::Reg(Reg::make(
                RegClass::General,
                reg_field(modrm),
                OprSize::Word,
            )))
        }
        OprSpec::Gz => {
            let modrm = rd.read_modrm()?;
            Ok(Operand::Reg(Reg::make(
                RegClass::General,
                reg_field(modrm),
                mode.z_size(),
            )))
        }
        OprSpec::Sw => {
            let modrm = rd.read_modrm()?;
            Ok(Operand::Reg(Reg::make(
                RegClass::Segment,
                reg_field(modrm),
                OprSize::Word,
            )))
        }

        // ModR/M register-or-memory
        OprSpec::Eb => {
            modrm_operand(rd, OprSize::Byte, true, prefixes, mode)
        }
        OprSpec::Ev => modrm_operand(rd, native, true, prefixes, mode),
        OprSpec::Ew => {
            modrm_operand(rd, OprSize::Word, true, prefixes, mode)
        }

        // ModR/M memory-only; a far pointer or bounds pair spans two
        // words in 16-bit mode
        OprSpec::Mp | OprSpec::Ma => {
            modrm_operand(rd, OprSize::Dword, false, prefixes, mode)
        }
        OprSpec::Mw => {
            modrm_operand(rd, OprSize::Word, false, prefixes, mode)
        }

        // immediates
        OprSpec::Ib => Ok(Operand::Imm(Imm {
            value: rd.read_u8()?.into(),
            size: OprSize::Byte,
        })),
        OprSpec::Iw => Ok(Operand::Imm(Imm {
            value: rd.read_u16()?.into(),
            size: OprSize::Word,
        })),
        OprSpec::Iv => Ok(Operand::Imm(Imm {
            value: rd.read_imm(native)?,
            size: native,
        })),
        OprSpec::Iz => {
            let size = mode.z_size();
            Ok(Operand::Imm(Imm {
                value: rd.read_imm(size)?,
                size,
            }))
        }

        // relative offsets
        OprSpec::Jb => Ok(Operand::Rel(Rel {
            value: rd.read_u8()? as i8 as i32,
            size: OprSize::Byte,
        })),
        OprSpec::Jz => match mode.z_size() {
            OprSize::Word => Ok(Operand::Rel(Rel {
                value: rd.read_u16()? as i16 as i32,
                size: OprSize::Word,
            })),
            _ => Ok(Operand::Rel(Rel {
                value: rd.read_u32()? as i32,
                size: OprSize::Dword,
            })),
        },

        // direct memory address, no ModR/M
        OprSpec::Ob => direct_mem(rd, OprSize::Byte, prefixes, mode),
        OprSpec::Ov => direct_mem(rd, native, prefixes, mode),

        // far pointer literal: offset first, then segment
        OprSpec::Ap => {
            let off = rd.read_imm(native)? as u16;
            let seg = rd.read_u16()?;
            Ok(Operand::FarLit(FarPtr::new(seg, off)))
        }

        // not implemented for any current mode
        OprSpec::Fv
        | OprSpec::Rv
        | OprSpec::Xb
        | OprSpec::Xv
        | OprSpec::Xz
        | OprSpec::Yb
        | OprSpec::Yv
        | OprSpec::Yz => Err(InvalidInstruction),
    }
}

fn reg_field(modrm: u8) -> u8 {
    (modrm >> 3) & 0x7
}

/// Decode a ModR/M register-or-memory operand. `allow_reg` is false
/// for the memory-only `M*` forms, where `mod = 3` is invalid.
fn modrm_operand(
    rd: &mut InsnReader,
    size: OprSize,
    allow_reg: bool,
    prefixes: Prefixes,
    mode: CpuMode,
) -> Result<Operand, InvalidInstruction> {
    if mode != CpuMode::Bits16 {
        // TODO decode the 32-bit ModR/M + SIB forms
        return Err(InvalidInstruction);
    }
    let modrm = rd.read_modrm()?;
    let mod_ = modrm >> 6;
    let rm = modrm & 0x7;

    if mod_ == 3 {
        if !allow_reg {
            return Err(InvalidInstruction);
        }
        let reg = if size == OprSize::Byte {
            Reg::byte_gpr(rm)
        } else {
            Reg::make(RegClass::General, rm, size)
        };
        return Ok(Operand::Reg(reg));
    }

    // Direct disp16 reference for mod = 00, rm = 110.
    if mod_ == 0 && rm == 6 {
        let disp = rd.read_u16()?;
        return Ok(Operand::Mem(apply_override(
            MemRef {
                size,
                segment: Reg::DS,
                base: Reg::NONE,
                index: Reg::NONE,
                scale: 1,
                disp: disp.into(),
            },
            prefixes,
        )));
    }

    // The eight base/index pairs; BP-based addressing defaults to SS.
    let (segment, base, index) = match rm {
        0 => (Reg::DS, Reg::BX, Reg::SI),
        1 => (Reg::DS, Reg::BX, Reg::DI),
        2 => (Reg::SS, Reg::BP, Reg::SI),
        3 => (Reg::SS, Reg::BP, Reg::DI),
        4 => (Reg::DS, Reg::SI, Reg::NONE),
        5 => (Reg::DS, Reg::DI, Reg::NONE),
        6 => (Reg::SS, Reg::BP, Reg::NONE),
        _ => (Reg::DS, Reg::BX, Reg::NONE),
    };
    let disp = match mod_ {
        1 => rd.read_u8()? as i8 as i32,
        2 => rd.read_u16()? as i32,
        _ => 0,
    };
    Ok(Operand::Mem(apply_override(
        MemRef {
            size,
            segment,
            base,
            index,
            scale: 1,
            disp,
        },
        prefixes,
    )))
}

/// Direct memory operand (`Ob`/`Ov`): no ModR/M, the displacement is a
/// word (16-bit mode) or dword, and the segment defaults to DS.
fn direct_mem(
    rd: &mut InsnReader,
    size: OprSize,
    prefixes: Prefixes,
    mode: CpuMode,
) -> Result<Operand, InvalidInstruction> {
    let disp = match mode {
        CpuMode::Bits16 => rd.read_u16()?.into(),
        _ => rd.read_u32()?,
    };
    Ok(Operand::Mem(apply_override(
        MemRef {
            size,
            segment: Reg::DS,
            base: Reg::NONE,
            index: Reg::NONE,
            scale: 1,
            disp: disp as i32,
        },
        prefixes,
    )))
}

fn apply_override(mut mem: MemRef, prefixes: Prefixes) -> MemRef {
    if let Some(seg) = prefixes.segment_override() {
        mem.segment = seg;
    }
    mem
}
