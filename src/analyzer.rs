//! Worklist-driven recursive-traversal analysis of an executable
//! image.

use serde::Serialize;

use crate::attr::{AttrMap, ByteAttr, ByteType};
use crate::decode;
use crate::format::{format_insn, FormatFlags};
use crate::insn::{CpuMode, Instruction, MemRef, Mnemonic, Operand, OprSize, Reg};
use crate::xref::{lower_bound, Xref, XrefKind};
use crate::FarPtr;

/// Outcome of trying to decode one instruction at a position.
enum DecodeStatus {
    /// Decoded and committed to the attribute map.
    Ok(Instruction, u16),
    /// The byte is the known start of an instruction.
    AlreadyAnalyzed,
    /// The byte, or the decoded instruction, runs into data.
    UnexpectedData,
    /// The byte, or the decoded instruction, runs into the middle of
    /// existing code.
    UnexpectedCode,
    /// The bytes do not form a valid instruction.
    BadInstruction,
}

/// What the flow interpretation of an instruction means for the
/// current block.
enum FlowAction {
    Continue,
    FinishBlock,
    DynamicJump,
    DynamicCall,
    Failed,
}

/// A jump table discovered during traversal: the jump instruction, the
/// first table entry, and the next unexamined entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct JumpTable {
    pub insn_pos: FarPtr,
    pub start: FarPtr,
    pub cursor: FarPtr,
}

/// Events worth reporting to the user. None of them aborts the
/// analysis; each only ends the block it occurred in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    JumpIntoData { pos: FarPtr },
    JumpIntoCode { pos: FarPtr },
    BadInstruction { pos: FarPtr },
    DynamicJump { pos: FarPtr, text: String },
    DynamicCall { pos: FarPtr, text: String },
    FlowFailed { pos: FarPtr },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::JumpIntoData { pos } => {
                write!(f, "{pos}  Jump into data!")
            }
            Diagnostic::JumpIntoCode { pos } => {
                write!(f, "{pos}  Jump into the middle of code!")
            }
            Diagnostic::BadInstruction { pos } => {
                write!(f, "{pos}  Bad instruction!")
            }
            Diagnostic::DynamicJump { pos, text }
            | Diagnostic::DynamicCall { pos, text } => {
                write!(f, "{pos}  {text:<32} ; dynamic analysis required")
            }
            Diagnostic::FlowFailed { pos } => {
                write!(f, "{pos}  Flow analysis failed")
            }
        }
    }
}

/// Classification counts over the image, taken after analysis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub image_size: usize,
    pub code_bytes: usize,
    pub data_bytes: usize,
    pub instructions: usize,
    pub jump_tables: usize,
}

/// Recursive-traversal disassembler state for one image.
///
/// The xref vector doubles as the worklist: traversal iterates it by
/// index while appending newly discovered targets, so recursion depth
/// stays constant regardless of program size. Growth is monotone;
/// nothing is ever removed.
pub struct Analyzer<'a> {
    image: &'a [u8],
    attrs: AttrMap,
    xrefs: Vec<Xref>,
    jump_tables: Vec<JumpTable>,
    diags: Vec<Diagnostic>,
}

impl<'a> Analyzer<'a> {
    pub fn new(image: &'a [u8]) -> Self {
        Self {
            image,
            attrs: AttrMap::new(),
            xrefs: Vec::new(),
            jump_tables: Vec::new(),
            diags: Vec::new(),
        }
    }

    /// Analyze the image starting from a user-supplied entry point,
    /// then walk any jump tables found on the way. On return the xref
    /// list is sorted by `(target, source)` linear address.
    pub fn analyze(&mut self, entry: FarPtr) {
        let first_table = self.jump_tables.len();
        self.analyze_block(Xref::user_entry(entry));
        self.process_jump_tables(first_table);
        self.xrefs.sort_unstable_by_key(Xref::sort_key);
    }

    /// Process the worklist from one seed entry: pop positions, decode
    /// linearly until a block terminator, and append every discovered
    /// target for later processing.
    fn analyze_block(&mut self, entry: Xref) {
        let mut i = self.xrefs.len();
        self.xrefs.push(entry);
        while i < self.xrefs.len() {
            let mut pos = self.xrefs[i].target;
            loop {
                match self.decode_instruction(pos) {
                    DecodeStatus::AlreadyAnalyzed => break,
                    DecodeStatus::UnexpectedData => {
                        self.diags.push(Diagnostic::JumpIntoData { pos });
                        break;
                    }
                    DecodeStatus::UnexpectedCode => {
                        self.diags.push(Diagnostic::JumpIntoCode { pos });
                        break;
                    }
                    DecodeStatus::BadInstruction => {
                        self.diags.push(Diagnostic::BadInstruction { pos });
                        break;
                    }
                    DecodeStatus::Ok(insn, count) => {
                        match self.flow(pos, count, &insn) {
                            FlowAction::Continue => {
                                // The offset may wrap above 0xFFFF and
                                // walk off the intended block; allowed.
                                pos = pos.advanced(count);
                            }
                            FlowAction::FinishBlock => break,
                            FlowAction::DynamicJump => {
                                self.diags.push(Diagnostic::DynamicJump {
                                    pos,
                                    text: format_insn(
                                        &insn,
                                        FormatFlags::default(),
                                    ),
                                });
                                break;
                            }
                            FlowAction::DynamicCall => {
                                self.diags.push(Diagnostic::DynamicCall {
                                    pos,
                                    text: format_insn(
                                        &insn,
                                        FormatFlags::default(),
                                    ),
                                });
                                break;
                            }
                            FlowAction::Failed => {
                                self.diags
                                    .push(Diagnostic::FlowFailed { pos });
                                break;
                            }
                        }
                    }
                }
            }
            i += 1;
        }
    }

    /// Decode one instruction at `pos` and commit its byte range to
    /// the attribute map, unless the range conflicts with existing
    /// classification.
    fn decode_instruction(&mut self, pos: FarPtr) -> DecodeStatus {
        let b = pos.linear();
        let attr = self.attrs.get(b);
        match attr.byte_type() {
            ByteType::Data => return DecodeStatus::UnexpectedData,
            ByteType::Code => {
                return if attr.is_boundary() {
                    DecodeStatus::AlreadyAnalyzed
                } else {
                    DecodeStatus::UnexpectedCode
                };
            }
            ByteType::Unknown | ByteType::Pending => {}
        }

        let start = b as usize;
        if start >= self.image.len() || !self.attrs.contains(b) {
            return DecodeStatus::BadInstruction;
        }
        let Ok((insn, count)) =
            decode::decode(&self.image[start..], CpuMode::Bits16)
        else {
            return DecodeStatus::BadInstruction;
        };
        let count = count as u32;
        if !self.attrs.contains(b + count - 1) {
            return DecodeStatus::BadInstruction;
        }

        // The whole instruction must cover unprocessed bytes.
        for i in 1..count {
            let attr = self.attrs.get(b + i);
            if attr.is_processed() {
                return match attr.byte_type() {
                    ByteType::Code => DecodeStatus::UnexpectedCode,
                    _ => DecodeStatus::UnexpectedData,
                };
            }
        }

        for i in 0..count {
            self.attrs.mark_code(b + i);
        }
        self.attrs.set_boundary(b);
        DecodeStatus::Ok(insn, count as u16)
    }

    /// Interpret a control-transfer instruction: record xrefs and jump
    /// tables, and decide whether straight-line execution continues
    /// past it.
    fn flow(
        &mut self,
        pos: FarPtr,
        count: u16,
        insn: &Instruction,
    ) -> FlowAction {
        use Mnemonic::*;
        match insn.mnemonic {
            Jmp | Jmpn | Jmpf => match insn.operands[0] {
                Operand::Rel(rel) => {
                    self.push_xref(
                        pos,
                        relative_target(pos, count, rel.value),
                        XrefKind::UnconditionalJump,
                    );
                    FlowAction::FinishBlock
                }
                Operand::FarLit(target) => {
                    self.push_xref(pos, target, XrefKind::UnconditionalJump);
                    FlowAction::FinishBlock
                }
                Operand::Mem(mem) if is_jump_table(pos, count, &mem) => {
                    let start = pos.advanced(count);
                    self.jump_tables.push(JumpTable {
                        insn_pos: pos,
                        start,
                        cursor: start,
                    });
                    FlowAction::FinishBlock
                }
                _ => FlowAction::DynamicJump,
            },
            Retn | Retf | Iret | Hlt => FlowAction::FinishBlock,
            // A call is assumed to return; execution continues past it.
            Call | Callf => match insn.operands[0] {
                Operand::Rel(rel) => {
                    self.push_xref(
                        pos,
                        relative_target(pos, count, rel.value),
                        XrefKind::FunctionCall,
                    );
                    FlowAction::Continue
                }
                Operand::FarLit(target) => {
                    self.push_xref(pos, target, XrefKind::FunctionCall);
                    FlowAction::Continue
                }
                _ => FlowAction::DynamicCall,
            },
            Jo | Jno | Jb | Jnb | Je | Jne | Jbe | Jnbe | Js | Jns | Jp
            | Jnp | Jl | Jnl | Jle | Jnle | Jcxz => {
                match insn.operands[0] {
                    Operand::Rel(rel) => {
                        self.push_xref(
                            pos,
                            relative_target(pos, count, rel.value),
                            XrefKind::ConditionalJump,
                        );
                        FlowAction::Continue
                    }
                    // A well-formed Jcc always jumps to a relative
                    // address.
                    _ => FlowAction::Failed,
                }
            }
            _ => FlowAction::Continue,
        }
    }

    fn push_xref(&mut self, source: FarPtr, target: FarPtr, kind: XrefKind) {
        self.xrefs.push(Xref {
            source,
            target,
            kind,
        });
    }

    /// Walk the jump tables recorded from `index` on, consuming 16-bit
    /// little-endian entries until a read would overlap classified
    /// bytes. Traversing an entry's target can append further tables;
    /// the loop re-reads the list length.
    fn process_jump_tables(&mut self, mut index: usize) {
        while index < self.jump_tables.len() {
            let JumpTable { insn_pos, start, .. } = self.jump_tables[index];
            let mut cur = start;
            loop {
                let lin = cur.linear();
                if lin as usize + 1 >= self.image.len()
                    || !self.attrs.contains(lin + 1)
                {
                    break;
                }
                if self.attrs.get(lin).is_processed()
                    || self.attrs.get(lin + 1).is_processed()
                {
                    break;
                }
                let word = u16::from_le_bytes([
                    self.image[lin as usize],
                    self.image[lin as usize + 1],
                ]);
                self.attrs.mark_data(lin, true);
                self.attrs.mark_data(lin + 1, false);
                self.analyze_block(Xref {
                    source: insn_pos,
                    target: FarPtr::new(insn_pos.seg, word),
                    kind: XrefKind::IndirectJump,
                });
                cur = cur.advanced(2);
                self.jump_tables[index].cursor = cur;
            }
            index += 1;
        }
    }

    pub fn image(&self) -> &[u8] {
        self.image
    }

    pub fn byte_attr(&self, linear: u32) -> ByteAttr {
        self.attrs.get(linear)
    }

    pub fn attrs(&self) -> &AttrMap {
        &self.attrs
    }

    /// All xrefs, sorted by `(target, source)` after `analyze`.
    pub fn xrefs(&self) -> &[Xref] {
        &self.xrefs
    }

    /// Xrefs whose target is the given linear address, in ascending
    /// source order. Only meaningful after `analyze` has sorted the
    /// list.
    pub fn xrefs_to(&self, target: u32) -> impl Iterator<Item = &Xref> + '_ {
        let first = lower_bound(&self.xrefs, target);
        self.xrefs[first..]
            .iter()
            .take_while(move |x| x.target.linear() == target)
    }

    pub fn jump_tables(&self) -> &[JumpTable] {
        &self.jump_tables
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    /// Count classified bytes over the image.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            image_size: self.image.len(),
            jump_tables: self.jump_tables.len(),
            ..Stats::default()
        };
        let len = self.image.len().min(crate::attr::ADDRESS_SPACE);
        for b in 0..len {
            let attr = self.attrs.get(b as u32);
            match attr.byte_type() {
                ByteType::Code => {
                    stats.code_bytes += 1;
                    if attr.is_boundary() {
                        stats.instructions += 1;
                    }
                }
                ByteType::Data => stats.data_bytes += 1,
                ByteType::Unknown | ByteType::Pending => {}
            }
        }
        stats
    }
}

/// Target of a PC-relative transfer: the address after the instruction
/// plus the displacement, wrapping in the segment.
fn relative_target(pos: FarPtr, count: u16, rel: i32) -> FarPtr {
    pos.advanced(count.wrapping_add(rel as u16))
}

/// The one recognized jump-table idiom: `jmpn word ptr cs:[reg+disp]`
/// with no index register, where the displacement names the address
/// just past the instruction. The table sits at the dispatch point and
/// is indexed from zero, so the register is zero-based at run time.
/// Another compiler could emit a semantically identical jump through a
/// differently-shaped operand and be missed; this is a known limit.
fn is_jump_table(pos: FarPtr, count: u16, mem: &MemRef) -> bool {
    mem.size == OprSize::Word
        && mem.segment == Reg::CS
        && !mem.base.is_none()
        && mem.index.is_none()
        && mem.disp == i32::from(pos.off.wrapping_add(count))
}
