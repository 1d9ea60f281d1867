use rstest::rstest;

use std::fmt::Write;

use crate::analyzer::{Analyzer, Diagnostic};
use crate::attr::ByteType;
use crate::decode::decode;
use crate::format::{format_insn, FormatFlags};
use crate::insn::{
    CpuMode, Instruction, Mnemonic, Operand, OprSize, Reg, RegClass,
};
use crate::mz::MzFile;
use crate::xref::XrefKind;
use crate::FarPtr;

fn decode16(code: &[u8]) -> (Instruction, usize) {
    decode(code, CpuMode::Bits16).unwrap()
}

fn fmt16(code: &[u8]) -> String {
    let (insn, _) = decode16(code);
    format_insn(&insn, FormatFlags::default())
}

#[test]
fn decode_short_jump() {
    let code = [
        0xEB, // JMP rel8
        0x05, // +5
    ];
    let (insn, count) = decode16(&code);
    assert_eq!(count, 2);
    assert_eq!(insn.mnemonic, Mnemonic::Jmp);
    let Operand::Rel(rel) = insn.operands[0] else {
        panic!("expected relative operand: {:?}", insn.operands[0]);
    };
    assert_eq!(rel.value, 5);
    assert_eq!(rel.size, OprSize::Byte);
    assert!(insn.operands[1].is_none());
}

#[test]
fn decode_far_call() {
    let code = [
        0x9A, // CALLF Ap
        0x00, 0x10, // offset 1000h
        0x00, 0x20, // segment 2000h
    ];
    let (insn, count) = decode16(&code);
    assert_eq!(count, 5);
    assert_eq!(insn.mnemonic, Mnemonic::Callf);
    assert_eq!(
        insn.operands[0],
        Operand::FarLit(FarPtr::new(0x2000, 0x1000))
    );
}

#[test]
fn decode_group1_add_imm() {
    let code = [
        0x83, // group 1, Ev Ib
        0xC0, // mod=3 reg=0 (ADD) rm=0 (AX)
        0x05, // 5
    ];
    let (insn, count) = decode16(&code);
    assert_eq!(count, 3);
    assert_eq!(insn.mnemonic, Mnemonic::Add);
    assert_eq!(insn.operands[0], Operand::Reg(Reg::AX));
    let Operand::Imm(imm) = insn.operands[1] else {
        panic!("expected immediate");
    };
    assert_eq!((imm.value, imm.size), (5, OprSize::Byte));
    assert_eq!(format_insn(&insn, FormatFlags::default()), "add ax, 5");
}

#[test]
fn decode_fails_on_truncated_stream() {
    // incomplete MOV Gv, Ev
    assert!(decode(&[0x8B], CpuMode::Bits16).is_err());
    // lone opcode with missing rel8
    assert!(decode(&[0x74], CpuMode::Bits16).is_err());
    // empty input
    assert!(decode(&[], CpuMode::Bits16).is_err());
}

#[test]
fn decode_is_deterministic() {
    let code = [0x2E, 0xFF, 0xA7, 0x05, 0x03];
    let a = decode(&code, CpuMode::Bits16).unwrap();
    let b = decode(&code, CpuMode::Bits16).unwrap();
    assert_eq!(a, b);
}

#[test]
fn duplicate_prefix_in_group_fails() {
    // two group-1 prefixes
    assert!(decode(&[0xF0, 0xF2, 0x90], CpuMode::Bits16).is_err());
    // two segment overrides
    assert!(decode(&[0x2E, 0x3E, 0x90], CpuMode::Bits16).is_err());
    // one prefix per group is fine
    assert!(decode(&[0xF0, 0x2E, 0x66, 0x90], CpuMode::Bits16).is_ok());
}

#[test]
fn rex_bytes_are_inc_dec_in_16bit_mode() {
    let (insn, count) = decode16(&[0x40]); // INC eAX
    assert_eq!(count, 1);
    assert_eq!(insn.mnemonic, Mnemonic::Inc);
    assert_eq!(insn.operands[0], Operand::Reg(Reg::AX));
    let (insn, _) = decode16(&[0x4F]); // DEC eDI
    assert_eq!(insn.mnemonic, Mnemonic::Dec);
    assert_eq!(insn.operands[0], Operand::Reg(Reg::DI));
}

#[test]
fn modrm_base_index_pairs() {
    // MOV Gv, Ev over every rm with mod=0; reg field selects AX
    let cases: [(u8, &str); 8] = [
        (0x00, "mov ax, word ptr ds:[bx+si]"),
        (0x01, "mov ax, word ptr ds:[bx+di]"),
        (0x02, "mov ax, word ptr ss:[bp+si]"),
        (0x03, "mov ax, word ptr ss:[bp+di]"),
        (0x04, "mov ax, word ptr ds:[si]"),
        (0x05, "mov ax, word ptr ds:[di]"),
        (0x07, "mov ax, word ptr ds:[bx]"),
        // mod=1 for [bp], since mod=0 rm=6 is the direct form
        (0x46, "mov ax, word ptr ss:[bp]"),
    ];
    for (modrm, expected) in cases {
        let code = if modrm == 0x46 {
            vec![0x8B, 0x46, 0x00]
        } else {
            vec![0x8B, modrm]
        };
        assert_eq!(fmt16(&code), expected, "modrm {modrm:#04X}");
    }
}

#[test]
fn modrm_direct_and_displaced_memory() {
    // mod=0 rm=6: direct disp16, segment DS
    assert_eq!(
        fmt16(&[0x8B, 0x0E, 0x00, 0x30]),
        "mov cx, word ptr ds:[3000h]"
    );
    // mod=1: sign-extended disp8
    assert_eq!(fmt16(&[0x8B, 0x46, 0xFE]), "mov ax, word ptr ss:[bp-2]");
    // mod=2: disp16
    assert_eq!(
        fmt16(&[0x8B, 0x96, 0x34, 0x12]),
        "mov dx, word ptr ss:[bp+1234h]"
    );
}

#[test]
fn segment_override_applies_to_memory_operand() {
    let (insn, count) = decode16(&[0x2E, 0x8B, 0x07]); // CS: MOV AX, [BX]
    assert_eq!(count, 3);
    let Operand::Mem(mem) = insn.operands[1] else {
        panic!("expected memory operand");
    };
    assert_eq!(mem.segment, Reg::CS);
    assert_eq!(fmt16(&[0x2E, 0x8B, 0x07]), "mov ax, word ptr cs:[bx]");
}

#[test]
fn high_byte_registers() {
    // MOV Gb, Eb with reg=4 (AH) rm=0 (AL)
    assert_eq!(fmt16(&[0x8A, 0xE0]), "mov ah, al");
    // B4: MOV AH, Ib
    assert_eq!(fmt16(&[0xB4, 0x10]), "mov ah, 10h");
    assert!(Reg::byte_gpr(4).same_physical(Reg::AX));
    assert!(Reg::byte_gpr(0).same_physical(Reg::AX));
    assert_ne!(Reg::byte_gpr(4), Reg::byte_gpr(0));
    assert!(Reg::byte_gpr(4).is_hibyte());
    assert_eq!(Reg::byte_gpr(4).size(), OprSize::Byte);
    assert_eq!(Reg::byte_gpr(4).class(), RegClass::General);
}

#[test]
fn group2_shifts() {
    // D1 /4: SHL Ev, 1
    assert_eq!(fmt16(&[0xD1, 0xE3]), "shl bx, 1");
    // D2 /5: SHR Eb, CL
    assert_eq!(fmt16(&[0xD2, 0xE8]), "shr al, cl");
    // C1 /7: SAR Ev, Ib
    assert_eq!(fmt16(&[0xC1, 0xF8, 0x02]), "sar ax, 2");
    // /6 is unassigned
    assert!(decode(&[0xD1, 0xF3], CpuMode::Bits16).is_err());
}

#[test]
fn group3_widths_differ_between_f6_and_f7() {
    // F6 /4: MUL Eb, AL
    assert_eq!(fmt16(&[0xF6, 0xE3]), "mul bl, al");
    // F7 /4: MUL Ev, rAX
    assert_eq!(fmt16(&[0xF7, 0xE3]), "mul bx, ax");
    // F7 /0: TEST Ev, Iz
    assert_eq!(fmt16(&[0xF7, 0xC1, 0x34, 0x12]), "test cx, 1234h");
    // /1 is unassigned in both
    assert!(decode(&[0xF6, 0xC8], CpuMode::Bits16).is_err());
    assert!(decode(&[0xF7, 0xC8], CpuMode::Bits16).is_err());
}

#[test]
fn group4_is_byte_only() {
    assert_eq!(fmt16(&[0xFE, 0xC0]), "inc al");
    assert_eq!(fmt16(&[0xFE, 0xC9]), "dec cl");
    // slot 2 exists only in group 5
    assert!(decode(&[0xFE, 0xD0], CpuMode::Bits16).is_err());
}

#[test]
fn group5_slots() {
    assert_eq!(fmt16(&[0xFF, 0xC0]), "inc ax");
    assert_eq!(fmt16(&[0xFF, 0xD3]), "calln bx");
    assert_eq!(fmt16(&[0xFF, 0xE0]), "jmpn ax");
    assert_eq!(fmt16(&[0xFF, 0x27]), "jmpn word ptr ds:[bx]");
    // far forms require a memory operand
    assert_eq!(fmt16(&[0xFF, 0x1F]), "callf dword ptr ds:[bx]");
    assert!(decode(&[0xFF, 0xDF], CpuMode::Bits16).is_err());
    // slot 7 is empty
    assert!(decode(&[0xFF, 0xF8], CpuMode::Bits16).is_err());
}

#[test]
fn group11_mov_and_xbegin() {
    assert_eq!(
        fmt16(&[0xC7, 0x06, 0x00, 0x01, 0x34, 0x12]),
        "mov word ptr ds:[100h], 1234h"
    );
    assert_eq!(fmt16(&[0xC6, 0xF8, 0x05]), "xabort 5");
    let (insn, _) = decode16(&[0xC7, 0xF8, 0x10, 0x00]);
    assert_eq!(insn.mnemonic, Mnemonic::Xbegin);
    // other reg values are unassigned
    assert!(decode(&[0xC6, 0x08, 0x00], CpuMode::Bits16).is_err());
}

#[test]
fn literal_immediates() {
    assert_eq!(fmt16(&[0xCC]), "int 3");
    assert_eq!(fmt16(&[0xCD, 0x21]), "int 21h");
}

#[test]
fn direct_memory_offsets() {
    // A1: MOV rAX, Ov
    assert_eq!(fmt16(&[0xA1, 0x00, 0x02]), "mov ax, word ptr ds:[200h]");
    // A2: MOV Ob, AL with a segment override
    assert_eq!(
        fmt16(&[0x26, 0xA2, 0x10, 0x00]),
        "mov byte ptr es:[10h], al"
    );
}

#[test]
fn far_jump_literal() {
    assert_eq!(fmt16(&[0xEA, 0x00, 0x01, 0x00, 0x20]), "jmp 2000h:100h");
}

#[test]
fn unimplemented_operand_forms_fail() {
    // string operations (X/Y forms)
    assert!(decode(&[0xA4], CpuMode::Bits16).is_err());
    // PUSHF/POPF (Fv)
    assert!(decode(&[0x9C], CpuMode::Bits16).is_err());
    // two-byte escape and x87 escapes are unassigned
    assert!(decode(&[0x0F, 0x84], CpuMode::Bits16).is_err());
    assert!(decode(&[0xD8, 0xC0], CpuMode::Bits16).is_err());
}

#[test]
fn memory_only_forms_reject_registers() {
    // LEA Gv, Mp with mod=3
    assert!(decode(&[0x8D, 0xC0], CpuMode::Bits16).is_err());
    // LES Gz, Mp with mod=3
    assert!(decode(&[0xC4, 0xC0], CpuMode::Bits16).is_err());
    // BOUND Gv, Ma with mod=3
    assert!(decode(&[0x62, 0xC0], CpuMode::Bits16).is_err());
}

#[rstest]
#[case(0x70, Mnemonic::Jo)]
#[case(0x71, Mnemonic::Jno)]
#[case(0x72, Mnemonic::Jb)]
#[case(0x73, Mnemonic::Jnb)]
#[case(0x74, Mnemonic::Je)]
#[case(0x75, Mnemonic::Jne)]
#[case(0x76, Mnemonic::Jbe)]
#[case(0x77, Mnemonic::Jnbe)]
#[case(0x78, Mnemonic::Js)]
#[case(0x79, Mnemonic::Jns)]
#[case(0x7A, Mnemonic::Jp)]
#[case(0x7B, Mnemonic::Jnp)]
#[case(0x7C, Mnemonic::Jl)]
#[case(0x7D, Mnemonic::Jnl)]
#[case(0x7E, Mnemonic::Jle)]
#[case(0x7F, Mnemonic::Jnle)]
#[case(0xE3, Mnemonic::Jcxz)]
fn conditional_jumps_decode_as_relative(
    #[case] opcode: u8,
    #[case] mnemonic: Mnemonic,
) {
    let (insn, count) = decode16(&[opcode, 0xFE]); // rel8 = -2
    assert_eq!(count, 2);
    assert_eq!(insn.mnemonic, mnemonic);
    let Operand::Rel(rel) = insn.operands[0] else {
        panic!("expected relative operand");
    };
    assert_eq!(rel.value, -2);
}

#[test]
fn prefix_words_in_formatting() {
    assert_eq!(fmt16(&[0xF0, 0x01, 0x07]), "lock add word ptr ds:[bx], ax");
    assert_eq!(fmt16(&[0xF3, 0x90]), "rep nop");
    assert_eq!(fmt16(&[0xF2, 0x90]), "repnz nop");
}

#[test]
fn immediate_rendering_rules() {
    // decimal below 10
    assert_eq!(fmt16(&[0xB8, 0x05, 0x00]), "mov ax, 5");
    // hex from 10 up, leading 0 when the top nibble is a letter
    assert_eq!(fmt16(&[0xB8, 0x0A, 0x00]), "mov ax, 0ah");
    assert_eq!(fmt16(&[0xB8, 0x1A, 0x00]), "mov ax, 1ah");
    assert_eq!(fmt16(&[0xB8, 0xAB, 0x00]), "mov ax, 0abh");
    assert_eq!(fmt16(&[0xB8, 0x34, 0x12]), "mov ax, 1234h");
}

#[test]
fn upper_case_formatting() {
    let (insn, _) = decode16(&[0x8B, 0x46, 0xFE]);
    let text =
        format_insn(&insn, FormatFlags::INTEL | FormatFlags::UPPER);
    assert_eq!(text, "MOV AX, WORD PTR SS:[BP-2]");
    // immediates keep their canonical spelling
    let (insn, _) = decode16(&[0xB8, 0x34, 0x12]);
    let text = format_insn(&insn, FormatFlags::UPPER);
    assert_eq!(text, "MOV AX, 1234h");
}

#[test]
fn format_block_listing() {
    let code: &[u8] = &[
        0xB8, 0x34, 0x12, // mov ax, 1234h
        0x83, 0xC0, 0x05, // add ax, 5
        0x8B, 0x46, 0xFE, // mov ax, [bp-2]
        0x74, 0x02, // je +2
        0xC3, // retn
    ];
    let mut out = String::new();
    let mut off = 0;
    while off < code.len() {
        let (insn, count) = decode16(&code[off..]);
        writeln!(
            out,
            "{off:04X}  {}",
            format_insn(&insn, FormatFlags::default())
        )
        .unwrap();
        off += count;
    }
    insta::assert_snapshot!(out, @r"
    0000  mov ax, 1234h
    0003  add ax, 5
    0006  mov ax, word ptr ss:[bp-2]
    0009  je +2
    000B  retn
    ");
}

// --- analyzer ---

fn analyzed(image: &[u8], entry: FarPtr) -> Analyzer<'_> {
    let mut analyzer = Analyzer::new(image);
    analyzer.analyze(entry);
    analyzer
}

/// Every committed instruction is boundary-at-start, code and
/// processed throughout; every machine-generated xref points back at
/// an instruction start; the xref list is sorted.
fn assert_invariants(analyzer: &Analyzer) {
    for xref in analyzer.xrefs() {
        if xref.kind != XrefKind::UserSpecified {
            let attr = analyzer.byte_attr(xref.source.linear());
            assert_eq!(attr.byte_type(), ByteType::Code, "{xref:?}");
            assert!(attr.is_boundary(), "{xref:?}");
            assert!(attr.is_processed(), "{xref:?}");
        }
    }
    assert!(analyzer
        .xrefs()
        .windows(2)
        .all(|w| w[0].sort_key() <= w[1].sort_key()));
}

#[test]
fn analyze_short_jump_enqueues_target() {
    let mut image = vec![0x90u8; 0x200];
    image[0x100] = 0xEB; // jmp +5
    image[0x101] = 0x05;
    image[0x107] = 0xC3; // retn
    let analyzer = analyzed(&image, FarPtr::new(0, 0x100));

    let jump = analyzer
        .xrefs()
        .iter()
        .find(|x| x.kind == XrefKind::UnconditionalJump)
        .unwrap();
    assert_eq!(jump.source, FarPtr::new(0, 0x100));
    assert_eq!(jump.target, FarPtr::new(0, 0x107));

    // the jump covers two bytes; the skipped range stays unknown
    assert!(analyzer.byte_attr(0x100).is_boundary());
    assert_eq!(analyzer.byte_attr(0x101).byte_type(), ByteType::Code);
    assert!(!analyzer.byte_attr(0x101).is_boundary());
    assert_eq!(analyzer.byte_attr(0x103).byte_type(), ByteType::Unknown);
    assert!(analyzer.byte_attr(0x107).is_boundary());
    assert_invariants(&analyzer);
}

#[test]
fn analyze_far_call_continues_past_it() {
    let mut image = vec![0x90u8; 0x21010];
    image[0x200] = 0x9A; // callf 2000h:1000h
    image[0x201] = 0x00;
    image[0x202] = 0x10;
    image[0x203] = 0x00;
    image[0x204] = 0x20;
    image[0x205] = 0xC3; // retn
    image[0x21000] = 0xC3; // retn at the call target
    let analyzer = analyzed(&image, FarPtr::new(0, 0x200));

    let call = analyzer
        .xrefs()
        .iter()
        .find(|x| x.kind == XrefKind::FunctionCall)
        .unwrap();
    assert_eq!(call.target, FarPtr::new(0x2000, 0x1000));

    // execution is assumed to continue past the call
    assert!(analyzer.byte_attr(0x205).is_boundary());
    // and the callee got analyzed
    assert!(analyzer.byte_attr(0x21000).is_boundary());
    assert_eq!(analyzer.byte_attr(0x21000).byte_type(), ByteType::Code);
    assert_invariants(&analyzer);
}

#[test]
fn analyze_conditional_jump_and_fall_through() {
    let mut image = vec![0x00u8; 0x400];
    image[0x300] = 0x74; // je +2
    image[0x301] = 0x02;
    image[0x302] = 0x90; // nop
    image[0x303] = 0x90; // nop
    image[0x304] = 0xC3; // retn
    let analyzer = analyzed(&image, FarPtr::new(0, 0x300));

    for b in 0x300..0x305u32 {
        assert_eq!(
            analyzer.byte_attr(b).byte_type(),
            ByteType::Code,
            "{b:#X}"
        );
    }
    // decoding halted at the RET; the 00 bytes after it are untouched
    assert_eq!(analyzer.byte_attr(0x305).byte_type(), ByteType::Unknown);

    let cond = analyzer
        .xrefs()
        .iter()
        .find(|x| x.kind == XrefKind::ConditionalJump)
        .unwrap();
    assert_eq!(cond.target, FarPtr::new(0, 0x304));
    assert_invariants(&analyzer);
}

#[test]
fn analyze_recognizes_jump_table() {
    let mut image = vec![0x90u8; 0x310];
    // jmpn word ptr cs:[bx+305h]; 305h is the address after the
    // instruction, the shape the analyzer recognizes as a table jump
    image[0x300] = 0x2E;
    image[0x301] = 0xFF;
    image[0x302] = 0xA7;
    image[0x303] = 0x05;
    image[0x304] = 0x03;
    // two table entries
    image[0x305] = 0x09;
    image[0x306] = 0x03;
    image[0x307] = 0x0B;
    image[0x308] = 0x03;
    image[0x309] = 0xC3; // retn (first target)
    image[0x30A] = 0x90;
    image[0x30B] = 0xC3; // retn (second target)
    let analyzer = analyzed(&image, FarPtr::new(0, 0x300));

    assert_eq!(analyzer.jump_tables().len(), 1);
    let table = analyzer.jump_tables()[0];
    assert_eq!(table.insn_pos, FarPtr::new(0, 0x300));
    assert_eq!(table.start, FarPtr::new(0, 0x305));
    // the pass stopped at 309h, which traversal had marked as code
    assert_eq!(table.cursor, FarPtr::new(0, 0x309));

    // table words are data, boundary on the first byte of each
    for (b, boundary) in
        [(0x305, true), (0x306, false), (0x307, true), (0x308, false)]
    {
        let attr = analyzer.byte_attr(b);
        assert_eq!(attr.byte_type(), ByteType::Data, "{b:#X}");
        assert_eq!(attr.is_boundary(), boundary, "{b:#X}");
        assert!(attr.is_processed(), "{b:#X}");
    }

    let indirect: Vec<_> = analyzer
        .xrefs()
        .iter()
        .filter(|x| x.kind == XrefKind::IndirectJump)
        .collect();
    assert_eq!(indirect.len(), 2);
    assert_eq!(indirect[0].target, FarPtr::new(0, 0x309));
    assert_eq!(indirect[1].target, FarPtr::new(0, 0x30B));
    assert!(indirect
        .iter()
        .all(|x| x.source == FarPtr::new(0, 0x300)));

    assert!(analyzer.byte_attr(0x309).is_boundary());
    assert!(analyzer.byte_attr(0x30B).is_boundary());
    assert_eq!(analyzer.byte_attr(0x30A).byte_type(), ByteType::Unknown);
    assert_invariants(&analyzer);
}

#[test]
fn analyze_reports_bad_instruction_and_returns() {
    let image = [0x8B]; // truncated MOV
    let analyzer = analyzed(&image, FarPtr::new(0, 0));
    assert_eq!(
        analyzer.diagnostics(),
        &[Diagnostic::BadInstruction {
            pos: FarPtr::new(0, 0)
        }]
    );
    assert_eq!(analyzer.byte_attr(0).byte_type(), ByteType::Unknown);
    assert_eq!(analyzer.xrefs().len(), 1); // just the user entry
}

#[test]
fn analyze_reports_jump_into_middle_of_code() {
    let mut image = vec![0x90u8; 0x110];
    image[0x100] = 0xB8; // mov ax, 1234h
    image[0x101] = 0x34;
    image[0x102] = 0x12;
    image[0x103] = 0xEB; // jmp -4, into the mov's immediate
    image[0x104] = 0xFC;
    let analyzer = analyzed(&image, FarPtr::new(0, 0x100));
    assert!(analyzer
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::JumpIntoCode { pos } if *pos == FarPtr::new(0, 0x101))));
    assert_invariants(&analyzer);
}

#[test]
fn analyze_reports_jump_into_data() {
    let mut image = vec![0x90u8; 0x310];
    image[0x300] = 0x2E;
    image[0x301] = 0xFF;
    image[0x302] = 0xA7;
    image[0x303] = 0x05;
    image[0x304] = 0x03;
    image[0x305] = 0x09; // table entry -> 309h
    image[0x306] = 0x03;
    image[0x307] = 0x09; // table entry -> 309h again
    image[0x308] = 0x03;
    image[0x309] = 0xC3; // retn
    let mut analyzer = Analyzer::new(&image);
    analyzer.analyze(FarPtr::new(0, 0x300));
    // a later entry point landing on table data is a conflict
    analyzer.analyze(FarPtr::new(0, 0x305));
    assert!(analyzer
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::JumpIntoData { pos } if *pos == FarPtr::new(0, 0x305))));
}

#[test]
fn analyze_reports_instruction_overlapping_code() {
    let mut image = vec![0x90u8; 0x110];
    image[0x100] = 0x90; // nop
    image[0x101] = 0xC3; // retn
    image[0xFE] = 0xB8; // mov ax, imm16 would cover FEh..100h
    let mut analyzer = Analyzer::new(&image);
    analyzer.analyze(FarPtr::new(0, 0x100));
    analyzer.analyze(FarPtr::new(0, 0xFE));
    assert!(analyzer
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::JumpIntoCode { pos } if *pos == FarPtr::new(0, 0xFE))));
    // the conflicting instruction was not committed
    assert_eq!(analyzer.byte_attr(0xFE).byte_type(), ByteType::Unknown);
}

#[test]
fn analyze_reports_dynamic_jump_and_call() {
    let mut image = vec![0x90u8; 0x110];
    image[0x100] = 0xFF; // jmpn ax
    image[0x101] = 0xE0;
    let analyzer = analyzed(&image, FarPtr::new(0, 0x100));
    assert!(analyzer.diagnostics().iter().any(|d| matches!(
        d,
        Diagnostic::DynamicJump { pos, text }
            if *pos == FarPtr::new(0, 0x100) && text == "jmpn ax"
    )));

    let mut image = vec![0x90u8; 0x110];
    image[0x100] = 0xFF; // callf dword ptr ds:[bx]
    image[0x101] = 0x1F;
    let analyzer = analyzed(&image, FarPtr::new(0, 0x100));
    assert!(analyzer
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::DynamicCall { .. })));
}

#[test]
fn analyze_is_idempotent() {
    let mut image = vec![0x00u8; 0x400];
    image[0x300] = 0x74; // je +2
    image[0x301] = 0x02;
    image[0x302] = 0x90;
    image[0x303] = 0x90;
    image[0x304] = 0xC3;
    let mut analyzer = Analyzer::new(&image);
    analyzer.analyze(FarPtr::new(0, 0x300));
    let stats = analyzer.stats();
    let xref_count = analyzer.xrefs().len();
    let diag_count = analyzer.diagnostics().len();

    analyzer.analyze(FarPtr::new(0, 0x300));
    // no new work: the entry decodes as already analyzed
    assert_eq!(analyzer.stats(), stats);
    assert_eq!(analyzer.diagnostics().len(), diag_count);
    // only the repeated user entry was appended
    assert_eq!(analyzer.xrefs().len(), xref_count + 1);
    assert_eq!(
        analyzer
            .xrefs()
            .iter()
            .filter(|x| x.kind == XrefKind::UserSpecified)
            .count(),
        2
    );
}

#[test]
fn xref_enumeration_by_target() {
    let mut image = vec![0x90u8; 0x110];
    image[0x100] = 0x74; // je +4 -> 106h
    image[0x101] = 0x04;
    image[0x102] = 0xEB; // jmp +2 -> 106h
    image[0x103] = 0x02;
    image[0x106] = 0xC3; // retn
    let analyzer = analyzed(&image, FarPtr::new(0, 0x100));

    let hits: Vec<_> = analyzer.xrefs_to(0x106).collect();
    assert_eq!(hits.len(), 2);
    // ascending source order
    assert_eq!(hits[0].source, FarPtr::new(0, 0x100));
    assert_eq!(hits[0].kind, XrefKind::ConditionalJump);
    assert_eq!(hits[1].source, FarPtr::new(0, 0x102));
    assert_eq!(hits[1].kind, XrefKind::UnconditionalJump);

    assert_eq!(analyzer.xrefs_to(0x105).count(), 0);
    assert_invariants(&analyzer);
}

#[test]
fn stats_count_classified_bytes() {
    let mut image = vec![0x90u8; 0x310];
    image[0x300] = 0x2E;
    image[0x301] = 0xFF;
    image[0x302] = 0xA7;
    image[0x303] = 0x05;
    image[0x304] = 0x03;
    image[0x305] = 0x09;
    image[0x306] = 0x03;
    image[0x307] = 0x0B;
    image[0x308] = 0x03;
    image[0x309] = 0xC3;
    image[0x30B] = 0xC3;
    let analyzer = analyzed(&image, FarPtr::new(0, 0x300));
    let stats = analyzer.stats();
    assert_eq!(stats.image_size, 0x310);
    // jump (5 bytes) + two one-byte rets
    assert_eq!(stats.code_bytes, 7);
    assert_eq!(stats.instructions, 3);
    // two table words
    assert_eq!(stats.data_bytes, 4);
    assert_eq!(stats.jump_tables, 1);
}

// --- MZ container ---

fn build_mz(reg_cs: u16, reg_ip: u16, image: &[u8]) -> Vec<u8> {
    const HEADER_PARAGRAPHS: u16 = 2;
    let start = HEADER_PARAGRAPHS as usize * 16;
    let total = start + image.len();
    let page_count = total.div_ceil(512) as u16;
    let last_page_size = (total % 512) as u16;
    let mut words = [0u16; 14];
    words[0] = 0x5A4D; // "MZ"
    words[1] = last_page_size;
    words[2] = page_count;
    words[4] = HEADER_PARAGRAPHS;
    words[6] = 0xFFFF; // max_alloc
    words[8] = 0x100; // reg_sp
    words[10] = reg_ip;
    words[11] = reg_cs;
    words[12] = 0x1C; // reloc_off, right after the header
    let mut data = Vec::new();
    for word in words {
        data.extend_from_slice(&word.to_le_bytes());
    }
    data.resize(start, 0);
    data.extend_from_slice(image);
    data
}

#[test]
fn mz_parse_roundtrip() {
    let image = [0x90u8, 0xC3, 0x00, 0x00];
    let file = MzFile::parse(build_mz(0, 1, &image)).unwrap();
    assert_eq!(file.image(), &image);
    assert_eq!(file.image_size(), 4);
    assert_eq!(file.entry(), FarPtr::new(0, 1));
    assert_eq!(file.header().page_count, 1);
    assert_eq!(file.relocations().count(), 0);
}

#[test]
fn mz_accepts_swapped_signature() {
    let mut data = build_mz(0, 0, &[0xC3]);
    data[0] = 0x5A; // "ZM"
    data[1] = 0x4D;
    assert!(MzFile::parse(data).is_ok());
}

#[test]
fn mz_rejects_bad_input() {
    // wrong signature
    let mut data = build_mz(0, 0, &[0xC3]);
    data[0] = 0x58;
    assert!(MzFile::parse(data).is_err());
    // too short for a header
    assert!(MzFile::parse(vec![0x4D, 0x5A, 0x00]).is_err());
    // zero pages
    let mut data = build_mz(0, 0, &[0xC3]);
    data[4] = 0;
    data[5] = 0;
    assert!(MzFile::parse(data).is_err());
    // declared size beyond the file
    let mut data = build_mz(0, 0, &[0xC3]);
    data[4] = 0x10; // page_count = 16
    assert!(MzFile::parse(data).is_err());
}

#[test]
fn mz_relocation_entries() {
    let image = [0x90u8, 0xC3];
    let mut data = build_mz(0, 0, &image);
    // one relocation entry at reloc_off 1Ch: off=0001, seg=0000;
    // the header area has room for it (1Ch + 4 = 20h = start)
    data[6] = 1; // reloc_count
    data[0x1C] = 0x01;
    data[0x1D] = 0x00;
    data[0x1E] = 0x00;
    data[0x1F] = 0x00;
    let file = MzFile::parse(data).unwrap();
    let relocs: Vec<u32> = file.relocations().collect();
    assert_eq!(relocs, vec![1]);
}

#[test]
fn mz_to_analysis_end_to_end() {
    let mut image = vec![0x90u8; 0x10];
    image[0] = 0xEB; // jmp +3
    image[1] = 0x03;
    image[5] = 0xC3; // retn
    let file = MzFile::parse(build_mz(0, 0, &image)).unwrap();
    let mut analyzer = Analyzer::new(file.image());
    analyzer.analyze(file.entry());
    let jump = analyzer
        .xrefs()
        .iter()
        .find(|x| x.kind == XrefKind::UnconditionalJump)
        .unwrap();
    assert_eq!(jump.target, FarPtr::new(0, 5));
    assert!(analyzer.byte_attr(5).is_boundary());
}

// --- far pointers ---

#[test]
fn far_ptr_linear_addressing() {
    assert_eq!(FarPtr::new(0x2000, 0x1000).linear(), 0x21000);
    assert_eq!(FarPtr::new(0, 0x100).linear(), 0x100);
    // distinct far pointers may share a linear address
    assert_eq!(
        FarPtr::new(0x1000, 0).linear(),
        FarPtr::new(0x0FFF, 0x10).linear()
    );
    // offset wraps without touching the segment
    let p = FarPtr::new(0x1234, 0xFFFE).advanced(4);
    assert_eq!(p, FarPtr::new(0x1234, 0x0002));
    assert_eq!(FarPtr::new(0, 0x100).to_string(), "0000:0100");
}
