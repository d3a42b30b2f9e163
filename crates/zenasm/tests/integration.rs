//! End-to-end tests: source text or hand-built listings in, bytes out.

use zenasm::{
    assemble, assemble_elf, elf, AsmError, Assembler, Directive, Instruction, Listing, Operand,
    ResourceLimits, SectionEntry, SymbolKind,
};

fn reg(name: &str) -> Operand {
    Operand::reg(name).unwrap()
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

// ============================================================================
// Source programs
// ============================================================================

#[test]
fn function_prologue_and_epilogue() {
    let src = "
        bits 64
        section .text
        global square
    square:
        push rbp
        mov rbp, rsp
        mov [rsp], rdi      ; spill
        mov rax, [rsp]
        pop rbp
    ";
    let code = assemble(src).unwrap();
    assert_eq!(
        code,
        vec![
            0x55, // push rbp
            0x48, 0x89, 0xE5, // mov rbp, rsp
            0x48, 0x89, 0x3C, 0x24, // mov [rsp], rdi
            0x48, 0x8B, 0x04, 0x24, // mov rax, [rsp]
            0x5D, // pop rbp
        ]
    );
}

#[test]
fn empty_and_comment_only_sources() {
    assert_eq!(assemble("").unwrap(), Vec::<u8>::new());
    assert_eq!(assemble("; nothing here\n\n   \n").unwrap(), Vec::<u8>::new());
}

#[test]
fn labels_record_offsets() {
    let mut asm = Assembler::new();
    asm.emit("start:\n  push rax\n  add rax, 200\nmiddle: pop rax\nend:")
        .unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.len(), 1 + 6 + 1);
    assert_eq!(
        result.labels(),
        &[
            (String::from("start"), 0),
            (String::from("middle"), 7),
            (String::from("end"), 8),
        ]
    );
    assert_eq!(result.label_address("middle"), Some(7));
    assert_eq!(result.label_address("nowhere"), None);
}

#[test]
fn multiple_sections_share_one_buffer() {
    let src = "section .text\npush rax\nsection .other\npop rbx\nsection .text\npush rcx";
    assert_eq!(assemble(src).unwrap(), vec![0x50, 0x5B, 0x51]);
}

#[test]
fn emit_can_be_called_repeatedly() {
    let mut asm = Assembler::new();
    asm.emit("global f").unwrap();
    asm.emit("section .text").unwrap();
    asm.emit("f: push rbp").unwrap();
    asm.emit("pop rbp").unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.bytes(), &[0x55, 0x5D]);
    assert_eq!(result.label_address("f"), Some(0));
    assert_eq!(
        result.symbols().get("f").unwrap().kind,
        SymbolKind::Exported
    );
}

#[test]
fn symbol_ordinals_follow_first_reference() {
    let mut asm = Assembler::new();
    asm.emit("extern puts\nglobal main\nmain:\nhelper:\nglobal helper")
        .unwrap();
    let result = asm.finish().unwrap();
    let names: Vec<(&str, usize, SymbolKind)> = result
        .symbols()
        .iter()
        .map(|s| (s.name.as_str(), s.index, s.kind))
        .collect();
    assert_eq!(
        names,
        vec![
            ("puts", 0, SymbolKind::Imported),
            ("main", 1, SymbolKind::Exported),
            ("helper", 2, SymbolKind::Exported),
        ]
    );
}

// ============================================================================
// Hand-built listings
// ============================================================================

#[test]
fn assemble_listing_directly() {
    let listing = Listing {
        directives: vec![
            Directive::Global {
                name: String::from("entry"),
            },
            Directive::Section {
                name: String::from(".text"),
                entries: vec![
                    SectionEntry::Label {
                        name: String::from("entry"),
                    },
                    SectionEntry::Instruction(Instruction::new("push", vec![reg("r8")])),
                    SectionEntry::Data {
                        bytes: vec![0xCC, 0xCC],
                    },
                    SectionEntry::Instruction(Instruction::new(
                        "mov",
                        vec![Operand::disp(0x10), reg("rax")],
                    )),
                ],
            },
        ],
    };

    let mut asm = Assembler::new();
    asm.assemble(&listing).unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(
        result.bytes(),
        &[0x41, 0x50, 0x48, 0x89, 0x04, 0x25, 0x10, 0x00, 0x00, 0x00]
    );
    assert_eq!(result.label_address("entry"), Some(0));
}

#[test]
fn unknown_register_in_ast_is_fatal() {
    let instr = Instruction::new(
        "push",
        vec![Operand::Register(zenasm::Register::with_size(
            "rzz",
            zenasm::OperandSize::Qword,
        ))],
    );
    let mut asm = Assembler::new();
    let err = asm.assemble(&SectionEntry::Instruction(instr)).unwrap_err();
    assert_eq!(
        err,
        AsmError::InvalidRegister {
            name: String::from("rzz")
        }
    );
    assert!(err.is_fatal());
}

#[test]
fn wide_displacement_in_ast_is_fatal() {
    let instr = Instruction::new(
        "mov",
        vec![
            Operand::Memory(zenasm::Address::Displacement(zenasm::Immediate::Imm64(
                1 << 40,
            ))),
            reg("rax"),
        ],
    );
    let mut asm = Assembler::new();
    let err = asm.assemble(&SectionEntry::Instruction(instr)).unwrap_err();
    assert!(matches!(err, AsmError::MissingDisplacement { .. }));
    assert!(err.is_fatal());
}

#[test]
fn bare_operand_is_unsupported() {
    let mut asm = Assembler::new();
    let err = asm.assemble(&reg("rax")).unwrap_err();
    assert_eq!(err.to_string(), "unsupported AST node: operand");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn unknown_mnemonic() {
    let err = assemble("nop").unwrap_err();
    assert_eq!(err.to_string(), "instruction `nop` not supported");
}

#[test]
fn operand_combination_without_encoding() {
    let err = assemble("add rax, [rbx], 1").unwrap_err();
    assert!(matches!(err, AsmError::EncodingNotFound { .. }));
    let err = assemble("mov [rax], [rbx]").unwrap_err();
    assert!(matches!(err, AsmError::EncodingNotFound { .. }));
}

#[test]
fn syntax_error_has_position() {
    let err = assemble("push rax\npush ]").unwrap_err();
    match err {
        AsmError::Syntax { span, .. } => assert_eq!(span.line, 2),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn symbol_operands_are_rejected() {
    let err = assemble("push some_label").unwrap_err();
    assert!(matches!(err, AsmError::Syntax { .. }));
    assert!(err.to_string().contains("some_label"));
}

#[test]
fn statement_limit_counts_across_emits() {
    let mut asm = Assembler::new();
    asm.limits(ResourceLimits {
        max_statements: 3,
        ..ResourceLimits::default()
    });
    asm.emit("push rax\npush rbx").unwrap();
    asm.emit("push rcx").unwrap();
    let err = asm.emit("push rdx").unwrap_err();
    assert_eq!(
        err,
        AsmError::ResourceLimitExceeded {
            resource: String::from("statements"),
            limit: 3,
        }
    );
}

// ============================================================================
// ELF output
// ============================================================================

#[test]
fn elf_object_wraps_code() {
    let src = "global main\nextern puts\nsection .text\nmain:\npush rbp\nmov rbp, rsp\npop rbp";
    let obj = assemble_elf(src).unwrap();

    assert_eq!(&obj[..4], b"\x7FELF");
    assert_eq!(u16_at(&obj, 18), 0x3E);
    assert_eq!(u16_at(&obj, 60), 5);

    let text = 64 + usize::from(elf::TEXT_INDEX) * 64;
    let offset = u64_at(&obj, text + 24) as usize;
    let size = u64_at(&obj, text + 32) as usize;
    assert_eq!(&obj[offset..offset + size], &[0x55, 0x48, 0x89, 0xE5, 0x5D]);
}

#[test]
fn elf_from_result_matches_one_shot() {
    let src = "global f\nf: add rax, 1";
    let mut asm = Assembler::new();
    asm.emit(src).unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.to_elf(), assemble_elf(src).unwrap());
}

#[test]
fn elf_propagates_errors() {
    assert!(assemble_elf("add rcx, 200").is_err());
}
