#![cfg(not(target_arch = "wasm32"))]
//! Cross-validation tests: encode with zenasm, decode with iced-x86.
//!
//! Every encoding here is decoded by iced-x86 in 64-bit mode and checked
//! for the expected mnemonic, operands, and full-length consumption.
//! Encodings whose legacy serialization leaves trailing bytes (16-bit
//! immediates) are validated with [`Imm16Encoding::Native16`].

use iced_x86::{Decoder, DecoderOptions, Formatter, IntelFormatter, Mnemonic as IcedMnemonic};
use zenasm::{assemble, Assembler, Imm16Encoding};

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Decode exactly one instruction from `bytes`, return (mnemonic, formatted).
fn decode_one(source: &str, bytes: &[u8]) -> (IcedMnemonic, String) {
    assert!(!bytes.is_empty(), "empty output for `{source}`");

    let mut decoder = Decoder::with_ip(64, bytes, 0, DecoderOptions::NONE);
    let instr = decoder.decode();
    assert_ne!(
        instr.mnemonic(),
        IcedMnemonic::INVALID,
        "iced-x86 decoded INVALID for `{source}` → {:02X?}",
        bytes
    );
    assert_eq!(
        instr.len(),
        bytes.len(),
        "iced-x86 decoded {} bytes but zenasm emitted {} bytes for `{source}` → {:02X?}",
        instr.len(),
        bytes.len(),
        bytes
    );

    let mut formatter = IntelFormatter::new();
    let mut output = String::new();
    formatter.format(&instr, &mut output);
    (instr.mnemonic(), output)
}

/// Assemble one instruction with default options and decode it.
fn asm_and_decode(source: &str) -> (IcedMnemonic, String) {
    let bytes = assemble(source)
        .unwrap_or_else(|e| panic!("zenasm failed to assemble `{source}`: {e}"));
    decode_one(source, &bytes)
}

/// Assemble one instruction with native 16-bit immediates and decode it.
fn asm_and_decode_native16(source: &str) -> (IcedMnemonic, String) {
    let mut asm = Assembler::new();
    asm.imm16(Imm16Encoding::Native16);
    asm.emit(source)
        .unwrap_or_else(|e| panic!("zenasm failed to assemble `{source}`: {e}"));
    let bytes = asm.finish().unwrap().into_bytes();
    decode_one(source, &bytes)
}

/// Assemble + decode, then assert iced-x86 mnemonic matches expected.
fn verify_mnemonic(source: &str, expected: IcedMnemonic) {
    let (mnemonic, formatted) = asm_and_decode(source);
    assert_eq!(
        mnemonic, expected,
        "mnemonic mismatch for `{source}`: iced decoded `{formatted}`"
    );
}

/// Assemble + decode, then assert iced-x86 formatted output contains a substring.
fn verify_contains(source: &str, expected: IcedMnemonic, substring: &str) {
    let (mnemonic, formatted) = asm_and_decode(source);
    assert_eq!(
        mnemonic, expected,
        "mnemonic mismatch for `{source}`: iced decoded `{formatted}`"
    );
    let lower = formatted.to_lowercase();
    assert!(
        lower.contains(&substring.to_lowercase()),
        "`{source}` decoded as `{formatted}`, expected to contain `{substring}`"
    );
}

// ─── PUSH / POP ───────────────────────────────────────────────────────────────

#[test]
fn xv_push_r64() {
    for reg in [
        "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
        "r13", "r14", "r15",
    ] {
        verify_contains(&format!("push {reg}"), IcedMnemonic::Push, reg);
    }
}

#[test]
fn xv_pop_r64() {
    for reg in ["rax", "rbx", "rbp", "r8", "r12", "r15"] {
        verify_contains(&format!("pop {reg}"), IcedMnemonic::Pop, reg);
    }
}

#[test]
fn xv_push_r16() {
    verify_contains("push ax", IcedMnemonic::Push, "ax");
    verify_contains("push r9w", IcedMnemonic::Push, "r9w");
}

#[test]
fn xv_pop_r16() {
    verify_contains("pop cx", IcedMnemonic::Pop, "cx");
}

#[test]
fn xv_push_imm8() {
    verify_mnemonic("push 5", IcedMnemonic::Push);
    verify_mnemonic("push -1", IcedMnemonic::Push);
}

#[test]
fn xv_push_imm32() {
    // 200 selects the imm16 definition; the legacy 4-byte serialization is
    // exactly what `68 id` expects.
    verify_mnemonic("push 200", IcedMnemonic::Push);
    verify_mnemonic("push 100000", IcedMnemonic::Push);
}

#[test]
fn xv_push_imm16_native() {
    let (mnemonic, formatted) = asm_and_decode_native16("push 1000");
    assert_eq!(mnemonic, IcedMnemonic::Push, "decoded `{formatted}`");
    assert!(formatted.contains("3E8"), "decoded `{formatted}`");

    // The following instruction must survive intact.
    let mut asm = Assembler::new();
    asm.imm16(Imm16Encoding::Native16);
    asm.emit("push 1000\npop rax").unwrap();
    let bytes = asm.finish().unwrap().into_bytes();
    let mut decoder = Decoder::with_ip(64, &bytes, 0, DecoderOptions::NONE);
    let push = decoder.decode();
    let pop = decoder.decode();
    assert_eq!(push.mnemonic(), IcedMnemonic::Push);
    assert_eq!(push.len(), 4);
    assert_eq!(pop.mnemonic(), IcedMnemonic::Pop);
    assert_eq!(pop.len(), 1);
}

// ─── ADD ──────────────────────────────────────────────────────────────────────

#[test]
fn xv_add_r64_imm8() {
    verify_contains("add rax, 1", IcedMnemonic::Add, "rax");
    verify_contains("add rsp, 8", IcedMnemonic::Add, "rsp");
    verify_contains("add r11, 16", IcedMnemonic::Add, "r11");
}

#[test]
fn xv_add_r32_imm8() {
    verify_contains("add eax, 0", IcedMnemonic::Add, "eax");
}

#[test]
fn xv_add_r16_imm8() {
    verify_contains("add ax, 0", IcedMnemonic::Add, "ax");
    verify_contains("add r8w, 1", IcedMnemonic::Add, "r8w");
}

#[test]
fn xv_add_accumulator_forms() {
    verify_contains("add al, 5", IcedMnemonic::Add, "al");
    verify_contains("add eax, 200", IcedMnemonic::Add, "eax");
    verify_contains("add rax, 200", IcedMnemonic::Add, "rax");
}

#[test]
fn xv_add_ax_imm16_native() {
    let (mnemonic, formatted) = asm_and_decode_native16("add ax, 1234");
    assert_eq!(mnemonic, IcedMnemonic::Add);
    assert!(formatted.contains("ax"), "decoded as `{formatted}`");
}

#[test]
fn xv_add_reg_reg() {
    verify_contains("add rbx, rcx", IcedMnemonic::Add, "rbx,rcx");
    verify_contains("add ebx, ecx", IcedMnemonic::Add, "ebx,ecx");
    verify_contains("add bx, cx", IcedMnemonic::Add, "bx,cx");
}

#[test]
fn xv_add_memory() {
    verify_contains("add [rax], rbx", IcedMnemonic::Add, "[rax]");
    verify_contains("add r8, [r13]", IcedMnemonic::Add, "r13");
    verify_contains("add rcx, [rsp]", IcedMnemonic::Add, "[rsp]");
}

// ─── MOV ──────────────────────────────────────────────────────────────────────

#[test]
fn xv_mov_reg_reg() {
    verify_contains("mov rax, rbx", IcedMnemonic::Mov, "rax,rbx");
    verify_contains("mov rbp, rsp", IcedMnemonic::Mov, "rbp,rsp");
    verify_contains("mov r9, r10", IcedMnemonic::Mov, "r9,r10");
}

#[test]
fn xv_mov_store() {
    verify_contains("mov [rax], rbx", IcedMnemonic::Mov, "[rax]");
    verify_contains("mov [rsp], rax", IcedMnemonic::Mov, "[rsp]");
    verify_contains("mov [r12], rax", IcedMnemonic::Mov, "[r12]");
    verify_contains("mov [rbp], rax", IcedMnemonic::Mov, "rbp");
    verify_contains("mov [r13], rax", IcedMnemonic::Mov, "r13");
}

#[test]
fn xv_mov_load() {
    verify_contains("mov rax, [rbx]", IcedMnemonic::Mov, "[rbx]");
}

#[test]
fn xv_mov_absolute() {
    verify_contains("mov [12345], rax", IcedMnemonic::Mov, "rax");
    verify_contains("mov rax, [0x1000]", IcedMnemonic::Mov, "rax");
}

#[test]
fn xv_mov_r64_imm_is_32bit_move() {
    // The `B8+r` definition carries no REX.W, so the CPU sees a 32-bit move.
    verify_contains("mov rax, 1", IcedMnemonic::Mov, "eax");
    verify_contains("mov r8, 1", IcedMnemonic::Mov, "r8d");
}

#[test]
fn xv_mov_r32_imm() {
    verify_contains("mov eax, 1", IcedMnemonic::Mov, "eax");
}

#[test]
fn xv_mov_r16_imm_native() {
    let (mnemonic, formatted) = asm_and_decode_native16("mov ax, 1");
    assert_eq!(mnemonic, IcedMnemonic::Mov);
    assert!(formatted.contains("ax"), "decoded as `{formatted}`");
}

// ─── Whole programs ───────────────────────────────────────────────────────────

#[test]
fn xv_prologue_epilogue_stream() {
    let source = "push rbp\nmov rbp, rsp\nadd rsp, 8\nmov [rbp], rax\npop rbp";
    let bytes = assemble(source).unwrap();

    let mut decoder = Decoder::with_ip(64, &bytes, 0, DecoderOptions::NONE);
    let mnemonics: Vec<IcedMnemonic> = decoder.iter().map(|i| i.mnemonic()).collect();
    assert_eq!(
        mnemonics,
        vec![
            IcedMnemonic::Push,
            IcedMnemonic::Mov,
            IcedMnemonic::Add,
            IcedMnemonic::Mov,
            IcedMnemonic::Pop,
        ]
    );
}
