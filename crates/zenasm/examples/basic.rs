//! Basic assembly example: demonstrates the one-shot and builder APIs.
//!
//! Run with: `cargo run --example basic`

use zenasm::{assemble, assemble_elf, Assembler, Imm16Encoding};

fn main() {
    println!("=== zenasm basic example ===\n");

    // --- One-shot assembly ---
    println!("1. One-shot assembly (add rax, 1):");
    let bytes = assemble("add rax, 1").unwrap();
    print_hex("   ", &bytes);

    // --- Builder API ---
    println!("\n2. Builder API (function prologue/epilogue):");
    let mut asm = Assembler::new();
    asm.emit(
        r#"
section .text
global entry
entry:
    push rbp
    mov rbp, rsp
    mov [rsp], rdi      ; spill the first argument
    add rsp, 8
body:
    mov rax, [rsp]
    pop rbp
"#,
    )
    .unwrap();

    let result = asm.finish().unwrap();
    print_hex("   ", result.bytes());

    println!("\n   Labels:");
    for (name, addr) in result.labels() {
        println!("   {}: 0x{:X}", name, addr);
    }

    println!("\n   Symbols:");
    for sym in result.symbols().iter() {
        println!("   #{} {} ({:?})", sym.index, sym.name, sym.kind);
    }

    // --- Immediate widening ---
    println!("\n3. Immediate widening:");
    for src in ["add rax, 1", "add rax, 200", "push 5", "push 100000"] {
        let bytes = assemble(src).unwrap();
        print!("   {:<14}", src);
        print_hex("", &bytes);
    }

    // --- 16-bit immediates ---
    println!("\n4. 16-bit immediates (legacy vs native):");
    print_hex("   legacy: ", &assemble("add ax, 1234").unwrap());
    let mut asm = Assembler::new();
    asm.imm16(Imm16Encoding::Native16);
    asm.emit("add ax, 1234").unwrap();
    print_hex("   native: ", asm.bytes());

    // --- Errors ---
    println!("\n5. Errors:");
    for src in ["add rcx, 200", "nop", "push some_label"] {
        match assemble(src) {
            Ok(bytes) => print_hex("   ", &bytes),
            Err(e) => println!("   {:<16} -> {}", src, e),
        }
    }

    // --- ELF ---
    println!("\n6. ELF relocatable object:");
    let obj = assemble_elf("global main\nextern puts\nmain:\npush rbp\npop rbp").unwrap();
    println!("   {} bytes, magic {:02X?}", obj.len(), &obj[..4]);
}

fn print_hex(prefix: &str, bytes: &[u8]) {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    println!("{}{}", prefix, hex.join(" "));
}
