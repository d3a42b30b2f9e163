#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz the one-shot assembler. It must never panic, only return Ok/Err.
    let _ = zenasm::assemble(data);
    let _ = zenasm::assemble_elf(data);

    // Fuzz the builder API with multiple emit calls (split on newlines),
    // with data emission and native 16-bit immediates switched on.
    let mut asm = zenasm::Assembler::new();
    asm.emit_data(true).imm16(zenasm::Imm16Encoding::Native16);
    for line in data.lines() {
        if asm.emit(line).is_err() {
            return;
        }
    }
    if let Ok(result) = asm.finish() {
        let _ = result.to_elf();
    }
});
