//! # zenasm — Table-Driven x86-64 Assembler
//!
//! `zenasm` turns a small NASM-flavoured subset of x86-64 assembly into
//! machine-code bytes. Every instruction is matched against a fixed table of
//! encoding definitions; immediates that fit no definition are widened until
//! one matches.
//!
//! ## Quick Start
//!
//! ```rust
//! use zenasm::assemble;
//!
//! let code = assemble("push rax\nmov rax, rbx\npop rbx").unwrap();
//! assert_eq!(code, vec![0x50, 0x48, 0x89, 0xD8, 0x5B]);
//! ```
//!
//! ## Features
//!
//! - **Table-driven** — `add`, `mov`, `push`, `pop` over 8/16/32/64-bit
//!   registers, `[reg]` and `[disp32]` memory, and immediates.
//! - **Immediate widening** — the narrowest immediate is tried first.
//! - **`no_std` + `alloc`** — embeddable in firmware, kernels, WASM.
//! - **ELF output** — wrap the code in an x86-64 relocatable object.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An assembler performs many narrowing / sign-changing casts between
// integer widths and uses dense hex literals without separators.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::manual_let_else,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

extern crate alloc;

/// Public assembler API: builder, options and `AssemblyResult`.
pub mod assembler;
/// ELF64 relocatable object writer.
pub mod elf;
/// x86-64 instruction encoder (prefixes, REX, ModR/M, SIB, displacement, immediate).
pub mod encoder;
/// Static encoding-definition table.
pub mod encoding;
/// Error types and source-span diagnostics.
pub mod error;
/// Intermediate representation: registers, immediates, operands, listings.
pub mod ir;
/// Zero-copy lexer (tokenizer) with span tracking.
pub mod lexer;
/// Intel-syntax parser producing a listing.
pub mod parser;
/// Encoding selection with immediate widening.
pub mod resolver;
/// Symbol table with import/export tracking.
pub mod symbol;

// Re-exports
pub use assembler::{Assembler, AssemblerOptions, AssemblyResult, ResourceLimits};
pub use encoder::{EncodeOptions, Imm16Encoding, InstrBytes};
pub use encoding::{EncodingDefinition, OperandShape};
pub use error::{AsmError, Span};
pub use ir::{
    Address, AstNode, Directive, Immediate, Instruction, Listing, Operand, OperandKind,
    OperandSize, Register, SectionEntry,
};
pub use resolver::Resolution;
pub use symbol::{Symbol, SymbolKind, SymbolTable};

use alloc::vec::Vec;

/// Assemble a string of assembly into machine code bytes.
///
/// Newlines separate statements; `;` starts a comment.
/// Labels are defined with a trailing colon: `start:`
///
/// # Errors
///
/// Returns [`AsmError`] if the input contains syntax errors, unknown
/// mnemonics, operand combinations with no encoding, or malformed operands.
///
/// # Examples
///
/// ```rust
/// use zenasm::assemble;
///
/// let code = assemble("add rax, 1").unwrap();
/// assert_eq!(code, vec![0x48, 0x83, 0xC0, 0x01]);
/// ```
pub fn assemble(source: &str) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    asm.emit(source)?;
    Ok(asm.finish()?.into_bytes())
}

/// Assemble a string and wrap the code in an ELF64 relocatable object.
///
/// `global` names defined by a label become defined global symbols;
/// `extern` names become undefined ones.
///
/// # Errors
///
/// Same as [`assemble`].
///
/// # Examples
///
/// ```rust
/// use zenasm::assemble_elf;
///
/// let obj = assemble_elf("global main\nsection .text\nmain:\npush rbp").unwrap();
/// assert_eq!(&obj[..4], b"\x7FELF");
/// ```
pub fn assemble_elf(source: &str) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    asm.emit(source)?;
    Ok(asm.finish()?.to_elf())
}
