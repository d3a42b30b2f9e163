//! Intermediate representation: operands, instructions and the listing AST.
//!
//! Everything in here is plain data. Values are built by the parser (or by
//! hand), read by the resolver and encoder, and dropped at the end of a pass.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::AsmError;

// ─── Sizes and kinds ────────────────────────────────────────────────────────

/// Width of an operand.
///
/// Sizes are ordered, so `OperandSize::Byte < OperandSize::Qword`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandSize {
    /// No intrinsic width.
    None,
    /// 8-bit.
    Byte,
    /// 16-bit.
    Word,
    /// 32-bit.
    Dword,
    /// 64-bit.
    Qword,
}

impl OperandSize {
    /// Return the operand size in bits.
    pub fn bits(self) -> u16 {
        match self {
            OperandSize::None => 0,
            OperandSize::Byte => 8,
            OperandSize::Word => 16,
            OperandSize::Dword => 32,
            OperandSize::Qword => 64,
        }
    }
}

impl fmt::Display for OperandSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandSize::None => write!(f, "none"),
            OperandSize::Byte => write!(f, "byte"),
            OperandSize::Word => write!(f, "word"),
            OperandSize::Dword => write!(f, "dword"),
            OperandSize::Qword => write!(f, "qword"),
        }
    }
}

/// Coarse classification used when matching operands against encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandKind {
    /// General-purpose register.
    Register,
    /// `[reg]` or `[disp32]`.
    Memory,
    /// Immediate value.
    Immediate,
    /// One specific named register (only appears in encoding definitions).
    Fixed,
}

// ─── Registers ──────────────────────────────────────────────────────────────

/// General-purpose register table: name, hardware index, width.
/// Sorted by name for binary search lookup.
const REGISTERS: &[(&str, u8, OperandSize)] = &[
    ("ah", 4, OperandSize::Byte),
    ("al", 0, OperandSize::Byte),
    ("ax", 0, OperandSize::Word),
    ("bh", 7, OperandSize::Byte),
    ("bl", 3, OperandSize::Byte),
    ("bp", 5, OperandSize::Word),
    ("bpl", 5, OperandSize::Byte),
    ("bx", 3, OperandSize::Word),
    ("ch", 5, OperandSize::Byte),
    ("cl", 1, OperandSize::Byte),
    ("cx", 1, OperandSize::Word),
    ("dh", 6, OperandSize::Byte),
    ("di", 7, OperandSize::Word),
    ("dil", 7, OperandSize::Byte),
    ("dl", 2, OperandSize::Byte),
    ("dx", 2, OperandSize::Word),
    ("eax", 0, OperandSize::Dword),
    ("ebp", 5, OperandSize::Dword),
    ("ebx", 3, OperandSize::Dword),
    ("ecx", 1, OperandSize::Dword),
    ("edi", 7, OperandSize::Dword),
    ("edx", 2, OperandSize::Dword),
    ("esi", 6, OperandSize::Dword),
    ("esp", 4, OperandSize::Dword),
    ("r10", 10, OperandSize::Qword),
    ("r10b", 10, OperandSize::Byte),
    ("r10d", 10, OperandSize::Dword),
    ("r10l", 10, OperandSize::Byte),
    ("r10w", 10, OperandSize::Word),
    ("r11", 11, OperandSize::Qword),
    ("r11b", 11, OperandSize::Byte),
    ("r11d", 11, OperandSize::Dword),
    ("r11l", 11, OperandSize::Byte),
    ("r11w", 11, OperandSize::Word),
    ("r12", 12, OperandSize::Qword),
    ("r12b", 12, OperandSize::Byte),
    ("r12d", 12, OperandSize::Dword),
    ("r12l", 12, OperandSize::Byte),
    ("r12w", 12, OperandSize::Word),
    ("r13", 13, OperandSize::Qword),
    ("r13b", 13, OperandSize::Byte),
    ("r13d", 13, OperandSize::Dword),
    ("r13l", 13, OperandSize::Byte),
    ("r13w", 13, OperandSize::Word),
    ("r14", 14, OperandSize::Qword),
    ("r14b", 14, OperandSize::Byte),
    ("r14d", 14, OperandSize::Dword),
    ("r14l", 14, OperandSize::Byte),
    ("r14w", 14, OperandSize::Word),
    ("r15", 15, OperandSize::Qword),
    ("r15b", 15, OperandSize::Byte),
    ("r15d", 15, OperandSize::Dword),
    ("r15l", 15, OperandSize::Byte),
    ("r15w", 15, OperandSize::Word),
    ("r8", 8, OperandSize::Qword),
    ("r8b", 8, OperandSize::Byte),
    ("r8d", 8, OperandSize::Dword),
    ("r8l", 8, OperandSize::Byte),
    ("r8w", 8, OperandSize::Word),
    ("r9", 9, OperandSize::Qword),
    ("r9b", 9, OperandSize::Byte),
    ("r9d", 9, OperandSize::Dword),
    ("r9l", 9, OperandSize::Byte),
    ("r9w", 9, OperandSize::Word),
    ("rax", 0, OperandSize::Qword),
    ("rbp", 5, OperandSize::Qword),
    ("rbx", 3, OperandSize::Qword),
    ("rcx", 1, OperandSize::Qword),
    ("rdi", 7, OperandSize::Qword),
    ("rdx", 2, OperandSize::Qword),
    ("rsi", 6, OperandSize::Qword),
    ("rsp", 4, OperandSize::Qword),
    ("si", 6, OperandSize::Word),
    ("sil", 6, OperandSize::Byte),
    ("sp", 4, OperandSize::Word),
    ("spl", 4, OperandSize::Byte),
];

#[inline]
fn lookup_register(name: &str) -> Option<(u8, OperandSize)> {
    REGISTERS
        .binary_search_by_key(&name, |&(n, _, _)| n)
        .ok()
        .map(|i| (REGISTERS[i].1, REGISTERS[i].2))
}

/// A general-purpose register operand, identified by name.
///
/// The name is not validated on construction through [`Register::with_size`];
/// an unknown name only surfaces as [`AsmError::InvalidRegister`] when the
/// encoder asks for its hardware index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Register {
    /// Lowercase register name, e.g. `rax`, `r8d`.
    pub name: String,
    /// Register width.
    pub size: OperandSize,
}

impl Register {
    /// Parse a register name (case-insensitive), inferring its width.
    ///
    /// Returns `None` for anything that is not a general-purpose register.
    pub fn parse(name: &str) -> Option<Register> {
        let lower = name.to_ascii_lowercase();
        let (_, size) = lookup_register(&lower)?;
        Some(Register { name: lower, size })
    }

    /// Build a register with an explicit width and no name check.
    pub fn with_size(name: impl Into<String>, size: OperandSize) -> Register {
        Register {
            name: name.into(),
            size,
        }
    }

    /// Hardware index 0–15 shared by every width alias of the register.
    pub fn index(&self) -> Result<u8, AsmError> {
        lookup_register(&self.name)
            .map(|(index, _)| index)
            .ok_or_else(|| AsmError::InvalidRegister {
                name: self.name.clone(),
            })
    }

    /// Low three bits of the index, as they appear in ModR/M and opcodes.
    pub fn low_bits(&self) -> Result<u8, AsmError> {
        Ok(self.index()? & 0b111)
    }

    /// Whether the register is one of r8–r15 and needs a REX extension bit.
    pub fn is_extended(&self) -> Result<bool, AsmError> {
        Ok(self.index()? > 7)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ─── Immediates ─────────────────────────────────────────────────────────────

/// A signed immediate of a fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Immediate {
    /// 8-bit immediate.
    Imm8(i8),
    /// 16-bit immediate.
    Imm16(i16),
    /// 32-bit immediate.
    Imm32(i32),
    /// 64-bit immediate.
    Imm64(i64),
}

impl Immediate {
    /// The narrowest immediate holding `value`.
    pub fn fit(value: i64) -> Immediate {
        if let Ok(v) = i8::try_from(value) {
            Immediate::Imm8(v)
        } else if let Ok(v) = i16::try_from(value) {
            Immediate::Imm16(v)
        } else if let Ok(v) = i32::try_from(value) {
            Immediate::Imm32(v)
        } else {
            Immediate::Imm64(value)
        }
    }

    /// Sign-extended value.
    pub fn value(self) -> i64 {
        match self {
            Immediate::Imm8(v) => v as i64,
            Immediate::Imm16(v) => v as i64,
            Immediate::Imm32(v) => v as i64,
            Immediate::Imm64(v) => v,
        }
    }

    /// Declared width.
    pub fn size(self) -> OperandSize {
        match self {
            Immediate::Imm8(_) => OperandSize::Byte,
            Immediate::Imm16(_) => OperandSize::Word,
            Immediate::Imm32(_) => OperandSize::Dword,
            Immediate::Imm64(_) => OperandSize::Qword,
        }
    }

    /// Whether [`Immediate::widen`] would change the width.
    pub fn can_widen(self) -> bool {
        !matches!(self, Immediate::Imm64(_))
    }

    /// Same value, next width up: 8 → 16 → 32 → 64. A 64-bit immediate is
    /// returned unchanged.
    pub fn widen(self) -> Immediate {
        match self {
            Immediate::Imm8(v) => Immediate::Imm16(v as i16),
            Immediate::Imm16(v) => Immediate::Imm32(v as i32),
            Immediate::Imm32(v) => Immediate::Imm64(v as i64),
            Immediate::Imm64(v) => Immediate::Imm64(v),
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

// ─── Operands ───────────────────────────────────────────────────────────────

/// What a memory operand points at.
///
/// A memory operand can only wrap a register or a displacement, so nested
/// memory references cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Address {
    /// `[reg]`
    Register(Register),
    /// `[disp32]`; encoded as a 32-bit displacement whatever the declared width.
    Displacement(Immediate),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Register(reg) => write!(f, "[{}]", reg),
            Address::Displacement(disp) => write!(f, "[{}]", disp),
        }
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Register operand.
    Register(Register),
    /// Memory operand; always 64 bits wide.
    Memory(Address),
    /// Immediate operand.
    Immediate(Immediate),
}

impl Operand {
    /// Shorthand for a register operand parsed from `name`.
    pub fn reg(name: &str) -> Option<Operand> {
        Register::parse(name).map(Operand::Register)
    }

    /// Shorthand for the narrowest immediate holding `value`.
    pub fn imm(value: i64) -> Operand {
        Operand::Immediate(Immediate::fit(value))
    }

    /// Shorthand for `[disp32]`.
    pub fn disp(value: i32) -> Operand {
        Operand::Memory(Address::Displacement(Immediate::Imm32(value)))
    }

    /// Operand kind.
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Register(_) => OperandKind::Register,
            Operand::Memory(_) => OperandKind::Memory,
            Operand::Immediate(_) => OperandKind::Immediate,
        }
    }

    /// Operand width.
    pub fn size(&self) -> OperandSize {
        match self {
            Operand::Register(reg) => reg.size,
            Operand::Memory(_) => OperandSize::Qword,
            Operand::Immediate(imm) => imm.size(),
        }
    }

    /// The register named by the operand, directly or as a memory base.
    pub fn base_register(&self) -> Option<&Register> {
        match self {
            Operand::Register(reg) | Operand::Memory(Address::Register(reg)) => Some(reg),
            _ => None,
        }
    }

    /// Returns `true` if this is a memory operand.
    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Memory(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "{}", reg),
            Operand::Memory(addr) => write!(f, "{}", addr),
            Operand::Immediate(imm) => write!(f, "{}", imm),
        }
    }
}

// ─── Instructions ───────────────────────────────────────────────────────────

/// A single machine instruction: mnemonic plus ordered operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Bitness declared by the enclosing `bits` directive.
    pub bits: u8,
    /// Lowercase mnemonic.
    pub mnemonic: String,
    /// Operands in source order.
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// A 64-bit instruction. The mnemonic is lowercased.
    pub fn new(mnemonic: &str, operands: Vec<Operand>) -> Instruction {
        Instruction {
            bits: 64,
            mnemonic: mnemonic.to_ascii_lowercase(),
            operands,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", op)?;
            } else {
                write!(f, ", {}", op)?;
            }
        }
        Ok(())
    }
}

// ─── Listing AST ────────────────────────────────────────────────────────────

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Listing {
    /// Top-level directives in source order.
    pub directives: Vec<Directive>,
}

/// A top-level directive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Directive {
    /// `extern name`
    Extern {
        /// Imported symbol.
        name: String,
    },
    /// `global name`
    Global {
        /// Exported symbol.
        name: String,
    },
    /// `section name` and everything up to the next section.
    Section {
        /// Section name, e.g. `.text`. Empty for entries before any `section`.
        name: String,
        /// Entries in source order.
        entries: Vec<SectionEntry>,
    },
}

/// One line of section content.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectionEntry {
    /// A machine instruction.
    Instruction(Instruction),
    /// Raw bytes from `db`/`dw`/`dd`/`dq`.
    Data {
        /// Little-endian payload.
        bytes: Vec<u8>,
    },
    /// `name:`
    Label {
        /// Label name.
        name: String,
    },
}

/// Any node the assembler driver can be asked to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstNode<'a> {
    /// A whole listing.
    Listing(&'a Listing),
    /// A single directive.
    Directive(&'a Directive),
    /// A single section entry.
    Entry(&'a SectionEntry),
    /// A bare operand; operands only make sense inside an instruction.
    Operand(&'a Operand),
}

impl AstNode<'_> {
    /// Short name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AstNode::Listing(_) => "listing",
            AstNode::Directive(Directive::Extern { .. }) => "extern",
            AstNode::Directive(Directive::Global { .. }) => "global",
            AstNode::Directive(Directive::Section { .. }) => "section",
            AstNode::Entry(SectionEntry::Instruction(_)) => "instruction",
            AstNode::Entry(SectionEntry::Data { .. }) => "data",
            AstNode::Entry(SectionEntry::Label { .. }) => "label",
            AstNode::Operand(_) => "operand",
        }
    }
}

impl<'a> From<&'a Listing> for AstNode<'a> {
    fn from(node: &'a Listing) -> Self {
        AstNode::Listing(node)
    }
}

impl<'a> From<&'a Directive> for AstNode<'a> {
    fn from(node: &'a Directive) -> Self {
        AstNode::Directive(node)
    }
}

impl<'a> From<&'a SectionEntry> for AstNode<'a> {
    fn from(node: &'a SectionEntry) -> Self {
        AstNode::Entry(node)
    }
}

impl<'a> From<&'a Operand> for AstNode<'a> {
    fn from(node: &'a Operand) -> Self {
        AstNode::Operand(node)
    }
}
