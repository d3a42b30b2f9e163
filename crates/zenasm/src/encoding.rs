//! Encoding definition table.
//!
//! Every supported mnemonic maps to an ordered list of candidate encodings.
//! The resolver tries them in declaration order and the first structural
//! match wins, so more specific forms (short immediates, fixed-register
//! shortcuts) must come before the general ones.
//!
//! ## Adding a New Instruction
//!
//! 1. Add a `const` candidate list next to the existing ones.
//! 2. Insert it into [`ENCODINGS`], keeping the table sorted by mnemonic.
//! 3. Add a byte-exact test to `tests/x86_64.rs`.

use core::fmt;

use crate::ir::{OperandKind, OperandSize};

/// Requirement placed on one operand position by an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// Any operand of the given kind and width.
    Typed {
        /// Required kind.
        kind: OperandKind,
        /// Required width.
        size: OperandSize,
    },
    /// Exactly the named register.
    Fixed {
        /// Register name, e.g. `al`.
        name: &'static str,
        /// Register width.
        size: OperandSize,
    },
}

impl OperandShape {
    /// Kind reported for the shape; [`OperandKind::Fixed`] for fixed registers.
    pub fn kind(&self) -> OperandKind {
        match self {
            OperandShape::Typed { kind, .. } => *kind,
            OperandShape::Fixed { .. } => OperandKind::Fixed,
        }
    }

    /// Required width.
    pub fn size(&self) -> OperandSize {
        match self {
            OperandShape::Typed { size, .. } | OperandShape::Fixed { size, .. } => *size,
        }
    }

    /// Returns `true` for a fixed-register shape.
    pub fn is_fixed(&self) -> bool {
        matches!(self, OperandShape::Fixed { .. })
    }
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandShape::Typed { kind, size } => {
                let prefix = match kind {
                    OperandKind::Register => "r",
                    OperandKind::Memory => "m",
                    OperandKind::Immediate => "imm",
                    OperandKind::Fixed => "fixed",
                };
                write!(f, "{}{}", prefix, size.bits())
            }
            OperandShape::Fixed { name, .. } => f.write_str(name),
        }
    }
}

/// One legal machine encoding of a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingDefinition {
    /// Opcode bytes, including any leading `0x66` operand-size prefix.
    pub opcode: &'static [u8],
    /// Shape of each operand position.
    pub operands: &'static [OperandShape],
    /// The first operand's register is added to the last opcode byte and
    /// no ModR/M byte is emitted.
    pub opcode_reg: bool,
    /// REX.W is required.
    pub rex_w: bool,
}

impl EncodingDefinition {
    const fn new(opcode: &'static [u8], operands: &'static [OperandShape]) -> Self {
        Self {
            opcode,
            operands,
            opcode_reg: false,
            rex_w: false,
        }
    }

    const fn w(mut self) -> Self {
        self.rex_w = true;
        self
    }

    const fn plus_reg(mut self) -> Self {
        self.opcode_reg = true;
        self
    }
}

impl fmt::Display for EncodingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.opcode.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        if self.opcode_reg {
            f.write_str("+r")?;
        }
        for (i, shape) in self.operands.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write!(f, "{}", shape)?;
        }
        if self.rex_w {
            f.write_str(" (REX.W)")?;
        }
        Ok(())
    }
}

// ─── Shapes ─────────────────────────────────────────────────────────────────

const fn typed(kind: OperandKind, size: OperandSize) -> OperandShape {
    OperandShape::Typed { kind, size }
}

const R16: OperandShape = typed(OperandKind::Register, OperandSize::Word);
const R32: OperandShape = typed(OperandKind::Register, OperandSize::Dword);
const R64: OperandShape = typed(OperandKind::Register, OperandSize::Qword);
const M16: OperandShape = typed(OperandKind::Memory, OperandSize::Word);
const M32: OperandShape = typed(OperandKind::Memory, OperandSize::Dword);
const M64: OperandShape = typed(OperandKind::Memory, OperandSize::Qword);
const IMM8: OperandShape = typed(OperandKind::Immediate, OperandSize::Byte);
const IMM16: OperandShape = typed(OperandKind::Immediate, OperandSize::Word);
const IMM32: OperandShape = typed(OperandKind::Immediate, OperandSize::Dword);

const AL: OperandShape = OperandShape::Fixed {
    name: "al",
    size: OperandSize::Byte,
};
const AX: OperandShape = OperandShape::Fixed {
    name: "ax",
    size: OperandSize::Word,
};
const EAX: OperandShape = OperandShape::Fixed {
    name: "eax",
    size: OperandSize::Dword,
};
const RAX: OperandShape = OperandShape::Fixed {
    name: "rax",
    size: OperandSize::Qword,
};

// ─── Candidate lists ────────────────────────────────────────────────────────

type Def = EncodingDefinition;

const ADD: &[EncodingDefinition] = &[
    Def::new(&[0x66, 0x83], &[R16, IMM8]),
    Def::new(&[0x83], &[R32, IMM8]),
    Def::new(&[0x83], &[R64, IMM8]).w(),
    Def::new(&[0x04], &[AL, IMM8]),
    Def::new(&[0x66, 0x05], &[AX, IMM16]),
    Def::new(&[0x05], &[EAX, IMM32]),
    Def::new(&[0x05], &[RAX, IMM32]).w(),
    Def::new(&[0x01], &[M64, R64]).w(),
    Def::new(&[0x01], &[M32, R32]),
    Def::new(&[0x66, 0x01], &[M16, R16]),
    Def::new(&[0x03], &[R64, M64]).w(),
    Def::new(&[0x03], &[R32, M32]),
    Def::new(&[0x66, 0x03], &[R16, M16]),
];

const MOV: &[EncodingDefinition] = &[
    Def::new(&[0xB8], &[R64, IMM32]).plus_reg(),
    Def::new(&[0x89], &[M64, R64]).w(),
    Def::new(&[0x8B], &[R64, M64]).w(),
    Def::new(&[0xC7], &[R64, IMM32]).w(),
    Def::new(&[0xC7], &[R32, IMM32]),
    Def::new(&[0x66, 0xC7], &[R16, IMM16]),
];

const POP: &[EncodingDefinition] = &[
    Def::new(&[0x66, 0x58], &[R16]).plus_reg(),
    Def::new(&[0x58], &[R32]).plus_reg(),
    Def::new(&[0x58], &[R64]).plus_reg(),
];

const PUSH: &[EncodingDefinition] = &[
    Def::new(&[0x66, 0x50], &[R16]).plus_reg(),
    Def::new(&[0x50], &[R32]).plus_reg(),
    Def::new(&[0x50], &[R64]).plus_reg(),
    Def::new(&[0x6A], &[IMM8]),
    Def::new(&[0x68], &[IMM16]),
    Def::new(&[0x68], &[IMM32]),
];

/// Mnemonic → candidate encodings, in match priority order.
/// Sorted by mnemonic for binary search lookup.
pub const ENCODINGS: &[(&str, &[EncodingDefinition])] = &[
    ("add", ADD),
    ("mov", MOV),
    ("pop", POP),
    ("push", PUSH),
];

/// Candidate encodings for `mnemonic`, in match priority order.
///
/// Unknown mnemonics yield an empty slice; reporting the failure is the
/// resolver's job.
#[inline]
pub fn lookup(mnemonic: &str) -> &'static [EncodingDefinition] {
    ENCODINGS
        .binary_search_by_key(&mnemonic, |&(m, _)| m)
        .map(|i| ENCODINGS[i].1)
        .unwrap_or(&[])
}

/// Every mnemonic the table knows, in sorted order.
pub fn mnemonics() -> impl Iterator<Item = &'static str> {
    ENCODINGS.iter().map(|&(m, _)| m)
}
