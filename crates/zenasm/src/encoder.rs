//! x86-64 instruction emitter.
//!
//! Turns a resolved instruction into bytes, in physical order:
//! legacy prefix, REX, opcode, ModR/M, SIB, displacement, immediate.
//!
//! Only the addressing forms the operand model can express are produced:
//! register-direct, `[reg]` and `[disp32]`. `[rsp]`/`[r12]` go through a SIB
//! byte, `[rbp]`/`[r13]` through a zero disp8, and `[disp32]` through the
//! no-base SIB form.

use alloc::vec::Vec;
use core::fmt;

use log::trace;

use crate::encoding::OperandShape;
use crate::error::AsmError;
use crate::ir::{Address, Immediate, Instruction, Operand};
use crate::resolver::{self, Resolution};

/// Operand-size override prefix.
const OPERAND_SIZE_PREFIX: u8 = 0x66;

/// Largest encoding this emitter can produce, rounded up.
const MAX_INSTR_LEN: usize = 24;

// ─── Options ────────────────────────────────────────────────────────────────

/// How 16-bit immediates are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Imm16Encoding {
    /// Four little-endian bytes, sign-extended. Byte-compatible with
    /// listings assembled by earlier releases.
    #[default]
    Legacy32,
    /// Two little-endian bytes, as the hardware decodes them under `0x66`.
    Native16,
}

/// Knobs that change the emitted bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodeOptions {
    /// 16-bit immediate serialization.
    pub imm16: Imm16Encoding,
}

// ─── InstrBytes: stack-allocated instruction buffer ─────────────────────────

/// Stack-allocated instruction byte buffer.
///
/// An instruction is assembled here first and only copied into the output
/// once it is complete, so a failed encoding never leaves partial bytes
/// behind.
#[derive(Clone)]
pub struct InstrBytes {
    data: [u8; MAX_INSTR_LEN],
    len: u8,
}

impl InstrBytes {
    /// Create an empty buffer.
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; MAX_INSTR_LEN],
            len: 0,
        }
    }

    /// Append a single byte.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already full.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        assert!(
            (self.len as usize) < MAX_INSTR_LEN,
            "InstrBytes overflow: cannot push beyond {} bytes",
            MAX_INSTR_LEN
        );
        self.data[self.len as usize] = byte;
        self.len += 1;
    }

    /// Append a slice of bytes.
    ///
    /// # Panics
    ///
    /// Panics if appending would exceed the buffer capacity.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let start = self.len as usize;
        let end = start + bytes.len();
        assert!(
            end <= MAX_INSTR_LEN,
            "InstrBytes overflow: {} + {} exceeds {}-byte capacity",
            start,
            bytes.len(),
            MAX_INSTR_LEN
        );
        self.data[start..end].copy_from_slice(bytes);
        self.len = end as u8;
    }

    /// Number of bytes in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert to a heap-allocated `Vec<u8>`.
    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_ref().to_vec()
    }
}

impl Default for InstrBytes {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for InstrBytes {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl AsRef<[u8]> for InstrBytes {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for InstrBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for InstrBytes {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for InstrBytes {}

impl PartialEq<[u8]> for InstrBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

impl PartialEq<Vec<u8>> for InstrBytes {
    fn eq(&self, other: &Vec<u8>) -> bool {
        **self == **other
    }
}

// ─── REX / ModR/M / SIB helpers ─────────────────────────────────────────────

/// Build a REX prefix byte. REX.X stays clear: addresses have no index register.
#[inline]
pub(crate) fn rex(w: bool, r: bool, b: bool) -> u8 {
    let mut val: u8 = 0x40;
    if w {
        val |= 0x08;
    }
    if r {
        val |= 0x04;
    }
    if b {
        val |= 0x01;
    }
    val
}

/// Whether a REX prefix with at least one flag is needed.
#[inline]
pub(crate) fn needs_rex(w: bool, r: bool, b: bool) -> bool {
    w || r || b
}

/// Build ModR/M byte.
#[inline]
pub(crate) fn modrm(mod_: u8, reg: u8, rm: u8) -> u8 {
    (mod_ << 6) | ((reg & 7) << 3) | (rm & 7)
}

/// Build SIB byte with scale 1.
#[inline]
pub(crate) fn sib(index: u8, base: u8) -> u8 {
    ((index & 7) << 3) | (base & 7)
}

/// SIB index value meaning "no index register".
const SIB_NO_INDEX: u8 = 0b100;
/// SIB base value meaning "no base, disp32 follows" when mod is `00`.
const SIB_NO_BASE: u8 = 0b101;

// ─── Emission ───────────────────────────────────────────────────────────────

/// Resolve and encode `instr`, appending its bytes to `out`.
///
/// Nothing is appended when an error is returned.
///
/// # Errors
///
/// Returns [`AsmError::EncodingNotFound`] if no encoding accepts the
/// instruction, and the fatal [`AsmError::InvalidRegister`] or
/// [`AsmError::MissingDisplacement`] for malformed operands.
pub fn emit(instr: &Instruction, out: &mut Vec<u8>, opts: &EncodeOptions) -> Result<(), AsmError> {
    let bytes = encode(instr, opts)?;
    trace!("{}: {:02X?}", instr, &*bytes);
    out.extend_from_slice(&bytes);
    Ok(())
}

/// Resolve and encode a single instruction.
pub fn encode(instr: &Instruction, opts: &EncodeOptions) -> Result<InstrBytes, AsmError> {
    let resolution = resolver::resolve(instr)?;
    encode_resolved(&resolution, opts)
}

/// Encode an instruction whose encoding has already been chosen.
pub fn encode_resolved(res: &Resolution, opts: &EncodeOptions) -> Result<InstrBytes, AsmError> {
    let def = res.definition;
    let mut buf = InstrBytes::new();

    // The memory operand, if any, always goes into ModR/M.rm.
    let mut op1 = res.operands.first();
    let mut shape1 = def.operands.first();
    let mut op2 = res.operands.get(1);
    let mut shape2 = def.operands.get(1);
    if op2.is_some_and(Operand::is_memory) {
        core::mem::swap(&mut op1, &mut op2);
        core::mem::swap(&mut shape1, &mut shape2);
    }

    // Legacy prefixes must precede REX.
    let prefix_len = def
        .opcode
        .iter()
        .take_while(|&&b| b == OPERAND_SIZE_PREFIX)
        .count();
    let (prefixes, opcode) = def.opcode.split_at(prefix_len);
    buf.extend_from_slice(prefixes);

    // A two-byte immediate is only decoded under the operand-size override.
    let native_imm16 = opts.imm16 == Imm16Encoding::Native16
        && res
            .operands
            .iter()
            .any(|op| matches!(op, Operand::Immediate(Immediate::Imm16(_))));
    if native_imm16 && prefixes.is_empty() {
        buf.push(OPERAND_SIZE_PREFIX);
    }

    let rex_b = is_extended(op1)?;
    let rex_r = is_extended(op2)?;
    if needs_rex(def.rex_w, rex_r, rex_b) {
        buf.push(rex(def.rex_w, rex_r, rex_b));
    }

    let rm = rm_bits(op1, shape1)?;
    if def.opcode_reg {
        if let Some((last, head)) = opcode.split_last() {
            buf.extend_from_slice(head);
            buf.push(last.wrapping_add(rm.unwrap_or(0)));
        }
    } else {
        buf.extend_from_slice(opcode);
        if let Some(rm) = rm {
            let reg = rm_bits(op2, shape2)?.unwrap_or(0);
            let mod_ = match op1 {
                Some(Operand::Memory(_)) if rm == 0b101 => 0b01,
                Some(Operand::Memory(_)) => 0b00,
                _ => 0b11,
            };
            buf.push(modrm(mod_, reg, rm));

            let sib_base = match op1 {
                Some(Operand::Memory(Address::Register(_))) if rm == 0b100 => Some(0b100),
                Some(Operand::Memory(Address::Displacement(_))) => Some(SIB_NO_BASE),
                _ => None,
            };
            if let Some(base) = sib_base {
                buf.push(sib(SIB_NO_INDEX, base));
            }

            match mod_ {
                0b01 => buf.push(0),
                0b10 => buf.extend_from_slice(&[0; 4]),
                _ if sib_base == Some(SIB_NO_BASE) => {
                    if let Some(Operand::Memory(Address::Displacement(disp))) = op1 {
                        buf.extend_from_slice(&disp32(*disp)?.to_le_bytes());
                    }
                }
                _ => {}
            }
        }
    }

    let imm = [op1, op2]
        .into_iter()
        .flatten()
        .chain(res.operands.iter().skip(2))
        .find_map(|op| match op {
            Operand::Immediate(imm) => Some(*imm),
            _ => None,
        });
    if let Some(imm) = imm {
        match imm {
            Immediate::Imm8(v) => buf.push(v as u8),
            Immediate::Imm16(v) => match opts.imm16 {
                Imm16Encoding::Legacy32 => buf.extend_from_slice(&(v as i32).to_le_bytes()),
                Imm16Encoding::Native16 => buf.extend_from_slice(&v.to_le_bytes()),
            },
            Immediate::Imm32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Immediate::Imm64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        }
    }

    Ok(buf)
}

/// REX extension bit for an operand: register or `[reg]` naming r8–r15.
fn is_extended(op: Option<&Operand>) -> Result<bool, AsmError> {
    match op.and_then(Operand::base_register) {
        Some(reg) => reg.is_extended(),
        None => Ok(false),
    }
}

/// Low three bits an operand contributes to ModR/M (or to the opcode).
///
/// Fixed-register shapes and immediates contribute nothing.
fn rm_bits(op: Option<&Operand>, shape: Option<&OperandShape>) -> Result<Option<u8>, AsmError> {
    let fixed = shape.is_some_and(OperandShape::is_fixed);
    match op {
        Some(Operand::Register(reg)) if !fixed => reg.low_bits().map(Some),
        Some(Operand::Memory(Address::Register(reg))) => reg.low_bits().map(Some),
        Some(Operand::Memory(Address::Displacement(_))) => Ok(Some(0b100)),
        _ => Ok(None),
    }
}

fn disp32(disp: Immediate) -> Result<i32, AsmError> {
    i32::try_from(disp.value()).map_err(|_| AsmError::MissingDisplacement {
        detail: alloc::format!("displacement {} does not fit in 32 bits", disp.value()),
    })
}
