//! Overload resolution: pick the encoding for a concrete instruction.
//!
//! Candidates are scanned in table order. If none matches, the first
//! immediate that can still grow is widened one step and the scan repeats.
//! Widening happens on a private copy of the operands; the caller's
//! instruction is left untouched and the widened operands are handed back
//! in the [`Resolution`].

use alloc::string::ToString;
use alloc::vec::Vec;

use log::trace;

use crate::encoding::{self, EncodingDefinition, OperandShape};
use crate::error::AsmError;
use crate::ir::{Instruction, Operand, OperandKind};

/// The encoding chosen for an instruction plus the operands it was chosen for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Winning candidate.
    pub definition: &'static EncodingDefinition,
    /// Operands after widening, in source order.
    pub operands: Vec<Operand>,
}

/// Select the first encoding that accepts `instr`, widening immediates as needed.
///
/// # Errors
///
/// Returns [`AsmError::EncodingNotFound`] if the mnemonic is unknown or no
/// candidate matches once every immediate is 64 bits wide.
pub fn resolve(instr: &Instruction) -> Result<Resolution, AsmError> {
    let candidates = encoding::lookup(&instr.mnemonic);
    if candidates.is_empty() {
        return Err(not_found(instr));
    }

    let mut operands = instr.operands.clone();
    loop {
        if let Some(definition) = candidates.iter().find(|def| matches(def, &operands)) {
            trace!("{} -> {}", instr, definition);
            return Ok(Resolution {
                definition,
                operands,
            });
        }
        if !widen_first(&mut operands) {
            return Err(not_found(instr));
        }
        trace!("{}: no match, widened immediate to {:?}", instr.mnemonic, operands);
    }
}

/// Whether `def` accepts `operands` as they stand.
pub fn matches(def: &EncodingDefinition, operands: &[Operand]) -> bool {
    def.operands.len() == operands.len()
        && def
            .operands
            .iter()
            .zip(operands)
            .all(|(shape, op)| operand_matches(op, shape))
}

/// Whether a single operand satisfies a shape.
///
/// Widths must agree exactly. A fixed shape wants a register of that exact
/// name. A typed shape wants the same kind, except that a register is also
/// accepted where memory is asked for.
pub fn operand_matches(op: &Operand, shape: &OperandShape) -> bool {
    if op.size() != shape.size() {
        return false;
    }
    match (shape, op) {
        (OperandShape::Fixed { name, .. }, Operand::Register(reg)) => reg.name == *name,
        (OperandShape::Fixed { .. }, _) => false,
        (OperandShape::Typed { kind, .. }, op) => {
            op.kind() == *kind
                || (op.kind() == OperandKind::Register && *kind == OperandKind::Memory)
        }
    }
}

/// Widen the first immediate operand that is not yet 64 bits wide.
/// Returns `false` if there was nothing left to widen.
fn widen_first(operands: &mut [Operand]) -> bool {
    for op in operands.iter_mut() {
        if let Operand::Immediate(imm) = op {
            if imm.can_widen() {
                *imm = imm.widen();
                return true;
            }
        }
    }
    false
}

fn not_found(instr: &Instruction) -> AsmError {
    AsmError::EncodingNotFound {
        instruction: instr.to_string(),
    }
}
