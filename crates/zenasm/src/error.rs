//! Error types and source span tracking for diagnostics.

use alloc::string::String;
use core::fmt;

/// Source location for diagnostics.
///
/// Tracks the line, column, byte offset, and length of a token or construct
/// in the original assembly source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (byte offset within line).
    pub col: u32,
    /// 0-based byte offset from start of source.
    pub offset: usize,
    /// Byte length of the spanned region.
    pub len: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub fn new(line: u32, col: u32, offset: usize, len: usize) -> Self {
        Self {
            line,
            col,
            offset,
            len,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Everything that can go wrong between source text and machine code.
///
/// Encoding failures (`EncodingNotFound`, `UnsupportedNode`) are scoped to a
/// single instruction or node. `InvalidRegister` and `MissingDisplacement`
/// mean the AST handed to the encoder was malformed; see [`AsmError::is_fatal`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsmError {
    /// No encoding in the table accepts the instruction, even after every
    /// immediate has been widened as far as it goes.
    EncodingNotFound {
        /// The instruction as written, e.g. `add rax, [rbx]`.
        instruction: String,
    },

    /// A register name that has no hardware index.
    InvalidRegister {
        /// The offending register name.
        name: String,
    },

    /// A `[disp32]` memory operand whose displacement cannot be encoded.
    MissingDisplacement {
        /// Description of the malformed displacement.
        detail: String,
    },

    /// The driver was handed an AST node it cannot assemble on its own.
    UnsupportedNode {
        /// Kind of the rejected node.
        node: String,
    },

    /// Syntax error during lexing or parsing.
    Syntax {
        /// The syntax error message.
        msg: String,
        /// Source location of the syntax error.
        span: Span,
    },

    /// A data literal does not fit the width of its `db`/`dw`/`dd`/`dq` directive.
    DataOverflow {
        /// The literal value.
        value: i128,
        /// Width of the data directive in bytes.
        size: u8,
        /// Source location of the literal.
        span: Span,
    },

    /// A configurable resource limit was exceeded.
    ResourceLimitExceeded {
        /// Human-readable name of the resource (e.g. "statements", "output bytes").
        resource: String,
        /// The configured limit that was exceeded.
        limit: usize,
    },
}

impl AsmError {
    /// Whether the error is a violated precondition on the AST rather than
    /// an instruction the table simply cannot encode.
    ///
    /// Fatal errors abort the whole pass; they are never cured by widening.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AsmError::InvalidRegister { .. } | AsmError::MissingDisplacement { .. }
        )
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::EncodingNotFound { instruction } => {
                write!(f, "instruction `{}` not supported", instruction)
            }
            AsmError::InvalidRegister { name } => {
                write!(f, "invalid register name '{}'", name)
            }
            AsmError::MissingDisplacement { detail } => {
                write!(f, "missing displacement: {}", detail)
            }
            AsmError::UnsupportedNode { node } => {
                write!(f, "unsupported AST node: {}", node)
            }
            AsmError::Syntax { msg, span } => write!(f, "{}: syntax error: {}", span, msg),
            AsmError::DataOverflow { value, size, span } => {
                write!(
                    f,
                    "{}: value {} does not fit in {} byte(s)",
                    span, value, size
                )
            }
            AsmError::ResourceLimitExceeded { resource, limit } => {
                write!(f, "resource limit exceeded: {} (limit: {})", resource, limit)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AsmError {}
