//! Public assembler API: builder pattern and AST driver.
//!
//! This module ties together the lexer, parser, encoder and symbol table
//! into a fluent API. The driver walks a listing top to bottom and stops at
//! the first error.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::trace;

use crate::elf;
use crate::encoder::{self, EncodeOptions, Imm16Encoding};
use crate::error::AsmError;
use crate::ir::*;
use crate::lexer;
use crate::parser;
use crate::symbol::SymbolTable;

/// The result of a successful assembly operation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct AssemblyResult {
    /// The assembled machine code.
    bytes: Vec<u8>,
    /// Label offsets (name → offset into `bytes`).
    labels: Vec<(String, u64)>,
    /// Symbols referenced by `global`/`extern` and labels.
    symbols: SymbolTable,
}

impl AssemblyResult {
    /// Get the assembled bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use zenasm::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.emit("push rax")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.bytes(), &[0x50]);
    /// # Ok::<(), zenasm::AsmError>(())
    /// ```
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume and return the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of assembled bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was assembled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Label offsets in definition order.
    #[must_use]
    pub fn labels(&self) -> &[(String, u64)] {
        &self.labels
    }

    /// Offset of the first label called `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use zenasm::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.emit("push rax\nafter_push:\npop rax")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.label_address("after_push"), Some(1));
    /// # Ok::<(), zenasm::AsmError>(())
    /// ```
    #[must_use]
    pub fn label_address(&self, name: &str) -> Option<u64> {
        self.labels.iter().find(|(n, _)| n == name).map(|(_, a)| *a)
    }

    /// The symbol table built during assembly.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Wrap the code in an ELF64 relocatable object for x86-64.
    #[must_use]
    pub fn to_elf(&self) -> Vec<u8> {
        elf::write_object(&self.bytes, &self.labels, &self.symbols)
    }
}

/// Configurable resource limits for defense against denial-of-service.
///
/// All limits default to generous values that are sufficient for any
/// reasonable assembly program.
///
/// # Examples
///
/// ```rust
/// use zenasm::{Assembler, ResourceLimits};
///
/// let mut asm = Assembler::new();
/// asm.limits(ResourceLimits {
///     max_statements: 1_000,
///     max_labels: 100,
///     max_output_bytes: 4096,
///     max_source_bytes: 64 * 1024,
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimits {
    /// Maximum number of section entries (instructions + data + labels).
    /// Default: 1,000,000.
    pub max_statements: usize,
    /// Maximum number of labels that can be defined. Default: 100,000.
    pub max_labels: usize,
    /// Maximum output size in bytes. Default: 16 MiB.
    pub max_output_bytes: usize,
    /// Maximum input source bytes per `emit()` call. Default: 64 MiB.
    pub max_source_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_statements: 1_000_000,
            max_labels: 100_000,
            max_output_bytes: 16 * 1024 * 1024,
            max_source_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Everything that changes how a listing is assembled.
///
/// The default reproduces the byte output of earlier releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssemblerOptions {
    /// 16-bit immediate serialization. Default: [`Imm16Encoding::Legacy32`].
    pub imm16: Imm16Encoding,
    /// Append the payload of `db`/`dw`/`dd`/`dq` entries to the output.
    /// Default: `false`, data entries contribute no bytes.
    pub emit_data: bool,
    /// Resource limits.
    pub limits: ResourceLimits,
}

/// Builder-pattern assembler.
///
/// # Examples
///
/// ```rust
/// use zenasm::Assembler;
///
/// let mut asm = Assembler::new();
/// asm.emit("push rbp").unwrap();
/// asm.emit("mov rbp, rsp").unwrap();
/// asm.emit("pop rbp").unwrap();
/// let result = asm.finish().unwrap();
/// assert_eq!(result.bytes(), &[0x55, 0x48, 0x89, 0xE5, 0x5D]);
/// ```
#[derive(Debug, Default)]
pub struct Assembler {
    options: AssemblerOptions,
    code: Vec<u8>,
    labels: Vec<(String, u64)>,
    symbols: SymbolTable,
    statement_count: usize,
    label_count: usize,
}

impl Assembler {
    /// Create an assembler with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all options at once.
    pub fn options(&mut self, options: AssemblerOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Set resource limits.
    pub fn limits(&mut self, limits: ResourceLimits) -> &mut Self {
        self.options.limits = limits;
        self
    }

    /// Choose how 16-bit immediates are serialized.
    pub fn imm16(&mut self, mode: Imm16Encoding) -> &mut Self {
        self.options.imm16 = mode;
        self
    }

    /// Choose whether data entries contribute bytes.
    pub fn emit_data(&mut self, enabled: bool) -> &mut Self {
        self.options.emit_data = enabled;
        self
    }

    /// Parse `source` and assemble it.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError`] for syntax errors, unencodable instructions,
    /// malformed operands or exceeded resource limits.
    pub fn emit(&mut self, source: &str) -> Result<&mut Self, AsmError> {
        if source.len() > self.options.limits.max_source_bytes {
            return Err(AsmError::ResourceLimitExceeded {
                resource: String::from("source bytes"),
                limit: self.options.limits.max_source_bytes,
            });
        }
        let tokens = lexer::tokenize(source)?;
        let listing = parser::parse(&tokens)?;
        self.assemble(&listing)?;
        Ok(self)
    }

    /// Assemble an AST node and everything below it.
    ///
    /// Listings, directives and section entries are accepted. A bare operand
    /// is rejected with [`AsmError::UnsupportedNode`].
    ///
    /// # Errors
    ///
    /// Stops at the first error and returns it; bytes emitted before the
    /// failing entry are kept.
    pub fn assemble<'n>(&mut self, node: impl Into<AstNode<'n>>) -> Result<(), AsmError> {
        match node.into() {
            AstNode::Listing(listing) => {
                for directive in &listing.directives {
                    self.assemble(directive)?;
                }
                Ok(())
            }
            AstNode::Directive(Directive::Extern { name }) => {
                self.symbols.import(name);
                Ok(())
            }
            AstNode::Directive(Directive::Global { name }) => {
                self.symbols.export(name);
                Ok(())
            }
            AstNode::Directive(Directive::Section { name, entries }) => {
                trace!("section {:?}: {} entries", name, entries.len());
                for entry in entries {
                    self.assemble(entry)?;
                }
                Ok(())
            }
            AstNode::Entry(entry) => self.assemble_entry(entry),
            node @ AstNode::Operand(_) => Err(AsmError::UnsupportedNode {
                node: node.kind_name().to_string(),
            }),
        }
    }

    fn assemble_entry(&mut self, entry: &SectionEntry) -> Result<(), AsmError> {
        self.statement_count += 1;
        if self.statement_count > self.options.limits.max_statements {
            return Err(AsmError::ResourceLimitExceeded {
                resource: String::from("statements"),
                limit: self.options.limits.max_statements,
            });
        }

        match entry {
            SectionEntry::Instruction(instr) => {
                let opts = EncodeOptions {
                    imm16: self.options.imm16,
                };
                let bytes = encoder::encode(instr, &opts)?;
                self.check_output_limit(bytes.len())?;
                trace!("{:#06x}: {} -> {:02X?}", self.code.len(), instr, &*bytes);
                self.code.extend_from_slice(&bytes);
            }
            SectionEntry::Data { bytes } => {
                if self.options.emit_data {
                    self.check_output_limit(bytes.len())?;
                    self.code.extend_from_slice(bytes);
                } else {
                    trace!("skipping {} data byte(s)", bytes.len());
                }
            }
            SectionEntry::Label { name } => {
                self.label_count += 1;
                if self.label_count > self.options.limits.max_labels {
                    return Err(AsmError::ResourceLimitExceeded {
                        resource: String::from("labels"),
                        limit: self.options.limits.max_labels,
                    });
                }
                self.symbols.resolve(name);
                self.labels.push((name.clone(), self.code.len() as u64));
            }
        }
        Ok(())
    }

    /// Check that adding `additional` bytes would not exceed the output size limit.
    fn check_output_limit(&self, additional: usize) -> Result<(), AsmError> {
        if self.code.len() + additional > self.options.limits.max_output_bytes {
            return Err(AsmError::ResourceLimitExceeded {
                resource: String::from("output bytes"),
                limit: self.options.limits.max_output_bytes,
            });
        }
        Ok(())
    }

    /// Bytes assembled so far.
    pub fn bytes(&self) -> &[u8] {
        &self.code
    }

    /// Symbols seen so far.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Finish assembly and return the code, labels and symbols.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::ResourceLimitExceeded`] if the output is larger
    /// than the configured limit.
    pub fn finish(self) -> Result<AssemblyResult, AsmError> {
        if self.code.len() > self.options.limits.max_output_bytes {
            return Err(AsmError::ResourceLimitExceeded {
                resource: String::from("output bytes"),
                limit: self.options.limits.max_output_bytes,
            });
        }
        Ok(AssemblyResult {
            bytes: self.code,
            labels: self.labels,
            symbols: self.symbols,
        })
    }
}
