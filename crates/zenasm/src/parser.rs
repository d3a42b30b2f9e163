//! NASM-flavoured parser producing a [`Listing`].
//!
//! One statement per line. Recognised statements:
//!
//! - `bits 16|32|64`
//! - `section NAME` (also `segment NAME`)
//! - `global NAME[, NAME...]` and `extern NAME[, NAME...]`
//! - `label:`, optionally followed by another statement on the same line
//! - `db`/`dw`/`dd`/`dq` with comma-separated numbers and quoted strings
//! - instructions whose operands are registers, integers, `[reg]` or `[number]`
//!
//! Entries that appear before the first `section` are collected into a
//! section with an empty name.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{AsmError, Span};
use crate::ir::*;
use crate::lexer::{Token, TokenKind};

/// Parse a token stream into a listing.
///
/// # Errors
///
/// Returns `Err(AsmError)` if the token stream contains an unexpected token,
/// a malformed directive, an out-of-range data value, or an operand that
/// is neither a register, a number nor a bracketed register or number.
pub fn parse(tokens: &[Token<'_>]) -> Result<Listing, AsmError> {
    if tokens.is_empty() {
        return Ok(Listing::default());
    }
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    /// Bitness from the last `bits` directive.
    bits: u8,
    directives: Vec<Directive>,
    section: Option<(String, Vec<SectionEntry>)>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            bits: 64,
            directives: Vec::new(),
            section: None,
        }
    }

    #[inline]
    fn peek(&self) -> &Token<'a> {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[inline]
    fn advance(&mut self) -> &Token<'a> {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len() || self.peek().kind == TokenKind::Eof
    }

    #[inline]
    fn at_line_end(&self) -> bool {
        self.at_end() || self.peek().kind == TokenKind::Newline
    }

    fn expect_ident(&mut self) -> Result<(String, Span), AsmError> {
        let tok = self.advance();
        if tok.kind == TokenKind::Ident {
            Ok((tok.text.to_string(), tok.span))
        } else {
            Err(unexpected("identifier", tok))
        }
    }

    fn expect_line_end(&mut self) -> Result<(), AsmError> {
        if self.at_line_end() {
            Ok(())
        } else {
            Err(unexpected("end of line", self.peek()))
        }
    }

    #[inline]
    fn skip_newlines(&mut self) {
        while !self.at_end() && self.peek().kind == TokenKind::Newline {
            self.advance();
        }
    }

    fn parse_program(&mut self) -> Result<Listing, AsmError> {
        self.skip_newlines();
        while !self.at_end() {
            self.parse_statement()?;
            self.expect_line_end()?;
            self.skip_newlines();
        }
        self.flush_section();
        Ok(Listing {
            directives: core::mem::take(&mut self.directives),
        })
    }

    fn parse_statement(&mut self) -> Result<(), AsmError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::LabelDef => {
                self.advance();
                self.push_entry(SectionEntry::Label {
                    name: tok.text.to_string(),
                });
                if self.at_line_end() {
                    Ok(())
                } else {
                    self.parse_statement()
                }
            }
            TokenKind::Ident => {
                self.advance();
                let keyword = tok.text.to_ascii_lowercase();
                match keyword.as_str() {
                    "bits" => self.parse_bits(),
                    "section" | "segment" => {
                        let (name, _) = self.expect_ident()?;
                        self.flush_section();
                        self.section = Some((name, Vec::new()));
                        Ok(())
                    }
                    "global" => {
                        for name in self.parse_name_list()? {
                            self.directives.push(Directive::Global { name });
                        }
                        Ok(())
                    }
                    "extern" => {
                        for name in self.parse_name_list()? {
                            self.directives.push(Directive::Extern { name });
                        }
                        Ok(())
                    }
                    "db" => self.parse_data(1),
                    "dw" => self.parse_data(2),
                    "dd" => self.parse_data(4),
                    "dq" => self.parse_data(8),
                    _ => {
                        let operands = self.parse_operands()?;
                        let instr = Instruction {
                            bits: self.bits,
                            mnemonic: keyword,
                            operands,
                        };
                        self.push_entry(SectionEntry::Instruction(instr));
                        Ok(())
                    }
                }
            }
            _ => Err(unexpected("statement", &tok)),
        }
    }

    fn parse_bits(&mut self) -> Result<(), AsmError> {
        let tok = self.advance().clone();
        match tok.kind {
            TokenKind::Number(n @ (16 | 32 | 64)) => {
                self.bits = n as u8;
                Ok(())
            }
            _ => Err(AsmError::Syntax {
                msg: alloc::format!("bits expects 16, 32 or 64, found '{}'", tok.text),
                span: tok.span,
            }),
        }
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>, AsmError> {
        let mut names = Vec::new();
        loop {
            let (name, _) = self.expect_ident()?;
            names.push(name);
            if self.peek().kind != TokenKind::Comma {
                return Ok(names);
            }
            self.advance();
        }
    }

    /// One `Data` entry per value, each value encoded little-endian at
    /// `width` bytes. Strings are copied verbatim whatever the width.
    fn parse_data(&mut self, width: u8) -> Result<(), AsmError> {
        loop {
            let tok = self.advance().clone();
            let bytes = match tok.kind {
                TokenKind::StringLit => tok.text.as_bytes().to_vec(),
                TokenKind::Number(value) => encode_data(value, width, tok.span)?,
                _ => return Err(unexpected("number or string", &tok)),
            };
            self.push_entry(SectionEntry::Data { bytes });
            if self.peek().kind != TokenKind::Comma {
                return Ok(());
            }
            self.advance();
        }
    }

    fn parse_operands(&mut self) -> Result<Vec<Operand>, AsmError> {
        let mut operands = Vec::new();
        if self.at_line_end() {
            return Ok(operands);
        }
        loop {
            operands.push(self.parse_operand()?);
            if self.peek().kind != TokenKind::Comma {
                return Ok(operands);
            }
            self.advance();
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, AsmError> {
        let tok = self.advance().clone();
        match tok.kind {
            TokenKind::Number(value) => Ok(Operand::Immediate(Immediate::fit(
                immediate_value(value, tok.span)?,
            ))),
            TokenKind::Ident => parse_register(&tok).map(Operand::Register),
            TokenKind::OpenBracket => {
                let inner = self.advance().clone();
                let address = match inner.kind {
                    TokenKind::Ident => Address::Register(parse_register(&inner)?),
                    TokenKind::Number(value) => {
                        let disp = i32::try_from(value).map_err(|_| AsmError::Syntax {
                            msg: alloc::format!("displacement {} does not fit in 32 bits", value),
                            span: inner.span,
                        })?;
                        Address::Displacement(Immediate::Imm32(disp))
                    }
                    _ => return Err(unexpected("register or displacement", &inner)),
                };
                let close = self.advance();
                if close.kind != TokenKind::CloseBracket {
                    return Err(unexpected("']'", close));
                }
                Ok(Operand::Memory(address))
            }
            _ => Err(unexpected("operand", &tok)),
        }
    }

    fn push_entry(&mut self, entry: SectionEntry) {
        self.section
            .get_or_insert_with(|| (String::new(), Vec::new()))
            .1
            .push(entry);
    }

    fn flush_section(&mut self) {
        if let Some((name, entries)) = self.section.take() {
            if !name.is_empty() || !entries.is_empty() {
                self.directives.push(Directive::Section { name, entries });
            }
        }
    }
}

fn parse_register(tok: &Token<'_>) -> Result<Register, AsmError> {
    Register::parse(tok.text()).ok_or_else(|| AsmError::Syntax {
        msg: alloc::format!("'{}' is not a register; symbol operands are not supported", tok.text),
        span: tok.span,
    })
}

fn immediate_value(value: i128, span: Span) -> Result<i64, AsmError> {
    // Unsigned 64-bit literals are reinterpreted as their two's-complement bit pattern.
    if let Ok(v) = i64::try_from(value) {
        Ok(v)
    } else if let Ok(v) = u64::try_from(value) {
        Ok(v as i64)
    } else {
        Err(AsmError::Syntax {
            msg: alloc::format!("immediate {} does not fit in 64 bits", value),
            span,
        })
    }
}

/// Little-endian bytes of `value` at `width` bytes, accepting both the
/// signed and the unsigned range of that width.
fn encode_data(value: i128, width: u8, span: Span) -> Result<Vec<u8>, AsmError> {
    let bits = u32::from(width) * 8;
    let min = -(1i128 << (bits - 1));
    let max = (1i128 << bits) - 1;
    if value < min || value > max {
        return Err(AsmError::DataOverflow {
            value,
            size: width,
            span,
        });
    }
    Ok(value.to_le_bytes()[..width as usize].to_vec())
}

fn unexpected(expected: &str, tok: &Token<'_>) -> AsmError {
    let found = match tok.kind {
        TokenKind::Newline => "end of line",
        TokenKind::Eof => "end of input",
        _ => tok.text(),
    };
    AsmError::Syntax {
        msg: alloc::format!("expected {}, found '{}'", expected, found),
        span: tok.span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use alloc::vec;

    fn parse_str(src: &str) -> Result<Listing, AsmError> {
        parse(&tokenize(src)?)
    }

    fn entries(src: &str) -> Vec<SectionEntry> {
        let listing = parse_str(src).unwrap();
        match listing.directives.into_iter().next() {
            Some(Directive::Section { entries, .. }) => entries,
            other => panic!("expected a section, got {:?}", other),
        }
    }

    fn reg(name: &str) -> Operand {
        Operand::reg(name).unwrap()
    }

    #[test]
    fn empty_source() {
        assert_eq!(parse_str("").unwrap(), Listing::default());
        assert_eq!(parse_str("\n; only a comment\n").unwrap(), Listing::default());
        assert_eq!(parse(&[]).unwrap(), Listing::default());
    }

    #[test]
    fn instruction_operands() {
        let e = entries("mov [rsp], rax\nadd rax, 200\npush -1\nmov [12345], rbx");
        assert_eq!(
            e[0],
            SectionEntry::Instruction(Instruction::new(
                "mov",
                vec![
                    Operand::Memory(Address::Register(Register::parse("rsp").unwrap())),
                    reg("rax")
                ]
            ))
        );
        assert_eq!(
            e[1],
            SectionEntry::Instruction(Instruction::new(
                "add",
                vec![reg("rax"), Operand::Immediate(Immediate::Imm16(200))]
            ))
        );
        assert_eq!(
            e[2],
            SectionEntry::Instruction(Instruction::new(
                "push",
                vec![Operand::Immediate(Immediate::Imm8(-1))]
            ))
        );
        assert_eq!(
            e[3],
            SectionEntry::Instruction(Instruction::new(
                "mov",
                vec![Operand::disp(12345), reg("rbx")]
            ))
        );
    }

    #[test]
    fn small_bracketed_number_is_still_disp32() {
        let e = entries("mov [8], rax");
        match &e[0] {
            SectionEntry::Instruction(i) => assert_eq!(i.operands[0], Operand::disp(8)),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn mnemonics_and_registers_are_case_insensitive() {
        assert_eq!(entries("PUSH RAX"), entries("push rax"));
    }

    #[test]
    fn zero_operand_instruction() {
        let e = entries("nop");
        assert_eq!(
            e[0],
            SectionEntry::Instruction(Instruction::new("nop", vec![]))
        );
    }

    #[test]
    fn bits_directive() {
        let e = entries("bits 32\npush eax");
        match &e[0] {
            SectionEntry::Instruction(i) => assert_eq!(i.bits, 32),
            other => panic!("unexpected entry {:?}", other),
        }
        assert!(parse_str("bits 12").is_err());
    }

    #[test]
    fn sections_globals_and_externs() {
        let src = "global _start\nextern puts, exit\nsection .text\n_start: push rax\nsection .data\nmsg: db \"hi\", 0\n";
        let listing = parse_str(src).unwrap();
        assert_eq!(
            listing.directives,
            vec![
                Directive::Global {
                    name: "_start".into()
                },
                Directive::Extern {
                    name: "puts".into()
                },
                Directive::Extern {
                    name: "exit".into()
                },
                Directive::Section {
                    name: ".text".into(),
                    entries: vec![
                        SectionEntry::Label {
                            name: "_start".into()
                        },
                        SectionEntry::Instruction(Instruction::new("push", vec![reg("rax")])),
                    ],
                },
                Directive::Section {
                    name: ".data".into(),
                    entries: vec![
                        SectionEntry::Label { name: "msg".into() },
                        SectionEntry::Data {
                            bytes: b"hi".to_vec()
                        },
                        SectionEntry::Data { bytes: vec![0] },
                    ],
                },
            ]
        );
    }

    #[test]
    fn entries_before_section_go_to_unnamed_section() {
        let listing = parse_str("push rax\nsection .text\npop rax").unwrap();
        assert!(matches!(
            &listing.directives[0],
            Directive::Section { name, .. } if name.is_empty()
        ));
        assert_eq!(listing.directives.len(), 2);
    }

    #[test]
    fn data_widths() {
        let e = entries("dw 0x1234\ndd -1\ndq 1\ndb 255, -128");
        assert_eq!(e[0], SectionEntry::Data { bytes: vec![0x34, 0x12] });
        assert_eq!(e[1], SectionEntry::Data { bytes: vec![0xFF; 4] });
        assert_eq!(
            e[2],
            SectionEntry::Data {
                bytes: vec![1, 0, 0, 0, 0, 0, 0, 0]
            }
        );
        assert_eq!(e[3], SectionEntry::Data { bytes: vec![0xFF] });
        assert_eq!(e[4], SectionEntry::Data { bytes: vec![0x80] });
    }

    #[test]
    fn data_overflow() {
        let err = parse_str("db 256").unwrap_err();
        assert!(matches!(err, AsmError::DataOverflow { value: 256, size: 1, .. }));
        assert!(parse_str("dw -32769").is_err());
    }

    #[test]
    fn label_with_data_on_same_line() {
        let e = entries("msg: db 'A'");
        assert_eq!(e.len(), 2);
        assert_eq!(e[1], SectionEntry::Data { bytes: vec![b'A'] });
    }

    #[test]
    fn symbol_operand_rejected() {
        let err = parse_str("mov rax, counter").unwrap_err();
        match err {
            AsmError::Syntax { msg, span } => {
                assert!(msg.contains("counter"));
                assert_eq!(span.col, 10);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn malformed_memory_operand() {
        assert!(parse_str("mov [rax, rbx").is_err());
        assert!(parse_str("mov [], rbx").is_err());
        assert!(parse_str("mov [0x100000000], rax").is_err());
    }

    #[test]
    fn trailing_garbage_rejected() {
        assert!(parse_str("push rax rbx").is_err());
        assert!(parse_str("global").is_err());
    }
}
