//! Lexer for NASM-flavoured assembly source.
//!
//! The lexer tokenizes source text into a stream of [`Token`]s, each carrying
//! its [`Span`] so that error messages can point back to the exact location
//! in the original input. `;` starts a comment that runs to end of line.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::str;

use crate::error::{AsmError, Span};

/// A token produced by the lexer.
///
/// Token text is borrowed from the source string.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    /// Token classification.
    pub kind: TokenKind,
    /// Source text of the token; for string literals, the content between the quotes.
    pub text: Cow<'src, str>,
    /// Source location.
    pub span: Span,
}

impl Token<'_> {
    /// Returns the token text as a `&str`.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The type of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An identifier: mnemonic, register, directive keyword or symbol name.
    Ident,
    /// A numeric literal.
    Number(i128),
    /// A quoted string literal (content without quotes).
    StringLit,
    /// Label definition (`name:`).
    LabelDef,
    /// Comma separator.
    Comma,
    /// Open bracket `[`.
    OpenBracket,
    /// Close bracket `]`.
    CloseBracket,
    /// A newline (statement separator).
    Newline,
    /// End of input.
    Eof,
}

/// Tokenize assembly source text into a vector of tokens.
///
/// The lexer recognizes:
/// - Identifiers (mnemonics, registers, directive keywords, symbol names)
/// - Numeric literals (decimal, hex `0x`/`h` suffix, binary `0b`, octal `0o`),
///   optionally negative
/// - String literals in single or double quotes, taken verbatim
/// - Label definitions (`name:`)
/// - Punctuation: `,`, `[`, `]`
/// - Comments: `;` to end of line
///
/// The returned vector always ends with [`TokenKind::Eof`].
///
/// # Errors
///
/// Returns `Err(AsmError::Syntax)` if the input contains an unrecognised
/// character or a malformed token (e.g. an unterminated string literal).
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, AsmError> {
    let mut tokens = Vec::with_capacity(source.len() / 3 + 1);
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut line: u32 = 1;
    let mut col: u32 = 1;
    let mut line_start = 0usize;

    while pos < len {
        let ch = bytes[pos];

        // Skip whitespace (but not newlines)
        if ch == b' ' || ch == b'\t' || ch == b'\r' {
            pos += 1;
            col += 1;
            continue;
        }

        if ch == b'\n' {
            tokens.push(Token {
                kind: TokenKind::Newline,
                text: Cow::Borrowed("\n"),
                span: Span::new(line, col, pos, 1),
            });
            pos += 1;
            line += 1;
            col = 1;
            line_start = pos;
            continue;
        }

        // Comment: ; to EOL
        if ch == b';' {
            while pos < len && bytes[pos] != b'\n' {
                pos += 1;
            }
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        let punct = match ch {
            b',' => Some(TokenKind::Comma),
            b'[' => Some(TokenKind::OpenBracket),
            b']' => Some(TokenKind::CloseBracket),
            _ => None,
        };
        if let Some(kind) = punct {
            tokens.push(Token {
                kind,
                text: Cow::Borrowed(&source[pos..pos + 1]),
                span: Span::new(line, col, pos, 1),
            });
            pos += 1;
            col += 1;
            continue;
        }

        // String literal, either quote style, no escapes
        if ch == b'"' || ch == b'\'' {
            let quote = ch;
            let start = pos;
            let start_col = col;
            pos += 1;
            while pos < len && bytes[pos] != quote {
                if bytes[pos] == b'\n' {
                    return Err(AsmError::Syntax {
                        msg: String::from("unterminated string literal"),
                        span: Span::new(line, start_col, start, pos - start),
                    });
                }
                pos += 1;
            }
            if pos >= len {
                return Err(AsmError::Syntax {
                    msg: String::from("unterminated string literal"),
                    span: Span::new(line, start_col, start, pos - start),
                });
            }
            pos += 1; // skip closing quote
            tokens.push(Token {
                kind: TokenKind::StringLit,
                text: Cow::Borrowed(&source[start + 1..pos - 1]),
                span: Span::new(line, start_col, start, pos - start),
            });
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        // Number, possibly negative
        if ch.is_ascii_digit() || (ch == b'-' && pos + 1 < len && bytes[pos + 1].is_ascii_digit())
        {
            let start = pos;
            let start_col = col;
            let negative = ch == b'-';
            if negative {
                pos += 1;
            }
            let value = parse_number_at(bytes, &mut pos, line, start_col)?;
            tokens.push(Token {
                kind: TokenKind::Number(if negative { -value } else { value }),
                text: Cow::Borrowed(&source[start..pos]),
                span: Span::new(line, start_col, start, pos - start),
            });
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        // Identifier, keyword or label definition
        if ch.is_ascii_alphabetic() || ch == b'_' || ch == b'.' {
            let start = pos;
            let start_col = col;
            while pos < len
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'.')
            {
                pos += 1;
            }
            let text = Cow::Borrowed(&source[start..pos]);

            if pos < len && bytes[pos] == b':' {
                pos += 1; // consume ':'
                tokens.push(Token {
                    kind: TokenKind::LabelDef,
                    text,
                    span: Span::new(line, start_col, start, pos - start),
                });
            } else {
                tokens.push(Token {
                    kind: TokenKind::Ident,
                    text,
                    span: Span::new(line, start_col, start, pos - start),
                });
            }
            col = (pos - line_start) as u32 + 1;
            continue;
        }

        // Unknown character; report the whole UTF-8 scalar.
        let bad = source[pos..].chars().next().unwrap_or('?');
        return Err(AsmError::Syntax {
            msg: alloc::format!("unexpected character '{}'", bad),
            span: Span::new(line, col, pos, bad.len_utf8()),
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: Cow::Borrowed(""),
        span: Span::new(line, col, pos, 0),
    });

    Ok(tokens)
}

/// Parse a number starting at `pos` in `bytes`. Advances `pos` past the number.
#[inline]
fn parse_number_at(
    bytes: &[u8],
    pos: &mut usize,
    span_line: u32,
    span_col: u32,
) -> Result<i128, AsmError> {
    let start = *pos;
    let len = bytes.len();

    // Check for hex, binary, octal prefix
    if *pos + 1 < len && bytes[*pos] == b'0' {
        let radix = match bytes[*pos + 1] {
            b'x' | b'X' => Some((16, "0x")),
            b'b' | b'B' => Some((2, "0b")),
            b'o' | b'O' => Some((8, "0o")),
            _ => None,
        };
        if let Some((radix, prefix)) = radix {
            *pos += 2;
            let num_start = *pos;
            while *pos < len && (bytes[*pos] as char).is_digit(radix) {
                *pos += 1;
            }
            let s = str::from_utf8(&bytes[num_start..*pos]).unwrap_or("");
            if s.is_empty() {
                return Err(AsmError::Syntax {
                    msg: alloc::format!("expected digits after '{}'", prefix),
                    span: Span::new(span_line, span_col, start, *pos - start),
                });
            }
            return i128::from_str_radix(s, radix).map_err(|_| AsmError::Syntax {
                msg: alloc::format!("invalid number '{}{}'", prefix, s),
                span: Span::new(span_line, span_col, start, *pos - start),
            });
        }
    }

    // Decimal, or hex with an `h` suffix (0FFh)
    let mut end = *pos;
    while end < len && bytes[end].is_ascii_hexdigit() {
        end += 1;
    }
    if end < len && (bytes[end] == b'h' || bytes[end] == b'H') {
        let s = str::from_utf8(&bytes[start..end]).unwrap_or("0");
        *pos = end + 1; // consume 'h'
        return i128::from_str_radix(s, 16).map_err(|_| AsmError::Syntax {
            msg: alloc::format!("invalid hex number '{}h'", s),
            span: Span::new(span_line, span_col, start, *pos - start),
        });
    }
    while *pos < len && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    let s = str::from_utf8(&bytes[start..*pos]).unwrap_or("0");
    s.parse::<i128>().map_err(|_| AsmError::Syntax {
        msg: alloc::format!("invalid number '{}'", s),
        span: Span::new(span_line, span_col, start, *pos - start),
    })
}
