//! Module `scanner` implements a one‑pass, streaming lexer.
//!
//! Source text goes in, `Token<'a>`s come out, each lexeme borrowing from the
//! source.  The scanner is a `FusedIterator` yielding `Result<Token, LoxError>`:
//! a lexical error is yielded in place and scanning resumes right after it, so
//! every bad character in a file is reported.  Exactly one `EOF` token ends
//! the stream.
//!
//! # Token Recognition
//!
//! - Trivia: blanks, newlines, `//` line comments (skipped via `memchr`) and
//!   nestable `/* … */` block comments.
//! - Punctuation: `(`, `)`, `{`, `}`, `,`, `.`, `-`, `+`, `;`, `*`, `/`, `?`, `:`.
//! - Operators: `!`, `!=`, `=`, `==`, `<`, `<=`, `>`, `>=`.
//! - String literals may span lines; an unterminated one is an error.
//! - Numbers: digits with an optional fractional part.
//! - Identifiers, with keywords picked out by a perfect‑hash `KEYWORDS` map.

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"      => TokenType::AND,
    b"break"    => TokenType::BREAK,
    b"class"    => TokenType::CLASS,
    b"continue" => TokenType::CONTINUE,
    b"else"     => TokenType::ELSE,
    b"false"    => TokenType::FALSE,
    b"fun"      => TokenType::FUN,
    b"for"      => TokenType::FOR,
    b"if"       => TokenType::IF,
    b"nil"      => TokenType::NIL,
    b"or"       => TokenType::OR,
    b"print"    => TokenType::PRINT,
    b"return"   => TokenType::RETURN,
    b"super"    => TokenType::SUPER,
    b"this"     => TokenType::THIS,
    b"true"     => TokenType::TRUE,
    b"var"      => TokenType::VAR,
    b"while"    => TokenType::WHILE,
};

/// Lexer over one source text.  The lifetime `'a` ties every emitted
/// token’s `lexeme` back to that text.
pub struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    start: usize, // first byte of the lexeme being scanned
    pos: usize,   // next byte to examine
    line: usize,  // 1‑based
    done: bool,   // EOF already emitted
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(source: &'a str) -> Self {
        info!("Scanner created over {} bytes", source.len());

        Self {
            source,
            bytes: source.as_bytes(),
            start: 0,
            pos: 0,
            line: 1,
            done: false,
        }
    }

    /// Scan the whole input, returning every token (EOF included) and every
    /// lexical error in source order.
    pub fn scan_tokens(self) -> (Vec<Token<'a>>, Vec<LoxError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for result in self {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => errors.push(e),
            }
        }

        info!(
            "Scanned {} tokens with {} error(s)",
            tokens.len(),
            errors.len()
        );

        (tokens, errors)
    }

    // ───────────────────────────── byte cursor ─────────────────────────────

    #[inline(always)]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Byte `offset` past the cursor, or `0` beyond the end.
    #[inline(always)]
    fn peek_at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    /// Consume one byte.  Callers check `at_end` first.
    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        b
    }

    /// `long` if the next byte is `second` (consuming it), else `short`.
    #[inline(always)]
    fn either(&mut self, second: u8, long: TokenType, short: TokenType) -> TokenType {
        if self.peek() == second {
            self.pos += 1;
            long
        } else {
            short
        }
    }

    #[inline(always)]
    fn lexeme(&self) -> &'a str {
        &self.source[self.start..self.pos]
    }

    // ───────────────────────────── trivia ──────────────────────────────────

    /// Step over whitespace and comments up to the next lexeme.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (b' ' | b'\r' | b'\t' | b'\n', _) => {
                    self.bump();
                }

                (b'/', b'/') => {
                    // Fast‑forward to the newline; if none, to EOF.
                    self.pos = match memchr(b'\n', &self.bytes[self.pos..]) {
                        Some(offset) => self.pos + offset,
                        None => self.bytes.len(),
                    };
                }

                (b'/', b'*') => self.block_comment()?,

                _ => return Ok(()),
            }
        }
    }

    /// Skip a `/* … */` comment, cursor on the opening `/`.  Block comments nest.
    fn block_comment(&mut self) -> Result<()> {
        let opened_on = self.line;
        let mut depth: usize = 0;

        while !self.at_end() {
            match (self.peek(), self.peek_at(1)) {
                (b'/', b'*') => {
                    self.pos += 2;
                    depth += 1;
                }
                (b'*', b'/') => {
                    self.pos += 2;
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }

        Err(LoxError::lex(opened_on, "Unterminated block comment"))
    }

    // ───────────────────────────── lexemes ─────────────────────────────────

    /// Scan one lexeme starting at `self.start` and classify it.
    fn lex_token(&mut self) -> Result<TokenType> {
        let kind = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,
            b'/' => TokenType::SLASH,
            b'?' => TokenType::QUESTION,
            b':' => TokenType::COLON,

            b'!' => self.either(b'=', TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.either(b'=', TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.either(b'=', TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.either(b'=', TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'"' => self.string()?,
            b'0'..=b'9' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                // Step over the whole UTF‑8 sequence so the next lexeme starts
                // on a character boundary.
                let ch = self.source[self.start..].chars().next().unwrap_or('\u{FFFD}');
                self.pos = self.start + ch.len_utf8();

                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character '{}'", ch),
                ));
            }
        };

        Ok(kind)
    }

    /// The opening `"` has been consumed.
    fn string(&mut self) -> Result<TokenType> {
        let closing = match memchr(b'"', &self.bytes[self.pos..]) {
            Some(offset) => self.pos + offset,
            None => {
                while !self.at_end() {
                    self.bump();
                }
                return Err(LoxError::lex(self.line, "Unterminated string"));
            }
        };

        while self.pos < closing {
            self.bump();
        }
        self.pos += 1; // closing quote

        let contents = &self.source[self.start + 1..closing];
        Ok(TokenType::STRING(contents.to_owned()))
    }

    fn number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.pos += 1;
        }

        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            self.pos += 1;
            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
        }

        // Digits and at most one interior dot always parse.
        TokenType::NUMBER(self.lexeme().parse::<f64>().unwrap_or(0.0))
    }

    fn identifier(&mut self) -> TokenType {
        while matches!(self.peek(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.pos += 1;
        }

        KEYWORDS
            .get(self.lexeme().as_bytes())
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Err(e) = self.skip_trivia() {
            return Some(Err(e));
        }

        self.start = self.pos;

        if self.at_end() {
            self.done = true;
            return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
        }

        Some(self.lex_token().map(|kind| {
            debug!("Scanned {:?} on line {}", kind, self.line);
            Token::new(kind, self.lexeme(), self.line)
        }))
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
