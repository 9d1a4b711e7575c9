//! C-subset lexer.
//!
//! Front-end token interface for the surrounding compiler pipeline. The
//! lexer turns C-like source text into a flat token stream: keywords,
//! type names, identifiers, numeric/string/character literals, operators,
//! separators, comments and newlines, terminated by a single [`TokenKind::Eof`]
//! token. String and character literals carry their decoded value; every
//! other token carries its source spelling. Positions are 1-based.

use minic_derive::Error;

/// Operator spellings. Matching always prefers the longest spelling, so
/// `<<=` is never split into `<<` and `=`.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=",
    "/=", "%=", "&=", "^=", "|=", "->", "+", "-", "*", "/", "<", ">", "=", "!", "^", "&", "|",
    "%", "~", "?", ":",
];

/// Single-character separators.
const SEPARATORS: &[u8] = b";()[]{}.,#\\";

/// Reserved words that are not type names.
const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "const", "continue", "default", "do", "else", "enum", "extern",
    "for", "goto", "if", "register", "return", "short", "signed", "sizeof", "static", "struct",
    "switch", "typedef", "union", "volatile", "while", "printf",
];

/// Built-in type names.
const TYPES: &[&str] = &[
    "int", "float", "char", "double", "void", "long", "unsigned", "string",
];

/// Classification of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Type,
    Identifier,
    /// Decimal integer literal.
    Int,
    /// Floating-point literal, optionally with an exponent.
    Float,
    /// `0x`-prefixed hexadecimal literal.
    Hex,
    /// `0`-prefixed octal literal.
    Oct,
    /// String literal; the token text is the decoded content.
    Str,
    /// Character literal; the token text is the decoded character.
    Char,
    Operator,
    Separator,
    Comment,
    Newline,
    Eof,
}

/// One lexed token with its decoded text and source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based source line.
    pub line: usize,
    /// 1-based source column.
    pub column: usize,
}

/// Lexical error with the position of the offending character.
#[derive(Debug, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Tokenizes `source`, returning the full token stream or the first error.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    /// Byte offset of the start of the current line, for column math.
    line_start: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn column(&self) -> usize {
        self.pos - self.line_start + 1
    }

    fn error(&self, message: impl Into<String>, line: usize, column: usize) -> LexError {
        LexError {
            message: message.into(),
            line,
            column,
        }
    }

    fn rest(&self) -> &[u8] {
        &self.src[self.pos..]
    }

    /// Copies the raw source slice `[start, end)` as token text.
    fn slice(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.src[start..end]).into_owned()
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while self.pos < self.src.len() {
            let line = self.line;
            let column = self.column();
            let b = self.src[self.pos];

            let token = match b {
                b'\n' => {
                    self.pos += 1;
                    self.line += 1;
                    self.line_start = self.pos;
                    Some((TokenKind::Newline, "\n".to_string()))
                }
                b' ' | b'\t' | b'\r' => {
                    self.pos += 1;
                    None
                }
                b'/' if self.rest().starts_with(b"//") => {
                    Some((TokenKind::Comment, self.line_comment()))
                }
                b'/' if self.rest().starts_with(b"/*") => {
                    Some((TokenKind::Comment, self.block_comment(line, column)?))
                }
                b'"' => Some((TokenKind::Str, self.string_literal(line, column)?)),
                b'\'' => Some((TokenKind::Char, self.char_literal(line, column)?)),
                b'0'..=b'9' => Some(self.number()),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => Some(self.word()),
                _ => {
                    if let Some(op) = self.operator() {
                        self.pos += op.len();
                        Some((TokenKind::Operator, op.to_string()))
                    } else if SEPARATORS.contains(&b) {
                        self.pos += 1;
                        Some((TokenKind::Separator, (b as char).to_string()))
                    } else {
                        return Err(self.error("invalid character", line, column));
                    }
                }
            };

            if let Some((kind, text)) = token {
                tokens.push(Token {
                    kind,
                    text,
                    line,
                    column,
                });
            }
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line: self.line,
            column: self.column(),
        });
        Ok(tokens)
    }

    /// Finds the longest operator spelling at the current position.
    fn operator(&self) -> Option<&'static str> {
        let rest = self.rest();
        OPERATORS
            .iter()
            .filter(|op| rest.starts_with(op.as_bytes()))
            .max_by_key(|op| op.len())
            .copied()
    }

    fn line_comment(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
            self.pos += 1;
        }
        self.slice(start, self.pos)
    }

    /// Consumes a `/* ... */` comment, tracking embedded newlines.
    fn block_comment(&mut self, line: usize, column: usize) -> Result<String, LexError> {
        let start = self.pos;
        self.pos += 2;
        while self.pos < self.src.len() {
            if self.rest().starts_with(b"*/") {
                self.pos += 2;
                return Ok(self.slice(start, self.pos));
            }
            if self.src[self.pos] == b'\n' {
                self.line += 1;
                self.line_start = self.pos + 1;
            }
            self.pos += 1;
        }
        Err(self.error("unterminated block comment", line, column))
    }

    /// Decodes the escapes a string literal recognizes. Unknown escapes
    /// stand for the escaped character itself.
    fn string_escape(b: u8) -> u8 {
        match b {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            other => other,
        }
    }

    fn string_literal(&mut self, line: usize, column: usize) -> Result<String, LexError> {
        self.pos += 1;
        let mut decoded = Vec::new();
        while self.pos < self.src.len() {
            match self.src[self.pos] {
                b'"' => {
                    self.pos += 1;
                    return Ok(String::from_utf8_lossy(&decoded).into_owned());
                }
                b'\n' => break,
                b'\\' if self.pos + 1 < self.src.len() => {
                    decoded.push(Self::string_escape(self.src[self.pos + 1]));
                    self.pos += 2;
                }
                other => {
                    decoded.push(other);
                    self.pos += 1;
                }
            }
        }
        Err(self.error("unterminated string literal", line, column))
    }

    fn char_literal(&mut self, line: usize, column: usize) -> Result<String, LexError> {
        self.pos += 1;
        let decoded = match *self.rest() {
            [b'\\', esc, ..] => {
                self.pos += 2;
                match esc {
                    b'0' => b'\0',
                    other => Self::string_escape(other),
                }
            }
            [b, ..] if b != b'\'' && b != b'\n' => {
                self.pos += 1;
                b
            }
            _ => return Err(self.error("malformed character literal", line, column)),
        };
        if self.rest().first() != Some(&b'\'') {
            return Err(self.error("malformed character literal", line, column));
        }
        self.pos += 1;
        Ok((decoded as char).to_string())
    }

    fn number(&mut self) -> (TokenKind, String) {
        let start = self.pos;
        let rest = self.rest();

        // Hexadecimal: 0x prefix with at least one digit
        if (rest.starts_with(b"0x") || rest.starts_with(b"0X"))
            && rest.get(2).is_some_and(|b| b.is_ascii_hexdigit())
        {
            self.pos += 2;
            while self.pos < self.src.len() && self.src[self.pos].is_ascii_hexdigit() {
                self.pos += 1;
            }
            return (TokenKind::Hex, self.slice(start, self.pos));
        }

        // Octal: leading zero with at least one octal digit
        if rest.starts_with(b"0") && rest.get(1).is_some_and(|b| (b'0'..=b'7').contains(b)) {
            self.pos += 1;
            while self.pos < self.src.len() && (b'0'..=b'7').contains(&self.src[self.pos]) {
                self.pos += 1;
            }
            return (TokenKind::Oct, self.slice(start, self.pos));
        }

        while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
            self.pos += 1;
        }

        // Float: fractional part required, exponent optional
        if self.rest().starts_with(b".") && self.rest().get(1).is_some_and(|b| b.is_ascii_digit())
        {
            self.pos += 1;
            while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            self.exponent();
            return (TokenKind::Float, self.slice(start, self.pos));
        }

        (TokenKind::Int, self.slice(start, self.pos))
    }

    /// Consumes `[eE][+-]?digits` if fully present; otherwise leaves the
    /// position untouched so a trailing `e` lexes as an identifier.
    fn exponent(&mut self) {
        let rest = self.rest();
        if !rest.starts_with(b"e") && !rest.starts_with(b"E") {
            return;
        }
        let mut digits = 1;
        if matches!(rest.get(1), Some(b'+') | Some(b'-')) {
            digits = 2;
        }
        if rest.get(digits).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += digits;
            while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
    }

    fn word(&mut self) -> (TokenKind, String) {
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_alphanumeric() || self.src[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let text = self.slice(start, self.pos);
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else if TYPES.contains(&text.as_str()) {
            TokenKind::Type
        } else {
            TokenKind::Identifier
        };
        (kind, text)
    }
}
