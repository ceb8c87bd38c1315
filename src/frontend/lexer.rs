//! Tokenizer for ShaderFX sources.
//!
//! Tokens borrow their text from the source buffer. The token stream is finite and cannot
//! be restarted: asking for another token after [`TokenKind::EndOfStream`] is an error.
//! The parser uses [`Lexer::checkpoint`]/[`Lexer::rewind`] for its one-token lookahead.

use std::{borrow::Cow, fmt};

use crate::{effect::SourcePos, error::LexError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Less,
    Greater,
    Equals,
    Hash,
    Comma,
    Colon,
    Semicolon,
    Asterisk,
    Identifier,
    String,
    Number,
    EndOfStream,
}

impl TokenKind {
    fn from_symbol(b: u8) -> Option<Self> {
        Some(match b {
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b'[' => TokenKind::LeftBracket,
            b']' => TokenKind::RightBracket,
            b'<' => TokenKind::Less,
            b'>' => TokenKind::Greater,
            b'=' => TokenKind::Equals,
            b'#' => TokenKind::Hash,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b'*' => TokenKind::Asterisk,
            _ => return None,
        })
    }

    /// How the kind reads in "expected ..." diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::LeftParen => "`(`",
            TokenKind::RightParen => "`)`",
            TokenKind::LeftBrace => "`{`",
            TokenKind::RightBrace => "`}`",
            TokenKind::LeftBracket => "`[`",
            TokenKind::RightBracket => "`]`",
            TokenKind::Less => "`<`",
            TokenKind::Greater => "`>`",
            TokenKind::Equals => "`=`",
            TokenKind::Hash => "`#`",
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Asterisk => "`*`",
            TokenKind::Identifier => "identifier",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::EndOfStream => "end of input",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw source slice. For strings this excludes the quotes and keeps escapes verbatim.
    pub text: &'a str,
    pub number: Option<f64>,
    pub at: SourcePos,
}

impl<'a> Token<'a> {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == keyword
    }

    /// Integral value of a number token written without a fractional part.
    pub fn as_integer(&self) -> Option<i64> {
        let value = self.number?;
        if self.text.contains('.') || value.fract() != 0.0 {
            return None;
        }
        Some(value as i64)
    }

    /// Decoded string literal contents.
    pub fn unescaped(&self) -> Cow<'a, str> {
        if !self.text.contains('\\') {
            return Cow::Borrowed(self.text);
        }
        let mut out = String::with_capacity(self.text.len());
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => {}
            }
        }
        Cow::Owned(out)
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::EndOfStream => f.write_str("end of input"),
            TokenKind::String => write!(f, "\"{}\"", self.text),
            _ => write!(f, "`{}`", self.text),
        }
    }
}

/// Saved lexer position for backtracking.
#[derive(Clone, Copy, Debug)]
pub struct Checkpoint {
    pos: usize,
    line: u32,
    column: u32,
    finished: bool,
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    pub fn position(&self) -> SourcePos {
        SourcePos {
            line: self.line,
            column: self.column,
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            line: self.line,
            column: self.column,
            finished: self.finished,
        }
    }

    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.line = checkpoint.line;
        self.column = checkpoint.column;
        self.finished = checkpoint.finished;
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b & 0xC0 != 0x80 {
            // UTF-8 continuation bytes do not start a new column.
            self.column += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek_byte() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.bump();
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'/') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'*') => {
                    let at = self.position();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek_byte() {
                            None => return Err(LexError::UnterminatedComment { at }),
                            Some(b'*') if self.peek_byte_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        if self.finished {
            return Err(LexError::UnexpectedEndOfInput {
                at: self.position(),
            });
        }
        self.skip_trivia()?;

        let at = self.position();
        let start = self.pos;
        let Some(b) = self.peek_byte() else {
            self.finished = true;
            return Ok(Token {
                kind: TokenKind::EndOfStream,
                text: "",
                number: None,
                at,
            });
        };

        if let Some(kind) = TokenKind::from_symbol(b) {
            self.bump();
            return Ok(self.token(kind, start, at));
        }

        match b {
            b'"' => self.lex_string(at),
            b'-' | b'0'..=b'9' => self.lex_number(start, at),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                while matches!(self.peek_byte(), Some(b) if b.is_ascii_alphanumeric() || b == b'_')
                {
                    self.bump();
                }
                Ok(self.token(TokenKind::Identifier, start, at))
            }
            _ => {
                let ch = self.source[start..].chars().next().unwrap_or('\u{fffd}');
                Err(LexError::UnexpectedCharacter { ch, at })
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize, at: SourcePos) -> Token<'a> {
        Token {
            kind,
            text: &self.source[start..self.pos],
            number: None,
            at,
        }
    }

    fn lex_string(&mut self, at: SourcePos) -> Result<Token<'a>, LexError> {
        self.bump();
        let start = self.pos;
        loop {
            match self.peek_byte() {
                None | Some(b'\n') => return Err(LexError::UnterminatedString { at }),
                Some(b'\\') => {
                    self.bump();
                    match self.peek_byte() {
                        None | Some(b'\n') => return Err(LexError::UnterminatedString { at }),
                        Some(_) => {
                            self.bump();
                        }
                    }
                }
                Some(b'"') => {
                    let text = &self.source[start..self.pos];
                    self.bump();
                    return Ok(Token {
                        kind: TokenKind::String,
                        text,
                        number: None,
                        at,
                    });
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn lex_number(&mut self, start: usize, at: SourcePos) -> Result<Token<'a>, LexError> {
        let negative = self.peek_byte() == Some(b'-');
        if negative {
            self.bump();
            match self.peek_byte() {
                Some(b'0'..=b'9') => {}
                None => return Err(LexError::UnexpectedEndOfInput { at: self.position() }),
                Some(_) => return Err(LexError::UnexpectedCharacter { ch: '-', at }),
            }
        }

        while self.peek_byte() == Some(b'0') {
            self.bump();
        }
        let mut value = 0.0f64;
        while let Some(d @ b'0'..=b'9') = self.peek_byte() {
            value = value * 10.0 + f64::from(d - b'0');
            self.bump();
        }

        if self.peek_byte() == Some(b'.') {
            self.bump();
            let mut scale = 0.1f64;
            while let Some(d @ b'0'..=b'9') = self.peek_byte() {
                value += f64::from(d - b'0') * scale;
                scale *= 0.1;
                self.bump();
            }
        }

        let mut token = self.token(TokenKind::Number, start, at);
        let value = if negative { -value } else { value };
        token.number = Some(token.text.parse().unwrap_or(value));
        Ok(token)
    }

    /// Captures the raw text between the next `{` and its matching `}`.
    ///
    /// Braces are counted byte-wise; nothing inside the block is tokenized.
    pub fn capture_braced(&mut self) -> Result<(&'a str, SourcePos), LexError> {
        self.skip_trivia()?;
        let at = self.position();
        match self.peek_byte() {
            Some(b'{') => {
                self.bump();
            }
            None => return Err(LexError::UnexpectedEndOfInput { at }),
            Some(_) => {
                let ch = self.source[self.pos..].chars().next().unwrap_or('\u{fffd}');
                return Err(LexError::UnexpectedCharacter { ch, at });
            }
        }

        let start = self.pos;
        let mut depth = 1usize;
        loop {
            match self.peek_byte() {
                None => {
                    return Err(LexError::UnexpectedEndOfInput {
                        at: self.position(),
                    });
                }
                Some(b'{') => depth += 1,
                Some(b'}') => {
                    depth -= 1;
                    if depth == 0 {
                        let text = &self.source[start..self.pos];
                        self.bump();
                        return Ok((text, at));
                    }
                }
                Some(_) => {}
            }
            self.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token().expect("lex");
            out.push(t.kind);
            if t.kind == TokenKind::EndOfStream {
                return out;
            }
        }
    }

    #[test]
    fn lexes_symbols_identifiers_and_numbers() {
        use TokenKind::*;
        assert_eq!(
            kinds("Attribute Float3 Pos 0 1 12; (){}[]<>=#,:*"),
            vec![
                Identifier, Identifier, Identifier, Number, Number, Number, Semicolon, LeftParen,
                RightParen, LeftBrace, RightBrace, LeftBracket, RightBracket, Less, Greater,
                Equals, Hash, Comma, Colon, Asterisk, EndOfStream,
            ]
        );
    }

    #[test]
    fn numbers_skip_leading_zeros_and_parse_fractions() {
        let mut lexer = Lexer::new("007 -2.5 1.");
        let a = lexer.next_token().unwrap();
        assert_eq!(a.number, Some(7.0));
        assert_eq!(a.text, "007");
        assert_eq!(a.as_integer(), Some(7));
        let b = lexer.next_token().unwrap();
        assert_eq!(b.number, Some(-2.5));
        assert_eq!(b.as_integer(), None);
        let c = lexer.next_token().unwrap();
        assert_eq!(c.number, Some(1.0));
        assert_eq!(c.as_integer(), None);
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let mut lexer = Lexer::new("// one\n/* two\nthree */ Name");
        let t = lexer.next_token().unwrap();
        assert_eq!(t.text, "Name");
        assert_eq!(t.at, SourcePos { line: 3, column: 10 });
    }

    #[test]
    fn string_escapes_are_kept_raw_and_decoded_on_demand() {
        let mut lexer = Lexer::new(r#""a\"b\n""#);
        let t = lexer.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::String);
        assert_eq!(t.text, r#"a\"b\n"#);
        assert_eq!(t.unescaped(), "a\"b\n");
    }

    #[test]
    fn reports_lex_errors_with_position() {
        assert_eq!(
            Lexer::new("  \"abc\n\"").next_token(),
            Err(LexError::UnterminatedString {
                at: SourcePos { line: 1, column: 3 }
            })
        );
        assert_eq!(
            Lexer::new("/* never closed").next_token(),
            Err(LexError::UnterminatedComment {
                at: SourcePos::START
            })
        );
        assert_eq!(
            Lexer::new("\n  $").next_token(),
            Err(LexError::UnexpectedCharacter {
                ch: '$',
                at: SourcePos { line: 2, column: 3 }
            })
        );
        assert!(matches!(
            Lexer::new("-").next_token(),
            Err(LexError::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn stream_is_not_restartable() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Identifier);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EndOfStream);
        assert!(matches!(
            lexer.next_token(),
            Err(LexError::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn rewind_restores_position() {
        let mut lexer = Lexer::new("UInt [ 4 ]");
        lexer.next_token().unwrap();
        let cp = lexer.checkpoint();
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::LeftBracket);
        lexer.rewind(cp);
        let t = lexer.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::LeftBracket);
        assert_eq!(t.at, SourcePos { line: 1, column: 6 });
    }

    #[test]
    fn capture_braced_preserves_nested_braces() {
        let mut lexer = Lexer::new("Foo { void main() { if (x) { y(); } } } tail");
        lexer.next_token().unwrap();
        let (text, _) = lexer.capture_braced().unwrap();
        assert_eq!(text, " void main() { if (x) { y(); } } ");
        assert_eq!(lexer.next_token().unwrap().text, "tail");
    }

    #[test]
    fn capture_braced_reports_missing_close() {
        let mut lexer = Lexer::new("{ void main() {");
        assert!(matches!(
            lexer.capture_braced(),
            Err(LexError::UnexpectedEndOfInput { .. })
        ));
    }
}
