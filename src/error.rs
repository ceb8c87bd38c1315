//! Error taxonomy for every stage of the effect pipeline.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::effect::{SourcePos, StageKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("{at}: unexpected end of input")]
    UnexpectedEndOfInput { at: SourcePos },
    #[error("{at}: unterminated string literal")]
    UnterminatedString { at: SourcePos },
    #[error("{at}: unterminated block comment")]
    UnterminatedComment { at: SourcePos },
    #[error("{at}: unexpected character {ch:?}")]
    UnexpectedCharacter { ch: char, at: SourcePos },
}

impl LexError {
    pub fn position(&self) -> SourcePos {
        match self {
            LexError::UnexpectedEndOfInput { at }
            | LexError::UnterminatedString { at }
            | LexError::UnterminatedComment { at }
            | LexError::UnexpectedCharacter { at, .. } => *at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{at}: expected {expected}, found {found}")]
    TokenMismatch {
        expected: String,
        found: String,
        at: SourcePos,
    },
    #[error("{at}: expected keyword `{expected}`, found `{found}`")]
    KeywordMismatch {
        expected: String,
        found: String,
        at: SourcePos,
    },
    #[error("{at}: unknown identifier `{name}` in {context}")]
    UnknownIdentifier {
        name: String,
        context: &'static str,
        at: SourcePos,
    },
    #[error("{at}: `{value}` is not a valid {what}")]
    InvalidEnumValue {
        what: &'static str,
        value: String,
        at: SourcePos,
    },
    #[error("{at}: array size must not be negative, found {value}")]
    NegativeArraySize { value: f64, at: SourcePos },
    #[error("{at}: unterminated array suffix, expected `]`, found {found}")]
    UnterminatedArray { found: String, at: SourcePos },
    #[error("{at}: expected a non-negative integer for {what}, found {found}")]
    InvalidInteger {
        what: &'static str,
        found: String,
        at: SourcePos,
    },
    #[error("{at}: pass `{pass}` binds {what} more than once")]
    DuplicateLink {
        what: &'static str,
        pass: String,
        at: SourcePos,
    },
    #[error("{at}: Shader blocks nested deeper than {limit}")]
    NestingTooDeep { limit: usize, at: SourcePos },
}

impl ParseError {
    pub fn position(&self) -> SourcePos {
        match self {
            ParseError::Lex(e) => e.position(),
            ParseError::TokenMismatch { at, .. }
            | ParseError::KeywordMismatch { at, .. }
            | ParseError::UnknownIdentifier { at, .. }
            | ParseError::InvalidEnumValue { at, .. }
            | ParseError::NegativeArraySize { at, .. }
            | ParseError::UnterminatedArray { at, .. }
            | ParseError::InvalidInteger { at, .. }
            | ParseError::DuplicateLink { at, .. }
            | ParseError::NestingTooDeep { at, .. } => *at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("unresolved {kind} `{name}` referenced from `{scope}`")]
    UnresolvedReference {
        kind: &'static str,
        name: String,
        scope: String,
    },
    #[error("buffer `{buffer}` is bound with size {declared} but its fields add up to {computed}")]
    BufferSizeMismatch {
        buffer: String,
        declared: u32,
        computed: u32,
    },
    #[error("buffer `{buffer}` is larger than {max} bytes", max = u32::MAX)]
    BufferTooLarge { buffer: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("pass `{pass}` stage {stage_index} ({stage}): {message}")]
    Stage {
        pass: String,
        stage_index: usize,
        stage: StageKind,
        message: String,
    },
    #[error("pass `{pass}` stage {stage_index} ({stage}): compiler did not finish within {after:?}")]
    Timeout {
        pass: String,
        stage_index: usize,
        stage: StageKind,
        after: Duration,
    },
    #[error("pass `{pass}` stage {stage_index}: code fragment `{fragment}` is not bound")]
    UnboundFragment {
        pass: String,
        stage_index: usize,
        fragment: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("not an effect artifact (bad magic {found:02x?})")]
    BadMagic { found: [u8; 4] },
    #[error("unsupported artifact format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("artifact truncated at byte {offset}: needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },
    #[error("invalid UTF-8 string at byte {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("invalid {what} tag {value} at byte {offset}")]
    InvalidTag {
        what: &'static str,
        value: u32,
        offset: usize,
    },
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: u32,
        len: usize,
    },
    #[error("{count} trailing bytes after artifact end")]
    TrailingBytes { count: usize },
    #[error("length or index {value} does not fit in a u32 field")]
    FieldOverflow { value: usize },
}

/// Umbrella error for one file's pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl From<LexError> for Error {
    fn from(e: LexError) -> Self {
        Error::Parse(ParseError::Lex(e))
    }
}
