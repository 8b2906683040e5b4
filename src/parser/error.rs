use std::borrow::Cow;
use std::fmt;

use super::lexer::LexError;

/// Early-error category surfaced at the compilation boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Syntax,
    Reference,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParserErrorKind {
    Static(&'static str),
    ExpectingChar(u8),
}

#[derive(Clone, PartialEq, Eq)]
pub struct ParserError {
    class: ErrorClass,
    kind: ParserErrorKind,
    position: usize,
}

impl ParserError {
    pub fn syntax(message: &'static str, position: usize) -> Self {
        Self {
            class: ErrorClass::Syntax,
            kind: ParserErrorKind::Static(message),
            position,
        }
    }

    pub fn reference(message: &'static str, position: usize) -> Self {
        Self {
            class: ErrorClass::Reference,
            kind: ParserErrorKind::Static(message),
            position,
        }
    }

    pub fn expecting(ch: u8, position: usize) -> Self {
        Self {
            class: ErrorClass::Syntax,
            kind: ParserErrorKind::ExpectingChar(ch),
            position,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn kind(&self) -> ParserErrorKind {
        self.kind
    }

    pub fn message(&self) -> Cow<'static, str> {
        match self.kind {
            ParserErrorKind::Static(message) => Cow::Borrowed(message),
            ParserErrorKind::ExpectingChar(ch) => Cow::Owned(format!("expecting '{}'", ch as char)),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Debug for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ParserError {{ class: {:?}, message: \"{}\", position: {} }}",
            self.class, self, self.position
        )
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParserErrorKind::Static(message) => f.write_str(message),
            ParserErrorKind::ExpectingChar(ch) => write!(f, "expecting '{}'", ch as char),
        }
    }
}

impl From<LexError> for ParserError {
    fn from(err: LexError) -> Self {
        ParserError::syntax(err.message(), err.position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expecting_formats_the_character() {
        let err = ParserError::expecting(b';', 12);
        assert_eq!(err.message(), "expecting ';'");
        assert_eq!(err.position(), 12);
        assert_eq!(err.class(), ErrorClass::Syntax);
    }

    #[test]
    fn reference_errors_keep_their_class() {
        let err = ParserError::reference("invalid assignment", 3);
        assert_eq!(err.class(), ErrorClass::Reference);
        assert_eq!(err.message(), "invalid assignment");
    }
}
