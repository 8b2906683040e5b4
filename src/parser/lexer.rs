//! ECMAScript 5.1 tokenizer.
//!
//! The parser consumes tokens through a narrow interface: `next_token` with a
//! caller-selected regexp mode, a one-slot pushback, `seek` to a previously
//! observed source position, and a strict-mode switch that changes octal
//! handling and the future-reserved-word set. Newline runs surface as
//! `TOK_NEWLINE` tokens so automatic semicolon insertion can consult them.

use crate::lit::LitTable;

use super::tokens::{
    keyword_from_bytes, TOK_AND_ASSIGN, TOK_DEC, TOK_DIV_ASSIGN, TOK_EOF, TOK_EQ,
    TOK_FIRST_KEYWORD, TOK_GTE, TOK_IDENT, TOK_INC, TOK_LAND, TOK_LOR, TOK_LTE, TOK_MINUS_ASSIGN,
    TOK_MOD_ASSIGN, TOK_MUL_ASSIGN, TOK_NEQ, TOK_NEWLINE, TOK_NUMBER, TOK_OR_ASSIGN,
    TOK_PLUS_ASSIGN, TOK_REGEXP, TOK_SAR, TOK_SAR_ASSIGN, TOK_SHL, TOK_SHL_ASSIGN, TOK_SHR,
    TOK_SHR_ASSIGN, TOK_SMALL_INT, TOK_STRICT_EQ, TOK_STRICT_NEQ, TOK_STRING, TOK_XOR_ASSIGN,
};
use super::types::{SourcePos, Token, TokenExtra};

const DECIMAL_FORMAT: u128 = lexical_core::format::STANDARD;
const PARSE_OPTIONS: lexical_core::ParseFloatOptions =
    lexical_core::ParseFloatOptions::builder().build_strict();

const ERR_INVALID_CHARACTER: &str = "invalid character";
const ERR_UNTERMINATED_STRING: &str = "unterminated string literal";
const ERR_UNTERMINATED_COMMENT: &str = "unterminated comment";
const ERR_UNTERMINATED_REGEXP: &str = "unterminated regexp literal";
const ERR_INVALID_NUMBER: &str = "invalid number literal";
const ERR_INVALID_ESCAPE: &str = "invalid escape sequence";
const ERR_OCTAL_IN_STRICT: &str = "octal literals are not allowed in strict mode";
const ERR_OCTAL_ESCAPE_IN_STRICT: &str = "octal escape sequences are not allowed in strict mode";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexError {
    message: &'static str,
    position: usize,
}

impl LexError {
    fn new(message: &'static str, position: usize) -> Self {
        Self { message, position }
    }

    pub fn message(&self) -> &'static str {
        self.message
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

pub fn is_ident_first(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

pub fn is_ident_next(c: u8) -> bool {
    is_ident_first(c) || c.is_ascii_digit()
}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    token: Token,
    prev_token_val: i32,
    saved: Option<Token>,
    strict_mode: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        let mut pos = 0;
        if source.starts_with(&[0xef, 0xbb, 0xbf]) {
            pos = 3;
        }
        Self {
            source,
            pos,
            token: Token::new(TOK_EOF, 0, TokenExtra::None),
            prev_token_val: TOK_EOF,
            saved: None,
            strict_mode: false,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn prev_token_val(&self) -> i32 {
        self.prev_token_val
    }

    pub fn set_strict_mode(&mut self, strict_mode: bool) {
        self.strict_mode = strict_mode;
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// One-slot pushback: the given token is replayed by the next
    /// `next_token` call. The current token is left untouched.
    pub fn save_token(&mut self, token: Token) {
        debug_assert!(self.saved.is_none());
        self.saved = Some(token);
    }

    /// Overwrite the current token. Paired with `save_token` to step back
    /// one token when a two-token lookahead is abandoned.
    pub fn set_current(&mut self, token: Token) {
        self.token = token;
    }

    /// Reposition to a previously observed token start. Invalidates the
    /// pushback slot; the caller must fetch the next token before reading.
    pub fn seek(&mut self, pos: SourcePos) {
        self.pos = pos as usize;
        self.saved = None;
        self.prev_token_val = TOK_EOF;
    }

    pub fn next_token(
        &mut self,
        lits: &mut LitTable,
        allow_regex: bool,
    ) -> Result<(), LexError> {
        // A pushed-back token replays the current position; the previous
        // token is only updated when the stream actually advances.
        if let Some(saved) = self.saved.take() {
            self.token = saved;
            return Ok(());
        }
        self.prev_token_val = self.token.val();
        self.token = self.scan_token(lits, allow_regex)?;
        Ok(())
    }

    fn peek(&self, off: usize) -> Option<u8> {
        self.source.get(self.pos + off).copied()
    }

    fn is_line_terminator_at(&self, pos: usize) -> Option<usize> {
        match self.source.get(pos) {
            Some(b'\n') => Some(1),
            Some(b'\r') => {
                if self.source.get(pos + 1) == Some(&b'\n') {
                    Some(2)
                } else {
                    Some(1)
                }
            }
            // U+2028 / U+2029
            Some(0xe2) => {
                if self.source.get(pos + 1) == Some(&0x80)
                    && matches!(self.source.get(pos + 2), Some(&0xa8) | Some(&0xa9))
                {
                    Some(3)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn scan_token(&mut self, lits: &mut LitTable, allow_regex: bool) -> Result<Token, LexError> {
        let mut got_newline = false;
        loop {
            match self.peek(0) {
                None => {
                    if got_newline {
                        return Ok(Token::new(
                            TOK_NEWLINE,
                            self.pos as SourcePos,
                            TokenExtra::None,
                        ));
                    }
                    return Ok(Token::new(TOK_EOF, self.pos as SourcePos, TokenExtra::None));
                }
                Some(b' ') | Some(b'\t') | Some(0x0b) | Some(0x0c) => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek(1) == Some(b'/') => {
                    self.pos += 2;
                    while self.peek(0).is_some() && self.is_line_terminator_at(self.pos).is_none() {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        if self.peek(0) == Some(b'*') && self.peek(1) == Some(b'/') {
                            self.pos += 2;
                            break;
                        }
                        if let Some(len) = self.is_line_terminator_at(self.pos) {
                            got_newline = true;
                            self.pos += len;
                        } else if self.peek(0).is_some() {
                            self.pos += 1;
                        } else {
                            return Err(LexError::new(ERR_UNTERMINATED_COMMENT, start));
                        }
                    }
                }
                _ => {
                    if let Some(len) = self.is_line_terminator_at(self.pos) {
                        let newline_pos = self.pos;
                        self.pos += len;
                        // Collapse the whole newline run into one token.
                        while let Some(next_len) = self.is_line_terminator_at(self.pos) {
                            self.pos += next_len;
                        }
                        return Ok(Token::new(
                            TOK_NEWLINE,
                            newline_pos as SourcePos,
                            TokenExtra::None,
                        ));
                    }
                    if got_newline {
                        return Ok(Token::new(
                            TOK_NEWLINE,
                            self.pos as SourcePos,
                            TokenExtra::None,
                        ));
                    }
                    break;
                }
            }
        }

        let start = self.pos;
        let c = self.source[start];

        if is_ident_first(c) {
            return Ok(self.scan_identifier(lits));
        }
        if c.is_ascii_digit() || (c == b'.' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) {
            return self.scan_number(lits);
        }
        if c == b'"' || c == b'\'' {
            return self.scan_string(lits);
        }
        if c == b'/' && allow_regex {
            return self.scan_regexp(lits);
        }
        self.scan_punctuator()
    }

    fn scan_identifier(&mut self, lits: &mut LitTable) -> Token {
        let start = self.pos;
        while self.peek(0).is_some_and(is_ident_next) {
            self.pos += 1;
        }
        let bytes = &self.source[start..self.pos];
        if let Some(kw) = keyword_from_bytes(bytes, self.strict_mode) {
            return Token::new(
                TOK_FIRST_KEYWORD + kw as i32,
                start as SourcePos,
                TokenExtra::None,
            );
        }
        let lit = lits.intern_string(bytes);
        Token::new(TOK_IDENT, start as SourcePos, TokenExtra::Ident(lit))
    }

    fn number_token(&self, lits: &mut LitTable, start: usize, value: f64) -> Token {
        if value.fract() == 0.0 && (0.0..=255.0).contains(&value) {
            return Token::new(
                TOK_SMALL_INT,
                start as SourcePos,
                TokenExtra::SmallInt(value as u8),
            );
        }
        let lit = lits.intern_number(value);
        Token::new(TOK_NUMBER, start as SourcePos, TokenExtra::Number(lit))
    }

    fn scan_number(&mut self, lits: &mut LitTable) -> Result<Token, LexError> {
        let start = self.pos;

        if self.peek(0) == Some(b'0') && matches!(self.peek(1), Some(b'x') | Some(b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            let mut value = 0f64;
            while let Some(d) = self.peek(0).and_then(from_hex) {
                value = value * 16.0 + d as f64;
                self.pos += 1;
            }
            if self.pos == digits_start || self.peek(0).is_some_and(is_ident_next) {
                return Err(LexError::new(ERR_INVALID_NUMBER, start));
            }
            return Ok(self.number_token(lits, start, value));
        }

        if self.peek(0) == Some(b'0') && self.peek(1).is_some_and(|d| d.is_ascii_digit()) {
            // Legacy octal literal.
            if self.strict_mode {
                return Err(LexError::new(ERR_OCTAL_IN_STRICT, start));
            }
            self.pos += 1;
            let mut value = 0f64;
            while let Some(d) = self.peek(0) {
                if !(b'0'..=b'7').contains(&d) {
                    break;
                }
                value = value * 8.0 + (d - b'0') as f64;
                self.pos += 1;
            }
            if self.peek(0).is_some_and(is_ident_next) {
                return Err(LexError::new(ERR_INVALID_NUMBER, start));
            }
            return Ok(self.number_token(lits, start, value));
        }

        while self.peek(0).is_some_and(|d| d.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some(b'.') {
            self.pos += 1;
            while self.peek(0).is_some_and(|d| d.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some(b'e') | Some(b'E')) {
            let mut exp_len = 1;
            if matches!(self.peek(1), Some(b'+') | Some(b'-')) {
                exp_len = 2;
            }
            if self.peek(exp_len).is_some_and(|d| d.is_ascii_digit()) {
                self.pos += exp_len;
                while self.peek(0).is_some_and(|d| d.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                return Err(LexError::new(ERR_INVALID_NUMBER, start));
            }
        }
        if self.peek(0).is_some_and(is_ident_next) {
            return Err(LexError::new(ERR_INVALID_NUMBER, start));
        }

        let text = &self.source[start..self.pos];
        let value = lexical_core::parse_with_options::<f64, DECIMAL_FORMAT>(text, &PARSE_OPTIONS)
            .map_err(|_| LexError::new(ERR_INVALID_NUMBER, start))?;
        Ok(self.number_token(lits, start, value))
    }

    fn scan_string(&mut self, lits: &mut LitTable) -> Result<Token, LexError> {
        let start = self.pos;
        let quote = self.source[start];
        self.pos += 1;
        let mut value: Vec<u8> = Vec::new();
        let mut has_escape = false;

        loop {
            let c = match self.peek(0) {
                Some(c) => c,
                None => return Err(LexError::new(ERR_UNTERMINATED_STRING, start)),
            };
            if c == quote {
                self.pos += 1;
                break;
            }
            if self.is_line_terminator_at(self.pos).is_some() {
                return Err(LexError::new(ERR_UNTERMINATED_STRING, start));
            }
            if c != b'\\' {
                value.push(c);
                self.pos += 1;
                continue;
            }

            has_escape = true;
            self.pos += 1;
            if let Some(len) = self.is_line_terminator_at(self.pos) {
                // Line continuation contributes no characters.
                self.pos += len;
                continue;
            }
            let esc = match self.peek(0) {
                Some(esc) => esc,
                None => return Err(LexError::new(ERR_UNTERMINATED_STRING, start)),
            };
            self.pos += 1;
            match esc {
                b'b' => value.push(0x08),
                b't' => value.push(b'\t'),
                b'n' => value.push(b'\n'),
                b'v' => value.push(0x0b),
                b'f' => value.push(0x0c),
                b'r' => value.push(b'\r'),
                b'x' => {
                    let hi = self.peek(0).and_then(from_hex);
                    let lo = self.peek(1).and_then(from_hex);
                    match (hi, lo) {
                        (Some(hi), Some(lo)) => {
                            self.pos += 2;
                            push_code_point(&mut value, ((hi << 4) | lo) as u32);
                        }
                        _ => return Err(LexError::new(ERR_INVALID_ESCAPE, self.pos - 2)),
                    }
                }
                b'u' => {
                    let mut code = 0u32;
                    for i in 0..4 {
                        match self.peek(i).and_then(from_hex) {
                            Some(d) => code = (code << 4) | d as u32,
                            None => return Err(LexError::new(ERR_INVALID_ESCAPE, self.pos - 2)),
                        }
                    }
                    self.pos += 4;
                    push_code_point(&mut value, code);
                }
                b'0'..=b'7' => {
                    let followed_by_digit =
                        self.peek(0).is_some_and(|d| d.is_ascii_digit());
                    if esc == b'0' && !followed_by_digit {
                        value.push(0);
                    } else if self.strict_mode {
                        return Err(LexError::new(ERR_OCTAL_ESCAPE_IN_STRICT, self.pos - 2));
                    } else {
                        let mut code = (esc - b'0') as u32;
                        let max_len = if esc <= b'3' { 2 } else { 1 };
                        for _ in 0..max_len {
                            match self.peek(0) {
                                Some(d) if (b'0'..=b'7').contains(&d) => {
                                    code = code * 8 + (d - b'0') as u32;
                                    self.pos += 1;
                                }
                                _ => break,
                            }
                        }
                        push_code_point(&mut value, code);
                    }
                }
                b'8' | b'9' => return Err(LexError::new(ERR_INVALID_ESCAPE, self.pos - 2)),
                other => value.push(other),
            }
        }

        let lit = lits.intern_string(&value);
        Ok(Token::new(
            TOK_STRING,
            start as SourcePos,
            TokenExtra::String { lit, has_escape },
        ))
    }

    fn scan_regexp(&mut self, lits: &mut LitTable) -> Result<Token, LexError> {
        let start = self.pos;
        debug_assert_eq!(self.source[start], b'/');
        self.pos += 1;
        let mut in_class = false;
        loop {
            let c = match self.peek(0) {
                Some(c) => c,
                None => return Err(LexError::new(ERR_UNTERMINATED_REGEXP, start)),
            };
            if self.is_line_terminator_at(self.pos).is_some() {
                return Err(LexError::new(ERR_UNTERMINATED_REGEXP, start));
            }
            self.pos += 1;
            match c {
                b'\\' => {
                    if self.peek(0).is_none() {
                        return Err(LexError::new(ERR_UNTERMINATED_REGEXP, start));
                    }
                    self.pos += 1;
                }
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => break,
                _ => {}
            }
        }
        while self.peek(0).is_some_and(is_ident_next) {
            self.pos += 1;
        }
        let lit = lits.intern_string(&self.source[start..self.pos]);
        Ok(Token::new(
            TOK_REGEXP,
            start as SourcePos,
            TokenExtra::Regexp(lit),
        ))
    }

    fn scan_punctuator(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let rest = &self.source[start..];
        // Longest match first.
        const PUNCTUATORS: [(&[u8], i32); 25] = [
            (b">>>=", TOK_SHR_ASSIGN),
            (b">>>", TOK_SHR),
            (b"===", TOK_STRICT_EQ),
            (b"!==", TOK_STRICT_NEQ),
            (b">>=", TOK_SAR_ASSIGN),
            (b"<<=", TOK_SHL_ASSIGN),
            (b"==", TOK_EQ),
            (b"!=", TOK_NEQ),
            (b"<=", TOK_LTE),
            (b">=", TOK_GTE),
            (b"&&", TOK_LAND),
            (b"||", TOK_LOR),
            (b"++", TOK_INC),
            (b"--", TOK_DEC),
            (b"<<", TOK_SHL),
            (b">>", TOK_SAR),
            (b"+=", TOK_PLUS_ASSIGN),
            (b"-=", TOK_MINUS_ASSIGN),
            (b"*=", TOK_MUL_ASSIGN),
            (b"/=", TOK_DIV_ASSIGN),
            (b"%=", TOK_MOD_ASSIGN),
            (b"&=", TOK_AND_ASSIGN),
            (b"|=", TOK_OR_ASSIGN),
            (b"^=", TOK_XOR_ASSIGN),
            (b"", 0),
        ];
        for (text, tok) in PUNCTUATORS {
            if !text.is_empty() && rest.starts_with(text) {
                self.pos += text.len();
                return Ok(Token::new(tok, start as SourcePos, TokenExtra::None));
            }
        }
        let c = rest[0];
        if matches!(
            c,
            b'{' | b'}'
                | b'('
                | b')'
                | b'['
                | b']'
                | b';'
                | b','
                | b'.'
                | b':'
                | b'?'
                | b'~'
                | b'!'
                | b'%'
                | b'^'
                | b'&'
                | b'*'
                | b'-'
                | b'+'
                | b'='
                | b'|'
                | b'<'
                | b'>'
                | b'/'
        ) {
            self.pos += 1;
            return Ok(Token::new(c as i32, start as SourcePos, TokenExtra::None));
        }
        Err(LexError::new(ERR_INVALID_CHARACTER, start))
    }
}

fn from_hex(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn push_code_point(out: &mut Vec<u8>, code: u32) {
    match char::from_u32(code) {
        Some(ch) => {
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
        None => {
            // Lone surrogates survive as replacement characters.
            out.extend_from_slice("\u{fffd}".as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokens::{Keyword, TOK_FUNCTION, TOK_VAR};

    fn all_tokens(source: &[u8]) -> Vec<i32> {
        let mut lits = LitTable::new();
        let mut lexer = Lexer::new(source);
        let mut vals = Vec::new();
        loop {
            lexer.next_token(&mut lits, false).expect("lex");
            let val = lexer.token().val();
            if val == TOK_EOF {
                break;
            }
            vals.push(val);
        }
        vals
    }

    #[test]
    fn scans_identifiers_and_keywords() {
        let vals = all_tokens(b"var x = function");
        assert_eq!(vals, vec![TOK_VAR, TOK_IDENT, '=' as i32, TOK_FUNCTION]);
    }

    #[test]
    fn strict_reserved_words_are_identifiers_when_lax() {
        let mut lits = LitTable::new();
        let mut lexer = Lexer::new(b"let");
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), TOK_IDENT);

        let mut lexer = Lexer::new(b"let");
        lexer.set_strict_mode(true);
        lexer.next_token(&mut lits, false).unwrap();
        assert!(lexer.token().val() >= TOK_FIRST_KEYWORD + Keyword::Implements as i32);
    }

    #[test]
    fn newline_runs_collapse_to_one_token() {
        let vals = all_tokens(b"a\n\n\nb");
        assert_eq!(vals, vec![TOK_IDENT, TOK_NEWLINE, TOK_IDENT]);
    }

    #[test]
    fn numbers_classify_small_ints() {
        let mut lits = LitTable::new();
        let mut lexer = Lexer::new(b"255 256 1.5 0x10");
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), TOK_SMALL_INT);
        assert_eq!(lexer.token().extra(), TokenExtra::SmallInt(255));
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), TOK_NUMBER);
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), TOK_NUMBER);
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), TOK_SMALL_INT);
        assert_eq!(lexer.token().extra(), TokenExtra::SmallInt(16));
    }

    #[test]
    fn octal_literals_respect_strict_mode() {
        let mut lits = LitTable::new();
        let mut lexer = Lexer::new(b"010");
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().extra(), TokenExtra::SmallInt(8));

        let mut lexer = Lexer::new(b"010");
        lexer.set_strict_mode(true);
        let err = lexer.next_token(&mut lits, false).unwrap_err();
        assert_eq!(err.message(), ERR_OCTAL_IN_STRICT);
    }

    #[test]
    fn string_escapes_and_flag() {
        let mut lits = LitTable::new();
        let mut lexer = Lexer::new(b"'a\\n' \"plain\"");
        lexer.next_token(&mut lits, false).unwrap();
        let TokenExtra::String { lit, has_escape } = lexer.token().extra() else {
            panic!("expected string");
        };
        assert!(has_escape);
        assert!(lits.str_equals(lit, b"a\n"));
        lexer.next_token(&mut lits, false).unwrap();
        lexer.next_token(&mut lits, false).unwrap();
        let TokenExtra::String { lit, has_escape } = lexer.token().extra() else {
            panic!("expected string");
        };
        assert!(!has_escape);
        assert!(lits.str_equals(lit, b"plain"));
    }

    #[test]
    fn regexp_only_when_allowed() {
        let mut lits = LitTable::new();
        let mut lexer = Lexer::new(b"/ab[/]c/gi");
        lexer.next_token(&mut lits, true).unwrap();
        assert_eq!(lexer.token().val(), TOK_REGEXP);
        let TokenExtra::Regexp(lit) = lexer.token().extra() else {
            panic!("expected regexp");
        };
        assert!(lits.str_equals(lit, b"/ab[/]c/gi"));

        let mut lexer = Lexer::new(b"/x/");
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), '/' as i32);
    }

    #[test]
    fn seek_and_pushback_replay_tokens() {
        let mut lits = LitTable::new();
        let mut lexer = Lexer::new(b"a + b");
        lexer.next_token(&mut lits, false).unwrap();
        let ident = lexer.token();
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), '+' as i32);
        let plus = lexer.token();
        lexer.save_token(plus);
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), '+' as i32);

        lexer.seek(ident.pos());
        lexer.next_token(&mut lits, false).unwrap();
        assert_eq!(lexer.token().val(), TOK_IDENT);
        assert_eq!(lexer.token().pos(), ident.pos());
    }

    #[test]
    fn punctuators_longest_match() {
        let vals = all_tokens(b">>>= >>> >> >=");
        assert_eq!(vals, vec![TOK_SHR_ASSIGN, TOK_SHR, TOK_SAR, TOK_GTE]);
    }

    #[test]
    fn block_comment_with_newline_is_a_newline() {
        let vals = all_tokens(b"a /* x\ny */ b");
        assert_eq!(vals, vec![TOK_IDENT, TOK_NEWLINE, TOK_IDENT]);
    }
}
