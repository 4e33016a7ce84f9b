//! Turns Farr source text into a flat stream of [`Token`]s.
//!
//! The grammar this mirrors is a grouped one: at every position the lexer
//! tries comments, then number/string literals, then punctuation, then
//! identifiers/keywords, and takes the first group that can consume a
//! maximal chunk starting there. A leading `+`/`-` immediately followed by
//! a digit is swallowed into the literal itself rather than lexed as a
//! separate operator token — that is how the grammar is written, so
//! `5-3` lexes as two adjacent Integers, not `Integer Subtract Integer`.
//! Write arithmetic with a space around the operator to avoid it.

use crate::compiler::tokens::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("a strange thing was found! {span}")]
pub struct LexError {
    pub span: Span,
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    row: usize,
    col: usize,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("null", TokenKind::Null),
    ("use", TokenKind::Use),
    ("let", TokenKind::Variable),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("break!", TokenKind::Break),
    ("continue!", TokenKind::Continue),
    ("for", TokenKind::For),
    ("in", TokenKind::In),
    ("try", TokenKind::Try),
    ("catch", TokenKind::Catch),
    ("fn", TokenKind::Function),
    ("return!", TokenKind::Return),
    ("struct", TokenKind::Struct),
    ("match", TokenKind::Match),
];

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            row: 1,
            col: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while self.pos < self.source.len() {
            let ch = self.source[self.pos];
            if ch == '\n' || ch == '\r' {
                self.advance();
                continue;
            }
            if ch == ' ' || ch == '\t' {
                self.advance();
                continue;
            }
            if self.try_comment() {
                continue;
            }
            let span = self.here();
            if let Some(kind) = self.try_literal()? {
                tokens.push(Token::new(kind, span));
                continue;
            }
            if let Some(kind) = self.try_punctuation() {
                tokens.push(Token::new(kind, span));
                continue;
            }
            if let Some(kind) = self.try_identifier_or_keyword() {
                tokens.push(Token::new(kind, span));
                continue;
            }
            return Err(LexError { span });
        }
        Ok(tokens)
    }

    fn here(&self) -> Span {
        Span::new(self.row, self.col)
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' || ch == '\r' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn try_comment(&mut self) -> bool {
        if self.peek() == Some('/') && self.peek_at(1) == Some('/') {
            while let Some(c) = self.peek() {
                if c == '\n' || c == '\r' {
                    break;
                }
                self.advance();
            }
            return true;
        }
        if self.peek() == Some('/') && self.peek_at(1) == Some('*') {
            self.advance();
            self.advance();
            while self.pos < self.source.len() {
                if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                    self.advance();
                    self.advance();
                    break;
                }
                self.advance();
            }
            return true;
        }
        false
    }

    fn is_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    /// Integers, floats, radix literals, and strings — including the
    /// sign-gluing quirk described on the lexer itself.
    fn try_literal(&mut self) -> Result<Option<TokenKind>, LexError> {
        let start = self.pos;

        // Radix-prefixed integer literals: 0b.., 0o.., 0x.. (extends the
        // grammar beyond the original decimal-only Integer token).
        if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('b') | Some('B') => {
                    return Ok(Some(self.consume_radix_literal(
                        2,
                        |c| c == '0' || c == '1',
                        TokenKind::Binary,
                    )));
                }
                Some('o') | Some('O') => {
                    return Ok(Some(self.consume_radix_literal(
                        2,
                        |c| ('0'..='7').contains(&c),
                        TokenKind::Octal,
                    )));
                }
                Some('x') | Some('X') => {
                    return Ok(Some(self.consume_radix_literal(
                        2,
                        |c| c.is_ascii_hexdigit(),
                        TokenKind::Hexadecimal,
                    )));
                }
                _ => {}
            }
        }

        let sign_glued = matches!(self.peek(), Some('+') | Some('-'))
            && matches!(self.peek_at(1), Some(c) if Self::is_digit(c) || c == '.');
        let numeric_start = if sign_glued { self.pos + 1 } else { self.pos };
        let starts_number = matches!(self.source.get(numeric_start), Some(c) if Self::is_digit(*c))
            || (self.source.get(numeric_start) == Some(&'.')
                && matches!(self.source.get(numeric_start + 1), Some(c) if Self::is_digit(*c)));
        if starts_number {
            if sign_glued {
                self.advance();
            }
            let mut saw_digit = false;
            while matches!(self.peek(), Some(c) if Self::is_digit(c)) {
                self.advance();
                saw_digit = true;
            }
            let mut is_float = false;
            if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
                is_float = true;
                self.advance();
                while matches!(self.peek(), Some(c) if Self::is_digit(c)) {
                    self.advance();
                }
            }
            if saw_digit || is_float {
                let text: String = self.source[start..self.pos].iter().collect();
                return Ok(Some(if is_float {
                    TokenKind::Float(text)
                } else {
                    TokenKind::Integer(text)
                }));
            }
        }

        if self.peek() == Some('r') && self.peek_at(1) == Some('"') {
            self.advance();
            return Ok(Some(self.consume_string(start)?));
        }
        if self.peek() == Some('"') {
            return Ok(Some(self.consume_string(start)?));
        }

        Ok(None)
    }

    fn consume_radix_literal(
        &mut self,
        prefix_len: usize,
        digit: impl Fn(char) -> bool,
        kind: fn(String) -> TokenKind,
    ) -> TokenKind {
        let start = self.pos;
        for _ in 0..prefix_len {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if digit(c)) {
            self.advance();
        }
        let text: String = self.source[start..self.pos].iter().collect();
        kind(text)
    }

    fn consume_string(&mut self, start: usize) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        span: Span::new(self.row, self.col),
                    })
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let text: String = self.source[start..self.pos].iter().collect();
        Ok(TokenKind::String(text))
    }

    fn try_punctuation(&mut self) -> Option<TokenKind> {
        let c0 = self.peek()?;
        let c1 = self.peek_at(1);
        let c2 = self.peek_at(2);

        macro_rules! take {
            ($n:expr, $kind:expr) => {{
                for _ in 0..$n {
                    self.advance();
                }
                return Some($kind);
            }};
        }

        match (c0, c1, c2) {
            ('.', Some('.'), Some('.')) => take!(3, TokenKind::Pass),
            ('<', Some('<'), Some('=')) => take!(3, TokenKind::LeftShiftEqual),
            ('>', Some('>'), Some('=')) => take!(3, TokenKind::RightShiftEqual),
            (':', Some(':'), _) => take!(2, TokenKind::DoubleColon),
            ('+', Some('+'), _) => take!(2, TokenKind::Increment),
            ('-', Some('-'), _) => take!(2, TokenKind::Decrement),
            ('&', Some('&'), _) => take!(2, TokenKind::And),
            ('|', Some('|'), _) => take!(2, TokenKind::Or),
            ('=', Some('='), _) => take!(2, TokenKind::EqualEqual),
            ('!', Some('='), _) => take!(2, TokenKind::NotEqual),
            ('<', Some('='), _) => take!(2, TokenKind::LessThanOrEqual),
            ('>', Some('='), _) => take!(2, TokenKind::GreaterThanOrEqual),
            ('<', Some('<'), _) => take!(2, TokenKind::LeftShift),
            ('>', Some('>'), _) => take!(2, TokenKind::RightShift),
            ('+', Some('='), _) => take!(2, TokenKind::AddEqual),
            ('-', Some('='), _) => take!(2, TokenKind::SubtractEqual),
            ('*', Some('='), _) => take!(2, TokenKind::MultiplyEqual),
            ('/', Some('='), _) => take!(2, TokenKind::DivideEqual),
            ('%', Some('='), _) => take!(2, TokenKind::ModulusEqual),
            ('^', Some('='), _) => take!(2, TokenKind::PowerEqual),
            ('.', Some('.'), _) => take!(2, TokenKind::Between),
            _ => {}
        }

        let kind = match c0 {
            '(' => TokenKind::LeftParenthesis,
            ')' => TokenKind::RightParenthesis,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '+' => TokenKind::Add,
            '-' => TokenKind::Subtract,
            '*' => TokenKind::Multiply,
            '/' => TokenKind::Divide,
            '%' => TokenKind::Modulus,
            '^' => TokenKind::Power,
            '!' => TokenKind::Not,
            '=' => TokenKind::Equal,
            '<' => TokenKind::LessThan,
            '>' => TokenKind::GreaterThan,
            _ => return None,
        };
        self.advance();
        Some(kind)
    }

    fn try_identifier_or_keyword(&mut self) -> Option<TokenKind> {
        let c0 = self.peek()?;
        if !(c0.is_alphabetic() || c0 == '_') {
            return None;
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        // `break!`/`continue!`/`return!` keywords carry a trailing bang;
        // other identifiers may end in a single `?`, `!`, `?!`, or `!?`.
        let bare_text: String = self.source[start..self.pos].iter().collect();
        for (kw, kind) in KEYWORDS {
            if kw.ends_with('!') {
                let bare = &kw[..kw.len() - 1];
                if bare_text == bare && self.peek() == Some('!') {
                    self.advance();
                    return Some(kind.clone());
                }
            }
        }
        if matches!(self.peek(), Some('?') | Some('!')) {
            self.advance();
            if matches!(self.peek(), Some('?') | Some('!')) {
                self.advance();
            }
        }
        let text: String = self.source[start..self.pos].iter().collect();
        for (kw, kind) in KEYWORDS {
            if !kw.ends_with('!') && *kw == text {
                return Some(kind.clone());
            }
        }
        Some(TokenKind::Identifier(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_spaced_arithmetic() {
        assert_eq!(
            kinds("+ 3 5.;"),
            vec![
                TokenKind::Add,
                TokenKind::Integer("3".into()),
                TokenKind::Float("5.".into()),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn glues_unspaced_sign_into_literal() {
        assert_eq!(
            kinds("3+5"),
            vec![TokenKind::Integer("3".into()), TokenKind::Integer("+5".into())]
        );
    }

    #[test]
    fn lexes_let_binding() {
        assert_eq!(
            kinds("let x = 10;"),
            vec![
                TokenKind::Variable,
                TokenKind::Identifier("x".into()),
                TokenKind::Equal,
                TokenKind::Integer("10".into()),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn lexes_break_and_continue_keywords() {
        assert_eq!(kinds("break!"), vec![TokenKind::Break]);
        assert_eq!(kinds("continue!"), vec![TokenKind::Continue]);
    }

    #[test]
    fn lexes_raw_and_escaped_strings() {
        assert_eq!(
            kinds(r#""hi\n" r"raw\n""#),
            vec![
                TokenKind::String("\"hi\\n\"".into()),
                TokenKind::String("r\"raw\\n\"".into()),
            ]
        );
    }

    #[test]
    fn lexes_shift_and_compound_operators() {
        assert_eq!(kinds("<<"), vec![TokenKind::LeftShift]);
        assert_eq!(kinds(">>="), vec![TokenKind::RightShiftEqual]);
        assert_eq!(kinds("+="), vec![TokenKind::AddEqual]);
    }

    #[test]
    fn lexes_radix_integer_literals() {
        assert_eq!(kinds("0b101"), vec![TokenKind::Binary("0b101".into())]);
        assert_eq!(kinds("0o17"), vec![TokenKind::Octal("0o17".into())]);
        assert_eq!(kinds("0xFF"), vec![TokenKind::Hexadecimal("0xFF".into())]);
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(Lexer::new("let $text = 1;").tokenize().is_err());
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("// comment\n1 /* block */ 2"),
            vec![TokenKind::Integer("1".into()), TokenKind::Integer("2".into())]
        );
    }
}
