//! The token vocabulary produced by the Farr lexer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location of a token: a 1-based row/column pair.
///
/// Farr tracks position per-character rather than per-byte-span, since the
/// lexer walks the source one chunk at a time and needs to report the exact
/// row/column a bad chunk started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub row: usize,
    pub col: usize,
}

impl Span {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn dummy() -> Self {
        Self { row: 0, col: 0 }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.row, self.col)
    }
}

/// Every named token the lexer can produce, mirroring the grouped-token
/// grammar: literals, punctuation/operators, and keywords/identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    Integer(String),
    Float(String),
    Binary(String),
    Octal(String),
    Hexadecimal(String),
    String(String),

    LeftParenthesis,
    RightParenthesis,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Colon,
    DoubleColon,
    Increment,
    Decrement,
    Semicolon,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
    Not,
    And,
    Or,
    Equal,
    EqualEqual,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    LeftShift,
    RightShift,
    AddEqual,
    SubtractEqual,
    MultiplyEqual,
    DivideEqual,
    ModulusEqual,
    PowerEqual,
    LeftShiftEqual,
    RightShiftEqual,
    Between,
    Pass,

    Null,
    Use,
    Variable,
    If,
    Else,
    While,
    Break,
    Continue,
    For,
    In,
    Try,
    Catch,
    Function,
    Return,
    Struct,
    Match,
    Identifier(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(s) | TokenKind::Float(s) => write!(f, "{s}"),
            TokenKind::Binary(s) | TokenKind::Octal(s) | TokenKind::Hexadecimal(s) => {
                write!(f, "{s}")
            }
            TokenKind::String(s) => write!(f, "{s}"),
            TokenKind::LeftParenthesis => write!(f, "("),
            TokenKind::RightParenthesis => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::DoubleColon => write!(f, "::"),
            TokenKind::Increment => write!(f, "++"),
            TokenKind::Decrement => write!(f, "--"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Add => write!(f, "+"),
            TokenKind::Subtract => write!(f, "-"),
            TokenKind::Multiply => write!(f, "*"),
            TokenKind::Divide => write!(f, "/"),
            TokenKind::Modulus => write!(f, "%"),
            TokenKind::Power => write!(f, "^"),
            TokenKind::Not => write!(f, "!"),
            TokenKind::And => write!(f, "&&"),
            TokenKind::Or => write!(f, "||"),
            TokenKind::Equal => write!(f, "="),
            TokenKind::EqualEqual => write!(f, "=="),
            TokenKind::NotEqual => write!(f, "!="),
            TokenKind::LessThan => write!(f, "<"),
            TokenKind::GreaterThan => write!(f, ">"),
            TokenKind::LessThanOrEqual => write!(f, "<="),
            TokenKind::GreaterThanOrEqual => write!(f, ">="),
            TokenKind::LeftShift => write!(f, "<<"),
            TokenKind::RightShift => write!(f, ">>"),
            TokenKind::AddEqual => write!(f, "+="),
            TokenKind::SubtractEqual => write!(f, "-="),
            TokenKind::MultiplyEqual => write!(f, "*="),
            TokenKind::DivideEqual => write!(f, "/="),
            TokenKind::ModulusEqual => write!(f, "%="),
            TokenKind::PowerEqual => write!(f, "^="),
            TokenKind::LeftShiftEqual => write!(f, "<<="),
            TokenKind::RightShiftEqual => write!(f, ">>="),
            TokenKind::Between => write!(f, ".."),
            TokenKind::Pass => write!(f, "..."),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Use => write!(f, "use"),
            TokenKind::Variable => write!(f, "let"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::While => write!(f, "while"),
            TokenKind::Break => write!(f, "break!"),
            TokenKind::Continue => write!(f, "continue!"),
            TokenKind::For => write!(f, "for"),
            TokenKind::In => write!(f, "in"),
            TokenKind::Try => write!(f, "try"),
            TokenKind::Catch => write!(f, "catch"),
            TokenKind::Function => write!(f, "fn"),
            TokenKind::Return => write!(f, "return!"),
            TokenKind::Struct => write!(f, "struct"),
            TokenKind::Match => write!(f, "match"),
            TokenKind::Identifier(s) => write!(f, "{s}"),
        }
    }
}

impl TokenKind {
    /// The name used in parser error messages (`expect`/`check`/`peek`),
    /// matching what the grammar calls each token.
    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::Integer(_) => "Integer",
            TokenKind::Float(_) => "Float",
            TokenKind::Binary(_) => "Binary",
            TokenKind::Octal(_) => "Octal",
            TokenKind::Hexadecimal(_) => "Hexadecimal",
            TokenKind::String(_) => "String",
            TokenKind::LeftParenthesis => "LeftParenthesis",
            TokenKind::RightParenthesis => "RightParenthesis",
            TokenKind::LeftBrace => "LeftBrace",
            TokenKind::RightBrace => "RightBrace",
            TokenKind::LeftBracket => "LeftBracket",
            TokenKind::RightBracket => "RightBracket",
            TokenKind::Comma => "Comma",
            TokenKind::Dot => "Dot",
            TokenKind::Colon => "Colon",
            TokenKind::DoubleColon => "DoubleColon",
            TokenKind::Increment => "Increment",
            TokenKind::Decrement => "Decrement",
            TokenKind::Semicolon => "Semicolon",
            TokenKind::Add => "Add",
            TokenKind::Subtract => "Subtract",
            TokenKind::Multiply => "Multiply",
            TokenKind::Divide => "Divide",
            TokenKind::Modulus => "Modulus",
            TokenKind::Power => "Power",
            TokenKind::Not => "Not",
            TokenKind::And => "And",
            TokenKind::Or => "Or",
            TokenKind::Equal => "Equal",
            TokenKind::EqualEqual => "EqualEqual",
            TokenKind::NotEqual => "NotEqual",
            TokenKind::LessThan => "LessThan",
            TokenKind::GreaterThan => "GreaterThan",
            TokenKind::LessThanOrEqual => "LessThanOrEqual",
            TokenKind::GreaterThanOrEqual => "GreaterThanOrEqual",
            TokenKind::LeftShift => "LeftShift",
            TokenKind::RightShift => "RightShift",
            TokenKind::AddEqual => "AddEqual",
            TokenKind::SubtractEqual => "SubtractEqual",
            TokenKind::MultiplyEqual => "MultiplyEqual",
            TokenKind::DivideEqual => "DivideEqual",
            TokenKind::ModulusEqual => "ModulusEqual",
            TokenKind::PowerEqual => "PowerEqual",
            TokenKind::LeftShiftEqual => "LeftShiftEqual",
            TokenKind::RightShiftEqual => "RightShiftEqual",
            TokenKind::Between => "Between",
            TokenKind::Pass => "Pass",
            TokenKind::Null => "Null",
            TokenKind::Use => "Use",
            TokenKind::Variable => "Variable",
            TokenKind::If => "If",
            TokenKind::Else => "Else",
            TokenKind::While => "While",
            TokenKind::Break => "Break",
            TokenKind::Continue => "Continue",
            TokenKind::For => "For",
            TokenKind::In => "In",
            TokenKind::Try => "Try",
            TokenKind::Catch => "Catch",
            TokenKind::Function => "Function",
            TokenKind::Return => "Return",
            TokenKind::Struct => "Struct",
            TokenKind::Match => "Match",
            TokenKind::Identifier(_) => "Identifier",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}
