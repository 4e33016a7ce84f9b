//! The error taxonomy raised and caught by Farr programs.
//!
//! Every runtime fault — arithmetic overflow, a missing name, a failed
//! assertion — is carried as a [`FarrError`] tagged with one [`ErrorKind`].
//! `try`/`catch` blocks match on these kinds rather than on Rust's own
//! error types.

use std::fmt;
use thiserror::Error;

/// The closed set of error kinds a Farr program can raise or catch.
///
/// All kinds are direct children of `Base` — there is no deeper hierarchy,
/// mirroring the flat taxonomy the language exposes to user code via
/// `BaseError`, `ArithmeticError`, `NameError`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Base,
    KeyboardInterrupt,
    SystemExit,
    Arithmetic,
    Assertion,
    Attribute,
    Import,
    Lookup,
    Name,
    Os,
    Runtime,
    NotImplemented,
    Type,
    Value,
    Deprecated,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Base => "BaseError",
            ErrorKind::KeyboardInterrupt => "KeyboardInterruptError",
            ErrorKind::SystemExit => "SystemExitError",
            ErrorKind::Arithmetic => "ArithmeticError",
            ErrorKind::Assertion => "AssertionError",
            ErrorKind::Attribute => "AttributeError",
            ErrorKind::Import => "ImportError",
            ErrorKind::Lookup => "LookupError",
            ErrorKind::Name => "NameError",
            ErrorKind::Os => "OSError",
            ErrorKind::Runtime => "RuntimeError",
            ErrorKind::NotImplemented => "NotImplementedError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Value => "ValueError",
            ErrorKind::Deprecated => "DeprecatedError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "BaseError" => ErrorKind::Base,
            "KeyboardInterruptError" => ErrorKind::KeyboardInterrupt,
            "SystemExitError" => ErrorKind::SystemExit,
            "ArithmeticError" => ErrorKind::Arithmetic,
            "AssertionError" => ErrorKind::Assertion,
            "AttributeError" => ErrorKind::Attribute,
            "ImportError" => ErrorKind::Import,
            "LookupError" => ErrorKind::Lookup,
            "NameError" => ErrorKind::Name,
            "OSError" => ErrorKind::Os,
            "RuntimeError" => ErrorKind::Runtime,
            "NotImplementedError" => ErrorKind::NotImplemented,
            "TypeError" => ErrorKind::Type,
            "ValueError" => ErrorKind::Value,
            "DeprecatedError" => ErrorKind::Deprecated,
            _ => return None,
        })
    }

    /// Whether a `catch (caught)` clause matching `self` also catches an
    /// error raised with kind `raised`. `Base` catches everything; any
    /// other kind only catches an exact match, since the taxonomy here
    /// has no further subclassing beneath each named kind.
    pub fn catches(self, raised: ErrorKind) -> bool {
        self == ErrorKind::Base || self == raised
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A raised Farr error: a kind plus a human-readable message.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct FarrError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FarrError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arithmetic, message)
    }
    pub fn attribute(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Attribute, message)
    }
    pub fn import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, message)
    }
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lookup, message)
    }
    pub fn name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, message)
    }
    pub fn os(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Os, message)
    }
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }
    pub fn type_(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }
    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Assertion, message)
    }
}
