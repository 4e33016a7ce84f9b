//! Shared fundamentals used by both the Farr compiler frontend and runtime.

pub mod errors;

pub use errors::{ErrorKind, FarrError};
