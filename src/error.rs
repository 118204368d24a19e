use thiserror::Error;

/// Error raised by a builtin function handler.
///
/// The evaluator converts these into located diagnostics attached to the
/// call's name token; they never cross the public API as Rust errors.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("argument out of range: {0}")]
    OutOfRange(String),
}
