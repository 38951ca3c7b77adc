use thiserror::Error;

/// Errors that can occur while reading from a bit stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Ran out of bits while a value still had payload left to read
    #[error("bit stream ended mid-value")]
    UnexpectedEnd,

    /// A string payload was not valid UTF-8
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}
