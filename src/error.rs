//! Representations of errors returned by this crate.
//!
//! Only argument and allocation class failures are errors. Malformed
//! stream data never is: a trace stream arrives over a lossy wire, so
//! byte patterns that violate the protocol are delivered as unknown
//! packets and decoding carries on.

/// Set of errors that can be returned by decoder operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Unspecified error.
    #[error("unspecified error")]
    Unspecified,

    /// Memory allocation error.
    #[error("memory allocation error")]
    Allocation,

    /// Invalid argument: backing storage below the required minimum, a
    /// fed chunk larger than the free buffer space, or a decode run
    /// without an installed callback.
    #[error("invalid argument")]
    InvalidArgument,
}

impl Error {
    /// The stable numeric code of this error, for language bindings.
    pub fn code(&self) -> i32 {
        match self {
            Error::Unspecified => -1,
            Error::Allocation => -2,
            Error::InvalidArgument => -3,
        }
    }

    /// The symbolic name of this error, for language bindings.
    pub fn name(&self) -> &'static str {
        match self {
            Error::Unspecified => "ERR",
            Error::Allocation => "ERR_MALLOC",
            Error::InvalidArgument => "ERR_ARG",
        }
    }
}
