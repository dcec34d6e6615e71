use serde::{Deserialize, Serialize};

use crate::{KeyId, PayloadId};

#[derive(Debug, thiserror::Error)]
/// Errors that can occur in this crate.
pub enum Error {
    /// The engine is disabled and refuses every request.
    #[error("The encryption engine is unavailable.")]
    Unavailable,

    /// No live context has the given key id.
    #[error("No context with key id {0}.")]
    KeyNotFound(KeyId),

    /// No live payload has the given id.
    #[error("No payload with id {0}.")]
    PayloadNotFound(PayloadId),

    /// A payload belongs to a different context than the one named in the request.
    #[error("Payload belongs to key {found}, not key {expected}.")]
    KeyMismatch {
        /// The key id named in the request.
        expected: KeyId,
        /// The key id that owns the payload.
        found: KeyId,
    },

    /// The operands or operation don't fit together, such as vectors of different lengths or
    /// an operation the context generated no keys for.
    #[error("Incompatible operands: {0}")]
    Incompatible(String),

    /// A multiplicative operation was requested on a payload with no depth left.
    #[error("Payload {payload} has exhausted its multiplicative depth of {budget}.")]
    DepthExhausted {
        /// The payload with no depth left.
        payload: PayloadId,
        /// The depth budget of the payload's context.
        budget: u32,
    },

    /// The request itself is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The configuration failed to load or validate.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The lattice primitive reported an error.
    #[error("{0}")]
    Primitive(#[from] shroud_lattice::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// A coarse classification of [`Error`] that callers can branch on without matching every
/// variant.
pub enum ErrorKind {
    /// See [`Error::Unavailable`].
    Unavailable,

    /// A key or payload doesn't exist.
    NotFound,

    /// Operands, keys or parameters don't fit together.
    Incompatible,

    /// See [`Error::DepthExhausted`].
    DepthExhausted,

    /// The request is malformed.
    InvalidInput,

    /// Anything else.
    Internal,
}

impl Error {
    /// The [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        use shroud_lattice::Error as Lattice;

        match self {
            Self::Unavailable => ErrorKind::Unavailable,
            Self::KeyNotFound(_) | Self::PayloadNotFound(_) => ErrorKind::NotFound,
            Self::KeyMismatch { .. } | Self::Incompatible(_) => ErrorKind::Incompatible,
            Self::DepthExhausted { .. } => ErrorKind::DepthExhausted,
            Self::InvalidInput(_) | Self::Config(_) => ErrorKind::InvalidInput,
            Self::Primitive(e) => match e {
                Lattice::DepthExhausted { .. } => ErrorKind::DepthExhausted,
                Lattice::SchemeMismatch
                | Lattice::MissingRelinearizationKey
                | Lattice::MissingRotationKey(_)
                | Lattice::TooManyValues { .. } => ErrorKind::Incompatible,
                Lattice::InvalidParams(_)
                | Lattice::ValueOutOfRange(_)
                | Lattice::Malformed
                | Lattice::Bincode(_) => ErrorKind::InvalidInput,
            },
        }
    }

    pub(crate) fn incompatible(msg: impl Into<String>) -> Self {
        Self::Incompatible(msg.into())
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Results from this crate.
pub type Result<T> = std::result::Result<T, Error>;
