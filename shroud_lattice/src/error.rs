#[derive(Debug, thiserror::Error)]
/// Errors that can occur in this crate.
pub enum Error {
    /// The given [`Params`](crate::Params) fail validation.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// A ciphertext was produced under a different scheme than the evaluator's.
    #[error("Ciphertext was not produced under the expected scheme.")]
    SchemeMismatch,

    /// A multiplicative operation was requested on a ciphertext with no depth left.
    #[error("Multiplicative depth exhausted: ciphertext is at depth {depth} of {max}.")]
    DepthExhausted {
        /// The depth the operand is at.
        depth: u32,
        /// The maximum depth the parameters support.
        max: u32,
    },

    /// Multiplication needs a relinearization key and none was generated.
    #[error("No relinearization key was generated for this key set.")]
    MissingRelinearizationKey,

    /// Slot summation needs a rotation key for this Galois element and none was generated.
    #[error("No rotation key for Galois element {0}.")]
    MissingRotationKey(usize),

    /// More values than slots were passed to encode.
    #[error("{got} values exceed the {slots} available slots.")]
    TooManyValues {
        /// The number of values given.
        got: usize,
        /// The number of slots available.
        slots: usize,
    },

    /// A value is not finite or too large to encode.
    #[error("Value {0} cannot be encoded under these parameters.")]
    ValueOutOfRange(f64),

    /// A ciphertext or key has the wrong shape for the given parameters.
    #[error("Object is malformed for the given parameters.")]
    Malformed,

    /// Serialization failed.
    #[error("{0}")]
    Bincode(#[from] bincode::Error),
}

/// Results from this crate.
pub type Result<T> = std::result::Result<T, Error>;
