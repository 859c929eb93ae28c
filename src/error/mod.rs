use thiserror::Error;

/// Errors raised while binding or invoking a bucket function
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BucketError {
    /// Fewer than two arguments at a variadic call site
    #[error("There must be two or more arguments, got {arity}")]
    InvalidArgumentCount { arity: usize },

    /// Arity above the specialization ceiling
    #[error("Too many arguments for bucket: {arity} (maximum is {max})")]
    NotSupported { arity: usize, max: usize },

    /// A specialized implementation was invoked with the wrong number of arguments
    #[error("Bucket implementation expects {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// A routine returned a bucket index past the overflow bucket
    #[error("Bucket routine '{name}' returned index {bucket}, maximum is {max}")]
    BucketOutOfRange {
        name: String,
        bucket: usize,
        max: usize,
    },

    /// Synthesizing the implementation for an arity failed
    #[error("Failed to generate bucket implementation for arity {arity}: {reason}")]
    Generation { arity: usize, reason: String },

    /// Specializer options that cannot be honored
    #[error("Invalid specializer options: {reason}")]
    InvalidOptions { reason: String },
}
