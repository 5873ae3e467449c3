use thiserror::Error;

/// Failures while decoding a byte string into a key, ciphertext or signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeserializationError {
    #[error("bad encoding length: expected {expected} bytes, got {found}")]
    BadEncodingLength { expected: usize, found: usize },
    #[error("leaf index {index} is outside a tree with {capacity} leaves")]
    InvalidLeafIndex { index: u32, capacity: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PqError {
    /// An operand does not have the shape the ring, matrix or scheme was
    /// configured with.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("modulus mismatch: expected {expected}, found {found}")]
    ModulusMismatch { expected: u32, found: u32 },
    /// Every one-time leaf of the signing key has been used.
    #[error("all {capacity} one-time signing keys are exhausted")]
    KeysExhausted { capacity: u64 },
    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),
}

pub type Result<T> = std::result::Result<T, PqError>;

/// Fail with `DimensionMismatch` unless `found == expected`.
pub(crate) fn ensure_dimension(expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(PqError::DimensionMismatch { expected, found })
    }
}
