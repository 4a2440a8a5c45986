//! Error types for cryptographic operations.

use auction_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid G1 point encoding")]
    InvalidG1Point,

    #[error("Identity element is not a valid key")]
    IdentityPoint,

    #[error("Degenerate private exponent: {0}")]
    DegenerateKey(&'static str),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Key derivation failed")]
    KeyDerivationFailed,

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::DegenerateKey(_) => ErrorKind::Configuration,
            _ => ErrorKind::Integrity,
        }
    }
}
