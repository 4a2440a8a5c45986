//! Key exchange error types.

use auction_crypto::CryptoError;
use auction_types::{Address, ErrorKind};
use thiserror::Error;

use crate::registry::RegistryError;
use crate::types::ExchangeState;

/// Errors during the chained key exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DhxError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Key exchange needs at least 2 participants, got {0}")]
    TooFewParticipants(usize),

    #[error("Unknown participant {0}")]
    UnknownParticipant(Address),

    #[error("Invalid state. Expected: {expected}, Got: {got:?}")]
    InvalidState {
        expected: &'static str,
        got: ExchangeState,
    },

    #[error("Key exchange not started")]
    NotStarted,

    #[error("Key exchange already started")]
    AlreadyStarted,

    #[error("No pending request from {requester} to {provider}")]
    NoPendingRequest { requester: Address, provider: Address },

    #[error("Request addressed to {expected} answered by {got}")]
    WrongProvider { expected: Address, got: Address },

    #[error("Conflicting answer from {provider} in chain of {requester}")]
    ConflictingAnswer { requester: Address, provider: Address },

    #[error("Bare key from {0} does not match its registered public value")]
    BareKeyMismatch(Address),

    #[error("Combined key for {0} not available yet")]
    ProtocolIncomplete(Address),

    #[error("Key exchange stalled: {pending} requests pending on {stalled:?}")]
    LivenessStall { pending: usize, stalled: Vec<Address> },
}

impl DhxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DhxError::Registry(e) => e.kind(),
            DhxError::Crypto(e) => e.kind(),
            DhxError::TooFewParticipants(_) | DhxError::UnknownParticipant(_) => {
                ErrorKind::Configuration
            }
            DhxError::InvalidState { .. }
            | DhxError::NotStarted
            | DhxError::AlreadyStarted
            | DhxError::NoPendingRequest { .. }
            | DhxError::ProtocolIncomplete(_) => ErrorKind::Phase,
            DhxError::WrongProvider { .. }
            | DhxError::ConflictingAnswer { .. }
            | DhxError::BareKeyMismatch(_) => ErrorKind::Integrity,
            DhxError::LivenessStall { .. } => ErrorKind::LivenessStall,
        }
    }
}
