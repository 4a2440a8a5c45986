//! Auction module error types.

use thiserror::Error;

use auction_crypto::CryptoError;
use auction_pricing::PricingError;
use auction_types::{Address, AuctionPhase, ErrorKind};

/// Errors that can occur in the auction module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("Auction not found: {0}")]
    AuctionNotFound(u64),

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Participant not registered: {0}")]
    NotRegistered(Address),

    #[error("Invalid phase. Expected: {expected:?}, Got: {got:?}")]
    InvalidPhase {
        expected: AuctionPhase,
        got: AuctionPhase,
    },

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Sealed auctions need a shared key fingerprint")]
    MissingKeyFingerprint,

    #[error("Operation not supported by this auction variant: {0}")]
    VariantMismatch(&'static str),

    #[error("Bidder {0} already committed")]
    DuplicateCommitment(Address),

    #[error("No commitment from {0}")]
    NoCommitment(Address),

    #[error("Key does not match the auction's key fingerprint")]
    KeyMismatch,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(#[source] CryptoError),

    #[error("Reveal from {0} does not match its commitment")]
    RevealMismatch(Address),

    #[error("Bidder {0} already revealed")]
    AlreadyRevealed(Address),

    #[error("Settlement addresses not resolved yet")]
    PayeesNotResolved,

    #[error("Settlement addresses already resolved")]
    PayeesAlreadyResolved,

    #[error("Published results do not match the computed outcome")]
    ResultsMismatch,

    #[error("{0} has nothing to pay")]
    NotAWinner(Address),

    #[error("{0} already paid")]
    AlreadyPaid(Address),

    #[error("Incorrect payment: need {expected}, got {got}")]
    IncorrectPayment { expected: u64, got: u64 },
}

impl AuctionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuctionError::Pricing(e) => e.kind(),
            AuctionError::AuctionNotFound(_)
            | AuctionError::NotRegistered(_)
            | AuctionError::MissingKeyFingerprint
            | AuctionError::VariantMismatch(_) => ErrorKind::Configuration,
            AuctionError::InvalidPhase { .. }
            | AuctionError::NoCommitment(_)
            | AuctionError::PayeesNotResolved => ErrorKind::Phase,
            AuctionError::NotAuthorized
            | AuctionError::KeyMismatch
            | AuctionError::DecryptionFailed(_)
            | AuctionError::RevealMismatch(_)
            | AuctionError::ResultsMismatch
            | AuctionError::NotAWinner(_)
            | AuctionError::IncorrectPayment { .. } => ErrorKind::Integrity,
            AuctionError::DuplicateCommitment(_)
            | AuctionError::AlreadyRevealed(_)
            | AuctionError::PayeesAlreadyResolved
            | AuctionError::AlreadyPaid(_) => ErrorKind::Duplicate,
        }
    }
}
