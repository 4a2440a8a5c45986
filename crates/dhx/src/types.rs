//! Key exchange type definitions.

use auction_types::{Address, G1Point, SharedKey};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// A pending obligation: `provider` must contribute to `requester`'s chain.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct KeyRequest {
    /// Participant whose combined value this chain builds
    pub requester: Address,
    /// Participant asked to answer
    pub provider: Address,
    /// Partially combined value, or `None` to ask for the bare public value
    pub supplied: Option<G1Point>,
    /// Position of `provider` in the chain (0-based)
    pub link: u32,
}

impl KeyRequest {
    /// Whether the provider should answer with its bare public value.
    pub fn is_bare(&self) -> bool {
        self.supplied.is_none()
    }
}

/// A provider's contribution to one chain.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct KeyAnswer {
    pub requester: Address,
    pub provider: Address,
    pub value: G1Point,
}

/// What the controller did with an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Chain advanced by one link
    Accepted,
    /// Chain advanced and the requester's combined value is now available
    Completed,
    /// Same value as already recorded for this link, nothing changed
    Duplicate,
}

/// Per-participant progress through the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeState {
    /// Nothing generated
    Idle,
    /// Keypair generated, exchange not started
    AGenerated,
    /// Exchange started, no answer given yet
    Requesting,
    /// At least one answer given
    Answering,
    /// Final key computed
    Finalized,
}

/// Output of the key exchange for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutput {
    /// `g^(a_1 * ... * a_n)`
    pub final_key: G1Point,
    /// Symmetric key derived from `final_key`
    pub shared_key: SharedKey,
    /// Number of answers this participant contributed
    pub answers_given: usize,
}
