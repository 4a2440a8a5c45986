//! Call message types for the auction module.

use auction_types::{Address, AuctionOutcome, AuctionVariant, BidCommitment, SharedKey, SymmetricCiphertext};
use borsh::{BorshDeserialize, BorshSerialize};

/// Call messages for the auction module.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum AuctionCall {
    // === Auction Lifecycle ===
    /// Open a new auction (auctioneer).
    OpenAuction {
        variant: AuctionVariant,
        ctrs: Vec<i64>,
        key_fingerprint: Option<[u8; 32]>,
    },

    /// Lock commitments (auctioneer).
    CloseCommitPhase { auction_id: u64 },

    /// Lock reveals and return revealed values (auctioneer).
    CloseRevealPhase { auction_id: u64 },

    /// Compute winners and prices (auctioneer).
    CloseAuction { auction_id: u64 },

    /// Decrypt winners' settlement addresses (auctioneer, mixer only).
    ResolvePayees { auction_id: u64, key: SharedKey },

    /// Publish winners and prices (auctioneer).
    PublishResults {
        auction_id: u64,
        payees: Vec<Address>,
        prices: Vec<u64>,
    },

    // === Bidding ===
    /// Commit to a bid.
    Commit {
        auction_id: u64,
        commitment: BidCommitment,
        encrypted_address: Option<SymmetricCiphertext>,
    },

    /// Reveal a sealed bid.
    Reveal {
        auction_id: u64,
        cipher: SymmetricCiphertext,
        key: SharedKey,
    },

    // === Settlement ===
    /// Pay for a won slot. The attached value is the payment.
    Payment { auction_id: u64 },
}

/// What a successful call produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallResponse {
    AuctionOpened(u64),
    CommitPhaseClosed,
    /// Revealed values in registry order
    RevealPhaseClosed(Vec<(Address, u64)>),
    AuctionClosed(AuctionOutcome),
    PayeesResolved(Vec<Address>),
    ResultsPublished,
    Committed,
    /// Revealed value
    Revealed(u64),
    /// Amount accepted
    PaymentAccepted(u64),
}
