//! State structures for the auction module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use auction_dhx::Registry;
use auction_pricing::CapacityVector;
use auction_types::{
    Address, AuctionOutcome, AuctionPhase, AuctionVariant, Bid, SettlementSlot,
};

use crate::error::AuctionError;

/// A single auction instance.
///
/// Owns every bid, the computed outcome and the settlement slots. Phase only
/// moves forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub auction_id: u64,
    pub auctioneer: Address,
    pub variant: AuctionVariant,
    pub capacities: CapacityVector,
    /// Fingerprint of the shared key, required for sealed variants
    pub key_fingerprint: Option<[u8; 32]>,
    pub phase: AuctionPhase,
    pub opened_at: u64,
    /// Bids sorted by committer
    pub bids: Vec<Bid>,
    pub outcome: Option<AuctionOutcome>,
    /// Settlement address per winner, parallel to `outcome.winners`
    pub payees: Option<Vec<Address>>,
    pub settlements: Vec<SettlementSlot>,
    /// Sum of honored payments
    pub proceeds: u64,
}

impl Auction {
    pub fn new(
        auction_id: u64,
        auctioneer: Address,
        variant: AuctionVariant,
        capacities: CapacityVector,
        key_fingerprint: Option<[u8; 32]>,
        opened_at: u64,
    ) -> Self {
        Self {
            auction_id,
            auctioneer,
            variant,
            capacities,
            key_fingerprint,
            phase: AuctionPhase::Open,
            opened_at,
            bids: Vec::new(),
            outcome: None,
            payees: None,
            settlements: Vec::new(),
            proceeds: 0,
        }
    }

    pub fn bid(&self, bidder: &Address) -> Option<&Bid> {
        self.bid_index(bidder).ok().map(|i| &self.bids[i])
    }

    /// Position of `bidder` in `bids`, or where it would be inserted.
    pub fn bid_index(&self, bidder: &Address) -> Result<usize, usize> {
        self.bids.binary_search_by(|b| b.committer.cmp(bidder))
    }

    pub fn expect_phase(&self, expected: AuctionPhase) -> Result<(), AuctionError> {
        if self.phase != expected {
            return Err(AuctionError::InvalidPhase {
                expected,
                got: self.phase,
            });
        }
        Ok(())
    }

    pub fn expect_auctioneer(&self, sender: &Address) -> Result<(), AuctionError> {
        if *sender != self.auctioneer {
            return Err(AuctionError::NotAuthorized);
        }
        Ok(())
    }

    /// Move to the next phase. Callers check the current phase first.
    pub(crate) fn advance(&mut self) {
        if let Some(next) = self.phase.successor() {
            self.phase = next;
        }
    }

    /// Revealed values in registry order.
    pub fn revealed_bids(&self) -> Vec<(Address, u64)> {
        self.bids
            .iter()
            .filter_map(|b| b.revealed_value.map(|v| (b.committer, v)))
            .collect()
    }

    /// Committers that never revealed.
    pub fn unrevealed(&self) -> Vec<Address> {
        self.bids
            .iter()
            .filter(|b| !b.is_revealed())
            .map(|b| b.committer)
            .collect()
    }

    pub fn num_paid(&self) -> usize {
        self.settlements.iter().filter(|s| s.is_paid()).count()
    }
}

/// Auction module state.
///
/// An in-memory stand-in for the ledger's keyed storage.
#[derive(Debug, Default)]
pub struct AuctionState {
    /// Next auction ID to assign
    pub next_auction_id: u64,

    /// Only this address may open auctions, when set
    pub auctioneer: Option<Address>,

    /// Registered bidders, when participation is restricted
    pub participants: Option<Registry>,

    /// All auctions by ID
    pub auctions: BTreeMap<u64, Auction>,
}

impl AuctionState {
    /// Create a new auction state with open participation.
    pub fn new() -> Self {
        Self {
            next_auction_id: 1,
            ..Default::default()
        }
    }

    /// Get the next auction ID and increment.
    pub fn allocate_auction_id(&mut self) -> u64 {
        let id = self.next_auction_id;
        self.next_auction_id += 1;
        id
    }

    /// Get auction by ID.
    pub fn get_auction(&self, auction_id: u64) -> Result<&Auction, AuctionError> {
        self.auctions
            .get(&auction_id)
            .ok_or(AuctionError::AuctionNotFound(auction_id))
    }

    /// Get mutable auction by ID.
    pub fn get_auction_mut(&mut self, auction_id: u64) -> Result<&mut Auction, AuctionError> {
        self.auctions
            .get_mut(&auction_id)
            .ok_or(AuctionError::AuctionNotFound(auction_id))
    }

    /// Whether `bidder` may take part.
    pub fn is_registered(&self, bidder: &Address) -> bool {
        self.participants
            .as_ref()
            .map_or(true, |registry| registry.contains(bidder))
    }
}
