//! Query handlers for the auction module.
//!
//! These functions provide read-only access to auction state.

use serde::{Deserialize, Serialize};

use auction_types::{Address, AuctionOutcome, AuctionPhase, AuctionVariant, Bid, SettlementSlot};

use crate::state::{Auction, AuctionState as ModuleState};

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// Get auction details by ID.
    GetAuction { auction_id: u64 },

    /// Get auction summaries (paginated).
    ListAuctions { offset: u64, limit: u64 },

    /// Get the current phase.
    GetPhase { auction_id: u64 },

    /// Get a specific bid.
    GetBid { auction_id: u64, bidder: Address },

    /// Get the computed outcome.
    GetOutcome { auction_id: u64 },

    /// Get settlement slots and proceeds.
    GetSettlement { auction_id: u64 },

    /// Get registered participants, if participation is restricted.
    GetParticipants,
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    /// Auction details.
    Auction(Option<Auction>),

    /// List of auctions.
    AuctionList(Vec<AuctionSummary>),

    /// Current phase.
    Phase(Option<AuctionPhase>),

    /// Single bid.
    Bid(Option<Bid>),

    /// Auction outcome.
    Outcome(Option<AuctionOutcome>),

    /// Settlement slots and honored total.
    Settlement {
        slots: Vec<SettlementSlot>,
        proceeds: u64,
    },

    /// Registered participants in canonical order.
    Participants(Option<Vec<Address>>),
}

/// Handle a query.
pub fn handle_query(state: &ModuleState, query: AuctionQuery) -> AuctionQueryResponse {
    match query {
        AuctionQuery::GetAuction { auction_id } => {
            AuctionQueryResponse::Auction(state.auctions.get(&auction_id).cloned())
        }

        AuctionQuery::ListAuctions { offset, limit } => AuctionQueryResponse::AuctionList(
            get_auction_summaries(state, offset as usize, limit as usize),
        ),

        AuctionQuery::GetPhase { auction_id } => {
            AuctionQueryResponse::Phase(state.auctions.get(&auction_id).map(|a| a.phase))
        }

        AuctionQuery::GetBid { auction_id, bidder } => {
            let bid = state
                .auctions
                .get(&auction_id)
                .and_then(|a| a.bid(&bidder))
                .cloned();
            AuctionQueryResponse::Bid(bid)
        }

        AuctionQuery::GetOutcome { auction_id } => AuctionQueryResponse::Outcome(
            state
                .auctions
                .get(&auction_id)
                .and_then(|a| a.outcome.clone()),
        ),

        AuctionQuery::GetSettlement { auction_id } => {
            let (slots, proceeds) = state
                .auctions
                .get(&auction_id)
                .map(|a| (a.settlements.clone(), a.proceeds))
                .unwrap_or_default();
            AuctionQueryResponse::Settlement { slots, proceeds }
        }

        AuctionQuery::GetParticipants => AuctionQueryResponse::Participants(
            state.participants.as_ref().map(|r| r.as_slice().to_vec()),
        ),
    }
}

/// Summary of an auction for listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: u64,
    pub auctioneer: Address,
    pub variant: AuctionVariant,
    pub phase: AuctionPhase,
    pub opened_at: u64,
    pub num_bids: usize,
    pub num_revealed: usize,
}

impl AuctionSummary {
    pub fn from_auction(auction: &Auction) -> Self {
        Self {
            auction_id: auction.auction_id,
            auctioneer: auction.auctioneer,
            variant: auction.variant,
            phase: auction.phase,
            opened_at: auction.opened_at,
            num_bids: auction.bids.len(),
            num_revealed: auction.bids.iter().filter(|b| b.is_revealed()).count(),
        }
    }
}

/// Get auction summaries for listing, by ascending ID.
pub fn get_auction_summaries(state: &ModuleState, offset: usize, limit: usize) -> Vec<AuctionSummary> {
    state
        .auctions
        .values()
        .skip(offset)
        .take(limit)
        .map(AuctionSummary::from_auction)
        .collect()
}

/// Get auctions currently in `phase`.
pub fn get_auctions_in_phase(state: &ModuleState, phase: AuctionPhase) -> Vec<u64> {
    state
        .auctions
        .values()
        .filter(|a| a.phase == phase)
        .map(|a| a.auction_id)
        .collect()
}

/// Get winners of a settled auction that have not paid yet.
pub fn get_outstanding_payments(state: &ModuleState, auction_id: u64) -> Vec<SettlementSlot> {
    state
        .auctions
        .get(&auction_id)
        .map(|a| {
            a.settlements
                .iter()
                .filter(|s| !s.is_paid())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
