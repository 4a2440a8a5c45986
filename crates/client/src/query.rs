//! Query functions for auction state.

use auction_module::{handle_query, Auction, AuctionQuery, AuctionQueryResponse, AuctionState};
use auction_types::{Address, AuctionOutcome, AuctionPhase, SettlementSlot};

/// Read-only view of auction data.
///
/// Implemented over in-process module state; a remote client would map these
/// onto its transport.
pub trait AuctionReader {
    /// Get an auction by ID.
    fn auction(&self, auction_id: u64) -> Option<Auction>;

    /// Get the current phase.
    fn phase(&self, auction_id: u64) -> Option<AuctionPhase>;

    /// Get the computed outcome, once closed.
    fn outcome(&self, auction_id: u64) -> Option<AuctionOutcome>;

    /// Get settlement slots and honored proceeds.
    fn settlement(&self, auction_id: u64) -> (Vec<SettlementSlot>, u64);

    /// Get registered participants.
    fn participants(&self) -> Option<Vec<Address>>;

    /// Payees known for an auction, in allocation order.
    fn payees(&self, auction_id: u64) -> Option<Vec<Address>> {
        self.auction(auction_id).and_then(|a| a.payees)
    }
}

impl AuctionReader for AuctionState {
    fn auction(&self, auction_id: u64) -> Option<Auction> {
        match handle_query(self, AuctionQuery::GetAuction { auction_id }) {
            AuctionQueryResponse::Auction(auction) => auction,
            _ => None,
        }
    }

    fn phase(&self, auction_id: u64) -> Option<AuctionPhase> {
        match handle_query(self, AuctionQuery::GetPhase { auction_id }) {
            AuctionQueryResponse::Phase(phase) => phase,
            _ => None,
        }
    }

    fn outcome(&self, auction_id: u64) -> Option<AuctionOutcome> {
        match handle_query(self, AuctionQuery::GetOutcome { auction_id }) {
            AuctionQueryResponse::Outcome(outcome) => outcome,
            _ => None,
        }
    }

    fn settlement(&self, auction_id: u64) -> (Vec<SettlementSlot>, u64) {
        match handle_query(self, AuctionQuery::GetSettlement { auction_id }) {
            AuctionQueryResponse::Settlement { slots, proceeds } => (slots, proceeds),
            _ => (Vec::new(), 0),
        }
    }

    fn participants(&self) -> Option<Vec<Address>> {
        match handle_query(self, AuctionQuery::GetParticipants) {
            AuctionQueryResponse::Participants(participants) => participants,
            _ => None,
        }
    }
}
