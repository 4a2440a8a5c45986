//! Allocation and pricing for tiered sealed-bid auctions.
//!
//! Given revealed bid values and a capacity vector `[c_1, ..., c_k]`:
//! 1. Bids are ranked by value, highest first, ties to the lower address
//! 2. The first `c_1` ranked bidders fill tier 1, the next `c_2` tier 2, and
//!    so on; anyone ranked past the last tier loses
//! 3. A tier-`j` winner pays the bid ranked right after tier `j`'s boundary
//!
//! Prices never exceed the winner's own bid.

use auction_types::{Address, ErrorKind};
use thiserror::Error;

pub mod allocation;
pub mod capacity;

pub use allocation::{allocate, allocate_values, allocate_with, Allocation, ValueAllocation};
pub use capacity::CapacityVector;

/// Errors from allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Tier {tier} has negative capacity {size}")]
    NegativeCapacity { tier: usize, size: i64 },

    #[error("Capacity vector admits no winners")]
    ZeroCapacity,

    #[error("Capacity vector total overflows")]
    CapacityOverflow,

    #[error("Duplicate bidder {0}")]
    DuplicateBidder(Address),
}

impl PricingError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
