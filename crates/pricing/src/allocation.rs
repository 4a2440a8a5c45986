//! Winner determination and payments for tiered multi-unit auctions.
//!
//! Bidders are ranked by value, highest first, and poured into tiers in
//! order of the cumulative capacity boundaries. A winner in tier `j` pays the
//! bid ranked right after the last slot of tier `j`: the highest bid that
//! would have taken a slot at or below that tier had the winner been
//! absent. With a single one-slot tier this is the Vickrey second price.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use auction_types::{Address, WinnerRecord};

use crate::capacity::CapacityVector;
use crate::PricingError;

/// Result of winner computation over addressed bids.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Allocation {
    /// Winners in rank order
    pub winners: Vec<WinnerRecord>,
    /// Bidders ranked past the last tier, in rank order
    pub losers: Vec<Address>,
}

impl Allocation {
    pub fn winner_addresses(&self) -> Vec<Address> {
        self.winners.iter().map(|w| w.bidder).collect()
    }

    pub fn prices(&self) -> Vec<u64> {
        self.winners.iter().map(|w| w.price).collect()
    }

    /// Total paid by all winners. Wide enough that no price list overflows.
    pub fn revenue(&self) -> u128 {
        self.winners.iter().map(|w| u128::from(w.price)).sum()
    }
}

/// Result of winner computation over index-addressed bids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueAllocation {
    /// Indices into the input value list, in rank order
    pub winners: Vec<usize>,
    /// Price for each entry of `winners`
    pub prices: Vec<u64>,
    /// 1-based tier for each entry of `winners`
    pub tiers: Vec<u32>,
}

struct Placement<K> {
    key: K,
    value: u64,
    tier: u32,
    price: u64,
}

/// Rank bids and assign tiers and prices.
///
/// Ties on value go to the smaller key.
fn place<K: Ord + Copy>(bids: &[(K, u64)], capacities: &CapacityVector) -> (Vec<Placement<K>>, Vec<K>) {
    let mut sorted: Vec<(K, u64)> = bids.to_vec();
    sorted.sort_by(|a, b| match b.1.cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });

    let boundaries = capacities.boundaries();
    let mut placements = Vec::new();
    let mut losers = Vec::new();

    for (position, &(key, value)) in sorted.iter().enumerate() {
        let position = position as u64;
        match boundaries.iter().position(|&bound| position < bound) {
            Some(tier) => {
                // First bid past the tier boundary, or zero when nobody is left
                let price = usize::try_from(boundaries[tier])
                    .ok()
                    .and_then(|bound| sorted.get(bound))
                    .map(|&(_, v)| v)
                    .unwrap_or(0);
                placements.push(Placement {
                    key,
                    value,
                    tier: tier as u32 + 1,
                    price,
                });
            }
            None => losers.push(key),
        }
    }

    (placements, losers)
}

/// Compute winners, tiers and prices for addressed bids.
///
/// Each bidder may appear once.
pub fn allocate(bids: &[(Address, u64)], ctrs: &[i64]) -> Result<Allocation, PricingError> {
    let capacities = CapacityVector::new(ctrs)?;
    allocate_with(bids, &capacities)
}

/// Like [`allocate`], with a capacity vector validated up front.
pub fn allocate_with(
    bids: &[(Address, u64)],
    capacities: &CapacityVector,
) -> Result<Allocation, PricingError> {
    let mut seen = BTreeSet::new();
    for (bidder, _) in bids {
        if !seen.insert(*bidder) {
            return Err(PricingError::DuplicateBidder(*bidder));
        }
    }

    let (placements, losers) = place(bids, capacities);

    Ok(Allocation {
        winners: placements
            .into_iter()
            .map(|p| WinnerRecord {
                bidder: p.key,
                tier: p.tier,
                value: p.value,
                price: p.price,
            })
            .collect(),
        losers,
    })
}

/// Compute winners and prices for values addressed by position.
///
/// Position doubles as registry rank, so ties go to the lower index.
pub fn allocate_values(values: &[u64], ctrs: &[i64]) -> Result<ValueAllocation, PricingError> {
    let capacities = CapacityVector::new(ctrs)?;
    let bids: Vec<(usize, u64)> = values.iter().copied().enumerate().collect();
    let (placements, _) = place(&bids, &capacities);

    Ok(ValueAllocation {
        winners: placements.iter().map(|p| p.key).collect(),
        prices: placements.iter().map(|p| p.price).collect(),
        tiers: placements.iter().map(|p| p.tier).collect(),
    })
}
