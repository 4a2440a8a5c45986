//! Tiered capacity vectors.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::PricingError;

/// Slot counts per tier, most valuable tier first.
///
/// Tier sizes may be zero individually but not all at once, and their sum
/// fits in a `u64`. Both decoders enforce this.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, Serialize, Deserialize)]
#[serde(try_from = "RawCapacities")]
pub struct CapacityVector {
    tiers: Vec<u64>,
}

#[derive(Deserialize)]
struct RawCapacities {
    tiers: Vec<u64>,
}

impl TryFrom<RawCapacities> for CapacityVector {
    type Error = PricingError;

    fn try_from(raw: RawCapacities) -> Result<Self, Self::Error> {
        Self::from_tiers(raw.tiers)
    }
}

impl BorshDeserialize for CapacityVector {
    fn deserialize_reader<R: borsh::io::Read>(reader: &mut R) -> borsh::io::Result<Self> {
        let tiers = Vec::<u64>::deserialize_reader(reader)?;
        Self::from_tiers(tiers)
            .map_err(|e| borsh::io::Error::new(borsh::io::ErrorKind::InvalidData, e.to_string()))
    }
}

impl CapacityVector {
    /// Validate raw tier sizes.
    pub fn new(ctrs: &[i64]) -> Result<Self, PricingError> {
        let tiers = ctrs
            .iter()
            .enumerate()
            .map(|(tier, &size)| {
                u64::try_from(size).map_err(|_| PricingError::NegativeCapacity { tier, size })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_tiers(tiers)
    }

    fn from_tiers(tiers: Vec<u64>) -> Result<Self, PricingError> {
        let total = tiers
            .iter()
            .try_fold(0u64, |acc, &size| acc.checked_add(size))
            .ok_or(PricingError::CapacityOverflow)?;

        // Check at least one slot exists
        if total == 0 {
            return Err(PricingError::ZeroCapacity);
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[u64] {
        &self.tiers
    }

    /// Cumulative upper boundary of each tier.
    pub fn boundaries(&self) -> Vec<u64> {
        self.tiers
            .iter()
            .scan(0u64, |acc, &size| {
                *acc = acc.saturating_add(size);
                Some(*acc)
            })
            .collect()
    }
}
