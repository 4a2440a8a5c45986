//! Genesis configuration for the auction module.
//!
//! Names the auctioneer, the registered bidders and the defaults used when
//! the simulator opens an auction.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use auction_dhx::{Registry, RegistryError, MIN_PARTICIPANTS};
use auction_pricing::{CapacityVector, PricingError};
use auction_types::{Address, AuctionVariant, ErrorKind};

use crate::state::AuctionState;

/// Genesis configuration for the auction module.
///
/// Addresses are written as `0x`-prefixed hex strings.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionGenesisConfig {
    /// The only address allowed to open auctions and drive phases
    #[serde_as(as = "DisplayFromStr")]
    pub auctioneer: Address,

    /// Registered bidders, in any order
    #[serde_as(as = "Vec<DisplayFromStr>")]
    pub participants: Vec<Address>,

    /// Capacity vector for new auctions
    #[serde(default = "default_capacities")]
    pub default_capacities: Vec<i64>,

    /// Variant for new auctions
    #[serde(default)]
    pub default_variant: AuctionVariant,
}

fn default_capacities() -> Vec<i64> {
    vec![1]
}

impl AuctionGenesisConfig {
    pub fn new(auctioneer: Address, participants: Vec<Address>) -> Self {
        Self {
            auctioneer,
            participants,
            default_capacities: default_capacities(),
            default_variant: AuctionVariant::default(),
        }
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        self.registry()?;
        CapacityVector::new(&self.default_capacities)?;
        Ok(())
    }

    /// Participants in canonical order.
    pub fn registry(&self) -> Result<Registry, GenesisValidationError> {
        let registry = Registry::sort(self.participants.iter().copied())?;
        if registry.len() < MIN_PARTICIPANTS {
            return Err(GenesisValidationError::TooFewParticipants(registry.len()));
        }
        Ok(registry)
    }

    /// Build module state from this configuration.
    pub fn build_state(&self) -> Result<AuctionState, GenesisValidationError> {
        self.validate()?;
        Ok(AuctionState {
            auctioneer: Some(self.auctioneer),
            participants: Some(self.registry()?),
            ..AuctionState::new()
        })
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenesisValidationError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Need at least 2 participants, got {0}")]
    TooFewParticipants(usize),

    #[error("Invalid default capacities: {0}")]
    InvalidCapacities(#[from] PricingError),
}

impl GenesisValidationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
