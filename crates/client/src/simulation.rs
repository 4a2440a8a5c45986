//! In-process protocol simulation.
//!
//! Runs the key exchange among the auctioneer and every registered bidder,
//! then drives one auction through commit, reveal, allocation and settlement
//! against local module state. Each call advances a local block clock.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use auction_dhx::{DhxController, DhxError, DhxParticipant};
use auction_module::handlers::{
    handle_close_auction, handle_close_commit_phase, handle_close_reveal_phase,
    handle_open_auction, handle_publish_results, handle_resolve_payees,
};
use auction_module::{
    handle_call, AuctionCall, AuctionError, AuctionGenesisConfig, AuctionState, CallContext,
    GenesisValidationError,
};
use auction_types::{Address, AuctionOutcome, AuctionVariant, G1Point, SharedKey};

use crate::bid::{create_bid, BidError};
use crate::query::AuctionReader;

/// Seconds between simulated blocks.
const BLOCK_TIME: u64 = 6;

/// Largest value drawn when bid values are not given.
const MAX_RANDOM_BID: u64 = 1_000;

/// Errors raised while running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid genesis: {0}")]
    Genesis(#[from] GenesisValidationError),

    #[error("Key exchange failed: {0}")]
    KeyExchange(#[from] DhxError),

    #[error("Bid preparation failed: {0}")]
    Bid(#[from] BidError),

    #[error("Auction call rejected: {0}")]
    Auction(#[from] AuctionError),

    #[error("Expected {expected} bid values, got {got}")]
    ValueCount { expected: usize, got: usize },

    #[error("Participants derived different shared keys")]
    KeyDisagreement,

    #[error("No shared key for {0}")]
    MissingKey(Address),

    #[error("Auction {0} has no resolved payees")]
    PayeesMissing(u64),
}

/// Inputs to one simulated auction.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub genesis: AuctionGenesisConfig,
    pub variant: AuctionVariant,
    pub capacities: Vec<i64>,
    /// One value per participant in registry order; drawn at random if unset
    pub values: Option<Vec<u64>>,
    /// Bidders that commit but never reveal
    pub abstain: Vec<Address>,
    pub seed: u64,
}

impl SimulationConfig {
    /// Use the genesis defaults for variant and capacities.
    pub fn from_genesis(genesis: AuctionGenesisConfig, seed: u64) -> Self {
        Self {
            variant: genesis.default_variant,
            capacities: genesis.default_capacities.clone(),
            genesis,
            values: None,
            abstain: Vec::new(),
            seed,
        }
    }

    /// Generate an auctioneer and `bidders` random bidder addresses.
    pub fn generated(bidders: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let auctioneer = Address(rng.gen());
        let participants = (0..bidders).map(|_| Address(rng.gen())).collect();
        Self::from_genesis(AuctionGenesisConfig::new(auctioneer, participants), seed)
    }
}

/// What a completed simulation produced.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub auction_id: u64,
    pub variant: AuctionVariant,
    pub key_fingerprint: Option<[u8; 32]>,
    /// Passes the key exchange needed; zero for plain auctions
    pub exchange_passes: usize,
    /// Revealed values in registry order
    pub revealed: Vec<(Address, u64)>,
    pub outcome: AuctionOutcome,
    /// Payment recipients in allocation order
    pub payees: Vec<Address>,
    pub proceeds: u64,
}

/// A single-auction simulation over local module state.
pub struct Simulation {
    config: SimulationConfig,
    state: AuctionState,
    rng: StdRng,
    height: u64,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let state = config.genesis.build_state()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            state,
            rng,
            height: 0,
        })
    }

    /// Module state, for inspection after a run.
    pub fn state(&self) -> &AuctionState {
        &self.state
    }

    /// Run the key exchange and one full auction.
    pub fn run(&mut self) -> Result<SimulationReport, SimulationError> {
        let auctioneer = self.config.genesis.auctioneer;
        let bidders = self
            .state
            .participants
            .as_ref()
            .map(|r| r.as_slice().to_vec())
            .unwrap_or_default();

        let values = self.bid_values(bidders.len())?;
        let variant = self.config.variant;

        // Plain auctions reveal at commit and need no shared key
        let (keys, exchange_passes) = if variant.is_sealed() {
            let mut members = vec![auctioneer];
            members.extend(bidders.iter().copied().filter(|b| *b != auctioneer));
            self.exchange_keys(members)?
        } else {
            (HashMap::new(), 0)
        };
        let key_for = |who: &Address| -> Result<Option<&SharedKey>, SimulationError> {
            if !variant.is_sealed() {
                return Ok(None);
            }
            keys.get(who)
                .map(Some)
                .ok_or(SimulationError::MissingKey(*who))
        };

        let auctioneer_key = key_for(&auctioneer)?.cloned();
        let fingerprint = auctioneer_key.as_ref().map(SharedKey::fingerprint);

        let ctx = self.next_ctx(auctioneer, 0);
        let auction_id = handle_open_auction(
            &mut self.state,
            &ctx,
            variant,
            &self.config.capacities,
            fingerprint,
        )?;

        // Commit
        let mut prepared = Vec::with_capacity(bidders.len());
        for (bidder, value) in bidders.iter().zip(&values) {
            let settlement_address = match variant {
                AuctionVariant::Mixer => Some(Address(self.rng.gen())),
                _ => None,
            };
            let bid = create_bid(
                variant,
                key_for(bidder)?,
                *value,
                settlement_address,
                &mut self.rng,
            )?;

            let ctx = self.next_ctx(*bidder, 0);
            handle_call(&mut self.state, &ctx, bid.commit_call(auction_id))?;
            debug!(auction_id, bidder = %bidder, "Committed");
            prepared.push((*bidder, bid));
        }

        let ctx = self.next_ctx(auctioneer, 0);
        handle_close_commit_phase(&mut self.state, &ctx, auction_id)?;

        // Reveal
        for (bidder, bid) in &prepared {
            if self.config.abstain.contains(bidder) {
                warn!(auction_id, bidder = %bidder, "Bidder withholds reveal");
                continue;
            }
            let Some(key) = key_for(bidder)? else {
                continue;
            };
            if let Some(call) = bid.reveal_call(auction_id, key) {
                let ctx = self.next_ctx(*bidder, 0);
                handle_call(&mut self.state, &ctx, call)?;
            }
        }

        let ctx = self.next_ctx(auctioneer, 0);
        let revealed = handle_close_reveal_phase(&mut self.state, &ctx, auction_id)?;

        let ctx = self.next_ctx(auctioneer, 0);
        let outcome = handle_close_auction(&mut self.state, &ctx, auction_id)?;

        if variant == AuctionVariant::Mixer {
            let key = auctioneer_key
                .as_ref()
                .ok_or(SimulationError::MissingKey(auctioneer))?;
            let ctx = self.next_ctx(auctioneer, 0);
            handle_resolve_payees(&mut self.state, &ctx, auction_id, key)?;
        }

        let payees = self
            .state
            .payees(auction_id)
            .ok_or(SimulationError::PayeesMissing(auction_id))?;
        let ctx = self.next_ctx(auctioneer, 0);
        handle_publish_results(
            &mut self.state,
            &ctx,
            auction_id,
            payees.clone(),
            outcome.prices(),
        )?;

        // Settle
        let (slots, _) = self.state.settlement(auction_id);
        for slot in slots {
            let ctx = self.next_ctx(slot.payee, slot.price);
            handle_call(&mut self.state, &ctx, AuctionCall::Payment { auction_id })?;
        }
        let (_, proceeds) = self.state.settlement(auction_id);

        info!(
            auction_id,
            winners = outcome.winners.len(),
            proceeds,
            "Simulation complete"
        );

        Ok(SimulationReport {
            auction_id,
            variant,
            key_fingerprint: fingerprint,
            exchange_passes,
            revealed,
            outcome,
            payees,
            proceeds,
        })
    }

    /// Run the chained exchange and check every member derived the same key.
    fn exchange_keys(
        &mut self,
        members: Vec<Address>,
    ) -> Result<(HashMap<Address, SharedKey>, usize), SimulationError> {
        let mut participants: Vec<DhxParticipant> =
            members.into_iter().map(DhxParticipant::new).collect();

        let rng = &mut self.rng;
        let publics = participants
            .iter_mut()
            .map(|p| {
                let public = p.generate_random_keypair(&mut *rng)?;
                p.begin()?;
                Ok((p.id(), public))
            })
            .collect::<Result<Vec<(Address, G1Point)>, DhxError>>()?;

        let mut controller = DhxController::new(publics)?;
        let passes = controller.drive(&mut participants)?;
        let keys = controller.finalize_all(&mut participants)?;

        let Some(first) = keys.first() else {
            return Err(SimulationError::KeyDisagreement);
        };
        if keys.iter().any(|k| k != first) {
            return Err(SimulationError::KeyDisagreement);
        }

        info!(
            members = participants.len(),
            passes,
            fingerprint = %hex::encode(&first.fingerprint()[..8]),
            "Shared key agreed"
        );

        let by_member = participants.iter().map(|p| p.id()).zip(keys).collect();
        Ok((by_member, passes))
    }

    fn bid_values(&mut self, bidders: usize) -> Result<Vec<u64>, SimulationError> {
        match &self.config.values {
            Some(values) if values.len() != bidders => Err(SimulationError::ValueCount {
                expected: bidders,
                got: values.len(),
            }),
            Some(values) => Ok(values.clone()),
            None => Ok((0..bidders)
                .map(|_| self.rng.gen_range(1..=MAX_RANDOM_BID))
                .collect()),
        }
    }

    fn next_ctx(&mut self, sender: Address, value: u64) -> CallContext {
        self.height += 1;
        CallContext {
            sender,
            block_height: self.height,
            timestamp: self.height * BLOCK_TIME,
            value,
        }
    }
}
