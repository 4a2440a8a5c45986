//! End-to-end integration tests for chained Diffie-Hellman auctions.
//!
//! These tests exercise the full auction lifecycle:
//! 1. Chained key exchange among the auctioneer and bidders
//! 2. Auction opening bound to the shared key fingerprint
//! 3. Commit and reveal
//! 4. Tiered allocation and pricing
//! 5. Settlement, with and without the mixer

#![cfg(test)]

use std::collections::HashMap;

use auction_client::{create_bid, AuctionReader, PreparedBid, Simulation, SimulationConfig};
use auction_dhx::{DhxController, DhxError, DhxParticipant};
use auction_module::{
    handle_call, AuctionCall, AuctionError, AuctionGenesisConfig, AuctionState, CallContext,
    CallResponse,
};
use auction_pricing::allocate_values;
use auction_types::{Address, AuctionPhase, AuctionVariant, ErrorKind, G1Point, SharedKey};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const AUCTIONEER: Address = Address::from_low_byte(0xA0);

/// A small in-process chain: module state plus a block clock.
struct Harness {
    state: AuctionState,
    height: u64,
}

impl Harness {
    fn new(bidders: &[Address]) -> Self {
        let genesis = AuctionGenesisConfig::new(AUCTIONEER, bidders.to_vec());
        Self {
            state: genesis.build_state().unwrap(),
            height: 0,
        }
    }

    fn call(&mut self, sender: Address, call: AuctionCall) -> Result<CallResponse, AuctionError> {
        self.pay(sender, 0, call)
    }

    fn pay(
        &mut self,
        sender: Address,
        value: u64,
        call: AuctionCall,
    ) -> Result<CallResponse, AuctionError> {
        self.height += 1;
        let ctx = CallContext {
            sender,
            block_height: self.height,
            timestamp: self.height * 6,
            value,
        };
        handle_call(&mut self.state, &ctx, call)
    }

    fn open(&mut self, variant: AuctionVariant, ctrs: &[i64], key: Option<&SharedKey>) -> u64 {
        let call = AuctionCall::OpenAuction {
            variant,
            ctrs: ctrs.to_vec(),
            key_fingerprint: key.map(SharedKey::fingerprint),
        };
        match self.call(AUCTIONEER, call).unwrap() {
            CallResponse::AuctionOpened(id) => id,
            other => panic!("unexpected response: {other:?}"),
        }
    }
}

fn bidders(n: u8) -> Vec<Address> {
    (1..=n).map(Address::from_low_byte).collect()
}

/// Run the key exchange among `members` and return each member's key.
fn exchange(members: &[Address], seed: u64) -> HashMap<Address, SharedKey> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut participants: Vec<DhxParticipant> =
        members.iter().copied().map(DhxParticipant::new).collect();
    let publics: Vec<(Address, G1Point)> = participants
        .iter_mut()
        .map(|p| {
            let public = p.generate_random_keypair(&mut rng).unwrap();
            p.begin().unwrap();
            (p.id(), public)
        })
        .collect();

    let mut controller = DhxController::new(publics).unwrap();
    controller.drive(&mut participants).unwrap();
    let keys = controller.finalize_all(&mut participants).unwrap();
    members.iter().copied().zip(keys).collect()
}

fn group(bidders: &[Address]) -> Vec<Address> {
    let mut members = vec![AUCTIONEER];
    members.extend_from_slice(bidders);
    members
}

/// Test the complete sealed auction flow.
#[test]
fn test_full_sealed_auction_flow() {
    let mut rng = StdRng::seed_from_u64(1);
    let bidders = bidders(5);

    // ========================================
    // Phase 1: Key exchange
    // ========================================

    let keys = exchange(&group(&bidders), 42);
    let key = keys[&AUCTIONEER].clone();
    assert!(keys.values().all(|k| *k == key));

    // ========================================
    // Phase 2: Open and commit
    // ========================================

    let mut chain = Harness::new(&bidders);
    let id = chain.open(AuctionVariant::Sealed, &[1, 2], Some(&key));

    let values = [50u64, 40, 30, 20, 10];
    let prepared: Vec<(Address, PreparedBid)> = bidders
        .iter()
        .zip(values)
        .map(|(bidder, value)| {
            let bid = create_bid(
                AuctionVariant::Sealed,
                Some(&keys[bidder]),
                value,
                None,
                &mut rng,
            )
            .unwrap();
            (*bidder, bid)
        })
        .collect();

    for (bidder, bid) in &prepared {
        assert_eq!(
            chain.call(*bidder, bid.commit_call(id)).unwrap(),
            CallResponse::Committed
        );
    }

    // Values stay hidden until reveal
    let auction = chain.state.auction(id).unwrap();
    assert!(auction.bids.iter().all(|b| b.revealed_value.is_none()));

    chain
        .call(AUCTIONEER, AuctionCall::CloseCommitPhase { auction_id: id })
        .unwrap();

    // ========================================
    // Phase 3: Reveal
    // ========================================

    for (bidder, bid) in &prepared {
        let call = bid.reveal_call(id, &keys[bidder]).unwrap();
        assert_eq!(
            chain.call(*bidder, call).unwrap(),
            CallResponse::Revealed(bid.bid_value())
        );
    }

    let revealed = match chain
        .call(AUCTIONEER, AuctionCall::CloseRevealPhase { auction_id: id })
        .unwrap()
    {
        CallResponse::RevealPhaseClosed(revealed) => revealed,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(revealed.len(), 5);

    // ========================================
    // Phase 4: Allocation
    // ========================================

    let outcome = match chain
        .call(AUCTIONEER, AuctionCall::CloseAuction { auction_id: id })
        .unwrap()
    {
        CallResponse::AuctionClosed(outcome) => outcome,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(outcome.winner_addresses(), bidders[..3].to_vec());
    assert_eq!(outcome.prices(), vec![40, 20, 20]);
    assert_eq!(
        outcome.winners.iter().map(|w| w.tier).collect::<Vec<_>>(),
        vec![1, 2, 2]
    );
    assert!(outcome.forfeited.is_empty());

    // ========================================
    // Phase 5: Settlement
    // ========================================

    chain
        .call(
            AUCTIONEER,
            AuctionCall::PublishResults {
                auction_id: id,
                payees: outcome.winner_addresses(),
                prices: outcome.prices(),
            },
        )
        .unwrap();
    assert_eq!(chain.state.phase(id), Some(AuctionPhase::Settled));

    for winner in &outcome.winners {
        let response = chain
            .pay(winner.bidder, winner.price, AuctionCall::Payment { auction_id: id })
            .unwrap();
        assert_eq!(response, CallResponse::PaymentAccepted(winner.price));
    }

    let (slots, proceeds) = chain.state.settlement(id);
    assert!(slots.iter().all(|s| s.is_paid()));
    assert_eq!(proceeds, 80);

    // Losers owe nothing
    let err = chain
        .pay(bidders[4], 0, AuctionCall::Payment { auction_id: id })
        .unwrap_err();
    assert_eq!(err, AuctionError::NotAWinner(bidders[4]));
}

/// Test the plain reference auction: values public at commit.
#[test]
fn test_plain_auction_flow() {
    let bidders = bidders(3);
    let mut chain = Harness::new(&bidders);
    let id = chain.open(AuctionVariant::Plain, &[2], None);

    for (bidder, value) in bidders.iter().zip([10u64, 30, 20]) {
        let bid = create_bid(AuctionVariant::Plain, None, value, None, &mut rand::thread_rng())
            .unwrap();
        chain.call(*bidder, bid.commit_call(id)).unwrap();
    }

    // Revealing a plain bid is a variant error
    chain
        .call(AUCTIONEER, AuctionCall::CloseCommitPhase { auction_id: id })
        .unwrap();
    let reveal = AuctionCall::Reveal {
        auction_id: id,
        cipher: auction_crypto::encrypt(b"x", &SharedKey([1; 32])).unwrap(),
        key: SharedKey([1; 32]),
    };
    let err = chain.call(bidders[0], reveal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    chain
        .call(AUCTIONEER, AuctionCall::CloseRevealPhase { auction_id: id })
        .unwrap();
    let outcome = match chain
        .call(AUCTIONEER, AuctionCall::CloseAuction { auction_id: id })
        .unwrap()
    {
        CallResponse::AuctionClosed(outcome) => outcome,
        other => panic!("unexpected response: {other:?}"),
    };

    assert_eq!(outcome.winner_addresses(), vec![bidders[1], bidders[2]]);
    assert_eq!(outcome.prices(), vec![10, 10]);
}

/// Test the mixer: winners are paid through fresh addresses.
#[test]
fn test_mixer_flow() {
    let mut rng = StdRng::seed_from_u64(2);
    let bidders = bidders(3);
    let keys = exchange(&group(&bidders), 7);
    let key = keys[&AUCTIONEER].clone();

    let mut chain = Harness::new(&bidders);
    let id = chain.open(AuctionVariant::Mixer, &[1], Some(&key));

    let fresh: Vec<Address> = (0..3).map(|i| Address::from_low_byte(0xC0 + i)).collect();
    let mut prepared = Vec::new();
    for ((bidder, value), payee) in bidders.iter().zip([5u64, 9, 7]).zip(&fresh) {
        let bid = create_bid(
            AuctionVariant::Mixer,
            Some(&keys[bidder]),
            value,
            Some(*payee),
            &mut rng,
        )
        .unwrap();
        chain.call(*bidder, bid.commit_call(id)).unwrap();
        prepared.push((*bidder, bid));
    }

    chain
        .call(AUCTIONEER, AuctionCall::CloseCommitPhase { auction_id: id })
        .unwrap();
    for (bidder, bid) in &prepared {
        chain
            .call(*bidder, bid.reveal_call(id, &key).unwrap())
            .unwrap();
    }
    chain
        .call(AUCTIONEER, AuctionCall::CloseRevealPhase { auction_id: id })
        .unwrap();
    chain
        .call(AUCTIONEER, AuctionCall::CloseAuction { auction_id: id })
        .unwrap();

    // Payees are hidden until resolved
    assert!(chain.state.payees(id).is_none());
    let err = chain
        .call(
            AUCTIONEER,
            AuctionCall::PublishResults {
                auction_id: id,
                payees: vec![fresh[1]],
                prices: vec![7],
            },
        )
        .unwrap_err();
    assert_eq!(err, AuctionError::PayeesNotResolved);

    let payees = match chain
        .call(
            AUCTIONEER,
            AuctionCall::ResolvePayees {
                auction_id: id,
                key: key.clone(),
            },
        )
        .unwrap()
    {
        CallResponse::PayeesResolved(payees) => payees,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(payees, vec![fresh[1]]);

    chain
        .call(
            AUCTIONEER,
            AuctionCall::PublishResults {
                auction_id: id,
                payees: payees.clone(),
                prices: vec![7],
            },
        )
        .unwrap();

    // The bidding identity is not the payee
    let err = chain
        .pay(bidders[1], 7, AuctionCall::Payment { auction_id: id })
        .unwrap_err();
    assert_eq!(err, AuctionError::NotAWinner(bidders[1]));

    chain
        .pay(fresh[1], 7, AuctionCall::Payment { auction_id: id })
        .unwrap();
    assert_eq!(chain.state.settlement(id).1, 7);
}

/// Test that a participant who stops answering stalls the exchange, and
/// that it resumes once they return.
#[test]
fn test_key_exchange_stall_and_resume() {
    let mut rng = StdRng::seed_from_u64(3);
    let members = group(&bidders(3));
    let mut participants: Vec<DhxParticipant> =
        members.iter().copied().map(DhxParticipant::new).collect();
    let publics: Vec<(Address, G1Point)> = participants
        .iter_mut()
        .map(|p| {
            let public = p.generate_random_keypair(&mut rng).unwrap();
            p.begin().unwrap();
            (p.id(), public)
        })
        .collect();
    let mut controller = DhxController::new(publics).unwrap();

    let absent = participants.pop().unwrap();
    let err = controller.drive(&mut participants).unwrap_err();
    match &err {
        DhxError::LivenessStall { pending, stalled } => {
            assert!(*pending > 0);
            assert_eq!(stalled, &vec![absent.id()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::LivenessStall);

    participants.push(absent);
    controller.drive(&mut participants).unwrap();
    assert!(controller.is_complete());

    let keys = controller.finalize_all(&mut participants).unwrap();
    assert!(keys.windows(2).all(|w| w[0] == w[1]));
}

/// Test that a reveal under the wrong key leaves state untouched.
#[test]
fn test_rejected_reveal_is_atomic() {
    let mut rng = StdRng::seed_from_u64(4);
    let bidders = bidders(2);
    let keys = exchange(&group(&bidders), 9);
    let key = keys[&AUCTIONEER].clone();

    let mut chain = Harness::new(&bidders);
    let id = chain.open(AuctionVariant::Sealed, &[1], Some(&key));

    let bid = create_bid(AuctionVariant::Sealed, Some(&key), 12, None, &mut rng).unwrap();
    chain.call(bidders[0], bid.commit_call(id)).unwrap();
    chain
        .call(AUCTIONEER, AuctionCall::CloseCommitPhase { auction_id: id })
        .unwrap();

    let before = chain.state.auction(id).unwrap();
    let wrong = SharedKey([0xAB; 32]);
    let err = chain
        .call(bidders[0], bid.reveal_call(id, &wrong).unwrap())
        .unwrap_err();
    assert_eq!(err, AuctionError::KeyMismatch);
    assert_eq!(chain.state.auction(id).unwrap(), before);

    // The right key still works afterwards
    chain
        .call(bidders[0], bid.reveal_call(id, &key).unwrap())
        .unwrap();
}

/// Test phase and registration guards.
#[test]
fn test_phase_and_registration_guards() {
    let bidders = bidders(2);
    let key = SharedKey([3; 32]);
    let mut chain = Harness::new(&bidders);
    let id = chain.open(AuctionVariant::Sealed, &[1], Some(&key));

    let bid = create_bid(
        AuctionVariant::Sealed,
        Some(&key),
        4,
        None,
        &mut rand::thread_rng(),
    )
    .unwrap();

    // Outsiders cannot bid
    let outsider = Address::from_low_byte(0x55);
    let err = chain.call(outsider, bid.commit_call(id)).unwrap_err();
    assert_eq!(err, AuctionError::NotRegistered(outsider));

    // Only the auctioneer drives phases
    let err = chain
        .call(bidders[0], AuctionCall::CloseCommitPhase { auction_id: id })
        .unwrap_err();
    assert_eq!(err, AuctionError::NotAuthorized);

    // Reveal before the commit phase closes
    chain.call(bidders[0], bid.commit_call(id)).unwrap();
    let err = chain
        .call(bidders[0], bid.reveal_call(id, &key).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Phase);

    // Duplicate commitment
    let err = chain.call(bidders[0], bid.commit_call(id)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);

    // Commit after close
    chain
        .call(AUCTIONEER, AuctionCall::CloseCommitPhase { auction_id: id })
        .unwrap();
    let err = chain.call(bidders[1], bid.commit_call(id)).unwrap_err();
    assert_eq!(
        err,
        AuctionError::InvalidPhase {
            expected: AuctionPhase::Open,
            got: AuctionPhase::CommitClosed,
        }
    );

    // Settlement before close
    let err = chain
        .call(AUCTIONEER, AuctionCall::CloseAuction { auction_id: id })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Phase);
}

/// Test payment amount checks.
#[test]
fn test_incorrect_payment_rejected() {
    let bidders = bidders(2);
    let mut chain = Harness::new(&bidders);
    let id = chain.open(AuctionVariant::Plain, &[1], None);
    for (bidder, value) in bidders.iter().zip([8u64, 3]) {
        chain
            .call(
                *bidder,
                AuctionCall::Commit {
                    auction_id: id,
                    commitment: auction_types::BidCommitment::Plain { value },
                    encrypted_address: None,
                },
            )
            .unwrap();
    }
    for call in [
        AuctionCall::CloseCommitPhase { auction_id: id },
        AuctionCall::CloseRevealPhase { auction_id: id },
        AuctionCall::CloseAuction { auction_id: id },
    ] {
        chain.call(AUCTIONEER, call).unwrap();
    }

    // Publishing altered prices is rejected
    let err = chain
        .call(
            AUCTIONEER,
            AuctionCall::PublishResults {
                auction_id: id,
                payees: vec![bidders[0]],
                prices: vec![1],
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);

    chain
        .call(
            AUCTIONEER,
            AuctionCall::PublishResults {
                auction_id: id,
                payees: vec![bidders[0]],
                prices: vec![3],
            },
        )
        .unwrap();

    let err = chain
        .pay(bidders[0], 2, AuctionCall::Payment { auction_id: id })
        .unwrap_err();
    assert_eq!(err, AuctionError::IncorrectPayment { expected: 3, got: 2 });

    chain
        .pay(bidders[0], 3, AuctionCall::Payment { auction_id: id })
        .unwrap();
    let err = chain
        .pay(bidders[0], 3, AuctionCall::Payment { auction_id: id })
        .unwrap_err();
    assert_eq!(err, AuctionError::AlreadyPaid(bidders[0]));
}

/// Test that the simulator agrees with the pricing engine.
#[test]
fn test_simulation_matches_pricing() {
    let mut config = SimulationConfig::generated(6, 21);
    config.capacities = vec![2, 1];
    config.variant = AuctionVariant::Mixer;
    let report = Simulation::new(config).unwrap().run().unwrap();

    let values: Vec<u64> = report.revealed.iter().map(|(_, v)| *v).collect();
    let expected = allocate_values(&values, &[2, 1]).unwrap();
    assert_eq!(report.outcome.prices(), expected.prices);
    assert_eq!(report.proceeds, expected.prices.iter().sum::<u64>());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Every member of a random-size group ends with the same key.
    #[test]
    fn prop_group_key_converges(n in 2u8..7, seed in any::<u64>()) {
        let keys = exchange(&bidders(n), seed);
        let first = keys.values().next().unwrap().clone();
        prop_assert!(keys.values().all(|k| *k == first));
    }
}
