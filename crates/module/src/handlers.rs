//! Call handlers for the auction module.
//!
//! Each handler checks every precondition before touching state, so a
//! rejected call leaves the auction exactly as it was.

use tracing::{debug, info, warn};

use auction_crypto::{compute_commitments_digest, decrypt_record, verify_opening};
use auction_pricing::{allocate_with, CapacityVector};
use auction_types::{
    Address, AuctionOutcome, AuctionPhase, AuctionVariant, Bid, BidCommitment, BidOpening,
    SettlementSlot, SharedKey, SymmetricCiphertext,
};

use crate::call::{AuctionCall, CallResponse};
use crate::error::AuctionError;
use crate::mixer::{open_address, resolve_winner_addresses};
use crate::state::{Auction, AuctionState as ModuleState};

/// Context provided by the runtime for each call.
#[derive(Clone, Debug)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: u64,
    /// Value attached to the call (for payments)
    pub value: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// Dispatch a call message to its handler.
pub fn handle_call(
    state: &mut ModuleState,
    ctx: &CallContext,
    call: AuctionCall,
) -> HandlerResult<CallResponse> {
    match call {
        AuctionCall::OpenAuction {
            variant,
            ctrs,
            key_fingerprint,
        } => handle_open_auction(state, ctx, variant, &ctrs, key_fingerprint)
            .map(CallResponse::AuctionOpened),
        AuctionCall::CloseCommitPhase { auction_id } => {
            handle_close_commit_phase(state, ctx, auction_id).map(|_| CallResponse::CommitPhaseClosed)
        }
        AuctionCall::CloseRevealPhase { auction_id } => {
            handle_close_reveal_phase(state, ctx, auction_id).map(CallResponse::RevealPhaseClosed)
        }
        AuctionCall::CloseAuction { auction_id } => {
            handle_close_auction(state, ctx, auction_id).map(CallResponse::AuctionClosed)
        }
        AuctionCall::ResolvePayees { auction_id, key } => {
            handle_resolve_payees(state, ctx, auction_id, &key).map(CallResponse::PayeesResolved)
        }
        AuctionCall::PublishResults {
            auction_id,
            payees,
            prices,
        } => handle_publish_results(state, ctx, auction_id, payees, prices)
            .map(|_| CallResponse::ResultsPublished),
        AuctionCall::Commit {
            auction_id,
            commitment,
            encrypted_address,
        } => handle_commit(state, ctx, auction_id, commitment, encrypted_address)
            .map(|_| CallResponse::Committed),
        AuctionCall::Reveal {
            auction_id,
            cipher,
            key,
        } => handle_reveal(state, ctx, auction_id, cipher, &key).map(CallResponse::Revealed),
        AuctionCall::Payment { auction_id } => {
            handle_payment(state, ctx, auction_id).map(CallResponse::PaymentAccepted)
        }
    }
}

/// Handle OpenAuction call.
pub fn handle_open_auction(
    state: &mut ModuleState,
    ctx: &CallContext,
    variant: AuctionVariant,
    ctrs: &[i64],
    key_fingerprint: Option<[u8; 32]>,
) -> HandlerResult<u64> {
    // Check caller may open auctions
    if let Some(auctioneer) = state.auctioneer {
        if ctx.sender != auctioneer {
            return Err(AuctionError::NotAuthorized);
        }
    }

    // Validate capacities
    let capacities = CapacityVector::new(ctrs)?;

    // Sealed variants are bound to a shared key
    match (variant.is_sealed(), key_fingerprint.is_some()) {
        (true, false) => return Err(AuctionError::MissingKeyFingerprint),
        (false, true) => {
            return Err(AuctionError::VariantMismatch(
                "plain auctions take no key fingerprint",
            ))
        }
        _ => {}
    }

    let auction_id = state.allocate_auction_id();
    let auction = Auction::new(
        auction_id,
        ctx.sender,
        variant,
        capacities,
        key_fingerprint,
        ctx.timestamp,
    );
    state.auctions.insert(auction_id, auction);

    info!(
        auction_id,
        auctioneer = %ctx.sender,
        variant = ?variant,
        tiers = ctrs.len(),
        "Auction opened"
    );

    Ok(auction_id)
}

/// Handle Commit call.
pub fn handle_commit(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: u64,
    commitment: BidCommitment,
    encrypted_address: Option<SymmetricCiphertext>,
) -> HandlerResult<()> {
    let registered = state.is_registered(&ctx.sender);
    let auction = state.get_auction_mut(auction_id)?;

    // Check auction is accepting commitments
    auction.expect_phase(AuctionPhase::Open)?;

    if !registered {
        return Err(AuctionError::NotRegistered(ctx.sender));
    }

    // Check commitment matches the variant
    match (auction.variant, &commitment) {
        (AuctionVariant::Plain, BidCommitment::Plain { .. }) => {}
        (AuctionVariant::Sealed | AuctionVariant::Mixer, BidCommitment::Sealed { .. }) => {}
        (AuctionVariant::Plain, _) => {
            return Err(AuctionError::VariantMismatch("plain auctions take raw values"))
        }
        _ => {
            return Err(AuctionError::VariantMismatch(
                "sealed auctions take hashed commitments",
            ))
        }
    }
    if encrypted_address.is_some() && auction.variant != AuctionVariant::Mixer {
        return Err(AuctionError::VariantMismatch(
            "only mixer auctions take settlement addresses",
        ));
    }

    // Check not already committed
    let index = match auction.bid_index(&ctx.sender) {
        Ok(_) => return Err(AuctionError::DuplicateCommitment(ctx.sender)),
        Err(index) => index,
    };

    // Plain values are public from the start
    let (revealed_value, revealed_at) = match commitment {
        BidCommitment::Plain { value } => (Some(value), Some(ctx.timestamp)),
        BidCommitment::Sealed { .. } => (None, None),
    };

    auction.bids.insert(
        index,
        Bid {
            committer: ctx.sender,
            commitment,
            encrypted_address,
            sealed_opening: None,
            revealed_value,
            committed_at: ctx.timestamp,
            revealed_at,
        },
    );

    debug!(auction_id, bidder = %ctx.sender, "Bid committed");
    Ok(())
}

/// Handle CloseCommitPhase call.
pub fn handle_close_commit_phase(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<()> {
    let auction = state.get_auction_mut(auction_id)?;
    auction.expect_auctioneer(&ctx.sender)?;
    auction.expect_phase(AuctionPhase::Open)?;

    auction.advance();

    info!(auction_id, bids = auction.bids.len(), "Commit phase closed");
    Ok(())
}

/// Handle Reveal call.
///
/// The cipher carries the borsh-encoded opening encrypted under the shared
/// key. Returns the revealed value.
pub fn handle_reveal(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: u64,
    cipher: SymmetricCiphertext,
    key: &SharedKey,
) -> HandlerResult<u64> {
    let auction = state.get_auction_mut(auction_id)?;

    // Check reveal window is open
    auction.expect_phase(AuctionPhase::CommitClosed)?;
    if !auction.variant.is_sealed() {
        return Err(AuctionError::VariantMismatch("plain bids are revealed at commit"));
    }

    let index = auction
        .bid_index(&ctx.sender)
        .map_err(|_| AuctionError::NoCommitment(ctx.sender))?;
    if auction.bids[index].is_revealed() {
        return Err(AuctionError::AlreadyRevealed(ctx.sender));
    }

    // Check the key is the one the auction was opened with
    if auction.key_fingerprint != Some(key.fingerprint()) {
        return Err(AuctionError::KeyMismatch);
    }

    let opening: BidOpening =
        decrypt_record(&cipher, key).map_err(AuctionError::DecryptionFailed)?;

    let bid = &auction.bids[index];
    if !verify_opening(&bid.commitment, &opening) {
        return Err(AuctionError::RevealMismatch(ctx.sender));
    }

    // A winner's settlement address must open later, so check it now
    if let Some(sealed) = &bid.encrypted_address {
        open_address(sealed, key)?;
    }

    let bid = &mut auction.bids[index];
    bid.revealed_value = Some(opening.value);
    bid.sealed_opening = Some(cipher);
    bid.revealed_at = Some(ctx.timestamp);

    debug!(auction_id, bidder = %ctx.sender, "Bid revealed");
    Ok(opening.value)
}

/// Handle CloseRevealPhase call.
///
/// Returns revealed values in registry order. Sealed bids that were never
/// revealed are forfeited.
pub fn handle_close_reveal_phase(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<Vec<(Address, u64)>> {
    let auction = state.get_auction_mut(auction_id)?;
    auction.expect_auctioneer(&ctx.sender)?;
    auction.expect_phase(AuctionPhase::CommitClosed)?;

    let forfeited = auction.unrevealed();
    if !forfeited.is_empty() {
        warn!(
            auction_id,
            forfeited = forfeited.len(),
            "Unrevealed bids forfeited"
        );
    }

    auction.advance();

    let revealed = auction.revealed_bids();
    info!(auction_id, revealed = revealed.len(), "Reveal phase closed");
    Ok(revealed)
}

/// Handle CloseAuction call.
pub fn handle_close_auction(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<AuctionOutcome> {
    let auction = state.get_auction_mut(auction_id)?;
    auction.expect_auctioneer(&ctx.sender)?;
    auction.expect_phase(AuctionPhase::Revealed)?;

    let allocation = allocate_with(&auction.revealed_bids(), &auction.capacities)?;
    let revenue = allocation.revenue();

    let outcome = AuctionOutcome {
        winners: allocation.winners,
        forfeited: auction.unrevealed(),
        commitments_digest: compute_commitments_digest(auction.bids.iter().map(|b| &b.commitment)),
        closed_at: ctx.timestamp,
    };

    // Mixer payees stay hidden until resolved
    if auction.variant != AuctionVariant::Mixer {
        auction.payees = Some(outcome.winner_addresses());
    }
    auction.outcome = Some(outcome.clone());
    auction.advance();

    info!(
        auction_id,
        winners = outcome.winners.len(),
        revenue,
        "Auction closed"
    );

    Ok(outcome)
}

/// Handle ResolvePayees call.
pub fn handle_resolve_payees(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: u64,
    key: &SharedKey,
) -> HandlerResult<Vec<Address>> {
    let auction = state.get_auction_mut(auction_id)?;
    auction.expect_auctioneer(&ctx.sender)?;
    auction.expect_phase(AuctionPhase::Closed)?;

    if auction.variant != AuctionVariant::Mixer {
        return Err(AuctionError::VariantMismatch(
            "only mixer auctions resolve payees",
        ));
    }
    if auction.payees.is_some() {
        return Err(AuctionError::PayeesAlreadyResolved);
    }
    if auction.key_fingerprint != Some(key.fingerprint()) {
        return Err(AuctionError::KeyMismatch);
    }

    let outcome = auction.outcome.as_ref().ok_or(AuctionError::InvalidPhase {
        expected: AuctionPhase::Closed,
        got: auction.phase,
    })?;
    let payees = resolve_winner_addresses(&auction.bids, &outcome.winners, key)?;

    auction.payees = Some(payees.clone());

    info!(auction_id, payees = payees.len(), "Settlement addresses resolved");
    Ok(payees)
}

/// Handle PublishResults call.
pub fn handle_publish_results(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: u64,
    payees: Vec<Address>,
    prices: Vec<u64>,
) -> HandlerResult<()> {
    let auction = state.get_auction_mut(auction_id)?;
    auction.expect_auctioneer(&ctx.sender)?;
    auction.expect_phase(AuctionPhase::Closed)?;

    let expected_payees = auction.payees.as_ref().ok_or(AuctionError::PayeesNotResolved)?;
    let outcome = auction.outcome.as_ref().ok_or(AuctionError::InvalidPhase {
        expected: AuctionPhase::Closed,
        got: auction.phase,
    })?;

    // Check published lists against the computed outcome
    if payees != *expected_payees || prices != outcome.prices() {
        return Err(AuctionError::ResultsMismatch);
    }

    auction.settlements = payees
        .into_iter()
        .zip(prices)
        .map(|(payee, price)| SettlementSlot {
            payee,
            price,
            paid_at: None,
        })
        .collect();
    auction.advance();

    info!(
        auction_id,
        slots = auction.settlements.len(),
        "Results published"
    );
    Ok(())
}

/// Handle Payment call.
///
/// `ctx.value` must equal the price of the sender's next unpaid slot.
pub fn handle_payment(
    state: &mut ModuleState,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<u64> {
    let auction = state.get_auction_mut(auction_id)?;
    auction.expect_phase(AuctionPhase::Settled)?;

    let mut slots = auction
        .settlements
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.payee == ctx.sender)
        .peekable();

    if slots.peek().is_none() {
        return Err(AuctionError::NotAWinner(ctx.sender));
    }
    let (index, price) = slots
        .find(|(_, slot)| !slot.is_paid())
        .map(|(i, slot)| (i, slot.price))
        .ok_or(AuctionError::AlreadyPaid(ctx.sender))?;

    // Check attached value
    if ctx.value != price {
        return Err(AuctionError::IncorrectPayment {
            expected: price,
            got: ctx.value,
        });
    }

    auction.settlements[index].paid_at = Some(ctx.timestamp);
    auction.proceeds = auction.proceeds.saturating_add(price);

    info!(auction_id, payee = %ctx.sender, price, "Payment accepted");
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::{commit_value, encrypt_record};
    use auction_types::ErrorKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::mixer::seal_address;

    const AUCTIONEER: Address = Address::from_low_byte(0xA0);

    fn ctx(sender: Address) -> CallContext {
        CallContext {
            sender,
            block_height: 100,
            timestamp: 1000,
            value: 0,
        }
    }

    fn paying(sender: Address, value: u64) -> CallContext {
        CallContext {
            value,
            ..ctx(sender)
        }
    }

    fn bidder(n: u8) -> Address {
        Address::from_low_byte(n)
    }

    fn shared_key() -> SharedKey {
        SharedKey([7u8; 32])
    }

    struct SealedBidder {
        id: Address,
        cipher: SymmetricCiphertext,
    }

    /// Open a sealed auction and commit one bid per value.
    fn sealed_auction(
        state: &mut ModuleState,
        variant: AuctionVariant,
        values: &[u64],
        ctrs: &[i64],
    ) -> (u64, Vec<SealedBidder>) {
        let key = shared_key();
        let mut rng = StdRng::seed_from_u64(42);
        let auction_id =
            handle_open_auction(state, &ctx(AUCTIONEER), variant, ctrs, Some(key.fingerprint()))
                .unwrap();

        let bidders = values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let id = bidder(i as u8 + 1);
                let (commitment, opening) = commit_value(value, &mut rng);
                handle_commit(state, &ctx(id), auction_id, commitment, None).unwrap();
                SealedBidder {
                    id,
                    cipher: encrypt_record(&opening, &key).unwrap(),
                }
            })
            .collect();

        (auction_id, bidders)
    }

    #[test]
    fn test_open_auction_validation() {
        let mut state = ModuleState::new();
        let c = ctx(AUCTIONEER);

        assert_eq!(
            handle_open_auction(&mut state, &c, AuctionVariant::Sealed, &[1], None),
            Err(AuctionError::MissingKeyFingerprint)
        );
        assert!(matches!(
            handle_open_auction(&mut state, &c, AuctionVariant::Plain, &[1], Some([0u8; 32])),
            Err(AuctionError::VariantMismatch(_))
        ));
        let err = handle_open_auction(&mut state, &c, AuctionVariant::Plain, &[1, -2], None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(state.auctions.is_empty());

        state.auctioneer = Some(AUCTIONEER);
        assert_eq!(
            handle_open_auction(&mut state, &ctx(bidder(1)), AuctionVariant::Plain, &[1], None),
            Err(AuctionError::NotAuthorized)
        );
        assert_eq!(
            handle_open_auction(&mut state, &c, AuctionVariant::Plain, &[1], None),
            Ok(1)
        );
    }

    #[test]
    fn test_plain_flow() {
        let mut state = ModuleState::new();
        let auctioneer = ctx(AUCTIONEER);
        let auction_id =
            handle_open_auction(&mut state, &auctioneer, AuctionVariant::Plain, &[1, 2], None)
                .unwrap();

        for (i, value) in [50u64, 40, 30, 20, 10].iter().enumerate() {
            handle_commit(
                &mut state,
                &ctx(bidder(i as u8 + 1)),
                auction_id,
                BidCommitment::Plain { value: *value },
                None,
            )
            .unwrap();
        }

        handle_close_commit_phase(&mut state, &auctioneer, auction_id).unwrap();
        let revealed = handle_close_reveal_phase(&mut state, &auctioneer, auction_id).unwrap();
        assert_eq!(revealed.len(), 5);

        let outcome = handle_close_auction(&mut state, &auctioneer, auction_id).unwrap();
        assert_eq!(outcome.winner_addresses(), vec![bidder(1), bidder(2), bidder(3)]);
        assert_eq!(outcome.prices(), vec![40, 20, 20]);
        assert!(outcome.forfeited.is_empty());

        handle_publish_results(
            &mut state,
            &auctioneer,
            auction_id,
            outcome.winner_addresses(),
            outcome.prices(),
        )
        .unwrap();

        assert_eq!(handle_payment(&mut state, &paying(bidder(1), 40), auction_id), Ok(40));
        assert_eq!(handle_payment(&mut state, &paying(bidder(2), 20), auction_id), Ok(20));

        let auction = state.get_auction(auction_id).unwrap();
        assert_eq!(auction.phase, AuctionPhase::Settled);
        assert_eq!(auction.proceeds, 60);
        assert_eq!(auction.num_paid(), 2);
    }

    #[test]
    fn test_close_with_maximal_bids() {
        let mut state = ModuleState::new();
        let auctioneer = ctx(AUCTIONEER);
        let auction_id =
            handle_open_auction(&mut state, &auctioneer, AuctionVariant::Plain, &[2], None)
                .unwrap();

        for n in 1..=3 {
            handle_commit(
                &mut state,
                &ctx(bidder(n)),
                auction_id,
                BidCommitment::Plain { value: u64::MAX },
                None,
            )
            .unwrap();
        }

        handle_close_commit_phase(&mut state, &auctioneer, auction_id).unwrap();
        handle_close_reveal_phase(&mut state, &auctioneer, auction_id).unwrap();

        let outcome = handle_close_auction(&mut state, &auctioneer, auction_id).unwrap();
        assert_eq!(outcome.winner_addresses(), vec![bidder(1), bidder(2)]);
        assert_eq!(outcome.prices(), vec![u64::MAX, u64::MAX]);
        assert_eq!(state.get_auction(auction_id).unwrap().phase, AuctionPhase::Closed);
    }

    #[test]
    fn test_commit_rules() {
        let mut state = ModuleState::new();
        let (auction_id, _) = sealed_auction(&mut state, AuctionVariant::Sealed, &[10], &[1]);

        // Second commitment from the same bidder
        let err = handle_commit(
            &mut state,
            &ctx(bidder(1)),
            auction_id,
            BidCommitment::Sealed { hash: [0u8; 32] },
            None,
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::DuplicateCommitment(bidder(1)));
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        // Raw value in a sealed auction
        assert!(matches!(
            handle_commit(
                &mut state,
                &ctx(bidder(2)),
                auction_id,
                BidCommitment::Plain { value: 5 },
                None
            ),
            Err(AuctionError::VariantMismatch(_))
        ));

        // Settlement address outside a mixer auction
        let sealed = seal_address(&bidder(9), &shared_key()).unwrap();
        assert!(matches!(
            handle_commit(
                &mut state,
                &ctx(bidder(2)),
                auction_id,
                BidCommitment::Sealed { hash: [0u8; 32] },
                Some(sealed)
            ),
            Err(AuctionError::VariantMismatch(_))
        ));

        // Restricted participation
        state.participants =
            Some(auction_dhx::Registry::sort(vec![bidder(1), bidder(2)]).unwrap());
        assert_eq!(
            handle_commit(
                &mut state,
                &ctx(bidder(3)),
                auction_id,
                BidCommitment::Sealed { hash: [0u8; 32] },
                None
            ),
            Err(AuctionError::NotRegistered(bidder(3)))
        );

        assert_eq!(state.get_auction(auction_id).unwrap().bids.len(), 1);
    }

    #[test]
    fn test_phase_ordering() {
        let mut state = ModuleState::new();
        let (auction_id, bidders) =
            sealed_auction(&mut state, AuctionVariant::Sealed, &[10, 20], &[1]);
        let key = shared_key();
        let auctioneer = ctx(AUCTIONEER);

        // Reveal before commit phase closes
        let err = handle_reveal(
            &mut state,
            &ctx(bidders[0].id),
            auction_id,
            bidders[0].cipher.clone(),
            &key,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Phase);

        // Skipping ahead
        assert!(handle_close_auction(&mut state, &auctioneer, auction_id).is_err());

        // Only the auctioneer closes phases
        assert_eq!(
            handle_close_commit_phase(&mut state, &ctx(bidders[0].id), auction_id),
            Err(AuctionError::NotAuthorized)
        );

        handle_close_commit_phase(&mut state, &auctioneer, auction_id).unwrap();

        // Commit after close
        let err = handle_commit(
            &mut state,
            &ctx(bidder(3)),
            auction_id,
            BidCommitment::Sealed { hash: [0u8; 32] },
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            AuctionError::InvalidPhase {
                expected: AuctionPhase::Open,
                got: AuctionPhase::CommitClosed,
            }
        );

        // Phases never move backwards
        assert!(handle_close_commit_phase(&mut state, &auctioneer, auction_id).is_err());
    }

    #[test]
    fn test_reveal_checks_leave_state_unchanged() {
        let mut state = ModuleState::new();
        let (auction_id, bidders) =
            sealed_auction(&mut state, AuctionVariant::Sealed, &[10, 20], &[1]);
        handle_close_commit_phase(&mut state, &ctx(AUCTIONEER), auction_id).unwrap();
        let before = state.get_auction(auction_id).unwrap().clone();
        let alice = ctx(bidders[0].id);

        // Wrong key
        let err = handle_reveal(
            &mut state,
            &alice,
            auction_id,
            bidders[0].cipher.clone(),
            &SharedKey([8u8; 32]),
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::KeyMismatch);

        // Someone else's opening
        let err = handle_reveal(
            &mut state,
            &alice,
            auction_id,
            bidders[1].cipher.clone(),
            &shared_key(),
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::RevealMismatch(bidders[0].id));
        assert_eq!(err.kind(), ErrorKind::Integrity);

        // Tampered ciphertext
        let mut tampered = bidders[0].cipher.clone();
        tampered.ciphertext[0] ^= 1;
        let err = handle_reveal(&mut state, &alice, auction_id, tampered, &shared_key())
            .unwrap_err();
        assert!(matches!(err, AuctionError::DecryptionFailed(_)));

        // Never committed
        assert_eq!(
            handle_reveal(
                &mut state,
                &ctx(bidder(9)),
                auction_id,
                bidders[0].cipher.clone(),
                &shared_key()
            ),
            Err(AuctionError::NoCommitment(bidder(9)))
        );

        assert_eq!(state.get_auction(auction_id).unwrap(), &before);

        assert_eq!(
            handle_reveal(&mut state, &alice, auction_id, bidders[0].cipher.clone(), &shared_key()),
            Ok(10)
        );
        let err = handle_reveal(&mut state, &alice, auction_id, bidders[0].cipher.clone(), &shared_key())
            .unwrap_err();
        assert_eq!(err, AuctionError::AlreadyRevealed(bidders[0].id));
        assert_eq!(err.kind(), ErrorKind::Duplicate);

        // A different opening after revealing is still a duplicate
        let err = handle_reveal(&mut state, &alice, auction_id, bidders[1].cipher.clone(), &shared_key())
            .unwrap_err();
        assert_eq!(err, AuctionError::AlreadyRevealed(bidders[0].id));
    }

    #[test]
    fn test_unrevealed_bids_forfeited() {
        let mut state = ModuleState::new();
        let (auction_id, bidders) =
            sealed_auction(&mut state, AuctionVariant::Sealed, &[10, 90, 20], &[1]);
        let auctioneer = ctx(AUCTIONEER);
        let key = shared_key();
        handle_close_commit_phase(&mut state, &auctioneer, auction_id).unwrap();

        // The highest bidder never reveals
        for b in [&bidders[0], &bidders[2]] {
            handle_reveal(&mut state, &ctx(b.id), auction_id, b.cipher.clone(), &key).unwrap();
        }

        let revealed = handle_close_reveal_phase(&mut state, &auctioneer, auction_id).unwrap();
        assert_eq!(revealed, vec![(bidder(1), 10), (bidder(3), 20)]);

        let outcome = handle_close_auction(&mut state, &auctioneer, auction_id).unwrap();
        assert_eq!(outcome.winner_addresses(), vec![bidder(3)]);
        assert_eq!(outcome.prices(), vec![10]);
        assert_eq!(outcome.forfeited, vec![bidder(2)]);

        let auction = state.get_auction(auction_id).unwrap();
        let digest = compute_commitments_digest(auction.bids.iter().map(|b| &b.commitment));
        assert_eq!(outcome.commitments_digest, digest);
    }

    #[test]
    fn test_publish_and_payment_rules() {
        let mut state = ModuleState::new();
        let (auction_id, bidders) =
            sealed_auction(&mut state, AuctionVariant::Sealed, &[50, 40, 30], &[2]);
        let auctioneer = ctx(AUCTIONEER);
        let key = shared_key();

        handle_close_commit_phase(&mut state, &auctioneer, auction_id).unwrap();
        for b in &bidders {
            handle_reveal(&mut state, &ctx(b.id), auction_id, b.cipher.clone(), &key).unwrap();
        }
        handle_close_reveal_phase(&mut state, &auctioneer, auction_id).unwrap();

        // Payment before settlement
        assert!(handle_payment(&mut state, &paying(bidder(1), 30), auction_id).is_err());

        let outcome = handle_close_auction(&mut state, &auctioneer, auction_id).unwrap();
        assert_eq!(outcome.prices(), vec![30, 30]);

        // Resolving payees is mixer-only
        assert!(matches!(
            handle_resolve_payees(&mut state, &auctioneer, auction_id, &key),
            Err(AuctionError::VariantMismatch(_))
        ));

        // Results that disagree with the outcome
        let err = handle_publish_results(
            &mut state,
            &auctioneer,
            auction_id,
            outcome.winner_addresses(),
            vec![30, 29],
        )
        .unwrap_err();
        assert_eq!(err, AuctionError::ResultsMismatch);
        assert_eq!(state.get_auction(auction_id).unwrap().phase, AuctionPhase::Closed);

        handle_publish_results(
            &mut state,
            &auctioneer,
            auction_id,
            outcome.winner_addresses(),
            outcome.prices(),
        )
        .unwrap();

        assert_eq!(
            handle_payment(&mut state, &paying(bidder(3), 30), auction_id),
            Err(AuctionError::NotAWinner(bidder(3)))
        );
        assert_eq!(
            handle_payment(&mut state, &paying(bidder(1), 10), auction_id),
            Err(AuctionError::IncorrectPayment {
                expected: 30,
                got: 10
            })
        );
        assert_eq!(handle_payment(&mut state, &paying(bidder(1), 30), auction_id), Ok(30));
        let err = handle_payment(&mut state, &paying(bidder(1), 30), auction_id).unwrap_err();
        assert_eq!(err, AuctionError::AlreadyPaid(bidder(1)));
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert_eq!(state.get_auction(auction_id).unwrap().proceeds, 30);
    }

    #[test]
    fn test_mixer_flow() {
        let mut state = ModuleState::new();
        let key = shared_key();
        let mut rng = StdRng::seed_from_u64(9);
        let auctioneer = ctx(AUCTIONEER);
        let auction_id = handle_open_auction(
            &mut state,
            &auctioneer,
            AuctionVariant::Mixer,
            &[1],
            Some(key.fingerprint()),
        )
        .unwrap();

        let fresh = Address([0xEE; 20]);
        let mut ciphers = Vec::new();
        for (n, value, payee) in [(1u8, 70u64, Some(fresh)), (2, 60, None)] {
            let (commitment, opening) = commit_value(value, &mut rng);
            let sealed = payee.map(|p| seal_address(&p, &key).unwrap());
            handle_commit(&mut state, &ctx(bidder(n)), auction_id, commitment, sealed).unwrap();
            ciphers.push((bidder(n), encrypt_record(&opening, &key).unwrap()));
        }

        handle_close_commit_phase(&mut state, &auctioneer, auction_id).unwrap();
        for (id, cipher) in ciphers {
            handle_reveal(&mut state, &ctx(id), auction_id, cipher, &key).unwrap();
        }
        handle_close_reveal_phase(&mut state, &auctioneer, auction_id).unwrap();
        let outcome = handle_close_auction(&mut state, &auctioneer, auction_id).unwrap();

        // Payees must be resolved before publishing
        assert_eq!(
            handle_publish_results(&mut state, &auctioneer, auction_id, vec![bidder(1)], vec![60]),
            Err(AuctionError::PayeesNotResolved)
        );
        assert_eq!(
            handle_resolve_payees(&mut state, &auctioneer, auction_id, &SharedKey([1u8; 32])),
            Err(AuctionError::KeyMismatch)
        );

        let payees = handle_resolve_payees(&mut state, &auctioneer, auction_id, &key).unwrap();
        assert_eq!(payees, vec![fresh]);
        assert_eq!(
            handle_resolve_payees(&mut state, &auctioneer, auction_id, &key),
            Err(AuctionError::PayeesAlreadyResolved)
        );

        handle_publish_results(&mut state, &auctioneer, auction_id, payees, outcome.prices())
            .unwrap();

        // The committing identity is not the payee
        assert_eq!(
            handle_payment(&mut state, &paying(bidder(1), 60), auction_id),
            Err(AuctionError::NotAWinner(bidder(1)))
        );
        assert_eq!(handle_payment(&mut state, &paying(fresh, 60), auction_id), Ok(60));
    }

    #[test]
    fn test_mixer_reveal_rejects_unopenable_address() {
        let mut state = ModuleState::new();
        let key = shared_key();
        let mut rng = StdRng::seed_from_u64(13);
        let auctioneer = ctx(AUCTIONEER);
        let auction_id = handle_open_auction(
            &mut state,
            &auctioneer,
            AuctionVariant::Mixer,
            &[1],
            Some(key.fingerprint()),
        )
        .unwrap();

        // The high bidder seals its address under the wrong key
        let fresh = Address([0xEE; 20]);
        let mut ciphers = Vec::new();
        for (n, value, sealing_key) in [(1u8, 90u64, SharedKey([9u8; 32])), (2, 40, key.clone())] {
            let (commitment, opening) = commit_value(value, &mut rng);
            let sealed = seal_address(&fresh, &sealing_key).unwrap();
            handle_commit(&mut state, &ctx(bidder(n)), auction_id, commitment, Some(sealed))
                .unwrap();
            ciphers.push((bidder(n), encrypt_record(&opening, &key).unwrap()));
        }
        handle_close_commit_phase(&mut state, &auctioneer, auction_id).unwrap();

        let before = state.get_auction(auction_id).unwrap().clone();
        let (high, high_cipher) = ciphers[0].clone();
        let err = handle_reveal(&mut state, &ctx(high), auction_id, high_cipher, &key).unwrap_err();
        assert!(matches!(err, AuctionError::DecryptionFailed(_)));
        assert_eq!(state.get_auction(auction_id).unwrap(), &before);

        let (low, low_cipher) = ciphers[1].clone();
        assert_eq!(
            handle_reveal(&mut state, &ctx(low), auction_id, low_cipher, &key),
            Ok(40)
        );

        // The unopenable bid is forfeited and settlement still completes
        handle_close_reveal_phase(&mut state, &auctioneer, auction_id).unwrap();
        let outcome = handle_close_auction(&mut state, &auctioneer, auction_id).unwrap();
        assert_eq!(outcome.forfeited, vec![high]);
        assert_eq!(outcome.winner_addresses(), vec![low]);

        let payees = handle_resolve_payees(&mut state, &auctioneer, auction_id, &key).unwrap();
        assert_eq!(payees, vec![fresh]);
        handle_publish_results(&mut state, &auctioneer, auction_id, payees, outcome.prices())
            .unwrap();
        assert_eq!(handle_payment(&mut state, &paying(fresh, 0), auction_id), Ok(0));
        assert_eq!(
            state.get_auction(auction_id).unwrap().phase,
            AuctionPhase::Settled
        );
    }

    #[test]
    fn test_handle_call_dispatch() {
        let mut state = ModuleState::new();
        let auctioneer = ctx(AUCTIONEER);

        let call = AuctionCall::OpenAuction {
            variant: AuctionVariant::Plain,
            ctrs: vec![1],
            key_fingerprint: None,
        };
        let bytes = borsh::to_vec(&call).unwrap();
        let decoded: AuctionCall = borsh::from_slice(&bytes).unwrap();

        assert_eq!(
            handle_call(&mut state, &auctioneer, decoded),
            Ok(CallResponse::AuctionOpened(1))
        );
        assert_eq!(
            handle_call(
                &mut state,
                &ctx(bidder(1)),
                AuctionCall::Commit {
                    auction_id: 1,
                    commitment: BidCommitment::Plain { value: 5 },
                    encrypted_address: None,
                }
            ),
            Ok(CallResponse::Committed)
        );
        assert_eq!(
            handle_call(&mut state, &auctioneer, AuctionCall::CloseCommitPhase { auction_id: 1 }),
            Ok(CallResponse::CommitPhaseClosed)
        );
        assert_eq!(
            handle_call(&mut state, &auctioneer, AuctionCall::CloseRevealPhase { auction_id: 1 }),
            Ok(CallResponse::RevealPhaseClosed(vec![(bidder(1), 5)]))
        );
        assert_eq!(
            handle_call(&mut state, &auctioneer, AuctionCall::Payment { auction_id: 2 }),
            Err(AuctionError::AuctionNotFound(2))
        );
    }
}
