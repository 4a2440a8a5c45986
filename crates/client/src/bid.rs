//! Bid creation and sealing.

use rand::{CryptoRng, RngCore};
use thiserror::Error;

use auction_crypto::{commit_value, encrypt_record, CryptoError};
use auction_module::mixer::seal_address;
use auction_module::AuctionCall;
use auction_types::{Address, AuctionVariant, BidCommitment, BidOpening, SharedKey, SymmetricCiphertext};

/// Errors that can occur during bid creation.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("Sealed bids need the shared key")]
    MissingSharedKey,

    #[error("Settlement addresses are only accepted by mixer auctions")]
    AddressNotSupported,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(#[from] CryptoError),
}

/// A prepared bid ready for submission.
#[derive(Debug, Clone)]
pub struct PreparedBid {
    /// Published at commit
    pub commitment: BidCommitment,
    /// Value and salt (keep secret until reveal)
    pub opening: BidOpening,
    /// Opening encrypted under the shared key, submitted at reveal
    pub reveal_cipher: Option<SymmetricCiphertext>,
    /// Settlement address encrypted under the shared key
    pub encrypted_address: Option<SymmetricCiphertext>,
}

impl PreparedBid {
    pub fn bid_value(&self) -> u64 {
        self.opening.value
    }

    /// Commit message for `auction_id`.
    pub fn commit_call(&self, auction_id: u64) -> AuctionCall {
        AuctionCall::Commit {
            auction_id,
            commitment: self.commitment.clone(),
            encrypted_address: self.encrypted_address.clone(),
        }
    }

    /// Reveal message for `auction_id`, or `None` for plain bids.
    pub fn reveal_call(&self, auction_id: u64, key: &SharedKey) -> Option<AuctionCall> {
        self.reveal_cipher.as_ref().map(|cipher| AuctionCall::Reveal {
            auction_id,
            cipher: cipher.clone(),
            key: key.clone(),
        })
    }
}

/// Create a bid for an auction of the given variant.
///
/// # Arguments
/// * `variant` - Variant of the target auction
/// * `key` - Shared key from the key exchange; required unless `Plain`
/// * `bid_value` - The bid amount
/// * `settlement_address` - Fresh payee address (mixer only)
/// * `rng` - Cryptographically secure random number generator
pub fn create_bid<R: RngCore + CryptoRng>(
    variant: AuctionVariant,
    key: Option<&SharedKey>,
    bid_value: u64,
    settlement_address: Option<Address>,
    rng: &mut R,
) -> Result<PreparedBid, BidError> {
    if settlement_address.is_some() && variant != AuctionVariant::Mixer {
        return Err(BidError::AddressNotSupported);
    }

    if !variant.is_sealed() {
        return Ok(PreparedBid {
            commitment: BidCommitment::Plain { value: bid_value },
            opening: BidOpening {
                value: bid_value,
                salt: [0u8; 32],
            },
            reveal_cipher: None,
            encrypted_address: None,
        });
    }

    let key = key.ok_or(BidError::MissingSharedKey)?;
    let (commitment, opening) = commit_value(bid_value, rng);
    let reveal_cipher = encrypt_record(&opening, key)?;
    let encrypted_address = settlement_address
        .map(|address| seal_address(&address, key))
        .transpose()?;

    Ok(PreparedBid {
        commitment,
        opening,
        reveal_cipher: Some(reveal_cipher),
        encrypted_address,
    })
}

/// Builder for creating bids with additional options.
pub struct BidBuilder {
    variant: AuctionVariant,
    key: Option<SharedKey>,
    bid_value: u64,
    settlement_address: Option<Address>,
}

impl BidBuilder {
    /// Create a new bid builder.
    pub fn new(variant: AuctionVariant) -> Self {
        Self {
            variant,
            key: None,
            bid_value: 0,
            settlement_address: None,
        }
    }

    /// Set the shared key.
    pub fn shared_key(mut self, key: SharedKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Set the bid value.
    pub fn bid_value(mut self, value: u64) -> Self {
        self.bid_value = value;
        self
    }

    /// Pay winnings to a fresh address instead of the bidding identity.
    pub fn settlement_address(mut self, address: Address) -> Self {
        self.settlement_address = Some(address);
        self
    }

    /// Build the prepared bid.
    pub fn build<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<PreparedBid, BidError> {
        create_bid(
            self.variant,
            self.key.as_ref(),
            self.bid_value,
            self.settlement_address,
            rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::{decrypt_record, verify_opening};
    use rand::rngs::OsRng;

    fn key() -> SharedKey {
        SharedKey([5u8; 32])
    }

    #[test]
    fn test_create_sealed_bid() {
        let mut rng = OsRng;
        let prepared = create_bid(AuctionVariant::Sealed, Some(&key()), 1000, None, &mut rng).unwrap();

        assert_eq!(prepared.bid_value(), 1000);
        assert!(verify_opening(&prepared.commitment, &prepared.opening));

        let cipher = prepared.reveal_cipher.as_ref().unwrap();
        let opened: BidOpening = decrypt_record(cipher, &key()).unwrap();
        assert_eq!(opened, prepared.opening);
        assert!(prepared.reveal_call(3, &key()).is_some());
    }

    #[test]
    fn test_plain_bid_needs_no_key() {
        let prepared = create_bid(AuctionVariant::Plain, None, 7, None, &mut OsRng).unwrap();
        assert_eq!(prepared.commitment, BidCommitment::Plain { value: 7 });
        assert!(prepared.reveal_call(1, &key()).is_none());
    }

    #[test]
    fn test_sealed_bid_needs_key() {
        assert!(matches!(
            create_bid(AuctionVariant::Sealed, None, 7, None, &mut OsRng),
            Err(BidError::MissingSharedKey)
        ));
    }

    #[test]
    fn test_bid_builder() {
        let mut rng = OsRng;
        let payee = Address([0xEE; 20]);

        let bid = BidBuilder::new(AuctionVariant::Mixer)
            .shared_key(key())
            .bid_value(500)
            .settlement_address(payee)
            .build(&mut rng)
            .unwrap();

        assert_eq!(bid.bid_value(), 500);
        let sealed = bid.encrypted_address.as_ref().unwrap();
        let opened: Address = decrypt_record(sealed, &key()).unwrap();
        assert_eq!(opened, payee);

        match bid.commit_call(4) {
            AuctionCall::Commit {
                auction_id,
                encrypted_address,
                ..
            } => {
                assert_eq!(auction_id, 4);
                assert!(encrypted_address.is_some());
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[test]
    fn test_address_rejected_outside_mixer() {
        let result = BidBuilder::new(AuctionVariant::Sealed)
            .shared_key(key())
            .settlement_address(Address([0xEE; 20]))
            .build(&mut OsRng);
        assert!(matches!(result, Err(BidError::AddressNotSupported)));
    }
}
