//! Hash commitments to bid values.
//!
//! A commitment `C = H(domain || value || salt)` is:
//! - **Hiding**: given C, the value stays unknown while the salt is secret
//! - **Binding**: no other (value', salt') produces the same C
//!
//! Commitments are published during the commit phase; the opening travels
//! encrypted under the shared key at reveal.

use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use auction_types::{BidCommitment, BidOpening};

const COMMITMENT_DOMAIN: &[u8] = b"SEALED_BID_V1";

/// Hash a bid opening.
pub fn commitment_hash(opening: &BidOpening) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(opening.value.to_le_bytes());
    hasher.update(opening.salt);
    hasher.finalize().into()
}

/// Commit to `value` with a fresh random salt.
///
/// Returns the commitment and the opening needed to reveal it later.
pub fn commit_value<R: RngCore + CryptoRng>(value: u64, rng: &mut R) -> (BidCommitment, BidOpening) {
    let mut salt = [0u8; 32];
    rng.fill_bytes(&mut salt);
    let opening = BidOpening { value, salt };
    let commitment = BidCommitment::Sealed {
        hash: commitment_hash(&opening),
    };
    (commitment, opening)
}

/// Check an opening against a commitment.
pub fn verify_opening(commitment: &BidCommitment, opening: &BidOpening) -> bool {
    match commitment {
        BidCommitment::Sealed { hash } => *hash == commitment_hash(opening),
        BidCommitment::Plain { value } => *value == opening.value,
    }
}

/// Compute the hash of all commitments for binding results to the committed bids.
///
/// Order matters: callers pass commitments in registry order.
pub fn compute_commitments_digest<'a, I>(commitments: I) -> [u8; 32]
where
    I: IntoIterator<Item = &'a BidCommitment>,
{
    let mut hasher = Sha256::new();
    for c in commitments {
        hasher.update(c.digest_bytes());
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_commit_verify() {
        let mut rng = OsRng;
        let (commitment, opening) = commit_value(1000, &mut rng);

        assert!(verify_opening(&commitment, &opening));

        let tampered = BidOpening {
            value: 1001,
            ..opening.clone()
        };
        assert!(!verify_opening(&commitment, &tampered));

        let mut wrong_salt = opening;
        wrong_salt.salt[0] ^= 1;
        assert!(!verify_opening(&commitment, &wrong_salt));
    }

    #[test]
    fn test_commitment_hiding() {
        let mut rng = OsRng;
        let (c1, _) = commit_value(1000, &mut rng);
        let (c2, _) = commit_value(1000, &mut rng);

        // Same value, different salt -> different commitments
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_commitments_digest_order_sensitive() {
        let c1 = BidCommitment::Sealed { hash: [1u8; 32] };
        let c2 = BidCommitment::Sealed { hash: [2u8; 32] };

        let hash1 = compute_commitments_digest([&c1, &c2]);
        let hash2 = compute_commitments_digest([&c2, &c1]);

        assert_ne!(hash1, hash2);
        assert_eq!(hash1, compute_commitments_digest([&c1, &c2]));
    }
}
