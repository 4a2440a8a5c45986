//! Diffie-Hellman arithmetic over the BLS12-381 G1 subgroup.
//!
//! Written multiplicatively, a public value is `A = g^a` for the fixed
//! generator `g` of the prime-order subgroup. Here that is scalar
//! multiplication of the G1 generator, and the group order is the scalar
//! field modulus.
//!
//! Chaining relies on commutativity of exponentiation:
//!
//! ```text
//! ((g^a1)^a2)^a3 = g^(a1 * a2 * a3)
//! ```
//!
//! so the order in which participants fold in their exponents does not
//! change the final value.

use std::fmt;

use bls12_381::{G1Affine, G1Projective, Scalar};
use ff::Field;
use group::Curve;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use auction_types::{G1Point, SharedKey};

use crate::error::CryptoError;

const SHARED_KEY_SALT: &[u8] = b"SMART-DHX-V1";
const SHARED_KEY_INFO: &[u8] = b"shared-key";

/// An ephemeral Diffie-Hellman keypair. The private exponent never leaves it.
#[derive(Clone)]
pub struct KeyPair {
    secret: Scalar,
    public: G1Point,
}

impl KeyPair {
    /// Derive a keypair from 32 bytes of seed material.
    ///
    /// The seed is read as a little-endian scalar. A seed that encodes zero
    /// or a value at or above the group order is rejected rather than
    /// reduced.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret: Option<Scalar> = Scalar::from_bytes(seed).into();
        let secret = secret.ok_or(CryptoError::DegenerateKey("exponent >= group order"))?;
        if secret == Scalar::ZERO {
            return Err(CryptoError::DegenerateKey("exponent is zero"));
        }
        Ok(Self::from_scalar(secret))
    }

    /// Sample a uniformly random keypair.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let mut bytes = [0u8; 64];
            rng.fill_bytes(&mut bytes);
            let secret = Scalar::from_bytes_wide(&bytes);
            if secret != Scalar::ZERO {
                return Self::from_scalar(secret);
            }
        }
    }

    fn from_scalar(secret: Scalar) -> Self {
        let public = compress_g1(&(G1Projective::generator() * secret).to_affine());
        Self { secret, public }
    }

    /// The public value `A = g^a`.
    pub fn public(&self) -> &G1Point {
        &self.public
    }

    /// Raise `base` to this keypair's private exponent.
    pub fn exponentiate(&self, base: &G1Point) -> Result<G1Point, CryptoError> {
        exponentiate(base, &self.secret)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("secret", &"<redacted>")
            .field("public", &self.public)
            .finish()
    }
}

/// The fixed public generator `g`.
pub fn generator() -> G1Point {
    compress_g1(&G1Affine::generator())
}

/// Compute `base^exponent`, rejecting malformed or identity bases.
pub fn exponentiate(base: &G1Point, exponent: &Scalar) -> Result<G1Point, CryptoError> {
    let point = decompress_key(base)?;
    let result = (G1Projective::from(point) * exponent).to_affine();
    Ok(compress_g1(&result))
}

/// Validate a group element received from another participant.
pub fn validate_key(point: &G1Point) -> Result<(), CryptoError> {
    decompress_key(point).map(|_| ())
}

/// Derive the symmetric key every participant uses once the exchange converges.
pub fn derive_shared_key(final_point: &G1Point) -> Result<SharedKey, CryptoError> {
    validate_key(final_point)?;

    let hk = Hkdf::<Sha256>::new(Some(SHARED_KEY_SALT), &final_point.0);
    let mut key = [0u8; 32];
    hk.expand(SHARED_KEY_INFO, &mut key)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;

    Ok(SharedKey(key))
}

/// Compress a G1 point to bytes.
pub fn compress_g1(point: &G1Affine) -> G1Point {
    G1Point(point.to_compressed())
}

/// Decompress a G1 point from bytes.
pub fn decompress_g1(bytes: &[u8; 48]) -> Result<G1Affine, CryptoError> {
    let point: Option<G1Affine> = G1Affine::from_compressed(bytes).into();
    point.ok_or(CryptoError::InvalidG1Point)
}

fn decompress_key(point: &G1Point) -> Result<G1Affine, CryptoError> {
    let affine = decompress_g1(&point.0)?;
    if bool::from(affine.is_identity()) {
        return Err(CryptoError::IdentityPoint);
    }
    Ok(affine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seed_from_u64(n: u64) -> [u8; 32] {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&n.to_le_bytes());
        seed
    }

    #[test]
    fn test_keypair_from_seed_is_deterministic() {
        let a = KeyPair::from_seed(&seed_from_u64(42)).unwrap();
        let b = KeyPair::from_seed(&seed_from_u64(42)).unwrap();
        assert_eq!(a.public(), b.public());
    }

    #[test]
    fn test_zero_seed_rejected() {
        let err = KeyPair::from_seed(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, CryptoError::DegenerateKey(_)));
    }

    #[test]
    fn test_seed_above_order_rejected() {
        let err = KeyPair::from_seed(&[0xffu8; 32]).unwrap_err();
        assert_eq!(err, CryptoError::DegenerateKey("exponent >= group order"));
    }

    #[test]
    fn test_two_party_agreement() {
        let mut rng = StdRng::seed_from_u64(7);
        let alice = KeyPair::random(&mut rng);
        let bob = KeyPair::random(&mut rng);

        let ab = bob.exponentiate(alice.public()).unwrap();
        let ba = alice.exponentiate(bob.public()).unwrap();

        assert_eq!(ab, ba);
        assert_eq!(derive_shared_key(&ab).unwrap(), derive_shared_key(&ba).unwrap());
    }

    #[test]
    fn test_chain_order_does_not_matter() {
        let mut rng = StdRng::seed_from_u64(99);
        let keys: Vec<KeyPair> = (0..4).map(|_| KeyPair::random(&mut rng)).collect();

        let forward = keys[1..]
            .iter()
            .try_fold(keys[0].public().clone(), |acc, k| k.exponentiate(&acc))
            .unwrap();
        let backward = keys[..3]
            .iter()
            .rev()
            .try_fold(keys[3].public().clone(), |acc, k| k.exponentiate(&acc))
            .unwrap();

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_identity_rejected() {
        let identity = compress_g1(&G1Affine::identity());
        assert_eq!(validate_key(&identity), Err(CryptoError::IdentityPoint));
    }

    #[test]
    fn test_garbage_point_rejected() {
        let garbage = G1Point([0x11u8; 48]);
        assert_eq!(validate_key(&garbage), Err(CryptoError::InvalidG1Point));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = KeyPair::from_seed(&seed_from_u64(5)).unwrap();
        assert!(format!("{:?}", key).contains("<redacted>"));
    }
}
