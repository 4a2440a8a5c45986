//! Cryptographic primitives for chained Diffie-Hellman auctions.
//!
//! # Overview
//!
//! 1. **Key agreement**: each participant holds an ephemeral keypair
//!    `(a, A = g^a)` over the BLS12-381 G1 subgroup. Participants fold their
//!    exponents into each other's values until all hold `g^(a_1 ... a_n)`.
//!
//! 2. **Shared key**: the final group element is run through HKDF-SHA256 to
//!    obtain a 32-byte symmetric key, identical for every participant.
//!
//! 3. **Sealing**: bid openings and settlement addresses are encrypted under
//!    that key with deterministic AES-256-GCM.
//!
//! 4. **Commitments**: bids are bound during the commit phase by
//!    `H(value || salt)`.

pub mod commitment;
pub mod dh;
pub mod error;
pub mod symmetric;

pub use commitment::{commit_value, commitment_hash, compute_commitments_digest, verify_opening};
pub use dh::{derive_shared_key, exponentiate, generator, validate_key, KeyPair};
pub use error::CryptoError;
pub use symmetric::{decrypt, decrypt_record, encrypt, encrypt_record};
