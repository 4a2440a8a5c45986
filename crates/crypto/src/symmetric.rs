//! Deterministic authenticated encryption under the shared key.
//!
//! # Encryption
//!
//! To seal a message `m` under shared key `k`:
//! 1. Derive nonce = SHA-256(domain || k || m)[..12]
//! 2. Encrypt m with AES-256-GCM under k and that nonce
//!
//! The same `(m, k)` always produces the same ciphertext, and only holders
//! of `k` can open it. Callers that need distinct ciphertexts for equal
//! plaintexts must include their own salt in `m`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};

use auction_types::{SharedKey, SymmetricCiphertext};

use crate::error::CryptoError;

const NONCE_DOMAIN: &[u8] = b"SYNTHETIC_NONCE_V1";
const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key`.
pub fn encrypt(plaintext: &[u8], key: &SharedKey) -> Result<SymmetricCiphertext, CryptoError> {
    let nonce_bytes = synthetic_nonce(plaintext, key);

    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|e| {
        CryptoError::EncryptionFailed(format!("Failed to create cipher: {}", e))
    })?;

    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext_with_tag = cipher.encrypt(nonce, plaintext).map_err(|e| {
        CryptoError::EncryptionFailed(format!("AES-GCM encryption failed: {}", e))
    })?;

    // Split ciphertext and tag
    let tag_start = ciphertext_with_tag.len() - TAG_LEN;
    let ciphertext = ciphertext_with_tag[..tag_start].to_vec();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&ciphertext_with_tag[tag_start..]);

    Ok(SymmetricCiphertext {
        nonce: nonce_bytes,
        ciphertext,
        tag,
    })
}

/// Decrypt a ciphertext produced by [`encrypt`].
///
/// Fails with [`CryptoError::AuthenticationFailed`] under any other key or
/// if the ciphertext was modified.
pub fn decrypt(sealed: &SymmetricCiphertext, key: &SharedKey) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let nonce = Nonce::from_slice(&sealed.nonce);

    let mut ct_with_tag = sealed.ciphertext.clone();
    ct_with_tag.extend_from_slice(&sealed.tag);

    let plaintext = cipher
        .decrypt(nonce, ct_with_tag.as_ref())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    // A nonce that was not derived from this plaintext means the box was
    // not produced by `encrypt`.
    if synthetic_nonce(&plaintext, key) != sealed.nonce {
        return Err(CryptoError::AuthenticationFailed);
    }

    Ok(plaintext)
}

/// Encrypt a borsh-encodable value.
pub fn encrypt_record<T: borsh::BorshSerialize>(
    record: &T,
    key: &SharedKey,
) -> Result<SymmetricCiphertext, CryptoError> {
    let bytes = borsh::to_vec(record).map_err(|e| CryptoError::SerializationError(e.to_string()))?;
    encrypt(&bytes, key)
}

/// Decrypt and decode a borsh-encoded value.
pub fn decrypt_record<T: borsh::BorshDeserialize>(
    sealed: &SymmetricCiphertext,
    key: &SharedKey,
) -> Result<T, CryptoError> {
    let bytes = decrypt(sealed, key)?;
    borsh::from_slice(&bytes).map_err(|e| CryptoError::SerializationError(e.to_string()))
}

fn synthetic_nonce(plaintext: &[u8], key: &SharedKey) -> [u8; 12] {
    let mut hasher = Sha256::new();
    hasher.update(NONCE_DOMAIN);
    hasher.update(key.0);
    hasher.update(plaintext);
    let digest = hasher.finalize();

    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&digest[..12]);
    nonce
}
