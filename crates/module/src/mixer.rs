//! Settlement address mixing.
//!
//! A bidder in a mixer auction may attach a fresh settlement address,
//! encrypted under the shared key, to its commitment. Once winners are
//! known only the addresses at winning positions are decrypted; losing
//! bidders' addresses are never opened.

use auction_crypto::{decrypt_record, encrypt_record, CryptoError};
use auction_types::{Address, Bid, SharedKey, SymmetricCiphertext, WinnerRecord};

use crate::error::AuctionError;

/// Encrypt a settlement address for attachment to a commitment.
pub fn seal_address(address: &Address, key: &SharedKey) -> Result<SymmetricCiphertext, CryptoError> {
    encrypt_record(address, key)
}

/// Decrypt a sealed settlement address.
pub fn open_address(sealed: &SymmetricCiphertext, key: &SharedKey) -> Result<Address, AuctionError> {
    decrypt_record(sealed, key).map_err(AuctionError::DecryptionFailed)
}

/// Settlement address for each winner, in winner order.
///
/// A winner that attached no address is paid under its committing identity.
/// `bids` must be sorted by committer.
pub fn resolve_winner_addresses(
    bids: &[Bid],
    winners: &[WinnerRecord],
    key: &SharedKey,
) -> Result<Vec<Address>, AuctionError> {
    winners
        .iter()
        .map(|winner| {
            let bid = bids
                .binary_search_by(|b| b.committer.cmp(&winner.bidder))
                .map(|i| &bids[i])
                .map_err(|_| AuctionError::NoCommitment(winner.bidder))?;
            match &bid.encrypted_address {
                Some(sealed) => open_address(sealed, key),
                None => Ok(winner.bidder),
            }
        })
        .collect()
}
