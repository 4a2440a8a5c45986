//! Canonical participant ordering.
//!
//! Every participant sorts the same identifier set independently and must
//! arrive at the same order, so the order is a pure function of the set:
//! ascending by address read as a big-endian unsigned integer.

use auction_types::{Address, ErrorKind};
use thiserror::Error;

/// Errors building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate participant {0}")]
    DuplicateParticipant(Address),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Participants in canonical order. Rank is the position in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    order: Vec<Address>,
}

impl Registry {
    /// Sort a set of participant identifiers.
    ///
    /// Fails on the first duplicate identifier.
    pub fn sort<I>(participants: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Address>,
    {
        let mut order: Vec<Address> = participants.into_iter().collect();
        order.sort_unstable();

        if let Some(pair) = order.windows(2).find(|w| w[0] == w[1]) {
            return Err(RegistryError::DuplicateParticipant(pair[0]));
        }

        Ok(Self { order })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.order.iter()
    }

    pub fn contains(&self, participant: &Address) -> bool {
        self.rank(participant).is_some()
    }

    /// Position of `participant` in canonical order.
    pub fn rank(&self, participant: &Address) -> Option<usize> {
        self.order.binary_search(participant).ok()
    }

    pub fn get(&self, rank: usize) -> Option<&Address> {
        self.order.get(rank)
    }

    /// The participant before `rank`, wrapping from the first to the last.
    pub fn predecessor(&self, rank: usize) -> Option<&Address> {
        if self.order.is_empty() || rank >= self.order.len() {
            return None;
        }
        let n = self.order.len();
        self.order.get((rank + n - 1) % n)
    }

    /// Every other participant in cyclic order, starting right after `rank`.
    pub fn cyclic_successors(&self, rank: usize) -> Vec<Address> {
        let n = self.order.len();
        if rank >= n {
            return Vec::new();
        }
        (1..n).map(|offset| self.order[(rank + offset) % n]).collect()
    }
}
