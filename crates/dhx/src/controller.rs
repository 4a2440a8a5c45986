//! Routing of key requests between participants.
//!
//! For each requester `t` the controller keeps a chain over every other
//! participant in cyclic registry order starting after `t`. The first link
//! answers with its bare public value; each later link raises the previous
//! answer to its own exponent. Once the last link answers, the chain holds
//! `g^(product of all exponents except a_t)` and `t` finalizes with its own.
//!
//! The controller never sees an exponent. It only stores and forwards
//! group elements.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, warn};

use auction_crypto::validate_key;
use auction_types::{Address, G1Point, SharedKey};

use crate::error::DhxError;
use crate::participant::DhxParticipant;
use crate::registry::Registry;
use crate::types::{AnswerOutcome, KeyAnswer, KeyRequest};

/// Minimum number of participants for a meaningful exchange.
pub const MIN_PARTICIPANTS: usize = 2;

/// Progress of one requester's chain.
#[derive(Debug, Clone)]
struct Chain {
    /// Providers in answer order
    links: Vec<Address>,
    /// Recorded answers, one per completed link
    answers: Vec<G1Point>,
}

impl Chain {
    fn pending_provider(&self) -> Option<Address> {
        self.links.get(self.answers.len()).copied()
    }

    fn is_complete(&self) -> bool {
        self.answers.len() == self.links.len()
    }

    fn combined(&self) -> Option<&G1Point> {
        if self.is_complete() {
            self.answers.last()
        } else {
            None
        }
    }
}

/// Coordinator of the chained exchange.
pub struct DhxController {
    registry: Registry,
    public_keys: HashMap<Address, G1Point>,
    /// Keyed by requester
    chains: BTreeMap<Address, Chain>,
    started: bool,
}

impl DhxController {
    /// Register participants with their public values.
    ///
    /// Participants are put in canonical order; duplicates and invalid
    /// public values are rejected.
    pub fn new<I>(participants: I) -> Result<Self, DhxError>
    where
        I: IntoIterator<Item = (Address, G1Point)>,
    {
        let participants: Vec<(Address, G1Point)> = participants.into_iter().collect();
        let registry = Registry::sort(participants.iter().map(|(id, _)| *id))?;

        if registry.len() < MIN_PARTICIPANTS {
            return Err(DhxError::TooFewParticipants(registry.len()));
        }

        for (_, public) in &participants {
            validate_key(public)?;
        }

        Ok(Self {
            registry,
            public_keys: participants.into_iter().collect(),
            chains: BTreeMap::new(),
            started: false,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Open one chain per participant and return the initial requests.
    pub fn start(&mut self) -> Result<Vec<KeyRequest>, DhxError> {
        if self.started {
            return Err(DhxError::AlreadyStarted);
        }

        for (rank, requester) in self.registry.iter().enumerate() {
            self.chains.insert(
                *requester,
                Chain {
                    links: self.registry.cyclic_successors(rank),
                    answers: Vec::new(),
                },
            );
        }
        self.started = true;

        info!(
            participants = self.registry.len(),
            links_per_chain = self.registry.len() - 1,
            "Key exchange started"
        );

        Ok(self
            .registry
            .iter()
            .filter_map(|requester| self.pending_request(requester))
            .collect())
    }

    /// The next request in `requester`'s chain, or `None` when complete.
    pub fn request_next(&self, requester: &Address) -> Result<Option<KeyRequest>, DhxError> {
        self.chain(requester)?;
        Ok(self.pending_request(requester))
    }

    /// All requests currently waiting on `provider`, in registry order of
    /// requester.
    pub fn requested_keys(&self, provider: &Address) -> Vec<KeyRequest> {
        self.chains
            .iter()
            .filter(|(_, chain)| chain.pending_provider().as_ref() == Some(provider))
            .filter_map(|(requester, _)| self.pending_request(requester))
            .collect()
    }

    pub fn requested_size(&self, provider: &Address) -> usize {
        self.chains
            .values()
            .filter(|chain| chain.pending_provider().as_ref() == Some(provider))
            .count()
    }

    /// Total pending requests across all chains.
    pub fn pending_count(&self) -> usize {
        self.chains
            .values()
            .filter(|chain| !chain.is_complete())
            .count()
    }

    /// Record a provider's answer.
    ///
    /// Answering a link that was already answered with the same value is a
    /// no-op; a different value is rejected. Answering a link that is not
    /// yet pending is a phase error.
    pub fn answer(&mut self, answer: &KeyAnswer) -> Result<AnswerOutcome, DhxError> {
        if !self.started {
            return Err(DhxError::NotStarted);
        }
        if !self.registry.contains(&answer.provider) {
            return Err(DhxError::UnknownParticipant(answer.provider));
        }

        let chain = self
            .chains
            .get(&answer.requester)
            .ok_or(DhxError::UnknownParticipant(answer.requester))?;

        // Check whether this link was already answered
        let link = chain
            .links
            .iter()
            .position(|p| *p == answer.provider)
            .ok_or(DhxError::NoPendingRequest {
                requester: answer.requester,
                provider: answer.provider,
            })?;

        if let Some(recorded) = chain.answers.get(link) {
            if *recorded == answer.value {
                warn!(
                    requester = %answer.requester,
                    provider = %answer.provider,
                    "Duplicate key answer ignored"
                );
                return Ok(AnswerOutcome::Duplicate);
            }
            return Err(DhxError::ConflictingAnswer {
                requester: answer.requester,
                provider: answer.provider,
            });
        }

        // Check the link is the one currently pending
        if link != chain.answers.len() {
            return Err(DhxError::NoPendingRequest {
                requester: answer.requester,
                provider: answer.provider,
            });
        }

        // Check the value itself
        validate_key(&answer.value)?;
        if link == 0 && self.public_keys.get(&answer.provider) != Some(&answer.value) {
            return Err(DhxError::BareKeyMismatch(answer.provider));
        }

        let chain = self
            .chains
            .get_mut(&answer.requester)
            .ok_or(DhxError::UnknownParticipant(answer.requester))?;
        chain.answers.push(answer.value.clone());

        debug!(
            requester = %answer.requester,
            provider = %answer.provider,
            link,
            "Key answer recorded"
        );

        if chain.is_complete() {
            info!(requester = %answer.requester, "Key chain complete");
            Ok(AnswerOutcome::Completed)
        } else {
            Ok(AnswerOutcome::Accepted)
        }
    }

    /// The product of every other participant's exponent, in the exponent of `g`.
    pub fn combined_key(&self, requester: &Address) -> Result<&G1Point, DhxError> {
        self.chain(requester)?
            .combined()
            .ok_or(DhxError::ProtocolIncomplete(*requester))
    }

    /// Whether every chain is complete.
    pub fn is_complete(&self) -> bool {
        self.started && self.chains.values().all(Chain::is_complete)
    }

    /// Providers that currently hold up at least one chain.
    pub fn stalled_providers(&self) -> Vec<Address> {
        self.chains
            .values()
            .filter_map(Chain::pending_provider)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Run the exchange to completion over local participants.
    ///
    /// Makes passes over the registry; in each pass every participant answers
    /// all requests then waiting on it. Each pass advances every unfinished
    /// chain by at least one link, so `n` passes always suffice when everyone
    /// responds. Returns the number of passes used.
    pub fn drive(&mut self, participants: &mut [DhxParticipant]) -> Result<usize, DhxError> {
        let index = self.index_participants(participants)?;

        if !self.started {
            self.start()?;
        }

        let max_passes = self.registry.len();
        let mut passes = 0;

        while !self.is_complete() && passes < max_passes {
            passes += 1;
            let mut progressed = false;

            for provider in self.registry.as_slice().to_vec() {
                let Some(&i) = index.get(&provider) else {
                    continue;
                };
                for request in self.requested_keys(&provider) {
                    let answer = participants[i].answer(&request)?;
                    self.answer(&answer)?;
                    progressed = true;
                }
            }

            debug!(pass = passes, pending = self.pending_count(), "Key exchange pass");

            if !progressed {
                break;
            }
        }

        if !self.is_complete() {
            let stalled = self.stalled_providers();
            warn!(
                pending = self.pending_count(),
                stalled = ?stalled,
                "Key exchange stalled"
            );
            return Err(DhxError::LivenessStall {
                pending: self.pending_count(),
                stalled,
            });
        }

        info!(passes, "Key exchange converged");
        Ok(passes)
    }

    /// Finalize every participant with its combined value.
    ///
    /// Returns shared keys in the order participants were given.
    pub fn finalize_all(
        &self,
        participants: &mut [DhxParticipant],
    ) -> Result<Vec<SharedKey>, DhxError> {
        // Check every combined value first so a failure leaves nobody finalized
        let combined = participants
            .iter()
            .map(|p| self.combined_key(&p.id()).cloned())
            .collect::<Result<Vec<_>, _>>()?;

        participants
            .iter_mut()
            .zip(combined.iter())
            .map(|(p, c)| p.finalize(c).map(|out| out.shared_key.clone()))
            .collect()
    }

    fn chain(&self, requester: &Address) -> Result<&Chain, DhxError> {
        if !self.started {
            return Err(DhxError::NotStarted);
        }
        self.chains
            .get(requester)
            .ok_or(DhxError::UnknownParticipant(*requester))
    }

    fn pending_request(&self, requester: &Address) -> Option<KeyRequest> {
        let chain = self.chains.get(requester)?;
        let provider = chain.pending_provider()?;
        Some(KeyRequest {
            requester: *requester,
            provider,
            supplied: chain.answers.last().cloned(),
            link: chain.answers.len() as u32,
        })
    }

    fn index_participants(
        &self,
        participants: &[DhxParticipant],
    ) -> Result<HashMap<Address, usize>, DhxError> {
        let mut index = HashMap::with_capacity(participants.len());
        for (i, p) in participants.iter().enumerate() {
            if !self.registry.contains(&p.id()) {
                return Err(DhxError::UnknownParticipant(p.id()));
            }
            index.insert(p.id(), i);
        }
        Ok(index)
    }
}
