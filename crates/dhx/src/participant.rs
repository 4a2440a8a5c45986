//! Key exchange participant implementation.

use rand::{CryptoRng, RngCore};
use tracing::debug;

use auction_crypto::{derive_shared_key, KeyPair};
use auction_types::{Address, G1Point, SharedKey};

use crate::error::DhxError;
use crate::types::{ExchangeOutput, ExchangeState, KeyAnswer, KeyRequest};

/// One party in the chained exchange.
///
/// Holds the private exponent and answers requests routed to it by the
/// controller. The exponent is never exposed; only group elements leave.
pub struct DhxParticipant {
    id: Address,
    /// Our ephemeral keypair
    keypair: Option<KeyPair>,
    state: ExchangeState,
    /// Answers given so far, across all chains
    answers_given: usize,
    /// Final output
    output: Option<ExchangeOutput>,
}

impl DhxParticipant {
    pub fn new(id: Address) -> Self {
        Self {
            id,
            keypair: None,
            state: ExchangeState::Idle,
            answers_given: 0,
            output: None,
        }
    }

    pub fn id(&self) -> Address {
        self.id
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Our public value `A = g^a`, once generated.
    pub fn public_key(&self) -> Option<&G1Point> {
        self.keypair.as_ref().map(KeyPair::public)
    }

    /// Generate the keypair from seed material. Only valid while idle.
    pub fn generate_keypair(&mut self, seed: &[u8; 32]) -> Result<G1Point, DhxError> {
        self.expect_state(ExchangeState::Idle, "Idle")?;
        let keypair = KeyPair::from_seed(seed)?;
        Ok(self.install(keypair))
    }

    /// Generate a random keypair. Only valid while idle.
    pub fn generate_random_keypair<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<G1Point, DhxError> {
        self.expect_state(ExchangeState::Idle, "Idle")?;
        Ok(self.install(KeyPair::random(rng)))
    }

    fn install(&mut self, keypair: KeyPair) -> G1Point {
        let public = keypair.public().clone();
        self.keypair = Some(keypair);
        self.state = ExchangeState::AGenerated;
        public
    }

    /// Enter the exchange.
    pub fn begin(&mut self) -> Result<(), DhxError> {
        self.expect_state(ExchangeState::AGenerated, "AGenerated")?;
        self.state = ExchangeState::Requesting;
        Ok(())
    }

    /// Answer a request routed to us.
    ///
    /// A bare request gets our public value; otherwise the supplied value is
    /// raised to our exponent. Answering continues after we finalize, since
    /// other chains may still need our contribution.
    pub fn answer(&mut self, request: &KeyRequest) -> Result<KeyAnswer, DhxError> {
        if request.provider != self.id {
            return Err(DhxError::WrongProvider {
                expected: request.provider,
                got: self.id,
            });
        }

        let keypair = match self.state {
            ExchangeState::Requesting | ExchangeState::Answering | ExchangeState::Finalized => {
                self.keypair.as_ref().ok_or(DhxError::InvalidState {
                    expected: "keypair generated",
                    got: self.state,
                })?
            }
            other => {
                return Err(DhxError::InvalidState {
                    expected: "Requesting, Answering or Finalized",
                    got: other,
                })
            }
        };

        let value = match &request.supplied {
            None => keypair.public().clone(),
            Some(supplied) => keypair.exponentiate(supplied)?,
        };

        debug!(
            participant = %self.id,
            requester = %request.requester,
            link = request.link,
            "Answered key request"
        );

        self.answers_given += 1;
        if self.state == ExchangeState::Requesting {
            self.state = ExchangeState::Answering;
        }

        Ok(KeyAnswer {
            requester: request.requester,
            provider: self.id,
            value,
        })
    }

    /// Raise the combined value of every other participant to our exponent
    /// and derive the shared key.
    pub fn finalize(&mut self, combined: &G1Point) -> Result<&ExchangeOutput, DhxError> {
        let keypair = match self.state {
            ExchangeState::Requesting | ExchangeState::Answering => {
                self.keypair.as_ref().ok_or(DhxError::InvalidState {
                    expected: "keypair generated",
                    got: self.state,
                })?
            }
            other => {
                return Err(DhxError::InvalidState {
                    expected: "Requesting or Answering",
                    got: other,
                })
            }
        };

        let final_key = keypair.exponentiate(combined)?;
        let shared_key = derive_shared_key(&final_key)?;

        debug!(
            participant = %self.id,
            fingerprint = %hex::encode(&shared_key.fingerprint()[..8]),
            "Derived shared key"
        );

        self.state = ExchangeState::Finalized;
        Ok(self.output.insert(ExchangeOutput {
            final_key,
            shared_key,
            answers_given: self.answers_given,
        }))
    }

    pub fn output(&self) -> Option<&ExchangeOutput> {
        self.output.as_ref()
    }

    pub fn shared_key(&self) -> Option<&SharedKey> {
        self.output.as_ref().map(|o| &o.shared_key)
    }

    fn expect_state(&self, expected: ExchangeState, name: &'static str) -> Result<(), DhxError> {
        if self.state != expected {
            return Err(DhxError::InvalidState {
                expected: name,
                got: self.state,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::ErrorKind;
    use rand::rngs::OsRng;

    fn seed(n: u8) -> [u8; 32] {
        let mut s = [0u8; 32];
        s[0] = n;
        s
    }

    fn request(requester: u8, provider: u8, supplied: Option<G1Point>) -> KeyRequest {
        KeyRequest {
            requester: Address::from_low_byte(requester),
            provider: Address::from_low_byte(provider),
            supplied,
            link: 0,
        }
    }

    #[test]
    fn test_state_transitions() {
        let mut p = DhxParticipant::new(Address::from_low_byte(1));
        assert_eq!(p.state(), ExchangeState::Idle);

        // Cannot begin before generating
        let err = p.begin().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Phase);

        p.generate_keypair(&seed(7)).unwrap();
        assert_eq!(p.state(), ExchangeState::AGenerated);

        // Cannot regenerate
        assert!(p.generate_random_keypair(&mut OsRng).is_err());

        p.begin().unwrap();
        assert_eq!(p.state(), ExchangeState::Requesting);

        p.answer(&request(2, 1, None)).unwrap();
        assert_eq!(p.state(), ExchangeState::Answering);
    }

    #[test]
    fn test_answer_before_begin_rejected() {
        let mut p = DhxParticipant::new(Address::from_low_byte(1));
        p.generate_keypair(&seed(7)).unwrap();
        let err = p.answer(&request(2, 1, None)).unwrap_err();
        assert!(matches!(err, DhxError::InvalidState { .. }));
    }

    #[test]
    fn test_degenerate_seed_rejected() {
        let mut p = DhxParticipant::new(Address::from_low_byte(1));
        let err = p.generate_keypair(&[0u8; 32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(p.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_wrong_provider() {
        let mut p = DhxParticipant::new(Address::from_low_byte(1));
        p.generate_keypair(&seed(7)).unwrap();
        p.begin().unwrap();
        let err = p.answer(&request(2, 3, None)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_two_party_agreement() {
        let mut a = DhxParticipant::new(Address::from_low_byte(1));
        let mut b = DhxParticipant::new(Address::from_low_byte(2));
        a.generate_random_keypair(&mut OsRng).unwrap();
        b.generate_random_keypair(&mut OsRng).unwrap();
        a.begin().unwrap();
        b.begin().unwrap();

        // Each chain has a single link: the other party's bare value.
        let for_a = b.answer(&request(1, 2, None)).unwrap();
        let for_b = a.answer(&request(2, 1, None)).unwrap();
        assert_eq!(&for_a.value, b.public_key().unwrap());

        let ka = a.finalize(&for_a.value).unwrap().shared_key.clone();
        let kb = b.finalize(&for_b.value).unwrap().shared_key.clone();
        assert_eq!(ka, kb);
        assert_eq!(a.state(), ExchangeState::Finalized);

        // Finalizing twice is rejected, answering is still allowed.
        assert!(a.finalize(&for_a.value).is_err());
        assert!(a.answer(&request(2, 1, None)).is_ok());
    }
}
