//! Chained multi-party Diffie-Hellman key exchange.
//!
//! Every participant ends up holding `g^(a_1 * ... * a_n)` without any
//! exponent leaving its owner:
//!
//! 1. Participants are put in canonical order by the [`Registry`]
//! 2. Each participant generates an ephemeral keypair `(a_i, A_i = g^a_i)`
//! 3. For every requester, the [`DhxController`] routes a request along the
//!    other participants in cyclic order; each raises the running value to
//!    its own exponent
//! 4. The requester raises the completed chain to its exponent and derives
//!    the shared symmetric key
//!
//! # Security
//!
//! - Values are checked to lie in the prime-order subgroup before use
//! - The controller only relays group elements and may be untrusted for
//!   secrecy, though not for liveness
//! - There is no authentication of answers beyond registration of bare
//!   public values

pub mod controller;
pub mod error;
pub mod participant;
pub mod registry;
pub mod types;

pub use controller::{DhxController, MIN_PARTICIPANTS};
pub use error::DhxError;
pub use participant::DhxParticipant;
pub use registry::{Registry, RegistryError};
pub use types::{AnswerOutcome, ExchangeOutput, ExchangeState, KeyAnswer, KeyRequest};
