//! Auction module for chained Diffie-Hellman sealed-bid auctions.
//!
//! This module implements the authoritative auction logic:
//!
//! - Auction opening with a tiered capacity vector and a shared key fingerprint
//! - Hash commitments during the commit phase
//! - Reveals decrypted with the shared key and checked against commitments
//! - Tiered allocation and second-price-family payments
//! - Settlement address mixing for winners
//! - Payment tracking per winning slot
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: Business logic for processing calls
//! - `queries`: Read-only state access
//! - `state`: The auction aggregate and module state
//! - `mixer`: Settlement address sealing and resolution
//! - `genesis`: Initial configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use auction_module::{handlers, state::AuctionState};
//!
//! let mut state = AuctionState::new();
//! let ctx = handlers::CallContext { ... };
//!
//! // Open an auction bound to the group's shared key
//! let auction_id = handlers::handle_open_auction(&mut state, &ctx, variant, &[1, 2], Some(fp))?;
//!
//! // Commit a bid
//! handlers::handle_commit(&mut state, &ctx, auction_id, commitment, None)?;
//! ```

pub mod call;
pub mod error;
pub mod genesis;
pub mod handlers;
pub mod mixer;
pub mod queries;
pub mod state;

pub use call::{AuctionCall, CallResponse};
pub use error::AuctionError;
pub use genesis::{AuctionGenesisConfig, GenesisValidationError};
pub use handlers::{handle_call, CallContext, HandlerResult};
pub use queries::{handle_query, AuctionQuery, AuctionQueryResponse, AuctionSummary};
pub use state::{Auction, AuctionState};
