//! Client SDK for chained Diffie-Hellman sealed-bid auctions.
//!
//! This crate provides a high-level API for:
//! - Preparing commitments, encrypted openings and sealed settlement addresses
//! - Reading auction state through [`AuctionReader`]
//! - Running the key exchange and a full auction in-process

pub mod bid;
pub mod query;
pub mod simulation;

pub use bid::{create_bid, BidBuilder, BidError, PreparedBid};
pub use query::AuctionReader;
pub use simulation::{Simulation, SimulationConfig, SimulationError, SimulationReport};
