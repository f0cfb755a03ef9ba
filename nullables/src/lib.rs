//! Nullable infrastructure for deterministic testing.
//!
//! The engine reaches the outside world through two seams: the
//! [`ChainGateway`](carbonfi_gateway::ChainGateway) and the
//! [`Clock`](carbonfi_types::Clock). This crate provides implementations of
//! both that:
//! - Return scripted, deterministic values
//! - Can be controlled programmatically from a test
//! - Never touch the network
//!
//! Usage: hand a `NullGateway` / `NullClock` to the engine in place of the
//! real ones.

pub mod clock;
pub mod gateway;

pub use clock::NullClock;
pub use gateway::NullGateway;
