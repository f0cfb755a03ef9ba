//! Fundamental types for the CarbonFi staking engine.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! account addresses, token amounts, timestamps, chain identifiers, and the
//! staking period / user position records the engine keeps in its snapshots.

pub mod address;
pub mod amount;
pub mod error;
pub mod network;
pub mod period;
pub mod position;
pub mod time;

pub use address::AccountAddress;
pub use amount::{format_units, parse_units, TokenAmount, TOKEN_DECIMALS};
pub use error::TypesError;
pub use network::ChainId;
pub use period::{Apr, PeriodId, StakingPeriod};
pub use position::UserPosition;
pub use time::{Clock, SystemClock, Timestamp};
