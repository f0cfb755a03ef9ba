//! Shared utilities for the CarbonFi staking engine.

pub mod logging;
pub mod time;

pub use logging::{init_logging, LogFormat};
pub use time::{format_period, parse_period, DurationParseError};
