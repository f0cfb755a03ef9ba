//! Multi-period staking synchronization engine.
//!
//! A client-side read model over a staking contract reached through a
//! [`ChainGateway`](carbonfi_gateway::ChainGateway):
//! - [`PeriodRegistry`] discovers the pools and their parameters
//! - [`PositionTracker`] loads the connected account's position per pool
//! - [`TransactionCoordinator`] dispatches stake/withdraw/claim and resolves
//!   them against on-chain events
//! - [`aggregate`] derives totals from the current snapshots
//!
//! [`StakingSession`] wires these together for one account on one network.
//! Snapshots are immutable `Arc`s replaced wholesale on every refresh.

pub mod action;
pub mod aggregate;
pub mod config;
pub mod contract;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod positions;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod tracing_spans;

pub use action::{ActionKind, StakeAction};
pub use aggregate::{
    total_value_locked, user_total_pending_reward, user_total_staked, StakingTotals,
};
pub use config::EngineConfig;
pub use contract::StakingContract;
pub use coordinator::{PendingTransaction, TransactionCoordinator, TxState};
pub use error::{
    ConcurrentSubmissionError, ConfirmationTimeoutError, DiscoveryError, EngineError,
    InvalidAmountError, QueryError, SubmitError, TxFailure,
};
pub use metrics::EngineMetrics;
pub use positions::{PositionSnapshot, PositionTracker};
pub use registry::{PeriodRegistry, PeriodSnapshot};
pub use session::{SessionContext, SessionOptions, StakingSession};
