//! Error taxonomy of the staking engine.
//!
//! Refresh errors ([`DiscoveryError`], [`QueryError`]) never escape as `Err`:
//! they ride along in the snapshot next to the last good data. Submission
//! errors ([`SubmitError`]) are returned immediately to the caller.

use carbonfi_gateway::GatewayError;
use carbonfi_types::{ChainId, PeriodId, Timestamp, TokenAmount};
use thiserror::Error;

use crate::ActionKind;

/// Period discovery failed; the registry kept its previous periods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("failed to list staking periods: {0}")]
    ListPeriods(GatewayError),

    #[error("malformed staking period list: {0}")]
    Decode(String),

    #[error("period parameter batch failed: {0}")]
    Parameters(GatewayError),
}

/// Some or all position reads failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The whole round-trip failed; the tracker kept its previous positions.
    #[error("position batch failed: {0}")]
    Batch(GatewayError),

    /// Individual reads failed; those periods are absent from the snapshot.
    #[error("position reads failed for {} period(s){}", .periods.len(), balance_suffix(.balance))]
    Partial {
        periods: Vec<PeriodId>,
        balance: bool,
    },
}

fn balance_suffix(balance_failed: &bool) -> &'static str {
    if *balance_failed {
        " and the token balance"
    } else {
        ""
    }
}

impl QueryError {
    /// Whether the position for `period` is unknown rather than confirmed absent.
    pub fn covers(&self, period: PeriodId) -> bool {
        match self {
            Self::Batch(_) => true,
            Self::Partial { periods, .. } => periods.contains(&period),
        }
    }
}

/// Client-side amount validation failure. Never reaches the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAmountError {
    #[error("amount must be greater than zero")]
    Zero,

    #[error("stake of {requested} exceeds available balance {available}")]
    ExceedsBalance {
        requested: TokenAmount,
        available: TokenAmount,
    },

    #[error("token balance is unknown; refresh positions before staking")]
    BalanceUnknown,

    #[error("withdrawal of {requested} exceeds staked amount {staked} in period {period}")]
    ExceedsPosition {
        period: PeriodId,
        requested: TokenAmount,
        staked: TokenAmount,
    },
}

/// A transaction of the same kind is still awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a {kind} transaction submitted at {submitted_at} is still pending")]
pub struct ConcurrentSubmissionError {
    pub kind: ActionKind,
    pub submitted_at: Timestamp,
}

/// No confirming event arrived in time. The on-chain outcome is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} in period {period} was not confirmed within {waited_secs}s; refresh to learn the outcome")]
pub struct ConfirmationTimeoutError {
    pub kind: ActionKind,
    pub period: PeriodId,
    pub waited_secs: u64,
}

/// Why a transaction record ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxFailure {
    #[error("dispatch failed: {0}")]
    Dispatch(GatewayError),

    #[error(transparent)]
    Timeout(#[from] ConfirmationTimeoutError),
}

/// Rejection of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    InvalidAmount(#[from] InvalidAmountError),

    #[error(transparent)]
    Concurrent(#[from] ConcurrentSubmissionError),

    #[error("previous {kind} failed and must be acknowledged first: {failure}")]
    Unacknowledged {
        kind: ActionKind,
        failure: TxFailure,
    },

    #[error("unknown staking period {0}")]
    UnknownPeriod(PeriodId),

    #[error("no account connected")]
    NotConnected,

    #[error("connected to {connected}, expected {expected}")]
    WrongNetwork {
        connected: ChainId,
        expected: ChainId,
    },

    #[error("transaction dispatch failed: {0}")]
    Dispatch(GatewayError),
}

/// Errors from building or running a session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
