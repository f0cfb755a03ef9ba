//! Pre-built [`tracing::Span`] constructors for engine operations.
//!
//! Consistent span names and fields let a refresh, the submission that
//! caused it and the event that confirmed it be correlated in the logs.

use carbonfi_gateway::EventKind;
use carbonfi_types::PeriodId;
use tracing::{info_span, Span};

use crate::ActionKind;

/// Span covering one period or position refresh.
pub fn refresh_span(snapshot: &'static str, generation: u64) -> Span {
    info_span!("refresh", snapshot, generation)
}

/// Span covering validation and dispatch of one transaction.
pub fn submit_span(kind: ActionKind, period: PeriodId) -> Span {
    info_span!("submit", kind = %kind, period = %period)
}

/// Span covering the handling of one confirming event.
pub fn event_span(kind: EventKind, period: PeriodId) -> Span {
    info_span!("event", kind = %kind, period = %period)
}
