//! Human and JSON renderings of snapshots and transaction records.

use carbonfi_staking::{
    PendingTransaction, PeriodSnapshot, PositionSnapshot, StakingTotals, TxState,
};
use carbonfi_types::{format_units, TokenAmount};
use carbonfi_utils::format_period;
use serde_json::{json, Value};

fn tokens(amount: TokenAmount) -> String {
    format_units(amount)
}

pub fn periods_json(snapshot: &PeriodSnapshot) -> Value {
    json!({
        "periods": snapshot.periods,
        "error": snapshot.error.as_ref().map(ToString::to_string),
    })
}

pub fn print_periods(snapshot: &PeriodSnapshot) {
    if snapshot.periods.is_empty() {
        println!("no staking periods");
    }
    for period in &snapshot.periods {
        println!(
            "{:<10} apr {:>8}  staked {:>24}  {}",
            format_period(period.duration.duration_secs()),
            period.apr.to_string(),
            tokens(period.total_staked),
            if period.is_active { "active" } else { "inactive" },
        );
    }
    if let Some(err) = &snapshot.error {
        println!("warning: showing stale periods: {err}");
    }
}

pub fn positions_json(snapshot: &PositionSnapshot) -> Value {
    let positions: Vec<Value> = snapshot
        .positions
        .iter()
        .map(|(period, position)| {
            json!({
                "period": period,
                "position": position,
                "unlocks_at": position.unlocks_at(*period),
            })
        })
        .collect();
    json!({
        "account": snapshot.account,
        "balance": snapshot.balance,
        "positions": positions,
        "error": snapshot.error.as_ref().map(ToString::to_string),
    })
}

pub fn print_positions(snapshot: &PositionSnapshot) {
    match snapshot.account {
        Some(account) => println!("account {account}"),
        None => {
            println!("no account connected");
            return;
        }
    }
    match snapshot.balance {
        Some(balance) => println!("available {}", tokens(balance)),
        None => println!("available unknown"),
    }
    if snapshot.positions.is_empty() {
        println!("no open positions");
    }
    for (period, position) in &snapshot.positions {
        println!(
            "{:<10} staked {:>24}  pending {:>24}  unlocks {}",
            format_period(period.duration_secs()),
            tokens(position.amount),
            tokens(position.pending_reward),
            position.unlocks_at(*period),
        );
    }
    if let Some(err) = &snapshot.error {
        println!("warning: {err}");
    }
}

pub fn totals_json(totals: &StakingTotals) -> Value {
    json!(totals)
}

pub fn print_totals(totals: &StakingTotals) {
    println!("total value locked   {}", tokens(totals.total_value_locked));
    println!("your stake           {}", tokens(totals.user_total_staked));
    println!("your pending rewards {}", tokens(totals.user_total_pending_reward));
}

fn state_label(state: &TxState) -> String {
    match state {
        TxState::Submitted => "submitted".to_string(),
        TxState::Confirmed => "confirmed".to_string(),
        TxState::Failed(failure) => format!("failed: {failure}"),
    }
}

pub fn transaction_json(tx: &PendingTransaction) -> Value {
    json!({
        "kind": tx.kind,
        "period": tx.target_period,
        "amount": tx.amount,
        "submitted_at": tx.submitted_at,
        "tx": tx.tx,
        "state": state_label(&tx.state),
    })
}

pub fn print_transaction(tx: &PendingTransaction) {
    let amount = tx
        .amount
        .map(|a| format!(" {}", tokens(a)))
        .unwrap_or_default();
    let hash = tx
        .tx
        .as_ref()
        .map(|h| format!(" tx {h}"))
        .unwrap_or_default();
    println!(
        "{}{} in {} pool:{} {}",
        tx.kind,
        amount,
        format_period(tx.target_period.duration_secs()),
        hash,
        state_label(&tx.state),
    );
}
