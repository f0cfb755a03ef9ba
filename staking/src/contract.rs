//! Call builders and result decoders for the staking and token contracts.

use carbonfi_gateway::{AbiValue, EventFilter, EventKind, ReadCall, WriteCall};
use carbonfi_types::{AccountAddress, Apr, PeriodId, Timestamp, TokenAmount, UserPosition};

use crate::StakeAction;

/// Contract function names.
pub mod functions {
    pub const GET_AVAILABLE_PERIODS: &str = "getAvailablePeriods";
    pub const GET_STAKING_PERIOD_INFO: &str = "getStakingPeriodInfo";
    pub const GET_APR: &str = "getAPR";
    pub const GET_USER_STAKE_INFO: &str = "getUserStakeInfo";
    pub const STAKE: &str = "stake";
    pub const WITHDRAW: &str = "withdraw";
    pub const CLAIM_REWARDS: &str = "claimRewards";
    pub const BALANCE_OF: &str = "balanceOf";
}

/// Mutable parameters of one pool, as returned by `getStakingPeriodInfo`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodParams {
    pub reward_rate: u128,
    pub total_staked: TokenAmount,
    pub is_active: bool,
}

/// Addresses of the two contracts the engine talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakingContract {
    pub staking: AccountAddress,
    pub token: AccountAddress,
}

impl StakingContract {
    pub fn new(staking: AccountAddress, token: AccountAddress) -> Self {
        Self { staking, token }
    }

    pub fn available_periods(&self) -> ReadCall {
        ReadCall::new(self.staking, functions::GET_AVAILABLE_PERIODS, Vec::new())
    }

    pub fn period_info(&self, period: PeriodId) -> ReadCall {
        ReadCall::new(
            self.staking,
            functions::GET_STAKING_PERIOD_INFO,
            vec![period_arg(period)],
        )
    }

    pub fn apr(&self, period: PeriodId) -> ReadCall {
        ReadCall::new(self.staking, functions::GET_APR, vec![period_arg(period)])
    }

    pub fn user_stake_info(&self, account: AccountAddress, period: PeriodId) -> ReadCall {
        ReadCall::new(
            self.staking,
            functions::GET_USER_STAKE_INFO,
            vec![AbiValue::Address(account), period_arg(period)],
        )
    }

    pub fn balance_of(&self, account: AccountAddress) -> ReadCall {
        ReadCall::new(
            self.token,
            functions::BALANCE_OF,
            vec![AbiValue::Address(account)],
        )
    }

    /// The write call for `action`, sent on behalf of `from`.
    ///
    /// Argument order follows the contract: `stake(amount, duration)`,
    /// `withdraw(amount, duration)`, `claimRewards(duration)`.
    pub fn action_call(&self, action: &StakeAction, from: AccountAddress) -> WriteCall {
        let (function, args) = match *action {
            StakeAction::Stake { period, amount } => (
                functions::STAKE,
                vec![AbiValue::Uint(amount.raw()), period_arg(period)],
            ),
            StakeAction::Withdraw { period, amount } => (
                functions::WITHDRAW,
                vec![AbiValue::Uint(amount.raw()), period_arg(period)],
            ),
            StakeAction::Claim { period } => (functions::CLAIM_REWARDS, vec![period_arg(period)]),
        };
        WriteCall::new(self.staking, function, args, from)
    }

    /// Identity-scoped filter for one staking event.
    pub fn event_filter(&self, kind: EventKind, account: AccountAddress) -> EventFilter {
        EventFilter::new(self.staking, kind, Some(account))
    }
}

fn period_arg(period: PeriodId) -> AbiValue {
    AbiValue::Uint(u128::from(period.duration_secs()))
}

// ── Decoders ───────────────────────────────────────────────────────────

/// Decode the `uint256[]` returned by `getAvailablePeriods`.
pub fn decode_period_ids(value: &AbiValue) -> Result<Vec<PeriodId>, String> {
    value
        .as_list()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|item| {
            let raw = item.as_uint().map_err(|e| e.to_string())?;
            PeriodId::from_chain(raw).map_err(|e| e.to_string())
        })
        .collect()
}

/// Decode `(rewardRate, totalStaked, isActive)`.
pub fn decode_period_info(value: &AbiValue) -> Result<PeriodParams, String> {
    let [rate, staked, active] = value.as_tuple::<3>().map_err(|e| e.to_string())?;
    Ok(PeriodParams {
        reward_rate: rate.as_uint().map_err(|e| e.to_string())?,
        total_staked: TokenAmount::new(staked.as_uint().map_err(|e| e.to_string())?),
        is_active: active.as_bool().map_err(|e| e.to_string())?,
    })
}

/// Decode `getAPR`. Some deployments return a bare uint, others a
/// one-element array; the first element is the scaled APR either way.
pub fn decode_apr(value: &AbiValue) -> Result<Apr, String> {
    let scaled = match value {
        AbiValue::List(items) => items
            .first()
            .ok_or_else(|| "empty APR result".to_string())?
            .as_uint(),
        other => other.as_uint(),
    }
    .map_err(|e| e.to_string())?;
    Ok(Apr::from_scaled(scaled))
}

/// Decode `(amount, startTime, rewards, pendingRewards)`.
pub fn decode_stake_info(value: &AbiValue) -> Result<UserPosition, String> {
    let [amount, start, rewards, pending] = value.as_tuple::<4>().map_err(|e| e.to_string())?;
    let start = start.as_uint().map_err(|e| e.to_string())?;
    let start = u64::try_from(start).map_err(|_| format!("start time {start} out of range"))?;
    Ok(UserPosition {
        amount: TokenAmount::new(amount.as_uint().map_err(|e| e.to_string())?),
        start_time: Timestamp::new(start),
        accumulated_reward: TokenAmount::new(rewards.as_uint().map_err(|e| e.to_string())?),
        pending_reward: TokenAmount::new(pending.as_uint().map_err(|e| e.to_string())?),
    })
}

pub fn decode_balance(value: &AbiValue) -> Result<TokenAmount, String> {
    value
        .as_uint()
        .map(TokenAmount::new)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> StakingContract {
        StakingContract::new(AccountAddress::new([1; 20]), AccountAddress::new([2; 20]))
    }

    fn period(secs: u64) -> PeriodId {
        PeriodId::new(secs).unwrap()
    }

    #[test]
    fn stake_arguments_are_amount_then_duration() {
        let from = AccountAddress::new([9; 20]);
        let call = contract().action_call(
            &StakeAction::Stake {
                period: period(2_592_000),
                amount: TokenAmount::new(100),
            },
            from,
        );
        assert_eq!(call.function, "stake");
        assert_eq!(call.args, vec![AbiValue::Uint(100), AbiValue::Uint(2_592_000)]);
        assert_eq!(call.from, from);
        assert_eq!(call.contract, contract().staking);
    }

    #[test]
    fn claim_takes_only_the_duration() {
        let claim = StakeAction::Claim { period: period(60) };
        let call = contract().action_call(&claim, AccountAddress::ZERO);
        assert_eq!(call.function, "claimRewards");
        assert_eq!(call.args, vec![AbiValue::Uint(60)]);
    }

    #[test]
    fn balance_reads_target_the_token() {
        let call = contract().balance_of(AccountAddress::new([9; 20]));
        assert_eq!(call.contract, contract().token);
        assert_eq!(call.function, "balanceOf");
    }

    #[test]
    fn period_ids_reject_zero() {
        let ok = AbiValue::List(vec![AbiValue::Uint(60), AbiValue::Uint(120)]);
        assert_eq!(decode_period_ids(&ok).unwrap(), vec![period(60), period(120)]);
        let bad = AbiValue::List(vec![AbiValue::Uint(0)]);
        assert!(decode_period_ids(&bad).is_err());
        assert!(decode_period_ids(&AbiValue::Uint(60)).is_err());
    }

    #[test]
    fn period_info_decodes_triple() {
        let v = AbiValue::List(vec![
            AbiValue::Uint(5),
            AbiValue::Uint(1_000),
            AbiValue::Bool(true),
        ]);
        assert_eq!(
            decode_period_info(&v).unwrap(),
            PeriodParams {
                reward_rate: 5,
                total_staked: TokenAmount::new(1_000),
                is_active: true,
            }
        );
        assert!(decode_period_info(&AbiValue::List(vec![AbiValue::Uint(5)])).is_err());
    }

    #[test]
    fn apr_accepts_bare_or_wrapped() {
        assert_eq!(decode_apr(&AbiValue::Uint(1250)).unwrap().percent(), 12.5);
        let wrapped = AbiValue::List(vec![AbiValue::Uint(800)]);
        assert_eq!(decode_apr(&wrapped).unwrap().percent(), 8.0);
        assert!(decode_apr(&AbiValue::List(Vec::new())).is_err());
        assert!(decode_apr(&AbiValue::Bool(true)).is_err());
    }

    #[test]
    fn stake_info_decodes_quadruple() {
        let v = AbiValue::List(vec![
            AbiValue::Uint(500),
            AbiValue::Uint(1_700_000_000),
            AbiValue::Uint(3),
            AbiValue::Uint(7),
        ]);
        let position = decode_stake_info(&v).unwrap();
        assert_eq!(position.amount, TokenAmount::new(500));
        assert_eq!(position.start_time, Timestamp::new(1_700_000_000));
        assert_eq!(position.accumulated_reward, TokenAmount::new(3));
        assert_eq!(position.pending_reward, TokenAmount::new(7));
    }
}
