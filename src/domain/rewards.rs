//! Daily reward cooldown and admin balance adjustments.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Time between two daily coin claims.
pub fn daily_cooldown() -> Duration {
    Duration::hours(24)
}

/// XP bonus that comes with every daily coin claim.
pub const DAILY_XP_BONUS: i64 = 10;

/// Largest single admin adjustment.
pub const MAX_ADJUSTMENT: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyStatus {
    pub can_claim: bool,
    pub hours_until_reset: i64,
    pub minutes_until_reset: i64,
}

impl DailyStatus {
    pub fn at(last_claim: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last) = last_claim else {
            return DailyStatus::ready();
        };
        let remaining = (last + daily_cooldown()) - now;
        if remaining <= Duration::zero() {
            return DailyStatus::ready();
        }
        DailyStatus {
            can_claim: false,
            hours_until_reset: remaining.num_hours(),
            minutes_until_reset: remaining.num_minutes() % 60,
        }
    }

    fn ready() -> Self {
        DailyStatus {
            can_claim: true,
            hours_until_reset: 0,
            minutes_until_reset: 0,
        }
    }
}

/// Outcome of an atomic daily claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyClaim {
    Claimed { balance: i64, xp: i64 },
    /// Cooldown still running; carries the last successful claim.
    TooSoon { last_claim: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdjustAction {
    Add,
    Remove,
}

impl AdjustAction {
    /// Signed delta for a validated amount.
    pub fn delta(&self, amount: i64) -> i64 {
        match self {
            AdjustAction::Add => amount,
            AdjustAction::Remove => -amount,
        }
    }
}

pub fn validate_adjust_amount(amount: i64) -> Result<(), String> {
    if amount <= 0 || amount > MAX_ADJUSTMENT {
        return Err(format!("Invalid amount (1-{})", MAX_ADJUSTMENT));
    }
    Ok(())
}

/// Balance after applying `delta`, clamped at zero. Returns `(new_balance, effective_change)`.
pub fn clamp_adjustment(balance: i64, delta: i64) -> (i64, i64) {
    let new_balance = balance.saturating_add(delta).max(0);
    (new_balance, new_balance - balance)
}
