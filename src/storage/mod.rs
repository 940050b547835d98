//! Persistence seam for the coin economy.
//!
//! Every method that changes a balance must be atomic with respect to concurrent calls for the
//! same user: the check and the write happen under one lock (row lock in Postgres, the state
//! mutex in memory).

use crate::domain::model::{Asset, CoinTransaction, SpinPrize, SpinRecord, User};
use crate::domain::progression::XpAward;
use crate::domain::purchase::PurchaseOutcome;
use crate::domain::rewards::DailyClaim;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::MemoryStore;
pub use postgres::PgMarketStore;

/// State after a spin was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinApplied {
    pub balance: i64,
    pub tickets: i64,
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Cheap connectivity check for health checks.
    async fn ping(&self) -> anyhow::Result<()>;

    async fn find_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>>;

    async fn find_asset(&self, asset_id: Uuid) -> anyhow::Result<Option<Asset>>;

    /// Whether a purchase record exists for `(user_id, asset_id)`.
    async fn is_entitled(&self, user_id: Uuid, asset_id: Uuid) -> anyhow::Result<bool>;

    /// Runs the purchase decision under the user's balance lock and applies it.
    ///
    /// For `ChargeAndGrant` the decrement, the purchase record and the ledger entry are written
    /// as one unit; any failure leaves none of them behind.
    async fn purchase(&self, user_id: Uuid, asset: &Asset) -> anyhow::Result<PurchaseOutcome>;

    /// Bumps the asset's download counter and appends a download event.
    async fn record_download(&self, user_id: Uuid, asset_id: Uuid, coins_spent: i64) -> anyhow::Result<()>;

    async fn award_xp(&self, user_id: Uuid, amount: i64) -> anyhow::Result<XpAward>;

    /// Ledger entries for a user, newest first.
    async fn transactions(&self, user_id: Uuid, limit: i64, offset: i64) -> anyhow::Result<Vec<CoinTransaction>>;

    /// Credits `reward` coins and `xp_bonus` XP if the cooldown has elapsed at `now`.
    async fn claim_daily(
        &self,
        user_id: Uuid,
        reward: i64,
        xp_bonus: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DailyClaim>;

    /// Applies `delta` clamped at zero and logs an admin ledger entry.
    /// Returns `(new_balance, effective_change)`.
    async fn adjust_balance(&self, user_id: Uuid, delta: i64, reason: &str) -> anyhow::Result<(i64, i64)>;

    async fn spin_tickets(&self, user_id: Uuid) -> anyhow::Result<i64>;

    /// Adds `tickets` unless a daily ticket was already granted on `now`'s UTC day.
    /// Returns the new ticket count, or `None` if already granted.
    async fn grant_daily_ticket(&self, user_id: Uuid, tickets: i64, now: DateTime<Utc>) -> anyhow::Result<Option<i64>>;

    async fn active_prizes(&self) -> anyhow::Result<Vec<SpinPrize>>;

    /// Consumes one ticket, credits `prize` and appends a spin history row, all as one unit.
    /// `None` when the user has no ticket left.
    async fn apply_spin(&self, user_id: Uuid, prize: &SpinPrize) -> anyhow::Result<Option<SpinApplied>>;

    /// Spin history for a user, newest first.
    async fn spin_history(&self, user_id: Uuid, limit: i64, offset: i64) -> anyhow::Result<Vec<SpinRecord>>;
}
