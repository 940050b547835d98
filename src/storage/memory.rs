//! In-memory store backing the tests.
//!
//! One mutex guards all state; each trait method holds it for its whole body, which gives the
//! same all-or-nothing behaviour as a row-locked transaction.

use crate::domain::model::{
    Asset, CoinTransaction, NewTransaction, PrizeKind, SpinPrize, SpinRecord, TransactionKind, User,
};
use crate::domain::progression::XpAward;
use crate::domain::purchase::{decide, PurchaseDecision, PurchaseOutcome};
use crate::domain::rewards::{clamp_adjustment, daily_cooldown, DailyClaim};
use crate::domain::spin::same_utc_day;
use crate::storage::{MarketStore, SpinApplied};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Append-only analytics row.
#[derive(Debug, Clone)]
pub struct DownloadEvent {
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub coins_spent: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    assets: HashMap<Uuid, Asset>,
    purchases: HashSet<(Uuid, Uuid)>,
    downloads: Vec<DownloadEvent>,
    transactions: Vec<CoinTransaction>,
    tickets: HashMap<Uuid, (i64, Option<DateTime<Utc>>)>,
    prizes: Vec<SpinPrize>,
    spins: Vec<SpinRecord>,
}

impl State {
    fn user_mut(&mut self, user_id: Uuid) -> anyhow::Result<&mut User> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("user {} not found", user_id))
    }

    fn log(&mut self, user_id: Uuid, entry: NewTransaction, balance_after: i64) {
        self.transactions.push(CoinTransaction {
            id: Uuid::new_v4(),
            user_id,
            amount: entry.amount,
            kind: entry.kind,
            description: entry.description,
            reference_id: entry.reference_id,
            balance_after,
            created_at: Utc::now(),
        });
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_asset(&self, asset: Asset) {
        self.state.lock().await.assets.insert(asset.id, asset);
    }

    pub async fn insert_prize(&self, prize: SpinPrize) {
        self.state.lock().await.prizes.push(prize);
    }

    pub async fn set_tickets(&self, user_id: Uuid, tickets: i64) {
        let mut state = self.state.lock().await;
        let entry = state.tickets.entry(user_id).or_insert((0, None));
        entry.0 = tickets;
    }

    /// Number of purchase records held by `user_id`.
    pub async fn purchase_count(&self, user_id: Uuid) -> usize {
        let state = self.state.lock().await;
        state.purchases.iter().filter(|(u, _)| *u == user_id).count()
    }

    /// Replaces the stored price, as an admin edit would.
    pub async fn set_price(&self, asset_id: Uuid, coin_price: i64) {
        if let Some(asset) = self.state.lock().await.assets.get_mut(&asset_id) {
            asset.coin_price = coin_price;
        }
    }

    pub async fn download_events(&self) -> Vec<DownloadEvent> {
        self.state.lock().await.downloads.clone()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn find_asset(&self, asset_id: Uuid) -> anyhow::Result<Option<Asset>> {
        Ok(self.state.lock().await.assets.get(&asset_id).cloned())
    }

    async fn is_entitled(&self, user_id: Uuid, asset_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.state.lock().await.purchases.contains(&(user_id, asset_id)))
    }

    async fn purchase(&self, user_id: Uuid, asset: &Asset) -> anyhow::Result<PurchaseOutcome> {
        let mut state = self.state.lock().await;
        let entitled = state.purchases.contains(&(user_id, asset.id));
        let balance = state.user_mut(user_id)?.coins;
        let current_price = state
            .assets
            .get(&asset.id)
            .map(|a| a.coin_price)
            .ok_or_else(|| anyhow!("asset {} not found", asset.id))?;

        let decision = decide(current_price, balance, entitled);
        let PurchaseDecision::ChargeAndGrant { price } = decision else {
            return Ok(PurchaseOutcome { decision, balance });
        };

        let user = state.user_mut(user_id)?;
        user.coins -= price;
        let new_balance = user.coins;
        state.purchases.insert((user_id, asset.id));
        state.log(
            user_id,
            NewTransaction {
                amount: -price,
                kind: TransactionKind::Purchase,
                description: format!("Purchased {}", asset.title),
                reference_id: Some(asset.id),
            },
            new_balance,
        );
        Ok(PurchaseOutcome {
            decision,
            balance: new_balance,
        })
    }

    async fn record_download(&self, user_id: Uuid, asset_id: Uuid, coins_spent: i64) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if let Some(asset) = state.assets.get_mut(&asset_id) {
            asset.downloads += 1;
        }
        state.downloads.push(DownloadEvent {
            user_id,
            asset_id,
            coins_spent,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn award_xp(&self, user_id: Uuid, amount: i64) -> anyhow::Result<XpAward> {
        let mut state = self.state.lock().await;
        let user = state.user_mut(user_id)?;
        let award = XpAward::apply(user.xp, user.badge_tier, amount);
        user.xp = award.xp;
        user.badge_tier = award.badge_tier;
        Ok(award)
    }

    async fn transactions(&self, user_id: Uuid, limit: i64, offset: i64) -> anyhow::Result<Vec<CoinTransaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn claim_daily(
        &self,
        user_id: Uuid,
        reward: i64,
        xp_bonus: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DailyClaim> {
        let mut state = self.state.lock().await;
        let user = state.user_mut(user_id)?;
        if let Some(last) = user.last_daily_claim {
            if last > now - daily_cooldown() {
                return Ok(DailyClaim::TooSoon { last_claim: last });
            }
        }

        user.coins += reward;
        let award = XpAward::apply(user.xp, user.badge_tier, xp_bonus);
        user.xp = award.xp;
        user.badge_tier = award.badge_tier;
        user.last_daily_claim = Some(now);
        let balance = user.coins;

        state.log(
            user_id,
            NewTransaction {
                amount: reward,
                kind: TransactionKind::Daily,
                description: format!("Daily reward: {} coins", reward),
                reference_id: None,
            },
            balance,
        );
        Ok(DailyClaim::Claimed { balance, xp: award.xp })
    }

    async fn adjust_balance(&self, user_id: Uuid, delta: i64, reason: &str) -> anyhow::Result<(i64, i64)> {
        let mut state = self.state.lock().await;
        let user = state.user_mut(user_id)?;
        let (new_balance, change) = clamp_adjustment(user.coins, delta);
        user.coins = new_balance;

        let verb = if delta >= 0 { "added" } else { "removed" };
        state.log(
            user_id,
            NewTransaction {
                amount: change,
                kind: TransactionKind::Admin,
                description: format!("Admin {} {} coins: {}", verb, change.abs(), reason),
                reference_id: None,
            },
            new_balance,
        );
        Ok((new_balance, change))
    }

    async fn spin_tickets(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let state = self.state.lock().await;
        Ok(state.tickets.get(&user_id).map(|(t, _)| *t).unwrap_or(0))
    }

    async fn grant_daily_ticket(&self, user_id: Uuid, tickets: i64, now: DateTime<Utc>) -> anyhow::Result<Option<i64>> {
        let mut state = self.state.lock().await;
        let entry = state.tickets.entry(user_id).or_insert((0, None));
        if let Some(last) = entry.1 {
            if same_utc_day(last, now) {
                return Ok(None);
            }
        }
        entry.0 += tickets;
        entry.1 = Some(now);
        Ok(Some(entry.0))
    }

    async fn active_prizes(&self) -> anyhow::Result<Vec<SpinPrize>> {
        let state = self.state.lock().await;
        Ok(state.prizes.iter().filter(|p| p.is_active).cloned().collect())
    }

    async fn apply_spin(&self, user_id: Uuid, prize: &SpinPrize) -> anyhow::Result<Option<SpinApplied>> {
        let mut state = self.state.lock().await;
        let available = state.tickets.get(&user_id).map(|(t, _)| *t).unwrap_or(0);
        if available < 1 {
            return Ok(None);
        }
        // Check the user before touching tickets so a failure leaves nothing behind.
        let mut balance = state.user_mut(user_id)?.coins;

        let mut tickets = available - 1;
        match prize.kind {
            PrizeKind::Coins if prize.value > 0 => {
                let user = state.user_mut(user_id)?;
                user.coins += prize.value;
                balance = user.coins;
                state.log(
                    user_id,
                    NewTransaction {
                        amount: prize.value,
                        kind: TransactionKind::Spin,
                        description: format!("Won {} from Lucky Spin", prize.name),
                        reference_id: Some(prize.id),
                    },
                    balance,
                );
            }
            PrizeKind::Ticket if prize.value > 0 => tickets += prize.value,
            _ => {}
        }

        if let Some(entry) = state.tickets.get_mut(&user_id) {
            entry.0 = tickets;
        }
        state.spins.push(SpinRecord {
            id: Uuid::new_v4(),
            user_id,
            prize_id: prize.id,
            prize_name: prize.name.clone(),
            prize_kind: prize.kind,
            prize_value: prize.value,
            created_at: Utc::now(),
        });
        Ok(Some(SpinApplied { balance, tickets }))
    }

    async fn spin_history(&self, user_id: Uuid, limit: i64, offset: i64) -> anyhow::Result<Vec<SpinRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .spins
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
