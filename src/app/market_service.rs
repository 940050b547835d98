//! The market service.
//!
//! Sits between the HTTP layer and the store. It is responsible for:
//! 1.  Resolving the session user and the asset, including moderation visibility.
//! 2.  Running the atomic purchase and handing granted downloads to the link issuer.
//! 3.  The surrounding coin economy: daily reward, admin adjustments, spin wheel, XP.

use crate::app::links::LinkIssuer;
use crate::domain::model::{Asset, CoinTransaction, SpinPrize, SpinRecord, User};
use crate::domain::progression::{badge_for_xp, BadgeTier, XpActivity};
use crate::domain::purchase::PurchaseDecision;
use crate::domain::rewards::{validate_adjust_amount, AdjustAction, DailyClaim, DailyStatus, DAILY_XP_BONUS};
use crate::domain::spin::{draw, until_next_utc_day};
use crate::error::{MarketError, Result};
use crate::infra::config::Config;
use crate::storage::MarketStore;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_DAILY_REWARD: i64 = 50;
pub const DEFAULT_TRANSACTION_PAGE: i64 = 50;
pub const MAX_TRANSACTION_PAGE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub download_url: String,
    pub coins_spent: i64,
    pub message: &'static str,
    /// Balance after the attempt.
    pub balance: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseStatus {
    pub purchased: bool,
    pub price: i64,
}

#[derive(Debug, Clone)]
pub struct BalanceSummary {
    pub coins: i64,
    pub spin_tickets: i64,
    pub xp: i64,
    pub badge: BadgeTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyReward {
    pub reward: i64,
    pub xp_bonus: i64,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct Adjustment {
    pub username: String,
    pub balance: i64,
    pub change: i64,
    pub action: AdjustAction,
}

#[derive(Debug, Clone)]
pub struct SpinResult {
    pub prize: SpinPrize,
    pub prize_index: usize,
    pub balance: i64,
    pub tickets: i64,
}

fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit
        .unwrap_or(DEFAULT_TRANSACTION_PAGE)
        .clamp(1, MAX_TRANSACTION_PAGE);
    (limit, offset.unwrap_or(0).max(0))
}

pub struct MarketService {
    store: Arc<dyn MarketStore>,
    links: LinkIssuer,
    daily_reward: i64,
    spins_per_day: i64,
}

impl MarketService {
    pub fn new(store: Arc<dyn MarketStore>, links: LinkIssuer) -> Self {
        Self {
            store,
            links,
            daily_reward: DEFAULT_DAILY_REWARD,
            spins_per_day: 1,
        }
    }

    pub fn from_config(store: Arc<dyn MarketStore>, config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            links: config.link_issuer.clone(),
            daily_reward: config.daily_reward,
            spins_per_day: config.spins_per_day,
        })
    }

    pub fn store(&self) -> &Arc<dyn MarketStore> {
        &self.store
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(MarketError::UserNotFound)
    }

    /// Loads an asset the user is allowed to see. Hidden assets look missing.
    async fn visible_asset(&self, user: &User, asset_id: Uuid) -> Result<Asset> {
        let asset = self
            .store
            .find_asset(asset_id)
            .await?
            .ok_or(MarketError::AssetNotFound)?;
        if !asset.is_visible_to(user) {
            return Err(MarketError::AssetNotFound);
        }
        Ok(asset)
    }

    /// Decides, charges at most once, and returns the download link.
    pub async fn download(&self, user_id: Uuid, asset_id: Uuid) -> Result<DownloadReceipt> {
        let user = self.require_user(user_id).await?;
        let asset = self.visible_asset(&user, asset_id).await?;
        // Never charge for something we cannot hand out.
        if asset.download_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(MarketError::AssetUnavailable);
        }

        let outcome = self.store.purchase(user.id, &asset).await?;
        let grant = match outcome.decision {
            PurchaseDecision::InsufficientFunds { required, available } => {
                tracing::info!(%user_id, %asset_id, required, available, "download rejected: insufficient coins");
                return Err(MarketError::InsufficientFunds { required, available });
            }
            decision => decision.grant().ok_or_else(|| {
                MarketError::Persistence(anyhow::anyhow!("decision {:?} did not grant", decision))
            })?,
        };

        if let Err(e) = self.store.record_download(user.id, asset.id, grant.coins_spent()).await {
            tracing::warn!(%user_id, %asset_id, error = %e, "failed to record download event");
        }
        match self.store.award_xp(user.id, XpActivity::AssetDownload.xp()).await {
            Ok(award) if award.upgraded => {
                tracing::info!(%user_id, tier = award.badge_tier, "badge tier upgraded");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(%user_id, error = %e, "failed to award download xp"),
        }

        let download_url = self.links.issue(&asset, &grant)?;
        tracing::info!(
            %user_id,
            %asset_id,
            coins_spent = grant.coins_spent(),
            balance = outcome.balance,
            "download granted"
        );

        Ok(DownloadReceipt {
            download_url,
            coins_spent: grant.coins_spent(),
            message: grant.message(),
            balance: outcome.balance,
        })
    }

    pub async fn purchase_status(&self, user_id: Uuid, asset_id: Uuid) -> Result<PurchaseStatus> {
        let user = self.require_user(user_id).await?;
        let asset = self.visible_asset(&user, asset_id).await?;
        let purchased = asset.coin_price == 0 || self.store.is_entitled(user.id, asset.id).await?;
        Ok(PurchaseStatus {
            purchased,
            price: asset.coin_price,
        })
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<BalanceSummary> {
        let user = self.require_user(user_id).await?;
        let spin_tickets = self.store.spin_tickets(user.id).await?;
        Ok(BalanceSummary {
            coins: user.coins,
            spin_tickets,
            xp: user.xp,
            badge: badge_for_xp(user.xp),
        })
    }

    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<CoinTransaction>> {
        let user = self.require_user(user_id).await?;
        let (limit, offset) = page(limit, offset);
        Ok(self.store.transactions(user.id, limit, offset).await?)
    }

    pub async fn daily_status(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<DailyStatus> {
        let user = self.require_user(user_id).await?;
        Ok(DailyStatus::at(user.last_daily_claim, now))
    }

    pub async fn claim_daily(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<DailyReward> {
        let user = self.require_user(user_id).await?;
        match self
            .store
            .claim_daily(user.id, self.daily_reward, DAILY_XP_BONUS, now)
            .await?
        {
            DailyClaim::Claimed { balance, .. } => {
                tracing::info!(%user_id, reward = self.daily_reward, balance, "daily reward claimed");
                Ok(DailyReward {
                    reward: self.daily_reward,
                    xp_bonus: DAILY_XP_BONUS,
                    balance,
                })
            }
            DailyClaim::TooSoon { last_claim } => {
                let status = DailyStatus::at(Some(last_claim), now);
                Err(MarketError::AlreadyClaimed {
                    hours: status.hours_until_reset,
                    minutes: status.minutes_until_reset,
                })
            }
        }
    }

    /// Adds or removes coins on behalf of an admin.
    pub async fn admin_adjust(
        &self,
        admin_id: Uuid,
        target_id: Uuid,
        amount: i64,
        action: AdjustAction,
        reason: &str,
    ) -> Result<Adjustment> {
        let admin = self.require_user(admin_id).await?;
        if !admin.is_admin() {
            return Err(MarketError::Forbidden);
        }
        validate_adjust_amount(amount).map_err(MarketError::InvalidRequest)?;

        let target = self.require_user(target_id).await?;
        let reason = match reason.trim() {
            "" => "Admin adjustment",
            r => r,
        };
        let (balance, change) = self
            .store
            .adjust_balance(target.id, action.delta(amount), reason)
            .await?;

        tracing::info!(
            %admin_id,
            %target_id,
            change,
            balance,
            "admin adjusted coins for {}",
            target.username
        );
        Ok(Adjustment {
            username: target.username,
            balance,
            change,
            action,
        })
    }

    pub async fn prizes(&self) -> Result<Vec<SpinPrize>> {
        Ok(self.store.active_prizes().await?)
    }

    /// Grants today's spin tickets. Returns the new ticket count.
    pub async fn claim_spin_ticket(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i64> {
        let user = self.require_user(user_id).await?;
        match self
            .store
            .grant_daily_ticket(user.id, self.spins_per_day, now)
            .await?
        {
            Some(tickets) => Ok(tickets),
            None => {
                let wait = until_next_utc_day(now);
                Err(MarketError::AlreadyClaimed {
                    hours: wait.num_hours(),
                    minutes: wait.num_minutes() % 60,
                })
            }
        }
    }

    /// Past spins, newest first. Paged like `transactions`.
    pub async fn spin_history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<SpinRecord>> {
        let user = self.require_user(user_id).await?;
        let (limit, offset) = page(limit, offset);
        Ok(self.store.spin_history(user.id, limit, offset).await?)
    }

    /// Consumes a ticket and draws a prize with `rng`.
    pub async fn spin<R: Rng + Send + ?Sized>(&self, user_id: Uuid, rng: &mut R) -> Result<SpinResult> {
        let user = self.require_user(user_id).await?;
        if self.store.spin_tickets(user.id).await? < 1 {
            return Err(MarketError::NoTickets);
        }

        let prizes = self.store.active_prizes().await?;
        let prize_index = draw(&prizes, rng).ok_or(MarketError::NoPrizes)?;
        let prize = prizes[prize_index].clone();

        // The store re-checks the ticket count atomically.
        let applied = self
            .store
            .apply_spin(user.id, &prize)
            .await?
            .ok_or(MarketError::NoTickets)?;

        tracing::info!(%user_id, prize = %prize.name, balance = applied.balance, "spin resolved");
        Ok(SpinResult {
            prize,
            prize_index,
            balance: applied.balance,
            tickets: applied.tickets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AssetStatus, Membership, PrizeKind};
    use crate::storage::MemoryStore;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn user(coins: i64, membership: Membership) -> User {
        User {
            id: Uuid::new_v4(),
            username: "member".to_string(),
            coins,
            membership,
            xp: 0,
            badge_tier: 1,
            last_daily_claim: None,
        }
    }

    fn asset(price: i64, status: AssetStatus) -> Asset {
        Asset {
            id: Uuid::new_v4(),
            title: "drift-car".to_string(),
            author_id: None,
            coin_price: price,
            status,
            download_url: Some("https://cdn.example.com/drift.zip".to_string()),
            downloads: 0,
        }
    }

    async fn setup(users: &[User], assets: &[Asset]) -> (Arc<MemoryStore>, MarketService) {
        let store = Arc::new(MemoryStore::new());
        for u in users {
            store.insert_user(u.clone()).await;
        }
        for a in assets {
            store.insert_asset(a.clone()).await;
        }
        let service = MarketService::new(store.clone(), LinkIssuer::Direct);
        (store, service)
    }

    #[tokio::test]
    async fn test_paid_download_flow() {
        let buyer = user(100, Membership::Free);
        let item = asset(50, AssetStatus::Approved);
        let (store, service) = setup(&[buyer.clone()], &[item.clone()]).await;

        let receipt = service.download(buyer.id, item.id).await.unwrap();
        assert_eq!(receipt.coins_spent, 50);
        assert_eq!(receipt.balance, 50);
        assert_eq!(receipt.message, "Purchase successful");
        assert_eq!(receipt.download_url, "https://cdn.example.com/drift.zip");

        let again = service.download(buyer.id, item.id).await.unwrap();
        assert_eq!(again.coins_spent, 0);
        assert_eq!(again.balance, 50);
        assert_eq!(again.message, "Already purchased");

        let events = store.download_events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].coins_spent, 50);
        let after = store.find_user(buyer.id).await.unwrap().unwrap();
        assert_eq!(after.xp, 2 * XpActivity::AssetDownload.xp());
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_no_trace() {
        let buyer = user(40, Membership::Free);
        let item = asset(50, AssetStatus::Approved);
        let (store, service) = setup(&[buyer.clone()], &[item.clone()]).await;

        match service.download(buyer.id, item.id).await {
            Err(MarketError::InsufficientFunds { required, available }) => {
                assert_eq!((required, available), (50, 40));
            }
            other => panic!("expected insufficient funds, got {:?}", other),
        }
        assert!(store.download_events().await.is_empty());
        assert_eq!(store.purchase_count(buyer.id).await, 0);
    }

    #[tokio::test]
    async fn test_pending_asset_hidden_from_members() {
        let member = user(100, Membership::Free);
        let admin = user(0, Membership::Admin);
        let item = asset(0, AssetStatus::Pending);
        let (_store, service) = setup(&[member.clone(), admin.clone()], &[item.clone()]).await;

        assert!(matches!(
            service.download(member.id, item.id).await,
            Err(MarketError::AssetNotFound)
        ));
        let receipt = service.download(admin.id, item.id).await.unwrap();
        assert_eq!(receipt.message, "Download started");
    }

    #[tokio::test]
    async fn test_asset_without_url_is_not_charged() {
        let buyer = user(100, Membership::Free);
        let mut item = asset(30, AssetStatus::Approved);
        item.download_url = None;
        let (store, service) = setup(&[buyer.clone()], &[item.clone()]).await;

        assert!(matches!(
            service.download(buyer.id, item.id).await,
            Err(MarketError::AssetUnavailable)
        ));
        assert_eq!(store.find_user(buyer.id).await.unwrap().unwrap().coins, 100);
    }

    #[tokio::test]
    async fn test_daily_claim_cooldown() {
        let member = user(0, Membership::Free);
        let (_store, service) = setup(&[member.clone()], &[]).await;
        let now = Utc::now();

        let reward = service.claim_daily(member.id, now).await.unwrap();
        assert_eq!(reward.balance, DEFAULT_DAILY_REWARD);

        match service.claim_daily(member.id, now + Duration::hours(2)).await {
            Err(MarketError::AlreadyClaimed { hours, .. }) => assert_eq!(hours, 22),
            other => panic!("expected cooldown, got {:?}", other),
        }
        let next = service.claim_daily(member.id, now + Duration::hours(24)).await.unwrap();
        assert_eq!(next.balance, 2 * DEFAULT_DAILY_REWARD);
    }

    #[tokio::test]
    async fn test_negative_daily_reward_config_is_refused() {
        let config = Config {
            database_url: "postgres://localhost/market".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            db_max_connections: 1,
            session_header: "x-user-id".to_string(),
            link_issuer: LinkIssuer::Direct,
            daily_reward: -100,
            spins_per_day: 1,
        };
        let store = Arc::new(MemoryStore::new());
        assert!(MarketService::from_config(store.clone(), &config).is_err());

        let config = Config { daily_reward: 75, spins_per_day: 2, ..config };
        let service = MarketService::from_config(store.clone(), &config).unwrap();
        let member = user(0, Membership::Free);
        store.insert_user(member.clone()).await;
        let reward = service.claim_daily(member.id, Utc::now()).await.unwrap();
        assert_eq!(reward.balance, 75);
        assert_eq!(service.claim_spin_ticket(member.id, Utc::now()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_admin_adjust_requires_admin() {
        let member = user(10, Membership::Vip);
        let admin = user(0, Membership::Admin);
        let (_store, service) = setup(&[member.clone(), admin.clone()], &[]).await;

        assert!(matches!(
            service.admin_adjust(member.id, member.id, 5, AdjustAction::Add, "").await,
            Err(MarketError::Forbidden)
        ));
        assert!(matches!(
            service.admin_adjust(admin.id, member.id, 0, AdjustAction::Add, "").await,
            Err(MarketError::InvalidRequest(_))
        ));
        let adj = service
            .admin_adjust(admin.id, member.id, 25, AdjustAction::Remove, "refund abuse")
            .await
            .unwrap();
        assert_eq!((adj.balance, adj.change), (0, -10));
    }

    #[tokio::test]
    async fn test_spin_consumes_ticket_and_credits_coins() {
        let player = user(5, Membership::Free);
        let (store, service) = setup(&[player.clone()], &[]).await;
        store
            .insert_prize(SpinPrize {
                id: Uuid::new_v4(),
                name: "25 Coins".to_string(),
                kind: PrizeKind::Coins,
                value: 25,
                probability: 1.0,
                is_active: true,
            })
            .await;
        let mut rng = StdRng::seed_from_u64(9);

        assert!(matches!(
            service.spin(player.id, &mut rng).await,
            Err(MarketError::NoTickets)
        ));

        let now = Utc::now();
        assert_eq!(service.claim_spin_ticket(player.id, now).await.unwrap(), 1);
        assert!(matches!(
            service.claim_spin_ticket(player.id, now).await,
            Err(MarketError::AlreadyClaimed { .. })
        ));

        let result = service.spin(player.id, &mut rng).await.unwrap();
        assert_eq!(result.prize_index, 0);
        assert_eq!(result.balance, 30);
        assert_eq!(result.tickets, 0);

        let history = service.spin_history(player.id, None, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].prize_name, "25 Coins");
    }
}
