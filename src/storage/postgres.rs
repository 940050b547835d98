//! Postgres-backed store.
//!
//! Balance changes lock the user's row with `SELECT ... FOR UPDATE` and finish inside the same
//! transaction, so two requests for the same user are applied one after the other.

use crate::domain::model::{
    Asset, CoinTransaction, NewTransaction, PrizeKind, SpinPrize, SpinRecord, TransactionKind, User,
};
use crate::domain::progression::XpAward;
use crate::domain::purchase::{decide, PurchaseDecision, PurchaseOutcome};
use crate::domain::rewards::{clamp_adjustment, daily_cooldown, DailyClaim};
use crate::domain::spin::same_utc_day;
use crate::storage::{schema, MarketStore, SpinApplied};
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

/// The production store.
#[derive(Clone)]
pub struct PgMarketStore {
    pool: PgPool,
}

impl PgMarketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and makes sure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        schema::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn user_from_row(row: &PgRow) -> anyhow::Result<User> {
    let membership: String = row.try_get("membership")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        coins: row.try_get("coins")?,
        membership: membership.parse().map_err(anyhow::Error::msg)?,
        xp: row.try_get("xp")?,
        badge_tier: row.try_get("badge_tier")?,
        last_daily_claim: row.try_get("last_daily_claim")?,
    })
}

fn asset_from_row(row: &PgRow) -> anyhow::Result<Asset> {
    let status: String = row.try_get("status")?;
    Ok(Asset {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author_id: row.try_get("author_id")?,
        coin_price: row.try_get("coin_price")?,
        status: status.parse().map_err(anyhow::Error::msg)?,
        download_url: row.try_get("download_url")?,
        downloads: row.try_get("downloads")?,
    })
}

fn transaction_from_row(row: &PgRow) -> anyhow::Result<CoinTransaction> {
    let kind: String = row.try_get("kind")?;
    Ok(CoinTransaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        kind: kind.parse().map_err(anyhow::Error::msg)?,
        description: row.try_get("description")?,
        reference_id: row.try_get("reference_id")?,
        balance_after: row.try_get("balance_after")?,
        created_at: row.try_get("created_at")?,
    })
}

fn prize_from_row(row: &PgRow) -> anyhow::Result<SpinPrize> {
    let kind: String = row.try_get("kind")?;
    Ok(SpinPrize {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: kind.parse().map_err(anyhow::Error::msg)?,
        value: row.try_get("value")?,
        probability: row.try_get("probability")?,
        is_active: row.try_get("is_active")?,
    })
}

fn spin_record_from_row(row: &PgRow) -> anyhow::Result<SpinRecord> {
    let kind: String = row.try_get("prize_kind")?;
    Ok(SpinRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        prize_id: row.try_get("prize_id")?,
        prize_name: row.try_get("prize_name")?,
        prize_kind: kind.parse().map_err(anyhow::Error::msg)?,
        prize_value: row.try_get("prize_value")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn insert_transaction(
    conn: &mut PgConnection,
    user_id: Uuid,
    entry: NewTransaction,
    balance_after: i64,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO coin_transactions (id, user_id, amount, kind, description, reference_id, balance_after)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(entry.amount)
    .bind(entry.kind.as_str())
    .bind(entry.description)
    .bind(entry.reference_id)
    .bind(balance_after)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Locks the user's row for the rest of the transaction and returns the balance.
async fn lock_balance(conn: &mut PgConnection, user_id: Uuid) -> anyhow::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT coins FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| anyhow!("user {} not found", user_id))
}

const USER_COLUMNS: &str = "id, username, coins, membership, xp, badge_tier, last_daily_claim";
const ASSET_COLUMNS: &str = "id, title, author_id, coin_price, status, download_url, downloads";

#[async_trait]
impl MarketStore for PgMarketStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(user_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_asset(&self, asset_id: Uuid) -> anyhow::Result<Option<Asset>> {
        let sql = format!("SELECT {} FROM assets WHERE id = $1", ASSET_COLUMNS);
        let row = sqlx::query(&sql).bind(asset_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(asset_from_row).transpose()
    }

    async fn is_entitled(&self, user_id: Uuid, asset_id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM purchases WHERE user_id = $1 AND asset_id = $2)",
        )
        .bind(user_id)
        .bind(asset_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn purchase(&self, user_id: Uuid, asset: &Asset) -> anyhow::Result<PurchaseOutcome> {
        let mut tx = self.pool.begin().await?;

        let balance = lock_balance(&mut tx, user_id).await?;
        // Price as of now, not as of the caller's earlier read.
        let price = sqlx::query_scalar::<_, i64>("SELECT coin_price FROM assets WHERE id = $1")
            .bind(asset.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| anyhow!("asset {} not found", asset.id))?;
        let entitled: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM purchases WHERE user_id = $1 AND asset_id = $2)",
        )
        .bind(user_id)
        .bind(asset.id)
        .fetch_one(&mut *tx)
        .await?;

        let decision = decide(price, balance, entitled);
        let PurchaseDecision::ChargeAndGrant { price } = decision else {
            tx.commit().await?;
            return Ok(PurchaseOutcome { decision, balance });
        };

        // Conditional decrement: never drives the balance below zero.
        let new_balance = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET coins = coins - $2 WHERE id = $1 AND coins >= $2 RETURNING coins",
        )
        .bind(user_id)
        .bind(price)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| anyhow!("balance of user {} changed under lock", user_id))?;

        let inserted = sqlx::query(
            "INSERT INTO purchases (user_id, asset_id, price_paid) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, asset_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(asset.id)
        .bind(price)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted != 1 {
            // Dropping `tx` rolls the decrement back.
            bail!("purchase record for user {} asset {} already exists", user_id, asset.id);
        }

        insert_transaction(
            &mut tx,
            user_id,
            NewTransaction {
                amount: -price,
                kind: TransactionKind::Purchase,
                description: format!("Purchased {}", asset.title),
                reference_id: Some(asset.id),
            },
            new_balance,
        )
        .await?;

        tx.commit().await?;
        tracing::info!(%user_id, asset_id = %asset.id, price, balance = new_balance, "purchase committed");
        Ok(PurchaseOutcome {
            decision,
            balance: new_balance,
        })
    }

    async fn record_download(&self, user_id: Uuid, asset_id: Uuid, coins_spent: i64) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE assets SET downloads = downloads + 1 WHERE id = $1")
            .bind(asset_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO downloads (id, asset_id, user_id, coins_spent) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(asset_id)
            .bind(user_id)
            .bind(coins_spent)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn award_xp(&self, user_id: Uuid, amount: i64) -> anyhow::Result<XpAward> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT xp, badge_tier FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| anyhow!("user {} not found", user_id))?;
        let award = XpAward::apply(row.try_get("xp")?, row.try_get("badge_tier")?, amount);

        sqlx::query("UPDATE users SET xp = $2, badge_tier = $3 WHERE id = $1")
            .bind(user_id)
            .bind(award.xp)
            .bind(award.badge_tier)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(award)
    }

    async fn transactions(&self, user_id: Uuid, limit: i64, offset: i64) -> anyhow::Result<Vec<CoinTransaction>> {
        let rows = sqlx::query(
            "SELECT id, user_id, amount, kind, description, reference_id, balance_after, created_at
             FROM coin_transactions WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn claim_daily(
        &self,
        user_id: Uuid,
        reward: i64,
        xp_bonus: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DailyClaim> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE users SET coins = coins + $2, xp = xp + $3, last_daily_claim = $4
             WHERE id = $1 AND (last_daily_claim IS NULL OR last_daily_claim <= $5)
             RETURNING coins, xp, badge_tier",
        )
        .bind(user_id)
        .bind(reward)
        .bind(xp_bonus)
        .bind(now)
        .bind(now - daily_cooldown())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = claimed else {
            let last = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
                "SELECT last_daily_claim FROM users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .flatten()
            .ok_or_else(|| anyhow!("user {} not found", user_id))?;
            tx.rollback().await?;
            return Ok(DailyClaim::TooSoon { last_claim: last });
        };

        let balance: i64 = row.try_get("coins")?;
        let xp: i64 = row.try_get("xp")?;
        let tier: i32 = row.try_get("badge_tier")?;
        let award = XpAward::apply(xp, tier, 0);
        if award.badge_tier != tier {
            sqlx::query("UPDATE users SET badge_tier = $2 WHERE id = $1")
                .bind(user_id)
                .bind(award.badge_tier)
                .execute(&mut *tx)
                .await?;
        }

        insert_transaction(
            &mut tx,
            user_id,
            NewTransaction {
                amount: reward,
                kind: TransactionKind::Daily,
                description: format!("Daily reward: {} coins", reward),
                reference_id: None,
            },
            balance,
        )
        .await?;
        tx.commit().await?;
        Ok(DailyClaim::Claimed { balance, xp })
    }

    async fn adjust_balance(&self, user_id: Uuid, delta: i64, reason: &str) -> anyhow::Result<(i64, i64)> {
        let mut tx = self.pool.begin().await?;
        let balance = lock_balance(&mut tx, user_id).await?;
        let (new_balance, change) = clamp_adjustment(balance, delta);

        sqlx::query("UPDATE users SET coins = $2 WHERE id = $1")
            .bind(user_id)
            .bind(new_balance)
            .execute(&mut *tx)
            .await?;

        let verb = if delta >= 0 { "added" } else { "removed" };
        insert_transaction(
            &mut tx,
            user_id,
            NewTransaction {
                amount: change,
                kind: TransactionKind::Admin,
                description: format!("Admin {} {} coins: {}", verb, change.abs(), reason),
                reference_id: None,
            },
            new_balance,
        )
        .await?;
        tx.commit().await?;
        Ok((new_balance, change))
    }

    async fn spin_tickets(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let tickets = sqlx::query_scalar::<_, i64>("SELECT tickets FROM spin_wheel_tickets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tickets.unwrap_or(0))
    }

    async fn grant_daily_ticket(&self, user_id: Uuid, tickets: i64, now: DateTime<Utc>) -> anyhow::Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO spin_wheel_tickets (user_id, tickets, last_earned) VALUES ($1, 0, NULL)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let last_earned = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT last_earned FROM spin_wheel_tickets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if let Some(last) = last_earned {
            if same_utc_day(last, now) {
                tx.rollback().await?;
                return Ok(None);
            }
        }

        let total = sqlx::query_scalar::<_, i64>(
            "UPDATE spin_wheel_tickets SET tickets = tickets + $2, last_earned = $3
             WHERE user_id = $1 RETURNING tickets",
        )
        .bind(user_id)
        .bind(tickets)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(total))
    }

    async fn active_prizes(&self) -> anyhow::Result<Vec<SpinPrize>> {
        let rows = sqlx::query(
            "SELECT id, name, kind, value, probability, is_active FROM spin_wheel_prizes
             WHERE is_active ORDER BY sort_order, name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(prize_from_row).collect()
    }

    async fn apply_spin(&self, user_id: Uuid, prize: &SpinPrize) -> anyhow::Result<Option<SpinApplied>> {
        let mut tx = self.pool.begin().await?;

        let remaining = sqlx::query_scalar::<_, i64>(
            "UPDATE spin_wheel_tickets SET tickets = tickets - 1
             WHERE user_id = $1 AND tickets >= 1 RETURNING tickets",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(mut tickets) = remaining else {
            tx.rollback().await?;
            return Ok(None);
        };

        let balance = match prize.kind {
            PrizeKind::Coins if prize.value > 0 => {
                let balance = sqlx::query_scalar::<_, i64>(
                    "UPDATE users SET coins = coins + $2 WHERE id = $1 RETURNING coins",
                )
                .bind(user_id)
                .bind(prize.value)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| anyhow!("user {} not found", user_id))?;
                insert_transaction(
                    &mut tx,
                    user_id,
                    NewTransaction {
                        amount: prize.value,
                        kind: TransactionKind::Spin,
                        description: format!("Won {} from Lucky Spin", prize.name),
                        reference_id: Some(prize.id),
                    },
                    balance,
                )
                .await?;
                balance
            }
            _ => {
                if prize.kind == PrizeKind::Ticket && prize.value > 0 {
                    tickets = sqlx::query_scalar::<_, i64>(
                        "UPDATE spin_wheel_tickets SET tickets = tickets + $2 WHERE user_id = $1 RETURNING tickets",
                    )
                    .bind(user_id)
                    .bind(prize.value)
                    .fetch_one(&mut *tx)
                    .await?;
                }
                lock_balance(&mut tx, user_id).await?
            }
        };

        sqlx::query(
            "INSERT INTO spin_history (id, user_id, prize_id, prize_name, prize_kind, prize_value)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(prize.id)
        .bind(&prize.name)
        .bind(prize.kind.as_str())
        .bind(prize.value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(SpinApplied { balance, tickets }))
    }

    async fn spin_history(&self, user_id: Uuid, limit: i64, offset: i64) -> anyhow::Result<Vec<SpinRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, prize_id, prize_name, prize_kind, prize_value, created_at
             FROM spin_history WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(spin_record_from_row).collect()
    }
}
