//! Idempotent DDL for the tables this service owns or reads.

use sqlx::PgPool;

/// Tables the service expects; checked by `preflight`.
pub const TABLES: &[&str] = &[
    "users",
    "assets",
    "purchases",
    "downloads",
    "coin_transactions",
    "spin_wheel_prizes",
    "spin_wheel_tickets",
    "spin_history",
];

const DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL,
        membership TEXT NOT NULL DEFAULT 'free',
        coins BIGINT NOT NULL DEFAULT 100 CHECK (coins >= 0),
        xp BIGINT NOT NULL DEFAULT 0,
        badge_tier INTEGER NOT NULL DEFAULT 1,
        last_daily_claim TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS assets (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        author_id UUID REFERENCES users(id),
        coin_price BIGINT NOT NULL DEFAULT 0 CHECK (coin_price >= 0),
        status TEXT NOT NULL DEFAULT 'pending',
        download_url TEXT,
        downloads BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS purchases (
        user_id UUID NOT NULL REFERENCES users(id),
        asset_id UUID NOT NULL REFERENCES assets(id),
        price_paid BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (user_id, asset_id)
    )",
    "CREATE TABLE IF NOT EXISTS downloads (
        id UUID PRIMARY KEY,
        asset_id UUID NOT NULL REFERENCES assets(id),
        user_id UUID NOT NULL REFERENCES users(id),
        coins_spent BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS coin_transactions (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        amount BIGINT NOT NULL,
        kind TEXT NOT NULL,
        description TEXT NOT NULL,
        reference_id UUID,
        balance_after BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS coin_transactions_user_created_idx
        ON coin_transactions (user_id, created_at DESC)",
    "CREATE TABLE IF NOT EXISTS spin_wheel_prizes (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        value BIGINT NOT NULL DEFAULT 0,
        probability DOUBLE PRECISION NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT true,
        sort_order INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS spin_wheel_tickets (
        user_id UUID PRIMARY KEY REFERENCES users(id),
        tickets BIGINT NOT NULL DEFAULT 0 CHECK (tickets >= 0),
        last_earned TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS spin_history (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        prize_id UUID NOT NULL,
        prize_name TEXT NOT NULL,
        prize_kind TEXT NOT NULL,
        prize_value BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS spin_history_user_created_idx
        ON spin_history (user_id, created_at DESC)",
];

pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    for statement in DDL {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Returns the expected tables that are missing from the `public` schema.
pub async fn missing_tables(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    let present: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'public'",
    )
    .fetch_all(pool)
    .await?;

    Ok(TABLES
        .iter()
        .filter(|t| !present.iter().any(|p| p == *t))
        .map(|t| t.to_string())
        .collect())
}
