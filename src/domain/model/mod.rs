//! Domain records for the coin economy: users, assets, purchases and the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod prize;

pub use prize::{PrizeKind, SpinPrize, SpinRecord};

/// Membership tier stored in `users.membership`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Free,
    Vip,
    Admin,
}

impl Membership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Membership::Free => "free",
            Membership::Vip => "vip",
            Membership::Admin => "admin",
        }
    }
}

impl FromStr for Membership {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Membership::Free),
            "vip" => Ok(Membership::Vip),
            "admin" => Ok(Membership::Admin),
            other => Err(format!("unknown membership '{}'", other)),
        }
    }
}

/// Moderation status of an uploaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Pending,
    Approved,
    Rejected,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "pending",
            AssetStatus::Approved => "approved",
            AssetStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for AssetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(AssetStatus::Pending),
            "approved" => Ok(AssetStatus::Approved),
            "rejected" => Ok(AssetStatus::Rejected),
            other => Err(format!("unknown asset status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Coin balance. Never negative.
    pub coins: i64,
    pub membership: Membership,
    pub xp: i64,
    pub badge_tier: i32,
    pub last_daily_claim: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.membership == Membership::Admin
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub id: Uuid,
    pub title: String,
    pub author_id: Option<Uuid>,
    /// Price in coins; 0 means free.
    pub coin_price: i64,
    pub status: AssetStatus,
    pub download_url: Option<String>,
    pub downloads: i64,
}

impl Asset {
    /// Approved assets are visible to everyone, others only to their author and admins.
    pub fn is_visible_to(&self, user: &User) -> bool {
        self.status == AssetStatus::Approved || self.author_id == Some(user.id) || user.is_admin()
    }
}

/// Category of a ledger entry in `coin_transactions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Daily,
    Spin,
    Admin,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Daily => "daily",
            TransactionKind::Spin => "spin",
            TransactionKind::Admin => "admin",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(TransactionKind::Purchase),
            "daily" => Ok(TransactionKind::Daily),
            "spin" => Ok(TransactionKind::Spin),
            "admin" => Ok(TransactionKind::Admin),
            other => Err(format!("unknown transaction kind '{}'", other)),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only balance change.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoinTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Signed change applied to the balance.
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub reference_id: Option<Uuid>,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry that has not been written yet.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub reference_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(membership: Membership) -> User {
        User {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            coins: 0,
            membership,
            xp: 0,
            badge_tier: 1,
            last_daily_claim: None,
        }
    }

    fn asset(status: AssetStatus, author_id: Option<Uuid>) -> Asset {
        Asset {
            id: Uuid::new_v4(),
            title: "police-job".to_string(),
            author_id,
            coin_price: 10,
            status,
            download_url: Some("https://cdn.example.com/police-job.zip".to_string()),
            downloads: 0,
        }
    }

    #[test]
    fn test_pending_asset_visibility() {
        let member = user(Membership::Free);
        let admin = user(Membership::Admin);
        let author = user(Membership::Vip);

        let pending = asset(AssetStatus::Pending, Some(author.id));
        assert!(!pending.is_visible_to(&member));
        assert!(pending.is_visible_to(&admin));
        assert!(pending.is_visible_to(&author));

        let approved = asset(AssetStatus::Approved, None);
        assert!(approved.is_visible_to(&member));
    }

    #[test]
    fn test_membership_parsing_is_case_insensitive() {
        assert_eq!("ADMIN".parse::<Membership>(), Ok(Membership::Admin));
        assert_eq!(" vip ".parse::<Membership>(), Ok(Membership::Vip));
        assert!("gold".parse::<Membership>().is_err());
    }
}
