use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrizeKind {
    Coins,
    Ticket,
    Nothing,
}

impl PrizeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrizeKind::Coins => "coins",
            PrizeKind::Ticket => "ticket",
            PrizeKind::Nothing => "nothing",
        }
    }
}

impl FromStr for PrizeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coins" => Ok(PrizeKind::Coins),
            "ticket" => Ok(PrizeKind::Ticket),
            // Legacy `item` prizes have no server-side effect.
            "nothing" | "item" => Ok(PrizeKind::Nothing),
            other => Err(format!("unknown prize kind '{}'", other)),
        }
    }
}

/// A spin wheel slot, as edited by admins.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpinPrize {
    pub id: Uuid,
    pub name: String,
    pub kind: PrizeKind,
    pub value: i64,
    /// Relative weight; the draw normalises over all active prizes.
    pub probability: f64,
    pub is_active: bool,
}

/// One resolved spin, whatever the prize kind.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpinRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prize_id: Uuid,
    pub prize_name: String,
    pub prize_kind: PrizeKind,
    pub prize_value: i64,
    pub created_at: DateTime<Utc>,
}
