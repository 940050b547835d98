//! XP rewards and badge tiers.

use serde::Serialize;

/// Activities that award XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XpActivity {
    UploadAsset,
    CreateThread,
    CreateReply,
    ReceiveLike,
    DailyLogin,
    AssetDownload,
}

impl XpActivity {
    pub fn xp(&self) -> i64 {
        match self {
            XpActivity::UploadAsset => 100,
            XpActivity::CreateThread => 50,
            XpActivity::CreateReply => 20,
            XpActivity::ReceiveLike => 10,
            XpActivity::DailyLogin => 10,
            XpActivity::AssetDownload => 15,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            XpActivity::UploadAsset => "upload_asset",
            XpActivity::CreateThread => "create_thread",
            XpActivity::CreateReply => "create_reply",
            XpActivity::ReceiveLike => "receive_like",
            XpActivity::DailyLogin => "daily_login",
            XpActivity::AssetDownload => "asset_download",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeTier {
    pub tier: i32,
    pub name: &'static str,
    pub min_xp: i64,
}

/// Ordered by `min_xp` ascending.
pub const BADGE_TIERS: &[BadgeTier] = &[
    BadgeTier { tier: 1, name: "Beginner", min_xp: 0 },
    BadgeTier { tier: 2, name: "Intermediate", min_xp: 1_000 },
    BadgeTier { tier: 3, name: "Advanced", min_xp: 5_000 },
    BadgeTier { tier: 4, name: "Expert", min_xp: 15_000 },
    BadgeTier { tier: 5, name: "Legend", min_xp: 50_000 },
];

/// Highest tier whose threshold `xp` reaches. Negative XP clamps to the first tier.
pub fn badge_for_xp(xp: i64) -> BadgeTier {
    BADGE_TIERS
        .iter()
        .rev()
        .find(|t| xp >= t.min_xp)
        .copied()
        .unwrap_or(BADGE_TIERS[0])
}

/// Result of crediting XP to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    pub xp: i64,
    pub badge_tier: i32,
    pub upgraded: bool,
}

impl XpAward {
    /// Applies `amount` on top of `(xp, tier)`.
    pub fn apply(xp: i64, tier: i32, amount: i64) -> Self {
        let new_xp = xp.saturating_add(amount);
        let new_tier = badge_for_xp(new_xp).tier;
        XpAward {
            xp: new_xp,
            badge_tier: new_tier,
            upgraded: new_tier > tier,
        }
    }
}
