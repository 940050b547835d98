//! Purchase decision for a download attempt.
//!
//! The decision is a pure function of (price, balance, prior entitlement). Stores evaluate it
//! while holding the buyer's balance lock, so the `ChargeAndGrant` branch and the resulting
//! decrement are never split across two competing requests.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PurchaseDecision {
    /// Price is zero: grant without touching the balance.
    FreeAsset,
    /// A purchase record exists: grant without charging again.
    AlreadyOwned,
    /// Reject; the user can top up and retry.
    InsufficientFunds { required: i64, available: i64 },
    /// Decrement the balance by `price`, record the purchase, grant.
    ChargeAndGrant { price: i64 },
}

/// Evaluates the purchase rules in order: free, owned, affordable.
pub fn decide(price: i64, balance: i64, entitled: bool) -> PurchaseDecision {
    if price <= 0 {
        return PurchaseDecision::FreeAsset;
    }
    if entitled {
        return PurchaseDecision::AlreadyOwned;
    }
    if balance < price {
        return PurchaseDecision::InsufficientFunds {
            required: price,
            available: balance,
        };
    }
    PurchaseDecision::ChargeAndGrant { price }
}

impl PurchaseDecision {
    /// Coins this decision takes from the balance.
    pub fn coins_spent(&self) -> i64 {
        match self {
            PurchaseDecision::ChargeAndGrant { price } => *price,
            _ => 0,
        }
    }

    /// Returns the grant for granting states; `None` for `InsufficientFunds`.
    pub fn grant(&self) -> Option<Grant> {
        match self {
            PurchaseDecision::FreeAsset => Some(Grant { kind: GrantKind::Free }),
            PurchaseDecision::AlreadyOwned => Some(Grant { kind: GrantKind::Redownload }),
            PurchaseDecision::ChargeAndGrant { price } => Some(Grant {
                kind: GrantKind::Purchased { coins_spent: *price },
            }),
            PurchaseDecision::InsufficientFunds { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    Free,
    Redownload,
    Purchased { coins_spent: i64 },
}

/// Proof that a download was granted. Only `PurchaseDecision::grant` constructs one, so the
/// link issuer cannot run for a rejected attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    kind: GrantKind,
}

impl Grant {
    pub fn kind(&self) -> GrantKind {
        self.kind
    }

    pub fn coins_spent(&self) -> i64 {
        match self.kind {
            GrantKind::Purchased { coins_spent } => coins_spent,
            _ => 0,
        }
    }

    /// User-facing message matching the grant.
    pub fn message(&self) -> &'static str {
        match self.kind {
            GrantKind::Free => "Download started",
            GrantKind::Redownload => "Already purchased",
            GrantKind::Purchased { .. } => "Purchase successful",
        }
    }
}

/// Result of running the decision atomically against a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseOutcome {
    pub decision: PurchaseDecision,
    /// Balance after the decision was applied.
    pub balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_asset_ignores_balance() {
        for balance in [0, 1, 49, 10_000] {
            assert_eq!(decide(0, balance, false), PurchaseDecision::FreeAsset);
            assert_eq!(decide(0, balance, true), PurchaseDecision::FreeAsset);
        }
    }

    #[test]
    fn test_insufficient_funds_reports_required_and_available() {
        assert_eq!(
            decide(50, 40, false),
            PurchaseDecision::InsufficientFunds {
                required: 50,
                available: 40
            }
        );
        assert!(decide(50, 40, false).grant().is_none());
    }

    #[test]
    fn test_charge_when_affordable_and_not_owned() {
        let decision = decide(50, 100, false);
        assert_eq!(decision, PurchaseDecision::ChargeAndGrant { price: 50 });
        assert_eq!(decision.coins_spent(), 50);
        assert_eq!(decide(50, 50, false), PurchaseDecision::ChargeAndGrant { price: 50 });
    }

    #[test]
    fn test_owned_asset_is_never_charged() {
        let decision = decide(50, 100, true);
        assert_eq!(decision, PurchaseDecision::AlreadyOwned);
        assert_eq!(decision.coins_spent(), 0);
        // Ownership wins even when the balance has since dropped.
        assert_eq!(decide(50, 0, true), PurchaseDecision::AlreadyOwned);
    }

    #[test]
    fn test_grant_messages() {
        assert_eq!(decide(0, 0, false).grant().unwrap().message(), "Download started");
        assert_eq!(decide(5, 0, true).grant().unwrap().message(), "Already purchased");
        let bought = decide(5, 5, false).grant().unwrap();
        assert_eq!(bought.message(), "Purchase successful");
        assert_eq!(bought.coins_spent(), 5);
    }
}
