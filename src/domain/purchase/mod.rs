pub mod decision;

pub use decision::{decide, Grant, GrantKind, PurchaseDecision, PurchaseOutcome};
