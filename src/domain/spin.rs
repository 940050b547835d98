//! Weighted draw over the active spin wheel prizes.

use crate::domain::model::SpinPrize;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Picks a prize index with probability proportional to its weight.
///
/// Draws `r` in `[0, total)`, then walks the prizes subtracting weights; the first prize that
/// brings `r` to zero or below wins. Float drift falls back to the last prize. Prizes with a
/// non-positive or non-finite weight never win. Returns `None` for an empty wheel.
pub fn draw<R: Rng + ?Sized>(prizes: &[SpinPrize], rng: &mut R) -> Option<usize> {
    if prizes.is_empty() {
        return None;
    }
    let weight = |p: &SpinPrize| {
        if p.probability.is_finite() && p.probability > 0.0 {
            p.probability
        } else {
            0.0
        }
    };
    let total: f64 = prizes.iter().map(weight).sum();
    if total <= 0.0 {
        return None;
    }

    let mut r = rng.gen_range(0.0..total);
    for (i, p) in prizes.iter().enumerate() {
        let w = weight(p);
        if w == 0.0 {
            continue;
        }
        r -= w;
        if r <= 0.0 {
            return Some(i);
        }
    }
    prizes.iter().rposition(|p| weight(p) > 0.0)
}

/// Daily tickets reset on the UTC calendar day.
pub fn same_utc_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Time left until the next daily ticket becomes available.
pub fn until_next_utc_day(now: DateTime<Utc>) -> Duration {
    now.date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc() - now)
        .unwrap_or_else(Duration::zero)
}
