use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Quantities derived from the stock counters and the consumption log.
///
/// `manual_delta` is positive when an admin credited stock above what the
/// log accounts for, negative when stock was manually removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockDerived {
    /// Sum of all log deltas.
    pub consumed_total: i64,
    /// `initial_stock - consumed_total`.
    pub expected_current: i64,
    /// `current_stock - expected_current`.
    pub manual_delta: i64,
    /// True once `current_stock` is at or below the warning threshold.
    pub low_stock: bool,
}

/// Compute the derived stock quantities from a settings snapshot and the
/// summed log deltas.
pub fn derive_stock(
    initial_stock: i64,
    current_stock: i64,
    min_stock: i64,
    consumed_total: i64,
) -> StockDerived {
    let expected_current = initial_stock - consumed_total;
    StockDerived {
        consumed_total,
        expected_current,
        manual_delta: current_stock - expected_current,
        low_stock: current_stock <= min_stock,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_stock_has_no_manual_delta() {
        let derived = derive_stock(40, 40, 5, 0);
        assert_eq!(derived.consumed_total, 0);
        assert_eq!(derived.expected_current, 40);
        assert_eq!(derived.manual_delta, 0);
        assert!(!derived.low_stock);
    }

    #[test]
    fn consumption_alone_keeps_delta_zero() {
        let derived = derive_stock(40, 28, 5, 12);
        assert_eq!(derived.expected_current, 28);
        assert_eq!(derived.manual_delta, 0);
    }

    #[test]
    fn manual_credit_shows_positive_delta() {
        // Admin topped the jar up by 10 beyond what the log explains.
        let derived = derive_stock(40, 38, 5, 12);
        assert_eq!(derived.expected_current, 28);
        assert_eq!(derived.manual_delta, 10);
    }

    #[test]
    fn manual_removal_shows_negative_delta() {
        let derived = derive_stock(40, 20, 5, 12);
        assert_eq!(derived.manual_delta, -8);
    }

    #[test]
    fn low_stock_triggers_at_threshold() {
        assert!(derive_stock(40, 5, 5, 35).low_stock);
        assert!(derive_stock(40, 0, 5, 40).low_stock);
        assert!(!derive_stock(40, 6, 5, 34).low_stock);
    }

    #[test]
    fn expected_current_may_go_negative() {
        // More consumed than the initial fill; only the stored counter is
        // clamped at zero, the derived expectation is not.
        let derived = derive_stock(10, 3, 2, 15);
        assert_eq!(derived.expected_current, -5);
        assert_eq!(derived.manual_delta, 8);
    }
}
