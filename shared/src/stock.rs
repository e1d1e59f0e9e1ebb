//! Stock level classification against a product's initial quantity

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock level of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    Normal,
    Alert,
    Low,
    Out,
}

/// Stock level together with the thresholds it was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockStatus {
    pub level: StockLevel,
    pub low_threshold: Decimal,
    pub alert_threshold: Decimal,
    /// Current quantity as a percentage of the initial quantity
    pub percentage: i64,
}

/// 5% of the initial quantity, at least 1
pub fn low_stock_threshold(initial_quantity: Decimal) -> Decimal {
    (initial_quantity * Decimal::new(5, 2)).ceil().max(Decimal::ONE)
}

/// 10% of the initial quantity, at least 2
pub fn alert_stock_threshold(initial_quantity: Decimal) -> Decimal {
    (initial_quantity * Decimal::new(10, 2))
        .ceil()
        .max(Decimal::TWO)
}

pub fn stock_status(quantity: Decimal, initial_quantity: Decimal) -> StockStatus {
    let low_threshold = low_stock_threshold(initial_quantity);
    let alert_threshold = alert_stock_threshold(initial_quantity);
    let percentage = if initial_quantity > Decimal::ZERO {
        (quantity / initial_quantity * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .unwrap_or(0)
    } else {
        0
    };

    let level = if quantity <= Decimal::ZERO {
        StockLevel::Out
    } else if quantity <= low_threshold {
        StockLevel::Low
    } else if quantity <= alert_threshold {
        StockLevel::Alert
    } else {
        StockLevel::Normal
    };

    StockStatus {
        level,
        low_threshold,
        alert_threshold,
        percentage: if level == StockLevel::Out { 0 } else { percentage },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_have_floors() {
        assert_eq!(low_stock_threshold(Decimal::from(4)), Decimal::ONE);
        assert_eq!(alert_stock_threshold(Decimal::from(4)), Decimal::TWO);
        assert_eq!(low_stock_threshold(Decimal::from(200)), Decimal::from(10));
        assert_eq!(alert_stock_threshold(Decimal::from(200)), Decimal::from(20));
        // 5% of 30 = 1.5 rounds up
        assert_eq!(low_stock_threshold(Decimal::from(30)), Decimal::TWO);
    }

    #[test]
    fn test_levels() {
        let initial = Decimal::from(200);
        assert_eq!(stock_status(Decimal::ZERO, initial).level, StockLevel::Out);
        assert_eq!(stock_status(Decimal::from(10), initial).level, StockLevel::Low);
        assert_eq!(stock_status(Decimal::from(15), initial).level, StockLevel::Alert);
        assert_eq!(stock_status(Decimal::from(21), initial).level, StockLevel::Normal);
    }

    #[test]
    fn test_percentage() {
        let status = stock_status(Decimal::from(50), Decimal::from(200));
        assert_eq!(status.percentage, 25);
        assert_eq!(stock_status(Decimal::from(5), Decimal::ZERO).percentage, 0);
    }
}
