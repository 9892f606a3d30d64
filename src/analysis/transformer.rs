use serde::{Deserialize, Serialize};
use strum::Display;

use crate::nec::tables::{TRANSFORMER_ADEQUATE_PERCENT, TRANSFORMER_CAUTION_PERCENT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransformerStatus {
    Adequate,
    Caution,
    UpgradeRequired,
}

impl TransformerStatus {
    pub fn from_utilization(percent: f64) -> Self {
        if percent <= TRANSFORMER_ADEQUATE_PERCENT {
            TransformerStatus::Adequate
        } else if percent <= TRANSFORMER_CAUTION_PERCENT {
            TransformerStatus::Caution
        } else {
            TransformerStatus::UpgradeRequired
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerCheck {
    pub rating_kva: f64,
    pub load_kva: f64,
    pub utilization_percent: f64,
    pub status: TransformerStatus,
}

/// Utility transformer loading with the new EV demand
pub fn check_transformer(rating_kva: f64, total_demand_va: f64) -> TransformerCheck {
    let load_kva = total_demand_va / 1000.0;
    let utilization_percent = if rating_kva > 0.0 {
        load_kva / rating_kva * 100.0
    } else {
        f64::INFINITY
    };
    TransformerCheck {
        rating_kva,
        load_kva,
        utilization_percent,
        status: TransformerStatus::from_utilization(utilization_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(50.0, TransformerStatus::Adequate)]
    #[case(70.0, TransformerStatus::Adequate)]
    #[case(70.1, TransformerStatus::Caution)]
    #[case(85.0, TransformerStatus::Caution)]
    #[case(85.1, TransformerStatus::UpgradeRequired)]
    #[case(140.0, TransformerStatus::UpgradeRequired)]
    fn test_status_thresholds(#[case] percent: f64, #[case] expected: TransformerStatus) {
        assert_eq!(TransformerStatus::from_utilization(percent), expected);
    }

    #[test]
    fn test_check_transformer() {
        let check = check_transformer(500.0, 300_000.0);
        assert_eq!(check.load_kva, 300.0);
        assert_eq!(check.utilization_percent, 60.0);
        assert_eq!(check.status, TransformerStatus::Adequate);
    }

    #[test]
    fn test_zero_rating_needs_upgrade() {
        assert_eq!(check_transformer(0.0, 1000.0).status, TransformerStatus::UpgradeRequired);
    }
}
