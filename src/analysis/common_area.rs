//! Common-area load aggregation.
//!
//! Items are converted to VA, grouped by category, and each category gets its
//! own demand-factor policy applied to the whole group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LoadBreakdownItem;
use crate::domain::{CommonAreaItem, InputUnit, LoadCategory};
use crate::nec::citations;
use crate::nec::tables::{
    lighting_va_per_sqft, DEFAULT_LIGHTING_VA_PER_SQFT, ELEVATOR_ADDITIONAL_FACTOR,
    LARGEST_MOTOR_FACTOR, RECEPTACLE_FULL_DEMAND_VA, RECEPTACLE_REMAINDER_FACTOR,
    VA_PER_HORSEPOWER, VA_PER_TON,
};

/// Result of aggregating an itemized common-area schedule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonAreaSummary {
    pub items: Vec<LoadBreakdownItem>,
    pub total_connected_va: f64,
    pub total_demand_va: f64,
    /// Lines ignored because their quantity was not a positive number
    pub skipped: Vec<String>,
}

/// VA of a single piece of equipment described by `item`
pub fn item_unit_va(item: &CommonAreaItem) -> f64 {
    match item.unit {
        InputUnit::Va => item.quantity,
        InputUnit::Horsepower => item.quantity * VA_PER_HORSEPOWER,
        InputUnit::Tons => item.quantity * VA_PER_TON,
        InputUnit::SquareFeet => {
            let density = item
                .space_type
                .map(lighting_va_per_sqft)
                .unwrap_or(DEFAULT_LIGHTING_VA_PER_SQFT);
            item.quantity * density
        }
    }
}

/// Connected VA for every piece of equipment on the line
pub fn item_connected_va(item: &CommonAreaItem) -> f64 {
    item_unit_va(item) * item.count.max(1) as f64
}

/// Demand VA of one line considered on its own (used for branch-circuit sizing)
pub fn item_demand_va(item: &CommonAreaItem) -> f64 {
    let mut group = CategoryGroup::default();
    group.add(item_unit_va(item), item.count.max(1));
    group.demand(item.category)
}

fn is_usable(item: &CommonAreaItem) -> bool {
    item.quantity.is_finite() && item.quantity > 0.0
}

/// Running totals for one category; the policies only need the largest load
#[derive(Debug, Clone, Copy, Default)]
struct CategoryGroup {
    units: u64,
    connected_va: f64,
    largest_va: f64,
}

impl CategoryGroup {
    fn add(&mut self, unit_va: f64, count: u32) {
        self.units += u64::from(count);
        self.connected_va += unit_va * f64::from(count);
        self.largest_va = self.largest_va.max(unit_va);
    }

    fn remainder_va(&self) -> f64 {
        (self.connected_va - self.largest_va).max(0.0)
    }

    /// Apply the category policy to the whole group
    fn demand(&self, category: LoadCategory) -> f64 {
        if self.units == 0 {
            return 0.0;
        }
        match category {
            LoadCategory::Receptacles => {
                let first = self.connected_va.min(RECEPTACLE_FULL_DEMAND_VA);
                first + (self.connected_va - first) * RECEPTACLE_REMAINDER_FACTOR
            }
            LoadCategory::Elevators => {
                self.largest_va + self.remainder_va() * ELEVATOR_ADDITIONAL_FACTOR
            }
            LoadCategory::Motors => self.largest_va * LARGEST_MOTOR_FACTOR + self.remainder_va(),
            LoadCategory::PoolSpa if self.units > 1 => {
                self.largest_va * LARGEST_MOTOR_FACTOR + self.remainder_va()
            }
            LoadCategory::PoolSpa
            | LoadCategory::IndoorLighting
            | LoadCategory::OutdoorLighting
            | LoadCategory::Hvac
            | LoadCategory::FirePump
            | LoadCategory::Other => self.connected_va,
        }
    }
}

fn policy_description(category: LoadCategory, units: u64) -> String {
    match category {
        LoadCategory::Receptacles => {
            "First 10,000 VA at 100%, remainder at 50%".to_string()
        }
        LoadCategory::Elevators if units > 1 => {
            format!("{} elevators: largest at 100%, others at 50%", units)
        }
        LoadCategory::Motors if units > 1 => {
            format!("{} motors: largest at 125%, others at 100%", units)
        }
        LoadCategory::Motors => "Single motor at 125%".to_string(),
        LoadCategory::PoolSpa if units > 1 => {
            format!("{} pool/spa units: largest at 125%, others at 100%", units)
        }
        _ => "100% demand".to_string(),
    }
}

/// NEC reference for a common-area category
pub fn category_citation(category: LoadCategory) -> &'static str {
    match category {
        LoadCategory::IndoorLighting | LoadCategory::OutdoorLighting => citations::LIGHTING,
        LoadCategory::Receptacles => citations::RECEPTACLES,
        LoadCategory::Elevators => citations::ELEVATORS,
        LoadCategory::Motors => citations::MOTORS,
        LoadCategory::PoolSpa => citations::POOL,
        LoadCategory::Hvac => citations::HVAC,
        LoadCategory::FirePump => citations::FIRE_PUMP,
        LoadCategory::Other => citations::OTHER,
    }
}

/// Aggregate an itemized common-area schedule into one breakdown line per category
pub fn aggregate_common_area(items: &[CommonAreaItem]) -> CommonAreaSummary {
    let mut groups: BTreeMap<LoadCategory, CategoryGroup> = BTreeMap::new();
    let mut skipped = Vec::new();

    for item in items {
        if !is_usable(item) {
            skipped.push(format!(
                "Skipped common-area item '{}' ({}): quantity must be positive",
                item.description, item.category
            ));
            continue;
        }
        groups
            .entry(item.category)
            .or_default()
            .add(item_unit_va(item), item.count.max(1));
    }

    let mut summary = CommonAreaSummary {
        skipped,
        ..Default::default()
    };

    for (category, group) in groups {
        let units = group.units;
        let connected = group.connected_va;
        let demand = group.demand(category);
        debug!(%category, units, connected, demand, "aggregated common-area category");

        summary.total_connected_va += connected;
        summary.total_demand_va += demand;
        summary.items.push(LoadBreakdownItem {
            category: category.to_string(),
            description: policy_description(category, units),
            connected_va: connected,
            demand_va: demand,
            demand_factor: if connected > 0.0 { demand / connected } else { 1.0 },
            nec_reference: category_citation(category).to_string(),
        });
    }

    summary
}
