use serde::{Deserialize, Serialize};
use strum::Display;

use crate::nec::service_capacity_va;

use super::graph::{EntityGraph, PanelDescriptor, PanelRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UtilizationStatus {
    Ok,
    Warning,
    Overloaded,
}

impl UtilizationStatus {
    pub fn from_percent(percent: f64) -> Self {
        if percent < 80.0 {
            UtilizationStatus::Ok
        } else if percent < 100.0 {
            UtilizationStatus::Warning
        } else {
            UtilizationStatus::Overloaded
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelUtilization {
    pub panel: PanelRef,
    pub name: String,
    pub connected_va: f64,
    pub capacity_va: f64,
    pub utilization_percent: f64,
    pub poles_used: u32,
    pub spaces: u32,
    pub status: UtilizationStatus,
}

fn utilization(panel: &PanelDescriptor, connected_va: f64, poles_used: u32) -> PanelUtilization {
    let capacity_va =
        service_capacity_va(panel.bus_rating as f64, panel.voltage as f64, panel.phase);
    let utilization_percent = if capacity_va > 0.0 {
        connected_va / capacity_va * 100.0
    } else {
        0.0
    };
    PanelUtilization {
        panel: panel.handle,
        name: panel.name.clone(),
        connected_va,
        capacity_va,
        utilization_percent,
        poles_used,
        spaces: panel.spaces,
        status: UtilizationStatus::from_percent(utilization_percent),
    }
}

/// Connected load against bus rating for every panel; `mdp_demand_va` is the
/// design demand carried by the MDP under the chosen scenario
pub fn utilization_report(graph: &EntityGraph, mdp_demand_va: f64) -> Vec<PanelUtilization> {
    let feeders_poles = 3 * graph.sub_panels().filter(|p| !p.panel.metered).count() as u32 + 3;
    std::iter::once(utilization(&graph.mdp, mdp_demand_va, feeders_poles))
        .chain(
            graph
                .sub_panels()
                .map(|p| utilization(&p.panel, p.connected_va(), p.poles_used())),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bands() {
        assert_eq!(UtilizationStatus::from_percent(79.9), UtilizationStatus::Ok);
        assert_eq!(UtilizationStatus::from_percent(80.0), UtilizationStatus::Warning);
        assert_eq!(UtilizationStatus::from_percent(100.0), UtilizationStatus::Overloaded);
    }
}
