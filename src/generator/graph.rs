//! Symbolic entity graph.
//!
//! Descriptors never carry database identifiers. Cross-references use
//! [`PanelRef`] handles that the population step resolves to real ids as rows
//! are inserted.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::analysis::ScenarioKey;
use crate::domain::Phase;

/// Handle to a panel in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PanelRefRepr", into = "PanelRefRepr")]
pub enum PanelRef {
    Mdp,
    House,
    Ev,
    /// Zero-based dwelling unit index
    Unit(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PanelRefRepr {
    Unit(usize),
    Named(String),
}

impl TryFrom<PanelRefRepr> for PanelRef {
    type Error = String;

    fn try_from(repr: PanelRefRepr) -> Result<Self, Self::Error> {
        match repr {
            PanelRefRepr::Unit(index) => Ok(PanelRef::Unit(index)),
            PanelRefRepr::Named(name) => match name.as_str() {
                "mdp" => Ok(PanelRef::Mdp),
                "house" => Ok(PanelRef::House),
                "ev" => Ok(PanelRef::Ev),
                other => other
                    .parse::<usize>()
                    .map(PanelRef::Unit)
                    .map_err(|_| format!("Unknown panel reference: {}", other)),
            },
        }
    }
}

impl From<PanelRef> for PanelRefRepr {
    fn from(panel: PanelRef) -> Self {
        match panel {
            PanelRef::Mdp => PanelRefRepr::Named("mdp".to_string()),
            PanelRef::House => PanelRefRepr::Named("house".to_string()),
            PanelRef::Ev => PanelRefRepr::Named("ev".to_string()),
            PanelRef::Unit(index) => PanelRefRepr::Unit(index),
        }
    }
}

impl fmt::Display for PanelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelRef::Mdp => write!(f, "mdp"),
            PanelRef::House => write!(f, "house"),
            PanelRef::Ev => write!(f, "ev"),
            PanelRef::Unit(index) => write!(f, "{}", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PanelKind {
    Mdp,
    House,
    Ev,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelDescriptor {
    pub handle: PanelRef,
    pub kind: PanelKind,
    pub name: String,
    pub voltage: u32,
    pub phase: Phase,
    pub bus_rating: u32,
    pub main_breaker_amps: u32,
    pub spaces: u32,
    pub location: String,
    /// Upstream panel; `None` for the MDP, which is fed from the service
    pub fed_from: Option<PanelRef>,
    /// Fed through a meter stack position
    pub metered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterStackDescriptor {
    pub name: String,
    pub positions: u32,
    pub bus_rating: u32,
    pub voltage: u32,
    pub phase: Phase,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitLoadType {
    Lighting,
    Receptacle,
    Appliance,
    Hvac,
    Motor,
    EvCharger,
    Control,
    Spare,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitDescriptor {
    pub circuit_number: u32,
    pub description: String,
    pub breaker_amps: u32,
    pub poles: u8,
    pub load_va: f64,
    pub conductor_size: String,
    pub load_type: CircuitLoadType,
}

/// A panel and the circuits it carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelWithCircuits {
    pub panel: PanelDescriptor,
    pub circuits: Vec<CircuitDescriptor>,
}

impl PanelWithCircuits {
    pub fn connected_va(&self) -> f64 {
        self.circuits.iter().map(|c| c.load_va).sum()
    }

    pub fn poles_used(&self) -> u32 {
        self.circuits.iter().map(|c| c.poles as u32).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MeterKind {
    Unit,
    House,
    Ev,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterDescriptor {
    pub meter_number: String,
    pub kind: MeterKind,
    pub panel: PanelRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederDescriptor {
    pub name: String,
    pub source: PanelRef,
    pub destination: PanelRef,
    pub conductor_size: String,
    pub length_ft: Option<f64>,
}

/// Counts compared across regenerations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub total_panels: usize,
    pub total_circuits: usize,
    pub total_meters: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("meter {meter} references missing panel '{panel}'")]
    DanglingMeter { meter: String, panel: PanelRef },

    #[error("panel '{panel}' is fed from missing panel '{source_panel}'")]
    DanglingFeed { panel: PanelRef, source_panel: PanelRef },

    #[error("duplicate panel handle '{0}'")]
    DuplicateHandle(PanelRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityGraph {
    pub scenario: ScenarioKey,
    pub mdp: PanelDescriptor,
    pub meter_stack: MeterStackDescriptor,
    pub house: PanelWithCircuits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev: Option<PanelWithCircuits>,
    /// Ordered by unit index
    pub units: Vec<PanelWithCircuits>,
    pub meters: Vec<MeterDescriptor>,
    /// Left empty by the generator; entered manually
    pub feeders: Vec<FeederDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typical_unit_note: Option<String>,
}

impl EntityGraph {
    /// Sub-panels in insertion order: house, EV, then units
    pub fn sub_panels(&self) -> impl Iterator<Item = &PanelWithCircuits> {
        std::iter::once(&self.house)
            .chain(self.ev.as_ref())
            .chain(self.units.iter())
    }

    pub fn panel(&self, handle: PanelRef) -> Option<&PanelDescriptor> {
        match handle {
            PanelRef::Mdp => Some(&self.mdp),
            _ => self
                .sub_panels()
                .map(|p| &p.panel)
                .find(|p| p.handle == handle),
        }
    }

    pub fn contains(&self, handle: PanelRef) -> bool {
        self.panel(handle).is_some()
    }

    /// Every meter and panel feed must point at a panel in this graph
    pub fn validate_references(&self) -> Result<(), GraphError> {
        let mut seen = std::collections::HashSet::new();
        for panel in self.sub_panels().map(|p| &p.panel) {
            if !seen.insert(panel.handle) || panel.handle == PanelRef::Mdp {
                return Err(GraphError::DuplicateHandle(panel.handle));
            }
            if let Some(source) = panel.fed_from.filter(|s| !self.contains(*s)) {
                return Err(GraphError::DanglingFeed {
                    panel: panel.handle,
                    source_panel: source,
                });
            }
        }
        if let Some(meter) = self.meters.iter().find(|m| !self.contains(m.panel)) {
            return Err(GraphError::DanglingMeter {
                meter: meter.meter_number.clone(),
                panel: meter.panel,
            });
        }
        Ok(())
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            total_panels: 1 + self.sub_panels().count(),
            total_circuits: self.sub_panels().map(|p| p.circuits.len()).sum(),
            total_meters: self.meters.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_ref_wire_format() {
        assert_eq!(serde_json::to_string(&PanelRef::House).unwrap(), "\"house\"");
        assert_eq!(serde_json::to_string(&PanelRef::Unit(7)).unwrap(), "7");
        let ev: PanelRef = serde_json::from_str("\"ev\"").unwrap();
        assert_eq!(ev, PanelRef::Ev);
        let unit: PanelRef = serde_json::from_str("3").unwrap();
        assert_eq!(unit, PanelRef::Unit(3));
        let unit: PanelRef = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(unit, PanelRef::Unit(12));
        assert!(serde_json::from_str::<PanelRef>("\"garage\"").is_err());
    }

    #[test]
    fn test_panel_ref_display() {
        assert_eq!(PanelRef::Unit(4).to_string(), "4");
        assert_eq!(PanelRef::Mdp.to_string(), "mdp");
    }
}
