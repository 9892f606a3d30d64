//! Entity generator.
//!
//! Turns one capacity scenario into a symbolic [`EntityGraph`]: MDP, meter
//! stack, house panel, EV panel, unit panels with their branch circuits, and
//! the meters that tie units to panels. Pure and deterministic: the same
//! analysis, scenario and building always produce the same graph.

pub mod ev;
pub mod graph;
pub mod house;
pub mod meters;
pub mod panel_slots;
pub mod units;
pub mod utilization;

use tracing::debug;

pub use graph::{
    CircuitDescriptor, CircuitLoadType, EntityGraph, FeederDescriptor, GraphError, GraphSummary,
    MeterDescriptor, MeterKind, MeterStackDescriptor, PanelDescriptor, PanelKind, PanelRef,
    PanelWithCircuits,
};
pub use utilization::{utilization_report, PanelUtilization, UtilizationStatus};

use crate::analysis::{CapacityAnalysis, ScenarioKey};
use crate::domain::{BuildingProfile, Phase, UnitAppliances};
use crate::nec::tables::{
    CONTINUOUS_LOAD_FACTOR, EVEMS_SETPOINT_FRACTION, MAX_UNIT_PANELS, PANEL_BUS_RATINGS,
};
use crate::nec::{amps, panel_spaces_for, round_up_to_standard_size};
use ev::EvPanelTemplate;
use panel_slots::{place_circuits, CircuitSpec, PanelVoltages};

const ELECTRICAL_ROOM: &str = "Electrical Room";

/// Inputs to [`generate_entities`]
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub analysis: &'a CapacityAnalysis,
    pub scenario: ScenarioKey,
    pub building: &'a BuildingProfile,
    pub appliances: &'a UnitAppliances,
}

impl GenerationRequest<'_> {
    /// Chargers the chosen scenario actually builds
    pub fn installed_chargers(&self) -> u32 {
        self.analysis.scenario(self.scenario).installed_chargers
    }

    pub fn service_amps(&self) -> u32 {
        self.analysis
            .scenario(self.scenario)
            .recommended_service_amps
            .unwrap_or(self.building.existing_service_amps)
    }

    /// Demand carried by the MDP once the scenario is built
    pub fn design_demand_va(&self) -> f64 {
        let building = self.analysis.building_load.total_demand_va;
        let ev = &self.analysis.ev_load;
        let connected = ev.per_charger_va * self.installed_chargers() as f64;
        if self.scenario.uses_load_management() {
            building + connected.min(self.evems_setpoint_va())
        } else {
            building + connected
        }
    }

    fn evems_setpoint_va(&self) -> f64 {
        self.analysis.service.available_capacity_va.max(0.0) * EVEMS_SETPOINT_FRACTION
    }
}

struct PanelShape<'a> {
    handle: PanelRef,
    kind: PanelKind,
    name: String,
    voltage: f64,
    phase: Phase,
    location: &'a str,
    fed_from: Option<PanelRef>,
    metered: bool,
}

fn build_panel(shape: PanelShape<'_>, specs: Vec<CircuitSpec>, rating: impl Fn(f64) -> u32) -> PanelWithCircuits {
    let voltages = PanelVoltages {
        line_to_line: shape.voltage,
        three_phase: shape.voltage,
    };
    let (circuits, poles) = place_circuits(specs, voltages);
    let connected: f64 = circuits.iter().map(|c| c.load_va).sum();
    let bus_rating = rating(connected);

    PanelWithCircuits {
        panel: PanelDescriptor {
            handle: shape.handle,
            kind: shape.kind,
            name: shape.name,
            voltage: shape.voltage as u32,
            phase: shape.phase,
            bus_rating,
            main_breaker_amps: bus_rating,
            spaces: panel_spaces_for(poles),
            location: shape.location.to_string(),
            fed_from: shape.fed_from,
            metered: shape.metered,
            notes: None,
        },
        circuits,
    }
}

/// Bus rating covering 125% of a load
fn feeder_rating(load_va: f64, voltage: f64, phase: Phase) -> u32 {
    round_up_to_standard_size(
        amps(load_va, voltage, phase) * CONTINUOUS_LOAD_FACTOR,
        PANEL_BUS_RATINGS,
    )
}

pub fn generate_entities(request: &GenerationRequest<'_>) -> EntityGraph {
    let profile = request.building;
    let service_volts = profile.voltage.volts();
    let phase = profile.phase;
    let chargers = request.installed_chargers();
    let managed = request.scenario.uses_load_management();

    let mdp_rating = round_up_to_standard_size(request.service_amps() as f64, PANEL_BUS_RATINGS);
    let mdp = PanelDescriptor {
        handle: PanelRef::Mdp,
        kind: PanelKind::Mdp,
        name: "MDP".to_string(),
        voltage: service_volts as u32,
        phase,
        bus_rating: mdp_rating,
        main_breaker_amps: mdp_rating,
        spaces: 0,
        location: ELECTRICAL_ROOM.to_string(),
        fed_from: None,
        metered: false,
        notes: Some(format!("{} scenario", request.scenario)),
    };

    let house = build_panel(
        PanelShape {
            handle: PanelRef::House,
            kind: PanelKind::House,
            name: "House Panel HP".to_string(),
            voltage: service_volts,
            phase,
            location: ELECTRICAL_ROOM,
            fed_from: Some(PanelRef::Mdp),
            metered: false,
        },
        house::house_circuits(profile),
        |va| feeder_rating(va, service_volts, phase),
    );

    let ev = (chargers > 0).then(|| {
        let template = EvPanelTemplate::from_load(
            &request.analysis.ev_load,
            chargers,
            phase.is_three_phase(),
            managed,
        );
        let setpoint = request.evems_setpoint_va();
        let mut panel = build_panel(
            PanelShape {
                handle: PanelRef::Ev,
                kind: PanelKind::Ev,
                name: "EV Panel EVP".to_string(),
                voltage: service_volts,
                phase,
                location: "Parking Garage",
                fed_from: Some(PanelRef::Mdp),
                metered: false,
            },
            template.circuits(),
            |va| {
                let design = if managed { va.min(setpoint) } else { va };
                feeder_rating(design, service_volts, phase)
            },
        );
        if managed {
            panel.panel.notes = Some(format!(
                "EVEMS setpoint {:.1} kVA across {} chargers",
                setpoint / 1000.0,
                chargers
            ));
        }
        panel
    });

    let unit_volts = profile.branch_voltage();
    let shown = (profile.dwelling_units as usize).min(MAX_UNIT_PANELS);
    let unit_specs = units::unit_circuits(profile, request.appliances);
    let mut unit_panels: Vec<PanelWithCircuits> = (0..shown)
        .map(|index| {
            build_panel(
                PanelShape {
                    handle: PanelRef::Unit(index),
                    kind: PanelKind::Unit,
                    name: format!("Unit {} Panel", index + 1),
                    voltage: unit_volts,
                    phase: Phase::Single,
                    location: "Unit",
                    fed_from: Some(PanelRef::Mdp),
                    metered: true,
                },
                unit_specs.clone(),
                |va| units::unit_panel_rating(va, unit_volts),
            )
        })
        .collect();

    let typical_unit_note = (profile.dwelling_units as usize > shown).then(|| {
        format!(
            "Typical of {} identical units ({} not shown)",
            profile.dwelling_units,
            profile.dwelling_units as usize - shown
        )
    });
    if let (Some(note), Some(last)) = (&typical_unit_note, unit_panels.last_mut()) {
        last.panel.notes = Some(note.clone());
    }

    let has_ev = ev.is_some();
    let meters = meters::meters_for(unit_panels.len(), has_ev);
    let mut graph = EntityGraph {
        scenario: request.scenario,
        mdp,
        meter_stack: MeterStackDescriptor {
            name: "Meter Stack MS-1".to_string(),
            positions: meters::meter_positions(profile.dwelling_units, has_ev),
            bus_rating: mdp_rating,
            voltage: service_volts as u32,
            phase,
            location: ELECTRICAL_ROOM.to_string(),
        },
        house,
        ev,
        meters,
        units: unit_panels,
        feeders: Vec::new(),
        typical_unit_note,
    };

    let unmetered = graph.sub_panels().filter(|p| !p.panel.metered).count() as u32;
    graph.mdp.spaces = panel_spaces_for(3 * (unmetered + 1));

    let summary = graph.summary();
    debug!(
        scenario = %request.scenario,
        panels = summary.total_panels,
        circuits = summary.total_circuits,
        meters = summary.total_meters,
        "entity graph generated"
    );
    graph
}
