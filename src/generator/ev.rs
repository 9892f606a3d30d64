//! EV panel templates keyed by charger class.

use crate::analysis::EvLoad;
use crate::domain::ChargerClass;
use crate::nec::tables::{BREAKER_SIZES, CONTINUOUS_LOAD_FACTOR};
use crate::nec::round_up_to_standard_size;

use super::graph::CircuitLoadType;
use super::panel_slots::CircuitSpec;

const EVEMS_CONTROLLER_VA: f64 = 500.0;
const PARKING_LIGHTING_VA: f64 = 1_200.0;
const SPARE_FRACTION: f64 = 0.10;

#[derive(Debug, Clone, Copy)]
pub struct EvPanelTemplate {
    pub class: ChargerClass,
    pub chargers: u32,
    pub amps_per_charger: f64,
    pub ev_voltage: f64,
    pub three_phase: bool,
    pub load_managed: bool,
}

impl EvPanelTemplate {
    pub fn from_load(ev: &EvLoad, chargers: u32, three_phase: bool, load_managed: bool) -> Self {
        Self {
            class: ev.charger_class,
            chargers,
            amps_per_charger: ev.amps_per_charger,
            ev_voltage: ev.ev_voltage,
            three_phase,
            load_managed,
        }
    }

    fn charger_poles(&self) -> u8 {
        match self.class {
            ChargerClass::DcFast if self.three_phase => 3,
            _ => 2,
        }
    }

    fn charger_label(&self) -> &'static str {
        match self.class {
            ChargerClass::Standard => "EV Charger",
            ChargerClass::HighPower => "EV Charger (High Power)",
            ChargerClass::DcFast => "DC Fast Charger",
        }
    }

    /// EVSE branch breaker at 125% of nameplate
    pub fn charger_breaker(&self) -> u32 {
        round_up_to_standard_size(self.amps_per_charger * CONTINUOUS_LOAD_FACTOR, BREAKER_SIZES)
    }

    fn charger_va(&self) -> f64 {
        match self.charger_poles() {
            3 => self.amps_per_charger * self.ev_voltage * 3f64.sqrt(),
            _ => self.amps_per_charger * self.ev_voltage,
        }
    }

    pub fn spare_count(&self) -> u32 {
        if self.chargers == 0 {
            return 0;
        }
        ((self.chargers as f64 * SPARE_FRACTION).ceil() as u32).max(1)
    }

    pub fn circuits(&self) -> Vec<CircuitSpec> {
        let poles = self.charger_poles();
        let breaker = self.charger_breaker();
        let label = self.charger_label();

        let mut specs: Vec<CircuitSpec> = (1..=self.chargers)
            .map(|n| {
                CircuitSpec::new(
                    format!("{} {}", label, n),
                    self.charger_va(),
                    poles,
                    CircuitLoadType::EvCharger,
                )
                .breaker(breaker)
            })
            .collect();

        if self.load_managed {
            specs.push(
                CircuitSpec::new("EVEMS Controller", EVEMS_CONTROLLER_VA, 1, CircuitLoadType::Control)
                    .breaker(20),
            );
        }

        specs.extend((1..=self.spare_count()).map(|n| {
            CircuitSpec::new(format!("Spare {}", n), 0.0, poles, CircuitLoadType::Spare).breaker(breaker)
        }));

        specs.push(
            CircuitSpec::new("Parking Area Lighting", PARKING_LIGHTING_VA, 1, CircuitLoadType::Lighting)
                .breaker(20),
        );
        specs
    }
}
