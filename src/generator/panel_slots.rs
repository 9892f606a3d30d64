use crate::domain::Phase;
use crate::nec::tables::{BREAKER_SIZES, BRANCH_CIRCUIT_VOLTAGE, CONTINUOUS_LOAD_FACTOR};
use crate::nec::{amps, conductor_for_breaker, round_up_to_standard_size};

use super::graph::{CircuitDescriptor, CircuitLoadType};

/// Hands out circuit numbers the way breakers land on a panel bus.
///
/// Odd numbers run down the left column and even numbers down the right.
/// Circuits alternate columns, and a circuit with `n` poles occupies `n`
/// positions in its column, so the next number in that column is `2n` higher.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    next_left: u32,
    next_right: u32,
    left_turn: bool,
    poles_used: u32,
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self {
            next_left: 1,
            next_right: 2,
            left_turn: true,
            poles_used: 0,
        }
    }
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, poles: u8) -> u32 {
        let step = 2 * poles.max(1) as u32;
        self.poles_used += poles.max(1) as u32;
        let slot = if self.left_turn {
            let slot = self.next_left;
            self.next_left += step;
            slot
        } else {
            let slot = self.next_right;
            self.next_right += step;
            slot
        };
        self.left_turn = !self.left_turn;
        slot
    }

    pub fn poles_used(&self) -> u32 {
        self.poles_used
    }
}

/// Branch circuit before it is placed on a panel
#[derive(Debug, Clone)]
pub struct CircuitSpec {
    pub description: String,
    pub load_va: f64,
    pub poles: u8,
    pub continuous: bool,
    pub load_type: CircuitLoadType,
    /// Forces the breaker rating instead of sizing from load
    pub fixed_breaker: Option<u32>,
}

impl CircuitSpec {
    pub fn new(description: impl Into<String>, load_va: f64, poles: u8, load_type: CircuitLoadType) -> Self {
        Self {
            description: description.into(),
            load_va,
            poles,
            continuous: false,
            load_type,
            fixed_breaker: None,
        }
    }

    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }

    pub fn breaker(mut self, amps: u32) -> Self {
        self.fixed_breaker = Some(amps);
        self
    }
}

/// Voltages the circuits of one panel are computed against
#[derive(Debug, Clone, Copy)]
pub struct PanelVoltages {
    /// Line-to-line voltage for two-pole circuits
    pub line_to_line: f64,
    /// Voltage for three-pole circuits on a three-phase panel
    pub three_phase: f64,
}

impl PanelVoltages {
    /// Current drawn by a load on a circuit with the given pole count
    pub fn circuit_amps(&self, load_va: f64, poles: u8) -> f64 {
        match poles {
            0 | 1 => amps(load_va, BRANCH_CIRCUIT_VOLTAGE, Phase::Single),
            2 => amps(load_va, self.line_to_line, Phase::Single),
            _ => amps(load_va, self.three_phase, Phase::Three),
        }
    }
}

/// Size and number the circuits of one panel, in order
pub fn place_circuits(specs: Vec<CircuitSpec>, voltages: PanelVoltages) -> (Vec<CircuitDescriptor>, u32) {
    let mut slots = SlotAllocator::new();
    let circuits = specs
        .into_iter()
        .map(|spec| {
            let breaker_amps = spec.fixed_breaker.unwrap_or_else(|| {
                let mut load_amps = voltages.circuit_amps(spec.load_va, spec.poles);
                if spec.continuous {
                    load_amps *= CONTINUOUS_LOAD_FACTOR;
                }
                round_up_to_standard_size(load_amps, BREAKER_SIZES)
            });
            CircuitDescriptor {
                circuit_number: slots.allocate(spec.poles),
                description: spec.description,
                breaker_amps,
                poles: spec.poles,
                load_va: spec.load_va,
                conductor_size: conductor_for_breaker(breaker_amps).to_string(),
                load_type: spec.load_type,
            }
        })
        .collect();
    (circuits, slots.poles_used())
}
