//! # Three-Phase Charger Distribution
//!
//! Chargers on a 3Ø service are assigned round-robin to phases A, B and C.
//! When the count is not a multiple of three the remainder lands on A, then B.
//!
//! Each phase also carries the building's existing (balanced) demand:
//!
//! - 20 chargers at 48 A: A = 7, B = 7, C = 6
//! - Phase currents: A = B = background + 336 A, C = background + 288 A
//! - Imbalance = (max - min) / average × 100

use serde::{Deserialize, Serialize};

use crate::nec::tables::PHASE_IMBALANCE_LIMIT_PERCENT;

/// Chargers and line current per phase
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseLoad {
    pub chargers: u32,
    /// Phase current (A), background included
    pub amps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseBalance {
    pub phase_a: PhaseLoad,
    pub phase_b: PhaseLoad,
    pub phase_c: PhaseLoad,
    pub imbalance_percent: f64,
    pub acceptable: bool,
}

impl PhaseBalance {
    fn phases(&self) -> [PhaseLoad; 3] {
        [self.phase_a, self.phase_b, self.phase_c]
    }

    /// Highest phase current
    pub fn max_phase(&self) -> f64 {
        self.phases().iter().map(|p| p.amps).fold(f64::MIN, f64::max)
    }

    /// Lowest phase current
    pub fn min_phase(&self) -> f64 {
        self.phases().iter().map(|p| p.amps).fold(f64::MAX, f64::min)
    }

    pub fn average_phase(&self) -> f64 {
        self.phases().iter().map(|p| p.amps).sum::<f64>() / 3.0
    }

    /// Phase whose current exceeds `limit_a`, if any (1 = A)
    pub fn overloaded_phase(&self, limit_a: f64) -> Option<usize> {
        self.phases()
            .iter()
            .position(|p| p.amps > limit_a)
            .map(|i| i + 1)
    }
}

/// Distribute `chargers` across three phases and measure the imbalance
pub fn balance_phases(chargers: u32, amps_per_charger: f64, background_amps: f64) -> PhaseBalance {
    let base = chargers / 3;
    let remainder = chargers % 3;
    let counts = [
        base + u32::from(remainder > 0),
        base + u32::from(remainder > 1),
        base,
    ];

    let load = |n: u32| PhaseLoad {
        chargers: n,
        amps: background_amps.max(0.0) + n as f64 * amps_per_charger,
    };

    let mut balance = PhaseBalance {
        phase_a: load(counts[0]),
        phase_b: load(counts[1]),
        phase_c: load(counts[2]),
        imbalance_percent: 0.0,
        acceptable: true,
    };

    let avg = balance.average_phase();
    balance.imbalance_percent = if avg > 0.0 {
        (balance.max_phase() - balance.min_phase()) / avg * 100.0
    } else {
        0.0
    };
    balance.acceptable = balance.imbalance_percent <= PHASE_IMBALANCE_LIMIT_PERCENT;
    balance
}
