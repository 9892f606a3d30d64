use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Electrical Service Types
// ============================================================================

/// Number of phases on the utility service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    Single,
    Three,
}

impl Phase {
    pub fn is_three_phase(&self) -> bool {
        matches!(self, Phase::Three)
    }

    /// Current multiplier between VA and V x A (sqrt(3) for three-phase)
    pub fn factor(&self) -> f64 {
        match self {
            Phase::Single => 1.0,
            Phase::Three => 3f64.sqrt(),
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Phase::Single),
            3 => Ok(Phase::Three),
            other => Err(format!("Invalid phase: {} (expected 1 or 3)", other)),
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Single => 1,
            Phase::Three => 3,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Single => write!(f, "1Ø"),
            Phase::Three => write!(f, "3Ø"),
        }
    }
}

/// Nominal service voltage (line-to-line)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ServiceVoltage {
    V208,
    V240,
    V480,
}

impl ServiceVoltage {
    pub fn volts(&self) -> f64 {
        match self {
            ServiceVoltage::V208 => 208.0,
            ServiceVoltage::V240 => 240.0,
            ServiceVoltage::V480 => 480.0,
        }
    }

    /// Whether the voltage/phase combination is a real service configuration
    pub fn supports(&self, phase: Phase) -> bool {
        !matches!((self, phase), (ServiceVoltage::V480, Phase::Single))
    }
}

impl TryFrom<u32> for ServiceVoltage {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            208 => Ok(ServiceVoltage::V208),
            240 => Ok(ServiceVoltage::V240),
            480 => Ok(ServiceVoltage::V480),
            other => Err(format!(
                "Unsupported service voltage: {}V (expected 208, 240 or 480)",
                other
            )),
        }
    }
}

impl From<ServiceVoltage> for u32 {
    fn from(voltage: ServiceVoltage) -> Self {
        match voltage {
            ServiceVoltage::V208 => 208,
            ServiceVoltage::V240 => 240,
            ServiceVoltage::V480 => 480,
        }
    }
}

impl fmt::Display for ServiceVoltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}V", u32::from(*self))
    }
}
