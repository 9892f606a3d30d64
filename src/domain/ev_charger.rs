use serde::{Deserialize, Serialize};
use strum::Display;
use validator::Validate;

/// Charger level requested by the owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ChargerLevel {
    #[strum(to_string = "Level 1")]
    Level1,
    #[default]
    #[strum(to_string = "Level 2")]
    Level2,
}

impl ChargerLevel {
    /// Typical nameplate current when none is supplied
    pub fn default_amps(&self) -> f64 {
        match self {
            ChargerLevel::Level1 => 16.0,
            ChargerLevel::Level2 => 48.0,
        }
    }
}

/// Hardware class inferred from per-charger current; drives the EV panel template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ChargerClass {
    /// Up to 48 A (40 A/48 A wall units)
    #[strum(to_string = "Level 2 (≤48A)")]
    Standard,
    /// Up to 80 A (high-power Level 2)
    #[strum(to_string = "Level 2 (≤80A)")]
    HighPower,
    #[strum(to_string = "DC Fast")]
    DcFast,
}

impl ChargerClass {
    pub fn from_amps(amps: f64) -> Self {
        if amps <= 48.0 {
            ChargerClass::Standard
        } else if amps <= 80.0 {
            ChargerClass::HighPower
        } else {
            ChargerClass::DcFast
        }
    }
}

/// Requested EV charging build-out
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EvChargerRequest {
    #[validate(range(max = 5000))]
    pub charger_count: u32,
    #[serde(default)]
    pub level: ChargerLevel,
    #[validate(range(min = 1.0, max = 500.0))]
    #[serde(default)]
    pub amps_per_charger: Option<f64>,
}

impl EvChargerRequest {
    pub fn new(charger_count: u32, level: ChargerLevel, amps_per_charger: f64) -> Self {
        Self {
            charger_count,
            level,
            amps_per_charger: Some(amps_per_charger),
        }
    }

    pub fn amps(&self) -> f64 {
        self.amps_per_charger
            .filter(|a| a.is_finite() && *a > 0.0)
            .unwrap_or_else(|| self.level.default_amps())
    }

    pub fn class(&self) -> ChargerClass {
        ChargerClass::from_amps(self.amps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_amps_by_level() {
        let req = EvChargerRequest {
            charger_count: 4,
            level: ChargerLevel::Level1,
            amps_per_charger: None,
        };
        assert_eq!(req.amps(), 16.0);

        let req = EvChargerRequest {
            charger_count: 4,
            level: ChargerLevel::Level2,
            amps_per_charger: None,
        };
        assert_eq!(req.amps(), 48.0);
    }

    #[test]
    fn test_charger_class_breakpoints() {
        assert_eq!(ChargerClass::from_amps(32.0), ChargerClass::Standard);
        assert_eq!(ChargerClass::from_amps(48.0), ChargerClass::Standard);
        assert_eq!(ChargerClass::from_amps(64.0), ChargerClass::HighPower);
        assert_eq!(ChargerClass::from_amps(80.0), ChargerClass::HighPower);
        assert_eq!(ChargerClass::from_amps(125.0), ChargerClass::DcFast);
    }

    #[test]
    fn test_amps_out_of_range_rejected() {
        let req = EvChargerRequest::new(2, ChargerLevel::Level2, 900.0);
        assert!(req.validate().is_err());
    }
}
