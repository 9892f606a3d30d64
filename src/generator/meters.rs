use crate::nec::tables::{MAX_METER_POSITIONS, METER_SPARE_FRACTION};

use super::graph::{MeterDescriptor, MeterKind, PanelRef};

/// Meter positions: one per dwelling, house, EV, plus 10% spare
pub fn meter_positions(dwelling_units: u32, has_ev_meter: bool) -> u32 {
    let required = dwelling_units + 1 + u32::from(has_ev_meter);
    let with_spare = (required as f64 * (1.0 + METER_SPARE_FRACTION)).ceil() as u32;
    with_spare.min(MAX_METER_POSITIONS)
}

/// One meter per generated unit panel, then house and EV
pub fn meters_for(unit_panels: usize, has_ev_meter: bool) -> Vec<MeterDescriptor> {
    let mut meters: Vec<MeterDescriptor> = (0..unit_panels)
        .map(|index| MeterDescriptor {
            meter_number: format!("M-U{:03}", index + 1),
            kind: MeterKind::Unit,
            panel: PanelRef::Unit(index),
        })
        .collect();

    meters.push(MeterDescriptor {
        meter_number: "M-HOUSE".to_string(),
        kind: MeterKind::House,
        panel: PanelRef::House,
    });
    if has_ev_meter {
        meters.push(MeterDescriptor {
            meter_number: "M-EV".to_string(),
            kind: MeterKind::Ev,
            panel: PanelRef::Ev,
        });
    }
    meters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_include_spare() {
        // (20 + 2) x 1.1 = 24.2
        assert_eq!(meter_positions(20, true), 25);
        assert_eq!(meter_positions(20, false), 24);
    }

    #[test]
    fn test_positions_capped() {
        assert_eq!(meter_positions(400, true), 200);
    }

    #[test]
    fn test_meter_refs() {
        let meters = meters_for(3, true);
        assert_eq!(meters.len(), 5);
        assert_eq!(meters[2].panel, PanelRef::Unit(2));
        assert_eq!(meters[2].meter_number, "M-U003");
        assert_eq!(meters[4].panel, PanelRef::Ev);
    }
}
