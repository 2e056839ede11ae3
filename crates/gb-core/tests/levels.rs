use gb_core::{ControlCommand, LEVEL_MAX, level_from_effort};
use proptest::prelude::*;

proptest! {
    #[test]
    fn any_effort_maps_into_range(effort in prop::num::f64::ANY) {
        let level = level_from_effort(effort);
        prop_assert!(level <= LEVEL_MAX);
    }

    #[test]
    fn fan_is_derived_from_peltier(
        pump in any::<u16>(),
        peltier in any::<u16>(),
        forward in any::<bool>(),
        cutoff in 0u16..=LEVEL_MAX
    ) {
        let cmd = ControlCommand::new(pump, peltier, forward, cutoff);
        prop_assert!(cmd.is_consistent(cutoff));
        prop_assert_eq!(cmd.fan_level == LEVEL_MAX, cmd.peltier_level >= cutoff);
        prop_assert_eq!(cmd.is_forward(), forward);
    }
}

#[test]
fn command_json_shape() {
    let cmd = ControlCommand::new(12, 700, false, 64);
    let json = serde_json::to_value(cmd).unwrap();
    assert_eq!(json["pump_level"], 12);
    assert_eq!(json["peltier_level"], 700);
    assert_eq!(json["peltier_forward"], 0);
    assert_eq!(json["fan_level"], 1023);
}
