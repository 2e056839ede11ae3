use gb_core::{ControlCommand, EnvVariable, Environment};
use gb_sim::{PlantParams, PlantSimulator, SimError};
use proptest::prelude::*;

#[test]
fn idle_pump_dries_soil_to_floor() {
    let mut sim = PlantSimulator::with_environment(
        PlantParams::default(),
        Environment {
            moisture: 12.0,
            ..Environment::default()
        },
    )
    .expect("valid plant");

    let idle = ControlCommand::off();
    let mut last = sim.environment().moisture;
    for _ in 0..200 {
        let env = sim.step(1.0, &idle).expect("step");
        assert!(env.moisture <= last);
        assert!(env.moisture >= 0.0);
        last = env.moisture;
    }
    assert_eq!(last, 0.0);
}

#[test]
fn same_seed_same_trajectory() {
    let params = PlantParams {
        seed: 42,
        sensor_noise: 1.0,
        ..PlantParams::default()
    };
    let mut a = PlantSimulator::new(params.clone()).expect("valid plant");
    let mut b = PlantSimulator::new(params).expect("valid plant");
    let commands = [
        ControlCommand::new(300, 800, true, 64),
        ControlCommand::new(0, 40, false, 64),
        ControlCommand::off(),
    ];
    for i in 0..90 {
        let cmd = &commands[i % commands.len()];
        assert_eq!(a.step(0.5, cmd).expect("step"), b.step(0.5, cmd).expect("step"));
        assert_eq!(a.sense(), b.sense());
    }
}

#[test]
fn different_seeds_diverge() {
    let mut a = PlantSimulator::new(PlantParams {
        seed: 1,
        ..PlantParams::default()
    })
    .expect("valid plant");
    let mut b = PlantSimulator::new(PlantParams {
        seed: 2,
        ..PlantParams::default()
    })
    .expect("valid plant");
    for _ in 0..10 {
        a.step(1.0, &ControlCommand::off()).expect("step");
        b.step(1.0, &ControlCommand::off()).expect("step");
    }
    assert_ne!(a.environment().humd_inner, b.environment().humd_inner);
}

#[test]
fn set_variable_round_trips() {
    let mut sim = PlantSimulator::new(PlantParams::default()).expect("valid plant");
    for var in EnvVariable::ALL {
        let env = sim.set_variable(var.as_str(), 42.25).expect("known key");
        assert_eq!(env.get(var), 42.25);
        assert_eq!(sim.environment().get(var), 42.25);
    }
}

#[test]
fn set_variable_rejects_unknown_key_without_mutation() {
    let mut sim = PlantSimulator::new(PlantParams::default()).expect("valid plant");
    let before = sim.environment().clone();
    let err = sim.set_variable("co2", 400.0).unwrap_err();
    assert_eq!(
        err,
        SimError::UnknownVariable {
            key: "co2".to_string()
        }
    );
    assert!(sim.set_variable("moisture", f64::NAN).is_err());
    assert_eq!(sim.environment(), &before);
}

proptest! {
    #[test]
    fn environment_stays_bounded(
        steps in prop::collection::vec((0u16..=1023, 0u16..=1023, any::<bool>(), 0.1f64..10.0), 1..80),
        seed in any::<u64>()
    ) {
        let mut sim = PlantSimulator::new(PlantParams { seed, ..PlantParams::default() }).unwrap();
        for (pump, peltier, forward, dt) in steps {
            let env = sim.step(dt, &ControlCommand::new(pump, peltier, forward, 64)).unwrap();
            prop_assert!(env.is_finite());
            prop_assert!((0.0..=100.0).contains(&env.moisture));
            prop_assert!((0.0..=100.0).contains(&env.humd_inner));
            prop_assert!((0.0..=100.0).contains(&env.humd_outer));
            prop_assert!(env.illumination >= 0.0);
        }
    }
}
