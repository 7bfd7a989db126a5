//! Couples the engine to the gearbox. All gear changes go through here, so
//! the engine's rate coefficient can never drift out of step with the
//! gearbox's current ratio.

use std::time::Duration;

use crate::drivetrain::Drivetrain;
use crate::engine::{Engine, EngineError};

pub struct Powertrain {
    engine: Engine,
    drivetrain: Drivetrain,
}

impl Powertrain {
    /// The engine picks up the gearbox's current ratio immediately, so a
    /// freshly built powertrain is always safe to tick.
    pub fn new(engine: Engine, drivetrain: Drivetrain) -> Self {
        let mut powertrain = Self { engine, drivetrain };
        let ratio = powertrain.drivetrain.current_ratio();
        powertrain.engine.set_gear_ratio(ratio);
        powertrain
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn drivetrain(&self) -> &Drivetrain {
        &self.drivetrain
    }

    /// One gear up: move the gearbox, re-couple the engine to the new
    /// ratio, and push the clutch in for the shift. No-op in top gear.
    pub fn shift_up(&mut self) {
        let before = self.drivetrain.current_gear();
        self.drivetrain.shift_up();
        if self.drivetrain.current_gear() != before {
            self.recouple();
        }
    }

    /// One gear down. No-op in first gear.
    pub fn shift_down(&mut self) {
        let before = self.drivetrain.current_gear();
        self.drivetrain.shift_down();
        if self.drivetrain.current_gear() != before {
            self.recouple();
        }
    }

    fn recouple(&mut self) {
        self.engine.set_gear_ratio(self.drivetrain.current_ratio());
        self.engine.engage_clutch();
    }

    pub fn set_throttle(&mut self, throttle: f64) {
        self.engine.set_throttle(throttle);
    }

    pub fn decay_throttle(&mut self) {
        self.engine.decay_throttle();
    }

    /// Advance the pair by one tick.
    pub fn tick(&mut self, dt: Duration) -> Result<(), EngineError> {
        self.engine.update(dt)
    }

    /// Road speed at the engine's current RPM.
    pub fn speed_kmh(&self) -> f64 {
        self.drivetrain.speed_kmh(self.engine.current_rpm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineSpec, FuelSystem};
    use pretty_assertions::assert_eq;

    const DT: Duration = Duration::from_millis(16);

    fn spec() -> EngineSpec {
        EngineSpec {
            name: "M15A-FXE".into(),
            manufacturer: "Toyota".into(),
            description: "1.5L three-cylinder".into(),
            cylinders: 3,
            displacement_cc: 1490,
            bore_mm: 80.5,
            stroke_mm: 97.6,
            compression_ratio: 14.0,
            max_rpm: 5500,
            max_horsepower: 91.0,
            max_kw: 67.0,
            max_torque_nm: 120.0,
            octane_ron: 91,
            fuel_system: FuelSystem::Efi,
            peak_torque_rpm: 4800,
            peak_hp_rpm: 5500,
            clutch_response: Duration::from_millis(200),
        }
    }

    fn powertrain() -> Powertrain {
        let engine = Engine::new(spec()).unwrap();
        let drivetrain = Drivetrain::new(
            vec![3.545, 1.913, 1.310, 1.027, 0.850],
            4.294,
            "195/55R16",
        )
        .unwrap();
        Powertrain::new(engine, drivetrain)
    }

    #[test]
    fn construction_couples_the_first_gear_ratio() {
        let mut powertrain = powertrain();
        assert_eq!(powertrain.engine().gear_ratio(), Some(3.545));
        // Safe to tick straight away.
        powertrain.tick(DT).unwrap();
    }

    #[test]
    fn an_uncoupled_engine_refuses_to_tick() {
        let mut engine = Engine::new(spec()).unwrap();
        assert_eq!(engine.update(DT), Err(EngineError::GearRatioUnset));
    }

    #[test]
    fn a_shift_moves_gear_ratio_and_clutch_together() {
        let mut powertrain = powertrain();
        powertrain.shift_up();
        assert_eq!(powertrain.drivetrain().current_gear(), 2);
        assert_eq!(powertrain.engine().gear_ratio(), Some(1.913));
        assert!(powertrain.engine().clutch_engaged());
    }

    #[test]
    fn a_blocked_shift_changes_nothing() {
        let mut powertrain = powertrain();
        powertrain.shift_down();
        assert_eq!(powertrain.drivetrain().current_gear(), 1);
        assert_eq!(powertrain.engine().gear_ratio(), Some(3.545));
        assert!(!powertrain.engine().clutch_engaged());
    }

    #[test]
    fn shifting_cuts_the_throttle_for_the_dwell() {
        let mut powertrain = powertrain();
        powertrain.set_throttle(0.8);
        powertrain.shift_up();
        powertrain.tick(DT).unwrap();
        assert_eq!(powertrain.engine().throttle(), 0.0);
    }

    #[test]
    fn full_throttle_run_through_first_gear() {
        let mut powertrain = powertrain();
        powertrain.set_throttle(1.0);

        let mut peak_torque: f64 = 0.0;
        for _ in 0..5000 {
            powertrain.set_throttle(1.0);
            powertrain.tick(DT).unwrap();
            let engine = powertrain.engine();
            assert!(engine.torque_nm() >= 36.0 - 1e-9);
            assert!(engine.horsepower() <= 91.0);
            peak_torque = peak_torque.max(engine.torque_nm());
        }

        let engine = powertrain.engine();
        assert!(engine.current_rpm() > 5400);
        // The tick step can straddle the exact peak; the closest sample
        // still has to come within a few Nm of it.
        assert!(peak_torque > 115.0, "torque never came near its peak");
        // Near redline the curve has fallen back to its floor.
        assert!((engine.torque_nm() - 36.0).abs() < 1.0);
        assert!(powertrain.speed_kmh() > 25.0);
    }

    #[test]
    fn speed_readout_matches_the_drivetrain_formula() {
        let powertrain = powertrain();
        let rpm = powertrain.engine().current_rpm();
        assert_eq!(
            powertrain.speed_kmh(),
            powertrain.drivetrain().speed_kmh(rpm)
        );
    }
}
