//! Engine model: turns throttle position into crankshaft speed, torque,
//! and power, one tick at a time.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Idle floor in RPM. The crankshaft never drops below this while running.
pub const IDLE_RPM: f64 = 700.0;

const BASE_INCREASE_RATE: f64 = 0.03;
const THROTTLE_DECAY_RATE: f64 = 0.02;
const TORQUE_FLOOR_FRACTION: f64 = 0.3;
const NM_TO_FT_LB: f64 = 0.737562;
// hp = torque[ft·lb] * rpm / 5252
const HP_CONSTANT: f64 = 5252.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid engine spec: {0}")]
    InvalidSpec(String),
    #[error("no gear ratio has been coupled into the engine")]
    GearRatioUnset,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FuelSystem {
    Efi,
    DirectInjection,
    Carburettor,
}

impl fmt::Display for FuelSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuelSystem::Efi => write!(f, "EFI"),
            FuelSystem::DirectInjection => write!(f, "direct injection"),
            FuelSystem::Carburettor => write!(f, "carburettor"),
        }
    }
}

/// Static specification of one physical engine. Immutable once the engine
/// is built.
#[derive(Clone, Debug)]
pub struct EngineSpec {
    pub name: String,
    pub manufacturer: String,
    pub description: String,
    pub cylinders: u32,
    pub displacement_cc: u32,
    pub bore_mm: f64,
    pub stroke_mm: f64,
    pub compression_ratio: f64,
    pub max_rpm: u32,
    pub max_horsepower: f64,
    pub max_kw: f64,
    pub max_torque_nm: f64,
    pub octane_ron: u32,
    pub fuel_system: FuelSystem,
    pub peak_torque_rpm: u32,
    pub peak_hp_rpm: u32,
    pub clutch_response: Duration,
}

impl EngineSpec {
    fn validate(&self) -> Result<(), EngineError> {
        if self.max_rpm == 0 {
            return Err(EngineError::InvalidSpec("max_rpm must be positive".into()));
        }
        if self.peak_torque_rpm == 0 {
            return Err(EngineError::InvalidSpec(
                "peak_torque_rpm must be positive".into(),
            ));
        }
        if self.peak_torque_rpm > self.max_rpm {
            return Err(EngineError::InvalidSpec(format!(
                "peak_torque_rpm {} exceeds max_rpm {}",
                self.peak_torque_rpm, self.max_rpm
            )));
        }
        Ok(())
    }
}

pub struct Engine {
    spec: EngineSpec,
    hp: f64,
    torque_nm: f64,
    // Kept as f64 so fractional per-tick increments accumulate instead of
    // truncating away; exposed as an integer.
    rpm: f64,
    throttle: f64,
    throttle_decay_rate: f64,
    increase_rate: f64,
    base_increase_rate: f64,
    gear_ratio: Option<f64>,
    // Dwell elapsed so far while the clutch is in; `None` when released.
    clutch: Option<Duration>,
}

impl Engine {
    pub fn new(spec: EngineSpec) -> Result<Self, EngineError> {
        spec.validate()?;
        Ok(Self {
            spec,
            hp: 0.0,
            torque_nm: 0.0,
            rpm: IDLE_RPM,
            throttle: 0.0,
            throttle_decay_rate: THROTTLE_DECAY_RATE,
            increase_rate: 0.0,
            base_increase_rate: BASE_INCREASE_RATE,
            gear_ratio: None,
            clutch: None,
        })
    }

    pub fn spec(&self) -> &EngineSpec {
        &self.spec
    }

    pub fn current_rpm(&self) -> u32 {
        self.rpm as u32
    }

    pub fn horsepower(&self) -> f64 {
        self.hp
    }

    pub fn torque_nm(&self) -> f64 {
        self.torque_nm
    }

    pub fn throttle(&self) -> f64 {
        self.throttle
    }

    pub fn gear_ratio(&self) -> Option<f64> {
        self.gear_ratio
    }

    pub fn clutch_engaged(&self) -> bool {
        self.clutch.is_some()
    }

    pub fn set_throttle(&mut self, throttle: f64) {
        self.throttle = throttle.clamp(0.0, 1.0);
    }

    /// Pedal released: the throttle springs back a step per tick.
    pub fn decay_throttle(&mut self) {
        self.throttle = (self.throttle - self.throttle_decay_rate).max(0.0);
    }

    /// Push the clutch in. An already-running dwell keeps its elapsed time.
    pub fn engage_clutch(&mut self) {
        self.clutch.get_or_insert(Duration::ZERO);
    }

    /// Couple a gear ratio into the rate calculation. Lower gears carry
    /// larger ratios and spin the engine up faster.
    pub fn set_gear_ratio(&mut self, gear_ratio: f64) {
        self.gear_ratio = Some(gear_ratio);
        self.increase_rate = self.base_increase_rate * gear_ratio / 2.0;
    }

    /// Advance the engine by one tick of `dt`. Chases the throttle- and
    /// gear-derived target RPM, then re-derives torque and horsepower.
    pub fn update(&mut self, dt: Duration) -> Result<(), EngineError> {
        if let Some(dwell) = self.clutch.as_mut() {
            // A clutched engine can't take throttle; it freewheels until
            // the dwell runs out.
            self.throttle = 0.0;
            *dwell += dt;
            // Strictly greater: a dwell of exactly the response time holds on.
            if *dwell > self.spec.clutch_response {
                self.clutch = None;
            }
        }

        let gear_ratio = self.gear_ratio.ok_or(EngineError::GearRatioUnset)?;
        let max_rpm = f64::from(self.spec.max_rpm);
        let target_rpm = (max_rpm * self.throttle * gear_ratio).floor();

        if target_rpm > self.rpm {
            // The climb flattens out quadratically near redline.
            let decay_factor = 1.0 - (self.rpm / max_rpm).powi(2);
            self.rpm += (target_rpm - self.rpm) * self.increase_rate * decay_factor;
            if self.rpm > target_rpm {
                self.rpm = target_rpm;
            }
        } else if self.rpm > IDLE_RPM {
            // Revs bleed off ten times faster while the clutch is in.
            let k = if self.clutch.is_some() { 1.0 } else { 0.1 };
            self.rpm -= (self.rpm - target_rpm) * self.increase_rate * k;
            if self.rpm < IDLE_RPM {
                self.rpm = IDLE_RPM;
            }
        }

        if self.rpm > max_rpm {
            self.rpm = max_rpm;
        }

        // Torque first; the horsepower identity reads it.
        self.update_torque();
        self.update_horsepower();
        Ok(())
    }

    /// Piecewise torque curve: linear ramp up to the torque peak, quadratic
    /// falloff beyond it, floored at 30% of max.
    fn update_torque(&mut self) {
        if self.rpm == 0.0 {
            return;
        }
        let max_torque = self.spec.max_torque_nm;
        let peak_rpm = f64::from(self.spec.peak_torque_rpm);
        let torque = if self.rpm <= peak_rpm {
            max_torque * (self.rpm / peak_rpm)
        } else {
            let span = f64::from(self.spec.max_rpm) - peak_rpm;
            let past_peak = self.rpm - peak_rpm;
            max_torque * (1.0 - (past_peak / span).powi(2))
        };
        self.torque_nm = torque.max(max_torque * TORQUE_FLOOR_FRACTION);
    }

    fn update_horsepower(&mut self) {
        if self.rpm == 0.0 {
            return;
        }
        let torque_ft_lb = self.torque_nm * NM_TO_FT_LB;
        self.hp = (torque_ft_lb * self.rpm / HP_CONSTANT).min(self.spec.max_horsepower);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn engine_in_first() -> Engine {
        let mut engine = Engine::new(spec()).unwrap();
        engine.set_gear_ratio(3.545);
        engine
    }

    #[test]
    fn rejects_zero_max_rpm() {
        let mut bad = spec();
        bad.max_rpm = 0;
        assert!(matches!(
            Engine::new(bad),
            Err(EngineError::InvalidSpec(_))
        ));
    }

    #[test]
    fn rejects_zero_peak_torque_rpm() {
        let mut bad = spec();
        bad.peak_torque_rpm = 0;
        assert!(matches!(
            Engine::new(bad),
            Err(EngineError::InvalidSpec(_))
        ));
    }

    #[test]
    fn rejects_peak_torque_above_redline() {
        let mut bad = spec();
        bad.peak_torque_rpm = 6000;
        assert!(matches!(
            Engine::new(bad),
            Err(EngineError::InvalidSpec(_))
        ));
    }

    #[test]
    fn update_without_a_coupled_ratio_is_an_error() {
        let mut engine = Engine::new(spec()).unwrap();
        engine.set_throttle(0.5);
        assert_eq!(engine.update(DT), Err(EngineError::GearRatioUnset));
    }

    #[test]
    fn full_throttle_climbs_monotonically_toward_redline() {
        let mut engine = engine_in_first();
        engine.set_throttle(1.0);
        let mut prev = engine.current_rpm();
        for _ in 0..5000 {
            engine.update(DT).unwrap();
            let rpm = engine.current_rpm();
            assert!(rpm >= prev, "rpm fell from {prev} to {rpm}");
            assert!(rpm <= 5500);
            prev = rpm;
        }
        assert!(prev > 5400, "expected near-redline, got {prev}");
    }

    #[test]
    fn partial_throttle_settles_on_the_target() {
        // target = floor(5500 * 0.2 * 1.0) = 1100
        let mut engine = Engine::new(spec()).unwrap();
        engine.set_gear_ratio(1.0);
        engine.set_throttle(0.2);
        for _ in 0..5000 {
            engine.update(DT).unwrap();
            assert!(engine.current_rpm() <= 1100);
        }
        assert!(engine.current_rpm() >= 1099);
    }

    #[test]
    fn closed_throttle_decays_to_the_idle_floor() {
        let mut engine = engine_in_first();
        engine.set_throttle(1.0);
        for _ in 0..1000 {
            engine.update(DT).unwrap();
        }
        engine.set_throttle(0.0);
        for _ in 0..5000 {
            engine.update(DT).unwrap();
            assert!(engine.current_rpm() >= 700);
        }
        assert_eq!(engine.current_rpm(), 700);
    }

    #[test]
    fn torque_ramps_to_the_peak_then_falls_off() {
        let mut engine = engine_in_first();

        engine.rpm = 2400.0;
        engine.update_torque();
        assert!((engine.torque_nm() - 60.0).abs() < 1e-9);

        engine.rpm = 4800.0;
        engine.update_torque();
        assert!((engine.torque_nm() - 120.0).abs() < 1e-9);

        // Past the peak: 1 - ((5150 - 4800) / 700)^2 = 0.75
        engine.rpm = 5150.0;
        engine.update_torque();
        assert!((engine.torque_nm() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn torque_never_falls_below_thirty_percent_of_max() {
        let mut engine = engine_in_first();
        for rpm in (700..=5500).step_by(50) {
            engine.rpm = f64::from(rpm);
            engine.update_torque();
            assert!(
                engine.torque_nm() >= 36.0 - 1e-9,
                "torque {} at {} rpm",
                engine.torque_nm(),
                rpm
            );
        }
    }

    #[test]
    fn horsepower_is_clamped_to_the_spec_maximum() {
        let mut weak = spec();
        weak.max_horsepower = 50.0;
        let mut engine = Engine::new(weak).unwrap();
        engine.set_gear_ratio(3.545);
        // Unclamped: 120 Nm * 0.737562 * 4800 / 5252 ~ 80.9 hp
        engine.rpm = 4800.0;
        engine.update_torque();
        engine.update_horsepower();
        assert!((engine.horsepower() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn clutch_forces_throttle_closed_and_bleeds_revs_ten_times_faster() {
        let mut clutched = engine_in_first();
        let mut released = engine_in_first();
        for engine in [&mut clutched, &mut released] {
            engine.set_throttle(1.0);
            for _ in 0..1000 {
                engine.update(DT).unwrap();
            }
        }
        let start = clutched.rpm;
        assert_eq!(start, released.rpm);

        clutched.engage_clutch();
        released.set_throttle(0.0);
        clutched.update(DT).unwrap();
        released.update(DT).unwrap();

        assert_eq!(clutched.throttle(), 0.0);
        let clutched_drop = start - clutched.rpm;
        let released_drop = start - released.rpm;
        assert!((clutched_drop / released_drop - 10.0).abs() < 1e-9);
    }

    #[test]
    fn clutch_releases_after_the_response_time() {
        let mut engine = engine_in_first();
        engine.engage_clutch();
        // 12 ticks = 192ms of dwell, still short of the 200ms response.
        for _ in 0..12 {
            engine.update(DT).unwrap();
            assert!(engine.clutch_engaged());
        }
        engine.update(DT).unwrap();
        assert!(!engine.clutch_engaged());
    }

    #[test]
    fn clutch_holds_at_exactly_the_response_time() {
        let mut engine = engine_in_first();
        engine.engage_clutch();
        // 4 x 50ms lands the dwell exactly on the 200ms response.
        for _ in 0..4 {
            engine.update(Duration::from_millis(50)).unwrap();
            assert!(engine.clutch_engaged());
        }
        engine.update(Duration::from_millis(50)).unwrap();
        assert!(!engine.clutch_engaged());
    }

    #[test]
    fn released_pedal_decays_the_throttle() {
        let mut engine = engine_in_first();
        engine.set_throttle(0.5);
        engine.decay_throttle();
        assert!((engine.throttle() - 0.48).abs() < 1e-9);
        for _ in 0..30 {
            engine.decay_throttle();
        }
        assert_eq!(engine.throttle(), 0.0);
    }

    #[test]
    fn throttle_input_is_clamped_to_unit_range() {
        let mut engine = engine_in_first();
        engine.set_throttle(1.7);
        assert_eq!(engine.throttle(), 1.0);
        engine.set_throttle(-0.3);
        assert_eq!(engine.throttle(), 0.0);
    }
}
