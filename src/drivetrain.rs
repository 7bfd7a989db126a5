//! Gearbox and wheels: the gear ratio table, tire geometry, and the
//! engine-RPM to road-speed conversion.

use std::f64::consts::TAU;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrivetrainError {
    #[error("invalid drivetrain spec: {0}")]
    InvalidSpec(String),
    #[error("invalid tire size format: {0:?} (expected \"<width>/<aspect>R<diameter>\")")]
    InvalidTireSizeFormat(String),
}

pub struct Drivetrain {
    gear_ratios: Vec<f64>,
    final_drive_ratio: f64,
    tire_radius_m: f64,
    // 1-based, always within [1, gear_ratios.len()].
    current_gear: usize,
}

impl Drivetrain {
    pub fn new(
        gear_ratios: Vec<f64>,
        final_drive_ratio: f64,
        tire_size: &str,
    ) -> Result<Self, DrivetrainError> {
        if gear_ratios.is_empty() {
            return Err(DrivetrainError::InvalidSpec(
                "gear ratio list is empty".into(),
            ));
        }
        if let Some(ratio) = gear_ratios.iter().find(|ratio| **ratio <= 0.0) {
            return Err(DrivetrainError::InvalidSpec(format!(
                "gear ratio {ratio} is not positive"
            )));
        }
        if final_drive_ratio <= 0.0 {
            return Err(DrivetrainError::InvalidSpec(format!(
                "final drive ratio {final_drive_ratio} is not positive"
            )));
        }
        let tire_radius_m = tire_radius_from_size(tire_size)?;
        Ok(Self {
            gear_ratios,
            final_drive_ratio,
            tire_radius_m,
            current_gear: 1,
        })
    }

    /// No-op in the top gear.
    pub fn shift_up(&mut self) {
        if self.current_gear < self.gear_ratios.len() {
            self.current_gear += 1;
        }
    }

    /// No-op in first gear.
    pub fn shift_down(&mut self) {
        if self.current_gear > 1 {
            self.current_gear -= 1;
        }
    }

    pub fn current_gear(&self) -> usize {
        self.current_gear
    }

    pub fn gear_count(&self) -> usize {
        self.gear_ratios.len()
    }

    pub fn current_ratio(&self) -> f64 {
        self.gear_ratios[self.current_gear - 1]
    }

    pub fn final_drive_ratio(&self) -> f64 {
        self.final_drive_ratio
    }

    pub fn tire_radius_m(&self) -> f64 {
        self.tire_radius_m
    }

    /// Road speed in km/h at the given engine speed, through the current
    /// gear and the final drive.
    pub fn speed_kmh(&self, engine_rpm: u32) -> f64 {
        f64::from(engine_rpm) * self.tire_radius_m * TAU * 60.0
            / (self.final_drive_ratio * self.current_ratio() * 1000.0)
    }
}

/// Parse a `"<width>/<aspect>R<diameter>"` descriptor (mm / percent /
/// inches) into a rolling radius in meters.
fn tire_radius_from_size(tire_size: &str) -> Result<f64, DrivetrainError> {
    let err = || DrivetrainError::InvalidTireSizeFormat(tire_size.to_string());
    let (width, rest) = tire_size.split_once('/').ok_or_else(err)?;
    let (aspect, diameter) = rest.split_once('R').ok_or_else(err)?;
    // Width and aspect must still be numeric for the descriptor to be valid.
    width.trim().parse::<u32>().map_err(|_| err())?;
    aspect.trim().parse::<u32>().map_err(|_| err())?;
    let diameter: u32 = diameter.trim().parse().map_err(|_| err())?;
    // The radius comes from the rim diameter alone; the sidewall profile is
    // not part of the formula.
    Ok(f64::from(diameter) * 25.4 / 2.0 / 1000.0)
}
