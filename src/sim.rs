use std::time::Duration;

use bevy::prelude::*;

use crate::drivetrain::Drivetrain;
use crate::engine::{Engine, EngineSpec, FuelSystem};
use crate::powertrain::Powertrain;

pub const TICK_HZ: f64 = 60.0;

pub struct SimPlugin;
impl Plugin for SimPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(TICK_HZ))
            .init_resource::<SimSettings>()
            .init_resource::<ThrottlePedal>()
            .add_event::<ShiftRequest>()
            .add_event::<ResetEvent>()
            .add_systems(Startup, spawn_powertrain)
            .add_systems(Update, handle_reset)
            .add_systems(
                FixedUpdate,
                (apply_shift_requests, apply_throttle, advance_powertrain).chain(),
            );
    }
}

#[derive(Resource, Clone)]
pub struct SimSettings {
    pub preset: Preset,
    pub running: bool,
    pub show_help: bool,
    pub show_diagnostics: bool,
}
impl Default for SimSettings {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            running: true,
            show_help: true,
            show_diagnostics: false,
        }
    }
}

// `None` means the pedal is released and the throttle decays on its own.
#[derive(Resource, Default)]
pub struct ThrottlePedal(pub Option<f64>);

#[derive(Event, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ShiftRequest {
    Up,
    Down,
}

#[derive(Event, Default)]
pub struct ResetEvent;

#[derive(Resource, Deref, DerefMut)]
pub struct Rig(pub Powertrain);

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Preset {
    #[default]
    YarisHybrid,
    SkyactivG,
}

impl Preset {
    pub fn label(&self) -> &'static str {
        match self {
            Preset::YarisHybrid => "Toyota M15A-FXE",
            Preset::SkyactivG => "Mazda SkyActiv-G 2.0",
        }
    }

    pub fn build(&self) -> Powertrain {
        let (spec, gear_ratios, final_drive, tire_size) = match self {
            Preset::YarisHybrid => (
                EngineSpec {
                    name: "M15A-FXE".to_string(),
                    manufacturer: "Toyota".to_string(),
                    description: "1.5L three-cylinder".to_string(),
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
                    clutch_response: Duration::from_millis(250),
                },
                vec![3.545, 1.913, 1.310, 1.027, 0.850],
                4.294,
                "195/55R16",
            ),
            Preset::SkyactivG => (
                EngineSpec {
                    name: "SkyActiv-G 2.0".to_string(),
                    manufacturer: "Mazda".to_string(),
                    description: "2.0L four-cylinder".to_string(),
                    cylinders: 4,
                    displacement_cc: 1998,
                    bore_mm: 83.5,
                    stroke_mm: 91.2,
                    compression_ratio: 13.0,
                    max_rpm: 6000,
                    max_horsepower: 155.0,
                    max_kw: 114.0,
                    max_torque_nm: 200.0,
                    octane_ron: 85,
                    fuel_system: FuelSystem::DirectInjection,
                    peak_torque_rpm: 4000,
                    peak_hp_rpm: 6000,
                    clutch_response: Duration::from_millis(250),
                },
                vec![3.454, 2.043, 1.308, 1.0, 0.759, 0.634],
                3.636,
                "195/50R16",
            ),
        };

        let engine = Engine::new(spec).expect("preset engine spec is valid");
        let drivetrain = Drivetrain::new(gear_ratios, final_drive, tire_size)
            .expect("preset drivetrain spec is valid");
        Powertrain::new(engine, drivetrain)
    }
}

fn spawn_powertrain(mut commands: Commands, settings: Res<SimSettings>) {
    let rig = settings.preset.build();
    info!(
        "powertrain ready: {} {}, {} gears, redline {} rpm",
        rig.engine().spec().manufacturer,
        rig.engine().spec().name,
        rig.drivetrain().gear_count(),
        rig.engine().spec().max_rpm,
    );
    commands.insert_resource(Rig(rig));
}

fn handle_reset(
    mut resets: EventReader<ResetEvent>,
    mut commands: Commands,
    mut pedal: ResMut<ThrottlePedal>,
    settings: Res<SimSettings>,
) {
    if resets.read().last().is_none() {
        return;
    }
    pedal.0 = None;
    info!("resetting to {}", settings.preset.label());
    commands.insert_resource(Rig(settings.preset.build()));
}

fn apply_shift_requests(
    mut requests: EventReader<ShiftRequest>,
    mut rig: ResMut<Rig>,
    settings: Res<SimSettings>,
) {
    if !settings.running {
        requests.clear();
        return;
    }
    for request in requests.read() {
        let before = rig.drivetrain().current_gear();
        match request {
            ShiftRequest::Up => rig.shift_up(),
            ShiftRequest::Down => rig.shift_down(),
        }
        let after = rig.drivetrain().current_gear();
        if after != before {
            debug!("shifted {before} -> {after}");
        }
    }
}

fn apply_throttle(
    mut pedal: ResMut<ThrottlePedal>,
    mut rig: ResMut<Rig>,
    settings: Res<SimSettings>,
) {
    if !settings.running {
        return;
    }
    match pedal.0.take() {
        Some(throttle) => rig.set_throttle(throttle),
        None => rig.decay_throttle(),
    }
}

fn advance_powertrain(time: Res<Time>, mut rig: ResMut<Rig>, settings: Res<SimSettings>) {
    if !settings.running {
        return;
    }
    if let Err(err) = rig.tick(time.delta()) {
        error!("powertrain tick failed: {err}");
    }
}
