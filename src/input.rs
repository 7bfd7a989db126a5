use bevy::prelude::*;

use crate::sim::{ResetEvent, Rig, ShiftRequest, SimSettings, ThrottlePedal};

// Throttle opened per second while the pedal key is held.
const PEDAL_RAMP_PER_SEC: f64 = 0.8;

pub struct InputPlugin;
impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                shift_keys,
                pedal_key,
                pause_toggle,
                reset_trigger,
                help_toggle,
                diagnostics_toggle,
            ),
        );
    }
}

fn shift_keys(keys: Res<ButtonInput<KeyCode>>, mut shifts: EventWriter<ShiftRequest>) {
    if keys.just_pressed(KeyCode::ArrowUp) {
        shifts.send(ShiftRequest::Up);
    }
    if keys.just_pressed(KeyCode::ArrowDown) {
        shifts.send(ShiftRequest::Down);
    }
}

fn pedal_key(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    rig: Res<Rig>,
    mut pedal: ResMut<ThrottlePedal>,
) {
    if keys.pressed(KeyCode::KeyW) {
        let dt = f64::from(time.delta_seconds());
        let throttle = rig.engine().throttle() + PEDAL_RAMP_PER_SEC * dt;
        pedal.0 = Some(throttle.min(1.0));
    }
}

fn pause_toggle(mut settings: ResMut<SimSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::Space) {
        settings.running = !settings.running;
    }
}

fn reset_trigger(mut resets: EventWriter<ResetEvent>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyR) {
        resets.send(ResetEvent::default());
    }
}

fn help_toggle(mut settings: ResMut<SimSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyH) {
        settings.show_help = !settings.show_help;
    }
}

fn diagnostics_toggle(mut settings: ResMut<SimSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::F3) {
        settings.show_diagnostics = !settings.show_diagnostics;
    }
}
