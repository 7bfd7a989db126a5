use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPlugin};

use crate::sim::{Preset, ResetEvent, Rig, ShiftRequest, SimSettings, ThrottlePedal};

// Red band starts at this fraction of max RPM.
const REDLINE_FRACTION: f32 = 0.85;

pub struct UiPlugin;
impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin)
            .add_systems(Update, dashboard_ui);
    }
}

fn dashboard_ui(
    mut contexts: EguiContexts,
    mut settings: ResMut<SimSettings>,
    mut pedal: ResMut<ThrottlePedal>,
    mut shifts: EventWriter<ShiftRequest>,
    mut resets: EventWriter<ResetEvent>,
    rig: Res<Rig>,
    diagnostics: Res<DiagnosticsStore>,
) {
    let engine = rig.engine();
    let drivetrain = rig.drivetrain();

    egui::Window::new("Dashboard").show(contexts.ctx_mut(), |ui| {
        draw_rpm_gauge(
            ui,
            engine.current_rpm() as f32,
            engine.spec().max_rpm as f32,
        );

        ui.separator();

        ui.label(format!("RPM: {}", engine.current_rpm()));
        ui.label(format!("HP: {:.2}", engine.horsepower()));
        ui.label(format!("Torque: {:.2} Nm", engine.torque_nm()));
        ui.label(format!("Speed: {:.2} km/h", rig.speed_kmh()));
        ui.label(format!(
            "Gear: {} / {}{}",
            drivetrain.current_gear(),
            drivetrain.gear_count(),
            if engine.clutch_engaged() {
                "  (clutch in)"
            } else {
                ""
            }
        ));
        ui.label(format!("Throttle: {:.2}", engine.throttle()));

        ui.separator();

        let mut throttle = engine.throttle() as f32;
        let slider = ui.add(egui::Slider::new(&mut throttle, 0.0..=1.0).text("Throttle"));
        if slider.dragged() || slider.changed() {
            pedal.0 = Some(f64::from(throttle));
        }

        ui.horizontal(|ui| {
            if ui.button("Shift up").clicked() {
                shifts.send(ShiftRequest::Up);
            }
            if ui.button("Shift down").clicked() {
                shifts.send(ShiftRequest::Down);
            }
            ui.checkbox(&mut settings.running, "Running");
        });

        ui.separator();

        let mut selected = settings.preset;
        egui::ComboBox::from_label("Vehicle")
            .selected_text(selected.label())
            .show_ui(ui, |ui| {
                for preset in [Preset::YarisHybrid, Preset::SkyactivG] {
                    ui.selectable_value(&mut selected, preset, preset.label());
                }
            });
        if selected != settings.preset {
            settings.preset = selected;
            resets.send(ResetEvent::default());
        }
    });

    egui::Window::new("Engine").show(contexts.ctx_mut(), |ui| {
        let spec = engine.spec();
        ui.label(format!("{} {}", spec.manufacturer, spec.name));
        if !spec.description.is_empty() {
            ui.label(&spec.description);
        }
        ui.separator();
        ui.label(format!(
            "{} cylinders, {} cc",
            spec.cylinders, spec.displacement_cc
        ));
        ui.label(format!(
            "Bore x stroke: {:.1} x {:.1} mm",
            spec.bore_mm, spec.stroke_mm
        ));
        ui.label(format!("Compression: {:.1}:1", spec.compression_ratio));
        ui.label(format!(
            "Max power: {:.0} hp / {:.0} kW @ {} rpm",
            spec.max_horsepower, spec.max_kw, spec.peak_hp_rpm
        ));
        ui.label(format!(
            "Max torque: {:.0} Nm @ {} rpm",
            spec.max_torque_nm, spec.peak_torque_rpm
        ));
        ui.label(format!(
            "Fuel: {} (RON {})",
            spec.fuel_system, spec.octane_ron
        ));
        ui.separator();
        if let Some(ratio) = engine.gear_ratio() {
            ui.label(format!("Gear ratio: {ratio:.3}"));
        }
        ui.label(format!("Final drive: {:.3}", drivetrain.final_drive_ratio()));
        ui.label(format!("Tire radius: {:.4} m", drivetrain.tire_radius_m()));
    });

    if settings.show_help {
        egui::Window::new("Help").show(contexts.ctx_mut(), |ui| {
            ui.label("Drag slider / hold W: Throttle");
            ui.label("Up/Down: Shift gears");
            ui.label("Space: Pause Simulation");
            ui.label("R: Reset Vehicle");
            ui.label("H: Toggle Help");
            ui.label("F3: Toggle Diagnostics");
        });
    }

    if settings.show_diagnostics {
        egui::Window::new("Diagnostics").show(contexts.ctx_mut(), |ui| {
            if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
                if let Some(value) = fps.smoothed() {
                    ui.label(format!("FPS: {:.1}", value));
                }
            }
        });
    }
}

// Semicircular gauge: ticks every 500 rpm, red band past 85% of max, needle
// from the hub, current RPM under the hub.
fn draw_rpm_gauge(ui: &mut egui::Ui, rpm: f32, max_rpm: f32) {
    use std::f32::consts::PI;

    let (rect, _) = ui.allocate_exact_size(egui::vec2(230.0, 150.0), egui::Sense::hover());
    let painter = ui.painter_at(rect);
    let center = egui::pos2(rect.center().x, rect.bottom() - 26.0);
    let radius = rect.width() * 0.42;

    // The sweep runs 180..0 degrees, left to right; screen y points down.
    let direction = |fraction: f32| {
        let angle = PI * (1.0 - fraction);
        egui::vec2(angle.cos(), -angle.sin())
    };

    painter.circle_filled(center, radius + 10.0, egui::Color32::from_gray(25));
    painter.circle_stroke(
        center,
        radius + 10.0,
        egui::Stroke::new(2.0, egui::Color32::WHITE),
    );

    let mut mark = 0.0;
    while mark <= max_rpm {
        let fraction = mark / max_rpm;
        let dir = direction(fraction);
        let thousands = (mark as u32) % 1000 == 0;
        let length = if thousands { 12.0 } else { 6.0 };
        let color = if fraction >= REDLINE_FRACTION {
            egui::Color32::RED
        } else {
            egui::Color32::WHITE
        };
        painter.line_segment(
            [center + dir * (radius - length), center + dir * radius],
            egui::Stroke::new(if thousands { 2.0 } else { 1.0 }, color),
        );
        if thousands {
            painter.text(
                center + dir * (radius - 22.0),
                egui::Align2::CENTER_CENTER,
                format!("{}", mark as u32 / 1000),
                egui::FontId::proportional(12.0),
                egui::Color32::WHITE,
            );
        }
        mark += 500.0;
    }

    let dir = direction((rpm / max_rpm).clamp(0.0, 1.0));
    painter.line_segment(
        [center, center + dir * (radius - 14.0)],
        egui::Stroke::new(3.0, egui::Color32::RED),
    );
    painter.circle_filled(center, 5.0, egui::Color32::RED);

    painter.text(
        center + egui::vec2(0.0, 16.0),
        egui::Align2::CENTER_CENTER,
        format!("{} RPM", rpm as u32),
        egui::FontId::proportional(14.0),
        egui::Color32::WHITE,
    );
}
