//! Live tab: voice session controls, status, and the input level meter.

use crate::session::ConnectionStatus;
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, Color32, Pos2, RichText, Stroke, Vec2};

pub struct LivePanel<'a> {
    state: &'a mut AppState,
    theme: &'a Theme,
}

impl<'a> LivePanel<'a> {
    pub fn new(state: &'a mut AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        let Some(session) = self.state.session.clone() else {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() * 0.3);
                ui.label(
                    RichText::new("Live voice is unavailable without an API key")
                        .size(14.0)
                        .color(self.theme.text_muted),
                );
            });
            return;
        };
        let session_state = session.state();

        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    self.draw_status_dot(ui, session_state.status);
                    ui.label(
                        RichText::new(status_label(session_state.status))
                            .size(16.0)
                            .strong()
                            .color(self.theme.text_primary),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        match session_state.status {
                            ConnectionStatus::Open => {
                                if ui.button("Disconnect").clicked() {
                                    session.disconnect();
                                }
                            }
                            ConnectionStatus::Connecting => {
                                ui.add_enabled(false, egui::Button::new("Connecting..."));
                            }
                            _ => {
                                let button = egui::Button::new(
                                    RichText::new("Connect").color(Color32::WHITE),
                                )
                                .fill(self.theme.primary)
                                .rounding(self.theme.button_rounding);
                                if ui.add(button).clicked() {
                                    session.connect();
                                }
                            }
                        }
                    });
                });

                if let Some(error) = &session_state.last_error {
                    ui.add_space(self.theme.spacing_sm);
                    ui.label(RichText::new(error).size(12.0).color(self.theme.error));
                }
            });

        ui.add_space(self.theme.spacing_sm);

        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.label(
                    RichText::new("Microphone")
                        .size(14.0)
                        .strong()
                        .color(self.theme.text_primary),
                );
                ui.add_space(self.theme.spacing_sm);
                self.draw_level_meter(ui, session_state.volume, session_state.streaming);
            });

        if session_state.streaming {
            ui.ctx().request_repaint();
        }
    }

    fn draw_status_dot(&self, ui: &mut egui::Ui, status: ConnectionStatus) {
        let (rect, _) = ui.allocate_exact_size(Vec2::splat(14.0), egui::Sense::hover());
        let color = match status {
            ConnectionStatus::Open => self.theme.success,
            ConnectionStatus::Connecting => self.theme.warning,
            ConnectionStatus::Failed => self.theme.error,
            ConnectionStatus::Idle | ConnectionStatus::Closed => self.theme.meter_inactive,
        };
        ui.painter().circle_filled(rect.center(), 5.0, color);

        if status == ConnectionStatus::Open {
            let t = ui.ctx().input(|i| i.time);
            let pulse = ((t * 2.0).sin() * 0.5 + 0.5) as f32;
            ui.painter().circle_stroke(
                rect.center(),
                5.0 + pulse * 3.0,
                Stroke::new(1.5, self.theme.live.gamma_multiply(1.0 - pulse * 0.6)),
            );
            ui.ctx().request_repaint();
        }
    }

    fn draw_level_meter(&self, ui: &mut egui::Ui, volume: f32, active: bool) {
        let desired_size = Vec2::new(ui.available_width(), 48.0);
        let (rect, _) = ui.allocate_exact_size(desired_size, egui::Sense::hover());
        let painter = ui.painter();

        painter.rect_filled(rect, self.theme.card_rounding, self.theme.bg_tertiary);

        let padding = 8.0;
        let draw_rect = rect.shrink(padding);
        let bar_count = 32;
        let bar_width = draw_rect.width() / bar_count as f32;
        let center_y = draw_rect.center().y;
        let max_height = draw_rect.height();

        let level = if active { volume.clamp(0.0, 1.0) } else { 0.0 };
        let lit = (level * bar_count as f32).round() as usize;

        for i in 0..bar_count {
            // Gentle ramp so the meter reads as a wave rather than a block
            let shape = 0.4 + 0.6 * (i as f32 / bar_count as f32);
            let height = if i < lit {
                (max_height * shape).max(3.0)
            } else {
                3.0
            };
            let color = if i < lit {
                self.theme.meter_active
            } else {
                self.theme.meter_inactive
            };

            let x = draw_rect.left() + i as f32 * bar_width + bar_width * 0.5;
            painter.line_segment(
                [
                    Pos2::new(x, center_y - height / 2.0),
                    Pos2::new(x, center_y + height / 2.0),
                ],
                Stroke::new((bar_width - 2.0).max(1.0), color),
            );
        }
    }
}

fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Idle => "Ready",
        ConnectionStatus::Connecting => "Connecting",
        ConnectionStatus::Open => "Live",
        ConnectionStatus::Closed => "Disconnected",
        ConnectionStatus::Failed => "Error",
    }
}
