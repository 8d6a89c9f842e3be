//! Vision tab: stage an image from disk and run a one-shot analysis.

use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, RichText};

pub struct VisionPanel<'a> {
    state: &'a mut AppState,
    theme: &'a Theme,
}

impl<'a> VisionPanel<'a> {
    pub fn new(state: &'a mut AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.label(
                    RichText::new("Image")
                        .size(14.0)
                        .strong()
                        .color(self.theme.text_primary),
                );

                ui.horizontal(|ui| {
                    let text_edit = egui::TextEdit::singleline(&mut self.state.image_path_input)
                        .hint_text("Path to an image file")
                        .desired_width(ui.available_width() - 80.0);
                    ui.add(text_edit);
                    if ui.button("Load").clicked() {
                        self.state.stage_image();
                    }
                });

                if let Some(image) = &self.state.staged_image {
                    ui.label(
                        RichText::new(format!(
                            "{} ({} KB, {})",
                            image.name,
                            image.bytes.len() / 1024,
                            image.mime_type
                        ))
                        .size(12.0)
                        .color(self.theme.text_muted),
                    );
                }

                ui.add_space(self.theme.spacing_sm);

                ui.label(
                    RichText::new("Prompt")
                        .size(14.0)
                        .strong()
                        .color(self.theme.text_primary),
                );
                ui.add(
                    egui::TextEdit::singleline(&mut self.state.vision_prompt)
                        .hint_text("Describe this image in detail.")
                        .desired_width(ui.available_width()),
                );

                ui.add_space(self.theme.spacing_sm);

                let can_analyze =
                    self.state.staged_image.is_some() && !self.state.vision_busy;
                let label = if self.state.vision_busy {
                    "Analyzing..."
                } else {
                    "Analyze"
                };
                if ui
                    .add_enabled(can_analyze, egui::Button::new(label))
                    .clicked()
                {
                    self.state.analyze_staged_image();
                }
            });

        ui.add_space(self.theme.spacing_sm);

        if let Some(error) = &self.state.vision_error {
            ui.label(RichText::new(error).size(12.0).color(self.theme.error));
        }

        if let Some(result) = &self.state.vision_result {
            egui::Frame::none()
                .fill(self.theme.bg_secondary)
                .rounding(self.theme.card_rounding)
                .inner_margin(self.theme.spacing)
                .show(ui, |ui| {
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, true])
                        .show(ui, |ui| {
                            ui.label(RichText::new(result).color(self.theme.text_primary));
                        });
                });
        }
    }
}
