//! Chat tab: scrollable transcript plus the text input bar.

use crate::ui::state::{AppState, Role};
use crate::ui::theme::Theme;
use egui::{self, Key, RichText, Vec2};

pub struct ChatPanel<'a> {
    state: &'a mut AppState,
    theme: &'a Theme,
}

impl<'a> ChatPanel<'a> {
    pub fn new(state: &'a mut AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        let input_height = 72.0;
        let transcript_height = (ui.available_height() - input_height).max(0.0);

        ui.allocate_ui(Vec2::new(ui.available_width(), transcript_height), |ui| {
            self.show_transcript(ui);
        });

        if let Some(error) = self.state.chat_error.clone() {
            ui.label(RichText::new(error).size(12.0).color(self.theme.error));
        }

        self.show_input_bar(ui);
    }

    fn show_transcript(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                if self.state.messages.is_empty() {
                    ui.add_space(ui.available_height() * 0.4);
                    ui.vertical_centered(|ui| {
                        ui.label(
                            RichText::new("Start a conversation")
                                .size(16.0)
                                .color(self.theme.text_muted),
                        );
                    });
                    return;
                }

                for message in &self.state.messages {
                    let is_user = message.role == Role::User;
                    let layout = if is_user {
                        egui::Layout::right_to_left(egui::Align::TOP)
                    } else {
                        egui::Layout::left_to_right(egui::Align::TOP)
                    };

                    ui.with_layout(layout, |ui| {
                        let fill = if is_user {
                            self.theme.primary.gamma_multiply(0.25)
                        } else {
                            self.theme.bg_secondary
                        };
                        egui::Frame::none()
                            .fill(fill)
                            .rounding(self.theme.card_rounding)
                            .inner_margin(self.theme.spacing_sm * 1.5)
                            .show(ui, |ui| {
                                ui.set_max_width(ui.available_width() * 0.75);
                                let text = if message.text.is_empty() && message.streaming {
                                    "..."
                                } else {
                                    &message.text
                                };
                                ui.label(
                                    RichText::new(text).color(self.theme.text_primary),
                                );
                            });
                    });
                    ui.add_space(self.theme.spacing_sm);
                }
            });
    }

    fn show_input_bar(&mut self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing_sm)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let available_width = ui.available_width() - 60.0;
                    let text_edit = egui::TextEdit::singleline(&mut self.state.chat_input)
                        .hint_text("Type a message...")
                        .desired_width(available_width)
                        .margin(egui::Margin::symmetric(12.0, 8.0));

                    let response = ui.add_enabled(!self.state.chat_busy, text_edit);

                    let enter_pressed = response.has_focus()
                        && ui.input(|i| i.key_pressed(Key::Enter));

                    let can_send =
                        !self.state.chat_input.trim().is_empty() && !self.state.chat_busy;

                    let button_color = if can_send {
                        self.theme.primary
                    } else {
                        self.theme.text_muted
                    };
                    let button = egui::Button::new(
                        RichText::new("➤").size(18.0).color(egui::Color32::WHITE),
                    )
                    .min_size(Vec2::splat(40.0))
                    .rounding(self.theme.button_rounding)
                    .fill(button_color);

                    let clicked = ui.add_enabled(can_send, button).clicked();

                    if can_send && (clicked || enter_pressed) {
                        self.state.send_chat_message();
                    }
                });
            });
    }
}
