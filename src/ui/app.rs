//! Main application struct and eframe integration.

use crate::ui::components::{ChatPanel, LivePanel, VisionPanel};
use crate::ui::state::{AppState, AppTab};
use crate::ui::theme::Theme;
use egui::{self, CentralPanel, RichText, TopBottomPanel};

/// Main Parley application
pub struct ParleyApp {
    state: AppState,
    theme: Theme,
}

impl ParleyApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let theme = Theme::dark();
        theme.apply(&cc.egui_ctx);

        Self {
            state: AppState::new(),
            theme,
        }
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        TopBottomPanel::top("header")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_secondary)
                    .inner_margin(12.0),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new("Parley")
                            .size(20.0)
                            .strong()
                            .color(self.theme.text_primary),
                    );
                    ui.label(
                        RichText::new("AI Assistant")
                            .size(14.0)
                            .color(self.theme.text_muted),
                    );

                    ui.add_space(self.theme.spacing);

                    for (tab, label) in [
                        (AppTab::Chat, "Chat"),
                        (AppTab::Vision, "Vision"),
                        (AppTab::Live, "Live"),
                    ] {
                        if ui
                            .selectable_label(self.state.tab == tab, label)
                            .clicked()
                        {
                            self.state.tab = tab;
                        }
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if self.state.tab == AppTab::Chat
                            && ui.button("🗑").on_hover_text("Clear chat").clicked()
                        {
                            self.state.clear_messages();
                        }
                        if self.state.api_key.is_none() {
                            ui.label(
                                RichText::new("API key missing")
                                    .size(12.0)
                                    .color(self.theme.warning),
                            );
                        }
                    });
                });
            });
    }

    fn show_content(&mut self, ctx: &egui::Context) {
        CentralPanel::default()
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_primary)
                    .inner_margin(self.theme.spacing),
            )
            .show(ctx, |ui| match self.state.tab {
                AppTab::Chat => ChatPanel::new(&mut self.state, &self.theme).show(ui),
                AppTab::Vision => VisionPanel::new(&mut self.state, &self.theme).show(ui),
                AppTab::Live => LivePanel::new(&mut self.state, &self.theme).show(ui),
            });
    }
}

impl eframe::App for ParleyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.poll_events();

        self.show_header(ctx);
        self.show_content(ctx);

        if self.state.chat_busy || self.state.vision_busy {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(session) = &self.state.session {
            session.shutdown();
        }
    }
}
