//! egui/eframe user interface for Parley.

mod app;
pub mod components;
mod state;
mod theme;

pub use app::ParleyApp;
pub use state::{AppState, AppTab, ChatMessage, Role};
pub use theme::Theme;
