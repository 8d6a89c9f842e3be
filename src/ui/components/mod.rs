//! UI components for the Parley application

mod chat_panel;
mod live_panel;
mod vision_panel;

pub use chat_panel::ChatPanel;
pub use live_panel::LivePanel;
pub use vision_panel::VisionPanel;
