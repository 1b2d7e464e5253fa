pub mod agent_picker;
pub mod app;
pub mod conversation;
pub mod markdown;

pub use app::run;
