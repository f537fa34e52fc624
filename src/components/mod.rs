pub mod history;
pub mod preview;

pub use history::{HistoryEntry, HistoryManager};
pub use preview::{Gesture, PreviewController, PreviewTicket};
