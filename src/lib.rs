//! Retouch: image editing core with bounded undo/redo history, live slider
//! previews that never touch history, and a small catalogue of pixel
//! operations.

#[macro_use]
pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::ImageBuffer;
pub use components::{Gesture, HistoryEntry, HistoryManager, PreviewController, PreviewTicket};
pub use error::EditError;
pub use io::SaveFormat;
pub use ops::{FlipAxis, Interpolation, Operation, Rotation};
pub use project::{Project, StatusLine};
pub use settings::EditorSettings;
