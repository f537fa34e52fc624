use std::fmt;

/// Everything that can go wrong while editing a document.
///
/// None of these are fatal: every failing call leaves the committed buffer and
/// both history stacks exactly as they were.
#[derive(Debug)]
pub enum EditError {
    /// Undo or redo was requested with nothing to step to.
    EmptyHistory,
    /// An operation parameter fell outside its domain.
    InvalidParameter(String),
    /// A gesture call arrived out of order (caller bug).
    GestureState(String),
    /// The pixel backend failed or produced an unusable buffer.
    OperationFailed(String),
    Io(std::io::Error),
    Codec(String),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::EmptyHistory => write!(f, "Nothing to undo or redo"),
            EditError::InvalidParameter(e) => write!(f, "Invalid parameter: {}", e),
            EditError::GestureState(e) => write!(f, "Gesture state error: {}", e),
            EditError::OperationFailed(e) => write!(f, "Operation failed: {}", e),
            EditError::Io(e) => write!(f, "I/O error: {}", e),
            EditError::Codec(e) => write!(f, "Image codec error: {}", e),
        }
    }
}

impl std::error::Error for EditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EditError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EditError {
    fn from(e: std::io::Error) -> Self {
        EditError::Io(e)
    }
}

impl From<image::ImageError> for EditError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => EditError::Io(io),
            other => EditError::Codec(other.to_string()),
        }
    }
}
