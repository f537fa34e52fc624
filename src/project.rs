use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use uuid::Uuid;

use crate::canvas::ImageBuffer;
use crate::components::history::{HistoryEntry, HistoryManager};
use crate::components::preview::{PreviewController, PreviewTicket};
use crate::error::EditError;
use crate::io::{self, SaveFormat};
use crate::ops::Operation;
use crate::settings::EditorSettings;

/// Result of an offloaded preview job.
pub struct PreviewResult {
    pub ticket: PreviewTicket,
    pub result: Result<ImageBuffer, EditError>,
}

/// Single open document.
pub struct Project {
    pub id: Uuid,
    /// Display name (file name, or "Unsaved image")
    pub name: String,
    /// `None` for images that have never been saved.
    pub path: Option<PathBuf>,
    pub format: SaveFormat,
    pub is_dirty: bool,
    pub last_action: String,
    pub jpeg_quality: u8,
    async_preview: bool,

    history: HistoryManager,
    preview: PreviewController,

    preview_sender: mpsc::Sender<PreviewResult>,
    preview_receiver: mpsc::Receiver<PreviewResult>,
    /// Jobs spawned whose result has not been received yet.
    pending_previews: usize,
}

impl Project {
    /// Start a session on an in-memory image.
    pub fn from_image(buffer: ImageBuffer, name: impl Into<String>, settings: &EditorSettings) -> Self {
        let mut history =
            HistoryManager::new(settings.max_undo_steps).with_memory_limit(settings.history_memory_bytes());
        history.reset(HistoryEntry::new(buffer.clone(), "Opened image"));
        let (preview_sender, preview_receiver) = mpsc::channel();

        let project = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path: None,
            format: SaveFormat::default(),
            is_dirty: false,
            last_action: "Opened image".to_string(),
            jpeg_quality: settings.jpeg_quality,
            async_preview: settings.async_preview,
            history,
            preview: PreviewController::new(buffer),
            preview_sender,
            preview_receiver,
            pending_previews: 0,
        };
        log_info!(
            "[{}] New session \"{}\" ({}x{})",
            project.id,
            project.name,
            project.committed().width(),
            project.committed().height()
        );
        project
    }

    /// Open an image file.
    pub fn open(path: &Path, settings: &EditorSettings) -> Result<Self, EditError> {
        let buffer = io::load_image(path)?;
        let mut project = Self::from_image(buffer, file_name(path), settings);
        project.path = Some(path.to_path_buf());
        project.format = SaveFormat::from_path(path).unwrap_or_default();
        Ok(project)
    }

    /// Load a different image into this session; history starts over.
    pub fn replace_image(&mut self, buffer: ImageBuffer, path: Option<PathBuf>) -> Result<(), EditError> {
        self.preview.cancel_gesture();
        self.preview.set_committed(buffer.clone())?;
        self.history.reset(HistoryEntry::new(buffer, "Opened image"));
        self.name = path.as_deref().map(file_name).unwrap_or_else(|| "Unsaved image".to_string());
        if let Some(format) = path.as_deref().and_then(SaveFormat::from_path) {
            self.format = format;
        }
        self.path = path;
        self.is_dirty = false;
        self.last_action = "Opened image".to_string();
        log_info!("[{}] Reset history for \"{}\"", self.id, self.name);
        Ok(())
    }

    // ---------------- accessors ----------------

    pub fn committed(&self) -> &ImageBuffer {
        self.preview.committed()
    }

    pub fn displayed(&self) -> &ImageBuffer {
        self.preview.displayed()
    }

    pub fn previewing(&self) -> Option<&ImageBuffer> {
        self.preview.previewing()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn preview(&self) -> &PreviewController {
        &self.preview
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Label of the edit that produced the committed buffer.
    pub fn last_label(&self) -> Option<&str> {
        self.history.current_label()
    }

    // ---------------- gestures ----------------

    pub fn begin_gesture(&mut self) -> Result<(), EditError> {
        self.preview.begin_gesture()
    }

    /// Synchronous preview of `op` on the gesture base.
    pub fn update_preview(&mut self, op: &Operation) -> Result<&ImageBuffer, EditError> {
        self.preview.update_preview(op)?;
        self.last_action = format!("Adjusting {}", op.name());
        self.preview
            .previewing()
            .ok_or_else(|| EditError::GestureState("preview vanished".to_string()))
    }

    /// Preview on the rayon pool; the result is picked up by
    /// [`Project::poll_previews`].  Falls back to a synchronous preview when
    /// async previews are disabled.
    pub fn spawn_preview(&mut self, op: &Operation) -> Result<(), EditError> {
        if !self.async_preview {
            return self.update_preview(op).map(|_| ());
        }
        let ticket = self.preview.request_preview(op)?;
        self.last_action = format!("Adjusting {}", op.name());
        self.pending_previews += 1;

        let sender = self.preview_sender.clone();
        rayon::spawn(move || {
            let result = ticket.run();
            let _ = sender.send(PreviewResult { ticket, result });
        });
        Ok(())
    }

    /// Install any finished preview jobs.  Stale results are dropped.
    /// Returns whether the displayed preview changed.
    pub fn poll_previews(&mut self) -> bool {
        let mut changed = false;
        while let Ok(msg) = self.preview_receiver.try_recv() {
            changed |= self.accept_preview(msg);
        }
        changed
    }

    /// Block until every spawned preview job has reported back.
    pub fn finish_previews(&mut self) -> bool {
        let mut changed = false;
        while self.pending_previews > 0 {
            match self.preview_receiver.recv() {
                Ok(msg) => changed |= self.accept_preview(msg),
                Err(_) => break,
            }
        }
        changed
    }

    fn accept_preview(&mut self, msg: PreviewResult) -> bool {
        self.pending_previews = self.pending_previews.saturating_sub(1);
        let PreviewResult { ticket, result } = msg;
        match result {
            Ok(buffer) => {
                let installed = self.preview.complete_preview(&ticket, buffer);
                if !installed {
                    log_info!(
                        "[{}] Discarded stale preview of {} (generation {})",
                        self.id,
                        ticket.operation.label(),
                        ticket.generation
                    );
                }
                installed
            }
            Err(e) => {
                log_err!("[{}] Preview of {} failed: {}", self.id, ticket.operation.label(), e);
                false
            }
        }
    }

    /// Commit the active gesture as one history entry labelled after its
    /// operation.
    pub fn commit_gesture(&mut self) -> Result<&ImageBuffer, EditError> {
        let label = self
            .preview
            .gesture_operation()
            .map(Operation::label)
            .unwrap_or_else(|| "Unnamed".to_string());
        self.preview.commit(&mut self.history, label.clone())?;
        self.last_action = label;
        self.is_dirty = true;
        Ok(self.preview.committed())
    }

    pub fn cancel_gesture(&mut self) -> bool {
        let cancelled = self.preview.cancel_gesture();
        if cancelled {
            self.last_action = "Cancelled".to_string();
        }
        cancelled
    }

    /// One-shot edit: compute on the committed buffer and commit.
    pub fn apply(&mut self, op: &Operation) -> Result<&ImageBuffer, EditError> {
        self.preview.apply_one_shot(&mut self.history, op)?;
        self.last_action = op.label();
        self.is_dirty = true;
        Ok(self.preview.committed())
    }

    // ---------------- history ----------------

    pub fn undo(&mut self) -> Result<&ImageBuffer, EditError> {
        self.ensure_idle("undo")?;
        let buffer = self.history.undo()?.buffer.clone();
        self.restore(buffer, "Undo")
    }

    pub fn redo(&mut self) -> Result<&ImageBuffer, EditError> {
        self.ensure_idle("redo")?;
        let buffer = self.history.redo()?.buffer.clone();
        self.restore(buffer, "Redo")
    }

    /// Revert `steps` entries at once (history panel click).
    pub fn undo_to(&mut self, steps: usize) -> Result<&ImageBuffer, EditError> {
        self.ensure_idle("undo")?;
        let before = self.history.undo_len();
        let buffer = self.history.undo_to(steps)?.buffer.clone();
        if self.history.undo_len() == before {
            return Ok(self.preview.committed());
        }
        self.restore(buffer, "Undo")
    }

    fn ensure_idle(&self, what: &str) -> Result<(), EditError> {
        if self.preview.is_gesture_active() {
            log_warn!("[{}] {} rejected during an active gesture", self.id, what);
            return Err(EditError::GestureState(format!("{} during an active gesture", what)));
        }
        Ok(())
    }

    fn restore(&mut self, buffer: ImageBuffer, action: &str) -> Result<&ImageBuffer, EditError> {
        self.preview.set_committed(buffer)?;
        self.last_action = action.to_string();
        self.is_dirty = true;
        log_info!(
            "[{}] {} -> {}",
            self.id,
            action,
            self.history.current_label().unwrap_or("Unnamed")
        );
        Ok(self.preview.committed())
    }

    // ---------------- saving ----------------

    /// Write the committed buffer back to the file it came from.
    pub fn save(&mut self) -> Result<(), EditError> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| EditError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "image has no path yet")))?;
        io::encode_and_write(self.committed(), &path, self.format, self.jpeg_quality)?;
        self.is_dirty = false;
        self.last_action = "Saved image".to_string();
        Ok(())
    }

    /// Write the committed buffer to `path`; the format comes from `format`
    /// or the extension.  The session follows the new path.
    pub fn save_as(&mut self, path: &Path, format: Option<SaveFormat>) -> Result<(), EditError> {
        let format = format.or_else(|| SaveFormat::from_path(path)).unwrap_or(self.format);
        io::encode_and_write(self.committed(), path, format, self.jpeg_quality)?;
        self.path = Some(path.to_path_buf());
        self.name = file_name(path);
        self.format = format;
        self.is_dirty = false;
        self.last_action = "Saved image as".to_string();
        Ok(())
    }

    // ---------------- status ----------------

    pub fn status(&self) -> StatusLine {
        let (width, height) = self.displayed().dimensions();
        StatusLine {
            filename: if self.path.is_some() {
                self.name.clone()
            } else {
                "Unsaved image".to_string()
            },
            modified: self.is_dirty,
            width,
            height,
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            last_action: self.last_action.clone(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Everything the status bar shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLine {
    pub filename: String,
    pub modified: bool,
    pub width: u32,
    pub height: u32,
    pub can_undo: bool,
    pub can_redo: bool,
    pub last_action: String,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} | {} x {} | Undo: {} | Redo: {} | Last: {}",
            self.filename,
            if self.modified { " (modified)" } else { "" },
            self.width,
            self.height,
            self.can_undo,
            self.can_redo,
            self.last_action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{FlipAxis, Rotation};

    fn project() -> Project {
        let data: Vec<u8> = (0..8 * 5 * 3).map(|i| (i * 3 % 256) as u8).collect();
        let buf = ImageBuffer::from_raw(8, 5, 3, data).unwrap();
        Project::from_image(buf, "test.png", &EditorSettings::default())
    }

    #[test]
    fn status_line_format() {
        let mut p = project();
        assert_eq!(
            p.status().to_string(),
            "Unsaved image | 8 x 5 | Undo: false | Redo: false | Last: Opened image"
        );
        p.apply(&Operation::Rotate(Rotation::Cw90)).unwrap();
        assert_eq!(
            p.status().to_string(),
            "Unsaved image (modified) | 5 x 8 | Undo: true | Redo: false | Last: Rotate (90)"
        );
    }

    #[test]
    fn undo_and_redo_update_last_action() {
        let mut p = project();
        let before = p.committed().clone();
        p.apply(&Operation::Flip(FlipAxis::Vertical)).unwrap();
        let after = p.committed().clone();

        assert_eq!(p.undo().unwrap(), &before);
        assert_eq!(p.last_action, "Undo");
        assert_eq!(p.redo().unwrap(), &after);
        assert_eq!(p.last_action, "Redo");
        assert_eq!(p.last_label(), Some("Flip (vertical)"));
    }

    #[test]
    fn undo_during_gesture_is_rejected() {
        let mut p = project();
        p.apply(&Operation::Grayscale).unwrap();
        p.begin_gesture().unwrap();
        p.update_preview(&Operation::Brightness { offset: 30 }).unwrap();
        assert_eq!(p.last_action, "Adjusting brightness");
        assert!(matches!(p.undo(), Err(EditError::GestureState(_))));
        assert!(matches!(p.redo(), Err(EditError::GestureState(_))));
        assert!(p.preview().is_gesture_active());
        assert_eq!(p.history().undo_len(), 2);
    }

    #[test]
    fn commit_gesture_uses_operation_label() {
        let mut p = project();
        p.begin_gesture().unwrap();
        p.update_preview(&Operation::blur_from_slider(2)).unwrap();
        p.update_preview(&Operation::blur_from_slider(4)).unwrap();
        p.commit_gesture().unwrap();
        assert_eq!(p.last_label(), Some("Blur (5)"));
        assert_eq!(p.last_action, "Blur (5)");
        assert_eq!(p.history().undo_len(), 2);
    }

    #[test]
    fn undo_to_without_movement_changes_nothing() {
        let mut p = project();
        p.apply(&Operation::Grayscale).unwrap();
        p.is_dirty = false;
        p.last_action = "Saved image".to_string();

        p.undo_to(0).unwrap();
        assert!(!p.is_dirty);
        assert_eq!(p.last_action, "Saved image");

        let before = p.committed().clone();
        p.undo_to(1).unwrap();
        assert_ne!(p.committed(), &before);
        assert_eq!(p.last_action, "Undo");

        p.is_dirty = false;
        p.last_action = "Saved image".to_string();
        assert!(matches!(p.undo_to(3), Err(EditError::EmptyHistory)));
        p.undo_to(0).unwrap();
        assert!(!p.is_dirty);
        assert_eq!(p.last_action, "Saved image");
    }

    #[test]
    fn empty_undo_reports_empty_history() {
        let mut p = project();
        assert!(matches!(p.undo(), Err(EditError::EmptyHistory)));
        assert_eq!(p.last_action, "Opened image");
    }

    #[test]
    fn save_without_path_fails() {
        let mut p = project();
        assert!(matches!(p.save(), Err(EditError::Io(_))));
    }

    #[test]
    fn replace_image_resets_history() {
        let mut p = project();
        p.apply(&Operation::Grayscale).unwrap();
        let fresh = ImageBuffer::from_raw(2, 2, 1, vec![1, 2, 3, 4]).unwrap();
        p.replace_image(fresh.clone(), Some(PathBuf::from("other.bmp"))).unwrap();
        assert!(!p.can_undo());
        assert!(!p.can_redo());
        assert_eq!(p.committed(), &fresh);
        assert_eq!(p.format, SaveFormat::Bmp);
        assert_eq!(p.status().filename, "other.bmp");
    }
}
