// ============================================================================
// PREVIEW CONTROLLER — live slider previews vs. committed history entries
// ============================================================================
//
// A gesture (one slider drag, one button click) runs
//     Idle → Active → (commit | cancel) → Idle
// Every preview inside a gesture is computed from the committed buffer
// captured when the gesture began, never from the previous preview, and only
// the commit touches history.
// ============================================================================

use crate::canvas::ImageBuffer;
use crate::error::EditError;
use crate::ops::Operation;

use super::history::{HistoryEntry, HistoryManager};

/// Gesture lifecycle.
#[derive(Clone, Debug, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Active {
        /// Committed buffer at gesture start.
        base: ImageBuffer,
        /// Latest preview shown to the user.
        previewing: Option<ImageBuffer>,
        /// Operation that produced `previewing`.
        previewed_op: Option<Operation>,
        /// Latest operation handed to a background job and not yet delivered.
        pending: Option<Operation>,
    },
}

/// Work order for an off-thread preview.  The result is only accepted if no
/// newer request, commit, cancel or undo happened in the meantime.
#[derive(Clone, Debug)]
pub struct PreviewTicket {
    pub generation: u64,
    pub base: ImageBuffer,
    pub operation: Operation,
}

impl PreviewTicket {
    /// Compute the preview.  Safe to call from any thread.
    pub fn run(&self) -> Result<ImageBuffer, EditError> {
        self.operation.apply(&self.base)
    }
}

pub struct PreviewController {
    committed: ImageBuffer,
    gesture: Gesture,
    /// Bumped on every state change that invalidates outstanding previews.
    generation: u64,
}

impl PreviewController {
    pub fn new(committed: ImageBuffer) -> Self {
        Self {
            committed,
            gesture: Gesture::Idle,
            generation: 0,
        }
    }

    pub fn committed(&self) -> &ImageBuffer {
        &self.committed
    }

    pub fn previewing(&self) -> Option<&ImageBuffer> {
        match &self.gesture {
            Gesture::Active { previewing, .. } => previewing.as_ref(),
            Gesture::Idle => None,
        }
    }

    /// What the canvas should show right now.
    pub fn displayed(&self) -> &ImageBuffer {
        self.previewing().unwrap_or(&self.committed)
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_gesture_active(&self) -> bool {
        matches!(self.gesture, Gesture::Active { .. })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending_preview(&self) -> bool {
        matches!(&self.gesture, Gesture::Active { pending: Some(_), .. })
    }

    /// Operation whose result a commit would record right now.
    pub fn gesture_operation(&self) -> Option<&Operation> {
        match &self.gesture {
            Gesture::Active {
                pending,
                previewed_op,
                ..
            } => pending.as_ref().or(previewed_op.as_ref()),
            Gesture::Idle => None,
        }
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn reject(&self, msg: &str) -> EditError {
        log_warn!("Gesture rejected: {}", msg);
        EditError::GestureState(msg.to_string())
    }

    /// Start a gesture on the current committed buffer.
    pub fn begin_gesture(&mut self) -> Result<(), EditError> {
        if self.is_gesture_active() {
            return Err(self.reject("begin_gesture while a gesture is already active"));
        }
        self.gesture = Gesture::Active {
            base: self.committed.clone(),
            previewing: None,
            previewed_op: None,
            pending: None,
        };
        self.bump();
        Ok(())
    }

    /// Recompute the preview from the gesture base.  No history mutation.
    /// On failure the previous preview stays on screen.
    pub fn update_preview(&mut self, op: &Operation) -> Result<&ImageBuffer, EditError> {
        let Gesture::Active { base, .. } = &self.gesture else {
            return Err(self.reject("update_preview without an active gesture"));
        };
        let result = op.apply(base).inspect_err(|e| {
            log_err!("Preview of {} failed: {}", op.label(), e);
        })?;

        self.bump();
        if let Gesture::Active {
            previewing,
            previewed_op,
            pending,
            ..
        } = &mut self.gesture
        {
            *previewing = Some(result);
            *previewed_op = Some(op.clone());
            *pending = None;
        }
        self.previewing()
            .ok_or_else(|| EditError::GestureState("preview vanished".to_string()))
    }

    /// Hand out a ticket for computing `op` off-thread.  Any earlier ticket
    /// becomes stale.
    pub fn request_preview(&mut self, op: &Operation) -> Result<PreviewTicket, EditError> {
        op.validate()?;
        let Gesture::Active { base, .. } = &self.gesture else {
            return Err(self.reject("request_preview without an active gesture"));
        };
        let base = base.clone();

        self.bump();
        if let Gesture::Active { pending, .. } = &mut self.gesture {
            *pending = Some(op.clone());
        }
        Ok(PreviewTicket {
            generation: self.generation,
            base,
            operation: op.clone(),
        })
    }

    /// Install a background result.  Returns `false` (and drops the result)
    /// when the ticket is stale.
    pub fn complete_preview(&mut self, ticket: &PreviewTicket, result: ImageBuffer) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        match &mut self.gesture {
            Gesture::Active {
                previewing,
                previewed_op,
                pending,
                ..
            } => {
                *previewing = Some(result);
                *previewed_op = Some(ticket.operation.clone());
                *pending = None;
                true
            }
            Gesture::Idle => false,
        }
    }

    /// Commit the gesture's preview as one history entry.
    ///
    /// If a background preview is still outstanding, the latest requested
    /// operation is computed here so the commit reflects the final value.
    /// Without any preview this fails and the gesture stays active.
    pub fn commit(&mut self, history: &mut HistoryManager, label: impl Into<String>) -> Result<&ImageBuffer, EditError> {
        let Gesture::Active {
            base,
            previewing,
            pending,
            ..
        } = &self.gesture
        else {
            return Err(self.reject("commit without an active gesture"));
        };

        let result = match (pending, previewing) {
            (Some(op), _) => op.apply(base)?,
            (None, Some(preview)) => preview.clone(),
            (None, None) => return Err(self.reject("commit with nothing to commit")),
        };
        Ok(self.finish(history, result, label.into()))
    }

    /// Commit an explicitly computed result (one-shot edits).
    pub fn commit_result(
        &mut self,
        history: &mut HistoryManager,
        result: ImageBuffer,
        label: impl Into<String>,
    ) -> Result<&ImageBuffer, EditError> {
        if !self.is_gesture_active() {
            return Err(self.reject("commit_result without an active gesture"));
        }
        Ok(self.finish(history, result, label.into()))
    }

    /// Begin, compute on the committed buffer and commit in one step.
    /// Exactly one history entry per call; nothing changes on failure.
    pub fn apply_one_shot(&mut self, history: &mut HistoryManager, op: &Operation) -> Result<&ImageBuffer, EditError> {
        self.begin_gesture()?;
        match op.apply(&self.committed) {
            Ok(result) => self.commit_result(history, result, op.label()),
            Err(e) => {
                log_err!("{} failed: {}", op.label(), e);
                self.cancel_gesture();
                Err(e)
            }
        }
    }

    fn finish(&mut self, history: &mut HistoryManager, result: ImageBuffer, label: String) -> &ImageBuffer {
        log_info!(
            "Commit \"{}\" ({}x{}, {} ch)",
            label,
            result.width(),
            result.height(),
            result.channels()
        );
        history.push(HistoryEntry::new(result.clone(), label));
        self.committed = result;
        self.gesture = Gesture::Idle;
        self.bump();
        &self.committed
    }

    /// Drop the preview; history and the committed buffer stay as they are.
    /// Returns whether a gesture was actually running.
    pub fn cancel_gesture(&mut self) -> bool {
        if !self.is_gesture_active() {
            return false;
        }
        self.gesture = Gesture::Idle;
        self.bump();
        true
    }

    /// Replace the committed buffer (after undo, redo or a new image).
    pub fn set_committed(&mut self, buffer: ImageBuffer) -> Result<(), EditError> {
        if self.is_gesture_active() {
            return Err(self.reject("set_committed during an active gesture"));
        }
        self.committed = buffer;
        self.bump();
        Ok(())
    }
}
