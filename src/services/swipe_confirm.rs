use std::sync::Arc;

use serde::Serialize;

use crate::services::gesture::{GesturePhase, GestureSettings, ProgressGesture, Release};
use crate::services::haptics::{self, Haptics};

pub const DEFAULT_THUMB_WIDTH_PX: f64 = 56.0;

/// Cosmetic only: picks colours and the prompt, never behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeVariant {
    Redeem,
    Use,
}

impl SwipeVariant {
    pub fn prompt(&self) -> &'static str {
        match self {
            SwipeVariant::Redeem => "Swipe to redeem",
            SwipeVariant::Use => "Swipe to use",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum SwipeRelease<R> {
    /// The callback ran and produced this value
    Completed(R),
    Cancelled,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwipeView {
    pub variant: SwipeVariant,
    pub progress: u8,
    pub dragging: bool,
    pub completed: bool,
    pub label: String,
}

type Completion<'a, C, R> = Box<dyn FnOnce(&mut C) -> R + 'a>;

/// Swipe-to-confirm control.
///
/// The completion callback receives the caller's context (usually the ledger)
/// by mutable reference and runs at most once per control. Once it has run
/// the control stays completed and ignores further input.
pub struct SwipeConfirmControl<'a, C, R> {
    variant: SwipeVariant,
    gesture: ProgressGesture,
    thumb_width_px: f64,
    haptics: Arc<dyn Haptics>,
    on_complete: Option<Completion<'a, C, R>>,
}

impl<'a, C, R> SwipeConfirmControl<'a, C, R> {
    pub fn new<F>(
        variant: SwipeVariant,
        settings: GestureSettings,
        haptics: Arc<dyn Haptics>,
        on_complete: F,
    ) -> Self
    where
        F: FnOnce(&mut C) -> R + 'a,
    {
        Self {
            variant,
            gesture: ProgressGesture::new(settings),
            thumb_width_px: DEFAULT_THUMB_WIDTH_PX,
            haptics,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    pub fn with_thumb_width(mut self, thumb_width_px: f64) -> Self {
        self.thumb_width_px = thumb_width_px;
        self
    }

    pub fn variant(&self) -> SwipeVariant {
        self.variant
    }

    pub fn is_completed(&self) -> bool {
        self.gesture.is_committed()
    }

    pub fn progress(&self) -> u8 {
        self.gesture.progress()
    }

    pub fn pointer_down(&mut self, x: f64, track_width_px: f64) -> bool {
        if !self.gesture.begin(x, track_width_px, self.thumb_width_px) {
            return false;
        }
        self.pulse(haptics::DRAG_START_PULSE);
        true
    }

    pub fn pointer_move(&mut self, x: f64) -> Option<u8> {
        let update = self.gesture.update(x)?;
        if update.armed {
            self.pulse(haptics::ARMED_PULSE);
        }
        Some(update.progress)
    }

    pub fn pointer_up(&mut self, ctx: &mut C) -> SwipeRelease<R> {
        match self.gesture.end() {
            Release::Committed => {
                self.pulse(haptics::COMMIT_PATTERN);
                match self.on_complete.take() {
                    Some(on_complete) => {
                        tracing::debug!(variant = ?self.variant, "Swipe confirmed");
                        SwipeRelease::Completed(on_complete(ctx))
                    }
                    None => SwipeRelease::Ignored,
                }
            }
            Release::Cancelled => SwipeRelease::Cancelled,
            Release::Ignored => SwipeRelease::Ignored,
        }
    }

    pub fn pointer_cancel(&mut self) -> SwipeRelease<R> {
        match self.gesture.cancel() {
            Release::Ignored => SwipeRelease::Ignored,
            _ => SwipeRelease::Cancelled,
        }
    }

    /// One animation frame. Returns the progress while snapping back.
    pub fn frame(&mut self) -> Option<u8> {
        self.gesture.frame()
    }

    pub fn view(&self) -> SwipeView {
        let completed = self.is_completed();
        SwipeView {
            variant: self.variant,
            progress: self.gesture.progress(),
            dragging: self.gesture.phase() == GesturePhase::Dragging,
            completed,
            label: if completed {
                "Done!".to_string()
            } else {
                self.variant.prompt().to_string()
            },
        }
    }

    fn pulse(&self, pattern: &[u32]) {
        if self.haptics.is_supported() {
            self.haptics.vibrate(pattern);
        }
    }
}

impl<C, R> std::fmt::Debug for SwipeConfirmControl<'_, C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwipeConfirmControl")
            .field("variant", &self.variant)
            .field("gesture", &self.gesture)
            .field("pending_completion", &self.on_complete.is_some())
            .finish()
    }
}
