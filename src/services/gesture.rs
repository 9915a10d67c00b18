/// Release strictly above this percentage commits
pub const COMMIT_THRESHOLD: u8 = 80;
/// Progress removed per animation frame while snapping back
pub const SNAP_BACK_STEP: u8 = 8;
/// First crossing of this percentage in a drag plays the "almost there" pulse
pub const HAPTIC_ARM_PERCENT: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureSettings {
    pub commit_threshold: u8,
    pub snap_back_step: u8,
    pub haptic_arm_percent: u8,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            commit_threshold: COMMIT_THRESHOLD,
            snap_back_step: SNAP_BACK_STEP,
            haptic_arm_percent: HAPTIC_ARM_PERCENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Dragging,
    SnappingBack,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Committed,
    Cancelled,
    /// Nothing was being dragged
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragUpdate {
    pub progress: u8,
    /// Progress first crossed the arming percentage on this update. Reported
    /// at most once per drag, falling back and re-crossing stays quiet.
    pub armed: bool,
}

/// Turns a one-axis pointer drag into a 0-100 progress value and a
/// commit-or-cancel decision at release.
#[derive(Debug, Clone)]
pub struct ProgressGesture {
    settings: GestureSettings,
    phase: GesturePhase,
    progress: u8,
    origin_x: f64,
    travel: f64,
    armed: bool,
}

impl Default for ProgressGesture {
    fn default() -> Self {
        Self::new(GestureSettings::default())
    }
}

impl ProgressGesture {
    pub fn new(settings: GestureSettings) -> Self {
        Self {
            settings: GestureSettings {
                snap_back_step: settings.snap_back_step.max(1),
                ..settings
            },
            phase: GesturePhase::Idle,
            progress: 0,
            origin_x: 0.0,
            travel: 0.0,
            armed: false,
        }
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_committed(&self) -> bool {
        self.phase == GesturePhase::Committed
    }

    pub fn settings(&self) -> GestureSettings {
        self.settings
    }

    /// Starts tracking a drag. Overrides any snap-back in flight.
    ///
    /// Returns false once committed.
    pub fn begin(&mut self, origin_x: f64, track_width_px: f64, thumb_width_px: f64) -> bool {
        if self.is_committed() {
            return false;
        }

        let travel = track_width_px - thumb_width_px;
        self.travel = if travel.is_finite() && travel > 0.0 {
            travel
        } else {
            0.0
        };
        self.origin_x = origin_x;
        self.progress = 0;
        self.armed = false;
        self.phase = GesturePhase::Dragging;

        tracing::debug!(origin_x, travel = self.travel, "Drag started");
        true
    }

    /// Recomputes progress from the drag origin. Safe to call on every move.
    pub fn update(&mut self, current_x: f64) -> Option<DragUpdate> {
        if self.phase != GesturePhase::Dragging || !current_x.is_finite() {
            return None;
        }

        let previous = self.progress;
        self.progress = if self.travel > 0.0 {
            let dx = (current_x - self.origin_x).clamp(0.0, self.travel);
            (dx / self.travel * 100.0).round() as u8
        } else {
            0
        };

        let arm = self.settings.haptic_arm_percent;
        let armed = !self.armed && previous <= arm && self.progress > arm;
        self.armed |= armed;
        Some(DragUpdate {
            progress: self.progress,
            armed,
        })
    }

    pub fn end(&mut self) -> Release {
        if self.phase != GesturePhase::Dragging {
            return Release::Ignored;
        }

        if self.progress > self.settings.commit_threshold {
            self.phase = GesturePhase::Committed;
            self.progress = 100;
            tracing::debug!("Drag committed");
            Release::Committed
        } else {
            self.start_snap_back();
            Release::Cancelled
        }
    }

    /// Pointer lost mid-drag (pointer-cancel, window blur). Never commits.
    pub fn cancel(&mut self) -> Release {
        if self.phase != GesturePhase::Dragging {
            return Release::Ignored;
        }
        self.start_snap_back();
        Release::Cancelled
    }

    /// Advances the snap-back animation by one frame.
    ///
    /// Returns the new progress, or None when nothing is animating.
    pub fn frame(&mut self) -> Option<u8> {
        if self.phase != GesturePhase::SnappingBack {
            return None;
        }

        self.progress = self.progress.saturating_sub(self.settings.snap_back_step);
        if self.progress == 0 {
            self.phase = GesturePhase::Idle;
        }
        Some(self.progress)
    }

    pub fn reset(&mut self) {
        self.phase = GesturePhase::Idle;
        self.progress = 0;
        self.armed = false;
    }

    fn start_snap_back(&mut self) {
        tracing::debug!(progress = self.progress, "Drag released below threshold");
        self.phase = if self.progress == 0 {
            GesturePhase::Idle
        } else {
            GesturePhase::SnappingBack
        };
    }
}
