use std::sync::Mutex;

/// Pulse at drag start (ms)
pub const DRAG_START_PULSE: &[u32] = &[10];
/// Pulse when a drag first passes the arming point
pub const ARMED_PULSE: &[u32] = &[15];
/// Vibrate, pause, vibrate on commit
pub const COMMIT_PATTERN: &[u32] = &[50, 50, 50];

/// Best-effort device vibration.
///
/// Never required for correctness; callers check `is_supported` and skip the
/// call otherwise.
pub trait Haptics: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Alternating vibrate/pause durations in milliseconds
    fn vibrate(&self, pattern: &[u32]);
}

/// Devices without a vibration motor
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn is_supported(&self) -> bool {
        false
    }

    fn vibrate(&self, _pattern: &[u32]) {}
}

/// Writes each pulse to the log instead of a motor
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHaptics;

impl Haptics for TracingHaptics {
    fn is_supported(&self) -> bool {
        true
    }

    fn vibrate(&self, pattern: &[u32]) {
        tracing::debug!(?pattern, "Haptic pulse");
    }
}

/// Keeps every pattern it was asked to play
#[derive(Debug, Default)]
pub struct RecordingHaptics {
    pulses: Mutex<Vec<Vec<u32>>>,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self) -> Vec<Vec<u32>> {
        match self.pulses.lock() {
            Ok(pulses) => pulses.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Haptics for RecordingHaptics {
    fn is_supported(&self) -> bool {
        true
    }

    fn vibrate(&self, pattern: &[u32]) {
        if let Ok(mut pulses) = self.pulses.lock() {
            pulses.push(pattern.to_vec());
        }
    }
}
