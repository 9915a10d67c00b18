use std::str::FromStr;
use std::time::Duration;

use config::ConfigError;
use rust_decimal::Decimal;

use crate::services::gesture::GestureSettings;
use crate::services::intake::AdvanceSchedule;

#[derive(Debug, Clone)]
pub struct Config {
    // Credits
    pub initial_balance_t: Decimal,

    // Swipe gesture
    pub commit_threshold: u8,
    pub haptic_arm_percent: u8,
    pub snap_back_step: u8,
    pub thumb_width_px: f64,
    pub track_width_px: f64,
    pub haptics_enabled: bool,

    // Application status auto-advance
    pub review_delay_ms: u64,
    pub approve_delay_ms: u64,
    pub monitor_delay_ms: u64,
    pub status_tick_ms: u64,

    // Display
    pub history_limit: usize,

    // Fixed seed for reproducible sessions; system randomness when unset
    pub random_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_balance_t: Decimal::new(25, 1),
            commit_threshold: 80,
            haptic_arm_percent: 85,
            snap_back_step: 8,
            thumb_width_px: 56.0,
            track_width_px: 320.0,
            haptics_enabled: true,
            review_delay_ms: 1500,
            approve_delay_ms: 1500,
            monitor_delay_ms: 1500,
            status_tick_ms: 100,
            history_limit: 20,
            random_seed: None,
        }
    }
}

impl Config {
    /// Loads `DECOPON__*` environment variables on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        Self::with_environment(Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("DECOPON").separator("__")
    }

    fn with_environment(env: config::Environment) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?.add_source(env).build()?;
        Self::from_settings(&settings)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let d = Self::default();
        config::Config::builder()
            .set_default("initial_balance_t", d.initial_balance_t.to_string())?
            .set_default("commit_threshold", i64::from(d.commit_threshold))?
            .set_default("haptic_arm_percent", i64::from(d.haptic_arm_percent))?
            .set_default("snap_back_step", i64::from(d.snap_back_step))?
            .set_default("thumb_width_px", d.thumb_width_px)?
            .set_default("track_width_px", d.track_width_px)?
            .set_default("haptics_enabled", d.haptics_enabled)?
            .set_default("review_delay_ms", d.review_delay_ms as i64)?
            .set_default("approve_delay_ms", d.approve_delay_ms as i64)?
            .set_default("monitor_delay_ms", d.monitor_delay_ms as i64)?
            .set_default("status_tick_ms", d.status_tick_ms as i64)?
            .set_default("history_limit", d.history_limit as i64)
    }

    fn from_settings(config: &config::Config) -> Result<Self, ConfigError> {
        let balance: String = config.get("initial_balance_t")?;
        let initial_balance_t = Decimal::from_str(balance.trim())
            .map_err(|e| ConfigError::Message(format!("initial_balance_t: {}", e)))?;
        if initial_balance_t.is_sign_negative() {
            return Err(ConfigError::Message(
                "initial_balance_t must not be negative".to_string(),
            ));
        }

        let commit_threshold: u8 = config.get("commit_threshold")?;
        if commit_threshold >= 100 {
            return Err(ConfigError::Message(
                "commit_threshold must be below 100".to_string(),
            ));
        }

        Ok(Self {
            initial_balance_t,
            commit_threshold,
            haptic_arm_percent: config.get("haptic_arm_percent")?,
            snap_back_step: config.get::<u8>("snap_back_step")?.max(1),
            thumb_width_px: config.get("thumb_width_px")?,
            track_width_px: config.get("track_width_px")?,
            haptics_enabled: config.get("haptics_enabled")?,
            review_delay_ms: config.get("review_delay_ms")?,
            approve_delay_ms: config.get("approve_delay_ms")?,
            monitor_delay_ms: config.get("monitor_delay_ms")?,
            status_tick_ms: config.get("status_tick_ms")?,
            history_limit: config.get("history_limit")?,
            random_seed: match config.get::<u64>("random_seed") {
                Ok(seed) => Some(seed),
                Err(ConfigError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
        })
    }

    pub fn gesture_settings(&self) -> GestureSettings {
        GestureSettings {
            commit_threshold: self.commit_threshold,
            snap_back_step: self.snap_back_step,
            haptic_arm_percent: self.haptic_arm_percent,
        }
    }

    pub fn advance_schedule(&self) -> AdvanceSchedule {
        AdvanceSchedule {
            to_reviewing: Duration::from_millis(self.review_delay_ms),
            to_approved: Duration::from_millis(self.approve_delay_ms),
            to_monitoring: Duration::from_millis(self.monitor_delay_ms),
        }
    }

    pub fn status_tick(&self) -> Duration {
        Duration::from_millis(self.status_tick_ms.max(1))
    }
}
