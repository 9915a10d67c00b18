use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::models::ApplicationStatus;
use crate::services::intake::ApplicationIntake;

#[derive(Debug, Default)]
pub struct StatusFeedStats {
    pub ticks: usize,
    pub transitions: usize,
    pub final_status: Option<ApplicationStatus>,
}

/// Drives the application's automatic status steps in real time.
///
/// On every tick the intake's virtual timers are advanced by the time that
/// actually elapsed since the previous tick. Returns once no step is pending,
/// so a torn-down or never-submitted intake returns immediately.
pub async fn run_status_feed(intake: &mut ApplicationIntake, tick: Duration) -> StatusFeedStats {
    let mut stats = StatusFeedStats::default();

    if intake.is_idle() {
        stats.final_status = Some(intake.status());
        return stats;
    }

    tracing::info!(
        status = %intake.status(),
        next_due_ms = intake.next_due().map(|d| d.as_millis() as u64),
        "Starting status feed"
    );

    let mut interval = time::interval(tick.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    while !intake.is_idle() {
        interval.tick().await;
        let now = Instant::now();
        let entered = intake.advance_time(now - last);
        last = now;

        stats.ticks += 1;
        stats.transitions += entered.len();
        for status in entered {
            tracing::info!(status = %status, headline = status.headline(), "Status feed update");
        }
    }

    stats.final_status = Some(intake.status());
    tracing::info!(?stats, "Status feed drained");

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormSnapshot;
    use crate::services::clock::SystemClock;
    use crate::services::ids::SequenceRandom;
    use crate::services::intake::{AdvanceSchedule, RequiredFieldsValidator};
    use std::sync::Arc;

    fn submitted_intake() -> ApplicationIntake {
        let mut intake = ApplicationIntake::new(
            Box::new(RequiredFieldsValidator),
            AdvanceSchedule {
                to_reviewing: Duration::from_millis(1500),
                to_approved: Duration::from_millis(1500),
                to_monitoring: Duration::from_millis(1500),
            },
            Arc::new(SystemClock),
        );
        let form = FormSnapshot {
            name: "Taro Yamada".into(),
            name_kana: "Yamada Taro".into(),
            email: "taro@example.com".into(),
            agree_main: true,
            ..FormSnapshot::default()
        };
        intake
            .submit(&form, &mut SequenceRandom::new(vec![7]))
            .unwrap();
        intake
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_runs_to_monitoring() {
        let mut intake = submitted_intake();
        let started = Instant::now();

        let stats = run_status_feed(&mut intake, Duration::from_millis(100)).await;

        assert_eq!(stats.transitions, 3);
        assert_eq!(stats.final_status, Some(ApplicationStatus::Monitoring));
        assert_eq!(intake.status(), ApplicationStatus::Monitoring);
        assert!(intake.is_idle());
        assert!(started.elapsed() >= Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_intake_returns_immediately() {
        let mut intake = submitted_intake();
        intake.teardown();

        let stats = run_status_feed(&mut intake, Duration::from_millis(100)).await;

        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.final_status, Some(ApplicationStatus::Submitted));
    }
}
