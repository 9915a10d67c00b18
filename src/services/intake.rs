use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::application::{ApplicationStatus, FormSnapshot, StatusChange};
use crate::services::clock::Clock;
use crate::services::ids::{self, IdError, RandomSource};
use crate::services::timers::{TimerId, Timers};

/// Field name to user-facing message
pub type FieldErrors = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug)]
pub enum IntakeError {
    #[error("Form validation failed on {} field(s)", .0.len())]
    Invalid(FieldErrors),

    #[error("Application already submitted ({0})")]
    AlreadySubmitted(ApplicationStatus),

    #[error("Status update out of order: {from} cannot move to {to}")]
    OutOfOrder {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Application number generation failed: {0}")]
    IdGeneration(#[from] IdError),
}

/// Decides whether a form snapshot may be submitted
pub trait FormValidator: Send + Sync {
    fn validate(&self, form: &FormSnapshot) -> Result<(), FieldErrors>;
}

/// Name, name reading and email are required, and the main agreement must be
/// accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFieldsValidator;

impl FormValidator for RequiredFieldsValidator {
    fn validate(&self, form: &FormSnapshot) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if form.name.trim().is_empty() {
            errors.insert("name".into(), "Please enter your name".into());
        }
        if form.name_kana.trim().is_empty() {
            errors.insert("name_kana".into(), "Please enter the reading of your name".into());
        }
        if form.email.trim().is_empty() {
            errors.insert("email".into(), "Please enter your email address".into());
        }
        if !form.agree_main {
            errors.insert("agree_main".into(), "You must accept the main agreement".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Delays between automatic status steps, each relative to the previous step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceSchedule {
    pub to_reviewing: Duration,
    pub to_approved: Duration,
    pub to_monitoring: Duration,
}

impl Default for AdvanceSchedule {
    fn default() -> Self {
        Self {
            to_reviewing: Duration::from_millis(1500),
            to_approved: Duration::from_millis(1500),
            to_monitoring: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeSnapshot {
    pub status: ApplicationStatus,
    pub headline: &'static str,
    pub description: &'static str,
    pub application_number: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub history: Vec<StatusChange>,
}

/// Registration application: submit once, then move forward one status at a
/// time, either on its own timers or from external status updates.
pub struct ApplicationIntake {
    status: ApplicationStatus,
    application_number: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
    history: Vec<StatusChange>,
    schedule: AdvanceSchedule,
    timers: Timers<ApplicationStatus>,
    pending: Vec<TimerId>,
    validator: Box<dyn FormValidator>,
    clock: Arc<dyn Clock>,
}

impl ApplicationIntake {
    pub fn new(
        validator: Box<dyn FormValidator>,
        schedule: AdvanceSchedule,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            status: ApplicationStatus::Draft,
            application_number: None,
            submitted_at: None,
            history: Vec::new(),
            schedule,
            timers: Timers::new(),
            pending: Vec::new(),
            validator,
            clock,
        }
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn application_number(&self) -> Option<&str> {
        self.application_number.as_deref()
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// No automatic step is waiting
    pub fn is_idle(&self) -> bool {
        self.timers.is_idle()
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.timers
            .next_due()
            .map(|due| due.saturating_sub(self.timers.now()))
    }

    /// Validates and submits the form, returning the application number
    #[tracing::instrument(skip_all)]
    pub fn submit(
        &mut self,
        form: &FormSnapshot,
        rng: &mut dyn RandomSource,
    ) -> Result<String, IntakeError> {
        if self.status != ApplicationStatus::Draft {
            return Err(IntakeError::AlreadySubmitted(self.status));
        }

        if let Err(errors) = self.validator.validate(form) {
            let fields: Vec<&String> = errors.keys().collect();
            tracing::debug!(?fields, "Form rejected");
            return Err(IntakeError::Invalid(errors));
        }

        let number = ids::application_number(rng)?;
        self.application_number = Some(number.clone());
        self.submitted_at = Some(self.clock.now());
        self.transition(ApplicationStatus::Submitted);

        let steps = [
            (self.schedule.to_reviewing, ApplicationStatus::Reviewing),
            (self.schedule.to_approved, ApplicationStatus::Approved),
            (self.schedule.to_monitoring, ApplicationStatus::Monitoring),
        ];
        let mut delay = Duration::ZERO;
        for (step, target) in steps {
            delay += step;
            let id = self.timers.schedule(delay, target);
            self.pending.push(id);
        }

        tracing::info!(application_number = %number, "Application submitted");
        Ok(number)
    }

    /// Moves virtual time forward and applies every status step that came due.
    ///
    /// Returns the statuses entered.
    pub fn advance_time(&mut self, by: Duration) -> Vec<ApplicationStatus> {
        let mut entered = Vec::new();
        for target in self.timers.advance(by) {
            if self.status.next() == Some(target) {
                self.transition(target);
                entered.push(target);
            } else {
                tracing::debug!(
                    current = %self.status,
                    stale = %target,
                    "Skipping stale status step"
                );
            }
        }
        if self.timers.is_idle() {
            self.pending.clear();
        }
        entered
    }

    /// Applies a status pushed by an external feed. Only the next status in
    /// line is accepted; repeating the current status is a no-op.
    pub fn apply_update(&mut self, to: ApplicationStatus) -> Result<bool, IntakeError> {
        if to == self.status && self.status != ApplicationStatus::Draft {
            return Ok(false);
        }
        if self.status == ApplicationStatus::Draft || self.status.next() != Some(to) {
            return Err(IntakeError::OutOfOrder {
                from: self.status,
                to,
            });
        }
        self.transition(to);
        Ok(true)
    }

    /// Cancels every pending automatic step. Returns how many were cancelled.
    pub fn teardown(&mut self) -> usize {
        let cancelled = self
            .pending
            .drain(..)
            .filter(|id| self.timers.cancel(*id))
            .count();
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled pending status steps");
        }
        cancelled
    }

    pub fn snapshot(&self) -> IntakeSnapshot {
        IntakeSnapshot {
            status: self.status,
            headline: self.status.headline(),
            description: self.status.description(),
            application_number: self.application_number.clone(),
            submitted_at: self.submitted_at,
            history: self.history.clone(),
        }
    }

    fn transition(&mut self, to: ApplicationStatus) {
        let change = StatusChange {
            from: self.status,
            to,
            at: self.clock.now(),
        };
        tracing::info!(from = %change.from, to = %change.to, "Application status changed");
        self.status = to;
        self.history.push(change);
    }
}

impl std::fmt::Debug for ApplicationIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationIntake")
            .field("status", &self.status)
            .field("application_number", &self.application_number)
            .field("pending_steps", &self.timers.pending_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::SystemClock;
    use crate::services::ids::SequenceRandom;

    fn valid_form() -> FormSnapshot {
        FormSnapshot {
            name: "Hanako Sato".into(),
            name_kana: "Sato Hanako".into(),
            email: "hanako@example.com".into(),
            agree_main: true,
            ..FormSnapshot::default()
        }
    }

    fn intake() -> ApplicationIntake {
        ApplicationIntake::new(
            Box::new(RequiredFieldsValidator),
            AdvanceSchedule {
                to_reviewing: Duration::from_secs(2),
                to_approved: Duration::from_secs(3),
                to_monitoring: Duration::from_secs(4),
            },
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn test_validator_reports_each_missing_field() {
        let errors = RequiredFieldsValidator
            .validate(&FormSnapshot {
                name: "  ".into(),
                ..FormSnapshot::default()
            })
            .unwrap_err();

        let fields: Vec<&str> = errors.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["agree_main", "email", "name", "name_kana"]);
        assert!(RequiredFieldsValidator.validate(&valid_form()).is_ok());
    }

    #[test]
    fn test_invalid_form_stays_draft() {
        let mut intake = intake();
        let mut rng = SequenceRandom::new(vec![1]);

        let result = intake.submit(&FormSnapshot::default(), &mut rng);

        assert!(matches!(result, Err(IntakeError::Invalid(errors)) if errors.len() == 4));
        assert_eq!(intake.status(), ApplicationStatus::Draft);
        assert!(intake.is_idle());
    }

    #[test]
    fn test_auto_advance_on_virtual_time() {
        let mut intake = intake();
        let mut rng = SequenceRandom::new(vec![119_304_648]);

        let number = intake.submit(&valid_form(), &mut rng).unwrap();
        assert_eq!(number, "AP-111111");
        assert_eq!(intake.application_number(), Some("AP-111111"));
        assert_eq!(intake.status(), ApplicationStatus::Submitted);
        assert_eq!(intake.next_due(), Some(Duration::from_secs(2)));

        assert!(intake.advance_time(Duration::from_millis(1999)).is_empty());
        assert_eq!(
            intake.advance_time(Duration::from_millis(1)),
            vec![ApplicationStatus::Reviewing]
        );
        assert_eq!(intake.next_due(), Some(Duration::from_secs(3)));
        assert_eq!(
            intake.advance_time(Duration::from_secs(10)),
            vec![ApplicationStatus::Approved, ApplicationStatus::Monitoring]
        );
        assert!(intake.is_idle());

        let path: Vec<ApplicationStatus> = intake.history().iter().map(|c| c.to).collect();
        assert_eq!(
            path,
            vec![
                ApplicationStatus::Submitted,
                ApplicationStatus::Reviewing,
                ApplicationStatus::Approved,
                ApplicationStatus::Monitoring,
            ]
        );
    }

    #[test]
    fn test_submit_twice_rejected() {
        let mut intake = intake();
        let mut rng = SequenceRandom::new(vec![5]);
        intake.submit(&valid_form(), &mut rng).unwrap();

        assert!(matches!(
            intake.submit(&valid_form(), &mut rng),
            Err(IntakeError::AlreadySubmitted(ApplicationStatus::Submitted))
        ));
    }

    #[test]
    fn test_external_update_only_moves_one_step() {
        let mut intake = intake();
        let mut rng = SequenceRandom::new(vec![5]);

        assert!(matches!(
            intake.apply_update(ApplicationStatus::Submitted),
            Err(IntakeError::OutOfOrder { .. })
        ));

        intake.submit(&valid_form(), &mut rng).unwrap();

        assert!(matches!(
            intake.apply_update(ApplicationStatus::Approved),
            Err(IntakeError::OutOfOrder { .. })
        ));
        assert!(intake.apply_update(ApplicationStatus::Reviewing).unwrap());
        assert!(!intake.apply_update(ApplicationStatus::Reviewing).unwrap());
        assert!(matches!(
            intake.apply_update(ApplicationStatus::Submitted),
            Err(IntakeError::OutOfOrder { .. })
        ));

        // the timer for reviewing is now stale and skipped
        assert!(intake.advance_time(Duration::from_secs(2)).is_empty());
        assert_eq!(
            intake.advance_time(Duration::from_secs(3)),
            vec![ApplicationStatus::Approved]
        );
    }

    #[test]
    fn test_teardown_cancels_pending_steps() {
        let mut intake = intake();
        let mut rng = SequenceRandom::new(vec![5]);
        intake.submit(&valid_form(), &mut rng).unwrap();
        intake.advance_time(Duration::from_secs(2));

        assert_eq!(intake.teardown(), 2);
        assert!(intake.is_idle());
        assert!(intake.advance_time(Duration::from_secs(60)).is_empty());
        assert_eq!(intake.status(), ApplicationStatus::Reviewing);
        assert_eq!(intake.teardown(), 0);
    }

    #[test]
    fn test_snapshot() {
        let mut intake = intake();
        let mut rng = SequenceRandom::new(vec![5]);
        intake.submit(&valid_form(), &mut rng).unwrap();

        let json = serde_json::to_value(intake.snapshot()).unwrap();

        assert_eq!(json["status"], "submitted");
        assert_eq!(json["headline"], "Application sent");
        assert_eq!(json["history"].as_array().unwrap().len(), 1);
    }
}
