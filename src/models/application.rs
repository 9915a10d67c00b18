use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Equipment registration status. Strictly forward, no rejection path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    Reviewing,
    Approved,
    Monitoring,
}

impl ApplicationStatus {
    pub fn next(&self) -> Option<ApplicationStatus> {
        match self {
            ApplicationStatus::Draft => Some(ApplicationStatus::Submitted),
            ApplicationStatus::Submitted => Some(ApplicationStatus::Reviewing),
            ApplicationStatus::Reviewing => Some(ApplicationStatus::Approved),
            ApplicationStatus::Approved => Some(ApplicationStatus::Monitoring),
            ApplicationStatus::Monitoring => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Monitoring => "monitoring",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "Draft",
            ApplicationStatus::Submitted => "Application sent",
            ApplicationStatus::Reviewing => "Under review",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Monitoring => "Monitoring",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "Fill in the registration form",
            ApplicationStatus::Submitted => "Your application was sent successfully",
            ApplicationStatus::Reviewing => "We are reviewing your application",
            ApplicationStatus::Approved => "Equipment registration is complete",
            ApplicationStatus::Monitoring => "Monitoring power generation",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the registration form at submit time.
///
/// Only the fields the built-in validator looks at are typed; everything else
/// the form collects travels in `fields`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormSnapshot {
    pub name: String,
    pub name_kana: String,
    pub email: String,
    pub agree_main: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub at: DateTime<Utc>,
}
