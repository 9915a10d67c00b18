use thiserror::Error;

use crate::models::Notice;
use crate::services::{
    barcode::BarcodeError,
    intake::IntakeError,
    ledger::LedgerError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Application error: {0}")]
    Intake(#[from] IntakeError),

    #[error("Barcode error: {0}")]
    Barcode(#[from] BarcodeError),

    #[error("No confirmation sheet is open")]
    NoSheet,
}

impl AppError {
    /// What the user sees for this error
    pub fn notice(&self) -> Notice {
        match self {
            AppError::Ledger(LedgerError::InsufficientBalance { .. }) => {
                Notice::InsufficientBalance
            }
            AppError::Ledger(LedgerError::InvalidTransition { .. })
            | AppError::Ledger(LedgerError::CouponNotFound(_)) => {
                Notice::Rejected("This coupon is no longer available".to_string())
            }
            AppError::Intake(IntakeError::Invalid(_)) => {
                Notice::Rejected("Please check the highlighted fields".to_string())
            }
            AppError::Intake(IntakeError::AlreadySubmitted(_)) => {
                Notice::Rejected("Your application has already been sent".to_string())
            }
            AppError::NoSheet => Notice::Rejected("Nothing to confirm".to_string()),
            _ => Notice::Rejected("Something went wrong, please try again".to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
