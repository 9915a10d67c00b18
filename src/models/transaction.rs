use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Redeem,
    Use,
}

/// Immutable history record for one successful ledger operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub coupon_id: Uuid,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_delta: Option<Decimal>, // t spent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_delta: Option<u32>, // yen
    pub at: DateTime<Utc>,
}

impl Transaction {
    /// Short amount string for history rows: `-0.5t` for redemptions, `¥500` for use
    pub fn display_amount(&self) -> String {
        match self.kind {
            TransactionKind::Redeem => format!(
                "-{}t",
                self.credit_delta.unwrap_or(Decimal::ZERO).normalize()
            ),
            TransactionKind::Use => format!(
                "¥{}",
                crate::models::coupon::format_yen(self.amount_delta.unwrap_or(0))
            ),
        }
    }
}
