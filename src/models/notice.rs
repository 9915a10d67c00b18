use serde::Serialize;

/// Transient user-facing message, shown once and then dismissed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Notice {
    Redeemed { brand: String },
    InsufficientBalance,
    Used { brand: String },
    ApplicationSubmitted { number: String },
    Rejected(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Redeemed { brand } => format!("✅ Exchanged for a {} coupon", brand),
            Notice::InsufficientBalance => "❌ Not enough credit balance".to_string(),
            Notice::Used { brand } => format!("{} coupon used", brand),
            Notice::ApplicationSubmitted { number } => {
                format!("Application {} submitted", number)
            }
            Notice::Rejected(reason) => format!("❌ {}", reason),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::InsufficientBalance | Notice::Rejected(_))
    }
}
