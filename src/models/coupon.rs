use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a coupon. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    Redeemable,
    Usable,
    Used,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Redeemable => "redeemable",
            CouponStatus::Usable => "usable",
            CouponStatus::Used => "used",
        }
    }
}

impl std::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub brand: String,
    pub face: u32, // yen
    pub need_t: Decimal, // t CO2-eq
    pub status: CouponStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
    pub code: Option<String>,
    pub pin: Option<String>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Catalog entry for a coupon that has not been issued to a ledger yet
#[derive(Debug, Clone)]
pub struct CreateCouponData {
    pub brand: String,
    pub face: u32,
    pub need_t: Decimal,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub products: Vec<String>,
}

impl CreateCouponData {
    pub fn new(brand: impl Into<String>, face: u32, need_t: Decimal) -> Self {
        Self {
            brand: brand.into(),
            face,
            need_t,
            icon: None,
            description: None,
            products: Vec::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.products = products.into_iter().map(Into::into).collect();
        self
    }
}

impl Coupon {
    /// Creates a fresh redeemable coupon from catalog data
    pub fn issue(id: Uuid, data: CreateCouponData) -> Self {
        Self {
            id,
            brand: data.brand,
            face: data.face,
            need_t: data.need_t.max(Decimal::ZERO),
            status: CouponStatus::Redeemable,
            icon: data.icon,
            description: data.description,
            products: data.products,
            code: None,
            pin: None,
            redeemed_at: None,
            used_at: None,
        }
    }

    /// Display label used for transaction history, e.g. `Amazon ¥1,000`
    pub fn label(&self) -> String {
        format!("{} ¥{}", self.brand, format_yen(self.face))
    }
}

/// Formats an amount with thousands separators
pub fn format_yen(amount: u32) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// The coupons every new session starts with
pub fn default_catalog() -> Vec<CreateCouponData> {
    vec![
        CreateCouponData::new("Starbucks", 500, Decimal::new(5, 1))
            .with_icon("☕")
            .with_description("Valid for any drink")
            .with_products(["Coffee", "Frappuccino", "Tea"]),
        CreateCouponData::new("Amazon", 1000, Decimal::new(10, 1))
            .with_icon("📦")
            .with_description("For purchases on Amazon.co.jp")
            .with_products(["Books", "Household goods", "Electronics"]),
        CreateCouponData::new("Uber Eats", 800, Decimal::new(8, 1))
            .with_icon("🍔")
            .with_description("Delivery fee included")
            .with_products(["Restaurant meals", "Fast food", "Convenience store items"]),
    ]
}
