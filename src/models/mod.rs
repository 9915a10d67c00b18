// Models module - in-memory entity representations

pub mod application;
pub mod coupon;
pub mod notice;
pub mod transaction;

pub use application::{ApplicationStatus, FormSnapshot, StatusChange};
pub use coupon::{Coupon, CouponStatus, CreateCouponData};
pub use notice::Notice;
pub use transaction::{Transaction, TransactionKind};
