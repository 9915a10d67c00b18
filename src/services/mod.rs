// Services module - Business logic

pub mod barcode;
pub mod clock;
pub mod gesture;
pub mod haptics;
pub mod ids;
pub mod intake;
pub mod ledger;
pub mod swipe_confirm;
pub mod timers;
pub mod transaction_log;
