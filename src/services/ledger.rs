use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    coupon::{Coupon, CouponStatus, CreateCouponData},
    transaction::{Transaction, TransactionKind},
};
use crate::services::barcode::Barcode;
use crate::services::clock::Clock;
use crate::services::ids::{self, IdError, RandomSource};
use crate::services::transaction_log::TransactionLog;

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("Insufficient balance: need {needed}t, have {available}t")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Coupon {coupon_id} is {status}, cannot {attempted}")]
    InvalidTransition {
        coupon_id: Uuid,
        status: CouponStatus,
        attempted: &'static str,
    },

    #[error("Coupon not found: {0}")]
    CouponNotFound(Uuid),

    #[error("Identifier generation failed: {0}")]
    IdGeneration(#[from] IdError),
}

/// Outcome of a successful redemption
#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
    pub coupon: Coupon,
    pub transaction: Transaction,
    pub balance: Decimal,
}

/// Everything the one-time barcode screen shows after a coupon is used
#[derive(Debug, Clone, Serialize)]
pub struct BarcodeReveal {
    pub coupon_id: Uuid,
    pub brand: String,
    pub face: u32,
    pub code: String,
    pub pin: String,
    pub barcode: Barcode,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub balance: Decimal,
    pub usable_count: usize,
    pub coupons: Vec<Coupon>,
    pub history: Vec<Transaction>,
}

/// Rounds a credit amount to one decimal place, half-up, never below zero
pub fn round_credit(amount: Decimal) -> Decimal {
    amount
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ZERO)
}

/// Owns the coupons, the credit balance and the transaction history of one
/// session. Every mutation goes through `redeem` or `consume`.
pub struct CouponLedger {
    balance: Decimal,
    coupons: Vec<Coupon>,
    log: TransactionLog,
    rng: Box<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl CouponLedger {
    pub fn new(balance: Decimal, rng: Box<dyn RandomSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            balance: balance.max(Decimal::ZERO),
            coupons: Vec::new(),
            log: TransactionLog::new(),
            rng,
            clock,
        }
    }

    /// Creates a ledger pre-loaded with redeemable coupons
    pub fn with_catalog(
        balance: Decimal,
        catalog: Vec<CreateCouponData>,
        rng: Box<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self::new(balance, rng, clock);
        for data in catalog {
            ledger.add_coupon(data)?;
        }
        Ok(ledger)
    }

    pub fn add_coupon(&mut self, data: CreateCouponData) -> Result<Uuid, LedgerError> {
        let id = ids::uuid(self.rng.as_mut())?;
        self.coupons.push(Coupon::issue(id, data));
        Ok(id)
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn coupons(&self) -> &[Coupon] {
        &self.coupons
    }

    pub fn coupon(&self, coupon_id: Uuid) -> Option<&Coupon> {
        self.coupons.iter().find(|c| c.id == coupon_id)
    }

    pub fn redeemable(&self) -> impl Iterator<Item = &Coupon> {
        self.with_status(CouponStatus::Redeemable)
    }

    pub fn usable(&self) -> impl Iterator<Item = &Coupon> {
        self.with_status(CouponStatus::Usable)
    }

    pub fn used(&self) -> impl Iterator<Item = &Coupon> {
        self.with_status(CouponStatus::Used)
    }

    /// Whether the balance covers this coupon and it is still redeemable
    pub fn can_redeem(&self, coupon_id: Uuid) -> bool {
        self.coupon(coupon_id).is_some_and(|c| {
            c.status == CouponStatus::Redeemable && self.balance >= c.need_t
        })
    }

    pub fn history(&self) -> &TransactionLog {
        &self.log
    }

    pub fn snapshot(&self, history_limit: usize) -> LedgerSnapshot {
        LedgerSnapshot {
            balance: self.balance,
            usable_count: self.usable().count(),
            coupons: self.coupons.clone(),
            history: self.log.recent(history_limit).cloned().collect(),
        }
    }

    /// Spends credit to unlock a coupon's code and PIN.
    ///
    /// An insufficient balance is an expected outcome: nothing changes and the
    /// caller gets `InsufficientBalance` to show the user.
    #[tracing::instrument(skip_all, fields(coupon_id = %coupon_id))]
    pub fn redeem(&mut self, coupon_id: Uuid) -> Result<Redemption, LedgerError> {
        let index = self.checked_index(coupon_id, CouponStatus::Redeemable, "redeem")?;
        let (need_t, face, label) = {
            let c = &self.coupons[index];
            (c.need_t, c.face, c.label())
        };

        if self.balance < need_t {
            tracing::info!(
                balance = %self.balance,
                need_t = %need_t,
                "Redeem rejected: insufficient balance"
            );
            return Err(LedgerError::InsufficientBalance {
                needed: need_t,
                available: self.balance,
            });
        }

        // Draw everything fallible before touching state
        let code = ids::coupon_code(self.rng.as_mut())?;
        let pin = ids::pin(self.rng.as_mut())?;
        let tx_id = ids::uuid(self.rng.as_mut())?;
        let now = self.clock.now();

        self.balance = round_credit(self.balance - need_t);

        let coupon = &mut self.coupons[index];
        coupon.status = CouponStatus::Usable;
        coupon.code = Some(code);
        coupon.pin = Some(pin);
        coupon.redeemed_at = Some(now);
        let coupon = coupon.clone();

        let transaction = Transaction {
            id: tx_id,
            kind: TransactionKind::Redeem,
            coupon_id,
            label,
            credit_delta: Some(need_t),
            amount_delta: Some(face),
            at: now,
        };
        self.log.append(transaction.clone());

        tracing::info!(
            brand = %coupon.brand,
            need_t = %need_t,
            balance = %self.balance,
            "Coupon redeemed"
        );

        Ok(Redemption {
            coupon,
            transaction,
            balance: self.balance,
        })
    }

    /// Marks a usable coupon as used. Irreversible.
    #[tracing::instrument(skip_all, fields(coupon_id = %coupon_id))]
    pub fn consume(&mut self, coupon_id: Uuid) -> Result<BarcodeReveal, LedgerError> {
        let index = self.checked_index(coupon_id, CouponStatus::Usable, "use")?;

        let tx_id = ids::uuid(self.rng.as_mut())?;
        let now = self.clock.now();

        let coupon = &mut self.coupons[index];
        coupon.status = CouponStatus::Used;
        coupon.used_at = Some(now);

        let code = coupon.code.clone().unwrap_or_default();
        let transaction = Transaction {
            id: tx_id,
            kind: TransactionKind::Use,
            coupon_id,
            label: coupon.label(),
            credit_delta: None,
            amount_delta: Some(coupon.face),
            at: now,
        };

        let reveal = BarcodeReveal {
            coupon_id,
            brand: coupon.brand.clone(),
            face: coupon.face,
            barcode: Barcode::from_seed(&code),
            code,
            pin: coupon.pin.clone().unwrap_or_default(),
            transaction: transaction.clone(),
        };
        self.log.append(transaction);

        tracing::info!(brand = %reveal.brand, face = reveal.face, "Coupon used");

        Ok(reveal)
    }

    fn with_status(&self, status: CouponStatus) -> impl Iterator<Item = &Coupon> {
        self.coupons.iter().filter(move |c| c.status == status)
    }

    /// Fails unless the coupon exists and is currently `expected`
    pub fn ensure_status(
        &self,
        coupon_id: Uuid,
        expected: CouponStatus,
        attempted: &'static str,
    ) -> Result<&Coupon, LedgerError> {
        let index = self.checked_index(coupon_id, expected, attempted)?;
        Ok(&self.coupons[index])
    }

    fn checked_index(
        &self,
        coupon_id: Uuid,
        expected: CouponStatus,
        attempted: &'static str,
    ) -> Result<usize, LedgerError> {
        let index = self.index_of(coupon_id)?;
        let status = self.coupons[index].status;
        if status != expected {
            tracing::warn!(
                coupon_id = %coupon_id,
                status = %status,
                attempted,
                "Coupon transition rejected"
            );
            return Err(LedgerError::InvalidTransition {
                coupon_id,
                status,
                attempted,
            });
        }
        Ok(index)
    }

    fn index_of(&self, coupon_id: Uuid) -> Result<usize, LedgerError> {
        self.coupons
            .iter()
            .position(|c| c.id == coupon_id)
            .ok_or_else(|| {
                tracing::warn!(coupon_id = %coupon_id, "Unknown coupon");
                LedgerError::CouponNotFound(coupon_id)
            })
    }
}

impl std::fmt::Debug for CouponLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouponLedger")
            .field("balance", &self.balance)
            .field("coupons", &self.coupons)
            .field("history_len", &self.log.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use crate::services::ids::SequenceRandom;
    use chrono::{DateTime, Utc};
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use std::str::FromStr;

    fn t(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-04-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ledger_with(balance: &str, needs: &[&str]) -> (CouponLedger, Vec<Uuid>, ManualClock) {
        let clock = ManualClock::new(start());
        let catalog = needs
            .iter()
            .enumerate()
            .map(|(i, need)| {
                CreateCouponData::new(format!("Brand {}", i), 500 * (i as u32 + 1), t(need))
            })
            .collect();
        let ledger = CouponLedger::with_catalog(
            t(balance),
            catalog,
            Box::new(StdRng::seed_from_u64(99)),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let ids = ledger.coupons().iter().map(|c| c.id).collect();
        (ledger, ids, clock)
    }

    /// Serves `remaining` fills of zero bytes, then fails
    struct Exhausting {
        remaining: usize,
    }

    impl RngCore for Exhausting {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            if self.remaining == 0 {
                return Err(rand::Error::new(IdError::RandomUnavailable));
            }
            self.remaining -= 1;
            dest.fill(0);
            Ok(())
        }
    }

    #[test]
    fn test_redeem_deducts_balance() {
        let (mut ledger, ids, _) = ledger_with("2.5", &["0.5"]);

        let redemption = ledger.redeem(ids[0]).unwrap();

        assert_eq!(ledger.balance(), t("2.0"));
        assert_eq!(redemption.balance, t("2.0"));
        assert_eq!(ledger.coupon(ids[0]).unwrap().status, CouponStatus::Usable);
        assert_eq!(ledger.history().len(), 1);

        let tx = ledger.history().latest().unwrap();
        assert_eq!(tx.kind, TransactionKind::Redeem);
        assert_eq!(tx.credit_delta, Some(t("0.5")));
        assert_eq!(tx.amount_delta, Some(500));
        assert_eq!(tx.label, "Brand 0 ¥500");
        assert_eq!(tx.at, start());
    }

    #[test]
    fn test_redeem_rejected_when_balance_short() {
        let (mut ledger, ids, _) = ledger_with("0.3", &["0.5"]);

        let result = ledger.redeem(ids[0]);

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { needed, available })
                if needed == t("0.5") && available == t("0.3")
        ));
        assert_eq!(ledger.balance(), t("0.3"));
        assert!(ledger.history().is_empty());
        let coupon = ledger.coupon(ids[0]).unwrap();
        assert_eq!(coupon.status, CouponStatus::Redeemable);
        assert!(coupon.code.is_none());
        assert!(!ledger.can_redeem(ids[0]));
    }

    #[test]
    fn test_redeem_exact_balance_reaches_zero() {
        let (mut ledger, ids, _) = ledger_with("0.8", &["0.8"]);

        ledger.redeem(ids[0]).unwrap();

        assert_eq!(ledger.balance(), Decimal::ZERO);
    }

    #[test]
    fn test_balance_rounds_half_up() {
        let (mut ledger, ids, _) = ledger_with("1.25", &["0.1"]);

        ledger.redeem(ids[0]).unwrap();

        assert_eq!(ledger.balance(), t("1.2"));
        assert_eq!(round_credit(t("0.05")), t("0.1"));
        assert_eq!(round_credit(t("0.04")), t("0.0"));
        assert_eq!(round_credit(t("-0.3")), Decimal::ZERO);
    }

    #[test]
    fn test_code_and_pin_format() {
        let (mut ledger, ids, _) = ledger_with("5", &["1"]);

        let coupon = ledger.redeem(ids[0]).unwrap().coupon;
        let code = coupon.code.unwrap();
        let pin: u32 = coupon.pin.unwrap().parse().unwrap();

        assert!(code.starts_with("DC-"));
        assert_eq!(code.len(), "DC-XXXXXX-YYYY".len());
        assert!((1000..=9999).contains(&pin));
    }

    #[test]
    fn test_deterministic_source_gives_exact_code() {
        let clock = ManualClock::new(start());
        let mut ledger = CouponLedger::new(
            t("1"),
            // each draw maps to '1' in base 36 and to 1250 as a PIN
            Box::new(SequenceRandom::new(vec![119_304_648])),
            Arc::new(clock),
        );
        let id = ledger
            .add_coupon(CreateCouponData::new("Amazon", 1000, t("1.0")))
            .unwrap();

        let coupon = ledger.redeem(id).unwrap().coupon;

        assert_eq!(coupon.code.as_deref(), Some("DC-111111-1111"));
        assert_eq!(coupon.pin.as_deref(), Some("1250"));
    }

    #[test]
    fn test_code_and_pin_survive_consume() {
        let (mut ledger, ids, clock) = ledger_with("2.5", &["0.5"]);
        let redeemed = ledger.redeem(ids[0]).unwrap().coupon;

        clock.advance(chrono::Duration::minutes(5));
        let reveal = ledger.consume(ids[0]).unwrap();
        let coupon = ledger.coupon(ids[0]).unwrap();

        assert_eq!(coupon.status, CouponStatus::Used);
        assert_eq!(coupon.code, redeemed.code);
        assert_eq!(coupon.pin, redeemed.pin);
        assert_eq!(Some(reveal.code.clone()), redeemed.code);
        assert_eq!(Some(reveal.pin.clone()), redeemed.pin);
        assert_eq!(reveal.barcode, Barcode::from_seed(&reveal.code));
        assert_eq!(coupon.redeemed_at, Some(start()));
        assert_eq!(coupon.used_at, Some(start() + chrono::Duration::minutes(5)));
    }

    #[test]
    fn test_consume_appends_use_transaction() {
        let (mut ledger, ids, _) = ledger_with("2.5", &["0.5"]);
        ledger.redeem(ids[0]).unwrap();
        let balance = ledger.balance();

        ledger.consume(ids[0]).unwrap();

        assert_eq!(ledger.balance(), balance);
        let kinds: Vec<TransactionKind> = ledger.history().iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TransactionKind::Use, TransactionKind::Redeem]);

        let tx = ledger.history().latest().unwrap();
        assert_eq!(tx.amount_delta, Some(500));
        assert_eq!(tx.credit_delta, None);
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let (mut ledger, ids, _) = ledger_with("5", &["0.5"]);
        let id = ids[0];

        assert!(matches!(
            ledger.consume(id),
            Err(LedgerError::InvalidTransition { status: CouponStatus::Redeemable, .. })
        ));

        ledger.redeem(id).unwrap();
        let before = ledger.snapshot(usize::MAX);
        assert!(matches!(
            ledger.redeem(id),
            Err(LedgerError::InvalidTransition { status: CouponStatus::Usable, .. })
        ));
        assert_eq!(ledger.balance(), before.balance);
        assert_eq!(ledger.history().len(), 1);

        ledger.consume(id).unwrap();
        assert!(matches!(
            ledger.consume(id),
            Err(LedgerError::InvalidTransition { status: CouponStatus::Used, .. })
        ));
        assert!(matches!(
            ledger.redeem(id),
            Err(LedgerError::InvalidTransition { status: CouponStatus::Used, .. })
        ));
        assert_eq!(ledger.coupon(id).unwrap().status, CouponStatus::Used);
        assert_eq!(ledger.history().len(), 2);
    }

    #[test]
    fn test_unknown_coupon() {
        let (mut ledger, _, _) = ledger_with("5", &["0.5"]);
        let missing = Uuid::nil();

        assert!(matches!(
            ledger.redeem(missing),
            Err(LedgerError::CouponNotFound(id)) if id == missing
        ));
        assert!(matches!(ledger.consume(missing), Err(LedgerError::CouponNotFound(_))));
    }

    #[test]
    fn test_random_failure_leaves_ledger_untouched() {
        let clock = ManualClock::new(start());
        // one fill for the coupon id, ten for the code characters, none for the pin
        let mut ledger = CouponLedger::new(
            t("1"),
            Box::new(Exhausting { remaining: 11 }),
            Arc::new(clock),
        );
        let id = ledger
            .add_coupon(CreateCouponData::new("Amazon", 1000, t("0.5")))
            .unwrap();

        assert!(matches!(ledger.redeem(id), Err(LedgerError::IdGeneration(_))));
        assert_eq!(ledger.balance(), t("1"));
        assert_eq!(ledger.coupon(id).unwrap().status, CouponStatus::Redeemable);
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn test_history_only_grows() {
        let (mut ledger, ids, _) = ledger_with("2.5", &["0.5", "1.0", "0.8"]);
        let mut seen: Vec<Uuid> = Vec::new();

        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let steps: Vec<Box<dyn Fn(&mut CouponLedger) -> bool>> = vec![
            Box::new(move |l: &mut CouponLedger| l.redeem(a).is_ok()),
            Box::new(move |l: &mut CouponLedger| l.consume(b).is_ok()),
            Box::new(move |l: &mut CouponLedger| l.redeem(b).is_ok()),
            Box::new(move |l: &mut CouponLedger| l.redeem(c).is_ok()),
            Box::new(move |l: &mut CouponLedger| l.consume(a).is_ok()),
            Box::new(move |l: &mut CouponLedger| l.consume(a).is_ok()),
        ];

        for step in steps {
            let before = ledger.history().len();
            let ok = step(&mut ledger);
            let after = ledger.history().len();

            assert_eq!(after, before + usize::from(ok));
            let current: Vec<Uuid> = ledger.history().iter().map(|t| t.id).collect();
            assert_eq!(&current[after - seen.len()..], seen.as_slice());
            seen = current;
        }

        // 2.5 - 0.5 - 1.0 - 0.8
        assert_eq!(ledger.balance(), t("0.2"));
        assert_eq!(ledger.history().len(), 4);
    }

    #[test]
    fn test_snapshot() {
        let (mut ledger, ids, _) = ledger_with("2.5", &["0.5", "1.0"]);
        ledger.redeem(ids[0]).unwrap();
        ledger.redeem(ids[1]).unwrap();

        let snapshot = ledger.snapshot(1);

        assert_eq!(snapshot.usable_count, 2);
        assert_eq!(snapshot.coupons.len(), 2);
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.balance, t("1.0"));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["balance"], "1.0");
        assert_eq!(json["coupons"][0]["status"], "usable");
    }
}
