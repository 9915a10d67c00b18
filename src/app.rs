use std::sync::Arc;
use std::time::Duration;

use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    coupon::{default_catalog, CouponStatus, CreateCouponData},
    ApplicationStatus, FormSnapshot, Notice,
};
use crate::services::{
    clock::{Clock, SystemClock},
    haptics::{Haptics, NoHaptics, TracingHaptics},
    ids::RandomSource,
    intake::{ApplicationIntake, FormValidator, IntakeSnapshot, RequiredFieldsValidator},
    ledger::{BarcodeReveal, CouponLedger, LedgerError, LedgerSnapshot, Redemption},
    swipe_confirm::{SwipeConfirmControl, SwipeRelease, SwipeVariant, SwipeView},
};

/// What a confirmed sheet did to the ledger
#[derive(Debug)]
pub enum LedgerOutcome {
    Redeemed(Redemption),
    Used(BarcodeReveal),
}

type SheetControl =
    SwipeConfirmControl<'static, CouponLedger, std::result::Result<LedgerOutcome, LedgerError>>;

/// Confirmation sheet for one coupon
struct Sheet {
    coupon_id: Uuid,
    control: SheetControl,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Start { x: f64, track_width_px: f64 },
    Move { x: f64 },
    End,
    Cancel,
}

#[derive(Debug)]
pub enum SheetEvent {
    Started,
    Progress(u8),
    Redeemed(Redemption),
    /// The barcode is waiting in `take_reveal`
    Used { coupon_id: Uuid },
    Rejected(Notice),
    Cancelled,
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSnapshot {
    pub coupon_id: Uuid,
    #[serde(flatten)]
    pub view: SwipeView,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppSnapshot {
    #[serde(flatten)]
    pub ledger: LedgerSnapshot,
    /// Redeemable coupons the balance currently covers
    pub affordable: Vec<Uuid>,
    pub application: IntakeSnapshot,
    pub sheet: Option<SheetSnapshot>,
}

/// Everything a session needs from the outside world
pub struct Collaborators {
    pub ledger_rng: Box<dyn RandomSource>,
    pub app_rng: Box<dyn RandomSource>,
    pub clock: Arc<dyn Clock>,
    pub haptics: Arc<dyn Haptics>,
    pub validator: Box<dyn FormValidator>,
}

impl Collaborators {
    pub fn from_config(config: &Config) -> Self {
        let (ledger_rng, app_rng): (Box<dyn RandomSource>, Box<dyn RandomSource>) =
            match config.random_seed {
                Some(seed) => (
                    Box::new(StdRng::seed_from_u64(seed)),
                    Box::new(StdRng::seed_from_u64(seed.rotate_left(32) ^ 0xA5A5_A5A5)),
                ),
                None => (Box::new(OsRng), Box::new(OsRng)),
            };

        let haptics: Arc<dyn Haptics> = if config.haptics_enabled {
            Arc::new(TracingHaptics)
        } else {
            Arc::new(NoHaptics)
        };

        Self {
            ledger_rng,
            app_rng,
            clock: Arc::new(SystemClock),
            haptics,
            validator: Box::new(RequiredFieldsValidator),
        }
    }
}

/// One mini-app session: the coupon wallet, the open confirmation sheet and
/// the registration application.
pub struct MiniApp {
    config: Config,
    ledger: CouponLedger,
    intake: ApplicationIntake,
    haptics: Arc<dyn Haptics>,
    rng: Box<dyn RandomSource>,
    sheet: Option<Sheet>,
    notice: Option<Notice>,
    reveal: Option<BarcodeReveal>,
}

impl MiniApp {
    /// Starts a session with the default coupon catalog
    pub fn start(config: Config, collaborators: Collaborators) -> Result<Self> {
        Self::with_catalog(config, default_catalog(), collaborators)
    }

    pub fn with_catalog(
        config: Config,
        catalog: Vec<CreateCouponData>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let Collaborators {
            ledger_rng,
            app_rng,
            clock,
            haptics,
            validator,
        } = collaborators;

        let ledger = CouponLedger::with_catalog(
            config.initial_balance_t,
            catalog,
            ledger_rng,
            clock.clone(),
        )?;
        let intake = ApplicationIntake::new(validator, config.advance_schedule(), clock);

        tracing::info!(
            balance = %ledger.balance(),
            coupons = ledger.coupons().len(),
            "Session started"
        );

        Ok(Self {
            config,
            ledger,
            intake,
            haptics,
            rng: app_rng,
            sheet: None,
            notice: None,
            reveal: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &CouponLedger {
        &self.ledger
    }

    pub fn intake(&self) -> &ApplicationIntake {
        &self.intake
    }

    pub fn intake_mut(&mut self) -> &mut ApplicationIntake {
        &mut self.intake
    }

    /// Opens the swipe-to-redeem sheet. Affordability is checked on commit.
    pub fn open_redeem(&mut self, coupon_id: Uuid) -> Result<SwipeView> {
        self.ledger
            .ensure_status(coupon_id, CouponStatus::Redeemable, "redeem")?;

        let control = SwipeConfirmControl::new(
            SwipeVariant::Redeem,
            self.config.gesture_settings(),
            self.haptics.clone(),
            move |ledger: &mut CouponLedger| ledger.redeem(coupon_id).map(LedgerOutcome::Redeemed),
        );
        Ok(self.open_sheet(coupon_id, control))
    }

    pub fn open_use(&mut self, coupon_id: Uuid) -> Result<SwipeView> {
        self.ledger
            .ensure_status(coupon_id, CouponStatus::Usable, "use")?;

        let control = SwipeConfirmControl::new(
            SwipeVariant::Use,
            self.config.gesture_settings(),
            self.haptics.clone(),
            move |ledger: &mut CouponLedger| ledger.consume(coupon_id).map(LedgerOutcome::Used),
        );
        Ok(self.open_sheet(coupon_id, control))
    }

    /// Returns false if no sheet was open
    pub fn close_sheet(&mut self) -> bool {
        self.sheet.take().is_some()
    }

    pub fn sheet_view(&self) -> Option<SwipeView> {
        self.sheet.as_ref().map(|s| s.control.view())
    }

    /// Feeds one pointer event to the open sheet
    pub fn pointer(&mut self, event: PointerEvent) -> Result<SheetEvent> {
        let sheet = self.sheet.as_mut().ok_or(AppError::NoSheet)?;

        let event = match event {
            PointerEvent::Start { x, track_width_px } => {
                if sheet.control.pointer_down(x, track_width_px) {
                    SheetEvent::Started
                } else {
                    SheetEvent::Ignored
                }
            }
            PointerEvent::Move { x } => sheet
                .control
                .pointer_move(x)
                .map_or(SheetEvent::Ignored, SheetEvent::Progress),
            PointerEvent::Cancel => match sheet.control.pointer_cancel() {
                SwipeRelease::Ignored => SheetEvent::Ignored,
                _ => SheetEvent::Cancelled,
            },
            PointerEvent::End => match sheet.control.pointer_up(&mut self.ledger) {
                SwipeRelease::Completed(result) => self.finish(result),
                SwipeRelease::Cancelled => SheetEvent::Cancelled,
                SwipeRelease::Ignored => SheetEvent::Ignored,
            },
        };

        Ok(event)
    }

    /// One snap-back animation frame of the open sheet
    pub fn frame(&mut self) -> Option<u8> {
        self.sheet.as_mut()?.control.frame()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// The code, PIN and barcode of the coupon just used. Shown once.
    pub fn take_reveal(&mut self) -> Option<BarcodeReveal> {
        self.reveal.take()
    }

    pub fn submit_application(&mut self, form: &FormSnapshot) -> Result<String> {
        match self.intake.submit(form, self.rng.as_mut()) {
            Ok(number) => {
                self.notice = Some(Notice::ApplicationSubmitted {
                    number: number.clone(),
                });
                Ok(number)
            }
            Err(e) => {
                let err = AppError::from(e);
                self.notice = Some(err.notice());
                Err(err)
            }
        }
    }

    pub fn advance_time(&mut self, by: Duration) -> Vec<ApplicationStatus> {
        self.intake.advance_time(by)
    }

    pub fn apply_status_update(&mut self, to: ApplicationStatus) -> Result<bool> {
        Ok(self.intake.apply_update(to)?)
    }

    /// Closes the sheet and cancels pending status steps
    pub fn teardown(&mut self) -> usize {
        self.sheet = None;
        let cancelled = self.intake.teardown();
        tracing::info!(cancelled, "Session torn down");
        cancelled
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            ledger: self.ledger.snapshot(self.config.history_limit),
            affordable: self
                .ledger
                .redeemable()
                .filter(|c| self.ledger.can_redeem(c.id))
                .map(|c| c.id)
                .collect(),
            application: self.intake.snapshot(),
            sheet: self.sheet.as_ref().map(|s| SheetSnapshot {
                coupon_id: s.coupon_id,
                view: s.control.view(),
            }),
        }
    }

    fn open_sheet(&mut self, coupon_id: Uuid, control: SheetControl) -> SwipeView {
        let control = control.with_thumb_width(self.config.thumb_width_px);
        let view = control.view();
        if let Some(previous) = self.sheet.replace(Sheet { coupon_id, control }) {
            tracing::debug!(previous = %previous.coupon_id, "Replaced open sheet");
        }
        tracing::debug!(coupon_id = %coupon_id, variant = ?view.variant, "Sheet opened");
        view
    }

    /// The completed control cannot fire again, so the sheet closes whatever
    /// the ledger said.
    fn finish(&mut self, result: std::result::Result<LedgerOutcome, LedgerError>) -> SheetEvent {
        self.sheet = None;

        match result {
            Ok(LedgerOutcome::Redeemed(redemption)) => {
                self.notice = Some(Notice::Redeemed {
                    brand: redemption.coupon.brand.clone(),
                });
                SheetEvent::Redeemed(redemption)
            }
            Ok(LedgerOutcome::Used(reveal)) => {
                let coupon_id = reveal.coupon_id;
                self.notice = Some(Notice::Used {
                    brand: reveal.brand.clone(),
                });
                self.reveal = Some(reveal);
                SheetEvent::Used { coupon_id }
            }
            Err(e) => {
                let notice = AppError::from(e).notice();
                self.notice = Some(notice.clone());
                SheetEvent::Rejected(notice)
            }
        }
    }
}

impl std::fmt::Debug for MiniApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniApp")
            .field("ledger", &self.ledger)
            .field("intake", &self.intake)
            .field("sheet_open", &self.sheet.is_some())
            .field("notice", &self.notice)
            .finish()
    }
}
