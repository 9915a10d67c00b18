use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use decopon::app::{Collaborators, MiniApp, PointerEvent, SheetEvent};
use decopon::config::Config;
use decopon::jobs::status_feed::run_status_feed;
use decopon::models::{coupon::format_yen, FormSnapshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decopon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Decopon session...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let collaborators = Collaborators::from_config(&config);
    let mut app = MiniApp::start(config, collaborators)?;
    println!("{}", serde_json::to_string_pretty(&app.snapshot())?);

    let Some(coupon_id) = app.ledger().redeemable().next().map(|c| c.id) else {
        tracing::warn!("Catalog is empty, nothing to redeem");
        return Ok(());
    };

    // A hesitant swipe snaps back, a full one redeems
    app.open_redeem(coupon_id)?;
    swipe(&mut app, 0.4)?;
    while let Some(progress) = app.frame() {
        tracing::debug!(progress, "Snap-back frame");
    }
    let event = swipe(&mut app, 0.95)?;
    tracing::info!(?event, "Redeem sheet finished");
    report_notice(&mut app);

    if matches!(event, SheetEvent::Redeemed(_)) {
        use_coupon(&mut app, coupon_id)?;
    }

    // Registration application with the automatic status feed
    let form = FormSnapshot {
        name: "Hanako Sato".into(),
        name_kana: "Sato Hanako".into(),
        email: "hanako@example.com".into(),
        agree_main: true,
        ..FormSnapshot::default()
    };
    app.submit_application(&form)?;
    report_notice(&mut app);

    let tick = app.config().status_tick();
    let stats = tokio::select! {
        stats = run_status_feed(app.intake_mut(), tick) => Some(stats),
        _ = shutdown_signal() => None,
    };
    match stats {
        Some(stats) => tracing::info!(?stats, "Application status settled"),
        None => {
            app.teardown();
        }
    }

    print_history(&app);
    println!("{}", serde_json::to_string_pretty(&app.snapshot())?);

    Ok(())
}

fn print_history(app: &MiniApp) {
    let limit = app.config().history_limit;
    for tx in app.ledger().history().recent(limit) {
        println!(
            "{}  {:<24} {:>8}",
            tx.at.format("%H:%M:%S"),
            tx.label,
            tx.display_amount()
        );
    }
}

/// Drags the open sheet's thumb to `fraction` of the track and releases
fn swipe(app: &mut MiniApp, fraction: f64) -> decopon::Result<SheetEvent> {
    let track = app.config().track_width_px;
    let travel = track - app.config().thumb_width_px;

    app.pointer(PointerEvent::Start {
        x: 0.0,
        track_width_px: track,
    })?;
    let steps = 4;
    for step in 1..=steps {
        let x = travel * fraction * f64::from(step) / f64::from(steps);
        app.pointer(PointerEvent::Move { x })?;
    }
    app.pointer(PointerEvent::End)
}

fn use_coupon(app: &mut MiniApp, coupon_id: Uuid) -> decopon::Result<()> {
    app.open_use(coupon_id)?;
    swipe(app, 1.0)?;
    report_notice(app);

    if let Some(reveal) = app.take_reveal() {
        let png = reveal.barcode.render_png(2, 80)?;
        println!("{} ¥{}", reveal.brand, format_yen(reveal.face));
        println!("Code: {}", reveal.code);
        println!("PIN:  {}", reveal.pin);
        println!("{}", reveal.barcode.render_svg(80));
        tracing::info!(png_bytes = png.len(), "Barcode rendered");
    }

    Ok(())
}

fn report_notice(app: &mut MiniApp) {
    if let Some(notice) = app.take_notice() {
        if notice.is_error() {
            tracing::warn!("{}", notice.message());
        } else {
            tracing::info!("{}", notice.message());
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
