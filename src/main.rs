//! Emberline - Agricultural Burn Coordination Service
//!
//! # Usage
//!
//! ```bash
//! # Run against real providers configured in emberline.toml
//! cargo run --release
//!
//! # Run fully mocked (store, weather, notifier) for local development
//! cargo run --release -- --mock
//!
//! # Mocked run that submits 5 synthetic requests on startup
//! cargo run --release -- --mock --demo 5
//! ```
//!
//! # Environment Variables
//!
//! - `EMBERLINE_CONFIG`: Path to the TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use emberline::api::create_router;
use emberline::config::CoordinationConfig;
use emberline::pipeline::Coordinator;
use emberline::types::{BurnWindow, ContactMethod};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "emberline")]
#[command(about = "Agricultural burn coordination and smoke dispersion intelligence")]
#[command(version)]
struct CliArgs {
    /// Override the server bind address (default from config, 0.0.0.0:8080)
    #[arg(short, long)]
    addr: Option<String>,

    /// Path to the TOML config file (overrides EMBERLINE_CONFIG)
    #[arg(long)]
    config: Option<String>,

    /// Force in-memory mocks for store, weather, and notifier
    #[arg(long)]
    mock: bool,

    /// Submit N synthetic burn requests on startup (demo mode)
    #[arg(long, value_name = "N")]
    demo: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut cfg = match args.config {
        Some(ref path) => CoordinationConfig::load_from_file(std::path::Path::new(path))
            .with_context(|| format!("loading config from {path}"))?,
        None => CoordinationConfig::load(),
    };
    if args.mock {
        cfg.providers.use_mock_store = true;
        cfg.providers.use_mock_weather = true;
        cfg.providers.use_mock_notifier = true;
    }
    if let Some(addr) = args.addr {
        cfg.server.addr = addr;
    }
    let server_addr = cfg.server.addr.clone();

    info!("🔥 Starting Emberline burn coordination pipeline");
    info!("   Stage A: Validate (geometry, acreage, window)");
    info!("   Stage B: Weather-Assess (forecast, stability, approval gate)");
    info!("   Stage C: Predict (Gaussian plume, PM2.5 field)");
    info!("   Stage D: Optimize (simulated annealing schedule)");
    info!("   Stage E: Alert (SMS + broadcast)");

    let ctx = emberline::build_context(cfg).context("building components")?;
    let coordinator = Coordinator::start(ctx);

    if let Some(count) = args.demo {
        submit_demo_requests(&coordinator, count);
    }

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Shutdown signal received");
            shutdown_signal.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("binding {server_addr}"))?;
    info!(addr = %server_addr, "HTTP API listening");

    let app = create_router(Arc::clone(&coordinator));
    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await
        .context("serving HTTP")?;

    coordinator.shutdown().await;
    info!("Emberline stopped");
    Ok(())
}

/// Submit synthetic requests spread around Davis, CA for demo mode.
fn submit_demo_requests(coordinator: &Arc<Coordinator>, count: usize) {
    use emberline::types::{
        BurnIntensity, BurnRequest, FieldPolygon, FuelType, GeoPoint, RequestState,
    };

    let fuels = [
        FuelType::WheatStubble,
        FuelType::RiceStraw,
        FuelType::CornStalks,
        FuelType::OrchardPrunings,
        FuelType::Grass,
    ];
    let date = (chrono::Utc::now() + chrono::Duration::days(2)).date_naive();

    for i in 0..count {
        let lat = 38.50 + (i as f64 * 0.013) % 0.20;
        let lon = -121.80 + (i as f64 * 0.017) % 0.25;
        let acres = 60.0 + (i as f64 * 37.0) % 400.0;
        let side_m = (acres * 4_046.856).sqrt();
        let half_lat = side_m / 2.0 / 111_320.0;
        let half_lon = half_lat / lat.to_radians().cos();

        let request = BurnRequest {
            id: uuid::Uuid::nil(),
            farm_id: format!("demo-farm-{i:02}"),
            field_boundary: FieldPolygon::new(vec![
                GeoPoint::new(lat - half_lat, lon - half_lon),
                GeoPoint::new(lat - half_lat, lon + half_lon),
                GeoPoint::new(lat + half_lat, lon + half_lon),
                GeoPoint::new(lat + half_lat, lon - half_lon),
                GeoPoint::new(lat - half_lat, lon - half_lon),
            ]),
            acres,
            fuel: fuels[i % fuels.len()],
            intensity: BurnIntensity::Moderate,
            burn_date: date,
            window: BurnWindow::new(7 + (i % 3) as u8, 15 + (i % 3) as u8),
            priority: (i % 10) as f64,
            max_radius_m: 0.0,
            contact: ContactMethod::Sms,
            contact_handle: format!("+1555010{i:02}"),
            state: RequestState::Received,
            created_at: 0,
            updated_at: 0,
        };

        match coordinator.submit(request) {
            Ok(id) => info!(request_id = %id, "Demo request submitted"),
            Err(err) => error!(error = %err, "Demo submission failed"),
        }
    }
}
