use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use slipmap::prelude::*;

/// Prague, where the demo starts when no location fix is available.
const FALLBACK_CENTER: LatLng = LatLng {
    lat: 50.0755,
    lng: 14.4378,
};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// One simulated gesture per frame.
#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    Pan(f64, f64),
    Pinch(f64),
}

fn script() -> Vec<Gesture> {
    let mut gestures = Vec::new();
    gestures.extend(std::iter::repeat(Gesture::Idle).take(90));
    // Fling east, then south-west.
    gestures.extend(std::iter::repeat(Gesture::Pan(-180.0, 0.0)).take(60));
    gestures.extend(std::iter::repeat(Gesture::Idle).take(30));
    gestures.extend(std::iter::repeat(Gesture::Pan(120.0, -120.0)).take(45));
    gestures.extend(std::iter::repeat(Gesture::Idle).take(30));
    // A pinch emits many scale events; the debounce lets one through.
    gestures.extend(std::iter::repeat(Gesture::Pinch(1.08)).take(10));
    gestures.extend(std::iter::repeat(Gesture::Idle).take(120));
    gestures
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading config from {}", path))?,
        None => EngineConfig::default(),
    };

    let provider = WithFallback::new(NoLocation::new("no positioning on this host"), FALLBACK_CENTER);
    let center = provider.current_position().await?;

    // The blocking HTTP client must live outside the async runtime.
    tokio::task::spawn_blocking(move || run(config, center))
        .await
        .context("demo thread panicked")?
}

fn run(config: EngineConfig, center: LatLng) -> anyhow::Result<()> {
    let source = HttpTileSource::new(config.http.clone()).context("creating HTTP tile source")?;
    let mut engine = MapEngineBuilder::new()
        .with_config(config)
        .with_tile_source(Arc::new(source))
        .build_at(center, HeadlessBackend::new())
        .context("building map engine")?;

    let started = Instant::now();
    let mut last_report = Instant::now();
    for gesture in script() {
        let frame_start = Instant::now();
        match gesture {
            Gesture::Idle => {}
            Gesture::Pan(dx, dy) => engine.on_pan(dx, dy),
            Gesture::Pinch(scale) => {
                let now_ms = started.elapsed().as_millis() as i64;
                if let Some(change) = engine.on_zoom(scale, now_ms) {
                    log::info!("zoom {} -> {}", change.from, change.to);
                }
            }
        }

        let stats = engine.frame();
        if last_report.elapsed() >= Duration::from_secs(1) {
            log::info!("{} | centre {} tile {}", stats, engine.center(), engine.viewport().center_key());
            last_report = Instant::now();
        }

        if let Some(rest) = FRAME_INTERVAL.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    let scheduler_stats = engine.scheduler().stats();
    log::info!(
        "fetched {}, not found {}, failed {}, stale {}, cancelled {}",
        scheduler_stats.fetched,
        scheduler_stats.not_found,
        scheduler_stats.failed,
        scheduler_stats.stale,
        scheduler_stats.cancelled
    );

    let backend = engine.shutdown();
    log::info!(
        "uploaded {} textures, released {}",
        backend.uploads(),
        backend.releases()
    );
    Ok(())
}
