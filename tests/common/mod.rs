//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use slipmap::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Tile source with per-key outcomes, call counting and an optional gate
/// that holds fetches in flight until the test opens it.
pub struct ScriptedSource {
    overrides: Mutex<HashMap<TileKey, FetchOutcome>>,
    calls: Mutex<HashMap<TileKey, usize>>,
    gate_open: AtomicBool,
    started: Sender<TileKey>,
    started_rx: Receiver<TileKey>,
    release: Sender<()>,
    release_rx: Receiver<()>,
}

impl ScriptedSource {
    /// Every tile exists unless overridden.
    pub fn new() -> Arc<Self> {
        Self::build(true)
    }

    /// Like [`ScriptedSource::new`], but fetches block until [`ScriptedSource::open_gate`].
    pub fn gated() -> Arc<Self> {
        Self::build(false)
    }

    fn build(open: bool) -> Arc<Self> {
        let (started, started_rx) = unbounded();
        let (release, release_rx) = unbounded();
        Arc::new(Self {
            overrides: Mutex::new(HashMap::default()),
            calls: Mutex::new(HashMap::default()),
            gate_open: AtomicBool::new(open),
            started,
            started_rx,
            release,
            release_rx,
        })
    }

    pub fn set(&self, key: TileKey, outcome: FetchOutcome) {
        self.overrides.lock().unwrap().insert(key, outcome);
    }

    pub fn calls(&self, key: TileKey) -> usize {
        self.calls.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_calls_per_key(&self) -> usize {
        self.calls.lock().unwrap().values().copied().max().unwrap_or(0)
    }

    pub fn fetched_keys(&self) -> Vec<TileKey> {
        self.calls.lock().unwrap().keys().copied().collect()
    }

    /// Blocks until some fetch has started and returns its key.
    pub fn wait_started(&self) -> TileKey {
        self.started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("no fetch started")
    }

    pub fn open_gate(&self) {
        self.gate_open.store(true, Ordering::SeqCst);
        // Wake fetches already waiting.
        for _ in 0..64 {
            let _ = self.release.send(());
        }
    }
}

impl TileSource for ScriptedSource {
    fn fetch(&self, zoom: u8, x: i32, y: i32) -> FetchOutcome {
        let key = TileKey::new(zoom, x, y);
        *self.calls.lock().unwrap().entry(key).or_insert(0) += 1;
        let _ = self.started.send(key);

        if !self.gate_open.load(Ordering::SeqCst) {
            let _ = self.release_rx.recv_timeout(Duration::from_secs(5));
        }

        self.overrides
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| FetchOutcome::Image(vec![0x89, b'P', b'N', b'G']))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Engine config with a 3×3 visible grid and one fetch worker.
pub fn small_config() -> EngineConfig {
    let mut config = EngineConfig::for_testing();
    config.grid = GridConfig {
        tiles_x: 1,
        tiles_y: 1,
    };
    config
}

/// Engine positioned on tile `(x, y)` at `zoom`.
pub fn engine_at(
    config: EngineConfig,
    source: Arc<ScriptedSource>,
    zoom: u8,
    x: i32,
    y: i32,
) -> MapEngine<HeadlessBackend> {
    let center = Projection::tile_to_lat_lng(x, y, zoom);
    let engine = MapEngineBuilder::new()
        .with_config(config)
        .with_zoom(zoom)
        .with_tile_source(source)
        .build_at(center, HeadlessBackend::new())
        .expect("engine builds");
    assert_eq!(engine.viewport().center_key(), TileKey::new(zoom, x, y));
    engine
}

/// Runs frames until nothing is pending, returning the last frame's stats.
pub fn run_until_idle(engine: &mut MapEngine<HeadlessBackend>) -> FrameStats {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let stats = engine.frame();
        if stats.pending == 0 && stats.requested == 0 {
            return stats;
        }
        assert!(Instant::now() < deadline, "engine never went idle: {}", stats);
        std::thread::sleep(Duration::from_millis(2));
    }
}
