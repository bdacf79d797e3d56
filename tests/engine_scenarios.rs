//! End-to-end behaviour of the engine with scripted collaborators.

mod common;

use common::{engine_at, init_logging, run_until_idle, small_config, ScriptedSource};
use slipmap::prelude::*;

#[test]
fn test_pan_carries_into_next_tile_column() {
    init_logging();
    let source = ScriptedSource::new();
    let mut engine = engine_at(small_config(), source, 15, 1000, 1000);

    let mut pans = 0;
    while engine.viewport().tile_x() == 1000 {
        engine.on_pan(-256.0, 0.0);
        pans += 1;
        let vp = engine.viewport();
        assert!(vp.offset_x().abs() < TILE_SIZE, "offset_x {} after {} pans", vp.offset_x(), pans);
        assert!(pans < 20, "tile_x never advanced");
    }

    let vp = engine.viewport();
    assert_eq!(vp.tile_x(), 1001);
    assert_eq!(vp.tile_y(), 1000);
    assert!(vp.offset_x() > -TILE_SIZE && vp.offset_x() < TILE_SIZE);
    assert_eq!(vp.offset_y(), 0.0);

    run_until_idle(&mut engine);
    let offset_x = engine.viewport().offset_x();
    let list = engine.backend().last_frame().unwrap();
    let centre = list
        .iter()
        .find(|c| c.key == TileKey::new(15, 1001, 1000))
        .expect("centre tile drawn");
    assert!((centre.screen_x + offset_x).abs() < 1e-9);
    assert_eq!(centre.screen_y, 0.0);
    assert_eq!(centre.size, TILE_SIZE);
}

#[test]
fn test_not_found_tile_is_never_retried_or_drawn() {
    init_logging();
    let source = ScriptedSource::new();
    let missing = TileKey::new(15, 1000, 1000);
    source.set(missing, FetchOutcome::NotFound);
    let mut engine = engine_at(small_config(), source.clone(), 15, 1000, 1000);

    run_until_idle(&mut engine);
    for _ in 0..20 {
        let stats = engine.frame();
        assert_eq!(stats.drawn, 8);
        assert_eq!(stats.requested, 0);
        assert!(!engine.scheduler().is_pending(&missing));
        assert!(!engine.backend().last_frame().unwrap().contains(&missing));
    }

    assert_eq!(source.calls(missing), 1, "NotFound must not be retried");
    assert!(engine.scheduler().is_missing(&missing));
    assert!(!engine.cache().contains(&missing));
}

#[test]
fn test_zoom_debounce_drops_old_zoom_queue() {
    init_logging();
    let source = ScriptedSource::gated();
    let mut engine = engine_at(small_config(), source.clone(), 15, 1000, 1000);

    let first = engine.frame();
    assert_eq!(first.requested, 9);
    let in_flight = source.wait_started();
    assert_eq!(in_flight, TileKey::new(15, 1000, 1000), "centre tile is dispatched first");
    assert_eq!(engine.scheduler().queued_len(), 8);

    let change = engine.on_zoom(1.2, 5_000);
    assert_eq!(change, Some(ZoomChange { from: 15, to: 16 }));
    assert_eq!(engine.on_zoom(1.3, 5_050), None);
    assert_eq!(engine.zoom(), 16);

    // Only the request already running survives the invalidation.
    assert_eq!(engine.scheduler().queued_len(), 0);
    assert_eq!(engine.scheduler().pending_len(), 1);

    source.open_gate();
    let stats = run_until_idle(&mut engine);
    assert_eq!(stats.drawn, 9);

    let old_zoom_fetches: Vec<TileKey> = source
        .fetched_keys()
        .into_iter()
        .filter(|key| key.zoom == 15)
        .collect();
    assert_eq!(old_zoom_fetches, vec![in_flight]);
    assert!(engine.cache().keys().all(|key| key.zoom == 16));
    assert_eq!(engine.scheduler().stats().stale, 1);
}

#[test]
fn test_each_tile_fetched_once() {
    init_logging();
    let source = ScriptedSource::new();
    let mut engine = engine_at(small_config(), source.clone(), 15, 1000, 1000);

    run_until_idle(&mut engine);
    for _ in 0..10 {
        engine.frame();
    }

    assert_eq!(source.total_calls(), 9);
    assert_eq!(source.max_calls_per_key(), 1);
    assert_eq!(engine.backend().uploads(), 9);
    assert_eq!(engine.cache().len(), 9);
}

#[test]
fn test_eviction_keeps_cache_near_viewport() {
    init_logging();
    let mut config = small_config();
    config.viewport.pan_smoothing = 1.0;
    let limit = config.grid.keep_radius() + config.cache.eviction_margin;
    let source = ScriptedSource::new();
    let mut engine = engine_at(config, source, 15, 1000, 1000);

    for step in 0..60 {
        if step % 3 == 0 {
            engine.on_pan(-200.0, -150.0);
        }
        engine.frame();
        std::thread::sleep(Duration::from_millis(1));

        let centre = engine.viewport().center_key();
        for key in engine.cache().keys() {
            assert!(
                key.chebyshev_distance(centre.x, centre.y) <= limit,
                "{} kept while centre is {}",
                key,
                centre
            );
        }
        assert_eq!(engine.backend().live_textures(), engine.cache().len());
    }
    assert!(engine.backend().releases() > 0);
}

#[test]
fn test_upload_failure_leaves_tile_blank() {
    init_logging();
    let source = ScriptedSource::new();
    let broken = TileKey::new(15, 1001, 1000);
    source.set(broken, FetchOutcome::Image(Vec::new()));
    let mut engine = engine_at(small_config(), source.clone(), 15, 1000, 1000);

    let stats = run_until_idle(&mut engine);
    assert_eq!(stats.drawn, 8);
    for _ in 0..5 {
        engine.frame();
    }
    assert_eq!(source.calls(broken), 1);
    assert!(engine.scheduler().is_missing(&broken));
    assert_eq!(engine.backend().uploads(), 8);
}

#[test]
fn test_transient_failures_exhaust_quietly() {
    init_logging();
    let config = small_config();
    let attempts = config.fetch.max_retries as usize + 1;
    let source = ScriptedSource::new();
    let flaky = TileKey::new(15, 999, 999);
    source.set(flaky, FetchOutcome::TransientError("HTTP 503".to_string()));
    let mut engine = engine_at(config, source.clone(), 15, 1000, 1000);

    let stats = run_until_idle(&mut engine);
    assert_eq!(stats.drawn, 8);
    assert_eq!(source.calls(flaky), attempts);
    assert_eq!(engine.scheduler().stats().failed, 1);

    engine.frame();
    assert_eq!(source.calls(flaky), attempts);
}

#[test]
fn test_map_edge_never_fetches_out_of_range() {
    init_logging();
    let source = ScriptedSource::new();
    let mut engine = engine_at(small_config(), source.clone(), 2, 0, 0);

    let stats = run_until_idle(&mut engine);
    assert_eq!(stats.drawn, 4);
    assert_eq!(source.total_calls(), 4);
    assert!(source.fetched_keys().iter().all(|key| key.is_valid()));
}

#[test]
fn test_zoom_out_and_back_refetches_only_new_tiles() {
    init_logging();
    let source = ScriptedSource::new();
    let mut engine = engine_at(small_config(), source.clone(), 15, 1000, 1000);
    run_until_idle(&mut engine);

    assert!(engine.on_zoom(0.5, 1_000).is_some());
    assert_eq!(engine.viewport().center_key(), TileKey::new(14, 500, 500));
    let stats = run_until_idle(&mut engine);
    assert_eq!(stats.drawn, 9);
    assert!(engine.cache().keys().all(|key| key.zoom == 14));
    assert_eq!(engine.backend().live_textures(), 9);
}

#[test]
fn test_shutdown_releases_all_textures() {
    init_logging();
    let source = ScriptedSource::new();
    let mut engine = engine_at(small_config(), source, 15, 1000, 1000);
    run_until_idle(&mut engine);

    let backend = engine.shutdown();
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(backend.uploads(), backend.releases());
}

#[test]
fn test_tile_recovers_after_outage_once_view_returns() {
    init_logging();
    let mut config = small_config();
    config.viewport.pan_smoothing = 1.0;
    let source = ScriptedSource::new();
    let flaky = TileKey::new(15, 1000, 1000);
    source.set(flaky, FetchOutcome::TransientError("connection refused".to_string()));
    let mut engine = engine_at(config, source.clone(), 15, 1000, 1000);

    run_until_idle(&mut engine);
    assert!(engine.scheduler().is_missing(&flaky));

    // The server comes back while the user looks elsewhere.
    source.set(flaky, FetchOutcome::Image(vec![1, 2, 3]));
    for _ in 0..5 {
        engine.on_pan(-10.0 * TILE_SIZE, 0.0);
        engine.frame();
    }
    assert_eq!(engine.viewport().tile_x(), 1050);
    assert!(!engine.scheduler().is_missing(&flaky));

    for _ in 0..5 {
        engine.on_pan(10.0 * TILE_SIZE, 0.0);
        engine.frame();
    }
    assert_eq!(engine.viewport().center_key(), flaky);

    let stats = run_until_idle(&mut engine);
    assert_eq!(stats.drawn, 9);
    assert!(engine.backend().last_frame().unwrap().contains(&flaky));
}
