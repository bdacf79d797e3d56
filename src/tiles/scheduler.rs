//! Bounded worker pool that turns wanted tile keys into fetched image bytes.
//!
//! The frame thread owns the [`FetchScheduler`]. It enqueues keys with
//! [`FetchScheduler::request`] and collects finished downloads with
//! [`FetchScheduler::drain`]; workers never see the tile cache. Each enqueued
//! key is paired with one wake-up ticket on a channel, and workers pop the
//! shared queue when they receive a ticket, so queued keys can still be
//! withdrawn (zoom change, viewport moved away) before a worker picks them up.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use super::cache::TileCache;
use super::source::{FetchOutcome, TileSource};
use crate::core::config::FetchConfig;
use crate::core::geo::TileKey;
use crate::prelude::HashSet;
use crate::Result;

/// What [`FetchScheduler::request`] did with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Newly queued for fetching
    Queued,
    /// Already resident in the cache
    Cached,
    /// Already queued or in flight
    Pending,
    /// Outside `[0, 2^zoom)`; never fetched
    OutOfRange,
    /// Previously reported missing at this zoom
    KnownMissing,
    /// Belongs to a zoom level other than the current one
    WrongZoom,
    /// The worker pool has stopped
    Stopped,
}

/// Fetched tile bytes ready for upload on the frame thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyTile {
    pub key: TileKey,
    pub bytes: Vec<u8>,
}

/// Message posted by a worker when it is done with a key.
#[derive(Debug)]
enum Completion {
    Fetched { key: TileKey, bytes: Vec<u8>, attempts: u32 },
    NotFound { key: TileKey },
    Failed { key: TileKey, attempts: u32, reason: String },
    Cancelled { key: TileKey },
}

impl Completion {
    fn key(&self) -> TileKey {
        match self {
            Completion::Fetched { key, .. }
            | Completion::NotFound { key }
            | Completion::Failed { key, .. }
            | Completion::Cancelled { key } => *key,
        }
    }
}

/// Counters since the scheduler was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub queued: u64,
    pub fetched: u64,
    pub not_found: u64,
    pub failed: u64,
    /// Results discarded because the zoom changed while in flight
    pub stale: u64,
    /// Keys withdrawn before or during fetching
    pub cancelled: u64,
}

/// State shared between the frame thread and the workers.
struct Shared {
    queue: Mutex<VecDeque<TileKey>>,
    current_zoom: AtomicU8,
    shutdown: AtomicBool,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, VecDeque<TileKey>> {
        // Nothing panics while holding the lock, so a poisoned queue is still consistent.
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_stale(&self, key: TileKey) -> bool {
        self.shutdown.load(Ordering::Relaxed) || self.current_zoom.load(Ordering::Relaxed) != key.zoom
    }
}

pub struct FetchScheduler {
    shared: Arc<Shared>,
    tickets: Option<Sender<()>>,
    done_rx: Receiver<Completion>,
    /// Keys queued or in flight
    pending: HashSet<TileKey>,
    /// Keys that finished without an image at the current zoom
    missing: HashSet<TileKey>,
    current_zoom: u8,
    workers: Vec<JoinHandle<()>>,
    stats: SchedulerStats,
}

impl FetchScheduler {
    /// Starts `config.workers` fetch threads against `source`.
    pub fn new(source: Arc<dyn TileSource>, config: FetchConfig, zoom: u8) -> Result<Self> {
        let (ticket_tx, ticket_rx) = unbounded::<()>();
        let (done_tx, done_rx) = unbounded::<Completion>();
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            current_zoom: AtomicU8::new(zoom),
            shutdown: AtomicBool::new(false),
        });

        let pool_size = config.workers.max(1);
        let mut workers = Vec::with_capacity(pool_size);
        for id in 0..pool_size {
            let shared = Arc::clone(&shared);
            let source = Arc::clone(&source);
            let tickets = ticket_rx.clone();
            let done = done_tx.clone();
            let config = config.clone();
            let handle = thread::Builder::new()
                .name(format!("tile-fetch-{}", id))
                .spawn(move || worker_loop(shared, source, tickets, done, config))?;
            workers.push(handle);
        }

        log::info!(
            "started {} tile fetch workers for source {}",
            pool_size,
            source.name()
        );

        Ok(Self {
            shared,
            tickets: Some(ticket_tx),
            done_rx,
            pending: HashSet::default(),
            missing: HashSet::default(),
            current_zoom: zoom,
            workers,
            stats: SchedulerStats::default(),
        })
    }

    /// Asks for `key` to be fetched. Idempotent and non-blocking.
    pub fn request(&mut self, key: TileKey, cache: &TileCache) -> RequestStatus {
        if !key.is_valid() {
            return RequestStatus::OutOfRange;
        }
        if key.zoom != self.current_zoom {
            return RequestStatus::WrongZoom;
        }
        if cache.contains(&key) {
            return RequestStatus::Cached;
        }
        if self.pending.contains(&key) {
            return RequestStatus::Pending;
        }
        if self.missing.contains(&key) {
            return RequestStatus::KnownMissing;
        }
        let Some(tickets) = self.tickets.as_ref() else {
            return RequestStatus::Stopped;
        };

        self.shared.queue().push_back(key);
        if tickets.send(()).is_err() {
            log::error!("tile fetch workers are gone; dropping request for {}", key);
            self.shared.queue().retain(|queued| *queued != key);
            return RequestStatus::Stopped;
        }

        self.pending.insert(key);
        self.stats.queued += 1;
        log::debug!("queued tile {}", key);
        RequestStatus::Queued
    }

    /// Collects every completion posted since the last call.
    ///
    /// Returns tiles ready for upload; results for a zoom other than the
    /// current one are dropped here.
    pub fn drain(&mut self) -> Vec<ReadyTile> {
        let completions: Vec<Completion> = self.done_rx.try_iter().collect();
        let mut ready = Vec::new();

        for completion in completions {
            let key = completion.key();
            self.pending.remove(&key);
            let current = key.zoom == self.current_zoom;

            match completion {
                Completion::Fetched { key, bytes, attempts } => {
                    if current {
                        self.stats.fetched += 1;
                        log::debug!("tile {} ready after {} attempt(s)", key, attempts);
                        ready.push(ReadyTile { key, bytes });
                    } else {
                        self.stats.stale += 1;
                        log::debug!("discarding stale tile {} (zoom is now {})", key, self.current_zoom);
                    }
                }
                Completion::NotFound { key } => {
                    self.stats.not_found += 1;
                    log::debug!("tile {} not found at source", key);
                    if current {
                        self.missing.insert(key);
                    }
                }
                Completion::Failed { key, attempts, reason } => {
                    self.stats.failed += 1;
                    log::error!("giving up on tile {} after {} attempts: {}", key, attempts, reason);
                    if current {
                        self.missing.insert(key);
                    }
                }
                Completion::Cancelled { key } => {
                    self.stats.cancelled += 1;
                    log::debug!("fetch of tile {} abandoned", key);
                }
            }
        }
        ready
    }

    /// Switches to `zoom`: drops queued keys of other zoom levels and forgets
    /// missing tiles. In-flight fetches finish, but their results are discarded.
    pub fn invalidate_zoom(&mut self, zoom: u8) -> usize {
        self.current_zoom = zoom;
        self.shared.current_zoom.store(zoom, Ordering::Relaxed);
        self.missing.clear();

        let dropped = self.withdraw(|key| key.zoom != zoom);
        log::info!("zoom now {}: dropped {} queued tile requests", zoom, dropped);
        dropped
    }

    /// Drops queued (not started) keys farther than `limit` tiles from `center`
    /// and forgets missing tiles outside that area, so they are fetched again
    /// if the view returns to them.
    pub fn cancel_far(&mut self, center: TileKey, limit: u32) -> usize {
        let far = |key: &TileKey| key.zoom != center.zoom || key.chebyshev_distance(center.x, center.y) > limit;
        self.missing.retain(|key| !far(key));
        let dropped = self.withdraw(far);
        if dropped > 0 {
            log::debug!("cancelled {} queued tiles far from {}", dropped, center);
        }
        dropped
    }

    fn withdraw(&mut self, doomed: impl Fn(&TileKey) -> bool) -> usize {
        let removed: Vec<TileKey> = {
            let mut queue = self.shared.queue();
            let (removed, kept): (VecDeque<TileKey>, VecDeque<TileKey>) =
                queue.drain(..).partition(|key| doomed(key));
            *queue = kept;
            removed.into_iter().collect()
        };
        for key in &removed {
            self.pending.remove(key);
        }
        self.stats.cancelled += removed.len() as u64;
        removed.len()
    }

    /// Records `key` as permanently absent, e.g. after a failed texture upload.
    pub fn mark_missing(&mut self, key: TileKey) {
        if key.zoom == self.current_zoom {
            self.missing.insert(key);
        }
    }

    pub fn is_pending(&self, key: &TileKey) -> bool {
        self.pending.contains(key)
    }

    pub fn is_missing(&self, key: &TileKey) -> bool {
        self.missing.contains(key)
    }

    /// Keys queued or in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Keys waiting for a free worker.
    pub fn queued_len(&self) -> usize {
        self.shared.queue().len()
    }

    pub fn current_zoom(&self) -> u8 {
        self.current_zoom
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Stops the pool and waits for workers to finish their current fetch.
    pub fn shutdown(mut self) {
        self.stop();
        for handle in std::mem::take(&mut self.workers) {
            if handle.join().is_err() {
                log::error!("tile fetch worker panicked");
            }
        }
    }

    fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        self.shared.queue().clear();
        self.tickets = None;
    }
}

impl Drop for FetchScheduler {
    fn drop(&mut self) {
        // Workers exit on their own once the ticket channel closes.
        self.stop();
    }
}

fn worker_loop(
    shared: Arc<Shared>,
    source: Arc<dyn TileSource>,
    tickets: Receiver<()>,
    done: Sender<Completion>,
    config: FetchConfig,
) {
    while tickets.recv().is_ok() {
        if shared.shutdown.load(Ordering::Relaxed) {
            break;
        }
        // The key behind this ticket may have been withdrawn already.
        let Some(key) = shared.queue().pop_front() else {
            continue;
        };

        let completion = fetch_with_retry(&shared, source.as_ref(), key, &config);
        if done.send(completion).is_err() {
            break;
        }
    }
}

fn fetch_with_retry(
    shared: &Shared,
    source: &dyn TileSource,
    key: TileKey,
    config: &FetchConfig,
) -> Completion {
    let mut attempt = 0;
    loop {
        if shared.is_stale(key) {
            return Completion::Cancelled { key };
        }
        attempt += 1;
        log::debug!("fetch tile {} attempt {}", key, attempt);

        match source.fetch(key.zoom, key.x, key.y) {
            FetchOutcome::Image(bytes) => {
                return Completion::Fetched {
                    key,
                    bytes,
                    attempts: attempt,
                }
            }
            FetchOutcome::NotFound => return Completion::NotFound { key },
            FetchOutcome::TransientError(reason) => {
                if attempt > config.max_retries {
                    return Completion::Failed {
                        key,
                        attempts: attempt,
                        reason,
                    };
                }
                let delay = config.backoff(attempt);
                log::warn!(
                    "tile {} fetch failed on attempt {}: {}; retrying in {:?}",
                    key,
                    attempt,
                    reason,
                    delay
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }
}
