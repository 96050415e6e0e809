//! The polling loop.
//!
//! One tokio task per [`Poller`]. The task suspends in exactly two places,
//! awaiting the fetch and awaiting the post-cycle delay, and both race the
//! poller's cancellation token.

use serde::de::DeserializeOwned;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::PollError;
use crate::fetch::{Fetch, HttpFetcher};

/// Interval used when none (or zero) is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub target_url: String,
    pub interval: Option<Duration>,
}

impl PollerConfig {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_interval_ms(self, interval_ms: u64) -> Self {
        self.with_interval(Duration::from_millis(interval_ms))
    }

    /// The cadence the loop aims for. Zero falls back to [`DEFAULT_INTERVAL`].
    pub fn interval(&self) -> Duration {
        effective_interval(self.interval)
    }
}

fn effective_interval(interval: Option<Duration>) -> Duration {
    match interval {
        Some(d) if !d.is_zero() => d,
        _ => DEFAULT_INTERVAL,
    }
}

// ── State ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Constructed, loop not yet spawned.
    Idle,
    Running,
    /// `stop()` was called; the loop has not yet observed it.
    Stopping,
    /// The loop has exited. Terminal.
    Stopped,
}

/// Snapshot of a poller's counters.
///
/// There is no error callback, so this is how a caller tells
/// "polling but failing" apart from "healthy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollerStats {
    pub attempts: u64,
    pub deliveries: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
}

impl PollerStats {
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures == 0
    }
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    deliveries: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU64,
}

impl Counters {
    fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> PollerStats {
        PollerStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the handle and its loop.
struct Shared {
    token: CancellationToken,
    running: AtomicBool,
    state: watch::Sender<PollerState>,
    counters: Counters,
}

// ── Handle ──────────────────────────────────────────────────────────

type PendingLoop = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handle to a running polling loop. Dropping the handle stops the loop.
pub struct Poller {
    target: String,
    interval: Duration,
    shared: Arc<Shared>,
    pending: Mutex<Option<PendingLoop>>,
}

impl Poller {
    /// Poll `config.target_url` over HTTP, decoding each JSON body into `T`.
    ///
    /// Polling starts immediately. Must be called from within a Tokio runtime.
    pub fn spawn<T, C>(config: PollerConfig, on_data: C) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        C: FnMut(T) -> anyhow::Result<()> + Send + 'static,
    {
        let interval = config.interval();
        Self::with_fetcher(HttpFetcher::new(config.target_url), Some(interval), on_data)
    }

    /// Like [`Poller::spawn`] with a caller-supplied payload source.
    pub fn with_fetcher<F, C>(fetcher: F, interval: Option<Duration>, on_data: C) -> Self
    where
        F: Fetch + 'static,
        C: FnMut(F::Output) -> anyhow::Result<()> + Send + 'static,
    {
        let poller = Self::new(fetcher, effective_interval(interval), on_data);
        poller.start();
        poller
    }

    fn new<F, C>(fetcher: F, interval: Duration, on_data: C) -> Self
    where
        F: Fetch + 'static,
        C: FnMut(F::Output) -> anyhow::Result<()> + Send + 'static,
    {
        let (state, _) = watch::channel(PollerState::Idle);
        let shared = Arc::new(Shared {
            token: CancellationToken::new(),
            running: AtomicBool::new(false),
            state,
            counters: Counters::default(),
        });
        let target = fetcher.target().to_string();
        let poll_loop = PollLoop {
            fetcher,
            interval,
            on_data,
            shared: Arc::clone(&shared),
        };
        let pending: PendingLoop = Box::pin(poll_loop.run());

        Self {
            target,
            interval,
            shared,
            pending: Mutex::new(Some(pending)),
        }
    }

    /// Spawn the loop. A no-op while already running, and after `stop()`.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            debug!(target_url = %self.target, "Already polling");
            return;
        }
        if self.shared.token.is_cancelled() {
            self.shared.running.store(false, Ordering::SeqCst);
            debug!(target_url = %self.target, "Poller was stopped; not restarting");
            return;
        }

        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(poll_loop) = pending {
            self.shared.state.send_replace(PollerState::Running);
            tokio::spawn(poll_loop);
        }
    }

    /// Cancel the loop and any in-flight request. Idempotent.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.state.send_modify(|state| {
            *state = match *state {
                PollerState::Running => PollerState::Stopping,
                // Never spawned: nothing will ever observe the token.
                PollerState::Idle => PollerState::Stopped,
                other => other,
            };
        });
        self.shared.token.cancel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Resolves once the loop has exited.
    pub async fn stopped(&self) {
        let mut rx = self.shared.state.subscribe();
        // The sender lives in `self.shared`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state == PollerState::Stopped).await;
    }

    pub fn state(&self) -> PollerState {
        *self.shared.state.borrow()
    }

    /// The flag guarding against a second loop. Only `stop()` clears it.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PollerStats {
        self.shared.counters.snapshot()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Loop ────────────────────────────────────────────────────────────

struct PollLoop<F, C> {
    fetcher: F,
    interval: Duration,
    on_data: C,
    shared: Arc<Shared>,
}

impl<F, C> PollLoop<F, C>
where
    F: Fetch,
    C: FnMut(F::Output) -> anyhow::Result<()> + Send,
{
    async fn run(mut self) {
        let token = self.shared.token.clone();
        info!(
            target_url = %self.fetcher.target(),
            interval = ?self.interval,
            "📡 Polling started"
        );

        while !token.is_cancelled() {
            let started = Instant::now();

            let delay = match self.cycle(&token).await {
                // Aim at the next cycle *start*, never a negative wait.
                Ok(()) => self.interval.saturating_sub(started.elapsed()),
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    let consecutive = self.shared.counters.record_failure();
                    error!(
                        target_url = %self.fetcher.target(),
                        consecutive_failures = consecutive,
                        retry_in = ?self.interval,
                        "Polling error: {}",
                        e
                    );
                    self.interval
                }
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = time::sleep(delay) => {}
            }
        }

        info!(target_url = %self.fetcher.target(), "Polling stopped");
        self.shared.state.send_replace(PollerState::Stopped);
    }

    async fn cycle(&mut self, token: &CancellationToken) -> Result<(), PollError> {
        self.shared.counters.record_attempt();

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(PollError::Cancelled),
            result = self.fetcher.fetch() => result,
        };
        // Cancelled while the response was being decoded: drop it.
        if token.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        self.deliver(fetched?)?;
        self.shared.counters.record_delivery();
        debug!(target_url = %self.fetcher.target(), "Payload delivered");
        Ok(())
    }

    fn deliver(&mut self, payload: F::Output) -> Result<(), PollError> {
        let on_data = &mut self.on_data;
        match panic::catch_unwind(AssertUnwindSafe(|| on_data(payload))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PollError::Delivery(format!("{:#}", e))),
            Err(panic) => Err(PollError::Delivery(panic_message(&*panic))),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("callback panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("callback panicked: {}", s)
    } else {
        "callback panicked".to_string()
    }
}
