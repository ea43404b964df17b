//! Fixed-timestep tick scheduler and monotonic clock for Gridlock.
//!
//! Provides configurable tick rates (1–128 Hz) for the server's room loop
//! and the client's 60 Hz local loop. Deadlines are absolute
//! (`sleep_until`), so the cadence stays locked to the schedule instead of
//! drifting by per-tick processing time the way naive `sleep(dt)` loops do.
//! When a tick handler runs long enough to miss whole periods, the missed
//! ticks are skipped and reported, never replayed in a burst.
//!
//! # Integration
//!
//! The scheduler sits inside a task's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         tick = scheduler.wait_for_tick() => {
//!             step_state_machine(tick);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod clock;

pub use clock::GameClock;

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. Clamped to `1..=128` by [`validated`](Self::validated).
    pub tick_rate_hz: u32,
    /// Budget warning threshold (0.0–1.0). A warning is emitted when tick
    /// execution exceeds this fraction of the tick budget. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Random jitter (0–max µs) added to the *first* tick to desynchronize
    /// loops created at the same instant.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 50,
            budget_warn_threshold: 0.80,
            initial_jitter_us: 2_000, // 0–2 ms default jitter
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Create a config for a specific tick rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`]. Rules:
    /// - `tick_rate_hz` clamped to `1..=`[`Self::MAX_TICK_RATE_HZ`].
    /// - `budget_warn_threshold` clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz out of range, clamping"
            );
            self.tick_rate_hz = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Duration of a single tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64)
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// Fixed delta time for this tick (always `1 / tick_rate`).
    /// State machines step by this, not by wall-clock elapsed time.
    pub dt: Duration,
    /// `true` if this tick fired late (>10% past its deadline).
    pub overrun: bool,
    /// How many whole ticks were skipped due to overrun (0 normally).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-timestep tick scheduler. One per driving task.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Duration,
    tick_count: u64,
    /// Absolute deadline of the next tick.
    next_tick: TokioInstant,
    /// Wall-clock instant when the last tick's handler started.
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    /// Budget utilization of the last completed tick (1.0 = full budget).
    last_utilization: Option<f64>,
}

impl TickScheduler {
    /// Create a new scheduler from config.
    ///
    /// The first tick is scheduled with optional jitter so loops created
    /// at the same instant don't all fire together.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };

        trace!(
            rate_hz = config.tick_rate_hz,
            budget_ms = tick_duration.as_secs_f64() * 1000.0,
            "tick scheduler created"
        );

        Self {
            next_tick: TokioInstant::now() + tick_duration + jitter,
            config,
            tick_duration,
            tick_count: 0,
            tick_start: None,
            last_utilization: None,
        }
    }

    /// Create a scheduler for a specific tick rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Wait until the next tick is due. Returns [`TickInfo`] for the tick.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        time::sleep_until(self.next_tick).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        // Detect overrun: did we wake up significantly late?
        let late_by = now.saturating_duration_since(self.next_tick);
        let overrun = late_by > self.tick_duration / 10;
        let mut ticks_skipped = 0u64;

        if overrun {
            // Skip whole missed periods so the schedule stays aligned
            // without a catch-up burst.
            ticks_skipped = (late_by.as_nanos() / self.tick_duration.as_nanos()) as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick overrun, skipping ahead"
                );
            }
        }
        self.next_tick += self.tick_duration * (ticks_skipped as u32 + 1);

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: self.tick_duration,
            overrun,
            ticks_skipped,
        }
    }

    /// Record that the handler for the current tick has finished.
    ///
    /// Call after stepping the state machine to enable budget monitoring.
    /// If not called, budget warnings won't fire.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        let utilization = elapsed.as_secs_f64() / self.tick_duration.as_secs_f64();
        self.last_utilization = Some(utilization);

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.tick_duration.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick approaching budget limit"
            );
        }
    }

    /// Current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured tick rate in Hz.
    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    /// The fixed tick duration.
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Budget utilization of the most recently completed tick, if any.
    pub fn last_utilization(&self) -> Option<f64> {
        self.last_utilization
    }
}
