//! Refresh scheduler.
//!
//! ```text
//! Idle ──tick──► Fetching ──► Rendering ──► Idle
//!                    │
//!                    └──(both sections failed)──► Failed ──► Idle
//! ```
//!
//! A single driver task owns the published `Board`. Fetching runs in a
//! spawned task; rendering runs inline in the driver once the fetch lands.
//! Ticks that arrive while a cycle is in flight are dropped, not queued.

use crate::config::SchedulerConfig;
use crate::fetcher::FetchError;
use crate::models::{SectionKind, SectionViewModel};
use crate::pipeline::{CycleOutcome, CycleReport, FetchedBatch, Pipeline};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shown when a whole cycle failed. Carries no upstream detail.
pub const RETRY_LATER: &str = "Listings are temporarily unavailable. Please try again later.";

// ── Published state ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Rendering,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SectionDisplay {
    /// No cycle has finished yet.
    Loading,
    /// `stale` marks a view model kept from an earlier cycle after this
    /// section failed.
    Ready { view: SectionViewModel, stale: bool },
    /// Failed with nothing cached.
    Empty,
}

/// What the display layer sees: view models or an error tag, never raw data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub state: SchedulerState,
    pub active: SectionDisplay,
    pub sold: SectionDisplay,
    pub banner: Option<&'static str>,
    pub last_outcome: Option<CycleOutcome>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
    pub ticks_dropped: u64,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            active: SectionDisplay::Loading,
            sold: SectionDisplay::Loading,
            banner: None,
            last_outcome: None,
            last_success_at: None,
            cycles_completed: 0,
            ticks_dropped: 0,
        }
    }
}

impl Board {
    pub fn section(&self, kind: SectionKind) -> &SectionDisplay {
        match kind {
            SectionKind::Active => &self.active,
            SectionKind::Sold => &self.sold,
        }
    }

    fn section_mut(&mut self, kind: SectionKind) -> &mut SectionDisplay {
        match kind {
            SectionKind::Active => &mut self.active,
            SectionKind::Sold => &mut self.sold,
        }
    }

    /// Fold a finished cycle into the board. Failed sections fall back to
    /// their last good view model (marked stale) or to `Empty`.
    pub fn apply(&mut self, report: CycleReport) {
        let outcome = report.outcome();
        let CycleReport {
            finished_at,
            active,
            sold,
            ..
        } = report;

        for (kind, result) in [(SectionKind::Active, active), (SectionKind::Sold, sold)] {
            let slot = self.section_mut(kind);
            let previous = std::mem::replace(slot, SectionDisplay::Empty);
            *slot = match (result, previous) {
                (Ok(view), _) => SectionDisplay::Ready { view, stale: false },
                (Err(_), SectionDisplay::Ready { view, .. }) => {
                    SectionDisplay::Ready { view, stale: true }
                }
                (Err(_), _) => SectionDisplay::Empty,
            };
        }

        if outcome == CycleOutcome::Failed {
            self.state = SchedulerState::Failed;
            self.banner = Some(RETRY_LATER);
        } else {
            self.banner = None;
            self.last_success_at = Some(finished_at);
        }
        self.last_outcome = Some(outcome);
        self.cycles_completed += 1;
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub delay: Duration,
}

pub struct RefreshScheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    retry: RetryPolicy,
}

impl RefreshScheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            pipeline,
            interval,
            retry,
        }
    }

    pub fn from_config(pipeline: Arc<Pipeline>, config: &SchedulerConfig) -> Self {
        Self::new(
            pipeline,
            config.interval(),
            RetryPolicy {
                attempts: config.retry_attempts,
                delay: config.retry_delay(),
            },
        )
    }

    /// Run the initial cycle now and keep refreshing every interval until
    /// the handle is stopped or dropped.
    pub fn start(self) -> SchedulerHandle {
        let (board_tx, board_rx) = watch::channel(Board::default());
        let (tick_tx, tick_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        info!(
            "Scheduler starting: refresh every {:?}, {} retries",
            self.interval, self.retry.attempts
        );
        let task = tokio::spawn(self.drive(board_tx, tick_rx, cancel.clone()));

        SchedulerHandle {
            board: board_rx,
            ticks: tick_tx,
            cancel,
            task: Some(task),
        }
    }

    async fn drive(
        self,
        board: watch::Sender<Board>,
        mut manual_ticks: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) {
        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: Option<JoinHandle<FetchedBatch>> = Some(self.spawn_fetch(&board));

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                joined = async {
                    match in_flight.as_mut() {
                        Some(task) => task.await,
                        None => pending().await,
                    }
                } => {
                    in_flight = None;
                    self.finish_cycle(&board, joined);
                }

                _ = timer.tick() => self.on_tick(&board, &mut in_flight),

                Some(()) = manual_ticks.recv() => self.on_tick(&board, &mut in_flight),
            }
        }

        if let Some(task) = in_flight.take() {
            debug!("Discarding in-flight cycle");
            task.abort();
        }
        info!("Scheduler stopped");
    }

    fn on_tick(&self, board: &watch::Sender<Board>, in_flight: &mut Option<JoinHandle<FetchedBatch>>) {
        if in_flight.is_some() {
            debug!("Cycle in flight, dropping tick");
            board.send_modify(|b| b.ticks_dropped += 1);
            return;
        }
        *in_flight = Some(self.spawn_fetch(board));
    }

    fn spawn_fetch(&self, board: &watch::Sender<Board>) -> JoinHandle<FetchedBatch> {
        board.send_modify(|b| b.state = SchedulerState::Fetching);
        let pipeline = Arc::clone(&self.pipeline);
        let retry = self.retry;
        tokio::spawn(fetch_with_retry(pipeline, retry))
    }

    fn finish_cycle(
        &self,
        board: &watch::Sender<Board>,
        joined: Result<FetchedBatch, tokio::task::JoinError>,
    ) {
        let report = match joined {
            Ok(batch) => {
                if !batch.is_total_failure() {
                    board.send_modify(|b| b.state = SchedulerState::Rendering);
                }
                self.pipeline.render_batch(batch)
            }
            Err(e) => {
                error!("Fetch task failed: {}", e);
                CycleReport::failed(Utc::now(), FetchError::Unreachable)
            }
        };

        if report.is_total_failure() {
            warn!("Cycle failed for every section; keeping previous listings");
        }
        board.send_modify(|b| b.apply(report));
        board.send_modify(|b| b.state = SchedulerState::Idle);
    }
}

/// Fetch both sections; when every section failed, try again up to
/// `retry.attempts` times within the same cycle.
async fn fetch_with_retry(pipeline: Arc<Pipeline>, retry: RetryPolicy) -> FetchedBatch {
    let strategy = FixedInterval::new(retry.delay).take(retry.attempts);
    let attempt = || {
        let pipeline = Arc::clone(&pipeline);
        async move {
            let batch = pipeline.fetch_all().await;
            if batch.is_total_failure() {
                debug!("Both sections failed");
                Err(batch)
            } else {
                Ok(batch)
            }
        }
    };
    Retry::start(strategy, attempt)
        .await
        .unwrap_or_else(|batch| batch)
}

// ── Handle ────────────────────────────────────────────────────────────────────

pub struct SchedulerHandle {
    board: watch::Receiver<Board>,
    ticks: mpsc::Sender<()>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn subscribe(&self) -> watch::Receiver<Board> {
        self.board.clone()
    }

    #[cfg(test)]
    pub fn board(&self) -> Board {
        self.board.borrow().clone()
    }

    /// Inject a tick as if the timer fired. Returns false when the tick
    /// could not be delivered.
    pub fn tick(&self) -> bool {
        self.ticks.try_send(()).is_ok()
    }

    /// Stop ticking and discard any in-flight cycle.
    pub async fn stop(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await.context("Scheduler task panicked")?;
        }
        Ok(())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
