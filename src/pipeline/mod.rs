//! Cycle orchestrator: ties fetcher → normalizer → render together.
//!
//! ## One cycle
//!
//!   1. Fetch Active and Sold concurrently (independent, no shared state).
//!   2. Normalize each successful batch.
//!   3. Render each section with its own cap.
//!
//! Sections succeed or fail independently; a `CycleReport` carries one
//! outcome per section rather than an all-or-nothing result.

use crate::config::AppConfig;
use crate::fetcher::{FetchError, ListingSource};
use crate::models::{CanonicalListing, RawListing, SectionKind, SectionViewModel};
use crate::normalizer::normalize;
use crate::render::{RenderSettings, render_with};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

pub type SectionOutcome = Result<SectionViewModel, FetchError>;

pub struct Pipeline {
    source: Arc<dyn ListingSource>,
    fetch_limit: u32,
    active: RenderSettings,
    sold: RenderSettings,
}

impl Pipeline {
    pub fn new(source: Arc<dyn ListingSource>, config: &AppConfig) -> Self {
        Self {
            source,
            fetch_limit: config.feed.fetch_limit,
            active: RenderSettings::for_section(&config.render, SectionKind::Active),
            sold: RenderSettings::for_section(&config.render, SectionKind::Sold),
        }
    }

    fn settings(&self, kind: SectionKind) -> &RenderSettings {
        match kind {
            SectionKind::Active => &self.active,
            SectionKind::Sold => &self.sold,
        }
    }

    /// Both per-status fetches; returns once both have completed or failed.
    pub async fn fetch_all(&self) -> FetchedBatch {
        let started_at = Utc::now();
        let (active, sold) = tokio::join!(
            self.source.fetch(SectionKind::Active, self.fetch_limit),
            self.source.fetch(SectionKind::Sold, self.fetch_limit),
        );
        FetchedBatch {
            started_at,
            active,
            sold,
        }
    }

    /// Normalize + render a fetched batch. Pure apart from logging.
    pub fn render_batch(&self, batch: FetchedBatch) -> CycleReport {
        let FetchedBatch {
            started_at,
            active,
            sold,
        } = batch;

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            active: self.render_section(SectionKind::Active, active),
            sold: self.render_section(SectionKind::Sold, sold),
        };

        info!(
            "=== Cycle {:?}: active={} sold={} ===",
            report.outcome(),
            describe(&report.active),
            describe(&report.sold),
        );
        report
    }

    fn render_section(
        &self,
        kind: SectionKind,
        fetched: Result<Vec<RawListing>, FetchError>,
    ) -> SectionOutcome {
        match fetched {
            Ok(raw) => {
                let listings = normalize(&raw);
                Ok(render_with(&listings, kind, self.settings(kind)))
            }
            Err(e) => {
                warn!("{:?} section failed: {}", kind, e);
                Err(e)
            }
        }
    }

    /// One full fetch → normalize → render pass.
    pub async fn run(&self) -> CycleReport {
        let batch = self.fetch_all().await;
        self.render_batch(batch)
    }

    /// Fetch + normalize a single status, no rendering.
    pub async fn fetch_section(
        &self,
        kind: SectionKind,
        limit: Option<u32>,
    ) -> Result<Vec<CanonicalListing>, FetchError> {
        let raw = self
            .source
            .fetch(kind, limit.unwrap_or(self.fetch_limit))
            .await?;
        Ok(normalize(&raw))
    }
}

fn describe(outcome: &SectionOutcome) -> String {
    match outcome {
        Ok(view) if view.truncated => format!("{} cards (truncated)", view.cards.len()),
        Ok(view) => format!("{} cards", view.cards.len()),
        Err(e) => format!("failed ({})", e),
    }
}

// ── Batches and reports ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FetchedBatch {
    pub started_at: DateTime<Utc>,
    pub active: Result<Vec<RawListing>, FetchError>,
    pub sold: Result<Vec<RawListing>, FetchError>,
}

impl FetchedBatch {
    pub fn is_total_failure(&self) -> bool {
        self.active.is_err() && self.sold.is_err()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleOutcome {
    Complete,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub active: SectionOutcome,
    pub sold: SectionOutcome,
}

impl CycleReport {
    /// A report where every section failed with `error`.
    pub fn failed(started_at: DateTime<Utc>, error: FetchError) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            active: Err(error),
            sold: Err(error),
        }
    }

    #[cfg(test)]
    pub fn section(&self, kind: SectionKind) -> &SectionOutcome {
        match kind {
            SectionKind::Active => &self.active,
            SectionKind::Sold => &self.sold,
        }
    }

    pub fn outcome(&self) -> CycleOutcome {
        match (self.active.is_ok(), self.sold.is_ok()) {
            (true, true) => CycleOutcome::Complete,
            (false, false) => CycleOutcome::Failed,
            _ => CycleOutcome::Partial,
        }
    }

    pub fn is_total_failure(&self) -> bool {
        self.outcome() == CycleOutcome::Failed
    }
}
