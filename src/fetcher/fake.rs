//! In-memory `ListingSource` for tests.

use super::{FetchError, ListingSource};
use crate::models::{RawListing, SectionKind};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

type Response = Result<Vec<RawListing>, FetchError>;

/// Replays scripted responses per section; the last scripted response
/// repeats forever. Unscripted sections return an empty batch.
///
/// A gated source holds every call until `release` hands out permits.
pub struct ScriptedSource {
    scripts: Mutex<HashMap<SectionKind, VecDeque<Response>>>,
    calls: AtomicUsize,
    last_limit: Mutex<Option<u32>>,
    gate: Option<Semaphore>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            last_limit: Mutex::new(None),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn script(&self, kind: SectionKind, responses: Vec<Response>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(kind, responses.into_iter().collect());
    }

    /// Let `n` pending or future calls through the gate.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_limit(&self) -> Option<u32> {
        *self.last_limit.lock().unwrap()
    }

    fn next_response(&self, kind: SectionKind) -> Response {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&kind) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Ok(Vec::new())),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl ListingSource for ScriptedSource {
    async fn fetch(&self, kind: SectionKind, limit: u32) -> Result<Vec<RawListing>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_limit.lock().unwrap() = Some(limit);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.next_response(kind)
    }
}
