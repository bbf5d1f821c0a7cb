//! View controller: drives one content view through the pipeline
//!
//! Only the most recent request may publish state. A load that was
//! superseded while in flight finishes quietly and its result is dropped.

use crate::error::ContentError;
use crate::pipeline::ContentPipeline;
use crate::types::{ContentDescriptor, LoadOutcome, ViewState};
use sealed_content::AccessProof;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

/// What a view currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub content_id: Option<String>,
    pub state: ViewState,
    pub error: Option<ContentError>,
}

impl ViewSnapshot {
    fn idle() -> Self {
        Self {
            content_id: None,
            state: ViewState::Idle,
            error: None,
        }
    }
}

type Request = (ContentDescriptor, Option<AccessProof>);

pub struct ViewController {
    pipeline: Arc<ContentPipeline>,
    generation: AtomicU64,
    last_request: Mutex<Option<Request>>,
    state_tx: watch::Sender<ViewSnapshot>,
}

impl ViewController {
    pub fn new(pipeline: Arc<ContentPipeline>) -> Self {
        let (state_tx, _) = watch::channel(ViewSnapshot::idle());
        Self {
            pipeline,
            generation: AtomicU64::new(0),
            last_request: Mutex::new(None),
            state_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.state_tx.borrow().clone()
    }

    /// Load a content item, superseding whatever this view was loading.
    ///
    /// Returns `None` when a newer request took over before this one finished.
    pub async fn show(
        &self,
        descriptor: ContentDescriptor,
        proof: Option<AccessProof>,
    ) -> Option<LoadOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((descriptor.clone(), proof.clone()));
        }
        self.run(generation, &descriptor, proof.as_ref()).await
    }

    /// Re-run the most recent request from the top, cache check included
    pub async fn retry(&self) -> Option<LoadOutcome> {
        let (descriptor, proof) = self.last_request.lock().ok()?.clone()?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(content_id = %descriptor.content_id, "Retrying content load");
        self.run(generation, &descriptor, proof.as_ref()).await
    }

    async fn run(
        &self,
        generation: u64,
        descriptor: &ContentDescriptor,
        proof: Option<&AccessProof>,
    ) -> Option<LoadOutcome> {
        let content_id = descriptor.content_id.as_str();
        let outcome = self
            .pipeline
            .load_with(descriptor, proof, |state| {
                // Terminal states are published below, together with the error
                if !state.is_terminal() {
                    self.publish(generation, content_id, state, None);
                }
            })
            .await;

        if !self.publish(generation, content_id, outcome.state, outcome.error.clone()) {
            debug!(content_id, generation, "Discarding superseded content load");
            return None;
        }
        Some(outcome)
    }

    /// Publish a snapshot if `generation` is still the current request
    fn publish(
        &self,
        generation: u64,
        content_id: &str,
        state: ViewState,
        error: Option<ContentError>,
    ) -> bool {
        let mut current = false;
        self.state_tx.send_if_modified(|snapshot| {
            // Checked under the channel lock so a newer request can't interleave
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            current = true;
            *snapshot = ViewSnapshot {
                content_id: Some(content_id.to_string()),
                state,
                error,
            };
            true
        });
        current
    }
}
