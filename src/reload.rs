//! Reload Orchestrator
//!
//! Runs the load → register → publish cycle, at startup and whenever the
//! directory watcher reports a relevant change.
//!
//! ```text
//!   Idle ──change──▶ Reloading ──done──▶ Idle
//!                      │   ▲
//!               failure│   │retry after interval
//!                      ▼   │
//!                   FailedRetry
//! ```
//!
//! Only one cycle runs at a time. Both retry loops are unbounded, and the
//! previous snapshot keeps serving until a cycle publishes a new one.

use crate::context::AppContext;
use crate::metadata::MetadataError;
use crate::models::FqProduct;
use crate::registration::RegistrationRecord;
use crate::watcher::{ChangeEvent, ChangeKind};
use futures::{FutureExt, Stream, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReloadState {
    #[default]
    Idle,
    Reloading,
    FailedRetry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReloadOutcome {
    Completed(RegistrationRecord),
    /// Another cycle was already in flight
    Skipped,
}

/// Observable reload progress, plus the single-flight flag
#[derive(Debug, Default)]
pub struct ReloadStatus {
    state: RwLock<ReloadState>,
    in_flight: AtomicBool,
    completed: AtomicU64,
}

impl ReloadStatus {
    pub fn state(&self) -> ReloadState {
        *self.state.read()
    }

    /// Number of cycles that published a snapshot
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ReloadState) {
        *self.state.write() = state;
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.set_state(ReloadState::Reloading);
        Some(InFlight { status: self })
    }
}

/// Held for the duration of one cycle
struct InFlight<'a> {
    status: &'a ReloadStatus,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.status.set_state(ReloadState::Idle);
        self.status.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Whether a change should trigger a reload
///
/// Writes to the registration record come from our own registrations and are
/// ignored. Deleting it loses registration state, so that does qualify.
pub fn is_qualifying(event: &ChangeEvent, registration_file: &Path) -> bool {
    event.path != registration_file || event.kind == ChangeKind::Deleted
}

pub struct ReloadOrchestrator {
    ctx: Arc<AppContext>,
}

impl ReloadOrchestrator {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Run one full cycle unless one is already running
    pub async fn reload(&self) -> ReloadOutcome {
        let Some(_in_flight) = self.ctx.status.try_begin() else {
            info!("Reload already in progress, skipping");
            return ReloadOutcome::Skipped;
        };

        let fqproduct = self.load_until_ready().await;

        let status = &self.ctx.status;
        let record = self
            .ctx
            .registration
            .register_with(
                &fqproduct.product,
                |_| status.set_state(ReloadState::Reloading),
                |_| status.set_state(ReloadState::FailedRetry),
            )
            .await;

        self.ctx.store.set(fqproduct.with_address(&record.address));
        status.completed.fetch_add(1, Ordering::SeqCst);
        info!(
            "Published {}/{} with {} artifacts",
            record.namespace,
            record.name,
            fqproduct.artifacts.len()
        );

        ReloadOutcome::Completed(record)
    }

    async fn load_until_ready(&self) -> FqProduct {
        let retry = self.ctx.metadata_retry;
        loop {
            let metadata = self.ctx.metadata.clone();
            match tokio::task::spawn_blocking(move || metadata.load()).await {
                Ok(Ok(fqproduct)) => {
                    info!("Metadata load SUCCESS");
                    self.ctx.status.set_state(ReloadState::Reloading);
                    return fqproduct;
                }
                Ok(Err(e @ MetadataError::Lookup { .. })) => error!(
                    "Metadata load FAILED, artifact has no UUID mapping ({}), retry in {:?}: {}",
                    e.path().display(),
                    retry,
                    e
                ),
                Ok(Err(e)) => error!(
                    "Metadata load FAILED ({}), retry in {:?}: {}",
                    e.path().display(),
                    retry,
                    e
                ),
                Err(e) => error!("Metadata load task failed, retry in {:?}: {}", retry, e),
            }

            self.ctx.status.set_state(ReloadState::FailedRetry);
            tokio::time::sleep(retry).await;
        }
    }

    fn has_qualifying(&self, batch: &[ChangeEvent]) -> bool {
        let registration_file = self.ctx.registration_file();
        let mut qualifying = false;
        for event in batch {
            if !is_qualifying(event, registration_file) {
                debug!("Ignoring {:?} of registration record", event.kind);
                continue;
            }
            match event.kind {
                ChangeKind::Added => info!("ADD: {}", event.path.display()),
                ChangeKind::Modified => info!("CHANGE: {}", event.path.display()),
                ChangeKind::Deleted => info!("DELETE: {}", event.path.display()),
            }
            qualifying = true;
        }
        qualifying
    }

    /// Reload on every qualifying batch until the change stream ends
    ///
    /// Batches that queue up while a cycle runs are folded into at most one
    /// follow-up cycle.
    pub async fn run<S>(&self, changes: S)
    where
        S: Stream<Item = Vec<ChangeEvent>> + Unpin,
    {
        let mut changes = changes.fuse();
        while let Some(batch) = changes.next().await {
            let mut pending = self.has_qualifying(&batch);
            while pending {
                info!("Registration/metadata (reload) initiated");
                if let ReloadOutcome::Completed(_) = self.reload().await {
                    info!("Registration/metadata (reload) complete");
                }

                pending = false;
                while let Some(Some(batch)) = changes.next().now_or_never() {
                    pending |= self.has_qualifying(&batch);
                }
            }
        }
        warn!("Change stream ended, no further reloads");
    }

    /// Initial cycle, then follow `changes`
    pub async fn start<S>(&self, changes: S)
    where
        S: Stream<Item = Vec<ChangeEvent>> + Unpin,
    {
        info!("Initial registration/metadata load");
        self.reload().await;
        self.run(changes).await;
    }
}
