// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Synchronization between the word store and the remote snapshot.
//!
//! The word store is authoritative for the user's own edits. The remote
//! snapshot is a shared replica that gets reconciled into the store by the
//! last-writer-wins rules of [`crate::merge`], and overwritten by pushes of
//! the full local collection.
//!
//! # Sync Cycle
//!
//! 1. Pull: fetch remote snapshot, merge it into the word store, and save.
//! 2. Push: only if the pull worked and the store holds something the
//!    remote lacks. A pull showing the remote already in step with the store
//!    clears the outbox, which is how manual pushes get settled.
//!
//! A failed pull never leads to a push, because pushing a full snapshot
//! without knowing what the remote holds would throw away other people's
//! words. Remote failures do not bubble up as errors. They are logged,
//! reported, and remembered in the outbox so the next cycle retries them.
//!
//! Only one cycle may run at a time. Overlapping attempts are skipped
//! outright rather than queued.

use crate::{
    config::SyncSettings,
    merge::{in_step, MergeReport},
    outbox::{Outbox, OutboxError},
    remote::{PushOutcome, RemoteError, SnapshotTransport},
    snapshot::RemoteBatch,
    store::{Store, StoreError},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::{
    sync::{Mutex, MutexGuard},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, instrument, warn};

/// Word store paired with a remote snapshot.
#[derive(Debug)]
pub struct Syncer<T> {
    store: Mutex<Store>,
    transport: T,
    outbox: Outbox,
    last_seen: Mutex<Option<RemoteBatch>>,
    in_flight: AtomicBool,
}

impl<T: SnapshotTransport> Syncer<T> {
    /// Construct new syncer keeping its outbox in the word store.
    pub fn new(store: Store, transport: T) -> Self {
        let outbox = Outbox::new(store.path());
        Self {
            store: Mutex::new(store),
            transport,
            outbox,
            last_seen: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Lock word store.
    ///
    /// Do not hold on to the guard across a sync call, that will deadlock.
    pub async fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().await
    }

    pub fn into_store(self) -> Store {
        self.store.into_inner()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Pull remote snapshot into word store.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Store`] if word store cannot be read or saved.
    #[instrument(skip(self), level = "debug")]
    pub async fn pull(&self) -> Result<SyncOutcome> {
        let Some(_guard) = self.begin() else {
            return Ok(SyncOutcome::Skipped);
        };
        let pull = self.pull_once().await?;

        Ok(SyncOutcome::Done(SyncReport {
            pull,
            push: PushStatus::NotAttempted,
        }))
    }

    /// Push word store to remote snapshot unconditionally.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Outbox`] if outbox cannot be updated.
    #[instrument(skip(self), level = "debug")]
    pub async fn push(&self) -> Result<SyncOutcome> {
        let Some(_guard) = self.begin() else {
            return Ok(SyncOutcome::Skipped);
        };
        let push = self.push_once().await?;

        Ok(SyncOutcome::Done(SyncReport {
            pull: PullStatus::NotAttempted,
            push,
        }))
    }

    /// Run full sync cycle.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Store`] if word store cannot be read or saved.
    /// - Return [`SyncError::Outbox`] if outbox cannot be updated.
    #[instrument(skip(self), level = "debug")]
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let Some(_guard) = self.begin() else {
            return Ok(SyncOutcome::Skipped);
        };

        let pull = self.pull_once().await?;
        let ahead = self.ahead_of_remote().await;
        let push = match &pull {
            PullStatus::Failed(error) => {
                if ahead || self.push_pending() {
                    let snapshot = self.store.lock().await.snapshot();
                    self.outbox
                        .record_failure(snapshot, format!("pull failed: {error}"))?;
                }
                PushStatus::NotAttempted
            }
            _ if ahead => self.push_once().await?,
            _ => {
                // Remote already holds every local word, nothing left to deliver.
                self.outbox.clear()?;
                PushStatus::UpToDate
            }
        };

        Ok(SyncOutcome::Done(SyncReport { pull, push }))
    }

    /// Keep syncing until `shutdown` resolves.
    ///
    /// Syncs right away, which flushes anything left in the outbox by an
    /// earlier run. Afterwards pulls on one timer, runs full cycles on
    /// another, and does a final full cycle once `shutdown` resolves. A
    /// final push that fails stays in the outbox for the next start.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError`] if the word store or outbox become unusable.
    pub async fn watch(
        &self,
        settings: &SyncSettings,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let mut pull_timer = interval(Duration::from_secs(settings.pull_interval_secs.max(1)));
        pull_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut push_timer = interval(Duration::from_secs(settings.push_interval_secs.max(1)));
        push_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // INVARIANT: First tick of an interval completes immediately.
        pull_timer.tick().await;
        push_timer.tick().await;

        let outcome = self.sync().await?;
        info!("{outcome}");
        tokio::pin!(shutdown);
        loop {
            let outcome = tokio::select! {
                _ = &mut shutdown => break,
                _ = pull_timer.tick() => self.pull().await?,
                _ = push_timer.tick() => self.sync().await?,
            };
            info!("{outcome}");
        }

        info!("flush word store before shutdown");
        let outcome = self.sync().await?;
        info!("{outcome}");

        Ok(())
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        match self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(InFlight(&self.in_flight)),
            Err(_) => {
                debug!("sync already in flight, skip");
                None
            }
        }
    }

    fn push_pending(&self) -> bool {
        // A corrupt outbox counts as pending, the next good push replaces it.
        !matches!(self.outbox.pending(), Ok(None))
    }

    async fn ahead_of_remote(&self) -> bool {
        let last_seen = self.last_seen.lock().await;
        let store = self.store.lock().await;
        match last_seen.as_ref() {
            Some(batch) => !in_step(store.words(), batch),
            None => !store.words().is_empty(),
        }
    }

    async fn pull_once(&self) -> Result<PullStatus> {
        let batch = match self.transport.fetch().await {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                *self.last_seen.lock().await = Some(RemoteBatch::default());
                return Ok(PullStatus::NoSnapshot);
            }
            Err(error) => {
                warn!("pull failed, keep working with local words: {error}");
                return Ok(PullStatus::Failed(error));
            }
        };

        let mut store = self.store.lock().await;
        store.reload()?;
        let report = store.merge_remote(batch.clone())?;
        drop(store);
        *self.last_seen.lock().await = Some(batch);

        Ok(PullStatus::Merged(report))
    }

    async fn push_once(&self) -> Result<PushStatus> {
        let snapshot = self.store.lock().await.snapshot();
        match self.transport.push(&snapshot).await {
            Ok(PushOutcome::Written { revision }) => {
                self.outbox.clear()?;
                *self.last_seen.lock().await = Some(RemoteBatch::new(snapshot.words));
                Ok(PushStatus::Written { revision })
            }
            Ok(PushOutcome::ManualActionRequired { url }) => {
                self.outbox
                    .record_failure(snapshot, "waiting for snapshot issue to be submitted")?;
                Ok(PushStatus::ManualActionRequired { url })
            }
            Err(error) => {
                warn!("push failed, keep it in outbox: {error}");
                self.outbox.record_failure(snapshot, error.to_string())?;
                Ok(PushStatus::Failed(error))
            }
        }
    }
}

/// Resets in-flight flag when a sync attempt ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Result of a sync attempt.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Another attempt was still running.
    Skipped,

    /// Attempt ran.
    Done(SyncReport),
}

impl Display for SyncOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Skipped => fmt.write_str("sync skipped, another one is running"),
            Self::Done(report) => write!(fmt, "{report}"),
        }
    }
}

/// What a sync attempt did.
#[derive(Debug)]
pub struct SyncReport {
    pub pull: PullStatus,
    pub push: PushStatus,
}

impl Display for SyncReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.pull {
            PullStatus::NotAttempted => {}
            PullStatus::NoSnapshot => fmt.write_str("pull: no remote snapshot yet; ")?,
            PullStatus::Merged(report) => write!(
                fmt,
                "pull: {} added, {} updated, {} unchanged, {} skipped; ",
                report.added, report.updated, report.unchanged, report.skipped
            )?,
            PullStatus::Failed(error) => write!(fmt, "pull: failed ({error}); ")?,
        }

        match &self.push {
            PushStatus::NotAttempted => fmt.write_str("push: not attempted"),
            PushStatus::UpToDate => fmt.write_str("push: remote up to date"),
            PushStatus::Written { revision } => write!(fmt, "push: written at {revision}"),
            PushStatus::ManualActionRequired { url } => {
                write!(fmt, "push: submit snapshot issue at {url}")
            }
            PushStatus::Failed(error) => write!(fmt, "push: failed ({error}), queued in outbox"),
        }
    }
}

/// Pull half of a sync attempt.
#[derive(Debug)]
pub enum PullStatus {
    NotAttempted,
    NoSnapshot,
    Merged(MergeReport),
    Failed(RemoteError),
}

/// Push half of a sync attempt.
#[derive(Debug)]
pub enum PushStatus {
    NotAttempted,
    UpToDate,
    Written { revision: String },
    ManualActionRequired { url: String },
    Failed(RemoteError),
}

/// Sync error types.
///
/// Remote failures are not errors here, see [`PullStatus::Failed`] and
/// [`PushStatus::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

/// Friendly result alias :3
type Result<T, E = SyncError> = std::result::Result<T, E>;
