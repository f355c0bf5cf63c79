// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Durable record of pushes that did not make it.
//!
//! When a push fails, or needs a human to finish it, the snapshot that was
//! meant to go out is written to `outbox.json` in the word store. The entry
//! stays there until a later push succeeds, or a pull shows the remote
//! already holds the collection, so a push that failed right before
//! shutdown gets retried on the next start instead of being lost.
//!
//! Only the latest entry matters. Snapshots are full dumps of the
//! collection, so a newer entry replaces an older one, and a retry always
//! pushes the current collection rather than the stored payload.

use crate::snapshot::Snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, remove_file, rename, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// File name of the outbox inside the word store.
pub const OUTBOX_FILE: &str = "outbox.json";

/// Push waiting to be retried.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPush {
    /// When the first failed attempt happened.
    pub queued_at: DateTime<Utc>,

    /// Number of failed attempts so far.
    pub attempts: u32,

    /// Why the last attempt did not finish.
    pub reason: String,

    /// Snapshot of the last attempt.
    pub snapshot: Snapshot,
}

/// Outbox file handle.
#[derive(Debug, Clone)]
pub struct Outbox {
    outbox_path: PathBuf,
}

impl Outbox {
    /// Construct outbox handle for given word store directory.
    pub fn new(store_path: impl AsRef<Path>) -> Self {
        Self {
            outbox_path: store_path.as_ref().join(OUTBOX_FILE),
        }
    }

    /// Current pending push, if any.
    ///
    /// # Errors
    ///
    /// - Return [`OutboxError::Read`] if outbox cannot be read.
    /// - Return [`OutboxError::Deserialize`] if outbox is corrupt.
    pub fn pending(&self) -> Result<Option<PendingPush>> {
        match read_to_string(&self.outbox_path) {
            Ok(data) => serde_json::from_str(&data)
                .map(Some)
                .map_err(OutboxError::Deserialize),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(OutboxError::Read {
                source: err,
                outbox_path: self.outbox_path.clone(),
            }),
        }
    }

    /// Record failed push attempt.
    ///
    /// Keeps the original queue time and bumps the attempt counter if an
    /// entry already exists. A corrupt entry is replaced.
    ///
    /// # Errors
    ///
    /// - Return [`OutboxError::Write`] if outbox cannot be written.
    pub fn record_failure(&self, snapshot: Snapshot, reason: impl Into<String>) -> Result<PendingPush> {
        let previous = self.pending().ok().flatten();
        let entry = PendingPush {
            queued_at: previous
                .as_ref()
                .map(|entry| entry.queued_at)
                .unwrap_or_else(Utc::now),
            attempts: previous.map(|entry| entry.attempts + 1).unwrap_or(1),
            reason: reason.into(),
            snapshot,
        };
        info!(
            "queue push in outbox after {} failed attempt(s): {}",
            entry.attempts, entry.reason
        );

        let data = serde_json::to_string_pretty(&entry).map_err(OutboxError::Serialize)?;
        let temp_path = self.outbox_path.with_extension("json.tmp");

        // INVARIANT: Replace outbox in one step.
        write(&temp_path, data.as_bytes())
            .and_then(|_| rename(&temp_path, &self.outbox_path))
            .map_err(|err| OutboxError::Write {
                source: err,
                outbox_path: self.outbox_path.clone(),
            })?;

        Ok(entry)
    }

    /// Drop pending push after a successful push.
    ///
    /// # Errors
    ///
    /// - Return [`OutboxError::Write`] if outbox cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match remove_file(&self.outbox_path) {
            Ok(()) => {
                debug!("cleared outbox at {:?}", self.outbox_path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(OutboxError::Write {
                source: err,
                outbox_path: self.outbox_path.clone(),
            }),
        }
    }
}

/// Outbox error types.
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    /// Outbox cannot be read.
    #[error("failed to read outbox at {:?}", outbox_path.display())]
    Read {
        #[source]
        source: std::io::Error,
        outbox_path: PathBuf,
    },

    /// Outbox cannot be written or removed.
    #[error("failed to write outbox at {:?}", outbox_path.display())]
    Write {
        #[source]
        source: std::io::Error,
        outbox_path: PathBuf,
    },

    /// Outbox holds garbage.
    #[error("failed to parse outbox entry")]
    Deserialize(#[source] serde_json::Error),

    /// Outbox entry cannot be rendered.
    #[error("failed to render outbox entry")]
    Serialize(#[source] serde_json::Error),
}

/// Friendly result alias :3
type Result<T, E = OutboxError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test]
    fn failures_accumulate_until_cleared() -> anyhow::Result<()> {
        let outbox = Outbox::new(".");
        assert_eq!(outbox.pending()?, None);

        let snapshot = Snapshot::new(Vec::new(), Utc::now());
        let first = outbox.record_failure(snapshot.clone(), "offline")?;
        let second = outbox.record_failure(snapshot, "still offline")?;

        assert_eq!(second.attempts, 2);
        assert_eq!(second.queued_at, first.queued_at);
        assert_eq!(outbox.pending()?, Some(second));

        outbox.clear()?;
        outbox.clear()?;
        assert_eq!(outbox.pending()?, None);

        Ok(())
    }

    #[sealed_test]
    fn record_leaves_no_temp_file_behind() -> anyhow::Result<()> {
        let outbox = Outbox::new(".");
        outbox.record_failure(Snapshot::new(Vec::new(), Utc::now()), "offline")?;

        assert!(Path::new(OUTBOX_FILE).exists());
        assert!(!Path::new("outbox.json.tmp").exists());

        Ok(())
    }

    #[sealed_test]
    fn corrupt_outbox_is_replaced_by_next_record() -> anyhow::Result<()> {
        write(OUTBOX_FILE, "{ not json")?;
        let outbox = Outbox::new(".");
        assert!(matches!(outbox.pending(), Err(OutboxError::Deserialize(_))));

        let entry = outbox.record_failure(Snapshot::new(Vec::new(), Utc::now()), "offline")?;
        assert_eq!(entry.attempts, 1);
        assert_eq!(outbox.pending()?, Some(entry));

        Ok(())
    }
}
