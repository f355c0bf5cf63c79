// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Export and import of the word collection.
//!
//! Exports are plain snapshot documents, the same format the remote
//! snapshot uses, named after the moment they were taken. Imports accept
//! those, bare arrays of word records, and anything else the snapshot
//! parser tolerates, and merge them into the word store exactly like a
//! pull would.

use crate::{
    merge::MergeReport,
    record::Source,
    snapshot::{parse_snapshot, SnapshotError},
    store::{Store, StoreError},
};

use chrono::{DateTime, Utc};
use std::{
    fs::{read, write},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// File name of an export taken at given time.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("wordhoard-{}.json", now.format("%Y%m%d-%H%M%S"))
}

/// Write snapshot of word store into target directory.
///
/// Returns path of the new export file.
///
/// # Errors
///
/// - Return [`ExportError::CreateDir`] if the directory cannot be made.
/// - Return [`ExportError::Write`] if the export cannot be written.
/// - Return [`ExportError::Snapshot`] if the snapshot cannot be rendered.
#[instrument(skip(store, dir), level = "debug")]
pub fn export(store: &Store, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let snapshot = store.snapshot();
    let dir = dir.as_ref();
    mkdirp::mkdirp(dir).map_err(|err| ExportError::CreateDir {
        source: err,
        path: dir.to_path_buf(),
    })?;

    let path = dir.join(export_file_name(snapshot.metadata.last_sync));
    write(&path, snapshot.to_json()?).map_err(|err| ExportError::Write {
        source: err,
        path: path.clone(),
    })?;
    info!("exported {} words to {:?}", snapshot.metadata.total_words, path.display());

    Ok(path)
}

/// Merge exported files into word store.
///
/// Every pattern is expanded as a glob. A pattern without matches is an
/// error, so a typo does not pass as an empty import. Records lacking a
/// provenance tag are marked as imported.
///
/// # Errors
///
/// - Return [`ExportError::Pattern`] if a glob pattern is invalid.
/// - Return [`ExportError::NoMatch`] if a pattern matches nothing.
/// - Return [`ExportError::Read`] if a file cannot be read.
/// - Return [`ExportError::Snapshot`] if a file is not a snapshot.
/// - Return [`ExportError::Store`] if the word store cannot be saved.
#[instrument(skip(store, patterns), level = "debug")]
pub fn import(
    store: &mut Store,
    patterns: impl IntoIterator<Item = impl AsRef<str>>,
) -> Result<MergeReport> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let matches = glob::glob(pattern)?
            .filter_map(std::result::Result::ok)
            .collect::<Vec<_>>();
        if matches.is_empty() {
            return Err(ExportError::NoMatch(pattern.to_string()));
        }
        paths.extend(matches);
    }

    let mut total = MergeReport::default();
    for path in paths {
        let data = read(&path).map_err(|err| ExportError::Read {
            source: err,
            path: path.clone(),
        })?;
        let mut batch = parse_snapshot(data)?;
        for word in &mut batch.words {
            word.source.get_or_insert_with(|| Source::Import.to_string());
        }

        let report = store.merge_remote(batch)?;
        info!(
            "imported {:?}: {} added, {} updated, {} unchanged, {} skipped",
            path.display(),
            report.added,
            report.updated,
            report.unchanged,
            report.skipped
        );
        total.added += report.added;
        total.updated += report.updated;
        total.unchanged += report.unchanged;
        total.skipped += report.skipped;
    }

    Ok(total)
}

/// Export and import error types.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to create export directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to write export {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to read import {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error("no file matches {0:?}")]
    NoMatch(String),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Friendly result alias :3
type Result<T, E = ExportError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{IdentityKey, WordDraft};
    use chrono::TimeZone;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn keys(store: &Store) -> Vec<IdentityKey> {
        let mut keys = store.words().iter().map(|record| record.key()).collect::<Vec<_>>();
        keys.sort();
        keys
    }

    #[test]
    fn export_file_name_carries_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 7).unwrap();
        assert_eq!(export_file_name(now), "wordhoard-20240601-090507.json");
    }

    #[sealed_test]
    fn export_then_import_keeps_collection() -> anyhow::Result<()> {
        let mut store = Store::open("store")?;
        store.add(WordDraft::new("lucid"), Source::Manual)?;
        store.add(WordDraft::new("zeal"), Source::Dictionary)?;
        store.toggle_mastered("zeal")?;
        let path = export(&store, "exports")?;

        let mut fresh = Store::open("fresh")?;
        let report = import(&mut fresh, ["exports/*.json"])?;
        assert_eq!(report.added, 2);
        assert_eq!(keys(&fresh), keys(&store));
        assert!(fresh.find("zeal").is_some_and(|record| record.mastered));
        assert_eq!(fresh.find("zeal").map(|record| &record.source), Some(&Source::Dictionary));

        // Same file again changes nothing.
        let report = import(&mut fresh, [path.to_string_lossy()])?;
        assert_eq!(report.unchanged, 2);
        assert!(!report.changed());

        Ok(())
    }

    #[sealed_test]
    fn import_marks_untagged_records() -> anyhow::Result<()> {
        std::fs::write(
            "legacy.json",
            indoc! {r#"
                [
                  { "word": "mirth", "definition": "amusement", "id": 1717171717171.5 },
                  { "definition": "no word at all" },
                  42
                ]
            "#},
        )?;

        let mut store = Store::open("store")?;
        let report = import(&mut store, ["legacy.json"])?;
        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.find("mirth").map(|record| &record.source), Some(&Source::Import));

        Ok(())
    }

    #[sealed_test]
    fn import_rejects_pattern_without_matches() -> anyhow::Result<()> {
        let mut store = Store::open("store")?;
        assert!(matches!(
            import(&mut store, ["nothing-*.json"]),
            Err(ExportError::NoMatch(_))
        ));

        Ok(())
    }
}
