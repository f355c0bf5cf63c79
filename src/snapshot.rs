// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snapshot layout.
//!
//! A __snapshot__ is a full dump of a word collection at some point in time.
//! It is the unit wordhoard reads from and writes to the remote repository,
//! and the format of export files.
//!
//! ```json
//! {
//!   "words": [ { "id": 1717200000000, "word": "cat", ... } ],
//!   "metadata": { "lastSync": "2024-06-01T00:00:00Z", "totalWords": 1, "version": "0.1.0" }
//! }
//! ```
//!
//! Writing is strict, reading is not. Snapshots get produced by other
//! clients and by hand, so each record is read on its own, and records that
//! cannot be made sense of are skipped instead of failing the whole
//! document. A bare JSON array of records is accepted as well.

use crate::record::{Difficulty, Source, WordRecord};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Snapshot format version written into metadata.
pub const SNAPSHOT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Snapshot as written by wordhoard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Snapshot {
    pub words: Vec<WordRecord>,
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    /// Construct snapshot of given records.
    pub fn new(words: Vec<WordRecord>, now: DateTime<Utc>) -> Self {
        let metadata = SnapshotMetadata {
            last_sync: now,
            total_words: words.len(),
            version: SNAPSHOT_VERSION.into(),
        };

        Self { words, metadata }
    }

    /// Render snapshot as pretty printed JSON.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::Serialize`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(SnapshotError::Serialize)
    }
}

/// Bookkeeping stored next to the words of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub last_sync: DateTime<Utc>,
    pub total_words: usize,
    pub version: String,
}

/// Word record as found in a snapshot written by anybody.
///
/// Every field is optional. Conversion into a proper [`WordRecord`] happens
/// during a merge.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteWord {
    pub word: Option<String>,
    pub definition: Option<String>,
    pub part_of_speech: Option<String>,
    pub pronunciation: Option<String>,
    pub examples: Option<Vec<String>>,
    pub synonyms: Option<Vec<String>>,
    pub antonyms: Option<Vec<String>>,
    pub difficulty: Option<String>,
    pub mastered: Option<bool>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub source: Option<String>,
}

impl RemoteWord {
    /// Difficulty level, falling back to the default for unknown values.
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
            .as_deref()
            .and_then(|data| data.parse().ok())
            .unwrap_or_default()
    }

    /// Provenance tag, falling back to [`Source::Sync`].
    pub fn source(&self) -> Source {
        self.source.clone().map(Source::from).unwrap_or(Source::Sync)
    }
}

impl From<WordRecord> for RemoteWord {
    fn from(record: WordRecord) -> Self {
        Self {
            word: Some(record.word),
            definition: Some(record.definition),
            part_of_speech: Some(record.part_of_speech),
            pronunciation: Some(record.pronunciation),
            examples: Some(record.examples),
            synonyms: Some(record.synonyms),
            antonyms: Some(record.antonyms),
            difficulty: Some(record.difficulty.to_string()),
            mastered: Some(record.mastered),
            notes: Some(record.notes),
            created_at: Some(record.created_at.to_rfc3339()),
            updated_at: Some(record.updated_at.to_rfc3339()),
            source: Some(record.source.to_string()),
        }
    }
}

/// Words read out of a snapshot document.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RemoteBatch {
    /// Records that could be read.
    pub words: Vec<RemoteWord>,

    /// Number of records that were not shaped like a word record at all.
    pub skipped: usize,
}

impl RemoteBatch {
    /// Construct batch out of well formed words.
    pub fn new(words: impl IntoIterator<Item = impl Into<RemoteWord>>) -> Self {
        Self {
            words: words.into_iter().map(Into::into).collect(),
            skipped: 0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Wrapped {
        #[serde(default)]
        words: Vec<Value>,
    },
    Bare(Vec<Value>),
}

/// Parse snapshot document leniently.
///
/// # Errors
///
/// - Return [`SnapshotError::Deserialize`] if data is not JSON, or not
///   shaped like a snapshot or a list of records.
pub fn parse_snapshot(data: impl AsRef<[u8]>) -> Result<RemoteBatch> {
    let document: Document =
        serde_json::from_slice(data.as_ref()).map_err(SnapshotError::Deserialize)?;
    let values = match document {
        Document::Wrapped { words } => words,
        Document::Bare(words) => words,
    };

    let mut batch = RemoteBatch::default();
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RemoteWord>(value) {
            Ok(word) => batch.words.push(word),
            Err(error) => {
                warn!("skip malformed record #{index}: {error}");
                batch.skipped += 1;
            }
        }
    }
    debug!(
        "parsed snapshot with {} records, {} skipped",
        batch.words.len(),
        batch.skipped
    );

    Ok(batch)
}

/// Snapshot error types.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Failed to read snapshot document.
    #[error("failed to parse snapshot document")]
    Deserialize(#[source] serde_json::Error),

    /// Failed to render snapshot document.
    #[error("failed to render snapshot document")]
    Serialize(#[source] serde_json::Error),
}

/// Friendly result alias :3
type Result<T, E = SnapshotError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_wrapped_snapshot_skips_malformed_records() -> anyhow::Result<()> {
        let result = parse_snapshot(indoc! {r#"
            {
              "words": [
                { "id": 1.5, "word": "cat", "updatedAt": "2024-06-01", "difficulty": "HARD" },
                { "word": "dog", "examples": "not a list" },
                42
              ],
              "metadata": { "lastSync": "2024-06-01T00:00:00Z", "totalWords": 3, "version": "1" }
            }
        "#})?;

        assert_eq!(result.skipped, 2);
        assert_eq!(result.words.len(), 1);
        assert_eq!(result.words[0].word.as_deref(), Some("cat"));
        assert_eq!(result.words[0].difficulty(), Difficulty::Hard);
        assert_eq!(result.words[0].source(), Source::Sync);

        Ok(())
    }

    #[test]
    fn parse_bare_array() -> anyhow::Result<()> {
        let result = parse_snapshot(r#"[{ "word": "owl", "source": "ai" }]"#)?;
        assert_eq!(result.words.len(), 1);
        assert_eq!(result.words[0].source(), Source::Assistant);

        Ok(())
    }

    #[test]
    fn parse_snapshot_without_words() -> anyhow::Result<()> {
        let result = parse_snapshot(r#"{ "metadata": {} }"#)?;
        assert_eq!(result, RemoteBatch::default());

        Ok(())
    }

    #[test]
    fn parse_garbage_fails() {
        assert!(parse_snapshot("<html>rate limited</html>").is_err());
    }
}
