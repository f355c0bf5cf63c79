// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Merge remote words into a local collection.
//!
//! Records are matched by [`IdentityKey`]. A remote record nobody has seen
//! locally gets appended under a fresh local id. A remote record matching a
//! local one replaces it only if its timestamp is strictly newer, and even
//! then the local id survives. Anything else leaves the local record alone.
//!
//! # Pitfalls
//!
//! There are no tombstones. A word deleted locally but still present in the
//! remote snapshot comes back on the next merge. Records lacking timestamps
//! compare as the Unix epoch, so they lose against any real local edit.

use crate::{
    record::{parse_timestamp, IdentityKey, WordId, WordRecord},
    snapshot::{RemoteBatch, RemoteWord},
};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Summary of what a merge did to the local collection.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Remote records appended as new local records.
    pub added: usize,

    /// Local records overwritten by newer remote records.
    pub updated: usize,

    /// Remote records that lost against the local record.
    pub unchanged: usize,

    /// Remote records that could not be used.
    pub skipped: usize,
}

impl MergeReport {
    /// Check if merge modified the local collection.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Merge batch of remote words into local collection.
///
/// New records get their id from `allocate_id`, and fall back to `now` for
/// timestamps missing on both ends.
pub fn merge(
    local: &mut Vec<WordRecord>,
    remote: RemoteBatch,
    now: DateTime<Utc>,
    mut allocate_id: impl FnMut() -> WordId,
) -> MergeReport {
    let mut report = MergeReport {
        skipped: remote.skipped,
        ..Default::default()
    };

    // INVARIANT: First record wins the index slot if local data already holds
    // duplicate keys, later duplicates are never touched.
    let mut index: HashMap<IdentityKey, usize> = HashMap::with_capacity(local.len());
    for (position, record) in local.iter().enumerate() {
        index.entry(record.key()).or_insert(position);
    }

    for incoming in remote.words {
        let key = match incoming.word.as_deref().map(IdentityKey::new) {
            Some(key) if !key.is_empty() => key,
            _ => {
                warn!("skip remote record without word text");
                report.skipped += 1;
                continue;
            }
        };

        match index.get(&key) {
            Some(&position) => {
                let current = &mut local[position];
                let stamp = remote_stamp(&incoming);
                if stamp > current.updated_at {
                    debug!("remote copy of {key:?} is newer, overwrite local copy");
                    overwrite(current, incoming, stamp);
                    report.updated += 1;
                } else {
                    report.unchanged += 1;
                }
            }
            None => {
                debug!("remote word {key:?} is new, append it");
                local.push(adopt(incoming, allocate_id(), now));
                index.insert(key, local.len() - 1);
                report.added += 1;
            }
        }
    }

    report
}

/// Timestamp used to compare remote record against local copy.
fn remote_stamp(incoming: &RemoteWord) -> DateTime<Utc> {
    incoming
        .updated_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| incoming.created_at.as_deref().and_then(parse_timestamp))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn overwrite(current: &mut WordRecord, incoming: RemoteWord, stamp: DateTime<Utc>) {
    let created_at = incoming
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(current.created_at);
    let difficulty = incoming.difficulty();
    let source = incoming.source();

    current.word = incoming.word.unwrap_or_default().trim().to_string();
    current.definition = incoming.definition.unwrap_or_default();
    current.part_of_speech = incoming.part_of_speech.unwrap_or_default();
    current.pronunciation = incoming.pronunciation.unwrap_or_default();
    current.examples = incoming.examples.unwrap_or_default();
    current.synonyms = incoming.synonyms.unwrap_or_default();
    current.antonyms = incoming.antonyms.unwrap_or_default();
    current.difficulty = difficulty;
    current.mastered = incoming.mastered.unwrap_or_default();
    current.notes = incoming.notes.unwrap_or_default();
    current.created_at = created_at.min(stamp);
    current.updated_at = stamp;
    current.source = source;
}

fn adopt(incoming: RemoteWord, id: WordId, now: DateTime<Utc>) -> WordRecord {
    let created_at = incoming.created_at.as_deref().and_then(parse_timestamp);
    let updated_at = incoming.updated_at.as_deref().and_then(parse_timestamp);
    let created_at = created_at.or(updated_at).unwrap_or(now);
    let updated_at = updated_at.unwrap_or(created_at).max(created_at);
    let difficulty = incoming.difficulty();
    let source = incoming.source();

    WordRecord {
        id,
        word: incoming.word.unwrap_or_default().trim().to_string(),
        definition: incoming.definition.unwrap_or_default(),
        part_of_speech: incoming.part_of_speech.unwrap_or_default(),
        pronunciation: incoming.pronunciation.unwrap_or_default(),
        examples: incoming.examples.unwrap_or_default(),
        synonyms: incoming.synonyms.unwrap_or_default(),
        antonyms: incoming.antonyms.unwrap_or_default(),
        difficulty,
        mastered: incoming.mastered.unwrap_or_default(),
        notes: incoming.notes.unwrap_or_default(),
        created_at,
        updated_at,
        source,
    }
}

/// Check if remote batch already reflects every local record.
///
/// Compares identity keys and update timestamps. Used to decide whether a
/// push is worth doing after a pull.
pub fn in_step(local: &[WordRecord], remote: &RemoteBatch) -> bool {
    let remote = remote
        .words
        .iter()
        .filter_map(|word| {
            let key = IdentityKey::new(word.word.as_deref()?);
            Some((key, remote_stamp(word)))
        })
        .collect::<HashMap<_, _>>();

    local.len() == remote.len()
        && local
            .iter()
            .all(|record| remote.get(&record.key()) == Some(&record.updated_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Difficulty, IdAllocator, Source};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn stamp(day: u32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 0, 0, 0).unwrap()
    }

    fn local_word(id: u64, word: &str, updated_at: DateTime<Utc>) -> WordRecord {
        WordRecord {
            id: WordId::new(id),
            word: word.into(),
            definition: format!("local {word}"),
            part_of_speech: "noun".into(),
            pronunciation: String::new(),
            examples: Vec::new(),
            synonyms: Vec::new(),
            antonyms: Vec::new(),
            difficulty: Difficulty::Easy,
            mastered: false,
            notes: String::new(),
            created_at: updated_at,
            updated_at,
            source: Source::Manual,
        }
    }

    fn remote_word(word: &str, updated_at: &str, definition: &str) -> RemoteWord {
        RemoteWord {
            word: Some(word.into()),
            definition: Some(definition.into()),
            updated_at: Some(updated_at.into()),
            ..Default::default()
        }
    }

    fn merge_now(local: &mut Vec<WordRecord>, remote: RemoteBatch) -> MergeReport {
        let mut ids = IdAllocator::seeded(local.iter().map(|record| record.id));
        merge(local, remote, stamp(1, 10), || ids.next_at(stamp(1, 10)))
    }

    #[test]
    fn newer_remote_overwrites_but_keeps_local_id() {
        let mut local = vec![local_word(7, "cat", stamp(1, 1))];
        let remote = RemoteBatch::new([remote_word("Cat", "2024-06-01", "feline")]);

        let report = merge_now(&mut local, remote);

        assert_eq!(report.updated, 1);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].id, WordId::new(7));
        assert_eq!(local[0].word, "Cat");
        assert_eq!(local[0].definition, "feline");
        assert_eq!(local[0].updated_at, stamp(1, 6));
        assert_eq!(local[0].source, Source::Sync);
    }

    #[test]
    fn equal_or_older_remote_leaves_local_untouched() {
        let original = local_word(7, "cat", stamp(1, 6));
        let mut local = vec![original.clone()];
        let remote = RemoteBatch::new([
            remote_word("cat", "2024-06-01", "same instant"),
            remote_word("cat", "2024-01-01", "older"),
        ]);

        let report = merge_now(&mut local, remote);

        assert_eq!(report.unchanged, 2);
        assert_eq!(local, vec![original]);
    }

    #[test]
    fn unknown_remote_word_is_appended_once() {
        let mut local = Vec::new();
        let remote = RemoteBatch::new([remote_word("dog", "2024-03-01", "canine")]);

        let report = merge_now(&mut local, remote);

        assert_eq!(report.added, 1);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].word, "dog");
        assert_eq!(local[0].created_at, stamp(1, 3));
        assert_eq!(local[0].id, WordId::new(stamp(1, 10).timestamp_millis() as u64));
    }

    #[test]
    fn duplicate_keys_in_one_batch_collapse() {
        let mut local = Vec::new();
        let remote = RemoteBatch::new([
            remote_word("dog", "2024-03-01", "first"),
            remote_word("DOG", "2024-04-01", "second"),
        ]);

        let report = merge_now(&mut local, remote);

        assert_eq!((report.added, report.updated), (1, 1));
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].definition, "second");
    }

    #[test]
    fn merge_never_removes_local_records() {
        let mut local = vec![
            local_word(1, "cat", stamp(1, 1)),
            local_word(2, "owl", stamp(1, 1)),
        ];
        let remote = RemoteBatch::new([remote_word("cat", "2024-06-01", "feline")]);

        merge_now(&mut local, remote);

        let words = local.iter().map(|record| record.word.as_str()).collect::<Vec<_>>();
        assert_eq!(words, vec!["cat", "owl"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut local = vec![local_word(1, "cat", stamp(1, 1))];
        let remote = RemoteBatch::new([
            remote_word("cat", "2024-06-01", "feline"),
            remote_word("dog", "2024-03-01", "canine"),
            RemoteWord {
                word: Some("emu".into()),
                ..Default::default()
            },
        ]);

        merge_now(&mut local, remote.clone());
        let once = local.clone();
        let report = merge_now(&mut local, remote);

        assert!(!report.changed());
        assert_eq!(local, once);
    }

    #[test]
    fn missing_timestamps_lose_against_local_edits() {
        let original = local_word(1, "cat", stamp(1, 1));
        let mut local = vec![original.clone()];
        let remote = RemoteBatch::new([RemoteWord {
            word: Some("cat".into()),
            definition: Some("undated".into()),
            ..Default::default()
        }]);

        merge_now(&mut local, remote);

        assert_eq!(local, vec![original]);
    }

    #[test]
    fn records_without_word_text_are_skipped() {
        let mut local = Vec::new();
        let remote = RemoteBatch {
            words: vec![RemoteWord::default(), remote_word("  ", "2024-01-01", "blank")],
            skipped: 3,
        };

        let report = merge_now(&mut local, remote);

        assert_eq!(report.skipped, 5);
        assert!(local.is_empty());
    }

    #[test]
    fn in_step_compares_keys_and_stamps() {
        let local = vec![local_word(1, "cat", stamp(1, 6))];
        let remote = RemoteBatch::new(local.clone());
        assert!(in_step(&local, &remote));

        let stale = RemoteBatch::new([remote_word("cat", "2024-01-01", "old")]);
        assert!(!in_step(&local, &stale));
        assert!(!in_step(&local, &RemoteBatch::default()));
    }
}
