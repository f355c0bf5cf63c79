// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Word record layout.
//!
//! A __word record__ is the only entity wordhoard keeps track of. Each record
//! holds a word, its definition, a few lists of related words, a learning
//! status, and the timestamps used to settle conflicts during a merge.
//!
//! # Identity
//!
//! Records carry a numeric [`WordId`] that is unique within one local
//! collection. Ids are never used to match records across machines though.
//! Two records are considered the same word when their [`IdentityKey`]s are
//! equal, i.e., when their word text matches after trimming and lower-casing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Locally unique word record identifier.
///
/// Allocated from the creation time in milliseconds. See [`IdAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WordId(u64);

impl WordId {
    /// Construct word id from raw value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value of word id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for WordId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", self.0)
    }
}

/// Allocate strictly increasing word ids.
///
/// # Invariant
///
/// - Every id handed out is greater than every id seen before, so ids stay
///   unique even when many records get created in the same millisecond.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    /// Construct allocator that never hands out ids at or below given ids.
    pub fn seeded(ids: impl IntoIterator<Item = WordId>) -> Self {
        let last = ids.into_iter().map(WordId::get).max().unwrap_or(0);
        Self { last }
    }

    /// Allocate next id relative to given point in time.
    pub fn next_at(&mut self, now: DateTime<Utc>) -> WordId {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        self.last = millis.max(self.last.saturating_add(1));
        WordId(self.last)
    }

    /// Allocate next id relative to current time.
    pub fn next(&mut self) -> WordId {
        self.next_at(Utc::now())
    }
}

/// Key used to decide whether two records describe the same word.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Normalize word text into identity key.
    pub fn new(word: impl AsRef<str>) -> Self {
        Self(word.as_ref().trim().to_lowercase())
    }

    /// Treat identity key as string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Key of blank word text.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for IdentityKey {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// How hard a word is for the learner.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(UnknownDifficulty(data.to_string())),
        }
    }
}

impl TryFrom<String> for Difficulty {
    type Error = UnknownDifficulty;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        data.parse()
    }
}

impl Display for Difficulty {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        })
    }
}

/// Difficulty level is not one of easy, medium, or hard.
#[derive(Clone, Debug, thiserror::Error)]
#[error("unknown difficulty {0:?}, expected easy, medium, or hard")]
pub struct UnknownDifficulty(String);

/// Provenance of a word record.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    /// Typed in by the user.
    #[default]
    Manual,

    /// Filled in from the dictionary service.
    Dictionary,

    /// Filled in from the AI assistant.
    Assistant,

    /// Pulled from the remote snapshot.
    Sync,

    /// Read from an export file.
    Import,

    /// Anything else, kept verbatim.
    Other(String),
}

impl From<String> for Source {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "manual" => Self::Manual,
            "api" => Self::Dictionary,
            "ai" => Self::Assistant,
            "sync" => Self::Sync,
            "import" => Self::Import,
            _ => Self::Other(tag),
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.to_string()
    }
}

impl Display for Source {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Manual => "manual",
            Self::Dictionary => "api",
            Self::Assistant => "ai",
            Self::Sync => "sync",
            Self::Import => "import",
            Self::Other(tag) => tag.as_str(),
        })
    }
}

/// A dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    pub id: WordId,
    pub word: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub part_of_speech: String,
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub antonyms: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub mastered: bool,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub source: Source,
}

impl WordRecord {
    /// Construct new record out of a draft.
    pub fn from_draft(id: WordId, draft: WordDraft, source: Source, now: DateTime<Utc>) -> Self {
        Self {
            id,
            word: draft.word.trim().to_string(),
            definition: draft.definition,
            part_of_speech: draft.part_of_speech,
            pronunciation: draft.pronunciation,
            examples: draft.examples,
            synonyms: draft.synonyms,
            antonyms: draft.antonyms,
            difficulty: draft.difficulty.unwrap_or_default(),
            mastered: false,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
            source,
        }
    }

    /// Identity key of record.
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.word)
    }

    /// Check if record mentions needle anywhere a reader would look.
    ///
    /// Needle is expected to be lower-cased already.
    pub fn mentions(&self, needle: &str) -> bool {
        let contains = |text: &str| text.to_lowercase().contains(needle);
        contains(&self.word)
            || contains(&self.definition)
            || self.synonyms.iter().any(|synonym| contains(synonym))
            || self.examples.iter().any(|example| contains(example))
    }
}

/// Content for a new word record before it gets an id.
///
/// Filled in by the user, the dictionary service, or the AI assistant.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WordDraft {
    pub word: String,
    pub definition: String,
    pub part_of_speech: String,
    pub pronunciation: String,
    pub examples: Vec<String>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
    #[serde(deserialize_with = "lenient_difficulty")]
    pub difficulty: Option<Difficulty>,
    pub notes: String,
}

impl WordDraft {
    /// Construct draft holding nothing but the word itself.
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Default::default()
        }
    }
}

/// Partial edit of an existing record.
///
/// Fields left as `None` keep their current value.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct WordEdit {
    pub definition: Option<String>,
    pub part_of_speech: Option<String>,
    pub pronunciation: Option<String>,
    pub examples: Option<Vec<String>>,
    pub synonyms: Option<Vec<String>>,
    pub antonyms: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
    pub notes: Option<String>,
}

impl WordEdit {
    /// Check if edit would change anything at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply edit to record.
    ///
    /// Does not touch timestamps, that is left to the caller.
    pub fn apply(self, record: &mut WordRecord) {
        if let Some(definition) = self.definition {
            record.definition = definition;
        }
        if let Some(part_of_speech) = self.part_of_speech {
            record.part_of_speech = part_of_speech;
        }
        if let Some(pronunciation) = self.pronunciation {
            record.pronunciation = pronunciation;
        }
        if let Some(examples) = self.examples {
            record.examples = examples;
        }
        if let Some(synonyms) = self.synonyms {
            record.synonyms = synonyms;
        }
        if let Some(antonyms) = self.antonyms {
            record.antonyms = antonyms;
        }
        if let Some(difficulty) = self.difficulty {
            record.difficulty = difficulty;
        }
        if let Some(notes) = self.notes {
            record.notes = notes;
        }
    }
}

/// Parse timestamp the way other clients tend to write them.
///
/// Accepts RFC 3339, a naive date-time, or a bare date at midnight UTC.
pub fn parse_timestamp(data: impl AsRef<str>) -> Option<DateTime<Utc>> {
    let data = data.as_ref().trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(data) {
        return Some(stamp.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(data, format) {
            return Some(stamp.and_utc());
        }
    }

    NaiveDate::parse_from_str(data, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|stamp| stamp.and_utc())
}

fn lenient_difficulty<'de, D>(deserializer: D) -> Result<Option<Difficulty>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let data = Option::<String>::deserialize(deserializer)?;
    Ok(data.and_then(|data| data.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use simple_test_case::test_case;

    #[test_case("2024-06-01T12:30:00Z", Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(); "rfc3339")]
    #[test_case("2024-06-01T14:30:00+02:00", Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(); "rfc3339 offset")]
    #[test_case("2024-06-01T12:30:00", Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(); "naive date time")]
    #[test_case("2024-06-01", Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(); "bare date")]
    #[test]
    fn parse_timestamp_formats(data: &str, expect: DateTime<Utc>) {
        assert_eq!(parse_timestamp(data), Some(expect));
    }

    #[test]
    fn parse_timestamp_garbage() {
        assert_eq!(parse_timestamp("yesterday-ish"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn identity_key_normalizes_case_and_whitespace() {
        assert_eq!(IdentityKey::new("  Cat "), IdentityKey::new("cat"));
        assert!(IdentityKey::new("   ").is_empty());
    }

    #[test]
    fn id_allocator_is_strictly_increasing() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ids = IdAllocator::default();
        let first = ids.next_at(now);
        let second = ids.next_at(now);
        assert_eq!(first.get(), now.timestamp_millis() as u64);
        assert_eq!(second.get(), first.get() + 1);

        let mut ids = IdAllocator::seeded([WordId::new(u64::MAX - 1)]);
        assert_eq!(ids.next_at(now), WordId::new(u64::MAX));
    }

    #[test]
    fn id_allocator_saturates_at_largest_id() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ids = IdAllocator::seeded([WordId::new(u64::MAX)]);
        assert_eq!(ids.next_at(now), WordId::new(u64::MAX));
    }

    #[test]
    fn source_tags_round_trip_as_text() {
        assert_eq!(Source::from("api".to_string()), Source::Dictionary);
        assert_eq!(String::from(Source::Assistant), "ai");
        assert_eq!(
            Source::from("clipboard".to_string()),
            Source::Other("clipboard".into())
        );
    }

    #[test]
    fn draft_accepts_loose_difficulty() -> anyhow::Result<()> {
        let draft: WordDraft =
            serde_json::from_str(r#"{"word": "ossify", "difficulty": "Hard"}"#)?;
        assert_eq!(draft.difficulty, Some(Difficulty::Hard));

        let draft: WordDraft =
            serde_json::from_str(r#"{"word": "ossify", "difficulty": "brutal"}"#)?;
        assert_eq!(draft.difficulty, None);

        Ok(())
    }

    #[test]
    fn edit_only_touches_given_fields() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = WordRecord::from_draft(
            WordId::new(1),
            WordDraft {
                word: "lucid".into(),
                definition: "clear".into(),
                ..Default::default()
            },
            Source::Manual,
            now,
        );
        let edit = WordEdit {
            difficulty: Some(Difficulty::Easy),
            ..Default::default()
        };
        edit.apply(&mut record);

        assert_eq!(record.definition, "clear");
        assert_eq!(record.difficulty, Difficulty::Easy);
    }
}
