// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local word store management and manipulation.
//!
//! Wordhoard keeps the user's words in one place called the __word store__.
//! The word store is the only place words get added, edited, or removed.
//! Synchronization with the remote snapshot merges into the word store, and
//! pushes from it.
//!
//! # Word Store Layout
//!
//! The word store can generally be placed anywhere on the user's file system.
//! However, the default location is `$XDG_DATA_HOME/wordhoard`. The whole
//! collection is kept as a single JSON array in `words.json`. Every write
//! goes to a temporary file first that then replaces `words.json`, so a
//! crash mid-write never leaves a truncated collection behind.
//!
//! Other parts of wordhoard keep their own files next to `words.json`, e.g.,
//! the sync outbox, or the mirror used by the git transport.

use crate::{
    merge::{merge, MergeReport},
    record::{
        Difficulty, IdAllocator, IdentityKey, Source, WordDraft, WordEdit, WordId, WordRecord,
    },
    snapshot::{RemoteBatch, Snapshot},
};

use chrono::Utc;
use std::{
    fs::{read_to_string, rename, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// File name of the word collection inside the word store.
pub const WORDS_FILE: &str = "words.json";

/// File backed collection of word records.
///
/// # Invariant
///
/// - No two records share a [`WordId`].
/// - No two records added through the store share an [`IdentityKey`].
#[derive(Debug)]
pub struct Store {
    store_path: PathBuf,
    words: Vec<WordRecord>,
    ids: IdAllocator,
}

impl Store {
    /// Open word store at target directory.
    ///
    /// Creates the directory if it is missing. A missing `words.json` means
    /// an empty collection.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateDir`] if store directory cannot be made.
    /// - Return [`StoreError::Read`] if `words.json` cannot be read.
    /// - Return [`StoreError::Deserialize`] if `words.json` is not a valid
    ///   word collection.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store_path = path.as_ref().to_path_buf();
        debug!("open word store at {:?}", store_path.display());
        mkdirp::mkdirp(&store_path).map_err(|err| StoreError::CreateDir {
            source: err,
            store_path: store_path.clone(),
        })?;

        let words = load_words(&store_path)?;
        let ids = IdAllocator::seeded(words.iter().map(|record| record.id));

        Ok(Self {
            store_path,
            words,
            ids,
        })
    }

    /// Re-read `words.json` to pick up writes from other wordhoard processes.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Read`] if `words.json` cannot be read.
    /// - Return [`StoreError::Deserialize`] if `words.json` is not a valid
    ///   word collection.
    pub fn reload(&mut self) -> Result<()> {
        self.words = load_words(&self.store_path)?;
        self.ids = IdAllocator::seeded(self.words.iter().map(|record| record.id));

        Ok(())
    }

    /// Path to word store directory.
    pub fn path(&self) -> &Path {
        self.store_path.as_path()
    }

    /// All word records in insertion order.
    pub fn words(&self) -> &[WordRecord] {
        self.words.as_slice()
    }

    /// Get word record by id.
    pub fn get(&self, id: WordId) -> Option<&WordRecord> {
        self.words.iter().find(|record| record.id == id)
    }

    /// Find word record by word text, ignoring case.
    pub fn find(&self, word: impl AsRef<str>) -> Option<&WordRecord> {
        let key = IdentityKey::new(word);
        self.words.iter().find(|record| record.key() == key)
    }

    /// Add new word to store.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::EmptyWord`] if draft has no word text.
    /// - Return [`StoreError::Duplicate`] if word is already stored.
    /// - Return [`StoreError::Write`] or [`StoreError::Serialize`] if store
    ///   cannot be saved.
    #[instrument(skip(self, draft), level = "debug")]
    pub fn add(&mut self, draft: WordDraft, source: Source) -> Result<&WordRecord> {
        let key = IdentityKey::new(&draft.word);
        if key.is_empty() {
            return Err(StoreError::EmptyWord);
        }
        if self.find(key.as_str()).is_some() {
            return Err(StoreError::Duplicate(draft.word.trim().to_string()));
        }

        let now = Utc::now();
        let record = WordRecord::from_draft(self.ids.next_at(now), draft, source, now);
        info!("add {:?} to word store", record.word);
        self.words.push(record);
        self.save()?;

        Ok(&self.words[self.words.len() - 1])
    }

    /// Edit existing word.
    ///
    /// Bumps the update timestamp of the record, even if the edit turns out
    /// to be empty.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::UnknownWord`] if word is not stored.
    /// - Return [`StoreError::Write`] or [`StoreError::Serialize`] if store
    ///   cannot be saved.
    #[instrument(skip(self, word, edit), level = "debug")]
    pub fn update(&mut self, word: impl AsRef<str>, edit: WordEdit) -> Result<&WordRecord> {
        let position = self.position(word.as_ref())?;
        let record = &mut self.words[position];
        edit.apply(record);
        record.updated_at = Utc::now().max(record.updated_at);
        info!("update {:?} in word store", record.word);
        self.save()?;

        Ok(&self.words[position])
    }

    /// Flip mastered status of existing word.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::UnknownWord`] if word is not stored.
    /// - Return [`StoreError::Write`] or [`StoreError::Serialize`] if store
    ///   cannot be saved.
    pub fn toggle_mastered(&mut self, word: impl AsRef<str>) -> Result<&WordRecord> {
        let position = self.position(word.as_ref())?;
        let record = &mut self.words[position];
        record.mastered = !record.mastered;
        record.updated_at = Utc::now().max(record.updated_at);
        info!("mark {:?} as mastered: {}", record.word, record.mastered);
        self.save()?;

        Ok(&self.words[position])
    }

    /// Remove existing word from store.
    ///
    /// No undo, and no tombstone either. If the remote snapshot still has the
    /// word, the next pull brings it back.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::UnknownWord`] if word is not stored.
    /// - Return [`StoreError::Write`] or [`StoreError::Serialize`] if store
    ///   cannot be saved.
    #[instrument(skip(self, word), level = "debug")]
    pub fn remove(&mut self, word: impl AsRef<str>) -> Result<WordRecord> {
        let position = self.position(word.as_ref())?;
        let record = self.words.remove(position);
        info!("remove {:?} from word store", record.word);
        self.save()?;

        Ok(record)
    }

    /// Merge remote words into store.
    ///
    /// Saves the store if the merge changed anything.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Write`] or [`StoreError::Serialize`] if store
    ///   cannot be saved.
    #[instrument(skip(self, batch), level = "debug")]
    pub fn merge_remote(&mut self, batch: RemoteBatch) -> Result<MergeReport> {
        let ids = &mut self.ids;
        let now = Utc::now();
        let report = merge(&mut self.words, batch, now, || ids.next_at(now));
        debug!("merge report: {report:?}");
        if report.changed() {
            self.save()?;
        }

        Ok(report)
    }

    /// Select records matching query.
    pub fn query(&self, query: &Query) -> Vec<&WordRecord> {
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut hits = self
            .words
            .iter()
            .filter(|record| match &needle {
                Some(needle) => record.mentions(needle),
                None => true,
            })
            .filter(|record| match query.difficulty {
                Some(difficulty) => record.difficulty == difficulty,
                None => true,
            })
            .filter(|record| match query.status {
                Status::All => true,
                Status::Mastered => record.mastered,
                Status::Learning => !record.mastered,
            })
            .collect::<Vec<_>>();

        match query.order {
            Order::Newest => hits.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            Order::Oldest => hits.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            Order::Alphabetical => hits.sort_by_key(|record| record.key()),
        }

        hits
    }

    /// Count words by learning status and difficulty.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            total: self.words.len(),
            ..Default::default()
        };
        for record in &self.words {
            if record.mastered {
                stats.mastered += 1;
            }
            match record.difficulty {
                Difficulty::Easy => stats.easy += 1,
                Difficulty::Medium => stats.medium += 1,
                Difficulty::Hard => stats.hard += 1,
            }
        }
        stats.learning = stats.total - stats.mastered;

        stats
    }

    /// Take snapshot of current collection.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.words.clone(), Utc::now())
    }

    /// Write collection to `words.json`.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Serialize`] if collection cannot be rendered.
    /// - Return [`StoreError::Write`] if `words.json` cannot be replaced.
    pub fn save(&self) -> Result<()> {
        let words_path = self.store_path.join(WORDS_FILE);
        let temp_path = self.store_path.join(format!("{WORDS_FILE}.tmp"));
        let data = serde_json::to_string_pretty(&self.words).map_err(StoreError::Serialize)?;

        // INVARIANT: Replace words file in one step.
        write(&temp_path, data.as_bytes())
            .and_then(|_| rename(&temp_path, &words_path))
            .map_err(|err| StoreError::Write {
                source: err,
                words_path: words_path.clone(),
            })?;
        debug!("saved {} words to {:?}", self.words.len(), words_path.display());

        Ok(())
    }

    fn position(&self, word: &str) -> Result<usize> {
        let key = IdentityKey::new(word);
        self.words
            .iter()
            .position(|record| record.key() == key)
            .ok_or_else(|| StoreError::UnknownWord(word.to_string()))
    }
}

fn load_words(store_path: &Path) -> Result<Vec<WordRecord>> {
    let words_path = store_path.join(WORDS_FILE);
    match read_to_string(&words_path) {
        Ok(data) => serde_json::from_str(&data).map_err(|err| StoreError::Deserialize {
            source: err,
            words_path,
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(StoreError::Read {
            source: err,
            words_path,
        }),
    }
}

/// Filter and ordering for listing words.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Text to look for in word, definition, synonyms, and examples.
    pub search: Option<String>,

    /// Only words of this difficulty.
    pub difficulty: Option<Difficulty>,

    /// Only words with this learning status.
    pub status: Status,

    /// Listing order.
    pub order: Order,
}

/// Learning status filter.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[default]
    All,
    Mastered,
    Learning,
}

/// Listing order.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Order {
    #[default]
    Newest,
    Oldest,
    Alphabetical,
}

/// Word counts.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub mastered: usize,
    pub learning: usize,
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

/// All possible error types for word store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Word text is blank.
    #[error("word cannot be empty")]
    EmptyWord,

    /// Word is already in the store.
    #[error("word {0:?} is already stored")]
    Duplicate(String),

    /// Word is not in the store.
    #[error("word {0:?} is not stored")]
    UnknownWord(String),

    /// Store directory cannot be created.
    #[error("failed to create word store at {:?}", store_path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        store_path: PathBuf,
    },

    /// Words file cannot be read.
    #[error("failed to read words from {:?}", words_path.display())]
    Read {
        #[source]
        source: std::io::Error,
        words_path: PathBuf,
    },

    /// Words file cannot be replaced.
    #[error("failed to write words to {:?}", words_path.display())]
    Write {
        #[source]
        source: std::io::Error,
        words_path: PathBuf,
    },

    /// Words file is not a word collection.
    #[error("failed to parse words at {:?}", words_path.display())]
    Deserialize {
        #[source]
        source: serde_json::Error,
        words_path: PathBuf,
    },

    /// Collection cannot be rendered.
    #[error("failed to render words")]
    Serialize(#[source] serde_json::Error),
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
