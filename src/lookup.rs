// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Fill in word details from online services.
//!
//! Adding a word by hand means typing out a definition, examples, synonyms,
//! and so on. Wordhoard can fetch all of that instead. The free dictionary
//! service gets asked first. If it does not know the word, or cannot be
//! reached, the AI assistant gets asked next, provided one is configured.
//!
//! Lookups only ever produce a [`WordDraft`]. Nothing ends up in the word
//! store until the caller adds the draft.

pub mod assistant;
pub mod dictionary;

pub use assistant::Assistant;
pub use dictionary::Dictionary;

use crate::{
    config::LookupSettings,
    record::{Source, WordDraft},
};

use futures::future::join_all;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub draft: WordDraft,
    pub source: Source,
}

/// Dictionary service chained with an optional AI assistant.
#[derive(Debug, Clone)]
pub struct Lookup {
    dictionary: Dictionary,
    assistant: Option<Assistant>,
}

impl Lookup {
    /// Construct lookup chain out of settings.
    ///
    /// # Errors
    ///
    /// - Return [`LookupError::Http`] if an HTTP client cannot be built.
    pub fn from_settings(settings: &LookupSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let dictionary = Dictionary::new(&settings.dictionary_url, timeout)?;
        let assistant = settings
            .assistant
            .clone()
            .map(|assistant| Assistant::new(assistant, timeout))
            .transpose()?;

        Ok(Self {
            dictionary,
            assistant,
        })
    }

    /// Look up a single word.
    ///
    /// # Errors
    ///
    /// - Return the dictionary error if no assistant is configured.
    /// - Return [`LookupError::Exhausted`] if both services failed.
    #[instrument(skip(self), level = "debug")]
    pub async fn lookup(&self, word: &str) -> Result<Found> {
        let dictionary_error = match self.dictionary.lookup(word).await {
            Ok(draft) => {
                info!("found {word:?} in dictionary");
                return Ok(Found {
                    draft,
                    source: Source::Dictionary,
                });
            }
            Err(error) => error,
        };

        let Some(assistant) = &self.assistant else {
            return Err(dictionary_error);
        };
        warn!("dictionary lookup of {word:?} failed, ask assistant: {dictionary_error}");

        match assistant.lookup(word).await {
            Ok(draft) => Ok(Found {
                draft,
                source: Source::Assistant,
            }),
            Err(assistant_error) => Err(LookupError::Exhausted {
                word: word.to_string(),
                dictionary: Box::new(dictionary_error),
                assistant: Box::new(assistant_error),
            }),
        }
    }

    /// Look up several words at once.
    ///
    /// Results come back in the same order as the words.
    pub async fn lookup_all<'a>(&self, words: &'a [String]) -> Vec<(&'a str, Result<Found>)> {
        let lookups = words.iter().map(|word| async move {
            let found = self.lookup(word).await;
            (word.as_str(), found)
        });

        join_all(lookups).await
    }
}

/// Lookup error types.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// HTTP request could not be made.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Service answered with an error status.
    #[error("lookup service answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Service does not know the word.
    #[error("no entry for {0:?}")]
    NotFound(String),

    /// Assistant needs an API key that is not set.
    #[error("assistant needs an API key in ${api_key_env}")]
    MissingApiKey { api_key_env: String },

    /// Service URL cannot be built.
    #[error("invalid lookup URL {0}")]
    InvalidUrl(String),

    /// Assistant reply carried no usable word entry.
    #[error("assistant reply is not a word entry: {0}")]
    MalformedReply(String),

    /// Every service failed.
    #[error("could not look up {word:?}: dictionary said {dictionary}, assistant said {assistant}")]
    Exhausted {
        word: String,
        dictionary: Box<LookupError>,
        assistant: Box<LookupError>,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LookupError> = std::result::Result<T, E>;
