// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Free dictionary service client.
//!
//! Speaks the API of `dictionaryapi.dev`, which answers a word with a list
//! of entries, each holding phonetics and meanings grouped by part of
//! speech. Only the first part of speech and its first definition make it
//! into the draft. Examples are taken from anywhere, up to three of them.

use crate::{
    lookup::{LookupError, Result},
    record::WordDraft,
};

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const MAX_EXAMPLES: usize = 3;

/// Dictionary service client.
#[derive(Debug, Clone)]
pub struct Dictionary {
    client: Client,
    base_url: String,
}

impl Dictionary {
    /// Construct new dictionary client.
    ///
    /// # Errors
    ///
    /// - Return [`LookupError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("wordhoard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// URL of the entry for given word.
    ///
    /// # Errors
    ///
    /// - Return [`LookupError::InvalidUrl`] if the base URL cannot carry a
    ///   path.
    pub fn entry_url(&self, word: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| LookupError::InvalidUrl(format!("{}: {err}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| LookupError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(word.trim());

        Ok(url)
    }

    /// Look up word.
    ///
    /// # Errors
    ///
    /// - Return [`LookupError::NotFound`] if the service does not know the
    ///   word.
    /// - Return [`LookupError::Status`] or [`LookupError::Http`] if the
    ///   service cannot be asked.
    /// - Return [`LookupError::InvalidUrl`] if the base URL is unusable.
    #[instrument(skip(self), level = "debug")]
    pub async fn lookup(&self, word: &str) -> Result<WordDraft> {
        let url = self.entry_url(word)?;
        debug!("ask dictionary at {url}");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(word.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status { status, body });
        }

        let entries: Vec<Entry> = response.json().await?;
        draft_from_entries(word, entries)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    #[serde(default)]
    word: String,
    #[serde(default)]
    phonetic: Option<String>,
    #[serde(default)]
    phonetics: Vec<Phonetic>,
    #[serde(default)]
    meanings: Vec<Meaning>,
}

#[derive(Debug, Deserialize)]
struct Phonetic {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meaning {
    #[serde(default)]
    part_of_speech: String,
    #[serde(default)]
    definitions: Vec<Definition>,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    antonyms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Definition {
    #[serde(default)]
    definition: String,
    #[serde(default)]
    example: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    antonyms: Vec<String>,
}

fn draft_from_entries(word: &str, entries: Vec<Entry>) -> Result<WordDraft> {
    let Some(first) = entries.first() else {
        return Err(LookupError::NotFound(word.to_string()));
    };

    let pronunciation = entries
        .iter()
        .flat_map(|entry| {
            entry
                .phonetic
                .iter()
                .chain(entry.phonetics.iter().filter_map(|phonetic| phonetic.text.as_ref()))
        })
        .find(|text| !text.trim().is_empty())
        .cloned()
        .unwrap_or_default();

    let meanings = entries.iter().flat_map(|entry| entry.meanings.iter());
    let first_meaning = meanings.clone().next();
    let definitions = meanings.clone().flat_map(|meaning| meaning.definitions.iter());

    let mut draft = WordDraft {
        word: if first.word.trim().is_empty() {
            word.trim().to_string()
        } else {
            first.word.clone()
        },
        definition: first_meaning
            .and_then(|meaning| meaning.definitions.first())
            .map(|definition| definition.definition.clone())
            .unwrap_or_default(),
        part_of_speech: first_meaning
            .map(|meaning| meaning.part_of_speech.clone())
            .unwrap_or_default(),
        pronunciation,
        examples: definitions
            .clone()
            .filter_map(|definition| definition.example.clone())
            .take(MAX_EXAMPLES)
            .collect(),
        ..Default::default()
    };

    for meaning in meanings {
        extend_unique(&mut draft.synonyms, &meaning.synonyms);
        extend_unique(&mut draft.antonyms, &meaning.antonyms);
    }
    for definition in definitions {
        extend_unique(&mut draft.synonyms, &definition.synonyms);
        extend_unique(&mut draft.antonyms, &definition.antonyms);
    }

    if draft.definition.is_empty() {
        return Err(LookupError::NotFound(word.to_string()));
    }

    Ok(draft)
}

fn extend_unique(list: &mut Vec<String>, items: &[String]) {
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !list.iter().any(|known| known.eq_ignore_ascii_case(item)) {
            list.push(item.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn entries_map_to_draft() -> anyhow::Result<()> {
        let data = indoc! {r#"
            [
              {
                "word": "lucid",
                "phonetics": [{ "audio": "" }, { "text": "/ˈluːsɪd/" }],
                "meanings": [
                  {
                    "partOfSpeech": "adjective",
                    "definitions": [
                      { "definition": "Clear; easily understood.", "example": "a lucid explanation", "synonyms": ["clear"] },
                      { "definition": "Mentally sound.", "example": "a lucid moment" }
                    ],
                    "synonyms": ["Clear", "coherent"],
                    "antonyms": ["confused"]
                  },
                  {
                    "partOfSpeech": "noun",
                    "definitions": [
                      { "definition": "Rare.", "example": "one", "antonyms": ["confused", "murky"] },
                      { "definition": "Rarer.", "example": "two" }
                    ]
                  }
                ]
              }
            ]
        "#};
        let entries: Vec<Entry> = serde_json::from_str(data)?;
        let result = draft_from_entries("lucid", entries)?;
        let expect = WordDraft {
            word: "lucid".into(),
            definition: "Clear; easily understood.".into(),
            part_of_speech: "adjective".into(),
            pronunciation: "/ˈluːsɪd/".into(),
            examples: vec!["a lucid explanation".into(), "a lucid moment".into(), "one".into()],
            synonyms: vec!["Clear".into(), "coherent".into()],
            antonyms: vec!["confused".into(), "murky".into()],
            ..Default::default()
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn empty_entries_are_not_found() {
        assert!(matches!(
            draft_from_entries("blah", Vec::new()),
            Err(LookupError::NotFound(word)) if word == "blah"
        ));
    }

    #[test]
    fn entry_url_joins_base_and_word() -> anyhow::Result<()> {
        let dictionary = Dictionary::new("https://blah.org/entries/en/", Duration::from_secs(1))?;
        assert_eq!(
            dictionary.entry_url(" lucid ")?.as_str(),
            "https://blah.org/entries/en/lucid"
        );

        let dictionary = Dictionary::new("https://blah.org/entries/en", Duration::from_secs(1))?;
        assert_eq!(
            dictionary.entry_url("what?#1/2")?.as_str(),
            "https://blah.org/entries/en/what%3F%231%2F2"
        );

        Ok(())
    }

    #[test]
    fn entry_url_rejects_bad_base() -> anyhow::Result<()> {
        let dictionary = Dictionary::new("not a url", Duration::from_secs(1))?;
        assert!(matches!(
            dictionary.entry_url("lucid"),
            Err(LookupError::InvalidUrl(_))
        ));

        Ok(())
    }
}
