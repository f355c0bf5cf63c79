// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! AI assistant client.
//!
//! Any chat completion service following the OpenAI API works. The model
//! is asked to answer with a single JSON object shaped like a word draft.
//! Models like to wrap that object in prose or code fences anyway, so the
//! first balanced object gets cut out of the reply before parsing.

use crate::{
    config::AssistantSettings,
    lookup::{LookupError, Result},
    record::WordDraft,
};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

const MAX_RETRIES: u32 = 2;
const BASE_BACKOFF_MS: u64 = 250;

const SYSTEM_PROMPT: &str = "You are a dictionary. Answer with exactly one JSON object and \
nothing else. Use these keys: word (string), definition (string), partOfSpeech (string), \
pronunciation (IPA string), examples (array of up to three sentences), synonyms (array of \
strings), antonyms (array of strings), difficulty (one of easy, medium, hard), notes \
(string with usage notes or etymology).";

/// Chat completion client that drafts word entries.
#[derive(Debug, Clone)]
pub struct Assistant {
    client: Client,
    settings: AssistantSettings,
}

impl Assistant {
    /// Construct new assistant client.
    ///
    /// # Errors
    ///
    /// - Return [`LookupError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: AssistantSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("wordhoard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, settings })
    }

    /// Ask assistant to draft an entry for word.
    ///
    /// # Errors
    ///
    /// - Return [`LookupError::MissingApiKey`] if the API key is not set.
    /// - Return [`LookupError::MalformedReply`] if the reply holds no word
    ///   entry.
    /// - Return [`LookupError::Status`] or [`LookupError::Http`] if the
    ///   service cannot be asked.
    #[instrument(skip(self), level = "debug")]
    pub async fn lookup(&self, word: &str) -> Result<WordDraft> {
        let api_key = std::env::var(&self.settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LookupError::MissingApiKey {
                api_key_env: self.settings.api_key_env.clone(),
            })?;

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: word.trim().into(),
                },
            ],
            temperature: 0.2,
            stream: false,
        };
        let response = self.post(&api_key, &request).await?;
        let reply = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LookupError::MalformedReply("no choices".into()))?;
        debug!("assistant replied: {reply}");

        parse_reply(word, &reply)
    }

    async fn post(&self, api_key: &str, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        let url = format!(
            "{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/')
        );

        let mut retry = 0;
        loop {
            let error = match self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(request)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json().await?);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable(status) {
                        return Err(LookupError::Status { status, body });
                    }
                    LookupError::Status { status, body }
                }
                Err(error) => LookupError::Http(error),
            };

            if retry >= MAX_RETRIES {
                return Err(error);
            }
            let backoff = Duration::from_millis(BASE_BACKOFF_MS << retry);
            warn!(retry, "assistant request failed, retry in {backoff:?}: {error}");
            sleep(backoff).await;
            retry += 1;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn parse_reply(word: &str, reply: &str) -> Result<WordDraft> {
    let object = extract_json_object(reply)
        .ok_or_else(|| LookupError::MalformedReply("no JSON object".into()))?;
    let mut draft: WordDraft = serde_json::from_str(object)
        .map_err(|error| LookupError::MalformedReply(error.to_string()))?;

    if draft.word.trim().is_empty() {
        draft.word = word.trim().to_string();
    }
    if draft.definition.trim().is_empty() {
        return Err(LookupError::MalformedReply("missing definition".into()));
    }

    Ok(draft)
}

/// Cut first balanced JSON object out of text.
///
/// Braces inside string literals do not count, and neither do escaped
/// quotes inside them.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Difficulty;
    use indoc::indoc;
    use simple_test_case::test_case;

    #[test_case("{}", Some("{}"); "bare object")]
    #[test_case("Sure! {\"a\": 1} hope that helps", Some("{\"a\": 1}"); "object in prose")]
    #[test_case("{\"a\": \"}\"}", Some("{\"a\": \"}\"}"); "brace inside string")]
    #[test_case("{\"a\": \"\\\"}\", \"b\": {}}", Some("{\"a\": \"\\\"}\", \"b\": {}}"); "escaped quote inside string")]
    #[test_case("{\"a\": {\"b\": 1}} {\"c\": 2}", Some("{\"a\": {\"b\": 1}}"); "first of two objects")]
    #[test_case("{\"a\": 1", None; "unbalanced")]
    #[test_case("no json here", None; "no object")]
    #[test]
    fn extract_json_object_finds_balanced_object(text: &str, expect: Option<&str>) {
        assert_eq!(extract_json_object(text), expect);
    }

    #[test]
    fn fenced_reply_parses_into_draft() -> anyhow::Result<()> {
        let reply = indoc! {r#"
            Here is the entry:
            ```json
            {
              "definition": "Marked by {curly} clarity.",
              "partOfSpeech": "adjective",
              "examples": ["a lucid essay"],
              "difficulty": "HARD",
              "notes": "From Latin lucidus."
            }
            ```
        "#};
        let result = parse_reply("lucid", reply)?;
        let expect = WordDraft {
            word: "lucid".into(),
            definition: "Marked by {curly} clarity.".into(),
            part_of_speech: "adjective".into(),
            examples: vec!["a lucid essay".into()],
            difficulty: Some(Difficulty::Hard),
            notes: "From Latin lucidus.".into(),
            ..Default::default()
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn reply_without_definition_is_malformed() {
        assert!(matches!(
            parse_reply("lucid", "{\"word\": \"lucid\"}"),
            Err(LookupError::MalformedReply(_))
        ));
    }
}
