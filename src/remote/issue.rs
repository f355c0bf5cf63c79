// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Issue fallback transport.
//!
//! For people who cannot, or will not, hand wordhoard a token with write
//! access. Reads work exactly like [`GithubTransport`]. A push renders the
//! snapshot into the body of a new issue and returns the prefilled issue
//! URL. Nothing is written until somebody opens that URL and submits the
//! issue, so a push through this transport always reports
//! [`PushOutcome::ManualActionRequired`].

use crate::{
    config::RemoteSettings,
    remote::{GithubTransport, PushOutcome, RemoteError, Result, SnapshotTransport},
    snapshot::{RemoteBatch, Snapshot},
};

use reqwest::Url;
use tracing::{info, instrument, warn};

const ISSUE_BASE_URL: &str = "https://github.com";

/// Browsers and GitHub start refusing URLs somewhere past this length.
const URL_LENGTH_LIMIT: usize = 8192;

/// Snapshot access with writes handed off to a human.
#[derive(Debug, Clone)]
pub struct IssueTransport {
    reader: GithubTransport,
}

impl IssueTransport {
    /// Construct new issue transport reading through given GitHub transport.
    pub fn new(reader: GithubTransport) -> Self {
        Self { reader }
    }

    /// URL of the raw snapshot file.
    pub fn raw_url(&self) -> String {
        self.reader.raw_url()
    }
}

impl SnapshotTransport for IssueTransport {
    async fn fetch(&self) -> Result<Option<RemoteBatch>> {
        self.reader.fetch().await
    }

    #[instrument(skip(self, snapshot), level = "debug")]
    async fn push(&self, snapshot: &Snapshot) -> Result<PushOutcome> {
        let draft = IssueDraft::new(snapshot)?;
        let url = draft.url(self.reader.remote())?;
        if url.len() > URL_LENGTH_LIMIT {
            warn!(
                "issue URL is {} characters long, GitHub may truncate it",
                url.len()
            );
        }
        info!("snapshot needs to be submitted by hand as an issue");

        Ok(PushOutcome::ManualActionRequired { url })
    }
}

/// Issue carrying a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
}

impl IssueDraft {
    /// Render snapshot into issue title and body.
    ///
    /// # Errors
    ///
    /// - Return [`crate::snapshot::SnapshotError`] if snapshot cannot be
    ///   rendered.
    pub fn new(snapshot: &Snapshot) -> Result<Self> {
        let title = format!(
            "Sync {} words ({})",
            snapshot.metadata.total_words,
            snapshot.metadata.last_sync.format("%Y-%m-%d %H:%M UTC")
        );
        let body = format!(
            "Snapshot produced by wordhoard {}.\n\nReplace the snapshot file with the JSON below.\n\n```json\n{}\n```\n",
            snapshot.metadata.version,
            snapshot.to_json()?
        );

        Ok(Self { title, body })
    }

    /// Prefilled "new issue" URL for repository of given remote.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::InvalidUrl`] if the URL cannot be built.
    pub fn url(&self, remote: &RemoteSettings) -> Result<String> {
        let mut url = Url::parse(ISSUE_BASE_URL)
            .map_err(|err| RemoteError::InvalidUrl(format!("{ISSUE_BASE_URL}: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(ISSUE_BASE_URL.into()))?
            .extend([remote.owner.as_str(), remote.repo.as_str(), "issues", "new"]);
        url.query_pairs_mut()
            .append_pair("title", &self.title)
            .append_pair("body", &self.body);

        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::parse_snapshot;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn issue_url_carries_full_snapshot() -> anyhow::Result<()> {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
        let snapshot = Snapshot::new(Vec::new(), now);
        let draft = IssueDraft::new(&snapshot)?;
        assert_eq!(draft.title, "Sync 0 words (2024-06-01 09:30 UTC)");

        let remote = RemoteSettings::new("blah", "vocabulary");
        let url = Url::parse(&draft.url(&remote)?)?;
        assert_eq!(url.path(), "/blah/vocabulary/issues/new");

        let body = url
            .query_pairs()
            .find(|(key, _)| key == "body")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        let json = body
            .split("```json\n")
            .nth(1)
            .and_then(|rest| rest.split("\n```").next())
            .unwrap_or_default();
        assert_eq!(parse_snapshot(json)?.words.len(), 0);

        Ok(())
    }
}
