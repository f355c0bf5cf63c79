// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! GitHub REST transport.
//!
//! Reads go to `raw.githubusercontent.com` and need no authentication as
//! long as the repository is public. Writes go through the contents API,
//! which needs a token with write access to the repository. The token is
//! read from the environment variable named in the remote settings at the
//! moment of the push.
//!
//! A write replaces whatever snapshot blob is current at the moment of the
//! push, not the one seen by the last pull. Words another writer added in
//! between are dropped from the remote until that writer syncs again, since
//! their word store still holds them.

use crate::{
    config::RemoteSettings,
    remote::{PushOutcome, RemoteError, Result, SnapshotTransport},
    snapshot::{parse_snapshot, RemoteBatch, Snapshot},
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

const RAW_BASE_URL: &str = "https://raw.githubusercontent.com";
const API_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Snapshot access through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubTransport {
    client: Client,
    remote: RemoteSettings,
}

impl GithubTransport {
    /// Construct new GitHub transport.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Http`] if the HTTP client cannot be built.
    pub fn new(remote: RemoteSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("wordhoard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, remote })
    }

    /// Remote settings this transport talks to.
    pub fn remote(&self) -> &RemoteSettings {
        &self.remote
    }

    /// URL of the raw snapshot file.
    pub fn raw_url(&self) -> String {
        format!(
            "{RAW_BASE_URL}/{}/{}/{}/{}",
            self.remote.owner,
            self.remote.repo,
            self.remote.branch,
            self.remote.path.trim_start_matches('/')
        )
    }

    /// URL of the snapshot file in the contents API.
    pub fn contents_url(&self) -> String {
        format!(
            "{API_BASE_URL}/repos/{}/{}/contents/{}",
            self.remote.owner,
            self.remote.repo,
            self.remote.path.trim_start_matches('/')
        )
    }

    /// Blob sha of the current snapshot file, if there is one.
    async fn current_sha(&self, token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.remote.branch.as_str())])
            .bearer_auth(token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        let file: ContentsFile = response.json().await?;
        Ok(Some(file.sha))
    }
}

impl SnapshotTransport for GithubTransport {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self) -> Result<Option<RemoteBatch>> {
        let url = self.raw_url();
        debug!("fetch snapshot from {url}");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!("no snapshot at {url} yet");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        let data = response.bytes().await?;
        Ok(Some(parse_snapshot(data)?))
    }

    #[instrument(skip(self, snapshot), level = "debug")]
    async fn push(&self, snapshot: &Snapshot) -> Result<PushOutcome> {
        let token = self
            .remote
            .token()
            .ok_or_else(|| RemoteError::MissingCredential {
                token_env: self.remote.token_env.clone(),
            })?;

        let sha = self.current_sha(&token).await?;
        let update = ContentsUpdate {
            message: format!("sync {} words", snapshot.metadata.total_words),
            content: BASE64.encode(snapshot.to_json()?),
            branch: self.remote.branch.clone(),
            sha,
        };

        let response = self
            .client
            .put(self.contents_url())
            .bearer_auth(&token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&update)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected(format!("{}: {body}", self.remote.path)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        let written: ContentsWritten = response.json().await?;
        info!("wrote snapshot as commit {}", written.commit.sha);

        Ok(PushOutcome::Written {
            revision: written.commit.sha,
        })
    }
}

#[derive(Debug, Serialize)]
struct ContentsUpdate {
    message: String,
    content: String,
    branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentsWritten {
    commit: ContentsCommit,
}

#[derive(Debug, Deserialize)]
struct ContentsCommit {
    sha: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transport() -> GithubTransport {
        let mut remote = RemoteSettings::new("blah", "vocabulary");
        remote.path = "/data/words.json".into();
        remote.token_env = "WORDHOARD_TEST_TOKEN".into();
        GithubTransport::new(remote, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn urls_point_at_snapshot_file() {
        let transport = transport();
        assert_eq!(
            transport.raw_url(),
            "https://raw.githubusercontent.com/blah/vocabulary/main/data/words.json"
        );
        assert_eq!(
            transport.contents_url(),
            "https://api.github.com/repos/blah/vocabulary/contents/data/words.json"
        );
    }

    #[test]
    fn push_without_token_is_refused() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let snapshot = Snapshot::new(Vec::new(), chrono::Utc::now());
        let result = runtime.block_on(transport().push(&snapshot));

        assert!(matches!(
            result,
            Err(RemoteError::MissingCredential { token_env }) if token_env == "WORDHOARD_TEST_TOKEN"
        ));
    }

    #[test]
    fn contents_update_omits_missing_sha() -> anyhow::Result<()> {
        let update = ContentsUpdate {
            message: "sync 0 words".into(),
            content: BASE64.encode("{}"),
            branch: "main".into(),
            sha: None,
        };
        let result = serde_json::to_value(&update)?;
        let expect = serde_json::json!({
            "message": "sync 0 words",
            "content": "e30=",
            "branch": "main",
        });
        assert_eq!(result, expect);

        Ok(())
    }
}
