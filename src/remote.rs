// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote snapshot transports.
//!
//! The shared word collection lives as a single JSON snapshot file inside a
//! GitHub repository. A __transport__ knows how to do two things with that
//! file: fetch it, and write a new version of it.
//!
//! # Available Transports
//!
//! - [`GithubTransport`]: reads raw content over HTTPS without
//!   authentication, and writes through the contents API with a token.
//! - [`GitTransport`]: keeps a bare mirror of the repository in the word
//!   store, fetches the snapshot branch, and pushes new commits on top of it.
//! - [`IssueTransport`]: reads like [`GithubTransport`], but cannot write.
//!   Instead it hands back a prefilled issue URL for a human to submit.
//!
//! Transports are picked at runtime from configuration through
//! [`AnyTransport`].

pub mod git;
pub mod github;
pub mod issue;

pub use git::GitTransport;
pub use github::GithubTransport;
pub use issue::IssueTransport;

use crate::{
    config::{RemoteSettings, TransportKind},
    snapshot::{RemoteBatch, Snapshot},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    future::Future,
    path::Path,
    time::Duration,
};

/// Layer of indirection for remote snapshot access.
pub trait SnapshotTransport: Send + Sync {
    /// Fetch remote snapshot.
    ///
    /// Return `None` if there is no snapshot yet.
    fn fetch(&self) -> impl Future<Output = Result<Option<RemoteBatch>>> + Send;

    /// Write snapshot to remote.
    fn push(&self, snapshot: &Snapshot) -> impl Future<Output = Result<PushOutcome>> + Send;
}

/// What happened to a pushed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Snapshot is stored remotely at given revision.
    Written { revision: String },

    /// Snapshot is only stored once somebody follows given URL.
    ManualActionRequired { url: String },
}

/// Transport selected by configuration.
#[derive(Debug)]
pub enum AnyTransport {
    Github(GithubTransport),
    Git(GitTransport),
    Issue(IssueTransport),
}

impl AnyTransport {
    /// Construct transport described by remote settings.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Http`] if the HTTP client cannot be built.
    pub fn from_settings(
        remote: &RemoteSettings,
        store_path: impl AsRef<Path>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(match remote.kind {
            TransportKind::Github => Self::Github(GithubTransport::new(remote.clone(), timeout)?),
            TransportKind::Git => Self::Git(GitTransport::new(remote, store_path)),
            TransportKind::Issue => {
                Self::Issue(IssueTransport::new(GithubTransport::new(remote.clone(), timeout)?))
            }
        })
    }
}

impl SnapshotTransport for AnyTransport {
    async fn fetch(&self) -> Result<Option<RemoteBatch>> {
        match self {
            Self::Github(transport) => transport.fetch().await,
            Self::Git(transport) => transport.fetch().await,
            Self::Issue(transport) => transport.fetch().await,
        }
    }

    async fn push(&self, snapshot: &Snapshot) -> Result<PushOutcome> {
        match self {
            Self::Github(transport) => transport.push(snapshot).await,
            Self::Git(transport) => transport.push(snapshot).await,
            Self::Issue(transport) => transport.push(snapshot).await,
        }
    }
}

impl Display for AnyTransport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Github(transport) => write!(fmt, "github api {}", transport.raw_url()),
            Self::Git(transport) => write!(fmt, "git {}", transport.url()),
            Self::Issue(transport) => write!(fmt, "github issue {}", transport.raw_url()),
        }
    }
}

/// All possible error types for remote snapshot access.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// HTTP request could not be made.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// HTTP request came back with an error status.
    #[error("remote answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Writing requires a token that is not set.
    #[error("writing the remote snapshot needs a token in ${token_env}")]
    MissingCredential { token_env: String },

    /// URL for the remote cannot be built.
    #[error("invalid remote URL {0}")]
    InvalidUrl(String),

    /// Remote refused the update.
    #[error("remote rejected update of {0}")]
    Rejected(String),

    /// Snapshot document could not be handled.
    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Blocking git work panicked or got cancelled.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
