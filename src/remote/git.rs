// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Plain git transport.
//!
//! Keeps a bare __mirror__ of the snapshot repository inside the word store
//! at `mirror.git`. The mirror never has a work tree. The snapshot is read
//! straight out of the tree of the fetched branch tip, and a push builds a
//! new commit on top of that same tip with nothing but the snapshot file
//! changed. Only a mirror that never fetched fetches again before pushing.
//!
//! Pushes are never forced. If somebody else pushed in between our fetch and
//! our push, the update is refused as [`RemoteError::Rejected`], and the next
//! sync cycle merges their changes before trying again.
//!
//! All of libgit2 is blocking, so every operation runs on tokio's blocking
//! thread pool.

use crate::{
    config::RemoteSettings,
    remote::{PushOutcome, RemoteError, Result, SnapshotTransport},
    snapshot::{parse_snapshot, RemoteBatch, Snapshot},
};

use auth_git2::GitAuthenticator;
use git2::{
    Config, Direction, ErrorCode, FetchOptions, Index, IndexEntry, IndexTime, Oid, PushOptions,
    RemoteCallbacks, Repository, Signature,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Directory name of the mirror inside the word store.
pub const MIRROR_DIR: &str = "mirror.git";

/// Snapshot access through git fetch and push.
#[derive(Debug, Clone)]
pub struct GitTransport {
    url: String,
    branch: String,
    path: String,
    token: Option<String>,
    mirror_path: PathBuf,
}

impl GitTransport {
    /// Construct new git transport keeping its mirror in given word store.
    pub fn new(remote: &RemoteSettings, store_path: impl AsRef<Path>) -> Self {
        Self {
            url: remote.clone_url(),
            branch: remote.branch.clone(),
            path: remote.path.trim_start_matches('/').to_string(),
            token: remote.token(),
            mirror_path: store_path.as_ref().join(MIRROR_DIR),
        }
    }

    /// URL of the remote repository.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/origin/{}", self.branch)
    }

    fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    fn authenticator(&self) -> GitAuthenticator {
        let authenticator = GitAuthenticator::default();
        match &self.token {
            Some(token) => authenticator.add_plaintext_credentials("*", "x-access-token", token),
            None => authenticator,
        }
    }

    fn open_mirror(&self) -> Result<Repository> {
        let repository = if self.mirror_path.join("HEAD").exists() {
            Repository::open_bare(&self.mirror_path)?
        } else {
            info!("initialize mirror at {:?}", self.mirror_path.display());
            Repository::init_bare(&self.mirror_path)?
        };

        // INVARIANT: Origin always points at the configured URL.
        match repository.find_remote("origin") {
            Ok(remote) if remote.url().ok() == Some(self.url.as_str()) => {}
            Ok(_) => repository.remote_set_url("origin", &self.url)?,
            Err(_) => {
                repository.remote("origin", &self.url)?;
            }
        }

        Ok(repository)
    }

    /// Fetch snapshot branch into mirror.
    ///
    /// Returns tip of the branch, or `None` if the remote lacks the branch.
    fn fetch_branch(&self, repository: &Repository) -> Result<Option<Oid>> {
        let authenticator = self.authenticator();
        let config = Config::open_default().or_else(|_| Config::new())?;
        let mut remote = repository.find_remote("origin")?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(authenticator.credentials(&config));
        let connection = remote.connect_auth(Direction::Fetch, Some(callbacks), None)?;
        let branch_ref = self.branch_ref();
        let advertised = connection
            .list()?
            .iter()
            .any(|head| head.name() == branch_ref);
        drop(connection);

        if !advertised {
            debug!("remote {} has no branch {}", self.url, self.branch);
            return Ok(None);
        }

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(authenticator.credentials(&config));
        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        let refspec = format!("+{}:{}", branch_ref, self.tracking_ref());
        remote.fetch(&[refspec.as_str()], Some(&mut options), None)?;

        match repository.refname_to_id(&self.tracking_ref()) {
            Ok(oid) => Ok(Some(oid)),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn read_snapshot(&self, repository: &Repository, tip: Oid) -> Result<Option<Vec<u8>>> {
        let tree = repository.find_commit(tip)?.tree()?;
        let entry = match tree.get_path(Path::new(&self.path)) {
            Ok(entry) => entry,
            Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let blob = repository.find_blob(entry.id())?;

        Ok(Some(blob.content().to_vec()))
    }

    fn fetch_blocking(&self) -> Result<Option<RemoteBatch>> {
        let repository = self.open_mirror()?;
        let Some(tip) = self.fetch_branch(&repository)? else {
            return Ok(None);
        };

        match self.read_snapshot(&repository, tip)? {
            Some(data) => Ok(Some(parse_snapshot(data)?)),
            None => {
                info!("branch {} has no {} yet", self.branch, self.path);
                Ok(None)
            }
        }
    }

    fn push_blocking(&self, message: String, contents: String) -> Result<PushOutcome> {
        let repository = self.open_mirror()?;

        // INVARIANT: Build on the tip seen by the last fetch, never a newer one.
        let tip = match repository.refname_to_id(&self.tracking_ref()) {
            Ok(oid) => Some(oid),
            Err(err) if err.code() == ErrorCode::NotFound => self.fetch_branch(&repository)?,
            Err(err) => return Err(err.into()),
        };
        let parent = tip.map(|oid| repository.find_commit(oid)).transpose()?;

        let blob = repository.blob(contents.as_bytes())?;
        let mut index = Index::new()?;
        if let Some(parent) = &parent {
            let tree = parent.tree()?;
            if tree
                .get_path(Path::new(&self.path))
                .is_ok_and(|entry| entry.id() == blob)
            {
                info!("remote snapshot already up to date");
                return Ok(PushOutcome::Written {
                    revision: parent.id().to_string(),
                });
            }
            index.read_tree(&tree)?;
        }

        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: contents.len() as u32,
            id: blob,
            flags: 0,
            flags_extended: 0,
            path: self.path.as_bytes().to_vec(),
        };

        // INVARIANT: New tree is the parent tree with only the snapshot swapped.
        index.add(&entry)?;
        let tree = repository.find_tree(index.write_tree_to(&repository)?)?;
        let signature = repository
            .signature()
            .or_else(|_| Signature::now("wordhoard", "wordhoard@localhost"))?;
        let parents = parent.iter().collect::<Vec<_>>();
        let commit = repository.commit(None, &signature, &signature, &message, &tree, &parents)?;
        repository.reference(&self.branch_ref(), commit, true, "wordhoard: snapshot")?;

        let authenticator = self.authenticator();
        let config = Config::open_default().or_else(|_| Config::new())?;
        let mut rejection = None;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(authenticator.credentials(&config));
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                rejection = Some(format!("{refname} ({status})"));
            }
            Ok(())
        });
        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspec = format!("{0}:{0}", self.branch_ref());
        let mut remote = repository.find_remote("origin")?;
        match remote.push(&[refspec.as_str()], Some(&mut options)) {
            Ok(()) => {}
            Err(err) if err.code() == ErrorCode::NotFastForward => {
                return Err(RemoteError::Rejected(format!(
                    "{} ({})",
                    self.branch_ref(),
                    err.message()
                )));
            }
            Err(err) => return Err(err.into()),
        }
        drop(options);

        if let Some(rejection) = rejection {
            return Err(RemoteError::Rejected(rejection));
        }

        repository.reference(&self.tracking_ref(), commit, true, "wordhoard: pushed")?;
        info!("pushed snapshot as commit {commit}");

        Ok(PushOutcome::Written {
            revision: commit.to_string(),
        })
    }
}

impl SnapshotTransport for GitTransport {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self) -> Result<Option<RemoteBatch>> {
        let transport = self.clone();
        tokio::task::spawn_blocking(move || transport.fetch_blocking()).await?
    }

    #[instrument(skip(self, snapshot), level = "debug")]
    async fn push(&self, snapshot: &Snapshot) -> Result<PushOutcome> {
        let transport = self.clone();
        let message = format!("sync {} words", snapshot.metadata.total_words);
        let contents = snapshot.to_json()?;
        tokio::task::spawn_blocking(move || transport.push_blocking(message, contents)).await?
    }
}
