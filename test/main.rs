// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use git2::{Index, IndexEntry, IndexTime, Repository, RepositoryInitOptions, Signature};
use std::path::{Path, PathBuf};

/// Bare repository standing in for the remote that holds the snapshot.
pub(crate) struct RemoteFixture {
    repo: Repository,
    path: PathBuf,
}

impl RemoteFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(true);
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self {
            repo,
            path: path.as_ref().canonicalize()?,
        })
    }

    /// Absolute path usable as clone URL.
    pub(crate) fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub(crate) fn commit_file(
        &self,
        filename: impl AsRef<str>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: contents.as_ref().len() as u32,
            id: self.repo.blob(contents.as_ref().as_bytes())?,
            flags: 0,
            flags_extended: 0,
            path: filename.as_ref().as_bytes().to_vec(),
        };

        // INVARIANT: Always determine latest parent commit to append to.
        let parent = self.tip()?.map(|oid| self.repo.find_commit(oid)).transpose()?;

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = Index::new()?;
        if let Some(parent) = &parent {
            index.read_tree(&parent.tree()?)?;
        }
        index.add(&entry)?;
        let tree = self.repo.find_tree(index.write_tree_to(&self.repo)?)?;

        let signature = Signature::now("John Doe", "john@doe.com")?;
        let parents = parent.iter().collect::<Vec<_>>();
        self.repo.commit(
            Some("refs/heads/main"),
            &signature,
            &signature,
            format!("chore: add {:?}", filename.as_ref()).as_ref(),
            &tree,
            &parents,
        )?;

        Ok(())
    }

    /// Contents of file at tip of main branch.
    pub(crate) fn read_file(&self, filename: impl AsRef<str>) -> Result<Option<String>> {
        let Some(tip) = self.tip()? else {
            return Ok(None);
        };
        let tree = self.repo.find_commit(tip)?.tree()?;
        let Ok(entry) = tree.get_path(Path::new(filename.as_ref())) else {
            return Ok(None);
        };
        let blob = self.repo.find_blob(entry.id())?;

        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }

    /// Number of commits on main branch.
    pub(crate) fn commit_count(&self) -> Result<usize> {
        if self.tip()?.is_none() {
            return Ok(0);
        }
        let mut walk = self.repo.revwalk()?;
        walk.push_ref("refs/heads/main")?;

        Ok(walk.count())
    }

    fn tip(&self) -> Result<Option<git2::Oid>> {
        Ok(self.repo.refname_to_id("refs/heads/main").ok())
    }
}
