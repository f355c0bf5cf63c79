// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that wordhoard reads at
//! startup to simplify the process of serialization and deserialization.
//! Every field has a default, so an empty or missing file is a valid
//! configuration that keeps everything local.
//!
//! # General Layout
//!
//! ```toml
//! store_dir = "$XDG_DATA_HOME/wordhoard"
//! export_dir = "~/Downloads"
//!
//! [remote]
//! kind = "github"
//! owner = "someone"
//! repo = "vocabulary"
//! branch = "main"
//! path = "data/words.json"
//! token_env = "GITHUB_TOKEN"
//!
//! [sync]
//! pull_interval_secs = 120
//! push_interval_secs = 300
//! push_on_change = true
//!
//! [lookup]
//! dictionary_url = "https://api.dictionaryapi.dev/api/v2/entries/en"
//! timeout_secs = 15
//!
//! [lookup.assistant]
//! endpoint = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! ```
//!
//! Leaving out the `[remote]` table disables synchronization. Leaving out
//! the `[lookup.assistant]` table disables the AI assistant.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Top-level settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Word store directory, `$XDG_DATA_HOME/wordhoard` if unset.
    pub store_dir: Option<PathBuf>,

    /// Directory that exports get written to.
    pub export_dir: PathBuf,

    /// Remote snapshot location.
    pub remote: Option<RemoteSettings>,

    /// Synchronization schedule.
    pub sync: SyncSettings,

    /// Lookup services.
    pub lookup: LookupSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: None,
            export_dir: PathBuf::from("."),
            remote: None,
            sync: SyncSettings::default(),
            lookup: LookupSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from file.
    ///
    /// A missing file yields default settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file is not valid.
    /// - Return [`ConfigError::ShellExpansion`] if a path cannot be expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(data) => {
                debug!("load settings from {:?}", path.as_ref().display());
                data.parse()
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no settings at {:?}, use defaults", path.as_ref().display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                config_path: path.as_ref().to_path_buf(),
            }),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.store_dir = settings.store_dir.map(|path| expand(&path)).transpose()?;
        settings.export_dir = expand(&settings.export_dir)?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Where the shared snapshot lives.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RemoteSettings {
    /// Transport used to reach the snapshot.
    #[serde(default)]
    pub kind: TransportKind,

    /// Owner of the repository.
    pub owner: String,

    /// Name of the repository.
    pub repo: String,

    /// Branch holding the snapshot.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Path of the snapshot file inside the repository.
    #[serde(default = "default_snapshot_path")]
    pub path: String,

    /// Environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Clone URL for the git transport, defaults to the HTTPS URL on GitHub.
    pub url: Option<String>,
}

impl RemoteSettings {
    /// Construct remote settings with defaults for everything but the
    /// repository coordinates.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::default(),
            owner: owner.into(),
            repo: repo.into(),
            branch: default_branch(),
            path: default_snapshot_path(),
            token_env: default_token_env(),
            url: None,
        }
    }

    /// Clone URL of the repository.
    pub fn clone_url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}/{}.git", self.owner, self.repo))
    }

    /// Access token from the environment, if set.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

fn default_branch() -> String {
    "main".into()
}

fn default_snapshot_path() -> String {
    "data/words.json".into()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}

/// Transport used to reach the remote snapshot.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Raw content reads and the contents API for writes.
    #[default]
    Github,

    /// Plain git fetch and push.
    Git,

    /// Raw content reads, writes go through a prefilled issue.
    Issue,
}

/// Synchronization schedule.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Seconds between pulls in watch mode.
    pub pull_interval_secs: u64,

    /// Seconds between pushes in watch mode.
    pub push_interval_secs: u64,

    /// Push after every add, edit, or removal.
    pub push_on_change: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            pull_interval_secs: 120,
            push_interval_secs: 300,
            push_on_change: true,
        }
    }
}

/// Lookup services.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupSettings {
    /// Base URL of the dictionary service.
    pub dictionary_url: String,

    /// Request timeout for every lookup.
    pub timeout_secs: u64,

    /// AI assistant, disabled if unset.
    pub assistant: Option<AssistantSettings>,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            dictionary_url: "https://api.dictionaryapi.dev/api/v2/entries/en".into(),
            timeout_secs: 15,
            assistant: None,
        }
    }
}

/// Chat completion service used as AI assistant.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssistantSettings {
    /// Base URL of an OpenAI compatible API.
    pub endpoint: String,

    /// Model to ask.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read settings from {:?}", config_path.display())]
    Read {
        #[source]
        source: std::io::Error,
        config_path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah/blah")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            store_dir = "$BLAH/words"
            export_dir = "$BLAH/exports"

            [remote]
            kind = "git"
            owner = "blah"
            repo = "vocabulary"
            url = "git@blah.org:blah/vocabulary.git"

            [sync]
            pull_interval_secs = 60

            [lookup.assistant]
            model = "tiny"
        "#
        .parse()?;

        let expect = Settings {
            store_dir: Some("/home/blah/blah/words".into()),
            export_dir: "/home/blah/blah/exports".into(),
            remote: Some(RemoteSettings {
                kind: TransportKind::Git,
                url: Some("git@blah.org:blah/vocabulary.git".into()),
                ..RemoteSettings::new("blah", "vocabulary")
            }),
            sync: SyncSettings {
                pull_interval_secs: 60,
                ..Default::default()
            },
            lookup: LookupSettings {
                assistant: Some(AssistantSettings {
                    model: "tiny".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn empty_settings_are_defaults() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        assert_eq!(result, Settings::default());

        Ok(())
    }

    #[test]
    fn serialized_settings_parse_back() -> anyhow::Result<()> {
        let settings = Settings {
            store_dir: Some("/home/blah/words".into()),
            remote: Some(RemoteSettings::new("blah", "vocabulary")),
            ..Default::default()
        };
        let rendered = settings.to_string();

        assert!(rendered.contains("[remote]"));
        assert!(!rendered.contains("\nurl"));
        assert_eq!(rendered.parse::<Settings>()?, settings);

        Ok(())
    }

    #[test]
    fn remote_clone_url_defaults_to_github() {
        let remote = RemoteSettings::new("blah", "vocabulary");
        assert_eq!(remote.clone_url(), "https://github.com/blah/vocabulary.git");
    }

    #[sealed_test]
    fn missing_settings_file_is_fine() -> anyhow::Result<()> {
        assert_eq!(Settings::load("nowhere.toml")?, Settings::default());

        Ok(())
    }
}
