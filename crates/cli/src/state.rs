use std::fs;
use std::path::{Path, PathBuf};

use common::crypto::{Construction, KeyStore, KeyStoreError, PermissionPolicy};
use common::exchange::ExchangeDir;
use common::perms;
use common::pgp::{NativeEngine, PgpEngine, PgpError};
use serde::{Deserialize, Serialize};

use crate::git::{GitError, GitRepo};
use crate::gpg::{GpgEngine, DEFAULT_PROGRAM};

pub const APP_NAME: &str = "redact";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEY_FILE_NAME: &str = "key";
pub const IDENTITIES_DIR_NAME: &str = "identities";

/// Which [`PgpEngine`] distributes the key store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Gpg,
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Construction used for newly encoded content
    #[serde(default)]
    pub construction: Construction,
    /// Refuse to load a key store readable by group or others
    #[serde(default = "default_strict_permissions")]
    pub strict_permissions: bool,
    #[serde(default)]
    pub engine: EngineKind,
    /// `gpg` executable (defaults to "gpg" on PATH)
    #[serde(default = "default_gpg_program")]
    pub gpg_program: String,
    /// Native keyring directory (defaults to <config dir>/redact/identities)
    #[serde(default)]
    pub keyring: Option<PathBuf>,
}

fn default_strict_permissions() -> bool {
    true
}

fn default_gpg_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            construction: Construction::default(),
            strict_permissions: default_strict_permissions(),
            engine: EngineKind::default(),
            gpg_program: default_gpg_program(),
            keyring: None,
        }
    }
}

impl RepoConfig {
    pub fn permission_policy(&self) -> PermissionPolicy {
        if self.strict_permissions {
            PermissionPolicy::Strict
        } else {
            PermissionPolicy::Lenient
        }
    }

    /// Directory holding native identities
    pub fn keyring_dir(&self) -> Result<PathBuf, StateError> {
        if let Some(path) = &self.keyring {
            return Ok(path.clone());
        }
        let config = dirs::config_dir().ok_or(StateError::NoConfigDirectory)?;
        Ok(config.join(APP_NAME).join(IDENTITIES_DIR_NAME))
    }

    /// Build the configured engine
    pub fn engine(&self) -> Result<Box<dyn PgpEngine>, StateError> {
        match self.engine {
            EngineKind::Gpg => Ok(Box::new(GpgEngine::new(self.gpg_program.clone()))),
            EngineKind::Native => Ok(Box::new(NativeEngine::load_keyring(
                &self.keyring_dir()?,
            )?)),
        }
    }
}

/// Where a repository keeps its redact state
#[derive(Debug, Clone)]
pub struct RepoState {
    /// Root of the work tree
    pub work_tree: PathBuf,
    /// `<git common dir>/redact`
    pub state_dir: PathBuf,
    /// Private key store
    pub key_path: PathBuf,
    pub config_path: PathBuf,
    /// Tracked exchange directory at the work tree root
    pub exchange: ExchangeDir,
    /// Loaded configuration (defaults when the file is absent)
    pub config: RepoConfig,
}

impl RepoState {
    /// Locate the state of the repository containing `repo`
    pub fn discover(repo: &GitRepo) -> Result<Self, StateError> {
        let work_tree = repo.top_level()?;
        let common_dir = repo.common_dir()?;
        Self::from_dirs(work_tree, &common_dir)
    }

    pub fn from_dirs(work_tree: PathBuf, common_dir: &Path) -> Result<Self, StateError> {
        let state_dir = common_dir.join(APP_NAME);
        let key_path = state_dir.join(KEY_FILE_NAME);
        let config_path = state_dir.join(CONFIG_FILE_NAME);

        let config = if config_path.exists() {
            let config_toml = fs::read_to_string(&config_path)?;
            toml::from_str(&config_toml)?
        } else {
            RepoConfig::default()
        };

        Ok(Self {
            exchange: ExchangeDir::in_work_tree(&work_tree),
            work_tree,
            state_dir,
            key_path,
            config_path,
            config,
        })
    }

    pub fn has_key_store(&self) -> bool {
        self.key_path.exists()
    }

    /// Load the key store, reporting lenient-mode warnings through `tracing`
    pub fn load_store(&self) -> Result<KeyStore, StateError> {
        if !self.has_key_store() {
            return Err(StateError::NotInitialized);
        }
        let store = KeyStore::load(
            &self.key_path,
            self.config.permission_policy(),
            |warning| tracing::warn!("{}", warning),
        )?;
        Ok(store)
    }

    /// Write the configuration unless a file is already present
    pub fn write_default_config(&self) -> Result<(), StateError> {
        if self.config_path.exists() {
            return Ok(());
        }
        self.save_config()
    }

    pub fn save_config(&self) -> Result<(), StateError> {
        if !self.state_dir.exists() {
            perms::create_private_dir(&self.state_dir)?;
        }
        let config_toml = toml::to_string_pretty(&self.config)?;
        fs::write(&self.config_path, config_toml)?;
        Ok(())
    }

    pub fn engine(&self) -> Result<Box<dyn PgpEngine>, StateError> {
        self.config.engine()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("redact is not initialized in this repository. Run 'redact init' or 'redact unlock' first")]
    NotInitialized,

    #[error("redact is already initialized in this repository")]
    AlreadyInitialized,

    #[error("no configuration directory found")]
    NoConfigDirectory,

    #[error("git error: {0}")]
    Git(#[from] GitError),

    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("pgp error: {0}")]
    Pgp(#[from] PgpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    fn state(temp: &TempDir) -> RepoState {
        RepoState::from_dirs(temp.path().join("work"), &temp.path().join("git")).unwrap()
    }

    #[test]
    fn test_layout() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        assert_eq!(state.key_path, temp.path().join("git/redact/key"));
        assert_eq!(state.config_path, temp.path().join("git/redact/config.toml"));
        assert_eq!(state.exchange.path(), temp.path().join("work/.redact"));
        assert_eq!(state.config, RepoConfig::default());
        assert!(!state.has_key_store());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RepoConfig = toml::from_str("engine = \"native\"\n").unwrap();
        assert_eq!(config.engine, EngineKind::Native);
        assert_eq!(config.construction, Construction::Aes256Gcm);
        assert!(config.strict_permissions);
        assert_eq!(config.gpg_program, "gpg");
        assert_eq!(config.keyring, None);
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let temp = TempDir::new().unwrap();
        let mut state = state(&temp);
        state.config.construction = Construction::ChaCha20Poly1305;
        state.config.strict_permissions = false;
        state.write_default_config().unwrap();

        let reloaded = RepoState::from_dirs(temp.path().join("work"), &temp.path().join("git"))
            .unwrap();
        assert_eq!(reloaded.config.construction, Construction::ChaCha20Poly1305);
        assert_eq!(
            reloaded.config.permission_policy(),
            PermissionPolicy::Lenient
        );
    }

    #[test]
    fn test_load_store_requires_init() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            state(&temp).load_store(),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_explicit_keyring() {
        let config = RepoConfig {
            keyring: Some(PathBuf::from("/keys")),
            ..Default::default()
        };
        assert_eq!(config.keyring_dir().unwrap(), PathBuf::from("/keys"));
    }
}
