use std::path::PathBuf;

use clap::Args;
use common::exchange::ExchangeError;
use common::pgp::PgpError;
use redact::{EngineKind, GitError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Unlock {
    /// Engine holding your private key; saved to the repository config
    #[arg(long, value_enum)]
    pub engine: Option<EngineKind>,

    /// Native keyring directory; saved to the repository config
    #[arg(long)]
    pub keyring: Option<PathBuf>,

    /// Replace a local key store that has newer epochs
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Exchange(#[from] ExchangeError),
    #[error("pgp error: {0}")]
    Pgp(#[from] PgpError),
    #[error("git error: {0}")]
    Git(#[from] GitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(
        "the exchange record ends at epoch {wrapped} but the local key store is at {local}; \
         refusing to discard newer keys (use --force to overwrite)"
    )]
    Older { local: u32, wrapped: u32 },
}

impl crate::cli::op::Op for Unlock {
    type Error = UnlockError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut state = ctx.repo()?;
        let git = ctx.git();
        git.ensure_clean()?;

        let overridden = self.engine.is_some() || self.keyring.is_some();
        if let Some(engine) = self.engine {
            state.config.engine = engine;
        }
        if let Some(keyring) = &self.keyring {
            state.config.keyring = Some(keyring.clone());
        }

        let engine = state.engine()?;
        let candidates = engine.secret_key_fingerprints()?;
        tracing::debug!(count = candidates.len(), "local secret keys");
        let record = state.exchange.select(&candidates)?;
        let store = record.recover(engine.as_ref(), &state.key_path)?;

        if state.has_key_store() && !self.force {
            let local = state.load_store()?;
            if local.latest_epoch() > store.latest_epoch() {
                return Err(UnlockError::Older {
                    local: local.latest_epoch(),
                    wrapped: store.latest_epoch(),
                });
            }
        }
        store.save().map_err(ExchangeError::from)?;
        if overridden {
            state.save_config()?;
        } else {
            state.write_default_config()?;
        }

        git.install_filters(&std::env::current_exe()?)?;
        let files = git.refresh_filtered_files()?;

        Ok(format!(
            "Unlocked with {}\n  latest key: {}\n  decrypted {} file(s)",
            record.fingerprint(),
            store
                .latest()
                .map(|key| key.to_string())
                .unwrap_or_else(|| "none".to_string()),
            files.len()
        ))
    }
}
