use std::path::PathBuf;

use clap::Args;
use common::pgp::{NativeEngine, PgpError};
use redact::{RepoConfig, StateError};

#[derive(Args, Debug, Clone)]
pub struct New {
    /// Name of the identity; the key is stored as <keyring>/<name>.pem
    pub name: String,

    /// Keyring directory (defaults to the repository's configured keyring)
    #[arg(long)]
    pub keyring: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityNewError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Pgp(#[from] PgpError),
}

impl New {
    fn keyring(&self, ctx: &crate::cli::op::OpContext) -> Result<PathBuf, StateError> {
        if let Some(keyring) = &self.keyring {
            return Ok(keyring.clone());
        }
        match ctx.repo() {
            Ok(state) => state.config.keyring_dir(),
            Err(e) => {
                tracing::debug!("not in a repository, using the default keyring: {}", e);
                RepoConfig::default().keyring_dir()
            }
        }
    }
}

impl crate::cli::op::Op for New {
    type Error = IdentityNewError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let keyring = self.keyring(ctx)?;
        let key = NativeEngine::create_identity(&keyring, &self.name)?;
        let public = key.public();

        Ok(format!(
            "Created identity {} ({}) in {}\n\
             Share this public key with a collaborator who can run 'redact access grant':\n{}",
            self.name,
            public.fingerprint(),
            keyring.display(),
            public.to_pem().trim_end()
        ))
    }
}
