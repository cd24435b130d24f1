use clap::Args;
use common::crypto::KeyStore;
use redact::ext::SecretStore;

use super::{ExtOpError, Target};

#[derive(Args, Debug, Clone)]
pub struct Pull {
    #[command(flatten)]
    pub target: Target,

    /// Overwrite a local key store that has newer epochs
    #[arg(long)]
    pub force: bool,
}

impl crate::cli::op::Op for Pull {
    type Error = ExtOpError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        let extension = self.target.extension()?;
        let fetched = KeyStore::from_bytes(&state.key_path, &extension.get()?)?;

        if state.has_key_store() && !self.force {
            let local = state.load_store()?;
            if local.latest_epoch() > fetched.latest_epoch() {
                return Err(ExtOpError::Older {
                    local: local.latest_epoch(),
                    remote: fetched.latest_epoch(),
                });
            }
        }

        fetched.save()?;
        Ok(format!("Pulled key store from {}: {}", extension.name(), fetched))
    }
}
