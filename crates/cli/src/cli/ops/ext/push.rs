use clap::Args;
use redact::ext::SecretStore;

use super::{ExtOpError, Target};

#[derive(Args, Debug, Clone)]
pub struct Push {
    #[command(flatten)]
    pub target: Target,
}

impl crate::cli::op::Op for Push {
    type Error = ExtOpError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        let store = state.load_store()?;
        let extension = self.target.extension()?;
        extension.put(&store.to_bytes())?;

        Ok(format!(
            "Pushed {} epoch(s) to {}",
            store.len(),
            extension.name()
        ))
    }
}
