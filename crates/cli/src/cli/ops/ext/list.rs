use clap::Args;
use redact::ext::SecretStore;

use super::{ExtOpError, Target};

#[derive(Args, Debug, Clone)]
pub struct List {
    #[command(flatten)]
    pub target: Target,
}

impl crate::cli::op::Op for List {
    type Error = ExtOpError;
    type Output = String;

    fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        Ok(self.target.extension()?.list()?)
    }
}
