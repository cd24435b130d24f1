use clap::Args;

use redact::BuildInfo;

#[derive(Args, Debug, Clone)]
pub struct Version;

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("Version operation failed: {0}")]
    Failed(String),
}

impl crate::cli::op::Op for Version {
    type Error = VersionError;
    type Output = String;

    fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        Ok(BuildInfo::current().to_string())
    }
}
