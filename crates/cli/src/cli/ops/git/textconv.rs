use std::path::PathBuf;

use clap::Args;

use super::{decode_or_pass, write_stdout, FilterError};

/// Print the decoded contents of a file (git diff textconv driver)
#[derive(Args, Debug, Clone)]
pub struct Textconv {
    /// File git wants converted
    pub path: PathBuf,
}

impl crate::cli::op::Op for Textconv {
    type Error = FilterError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let input = std::fs::read(&self.path)?;
        let state = ctx.repo()?;
        let output = decode_or_pass(&state, input)?;
        write_stdout(&output)?;
        Ok(String::new())
    }
}
