use clap::Args;

use super::{decode_or_pass, read_stdin, write_stdout, FilterError};

/// Decode stdin to stdout (git smudge filter)
#[derive(Args, Debug, Clone)]
pub struct Smudge;

impl crate::cli::op::Op for Smudge {
    type Error = FilterError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let input = read_stdin()?;
        let state = ctx.repo()?;
        let output = decode_or_pass(&state, input)?;
        write_stdout(&output)?;
        Ok(String::new())
    }
}
