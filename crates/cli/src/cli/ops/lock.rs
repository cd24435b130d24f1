use std::fs;
use std::io;

use clap::Args;
use redact::{GitError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Lock {
    /// Also delete the local key store
    #[arg(long)]
    pub forget: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("git error: {0}")]
    Git(#[from] GitError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl crate::cli::op::Op for Lock {
    type Error = LockError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        let git = ctx.git();
        git.ensure_clean()?;

        git.uninstall_filters()?;
        let files = git.refresh_filtered_files()?;

        let mut output = format!("Locked {} file(s)", files.len());
        if self.forget {
            match fs::remove_file(&state.key_path) {
                Ok(()) => output.push_str("; removed the local key store"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(output)
    }
}
