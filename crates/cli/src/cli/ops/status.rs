use clap::Args;
use common::crypto::probe;
use redact::git::FILTER_NAME;
use redact::{GitError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Status {
    /// Fail when a protected file is committed in plaintext
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("git error: {0}")]
    Git(#[from] GitError),
    #[error("{0} protected file(s) are staged without encryption")]
    Unencrypted(usize),
}

impl crate::cli::op::Op for Status {
    type Error = StatusError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        let git = ctx.git();
        let mut lines = Vec::new();

        if state.has_key_store() {
            let store = state.load_store()?;
            lines.push(format!("key store: {}", store));
        } else {
            lines.push("key store: not present (locked)".to_string());
        }
        let filters = if git.filters_installed()? {
            "installed"
        } else {
            "not installed"
        };
        lines.push(format!("filters: {}", filters));

        let files = git.list_files(FILTER_NAME)?;
        if files.is_empty() {
            lines.push(format!("no files carry filter={}", FILTER_NAME));
            return Ok(lines.join("\n"));
        }

        let mut unencrypted = 0;
        for file in &files {
            let blob = git.cat_blob(&file.object)?;
            match probe(&blob[..]) {
                (true, epoch) => {
                    lines.push(format!("  encrypted #{:<4} {}", epoch, file.path.display()))
                }
                (false, _) => {
                    unencrypted += 1;
                    lines.push(format!("  NOT ENCRYPTED  {}", file.path.display()));
                }
            }
        }

        if self.check && unencrypted > 0 {
            return Err(StatusError::Unencrypted(unencrypted));
        }
        if unencrypted > 0 {
            lines.push(format!(
                "{} file(s) were staged before the filter was installed; \
                 run 'git add --renormalize .' and commit to encrypt them",
                unencrypted
            ));
        }
        Ok(lines.join("\n"))
    }
}
