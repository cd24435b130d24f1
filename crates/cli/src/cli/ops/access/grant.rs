use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use common::exchange::ExchangeError;
use redact::StateError;

#[derive(Args, Debug, Clone)]
pub struct Grant {
    /// File holding one or more public keys ("-" reads stdin)
    pub file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Exchange(#[from] ExchangeError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

impl Grant {
    fn read_source(&self) -> Result<Vec<u8>, GrantError> {
        let read_error = |source: std::io::Error| GrantError::Read {
            path: self.file.display().to_string(),
            source,
        };
        if self.file.as_os_str() == "-" {
            let mut source = Vec::new();
            std::io::stdin()
                .read_to_end(&mut source)
                .map_err(read_error)?;
            return Ok(source);
        }
        std::fs::read(&self.file).map_err(read_error)
    }
}

impl crate::cli::op::Op for Grant {
    type Error = GrantError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        let store = state.load_store()?;
        let engine = state.engine()?;
        let source = self.read_source()?;

        let granted = state.exchange.grant(engine.as_ref(), &store, &source)?;

        let mut lines = vec![format!(
            "Granted access to {} key(s) at {}:",
            granted.len(),
            store
                .latest()
                .map(|key| key.to_string())
                .unwrap_or_default()
        )];
        lines.extend(granted.iter().map(|fingerprint| format!("  {}", fingerprint)));
        lines.push(format!(
            "Commit {} to share access",
            state.exchange.path().display()
        ));
        Ok(lines.join("\n"))
    }
}
