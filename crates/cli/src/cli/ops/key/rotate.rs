use std::path::PathBuf;

use clap::Args;
use common::crypto::KeyStoreError;
use common::exchange::ExchangeError;
use common::perms;
use redact::StateError;

#[derive(Args, Debug, Clone)]
pub struct Rotate;

#[derive(Debug, thiserror::Error)]
pub enum RotateError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(
        "{source}\nThe new key was saved but collaborators were not updated. \
         Restore the previous key store from {} and run 'redact key rotate' again",
        .backup.display()
    )]
    Incomplete {
        source: ExchangeError,
        backup: PathBuf,
    },
}

impl crate::cli::op::Op for Rotate {
    type Error = RotateError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        let mut store = state.load_store()?;
        let engine = state.engine()?;

        let backup = state.key_path.with_extension("prev");
        perms::write_private_file(&backup, &store.to_bytes())?;

        let latest = store.generate()?.to_string();
        store.save()?;

        let mut failures = Vec::new();
        let report = state
            .exchange
            .rotate_all(engine.as_ref(), &store, |fingerprint, e| {
                tracing::warn!(%fingerprint, "failed to update collaborator: {}", e);
                failures.push(format!("  {}: {}", fingerprint, e));
            });
        let updated = report
            .into_result()
            .map_err(|source| RotateError::Incomplete {
                source,
                backup: backup.clone(),
            })?;
        std::fs::remove_file(&backup)?;

        let mut lines = vec![format!(
            "Rotated to {}; updated {} collaborator(s)",
            latest, updated
        )];
        if !failures.is_empty() {
            lines.push(format!("{} collaborator(s) were not updated:", failures.len()));
            lines.extend(failures);
            lines.push("Fix their public keys and run 'redact access grant' for them".to_string());
        }
        Ok(lines.join("\n"))
    }
}
