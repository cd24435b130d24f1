use clap::Args;
use common::exchange::ExchangeError;
use common::pgp::PgpEngine;
use redact::StateError;

#[derive(Args, Debug, Clone)]
pub struct List;

#[derive(Debug, thiserror::Error)]
pub enum AccessListError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Exchange(#[from] ExchangeError),
}

/// User ids recorded in a collaborator's public key, if the engine can read them
fn identities(engine: Option<&dyn PgpEngine>, armored: &[u8]) -> Vec<String> {
    let Some(engine) = engine else {
        return Vec::new();
    };
    match engine.list_public_keys(armored) {
        Ok(keys) => keys.into_iter().flat_map(|key| key.identities).collect(),
        Err(e) => {
            tracing::debug!("could not describe public key: {}", e);
            Vec::new()
        }
    }
}

impl crate::cli::op::Op for List {
    type Error = AccessListError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        let records = state.exchange.records()?;
        if records.is_empty() {
            return Ok("No collaborators have access".to_string());
        }

        let engine = state.engine().ok();
        let mut lines = Vec::new();
        for record in &records {
            let mut line = format!("  {}", record.fingerprint());
            if let Ok(armored) = record.read_public_key() {
                let names = identities(engine.as_deref(), &armored);
                if !names.is_empty() {
                    line.push_str(&format!("  {}", names.join(", ")));
                }
            }
            if !record.has_public_key() {
                line.push_str("  (missing public key)");
            }
            if !record.has_wrapped_store() {
                line.push_str("  (no wrapped key store; grant again)");
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }
}
