use clap::Args;
use common::crypto::{Construction, KeyStore, KeyStoreError};
use common::exchange::ExchangeError;
use redact::git::FILTER_NAME;
use redact::{EngineKind, GitError, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Construction for newly encoded content
    #[arg(long)]
    pub construction: Option<Construction>,

    /// Engine used to share the key store with collaborators
    #[arg(long, value_enum)]
    pub engine: Option<EngineKind>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
    #[error("{0}")]
    Exchange(#[from] ExchangeError),
    #[error(
        "this repository already shares a key store with {0} collaborator(s); \
         run 'redact unlock' instead of creating a new one"
    )]
    AlreadyShared(usize),
    #[error("git error: {0}")]
    Git(#[from] GitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut state = ctx.repo()?;
        if state.has_key_store() {
            return Err(StateError::AlreadyInitialized.into());
        }
        let records = state.exchange.records()?;
        if !records.is_empty() {
            return Err(InitError::AlreadyShared(records.len()));
        }

        if self.construction.is_some() || self.engine.is_some() {
            if let Some(construction) = self.construction {
                state.config.construction = construction;
            }
            if let Some(engine) = self.engine {
                state.config.engine = engine;
            }
            state.save_config()?;
        } else {
            state.write_default_config()?;
        }

        let mut store = KeyStore::new(&state.key_path);
        let latest = store.generate()?.to_string();
        store.save()?;
        state.exchange.init()?;
        ctx.git().install_filters(&std::env::current_exe()?)?;

        tracing::debug!(key_path = %state.key_path.display(), "initialized key store");

        Ok(format!(
            "Initialized redact in {}\n  key store: {}\n  latest key: {}\n  construction: {}\n\
             Mark files for encryption in .gitattributes, for example:\n  secrets/** filter={} diff={}",
            state.work_tree.display(),
            state.key_path.display(),
            latest,
            state.config.construction,
            FILTER_NAME,
            FILTER_NAME,
        ))
    }
}
