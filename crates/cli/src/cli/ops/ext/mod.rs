use clap::{Args, Subcommand};
use common::crypto::KeyStoreError;
use redact::ext::{ExtArg, ExtError, ProcessExtension};
use redact::StateError;

pub mod list;
pub mod pull;
pub mod push;

use crate::cli::op::Op;

crate::command_enum! {
    (List, list::List),
    (Push, push::Push),
    (Pull, pull::Pull),
}

// Rename the generated Command to ExtCommand for clarity
pub type ExtCommand = Command;

/// Copy the key store to and from external secret stores
#[derive(Args, Debug, Clone)]
pub struct Ext {
    #[command(subcommand)]
    pub command: ExtCommand,
}

impl Op for Ext {
    type Error = OpError;
    type Output = OpOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx)
    }
}

/// Which extension to run and what to pass it
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Extension name; runs redact-ext-<name>
    pub name: String,

    /// key=value arguments forwarded to the extension
    pub args: Vec<ExtArg>,
}

impl Target {
    fn extension(&self) -> Result<ProcessExtension, ExtError> {
        ProcessExtension::new(self.name.clone(), self.args.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtOpError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Ext(#[from] ExtError),
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
    #[error(
        "the stored key store ends at epoch {remote} but the local one is at {local}; \
         refusing to discard newer keys (use --force to overwrite)"
    )]
    Older { local: u32, remote: u32 },
}
