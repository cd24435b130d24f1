use std::io::{self, Read, Write};

use clap::{Args, Subcommand};
use common::crypto::{probe, Codec, CodecError};
use redact::{RepoState, StateError};

pub mod clean;
pub mod smudge;
pub mod textconv;

use crate::cli::op::Op;

crate::command_enum! {
    (Clean, clean::Clean),
    (Smudge, smudge::Smudge),
    (Textconv, textconv::Textconv),
}

// Rename the generated Command to GitCommand for clarity
pub type GitCommand = Command;

/// Filter drivers invoked by git, not by hand
#[derive(Args, Debug, Clone)]
pub struct Git {
    #[command(subcommand)]
    pub command: GitCommand,
}

impl Op for Git {
    type Error = OpError;
    type Output = OpOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn read_stdin() -> io::Result<Vec<u8>> {
    let mut input = Vec::new();
    io::stdin().lock().read_to_end(&mut input)?;
    Ok(input)
}

fn write_stdout(data: &[u8]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(data)?;
    stdout.flush()
}

/// Decode `input` if it is an envelope, otherwise hand it back unchanged
///
/// Only a missing envelope header counts as plaintext: once the header is
/// recognized every failure is an error.
fn decode_or_pass(state: &RepoState, input: Vec<u8>) -> Result<Vec<u8>, FilterError> {
    let (encoded, epoch) = probe(&input[..]);
    if !encoded {
        tracing::debug!("input is not encoded; passing through");
        return Ok(input);
    }

    let store = state.load_store()?;
    tracing::debug!(epoch, "decoding");
    Ok(Codec::new()?.decode_slice(&store, &input)?)
}
