use clap::Args;
use common::crypto::{probe, Codec, LATEST_EPOCH};

use super::{read_stdin, write_stdout, FilterError};

/// Encode stdin to stdout (git clean filter)
#[derive(Args, Debug, Clone)]
pub struct Clean;

impl crate::cli::op::Op for Clean {
    type Error = FilterError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let input = read_stdin()?;
        let state = ctx.repo()?;
        let store = state.load_store()?;
        let codec = Codec::new()?;

        // Only envelopes this store can open count as already encoded
        if probe(&input[..]).0 {
            match codec.decode_slice(&store, &input) {
                Ok(_) => {
                    tracing::debug!("input is already encoded; passing through");
                    write_stdout(&input)?;
                    return Ok(String::new());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "input looks encoded but does not decode; encoding it")
                }
            }
        }

        let encoded = codec.encode_to_vec(
            state.config.construction,
            LATEST_EPOCH,
            &store,
            &input,
        )?;
        write_stdout(&encoded)?;
        Ok(String::new())
    }
}
