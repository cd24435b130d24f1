use clap::{Args, Subcommand};

pub mod new;

use crate::cli::op::Op;

crate::command_enum! {
    (New, new::New),
}

// Rename the generated Command to IdentityCommand for clarity
pub type IdentityCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Identity {
    #[command(subcommand)]
    pub command: IdentityCommand,
}

impl Op for Identity {
    type Error = OpError;
    type Output = OpOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx)
    }
}
