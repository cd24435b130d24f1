use clap::{Args, Subcommand};

pub mod grant;
pub mod list;
pub mod revoke;

use crate::cli::op::Op;

crate::command_enum! {
    (Grant, grant::Grant),
    (List, list::List),
    (Revoke, revoke::Revoke),
}

// Rename the generated Command to AccessCommand for clarity
pub type AccessCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Access {
    #[command(subcommand)]
    pub command: AccessCommand,
}

impl Op for Access {
    type Error = OpError;
    type Output = OpOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx)
    }
}
