use clap::{Args, Subcommand};

pub mod rotate;
pub mod show;

use crate::cli::op::Op;

crate::command_enum! {
    (Show, show::Show),
    (Rotate, rotate::Rotate),
}

// Rename the generated Command to KeyCommand for clarity
pub type KeyCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Key {
    #[command(subcommand)]
    pub command: KeyCommand,
}

impl Op for Key {
    type Error = OpError;
    type Output = OpOutput;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx)
    }
}
