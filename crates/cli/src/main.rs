// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{
    args::Args, op::Op, Access, Ext, Git, Identity, Init, Key, Lock, Status, Unlock, Version,
};

command_enum! {
    (Init, Init),
    (Status, Status),
    (Lock, Lock),
    (Unlock, Unlock),
    (Key, Key),
    (Access, Access),
    (Identity, Identity),
    (Git, Git),
    (Ext, Ext),
    (Version, Version),
}

fn main() {
    let args = Args::parse();
    let guard = redact::process::init_logging(args.log_level);

    let ctx = match cli::op::OpContext::new(args.repo) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to resolve the working directory: {}", e);
            drop(guard);
            std::process::exit(1);
        }
    };

    match args.command.execute(&ctx) {
        Ok(output) => {
            // Filters write their payload themselves and return nothing
            let output = output.to_string();
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            drop(guard);
            std::process::exit(1);
        }
    }
}
