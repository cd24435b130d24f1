use clap::Args;
use redact::StateError;

#[derive(Args, Debug, Clone)]
pub struct Show;

#[derive(Debug, thiserror::Error)]
pub enum KeyShowError {
    #[error("{0}")]
    State(#[from] StateError),
}

impl crate::cli::op::Op for Show {
    type Error = KeyShowError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        let store = state.load_store()?;

        let mut lines = vec![store.to_string()];
        let latest = store.latest_epoch();
        for key in store.iter() {
            let marker = if key.epoch() == latest { " (latest)" } else { "" };
            lines.push(format!("  {}{marker}", key));
        }
        Ok(lines.join("\n"))
    }
}
