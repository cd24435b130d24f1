use clap::Args;
use common::exchange::ExchangeError;
use common::pgp::Fingerprint;
use redact::StateError;

#[derive(Args, Debug, Clone)]
pub struct Revoke {
    /// Fingerprint of the collaborator's key
    pub fingerprint: Fingerprint,
}

#[derive(Debug, thiserror::Error)]
pub enum RevokeError {
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Exchange(#[from] ExchangeError),
}

impl crate::cli::op::Op for Revoke {
    type Error = RevokeError;
    type Output = String;

    fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.repo()?;
        state.exchange.revoke(&self.fingerprint)?;

        Ok(format!(
            "Revoked access for {}\n\
             They can still read every epoch they already had. \
             Run 'redact key rotate' so content encoded from now on is hidden from them",
            self.fingerprint
        ))
    }
}
