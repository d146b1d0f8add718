use tracing::debug;

use super::{SessionOptions, sts::IdentityProvider};

/// Whether credentials already persisted for `session` still work.
///
/// Uses GetCallerIdentity, which needs no permissions. Any failure counts as
/// invalid; this only classifies and never writes or prompts.
pub async fn is_valid(provider: &dyn IdentityProvider, session: &SessionOptions) -> bool {
    match provider.who_am_i(session).await {
        Ok(arn) => {
            debug!("Credentials for {} are valid ({})", session, arn);
            true
        }
        Err(e) => {
            debug!("Credentials for {} are not usable: {}", session, e);
            false
        }
    }
}
