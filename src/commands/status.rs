use anyhow::{Context, Result};
use clap::Args;

use crate::{
    aws::{
        SessionOptions,
        credentials::ProfileStore,
        sts::{IdentityProvider, StsIdentityProvider},
        validator,
    },
    constants::DEFAULT_AWS_REGION,
};

#[derive(Debug, Clone, Args)]
pub struct StatusCommand {
    #[arg(required = true, help = "Profiles to inspect")]
    pub profiles: Vec<String>,

    #[arg(long, help = "AWS region [default: region stored with the profile]")]
    pub region: Option<String>,
}

impl StatusCommand {
    pub async fn execute(self) -> Result<()> {
        let store = ProfileStore::from_env()?;
        let provider = StsIdentityProvider::new();

        for line in self.report(&provider, &store).await? {
            println!("{line}");
        }

        Ok(())
    }

    /// One line per requested profile
    pub async fn report(
        &self,
        provider: &dyn IdentityProvider,
        store: &ProfileStore,
    ) -> Result<Vec<String>> {
        let mut lines = Vec::with_capacity(self.profiles.len());

        for profile in &self.profiles {
            let stored = store
                .load_profile(profile)
                .await
                .with_context(|| format!("Failed to read profile '{profile}'"))?;

            let Some(stored) = stored else {
                lines.push(format!("{profile}: not found in {}", store.path().display()));
                continue;
            };

            let region = self
                .region
                .clone()
                .or_else(|| stored.region.clone())
                .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
            let session = SessionOptions::profile(profile, region);

            let expiry = stored
                .credentials()
                .map(|creds| format!("expires {}", creds.expiration_string()))
                .unwrap_or_else(|| "long-term keys".to_string());

            let state = if validator::is_valid(provider, &session).await {
                "valid"
            } else {
                "invalid"
            };

            lines.push(format!("{profile}: {state}, {expiry}"));
        }

        Ok(lines)
    }
}
