use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    aws::{credentials::ProfileStore, sts::StsIdentityProvider},
    chain::{Completion, CredentialChain},
    config::{self, ProfileDefaults, RoleReference, Settings, SettingsInput},
    constants::{
        self, DEFAULT_ASSUME_ROLE_DURATION, DEFAULT_ROLE_ARN_TEMPLATE,
        DEFAULT_SESSION_TOKEN_DURATION,
    },
    mfa::TerminalPrompt,
};

#[derive(Debug, Clone, Args)]
pub struct RunCommand {
    #[arg(
        short = 't',
        long,
        help = "Profile that receives the assumed-role credentials"
    )]
    pub target_profile: String,

    #[arg(
        short = 'i',
        long,
        help = "Profile that receives the MFA session token [default: <profile>-session]"
    )]
    pub intermediate_profile: Option<String>,

    #[arg(long, help = "AWS region [default: region of the base profile, else us-east-1]")]
    pub region: Option<String>,

    #[arg(
        short = 'm',
        long,
        help = "MFA device serial number [default: mfa_serial of the base profile]"
    )]
    pub mfa_serial: Option<String>,

    #[arg(long, default_value_t = DEFAULT_SESSION_TOKEN_DURATION, help = "Session token lifetime in seconds")]
    pub intermediate_duration: i32,

    #[arg(long, default_value_t = DEFAULT_ASSUME_ROLE_DURATION, help = "Assumed-role credential lifetime in seconds")]
    pub target_duration: i32,

    #[arg(
        short = 'r',
        long,
        conflicts_with_all = ["account_id", "role_name"],
        help = "ARN of the role to assume"
    )]
    pub role_arn: Option<String>,

    #[arg(short = 'a', long, requires = "role_name", help = "Account id of the role to assume")]
    pub account_id: Option<String>,

    #[arg(long, requires = "account_id", help = "Name of the role to assume")]
    pub role_name: Option<String>,

    #[arg(
        long,
        default_value = DEFAULT_ROLE_ARN_TEMPLATE,
        help = "Template used to build the role ARN from --account-id and --role-name"
    )]
    pub role_arn_template: String,

    #[arg(long, help = "Keep renewing credentials until interrupted")]
    pub renew: bool,

    #[arg(short = 'e', long, help = "Write a shell snippet selecting the target profile")]
    pub export: bool,

    #[arg(long, help = "Path of the export snippet [default: ~/.aws/rolechain.env]")]
    pub export_file: Option<PathBuf>,

    #[arg(long, help = "Use the container or instance identity instead of a profile")]
    pub instance: bool,
}

impl RunCommand {
    fn role_reference(&self) -> Option<RoleReference> {
        if let Some(arn) = &self.role_arn {
            return Some(RoleReference::Arn(arn.clone()));
        }

        match (&self.account_id, &self.role_name) {
            (Some(account_id), Some(role_name)) => Some(RoleReference::Template {
                template: self.role_arn_template.clone(),
                account_id: account_id.clone(),
                role_name: role_name.clone(),
            }),
            _ => None,
        }
    }

    /// Merge command-line values over the base profile's config file defaults
    pub fn to_input(&self, profile: &str, defaults: ProfileDefaults) -> SettingsInput {
        SettingsInput {
            base_profile: profile.to_string(),
            target_profile: self.target_profile.clone(),
            intermediate_profile: self.intermediate_profile.clone(),
            region: self.region.clone().or(defaults.region),
            mfa_serial: self.mfa_serial.clone().or(defaults.mfa_serial),
            intermediate_duration: self.intermediate_duration,
            target_duration: self.target_duration,
            role: self.role_reference(),
            renew: self.renew,
            export_file: self.export.then(|| {
                self.export_file
                    .clone()
                    .unwrap_or_else(constants::default_export_path)
            }),
            use_host_identity: self.instance,
        }
    }

    pub async fn execute(self, profile: &str, shutdown: CancellationToken) -> Result<()> {
        // The host identity never reads the base profile.
        let defaults = if self.instance {
            ProfileDefaults::default()
        } else {
            config::load_profile_defaults(profile)
                .with_context(|| format!("Failed to read settings for profile '{profile}'"))?
        };

        let settings = Settings::resolve(self.to_input(profile, defaults))?;
        info!(
            "Keeping profile {} fresh with role {}",
            settings.target_profile, settings.role_arn
        );

        let provider = StsIdentityProvider::new();
        let prompt = TerminalPrompt::new();
        let store = ProfileStore::from_env()?;

        let chain = CredentialChain::new(&settings, &provider, &prompt, &store, shutdown);

        if chain.run().await? == Completion::Interrupted {
            println!("Stopped renewing credentials for profile {}", settings.target_profile);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> RunCommand {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run(cmd) => cmd,
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_command_line_overrides_config_defaults() {
        let cmd = parse(&[
            "rolechain",
            "run",
            "-t",
            "prod",
            "--region",
            "eu-west-1",
            "--role-arn",
            "arn:aws:iam::1:role/Admin",
        ]);
        let input = cmd.to_input(
            "work",
            ProfileDefaults {
                region: Some("us-west-2".to_string()),
                mfa_serial: Some("arn:aws:iam::1:mfa/alice".to_string()),
            },
        );

        assert_eq!(input.base_profile, "work");
        assert_eq!(input.region.as_deref(), Some("eu-west-1"));
        assert_eq!(input.mfa_serial.as_deref(), Some("arn:aws:iam::1:mfa/alice"));
        assert_eq!(
            input.role,
            Some(RoleReference::Arn("arn:aws:iam::1:role/Admin".to_string()))
        );
        assert_eq!(input.export_file, None);
    }

    #[test]
    fn test_role_from_account_and_name() {
        let cmd = parse(&[
            "rolechain",
            "run",
            "-t",
            "prod",
            "-a",
            "123456789012",
            "--role-name",
            "Developer",
        ]);
        let settings =
            Settings::resolve(cmd.to_input("default", ProfileDefaults::default())).unwrap();
        assert_eq!(settings.role_arn, "arn:aws:iam::123456789012:role/Developer");
    }

    #[test]
    fn test_role_arn_conflicts_with_parts() {
        let result = Cli::try_parse_from([
            "rolechain",
            "run",
            "-t",
            "prod",
            "--role-arn",
            "arn:aws:iam::1:role/Admin",
            "--account-id",
            "1",
            "--role-name",
            "Admin",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_account_id_requires_role_name() {
        let result = Cli::try_parse_from(["rolechain", "run", "-t", "prod", "-a", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_export_uses_given_path() {
        let cmd = parse(&[
            "rolechain",
            "run",
            "-t",
            "prod",
            "-r",
            "arn:aws:iam::1:role/Admin",
            "--export",
            "--export-file",
            "/tmp/out",
        ]);
        let input = cmd.to_input("default", ProfileDefaults::default());
        assert_eq!(input.export_file, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_export_file_alone_does_not_export() {
        let cmd = parse(&[
            "rolechain",
            "run",
            "-t",
            "prod",
            "-r",
            "arn:aws:iam::1:role/Admin",
            "--export-file",
            "/tmp/out",
        ]);
        assert_eq!(
            cmd.to_input("default", ProfileDefaults::default()).export_file,
            None
        );
    }

    #[test]
    fn test_default_durations_and_flags() {
        let cmd = parse(&["rolechain", "run", "-t", "prod"]);
        assert_eq!(cmd.intermediate_duration, DEFAULT_SESSION_TOKEN_DURATION);
        assert_eq!(cmd.target_duration, DEFAULT_ASSUME_ROLE_DURATION);
        assert!(!cmd.renew);
        assert!(!cmd.instance);
        assert_eq!(cmd.role_arn_template, DEFAULT_ROLE_ARN_TEMPLATE);
    }

    #[test]
    fn test_target_profile_is_required() {
        assert!(Cli::try_parse_from(["rolechain", "run"]).is_err());
    }
}
