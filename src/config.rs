use std::{
    io,
    path::{Path, PathBuf},
};

use ini::Ini;
use tracing::debug;

use crate::{
    Error, Result,
    aws::SessionOptions,
    constants::{
        self, DEFAULT_ASSUME_ROLE_DURATION, DEFAULT_AWS_REGION, DEFAULT_ROLE_ARN_TEMPLATE,
        DEFAULT_SESSION_TOKEN_DURATION, INTERMEDIATE_PROFILE_SUFFIX, MAX_ASSUME_ROLE_DURATION,
        MAX_SESSION_TOKEN_DURATION, MIN_ASSUME_ROLE_DURATION, MIN_SESSION_TOKEN_DURATION,
    },
};

/// How the role to assume is identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleReference {
    Arn(String),
    /// `{account_id}` and `{role_name}` are substituted into `template`
    Template {
        template: String,
        account_id: String,
        role_name: String,
    },
}

impl RoleReference {
    pub fn from_parts(account_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self::Template {
            template: DEFAULT_ROLE_ARN_TEMPLATE.to_string(),
            account_id: account_id.into(),
            role_name: role_name.into(),
        }
    }

    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Arn(arn) if arn.trim().is_empty() => Err(Error::config("role ARN is empty")),
            Self::Arn(arn) => Ok(arn.trim().to_string()),
            Self::Template {
                template,
                account_id,
                role_name,
            } => {
                if account_id.is_empty() || role_name.is_empty() {
                    return Err(Error::config(
                        "both an account id and a role name are needed to build the role ARN",
                    ));
                }

                let arn = template
                    .replace("{account_id}", account_id)
                    .replace("{role_name}", role_name);

                if arn.contains('{') || arn.contains('}') {
                    return Err(Error::config(format!(
                        "role ARN template '{template}' has an unknown placeholder"
                    )));
                }
                Ok(arn)
            }
        }
    }
}

/// Settings for the MFA session-token hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaHop {
    pub serial: String,
    pub intermediate_profile: String,
    pub duration_seconds: i32,
}

/// Fully resolved, immutable run settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Profile holding long-term keys
    pub base_profile: String,
    pub target_profile: String,
    pub region: String,
    pub mfa: Option<MfaHop>,
    pub target_duration: i32,
    pub role_arn: String,
    pub renew: bool,
    pub export_file: Option<PathBuf>,
    pub use_host_identity: bool,
}

/// Unvalidated settings as gathered from the command line and config file
#[derive(Debug, Clone)]
pub struct SettingsInput {
    pub base_profile: String,
    pub target_profile: String,
    pub intermediate_profile: Option<String>,
    pub region: Option<String>,
    pub mfa_serial: Option<String>,
    pub intermediate_duration: i32,
    pub target_duration: i32,
    pub role: Option<RoleReference>,
    pub renew: bool,
    pub export_file: Option<PathBuf>,
    pub use_host_identity: bool,
}

impl Default for SettingsInput {
    fn default() -> Self {
        Self {
            base_profile: "default".to_string(),
            target_profile: String::new(),
            intermediate_profile: None,
            region: None,
            mfa_serial: None,
            intermediate_duration: DEFAULT_SESSION_TOKEN_DURATION,
            target_duration: DEFAULT_ASSUME_ROLE_DURATION,
            role: None,
            renew: false,
            export_file: None,
            use_host_identity: false,
        }
    }
}

impl Settings {
    /// Validate `input` and fill in derived values
    pub fn resolve(input: SettingsInput) -> Result<Self> {
        let SettingsInput {
            base_profile,
            target_profile,
            intermediate_profile,
            region,
            mfa_serial,
            intermediate_duration,
            target_duration,
            role,
            renew,
            export_file,
            use_host_identity,
        } = input;

        if target_profile.is_empty() {
            return Err(Error::config("target profile is required"));
        }
        if !use_host_identity && base_profile.is_empty() {
            return Err(Error::config("base profile is required"));
        }
        if !use_host_identity && target_profile == base_profile {
            return Err(Error::config(format!(
                "target profile '{target_profile}' would overwrite the base profile"
            )));
        }

        let region = region.unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
        if region.trim().is_empty() {
            return Err(Error::config("region is empty"));
        }

        check_duration(
            "target duration",
            target_duration,
            MIN_ASSUME_ROLE_DURATION,
            MAX_ASSUME_ROLE_DURATION,
        )?;

        let role_arn = role
            .ok_or_else(|| {
                Error::config("a role ARN, or an account id and role name, must be given")
            })?
            .resolve()?;

        let mfa = match mfa_serial.filter(|s| !s.trim().is_empty()) {
            None => None,
            Some(_) if use_host_identity => {
                return Err(Error::config(
                    "an MFA device cannot be combined with the host-assigned identity",
                ));
            }
            Some(serial) => {
                let intermediate_profile = intermediate_profile
                    .unwrap_or_else(|| format!("{base_profile}{INTERMEDIATE_PROFILE_SUFFIX}"));

                if intermediate_profile.is_empty() {
                    return Err(Error::config("intermediate profile is empty"));
                }
                if intermediate_profile == base_profile || intermediate_profile == target_profile {
                    return Err(Error::config(format!(
                        "intermediate profile '{intermediate_profile}' must differ from the base and target profiles"
                    )));
                }

                check_duration(
                    "intermediate duration",
                    intermediate_duration,
                    MIN_SESSION_TOKEN_DURATION,
                    MAX_SESSION_TOKEN_DURATION,
                )?;

                Some(MfaHop {
                    serial: serial.trim().to_string(),
                    intermediate_profile,
                    duration_seconds: intermediate_duration,
                })
            }
        };

        Ok(Self {
            base_profile,
            target_profile,
            region,
            mfa,
            target_duration,
            role_arn,
            renew,
            export_file,
            use_host_identity,
        })
    }

    /// Session backed by the long-term keys
    pub fn base_session(&self) -> SessionOptions {
        SessionOptions::profile(&self.base_profile, &self.region)
    }

    /// Session backed by the MFA session token, if that hop is configured
    pub fn intermediate_session(&self) -> Option<SessionOptions> {
        self.mfa
            .as_ref()
            .map(|hop| SessionOptions::profile(&hop.intermediate_profile, &self.region))
    }

    /// Session used to assume the target role
    pub fn assume_role_session(&self) -> SessionOptions {
        if self.use_host_identity {
            return SessionOptions::host_identity(&self.region);
        }
        self.intermediate_session()
            .unwrap_or_else(|| self.base_session())
    }
}

fn check_duration(name: &str, value: i32, min: i32, max: i32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{name} must be between {min} and {max} seconds, got {value}"
        )))
    }
}

/// Settings read from a profile in the AWS config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDefaults {
    pub region: Option<String>,
    pub mfa_serial: Option<String>,
}

fn section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

/// Load `region` and `mfa_serial` for `profile` from the config file at `path`.
/// A missing file or profile yields empty defaults.
pub fn load_profile_defaults_from(path: &Path, profile: &str) -> Result<ProfileDefaults> {
    if !path.exists() {
        return Ok(ProfileDefaults::default());
    }

    let ini = Ini::load_from_file(path).map_err(|e| {
        Error::io(
            format!("Failed to load AWS config file {}", path.display()),
            io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
        )
    })?;

    let Some(section) = ini.section(Some(section_name(profile))) else {
        debug!("Profile '{}' not found in {}", profile, path.display());
        return Ok(ProfileDefaults::default());
    };

    let value = |key: &str| {
        section
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Ok(ProfileDefaults {
        region: value("region"),
        mfa_serial: value("mfa_serial"),
    })
}

/// Same as [`load_profile_defaults_from`] for the standard AWS config file
pub fn load_profile_defaults(profile: &str) -> Result<ProfileDefaults> {
    match constants::get_aws_config_path() {
        Some(path) => load_profile_defaults_from(&path, profile),
        None => Ok(ProfileDefaults::default()),
    }
}
