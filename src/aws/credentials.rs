use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use aws_smithy_types::{DateTime, date_time::Format};
use ini::{EscapePolicy, Ini, ParseOption, WriteOption};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info};

use super::Credentials;
use crate::{
    Error, Result,
    constants::{self, STATIC_KEY_ENV_VARS},
};

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN: &str = "aws_session_token";
const SESSION_EXPIRATION: &str = "aws_session_expiration";
const REGION: &str = "region";

/// Durable destination for freshly issued credentials
#[async_trait]
pub trait CredentialSink: Send + Sync {
    /// Create or fully replace the entry for `profile`
    async fn write_profile(&self, profile: &str, creds: &Credentials, region: &str) -> Result<()>;

    /// Replace `path` with a shell snippet selecting `profile`
    async fn write_export_descriptor(&self, profile: &str, path: &Path) -> Result<()>;
}

/// A profile entry as found in the credentials file
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProfile {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<DateTime>,
    pub region: Option<String>,
}

impl StoredProfile {
    /// Temporary credentials, if this entry carries a session token and expiration
    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone()?,
            expiration: self.expiration?,
        })
    }
}

/// The AWS shared credentials file
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the location the AWS SDK reads from
    pub fn from_env() -> Result<Self> {
        constants::get_aws_credentials_path()
            .map(Self::new)
            .ok_or_else(|| Error::config("Failed to determine AWS credentials path"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Ini> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Ini::new()),
            Err(e) => return Err(Error::io("Failed to read AWS credentials file", e)),
        };

        // A store we cannot parse is never replaced; it may hold other profiles.
        Ini::load_from_str_opt(&content, literal_values()).map_err(|e| {
            Error::io(
                format!("Failed to parse {}", self.path.display()),
                io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
            )
        })
    }

    /// Load one profile from the credentials file
    pub async fn load_profile(&self, profile: &str) -> Result<Option<StoredProfile>> {
        let ini = self.load().await?;

        let Some(section) = ini.section(Some(profile)) else {
            return Ok(None);
        };

        let field = |key: &str| section.get(key).map(str::to_string);
        let missing = |key: &str| {
            Error::io(
                format!("Profile '{profile}' is incomplete"),
                io::Error::new(io::ErrorKind::InvalidData, format!("{key} not found")),
            )
        };

        let expiration = section
            .get(SESSION_EXPIRATION)
            .map(|s| {
                DateTime::from_str(s, Format::DateTime)
                    .or_else(|_| DateTime::from_str(s, Format::DateTimeWithOffset))
                    .map_err(|e| {
                        Error::io(
                            "Failed to parse session expiration time",
                            io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
                        )
                    })
            })
            .transpose()?;

        Ok(Some(StoredProfile {
            access_key_id: field(ACCESS_KEY_ID).ok_or_else(|| missing(ACCESS_KEY_ID))?,
            secret_access_key: field(SECRET_ACCESS_KEY)
                .ok_or_else(|| missing(SECRET_ACCESS_KEY))?,
            session_token: field(SESSION_TOKEN),
            expiration,
            region: field(REGION),
        }))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::io(format!("Failed to create directory: {}", parent.display()), e)
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialSink for ProfileStore {
    async fn write_profile(&self, profile: &str, creds: &Credentials, region: &str) -> Result<()> {
        Self::ensure_parent(&self.path).await?;

        let mut ini = self.load().await?;

        // Replace, never merge: stale keys from an older entry must not survive.
        while ini.delete(Some(profile)).is_some() {}

        ini.with_section(Some(profile))
            .set(ACCESS_KEY_ID, &creds.access_key_id)
            .set(SECRET_ACCESS_KEY, &creds.secret_access_key)
            .set(SESSION_TOKEN, &creds.session_token)
            .set(SESSION_EXPIRATION, creds.expiration_string())
            .set(REGION, region);

        let mut buffer = Vec::new();
        ini.write_to_opt(
            &mut buffer,
            WriteOption {
                escape_policy: EscapePolicy::Nothing,
                ..Default::default()
            },
        )
        .map_err(|e| Error::io("Failed to serialize credentials", e))?;

        replace_file(self.path.clone(), buffer, 0o600)
            .await
            .map_err(|e| Error::io("Failed to write credentials file", e))?;

        info!("Credentials saved to profile: {}", profile);
        Ok(())
    }

    async fn write_export_descriptor(&self, profile: &str, path: &Path) -> Result<()> {
        Self::ensure_parent(path).await?;

        replace_file(path.to_path_buf(), export_descriptor(profile).into_bytes(), 0o644)
            .await
            .map_err(|e| {
                Error::io(
                    format!("Failed to write export file {}", path.display()),
                    e,
                )
            })?;

        debug!("Export descriptor for {} written to {}", profile, path.display());
        Ok(())
    }
}

/// Shell lines selecting `profile` and clearing static keys that would shadow it
pub fn export_descriptor(profile: &str) -> String {
    let [access_key, secret_key] = STATIC_KEY_ENV_VARS;
    format!("export AWS_PROFILE={profile}\nunset {access_key}\nunset {secret_key}\n")
}

// Values are kept byte for byte, as the AWS CLI reads them.
fn literal_values() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..Default::default()
    }
}

async fn replace_file(path: PathBuf, contents: Vec<u8>, mode: u32) -> io::Result<()> {
    tokio::task::spawn_blocking(move || replace_file_sync(&path, &contents, mode))
        .await
        .map_err(io::Error::other)?
}

/// Write `contents` beside `path` and rename it into place, so readers (and a
/// crash) only ever see the old or the new file.
fn replace_file_sync(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
