use std::fmt;

use aws_smithy_types::{DateTime, date_time::Format};

pub mod credentials;
pub mod sts;
pub mod validator;

/// AWS temporary credentials structure
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime,
}

impl Credentials {
    /// Expiration as RFC 3339, the format used in the credentials file
    pub fn expiration_string(&self) -> String {
        self.expiration
            .fmt(Format::DateTime)
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

// Keep secrets out of logs and panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiration", &self.expiration_string())
            .finish()
    }
}

/// Where a session takes its credentials from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    /// A named profile in the shared credentials/config files
    Profile(String),
    /// Container or instance metadata credentials
    HostIdentity,
}

/// Parameters for establishing a session against the identity provider.
/// Built fresh for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub region: String,
    pub source: SessionSource,
}

impl SessionOptions {
    pub fn profile(profile: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            source: SessionSource::Profile(profile.into()),
        }
    }

    pub fn host_identity(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            source: SessionSource::HostIdentity,
        }
    }
}

impl fmt::Display for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            SessionSource::Profile(name) => write!(f, "profile {name} ({})", self.region),
            SessionSource::HostIdentity => write!(f, "host identity ({})", self.region),
        }
    }
}
