//! Scripted collaborators for exercising the credential chain without AWS or a terminal.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    io,
    sync::Mutex,
};

use async_trait::async_trait;
use aws_smithy_types::DateTime;
use tokio_util::sync::CancellationToken;

use crate::{
    Error, Result,
    aws::{Credentials, SessionOptions, SessionSource, sts::IdentityProvider},
    mfa::MfaCodeSource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WhoAmI(SessionOptions),
    IssueSessionToken {
        session: SessionOptions,
        duration_seconds: i32,
        mfa_serial: Option<String>,
        mfa_code: Option<String>,
    },
    AssumeRole {
        session: SessionOptions,
        role_arn: String,
        session_name: String,
        duration_seconds: i32,
    },
}

#[derive(Default)]
struct ProviderState {
    calls: Vec<Call>,
    rejected: HashSet<String>,
    validity: HashMap<String, VecDeque<bool>>,
    issued: Vec<Credentials>,
    assumed: Vec<Credentials>,
    fail_session_token: bool,
    fail_assume_role: bool,
    cancel_after: Option<(usize, CancellationToken)>,
}

/// Identity provider that answers from a script and records every call
pub struct ScriptedProvider {
    caller_arn: String,
    state: Mutex<ProviderState>,
}

impl ScriptedProvider {
    pub fn new(caller_arn: &str) -> Self {
        Self {
            caller_arn: caller_arn.to_string(),
            state: Mutex::new(ProviderState::default()),
        }
    }

    /// Identity lookups for `profile` always fail
    pub fn reject_profile(&self, profile: &str) {
        self.state.lock().unwrap().rejected.insert(profile.to_string());
    }

    /// Successive identity lookups for `profile` succeed or fail in this order;
    /// once exhausted they succeed
    pub fn script_validity(&self, profile: &str, results: impl IntoIterator<Item = bool>) {
        self.state
            .lock()
            .unwrap()
            .validity
            .insert(profile.to_string(), results.into_iter().collect());
    }

    pub fn fail_session_token(&self) {
        self.state.lock().unwrap().fail_session_token = true;
    }

    pub fn fail_assume_role(&self) {
        self.state.lock().unwrap().fail_assume_role = true;
    }

    /// Cancel `token` once `count` roles have been assumed
    pub fn cancel_after_assume_roles(&self, count: usize, token: CancellationToken) {
        self.state.lock().unwrap().cancel_after = Some((count, token));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn issued(&self) -> Vec<Credentials> {
        self.state.lock().unwrap().issued.clone()
    }

    pub fn assumed(&self) -> Vec<Credentials> {
        self.state.lock().unwrap().assumed.clone()
    }
}

fn fake_credentials(prefix: &str, n: usize, duration_seconds: i32) -> Credentials {
    Credentials {
        access_key_id: format!("ASIA{prefix}{n}"),
        secret_access_key: format!("{prefix}-secret-{n}"),
        session_token: format!("{prefix}-token-{n}"),
        expiration: DateTime::from_secs(1_700_000_000 + i64::from(duration_seconds) * n as i64),
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn who_am_i(&self, session: &SessionOptions) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::WhoAmI(session.clone()));

        let valid = match &session.source {
            SessionSource::Profile(name) if state.rejected.contains(name) => false,
            SessionSource::Profile(name) => state
                .validity
                .get_mut(name)
                .and_then(VecDeque::pop_front)
                .unwrap_or(true),
            SessionSource::HostIdentity => true,
        };

        if valid {
            Ok(self.caller_arn.clone())
        } else {
            Err(Error::provider("GetCallerIdentity", "ExpiredToken"))
        }
    }

    async fn issue_session_token(
        &self,
        session: &SessionOptions,
        duration_seconds: i32,
        mfa_serial: Option<&str>,
        mfa_code: Option<&str>,
    ) -> Result<Credentials> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::IssueSessionToken {
            session: session.clone(),
            duration_seconds,
            mfa_serial: mfa_serial.map(str::to_string),
            mfa_code: mfa_code.map(str::to_string),
        });

        if state.fail_session_token {
            return Err(Error::provider("GetSessionToken", "AccessDenied: invalid MFA code"));
        }

        let creds = fake_credentials("SESSION", state.issued.len() + 1, duration_seconds);
        state.issued.push(creds.clone());
        Ok(creds)
    }

    async fn assume_role(
        &self,
        session: &SessionOptions,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<Credentials> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::AssumeRole {
            session: session.clone(),
            role_arn: role_arn.to_string(),
            session_name: session_name.to_string(),
            duration_seconds,
        });

        if state.fail_assume_role {
            return Err(Error::provider("AssumeRole", "AccessDenied: not authorized"));
        }

        let creds = fake_credentials("ROLE", state.assumed.len() + 1, duration_seconds);
        state.assumed.push(creds.clone());

        if let Some((count, token)) = &state.cancel_after {
            if state.assumed.len() >= *count {
                token.cancel();
            }
        }
        Ok(creds)
    }
}

/// MFA code source fed from a fixed list of answers
pub struct ScriptedCodes {
    codes: Mutex<VecDeque<String>>,
    prompted: Mutex<Vec<String>>,
    blocking: bool,
}

impl ScriptedCodes {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: Mutex::new(codes.into_iter().map(Into::into).collect()),
            prompted: Mutex::new(Vec::new()),
            blocking: false,
        }
    }

    /// A source whose operator never answers
    pub fn blocking() -> Self {
        Self {
            blocking: true,
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Device serials the operator was prompted for
    pub fn prompted(&self) -> Vec<String> {
        self.prompted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MfaCodeSource for ScriptedCodes {
    async fn read_code(&self, serial: &str) -> Result<String> {
        self.prompted.lock().unwrap().push(serial.to_string());

        if self.blocking {
            return std::future::pending().await;
        }

        self.codes.lock().unwrap().pop_front().ok_or_else(|| {
            Error::io(
                "Failed to read MFA code",
                io::Error::new(io::ErrorKind::UnexpectedEof, "no input"),
            )
        })
    }
}
