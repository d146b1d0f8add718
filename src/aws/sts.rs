use async_trait::async_trait;
use aws_config::{
    BehaviorVersion, Region, SdkConfig, ecs::EcsCredentialsProvider,
    imds::credentials::ImdsCredentialsProvider, meta::credentials::CredentialsProviderChain,
    profile::ProfileFileCredentialsProvider,
};
use aws_sdk_sts::{Client as StsClient, types::Credentials as StsCredentials};
use aws_smithy_types::error::display::DisplayErrorContext;
use tracing::{debug, info};

use super::{Credentials, SessionOptions, SessionSource};
use crate::{Error, Result, constants::MAX_ROLE_SESSION_NAME_LEN};

/// The three identity provider operations the credential chain needs
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Caller identity ARN of the session
    async fn who_am_i(&self, session: &SessionOptions) -> Result<String>;

    /// MFA-verified session token; `mfa_code` is required when `mfa_serial` is set
    async fn issue_session_token(
        &self,
        session: &SessionOptions,
        duration_seconds: i32,
        mfa_serial: Option<&str>,
        mfa_code: Option<&str>,
    ) -> Result<Credentials>;

    async fn assume_role(
        &self,
        session: &SessionOptions,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<Credentials>;
}

/// AWS STS backed provider
#[derive(Debug, Default, Clone)]
pub struct StsIdentityProvider;

impl StsIdentityProvider {
    pub fn new() -> Self {
        Self
    }

    async fn client(&self, session: &SessionOptions) -> StsClient {
        debug!("Loading AWS config for {}", session);

        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(session.region.clone()));

        // Pin the credential source so static keys in the environment never
        // shadow the profile we just wrote.
        let config: SdkConfig = match &session.source {
            SessionSource::Profile(name) => {
                loader
                    .credentials_provider(
                        ProfileFileCredentialsProvider::builder()
                            .profile_name(name)
                            .build(),
                    )
                    .load()
                    .await
            }
            SessionSource::HostIdentity => {
                let chain = CredentialsProviderChain::first_try(
                    "EcsContainer",
                    EcsCredentialsProvider::builder().build(),
                )
                .or_else(
                    "Ec2InstanceMetadata",
                    ImdsCredentialsProvider::builder().build(),
                );
                loader.credentials_provider(chain).load().await
            }
        };

        StsClient::new(&config)
    }
}

#[async_trait]
impl IdentityProvider for StsIdentityProvider {
    async fn who_am_i(&self, session: &SessionOptions) -> Result<String> {
        let client = self.client(session).await;

        let response = client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| Error::provider("GetCallerIdentity", DisplayErrorContext(&e).to_string()))?;

        let arn = response
            .arn()
            .ok_or_else(|| Error::provider("GetCallerIdentity", "AWS STS returned no ARN"))?;

        debug!("Caller identity: {}", arn);
        Ok(arn.to_string())
    }

    async fn issue_session_token(
        &self,
        session: &SessionOptions,
        duration_seconds: i32,
        mfa_serial: Option<&str>,
        mfa_code: Option<&str>,
    ) -> Result<Credentials> {
        info!("Calling AWS STS GetSessionToken");
        debug!("Session: {}", session);
        debug!("MFA device: {:?}", mfa_serial);
        debug!("Duration: {} seconds", duration_seconds);

        let client = self.client(session).await;

        let response = client
            .get_session_token()
            .duration_seconds(duration_seconds)
            .set_serial_number(mfa_serial.map(str::to_string))
            .set_token_code(mfa_code.map(str::to_string))
            .send()
            .await
            .map_err(|e| Error::provider("GetSessionToken", DisplayErrorContext(&e).to_string()))?;

        let sts_creds = response
            .credentials()
            .ok_or_else(|| Error::provider("GetSessionToken", "AWS STS returned no credentials"))?;

        info!("Obtained session token");
        Ok(from_sts(sts_creds))
    }

    async fn assume_role(
        &self,
        session: &SessionOptions,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<Credentials> {
        info!("Calling AWS STS AssumeRole");
        debug!("Session: {}", session);
        debug!("Role ARN: {}", role_arn);
        debug!("Role session name: {}", session_name);
        debug!("Duration: {} seconds", duration_seconds);

        let client = self.client(session).await;

        let response = client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(|e| Error::provider("AssumeRole", DisplayErrorContext(&e).to_string()))?;

        let sts_creds = response
            .credentials()
            .ok_or_else(|| Error::provider("AssumeRole", "AWS STS returned no credentials"))?;

        info!("Assumed role {}", role_arn);
        Ok(from_sts(sts_creds))
    }
}

fn from_sts(sts_creds: &StsCredentials) -> Credentials {
    Credentials {
        access_key_id: sts_creds.access_key_id().to_string(),
        secret_access_key: sts_creds.secret_access_key().to_string(),
        session_token: sts_creds.session_token().to_string(),
        expiration: *sts_creds.expiration(),
    }
}

/// Role session name from the tail of a caller identity ARN.
///
/// `arn:aws:iam::123:user/alice` becomes `alice`. Characters AssumeRole
/// rejects are replaced with `-` and the result is capped at 64 characters.
pub fn session_name_from_arn(arn: &str) -> String {
    let tail = arn.rsplit('/').next().unwrap_or(arn);

    tail.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "+=,.@_-".contains(c) {
                c
            } else {
                '-'
            }
        })
        .take(MAX_ROLE_SESSION_NAME_LEN)
        .collect()
}
