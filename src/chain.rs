//! The credential renewal state machine.
//!
//! One iteration walks `IntermediateCheck -> IntermediateRenew -> AssumeTarget
//! -> ExportMaybe -> Done`, skipping the intermediate states when no MFA device
//! is configured. [`CredentialChain::run`] repeats iterations while renewal is
//! enabled, sleeping half the target session's lifetime in between.

use aws_smithy_types::DateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    Result,
    aws::{
        credentials::CredentialSink,
        sts::{IdentityProvider, session_name_from_arn},
        validator,
    },
    config::{MfaHop, Settings},
    mfa::{self, MfaCodeSource},
    scheduler::{self, NextAction},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    IntermediateCheck,
    IntermediateRenew,
    AssumeTarget,
    ExportMaybe,
    Done,
}

/// What happened to the MFA session token during an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntermediateStatus {
    Skipped,
    StillValid,
    Renewed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub intermediate: IntermediateStatus,
    pub target_expiration: Option<DateTime>,
    pub exported: bool,
}

/// How the renewal loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Renewal disabled; a single pass completed
    Finished,
    /// Shutdown was requested between iterations
    Interrupted,
}

pub struct CredentialChain<'a> {
    settings: &'a Settings,
    provider: &'a dyn IdentityProvider,
    codes: &'a dyn MfaCodeSource,
    sink: &'a dyn CredentialSink,
    shutdown: CancellationToken,
}

impl<'a> CredentialChain<'a> {
    pub fn new(
        settings: &'a Settings,
        provider: &'a dyn IdentityProvider,
        codes: &'a dyn MfaCodeSource,
        sink: &'a dyn CredentialSink,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            settings,
            provider,
            codes,
            sink,
            shutdown,
        }
    }

    fn entry_state(&self) -> ChainState {
        if self.settings.mfa.is_some() {
            ChainState::IntermediateCheck
        } else {
            ChainState::AssumeTarget
        }
    }

    /// Run iterations until renewal is disabled or shutdown is requested.
    /// The first error ends the loop; whatever was already written stays.
    pub async fn run(&self) -> Result<Completion> {
        loop {
            let report = self.run_once().await?;
            debug!(?report, "Credential chain iteration complete");

            match scheduler::next_action(self.settings.renew, self.settings.target_duration) {
                NextAction::Terminate => return Ok(Completion::Finished),
                NextAction::Repeat(_) if self.shutdown.is_cancelled() => {
                    return Ok(Completion::Interrupted);
                }
                NextAction::Repeat(seconds) => {
                    if !scheduler::wait(seconds, &self.shutdown).await {
                        return Ok(Completion::Interrupted);
                    }
                }
            }
        }
    }

    /// One pass through the chain
    pub async fn run_once(&self) -> Result<IterationReport> {
        let mut report = IterationReport {
            intermediate: IntermediateStatus::Skipped,
            target_expiration: None,
            exported: false,
        };

        let mut state = self.entry_state();
        while state != ChainState::Done {
            debug!(?state, "Credential chain step");

            state = match (state, self.settings.mfa.as_ref()) {
                (ChainState::IntermediateCheck, Some(hop)) => {
                    if self.intermediate_is_valid().await {
                        println!(
                            "Session token for profile {} is still valid",
                            hop.intermediate_profile
                        );
                        report.intermediate = IntermediateStatus::StillValid;
                        ChainState::AssumeTarget
                    } else {
                        ChainState::IntermediateRenew
                    }
                }
                (ChainState::IntermediateRenew, Some(hop)) => {
                    self.renew_intermediate(hop).await?;
                    report.intermediate = IntermediateStatus::Renewed;
                    ChainState::AssumeTarget
                }
                (ChainState::IntermediateCheck | ChainState::IntermediateRenew, None) => {
                    ChainState::AssumeTarget
                }
                (ChainState::AssumeTarget, _) => {
                    report.target_expiration = Some(self.assume_target().await?);
                    ChainState::ExportMaybe
                }
                (ChainState::ExportMaybe, _) => {
                    report.exported = self.export().await?;
                    ChainState::Done
                }
                (ChainState::Done, _) => ChainState::Done,
            };
        }

        Ok(report)
    }

    async fn intermediate_is_valid(&self) -> bool {
        match self.settings.intermediate_session() {
            Some(session) => validator::is_valid(self.provider, &session).await,
            None => false,
        }
    }

    async fn renew_intermediate(&self, hop: &MfaHop) -> Result<()> {
        info!(
            "Renewing session token for profile {}",
            hop.intermediate_profile
        );

        let code = mfa::obtain_code(self.codes, Some(hop.serial.as_str()), &self.shutdown).await?;

        // Session tokens are always issued from the long-term keys.
        let creds = self
            .provider
            .issue_session_token(
                &self.settings.base_session(),
                hop.duration_seconds,
                Some(hop.serial.as_str()),
                code.as_deref(),
            )
            .await?;

        self.sink
            .write_profile(&hop.intermediate_profile, &creds, &self.settings.region)
            .await?;

        println!(
            "Session token saved to profile {} (expires {})",
            hop.intermediate_profile,
            creds.expiration_string()
        );
        Ok(())
    }

    async fn assume_target(&self) -> Result<DateTime> {
        let session = self.settings.assume_role_session();

        let caller = self.provider.who_am_i(&session).await?;
        let session_name = session_name_from_arn(&caller);

        let creds = self
            .provider
            .assume_role(
                &session,
                &self.settings.role_arn,
                &session_name,
                self.settings.target_duration,
            )
            .await?;

        self.sink
            .write_profile(&self.settings.target_profile, &creds, &session.region)
            .await?;

        println!(
            "Credentials for {} saved to profile {} (expires {})",
            self.settings.role_arn,
            self.settings.target_profile,
            creds.expiration_string()
        );
        Ok(creds.expiration)
    }

    async fn export(&self) -> Result<bool> {
        let Some(path) = &self.settings.export_file else {
            return Ok(false);
        };

        self.sink
            .write_export_descriptor(&self.settings.target_profile, path)
            .await?;

        info!("Exported profile {} to {}", self.settings.target_profile, path.display());
        Ok(true)
    }
}
