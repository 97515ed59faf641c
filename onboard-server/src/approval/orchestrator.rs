//! Approval saga
//!
//! ```text
//! begin_approval -> check provisioning fields -> identity.register
//!     -> mark_user_created -> complete_approval
//! ```
//!
//! Failures before the identity account exists record `failed` on the
//! request. Store failures after it exists are reported as
//! [`ApprovalError::Incomplete`]; the recovery scanner finishes the request.
//! An identity "already exists" only counts as registered once the service
//! confirms an account under the request's own username.

use std::fmt;
use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::{ApprovalOutcome, OnboardingRequest, OnboardingStatus};
use thiserror::Error;

use crate::identity::{IdentityClient, IdentityError};
use crate::onboarding::{OnboardingError, OnboardingService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Identity,
    Store,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Identity => f.write_str("identity service"),
            Dependency::Store => f.write_str("document store"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No pending request with this id; `current` is its status if it exists
    #[error("No pending onboarding request {request_id}")]
    NotFound {
        request_id: String,
        current: Option<OnboardingStatus>,
    },

    #[error("Request {request_id} is missing provisioning fields: {}", missing.join(", "))]
    ValidationFailed {
        request_id: String,
        missing: Vec<&'static str>,
    },

    #[error("{dependency} failed for request {request_id}: {reason}")]
    DependencyFailed {
        request_id: String,
        dependency: Dependency,
        reason: String,
    },

    /// Identity account exists; activation will be completed by recovery
    #[error("Account created for request {request_id}, activation pending: {reason}")]
    Incomplete {
        request_id: String,
        outcome: ApprovalOutcome,
        reason: String,
    },
}

impl From<ApprovalError> for AppError {
    fn from(err: ApprovalError) -> Self {
        let message = err.to_string();
        match err {
            ApprovalError::NotFound {
                request_id,
                current,
            } => {
                let app = AppError::with_message(ErrorCode::OnboardingRequestNotFound, message)
                    .with_detail("request_id", request_id);
                match current {
                    Some(status) => app.with_detail("status", status.as_str()),
                    None => app,
                }
            }
            ApprovalError::ValidationFailed {
                request_id,
                missing,
            } => AppError::with_message(ErrorCode::ProvisioningFieldsMissing, message)
                .with_detail("request_id", request_id)
                .with_detail("missing", missing),
            ApprovalError::DependencyFailed {
                request_id,
                dependency,
                ..
            } => {
                let code = match dependency {
                    Dependency::Identity => ErrorCode::IdentityServiceError,
                    Dependency::Store => ErrorCode::DatabaseError,
                };
                AppError::with_message(code, message).with_detail("request_id", request_id)
            }
            ApprovalError::Incomplete {
                request_id,
                outcome,
                ..
            } => AppError::new(ErrorCode::ApprovalIncomplete)
                .with_detail("request_id", request_id)
                .with_detail("email", outcome.email)
                .with_detail("username", outcome.username)
                .with_detail("tenant_id", outcome.tenant_id),
        }
    }
}

pub struct ApprovalOrchestrator {
    service: OnboardingService,
    identity: Arc<dyn IdentityClient>,
}

impl ApprovalOrchestrator {
    pub fn new(service: OnboardingService, identity: Arc<dyn IdentityClient>) -> Self {
        Self { service, identity }
    }

    /// Run the approval saga for one request
    pub async fn approve_onboarding(
        &self,
        request_id: &str,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let request = self
            .service
            .begin_approval(request_id)
            .await
            .map_err(|e| begin_error(request_id, e))?;

        let fields = match request.provisioning() {
            Ok(fields) => fields,
            Err(missing) => {
                let reason = format!("missing provisioning fields: {}", missing.join(", "));
                self.record_failure(request_id, &reason).await;
                return Err(ApprovalError::ValidationFailed {
                    request_id: request_id.to_string(),
                    missing,
                });
            }
        };

        match self.identity.register(&fields).await {
            Ok(account_id) => {
                tracing::info!(
                    request_id = %request_id,
                    username = %fields.username,
                    account_id = %account_id,
                    "Identity account registered"
                );
            }
            // Only our own account counts: a previous attempt may have
            // registered it before losing the response
            Err(IdentityError::AlreadyExists(conflict)) => {
                match self
                    .identity
                    .account_exists(&fields.username, &fields.email)
                    .await
                {
                    Ok(true) => {
                        tracing::info!(
                            request_id = %request_id,
                            username = %fields.username,
                            "Identity account already registered, continuing"
                        );
                    }
                    Ok(false) => {
                        let reason = format!(
                            "identity service reports a conflicting account ({conflict}) but none exists for {}",
                            fields.username
                        );
                        self.record_failure(request_id, &reason).await;
                        return Err(ApprovalError::DependencyFailed {
                            request_id: request_id.to_string(),
                            dependency: Dependency::Identity,
                            reason,
                        });
                    }
                    Err(e) => {
                        let reason = format!("account conflict could not be verified: {e}");
                        self.record_failure(request_id, &reason).await;
                        return Err(ApprovalError::DependencyFailed {
                            request_id: request_id.to_string(),
                            dependency: Dependency::Identity,
                            reason,
                        });
                    }
                }
            }
            Err(e) => {
                let reason = e.to_string();
                self.record_failure(request_id, &reason).await;
                return Err(ApprovalError::DependencyFailed {
                    request_id: request_id.to_string(),
                    dependency: Dependency::Identity,
                    reason,
                });
            }
        }

        let outcome = outcome_of(&request);

        match self.service.mark_user_created(request_id).await {
            Ok(()) => {}
            Err(OnboardingError::InvalidTransition {
                current: OnboardingStatus::UserCreated,
                ..
            }) => {
                tracing::debug!(request_id = %request_id, "Already marked user_created");
            }
            Err(OnboardingError::InvalidTransition {
                current: OnboardingStatus::Active,
                ..
            }) => return Ok(outcome),
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "Account created but status not advanced"
                );
                return Err(after_registration(request_id, outcome, e));
            }
        }

        match self.service.complete_approval(request_id).await {
            Ok(_) => {}
            Err(OnboardingError::InvalidTransition {
                current: OnboardingStatus::Active,
                ..
            }) => {}
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "Account created but tenant not activated"
                );
                return Err(after_registration(request_id, outcome, e));
            }
        }

        tracing::info!(
            request_id = %request_id,
            tenant_id = %outcome.tenant_id,
            username = %outcome.username,
            "Onboarding approved"
        );
        Ok(outcome)
    }

    /// Failing to record a failure is logged and otherwise ignored
    async fn record_failure(&self, request_id: &str, reason: &str) {
        if let Err(e) = self.service.mark_approval_failed(request_id, reason).await {
            tracing::error!(
                request_id = %request_id,
                reason = %reason,
                error = %e,
                "Failed to record approval failure"
            );
        }
    }
}

fn begin_error(request_id: &str, err: OnboardingError) -> ApprovalError {
    match err {
        OnboardingError::InvalidTransition { current, .. } => ApprovalError::NotFound {
            request_id: request_id.to_string(),
            current: Some(current),
        },
        OnboardingError::NotFound(_) => ApprovalError::NotFound {
            request_id: request_id.to_string(),
            current: None,
        },
        other => ApprovalError::DependencyFailed {
            request_id: request_id.to_string(),
            dependency: Dependency::Store,
            reason: other.to_string(),
        },
    }
}

fn outcome_of(request: &OnboardingRequest) -> ApprovalOutcome {
    ApprovalOutcome {
        email: request.email.clone(),
        username: request.username.clone(),
        tenant_id: request.tenant_id.clone(),
    }
}

/// Classify a failure once the identity account exists
///
/// A store error leaves the request in `approval_in_progress` or
/// `user_created`, which the recovery scanner finishes. A request moved
/// elsewhere by someone else (operator retry, stalled-approval revert) is not
/// revisited by the scanner, so the caller has to approve it again.
fn after_registration(
    request_id: &str,
    outcome: ApprovalOutcome,
    err: OnboardingError,
) -> ApprovalError {
    if err.is_lost_race() {
        return ApprovalError::DependencyFailed {
            request_id: request_id.to_string(),
            dependency: Dependency::Store,
            reason: format!("{err}; approve the request again to finish onboarding"),
        };
    }
    ApprovalError::Incomplete {
        request_id: request_id.to_string(),
        outcome,
        reason: err.to_string(),
    }
}
