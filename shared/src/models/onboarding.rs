//! Onboarding request model and approval state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::types::Timestamp;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of an onboarding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    /// Submitted, awaiting operator approval
    Pending,
    /// Approval started, identity account not yet confirmed
    ApprovalInProgress,
    /// Identity account confirmed, tenant not yet activated
    UserCreated,
    /// Terminal: record lives in the activated-tenants collection
    Active,
    /// A step errored; may be reverted to `Pending`
    Failed,
}

impl OnboardingStatus {
    pub const ALL: [OnboardingStatus; 5] = [
        OnboardingStatus::Pending,
        OnboardingStatus::ApprovalInProgress,
        OnboardingStatus::UserCreated,
        OnboardingStatus::Active,
        OnboardingStatus::Failed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OnboardingStatus::Pending => "pending",
            OnboardingStatus::ApprovalInProgress => "approval_in_progress",
            OnboardingStatus::UserCreated => "user_created",
            OnboardingStatus::Active => "active",
            OnboardingStatus::Failed => "failed",
        }
    }

    /// Whether some transition in the table moves `self` to `next`
    pub fn can_transition_to(&self, next: OnboardingStatus) -> bool {
        Transition::ALL
            .iter()
            .any(|t| t.target() == next && t.sources().contains(self))
    }
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown onboarding status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OnboardingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OnboardingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ============================================================================
// Transitions
// ============================================================================

/// Every edge of the approval state machine
///
/// ```text
/// pending              --BeginApproval-->      approval_in_progress
/// approval_in_progress --MarkUserCreated-->    user_created
/// user_created         --CompleteApproval-->   active
/// non-terminal         --MarkApprovalFailed--> failed
/// failed | approval_in_progress | user_created --RevertToRetriable--> pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    BeginApproval,
    MarkUserCreated,
    CompleteApproval,
    MarkApprovalFailed,
    RevertToRetriable,
}

impl Transition {
    pub const ALL: [Transition; 5] = [
        Transition::BeginApproval,
        Transition::MarkUserCreated,
        Transition::CompleteApproval,
        Transition::MarkApprovalFailed,
        Transition::RevertToRetriable,
    ];

    /// Statuses this transition may start from
    pub const fn sources(&self) -> &'static [OnboardingStatus] {
        use OnboardingStatus::*;
        match self {
            Transition::BeginApproval => &[Pending],
            Transition::MarkUserCreated => &[ApprovalInProgress],
            Transition::CompleteApproval => &[UserCreated],
            Transition::MarkApprovalFailed => &[Pending, ApprovalInProgress, UserCreated, Failed],
            Transition::RevertToRetriable => &[ApprovalInProgress, UserCreated, Failed],
        }
    }

    pub const fn target(&self) -> OnboardingStatus {
        match self {
            Transition::BeginApproval => OnboardingStatus::ApprovalInProgress,
            Transition::MarkUserCreated => OnboardingStatus::UserCreated,
            Transition::CompleteApproval => OnboardingStatus::Active,
            Transition::MarkApprovalFailed => OnboardingStatus::Failed,
            Transition::RevertToRetriable => OnboardingStatus::Pending,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Transition::BeginApproval => "begin_approval",
            Transition::MarkUserCreated => "mark_user_created",
            Transition::CompleteApproval => "complete_approval",
            Transition::MarkApprovalFailed => "mark_approval_failed",
            Transition::RevertToRetriable => "revert_to_retriable",
        }
    }

    pub fn allows(&self, from: OnboardingStatus) -> bool {
        self.sources().contains(&from)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Records
// ============================================================================

/// Application submitted by a prospective tenant
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TenantApplication {
    #[serde(default)]
    #[validate(length(min = 1, message = "organization_name is required"))]
    pub organization_name: String,
    #[serde(default)]
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Tax ID, registration number, etc.
    #[serde(default)]
    pub business_identifier: Option<String>,
}

impl TenantApplication {
    /// Trim free-text fields and lower-case the email
    pub fn normalized(self) -> Self {
        fn trimmed(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            organization_name: self.organization_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            role: self.role.trim().to_string(),
            address: trimmed(self.address),
            phone_number: trimmed(self.phone_number),
            business_identifier: trimmed(self.business_identifier),
        }
    }
}

/// Stored onboarding request
///
/// The same shape is used for documents in `onboarding_requests` and for the
/// activated copy in `onboarded_tenants`. Store-internal identifiers are not
/// part of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingRequest {
    pub request_id: String,
    pub organization_name: String,
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_identifier: Option<String>,
    #[serde(default)]
    pub geo_location: String,
    #[serde(default)]
    pub entitlements: String,

    // Provisioning
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub username: String,

    // Lifecycle
    pub status: OnboardingStatus,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<Timestamp>,
}

/// Fields the identity service needs to provision the tenant's account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningFields {
    pub email: String,
    pub username: String,
    pub role: String,
    pub tenant_id: String,
    pub organization_name: String,
}

impl OnboardingRequest {
    /// Build a fresh `pending` request from a normalized application
    pub fn new_pending(
        application: TenantApplication,
        request_id: String,
        tenant_id: String,
        username: String,
        now: Timestamp,
    ) -> Self {
        Self {
            request_id,
            organization_name: application.organization_name,
            email: application.email,
            role: application.role,
            address: application.address,
            phone_number: application.phone_number,
            business_identifier: application.business_identifier,
            geo_location: String::new(),
            entitlements: String::new(),
            tenant_id,
            username,
            status: OnboardingStatus::Pending,
            created_at: now,
            approval_started_at: None,
            user_created_at: None,
            approved_at: None,
            failure_reason: None,
            retry_count: 0,
            last_retry_at: None,
        }
    }

    /// Extract provisioning fields, or the names of the empty ones
    pub fn provisioning(&self) -> Result<ProvisioningFields, Vec<&'static str>> {
        let missing: Vec<&'static str> = [
            ("email", &self.email),
            ("username", &self.username),
            ("role", &self.role),
            ("tenant_id", &self.tenant_id),
            ("organization_name", &self.organization_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(ProvisioningFields {
            email: self.email.clone(),
            username: self.username.clone(),
            role: self.role.clone(),
            tenant_id: self.tenant_id.clone(),
            organization_name: self.organization_name.clone(),
        })
    }

    /// Copy for the activated-tenants collection
    pub fn activated(&self, now: Timestamp) -> Self {
        Self {
            status: OnboardingStatus::Active,
            approved_at: Some(now),
            ..self.clone()
        }
    }
}

/// Result of a successful approval, returned to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub email: String,
    pub username: String,
    pub tenant_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: OnboardingStatus) -> OnboardingRequest {
        let application = TenantApplication {
            organization_name: "Acme".into(),
            email: "a@acme.com".into(),
            role: "admin".into(),
            ..Default::default()
        };
        let mut req = OnboardingRequest::new_pending(
            application,
            "R1".into(),
            "T1".into(),
            "U1".into(),
            1_000,
        );
        req.status = status;
        req
    }

    #[test]
    fn test_status_serde_is_snake_case() {
        let json = serde_json::to_string(&OnboardingStatus::ApprovalInProgress).unwrap();
        assert_eq!(json, "\"approval_in_progress\"");
        let status: OnboardingStatus = serde_json::from_str("\"user_created\"").unwrap();
        assert_eq!(status, OnboardingStatus::UserCreated);
    }

    #[test]
    fn test_status_from_str() {
        for status in OnboardingStatus::ALL {
            assert_eq!(status.as_str().parse::<OnboardingStatus>(), Ok(status));
        }
        assert!("approved".parse::<OnboardingStatus>().is_err());
    }

    #[test]
    fn test_forward_edges_are_allowed() {
        use OnboardingStatus::*;
        assert!(Pending.can_transition_to(ApprovalInProgress));
        assert!(ApprovalInProgress.can_transition_to(UserCreated));
        assert!(UserCreated.can_transition_to(Active));
        for from in [Pending, ApprovalInProgress, UserCreated, Failed] {
            assert!(from.can_transition_to(Failed), "{from} -> failed");
        }
        for from in [ApprovalInProgress, UserCreated, Failed] {
            assert!(from.can_transition_to(Pending), "{from} -> pending");
        }
    }

    #[test]
    fn test_edges_outside_the_table_are_rejected() {
        use OnboardingStatus::*;
        assert!(!Pending.can_transition_to(UserCreated));
        assert!(!Pending.can_transition_to(Active));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!ApprovalInProgress.can_transition_to(Active));
        assert!(!Failed.can_transition_to(ApprovalInProgress));
        assert!(!Failed.can_transition_to(UserCreated));
        for to in OnboardingStatus::ALL {
            assert!(!Active.can_transition_to(to), "active -> {to}");
        }
    }

    #[test]
    fn test_transition_targets_match_sources() {
        for transition in Transition::ALL {
            assert!(!transition.sources().is_empty());
            assert!(!transition.sources().contains(&OnboardingStatus::Active));
        }
        assert!(Transition::BeginApproval.allows(OnboardingStatus::Pending));
        assert!(!Transition::BeginApproval.allows(OnboardingStatus::Failed));
    }

    #[test]
    fn test_application_normalized() {
        let app = TenantApplication {
            organization_name: "  Acme Corp ".into(),
            email: " A@Acme.COM ".into(),
            role: " admin".into(),
            address: Some("   ".into()),
            phone_number: Some(" 555 ".into()),
            business_identifier: None,
        }
        .normalized();

        assert_eq!(app.organization_name, "Acme Corp");
        assert_eq!(app.email, "a@acme.com");
        assert_eq!(app.role, "admin");
        assert_eq!(app.address, None);
        assert_eq!(app.phone_number.as_deref(), Some("555"));
    }

    #[test]
    fn test_application_validation() {
        let ok = TenantApplication {
            organization_name: "Acme".into(),
            email: "a@acme.com".into(),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let no_org = TenantApplication {
            email: "a@acme.com".into(),
            ..Default::default()
        };
        assert!(no_org.validate().is_err());

        let no_email = TenantApplication {
            organization_name: "Acme".into(),
            ..Default::default()
        };
        assert!(no_email.validate().is_err());
    }

    #[test]
    fn test_provisioning_reports_missing_fields() {
        let mut req = sample(OnboardingStatus::ApprovalInProgress);
        assert!(req.provisioning().is_ok());

        req.role.clear();
        req.username = "  ".into();
        let missing = req.provisioning().unwrap_err();
        assert_eq!(missing, vec!["username", "role"]);
    }

    #[test]
    fn test_activated_copy() {
        let req = sample(OnboardingStatus::UserCreated);
        let active = req.activated(5_000);
        assert_eq!(active.status, OnboardingStatus::Active);
        assert_eq!(active.approved_at, Some(5_000));
        assert_eq!(active.request_id, req.request_id);
        assert_eq!(active.email, req.email);
    }

    #[test]
    fn test_record_skips_empty_optionals() {
        let req = sample(OnboardingStatus::Pending);
        let value = serde_json::to_value(&req).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map["status"], "pending");
        assert_eq!(map["retry_count"], 0);
        assert!(!map.contains_key("approval_started_at"));
        assert!(!map.contains_key("failure_reason"));

        let back: OnboardingRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, req);
    }
}
