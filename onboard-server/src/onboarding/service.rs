//! Onboarding service
//!
//! Owns the request lifecycle. Every status change is a conditional update
//! keyed on the expected prior status, so concurrent callers (operator,
//! retry, recovery scanner) see exactly one winner per transition; losers get
//! [`OnboardingError::InvalidTransition`] or [`OnboardingError::NotFound`].

use std::sync::Arc;

use shared::types::Timestamp;
use shared::util::{now_millis, random_id};
use shared::{OnboardingRequest, OnboardingStatus, TenantApplication, Transition};
use validator::Validate;

use super::error::{OnboardingError, OnboardingResult};
use crate::store::{
    Collection, Document, DocumentStore, Filter, StoreError, Update, from_document, to_document,
};

const REQUEST_ID_LEN: usize = 20;
const TENANT_ID_LEN: usize = 10;
const USERNAME_LEN: usize = 10;

// Document fields
const REQUEST_ID: &str = "request_id";
const EMAIL: &str = "email";
const STATUS: &str = "status";
const CREATED_AT: &str = "created_at";
const APPROVAL_STARTED_AT: &str = "approval_started_at";
const USER_CREATED_AT: &str = "user_created_at";
const FAILURE_REASON: &str = "failure_reason";
const RETRY_COUNT: &str = "retry_count";
const LAST_RETRY_AT: &str = "last_retry_at";

#[derive(Clone)]
pub struct OnboardingService {
    store: Arc<dyn DocumentStore>,
}

impl OnboardingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Submission and queries
    // ========================================================================

    /// Persist a new `pending` request, returning its `request_id`
    pub async fn onboard_tenant(&self, application: TenantApplication) -> OnboardingResult<String> {
        let application = application.normalized();
        application.validate()?;

        let by_email = Filter::new().eq(EMAIL, application.email.as_str());
        for collection in Collection::ALL {
            if self.store.read(collection, &by_email).await?.is_some() {
                return Err(OnboardingError::EmailTaken {
                    email: application.email,
                });
            }
        }

        let request = OnboardingRequest::new_pending(
            application,
            random_id(REQUEST_ID_LEN),
            random_id(TENANT_ID_LEN),
            random_id(USERNAME_LEN),
            now_millis(),
        );

        match self
            .store
            .create(Collection::OnboardingRequests, to_document(&request)?)
            .await
        {
            Ok(_) => {}
            // Lost a race with a concurrent submission past the pre-check
            Err(StoreError::Duplicate { field, .. }) if field == EMAIL => {
                return Err(OnboardingError::EmailTaken {
                    email: request.email,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            request_id = %request.request_id,
            email = %request.email,
            organization = %request.organization_name,
            "Onboarding request submitted"
        );
        Ok(request.request_id)
    }

    /// List requests in `status` (default `pending`); `active` lists the
    /// activated-tenants collection
    pub async fn get_tenants(
        &self,
        status: Option<OnboardingStatus>,
    ) -> OnboardingResult<Vec<OnboardingRequest>> {
        let status = status.unwrap_or(OnboardingStatus::Pending);
        let collection = match status {
            OnboardingStatus::Active => Collection::OnboardedTenants,
            _ => Collection::OnboardingRequests,
        };
        let filter = Filter::new().eq(STATUS, status.as_str());
        let documents = self.store.read_all(collection, &filter).await?;
        Ok(decode_all(documents))
    }

    /// Fetch one request, whether in flight or activated
    pub async fn get_tenant_by_id(&self, request_id: &str) -> OnboardingResult<OnboardingRequest> {
        self.find_request(request_id)
            .await?
            .ok_or_else(|| OnboardingError::NotFound(request_id.to_string()))
    }

    /// Requests in `status` whose status timestamp is older than `cutoff`
    ///
    /// `approval_in_progress` is aged by `approval_started_at`,
    /// `user_created` by `user_created_at`, anything else by `created_at`.
    pub async fn find_stuck(
        &self,
        status: OnboardingStatus,
        cutoff: Timestamp,
    ) -> OnboardingResult<Vec<OnboardingRequest>> {
        let since = match status {
            OnboardingStatus::ApprovalInProgress => APPROVAL_STARTED_AT,
            OnboardingStatus::UserCreated => USER_CREATED_AT,
            _ => CREATED_AT,
        };
        let filter = Filter::new()
            .eq(STATUS, status.as_str())
            .lt(since, cutoff);
        let documents = self
            .store
            .read_all(Collection::OnboardingRequests, &filter)
            .await?;
        Ok(decode_all(documents))
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// `pending -> approval_in_progress`; returns the updated request so the
    /// caller can extract provisioning fields
    pub async fn begin_approval(&self, request_id: &str) -> OnboardingResult<OnboardingRequest> {
        let now = now_millis();
        self.apply(
            request_id,
            Transition::BeginApproval,
            Filter::new(),
            Update::new().set(APPROVAL_STARTED_AT, now),
        )
        .await?;

        self.read_in_flight(request_id)
            .await?
            .ok_or_else(|| OnboardingError::NotFound(request_id.to_string()))
    }

    /// `approval_in_progress -> user_created`
    pub async fn mark_user_created(&self, request_id: &str) -> OnboardingResult<()> {
        self.apply(
            request_id,
            Transition::MarkUserCreated,
            Filter::new(),
            Update::new().set(USER_CREATED_AT, now_millis()),
        )
        .await
    }

    /// `user_created -> active`
    ///
    /// Inserts the activated copy, then deletes the request document. If an
    /// activated copy already exists (an earlier attempt crashed between the
    /// two writes) the insert is skipped. A failed delete is logged and left
    /// to the recovery scanner.
    pub async fn complete_approval(&self, request_id: &str) -> OnboardingResult<OnboardingRequest> {
        let transition = Transition::CompleteApproval;
        let in_status = self.transition_filter(request_id, transition);

        let Some(document) = self
            .store
            .read(Collection::OnboardingRequests, &in_status)
            .await?
        else {
            return Err(self.zero_match(request_id, transition).await);
        };
        let request: OnboardingRequest = from_document(document)?;

        let by_id = Filter::new().eq(REQUEST_ID, request_id);
        let activated = match self.store.read(Collection::OnboardedTenants, &by_id).await? {
            Some(existing) => {
                tracing::warn!(
                    request_id = %request_id,
                    "Activated record already present, removing leftover request"
                );
                from_document(existing)?
            }
            None => {
                let activated = request.activated(now_millis());
                match self
                    .store
                    .create(Collection::OnboardedTenants, to_document(&activated)?)
                    .await
                {
                    Ok(_) => activated,
                    Err(StoreError::Duplicate { .. }) => {
                        tracing::debug!(request_id = %request_id, "Concurrent activation inserted first");
                        activated
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        match self
            .store
            .delete(Collection::OnboardingRequests, &in_status)
            .await
        {
            Ok(0) => {
                tracing::debug!(request_id = %request_id, "Request document already removed");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "Tenant activated but request document not deleted"
                );
            }
        }

        tracing::info!(
            request_id = %request_id,
            tenant_id = %activated.tenant_id,
            email = %activated.email,
            from = %OnboardingStatus::UserCreated,
            to = %OnboardingStatus::Active,
            "Tenant activated"
        );
        Ok(activated)
    }

    /// Record a failed step: `status = failed`, `failure_reason`, `retry_count + 1`
    ///
    /// Matches by `request_id` alone so a failure is always recorded.
    pub async fn mark_approval_failed(&self, request_id: &str, reason: &str) -> OnboardingResult<()> {
        let filter = Filter::new().eq(REQUEST_ID, request_id);
        let update = Update::new()
            .set(STATUS, Transition::MarkApprovalFailed.target().as_str())
            .set(FAILURE_REASON, reason)
            .inc(RETRY_COUNT, 1);

        let modified = self
            .store
            .update_one(Collection::OnboardingRequests, &filter, &update)
            .await?;
        if modified == 0 {
            return Err(OnboardingError::NotFound(request_id.to_string()));
        }

        tracing::warn!(request_id = %request_id, reason = %reason, "Approval marked failed");
        Ok(())
    }

    /// `failed | approval_in_progress | user_created -> pending`
    pub async fn revert_to_retriable(&self, request_id: &str) -> OnboardingResult<()> {
        self.apply(
            request_id,
            Transition::RevertToRetriable,
            Filter::new(),
            revert_update(),
        )
        .await
    }

    /// Revert an approval that stalled before the identity account existed
    ///
    /// Only matches while the request is still `approval_in_progress` with the
    /// same `approval_started_at`, so a newer attempt is never reverted.
    pub async fn revert_stalled_approval(
        &self,
        request_id: &str,
        approval_started_at: Timestamp,
    ) -> OnboardingResult<()> {
        let filter = Filter::new()
            .eq(STATUS, OnboardingStatus::ApprovalInProgress.as_str())
            .eq(APPROVAL_STARTED_AT, approval_started_at);
        self.apply(request_id, Transition::RevertToRetriable, filter, revert_update())
            .await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn transition_filter(&self, request_id: &str, transition: Transition) -> Filter {
        Filter::new().eq(REQUEST_ID, request_id).any_of(
            STATUS,
            transition.sources().iter().map(|status| status.as_str()),
        )
    }

    /// Conditional update along one edge of the transition table
    async fn apply(
        &self,
        request_id: &str,
        transition: Transition,
        extra: Filter,
        update: Update,
    ) -> OnboardingResult<()> {
        let mut filter = self.transition_filter(request_id, transition);
        for clause in extra.clauses() {
            filter = filter.with(clause.clone());
        }
        let update = update.set(STATUS, transition.target().as_str());

        let modified = self
            .store
            .update_one(Collection::OnboardingRequests, &filter, &update)
            .await?;
        if modified == 0 {
            return Err(self.zero_match(request_id, transition).await);
        }

        tracing::info!(
            request_id = %request_id,
            transition = %transition,
            to = %transition.target(),
            "Onboarding status changed"
        );
        Ok(())
    }

    /// Explain why a conditional update matched nothing
    async fn zero_match(&self, request_id: &str, transition: Transition) -> OnboardingError {
        match self.find_request(request_id).await {
            Ok(Some(current)) => OnboardingError::InvalidTransition {
                request_id: request_id.to_string(),
                transition,
                current: current.status,
            },
            Ok(None) => OnboardingError::NotFound(request_id.to_string()),
            Err(e) => e,
        }
    }

    async fn read_in_flight(&self, request_id: &str) -> OnboardingResult<Option<OnboardingRequest>> {
        let filter = Filter::new().eq(REQUEST_ID, request_id);
        match self
            .store
            .read(Collection::OnboardingRequests, &filter)
            .await?
        {
            Some(document) if !is_placeholder(&document) => Ok(Some(from_document(document)?)),
            _ => Ok(None),
        }
    }

    /// Request document first, then the activated copy
    async fn find_request(&self, request_id: &str) -> OnboardingResult<Option<OnboardingRequest>> {
        if let Some(request) = self.read_in_flight(request_id).await? {
            return Ok(Some(request));
        }
        let filter = Filter::new().eq(REQUEST_ID, request_id);
        match self
            .store
            .read(Collection::OnboardedTenants, &filter)
            .await?
        {
            Some(document) if !is_placeholder(&document) => Ok(Some(from_document(document)?)),
            _ => Ok(None),
        }
    }
}

fn revert_update() -> Update {
    Update::new()
        .set(LAST_RETRY_AT, now_millis())
        .unset(APPROVAL_STARTED_AT)
        .unset(USER_CREATED_AT)
}

/// Empty document or one missing its identifying fields
fn is_placeholder(document: &Document) -> bool {
    [REQUEST_ID, EMAIL].iter().any(|field| {
        document
            .get(*field)
            .and_then(|value| value.as_str())
            .is_none_or(|value| value.trim().is_empty())
    })
}

fn decode_all(documents: Vec<Document>) -> Vec<OnboardingRequest> {
    documents
        .into_iter()
        .filter(|document| !is_placeholder(document))
        .filter_map(|document| match from_document::<OnboardingRequest>(document) {
            Ok(request) => Some(request),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed onboarding document");
                None
            }
        })
        .collect()
}
