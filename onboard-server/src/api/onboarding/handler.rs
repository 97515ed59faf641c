//! Onboarding API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::error::{ApiResponse, AppError, AppResult};
use shared::{ApprovalOutcome, OnboardingRequest, OnboardingStatus, TenantApplication};

use crate::core::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Status name; `active` lists activated tenants
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub request_id: String,
}

/// POST /api/onboarding - submit an application
pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<TenantApplication>,
) -> AppResult<Json<ApiResponse<SubmitResponse>>> {
    let request_id = state.onboarding.onboard_tenant(payload).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Onboarding request submitted",
        SubmitResponse { request_id },
    )))
}

/// GET /api/onboarding?state= - list requests by status
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<OnboardingRequest>>>> {
    let status = query
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<OnboardingStatus>)
        .transpose()
        .map_err(|e| AppError::invalid_request(e.to_string()))?;

    let requests = state.onboarding.get_tenants(status).await?;
    Ok(Json(ApiResponse::success(requests)))
}

/// GET /api/onboarding/{request_id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<Json<ApiResponse<OnboardingRequest>>> {
    let request = state.onboarding.get_tenant_by_id(&request_id).await?;
    Ok(Json(ApiResponse::success(request)))
}

/// POST /api/onboarding/approve - approve a pending request
pub async fn approve(
    State(state): State<AppState>,
    Json(payload): Json<ApproveRequest>,
) -> AppResult<Json<ApiResponse<ApprovalOutcome>>> {
    let request_id = payload.request_id.trim();
    if request_id.is_empty() {
        return Err(AppError::validation("request_id is required"));
    }

    let outcome = state.orchestrator.approve_onboarding(request_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Tenant onboarded",
        outcome,
    )))
}

/// POST /api/onboarding/{request_id}/retry - operator revert to `pending`
pub async fn retry(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<Json<ApiResponse<OnboardingRequest>>> {
    state.onboarding.revert_to_retriable(&request_id).await?;
    let request = state.onboarding.get_tenant_by_id(&request_id).await?;
    Ok(Json(ApiResponse::success(request)))
}
