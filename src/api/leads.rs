//! Lead CRUD endpoints. Every route here sits behind the auth gate.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use std::collections::HashMap;
use std::sync::Arc;

use super::auth::{AuthUser, MessageResponse};
use super::error::ApiError;
use crate::db::{
    self, CreateLeadRequest, LeadDraft, LeadListResponse, LeadResponse, StoreError,
    UpdateLeadRequest,
};
use crate::filter::parse_list_query;
use crate::AppState;

fn lead_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::not_found("Lead not found"),
        StoreError::DuplicateEmail => {
            ApiError::duplicate_email("A lead with this email already exists")
        }
        other => other.into(),
    }
}

/// List leads with filtering and pagination
///
/// Query parameters:
/// - page: 1-indexed page number (default 1)
/// - limit: page size (default 20, max 100)
/// - `<field>`, `<field>_op`, `<field>_to`: see [`crate::filter`]
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<LeadListResponse>, ApiError> {
    let query = parse_list_query(&params)?;

    let page = db::list_leads(&state.db, &query.filter, query.pagination)
        .await
        .map_err(lead_error)?;

    tracing::debug!(
        user_id = %user.id,
        clauses = query.filter.clauses().len(),
        page = query.pagination.page,
        total = page.total,
        "Listed leads"
    );

    Ok(Json(LeadListResponse {
        leads: page.items,
        page: query.pagination.page,
        limit: query.pagination.limit,
        total: page.total,
        total_pages: query.pagination.total_pages(page.total),
    }))
}

/// Get a single lead
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LeadResponse>, ApiError> {
    let lead = db::get_lead(&state.db, &id).await.map_err(lead_error)?;
    Ok(Json(LeadResponse { lead }))
}

/// Create a new lead
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<CreateLeadRequest>, ApiError>,
) -> Result<(StatusCode, Json<LeadResponse>), ApiError> {
    let lead = db::create_lead(&state.db, LeadDraft::from(req))
        .await
        .map_err(lead_error)?;

    tracing::info!(lead_id = %lead.id, user_id = %user.id, "Lead created");

    Ok((StatusCode::CREATED, Json(LeadResponse { lead })))
}

/// Update a lead; fields missing from the body are left unchanged
pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateLeadRequest>, ApiError>,
) -> Result<Json<LeadResponse>, ApiError> {
    let lead = db::update_lead(&state.db, &id, req)
        .await
        .map_err(lead_error)?;

    tracing::info!(lead_id = %lead.id, user_id = %user.id, "Lead updated");

    Ok(Json(LeadResponse { lead }))
}

/// Delete a lead permanently
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    db::delete_lead(&state.db, &id).await.map_err(lead_error)?;

    tracing::info!(lead_id = %id, user_id = %user.id, "Lead deleted");

    Ok(Json(MessageResponse {
        message: "Lead deleted successfully".to_string(),
    }))
}
