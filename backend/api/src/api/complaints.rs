//! Complaint endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{staff_scope, AppState};
use crate::auth::Principal;
use crate::errors::{ApiError, Result};
use crate::models::{Complaint, ComplaintStatus};
use crate::store;
use crate::store::complaints::{ComplaintUpdate, NewComplaint};

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<ComplaintStatus>,
}

/// `POST /api/complaints`
pub async fn file(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<NewComplaint>,
) -> Result<(StatusCode, Json<Complaint>)> {
    principal.require_student()?;

    if req.category.trim().is_empty() || req.description.trim().is_empty() {
        return Err(ApiError::Validation(
            "category and description are required".to_string(),
        ));
    }

    let complaint =
        store::complaints::file(&state.pool, principal.id, &req, Utc::now().timestamp()).await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

/// `GET /api/complaints` — staff view, warden-scoped.
pub async fn list(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Complaint>>> {
    principal.require_staff()?;
    let scope = staff_scope(&state, &principal).await?;
    Ok(Json(
        store::complaints::list(&state.pool, query.status, scope).await?,
    ))
}

/// `GET /api/complaints/my`
pub async fn my_complaints(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<Complaint>>> {
    principal.require_student()?;
    Ok(Json(
        store::complaints::list_for_student(&state.pool, principal.id).await?,
    ))
}

/// `PUT /api/complaints/:id`
pub async fn update(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(req): Json<ComplaintUpdate>,
) -> Result<Json<Complaint>> {
    principal.require_staff()?;

    if req.status == ComplaintStatus::Resolved && req.resolution.is_none() {
        return Err(ApiError::Validation(
            "a resolution note is required to resolve a complaint".to_string(),
        ));
    }

    let complaint =
        store::complaints::update(&state.pool, id, &req, Utc::now().timestamp()).await?;
    Ok(Json(complaint))
}
