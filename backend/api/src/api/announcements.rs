//! Announcement endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::api::AppState;
use crate::auth::Principal;
use crate::errors::{ApiError, Result};
use crate::models::Announcement;
use crate::store;
use crate::store::announcements::{AnnouncementView, NewAnnouncement};

/// `POST /api/announcements`
pub async fn create(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<NewAnnouncement>,
) -> Result<(StatusCode, Json<Announcement>)> {
    principal.require_staff()?;

    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(ApiError::Validation(
            "title and content are required".to_string(),
        ));
    }

    let announcement = store::announcements::create(
        &state.pool,
        principal.id,
        principal.role,
        &req,
        Utc::now().timestamp(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

/// `GET /api/announcements` — active ones, with the caller's read state.
pub async fn list(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<AnnouncementView>>> {
    Ok(Json(
        store::announcements::list_active(&state.pool, principal.id).await?,
    ))
}

/// `PUT /api/announcements/:id/read`
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    store::announcements::mark_read(&state.pool, id, principal.id, Utc::now().timestamp())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/announcements/:id` — deactivates rather than deleting.
pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    principal.require_staff()?;
    store::announcements::deactivate(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
