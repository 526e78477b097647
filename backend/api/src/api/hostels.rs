//! Hostel directory endpoints (admin-managed).

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
use crate::models::Hostel;
use crate::store::hostels::{HostelUpdate, NewHostel};
use crate::store;

/// `POST /api/hostels`
pub async fn create(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<NewHostel>,
) -> Result<(StatusCode, Json<Hostel>)> {
    principal.require_admin()?;

    if req.name.trim().is_empty() || req.code.trim().is_empty() {
        return Err(ApiError::Validation(
            "hostel name and code are required".to_string(),
        ));
    }
    if req.total_floors < 1 || req.students_per_room < 1 {
        return Err(ApiError::Validation(
            "floors and students per room must be at least 1".to_string(),
        ));
    }
    if req.per_student_amount < 0 {
        return Err(ApiError::Validation(
            "per-student amount cannot be negative".to_string(),
        ));
    }

    let hostel = store::hostels::create(&state.pool, &req, Utc::now().timestamp()).await?;
    Ok((StatusCode::CREATED, Json(hostel)))
}

/// `GET /api/hostels`
pub async fn list(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
) -> Result<Json<Vec<Hostel>>> {
    Ok(Json(store::hostels::list(&state.pool).await?))
}

/// `GET /api/hostels/:id`
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<i64>,
) -> Result<Json<Hostel>> {
    Ok(Json(store::hostels::get(&state.pool, id).await?))
}

/// `PUT /api/hostels/:id`
pub async fn update(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(req): Json<HostelUpdate>,
) -> Result<Json<Hostel>> {
    principal.require_admin()?;
    Ok(Json(store::hostels::update(&state.pool, id, &req).await?))
}

/// `DELETE /api/hostels/:id`
pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    principal.require_admin()?;
    store::hostels::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
