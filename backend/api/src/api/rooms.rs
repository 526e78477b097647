//! Room inventory endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::allocation::{self, RoomStats};
use crate::api::AppState;
use crate::auth::Principal;
use crate::errors::Result;
use crate::models::{Room, RoomStatus};
use crate::store;
use crate::store::rooms::NewRoom;

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: RoomStatus,
    pub remarks: Option<String>,
}

/// `POST /api/rooms`
pub async fn create(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<NewRoom>,
) -> Result<(StatusCode, Json<Room>)> {
    principal.require_admin()?;
    let room = store::rooms::create(&state.pool, &req, Utc::now().timestamp()).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// `GET /api/rooms/:id` — rooms of one hostel.
pub async fn list_for_hostel(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(hostel_id): Path<i64>,
) -> Result<Json<Vec<Room>>> {
    // Surface an honest 404 rather than an empty list for a bad id.
    store::hostels::get(&state.pool, hostel_id).await?;
    Ok(Json(
        store::rooms::list_for_hostel(&state.pool, hostel_id).await?,
    ))
}

/// `DELETE /api/rooms/:id`
pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(room_id): Path<i64>,
) -> Result<StatusCode> {
    principal.require_admin()?;
    store::rooms::delete(&state.pool, room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/rooms/stats/:hostel_id`
pub async fn stats(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(hostel_id): Path<i64>,
) -> Result<Json<RoomStats>> {
    principal.require_staff()?;
    Ok(Json(allocation::room_stats(&state.pool, hostel_id).await?))
}

/// `PUT /api/rooms/status/:room_id`
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(room_id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<Room>> {
    principal.require_staff()?;
    let room = allocation::set_room_status(
        &state.pool,
        room_id,
        req.status,
        req.remarks.as_deref(),
    )
    .await?;
    Ok(Json(room))
}
