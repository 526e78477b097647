//! Student/warden application endpoints and room booking.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::allocation::{self, BookingConfirmation};
use crate::api::{staff_scope, AppState};
use crate::auth::Principal;
use crate::errors::Result;
use crate::models::{ApprovalStatus, Student, Warden};
use crate::store;

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<ApprovalStatus>,
    pub hostel_id: Option<i64>,
}

/// Approve-or-reject payload; `pending` is not a decision.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

#[derive(Deserialize)]
pub struct DecideRequest {
    pub decision: Decision,
}

#[derive(Deserialize)]
pub struct BookRoomRequest {
    pub room_id: i64,
}

impl Decision {
    fn as_status(&self) -> ApprovalStatus {
        match self {
            Decision::Approved => ApprovalStatus::Approved,
            Decision::Rejected => ApprovalStatus::Rejected,
        }
    }
}

/// `GET /api/students`
pub async fn list(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Student>>> {
    principal.require_staff()?;

    // Wardens are pinned to their own hostel regardless of the query.
    let hostel_id = match staff_scope(&state, &principal).await? {
        Some(own) => Some(own),
        None => query.hostel_id,
    };

    Ok(Json(
        store::students::list(&state.pool, query.status, hostel_id).await?,
    ))
}

/// `PUT /api/students/:id/status`
pub async fn decide(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(req): Json<DecideRequest>,
) -> Result<Json<Student>> {
    principal.require_staff()?;
    let student = store::students::decide(&state.pool, id, req.decision.as_status()).await?;
    Ok(Json(student))
}

/// `POST /api/student/book-room`
///
/// The caller books for themselves; the token subject is the student id.
pub async fn book_room(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<BookRoomRequest>,
) -> Result<Json<BookingConfirmation>> {
    principal.require_student()?;
    let confirmation = allocation::book_room(
        &state.pool,
        principal.id,
        req.room_id,
        Utc::now().timestamp(),
    )
    .await?;
    info!(
        "student {} ({}) booked room {} in {}",
        principal.id, principal.email, confirmation.room_no, confirmation.hostel_name
    );
    Ok(Json(confirmation))
}

/// `GET /api/wardens`
pub async fn list_wardens(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Warden>>> {
    principal.require_admin()?;
    Ok(Json(store::wardens::list(&state.pool, query.status).await?))
}

/// `PUT /api/wardens/:id/status`
pub async fn decide_warden(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<i64>,
    Json(req): Json<DecideRequest>,
) -> Result<Json<Warden>> {
    principal.require_admin()?;
    let warden = store::wardens::decide(&state.pool, id, req.decision.as_status()).await?;
    Ok(Json(warden))
}
