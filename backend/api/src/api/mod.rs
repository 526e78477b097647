//! Axum REST API — shared state, router assembly, and handler modules.

use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::auth::Principal;
use crate::config::Config;
use crate::errors::{ApiError, Result};
use crate::models::Role;
use crate::store;

pub mod announcements;
pub mod auth;
pub mod complaints;
pub mod fees;
pub mod hostels;
pub mod rooms;
pub mod students;

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub http: reqwest::Client,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The hostel a staff caller is scoped to: admins see everything
/// (`None`), wardens only their own hostel. Students are refused.
pub(crate) async fn staff_scope(
    state: &AppState,
    principal: &Principal,
) -> Result<Option<i64>> {
    match principal.role {
        Role::Admin => Ok(None),
        Role::Warden => {
            let warden = store::wardens::get(&state.pool, principal.id).await?;
            match warden.hostel_id {
                Some(hostel_id) => Ok(Some(hostel_id)),
                None => Err(ApiError::Validation(
                    "warden is not assigned to a hostel yet".to_string(),
                )),
            }
        }
        Role::Student => Err(ApiError::Forbidden),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Registration / approval workflow
        .route("/api/auth/check-email", post(auth::check_email))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/credentials", post(auth::complete_credentials))
        // Hostel directory
        .route("/api/hostels", get(hostels::list).post(hostels::create))
        .route(
            "/api/hostels/:id",
            get(hostels::get_one)
                .put(hostels::update)
                .delete(hostels::delete_one),
        )
        // Room inventory
        .route("/api/rooms", post(rooms::create))
        .route(
            "/api/rooms/:id",
            get(rooms::list_for_hostel).delete(rooms::delete_one),
        )
        .route("/api/rooms/stats/:hostel_id", get(rooms::stats))
        .route("/api/rooms/status/:room_id", put(rooms::set_status))
        // Students and allocation
        .route("/api/students", get(students::list))
        .route("/api/students/:id/status", put(students::decide))
        .route("/api/student/book-room", post(students::book_room))
        // Wardens
        .route("/api/wardens", get(students::list_wardens))
        .route("/api/wardens/:id/status", put(students::decide_warden))
        // Fee ledger
        .route("/api/fees/structure", post(fees::create_structure))
        .route("/api/fees/structures/:hostel_id", get(fees::list_structures))
        .route("/api/fees/my-fees", get(fees::my_fees))
        .route("/api/fees/pending", get(fees::pending))
        .route("/api/fees/payment", post(fees::submit_payment))
        .route("/api/fees/verify/:transaction_id", put(fees::verify))
        .route("/api/fees/reminder", post(fees::reminder))
        // Complaints
        .route(
            "/api/complaints",
            get(complaints::list).post(complaints::file),
        )
        .route("/api/complaints/my", get(complaints::my_complaints))
        .route("/api/complaints/:id", put(complaints::update))
        // Announcements
        .route(
            "/api/announcements",
            get(announcements::list).post(announcements::create),
        )
        .route("/api/announcements/:id/read", put(announcements::mark_read))
        .route("/api/announcements/:id", delete(announcements::deactivate))
        .with_state(state)
}
