//! Fee ledger endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{staff_scope, AppState};
use crate::auth::Principal;
use crate::errors::{ApiError, Result};
use crate::models::{FeeStructure, FeeTransaction, RoomType, StudentFee};
use crate::notify::{self, ReminderPayload};
use crate::store;
use crate::store::fees::{NewFeeStructure, PendingVerificationRow, SubmitPayment};

#[derive(Deserialize)]
pub struct CreateFeeStructureRequest {
    pub hostel_id: i64,
    pub room_type: RoomType,
    pub amount: i64,
    pub academic_year: String,
    /// RFC 3339, e.g. `2026-09-30T23:59:59Z`.
    pub due_date: String,
    pub payment_details: Option<String>,
}

#[derive(Serialize)]
pub struct MyFeeEntry {
    pub fee: StudentFee,
    pub transactions: Vec<FeeTransaction>,
}

#[derive(Serialize)]
pub struct MyFeesResponse {
    pub fees: Vec<MyFeeEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyDecision {
    Approve,
    Reject,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub decision: VerifyDecision,
    pub remarks: Option<String>,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub transaction: FeeTransaction,
    pub fee: StudentFee,
}

#[derive(Deserialize)]
pub struct ReminderRequest {
    pub student_ids: Vec<i64>,
    pub message: String,
}

#[derive(Serialize)]
pub struct ReminderResponse {
    pub queued: usize,
}

fn parse_due_date(raw: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp())
        .map_err(|_| {
            ApiError::Validation(format!("'{raw}' is not an RFC 3339 timestamp"))
        })
}

/// `POST /api/fees/structure`
pub async fn create_structure(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateFeeStructureRequest>,
) -> Result<(StatusCode, Json<FeeStructure>)> {
    principal.require_admin()?;

    if req.amount <= 0 {
        return Err(ApiError::InvalidAmount);
    }
    if req.academic_year.trim().is_empty() {
        return Err(ApiError::Validation("academic year is required".to_string()));
    }

    let new = NewFeeStructure {
        hostel_id: req.hostel_id,
        room_type: req.room_type,
        amount: req.amount,
        academic_year: req.academic_year.trim().to_string(),
        due_date: parse_due_date(&req.due_date)?,
        payment_details: req.payment_details,
    };

    let structure =
        store::fees::create_structure(&state.pool, &new, Utc::now().timestamp()).await?;
    Ok((StatusCode::CREATED, Json(structure)))
}

/// `GET /api/fees/structures/:hostel_id`
pub async fn list_structures(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(hostel_id): Path<i64>,
) -> Result<Json<Vec<FeeStructure>>> {
    principal.require_staff()?;
    Ok(Json(
        store::fees::list_structures(&state.pool, hostel_id).await?,
    ))
}

/// `GET /api/fees/my-fees` — the caller's own ledger, transactions included.
pub async fn my_fees(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<MyFeesResponse>> {
    principal.require_student()?;

    let fees = store::fees::fees_for_student(&state.pool, principal.id).await?;
    let mut entries = Vec::with_capacity(fees.len());
    for fee in fees {
        let transactions = store::fees::transactions_for_fee(&state.pool, fee.id).await?;
        entries.push(MyFeeEntry { fee, transactions });
    }

    Ok(Json(MyFeesResponse { fees: entries }))
}

/// `GET /api/fees/pending` — transactions awaiting verification, warden-scoped.
pub async fn pending(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<PendingVerificationRow>>> {
    principal.require_staff()?;
    let scope = staff_scope(&state, &principal).await?;
    Ok(Json(
        store::fees::pending_verifications(&state.pool, scope).await?,
    ))
}

/// `POST /api/fees/payment`
pub async fn submit_payment(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<SubmitPayment>,
) -> Result<(StatusCode, Json<FeeTransaction>)> {
    principal.require_student()?;
    let transaction =
        store::fees::submit_payment(&state.pool, principal.id, &req, Utc::now().timestamp())
            .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// `PUT /api/fees/verify/:transaction_id`
pub async fn verify(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(transaction_id): Path<i64>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    principal.require_staff()?;

    // Wardens may only decide payments of students in their own hostel.
    if let Some(own_hostel) = staff_scope(&state, &principal).await? {
        let transaction = store::fees::get_transaction(&state.pool, transaction_id).await?;
        let fee = store::fees::get_fee(&state.pool, transaction.student_fee_id).await?;
        let student = store::students::get(&state.pool, fee.student_id).await?;
        if student.hostel_id != Some(own_hostel) {
            return Err(ApiError::Forbidden);
        }
    }

    let approve = matches!(req.decision, VerifyDecision::Approve);
    let (transaction, fee) = store::fees::verify(
        &state.pool,
        transaction_id,
        approve,
        req.remarks.as_deref(),
        Utc::now().timestamp(),
    )
    .await?;

    Ok(Json(VerifyResponse { transaction, fee }))
}

/// `POST /api/fees/reminder` — fire-and-forget; never blocks on delivery.
pub async fn reminder(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<ReminderRequest>,
) -> Result<(StatusCode, Json<ReminderResponse>)> {
    principal.require_staff()?;

    if req.student_ids.is_empty() {
        return Err(ApiError::Validation(
            "at least one student id is required".to_string(),
        ));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::Validation("message is required".to_string()));
    }

    let queued = req.student_ids.len();
    notify::spawn_dispatch(
        state.clone(),
        ReminderPayload {
            student_ids: req.student_ids,
            message: req.message,
            sent_at: Utc::now().timestamp(),
        },
    );

    Ok((StatusCode::ACCEPTED, Json(ReminderResponse { queued })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_date_parsing() {
        assert_eq!(
            parse_due_date("2024-01-01T00:00:00Z").unwrap(),
            1_704_067_200
        );
        assert!(parse_due_date("next tuesday").is_err());
        assert!(parse_due_date("2024-13-01T00:00:00Z").is_err());
    }
}
