//! Registration/approval workflow endpoints. All three are public: they
//! run before the applicant has any token to present.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::errors::{ApiError, Result};
use crate::models::{ApprovalStatus, Gender, MessPreference, Role};
use crate::store;

#[derive(Deserialize)]
pub struct CheckEmailRequest {
    pub email: String,
}

/// Where an e-mail stands in the workflow; `new` means no application
/// exists yet.
#[derive(Serialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum EmailState {
    New,
    Pending,
    Approved,
    Rejected,
}

#[derive(Serialize)]
pub struct CheckEmailResponse {
    pub state: EmailState,
    pub role: Option<Role>,
    /// Both this and `state == approved` must hold before the frontend
    /// grants dashboard access.
    pub credentials_set: bool,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    // Student-only fields.
    pub gender: Option<Gender>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub mess_preference: Option<MessPreference>,
}

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub username: String,
}

#[derive(Serialize)]
pub struct CredentialsResponse {
    pub role: Role,
    pub username: String,
    pub credentials_set: bool,
}

fn state_for(status: ApprovalStatus) -> EmailState {
    match status {
        ApprovalStatus::Pending => EmailState::Pending,
        ApprovalStatus::Approved => EmailState::Approved,
        ApprovalStatus::Rejected => EmailState::Rejected,
    }
}

fn validate_email(email: &str) -> Result<()> {
    let ok = email.contains('@')
        && !email.starts_with('@')
        && !email.ends_with('@')
        && !email.contains(char::is_whitespace)
        && email.rsplit('@').next().is_some_and(|d| d.contains('.'));
    if ok {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("'{email}' is not a valid e-mail address")))
    }
}

fn validate_phone(phone: &str) -> Result<()> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digits >= 7 {
        Ok(())
    } else {
        Err(ApiError::Validation("phone number is too short".to_string()))
    }
}

/// `POST /api/auth/check-email`
pub async fn check_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckEmailRequest>,
) -> Result<Json<CheckEmailResponse>> {
    validate_email(&req.email)?;

    if let Some(student) = store::students::find_by_email(&state.pool, &req.email).await? {
        return Ok(Json(CheckEmailResponse {
            state: state_for(student.status),
            role: Some(Role::Student),
            credentials_set: student.credentials_set,
        }));
    }
    if let Some(warden) = store::wardens::find_by_email(&state.pool, &req.email).await? {
        return Ok(Json(CheckEmailResponse {
            state: state_for(warden.status),
            role: Some(Role::Warden),
            credentials_set: warden.credentials_set,
        }));
    }

    Ok(Json(CheckEmailResponse {
        state: EmailState::New,
        role: None,
        credentials_set: false,
    }))
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    validate_email(&req.email)?;
    validate_phone(&req.phone)?;
    if req.full_name.trim().is_empty() {
        return Err(ApiError::Validation("full name is required".to_string()));
    }

    let now = Utc::now().timestamp();

    match req.role {
        Role::Student => {
            let gender = req.gender.ok_or_else(|| {
                ApiError::Validation("gender is required for student registration".to_string())
            })?;
            let application = store::students::NewStudentApplication {
                full_name: req.full_name.trim().to_string(),
                email: req.email.trim().to_string(),
                gender,
                phone: req.phone.trim().to_string(),
                guardian_name: req.guardian_name,
                guardian_phone: req.guardian_phone,
                mess_preference: req.mess_preference.unwrap_or(MessPreference::Veg),
            };
            let student = store::students::register(&state.pool, &application, now).await?;
            Ok((StatusCode::CREATED, Json(student)).into_response())
        }
        Role::Warden => {
            let application = store::wardens::NewWardenApplication {
                full_name: req.full_name.trim().to_string(),
                email: req.email.trim().to_string(),
                phone: req.phone.trim().to_string(),
            };
            let warden = store::wardens::register(&state.pool, &application, now).await?;
            Ok((StatusCode::CREATED, Json(warden)).into_response())
        }
        Role::Admin => Err(ApiError::Validation(
            "admin accounts are provisioned out of band".to_string(),
        )),
    }
}

/// `POST /api/auth/credentials`
///
/// Marks the credential-setup sub-step complete once the external auth
/// service has stored the secret. Approval and credentials are
/// independent gates; this endpoint only succeeds after approval.
pub async fn complete_credentials(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<CredentialsResponse>> {
    validate_email(&req.email)?;
    let username = req.username.trim();
    if username.len() < 4 || username.contains(char::is_whitespace) {
        return Err(ApiError::Validation(
            "username must be at least 4 characters with no spaces".to_string(),
        ));
    }

    if store::students::find_by_email(&state.pool, &req.email).await?.is_some() {
        let student =
            store::students::complete_credentials(&state.pool, &req.email, username).await?;
        return Ok(Json(CredentialsResponse {
            role: Role::Student,
            username: student.username.unwrap_or_default(),
            credentials_set: true,
        }));
    }

    if store::wardens::find_by_email(&state.pool, &req.email).await?.is_some() {
        let warden =
            store::wardens::complete_credentials(&state.pool, &req.email, username).await?;
        return Ok(Json(CredentialsResponse {
            role: Role::Warden,
            username: warden.username.unwrap_or_default(),
            credentials_set: true,
        }));
    }

    Err(ApiError::NotFound("application"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("x@y.com").is_ok());
        assert!(validate_email("a.b@dept.college.edu").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@y.com").is_err());
        assert!(validate_email("x@").is_err());
        assert!(validate_email("x y@z.com").is_err());
        assert!(validate_email("x@nodot").is_err());
    }

    #[test]
    fn phone_validation() {
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("+91 98765 43210").is_ok());
        assert!(validate_phone("12345").is_err());
    }
}
