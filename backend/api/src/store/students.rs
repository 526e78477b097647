//! Student applications and the approval workflow.
//!
//! An e-mail moves through `pending -> approved | rejected`; both outcomes
//! are terminal here (a rejected applicant needs a manual admin override
//! outside the API). Credential completion is a separate gate after
//! approval: dashboard access needs both.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::errors::{ApiError, Result};
use crate::models::{ApprovalStatus, Gender, MessPreference, Student};
use crate::store::{is_unique_violation, with_retry};

#[derive(Debug, Deserialize)]
pub struct NewStudentApplication {
    pub full_name: String,
    pub email: String,
    pub gender: Gender,
    pub phone: String,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub mess_preference: MessPreference,
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Student>> {
    let row = with_retry(|| {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, full_name, email, gender, phone, guardian_name, guardian_phone,
                   mess_preference, status, hostel_id, hostel_name, room_id, room_no,
                   room_type, username, credentials_set, created_at
            FROM   students
            WHERE  email = ?1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
    })
    .await?;
    Ok(row)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Student> {
    with_retry(|| {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, full_name, email, gender, phone, guardian_name, guardian_phone,
                   mess_preference, status, hostel_id, hostel_name, room_id, room_no,
                   room_type, username, credentials_set, created_at
            FROM   students
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("student"))
}

/// File a new application. Re-submission is answered by the current
/// workflow state rather than a duplicate row.
pub async fn register(
    pool: &SqlitePool,
    new: &NewStudentApplication,
    now: i64,
) -> Result<Student> {
    if let Some(existing) = find_by_email(pool, &new.email).await? {
        return Err(match existing.status {
            ApprovalStatus::Pending => ApiError::AlreadyPending,
            ApprovalStatus::Approved => ApiError::AlreadyApproved,
            ApprovalStatus::Rejected => ApiError::Validation(
                "a previous application for this e-mail was rejected".to_string(),
            ),
        });
    }

    let result = sqlx::query(
        r#"
        INSERT INTO students
            (full_name, email, gender, phone, guardian_name, guardian_phone,
             mess_preference, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&new.full_name)
    .bind(&new.email)
    .bind(new.gender)
    .bind(&new.phone)
    .bind(&new.guardian_name)
    .bind(&new.guardian_phone)
    .bind(new.mess_preference)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        // Two registrations racing on the same e-mail: the loser sees the
        // unique index, not the pre-check.
        if is_unique_violation(&e) {
            ApiError::AlreadyPending
        } else {
            e.into()
        }
    })?;

    get(pool, result.last_insert_rowid()).await
}

/// Approve or reject a pending application. The transition is guarded by
/// the current status so a second decision cannot overwrite the first.
pub async fn decide(pool: &SqlitePool, id: i64, decision: ApprovalStatus) -> Result<Student> {
    let updated = sqlx::query(
        "UPDATE students SET status = ?2 WHERE id = ?1 AND status = 'pending'",
    )
    .bind(id)
    .bind(decision)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        // Distinguish a missing record from a repeat decision.
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM students WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        return Err(match exists {
            None => ApiError::NotFound("student"),
            Some(_) => ApiError::AlreadyDecided,
        });
    }

    get(pool, id).await
}

/// Record that the applicant finished credential setup with the external
/// auth collaborator. Only approved applicants qualify, exactly once.
pub async fn complete_credentials(
    pool: &SqlitePool,
    email: &str,
    username: &str,
) -> Result<Student> {
    let student = find_by_email(pool, email)
        .await?
        .ok_or(ApiError::NotFound("student"))?;

    if student.status != ApprovalStatus::Approved {
        return Err(ApiError::Validation(
            "application is not approved yet".to_string(),
        ));
    }
    if student.credentials_set {
        return Err(ApiError::Validation(
            "credentials are already configured for this account".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE students SET username = ?2, credentials_set = 1 \
         WHERE email = ?1 AND status = 'approved' AND credentials_set = 0",
    )
    .bind(email)
    .bind(username)
    .execute(pool)
    .await?;

    get(pool, student.id).await
}

/// List applications. A hostel filter keeps *unassigned pending*
/// applicants visible: wardens decide applications before any room (and
/// therefore hostel) is attached to them.
pub async fn list(
    pool: &SqlitePool,
    status: Option<ApprovalStatus>,
    hostel_id: Option<i64>,
) -> Result<Vec<Student>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, full_name, email, gender, phone, guardian_name, guardian_phone,
                   mess_preference, status, hostel_id, hostel_name, room_id, room_no,
                   room_type, username, credentials_set, created_at
            FROM   students
            WHERE  (?1 IS NULL OR status = ?1)
              AND  (?2 IS NULL
                    OR hostel_id = ?2
                    OR (status = 'pending' AND hostel_id IS NULL))
            ORDER  BY created_at DESC, id DESC
            "#,
        )
        .bind(status)
        .bind(hostel_id)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil;

    fn application(email: &str) -> NewStudentApplication {
        NewStudentApplication {
            full_name: "Asha Rao".to_string(),
            email: email.to_string(),
            gender: Gender::Female,
            phone: "9876543210".to_string(),
            guardian_name: Some("R. Rao".to_string()),
            guardian_phone: Some("9876500000".to_string()),
            mess_preference: MessPreference::Veg,
        }
    }

    #[tokio::test]
    async fn register_creates_pending_record() {
        let pool = testutil::pool().await;
        let student = register(&pool, &application("x@y.com"), 10).await.unwrap();
        assert_eq!(student.status, ApprovalStatus::Pending);
        assert!(!student.credentials_set);
        assert!(student.room_no.is_none());
    }

    #[tokio::test]
    async fn duplicate_pending_email_rejected_without_second_row() {
        let pool = testutil::pool().await;
        register(&pool, &application("x@y.com"), 10).await.unwrap();

        let err = register(&pool, &application("x@y.com"), 11).await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyPending));

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE email = 'x@y.com'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn approved_email_reports_already_approved() {
        let pool = testutil::pool().await;
        let student = register(&pool, &application("x@y.com"), 10).await.unwrap();
        decide(&pool, student.id, ApprovalStatus::Approved).await.unwrap();

        let err = register(&pool, &application("x@y.com"), 12).await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyApproved));
    }

    #[tokio::test]
    async fn second_decision_fails() {
        let pool = testutil::pool().await;
        let student = register(&pool, &application("x@y.com"), 10).await.unwrap();

        let approved = decide(&pool, student.id, ApprovalStatus::Approved).await.unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);

        let err = decide(&pool, student.id, ApprovalStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AlreadyDecided));

        // First decision stands.
        assert_eq!(
            get(&pool, student.id).await.unwrap().status,
            ApprovalStatus::Approved
        );
    }

    #[tokio::test]
    async fn credentials_require_approval_and_complete_once() {
        let pool = testutil::pool().await;
        let student = register(&pool, &application("x@y.com"), 10).await.unwrap();

        let err = complete_credentials(&pool, "x@y.com", "asha").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        decide(&pool, student.id, ApprovalStatus::Approved).await.unwrap();

        let done = complete_credentials(&pool, "x@y.com", "asha").await.unwrap();
        assert!(done.credentials_set);
        assert_eq!(done.username.as_deref(), Some("asha"));

        let err = complete_credentials(&pool, "x@y.com", "asha2").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let pool = testutil::pool().await;
        let a = register(&pool, &application("a@y.com"), 10).await.unwrap();
        register(&pool, &application("b@y.com"), 11).await.unwrap();
        decide(&pool, a.id, ApprovalStatus::Approved).await.unwrap();

        let pending = list(&pool, Some(ApprovalStatus::Pending), None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].email, "b@y.com");

        let all = list(&pool, None, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
