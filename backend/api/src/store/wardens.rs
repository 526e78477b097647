//! Warden applications — the same approval workflow as students, decided
//! by an admin only.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::errors::{ApiError, Result};
use crate::models::{ApprovalStatus, Warden};
use crate::store::{is_unique_violation, with_retry};

#[derive(Debug, Deserialize)]
pub struct NewWardenApplication {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Warden>> {
    let row = with_retry(|| {
        sqlx::query_as::<_, Warden>(
            r#"
            SELECT id, full_name, email, phone, status, hostel_id, username,
                   credentials_set, created_at
            FROM   wardens
            WHERE  email = ?1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
    })
    .await?;
    Ok(row)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Warden> {
    with_retry(|| {
        sqlx::query_as::<_, Warden>(
            r#"
            SELECT id, full_name, email, phone, status, hostel_id, username,
                   credentials_set, created_at
            FROM   wardens
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("warden"))
}

pub async fn register(
    pool: &SqlitePool,
    new: &NewWardenApplication,
    now: i64,
) -> Result<Warden> {
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
        "INSERT INTO wardens (full_name, email, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&new.full_name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::AlreadyPending
        } else {
            e.into()
        }
    })?;

    get(pool, result.last_insert_rowid()).await
}

pub async fn decide(pool: &SqlitePool, id: i64, decision: ApprovalStatus) -> Result<Warden> {
    let updated = sqlx::query(
        "UPDATE wardens SET status = ?2 WHERE id = ?1 AND status = 'pending'",
    )
    .bind(id)
    .bind(decision)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM wardens WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        return Err(match exists {
            None => ApiError::NotFound("warden"),
            Some(_) => ApiError::AlreadyDecided,
        });
    }

    get(pool, id).await
}

pub async fn complete_credentials(
    pool: &SqlitePool,
    email: &str,
    username: &str,
) -> Result<Warden> {
    let warden = find_by_email(pool, email)
        .await?
        .ok_or(ApiError::NotFound("warden"))?;

    if warden.status != ApprovalStatus::Approved {
        return Err(ApiError::Validation(
            "application is not approved yet".to_string(),
        ));
    }
    if warden.credentials_set {
        return Err(ApiError::Validation(
            "credentials are already configured for this account".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE wardens SET username = ?2, credentials_set = 1 \
         WHERE email = ?1 AND status = 'approved' AND credentials_set = 0",
    )
    .bind(email)
    .bind(username)
    .execute(pool)
    .await?;

    get(pool, warden.id).await
}

pub async fn list(pool: &SqlitePool, status: Option<ApprovalStatus>) -> Result<Vec<Warden>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, Warden>(
            r#"
            SELECT id, full_name, email, phone, status, hostel_id, username,
                   credentials_set, created_at
            FROM   wardens
            WHERE  (?1 IS NULL OR status = ?1)
            ORDER  BY created_at DESC, id DESC
            "#,
        )
        .bind(status)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil;

    fn application(email: &str) -> NewWardenApplication {
        NewWardenApplication {
            full_name: "K. Menon".to_string(),
            email: email.to_string(),
            phone: "9123456789".to_string(),
        }
    }

    #[tokio::test]
    async fn warden_workflow_mirrors_students() {
        let pool = testutil::pool().await;
        let warden = register(&pool, &application("w@y.com"), 5).await.unwrap();
        assert_eq!(warden.status, ApprovalStatus::Pending);

        assert!(matches!(
            register(&pool, &application("w@y.com"), 6).await,
            Err(ApiError::AlreadyPending)
        ));

        decide(&pool, warden.id, ApprovalStatus::Approved).await.unwrap();
        assert!(matches!(
            decide(&pool, warden.id, ApprovalStatus::Approved).await,
            Err(ApiError::AlreadyDecided)
        ));

        let done = complete_credentials(&pool, "w@y.com", "kmenon").await.unwrap();
        assert!(done.credentials_set);
    }
}
