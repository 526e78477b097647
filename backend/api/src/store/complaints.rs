//! Student complaints — filed by students, progressed by staff.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::errors::{ApiError, Result};
use crate::models::{Complaint, ComplaintStatus, Priority};
use crate::store::with_retry;

#[derive(Debug, Deserialize)]
pub struct NewComplaint {
    pub category: String,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Deserialize)]
pub struct ComplaintUpdate {
    pub status: ComplaintStatus,
    pub resolution: Option<String>,
}

pub async fn file(
    pool: &SqlitePool,
    student_id: i64,
    new: &NewComplaint,
    now: i64,
) -> Result<Complaint> {
    let id = sqlx::query(
        r#"
        INSERT INTO complaints (student_id, category, description, priority, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(student_id)
    .bind(&new.category)
    .bind(&new.description)
    .bind(new.priority)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Complaint> {
    with_retry(|| {
        sqlx::query_as::<_, Complaint>(
            r#"
            SELECT id, student_id, category, description, priority, status,
                   resolution, created_at, resolved_at
            FROM   complaints
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("complaint"))
}

/// Staff listing, optionally scoped to one hostel's students.
pub async fn list(
    pool: &SqlitePool,
    status: Option<ComplaintStatus>,
    hostel_id: Option<i64>,
) -> Result<Vec<Complaint>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, Complaint>(
            r#"
            SELECT c.id, c.student_id, c.category, c.description, c.priority,
                   c.status, c.resolution, c.created_at, c.resolved_at
            FROM   complaints c
            JOIN   students s ON s.id = c.student_id
            WHERE  (?1 IS NULL OR c.status = ?1)
              AND  (?2 IS NULL OR s.hostel_id = ?2)
            ORDER  BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(status)
        .bind(hostel_id)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

pub async fn list_for_student(pool: &SqlitePool, student_id: i64) -> Result<Vec<Complaint>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, Complaint>(
            r#"
            SELECT id, student_id, category, description, priority, status,
                   resolution, created_at, resolved_at
            FROM   complaints
            WHERE  student_id = ?1
            ORDER  BY created_at DESC, id DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

/// Progress a complaint. `resolved` is terminal: updating a resolved
/// complaint fails instead of silently rewriting history.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    update: &ComplaintUpdate,
    now: i64,
) -> Result<Complaint> {
    let resolved_at = if update.status == ComplaintStatus::Resolved {
        Some(now)
    } else {
        None
    };

    let updated = sqlx::query(
        r#"
        UPDATE complaints
        SET    status = ?2,
               resolution = COALESCE(?3, resolution),
               resolved_at = COALESCE(?4, resolved_at)
        WHERE  id = ?1 AND status <> 'resolved'
        "#,
    )
    .bind(id)
    .bind(update.status)
    .bind(&update.resolution)
    .bind(resolved_at)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM complaints WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        return Err(match exists {
            None => ApiError::NotFound("complaint"),
            Some(_) => ApiError::AlreadyDecided,
        });
    }

    get(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil;

    fn leaky_tap() -> NewComplaint {
        NewComplaint {
            category: "plumbing".to_string(),
            description: "tap in room 101 leaks all night".to_string(),
            priority: Priority::High,
        }
    }

    #[tokio::test]
    async fn complaint_lifecycle() {
        let pool = testutil::pool().await;
        let student_id = testutil::seed_student(&pool, "s@y.com", "approved").await;

        let complaint = file(&pool, student_id, &leaky_tap(), 10).await.unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Pending);
        assert!(complaint.resolved_at.is_none());

        let in_progress = update(
            &pool,
            complaint.id,
            &ComplaintUpdate {
                status: ComplaintStatus::InProgress,
                resolution: None,
            },
            20,
        )
        .await
        .unwrap();
        assert_eq!(in_progress.status, ComplaintStatus::InProgress);

        let resolved = update(
            &pool,
            complaint.id,
            &ComplaintUpdate {
                status: ComplaintStatus::Resolved,
                resolution: Some("washer replaced".to_string()),
            },
            30,
        )
        .await
        .unwrap();
        assert_eq!(resolved.status, ComplaintStatus::Resolved);
        assert_eq!(resolved.resolved_at, Some(30));

        // Resolved is terminal.
        let err = update(
            &pool,
            complaint.id,
            &ComplaintUpdate {
                status: ComplaintStatus::Pending,
                resolution: None,
            },
            40,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::AlreadyDecided));
    }

    #[tokio::test]
    async fn student_sees_only_their_own() {
        let pool = testutil::pool().await;
        let a = testutil::seed_student(&pool, "a@y.com", "approved").await;
        let b = testutil::seed_student(&pool, "b@y.com", "approved").await;
        file(&pool, a, &leaky_tap(), 10).await.unwrap();
        file(&pool, b, &leaky_tap(), 11).await.unwrap();

        let mine = list_for_student(&pool, a).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].student_id, a);
    }
}
