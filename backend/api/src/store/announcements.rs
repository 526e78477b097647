//! Announcements — staff-authored notices with per-reader read tracking.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::errors::{ApiError, Result};
use crate::models::{Announcement, Priority, Role};
use crate::store::with_retry;

#[derive(Debug, Deserialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub category: String,
    pub priority: Priority,
}

/// An active announcement as seen by one reader.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AnnouncementView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub priority: Priority,
    pub created_by: i64,
    pub created_by_role: Role,
    pub created_at: i64,
    pub read_count: i64,
    pub is_read: bool,
}

pub async fn create(
    pool: &SqlitePool,
    author: i64,
    author_role: Role,
    new: &NewAnnouncement,
    now: i64,
) -> Result<Announcement> {
    let id = sqlx::query(
        r#"
        INSERT INTO announcements
            (title, content, category, priority, created_by, created_by_role, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&new.title)
    .bind(&new.content)
    .bind(&new.category)
    .bind(new.priority)
    .bind(author)
    .bind(author_role)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Announcement> {
    with_retry(|| {
        sqlx::query_as::<_, Announcement>(
            r#"
            SELECT id, title, content, category, priority, created_by,
                   created_by_role, is_active, created_at
            FROM   announcements
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("announcement"))
}

/// Active announcements, newest first, with the caller's read state.
pub async fn list_active(pool: &SqlitePool, reader_id: i64) -> Result<Vec<AnnouncementView>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, AnnouncementView>(
            r#"
            SELECT a.id, a.title, a.content, a.category, a.priority,
                   a.created_by, a.created_by_role, a.created_at,
                   (SELECT COUNT(*) FROM announcement_reads r
                    WHERE r.announcement_id = a.id) AS read_count,
                   EXISTS (SELECT 1 FROM announcement_reads r
                           WHERE r.announcement_id = a.id AND r.reader_id = ?1)
                       AS is_read
            FROM   announcements a
            WHERE  a.is_active = 1
            ORDER  BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(reader_id)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

/// Idempotent: re-reading is a no-op, not an error.
pub async fn mark_read(pool: &SqlitePool, id: i64, reader_id: i64, now: i64) -> Result<()> {
    // Referenced announcement must exist and be active.
    get(pool, id).await?;

    sqlx::query(
        "INSERT OR IGNORE INTO announcement_reads (announcement_id, reader_id, read_at) \
         VALUES (?1, ?2, ?3)",
    )
    .bind(id)
    .bind(reader_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Soft delete: the record stays for audit, the listing drops it.
pub async fn deactivate(pool: &SqlitePool, id: i64) -> Result<()> {
    let updated = sqlx::query("UPDATE announcements SET is_active = 0 WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(ApiError::NotFound("announcement"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil;

    fn notice() -> NewAnnouncement {
        NewAnnouncement {
            title: "Water maintenance".to_string(),
            content: "No water supply on Saturday 10:00-14:00.".to_string(),
            category: "maintenance".to_string(),
            priority: Priority::Medium,
        }
    }

    #[tokio::test]
    async fn read_tracking_is_idempotent() {
        let pool = testutil::pool().await;
        let announcement = create(&pool, 1, Role::Admin, &notice(), 10).await.unwrap();

        mark_read(&pool, announcement.id, 42, 20).await.unwrap();
        mark_read(&pool, announcement.id, 42, 21).await.unwrap();
        mark_read(&pool, announcement.id, 43, 22).await.unwrap();

        let views = list_active(&pool, 42).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].read_count, 2);
        assert!(views[0].is_read);

        let other = list_active(&pool, 99).await.unwrap();
        assert!(!other[0].is_read);
    }

    #[tokio::test]
    async fn deactivated_announcements_disappear_from_listing() {
        let pool = testutil::pool().await;
        let announcement = create(&pool, 1, Role::Warden, &notice(), 10).await.unwrap();
        assert_eq!(list_active(&pool, 1).await.unwrap().len(), 1);

        deactivate(&pool, announcement.id).await.unwrap();
        assert!(list_active(&pool, 1).await.unwrap().is_empty());

        // Record survives for audit.
        let raw = get(&pool, announcement.id).await.unwrap();
        assert!(!raw.is_active);
    }
}
