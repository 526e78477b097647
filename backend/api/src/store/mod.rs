//! Storage layer — pool setup, migrations, and per-entity query modules.
//!
//! Every state transition in this layer is written as a *conditional*
//! `UPDATE ... WHERE <current-state guard>` and checked through
//! `rows_affected()`, so concurrent requests cannot double-apply a
//! transition (overbook a room, double-credit a payment, re-decide an
//! application). Transient driver errors are retried once; business-rule
//! failures are terminal for the request.

use std::future::Future;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{info, warn};

use crate::errors::Result;

pub mod announcements;
pub mod complaints;
pub mod fees;
pub mod hostels;
pub mod rooms;
pub mod students;
pub mod wardens;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// Whether an error is worth a single retry (I/O hiccup, pool timeout,
/// SQLITE_BUSY). Constraint and logic errors are never retried.
fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

/// Run a storage operation, retrying exactly once on a transient failure.
pub async fn with_retry<T, F, Fut>(op: F) -> std::result::Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match op().await {
        Err(e) if is_transient(&e) => {
            warn!("transient storage error, retrying once: {e}");
            op().await
        }
        other => other,
    }
}

/// Map SQLite's UNIQUE-violation message so callers can surface a
/// domain error instead of a 500.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

// ─────────────────────────────────────────────────────────
// Shared test fixtures
// ─────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testutil {
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

    use crate::models::{Gender, HostelType, MessPreference};

    /// Fresh in-memory database with the real migrations applied.
    pub async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    pub async fn seed_hostel(pool: &SqlitePool, code: &str) -> i64 {
        sqlx::query(
            r#"
            INSERT INTO hostels
                (name, code, hostel_type, total_floors, students_per_room,
                 per_student_amount, created_at)
            VALUES (?1, ?2, ?3, 3, 2, 5000, 0)
            "#,
        )
        .bind(format!("Hostel {code}"))
        .bind(code)
        .bind(HostelType::Male)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    pub async fn seed_room(pool: &SqlitePool, hostel_id: i64, room_no: &str, capacity: i64) -> i64 {
        let id = sqlx::query(
            r#"
            INSERT INTO rooms (hostel_id, room_no, floor_no, capacity, created_at)
            VALUES (?1, ?2, 1, ?3, 0)
            "#,
        )
        .bind(hostel_id)
        .bind(room_no)
        .bind(capacity)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();

        sqlx::query(
            "UPDATE hostels SET total_rooms = total_rooms + 1, total_beds = total_beds + ?2 \
             WHERE id = ?1",
        )
        .bind(hostel_id)
        .bind(capacity)
        .execute(pool)
        .await
        .unwrap();

        id
    }

    pub async fn seed_student(pool: &SqlitePool, email: &str, status: &str) -> i64 {
        sqlx::query(
            r#"
            INSERT INTO students
                (full_name, email, gender, phone, mess_preference, status, created_at)
            VALUES (?1, ?2, ?3, '9000000000', ?4, ?5, 0)
            "#,
        )
        .bind("Test Student")
        .bind(email)
        .bind(Gender::Male)
        .bind(MessPreference::Veg)
        .bind(status)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    pub async fn seed_fee_structure(
        pool: &SqlitePool,
        hostel_id: i64,
        room_type: &str,
        amount: i64,
        due_date: i64,
    ) -> i64 {
        sqlx::query(
            r#"
            INSERT INTO fee_structures
                (hostel_id, room_type, amount, academic_year, due_date, created_at)
            VALUES (?1, ?2, ?3, '2026-27', ?4, 0)
            "#,
        )
        .bind(hostel_id)
        .bind(room_type)
        .bind(amount)
        .bind(due_date)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }
}
