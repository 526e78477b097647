//! Hostel directory — admin-owned CRUD plus warden assignment.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::errors::{ApiError, Result};
use crate::models::{ApprovalStatus, Hostel, HostelType};
use crate::store::{is_unique_violation, with_retry};

#[derive(Debug, Deserialize)]
pub struct NewHostel {
    pub name: String,
    pub code: String,
    pub hostel_type: HostelType,
    pub total_floors: i64,
    pub students_per_room: i64,
    pub per_student_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct HostelUpdate {
    pub name: Option<String>,
    pub per_student_amount: Option<i64>,
    pub warden_id: Option<i64>,
}

pub async fn create(pool: &SqlitePool, new: &NewHostel, now: i64) -> Result<Hostel> {
    let result = sqlx::query(
        r#"
        INSERT INTO hostels
            (name, code, hostel_type, total_floors, students_per_room,
             per_student_amount, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&new.name)
    .bind(&new.code)
    .bind(new.hostel_type)
    .bind(new.total_floors)
    .bind(new.students_per_room)
    .bind(new.per_student_amount)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Validation(format!("hostel code '{}' is already in use", new.code))
        } else {
            e.into()
        }
    })?;

    get(pool, result.last_insert_rowid()).await
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Hostel>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, Hostel>(
            r#"
            SELECT id, name, code, hostel_type, total_floors, total_rooms,
                   students_per_room, per_student_amount, warden_id,
                   total_beds, occupied_beds, created_at
            FROM   hostels
            ORDER  BY name ASC
            "#,
        )
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Hostel> {
    with_retry(|| {
        sqlx::query_as::<_, Hostel>(
            r#"
            SELECT id, name, code, hostel_type, total_floors, total_rooms,
                   students_per_room, per_student_amount, warden_id,
                   total_beds, occupied_beds, created_at
            FROM   hostels
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("hostel"))
}

/// Partial update. Assigning a warden also points the warden record back
/// at the hostel, in the same transaction; only approved wardens qualify.
pub async fn update(pool: &SqlitePool, id: i64, update: &HostelUpdate) -> Result<Hostel> {
    let mut tx = pool.begin().await?;

    if let Some(warden_id) = update.warden_id {
        let status: Option<ApprovalStatus> =
            sqlx::query_scalar("SELECT status FROM wardens WHERE id = ?1")
                .bind(warden_id)
                .fetch_optional(&mut *tx)
                .await?;
        match status {
            None => return Err(ApiError::NotFound("warden")),
            Some(ApprovalStatus::Approved) => {}
            Some(_) => {
                return Err(ApiError::Validation(
                    "only an approved warden can be assigned to a hostel".to_string(),
                ))
            }
        }

        sqlx::query("UPDATE wardens SET hostel_id = ?1 WHERE id = ?2")
            .bind(id)
            .bind(warden_id)
            .execute(&mut *tx)
            .await?;
    }

    let updated = sqlx::query(
        r#"
        UPDATE hostels
        SET    name = COALESCE(?1, name),
               per_student_amount = COALESCE(?2, per_student_amount),
               warden_id = COALESCE(?3, warden_id)
        WHERE  id = ?4
        "#,
    )
    .bind(&update.name)
    .bind(update.per_student_amount)
    .bind(update.warden_id)
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(ApiError::NotFound("hostel"));
    }

    tx.commit().await?;
    get(pool, id).await
}

/// Delete an *empty* hostel, cascading its rooms and fee structures.
/// Deletion while any bed is occupied is blocked rather than orphaning
/// resident students.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    let occupied: Option<i64> =
        sqlx::query_scalar("SELECT occupied_beds FROM hostels WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    match occupied {
        None => return Err(ApiError::NotFound("hostel")),
        Some(n) if n > 0 => {
            return Err(ApiError::Validation(
                "hostel has resident students and cannot be deleted".to_string(),
            ))
        }
        Some(_) => {}
    }

    sqlx::query("DELETE FROM fee_structures WHERE hostel_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM rooms WHERE hostel_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM hostels WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HostelType;
    use crate::store::testutil;

    fn new_hostel(code: &str) -> NewHostel {
        NewHostel {
            name: "North Block".to_string(),
            code: code.to_string(),
            hostel_type: HostelType::Male,
            total_floors: 4,
            students_per_room: 2,
            per_student_amount: 5000,
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let pool = testutil::pool().await;
        let hostel = create(&pool, &new_hostel("NB"), 100).await.unwrap();
        assert_eq!(hostel.code, "NB");
        assert_eq!(hostel.occupied_beds, 0);
        assert_eq!(hostel.total_rooms, 0);

        let fetched = get(&pool, hostel.id).await.unwrap();
        assert_eq!(fetched.name, "North Block");
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let pool = testutil::pool().await;
        create(&pool, &new_hostel("NB"), 100).await.unwrap();
        let err = create(&pool, &new_hostel("NB"), 101).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_blocked_while_occupied() {
        let pool = testutil::pool().await;
        let hostel = create(&pool, &new_hostel("NB"), 100).await.unwrap();

        sqlx::query("UPDATE hostels SET occupied_beds = 1 WHERE id = ?1")
            .bind(hostel.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = delete(&pool, hostel.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        sqlx::query("UPDATE hostels SET occupied_beds = 0 WHERE id = ?1")
            .bind(hostel.id)
            .execute(&pool)
            .await
            .unwrap();

        delete(&pool, hostel.id).await.unwrap();
        assert!(matches!(
            get(&pool, hostel.id).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
