//! Room inventory — creation, listing, deletion. Occupancy mutation lives
//! in the allocation service.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::errors::{ApiError, Result};
use crate::models::Room;
use crate::store::{is_unique_violation, with_retry};

#[derive(Debug, Deserialize)]
pub struct NewRoom {
    pub hostel_id: i64,
    pub room_no: String,
    pub floor_no: i64,
    /// Defaults to the hostel's `students_per_room` when omitted.
    pub capacity: Option<i64>,
}

/// Create a room and roll its beds into the hostel aggregates.
pub async fn create(pool: &SqlitePool, new: &NewRoom, now: i64) -> Result<Room> {
    let mut tx = pool.begin().await?;

    let hostel: Option<(i64, i64)> =
        sqlx::query_as("SELECT total_floors, students_per_room FROM hostels WHERE id = ?1")
            .bind(new.hostel_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (total_floors, students_per_room) = hostel.ok_or(ApiError::NotFound("hostel"))?;

    if new.floor_no < 1 || new.floor_no > total_floors {
        return Err(ApiError::Validation(format!(
            "floor {} is outside this hostel's {} floors",
            new.floor_no, total_floors
        )));
    }

    let capacity = new.capacity.unwrap_or(students_per_room);
    if capacity < 1 {
        return Err(ApiError::Validation(
            "room capacity must be at least one bed".to_string(),
        ));
    }

    let room_id = sqlx::query(
        r#"
        INSERT INTO rooms (hostel_id, room_no, floor_no, capacity, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(new.hostel_id)
    .bind(&new.room_no)
    .bind(new.floor_no)
    .bind(capacity)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Validation(format!(
                "room '{}' already exists in this hostel",
                new.room_no
            ))
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();

    sqlx::query(
        "UPDATE hostels SET total_rooms = total_rooms + 1, total_beds = total_beds + ?2 \
         WHERE id = ?1",
    )
    .bind(new.hostel_id)
    .bind(capacity)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    get(pool, room_id).await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Room> {
    with_retry(|| {
        sqlx::query_as::<_, Room>(
            r#"
            SELECT id, hostel_id, room_no, floor_no, capacity, occupied,
                   status, remarks, created_at
            FROM   rooms
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("room"))
}

pub async fn list_for_hostel(pool: &SqlitePool, hostel_id: i64) -> Result<Vec<Room>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, Room>(
            r#"
            SELECT id, hostel_id, room_no, floor_no, capacity, occupied,
                   status, remarks, created_at
            FROM   rooms
            WHERE  hostel_id = ?1
            ORDER  BY floor_no ASC, room_no ASC
            "#,
        )
        .bind(hostel_id)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

/// Delete an empty room and release its beds from the hostel aggregates.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    let room: Option<(i64, i64, i64)> =
        sqlx::query_as("SELECT hostel_id, capacity, occupied FROM rooms WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let (hostel_id, capacity, occupied) = room.ok_or(ApiError::NotFound("room"))?;

    if occupied > 0 {
        return Err(ApiError::Validation(
            "room has occupants and cannot be deleted".to_string(),
        ));
    }

    sqlx::query("DELETE FROM rooms WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE hostels SET total_rooms = total_rooms - 1, total_beds = total_beds - ?2 \
         WHERE id = ?1",
    )
    .bind(hostel_id)
    .bind(capacity)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
