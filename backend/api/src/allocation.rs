//! Allocation service — commits an approved student to a room.
//!
//! The occupancy check and increment are one conditional UPDATE checked
//! via `rows_affected()`, so two bookings racing for the last bed cannot
//! both succeed; the losing request sees zero rows and maps that to a
//! domain error. Everything a booking touches (room counter, hostel
//! aggregate, student assignment, fee creation) happens in one SQL
//! transaction: either all of it lands or none of it does.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::errors::{ApiError, Result};
use crate::models::{ApprovalStatus, Room, RoomStatus, RoomType};
use crate::store::{fees, with_retry};

/// Returned to the student for confirmation.
#[derive(Debug, Serialize)]
pub struct BookingConfirmation {
    pub room_no: String,
    pub hostel_name: String,
    /// Absent when no fee structure exists yet for the room type.
    pub student_fee_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RoomStats {
    pub hostel_id: i64,
    pub hostel_name: String,
    pub available: i64,
    pub full: i64,
    pub maintenance: i64,
    pub total_beds: i64,
    pub occupied_beds: i64,
    pub floors: Vec<FloorStats>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct FloorStats {
    pub floor_no: i64,
    pub rooms: i64,
    pub total_beds: i64,
    pub occupied_beds: i64,
}

/// Book one bed in `room_id` for `student_id`.
pub async fn book_room(
    pool: &SqlitePool,
    student_id: i64,
    room_id: i64,
    now: i64,
) -> Result<BookingConfirmation> {
    let mut tx = pool.begin().await?;

    let student: Option<(ApprovalStatus, Option<i64>)> =
        sqlx::query_as("SELECT status, room_id FROM students WHERE id = ?1")
            .bind(student_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (status, existing_room) = student.ok_or(ApiError::NotFound("student"))?;

    if existing_room.is_some() {
        return Err(ApiError::AlreadyAssigned);
    }
    if status != ApprovalStatus::Approved {
        return Err(ApiError::Validation(
            "student application is not approved".to_string(),
        ));
    }

    // The capacity check and the increment are one statement; the bed is
    // claimed only if it still exists at commit time.
    let claimed = sqlx::query(
        r#"
        UPDATE rooms
        SET    occupied = occupied + 1,
               status = CASE WHEN occupied + 1 = capacity THEN 'full' ELSE status END
        WHERE  id = ?1 AND status <> 'maintenance' AND occupied < capacity
        "#,
    )
    .bind(room_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if claimed == 0 {
        let room: Option<(RoomStatus,)> =
            sqlx::query_as("SELECT status FROM rooms WHERE id = ?1")
                .bind(room_id)
                .fetch_optional(&mut *tx)
                .await?;
        return Err(match room {
            None => ApiError::NotFound("room"),
            Some((RoomStatus::Maintenance,)) => {
                ApiError::Validation("room is under maintenance".to_string())
            }
            Some(_) => ApiError::CapacityExceeded,
        });
    }

    let room = sqlx::query_as::<_, Room>(
        r#"
        SELECT id, hostel_id, room_no, floor_no, capacity, occupied,
               status, remarks, created_at
        FROM   rooms
        WHERE  id = ?1
        "#,
    )
    .bind(room_id)
    .fetch_one(&mut *tx)
    .await?;

    let hostel: Option<(String,)> = sqlx::query_as("SELECT name FROM hostels WHERE id = ?1")
        .bind(room.hostel_id)
        .fetch_optional(&mut *tx)
        .await?;
    let (hostel_name,) = hostel.ok_or(ApiError::NotFound("hostel"))?;

    sqlx::query("UPDATE hostels SET occupied_beds = occupied_beds + 1 WHERE id = ?1")
        .bind(room.hostel_id)
        .execute(&mut *tx)
        .await?;

    let room_type = RoomType::for_capacity(room.capacity);

    // Guarded against the same student racing two bookings: the second
    // request finds room_id already set and loses.
    let assigned = sqlx::query(
        r#"
        UPDATE students
        SET    hostel_id = ?2, hostel_name = ?3, room_id = ?4,
               room_no = ?5, room_type = ?6
        WHERE  id = ?1 AND status = 'approved' AND room_id IS NULL
        "#,
    )
    .bind(student_id)
    .bind(room.hostel_id)
    .bind(&hostel_name)
    .bind(room.id)
    .bind(&room.room_no)
    .bind(room_type)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if assigned == 0 {
        return Err(ApiError::AlreadyAssigned);
    }

    let student_fee_id = match fees::find_structure(&mut *tx, room.hostel_id, room_type).await? {
        Some(structure) => {
            Some(fees::create_student_fee(&mut *tx, student_id, &structure, now).await?)
        }
        None => {
            warn!(
                "no fee structure for hostel {} / {:?}; booking proceeds without a fee record",
                room.hostel_id, room_type
            );
            None
        }
    };

    tx.commit().await?;

    Ok(BookingConfirmation {
        room_no: room.room_no,
        hostel_name,
        student_fee_id,
    })
}

/// Manual status override. Rooms only ever move to `maintenance` by hand;
/// clearing maintenance recomputes `available`/`full` from the counters.
pub async fn set_room_status(
    pool: &SqlitePool,
    room_id: i64,
    requested: RoomStatus,
    remarks: Option<&str>,
) -> Result<Room> {
    let room: Option<(i64, i64)> =
        sqlx::query_as("SELECT occupied, capacity FROM rooms WHERE id = ?1")
            .bind(room_id)
            .fetch_optional(pool)
            .await?;
    let (occupied, capacity) = room.ok_or(ApiError::NotFound("room"))?;

    let next = match requested {
        RoomStatus::Maintenance => RoomStatus::Maintenance,
        RoomStatus::Available if occupied < capacity => RoomStatus::Available,
        RoomStatus::Available => {
            return Err(ApiError::Validation(
                "room is at capacity and cannot accept occupants".to_string(),
            ))
        }
        RoomStatus::Full => {
            return Err(ApiError::Validation(
                "full status is derived from occupancy; set available or maintenance"
                    .to_string(),
            ))
        }
    };

    sqlx::query("UPDATE rooms SET status = ?2, remarks = ?3 WHERE id = ?1")
        .bind(room_id)
        .bind(next)
        .bind(remarks)
        .execute(pool)
        .await?;

    crate::store::rooms::get(pool, room_id).await
}

/// Read-side aggregate over one hostel's rooms. No mutation.
pub async fn room_stats(pool: &SqlitePool, hostel_id: i64) -> Result<RoomStats> {
    let hostel: Option<(String, i64, i64)> = with_retry(|| {
        sqlx::query_as("SELECT name, total_beds, occupied_beds FROM hostels WHERE id = ?1")
            .bind(hostel_id)
            .fetch_optional(pool)
    })
    .await?;
    let (hostel_name, total_beds, occupied_beds) = hostel.ok_or(ApiError::NotFound("hostel"))?;

    let by_status: Vec<(RoomStatus, i64)> = with_retry(|| {
        sqlx::query_as(
            "SELECT status, COUNT(*) FROM rooms WHERE hostel_id = ?1 GROUP BY status",
        )
        .bind(hostel_id)
        .fetch_all(pool)
    })
    .await?;

    let mut stats = RoomStats {
        hostel_id,
        hostel_name,
        available: 0,
        full: 0,
        maintenance: 0,
        total_beds,
        occupied_beds,
        floors: Vec::new(),
    };
    for (status, count) in by_status {
        match status {
            RoomStatus::Available => stats.available = count,
            RoomStatus::Full => stats.full = count,
            RoomStatus::Maintenance => stats.maintenance = count,
        }
    }

    stats.floors = with_retry(|| {
        sqlx::query_as::<_, FloorStats>(
            r#"
            SELECT floor_no,
                   COUNT(*) AS rooms,
                   SUM(capacity) AS total_beds,
                   SUM(occupied) AS occupied_beds
            FROM   rooms
            WHERE  hostel_id = ?1
            GROUP  BY floor_no
            ORDER  BY floor_no ASC
            "#,
        )
        .bind(hostel_id)
        .fetch_all(pool)
    })
    .await?;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeeStatus;
    use crate::store::testutil;

    #[tokio::test]
    async fn booking_assigns_room_and_rolls_up_aggregates() {
        let pool = testutil::pool().await;
        let hostel_id = testutil::seed_hostel(&pool, "NB").await;
        let room_id = testutil::seed_room(&pool, hostel_id, "101", 2).await;
        let student_id = testutil::seed_student(&pool, "a@y.com", "approved").await;

        let confirmation = book_room(&pool, student_id, room_id, 100).await.unwrap();
        assert_eq!(confirmation.room_no, "101");
        assert_eq!(confirmation.hostel_name, "Hostel NB");

        let room = crate::store::rooms::get(&pool, room_id).await.unwrap();
        assert_eq!(room.occupied, 1);
        assert_eq!(room.status, RoomStatus::Available);

        let student = crate::store::students::get(&pool, student_id).await.unwrap();
        assert_eq!(student.room_no.as_deref(), Some("101"));
        assert_eq!(student.hostel_name.as_deref(), Some("Hostel NB"));
        assert_eq!(student.room_type, Some(RoomType::Double));

        let occupied_beds: i64 =
            sqlx::query_scalar("SELECT occupied_beds FROM hostels WHERE id = ?1")
                .bind(hostel_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(occupied_beds, 1);
    }

    #[tokio::test]
    async fn last_bed_flips_room_to_full_and_next_booking_fails() {
        let pool = testutil::pool().await;
        let hostel_id = testutil::seed_hostel(&pool, "NB").await;
        let room_id = testutil::seed_room(&pool, hostel_id, "101", 2).await;
        let a = testutil::seed_student(&pool, "a@y.com", "approved").await;
        let b = testutil::seed_student(&pool, "b@y.com", "approved").await;
        let c = testutil::seed_student(&pool, "c@y.com", "approved").await;

        book_room(&pool, a, room_id, 100).await.unwrap();
        book_room(&pool, b, room_id, 101).await.unwrap();

        let room = crate::store::rooms::get(&pool, room_id).await.unwrap();
        assert_eq!(room.occupied, 2);
        assert_eq!(room.status, RoomStatus::Full);

        // The conditional update admits exactly `capacity` bookings, no
        // matter how many requests aim at the last bed.
        let err = book_room(&pool, c, room_id, 102).await.unwrap_err();
        assert!(matches!(err, ApiError::CapacityExceeded));

        let room = crate::store::rooms::get(&pool, room_id).await.unwrap();
        assert_eq!(room.occupied, 2);
    }

    #[tokio::test]
    async fn student_cannot_hold_two_rooms() {
        let pool = testutil::pool().await;
        let hostel_id = testutil::seed_hostel(&pool, "NB").await;
        let first = testutil::seed_room(&pool, hostel_id, "101", 2).await;
        let second = testutil::seed_room(&pool, hostel_id, "102", 2).await;
        let student = testutil::seed_student(&pool, "a@y.com", "approved").await;

        book_room(&pool, student, first, 100).await.unwrap();
        let err = book_room(&pool, student, second, 101).await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyAssigned));

        // The losing booking left no trace on the second room.
        let room = crate::store::rooms::get(&pool, second).await.unwrap();
        assert_eq!(room.occupied, 0);
    }

    #[tokio::test]
    async fn unapproved_student_cannot_book() {
        let pool = testutil::pool().await;
        let hostel_id = testutil::seed_hostel(&pool, "NB").await;
        let room_id = testutil::seed_room(&pool, hostel_id, "101", 2).await;
        let pending = testutil::seed_student(&pool, "p@y.com", "pending").await;

        let err = book_room(&pool, pending, room_id, 100).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn maintenance_room_cannot_be_booked() {
        let pool = testutil::pool().await;
        let hostel_id = testutil::seed_hostel(&pool, "NB").await;
        let room_id = testutil::seed_room(&pool, hostel_id, "101", 2).await;
        let student = testutil::seed_student(&pool, "a@y.com", "approved").await;

        set_room_status(&pool, room_id, RoomStatus::Maintenance, Some("rewiring"))
            .await
            .unwrap();

        let err = book_room(&pool, student, room_id, 100).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn booking_opens_fee_from_matching_structure() {
        let pool = testutil::pool().await;
        let hostel_id = testutil::seed_hostel(&pool, "NB").await;
        let room_id = testutil::seed_room(&pool, hostel_id, "101", 2).await;
        testutil::seed_fee_structure(&pool, hostel_id, "double", 5000, 2_000_000_000).await;
        let student = testutil::seed_student(&pool, "a@y.com", "approved").await;

        let confirmation = book_room(&pool, student, room_id, 100).await.unwrap();
        let fee_id = confirmation.student_fee_id.expect("fee should open");

        let fee = crate::store::fees::get_fee(&pool, fee_id).await.unwrap();
        assert_eq!(fee.total_amount, 5000);
        assert_eq!(fee.pending_amount, 5000);
        assert_eq!(fee.paid_amount, 0);
        assert_eq!(fee.status, FeeStatus::Pending);
    }

    #[tokio::test]
    async fn clearing_maintenance_recomputes_status() {
        let pool = testutil::pool().await;
        let hostel_id = testutil::seed_hostel(&pool, "NB").await;
        let room_id = testutil::seed_room(&pool, hostel_id, "101", 1).await;
        let student = testutil::seed_student(&pool, "a@y.com", "approved").await;

        book_room(&pool, student, room_id, 100).await.unwrap();
        // Full room cannot be reopened for occupants.
        let err = set_room_status(&pool, room_id, RoomStatus::Available, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        set_room_status(&pool, room_id, RoomStatus::Maintenance, Some("leak"))
            .await
            .unwrap();
        let room = crate::store::rooms::get(&pool, room_id).await.unwrap();
        assert_eq!(room.status, RoomStatus::Maintenance);
    }

    #[tokio::test]
    async fn stats_aggregate_by_status_and_floor() {
        let pool = testutil::pool().await;
        let hostel_id = testutil::seed_hostel(&pool, "NB").await;
        let r1 = testutil::seed_room(&pool, hostel_id, "101", 1).await;
        let _r2 = testutil::seed_room(&pool, hostel_id, "102", 2).await;
        let r3 = testutil::seed_room(&pool, hostel_id, "103", 2).await;
        let student = testutil::seed_student(&pool, "a@y.com", "approved").await;

        book_room(&pool, student, r1, 100).await.unwrap();
        set_room_status(&pool, r3, RoomStatus::Maintenance, None)
            .await
            .unwrap();

        let stats = room_stats(&pool, hostel_id).await.unwrap();
        assert_eq!(stats.available, 1);
        assert_eq!(stats.full, 1);
        assert_eq!(stats.maintenance, 1);
        assert_eq!(stats.total_beds, 5);
        assert_eq!(stats.occupied_beds, 1);
        assert_eq!(stats.floors.len(), 1);
        assert_eq!(stats.floors[0].floor_no, 1);
        assert_eq!(stats.floors[0].rooms, 3);
        assert_eq!(stats.floors[0].occupied_beds, 1);
    }
}
