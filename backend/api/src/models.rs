//! # Domain model
//!
//! Record structs mirror the database tables one-to-one; every status
//! column is a closed enum so an illegal state cannot reach the handlers.
//!
//! ## Status lifecycles
//!
//! ```text
//! Room:        available ◄──► full          (driven by the occupancy counter)
//!                  │against either▲
//!                  └── maintenance ┘        (manual override)
//!
//! Application: pending ──► approved | rejected      (terminal)
//!
//! Fee:         pending ──► partial ──► paid
//!                  └────────┴──► overdue   (past due with a balance)
//!
//! Transaction: pending_verification ──► verified | rejected   (terminal)
//! ```
//!
//! Backward transitions out of terminal states are rejected at the storage
//! layer with guarded updates.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────

/// Caller role carried in the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Warden,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Warden => "warden",
            Self::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum HostelType {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessPreference {
    Veg,
    NonVeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Full,
    Maintenance,
}

/// Bed configuration of a room, derived from its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RoomType {
    Single,
    Double,
    Triple,
    Dormitory,
}

impl RoomType {
    /// Map a bed count onto the room type used for fee-structure matching.
    pub fn for_capacity(capacity: i64) -> Self {
        match capacity {
            1 => Self::Single,
            2 => Self::Double,
            3 => Self::Triple,
            _ => Self::Dormitory,
        }
    }
}

/// Shared lifecycle for student and warden applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FeeStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingVerification,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

// ─────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────

/// A managed residential building. `occupied_beds` is the maintained
/// aggregate of `occupied` across the hostel's rooms.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Hostel {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub hostel_type: HostelType,
    pub total_floors: i64,
    pub total_rooms: i64,
    pub students_per_room: i64,
    pub per_student_amount: i64,
    pub warden_id: Option<i64>,
    pub total_beds: i64,
    pub occupied_beds: i64,
    pub created_at: i64,
}

/// A unit within a hostel with fixed bed capacity.
/// Invariant: `0 <= occupied <= capacity`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Room {
    pub id: i64,
    pub hostel_id: i64,
    pub room_no: String,
    pub floor_no: i64,
    pub capacity: i64,
    pub occupied: i64,
    pub status: RoomStatus,
    pub remarks: Option<String>,
    pub created_at: i64,
}

/// A student application and, once allocated, their residency record.
/// Room fields stay empty until a booking succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub gender: Gender,
    pub phone: String,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub mess_preference: MessPreference,
    pub status: ApprovalStatus,
    pub hostel_id: Option<i64>,
    pub hostel_name: Option<String>,
    pub room_id: Option<i64>,
    pub room_no: Option<String>,
    pub room_type: Option<RoomType>,
    pub username: Option<String>,
    pub credentials_set: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Warden {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub status: ApprovalStatus,
    pub hostel_id: Option<i64>,
    pub username: Option<String>,
    pub credentials_set: bool,
    pub created_at: i64,
}

/// Admin-defined price template per hostel, room type and academic year.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeeStructure {
    pub id: i64,
    pub hostel_id: i64,
    pub room_type: RoomType,
    pub amount: i64,
    pub academic_year: String,
    pub due_date: i64,
    pub payment_details: Option<String>,
    pub created_at: i64,
}

/// A student's individual balance, derived from a fee structure at booking.
/// Invariant: `paid_amount + pending_amount == total_amount`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentFee {
    pub id: i64,
    pub student_id: i64,
    pub fee_structure_id: i64,
    pub total_amount: i64,
    pub paid_amount: i64,
    pub pending_amount: i64,
    pub status: FeeStatus,
    pub due_date: i64,
    pub created_at: i64,
}

/// A single payment-proof submission awaiting or past warden verification.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeeTransaction {
    pub id: i64,
    pub student_fee_id: i64,
    pub amount: i64,
    pub payment_method: String,
    pub reference: Option<String>,
    pub proof_ref: Option<String>,
    pub status: TransactionStatus,
    pub remarks: Option<String>,
    pub created_at: i64,
    pub decided_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Complaint {
    pub id: i64,
    pub student_id: i64,
    pub category: String,
    pub description: String,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub resolution: Option<String>,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub priority: Priority,
    pub created_by: i64,
    pub created_by_role: Role,
    pub is_active: bool,
    pub created_at: i64,
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_type_from_capacity() {
        assert_eq!(RoomType::for_capacity(1), RoomType::Single);
        assert_eq!(RoomType::for_capacity(2), RoomType::Double);
        assert_eq!(RoomType::for_capacity(3), RoomType::Triple);
        assert_eq!(RoomType::for_capacity(4), RoomType::Dormitory);
        assert_eq!(RoomType::for_capacity(8), RoomType::Dormitory);
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::PendingVerification).unwrap(),
            "\"pending_verification\""
        );
        assert_eq!(
            serde_json::to_string(&ComplaintStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&MessPreference::NonVeg).unwrap(),
            "\"non_veg\""
        );
    }

    #[test]
    fn role_round_trips() {
        for role in [Role::Admin, Role::Warden, Role::Student] {
            let json = serde_json::to_string(&role).unwrap();
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(back, role);
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
