//! Fee ledger — structures, per-student balances, and payment verification.
//!
//! Balances move only when a warden verifies a submitted transaction, and
//! the `pending_verification -> verified | rejected` transition is a
//! guarded update: a retried or concurrent decision hits `rows_affected()
//! == 0` instead of crediting twice. The balance credit runs in the same
//! SQL transaction, guarded by `pending_amount >= amount`, so the
//! `paid + pending == total` invariant (also a CHECK constraint) holds
//! after every decision.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::errors::{ApiError, Result};
use crate::models::{FeeStructure, FeeTransaction, RoomType, StudentFee, TransactionStatus};
use crate::store::{is_unique_violation, with_retry};

#[derive(Debug, Deserialize)]
pub struct NewFeeStructure {
    pub hostel_id: i64,
    pub room_type: RoomType,
    pub amount: i64,
    pub academic_year: String,
    /// RFC 3339, parsed by the handler into Unix seconds.
    pub due_date: i64,
    pub payment_details: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPayment {
    pub student_fee_id: i64,
    pub amount: i64,
    pub payment_method: String,
    pub reference: Option<String>,
    pub proof_ref: Option<String>,
}

/// A transaction awaiting verification, joined with the student it bills.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PendingVerificationRow {
    pub transaction_id: i64,
    pub student_fee_id: i64,
    pub amount: i64,
    pub payment_method: String,
    pub reference: Option<String>,
    pub proof_ref: Option<String>,
    pub submitted_at: i64,
    pub student_id: i64,
    pub student_name: String,
    pub hostel_id: Option<i64>,
    pub room_no: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Fee structures
// ─────────────────────────────────────────────────────────

pub async fn create_structure(
    pool: &SqlitePool,
    new: &NewFeeStructure,
    now: i64,
) -> Result<FeeStructure> {
    let hostel: Option<i64> = sqlx::query_scalar("SELECT id FROM hostels WHERE id = ?1")
        .bind(new.hostel_id)
        .fetch_optional(pool)
        .await?;
    if hostel.is_none() {
        return Err(ApiError::NotFound("hostel"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO fee_structures
            (hostel_id, room_type, amount, academic_year, due_date,
             payment_details, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(new.hostel_id)
    .bind(new.room_type)
    .bind(new.amount)
    .bind(&new.academic_year)
    .bind(new.due_date)
    .bind(&new.payment_details)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Validation(format!(
                "a fee structure for this hostel, room type and year {} already exists",
                new.academic_year
            ))
        } else {
            e.into()
        }
    })?;

    get_structure(pool, result.last_insert_rowid()).await
}

pub async fn get_structure(pool: &SqlitePool, id: i64) -> Result<FeeStructure> {
    with_retry(|| {
        sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT id, hostel_id, room_type, amount, academic_year, due_date,
                   payment_details, created_at
            FROM   fee_structures
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("fee structure"))
}

pub async fn list_structures(pool: &SqlitePool, hostel_id: i64) -> Result<Vec<FeeStructure>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT id, hostel_id, room_type, amount, academic_year, due_date,
                   payment_details, created_at
            FROM   fee_structures
            WHERE  hostel_id = ?1
            ORDER  BY academic_year DESC, room_type ASC
            "#,
        )
        .bind(hostel_id)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

/// Newest matching structure for a hostel and room type; used inside the
/// booking transaction.
pub async fn find_structure(
    conn: &mut SqliteConnection,
    hostel_id: i64,
    room_type: RoomType,
) -> Result<Option<FeeStructure>> {
    let row = sqlx::query_as::<_, FeeStructure>(
        r#"
        SELECT id, hostel_id, room_type, amount, academic_year, due_date,
               payment_details, created_at
        FROM   fee_structures
        WHERE  hostel_id = ?1 AND room_type = ?2
        ORDER  BY academic_year DESC, id DESC
        LIMIT  1
        "#,
    )
    .bind(hostel_id)
    .bind(room_type)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

// ─────────────────────────────────────────────────────────
// Student fees
// ─────────────────────────────────────────────────────────

/// Open a student's ledger from a fee structure: the full amount is
/// pending, nothing paid. Runs inside the booking transaction.
pub async fn create_student_fee(
    conn: &mut SqliteConnection,
    student_id: i64,
    structure: &FeeStructure,
    now: i64,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO student_fees
            (student_id, fee_structure_id, total_amount, paid_amount,
             pending_amount, due_date, created_at)
        VALUES (?1, ?2, ?3, 0, ?3, ?4, ?5)
        "#,
    )
    .bind(student_id)
    .bind(structure.id)
    .bind(structure.amount)
    .bind(structure.due_date)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn get_fee(pool: &SqlitePool, id: i64) -> Result<StudentFee> {
    with_retry(|| {
        sqlx::query_as::<_, StudentFee>(
            r#"
            SELECT id, student_id, fee_structure_id, total_amount, paid_amount,
                   pending_amount, status, due_date, created_at
            FROM   student_fees
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("student fee"))
}

pub async fn fees_for_student(pool: &SqlitePool, student_id: i64) -> Result<Vec<StudentFee>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, StudentFee>(
            r#"
            SELECT id, student_id, fee_structure_id, total_amount, paid_amount,
                   pending_amount, status, due_date, created_at
            FROM   student_fees
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

// ─────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────

pub async fn get_transaction(pool: &SqlitePool, id: i64) -> Result<FeeTransaction> {
    with_retry(|| {
        sqlx::query_as::<_, FeeTransaction>(
            r#"
            SELECT id, student_fee_id, amount, payment_method, reference, proof_ref,
                   status, remarks, created_at, decided_at
            FROM   transactions
            WHERE  id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
    })
    .await?
    .ok_or(ApiError::NotFound("transaction"))
}

pub async fn transactions_for_fee(
    pool: &SqlitePool,
    student_fee_id: i64,
) -> Result<Vec<FeeTransaction>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, FeeTransaction>(
            r#"
            SELECT id, student_fee_id, amount, payment_method, reference, proof_ref,
                   status, remarks, created_at, decided_at
            FROM   transactions
            WHERE  student_fee_id = ?1
            ORDER  BY created_at DESC, id DESC
            "#,
        )
        .bind(student_fee_id)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

/// Record a payment claim. Balances are untouched until verification, so a
/// submission alone never reduces what the student owes.
pub async fn submit_payment(
    pool: &SqlitePool,
    student_id: i64,
    payment: &SubmitPayment,
    now: i64,
) -> Result<FeeTransaction> {
    let fee = get_fee(pool, payment.student_fee_id).await?;
    if fee.student_id != student_id {
        return Err(ApiError::Forbidden);
    }
    if payment.amount <= 0 || payment.amount > fee.pending_amount {
        return Err(ApiError::InvalidAmount);
    }
    if payment.payment_method.trim().is_empty() {
        return Err(ApiError::Validation(
            "payment method is required".to_string(),
        ));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO transactions
            (student_fee_id, amount, payment_method, reference, proof_ref, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(payment.student_fee_id)
    .bind(payment.amount)
    .bind(&payment.payment_method)
    .bind(&payment.reference)
    .bind(&payment.proof_ref)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_transaction(pool, id).await
}

/// Decide a pending transaction. Approval credits the parent fee in the
/// same SQL transaction; the status guard makes the decision idempotent
/// in the failing direction (second call errors, amount applies once).
pub async fn verify(
    pool: &SqlitePool,
    transaction_id: i64,
    approve: bool,
    remarks: Option<&str>,
    now: i64,
) -> Result<(FeeTransaction, StudentFee)> {
    let mut tx = pool.begin().await?;

    let found: Option<(i64, i64)> =
        sqlx::query_as("SELECT student_fee_id, amount FROM transactions WHERE id = ?1")
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (student_fee_id, amount) = found.ok_or(ApiError::NotFound("transaction"))?;

    let next = if approve {
        TransactionStatus::Verified
    } else {
        TransactionStatus::Rejected
    };

    let decided = sqlx::query(
        r#"
        UPDATE transactions
        SET    status = ?2, remarks = COALESCE(?3, remarks), decided_at = ?4
        WHERE  id = ?1 AND status = 'pending_verification'
        "#,
    )
    .bind(transaction_id)
    .bind(next)
    .bind(remarks)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if decided == 0 {
        return Err(ApiError::AlreadyDecided);
    }

    if approve {
        // Guarded against overshooting the balance: two approvals that
        // together exceed `pending_amount` cannot both apply.
        let applied = sqlx::query(
            r#"
            UPDATE student_fees
            SET    paid_amount = paid_amount + ?2,
                   pending_amount = pending_amount - ?2,
                   status = CASE
                                WHEN pending_amount - ?2 = 0 THEN 'paid'
                                WHEN due_date < ?3 THEN 'overdue'
                                ELSE 'partial'
                            END
            WHERE  id = ?1 AND pending_amount >= ?2
            "#,
        )
        .bind(student_fee_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if applied == 0 {
            return Err(ApiError::InvalidAmount);
        }
    }

    tx.commit().await?;

    let transaction = get_transaction(pool, transaction_id).await?;
    let fee = get_fee(pool, student_fee_id).await?;
    Ok((transaction, fee))
}

/// Transactions awaiting a decision, optionally scoped to one hostel
/// (wardens see only their own students).
pub async fn pending_verifications(
    pool: &SqlitePool,
    hostel_id: Option<i64>,
) -> Result<Vec<PendingVerificationRow>> {
    let rows = with_retry(|| {
        sqlx::query_as::<_, PendingVerificationRow>(
            r#"
            SELECT t.id AS transaction_id, t.student_fee_id, t.amount,
                   t.payment_method, t.reference, t.proof_ref,
                   t.created_at AS submitted_at,
                   s.id AS student_id, s.full_name AS student_name,
                   s.hostel_id, s.room_no
            FROM   transactions t
            JOIN   student_fees f ON f.id = t.student_fee_id
            JOIN   students s ON s.id = f.student_id
            WHERE  t.status = 'pending_verification'
              AND  (?1 IS NULL OR s.hostel_id = ?1)
            ORDER  BY t.created_at ASC, t.id ASC
            "#,
        )
        .bind(hostel_id)
        .fetch_all(pool)
    })
    .await?;
    Ok(rows)
}

/// Flip unpaid fees past their due date to `overdue`. Run by the
/// background sweeper; paid fees are never touched.
pub async fn mark_overdue(pool: &SqlitePool, now: i64) -> Result<u64> {
    let flipped = sqlx::query(
        r#"
        UPDATE student_fees
        SET    status = 'overdue'
        WHERE  pending_amount > 0
          AND  due_date < ?1
          AND  status IN ('pending', 'partial')
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(flipped)
}
