use tracing::warn;
use uuid::Uuid;

use super::dto::{CashRequestView, CreateCashRequest, UpdateCashRequest};
use super::repo_types::{CashRequestChanges, CashRequestRow, NewCashRequest};
use crate::{
    crypto::AmountCodec,
    domain::{Category, RequestStatus},
    error::ApiError,
    validation::Validator,
};

/// Validates a create payload and encrypts its amount.
/// Also returns the rounded amount for the response fallback.
pub fn prepare_create(
    user_id: Uuid,
    payload: CreateCashRequest,
    codec: &AmountCodec,
) -> Result<(NewCashRequest, f64), ApiError> {
    let mut v = Validator::new();
    let amount = v.required_amount("AmountUsed", payload.amount_used, "Amount is required");
    let department = v.require_text("Department", payload.department, "Department is required");
    let date_needed =
        v.required_date("DateOfNeeded", payload.date_of_needed, "Date of needed is required");
    let description = v.require_text("Description", payload.description, "Description is required");
    let category = v.required_choice::<Category>(
        "ExpenseType",
        payload.expense_type,
        "Expense type is required",
        "Invalid expense type",
    );
    v.finish()?;

    let (
        Some((amount, rounded)),
        Some(department),
        Some(date_needed),
        Some(description),
        Some(category),
    ) = (amount, department, date_needed, description, category)
    else {
        return Err(ApiError::BadRequest("Validation failed".into()));
    };

    let amount_encrypted = codec
        .encrypt(&amount)
        .map_err(|e| ApiError::internal("Failed to create cash request", e))?;

    Ok((
        NewCashRequest {
            user_id,
            amount_encrypted,
            department,
            date_needed,
            description,
            category,
        },
        rounded,
    ))
}

/// Validates a partial update; absent fields stay untouched.
pub fn prepare_update(
    payload: UpdateCashRequest,
    codec: &AmountCodec,
) -> Result<(CashRequestChanges, Option<f64>), ApiError> {
    let mut v = Validator::new();
    let amount = v.optional_amount("AmountUsed", payload.amount_used);
    let department =
        v.optional_text("Department", payload.department, "Department cannot be empty");
    let date_needed = v.optional_date("DateOfNeeded", payload.date_of_needed);
    let description =
        v.optional_text("Description", payload.description, "Description cannot be empty");
    let category =
        v.optional_choice::<Category>("ExpenseType", payload.expense_type, "Invalid expense type");
    let status = v.optional_choice::<RequestStatus>("Status", payload.status, "Invalid status");
    v.finish()?;

    let (amount_encrypted, rounded) = match amount {
        Some((input, rounded)) => {
            let token = codec
                .encrypt(&input)
                .map_err(|e| ApiError::internal("Failed to update cash request", e))?;
            (Some(token), Some(rounded))
        }
        None => (None, None),
    };

    Ok((
        CashRequestChanges {
            amount_encrypted,
            department,
            date_needed,
            description,
            category,
            status,
        },
        rounded,
    ))
}

pub fn to_view(row: CashRequestRow, amount_used: f64) -> CashRequestView {
    CashRequestView {
        cash_request_id: row.id,
        user_id: row.user_id,
        username: row.username,
        full_name: row.full_name,
        amount_used,
        department: row.department,
        date_of_needed: row.date_needed.to_string(),
        description: row.description,
        expense_type: row.category,
        status: row.status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Read path: unreadable amounts are shown as 0.
pub fn present(row: CashRequestRow, codec: &AmountCodec) -> CashRequestView {
    let amount = codec.decrypt_or_zero(&row.amount_encrypted, &row.id.to_string());
    to_view(row, amount)
}

/// Write path: falls back to the amount the client just sent.
pub fn present_written(
    row: CashRequestRow,
    codec: &AmountCodec,
    submitted: Option<f64>,
) -> CashRequestView {
    let amount = match codec.decrypt(&row.amount_encrypted) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, cash_request_id = %row.id, "amount decryption failed after write");
            submitted.unwrap_or(0.0)
        }
    };
    to_view(row, amount)
}
