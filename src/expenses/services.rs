use tracing::warn;
use uuid::Uuid;

use super::dto::{CreateExpense, ExpenseView, UpdateExpense};
use super::repo_types::{ExpenseChanges, ExpenseRow, NewExpense};
use crate::{
    cash_requests::repo::CashRequestRepo,
    crypto::AmountCodec,
    domain::Category,
    error::{ApiError, FieldError},
    validation::Validator,
};

const LINK_FIELD: &str = "LinkedCashRequestId";

/// Validates a create payload and encrypts its amount.
/// Also returns the rounded amount for the response fallback.
pub fn prepare_create(
    user_id: Uuid,
    payload: CreateExpense,
    codec: &AmountCodec,
) -> Result<(NewExpense, f64), ApiError> {
    let mut v = Validator::new();
    let amount = v.required_amount("Amount", payload.amount, "Amount is required");
    let department = v.require_text("Department", payload.department, "Department is required");
    let date_consumed =
        v.required_date("DateConsumed", payload.date_consumed, "Date consumed is required");
    let description = v.require_text("Description", payload.description, "Description is required");
    let category = v.required_choice::<Category>(
        "ExpenseType",
        payload.expense_type,
        "Expense type is required",
        "Invalid expense type",
    );
    let linked_cash_request_id =
        v.optional_id(LINK_FIELD, payload.linked_cash_request_id, "Invalid cash request id");
    v.finish()?;

    let (
        Some((amount, rounded)),
        Some(department),
        Some(date_consumed),
        Some(description),
        Some(category),
    ) = (amount, department, date_consumed, description, category)
    else {
        return Err(ApiError::BadRequest("Validation failed".into()));
    };

    let amount_encrypted = codec
        .encrypt(&amount)
        .map_err(|e| ApiError::internal("Failed to create expense", e))?;

    Ok((
        NewExpense {
            user_id,
            linked_cash_request_id,
            amount_encrypted,
            department,
            date_consumed,
            description,
            category,
        },
        rounded,
    ))
}

pub fn prepare_update(
    payload: UpdateExpense,
    codec: &AmountCodec,
) -> Result<(ExpenseChanges, Option<f64>), ApiError> {
    let mut v = Validator::new();
    let amount = v.optional_amount("Amount", payload.amount);
    let department =
        v.optional_text("Department", payload.department, "Department cannot be empty");
    let date_consumed = v.optional_date("DateConsumed", payload.date_consumed);
    let description =
        v.optional_text("Description", payload.description, "Description cannot be empty");
    let category =
        v.optional_choice::<Category>("ExpenseType", payload.expense_type, "Invalid expense type");
    let linked_cash_request_id =
        v.optional_id(LINK_FIELD, payload.linked_cash_request_id, "Invalid cash request id");
    v.finish()?;

    let (amount_encrypted, rounded) = match amount {
        Some((input, rounded)) => {
            let token = codec
                .encrypt(&input)
                .map_err(|e| ApiError::internal("Failed to update expense", e))?;
            (Some(token), Some(rounded))
        }
        None => (None, None),
    };

    Ok((
        ExpenseChanges {
            linked_cash_request_id,
            amount_encrypted,
            department,
            date_consumed,
            description,
            category,
        },
        rounded,
    ))
}

/// An expense may only point at a cash request its owner can see.
pub async fn ensure_link_owned(
    cash_requests: &dyn CashRequestRepo,
    link: Option<Uuid>,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let Some(cash_request_id) = link else {
        return Ok(());
    };
    let found = cash_requests
        .find(cash_request_id, user_id)
        .await
        .map_err(|e| ApiError::internal("Failed to verify linked cash request", e))?;
    if found.is_none() {
        warn!(%cash_request_id, %user_id, "expense link to foreign or missing cash request");
        return Err(ApiError::Validation(vec![FieldError::new(
            LINK_FIELD,
            "Linked cash request not found",
        )]));
    }
    Ok(())
}

pub fn to_view(row: ExpenseRow, amount: f64) -> ExpenseView {
    ExpenseView {
        expense_id: row.id,
        user_id: row.user_id,
        username: row.username,
        full_name: row.full_name,
        linked_cash_request_id: row.linked_cash_request_id,
        cash_request_description: row.cash_request_description,
        amount,
        department: row.department,
        date_consumed: row.date_consumed.to_string(),
        description: row.description,
        expense_type: row.category,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn present(row: ExpenseRow, codec: &AmountCodec) -> ExpenseView {
    let amount = codec.decrypt_or_zero(&row.amount_encrypted, &row.id.to_string());
    to_view(row, amount)
}

pub fn present_written(
    row: ExpenseRow,
    codec: &AmountCodec,
    submitted: Option<f64>,
) -> ExpenseView {
    let amount = match codec.decrypt(&row.amount_encrypted) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, expense_id = %row.id, "amount decryption failed after write");
            submitted.unwrap_or(0.0)
        }
    };
    to_view(row, amount)
}
