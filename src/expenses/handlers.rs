use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use tracing::{info, instrument};

use super::dto::{CreateExpense, DepartmentQuery, ExpenseData, ExpenseList, UpdateExpense};
use super::services::{ensure_link_owned, prepare_create, prepare_update, present, present_written};
use crate::{
    auth::{AdminUser, AuthUser},
    error::{created, ok, ApiError, ApiResult, Envelope},
    state::AppState,
    validation::{record_id, ValidJson, ValidQuery},
};

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_expense).get(list_expenses))
        .route("/all", get(list_all_expenses))
        .route("/:id", get(get_expense).put(update_expense).delete(delete_expense))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidJson(payload): ValidJson<CreateExpense>,
) -> ApiResult<ExpenseData> {
    let (new, submitted) = prepare_create(claims.sub, payload, &state.codec)?;
    ensure_link_owned(state.cash_requests.as_ref(), new.linked_cash_request_id, claims.sub).await?;

    let row = state
        .expenses
        .create(new)
        .await
        .map_err(|e| ApiError::internal("Failed to create expense", e))?;

    info!(expense_id = %row.id, "expense created");
    created(
        Envelope::data(ExpenseData {
            expense: present_written(row, &state.codec, Some(submitted)),
        })
        .with_message("Expense created successfully"),
    )
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<ExpenseList> {
    let rows = state
        .expenses
        .list_by_user(claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve expenses", e))?;
    let views: Vec<_> = rows.into_iter().map(|r| present(r, &state.codec)).collect();
    ok(Envelope::data(ExpenseList::from(views)))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn list_all_expenses(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    ValidQuery(query): ValidQuery<DepartmentQuery>,
) -> ApiResult<ExpenseList> {
    let department = query.department.filter(|d| !d.is_empty());
    let rows = state
        .expenses
        .list_all(department)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve expenses", e))?;
    let views: Vec<_> = rows.into_iter().map(|r| present(r, &state.codec)).collect();
    ok(Envelope::data(ExpenseList::from(views)))
}

#[instrument(skip_all, fields(user_id = %claims.sub, expense_id = %id))]
pub async fn get_expense(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ExpenseData> {
    let id = record_id(&id, "Expense not found")?;
    let row = state
        .expenses
        .find(id, claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve expense", e))?
        .ok_or_else(|| ApiError::NotFound("Expense not found".into()))?;
    ok(Envelope::data(ExpenseData {
        expense: present(row, &state.codec),
    }))
}

#[instrument(skip_all, fields(user_id = %claims.sub, expense_id = %id))]
pub async fn update_expense(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateExpense>,
) -> ApiResult<ExpenseData> {
    let id = record_id(&id, "Expense not found or unauthorized")?;
    let (changes, submitted) = prepare_update(payload, &state.codec)?;
    let link = changes.linked_cash_request_id;
    ensure_link_owned(state.cash_requests.as_ref(), link, claims.sub).await?;

    let row = state
        .expenses
        .update(id, claims.sub, changes)
        .await
        .map_err(|e| ApiError::internal("Failed to update expense", e))?
        .ok_or_else(|| ApiError::NotFound("Expense not found or unauthorized".into()))?;

    info!("expense updated");
    ok(Envelope::data(ExpenseData {
        expense: present_written(row, &state.codec, submitted),
    })
    .with_message("Expense updated successfully"))
}

#[instrument(skip_all, fields(user_id = %claims.sub, expense_id = %id))]
pub async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = record_id(&id, "Expense not found or unauthorized")?;
    let removed = state
        .expenses
        .delete(id, claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to delete expense", e))?;
    if !removed {
        return Err(ApiError::NotFound("Expense not found or unauthorized".into()));
    }
    info!("expense deleted");
    ok(Envelope::message("Expense deleted successfully"))
}
