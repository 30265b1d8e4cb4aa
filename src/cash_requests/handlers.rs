use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use tracing::{info, instrument};

use super::dto::{CashRequestData, CashRequestList, CreateCashRequest, ListQuery, UpdateCashRequest};
use super::repo_types::CashRequestFilter;
use super::services::{prepare_create, prepare_update, present, present_written};
use crate::{
    auth::{AdminUser, AuthUser},
    domain::RequestStatus,
    error::{created, ok, ApiError, ApiResult, Envelope},
    expenses::{dto::ExpenseList, services as expense_services},
    state::AppState,
    validation::{record_id, ValidJson, ValidQuery, Validator},
};

pub fn cash_request_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cash_request).get(list_cash_requests))
        .route("/all", get(list_all_cash_requests))
        .route(
            "/:id",
            get(get_cash_request).put(update_cash_request).delete(delete_cash_request),
        )
        .route("/:id/expenses", get(linked_expenses))
}

fn to_filter(query: ListQuery) -> Result<CashRequestFilter, ApiError> {
    let mut v = Validator::new();
    let status = v.optional_choice::<RequestStatus>("Status", query.status, "Invalid status");
    v.finish()?;
    Ok(CashRequestFilter {
        status,
        department: query.department.filter(|d| !d.is_empty()),
    })
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn create_cash_request(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidJson(payload): ValidJson<CreateCashRequest>,
) -> ApiResult<CashRequestData> {
    let (new, submitted) = prepare_create(claims.sub, payload, &state.codec)?;
    let row = state
        .cash_requests
        .create(new)
        .await
        .map_err(|e| ApiError::internal("Failed to create cash request", e))?;

    info!(cash_request_id = %row.id, "cash request created");
    created(
        Envelope::data(CashRequestData {
            cash_request: present_written(row, &state.codec, Some(submitted)),
        })
        .with_message("Cash request created successfully"),
    )
}

/// The caller's own requests; `?Status=` narrows the list.
#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn list_cash_requests(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> ApiResult<CashRequestList> {
    let filter = CashRequestFilter {
        department: None,
        ..to_filter(query)?
    };
    let rows = state
        .cash_requests
        .list_by_user(claims.sub, filter)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve cash requests", e))?;
    let views: Vec<_> = rows.into_iter().map(|r| present(r, &state.codec)).collect();
    ok(Envelope::data(CashRequestList::from(views)))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn list_all_cash_requests(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> ApiResult<CashRequestList> {
    let rows = state
        .cash_requests
        .list_all(to_filter(query)?)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve cash requests", e))?;
    let views: Vec<_> = rows.into_iter().map(|r| present(r, &state.codec)).collect();
    ok(Envelope::data(CashRequestList::from(views)))
}

#[instrument(skip_all, fields(user_id = %claims.sub, cash_request_id = %id))]
pub async fn get_cash_request(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<CashRequestData> {
    let id = record_id(&id, "Cash request not found")?;
    let row = state
        .cash_requests
        .find(id, claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve cash request", e))?
        .ok_or_else(|| ApiError::NotFound("Cash request not found".into()))?;
    ok(Envelope::data(CashRequestData {
        cash_request: present(row, &state.codec),
    }))
}

#[instrument(skip_all, fields(user_id = %claims.sub, cash_request_id = %id))]
pub async fn linked_expenses(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ExpenseList> {
    let id = record_id(&id, "Cash request not found")?;
    state
        .cash_requests
        .find(id, claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve expenses", e))?
        .ok_or_else(|| ApiError::NotFound("Cash request not found".into()))?;

    let rows = state
        .expenses
        .list_by_cash_request(id, claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve expenses", e))?;
    let views: Vec<_> = rows
        .into_iter()
        .map(|r| expense_services::present(r, &state.codec))
        .collect();
    ok(Envelope::data(ExpenseList::from(views)))
}

#[instrument(skip_all, fields(user_id = %claims.sub, cash_request_id = %id))]
pub async fn update_cash_request(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateCashRequest>,
) -> ApiResult<CashRequestData> {
    let id = record_id(&id, "Cash request not found or unauthorized")?;
    let (changes, submitted) = prepare_update(payload, &state.codec)?;
    let row = state
        .cash_requests
        .update(id, claims.sub, changes)
        .await
        .map_err(|e| ApiError::internal("Failed to update cash request", e))?
        .ok_or_else(|| ApiError::NotFound("Cash request not found or unauthorized".into()))?;

    info!(status = %row.status, "cash request updated");
    ok(Envelope::data(CashRequestData {
        cash_request: present_written(row, &state.codec, submitted),
    })
    .with_message("Cash request updated successfully"))
}

#[instrument(skip_all, fields(user_id = %claims.sub, cash_request_id = %id))]
pub async fn delete_cash_request(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = record_id(&id, "Cash request not found or unauthorized")?;
    let removed = state
        .cash_requests
        .delete(id, claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to delete cash request", e))?;
    if !removed {
        return Err(ApiError::NotFound("Cash request not found or unauthorized".into()));
    }
    info!("cash request deleted");
    ok(Envelope::message("Cash request deleted successfully"))
}
