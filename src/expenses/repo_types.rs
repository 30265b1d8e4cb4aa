use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::Category;

/// Expense joined with its owner and, when linked, the cash request description.
#[derive(Debug, Clone, FromRow)]
pub struct ExpenseRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub linked_cash_request_id: Option<Uuid>,
    pub amount_encrypted: String,
    pub department: String,
    pub date_consumed: Date,
    pub description: String,
    pub category: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub username: String,
    pub full_name: String,
    pub cash_request_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub user_id: Uuid,
    pub linked_cash_request_id: Option<Uuid>,
    pub amount_encrypted: String,
    pub department: String,
    pub date_consumed: Date,
    pub description: String,
    pub category: Category,
}

/// Partial update. A `None` link keeps the current link; it is never cleared here.
#[derive(Debug, Clone, Default)]
pub struct ExpenseChanges {
    pub linked_cash_request_id: Option<Uuid>,
    pub amount_encrypted: Option<String>,
    pub department: Option<String>,
    pub date_consumed: Option<Date>,
    pub description: Option<String>,
    pub category: Option<Category>,
}
