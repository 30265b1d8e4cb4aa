use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateExpense {
    pub amount: Option<Value>,
    pub department: Option<String>,
    pub date_consumed: Option<String>,
    pub description: Option<String>,
    pub expense_type: Option<String>,
    pub linked_cash_request_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateExpense {
    pub amount: Option<Value>,
    pub department: Option<String>,
    pub date_consumed: Option<String>,
    pub description: Option<String>,
    pub expense_type: Option<String>,
    pub linked_cash_request_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DepartmentQuery {
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseView {
    pub expense_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub linked_cash_request_id: Option<Uuid>,
    pub cash_request_description: Option<String>,
    pub amount: f64,
    pub department: String,
    pub date_consumed: String,
    pub description: String,
    pub expense_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseData {
    pub expense: ExpenseView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseList {
    pub expenses: Vec<ExpenseView>,
    pub count: usize,
}

impl From<Vec<ExpenseView>> for ExpenseList {
    fn from(expenses: Vec<ExpenseView>) -> Self {
        Self {
            count: expenses.len(),
            expenses,
        }
    }
}
