use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCashRequest {
    pub amount_used: Option<Value>,
    pub department: Option<String>,
    pub date_of_needed: Option<String>,
    pub description: Option<String>,
    pub expense_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateCashRequest {
    pub amount_used: Option<Value>,
    pub department: Option<String>,
    pub date_of_needed: Option<String>,
    pub description: Option<String>,
    pub expense_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub department: Option<String>,
}

/// Cash request as returned to clients, with the amount decrypted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CashRequestView {
    pub cash_request_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub amount_used: f64,
    pub department: String,
    pub date_of_needed: String,
    pub description: String,
    pub expense_type: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CashRequestData {
    pub cash_request: CashRequestView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CashRequestList {
    pub cash_requests: Vec<CashRequestView>,
    pub count: usize,
}

impl From<Vec<CashRequestView>> for CashRequestList {
    fn from(cash_requests: Vec<CashRequestView>) -> Self {
        Self {
            count: cash_requests.len(),
            cash_requests,
        }
    }
}
