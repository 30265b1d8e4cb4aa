use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::{Category, RequestStatus};

/// Cash request joined with its owner's name.
#[derive(Debug, Clone, FromRow)]
pub struct CashRequestRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_encrypted: String, // `<hex-iv>:<hex-ciphertext>`, never plaintext
    pub department: String,
    pub date_needed: Date,
    pub description: String,
    pub category: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct NewCashRequest {
    pub user_id: Uuid,
    pub amount_encrypted: String,
    pub department: String,
    pub date_needed: Date,
    pub description: String,
    pub category: Category,
}

/// Partial update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct CashRequestChanges {
    pub amount_encrypted: Option<String>,
    pub department: Option<String>,
    pub date_needed: Option<Date>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct CashRequestFilter {
    pub status: Option<RequestStatus>,
    pub department: Option<String>,
}
