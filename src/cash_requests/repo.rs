use async_trait::async_trait;
use uuid::Uuid;

use crate::cash_requests::repo_types::{
    CashRequestChanges, CashRequestFilter, CashRequestRow, NewCashRequest,
};
use crate::db::PgRepo;
use crate::domain::{Category, RequestStatus};

/// Every method taking a `user_id` only sees rows owned by that user.
#[async_trait]
pub trait CashRequestRepo: Send + Sync {
    async fn create(&self, new: NewCashRequest) -> anyhow::Result<CashRequestRow>;
    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: CashRequestFilter,
    ) -> anyhow::Result<Vec<CashRequestRow>>;
    async fn list_all(&self, filter: CashRequestFilter) -> anyhow::Result<Vec<CashRequestRow>>;
    async fn find(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<CashRequestRow>>;
    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: CashRequestChanges,
    ) -> anyhow::Result<Option<CashRequestRow>>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
}

const SELECT_JOINED: &str = r#"
    SELECT cr.id, cr.user_id, cr.amount_encrypted, cr.department, cr.date_needed,
           cr.description, cr.category, cr.status, cr.created_at, cr.updated_at,
           u.username, u.full_name
      FROM cash_requests cr
      JOIN users u ON u.id = cr.user_id
"#;

#[async_trait]
impl CashRequestRepo for PgRepo {
    async fn create(&self, new: NewCashRequest) -> anyhow::Result<CashRequestRow> {
        let mut conn = self.conn("cash_requests.create").await?;
        let row = sqlx::query_as::<_, CashRequestRow>(
            r#"
            WITH cr AS (
                INSERT INTO cash_requests
                    (user_id, amount_encrypted, department, date_needed, description, category)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT cr.id, cr.user_id, cr.amount_encrypted, cr.department, cr.date_needed,
                   cr.description, cr.category, cr.status, cr.created_at, cr.updated_at,
                   u.username, u.full_name
              FROM cr
              JOIN users u ON u.id = cr.user_id
            "#,
        )
        .bind(new.user_id)
        .bind(&new.amount_encrypted)
        .bind(&new.department)
        .bind(new.date_needed)
        .bind(&new.description)
        .bind(new.category.as_str())
        .fetch_one(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: CashRequestFilter,
    ) -> anyhow::Result<Vec<CashRequestRow>> {
        let mut conn = self.conn("cash_requests.list_by_user").await?;
        let rows = sqlx::query_as::<_, CashRequestRow>(&format!(
            r#"{SELECT_JOINED}
             WHERE cr.user_id = $1
               AND ($2::text IS NULL OR cr.status = $2)
               AND ($3::text IS NULL OR cr.department = $3)
             ORDER BY cr.created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(filter.status.map(RequestStatus::as_str))
        .bind(filter.department.as_deref())
        .fetch_all(conn.executor()?)
        .await?;
        conn.release();
        Ok(rows)
    }

    async fn list_all(&self, filter: CashRequestFilter) -> anyhow::Result<Vec<CashRequestRow>> {
        let mut conn = self.conn("cash_requests.list_all").await?;
        let rows = sqlx::query_as::<_, CashRequestRow>(&format!(
            r#"{SELECT_JOINED}
             WHERE ($1::text IS NULL OR cr.status = $1)
               AND ($2::text IS NULL OR cr.department = $2)
             ORDER BY cr.created_at DESC
            "#
        ))
        .bind(filter.status.map(RequestStatus::as_str))
        .bind(filter.department.as_deref())
        .fetch_all(conn.executor()?)
        .await?;
        conn.release();
        Ok(rows)
    }

    async fn find(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<CashRequestRow>> {
        let mut conn = self.conn("cash_requests.find").await?;
        let row = sqlx::query_as::<_, CashRequestRow>(&format!(
            "{SELECT_JOINED} WHERE cr.id = $1 AND cr.user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: CashRequestChanges,
    ) -> anyhow::Result<Option<CashRequestRow>> {
        let mut conn = self.conn("cash_requests.update").await?;
        let row = sqlx::query_as::<_, CashRequestRow>(
            r#"
            WITH cr AS (
                UPDATE cash_requests
                   SET amount_encrypted = COALESCE($1, amount_encrypted),
                       department = COALESCE($2, department),
                       date_needed = COALESCE($3, date_needed),
                       description = COALESCE($4, description),
                       category = COALESCE($5, category),
                       status = COALESCE($6, status),
                       updated_at = NOW()
                 WHERE id = $7 AND user_id = $8
                RETURNING *
            )
            SELECT cr.id, cr.user_id, cr.amount_encrypted, cr.department, cr.date_needed,
                   cr.description, cr.category, cr.status, cr.created_at, cr.updated_at,
                   u.username, u.full_name
              FROM cr
              JOIN users u ON u.id = cr.user_id
            "#,
        )
        .bind(changes.amount_encrypted.as_deref())
        .bind(changes.department.as_deref())
        .bind(changes.date_needed)
        .bind(changes.description.as_deref())
        .bind(changes.category.map(Category::as_str))
        .bind(changes.status.map(RequestStatus::as_str))
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut conn = self.conn("cash_requests.delete").await?;
        let result = sqlx::query("DELETE FROM cash_requests WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(conn.executor()?)
            .await?;
        conn.release();
        Ok(result.rows_affected() > 0)
    }
}
