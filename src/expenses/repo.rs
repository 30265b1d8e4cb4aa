use async_trait::async_trait;
use uuid::Uuid;

use crate::db::PgRepo;
use crate::domain::Category;
use crate::expenses::repo_types::{ExpenseChanges, ExpenseRow, NewExpense};

/// Every method taking a `user_id` only sees rows owned by that user.
#[async_trait]
pub trait ExpenseRepo: Send + Sync {
    async fn create(&self, new: NewExpense) -> anyhow::Result<ExpenseRow>;
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ExpenseRow>>;
    async fn list_all(&self, department: Option<String>) -> anyhow::Result<Vec<ExpenseRow>>;
    async fn list_by_cash_request(
        &self,
        cash_request_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<ExpenseRow>>;
    async fn find(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<ExpenseRow>>;
    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: ExpenseChanges,
    ) -> anyhow::Result<Option<ExpenseRow>>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
}

/// Columns read from an `e` relation joined by [`JOINS`].
const COLUMNS: &str = r#"
    e.id, e.user_id, e.linked_cash_request_id, e.amount_encrypted, e.department,
    e.date_consumed, e.description, e.category, e.created_at, e.updated_at,
    u.username, u.full_name, cr.description AS cash_request_description
"#;

const JOINS: &str = r#"
    JOIN users u ON u.id = e.user_id
    LEFT JOIN cash_requests cr ON cr.id = e.linked_cash_request_id
"#;

#[async_trait]
impl ExpenseRepo for PgRepo {
    async fn create(&self, new: NewExpense) -> anyhow::Result<ExpenseRow> {
        let mut conn = self.conn("expenses.create").await?;
        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            r#"
            WITH e AS (
                INSERT INTO expenses
                    (user_id, linked_cash_request_id, amount_encrypted, department,
                     date_consumed, description, category)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT {COLUMNS} FROM e {JOINS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.linked_cash_request_id)
        .bind(&new.amount_encrypted)
        .bind(&new.department)
        .bind(new.date_consumed)
        .bind(&new.description)
        .bind(new.category.as_str())
        .fetch_one(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ExpenseRow>> {
        let mut conn = self.conn("expenses.list_by_user").await?;
        let rows = sqlx::query_as::<_, ExpenseRow>(&format!(
            r#"SELECT {COLUMNS} FROM expenses e {JOINS}
             WHERE e.user_id = $1
             ORDER BY e.created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(conn.executor()?)
        .await?;
        conn.release();
        Ok(rows)
    }

    async fn list_all(&self, department: Option<String>) -> anyhow::Result<Vec<ExpenseRow>> {
        let mut conn = self.conn("expenses.list_all").await?;
        let rows = sqlx::query_as::<_, ExpenseRow>(&format!(
            r#"SELECT {COLUMNS} FROM expenses e {JOINS}
             WHERE ($1::text IS NULL OR e.department = $1)
             ORDER BY e.created_at DESC
            "#
        ))
        .bind(department.as_deref())
        .fetch_all(conn.executor()?)
        .await?;
        conn.release();
        Ok(rows)
    }

    async fn list_by_cash_request(
        &self,
        cash_request_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<ExpenseRow>> {
        let mut conn = self.conn("expenses.list_by_cash_request").await?;
        let rows = sqlx::query_as::<_, ExpenseRow>(&format!(
            r#"SELECT {COLUMNS} FROM expenses e {JOINS}
             WHERE e.linked_cash_request_id = $1 AND e.user_id = $2
             ORDER BY e.created_at DESC
            "#
        ))
        .bind(cash_request_id)
        .bind(user_id)
        .fetch_all(conn.executor()?)
        .await?;
        conn.release();
        Ok(rows)
    }

    async fn find(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<ExpenseRow>> {
        let mut conn = self.conn("expenses.find").await?;
        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {COLUMNS} FROM expenses e {JOINS} WHERE e.id = $1 AND e.user_id = $2"
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
        changes: ExpenseChanges,
    ) -> anyhow::Result<Option<ExpenseRow>> {
        let mut conn = self.conn("expenses.update").await?;
        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            r#"
            WITH e AS (
                UPDATE expenses
                   SET linked_cash_request_id = COALESCE($1, linked_cash_request_id),
                       amount_encrypted = COALESCE($2, amount_encrypted),
                       department = COALESCE($3, department),
                       date_consumed = COALESCE($4, date_consumed),
                       description = COALESCE($5, description),
                       category = COALESCE($6, category),
                       updated_at = NOW()
                 WHERE id = $7 AND user_id = $8
                RETURNING *
            )
            SELECT {COLUMNS} FROM e {JOINS}
            "#
        ))
        .bind(changes.linked_cash_request_id)
        .bind(changes.amount_encrypted.as_deref())
        .bind(changes.department.as_deref())
        .bind(changes.date_consumed)
        .bind(changes.description.as_deref())
        .bind(changes.category.map(Category::as_str))
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut conn = self.conn("expenses.delete").await?;
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(conn.executor()?)
            .await?;
        conn.release();
        Ok(result.rows_affected() > 0)
    }
}
