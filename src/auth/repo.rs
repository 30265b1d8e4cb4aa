use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::claims::Role;
use crate::auth::repo_types::{NewUser, ProfileChanges, User};
use crate::db::PgRepo;

/// A username or email that is already registered.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DuplicateUser {
    #[error("email already registered")]
    Email,
    #[error("username already taken")]
    Username,
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with [`DuplicateUser`] when a unique column is taken.
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> anyhow::Result<Option<User>>;
}

const USER_COLUMNS: &str =
    "id, username, email, full_name, department, role, password_hash, created_at, updated_at";

/// Maps a unique violation on `users` to [`DuplicateUser`] by constraint name.
fn unique_violation(err: sqlx::Error) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some(c) if c.contains("username") => DuplicateUser::Username.into(),
                _ => DuplicateUser::Email.into(),
            };
        }
    }
    err.into()
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut conn = self.conn("users.create").await?;
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, full_name, department, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.department)
        .bind(Role::Member.as_str())
        .fetch_one(conn.executor()?)
        .await
        .map_err(unique_violation)?;
        conn.release();
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.conn("users.find_by_email").await?;
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.conn("users.find_by_username").await?;
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let mut conn = self.conn("users.find_by_id").await?;
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> anyhow::Result<Option<User>> {
        let mut conn = self.conn("users.update_profile").await?;
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET full_name = COALESCE($1, full_name),
                   department = COALESCE($2, department),
                   updated_at = NOW()
             WHERE id = $3
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&changes.full_name)
        .bind(&changes.department)
        .bind(id)
        .fetch_optional(conn.executor()?)
        .await?;
        conn.release();
        Ok(row)
    }
}
