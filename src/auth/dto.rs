use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{claims::Role, repo_types::User};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for profile changes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub department: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub department: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        let role = u.role();
        Self {
            user_id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            department: u.department,
            role,
            created_at: u.created_at,
        }
    }
}

/// Response data returned after register or login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthData {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserData {
    pub user: PublicUser,
}
