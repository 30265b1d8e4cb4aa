use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthData, LoginRequest, PublicUser, RegisterRequest, UpdateProfileRequest, UserData},
        jwt::{AuthUser, JwtKeys},
        password::{hash_password_blocking, verify_password_blocking},
        repo::DuplicateUser,
        repo_types::{NewUser, ProfileChanges},
    },
    error::{created, ok, ApiError, ApiResult, Envelope},
    state::AppState,
    validation::{is_valid_email, ValidJson, Validator},
};

const MIN_PASSWORD_LEN: usize = 6;
const EMAIL_TAKEN: &str = "User with this email already exists";
const USERNAME_TAKEN: &str = "Username is already taken";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_me).put(update_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> ApiResult<AuthData> {
    let mut v = Validator::new();

    let username = payload.username.unwrap_or_default();
    v.length("Username", &username, 3, 100, "Username must be between 3 and 100 characters");

    let email = payload.email.unwrap_or_default().to_lowercase();
    if !is_valid_email(&email) {
        v.error("Email", "Please provide a valid email");
    }

    let password = payload.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        v.error("Password", "Password must be at least 6 characters long");
    }

    let full_name = payload.full_name.unwrap_or_default();
    if full_name.is_empty() {
        v.error("FullName", "Full name is required");
    }
    let department = payload.department.filter(|d| !d.is_empty());
    v.finish()?;

    if state
        .users
        .find_by_email(&email)
        .await
        .map_err(|e| ApiError::internal("Failed to register user", e))?
        .is_some()
    {
        warn!(email = %email, "email already registered");
        return Err(ApiError::BadRequest(EMAIL_TAKEN.into()));
    }
    if state
        .users
        .find_by_username(&username)
        .await
        .map_err(|e| ApiError::internal("Failed to register user", e))?
        .is_some()
    {
        warn!(username = %username, "username already taken");
        return Err(ApiError::BadRequest(USERNAME_TAKEN.into()));
    }

    let password_hash = hash_password_blocking(password)
        .await
        .map_err(|e| ApiError::internal("Failed to register user", e))?;

    let user = state
        .users
        .create(NewUser {
            username,
            email,
            password_hash,
            full_name,
            department,
        })
        .await
        .map_err(registration_failure)?;

    let token = JwtKeys::from_ref(&state)
        .sign(&user)
        .map_err(|e| ApiError::internal("Failed to register user", e))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    created(
        Envelope::data(AuthData {
            user: PublicUser::from(user),
            token,
        })
        .with_message("User registered successfully"),
    )
}

/// A concurrent registration can win the race past the duplicate checks.
fn registration_failure(err: anyhow::Error) -> ApiError {
    match err.downcast_ref::<DuplicateUser>() {
        Some(DuplicateUser::Email) => ApiError::BadRequest(EMAIL_TAKEN.into()),
        Some(DuplicateUser::Username) => ApiError::BadRequest(USERNAME_TAKEN.into()),
        None => ApiError::internal("Failed to register user", err),
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> ApiResult<AuthData> {
    let mut v = Validator::new();
    let email = payload.email.unwrap_or_default().to_lowercase();
    if !is_valid_email(&email) {
        v.error("Email", "Please provide a valid email");
    }
    let password = payload.password.unwrap_or_default();
    if password.is_empty() {
        v.error("Password", "Password is required");
    }
    v.finish()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let user = match state.users.find_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %email, "login unknown email");
            return Err(invalid());
        }
        Err(e) => return Err(ApiError::internal("Failed to login", e)),
    };

    let valid = verify_password_blocking(password, user.password_hash.clone())
        .await
        .map_err(|e| ApiError::internal("Failed to login", e))?;
    if !valid {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    let token = JwtKeys::from_ref(&state)
        .sign(&user)
        .map_err(|e| ApiError::internal("Failed to login", e))?;

    info!(user_id = %user.id, "user logged in");
    ok(Envelope::data(AuthData {
        user: PublicUser::from(user),
        token,
    })
    .with_message("Login successful"))
}

/// Tokens are not revoked; the client discards its copy.
#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn logout(AuthUser(claims): AuthUser) -> ApiResult<()> {
    info!("user logged out");
    ok(Envelope::message("Logout successful"))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<UserData> {
    let user = state
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(|e| ApiError::internal("Failed to get user profile", e))?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    ok(Envelope::data(UserData {
        user: PublicUser::from(user),
    }))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> ApiResult<UserData> {
    let mut v = Validator::new();
    let full_name = v.optional_text("FullName", payload.full_name, "Full name cannot be empty");
    let department =
        v.optional_text("Department", payload.department, "Department cannot be empty");
    v.finish()?;

    let user = state
        .users
        .update_profile(claims.sub, ProfileChanges { full_name, department })
        .await
        .map_err(|e| ApiError::internal("Failed to update profile", e))?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!("profile updated");
    ok(Envelope::data(UserData {
        user: PublicUser::from(user),
    })
    .with_message("Profile updated successfully"))
}
