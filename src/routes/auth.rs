use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    auth::{jwt::TokenSubject, password, Action, AuthenticatedUser},
    domain::Role,
    error::{AppError, AppResult},
    models::User,
    state::AppState,
    store::users::{self, MIN_PASSWORD_LEN},
    utils::json::optional_string,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub cfc_name: Option<String>,
    pub name: String,
    pub require_password_change: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: SessionUser,
}

/// Why a login failed. Logged, never shown to the caller.
#[derive(Debug, Clone, Copy)]
enum LoginFailure {
    UserNotFound,
    InvalidPassword,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let mut conn = state.db()?;

    let user = users::get_user_by_username(&mut conn, payload.username.trim())?;
    let outcome = match user {
        None => Err(LoginFailure::UserNotFound),
        Some(user) => {
            let valid = password::verify_password(&payload.password, &user.password_hash)
                .map_err(AppError::internal)?;
            if valid {
                Ok(user)
            } else {
                Err(LoginFailure::InvalidPassword)
            }
        }
    };

    let user = outcome.map_err(|reason| {
        warn!(username = %payload.username, reason = ?reason, "login rejected");
        AppError::invalid_credentials()
    })?;

    info!(user_id = user.id, username = %user.username, "login succeeded");
    Ok(Json(issue_session(&state, &user)?))
}

pub async fn me(user: AuthenticatedUser) -> AppResult<Json<AuthenticatedUser>> {
    user.authorize(Action::ViewSelf)?;
    Ok(Json(user))
}

/// Sets the caller's own password and returns a session whose claims no
/// longer demand a change.
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<SessionResponse>> {
    user.authorize(Action::ChangeOwnPassword)?;

    let new_password = optional_string(&body, "newPassword")
        .map_err(AppError::bad_request)?
        .ok_or_else(|| AppError::bad_request("newPassword is required"))?;
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let mut conn = state.db()?;
    if users::change_own_password(&mut conn, user.id, &new_password)? == 0 {
        return Err(AppError::not_found());
    }
    let stored = users::get_user(&mut conn, user.id)?.ok_or_else(AppError::not_found)?;

    info!(user_id = user.id, username = %user.username, "password changed");
    Ok(Json(issue_session(&state, &stored)?))
}

pub(crate) fn issue_session(state: &AppState, user: &User) -> AppResult<SessionResponse> {
    let role: Role = user.role.parse().map_err(AppError::internal)?;
    let token = state.jwt.generate_token(&TokenSubject {
        user_id: user.id,
        username: &user.username,
        role,
        cfc_name: user.cfc_name.as_deref(),
        name: &user.name,
        require_password_change: user.require_password_change,
    })?;

    Ok(SessionResponse {
        token,
        user: SessionUser {
            id: user.id.to_string(),
            username: user.username.clone(),
            role,
            cfc_name: user.cfc_name.clone(),
            name: user.name.clone(),
            require_password_change: user.require_password_change,
        },
    })
}
