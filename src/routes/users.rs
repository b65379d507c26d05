use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::{Action, AuthenticatedUser},
    domain::Role,
    error::{AppError, AppResult},
    models::{User, UserSummary},
    state::AppState,
    store::users::{self, CreateUser, UserUpdate},
    utils::json::{classify_nullable, optional_bool, optional_string, NullableValue},
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: String,
    pub cfc_name: Option<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub require_password_change: bool,
}

impl From<UserSummary> for UserResponse {
    fn from(user: UserSummary) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            role: user.role,
            cfc_name: user.cfc_name,
            name: user.name,
            created_at: DateTime::from_naive_utc_and_offset(user.created_at, Utc),
            require_password_change: user.require_password_change,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            role: user.role,
            cfc_name: user.cfc_name,
            name: user.name,
            created_at: DateTime::from_naive_utc_and_offset(user.created_at, Utc),
            require_password_change: user.require_password_change,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub cfc_name: Option<String>,
    pub name: String,
    #[serde(default)]
    pub require_password_change: bool,
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<UserResponse>>> {
    user.authorize(Action::ManageUsers)?;
    let mut conn = state.db()?;
    let users = users::list_users(&mut conn)?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    user.authorize(Action::ManageUsers)?;

    let username = payload.username.trim();
    let name = payload.name.trim();
    if username.is_empty() || name.is_empty() {
        return Err(AppError::bad_request("username and name are required"));
    }
    if payload.password.is_empty() {
        return Err(AppError::bad_request("password is required"));
    }
    let cfc_name = payload
        .cfc_name
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let mut conn = state.db()?;
    let created = users::create_user(
        &mut conn,
        &CreateUser {
            username,
            password: &payload.password,
            role: payload.role,
            cfc_name,
            name,
            require_password_change: payload.require_password_change,
        },
    )?;

    info!(
        actor = %user.username,
        user_id = created.id,
        username = %created.username,
        role = %created.role,
        "user created"
    );
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageUsers)?;
    let update = parse_user_update(&body)?;

    let mut conn = state.db()?;
    if users::update_user(&mut conn, user_id, &update)? == 0 {
        return Err(AppError::not_found());
    }

    info!(actor = %user.username, user_id, "user updated");
    Ok(Json(json!({ "message": "user updated" })))
}

/// Idempotent for unknown ids. Administrator accounts are refused.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageUsers)?;

    let mut conn = state.db()?;
    if let Some(target) = users::get_user(&mut conn, user_id)? {
        if target.role == Role::Admin.as_str() {
            return Err(AppError::bad_request(
                "administrator accounts cannot be deleted",
            ));
        }
    }

    let deleted = users::delete_user(&mut conn, user_id)?;
    info!(actor = %user.username, user_id, deleted, "user deleted");
    Ok(Json(json!({ "message": "user deleted" })))
}

fn parse_user_update(body: &Value) -> AppResult<UserUpdate> {
    if !body.is_object() {
        return Err(AppError::bad_request("expected a JSON object"));
    }

    let non_blank = |field: &str| -> AppResult<Option<String>> {
        match optional_string(body, field).map_err(AppError::bad_request)? {
            Some(value) if value.trim().is_empty() => {
                Err(AppError::bad_request(format!("{field} must not be empty")))
            }
            other => Ok(other.map(|value| value.trim().to_string())),
        }
    };

    let role = optional_string(body, "role")
        .map_err(AppError::bad_request)?
        .map(|value| value.parse::<Role>())
        .transpose()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let cfc_name = match classify_nullable(body.get("cfcName")).map_err(AppError::bad_request)? {
        NullableValue::Omitted => None,
        NullableValue::Null => Some(None),
        NullableValue::String(value) if value.trim().is_empty() => Some(None),
        NullableValue::String(value) => Some(Some(value.trim().to_string())),
    };

    // An empty password field in the edit form means "keep the current one".
    let password = optional_string(body, "password")
        .map_err(AppError::bad_request)?
        .filter(|value| !value.is_empty());

    Ok(UserUpdate {
        username: non_blank("username")?,
        password,
        role,
        cfc_name,
        name: non_blank("name")?,
        require_password_change: optional_bool(body, "requirePasswordChange")
            .map_err(AppError::bad_request)?,
    })
}
