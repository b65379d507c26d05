pub mod jwt;
pub mod password;
pub mod permissions;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{
    domain::Role,
    error::{AppError, AppResult},
    state::AppState,
};

pub use permissions::Action;

/// Identity taken from a verified bearer token. Claims are trusted as-is until
/// the token expires; the user row is not re-read per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub cfc_name: Option<String>,
    pub name: String,
    pub require_password_change: bool,
}

impl AuthenticatedUser {
    pub fn authorize(&self, action: Action) -> AppResult<()> {
        if permissions::is_allowed(self.role, action) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role,
                action = ?action,
                "permission denied"
            );
            Err(AppError::forbidden())
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::invalid_token())?;

        Ok(AuthenticatedUser {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
            cfc_name: claims.cfc_name,
            name: claims.name,
            require_password_change: claims.require_password_change,
        })
    }
}
