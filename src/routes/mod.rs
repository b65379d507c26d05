use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod health;
pub mod lotes;
pub mod server_info;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_deref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = %value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let me_routes = Router::new()
        .route("/", get(auth::me))
        .route("/password", put(auth::change_password));

    let users_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/:id",
            put(users::update_user).delete(users::delete_user),
        );

    let lotes_routes = Router::new()
        .route("/", get(lotes::list_lotes).post(lotes::create_lote))
        .route("/import", post(lotes::import_lote))
        .route("/:id", delete(lotes::delete_lote))
        .route("/:id/status", put(lotes::update_lote_status))
        .route("/:id/pdf", get(lotes::download_pdf));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/me", me_routes)
        .nest("/api/users", users_routes)
        .nest("/api/lotes", lotes_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let upload_limit = state.config.upload_max_bytes;

    Router::new()
        .merge(protected_routes)
        .route("/api/login", post(auth::login))
        .route("/api/server-info", get(server_info::server_info))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(upload_limit))
}
