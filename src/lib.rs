pub mod circles;
pub mod config;
pub mod protocol;
pub mod session;

use std::sync::Arc;

use axum::{http::StatusCode, response::{IntoResponse, Response}, routing::get, Router};
use tower_http::cors::CorsLayer;

pub use circles::{Circle, Registry};
pub use config::Config;
pub use session::Session;

#[derive(Clone, Debug)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            registry: Arc::new(Registry::new(config.history_capacity)),
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = state.config.cors_permissive;
    let router = Router::new()
        .route("/healthz", get(healthz))
        .merge(circles::router())
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn healthz() -> &'static str {
    "ok"
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub StatusCode, pub anyhow::Error);

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, anyhow::Error::msg(what.into()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Self(status, err) = self;
        if status.is_server_error() {
            tracing::error!("request failed: {err:#}");
            (status, format!("{}\n\n{}", err, err.backtrace())).into_response()
        } else {
            (status, err.to_string()).into_response()
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}
