//! Operational routes used by the desktop shell.
//!
//! All of them sit behind the access-control middleware; only the status
//! route is exempt.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::server::AppState;
use crate::observability::traffic::TRAFFIC_ROUTE;
use crate::security::STATUS_ROUTE;

use self::handlers::*;

pub use handlers::{FailedRoute, GatewayInfo};

pub const ENV_UPDATE_ROUTE: &str = "/api/local-env-update";
pub const VALIDATE_SECRET_ROUTE: &str = "/api/local-validate-secret";

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route(STATUS_ROUTE, get(service_status))
        .route(TRAFFIC_ROUTE, get(traffic_log).delete(clear_traffic_log))
        .route(ENV_UPDATE_ROUTE, post(env_update))
        .route(VALIDATE_SECRET_ROUTE, post(validate_secret))
}
