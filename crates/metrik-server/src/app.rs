use crate::state::AppState;
use crate::{api, logging};
use axum::middleware;
use axum::Router;

pub fn build_http_app(state: AppState) -> Router {
    api::metric_routes()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::decrypt_body,
        ))
        .with_state(state)
        .layer(middleware::from_fn(logging::request_logging))
}
