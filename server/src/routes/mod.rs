mod handlers;

use axum::{
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{server_config::cfg, ServerState};

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        let origins = cfg
            .frontend
            .allowed_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>().unwrap())
            .collect::<Vec<_>>();

        let cors_layer = CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true);

        Router::new()
            .route("/", get(|| async { "Mailsona server" }))
            .route("/store-gmail-token", post(handlers::store_gmail_token))
            .route("/connect-gmail", post(handlers::connect_gmail))
            .route("/logout-gmail", post(handlers::logout_gmail))
            .route("/draft-reply", post(handlers::draft_reply))
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer)
            .with_state(state)
            .fallback(handler_404)
    }
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
