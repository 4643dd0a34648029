use crate::handlers::{
    convert_pdf_handler, health_handler, info_handler, save_edited_image_handler, AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, get_service, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Build the application router
pub fn build(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    let body_limit = state.config.max_body_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/convert-pdf/", post(convert_pdf_handler))
        .route("/save-edited-image/", post(save_edited_image_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route(
            "/",
            get_service(ServeFile::new(static_dir.join("index.html"))),
        )
        .route(
            "/editor",
            get_service(ServeFile::new(static_dir.join("editor.html"))),
        )
        .nest_service("/static", get_service(ServeDir::new(&static_dir)))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
