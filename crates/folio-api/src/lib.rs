pub mod auth;
pub mod cleanup;
pub mod comments;
pub mod config;
pub mod error;
pub mod favorites;
pub mod forms;
pub mod images;
pub mod mailer;
pub mod media;
pub mod messages;
pub mod middleware;
pub mod password;
pub mod profiles;
pub mod projects;
pub mod state;
pub mod threads;
pub mod uploads;
pub mod validate;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

pub use state::{AppState, AppStateInner};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// The full application: `/api` routes, `/media` file serving and `/health`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/password-reset", post(password::request_reset))
        .route("/auth/password-reset/confirm", post(password::confirm_reset))
        .route("/users/me", get(profiles::get_me).patch(profiles::update_me))
        .route("/profiles/{username}", get(profiles::get_public))
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route("/projects/mine", get(projects::my_projects))
        .route(
            "/projects/{project_id}",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/projects/{project_id}/images",
            get(images::list_images).post(images::upload_images),
        )
        .route(
            "/projects/{project_id}/images/{image_id}",
            axum::routing::patch(images::update_image).delete(images::delete_image),
        )
        .route(
            "/projects/{project_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/projects/{project_id}/comments/{comment_id}",
            get(comments::get_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        )
        .route(
            "/projects/{project_id}/favorite",
            get(favorites::favorite_status)
                .post(favorites::add_favorite)
                .delete(favorites::remove_favorite),
        )
        .route("/favorites/projects", get(favorites::list_favorites))
        .route(
            "/projects/{project_id}/threads",
            get(threads::get_project_thread).post(threads::start_project_thread),
        )
        .route(
            "/projects/{project_id}/threads/{thread_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/threads/{thread_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/inbox/threads", get(threads::inbox))
        .route("/inbox/threads/{thread_id}/actions", post(threads::thread_action))
        .route("/inbox/blocked", get(threads::blocked))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::authenticate))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api)
        .nest_service("/media", ServeDir::new(state.media.root()))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

/// Parse a stored id. Ids are generated by this crate, so a failure means a
/// corrupt row; it is logged and mapped to the nil UUID.
pub(crate) fn uuid_of(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}
