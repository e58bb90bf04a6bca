//! HTTP routes and application assembly.

pub mod content;
pub mod login;

use crate::access::middleware::{protect_pages, rewrite_aliases, AppState};
use crate::access::LOGIN_PATH;
use crate::middleware::security_headers;
use axum::{middleware, routing::get, Router};
use tower_http::services::ServeDir;

/// Build the site router: login screen, node content and static files, all
/// behind the access gate.
pub fn site_router(state: AppState) -> Router {
    Router::new()
        .route(
            LOGIN_PATH,
            get(login::login_form)
                .post(login::submit_login)
                .layer(middleware::from_fn(security_headers)),
        )
        .route("/node/{id}", get(content::node))
        .fallback_service(ServeDir::new(&state.config.content_dir))
        .layer(middleware::from_fn_with_state(state.clone(), protect_pages))
        .with_state(state)
}

/// Build the full application.
///
/// Alias rewriting wraps the site router so that routing happens on the
/// rewritten path.
pub fn app(state: AppState) -> Router {
    Router::new()
        .fallback_service(site_router(state.clone()))
        .layer(middleware::from_fn_with_state(state, rewrite_aliases))
}
