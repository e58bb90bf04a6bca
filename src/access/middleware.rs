//! Axum state, extractors and the request-path middleware.

use crate::access::gate::{AccessGate, AliasTable, Principal, LOGIN_PATH};
use crate::access::session::{now_secs, UnlockState};
use crate::access::verify::verify_password;
use crate::config::Config;
use crate::error::AppError;
use crate::middleware::kill_page_cache;
use crate::models::ContentEntity;
use crate::storage;
use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::Arc;

/// Bytes escaped again when a decoded path segment goes back into a URI.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub redis: redis::Client,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection error: {}", e)))
    }
}

/// Principal extractor.
///
/// A valid `Authorization: Bearer {token}` matching `ADMIN_TOKEN_HASH` makes
/// the request the super-user; everyone else is anonymous with the configured
/// capabilities. The result is cached in the request extensions.
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let principal = match (bearer, state.config.admin_token_hash.as_deref()) {
            (Some(token), Some(hash)) if verify_password(token, Some(hash)) => {
                Principal::super_user()
            }
            (Some(_), _) => {
                tracing::warn!(action = "admin_token_rejected", "Invalid admin token");
                Principal::anonymous(state.config.anonymous_capabilities.clone())
            }
            (None, _) => Principal::anonymous(state.config.anonymous_capabilities.clone()),
        };

        parts.extensions.insert(principal.clone());
        Ok(principal)
    }
}

/// Read the session token from the `Cookie` header.
///
/// Values that could not have been issued by us are ignored.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value)
        .filter(|value| {
            value.len() == 43
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
        .map(str::to_string)
}

/// `Set-Cookie` value carrying the session token.
pub fn session_cookie(config: &Config, token: &str) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.session_cookie_name, token, config.session_ttl_secs
    );
    if config.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(format!("Invalid session cookie: {}", e)))
}

/// Redirect to the login screen for `page_id`, remembering `destination`.
///
/// The redirect is marked uncacheable.
pub fn login_redirect(page_id: u64, destination: &str) -> Response {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("protected_page", &page_id.to_string())
        .append_pair("destination", destination)
        .finish();

    let mut response = (
        StatusCode::FOUND,
        [(header::LOCATION, format!("{}?{}", LOGIN_PATH, query))],
    )
        .into_response();
    kill_page_cache(&mut response);
    response
}

/// Path as the file server resolves it: percent-decoded, empty and `.`
/// segments dropped, no trailing slash except on `/`.
///
/// Every gate decision and alias lookup runs on this form.
pub fn normalize_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    let segments: Vec<&str> = decoded
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

/// Re-encoded [`normalize_path`] for routing. A trailing slash survives so
/// directory index lookups keep working.
pub fn canonical_uri_path(raw: &str) -> String {
    let normalized = normalize_path(raw);
    let mut out: String = normalized
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    if out != "/" && percent_decode_str(raw).decode_utf8_lossy().ends_with('/') {
        out.push('/');
    }
    out
}

/// Inbound path processing: canonicalize the request path and rewrite an
/// aliased path to its system path.
///
/// Must wrap the router (not be a route layer) so routing sees the rewritten
/// URI. The loaded alias table is handed on through the request extensions.
pub async fn rewrite_aliases(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut con = state.connection().await?;
    let aliases = storage::aliases::load_alias_table(&mut con).await?;

    let raw = request.uri().path();
    let path = match aliases.lookup(&normalize_path(raw)) {
        Some(system_path) => system_path.to_string(),
        None => canonical_uri_path(raw),
    };
    let rewritten = match request.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };
    match rewritten.parse::<Uri>() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(e) => tracing::warn!(uri = %rewritten, error = %e, "Rewritten path is not a valid URI"),
    }

    request.extensions_mut().insert(Arc::new(aliases));
    Ok(next.run(request).await)
}

/// Response-time access gate.
///
/// Lets the downstream handler produce its response, then replaces it by a
/// redirect to the login screen when the requested page is locked for this
/// session.
pub async fn protect_pages(
    State(state): State<AppState>,
    principal: Principal,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current_path = normalize_path(request.uri().path());
    let destination = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| path_and_query(&original.0))
        .unwrap_or_else(|| path_and_query(request.uri()));
    let aliases = request
        .extensions()
        .get::<Arc<AliasTable>>()
        .cloned()
        .unwrap_or_default();
    let token = session_token(request.headers(), &state.config.session_cookie_name);

    let response = next.run(request).await;
    let entity = response.extensions().get::<ContentEntity>().copied();

    let mut con = state.connection().await?;
    let pages = storage::pages::load_page_index(&mut con).await?;
    let mut unlocks = match &token {
        Some(token) => storage::session::get_unlock_state(&mut con, token)
            .await?
            .unwrap_or_default(),
        None => UnlockState::new(),
    };
    let before = unlocks.clone();

    let gate = AccessGate::new(&pages, &*aliases, state.config.password_mode);
    let decision = gate.evaluate(
        &principal,
        &current_path,
        entity.as_ref(),
        &mut unlocks,
        now_secs(),
    );

    // Persist purged markers
    if let Some(token) = &token {
        if unlocks != before {
            if unlocks.is_empty() {
                storage::session::delete_unlock_state(&mut con, token).await?;
            } else {
                storage::session::store_unlock_state(
                    &mut con,
                    token,
                    &unlocks,
                    state.config.session_ttl_secs,
                )
                .await?;
            }
        }
    }

    match decision.protected_page {
        Some(page_id) if decision.locked => {
            tracing::info!(action = "page_locked", page_id, path = %current_path, "Redirecting to login screen");
            Ok(login_redirect(page_id, &destination))
        }
        _ => Ok(response),
    }
}

fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}
