//! Login screen for protected pages.

use crate::access::middleware::{session_cookie, session_token, AppState};
use crate::access::session::{generate_session_token, now_secs, UnlockState};
use crate::access::verify::{self, LoginError};
use crate::access::Principal;
use crate::config::LoginText;
use crate::error::AppError;
use crate::models::{Capability, LoginForm, LoginQuery};
use crate::storage;
use axum::{
    extract::{rejection::FormRejection, FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use zeroize::Zeroizing;

/// Access check for the login route.
///
/// Requires a numeric `protected_page` query parameter and a principal that
/// may see the login screen. Returns the pinned page id.
fn pinned_page_id(principal: &Principal, query: &LoginQuery) -> Result<u64, AppError> {
    let allowed =
        principal.has_capability(Capability::AccessLoginScreen) || principal.is_super_user();
    let page_id = query
        .protected_page
        .as_deref()
        .and_then(|p| p.parse::<u64>().ok());

    match page_id {
        Some(page_id) if allowed => Ok(page_id),
        _ => Err(AppError::Forbidden("Access denied".to_string())),
    }
}

/// Extractor for a request that passed the login access check.
///
/// Runs on the request head only, so a refused request is answered with 403
/// before its body is looked at.
pub struct LoginAccess {
    pub page_id: u64,
    pub destination: Option<String>,
}

impl FromRequestParts<AppState> for LoginAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        let Query(query) = Query::<LoginQuery>::try_from_uri(&parts.uri)
            .map_err(|_| AppError::Forbidden("Access denied".to_string()))?;
        let page_id = pinned_page_id(&principal, &query)?;

        Ok(LoginAccess {
            page_id,
            destination: query.destination,
        })
    }
}

/// Local path to return to after login. Anything that could leave the site
/// falls back to the front page.
fn safe_destination(destination: Option<&str>) -> &str {
    match destination {
        Some(d) if d.starts_with('/') && !d.starts_with("//") && !d.contains('\\') => d,
        _ => "/",
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_form(text: &LoginText, page_id: u64, destination: &str, error: Option<&str>) -> String {
    let error_html = error
        .map(|msg| {
            format!(
                "<div class=\"messages error\" role=\"alert\">{}</div>\n",
                escape_html(msg)
            )
        })
        .unwrap_or_default();
    let field_class = if error.is_some() { " class=\"error\"" } else { "" };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<h1>{title}</h1>
{error_html}<form method="post">
<fieldset>
<div class="protected_pages_description"><strong>{description}</strong></div>
<label for="edit-password">{label}</label>
<input type="password" id="edit-password" name="password" size="20" required{field_class}>
<input type="submit" value="{submit}">
</fieldset>
<input type="hidden" name="protected_page_pid" value="{page_id}">
<input type="hidden" name="destination" value="{destination}">
</form>
</body>
</html>
"#,
        title = escape_html(&text.title),
        description = escape_html(&text.description),
        label = escape_html(&text.password_label),
        submit = escape_html(&text.submit_button_text),
        destination = escape_html(destination),
    )
}

/// GET /protected-page: Render the password prompt
pub async fn login_form(
    access: LoginAccess,
    State(state): State<AppState>,
) -> Html<String> {
    let destination = safe_destination(access.destination.as_deref());
    Html(render_form(
        &state.config.login_text,
        access.page_id,
        destination,
        None,
    ))
}

/// POST /protected-page: Check the password and unlock the session
pub async fn submit_login(
    access: LoginAccess,
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(form) = form.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let page_id = access.page_id;
    let config = &state.config;
    let password = Zeroizing::new(form.password);
    let destination = safe_destination(
        access
            .destination
            .as_deref()
            .or(form.destination.as_deref()),
    );

    if form.protected_page_pid.as_deref() != Some(page_id.to_string().as_str()) {
        tracing::debug!(page_id, submitted = ?form.protected_page_pid, "Ignoring submitted page id");
    }

    let mut con = state.connection().await?;
    let page_hash = storage::pages::get_page(&mut con, page_id)
        .await?
        .and_then(|page| page.password);

    let session_key = match verify::validate(
        &password,
        page_id,
        page_hash.as_deref(),
        config.password_mode,
        config.global_password_hash.as_deref(),
    ) {
        Ok(key) => key,
        Err(err) => {
            tracing::warn!(action = "login_failed", page_id, reason = %err, "Login rejected");
            let message = match err {
                LoginError::MissingPassword => err.to_string(),
                LoginError::IncorrectPassword => config.login_text.incorrect_password_msg.clone(),
            };
            let html = render_form(&config.login_text, page_id, destination, Some(&message));
            return Ok(Html(html).into_response());
        }
    };

    let existing = session_token(&headers, &config.session_cookie_name);
    let mut unlocks = match &existing {
        Some(token) => storage::session::get_unlock_state(&mut con, token)
            .await?
            .unwrap_or_default(),
        None => UnlockState::new(),
    };
    let token = existing.unwrap_or_else(generate_session_token);

    unlocks.unlock(session_key, now_secs(), config.session_expire_minutes);
    storage::session::store_unlock_state(&mut con, &token, &unlocks, config.session_ttl_secs)
        .await?;

    tracing::info!(action = "login_success", page_id, session_key, "Protected page unlocked");

    let mut response = Redirect::to(destination).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, session_cookie(config, &token)?);
    Ok(response)
}
