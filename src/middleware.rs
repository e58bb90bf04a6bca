//! Response header middleware.
//!
//! - Security headers for the login screen
//! - Page cache kill switch for responses that must never be cached

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Middleware that adds security headers to the login screen.
///
/// - **X-Frame-Options: DENY** / `frame-ancestors 'none'`: the password form
///   cannot be framed (clickjacking).
/// - **Referrer-Policy: same-origin**: the `destination` query parameter does
///   not leak to other sites.
/// - **X-Content-Type-Options: nosniff**
/// - **Content-Security-Policy**: no scripts, form posts to same origin only.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("referrer-policy", HeaderValue::from_static("same-origin"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'none'; \
             object-src 'none'; \
             frame-ancestors 'none'; \
             base-uri 'self'; \
             form-action 'self'",
        ),
    );
    kill_page_cache(&mut response);

    response
}

/// Mark a response so that neither browsers nor shared caches store it.
pub fn kill_page_cache(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
}
