//! Integration tests for the page gate.
//!
//! These tests require a running Redis instance (default: redis://127.0.0.1:6379)
//! and are skipped when none is reachable. Set REDIS_URL env var to override.
//! Every test uses its own random page ids and paths.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use pagegate::{
    access::{hash_password, session::UnlockEntry, AppState, UnlockState},
    config::{Config, LoginText},
    models::{Capability, PasswordMode, ProtectedPage},
    routes, storage,
};
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Helper to get Redis URL from environment or use default.
fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

fn unique_id() -> u64 {
    rand::random::<u32>() as u64 + 1_000_000
}

struct TestApp {
    app: Router,
    con: MultiplexedConnection,
    content: TempDir,
}

impl TestApp {
    fn write_content(&self, rel_path: &str, body: &str) {
        let path = self.content.path().join(rel_path.trim_start_matches('/'));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().uri(uri);
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        self.app
            .clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_password(&self, uri: &str, password: &str, pid: u64) -> Response {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("password", password)
            .append_pair("protected_page_pid", &pid.to_string())
            .finish();
        self.app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

/// Build the app against a live Redis, or None when Redis is unavailable.
async fn spawn_app(
    mode: PasswordMode,
    global_password_hash: Option<String>,
    session_expire_minutes: Option<u64>,
    admin_token_hash: Option<String>,
) -> Option<TestApp> {
    let client = match redis::Client::open(redis_url()) {
        Ok(c) => c,
        Err(_) => {
            eprintln!("Skipping test: Redis not available");
            return None;
        }
    };
    let con = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(_) => {
            eprintln!("Skipping test: Redis connection failed");
            return None;
        }
    };

    let content = tempfile::tempdir().unwrap();
    let config = Config {
        redis_url: redis_url(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        content_dir: content.path().to_path_buf(),
        password_mode: mode,
        global_password_hash,
        session_expire_minutes,
        session_ttl_secs: 600,
        session_cookie_name: "pagegate_session".to_string(),
        secure_cookies: false,
        anonymous_capabilities: vec![Capability::AccessLoginScreen],
        admin_token_hash,
        login_text: LoginText::default(),
    };

    let state = AppState {
        redis: client,
        config: Arc::new(config),
    };

    Some(TestApp {
        app: routes::app(state),
        con,
        content,
    })
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` part of the Set-Cookie header.
fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

// ============================================================================
// Per-page passwords
// ============================================================================

#[tokio::test]
async fn test_per_page_login_flow() {
    let Some(mut t) = spawn_app(PasswordMode::PerPage, None, None, None).await else {
        return;
    };
    let id = unique_id();
    let path = format!("/it-{}/vip", id);
    t.write_content(&path, "members only");
    storage::pages::store_page(
        &mut t.con,
        &ProtectedPage {
            id,
            path: path.clone(),
            password: Some(hash_password("hashA").unwrap()),
        },
    )
    .await
    .unwrap();

    // Locked: redirected to the login screen
    let resp = t.get(&path, None).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let login_url = location(&resp);
    assert_eq!(
        login_url,
        format!(
            "/protected-page?protected_page={}&destination=%2Fit-{}%2Fvip",
            id, id
        )
    );
    assert!(resp
        .headers()
        .get(header::CACHE_CONTROL)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("no-store"));

    // Login screen renders
    let resp = t.get(&login_url, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
    let html = body_string(resp).await;
    assert!(html.contains(&format!(r#"name="protected_page_pid" value="{}""#, id)));

    // Wrong password: error, no session
    let resp = t.post_password(&login_url, "wrong", id).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());
    assert!(body_string(resp).await.contains("Incorrect password!"));

    // Correct password: unlocked and sent back
    let resp = t.post_password(&login_url, "hashA", id).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), path);
    let cookie = session_cookie(&resp).unwrap();

    let resp = t.get(&path, Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "members only");

    // Without the session it is still locked
    let resp = t.get(&path, None).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    storage::pages::delete_page(&mut t.con, id).await.unwrap();
}

#[tokio::test]
async fn test_tampered_hidden_pid_is_ignored() {
    let Some(mut t) = spawn_app(PasswordMode::PerPage, None, None, None).await else {
        return;
    };
    let locked_id = unique_id();
    let other_id = locked_id + 1;
    for (id, pw) in [(locked_id, "locked-pw"), (other_id, "other-pw")] {
        storage::pages::store_page(
            &mut t.con,
            &ProtectedPage {
                id,
                path: format!("/it-{}/page", id),
                password: Some(hash_password(pw).unwrap()),
            },
        )
        .await
        .unwrap();
    }

    // Password of the other page, hidden field pointing at it, query pinned to locked_id
    let uri = format!("/protected-page?protected_page={}", locked_id);
    let resp = t.post_password(&uri, "other-pw", other_id).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());

    storage::pages::delete_page(&mut t.con, locked_id).await.unwrap();
    storage::pages::delete_page(&mut t.con, other_id).await.unwrap();
}

#[tokio::test]
async fn test_wildcard_rule() {
    let Some(mut t) = spawn_app(PasswordMode::PerPage, None, None, None).await else {
        return;
    };
    let id = unique_id();
    storage::pages::store_page(
        &mut t.con,
        &ProtectedPage {
            id,
            path: format!("/secret-{}/*", id),
            password: None,
        },
    )
    .await
    .unwrap();

    let resp = t.get(&format!("/secret-{}/anything", id), None).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).contains(&format!("protected_page={}", id)));

    let resp = t.get(&format!("/secret-{}x", id), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // The login screen itself is never protected by a wildcard
    let resp = t
        .get(&format!("/protected-page?protected_page={}", id), None)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    storage::pages::delete_page(&mut t.con, id).await.unwrap();
}

// ============================================================================
// Path normalization
// ============================================================================

#[tokio::test]
async fn test_equivalent_paths_are_protected() {
    let Some(mut t) = spawn_app(PasswordMode::PerPage, None, None, None).await else {
        return;
    };
    let id = unique_id();
    let vip_id = unique_id();
    t.write_content(&format!("it-{}/secret.html", id), "TOP SECRET");
    t.write_content(&format!("it-{}/vip/index.html", vip_id), "VIP ONLY");
    for (page_id, path) in [
        (id, format!("/it-{}/secret.html", id)),
        (vip_id, format!("/it-{}/vip", vip_id)),
    ] {
        storage::pages::store_page(
            &mut t.con,
            &ProtectedPage {
                id: page_id,
                path,
                password: None,
            },
        )
        .await
        .unwrap();
    }

    for uri in [
        format!("/it-{}/s%65cret.html", id),
        format!("//it-{}/secret.html", id),
        format!("/it-{}//secret.html", id),
        format!("/it-{}/./secret.html", id),
    ] {
        let resp = t.get(&uri, None).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "{}", uri);
        assert!(location(&resp).starts_with(&format!(
            "/protected-page?protected_page={}&",
            id
        )));
    }

    let resp = t.get(&format!("/it-{}/vip/", vip_id), None).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).starts_with(&format!(
        "/protected-page?protected_page={}&",
        vip_id
    )));

    // Once unprotected, the encoded form reaches the same file
    storage::pages::delete_page(&mut t.con, id).await.unwrap();
    storage::pages::delete_page(&mut t.con, vip_id).await.unwrap();
    let resp = t.get(&format!("/it-{}/s%65cret.html", id), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "TOP SECRET");
    let resp = t.get(&format!("/it-{}/vip/", vip_id), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "VIP ONLY");
}

#[tokio::test]
async fn test_node_file_not_served_statically() {
    let Some(mut t) = spawn_app(PasswordMode::PerPage, None, None, None).await else {
        return;
    };
    let id = unique_id();
    t.write_content(&format!("node/{}.html", id), "<p>Members</p>");
    storage::pages::store_page(
        &mut t.con,
        &ProtectedPage {
            id,
            path: format!("/node/{}", id),
            password: None,
        },
    )
    .await
    .unwrap();

    let resp = t.get(&format!("/node//{}", id), None).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let resp = t.get(&format!("/node%2F{}.html", id), None).await;
    assert_ne!(resp.status(), StatusCode::OK);
    assert!(!body_string(resp).await.contains("Members"));

    storage::pages::delete_page(&mut t.con, id).await.unwrap();
}

// ============================================================================
// Aliases and entities
// ============================================================================

#[tokio::test]
async fn test_alias_of_protected_node() {
    let Some(mut t) = spawn_app(PasswordMode::PerPage, None, None, None).await else {
        return;
    };
    let id = unique_id();
    let node_path = format!("/node/{}", id);
    let alias = format!("/about-us-{}", id);
    t.write_content(&format!("node/{}.html", id), "<p>About us</p>");
    storage::aliases::set_alias(&mut t.con, &alias, &node_path)
        .await
        .unwrap();
    storage::pages::store_page(
        &mut t.con,
        &ProtectedPage {
            id,
            path: node_path.clone(),
            password: None,
        },
    )
    .await
    .unwrap();

    let resp = t.get(&alias, None).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(&resp),
        format!(
            "/protected-page?protected_page={}&destination=%2Fabout-us-{}",
            id, id
        )
    );

    // Unprotected, the alias serves the node
    storage::pages::delete_page(&mut t.con, id).await.unwrap();
    let resp = t.get(&alias, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "<p>About us</p>");

    storage::aliases::delete_alias(&mut t.con, &alias)
        .await
        .unwrap();
}

// ============================================================================
// Global password
// ============================================================================

#[tokio::test]
async fn test_global_only_unlocks_every_page() {
    let global = hash_password("open-sesame").unwrap();
    let Some(mut t) = spawn_app(PasswordMode::GlobalOnly, Some(global), None, None).await else {
        return;
    };
    let a = unique_id();
    let b = a + 1;
    for id in [a, b] {
        let path = format!("/it-{}/page", id);
        t.write_content(&path, "content");
        storage::pages::store_page(
            &mut t.con,
            &ProtectedPage {
                id,
                path,
                password: Some(hash_password("page-only").unwrap()),
            },
        )
        .await
        .unwrap();
    }

    // Page password is not enough
    let uri = format!("/protected-page?protected_page={}", a);
    let resp = t.post_password(&uri, "page-only", a).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = t.post_password(&uri, "open-sesame", a).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&resp).unwrap();

    // Stored under the global key
    let token = cookie.split_once('=').unwrap().1;
    let state = storage::session::get_unlock_state(&mut t.con, token)
        .await
        .unwrap()
        .unwrap();
    assert!(state.is_unlocked(0));
    assert!(!state.is_unlocked(a));

    for id in [a, b] {
        let resp = t.get(&format!("/it-{}/page", id), Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    storage::pages::delete_page(&mut t.con, a).await.unwrap();
    storage::pages::delete_page(&mut t.con, b).await.unwrap();
    storage::session::delete_unlock_state(&mut t.con, token)
        .await
        .unwrap();
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test]
async fn test_expired_unlock_is_purged() {
    let Some(mut t) = spawn_app(PasswordMode::PerPage, None, Some(5), None).await else {
        return;
    };
    let id = unique_id();
    let path = format!("/it-{}/timed", id);
    t.write_content(&path, "timed");
    storage::pages::store_page(
        &mut t.con,
        &ProtectedPage {
            id,
            path: path.clone(),
            password: None,
        },
    )
    .await
    .unwrap();

    let token = pagegate::access::generate_session_token();
    let mut state = UnlockState::new();
    state.unlock(id, 1_000, Some(1));
    assert_eq!(
        state.entry(id),
        Some(&UnlockEntry {
            request_time: Some(1_000),
            expire_time: Some(1_060)
        })
    );
    storage::session::store_unlock_state(&mut t.con, &token, &state, 600)
        .await
        .unwrap();

    let cookie = format!("pagegate_session={}", token);
    let resp = t.get(&path, Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    // Stale markers removed
    let stored = storage::session::get_unlock_state(&mut t.con, &token)
        .await
        .unwrap();
    assert!(stored.is_none());

    storage::pages::delete_page(&mut t.con, id).await.unwrap();
}

// ============================================================================
// Capabilities
// ============================================================================

#[tokio::test]
async fn test_bypass_and_login_access() {
    let admin_hash = hash_password("admin-token").unwrap();
    let Some(mut t) = spawn_app(PasswordMode::PerPage, None, None, Some(admin_hash)).await else {
        return;
    };
    let id = unique_id();
    let path = format!("/it-{}/admin-view", id);
    t.write_content(&path, "visible");
    storage::pages::store_page(
        &mut t.con,
        &ProtectedPage {
            id,
            path: path.clone(),
            password: None,
        },
    )
    .await
    .unwrap();

    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(&path)
                .header(header::AUTHORIZATION, "Bearer admin-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Wrong token is just anonymous
    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(&path)
                .header(header::AUTHORIZATION, "Bearer guess")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);

    // Login screen needs a numeric page id
    let resp = t.get("/protected-page", None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = t.get("/protected-page?protected_page=abc", None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    storage::pages::delete_page(&mut t.con, id).await.unwrap();
}
