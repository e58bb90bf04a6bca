//! Per-session unlock state and session token generation.

use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Session key shared by every page when only the global password is used.
pub const GLOBAL_SESSION_KEY: u64 = 0;

/// Unlock markers recorded for one session key (unix seconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockEntry {
    pub request_time: Option<u64>,
    pub expire_time: Option<u64>,
}

/// Unlock markers of one user session, keyed by page id or
/// [`GLOBAL_SESSION_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockState {
    passwords: BTreeMap<u64, UnlockEntry>,
}

impl UnlockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: u64) -> Option<&UnlockEntry> {
        self.passwords.get(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.passwords.is_empty()
    }

    /// Record a successful login for `key`.
    ///
    /// With `expire_minutes` set the unlock lapses that many minutes after
    /// `now`; otherwise it lasts as long as the session.
    pub fn unlock(&mut self, key: u64, now: u64, expire_minutes: Option<u64>) {
        let entry = self.passwords.entry(key).or_default();
        entry.request_time = Some(now);
        entry.expire_time = expire_minutes.map(|m| now.saturating_add(m.saturating_mul(60)));
    }

    /// Drop both markers for `key` once `now` has reached its expiry.
    ///
    /// Returns true when something was removed.
    pub fn purge_expired(&mut self, key: u64, now: u64) -> bool {
        let expired = matches!(
            self.passwords.get(&key),
            Some(UnlockEntry { expire_time: Some(expire), .. }) if now >= *expire
        );
        if expired {
            self.passwords.remove(&key);
        }
        expired
    }

    /// Whether an unlock timestamp exists for `key`. Call
    /// [`purge_expired`](Self::purge_expired) first.
    pub fn is_unlocked(&self, key: u64) -> bool {
        self.passwords
            .get(&key)
            .is_some_and(|e| e.request_time.is_some())
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generate a cryptographically random session token.
///
/// Returns a URL-safe base64 string (43 characters) from 32 random bytes,
/// usable as a cookie value without quoting.
pub fn generate_session_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
