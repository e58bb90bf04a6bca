//! Unlock state Redis operations.
//!
//! Redis key patterns:
//! - `unlock:{token}`: unlock state of one browser session (JSON)
//!
//! The TTL is refreshed on every write, so a session lives for
//! `SESSION_TTL_SECS` after its last change.

use super::json_error;
use crate::access::session::UnlockState;
use redis::AsyncCommands;

fn unlock_key(token: &str) -> String {
    format!("unlock:{}", token)
}

/// Store the unlock state of a session with TTL.
pub async fn store_unlock_state<C>(
    con: &mut C,
    token: &str,
    state: &UnlockState,
    ttl_secs: u64,
) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    let json = serde_json::to_string(state).map_err(|e| json_error("JSON serialize", e))?;
    con.set_ex::<_, _, ()>(unlock_key(token), json, ttl_secs)
        .await?;
    Ok(())
}

/// Get the unlock state of a session.
pub async fn get_unlock_state<C>(
    con: &mut C,
    token: &str,
) -> Result<Option<UnlockState>, redis::RedisError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(unlock_key(token)).await?;
    match json {
        Some(data) => serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| json_error("JSON deserialize", e)),
        None => Ok(None),
    }
}

/// Delete the unlock state of a session. Returns true if it existed.
pub async fn delete_unlock_state<C>(con: &mut C, token: &str) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let deleted: i32 = con.del(unlock_key(token)).await?;
    Ok(deleted > 0)
}
