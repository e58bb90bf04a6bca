//! Protected page Redis operations.
//!
//! Redis key patterns:
//! - `protected_page:{id}`: protected page entry (JSON)

use super::{json_error, scan_keys};
use crate::access::gate::PageIndex;
use crate::models::ProtectedPage;
use redis::AsyncCommands;

fn page_key(id: u64) -> String {
    format!("protected_page:{}", id)
}

/// Store (create or replace) a protected page entry.
pub async fn store_page<C>(con: &mut C, page: &ProtectedPage) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    let json = serde_json::to_string(page).map_err(|e| json_error("JSON serialize", e))?;
    con.set::<_, _, ()>(page_key(page.id), json).await?;
    Ok(())
}

/// Get a protected page by id.
pub async fn get_page<C>(con: &mut C, id: u64) -> Result<Option<ProtectedPage>, redis::RedisError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(page_key(id)).await?;
    match json {
        Some(data) => serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| json_error("JSON deserialize", e)),
        None => Ok(None),
    }
}

/// Delete a protected page. Returns true if it existed.
pub async fn delete_page<C>(con: &mut C, id: u64) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let deleted: i32 = con.del(page_key(id)).await?;
    Ok(deleted > 0)
}

/// Load every protected page entry.
///
/// Entries that fail to deserialize are skipped with a warning.
pub async fn load_all_pages<C>(con: &mut C) -> Result<Vec<ProtectedPage>, redis::RedisError>
where
    C: AsyncCommands,
{
    let mut pages = Vec::new();
    let keys = scan_keys(con, "protected_page:*").await?;

    for key in keys {
        let json: Option<String> = con.get(&key).await?;
        if let Some(data) = json {
            match serde_json::from_str::<ProtectedPage>(&data) {
                Ok(page) => pages.push(page),
                Err(e) => tracing::warn!(key = %key, error = %e, "Skipping malformed protected page"),
            }
        }
    }

    Ok(pages)
}

/// Load every entry into a lookup snapshot for the gate.
pub async fn load_page_index<C>(con: &mut C) -> Result<PageIndex, redis::RedisError>
where
    C: AsyncCommands,
{
    Ok(PageIndex::new(load_all_pages(con).await?))
}
