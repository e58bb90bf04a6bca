//! Path alias Redis operations.
//!
//! Redis key patterns:
//! - `path_aliases`: hash of alias -> system path

use crate::access::gate::AliasTable;
use redis::AsyncCommands;
use std::collections::HashMap;

const ALIASES_KEY: &str = "path_aliases";

/// Register `alias` for the system path `path`.
pub async fn set_alias<C>(con: &mut C, alias: &str, path: &str) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    con.hset::<_, _, _, ()>(ALIASES_KEY, alias, path).await?;
    Ok(())
}

/// Remove an alias. Returns true if it existed.
pub async fn delete_alias<C>(con: &mut C, alias: &str) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let deleted: i32 = con.hdel(ALIASES_KEY, alias).await?;
    Ok(deleted > 0)
}

/// Load the whole alias table.
pub async fn load_alias_table<C>(con: &mut C) -> Result<AliasTable, redis::RedisError>
where
    C: AsyncCommands,
{
    let entries: HashMap<String, String> = con.hgetall(ALIASES_KEY).await?;
    // Stable order so a path with several aliases always shows the same one
    let mut entries: Vec<(String, String)> = entries.into_iter().collect();
    entries.sort();
    Ok(AliasTable::new(entries))
}
