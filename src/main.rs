//! pagegate application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis
//! 3. Build router: alias rewrite, access gate, login screen, content
//! 4. Start Axum server
//!
//! Also supports maintenance subcommands:
//! - `hash <password>` prints an argon2 hash for `GLOBAL_PASSWORD_HASH`
//!   or `ADMIN_TOKEN_HASH`
//! - `protect <id> <path> [password]` / `unprotect <id>`
//! - `alias <alias> <path>` / `unalias <alias>`

use pagegate::{
    access::{hash_password, AppState},
    config::Config,
    models::ProtectedPage,
    routes, storage,
};
use std::sync::Arc;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  pagegate                            Run the server");
    eprintln!("  pagegate hash <password>            Print an argon2 hash");
    eprintln!("  pagegate protect <id> <path> [pw]   Protect a path or pattern");
    eprintln!("  pagegate unprotect <id>             Remove a protected page");
    eprintln!("  pagegate alias <alias> <path>       Register a path alias");
    eprintln!("  pagegate unalias <alias>            Remove a path alias");
    eprintln!();
    eprintln!("Without [pw] the global password applies to the page.");
}

fn parse_page_id(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("page id must be greater than zero".to_string()),
        Ok(id) => Ok(id),
        Err(e) => Err(format!("invalid page id '{}': {}", s, e)),
    }
}

/// Run a maintenance subcommand against Redis.
async fn run_command(args: &[String]) -> Result<(), String> {
    let redis_url = std::env::var("REDIS_URL").map_err(|_| "REDIS_URL is not set".to_string())?;
    let client = redis::Client::open(redis_url).map_err(|e| format!("Invalid Redis URL: {}", e))?;
    let mut con = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| format!("Failed to connect to Redis: {}", e))?;

    match args {
        [cmd, id, path, rest @ ..] if cmd == "protect" && rest.len() <= 1 => {
            let password = match rest.first() {
                Some(pw) => Some(hash_password(pw).map_err(|e| e.to_string())?),
                None => None,
            };
            let page = ProtectedPage {
                id: parse_page_id(id)?,
                path: path.clone(),
                password,
            };
            storage::pages::store_page(&mut con, &page)
                .await
                .map_err(|e| e.to_string())?;
            println!("Protected page {} stored for '{}'", page.id, page.path);
        }
        [cmd, id] if cmd == "unprotect" => {
            let id = parse_page_id(id)?;
            let deleted = storage::pages::delete_page(&mut con, id)
                .await
                .map_err(|e| e.to_string())?;
            if !deleted {
                return Err(format!("no protected page with id {}", id));
            }
            println!("Protected page {} removed", id);
        }
        [cmd, alias, path] if cmd == "alias" => {
            if !alias.starts_with('/') || !path.starts_with('/') {
                return Err("alias and path must start with '/'".to_string());
            }
            storage::aliases::set_alias(&mut con, alias, path)
                .await
                .map_err(|e| e.to_string())?;
            println!("Alias {} -> {}", alias, path);
        }
        [cmd, alias] if cmd == "unalias" => {
            let deleted = storage::aliases::delete_alias(&mut con, alias)
                .await
                .map_err(|e| e.to_string())?;
            if !deleted {
                return Err(format!("no alias '{}'", alias));
            }
            println!("Alias {} removed", alias);
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if let Some(cmd) = args.first() {
        if cmd == "hash" {
            if args.len() != 2 {
                print_usage();
                std::process::exit(1);
            }
            match hash_password(&args[1]) {
                Ok(hash) => println!("{}", hash),
                Err(e) => {
                    eprintln!("Error hashing password: {}", e);
                    std::process::exit(1);
                }
            }
            return;
        }

        let _ = dotenvy::dotenv();
        if let Err(e) = run_command(&args).await {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!(
        password_mode = %config.password_mode,
        content_dir = %config.content_dir.display(),
        "Starting pagegate on {}",
        config.bind_addr
    );

    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("Invalid Redis URL");

    // Verify Redis connection
    redis_client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect to Redis");

    let bind_addr = config.bind_addr;
    let state = AppState {
        redis: redis_client,
        config: Arc::new(config),
    };

    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
