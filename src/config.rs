use crate::models::{Capability, PasswordMode};
use argon2::password_hash::PasswordHash;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Texts shown on the login screen.
#[derive(Debug, Clone)]
pub struct LoginText {
    pub title: String,
    pub description: String,
    pub password_label: String,
    pub submit_button_text: String,
    pub incorrect_password_msg: String,
}

impl Default for LoginText {
    fn default() -> Self {
        LoginText {
            title: "Protected Page -- Enter password".to_string(),
            description: "The page you are trying to view is password protected. \
                          Please enter the password below to proceed."
                .to_string(),
            password_label: "Enter Password".to_string(),
            submit_button_text: "Authenticate".to_string(),
            incorrect_password_msg: "Incorrect password!".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,
    pub content_dir: PathBuf,

    // Password policy
    pub password_mode: PasswordMode,
    pub global_password_hash: Option<String>,
    pub session_expire_minutes: Option<u64>,

    // Session transport
    pub session_ttl_secs: u64,
    pub session_cookie_name: String,
    pub secure_cookies: bool,

    // Principals
    pub anonymous_capabilities: Vec<Capability>,
    pub admin_token_hash: Option<String>,

    // Login screen
    pub login_text: LoginText,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("content_dir", &self.content_dir)
            .field("password_mode", &self.password_mode)
            .field(
                "global_password_hash",
                &self.global_password_hash.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_expire_minutes", &self.session_expire_minutes)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("session_cookie_name", &self.session_cookie_name)
            .field("secure_cookies", &self.secure_cookies)
            .field("anonymous_capabilities", &self.anonymous_capabilities)
            .field(
                "admin_token_hash",
                &self.admin_token_hash.as_ref().map(|_| "[REDACTED]"),
            )
            .field("login_text", &self.login_text)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        let _ = dotenvy::dotenv();

        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;
        let content_dir =
            PathBuf::from(env::var("CONTENT_DIR").unwrap_or_else(|_| "content".to_string()));

        // Password policy
        let password_mode: PasswordMode = parse_env_or_default("PASSWORD_MODE", PasswordMode::PerPage)?;
        let global_password_hash = optional_hash("GLOBAL_PASSWORD_HASH")?;
        if password_mode == PasswordMode::GlobalOnly && global_password_hash.is_none() {
            return Err(ConfigError::InvalidValue(
                "GLOBAL_PASSWORD_HASH".to_string(),
                "required when PASSWORD_MODE is only_global".to_string(),
            ));
        }
        let session_expire_minutes: u64 = parse_env_or_default("SESSION_EXPIRE_MINUTES", 0)?;
        let session_expire_minutes = (session_expire_minutes > 0).then_some(session_expire_minutes);

        // Session transport
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", 86_400)?;
        let session_cookie_name =
            env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "pagegate_session".to_string());
        if session_cookie_name.is_empty()
            || !session_cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidValue(
                "SESSION_COOKIE_NAME".to_string(),
                "may only contain alphanumeric characters, hyphens, and underscores".to_string(),
            ));
        }
        let secure_cookies = parse_env_or_default("SECURE_COOKIES", false)?;

        // Principals
        let anonymous_capabilities_str = env::var("ANONYMOUS_CAPABILITIES")
            .unwrap_or_else(|_| Capability::AccessLoginScreen.as_str().to_string());
        let anonymous_capabilities = anonymous_capabilities_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Capability>().map_err(|e| {
                    ConfigError::InvalidValue("ANONYMOUS_CAPABILITIES".to_string(), e)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let admin_token_hash = optional_hash("ADMIN_TOKEN_HASH")?;

        // Login screen
        let defaults = LoginText::default();
        let login_text = LoginText {
            title: env::var("LOGIN_TITLE").unwrap_or(defaults.title),
            description: env::var("LOGIN_DESCRIPTION").unwrap_or(defaults.description),
            password_label: env::var("LOGIN_PASSWORD_LABEL").unwrap_or(defaults.password_label),
            submit_button_text: env::var("LOGIN_SUBMIT_TEXT")
                .unwrap_or(defaults.submit_button_text),
            incorrect_password_msg: env::var("LOGIN_INCORRECT_PASSWORD_MSG")
                .unwrap_or(defaults.incorrect_password_msg),
        };

        Ok(Config {
            redis_url,
            bind_addr,
            content_dir,
            password_mode,
            global_password_hash,
            session_expire_minutes,
            session_ttl_secs,
            session_cookie_name,
            secure_cookies,
            anonymous_capabilities,
            admin_token_hash,
            login_text,
        })
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

/// Read an optional password hash, rejecting anything that is not a PHC string.
fn optional_hash(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => {
            PasswordHash::new(&val).map_err(|e| {
                ConfigError::InvalidValue(key.to_string(), format!("not a PHC hash: {}", e))
            })?;
            Ok(Some(val))
        }
        Err(_) => Ok(None),
    }
}
