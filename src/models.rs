//! Request models, stored records and shared domain types.
//!
//! Storage models represent Redis data structures and use serde for JSON.

use serde::{Deserialize, Serialize};

// ============================================================================
// Protected Pages
// ============================================================================

/// A protected-path entry as stored in Redis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedPage {
    pub id: u64,
    /// Concrete path or wildcard pattern (one pattern per line).
    pub path: String,
    /// Argon2 PHC hash. `None` means the global password applies.
    pub password: Option<String>,
}

/// How submitted passwords are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordMode {
    /// Only the page's own password unlocks it.
    #[serde(rename = "per_page_password")]
    PerPage,
    /// Either the page's password or the global password.
    PerPageOrGlobal,
    /// Only the global password; one unlock opens every page.
    #[serde(rename = "only_global")]
    GlobalOnly,
}

impl PasswordMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PasswordMode::PerPage => "per_page_password",
            PasswordMode::PerPageOrGlobal => "per_page_or_global",
            PasswordMode::GlobalOnly => "only_global",
        }
    }
}

impl std::fmt::Display for PasswordMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PasswordMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per_page_password" => Ok(PasswordMode::PerPage),
            "per_page_or_global" => Ok(PasswordMode::PerPageOrGlobal),
            "only_global" => Ok(PasswordMode::GlobalOnly),
            _ => Err(format!("Invalid password mode: {}", s)),
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Permissions consulted by the gate and the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BypassProtection,
    AccessLoginScreen,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::BypassProtection => "bypass pages password protection",
            Capability::AccessLoginScreen => "access protected page password screen",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bypass pages password protection" => Ok(Capability::BypassProtection),
            "access protected page password screen" => Ok(Capability::AccessLoginScreen),
            _ => Err(format!("Invalid capability: {}", s)),
        }
    }
}

// ============================================================================
// Content
// ============================================================================

/// Content entity rendered by a downstream handler.
///
/// Handlers attach this to their response extensions so the gate can check
/// rules written against the entity's generated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentEntity {
    pub collection: &'static str,
    pub id: u64,
}

impl ContentEntity {
    pub fn node(id: u64) -> Self {
        ContentEntity {
            collection: "node",
            id,
        }
    }

    /// Generated system path, e.g. `/node/5`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.collection, self.id)
    }
}

// ============================================================================
// Login Models
// ============================================================================

/// Query string of the login route.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub protected_page: Option<String>,
    pub destination: Option<String>,
}

/// Submitted login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
    pub protected_page_pid: Option<String>,
    pub destination: Option<String>,
}
