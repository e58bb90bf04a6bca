//! Page access control: path matching, lock decisions, unlock state and
//! credential checks.

pub mod gate;
pub mod matcher;
pub mod middleware;
pub mod session;
pub mod verify;

pub use gate::{AccessGate, AliasResolver, LockDecision, PageLookup, Principal, LOGIN_PATH};
pub use middleware::{protect_pages, rewrite_aliases, AppState};
pub use session::{generate_session_token, UnlockState, GLOBAL_SESSION_KEY};
pub use verify::{hash_password, validate, verify_password};
