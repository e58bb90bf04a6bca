//! Lock decision for a requested path.
//!
//! The gate is pure: page rules, aliases and unlock state come in through the
//! [`PageLookup`] and [`AliasResolver`] interfaces and an [`UnlockState`], so
//! the whole decision runs without Redis or HTTP.

use crate::access::matcher::PathPattern;
use crate::access::session::{UnlockState, GLOBAL_SESSION_KEY};
use crate::models::{Capability, ContentEntity, PasswordMode, ProtectedPage};
use std::collections::HashMap;

/// Path of the login screen. Never matched by wildcard rules.
pub const LOGIN_PATH: &str = "/protected-page";

/// Read access to protected-path entries.
pub trait PageLookup {
    /// All entries in a stable order.
    fn load_all(&self) -> &[CompiledPage];

    /// Id of the first entry whose path equals any of `paths`, ignoring case.
    fn find_by_paths(&self, paths: &[&str]) -> Option<u64>;
}

/// Two-way mapping between system paths and their aliases.
pub trait AliasResolver {
    /// Alias of a system path, or the path itself when it has none.
    fn alias_for(&self, path: &str) -> String;

    /// System path behind an alias, or the alias itself when unknown.
    fn path_for(&self, alias: &str) -> String;
}

/// An entry with its pattern compiled for the wildcard pass.
#[derive(Debug, Clone)]
pub struct CompiledPage {
    pub id: u64,
    pub pattern: PathPattern,
}

/// In-memory snapshot of protected pages, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    compiled: Vec<CompiledPage>,
    by_path: HashMap<String, u64>,
}

impl PageIndex {
    pub fn new(mut pages: Vec<ProtectedPage>) -> Self {
        pages.sort_by_key(|p| p.id);

        let mut compiled = Vec::with_capacity(pages.len());
        let mut by_path = HashMap::with_capacity(pages.len());
        for page in pages {
            match PathPattern::new(&page.path) {
                Ok(pattern) => compiled.push(CompiledPage {
                    id: page.id,
                    pattern,
                }),
                Err(e) => {
                    tracing::warn!(page_id = page.id, error = %e, "Skipping unusable path pattern")
                }
            }
            by_path.entry(page.path.to_lowercase()).or_insert(page.id);
        }

        PageIndex { compiled, by_path }
    }
}

impl PageLookup for PageIndex {
    fn load_all(&self) -> &[CompiledPage] {
        &self.compiled
    }

    fn find_by_paths(&self, paths: &[&str]) -> Option<u64> {
        paths
            .iter()
            .filter_map(|p| self.by_path.get(&p.to_lowercase()).copied())
            .min()
    }
}

/// In-memory alias table: alias -> system path.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    to_path: HashMap<String, String>,
    to_alias: HashMap<String, String>,
}

impl AliasTable {
    pub fn new<I>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut table = AliasTable::default();
        for (alias, path) in aliases {
            table
                .to_alias
                .entry(path.to_lowercase())
                .or_insert_with(|| alias.clone());
            table.to_path.insert(alias.to_lowercase(), path);
        }
        table
    }

    /// System path for an inbound alias, if one is registered.
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.to_path.get(&alias.to_lowercase()).map(String::as_str)
    }
}

impl AliasResolver for AliasTable {
    fn alias_for(&self, path: &str) -> String {
        self.to_alias
            .get(&path.to_lowercase())
            .cloned()
            .unwrap_or_else(|| path.to_string())
    }

    fn path_for(&self, alias: &str) -> String {
        self.lookup(alias)
            .map(str::to_string)
            .unwrap_or_else(|| alias.to_string())
    }
}

/// The identity a request runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: u64,
    capabilities: Vec<Capability>,
}

impl Principal {
    pub const ANONYMOUS_ID: u64 = 0;
    pub const SUPER_USER_ID: u64 = 1;

    pub fn anonymous(capabilities: Vec<Capability>) -> Self {
        Principal {
            uid: Self::ANONYMOUS_ID,
            capabilities,
        }
    }

    pub fn super_user() -> Self {
        Principal {
            uid: Self::SUPER_USER_ID,
            capabilities: Vec::new(),
        }
    }

    pub fn is_super_user(&self) -> bool {
        self.uid == Self::SUPER_USER_ID
    }

    /// The super-user holds every capability.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.is_super_user() || self.capabilities.contains(&capability)
    }
}

/// Verdict of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockDecision {
    pub locked: bool,
    pub protected_page: Option<u64>,
}

impl LockDecision {
    pub fn unlocked() -> Self {
        LockDecision {
            locked: false,
            protected_page: None,
        }
    }

    pub fn locked(page_id: u64) -> Self {
        LockDecision {
            locked: true,
            protected_page: Some(page_id),
        }
    }
}

pub struct AccessGate<'a, P, A> {
    pages: &'a P,
    aliases: &'a A,
    mode: PasswordMode,
}

impl<'a, P, A> AccessGate<'a, P, A>
where
    P: PageLookup,
    A: AliasResolver,
{
    pub fn new(pages: &'a P, aliases: &'a A, mode: PasswordMode) -> Self {
        AccessGate {
            pages,
            aliases,
            mode,
        }
    }

    /// Decide whether `current_path` must be redirected to the login screen.
    ///
    /// `entity` is the content entity the response rendered, if any. Expired
    /// unlock markers found along the way are purged from `session`.
    pub fn evaluate(
        &self,
        principal: &Principal,
        current_path: &str,
        entity: Option<&ContentEntity>,
        session: &mut UnlockState,
        now: u64,
    ) -> LockDecision {
        if principal.has_capability(Capability::BypassProtection) {
            return LockDecision::unlocked();
        }

        let (alias, canonical) = self.resolve(current_path);
        let decision = self.check(&alias, &canonical, session, now);
        if decision.locked {
            return decision;
        }

        // Rules may be written against the entity's generated path.
        match entity {
            Some(entity) => {
                let (alias, canonical) = self.resolve(&entity.path());
                self.check(&alias.to_lowercase(), &canonical, session, now)
            }
            None => decision,
        }
    }

    /// Ranked match: first wildcard hit on the alias, then an exact lookup of
    /// either path form.
    pub fn protected_page_id(&self, alias: &str, canonical: &str) -> Option<u64> {
        if alias != LOGIN_PATH {
            if let Some(page) = self
                .pages
                .load_all()
                .iter()
                .find(|page| page.pattern.matches(alias))
            {
                return Some(page.id);
            }
        }

        self.pages.find_by_paths(&[canonical, alias])
    }

    /// Session key under which an unlock for `candidate` is recorded.
    pub fn session_key(&self, candidate: Option<u64>) -> Option<u64> {
        match self.mode {
            PasswordMode::GlobalOnly => Some(GLOBAL_SESSION_KEY),
            PasswordMode::PerPage | PasswordMode::PerPageOrGlobal => candidate,
        }
    }

    fn resolve(&self, path: &str) -> (String, String) {
        let alias = self.aliases.alias_for(path);
        let canonical = self.aliases.path_for(&alias).to_lowercase();
        (alias, canonical)
    }

    fn check(
        &self,
        alias: &str,
        canonical: &str,
        session: &mut UnlockState,
        now: u64,
    ) -> LockDecision {
        let candidate = self.protected_page_id(alias, canonical);

        if let Some(key) = self.session_key(candidate) {
            if session.purge_expired(key, now) {
                tracing::debug!(action = "unlock_expired", session_key = key, "Unlock expired");
            }
            if session.is_unlocked(key) {
                return LockDecision::unlocked();
            }
        }

        match candidate {
            Some(id) => LockDecision::locked(id),
            None => LockDecision::unlocked(),
        }
    }
}
