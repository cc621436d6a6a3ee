//! Name to handler resolution with a bounded cache of external lookups.

use crate::builtin::{self, BuiltinHandler};
use crate::env::Environment;
use crate::external::{Locate, PathLocator};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// What a command name resolves to.
#[derive(Clone)]
pub enum Handler {
    Builtin(BuiltinHandler),
    External(PathBuf),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Builtin(_) => f.write_str("Builtin"),
            Handler::External(path) => f.debug_tuple("External").field(path).finish(),
        }
    }
}

/// Resolves command names to built-ins or executables on the search path.
///
/// Built-ins are registered once and never evicted. External lookups are cached
/// in recency order: a hit moves the entry to the back, and inserting past
/// `capacity` drops entries from the front. Names containing a path separator
/// depend on the current directory and bypass the cache.
pub struct CommandResolver {
    builtins: HashMap<&'static str, BuiltinHandler>,
    cache: IndexMap<String, PathBuf>,
    capacity: usize,
    locator: Box<dyn Locate>,
}

impl CommandResolver {
    pub fn new(capacity: usize) -> Self {
        Self::with_locator(capacity, PathLocator)
    }

    pub fn with_locator(capacity: usize, locator: impl Locate + 'static) -> Self {
        Self {
            builtins: builtin::registry().into_iter().collect(),
            cache: IndexMap::new(),
            capacity,
            locator: Box::new(locator),
        }
    }

    pub fn resolve(&mut self, name: &str, env: &Environment) -> Option<Handler> {
        if let Some(handler) = self.builtins.get(name) {
            return Some(Handler::Builtin(*handler));
        }
        if name.is_empty() {
            return None;
        }
        if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            return self.locator.locate(name, env).map(Handler::External);
        }

        if let Some(path) = self.cache.shift_remove(name) {
            log::debug!("resolver: cache hit for {name}");
            self.cache.insert(name.to_string(), path.clone());
            return Some(Handler::External(path));
        }

        log::debug!("resolver: cache miss for {name}");
        let path = self.locator.locate(name, env)?;
        self.cache.insert(name.to_string(), path.clone());
        while self.cache.len() > self.capacity {
            if let Some((evicted, _)) = self.cache.shift_remove_index(0) {
                log::debug!("resolver: evicted {evicted}");
            }
        }
        Some(Handler::External(path))
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn builtin(&self, name: &str) -> Option<BuiltinHandler> {
        self.builtins.get(name).copied()
    }

    /// Every built-in plus every executable on the search path.
    ///
    /// Lists the PATH directories on each call; meant for completion, not for
    /// the execution path.
    pub fn all_known_names(&self, env: &Environment) -> BTreeSet<String> {
        let mut names = self.locator.executables(env);
        names.extend(self.builtins.keys().map(|name| name.to_string()));
        names
    }

    /// Cached external names, least recently used first.
    pub fn cached_names(&self) -> impl Iterator<Item = &str> {
        self.cache.keys().map(String::as_str)
    }
}

impl Default for CommandResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
