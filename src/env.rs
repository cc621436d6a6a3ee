use crate::alias::AliasStore;
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsString;
use std::path::PathBuf;

/// Two-tier storage for shell variables.
///
/// Variables live either in `local` (visible to expansion only) or in `exported`
/// (also handed to child processes). A name is never present in both at once;
/// lookups consult `local` first.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    local: HashMap<String, String>,
    exported: HashMap<String, String>,
}

impl VariableStore {
    /// Seed the exported tier from the process environment.
    ///
    /// Entries that are not valid Unicode are skipped.
    pub fn from_process_env() -> Self {
        Self {
            local: HashMap::new(),
            exported: stdenv::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Value of `name`, local tier first.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.local
            .get(name)
            .or_else(|| self.exported.get(name))
            .map(String::as_str)
    }

    /// Assign a shell variable.
    ///
    /// An already exported variable keeps its export status and only the value
    /// changes; anything else lands in the local tier.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.exported.get_mut(&name) {
            Some(slot) => *slot = value.into(),
            None => {
                self.local.insert(name, value.into());
            }
        }
    }

    /// Assign and export in one step, dropping any local copy.
    pub fn define_exported(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.local.remove(&name);
        self.exported.insert(name, value.into());
    }

    /// Move `name` into the exported tier, keeping its value.
    ///
    /// Unknown names are created as exported empty strings; exported names are
    /// left untouched.
    pub fn promote_to_exported(&mut self, name: &str) {
        if let Some(value) = self.local.remove(name) {
            self.exported.insert(name.to_string(), value);
        } else if !self.exported.contains_key(name) {
            self.exported.insert(name.to_string(), String::new());
        }
    }

    /// Remove `name` from both tiers. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let local = self.local.remove(name).is_some();
        let exported = self.exported.remove(name).is_some();
        local || exported
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.exported.contains_key(name)
    }

    /// Copy of the exported tier, used as the complete environment of a child.
    pub fn exported_snapshot(&self) -> HashMap<String, String> {
        self.exported.clone()
    }

    pub fn locals(&self) -> &HashMap<String, String> {
        &self.local
    }

    pub fn exported(&self) -> &HashMap<String, String> {
        &self.exported
    }
}

/// Mutable state threaded through parsing and execution.
///
/// The environment contains:
/// - `vars`: shell and exported variables.
/// - `aliases`: alias name to replacement text.
/// - `current_dir`: the tracked working directory for commands and redirects.
/// - `should_exit`: set by `exit` during the current line; cleared when the next one starts.
///
/// One instance is created at startup and passed by reference; nothing here is global.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: VariableStore,
    pub aliases: AliasStore,
    pub current_dir: PathBuf,
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// Variables are copied from `std::env::vars()` into the exported tier and
    /// `current_dir` comes from `std::env::current_dir()`.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_dir(current_dir)
    }

    /// Same as [`Environment::new`] but starting in `current_dir`.
    pub fn with_dir(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: VariableStore::from_process_env(),
            aliases: AliasStore::default(),
            current_dir: current_dir.into(),
            should_exit: false,
        }
    }

    /// Get the value of a shell variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.lookup(key)
    }

    /// Set or override a shell variable (see [`VariableStore::define`]).
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.define(key, val);
    }

    /// Directories to search for external commands: the shell's `PATH`.
    pub fn search_path(&self) -> OsString {
        OsString::from(self.get_var("PATH").unwrap_or_default())
    }

    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME").map(PathBuf::from)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
