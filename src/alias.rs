use std::collections::BTreeMap;

/// Alias name to raw replacement text.
///
/// The text may contain arguments, pipes and redirects; it is spliced into the
/// input line before tokenizing. Iteration is sorted by name.
#[derive(Debug, Clone, Default)]
pub struct AliasStore {
    aliases: BTreeMap<String, String>,
}

impl AliasStore {
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// Create or replace an alias.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.aliases.insert(name.into(), value.into());
    }

    /// Returns `true` if the alias existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
