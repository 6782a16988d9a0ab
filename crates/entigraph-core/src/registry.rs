//! Contributed registry keys
//!
//! Plugins contribute configuration keys (name, description, default value,
//! restart flag). The set of known keys is held as an immutable map behind an
//! `Arc`; every change builds a complete new map and swaps it in, so readers
//! always see a consistent version and never wait on writers for long.
//!
//! Removing a key is two-phase: `extension_removed` only marks it, and the
//! marked keys disappear together when `plugin_unloaded` runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock, Mutex, OnceLock, PoisonError, RwLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, Result};

/// A key as declared by a plugin, before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyContribution {
    pub key: String,
    pub description: String,
    pub default_value: String,
    pub restart_required: bool,
}

/// Immutable descriptor of a contributed key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryKeyDescriptor {
    name: String,
    description: String,
    default_value: String,
    restart_required: bool,
    plugin_id: String,
}

impl RegistryKeyDescriptor {
    /// Build a descriptor, normalizing the description
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegistryKey` if the key or description is empty.
    pub fn from_contribution(contribution: &KeyContribution, plugin_id: &str) -> Result<Self> {
        if contribution.key.trim().is_empty() {
            return Err(GraphError::InvalidRegistryKey {
                key: contribution.key.clone(),
                reason: "key must not be empty".to_string(),
            });
        }
        if contribution.description.trim().is_empty() {
            return Err(GraphError::InvalidRegistryKey {
                key: contribution.key.clone(),
                reason: "description must not be empty".to_string(),
            });
        }

        Ok(Self {
            name: contribution.key.clone(),
            description: unescape(&collapse_whitespace(&contribution.description)),
            default_value: contribution.default_value.clone(),
            restart_required: contribution.restart_required,
            plugin_id: plugin_id.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    pub fn restart_required(&self) -> bool {
        self.restart_required
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

pub type KeyMap = BTreeMap<String, Arc<RegistryKeyDescriptor>>;

/// The current set of contributed keys plus pending removals
#[derive(Debug, Default)]
pub struct ContributedKeys {
    current: RwLock<Arc<KeyMap>>,
    pending_removal: Mutex<BTreeSet<String>>,
}

impl ContributedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial map from `(contribution, plugin_id)` pairs
    ///
    /// # Errors
    ///
    /// Returns the first `InvalidRegistryKey` encountered.
    pub fn from_contributions<'a, I>(contributions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a KeyContribution, &'a str)>,
    {
        let keys = build_map(contributions)?;
        Ok(Self {
            current: RwLock::new(Arc::new(keys)),
            pending_removal: Mutex::new(BTreeSet::new()),
        })
    }

    /// Replace the whole map from `(contribution, plugin_id)` pairs
    ///
    /// # Errors
    ///
    /// Returns the first `InvalidRegistryKey` encountered; the current map is
    /// kept in that case.
    pub fn load<'a, I>(&self, contributions: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a KeyContribution, &'a str)>,
    {
        let keys = build_map(contributions)?;
        self.mutate(|_| keys);
        tracing::debug!(op = "registry_load", entity_count = self.keys().len());
        Ok(())
    }

    /// The current map; later changes never affect a returned `Arc`
    pub fn keys(&self) -> Arc<KeyMap> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegistryKeyDescriptor>> {
        self.keys().get(name).cloned()
    }

    /// A plugin contributed a key: publish a new map containing it
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegistryKey` if the contribution is malformed.
    pub fn extension_added(&self, contribution: &KeyContribution, plugin_id: &str) -> Result<()> {
        let descriptor = Arc::new(RegistryKeyDescriptor::from_contribution(
            contribution,
            plugin_id,
        )?);
        self.mutate(|old| {
            let mut next = old.clone();
            next.insert(descriptor.name.clone(), descriptor);
            next
        });
        tracing::debug!(op = "registry_extension_added", key = contribution.key.as_str(), plugin_id);
        Ok(())
    }

    /// A contribution went away; the key stays visible until `plugin_unloaded`
    pub fn extension_removed(&self, key: &str) {
        self.pending_removal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }

    /// Drop every pending key in one new map and clear the pending set
    pub fn plugin_unloaded(&self) {
        let mut pending = self
            .pending_removal
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = pending.len();
        self.mutate(|old| {
            old.iter()
                .filter(|(name, _)| !pending.contains(name.as_str()))
                .map(|(name, descriptor)| (name.clone(), Arc::clone(descriptor)))
                .collect()
        });
        pending.clear();
        tracing::debug!(op = "registry_plugin_unloaded", removed);
    }

    pub fn pending_removals(&self) -> Vec<String> {
        self.pending_removal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn mutate(&self, f: impl FnOnce(&KeyMap) -> KeyMap) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(&guard);
        *guard = Arc::new(next);
    }
}

static GLOBAL: OnceLock<ContributedKeys> = OnceLock::new();

/// Process-wide registry, empty until loaded
pub fn global() -> &'static ContributedKeys {
    GLOBAL.get_or_init(ContributedKeys::new)
}

fn build_map<'a, I>(contributions: I) -> Result<KeyMap>
where
    I: IntoIterator<Item = (&'a KeyContribution, &'a str)>,
{
    contributions
        .into_iter()
        .map(|(contribution, plugin_id)| {
            RegistryKeyDescriptor::from_contribution(contribution, plugin_id)
                .map(|descriptor| (descriptor.name.clone(), Arc::new(descriptor)))
        })
        .collect()
}

static CONSECUTIVE_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("static pattern"));

/// Runs of two or more whitespace characters become a single space
fn collapse_whitespace(input: &str) -> String {
    CONSECUTIVE_SPACES.replace_all(input, " ").into_owned()
}

/// Resolve backslash escapes (`\n`, `\t`, `\"`, `\uXXXX`, ...); unknown
/// escapes keep the escaped character
fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    _ => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
