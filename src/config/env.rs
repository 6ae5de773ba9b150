//! Environment variable overlay shared by every scope.

use figment::providers::Env;
use figment::value::{Dict, Value};
use std::collections::BTreeMap;

use super::store::{find_path, insert_path, leaf_paths};

/// Process-wide environment settings, read once from `--use-env` and `--config-env`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    pub use_env: bool,
    pub prefix: String,
}

impl EnvOverlay {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn unprefixed() -> Self {
        Self { use_env: true, prefix: String::new() }
    }

    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self { use_env: false, prefix: prefix.into() }
    }

    /// A non-empty prefix enables the overlay on its own.
    pub fn is_enabled(&self) -> bool {
        !self.prefix.is_empty() || self.use_env
    }

    /// Environment variable consulted for a dotted config key.
    ///
    /// `server.port` with prefix `app` maps to `APP_SERVER_PORT`.
    pub fn var_name(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            env_key(key)
        } else {
            format!("{}_{}", self.prefix.to_ascii_uppercase(), env_key(key))
        }
    }

    fn provider(&self) -> Env {
        let env = if self.prefix.is_empty() {
            Env::raw()
        } else {
            Env::prefixed(&format!("{}_", self.prefix))
        };
        env.lowercase(false)
    }

    /// Collect environment values for every leaf key of `base`.
    ///
    /// `base` holds the layers the overlay sits on. A value overriding a string
    /// stays the raw text; any other value is parsed as a scalar.
    pub fn collect(&self, base: &Dict) -> Dict {
        if !self.is_enabled() {
            return Dict::new();
        }
        let provider = self.provider();
        let vars = provider.iter().map(|(name, value)| (name.as_str().to_string(), value));
        self.collect_from(base, vars)
    }

    /// `vars` yields names with the prefix already stripped.
    fn collect_from<I>(&self, base: &Dict, vars: I) -> Dict
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let known: BTreeMap<String, String> =
            leaf_paths(base).into_iter().map(|key| (env_key(&key), key)).collect();

        let mut chosen: BTreeMap<&str, (String, String)> = BTreeMap::new();
        for (name, raw) in vars {
            let Some(key) = known.get(&name.to_ascii_uppercase()) else {
                continue;
            };
            let replace = match chosen.get(key.as_str()) {
                Some((current, _)) => precedes(&name, current),
                None => true,
            };
            if replace {
                chosen.insert(key.as_str(), (name, raw));
            }
        }

        let mut overlay = Dict::new();
        for (key, (_, raw)) in chosen {
            tracing::debug!("Environment {} overrides {}", self.var_name(key), key);
            insert_path(&mut overlay, key, coerce(&raw, find_path(base, key)));
        }
        overlay
    }
}

fn env_key(key: &str) -> String {
    key.replace(['.', '-'], "_").to_ascii_uppercase()
}

/// Upper-case spellings win; otherwise the lexically smallest name does.
fn precedes(candidate: &str, current: &str) -> bool {
    let lowered = |name: &str| name.bytes().any(|b| b.is_ascii_lowercase());
    (lowered(candidate), candidate) < (lowered(current), current)
}

fn coerce(raw: &str, current: Option<&Value>) -> Value {
    match current {
        Some(Value::String(..)) => Value::from(raw.to_string()),
        _ => raw.parse::<Value>().unwrap_or_else(|_| Value::from(raw.to_string())),
    }
}
