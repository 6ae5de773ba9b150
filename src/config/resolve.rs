//! Resolving one scope: defaults, environment, file, then strict decoding.

use figment::value::{Dict, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::env::EnvOverlay;
use super::format::ConfigFormat;
use super::store::{find_path, insert_path, join_path, leaf_paths, Layer, ResolvedStore};
use crate::error::{ConfigError, Result};

/// Per-scope inputs captured from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeInputs {
    pub file: Option<PathBuf>,
    pub format: ConfigFormat,
    /// Whether `format` was chosen explicitly rather than left at its default.
    pub format_explicit: bool,
}

impl ScopeInputs {
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_format(mut self, format: ConfigFormat) -> Self {
        self.format = format;
        self.format_explicit = true;
        self
    }

    /// Format used to read `path`: explicit choice, then extension, then default.
    pub fn read_format(&self, path: &Path) -> ConfigFormat {
        if self.format_explicit {
            return self.format;
        }
        ConfigFormat::from_path(path).unwrap_or(self.format)
    }
}

/// Build the merged store for a scope.
///
/// Precedence is fixed: defaults < environment < file. A file that was named but
/// cannot be read or parsed is reported as a warning and skipped.
pub fn resolve_store(
    scope: &str,
    defaults: &Dict,
    inputs: &ScopeInputs,
    env: &EnvOverlay,
) -> Result<ResolvedStore> {
    let mut layers = vec![Layer::new("defaults", defaults.clone())];

    let file_layer = inputs.file.as_deref().and_then(|path| read_file_layer(path, inputs));

    if env.is_enabled() {
        let mut base = defaults.clone();
        if let Some((_, values)) = &file_layer {
            for key in leaf_paths(values) {
                if let Some(value) = find_path(values, &key) {
                    insert_path(&mut base, &key, value.clone());
                }
            }
        }

        let overlay = env.collect(&base);
        if !overlay.is_empty() {
            layers.push(Layer::new("environment", overlay));
        }
    }

    if let Some((name, values)) = file_layer {
        layers.push(Layer::new(name, values));
    }

    debug!("Resolving {} layer(s) for scope '{}'", layers.len(), scope);
    ResolvedStore::from_layers(layers)
        .map_err(|source| ConfigError::Decode { scope: scope.to_string(), source })
}

fn read_file_layer(path: &Path, inputs: &ScopeInputs) -> Option<(String, Dict)> {
    let format = inputs.read_format(path);
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("{}: {}", path.display(), e);
            return None;
        }
    };
    match format.parse(&content) {
        Ok(values) => {
            debug!("Loaded {} config from {}", format, path.display());
            Some((format!("{} file {}", format, path.display()), values))
        }
        Err(e) => {
            warn!("{}: {}", path.display(), e);
            None
        }
    }
}

/// Decode the store into `T`, rejecting keys that `T` has no field for.
///
/// The accepted key set is the key tree of the decoded value serialized back.
/// Fields skipped during serialization are therefore treated as unknown, and so
/// are keys spelled with a `#[serde(alias)]` name rather than the field's own.
pub fn decode_strict<T>(scope: &str, store: &ResolvedStore) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let target: T = store
        .figment()
        .extract()
        .map_err(|source| ConfigError::Decode { scope: scope.to_string(), source })?;

    let accepted = Value::serialize(&target)
        .map_err(|source| ConfigError::Decode { scope: scope.to_string(), source })?;
    let empty = Dict::new();
    let accepted = accepted.as_dict().unwrap_or(&empty);

    let mut unknown = Vec::new();
    collect_unknown(store.values(), accepted, "", &mut unknown);
    if !unknown.is_empty() {
        return Err(ConfigError::UnknownKeys { scope: scope.to_string(), keys: unknown });
    }

    Ok(target)
}

fn collect_unknown(values: &Dict, accepted: &Dict, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in values {
        let path = join_path(prefix, key);
        match (value, accepted.get(key)) {
            (_, None) => out.push(path),
            (Value::Dict(_, inner), Some(Value::Dict(_, known))) => {
                collect_unknown(inner, known, &path, out)
            }
            _ => {}
        }
    }
}

/// Resolve a scope end to end and return both the store and the decoded target.
pub fn resolve<T>(
    scope: &str,
    defaults: &Dict,
    inputs: &ScopeInputs,
    env: &EnvOverlay,
) -> Result<(ResolvedStore, T)>
where
    T: Serialize + DeserializeOwned,
{
    let store = resolve_store(scope, defaults, inputs, env)?;
    let target = decode_strict(scope, &store)?;
    Ok((store, target))
}
