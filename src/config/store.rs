//! The merged key/value store for one scope.

use figment::value::{Dict, Map, Value};
use figment::{Figment, Metadata, Profile, Provider};
use std::fs;
use std::io::Write;
use std::path::Path;

use super::format::ConfigFormat;
use crate::error::{ConfigError, Result};

/// One named layer of configuration values fed into the store.
pub(crate) struct Layer {
    name: String,
    values: Dict,
}

impl Layer {
    pub(crate) fn new(name: impl Into<String>, values: Dict) -> Self {
        Self { name: name.into(), values }
    }
}

impl Provider for Layer {
    fn metadata(&self) -> Metadata {
        Metadata::named(self.name.clone())
    }

    fn data(&self) -> figment::Result<Map<Profile, Dict>> {
        Ok(Profile::Default.collect(self.values.clone()))
    }
}

/// Defaults, environment and file values merged for one scope.
///
/// Later layers override earlier ones key by key; nested tables merge recursively.
#[derive(Debug, Clone)]
pub struct ResolvedStore {
    figment: Figment,
    values: Dict,
}

impl ResolvedStore {
    pub(crate) fn from_layers(layers: Vec<Layer>) -> std::result::Result<Self, figment::Error> {
        let figment = layers.into_iter().fold(Figment::new(), |figment, layer| figment.merge(layer));
        let values = figment.extract::<Dict>()?;
        Ok(Self { figment, values })
    }

    pub(crate) fn figment(&self) -> &Figment {
        &self.figment
    }

    pub fn values(&self) -> &Dict {
        &self.values
    }

    /// Look up a value by dotted path, e.g. `auth.username`.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.figment.find_value(path).ok()
    }

    /// All leaf keys as dotted paths, sorted.
    pub fn keys(&self) -> Vec<String> {
        leaf_paths(&self.values)
    }

    /// Name of the layer that supplied the winning value for `path`.
    pub fn source_of(&self, path: &str) -> Option<String> {
        self.figment.find_metadata(path).map(|metadata| metadata.name.to_string())
    }

    pub fn render(&self, format: ConfigFormat) -> Result<String> {
        format.render(&self.values)
    }

    /// Write the store to `writer` as `format`.
    pub fn write(&self, format: ConfigFormat, writer: &mut impl Write) -> Result<()> {
        let text = self.render(format)?;
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|source| ConfigError::Write { path: "-".into(), source })
    }

    /// Write the store to a file, taking the format from its extension.
    ///
    /// Files without a recognized extension are written as `fallback`.
    pub fn write_to(&self, path: &Path, fallback: ConfigFormat) -> Result<()> {
        let format = ConfigFormat::from_path(path).unwrap_or(fallback);
        let text = self.render(format)?;
        fs::write(path, text)
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;
        tracing::debug!("Wrote {} config to {}", format, path.display());
        Ok(())
    }
}

/// Insert `value` at a dotted `path`, creating intermediate tables.
pub(crate) fn insert_path(dict: &mut Dict, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            dict.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = dict.entry(head.to_string()).or_insert_with(|| Value::from(Dict::new()));
            if entry.as_dict().is_none() {
                *entry = Value::from(Dict::new());
            }
            if let Value::Dict(_, inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

pub(crate) fn find_path<'a>(dict: &'a Dict, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => dict.get(path),
        Some((head, rest)) => find_path(dict.get(head)?.as_dict()?, rest),
    }
}

/// Dotted paths of every non-table value in `dict`.
pub(crate) fn leaf_paths(dict: &Dict) -> Vec<String> {
    fn walk(dict: &Dict, prefix: &str, out: &mut Vec<String>) {
        for (key, value) in dict {
            let path = join_path(prefix, key);
            match value {
                Value::Dict(_, inner) if !inner.is_empty() => walk(inner, &path, out),
                _ => out.push(path),
            }
        }
    }

    let mut out = Vec::new();
    walk(dict, "", &mut out);
    out
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(pairs: &[(&str, Value)]) -> Dict {
        let mut out = Dict::new();
        for (key, value) in pairs {
            insert_path(&mut out, key, value.clone());
        }
        out
    }

    #[test]
    fn test_later_layers_override_earlier() {
        let store = ResolvedStore::from_layers(vec![
            Layer::new("defaults", dict(&[("port", 8080.into()), ("host", "127.0.0.1".into())])),
            Layer::new("environment", dict(&[("port", 7070.into())])),
            Layer::new("yaml file app.yaml", dict(&[("port", 9090.into())])),
        ])
        .expect("store");

        assert_eq!(store.get("port").and_then(|v| v.to_i128()), Some(9090));
        assert_eq!(store.get("host").and_then(|v| v.as_str().map(str::to_string)).as_deref(), Some("127.0.0.1"));
        assert_eq!(store.source_of("port").as_deref(), Some("yaml file app.yaml"));
        assert_eq!(store.source_of("host").as_deref(), Some("defaults"));
    }

    #[test]
    fn test_nested_tables_merge() {
        let store = ResolvedStore::from_layers(vec![
            Layer::new("defaults", dict(&[("db.host", "localhost".into()), ("db.port", 5432.into())])),
            Layer::new("file", dict(&[("db.host", "db.internal".into())])),
        ])
        .expect("store");

        assert_eq!(store.keys(), vec!["db.host".to_string(), "db.port".to_string()]);
        assert_eq!(store.get("db.port").and_then(|v| v.to_i128()), Some(5432));
        assert_eq!(
            store.get("db.host").and_then(|v| v.as_str().map(str::to_string)).as_deref(),
            Some("db.internal")
        );
    }

    #[test]
    fn test_insert_path_replaces_scalar_with_table() {
        let mut out = dict(&[("db", "sqlite".into())]);
        insert_path(&mut out, "db.host", "localhost".into());
        assert_eq!(leaf_paths(&out), vec!["db.host".to_string()]);
    }

    #[test]
    fn test_write_to_infers_format_from_extension() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let store =
            ResolvedStore::from_layers(vec![Layer::new("defaults", dict(&[("port", 8080.into())]))])
                .expect("store");

        let json_path = tmp.path().join("out.json");
        store.write_to(&json_path, ConfigFormat::Yaml).expect("write json");
        let written = fs::read_to_string(&json_path).expect("read");
        assert!(written.trim_start().starts_with('{'));

        let bare_path = tmp.path().join("out.conf");
        store.write_to(&bare_path, ConfigFormat::Toml).expect("write fallback");
        assert_eq!(fs::read_to_string(&bare_path).expect("read"), "port = 8080\n");
    }

    #[test]
    fn test_write_to_missing_directory_is_error() {
        let tmp = tempfile::TempDir::new().expect("tmp");
        let store = ResolvedStore::from_layers(vec![]).expect("store");
        let err = store
            .write_to(&tmp.path().join("missing").join("out.yaml"), ConfigFormat::Yaml)
            .expect_err("unwritable");
        assert!(matches!(err, ConfigError::Write { .. }));
    }

    #[test]
    fn test_write_to_writer() {
        let store =
            ResolvedStore::from_layers(vec![Layer::new("defaults", dict(&[("port", 8080.into())]))])
                .expect("store");
        let mut buf = Vec::new();
        store.write(ConfigFormat::Yaml, &mut buf).expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "port: 8080\n");
    }
}
