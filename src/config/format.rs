//! Config file formats understood for reading and dumping.

use clap::ValueEnum;
use figment::providers::{Format, Json, Toml, Yaml};
use figment::value::Dict;
use figment::{Profile, Provider};
use std::fmt;
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Serialization format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    #[value(alias = "yml")]
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    /// Infer the format from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str())?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Parse file content into a key/value dictionary.
    ///
    /// Blank content parses to an empty dictionary in every format.
    pub fn parse(self, content: &str) -> std::result::Result<Dict, figment::Error> {
        if content.trim().is_empty() {
            return Ok(Dict::new());
        }

        let mut data = match self {
            ConfigFormat::Yaml => Yaml::string(content).data()?,
            ConfigFormat::Toml => Toml::string(content).data()?,
            ConfigFormat::Json => Json::string(content).data()?,
        };
        Ok(data.remove(&Profile::Default).unwrap_or_default())
    }

    /// Serialize a dictionary as text in this format.
    pub fn render(self, values: &Dict) -> Result<String> {
        let encoded = match self {
            ConfigFormat::Yaml => serde_yaml::to_string(values).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::to_string_pretty(values).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::to_string_pretty(values)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
        };
        encoded.map_err(|reason| ConfigError::Encode { format: self, reason })
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
