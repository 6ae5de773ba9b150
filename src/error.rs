//! Error types for configuration binding and resolution.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigFormat;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The merged store holds keys that no field of the target accepts.
    #[error("{}: unknown configuration keys: {}", scope_label(.scope), .keys.join(", "))]
    UnknownKeys { scope: String, keys: Vec<String> },

    #[error("{}: {source}", scope_label(.scope))]
    Decode {
        scope: String,
        #[source]
        source: figment::Error,
    },

    #[error("{}: defaults must be a key/value map ({reason})", scope_label(.scope))]
    InvalidDefaults { scope: String, reason: String },

    #[error("{}: already bound", scope_label(.0))]
    DuplicateScope(String),

    /// One handle can only be filled by a single scope.
    #[error("{}: target handle is already bound to the {}", scope_label(.scope), scope_label(.bound_to))]
    SharedHandle { scope: String, bound_to: String },

    #[error("{}: no such scope is bound", scope_label(.0))]
    UnknownScope(String),

    #[error("{}: configuration has not been resolved", scope_label(.0))]
    NotResolved(String),

    #[error("failed to encode configuration as {format}: {reason}")]
    Encode { format: ConfigFormat, reason: String },

    #[error("failed to write configuration to {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn scope_label(scope: &str) -> String {
    if scope.is_empty() {
        "root config".to_string()
    } else {
        format!("{} config", scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_message_names_scope_and_keys() {
        let err = ConfigError::UnknownKeys {
            scope: "serve".to_string(),
            keys: vec!["colour".to_string(), "tls.cert".to_string()],
        };
        assert_eq!(err.to_string(), "serve config: unknown configuration keys: colour, tls.cert");
    }

    #[test]
    fn shared_handle_message_names_both_scopes() {
        let err = ConfigError::SharedHandle { scope: "serve".to_string(), bound_to: String::new() };
        assert_eq!(err.to_string(), "serve config: target handle is already bound to the root config");
    }

    #[test]
    fn root_scope_is_labelled() {
        let err = ConfigError::NotResolved(String::new());
        assert_eq!(err.to_string(), "root config: configuration has not been resolved");
    }
}
