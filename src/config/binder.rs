//! Attaching config flags and the `config-tool` subcommand to a command tree.

use clap::{value_parser, Arg, ArgAction, Command};
use figment::value::{Dict, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::format::ConfigFormat;
use super::registry::ConfigRegistry;
use super::scope::{ConfigHandle, ConfigScope};
use crate::error::{ConfigError, Result};

/// Shared flag holding the environment variable prefix.
pub const CONFIG_ENV_FLAG: &str = "config-env";
/// Shared flag enabling unprefixed environment lookup.
pub const USE_ENV_FLAG: &str = "use-env";
/// Positional argument of a `config-tool` subcommand.
pub const DESTINATION_ARG: &str = "destination";

/// Flag and subcommand names for one scope.
///
/// The root scope (`""`) gets bare names; any other scope prefixes them with
/// `<scope>-` so several scopes can share one parent command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagNames {
    pub config_file: String,
    pub config_type: String,
    pub tool: String,
}

impl FlagNames {
    pub fn for_scope(scope: &str) -> Self {
        let prefix = if scope.is_empty() { String::new() } else { format!("{}-", scope) };
        Self {
            config_file: format!("{}config-file", prefix),
            config_type: format!("{}config-type", prefix),
            tool: format!("{}config-tool", prefix),
        }
    }
}

impl ConfigRegistry {
    /// Bind a config scope to `parent`.
    ///
    /// Adds the scope's `--config-file`/`--config-type` flags as globals, the
    /// shared `--config-env`/`--use-env` flags if `parent` lacks them, and a
    /// `config-tool` subcommand. The scope stays pending until
    /// [`ConfigRegistry::resolve_all`] runs after argument parsing.
    pub fn bind<T>(
        &mut self,
        parent: Command,
        defaults: impl Serialize,
        target: &ConfigHandle<T>,
        scope: &str,
    ) -> Result<Command>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        if self.contains(scope) {
            return Err(ConfigError::DuplicateScope(scope.to_string()));
        }
        if let Some(bound_to) = self.bound_to(target.id()) {
            return Err(ConfigError::SharedHandle {
                scope: scope.to_string(),
                bound_to: bound_to.to_string(),
            });
        }
        let defaults = defaults_dict(scope, defaults)?;
        let names = FlagNames::for_scope(scope);

        let mut parent = parent
            .arg(
                Arg::new(names.config_file.clone())
                    .long(names.config_file.clone())
                    .value_name("FILE")
                    .global(true)
                    .help("Config file to read"),
            )
            .arg(
                Arg::new(names.config_type.clone())
                    .long(names.config_type.clone())
                    .value_name("FORMAT")
                    .value_parser(value_parser!(ConfigFormat))
                    .default_value("yaml")
                    .global(true)
                    .help("Format of the config file"),
            );

        if !has_arg(&parent, CONFIG_ENV_FLAG) {
            parent = parent.arg(
                Arg::new(CONFIG_ENV_FLAG)
                    .long(CONFIG_ENV_FLAG)
                    .value_name("PREFIX")
                    .global(true)
                    .help("Read environment variables with this prefix"),
            );
        }
        if !has_arg(&parent, USE_ENV_FLAG) {
            parent = parent.arg(
                Arg::new(USE_ENV_FLAG)
                    .long(USE_ENV_FLAG)
                    .action(ArgAction::SetTrue)
                    .global(true)
                    .help("Read unprefixed environment variables"),
            );
        }

        let tool = Command::new(names.tool)
            .about("Read, decode, then write config to a file or '-' for stdout")
            .arg(
                Arg::new(DESTINATION_ARG)
                    .value_name("DEST")
                    .help("Output file; '-' or omitted writes to stdout"),
            );

        tracing::debug!("Bound config scope '{}'", scope);
        self.register(Box::new(ConfigScope::new(scope, defaults, target.clone())));
        Ok(parent.subcommand(tool))
    }
}

pub(crate) fn has_arg(command: &Command, id: &str) -> bool {
    command.get_arguments().any(|arg| arg.get_id() == id)
}

fn defaults_dict(scope: &str, defaults: impl Serialize) -> Result<Dict> {
    let value = Value::serialize(defaults).map_err(|e| ConfigError::InvalidDefaults {
        scope: scope.to_string(),
        reason: e.to_string(),
    })?;
    match value {
        Value::Dict(_, dict) => Ok(dict),
        Value::Empty(..) => Ok(Dict::new()),
        other => Err(ConfigError::InvalidDefaults {
            scope: scope.to_string(),
            reason: format!("got {}", other.to_actual()),
        }),
    }
}
