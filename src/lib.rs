//! figbind: layered configuration bound to clap command trees
//!
//! Each config scope gets `--config-file`/`--config-type` flags, shared
//! `--config-env`/`--use-env` flags and a `config-tool` subcommand that dumps
//! the resolved configuration.
//!
//! ```no_run
//! use clap::Command;
//! use figbind::{ConfigHandle, ConfigRegistry};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct ServeConfig {
//!     port: u16,
//!     host: String,
//! }
//!
//! fn main() -> figbind::Result<()> {
//!     let mut registry = ConfigRegistry::new();
//!     let serve = ConfigHandle::<ServeConfig>::new();
//!     let command = Command::new("app").subcommand(Command::new("serve"));
//!     let command =
//!         registry.bind(command, json!({"port": 8080, "host": "127.0.0.1"}), &serve, "serve")?;
//!
//!     let matches = command.get_matches();
//!     registry.resolve_all(&matches)?;
//!     if registry.run_config_tool(&matches)? {
//!         return Ok(());
//!     }
//!     println!("{:?}", serve.get());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

pub use config::{
    resolve, ConfigFormat, ConfigHandle, ConfigRegistry, EnvOverlay, ResolvedStore, ScopeInputs,
    ScopeState,
};
pub use error::{ConfigError, Result};
