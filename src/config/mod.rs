//! Configuration binding and resolution
//!
//! Each bound scope resolves its typed config from defaults, environment
//! variables and a config file, with precedence (File > Env > Defaults).

pub mod binder;
pub mod env;
pub mod format;
pub mod registry;
pub mod resolve;
pub mod scope;
pub mod store;

pub use binder::{FlagNames, CONFIG_ENV_FLAG, DESTINATION_ARG, USE_ENV_FLAG};
pub use env::EnvOverlay;
pub use format::ConfigFormat;
pub use registry::ConfigRegistry;
pub use resolve::{decode_strict, resolve, resolve_store, ScopeInputs};
pub use scope::{ConfigHandle, ScopeState};
pub use store::ResolvedStore;
