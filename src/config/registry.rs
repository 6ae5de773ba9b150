//! Registry of bound scopes and their two-phase lifecycle.

use clap::parser::ValueSource;
use clap::ArgMatches;
use std::any::Any;
use std::io;
use std::path::{Path, PathBuf};

use super::binder::{FlagNames, CONFIG_ENV_FLAG, DESTINATION_ARG, USE_ENV_FLAG};
use super::env::EnvOverlay;
use super::format::ConfigFormat;
use super::resolve::ScopeInputs;
use super::scope::{PendingScope, ScopeState};
use super::store::ResolvedStore;
use crate::error::{ConfigError, Result};

/// Holds every bound scope in bind order.
///
/// Binding happens while the command tree is built; [`resolve_all`] runs once
/// the command line is parsed, before any command body uses its config.
///
/// [`resolve_all`]: ConfigRegistry::resolve_all
#[derive(Default)]
pub struct ConfigRegistry {
    scopes: Vec<Box<dyn PendingScope>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, scope: Box<dyn PendingScope>) {
        self.scopes.push(scope);
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s.name() == scope)
    }

    pub fn scope_names(&self) -> Vec<&str> {
        self.scopes.iter().map(|s| s.name()).collect()
    }

    pub fn state(&self, scope: &str) -> Option<ScopeState> {
        self.find(scope).map(|s| s.state())
    }

    pub fn store(&self, scope: &str) -> Option<&ResolvedStore> {
        self.find(scope).and_then(|s| s.store())
    }

    /// Name of the scope already holding the handle with this identity.
    pub(crate) fn bound_to(&self, target_id: usize) -> Option<&str> {
        self.scopes.iter().find(|s| s.target_id() == target_id).map(|s| s.name())
    }

    fn find(&self, scope: &str) -> Option<&dyn PendingScope> {
        self.scopes.iter().find(|s| s.name() == scope).map(|s| s.as_ref())
    }

    /// Resolve every pending scope from parsed command-line matches.
    ///
    /// Stops at the first scope that fails to decode.
    pub fn resolve_all(&mut self, matches: &ArgMatches) -> Result<()> {
        let chain = matches_chain(matches);
        let env = EnvOverlay {
            use_env: flag_value::<bool>(&chain, USE_ENV_FLAG).map(|(v, _)| *v).unwrap_or(false),
            prefix: flag_value::<String>(&chain, CONFIG_ENV_FLAG)
                .map(|(v, _)| v.clone())
                .unwrap_or_default(),
        };
        self.resolve_with(&env, |scope| scope_inputs(&chain, scope))
    }

    /// Resolve every pending scope with explicitly supplied inputs.
    pub fn resolve_with<F>(&mut self, env: &EnvOverlay, mut inputs: F) -> Result<()>
    where
        F: FnMut(&str) -> ScopeInputs,
    {
        for scope in &mut self.scopes {
            let scope_inputs = inputs(scope.name());
            scope.resolve(scope_inputs, env)?;
            tracing::debug!("Resolved config scope '{}'", scope.name());
        }
        Ok(())
    }

    /// Run the `config-tool` subcommand if that is what was invoked.
    ///
    /// Returns `false` when the matched subcommand belongs to the caller.
    pub fn run_config_tool(&mut self, matches: &ArgMatches) -> Result<bool> {
        for level in matches_chain(matches) {
            let Some((name, sub)) = level.subcommand() else {
                continue;
            };
            let Some(scope) = self
                .scopes
                .iter()
                .map(|s| s.name().to_string())
                .find(|s| FlagNames::for_scope(s).tool == name)
            else {
                continue;
            };
            let destination = sub.get_one::<String>(DESTINATION_ARG).map(String::as_str);
            self.dump(&scope, destination)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Write a resolved scope to `destination`, or stdout for `None`/`"-"`.
    ///
    /// Stdout uses the scope's declared format; files use their extension.
    pub fn dump(&mut self, scope: &str, destination: Option<&str>) -> Result<()> {
        let entry = self
            .scopes
            .iter_mut()
            .find(|s| s.name() == scope)
            .ok_or_else(|| ConfigError::UnknownScope(scope.to_string()))?;
        let store = entry.store().ok_or_else(|| ConfigError::NotResolved(scope.to_string()))?;

        match destination {
            None | Some("-") => store.write(entry.format(), &mut io::stdout().lock())?,
            Some(path) => store.write_to(Path::new(path), entry.format())?,
        }
        entry.mark_dumped();
        Ok(())
    }
}

/// The root matches followed by each nested subcommand's matches.
fn matches_chain(matches: &ArgMatches) -> Vec<&ArgMatches> {
    let mut chain = vec![matches];
    let mut current = matches;
    while let Some((_, sub)) = current.subcommand() {
        chain.push(sub);
        current = sub;
    }
    chain
}

/// Find a flag value anywhere along the chain.
///
/// A value the user supplied wins over a default; deeper levels win ties. The
/// boolean reports whether the value was supplied.
fn flag_value<'a, T>(chain: &[&'a ArgMatches], id: &str) -> Option<(&'a T, bool)>
where
    T: Any + Clone + Send + Sync + 'static,
{
    let mut fallback = None;
    for level in chain.iter().rev().copied() {
        let Ok(Some(value)) = level.try_get_one::<T>(id) else {
            continue;
        };
        if matches!(level.value_source(id), Some(ValueSource::CommandLine | ValueSource::EnvVariable))
        {
            return Some((value, true));
        }
        if fallback.is_none() {
            fallback = Some((value, false));
        }
    }
    fallback
}

fn scope_inputs(chain: &[&ArgMatches], scope: &str) -> ScopeInputs {
    let names = FlagNames::for_scope(scope);
    let file = flag_value::<String>(chain, &names.config_file)
        .map(|(path, _)| path.as_str())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);
    let (format, format_explicit) = flag_value::<ConfigFormat>(chain, &names.config_type)
        .map(|(format, explicit)| (*format, explicit))
        .unwrap_or_default();
    ScopeInputs { file, format, format_explicit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigHandle;
    use clap::Command;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Serve {
        port: u16,
        host: String,
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Root {
        api_url: String,
        hostname: String,
    }

    struct App {
        registry: ConfigRegistry,
        command: Command,
        root: ConfigHandle<Root>,
        serve: ConfigHandle<Serve>,
    }

    fn app() -> App {
        let mut registry = ConfigRegistry::new();
        let root = ConfigHandle::new();
        let serve = ConfigHandle::new();
        let command = Command::new("app").subcommand(Command::new("serve"));
        let command = registry
            .bind(command, json!({"api_url": "http://localhost/api"}), &root, "")
            .expect("bind root");
        let command = registry
            .bind(command, json!({"port": 8080, "host": "127.0.0.1"}), &serve, "serve")
            .expect("bind serve");
        App { registry, command, root, serve }
    }

    #[test]
    fn test_resolve_all_with_defaults() {
        let mut app = app();
        let matches = app.command.try_get_matches_from(["app"]).expect("parse");
        app.registry.resolve_all(&matches).expect("resolve");

        assert_eq!(app.serve.get(), Some(&Serve { port: 8080, host: "127.0.0.1".to_string() }));
        assert_eq!(app.root.get().map(|r| r.api_url.as_str()), Some("http://localhost/api"));
        assert_eq!(app.registry.state("serve"), Some(ScopeState::Resolved));
    }

    #[test]
    fn test_scope_file_flag_after_subcommand() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("serve.yaml");
        fs::write(&path, "port: 9090\n").expect("write");

        let mut app = app();
        let matches = app
            .command
            .try_get_matches_from([
                "app",
                "serve",
                "--serve-config-file",
                path.to_str().expect("utf8 path"),
            ])
            .expect("parse");
        app.registry.resolve_all(&matches).expect("resolve");

        assert_eq!(app.serve.get().map(|s| s.port), Some(9090));
        assert_eq!(app.root.get().map(|r| r.hostname.as_str()), Some(""));
    }

    #[test]
    fn test_scope_inputs_track_explicit_format() {
        let app = app();
        let matches = app
            .command
            .try_get_matches_from(["app", "--config-type", "toml", "--serve-config-file", "s.yml"])
            .expect("parse");
        let chain = matches_chain(&matches);

        let root = scope_inputs(&chain, "");
        assert_eq!(root, ScopeInputs { file: None, format: ConfigFormat::Toml, format_explicit: true });

        let serve = scope_inputs(&chain, "serve");
        assert_eq!(serve.file, Some(PathBuf::from("s.yml")));
        assert_eq!(serve.format, ConfigFormat::Yaml);
        assert!(!serve.format_explicit);
    }

    #[test]
    fn test_unknown_key_stops_resolution() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("root.yaml");
        fs::write(&path, "api_url: x\nextra: 1\n").expect("write");

        let mut app = app();
        let matches = app
            .command
            .try_get_matches_from(["app", "--config-file", path.to_str().expect("utf8 path")])
            .expect("parse");
        let err = app.registry.resolve_all(&matches).expect_err("unknown key");

        assert!(matches!(err, ConfigError::UnknownKeys { .. }));
        assert_eq!(app.registry.state(""), Some(ScopeState::Registered));
        assert!(app.serve.get().is_none());
    }

    #[test]
    fn test_run_config_tool_writes_file() {
        let tmp = TempDir::new().expect("tmp");
        let out = tmp.path().join("serve.json");

        let mut app = app();
        let matches = app
            .command
            .try_get_matches_from(["app", "serve-config-tool", out.to_str().expect("utf8 path")])
            .expect("parse");
        app.registry.resolve_all(&matches).expect("resolve");

        assert!(app.registry.run_config_tool(&matches).expect("dump"));
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).expect("read")).expect("json");
        assert_eq!(written, json!({"host": "127.0.0.1", "port": 8080}));
        assert_eq!(app.registry.state("serve"), Some(ScopeState::Dumped));
        assert_eq!(app.registry.state(""), Some(ScopeState::Resolved));
    }

    #[test]
    fn test_run_config_tool_ignores_other_subcommands() {
        let mut app = app();
        let matches = app.command.try_get_matches_from(["app", "serve"]).expect("parse");
        app.registry.resolve_all(&matches).expect("resolve");
        assert!(!app.registry.run_config_tool(&matches).expect("no dump"));
    }

    #[test]
    fn test_dump_before_resolve_is_error() {
        let mut app = app();
        let err = app.registry.dump("serve", Some("-")).expect_err("not resolved");
        assert!(matches!(err, ConfigError::NotResolved(_)));

        let err = app.registry.dump("missing", None).expect_err("unknown scope");
        assert!(matches!(err, ConfigError::UnknownScope(_)));
    }

    #[test]
    fn test_resolve_with_explicit_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SVC_PORT", "6060");
            let mut app = app();
            app.registry
                .resolve_with(&EnvOverlay::prefixed("svc"), |_| ScopeInputs::default())
                .map_err(|e| e.to_string())?;
            assert_eq!(app.serve.get().map(|s| s.port), Some(6060));
            Ok(())
        });
    }

    #[test]
    fn test_env_flags_read_from_matches() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SVC_PORT", "6161");
            jail.set_env("PORT", "6262");

            let mut app = app();
            let matches = app
                .command
                .clone()
                .try_get_matches_from(["app", "serve", "--config-env", "svc", "--use-env"])
                .map_err(|e| e.to_string())?;
            app.registry.resolve_all(&matches).map_err(|e| e.to_string())?;
            // a prefix takes precedence over unprefixed lookup
            assert_eq!(app.serve.get().map(|s| s.port), Some(6161));
            Ok(())
        });
    }
}
