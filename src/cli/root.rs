//! Root command config

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::serve::ServeConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    pub api_url: String,
    pub hostname: String,
    #[serde(flatten)]
    pub auth: RootAuthConfig,
}

/// Credentials kept at the top level of the root config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootAuthConfig {
    pub auth_username: String,
    pub auth_password: String,
}

pub fn defaults() -> Value {
    json!({
        "api_url": "http://localhost/api",
        "auth_username": "zzyzx",
        "auth_password": "12fa",
    })
}

pub fn run(root: &RootConfig, serve: &ServeConfig) -> Result<()> {
    eprintln!("root called with {:?}, {:?}", root, serve);
    Ok(())
}
