//! Serve command config

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::root::RootConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServeConfig {
    pub port: u16,
    pub host: String,
}

pub fn defaults() -> Value {
    json!({
        "port": 8080,
        "host": "127.0.0.1",
    })
}

pub fn run(root: &RootConfig, serve: &ServeConfig) -> Result<()> {
    eprintln!("serve called with {:?}, {:?}", root, serve);
    Ok(())
}
