//! figbind: demo command tree with a root and a `serve` config scope
//!
//! Shows the full lifecycle: bind scopes, parse, resolve, then either dump a
//! scope through its `config-tool` subcommand or run the requested command.

use anyhow::Result;

mod cli;

fn main() -> Result<()> {
    cli::run()
}
