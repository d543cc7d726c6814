//! CLI module for restgate
//!
//! Offline helpers around the protocol layer:
//! - introspect: print the bootstrap statement
//! - schema: introspect an SQLite file and show a role's view
//! - env: render a request env for a dialect
//! - status: translate a native error code

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{env, introspect, run, run_command, schema, status};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_json;
