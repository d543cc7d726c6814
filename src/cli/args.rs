//! CLI argument definitions using clap
//!
//! Commands:
//! - restgate introspect --config <path>
//! - restgate schema --config <path> --database <sqlite file> [--role <role>]
//! - restgate env --dialect <dialect> [--pair key=value]...
//! - restgate status --dialect <dialect> --code <code> [--authenticated]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::db::Dialect;

/// restgate - REST to SQL protocol layer
#[derive(Parser, Debug)]
#[command(name = "restgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the introspection statement for a configuration
    Introspect {
        /// Path to configuration file
        #[arg(long, default_value = "./restgate.json")]
        config: PathBuf,
    },

    /// Introspect an SQLite database and print what a role can see
    Schema {
        /// Path to configuration file
        #[arg(long, default_value = "./restgate.json")]
        config: PathBuf,

        /// SQLite database file
        #[arg(long)]
        database: PathBuf,

        /// Role to filter by (default: the anonymous role)
        #[arg(long)]
        role: Option<String>,

        /// Print UI permissions instead of objects
        #[arg(long)]
        permissions: bool,
    },

    /// Print the statement that exposes a request env to SQL
    Env {
        #[arg(long)]
        dialect: Dialect,

        /// Env pair, repeatable, in order
        #[arg(long = "pair", value_parser = parse_pair)]
        pairs: Vec<(String, String)>,
    },

    /// Translate a native database error code into an HTTP status
    Status {
        #[arg(long)]
        dialect: Dialect,

        #[arg(long)]
        code: String,

        /// Caller presented a valid token
        #[arg(long)]
        authenticated: bool,
    },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
