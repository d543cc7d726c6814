//! JSON output for CLI commands
//!
//! One pretty-printed JSON document per command on stdout, UTF-8 only.

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write `value` as pretty JSON to stdout
pub fn write_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
