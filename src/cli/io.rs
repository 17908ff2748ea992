//! JSON output for the CLI
//!
//! One JSON object per command on stdout, UTF-8 only.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read and parse a JSON input file
pub fn read_json_file<T: DeserializeOwned>(path: &Path, what: &str) -> CliResult<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::io_error(format!("Failed to read {} '{}': {}", what, path.display(), e))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::input_error(format!("Invalid {} JSON: {}", what, e)))
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
