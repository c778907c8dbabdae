use serde_json::Value;

use crate::error::CliError;

/// Print a command result to stdout as a single JSON document.
pub fn render(data: &Value, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    println!("{payload}");
    Ok(())
}
