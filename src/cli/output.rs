//! Output formatting for CLI commands
//!
//! Every command prints exactly one JSON object on stdout:
//! `{"success": true, ...fields}` or `{"success": false, "error": "..."}`.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone)]
pub struct OutputContext {
    /// Project root for relative path calculation
    root: PathBuf,
}

impl OutputContext {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the project root, or unchanged if outside it
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    /// Print the outcome of a command
    pub fn report<T: Serialize, E: Display>(&self, result: Result<T, E>) {
        let envelope = envelope(result);
        match serde_json::to_string_pretty(&envelope) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize output: {e}"),
        }
    }
}

/// Object payloads are flattened next to `success`; anything else goes
/// under `data`.
fn envelope<T: Serialize, E: Display>(result: Result<T, E>) -> Value {
    let data = match result {
        Ok(data) => serde_json::to_value(data),
        Err(e) => return json!({ "success": false, "error": e.to_string() }),
    };

    match data {
        Ok(Value::Object(fields)) => {
            let mut object = Map::with_capacity(fields.len() + 1);
            object.insert("success".to_string(), Value::Bool(true));
            object.extend(fields);
            Value::Object(object)
        }
        Ok(other) => json!({ "success": true, "data": other }),
        Err(e) => json!({ "success": false, "error": format!("Failed to serialize output: {e}") }),
    }
}
