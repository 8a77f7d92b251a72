use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

/// Append-only NDJSON transcript of wire exchanges, for debugging hub
/// firmware quirks. Write failures are logged and swallowed; a broken
/// transcript must never fail a command.
pub(crate) struct MessageLogger {
    file: File,
}

impl MessageLogger {
    pub fn new(path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn log_command(&mut self, command: &str, device: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "command": command,
            "device": device,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_reply(&mut self, command: &str, device: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "reply",
            "command": command,
            "device": device,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_offline(&mut self, command: &str, device: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "offline",
            "command": command,
            "device": device,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
