//! Audit trail for bridge calls
//!
//! One JSON object per line (JSONL). Reads are only recorded when the audit
//! configuration asks for them. Values of attributes and parameters whose
//! name looks sensitive are written as `[REDACTED]`. A log grown past
//! `maxLogSize` is renamed to `<name>.log.<timestamp>` before the next write.
//!
//! # Example
//!
//! ```rust
//! use model_bridge::audit::{AuditEntry, BridgeAuditLogger};
//! use model_bridge::config::AuditConfig;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let logger = BridgeAuditLogger::new(&AuditConfig::new(dir.path().join("audit.log")));
//! logger
//!     .record(AuditEntry::new("set-attribute", "mgmt:subsystem=net", false).succeeded())
//!     .unwrap();
//! assert_eq!(logger.entries().unwrap().len(), 1);
//! ```

use crate::config::AuditConfig;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_FRAGMENTS: &[&str] = &["password", "secret", "token", "credential", "key-store"];

/// Appends audit entries to a JSONL file
pub struct BridgeAuditLogger {
    log_path: PathBuf,
    log_read_only: bool,
    enabled: bool,
    max_log_size: u64,
    write_lock: Mutex<()>,
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub name: String,
    pub read_only: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub data: JsonValue,
}

impl AuditEntry {
    pub fn new(operation: impl Into<String>, name: impl Into<String>, read_only: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            name: name.into(),
            read_only,
            success: false,
            error: None,
            data: JsonValue::Null,
        }
    }

    /// Attach call details; sensitive fields are redacted
    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = redact(data);
        self
    }

    pub fn succeeded(mut self) -> Self {
        self.success = true;
        self.error = None;
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

impl BridgeAuditLogger {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            log_path: config.log_path.clone(),
            log_read_only: config.log_read_only,
            enabled: config.enabled,
            max_log_size: config.max_log_size,
            write_lock: Mutex::new(()),
        }
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Whether an entry of this kind would be written
    pub fn records(&self, read_only: bool) -> bool {
        self.enabled && (!read_only || self.log_read_only)
    }

    /// Append an entry unless the configuration skips it
    pub fn record(&self, entry: AuditEntry) -> Result<()> {
        if !self.records(entry.read_only) {
            return Ok(());
        }
        tracing::info!(
            target: "audit",
            operation = %entry.operation,
            name = %entry.name,
            success = entry.success,
            "Bridge call"
        );
        self.write_entry(&entry)
    }

    /// Every entry currently in the log, oldest first
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.log_path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }

    /// Rotate log file if it exceeds max size
    pub fn rotate_if_needed(&self) -> Result<bool> {
        let _guard = self.write_lock.lock();
        self.rotate_locked()
    }

    // Caller holds `write_lock`
    fn rotate_locked(&self) -> Result<bool> {
        if !self.log_path.exists() || fs::metadata(&self.log_path)?.len() <= self.max_log_size {
            return Ok(false);
        }

        let timestamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let mut rotated_path = self.log_path.with_extension(format!("log.{}", timestamp));
        let mut suffix = 1;
        while rotated_path.exists() {
            rotated_path = self.log_path.with_extension(format!("log.{}.{}", timestamp, suffix));
            suffix += 1;
        }
        fs::rename(&self.log_path, &rotated_path)?;
        tracing::info!(target: "audit", rotated = %rotated_path.display(), "Audit log rotated");
        Ok(true)
    }

    fn write_entry(&self, entry: &AuditEntry) -> Result<()> {
        let json = serde_json::to_string(entry)?;

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.rotate_locked()?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

fn is_sensitive(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment) || lower.contains(&fragment.replace('-', "")))
}

/// Replace the values of sensitive keys, and the `value` next to a sensitive `attribute`
fn redact(mut data: JsonValue) -> JsonValue {
    if let Some(obj) = data.as_object_mut() {
        let sensitive_attribute = obj
            .get("attribute")
            .and_then(JsonValue::as_str)
            .map(is_sensitive)
            .unwrap_or(false);
        for (key, value) in obj.iter_mut() {
            if is_sensitive(key) || (sensitive_attribute && key == "value") {
                *value = JsonValue::String(REDACTED.to_string());
            } else if value.is_object() {
                *value = redact(value.take());
            }
        }
    }
    data
}
