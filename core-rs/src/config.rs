/**
 * config.rs
 * Bridge configuration (YAML format)
 *
 * Format:
 * ```yaml
 * legacyDomain: mgmt
 * expressionDomain: mgmt.expr
 * properPropertyFormat: true
 * writable: true
 * enforceAccessControl: false
 * excludedAddresses: ["/core-service=platform-mbean"]
 * expressionProperties:
 *   jboss.bind.address: 127.0.0.1
 * audit:
 *   logPath: /var/log/bridge-audit.log
 *   logReadOnly: false
 *   maxLogSize: 10000000
 * ```
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{BridgeError, Result};
use crate::model::{ExpressionResolver, ResourcePath};

/// Audit log rotation threshold (10MB)
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10_000_000;

/// Domain served with eager expression resolution unless configured otherwise
pub const DEFAULT_LEGACY_DOMAIN: &str = "mgmt";
/// Domain served with expression-aware conversion unless configured otherwise
pub const DEFAULT_EXPRESSION_DOMAIN: &str = "mgmt.expr";
/// Subtree hidden from the bridge unless configured otherwise
pub const DEFAULT_EXCLUDED_ADDRESS: &str = "/core-service=platform-mbean";

const DOMAIN_FORBIDDEN: &[char] = &[':', '*', '?', ',', '='];

/// Write and access-control mode shared by every domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgePolicy {
    /// false = read-only mode: no attribute writes, only read-only operations
    pub writable: bool,
    /// true = restricted mode: per-attribute and per-operation gating
    pub enforce_access_control: bool,
}

impl Default for BridgePolicy {
    fn default() -> Self {
        Self {
            writable: true,
            enforce_access_control: false,
        }
    }
}

/// Audit trail settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    pub log_path: PathBuf,

    /// Also record reads (get, query, describe, count)
    #[serde(default)]
    pub log_read_only: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Size in bytes past which the log is rotated before the next write
    #[serde(default = "default_max_log_size")]
    pub max_log_size: u64,
}

impl AuditConfig {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            log_read_only: false,
            enabled: true,
            max_log_size: DEFAULT_MAX_LOG_SIZE,
        }
    }
}

/// Bridge configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default = "default_legacy_domain")]
    pub legacy_domain: Option<String>,

    #[serde(default = "default_expression_domain")]
    pub expression_domain: Option<String>,

    /// Legacy domain: PROPERTY values as a composite (true) or structured text (false)
    #[serde(default = "default_true")]
    pub proper_property_format: bool,

    #[serde(default = "default_true")]
    pub writable: bool,

    #[serde(default)]
    pub enforce_access_control: bool,

    #[serde(default = "default_excluded_addresses")]
    pub excluded_addresses: Vec<ResourcePath>,

    #[serde(default)]
    pub expression_properties: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditConfig>,
}

fn default_true() -> bool {
    true
}

fn default_max_log_size() -> u64 {
    DEFAULT_MAX_LOG_SIZE
}

fn default_legacy_domain() -> Option<String> {
    Some(DEFAULT_LEGACY_DOMAIN.to_string())
}

fn default_expression_domain() -> Option<String> {
    Some(DEFAULT_EXPRESSION_DOMAIN.to_string())
}

fn default_excluded_addresses() -> Vec<ResourcePath> {
    DEFAULT_EXCLUDED_ADDRESS.parse().map(|p| vec![p]).unwrap_or_default()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            legacy_domain: default_legacy_domain(),
            expression_domain: default_expression_domain(),
            proper_property_format: true,
            writable: true,
            enforce_access_control: false,
            excluded_addresses: default_excluded_addresses(),
            expression_properties: HashMap::new(),
            audit: None,
        }
    }
}

impl BridgeConfig {
    /// Load and validate a configuration file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML file
    ///
    /// # Example
    /// ```no_run
    /// use model_bridge::BridgeConfig;
    ///
    /// let config = BridgeConfig::load("bridge.yaml").unwrap();
    /// assert!(config.writable);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: BridgeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Ensures:
    /// - at least one domain is served
    /// - the two domains differ
    /// - domain names carry no name syntax or glob characters
    pub fn validate(&self) -> Result<()> {
        let domains: Vec<&str> = self.domains().into_iter().map(|(d, _)| d).collect();
        if domains.is_empty() {
            return Err(BridgeError::Config(
                "At least one of legacyDomain and expressionDomain must be set".to_string(),
            ));
        }

        for domain in &domains {
            if domain.is_empty() {
                return Err(BridgeError::Config("Domain cannot be empty".to_string()));
            }
            if domain.contains(DOMAIN_FORBIDDEN) {
                return Err(BridgeError::Config(format!(
                    "Invalid domain '{}': must not contain any of : * ? , =",
                    domain
                )));
            }
        }

        if domains.len() == 2 && domains[0] == domains[1] {
            return Err(BridgeError::Config(format!(
                "legacyDomain and expressionDomain must differ, both are '{}'",
                domains[0]
            )));
        }

        Ok(())
    }

    /// Save the configuration as YAML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path.as_ref(), yaml)?;
        Ok(())
    }

    /// Configured domains; the flag is true for the expression-aware domain
    pub fn domains(&self) -> Vec<(&str, bool)> {
        let mut domains = Vec::new();
        if let Some(domain) = &self.legacy_domain {
            domains.push((domain.as_str(), false));
        }
        if let Some(domain) = &self.expression_domain {
            domains.push((domain.as_str(), true));
        }
        domains
    }

    pub fn policy(&self) -> BridgePolicy {
        BridgePolicy {
            writable: self.writable,
            enforce_access_control: self.enforce_access_control,
        }
    }

    pub fn resolver(&self) -> ExpressionResolver {
        ExpressionResolver::with_properties(self.expression_properties.clone())
    }
}
