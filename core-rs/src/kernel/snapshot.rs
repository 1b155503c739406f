//! YAML model snapshots
//!
//! A snapshot seeds an [`InMemoryKernel`](crate::kernel::InMemoryKernel):
//!
//! ```yaml
//! registrations:
//!   - path: /subsystem=*
//!     description: A subsystem
//!     attributes:
//!       - {name: enabled, type: BOOLEAN, access: READ_WRITE}
//! resources:
//!   - path: /subsystem=net
//!     attributes: {enabled: true}
//! access:
//!   rules:
//!     - {path: /subsystem=secure, addressable: false}
//! ```
//!
//! Resources must be listed parent first.

use crate::errors::Result;
use crate::model::{MetadataDocument, ResourcePath, Value};
use crate::rbac::AccessPolicy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationSnapshot {
    /// Path pattern; wildcard values cover every instance
    pub path: ResourcePath,

    #[serde(flatten)]
    pub metadata: MetadataDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub path: ResourcePath,

    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSnapshot {
    #[serde(default)]
    pub registrations: Vec<RegistrationSnapshot>,

    #[serde(default)]
    pub resources: Vec<ResourceSnapshot>,

    #[serde(default)]
    pub access: AccessPolicy,
}

impl ModelSnapshot {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}
