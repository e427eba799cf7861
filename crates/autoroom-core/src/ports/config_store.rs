//! ConfigStore port - durable per-group configuration.
//!
//! The configuration store is an external collaborator: it persists
//! source-descriptor entries and the member-role-base override per group.
//! Values cross the boundary as JSON so the store needs no schema of its own.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ids::GroupId;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("config store unavailable: {0}")]
    Unavailable(String),

    #[error("stored value for key '{key}' is malformed: {reason}")]
    Malformed { key: String, reason: String },
}

/// Durable per-group key-value storage.
///
/// Read at startup and on mutation commands; written whenever the registry
/// changes. Keys are flat strings scoped by group.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, group: GroupId, key: &str) -> Result<Option<serde_json::Value>, ConfigError>;

    async fn put(
        &self,
        group: GroupId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), ConfigError>;
}

/// Keys used by the registry.
pub mod keys {
    pub const SOURCES: &str = "sources";
    pub const BASE_POLICY: &str = "base_policy";
}
