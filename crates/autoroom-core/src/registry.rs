//! Source registry: trigger rooms and their creation templates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::domain::ids::{GroupId, RoomId};
use crate::domain::source::{BasePolicy, SourceDescriptor};
use crate::ports::config_store::{ConfigError, ConfigStore, keys};

#[derive(Default)]
struct RegistryState {
    /// One descriptor per trigger room per group.
    sources: HashMap<GroupId, HashMap<RoomId, SourceDescriptor>>,
    base_policies: HashMap<GroupId, BasePolicy>,
}

/// Keyed lookup from trigger room to creation template, backed by the
/// durable config store.
///
/// Design:
/// - The in-memory map is the read path; every mutation persists to the
///   store first and commits to memory only after the write confirmed.
/// - The inner lock is never held across an await.
pub struct SourceRegistry {
    store: Arc<dyn ConfigStore>,
    state: Mutex<RegistryState>,
}

impl SourceRegistry {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Hydrate one group's configuration from the store.
    ///
    /// Called at startup for every known group. A malformed stored value is
    /// logged and treated as empty rather than taking the dispatcher down.
    pub async fn load_group(&self, group: GroupId) -> Result<(), ConfigError> {
        let sources: Vec<SourceDescriptor> = match self.store.get(group, keys::SOURCES).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(%group, error = %e, "stored sources are malformed; starting empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        let base: BasePolicy = match self.store.get(group, keys::BASE_POLICY).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => BasePolicy::default(),
        };

        let mut state = self.state.lock().unwrap();
        let by_trigger = state.sources.entry(group).or_default();
        by_trigger.clear();
        for d in sources {
            by_trigger.insert(d.trigger, d);
        }
        state.base_policies.insert(group, base);
        Ok(())
    }

    /// Descriptor for a trigger room, if one is configured.
    pub fn lookup(&self, group: GroupId, trigger: RoomId) -> Option<SourceDescriptor> {
        let state = self.state.lock().unwrap();
        state.sources.get(&group)?.get(&trigger).copied()
    }

    /// Permission base for a group (`Everyone` unless overridden).
    pub fn base_policy(&self, group: GroupId) -> BasePolicy {
        let state = self.state.lock().unwrap();
        state.base_policies.get(&group).copied().unwrap_or_default()
    }

    /// Add or replace the descriptor for a trigger room.
    pub async fn add(&self, group: GroupId, descriptor: SourceDescriptor) -> Result<(), ConfigError> {
        let mut next = self.snapshot(group);
        next.retain(|d| d.trigger != descriptor.trigger);
        next.push(descriptor);
        self.persist_sources(group, next).await
    }

    /// Remove a trigger room's descriptor. Returns whether it existed.
    pub async fn remove(&self, group: GroupId, trigger: RoomId) -> Result<bool, ConfigError> {
        let mut next = self.snapshot(group);
        let before = next.len();
        next.retain(|d| d.trigger != trigger);
        let existed = next.len() != before;
        if existed {
            self.persist_sources(group, next).await?;
        }
        Ok(existed)
    }

    /// All descriptors configured for a group.
    pub fn list(&self, group: GroupId) -> Vec<SourceDescriptor> {
        self.snapshot(group)
    }

    /// Override the permission base for a group (`None` resets to everyone).
    pub async fn set_base_policy(
        &self,
        group: GroupId,
        policy: BasePolicy,
    ) -> Result<(), ConfigError> {
        let value = serde_json::to_value(policy)
            .map_err(|e| ConfigError::Malformed {
                key: keys::BASE_POLICY.to_string(),
                reason: e.to_string(),
            })?;
        self.store.put(group, keys::BASE_POLICY, value).await?;
        let mut state = self.state.lock().unwrap();
        state.base_policies.insert(group, policy);
        Ok(())
    }

    fn snapshot(&self, group: GroupId) -> Vec<SourceDescriptor> {
        let state = self.state.lock().unwrap();
        state
            .sources
            .get(&group)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default()
    }

    async fn persist_sources(
        &self,
        group: GroupId,
        sources: Vec<SourceDescriptor>,
    ) -> Result<(), ConfigError> {
        let value = serde_json::to_value(&sources).map_err(|e| ConfigError::Malformed {
            key: keys::SOURCES.to_string(),
            reason: e.to_string(),
        })?;
        self.store.put(group, keys::SOURCES, value).await?;

        let mut state = self.state.lock().unwrap();
        let by_trigger = state.sources.entry(group).or_default();
        by_trigger.clear();
        for d in sources {
            by_trigger.insert(d.trigger, d);
        }
        Ok(())
    }
}
