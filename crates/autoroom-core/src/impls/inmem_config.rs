//! InMemoryConfigStore - 開発・テスト用の設定ストア

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::ids::GroupId;
use crate::ports::config_store::{ConfigError, ConfigStore};

/// Per-group key-value store held in memory.
///
/// Durable enough for tests and the demo binary: values survive as long as
/// the process does. Production deployments plug in a real store.
#[derive(Default)]
pub struct InMemoryConfigStore {
    values: Mutex<HashMap<(GroupId, String), serde_json::Value>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(
        &self,
        group: GroupId,
        key: &str,
    ) -> Result<Option<serde_json::Value>, ConfigError> {
        let values = self.values.lock().unwrap();
        Ok(values.get(&(group, key.to_string())).cloned())
    }

    async fn put(
        &self,
        group: GroupId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), ConfigError> {
        let mut values = self.values.lock().unwrap();
        values.insert((group, key.to_string()), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_put_round_trip() {
        let store = InMemoryConfigStore::new();
        let group = GroupId::new(1);

        assert!(store.get(group, "k").await.unwrap().is_none());

        store
            .put(group, "k", serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(
            store.get(group, "k").await.unwrap(),
            Some(serde_json::json!({"x": 1}))
        );

        // Other groups are isolated.
        assert!(store.get(GroupId::new(2), "k").await.unwrap().is_none());
    }
}
