use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Lookup boundary toward the user store. The typing relay re-validates
/// display names through this trait because the sending client's cached
/// name may be stale; lookup failure degrades to the supplied name.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>>;
}

/// In-memory directory used by the server binary and tests. A deployment
/// backed by the document store implements [`UserDirectory`] against it.
#[derive(Default)]
pub struct StaticDirectory {
    names: RwLock<HashMap<String, String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: &str, name: &str) {
        self.names
            .write()
            .await
            .insert(user_id.to_string(), name.to_string());
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.names.read().await.get(user_id).cloned())
    }
}
