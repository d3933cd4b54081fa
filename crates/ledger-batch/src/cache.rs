//! Read-through cache of each user's category tree.

use std::collections::HashMap;
use std::sync::Arc;

use ledger_core::{Category, UserId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{CatalogError, CategoryCatalog};

/// Caches [`CategoryCatalog::list_hierarchy_for_user`] per user.
///
/// Hits only take the read lock. A miss takes the write lock and checks again
/// before loading, so concurrent first reads for a user load once.
pub struct CategoryCache {
    catalog: Arc<dyn CategoryCatalog>,
    entries: RwLock<HashMap<UserId, Arc<Vec<Category>>>>,
}

impl CategoryCache {
    pub fn new(catalog: Arc<dyn CategoryCatalog>) -> Self {
        Self {
            catalog,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The user's category tree, loading it on a miss.
    pub async fn get(&self, user_id: UserId) -> Result<Arc<Vec<Category>>, CatalogError> {
        if let Some(categories) = self.entries.read().await.get(&user_id) {
            return Ok(categories.clone());
        }

        let mut entries = self.entries.write().await;
        if let Some(categories) = entries.get(&user_id) {
            return Ok(categories.clone());
        }

        let categories = Arc::new(self.catalog.list_hierarchy_for_user(user_id).await?);
        debug!(user_id = %user_id, categories = categories.len(), "Loaded categories into cache");
        entries.insert(user_id, categories.clone());
        Ok(categories)
    }

    /// Drop the cached tree of one user.
    pub async fn invalidate(&self, user_id: UserId) {
        self.entries.write().await.remove(&user_id);
    }
}
