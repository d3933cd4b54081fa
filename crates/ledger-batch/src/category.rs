//! Category management.
//!
//! Every successful mutation invalidates the user's entry in the
//! [`CategoryCache`], so the next recognition prompt sees the change.

use std::sync::Arc;

use ledger_core::{BillType, Category, CategoryId, UserId, DEFAULT_TEMPLATES};
use tracing::info;

use crate::cache::CategoryCache;
use crate::error::ServiceError;
use crate::store::{CategoryRecord, CategoryRepository, NewCategory};

/// Request to create a category.
#[derive(Debug, Clone)]
pub struct CreateCategory {
    pub name: String,
    /// Ignored for second-level categories, which take their parent's type.
    pub kind: BillType,
    pub parent_id: Option<CategoryId>,
    pub icon: String,
    pub sort_order: i32,
}

impl CreateCategory {
    /// A top-level category.
    pub fn top_level(name: impl Into<String>, kind: BillType) -> Self {
        Self {
            name: name.into(),
            kind,
            parent_id: None,
            icon: String::new(),
            sort_order: 0,
        }
    }

    /// A second-level category under `parent_id`.
    pub fn child_of(parent_id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::top_level(name, BillType::Expense)
        }
    }
}

/// Request to update a category. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
}

/// Manages users' category trees.
pub struct CategoryService {
    repository: Arc<dyn CategoryRepository>,
    cache: Arc<CategoryCache>,
}

impl CategoryService {
    pub fn new(repository: Arc<dyn CategoryRepository>, cache: Arc<CategoryCache>) -> Self {
        Self { repository, cache }
    }

    /// The user's category tree, served from the cache.
    pub async fn list(&self, user_id: UserId) -> Result<Arc<Vec<Category>>, ServiceError> {
        Ok(self.cache.get(user_id).await?)
    }

    pub async fn create(
        &self,
        user_id: UserId,
        request: CreateCategory,
    ) -> Result<CategoryRecord, ServiceError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::InvalidParams("category name is required".into()));
        }

        let kind = match request.parent_id {
            Some(parent_id) => {
                let parent = self.owned(user_id, parent_id).await?;
                if parent.parent_id.is_some() {
                    return Err(ServiceError::InvalidParams(
                        "categories nest at most two levels".into(),
                    ));
                }
                parent.kind
            }
            None => request.kind,
        };

        if self
            .repository
            .exists_by_name(user_id, request.parent_id, &name, kind)
            .await?
        {
            return Err(ServiceError::CategoryExists);
        }

        let record = self
            .repository
            .insert(NewCategory {
                user_id,
                name,
                kind,
                parent_id: request.parent_id,
                icon: request.icon,
                sort_order: request.sort_order,
            })
            .await?;
        self.cache.invalidate(user_id).await;

        info!(user_id = %user_id, category_id = %record.id, name = %record.name, "Created category");
        Ok(record)
    }

    pub async fn update(
        &self,
        user_id: UserId,
        id: CategoryId,
        request: UpdateCategory,
    ) -> Result<CategoryRecord, ServiceError> {
        let mut record = self.owned(user_id, id).await?;

        if let Some(name) = request.name.map(|n| n.trim().to_string()) {
            if !name.is_empty() && name != record.name {
                if self
                    .repository
                    .exists_by_name(user_id, record.parent_id, &name, record.kind)
                    .await?
                {
                    return Err(ServiceError::CategoryExists);
                }
                record.name = name;
            }
        }
        if let Some(icon) = request.icon.filter(|i| !i.is_empty()) {
            record.icon = icon;
        }
        if let Some(sort_order) = request.sort_order {
            record.sort_order = sort_order;
        }

        self.repository.update(record.clone()).await?;
        self.cache.invalidate(user_id).await;
        Ok(record)
    }

    pub async fn delete(&self, user_id: UserId, id: CategoryId) -> Result<(), ServiceError> {
        self.owned(user_id, id).await?;
        if self.repository.has_children(id).await? {
            return Err(ServiceError::CategoryHasChildren);
        }

        self.repository.delete(id).await?;
        self.cache.invalidate(user_id).await;

        info!(user_id = %user_id, category_id = %id, "Deleted category");
        Ok(())
    }

    /// Give a user the built-in starter categories.
    pub async fn init_from_templates(&self, user_id: UserId) -> Result<usize, ServiceError> {
        // A partial seed still changes the tree, so invalidate either way.
        let seeded = self.insert_templates(user_id).await;
        self.cache.invalidate(user_id).await;

        let created = seeded?;
        info!(user_id = %user_id, created, "Initialized categories from templates");
        Ok(created)
    }

    async fn insert_templates(&self, user_id: UserId) -> Result<usize, ServiceError> {
        let mut created = 0;
        for (position, template) in DEFAULT_TEMPLATES.iter().enumerate() {
            let parent = self
                .repository
                .insert(NewCategory {
                    user_id,
                    name: template.name.to_string(),
                    kind: template.kind,
                    parent_id: None,
                    icon: template.icon.to_string(),
                    sort_order: position as i32,
                })
                .await?;
            created += 1;

            for (child_position, child) in template.children.iter().enumerate() {
                self.repository
                    .insert(NewCategory {
                        user_id,
                        name: child.to_string(),
                        kind: template.kind,
                        parent_id: Some(parent.id),
                        icon: String::new(),
                        sort_order: child_position as i32,
                    })
                    .await?;
                created += 1;
            }
        }
        Ok(created)
    }

    /// Fetch a category owned by `user_id`; anyone else's is not found.
    async fn owned(&self, user_id: UserId, id: CategoryId) -> Result<CategoryRecord, ServiceError> {
        match self.repository.get(id).await? {
            Some(record) if record.user_id == user_id => Ok(record),
            _ => Err(ServiceError::CategoryNotFound),
        }
    }
}
