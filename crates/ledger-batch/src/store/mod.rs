//! Collaborators the recognition service reads categories from and writes
//! bills to.

mod memory;

pub use memory::{MemoryCatalog, MemoryLedger};

use async_trait::async_trait;
use ledger_core::{BillId, BillType, Category, CategoryId, RecognitionResult, UserId};
use thiserror::Error;

/// Errors from a category catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("category {0} not found")]
    NotFound(CategoryId),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Catalog(#[from] CatalogError),
}

/// A category as stored: flat, owned by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub user_id: UserId,
    pub name: String,
    pub kind: BillType,
    pub parent_id: Option<CategoryId>,
    pub icon: String,
    pub sort_order: i32,
}

impl CategoryRecord {
    /// Convert to a tree node without children.
    pub fn to_category(&self) -> Category {
        Category {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            parent_id: self.parent_id,
            icon: self.icon.clone(),
            sort_order: self.sort_order,
            children: Vec::new(),
        }
    }
}

/// Fields of a category about to be inserted.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub user_id: UserId,
    pub name: String,
    pub kind: BillType,
    pub parent_id: Option<CategoryId>,
    pub icon: String,
    pub sort_order: i32,
}

/// Read access to a user's category tree.
#[async_trait]
pub trait CategoryCatalog: Send + Sync {
    /// Top-level categories with their children, ordered by sort order.
    async fn list_hierarchy_for_user(&self, user_id: UserId) -> Result<Vec<Category>, CatalogError>;
}

/// Category persistence used by the category service.
#[async_trait]
pub trait CategoryRepository: CategoryCatalog {
    async fn get(&self, id: CategoryId) -> Result<Option<CategoryRecord>, CatalogError>;

    /// Whether `user_id` already has a category named `name` of `kind` under `parent_id`.
    async fn exists_by_name(
        &self,
        user_id: UserId,
        parent_id: Option<CategoryId>,
        name: &str,
        kind: BillType,
    ) -> Result<bool, CatalogError>;

    async fn has_children(&self, id: CategoryId) -> Result<bool, CatalogError>;

    async fn insert(&self, category: NewCategory) -> Result<CategoryRecord, CatalogError>;

    async fn update(&self, record: CategoryRecord) -> Result<(), CatalogError>;

    async fn delete(&self, id: CategoryId) -> Result<(), CatalogError>;
}

/// Persists bills derived from recognition results.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_bill_from_recognition(
        &self,
        user_id: UserId,
        result: &RecognitionResult,
        image_path: &str,
    ) -> Result<BillId, StoreError>;
}
