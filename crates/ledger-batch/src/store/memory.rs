//! In-memory catalog and ledger.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ledger_core::{Bill, BillId, BillType, Category, CategoryId, RecognitionResult, UserId};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    CatalogError, CategoryCatalog, CategoryRecord, CategoryRepository, LedgerStore, NewCategory,
    StoreError,
};

/// Category catalog held in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: RwLock<BTreeMap<CategoryId, CategoryRecord>>,
    next_id: AtomicU64,
    hierarchy_loads: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a hierarchy has been built.
    pub fn hierarchy_loads(&self) -> usize {
        self.hierarchy_loads.load(Ordering::SeqCst)
    }
}

fn sort_key(record: &CategoryRecord) -> (i32, CategoryId) {
    (record.sort_order, record.id)
}

#[async_trait]
impl CategoryCatalog for MemoryCatalog {
    async fn list_hierarchy_for_user(&self, user_id: UserId) -> Result<Vec<Category>, CatalogError> {
        self.hierarchy_loads.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read().await;

        let mut owned: Vec<&CategoryRecord> =
            records.values().filter(|r| r.user_id == user_id).collect();
        owned.sort_by_key(|r| sort_key(r));

        let tree = owned
            .iter()
            .filter(|r| r.parent_id.is_none())
            .map(|parent| {
                let mut node = parent.to_category();
                node.children = owned
                    .iter()
                    .filter(|r| r.parent_id == Some(parent.id))
                    .map(|child| child.to_category())
                    .collect();
                node
            })
            .collect();
        Ok(tree)
    }
}

#[async_trait]
impl CategoryRepository for MemoryCatalog {
    async fn get(&self, id: CategoryId) -> Result<Option<CategoryRecord>, CatalogError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn exists_by_name(
        &self,
        user_id: UserId,
        parent_id: Option<CategoryId>,
        name: &str,
        kind: BillType,
    ) -> Result<bool, CatalogError> {
        Ok(self.records.read().await.values().any(|r| {
            r.user_id == user_id && r.parent_id == parent_id && r.kind == kind && r.name == name
        }))
    }

    async fn has_children(&self, id: CategoryId) -> Result<bool, CatalogError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|r| r.parent_id == Some(id)))
    }

    async fn insert(&self, category: NewCategory) -> Result<CategoryRecord, CatalogError> {
        let id = CategoryId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = CategoryRecord {
            id,
            user_id: category.user_id,
            name: category.name,
            kind: category.kind,
            parent_id: category.parent_id,
            icon: category.icon,
            sort_order: category.sort_order,
        };
        self.records.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: CategoryRecord) -> Result<(), CatalogError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(CatalogError::NotFound(record.id)),
        }
    }

    async fn delete(&self, id: CategoryId) -> Result<(), CatalogError> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(CatalogError::NotFound(id))
    }
}

/// Ledger held in memory; resolves categories through a catalog.
pub struct MemoryLedger {
    catalog: Arc<dyn CategoryCatalog>,
    bills: RwLock<Vec<Bill>>,
    next_id: AtomicU64,
}

impl MemoryLedger {
    pub fn new(catalog: Arc<dyn CategoryCatalog>) -> Self {
        Self {
            catalog,
            bills: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, id: BillId) -> Option<Bill> {
        self.bills.read().await.iter().find(|b| b.id == id).cloned()
    }

    /// Bills of one user, oldest first.
    pub async fn bills_for_user(&self, user_id: UserId) -> Vec<Bill> {
        self.bills
            .read()
            .await
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect()
    }
}

/// Find the category a recognition result belongs to.
///
/// The second-level name is tried first, then the top-level name; only
/// categories of the recognized bill type are considered.
pub(crate) fn resolve_category(
    categories: &[Category],
    result: &RecognitionResult,
) -> Option<CategoryId> {
    let of_kind = || categories.iter().filter(|c| c.kind == result.bill_type);

    let sub = result.sub_category.trim();
    if !sub.is_empty() {
        let found = of_kind()
            .flat_map(|c| c.children.iter())
            .chain(of_kind())
            .find(|c| c.name == sub);
        if let Some(category) = found {
            return Some(category.id);
        }
    }

    let top = result.category.trim();
    if !top.is_empty() {
        if let Some(category) = of_kind().find(|c| c.name == top) {
            return Some(category.id);
        }
    }
    None
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn create_bill_from_recognition(
        &self,
        user_id: UserId,
        result: &RecognitionResult,
        image_path: &str,
    ) -> Result<BillId, StoreError> {
        let categories = self.catalog.list_hierarchy_for_user(user_id).await?;
        let category_id = resolve_category(&categories, result);

        let id = BillId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let bill = Bill::from_recognition(id, user_id, result, category_id, image_path, Utc::now());
        debug!(
            bill_id = %id,
            user_id = %user_id,
            category_id = ?category_id.map(CategoryId::get),
            amount_cents = bill.amount_cents,
            "Created bill from recognition"
        );
        self.bills.write().await.push(bill);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::receipt;

    async fn insert(
        catalog: &MemoryCatalog,
        user: u64,
        name: &str,
        kind: BillType,
        parent: Option<CategoryId>,
        sort_order: i32,
    ) -> CategoryId {
        catalog
            .insert(NewCategory {
                user_id: UserId::new(user),
                name: name.to_string(),
                kind,
                parent_id: parent,
                icon: String::new(),
                sort_order,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_hierarchy_is_sorted_and_per_user() {
        let catalog = MemoryCatalog::new();
        let food = insert(&catalog, 1, "Food", BillType::Expense, None, 2).await;
        insert(&catalog, 1, "Transport", BillType::Expense, None, 1).await;
        insert(&catalog, 1, "Snacks", BillType::Expense, Some(food), 1).await;
        insert(&catalog, 1, "Meals", BillType::Expense, Some(food), 0).await;
        insert(&catalog, 2, "Other", BillType::Income, None, 0).await;

        let tree = catalog.list_hierarchy_for_user(UserId::new(1)).await.unwrap();
        let names: Vec<_> = tree.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Transport", "Food"]);
        assert_eq!(tree[1].child_names().collect::<Vec<_>>(), ["Meals", "Snacks"]);
        assert_eq!(catalog.hierarchy_loads(), 1);
    }

    #[tokio::test]
    async fn test_bill_category_resolution() {
        let catalog = Arc::new(MemoryCatalog::new());
        let food = insert(&catalog, 1, "Food", BillType::Expense, None, 0).await;
        let coffee = insert(&catalog, 1, "Coffee & Drinks", BillType::Expense, Some(food), 0).await;
        let other = insert(&catalog, 1, "Other", BillType::Income, None, 0).await;
        let ledger = MemoryLedger::new(catalog.clone());
        let user = UserId::new(1);

        let id = ledger
            .create_bill_from_recognition(user, &receipt("Starbucks"), "a.png")
            .await
            .unwrap();
        let bill = ledger.get(id).await.unwrap();
        assert_eq!(bill.category_id, Some(coffee));
        assert_eq!(bill.amount_cents, 2550);
        assert_eq!(bill.image_path, "a.png");
        assert!(!bill.is_confirmed);

        // Unknown sub-category falls back to the top-level name.
        let mut result = receipt("Bakery");
        result.sub_category = "Bread".to_string();
        let id = ledger.create_bill_from_recognition(user, &result, "b.png").await.unwrap();
        assert_eq!(ledger.get(id).await.unwrap().category_id, Some(food));

        // Names only match within the recognized bill type.
        let mut result = receipt("Refund");
        result.bill_type = BillType::Income;
        result.category = "Food".to_string();
        result.sub_category = "Other".to_string();
        let id = ledger.create_bill_from_recognition(user, &result, "c.png").await.unwrap();
        assert_eq!(ledger.get(id).await.unwrap().category_id, Some(other));

        result.sub_category.clear();
        let id = ledger.create_bill_from_recognition(user, &result, "d.png").await.unwrap();
        assert_eq!(ledger.get(id).await.unwrap().category_id, None);

        assert_eq!(ledger.bills_for_user(user).await.len(), 4);
    }
}
