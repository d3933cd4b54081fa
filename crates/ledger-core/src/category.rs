//! Category hierarchy types and the built-in starter taxonomy.

use serde::{Deserialize, Serialize};

use crate::{BillType, CategoryId};

/// A node of a user's two-level category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,

    pub name: String,

    /// Whether this category files expenses or income.
    #[serde(rename = "type")]
    pub kind: BillType,

    /// Parent node, `None` for top-level categories.
    pub parent_id: Option<CategoryId>,

    pub icon: String,

    pub sort_order: i32,

    /// Second-level categories (always empty on second-level nodes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Category>,
}

impl Category {
    /// Check if this is a top-level category.
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Names of the direct children, in order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|c| c.name.as_str())
    }
}

/// Seed definition for one top-level category and its children.
#[derive(Debug, Clone, Copy)]
pub struct CategoryTemplate {
    pub name: &'static str,
    pub kind: BillType,
    pub icon: &'static str,
    pub children: &'static [&'static str],
}

/// Taxonomy every new user starts with.
pub const DEFAULT_TEMPLATES: &[CategoryTemplate] = &[
    CategoryTemplate {
        name: "Food",
        kind: BillType::Expense,
        icon: "food",
        children: &["Meals", "Snacks", "Coffee & Drinks", "Fruit & Groceries", "Delivery Fees"],
    },
    CategoryTemplate {
        name: "Transport",
        kind: BillType::Expense,
        icon: "transport",
        children: &["Public Transit", "Taxi", "Bike Sharing", "Fuel & Parking"],
    },
    CategoryTemplate {
        name: "Shopping",
        kind: BillType::Expense,
        icon: "shopping",
        children: &["Daily Goods", "Clothing", "Electronics", "Beauty"],
    },
    CategoryTemplate {
        name: "Entertainment",
        kind: BillType::Expense,
        icon: "entertainment",
        children: &["Movies & Shows", "Games", "Subscriptions", "Fitness"],
    },
    CategoryTemplate {
        name: "Living",
        kind: BillType::Expense,
        icon: "living",
        children: &["Phone Top-up", "Utilities", "Healthcare", "Delivery", "Other Services"],
    },
    CategoryTemplate {
        name: "Finance",
        kind: BillType::Expense,
        icon: "finance",
        children: &["Transfer", "Repayment", "Investment", "Insurance"],
    },
    CategoryTemplate {
        name: "Salary",
        kind: BillType::Income,
        icon: "salary",
        children: &["Base Pay", "Overtime"],
    },
    CategoryTemplate {
        name: "Red Packet",
        kind: BillType::Income,
        icon: "red_packet",
        children: &[],
    },
    CategoryTemplate {
        name: "Bonus",
        kind: BillType::Income,
        icon: "bonus",
        children: &[],
    },
    CategoryTemplate {
        name: "Other",
        kind: BillType::Income,
        icon: "other_income",
        children: &["Refund", "Interest", "Second-hand Sale"],
    },
];
