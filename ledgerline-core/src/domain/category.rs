//! Category and categorization-rule domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The system category the resolver falls back to when nothing matches
pub const FALLBACK_CATEGORY: &str = "Other";

/// System categories seeded at startup, insert-if-missing
pub const SYSTEM_CATEGORIES: &[&str] = &[
    "Paychecks",
    "Refunds",
    "Fees",
    "Shopping",
    "Rent",
    "Auto & Transport",
    "Utilities",
    "Drinks & Dining",
    "Groceries",
    "Personal Care",
    "Healthcare",
    "Entertainment",
    "Taxes",
    "Travel & Vacation",
    FALLBACK_CATEGORY,
];

/// A spending category. System categories have `user_id == None` and are
/// shared; user-created ones are scoped to their owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    /// None for system categories
    pub user_id: Option<Uuid>,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn system(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// An optional second level under a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCategory {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A user-defined keyword rule: if the transaction description contains
/// `keyword` (case-insensitive), assign `category_id`. Rules are evaluated
/// in stored order and the first hit wins, ahead of every builtin rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationRule {
    pub id: Uuid,
    pub user_id: Uuid,
    pub keyword: String,
    pub category_id: Uuid,
    pub subcategory_id: Option<Uuid>,
    /// Position in the user's rule list, lower runs first
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl CategorizationRule {
    pub fn new(user_id: Uuid, keyword: impl Into<String>, category_id: Uuid, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            keyword: keyword.into(),
            category_id,
            subcategory_id: None,
            priority,
            created_at: Utc::now(),
        }
    }

    pub fn matches(&self, description: &str) -> bool {
        description.to_lowercase().contains(&self.keyword.to_lowercase())
    }
}
