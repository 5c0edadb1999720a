//! Categorization resolver
//!
//! Priority chain, first match wins:
//!   1. The user's own rules, in stored order
//!   2. The built-in keyword table below
//!   3. The "Other" fallback category
//!
//! Manual category edits are a first-class signal: the sync path only calls
//! the resolver for first-time inserts, so a resync never overwrites what
//! the user assigned. The explicit `recategorize` operation is the one
//! deliberate exception.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;
use uuid::Uuid;

use crate::adapters::duckdb::LedgerRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{CategorizationRule, FALLBACK_CATEGORY};

/// Built-in keyword rules applied after user rules. Order matters: the
/// first rule whose keyword matches wins, so more specific keywords sit
/// earlier. Category names must match the seeded system categories.
const BUILTIN_RULES: &[(&[&str], &str)] = &[
    (&["payroll", "direct deposit"], "Paychecks"),
    (&["refund", "return"], "Refunds"),
    (&["fee", "charge"], "Fees"),
    (&["amazon", "walmart", "target", "costco", "best buy"], "Shopping"),
    (&["rent"], "Rent"),
    (
        &["uber", "lyft", "gas", "exxon", "shell", "chevron", "parking", "transit"],
        "Auto & Transport",
    ),
    (
        &["electric", "water", "internet", "comcast", "verizon", "at&t"],
        "Utilities",
    ),
    (
        &["starbucks", "coffee", "restaurant", "bar", "dining"],
        "Drinks & Dining",
    ),
    (&["grocery", "safeway", "kroger"], "Groceries"),
    (&["pharmacy", "cvs", "walgreens"], "Personal Care"),
    (&["hospital", "doctor", "clinic", "dental"], "Healthcare"),
    (&["netflix", "spotify", "hulu", "disney+", "movies"], "Entertainment"),
    (&["tax", "irs"], "Taxes"),
    (&["airline", "hotel", "airbnb", "expedia"], "Travel & Vacation"),
];

/// Categorization service with a process-lifetime cache of the system
/// category name→id map.
pub struct CategorizationService {
    repository: Arc<LedgerRepository>,
    /// Loaded once and reused across sync runs; self-heals if queried
    /// while still empty (cold-start race with schema seeding).
    category_map: RwLock<HashMap<String, Uuid>>,
}

impl CategorizationService {
    pub fn new(repository: Arc<LedgerRepository>) -> Self {
        Self {
            repository,
            category_map: RwLock::new(HashMap::new()),
        }
    }

    fn load_category_map(&self) -> Result<()> {
        let categories = self.repository.get_categories_by_scope(None)?;
        let mut map = self
            .category_map
            .write()
            .map_err(|_| Error::database("category cache lock poisoned"))?;
        map.clear();
        for category in categories {
            map.insert(category.name, category.id);
        }
        debug!(count = map.len(), "loaded system category map");
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Option<Uuid>> {
        // Reload-on-empty guard for calls that land before seeding finished
        {
            let map = self
                .category_map
                .read()
                .map_err(|_| Error::database("category cache lock poisoned"))?;
            if !map.is_empty() {
                return Ok(map.get(name).copied());
            }
        }
        self.load_category_map()?;
        let map = self
            .category_map
            .read()
            .map_err(|_| Error::database("category cache lock poisoned"))?;
        Ok(map.get(name).copied())
    }

    /// Resolve a category for a transaction description.
    ///
    /// `user_rules` are the caller's rules, already loaded once per sync
    /// run and passed in so a thousand-transaction page costs one rule
    /// query, not a thousand.
    pub fn resolve(
        &self,
        description: &str,
        user_rules: &[CategorizationRule],
    ) -> Result<Option<Uuid>> {
        for rule in user_rules {
            if rule.matches(description) {
                return Ok(Some(rule.category_id));
            }
        }

        let lower = description.to_lowercase();
        for (keywords, category_name) in BUILTIN_RULES {
            if keywords.iter().any(|k| lower.contains(k)) {
                return self.lookup(category_name);
            }
        }

        // Nothing matched; fall back to "Other" (None if it is missing)
        self.lookup(FALLBACK_CATEGORY)
    }

    /// Re-run the resolver over a user's existing transactions, overwriting
    /// current assignments. User-invoked only; the sync path never does
    /// this. Manual and hidden rows are left alone.
    pub fn recategorize(&self, user_id: Uuid) -> Result<RecategorizeResult> {
        let rules = self.repository.get_rules_for_user(user_id)?;
        let transactions = self.repository.get_transactions_for_user(user_id)?;

        let mut updated = 0usize;
        let mut skipped = 0usize;
        for tx in &transactions {
            // Manual entries keep whatever the user chose; hidden rows are
            // excluded from reports and not worth churning.
            if tx.is_manual || tx.hidden {
                skipped += 1;
                continue;
            }
            let resolved = self.resolve(&tx.description, &rules)?;
            if resolved != tx.category_id {
                self.repository
                    .update_transaction_category(tx.id, resolved, None)?;
                updated += 1;
            }
        }

        Ok(RecategorizeResult {
            total: transactions.len(),
            updated,
            skipped,
        })
    }
}

/// Outcome of an explicit recategorize run
#[derive(Debug)]
pub struct RecategorizeResult {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, User};

    fn service() -> (CategorizationService, Arc<LedgerRepository>) {
        let repo = Arc::new(LedgerRepository::in_memory().unwrap());
        repo.ensure_schema().unwrap();
        (CategorizationService::new(Arc::clone(&repo)), repo)
    }

    fn system_category_id(repo: &LedgerRepository, name: &str) -> Uuid {
        repo.get_categories_by_scope(None)
            .unwrap()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
            .id
    }

    #[test]
    fn test_builtin_keyword_resolves_to_seeded_category() {
        let (service, repo) = service();
        let resolved = service.resolve("STARBUCKS STORE 1234", &[]).unwrap();
        assert_eq!(resolved, Some(system_category_id(&repo, "Drinks & Dining")));
    }

    #[test]
    fn test_user_rule_beats_builtin() {
        let (service, repo) = service();
        let user = User::new("t@example.com");
        repo.insert_user(&user).unwrap();
        let custom = Category::user(user.id, "Treats");
        repo.insert_category(&custom).unwrap();

        // "starbucks" would hit the builtin Drinks & Dining rule
        let rule = CategorizationRule::new(user.id, "starbucks", custom.id, 0);
        let resolved = service
            .resolve("STARBUCKS STORE 1234", &[rule])
            .unwrap();
        assert_eq!(resolved, Some(custom.id));
    }

    #[test]
    fn test_unmatched_falls_back_to_other() {
        let (service, repo) = service();
        let resolved = service.resolve("UNHELPFUL MEMO 00001", &[]).unwrap();
        assert_eq!(resolved, Some(system_category_id(&repo, FALLBACK_CATEGORY)));
    }

    #[test]
    fn test_cache_self_heals_when_loaded_before_seeding() {
        let repo = Arc::new(LedgerRepository::in_memory().unwrap());
        // Build the service before the schema/seeds exist
        let service = CategorizationService::new(Arc::clone(&repo));
        repo.ensure_schema().unwrap();

        let resolved = service.resolve("kroger weekly shop", &[]).unwrap();
        assert_eq!(
            resolved,
            Some(
                repo.get_categories_by_scope(None)
                    .unwrap()
                    .into_iter()
                    .find(|c| c.name == "Groceries")
                    .unwrap()
                    .id
            )
        );
    }

    #[test]
    fn test_first_builtin_rule_wins() {
        let (service, repo) = service();
        // "charge" (Fees) appears before "amazon" (Shopping) in the table
        let resolved = service.resolve("AMAZON SERVICE CHARGE", &[]).unwrap();
        assert_eq!(resolved, Some(system_category_id(&repo, "Fees")));
    }
}
