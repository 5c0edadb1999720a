//! Ledger service - manual entries, rules, and category management
//!
//! Everything here is user-initiated and ownership-checked. The sync
//! pipeline never calls into this service.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::adapters::duckdb::LedgerRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountType, CategorizationRule, Category, Flow, Transaction,
};

pub struct LedgerService {
    repository: Arc<LedgerRepository>,
}

impl LedgerService {
    pub fn new(repository: Arc<LedgerRepository>) -> Self {
        Self { repository }
    }

    fn owned_account(&self, account_id: Uuid, user_id: Uuid) -> Result<Account> {
        let account = self
            .repository
            .get_account(account_id)?
            .ok_or_else(|| Error::not_found(format!("account {account_id}")))?;
        if account.user_id != user_id {
            return Err(Error::Forbidden(format!(
                "account {account_id} does not belong to this user"
            )));
        }
        Ok(account)
    }

    fn owned_transaction(&self, transaction_id: Uuid, user_id: Uuid) -> Result<Transaction> {
        let tx = self
            .repository
            .get_transaction(transaction_id)?
            .ok_or_else(|| Error::not_found(format!("transaction {transaction_id}")))?;
        if tx.user_id != user_id {
            return Err(Error::Forbidden(format!(
                "transaction {transaction_id} does not belong to this user"
            )));
        }
        Ok(tx)
    }

    // === Accounts ===

    pub fn create_manual_account(
        &self,
        user_id: Uuid,
        name: &str,
        account_type: AccountType,
        balance: Decimal,
    ) -> Result<Account> {
        let mut account = Account::manual(user_id, name, account_type);
        account.balance = balance;
        account
            .validate()
            .map_err(Error::validation)?;
        self.repository.upsert_account(&account)?;
        Ok(account)
    }

    pub fn list_accounts(&self, user_id: Uuid) -> Result<Vec<Account>> {
        self.repository.get_accounts_for_user(user_id)
    }

    /// Delete an account and its transactions
    pub fn delete_account(&self, account_id: Uuid, user_id: Uuid) -> Result<()> {
        self.owned_account(account_id, user_id)?;
        self.repository.delete_account(account_id)
    }

    // === Transactions ===

    pub fn create_manual_transaction(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        amount: Decimal,
        date: NaiveDate,
        description: &str,
        flow: Flow,
        category_id: Option<Uuid>,
    ) -> Result<Transaction> {
        self.owned_account(account_id, user_id)?;
        let mut tx = Transaction::manual(user_id, account_id, amount, date, description, flow);
        tx.category_id = category_id;
        tx.validate().map_err(Error::validation)?;
        self.repository.upsert_transaction(&tx)?;
        Ok(tx)
    }

    pub fn list_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        self.repository.get_transactions_for_user(user_id)
    }

    pub fn set_category(
        &self,
        transaction_id: Uuid,
        user_id: Uuid,
        category_id: Option<Uuid>,
        subcategory_id: Option<Uuid>,
    ) -> Result<()> {
        self.owned_transaction(transaction_id, user_id)?;
        self.repository
            .update_transaction_category(transaction_id, category_id, subcategory_id)
    }

    pub fn set_hidden(&self, transaction_id: Uuid, user_id: Uuid, hidden: bool) -> Result<()> {
        self.owned_transaction(transaction_id, user_id)?;
        self.repository.set_transaction_hidden(transaction_id, hidden)
    }

    pub fn set_notes(
        &self,
        transaction_id: Uuid,
        user_id: Uuid,
        notes: Option<&str>,
    ) -> Result<()> {
        self.owned_transaction(transaction_id, user_id)?;
        self.repository.set_transaction_notes(transaction_id, notes)
    }

    /// Only manual transactions may be deleted; synced rows come back on
    /// the next run anyway.
    pub fn delete_transaction(&self, transaction_id: Uuid, user_id: Uuid) -> Result<()> {
        let tx = self.owned_transaction(transaction_id, user_id)?;
        if !tx.is_manual {
            return Err(Error::validation(
                "only manually entered transactions can be deleted",
            ));
        }
        self.repository.delete_transaction(transaction_id)
    }

    // === Rules and categories ===

    pub fn create_rule(
        &self,
        user_id: Uuid,
        keyword: &str,
        category_id: Uuid,
        priority: i32,
    ) -> Result<CategorizationRule> {
        if keyword.trim().is_empty() {
            return Err(Error::validation("rule keyword cannot be empty"));
        }
        let rule = CategorizationRule::new(user_id, keyword, category_id, priority);
        self.repository.insert_rule(&rule)?;
        Ok(rule)
    }

    pub fn list_rules(&self, user_id: Uuid) -> Result<Vec<CategorizationRule>> {
        self.repository.get_rules_for_user(user_id)
    }

    pub fn delete_rule(&self, rule_id: Uuid, user_id: Uuid) -> Result<()> {
        self.repository.delete_rule(rule_id, user_id)
    }

    pub fn create_category(&self, user_id: Uuid, name: &str) -> Result<Category> {
        if name.trim().is_empty() {
            return Err(Error::validation("category name cannot be empty"));
        }
        let category = Category::user(user_id, name);
        self.repository.insert_category(&category)?;
        Ok(category)
    }

    /// System categories plus the user's own
    pub fn list_categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let mut categories = self.repository.get_categories_by_scope(None)?;
        categories.extend(self.repository.get_categories_by_scope(Some(user_id))?);
        Ok(categories)
    }
}
