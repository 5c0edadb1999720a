//! DuckDB ledger repository
//!
//! All persistence goes through this adapter. The sync pipeline relies on
//! two properties the SQL here provides: keyed upserts on provider-native
//! ids (repeat syncs never duplicate rows) and a transaction update arm
//! that omits the category columns, so a resync can never erase a category
//! the user assigned by hand.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use duckdb::{params, Connection as DbConnection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountType, CategorizationRule, Category, Connection, Flow, Provider, SubCategory,
    Transaction, User, SYSTEM_CATEGORIES,
};

/// DuckDB-backed ledger repository
pub struct LedgerRepository {
    conn: Mutex<DbConnection>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl LedgerRepository {
    /// Open (or create) the ledger database at the given path
    pub fn new(db_path: &Path) -> Result<Self> {
        let config = duckdb::Config::default()
            .enable_autoload_extension(false)
            .map_err(|e| Error::database(e.to_string()))?;
        let conn = DbConnection::open_with_flags(db_path, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        })
    }

    /// In-memory repository for tests
    pub fn in_memory() -> Result<Self> {
        let conn = DbConnection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DbConnection>> {
        self.conn
            .lock()
            .map_err(|_| Error::database("repository mutex poisoned"))
    }

    /// Create tables if missing and seed the system categories
    pub fn ensure_schema(&self) -> Result<()> {
        {
            let conn = self.lock()?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    user_id VARCHAR PRIMARY KEY,
                    email VARCHAR NOT NULL UNIQUE,
                    created_at VARCHAR NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS connections (
                    connection_id VARCHAR PRIMARY KEY,
                    user_id VARCHAR NOT NULL,
                    provider VARCHAR NOT NULL,
                    institution_name VARCHAR NOT NULL,
                    access_token VARCHAR NOT NULL,
                    cursor VARCHAR,
                    sync_started_at VARCHAR,
                    last_synced_at VARCHAR,
                    created_at VARCHAR NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS accounts (
                    account_id VARCHAR PRIMARY KEY,
                    user_id VARCHAR NOT NULL,
                    connection_id VARCHAR,
                    provider_account_id VARCHAR NOT NULL UNIQUE,
                    name VARCHAR NOT NULL,
                    mask VARCHAR,
                    account_type VARCHAR NOT NULL,
                    balance DOUBLE NOT NULL,
                    available_balance DOUBLE,
                    currency VARCHAR NOT NULL,
                    institution_name VARCHAR NOT NULL,
                    is_manual BOOLEAN NOT NULL DEFAULT false,
                    created_at VARCHAR NOT NULL,
                    updated_at VARCHAR NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS transactions (
                    transaction_id VARCHAR PRIMARY KEY,
                    user_id VARCHAR NOT NULL,
                    account_id VARCHAR NOT NULL,
                    provider_transaction_id VARCHAR NOT NULL UNIQUE,
                    amount DOUBLE NOT NULL,
                    currency VARCHAR NOT NULL,
                    date VARCHAR NOT NULL,
                    description VARCHAR NOT NULL,
                    merchant_name VARCHAR,
                    flow VARCHAR NOT NULL,
                    category_id VARCHAR,
                    subcategory_id VARCHAR,
                    pending BOOLEAN NOT NULL DEFAULT false,
                    is_manual BOOLEAN NOT NULL DEFAULT false,
                    hidden BOOLEAN NOT NULL DEFAULT false,
                    notes VARCHAR,
                    created_at VARCHAR NOT NULL,
                    updated_at VARCHAR NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS categories (
                    category_id VARCHAR PRIMARY KEY,
                    user_id VARCHAR,
                    name VARCHAR NOT NULL,
                    created_at VARCHAR NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS subcategories (
                    subcategory_id VARCHAR PRIMARY KEY,
                    category_id VARCHAR NOT NULL,
                    name VARCHAR NOT NULL,
                    created_at VARCHAR NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS categorization_rules (
                    rule_id VARCHAR PRIMARY KEY,
                    user_id VARCHAR NOT NULL,
                    keyword VARCHAR NOT NULL,
                    category_id VARCHAR NOT NULL,
                    subcategory_id VARCHAR,
                    priority INTEGER NOT NULL DEFAULT 0,
                    created_at VARCHAR NOT NULL
                 );",
            )?;
        }
        self.seed_system_categories()?;
        Ok(())
    }

    /// Insert-if-missing for the shared system categories
    fn seed_system_categories(&self) -> Result<()> {
        let conn = self.lock()?;
        for name in SYSTEM_CATEGORIES {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM categories WHERE user_id IS NULL AND name = ?",
                [name],
                |row| row.get(0),
            )?;
            if exists == 0 {
                conn.execute(
                    "INSERT INTO categories (category_id, user_id, name, created_at)
                     VALUES (?, NULL, ?, ?)",
                    params![Uuid::new_v4().to_string(), name, Utc::now().to_rfc3339()],
                )?;
            }
        }
        Ok(())
    }

    // === Users ===

    pub fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (user_id, email, created_at) VALUES (?, ?, ?)",
            params![
                user.id.to_string(),
                user.email,
                user.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT user_id, email, created_at FROM users WHERE email = ?",
            [email],
            |row| {
                Ok(User {
                    id: parse_uuid(&row.get::<_, String>(0)?),
                    email: row.get(1)?,
                    created_at: parse_timestamp(&row.get::<_, String>(2)?),
                })
            },
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // === Connections ===

    pub fn insert_connection(&self, connection: &Connection) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO connections (connection_id, user_id, provider, institution_name,
                                      access_token, cursor, sync_started_at, last_synced_at,
                                      created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                connection.id.to_string(),
                connection.user_id.to_string(),
                connection.provider.as_str(),
                connection.institution_name,
                connection.access_token,
                connection.cursor,
                connection.sync_started_at.map(|t| t.to_rfc3339()),
                connection.last_synced_at.map(|t| t.to_rfc3339()),
                connection.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_connection(&self, id: Uuid) -> Result<Option<Connection>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT connection_id, user_id, provider, institution_name, access_token,
                    cursor, sync_started_at, last_synced_at, created_at
             FROM connections WHERE connection_id = ?",
            [id.to_string()],
            |row| Ok(row_to_connection(row)),
        );
        match result {
            Ok(c) => Ok(Some(c)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_connections_for_user(&self, user_id: Uuid) -> Result<Vec<Connection>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT connection_id, user_id, provider, institution_name, access_token,
                    cursor, sync_started_at, last_synced_at, created_at
             FROM connections WHERE user_id = ? ORDER BY created_at",
        )?;
        let connections = stmt
            .query_map([user_id.to_string()], |row| Ok(row_to_connection(row)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(connections)
    }

    /// Persist the incremental cursor after a page-set completes
    pub fn update_connection_cursor(&self, connection_id: Uuid, cursor: &str) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE connections SET cursor = ? WHERE connection_id = ?",
            params![cursor, connection_id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("connection {connection_id}")));
        }
        Ok(())
    }

    /// Try to take the advisory per-connection sync flag.
    ///
    /// Returns false when another sync started within the TTL. A flag older
    /// than the TTL is treated as stale (a crashed run) and stolen.
    pub fn try_begin_sync(&self, connection_id: Uuid, ttl_minutes: i64) -> Result<bool> {
        let conn = self.lock()?;
        let current: Option<String> = conn.query_row(
            "SELECT sync_started_at FROM connections WHERE connection_id = ?",
            [connection_id.to_string()],
            |row| row.get(0),
        )?;

        if let Some(started) = current.as_deref().map(parse_timestamp) {
            if Utc::now() - started < Duration::minutes(ttl_minutes) {
                return Ok(false);
            }
        }

        conn.execute(
            "UPDATE connections SET sync_started_at = ? WHERE connection_id = ?",
            params![Utc::now().to_rfc3339(), connection_id.to_string()],
        )?;
        Ok(true)
    }

    /// Record that a sync run for this connection completed
    pub fn mark_synced(&self, connection_id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE connections SET last_synced_at = ? WHERE connection_id = ?",
            params![Utc::now().to_rfc3339(), connection_id.to_string()],
        )?;
        Ok(())
    }

    /// Release the advisory sync flag
    pub fn end_sync(&self, connection_id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE connections SET sync_started_at = NULL WHERE connection_id = ?",
            [connection_id.to_string()],
        )?;
        Ok(())
    }

    // === Accounts ===

    /// Keyed upsert on provider_account_id.
    ///
    /// The update arm refreshes only live balance data; name, type and the
    /// ownership columns are set once at creation and left alone afterward.
    /// Returns the internal id of the stored row.
    pub fn upsert_account(&self, account: &Account) -> Result<Uuid> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO accounts (account_id, user_id, connection_id, provider_account_id,
                                   name, mask, account_type, balance, available_balance,
                                   currency, institution_name, is_manual, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (provider_account_id) DO UPDATE SET
                balance = EXCLUDED.balance,
                available_balance = EXCLUDED.available_balance,
                updated_at = EXCLUDED.updated_at",
            params![
                account.id.to_string(),
                account.user_id.to_string(),
                account.connection_id.map(|id| id.to_string()),
                account.provider_account_id,
                account.name,
                account.mask,
                account.account_type.as_str(),
                decimal_to_f64(account.balance),
                account.available_balance.map(decimal_to_f64),
                account.currency,
                account.institution_name,
                account.is_manual,
                account.created_at.to_rfc3339(),
                account.updated_at.to_rfc3339(),
            ],
        )?;

        let id: String = conn.query_row(
            "SELECT account_id FROM accounts WHERE provider_account_id = ?",
            [&account.provider_account_id],
            |row| row.get(0),
        )?;
        Ok(parse_uuid(&id))
    }

    pub fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("{ACCOUNT_SELECT} WHERE account_id = ?"),
            [id.to_string()],
            |row| Ok(row_to_account(row)),
        );
        match result {
            Ok(a) => Ok(Some(a)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{ACCOUNT_SELECT} WHERE user_id = ? ORDER BY name"))?;
        let accounts = stmt
            .query_map([user_id.to_string()], |row| Ok(row_to_account(row)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(accounts)
    }

    /// Delete an account and cascade to its transactions.
    ///
    /// Delete order satisfies the foreign-key relationship without an
    /// explicit transaction; each statement auto-commits.
    pub fn delete_account(&self, id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM transactions WHERE account_id = ?",
            [id.to_string()],
        )?;
        let changed = conn.execute(
            "DELETE FROM accounts WHERE account_id = ?",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("account {id}")));
        }
        Ok(())
    }

    // === Transactions ===

    pub fn transaction_exists_by_provider_id(&self, provider_transaction_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE provider_transaction_id = ?",
            [provider_transaction_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Keyed upsert on provider_transaction_id.
    ///
    /// The update arm deliberately omits category_id and subcategory_id -
    /// categorization fires once on first insert and manual edits survive
    /// every later sync. It also leaves hidden/notes/is_manual alone.
    pub fn upsert_transaction(&self, tx: &Transaction) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO transactions (transaction_id, user_id, account_id, provider_transaction_id,
                                       amount, currency, date, description, merchant_name, flow,
                                       category_id, subcategory_id, pending, is_manual, hidden,
                                       notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (provider_transaction_id) DO UPDATE SET
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                date = EXCLUDED.date,
                description = EXCLUDED.description,
                merchant_name = COALESCE(EXCLUDED.merchant_name, transactions.merchant_name),
                flow = EXCLUDED.flow,
                pending = EXCLUDED.pending,
                updated_at = EXCLUDED.updated_at",
            params![
                tx.id.to_string(),
                tx.user_id.to_string(),
                tx.account_id.to_string(),
                tx.provider_transaction_id,
                decimal_to_f64(tx.amount),
                tx.currency,
                tx.date.to_string(),
                tx.description,
                tx.merchant_name,
                tx.flow.as_str(),
                tx.category_id.map(|id| id.to_string()),
                tx.subcategory_id.map(|id| id.to_string()),
                tx.pending,
                tx.is_manual,
                tx.hidden,
                tx.notes,
                tx.created_at.to_rfc3339(),
                tx.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("{TRANSACTION_SELECT} WHERE transaction_id = ?"),
            [id.to_string()],
            |row| Ok(row_to_transaction(row)),
        );
        match result {
            Ok(t) => Ok(Some(t)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_transaction_by_provider_id(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Transaction>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("{TRANSACTION_SELECT} WHERE provider_transaction_id = ?"),
            [provider_transaction_id],
            |row| Ok(row_to_transaction(row)),
        );
        match result {
            Ok(t) => Ok(Some(t)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{TRANSACTION_SELECT} WHERE user_id = ? ORDER BY date DESC, created_at DESC"
        ))?;
        let transactions = stmt
            .query_map([user_id.to_string()], |row| Ok(row_to_transaction(row)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(transactions)
    }

    pub fn get_transactions_for_account(&self, account_id: Uuid) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{TRANSACTION_SELECT} WHERE account_id = ? ORDER BY date DESC, created_at DESC"
        ))?;
        let transactions = stmt
            .query_map([account_id.to_string()], |row| Ok(row_to_transaction(row)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(transactions)
    }

    /// Set a transaction's category. Used by manual edits and the explicit
    /// recategorize operation; the sync path never calls this for rows that
    /// already exist.
    pub fn update_transaction_category(
        &self,
        id: Uuid,
        category_id: Option<Uuid>,
        subcategory_id: Option<Uuid>,
    ) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE transactions SET category_id = ?, subcategory_id = ?, updated_at = ?
             WHERE transaction_id = ?",
            params![
                category_id.map(|c| c.to_string()),
                subcategory_id.map(|c| c.to_string()),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("transaction {id}")));
        }
        Ok(())
    }

    pub fn set_transaction_hidden(&self, id: Uuid, hidden: bool) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE transactions SET hidden = ?, updated_at = ? WHERE transaction_id = ?",
            params![hidden, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("transaction {id}")));
        }
        Ok(())
    }

    pub fn set_transaction_notes(&self, id: Uuid, notes: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE transactions SET notes = ?, updated_at = ? WHERE transaction_id = ?",
            params![notes, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("transaction {id}")));
        }
        Ok(())
    }

    pub fn delete_transaction(&self, id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM transactions WHERE transaction_id = ?",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("transaction {id}")));
        }
        Ok(())
    }

    // === Categories ===

    /// Categories visible in a scope: None for the shared system set,
    /// Some(user) for that user's own categories.
    pub fn get_categories_by_scope(&self, user_id: Option<Uuid>) -> Result<Vec<Category>> {
        let conn = self.lock()?;
        let (sql, param): (&str, Option<String>) = match user_id {
            Some(id) => (
                "SELECT category_id, user_id, name, created_at FROM categories
                 WHERE user_id = ? ORDER BY name",
                Some(id.to_string()),
            ),
            None => (
                "SELECT category_id, user_id, name, created_at FROM categories
                 WHERE user_id IS NULL ORDER BY name",
                None,
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        let categories = match param {
            Some(p) => stmt
                .query_map([p], |row| Ok(row_to_category(row)))?
                .filter_map(|r| r.ok())
                .collect(),
            None => stmt
                .query_map([], |row| Ok(row_to_category(row)))?
                .filter_map(|r| r.ok())
                .collect(),
        };
        Ok(categories)
    }

    pub fn insert_category(&self, category: &Category) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO categories (category_id, user_id, name, created_at) VALUES (?, ?, ?, ?)",
            params![
                category.id.to_string(),
                category.user_id.map(|id| id.to_string()),
                category.name,
                category.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_subcategory(&self, subcategory: &SubCategory) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO subcategories (subcategory_id, category_id, name, created_at)
             VALUES (?, ?, ?, ?)",
            params![
                subcategory.id.to_string(),
                subcategory.category_id.to_string(),
                subcategory.name,
                subcategory.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_subcategories(&self, category_id: Uuid) -> Result<Vec<SubCategory>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT subcategory_id, category_id, name, created_at FROM subcategories
             WHERE category_id = ? ORDER BY name",
        )?;
        let rows = stmt
            .query_map([category_id.to_string()], |row| {
                Ok(SubCategory {
                    id: parse_uuid(&row.get::<_, String>(0).unwrap_or_default()),
                    category_id: parse_uuid(&row.get::<_, String>(1).unwrap_or_default()),
                    name: row.get(2).unwrap_or_default(),
                    created_at: parse_timestamp(&row.get::<_, String>(3).unwrap_or_default()),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // === Categorization rules ===

    /// A user's rules in evaluation order: priority ascending, then creation
    pub fn get_rules_for_user(&self, user_id: Uuid) -> Result<Vec<CategorizationRule>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT rule_id, user_id, keyword, category_id, subcategory_id, priority, created_at
             FROM categorization_rules WHERE user_id = ?
             ORDER BY priority, created_at",
        )?;
        let rules = stmt
            .query_map([user_id.to_string()], |row| Ok(row_to_rule(row)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rules)
    }

    pub fn insert_rule(&self, rule: &CategorizationRule) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO categorization_rules (rule_id, user_id, keyword, category_id,
                                               subcategory_id, priority, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                rule.id.to_string(),
                rule.user_id.to_string(),
                rule.keyword,
                rule.category_id.to_string(),
                rule.subcategory_id.map(|id| id.to_string()),
                rule.priority,
                rule.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn delete_rule(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM categorization_rules WHERE rule_id = ? AND user_id = ?",
            params![id.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("rule {id}")));
        }
        Ok(())
    }
}

// =============================================================================
// Row mapping
// =============================================================================

const ACCOUNT_SELECT: &str =
    "SELECT account_id, user_id, connection_id, provider_account_id, name, mask, account_type,
            balance, available_balance, currency, institution_name, is_manual,
            created_at, updated_at
     FROM accounts";

const TRANSACTION_SELECT: &str =
    "SELECT transaction_id, user_id, account_id, provider_transaction_id, amount, currency,
            date, description, merchant_name, flow, category_id, subcategory_id,
            pending, is_manual, hidden, notes, created_at, updated_at
     FROM transactions";

fn row_to_connection(row: &duckdb::Row) -> Connection {
    Connection {
        id: parse_uuid(&row.get::<_, String>(0).unwrap_or_default()),
        user_id: parse_uuid(&row.get::<_, String>(1).unwrap_or_default()),
        provider: Provider::parse(&row.get::<_, String>(2).unwrap_or_default())
            .unwrap_or(Provider::Plaid),
        institution_name: row.get(3).unwrap_or_default(),
        access_token: row.get(4).unwrap_or_default(),
        cursor: row.get(5).ok(),
        sync_started_at: row
            .get::<_, Option<String>>(6)
            .ok()
            .flatten()
            .map(|s| parse_timestamp(&s)),
        last_synced_at: row
            .get::<_, Option<String>>(7)
            .ok()
            .flatten()
            .map(|s| parse_timestamp(&s)),
        created_at: parse_timestamp(&row.get::<_, String>(8).unwrap_or_default()),
    }
}

fn row_to_account(row: &duckdb::Row) -> Account {
    Account {
        id: parse_uuid(&row.get::<_, String>(0).unwrap_or_default()),
        user_id: parse_uuid(&row.get::<_, String>(1).unwrap_or_default()),
        connection_id: row
            .get::<_, Option<String>>(2)
            .ok()
            .flatten()
            .map(|s| parse_uuid(&s)),
        provider_account_id: row.get(3).unwrap_or_default(),
        name: row.get(4).unwrap_or_default(),
        mask: row.get(5).ok(),
        account_type: AccountType::parse(&row.get::<_, String>(6).unwrap_or_default()),
        balance: f64_to_decimal(row.get(7).unwrap_or(0.0)),
        available_balance: row
            .get::<_, Option<f64>>(8)
            .ok()
            .flatten()
            .map(f64_to_decimal),
        currency: row.get(9).unwrap_or_else(|_| "USD".to_string()),
        institution_name: row.get(10).unwrap_or_default(),
        is_manual: row.get(11).unwrap_or(false),
        created_at: parse_timestamp(&row.get::<_, String>(12).unwrap_or_default()),
        updated_at: parse_timestamp(&row.get::<_, String>(13).unwrap_or_default()),
    }
}

fn row_to_transaction(row: &duckdb::Row) -> Transaction {
    Transaction {
        id: parse_uuid(&row.get::<_, String>(0).unwrap_or_default()),
        user_id: parse_uuid(&row.get::<_, String>(1).unwrap_or_default()),
        account_id: parse_uuid(&row.get::<_, String>(2).unwrap_or_default()),
        provider_transaction_id: row.get(3).unwrap_or_default(),
        amount: f64_to_decimal(row.get(4).unwrap_or(0.0)),
        currency: row.get(5).unwrap_or_else(|_| "USD".to_string()),
        date: parse_date(&row.get::<_, String>(6).unwrap_or_default()),
        description: row.get(7).unwrap_or_default(),
        merchant_name: row.get(8).ok(),
        flow: Flow::parse(&row.get::<_, String>(9).unwrap_or_default()),
        category_id: row
            .get::<_, Option<String>>(10)
            .ok()
            .flatten()
            .map(|s| parse_uuid(&s)),
        subcategory_id: row
            .get::<_, Option<String>>(11)
            .ok()
            .flatten()
            .map(|s| parse_uuid(&s)),
        pending: row.get(12).unwrap_or(false),
        is_manual: row.get(13).unwrap_or(false),
        hidden: row.get(14).unwrap_or(false),
        notes: row.get(15).ok(),
        created_at: parse_timestamp(&row.get::<_, String>(16).unwrap_or_default()),
        updated_at: parse_timestamp(&row.get::<_, String>(17).unwrap_or_default()),
    }
}

fn row_to_category(row: &duckdb::Row) -> Category {
    Category {
        id: parse_uuid(&row.get::<_, String>(0).unwrap_or_default()),
        user_id: row
            .get::<_, Option<String>>(1)
            .ok()
            .flatten()
            .map(|s| parse_uuid(&s)),
        name: row.get(2).unwrap_or_default(),
        created_at: parse_timestamp(&row.get::<_, String>(3).unwrap_or_default()),
    }
}

fn row_to_rule(row: &duckdb::Row) -> CategorizationRule {
    CategorizationRule {
        id: parse_uuid(&row.get::<_, String>(0).unwrap_or_default()),
        user_id: parse_uuid(&row.get::<_, String>(1).unwrap_or_default()),
        keyword: row.get(2).unwrap_or_default(),
        category_id: parse_uuid(&row.get::<_, String>(3).unwrap_or_default()),
        subcategory_id: row
            .get::<_, Option<String>>(4)
            .ok()
            .flatten()
            .map(|s| parse_uuid(&s)),
        priority: row.get(5).unwrap_or(0),
        created_at: parse_timestamp(&row.get::<_, String>(6).unwrap_or_default()),
    }
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_string().parse::<f64>().unwrap_or(0.0)
}

fn f64_to_decimal(f: f64) -> Decimal {
    Decimal::try_from(f).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FALLBACK_CATEGORY;

    fn repo() -> LedgerRepository {
        let repo = LedgerRepository::in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    fn seeded_user(repo: &LedgerRepository) -> User {
        let user = User::new("test@example.com");
        repo.insert_user(&user).unwrap();
        user
    }

    #[test]
    fn test_schema_seeds_system_categories_once() {
        let repo = repo();
        // Running twice must not duplicate the seed set
        repo.ensure_schema().unwrap();
        let categories = repo.get_categories_by_scope(None).unwrap();
        assert_eq!(categories.len(), SYSTEM_CATEGORIES.len());
        assert!(categories.iter().any(|c| c.name == FALLBACK_CATEGORY));
    }

    #[test]
    fn test_category_scopes_are_disjoint() {
        let repo = repo();
        let user = seeded_user(&repo);
        let custom = Category::user(user.id, "Hobbies");
        repo.insert_category(&custom).unwrap();

        // System scope never picks up user rows and vice versa
        let system = repo.get_categories_by_scope(None).unwrap();
        assert_eq!(system.len(), SYSTEM_CATEGORIES.len());
        assert!(system.iter().all(|c| c.user_id.is_none()));

        let mine = repo.get_categories_by_scope(Some(user.id)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Hobbies");
    }

    #[test]
    fn test_account_upsert_is_keyed_on_provider_id() {
        let repo = repo();
        let user = seeded_user(&repo);
        let connection = Connection::new(user.id, Provider::Plaid, "Chase", "tok");
        repo.insert_connection(&connection).unwrap();

        let mut account = Account::linked(user.id, connection.id, "plaid-acc-1", "Checking");
        account.balance = Decimal::new(10000, 2);
        let first_id = repo.upsert_account(&account).unwrap();

        // Same provider id, fresh balance: row updated, not duplicated
        let mut again = Account::linked(user.id, connection.id, "plaid-acc-1", "Renamed");
        again.balance = Decimal::new(20000, 2);
        let second_id = repo.upsert_account(&again).unwrap();

        assert_eq!(first_id, second_id);
        let accounts = repo.get_accounts_for_user(user.id).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].balance, Decimal::new(20000, 2));
        // Name is creation-only
        assert_eq!(accounts[0].name, "Checking");
    }

    #[test]
    fn test_transaction_update_arm_preserves_category() {
        let repo = repo();
        let user = seeded_user(&repo);
        let connection = Connection::new(user.id, Provider::Plaid, "Chase", "tok");
        repo.insert_connection(&connection).unwrap();
        let account = Account::linked(user.id, connection.id, "acc-1", "Checking");
        let account_id = repo.upsert_account(&account).unwrap();

        let mut tx = Transaction::manual(
            user.id,
            account_id,
            Decimal::new(5000, 2),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            "COFFEE SHOP",
            Flow::Expense,
        );
        tx.provider_transaction_id = "plaid-txn-1".to_string();
        tx.is_manual = false;
        repo.upsert_transaction(&tx).unwrap();

        // User assigns a category by hand
        let category = Category::user(user.id, "Coffee");
        repo.insert_category(&category).unwrap();
        repo.update_transaction_category(tx.id, Some(category.id), None)
            .unwrap();

        // Resync delivers the same provider id with no category
        let mut modified = tx.clone();
        modified.id = Uuid::new_v4();
        modified.description = "COFFEE SHOP #42".to_string();
        modified.category_id = None;
        repo.upsert_transaction(&modified).unwrap();

        let stored = repo
            .get_transaction_by_provider_id("plaid-txn-1")
            .unwrap()
            .unwrap();
        assert_eq!(stored.description, "COFFEE SHOP #42");
        assert_eq!(stored.category_id, Some(category.id));
    }

    #[test]
    fn test_cursor_roundtrip() {
        let repo = repo();
        let user = seeded_user(&repo);
        let connection = Connection::new(user.id, Provider::Plaid, "Chase", "tok");
        repo.insert_connection(&connection).unwrap();

        repo.update_connection_cursor(connection.id, "abc").unwrap();
        let stored = repo.get_connection(connection.id).unwrap().unwrap();
        assert_eq!(stored.cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_sync_flag_blocks_within_ttl_and_steals_after() {
        let repo = repo();
        let user = seeded_user(&repo);
        let connection = Connection::new(user.id, Provider::Teller, "WF", "tok");
        repo.insert_connection(&connection).unwrap();

        assert!(repo.try_begin_sync(connection.id, 10).unwrap());
        assert!(!repo.try_begin_sync(connection.id, 10).unwrap());
        // Zero TTL makes the held flag immediately stale
        assert!(repo.try_begin_sync(connection.id, 0).unwrap());
        repo.end_sync(connection.id).unwrap();
        assert!(repo.try_begin_sync(connection.id, 10).unwrap());
    }

    #[test]
    fn test_delete_account_cascades_to_transactions() {
        let repo = repo();
        let user = seeded_user(&repo);
        let account = Account::manual(user.id, "Wallet", AccountType::Cash);
        let account_id = repo.upsert_account(&account).unwrap();

        let tx = Transaction::manual(
            user.id,
            account_id,
            Decimal::new(500, 2),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            "Snack",
            Flow::Expense,
        );
        repo.upsert_transaction(&tx).unwrap();

        repo.delete_account(account_id).unwrap();
        assert!(repo.get_transaction(tx.id).unwrap().is_none());
        assert!(repo.get_account(account_id).unwrap().is_none());
    }

    #[test]
    fn test_rules_ordered_by_priority() {
        let repo = repo();
        let user = seeded_user(&repo);
        let category = Category::user(user.id, "Coffee");
        repo.insert_category(&category).unwrap();

        repo.insert_rule(&CategorizationRule::new(user.id, "late", category.id, 5))
            .unwrap();
        repo.insert_rule(&CategorizationRule::new(user.id, "early", category.id, 1))
            .unwrap();

        let rules = repo.get_rules_for_user(user.id).unwrap();
        assert_eq!(rules[0].keyword, "early");
        assert_eq!(rules[1].keyword, "late");
    }
}
