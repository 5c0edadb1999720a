//! Sync service - pull provider data through the pipeline into the ledger
//!
//! One run per connection: fetch accounts, upsert them, fetch transactions
//! per the provider's strategy, classify and categorize, upsert, then
//! persist the cursor (incremental providers only). Failures are scoped:
//! a bad account or an unparseable transaction is skipped and logged, a
//! failed top-level fetch aborts the run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::duckdb::LedgerRepository;
use crate::adapters::plaid::PlaidAdapter;
use crate::adapters::teller::TellerAdapter;
use crate::config::{BalanceSource, Config};
use crate::domain::normalize::{normalize_account_type, parse_signed_amount};
use crate::domain::result::{Error, Result};
use crate::domain::{flow, Account, CategorizationRule, Provider, Transaction};
use crate::ports::{PageRequest, ProviderAdapter, RawAccount, RawTransaction, SyncStrategy};
use crate::services::{CategorizationService, TokenCipher};

/// Minutes before an abandoned sync-in-progress flag is considered stale
const SYNC_LOCK_TTL_MINUTES: i64 = 10;

/// Summary returned to the caller after a sync run
#[derive(Debug, Default, Serialize)]
pub struct SyncSummary {
    pub added: usize,
    pub modified: usize,
    /// Provider account id and reason for every account skipped this run
    pub skipped_accounts: Vec<(String, String)>,
    /// Transactions dropped for unparseable data
    pub skipped_transactions: usize,
}

/// Sync service for connection synchronization
pub struct SyncService {
    repository: Arc<LedgerRepository>,
    categorizer: Arc<CategorizationService>,
    cipher: Arc<TokenCipher>,
    config: Config,
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl SyncService {
    pub fn new(
        repository: Arc<LedgerRepository>,
        categorizer: Arc<CategorizationService>,
        cipher: Arc<TokenCipher>,
        config: Config,
    ) -> Self {
        let mut adapters: HashMap<Provider, Arc<dyn ProviderAdapter>> = HashMap::new();

        // Teller needs no API credentials of its own
        if let Ok(teller) = TellerAdapter::new() {
            adapters.insert(Provider::Teller, Arc::new(teller));
        }
        // Plaid is only available once credentials are configured
        if let Ok((client_id, secret)) = config.plaid_credentials() {
            if let Ok(plaid) = PlaidAdapter::new(client_id, secret) {
                adapters.insert(Provider::Plaid, Arc::new(plaid));
            }
        }

        Self {
            repository,
            categorizer,
            cipher,
            config,
            adapters,
        }
    }

    /// Replace or add an adapter. Used by tests to script provider behavior.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// Sync one connection on behalf of a user.
    ///
    /// Errors distinguish "not found", "not owned by the caller", and
    /// provider failures so the calling layer can map them.
    pub fn sync_connection(&self, connection_id: Uuid, user_id: Uuid) -> Result<SyncSummary> {
        let connection = self
            .repository
            .get_connection(connection_id)?
            .ok_or_else(|| Error::not_found(format!("connection {connection_id}")))?;
        if connection.user_id != user_id {
            return Err(Error::Forbidden(format!(
                "connection {connection_id} does not belong to this user"
            )));
        }

        // The plaintext token lives only for the duration of this run
        let access_token = self.cipher.decrypt(&connection.access_token)?;

        let adapter = self
            .adapters
            .get(&connection.provider)
            .cloned()
            .ok_or_else(|| {
                Error::Config(format!(
                    "no adapter configured for provider {}",
                    connection.provider
                ))
            })?;

        if !self
            .repository
            .try_begin_sync(connection_id, SYNC_LOCK_TTL_MINUTES)?
        {
            return Err(Error::validation(format!(
                "a sync for connection {connection_id} is already running"
            )));
        }

        let result = self.run_sync(&connection, adapter.as_ref(), &access_token, user_id);
        // Release the advisory flag regardless of the outcome
        if let Err(e) = self.repository.end_sync(connection_id) {
            warn!(connection_id = %connection_id, error = %e, "failed to clear sync flag");
        }

        match &result {
            Ok(summary) => {
                if let Err(e) = self.repository.mark_synced(connection_id) {
                    warn!(connection_id = %connection_id, error = %e, "failed to stamp last_synced_at");
                }
                info!(
                    connection_id = %connection_id,
                    provider = %connection.provider,
                    added = summary.added,
                    modified = summary.modified,
                    skipped_accounts = summary.skipped_accounts.len(),
                    "sync complete"
                );
            }
            Err(e) => warn!(
                connection_id = %connection_id,
                provider = %connection.provider,
                error = %e,
                "sync failed"
            ),
        }
        result
    }

    fn run_sync(
        &self,
        connection: &crate::domain::Connection,
        adapter: &dyn ProviderAdapter,
        access_token: &str,
        user_id: Uuid,
    ) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();

        // A malformed account list is fatal for the whole connection
        let fetched = adapter.fetch_accounts(access_token)?;
        for skipped in &fetched.skipped {
            summary
                .skipped_accounts
                .push((skipped.provider_account_id.clone(), skipped.reason.clone()));
        }

        let balance_source = self.config.balance_source(connection.provider);
        let rules = self.repository.get_rules_for_user(user_id)?;

        // provider account id -> (internal id, canonical type)
        let mut account_map: HashMap<String, (Uuid, crate::domain::AccountType)> = HashMap::new();

        for raw in &fetched.accounts {
            match self.upsert_raw_account(connection, raw, balance_source, user_id) {
                Ok((internal_id, account_type)) => {
                    account_map.insert(raw.provider_account_id.clone(), (internal_id, account_type));
                }
                Err(e) => {
                    warn!(
                        provider_account_id = %raw.provider_account_id,
                        error = %e,
                        "skipping account"
                    );
                    summary
                        .skipped_accounts
                        .push((raw.provider_account_id.clone(), e.to_string()));
                }
            }
        }

        match adapter.strategy() {
            SyncStrategy::CursorIncremental => {
                self.sync_incremental(connection, adapter, access_token, &account_map, &rules, &mut summary)?;
            }
            SyncStrategy::FullRefetch => {
                self.sync_full_refetch(adapter, access_token, &account_map, &rules, user_id, &mut summary);
            }
        }

        Ok(summary)
    }

    /// Cursor-incremental: accumulate every page before any transaction is
    /// written, and persist the final cursor only after the whole page set
    /// has been upserted. A crash mid-run leaves the old cursor in place,
    /// so a retry refetches the same pages and the keyed upserts absorb
    /// the repeats.
    fn sync_incremental(
        &self,
        connection: &crate::domain::Connection,
        adapter: &dyn ProviderAdapter,
        access_token: &str,
        account_map: &HashMap<String, (Uuid, crate::domain::AccountType)>,
        rules: &[CategorizationRule],
        summary: &mut SyncSummary,
    ) -> Result<()> {
        let mut cursor = connection.cursor.clone();
        let mut all_added: Vec<RawTransaction> = Vec::new();
        let mut all_modified: Vec<RawTransaction> = Vec::new();

        loop {
            let page =
                adapter.fetch_transactions_page(access_token, PageRequest::Cursor(cursor.as_deref()))?;
            all_added.extend(page.added);
            all_modified.extend(page.modified);
            if page.next_cursor.is_some() {
                cursor = page.next_cursor;
            }
            if !page.has_more {
                break;
            }
        }

        for raw in &all_added {
            if self.ingest_transaction(raw, account_map, rules, connection.user_id, summary)? {
                summary.added += 1;
            }
        }
        for raw in &all_modified {
            if self.ingest_transaction(raw, account_map, rules, connection.user_id, summary)? {
                summary.modified += 1;
            }
        }

        // Cursor write comes last; see the method doc
        if let Some(cursor) = cursor {
            self.repository.update_connection_cursor(connection.id, &cursor)?;
        }
        Ok(())
    }

    /// Full-refetch: one call per account returning its complete history.
    /// A failing account is skipped so its siblings still sync.
    fn sync_full_refetch(
        &self,
        adapter: &dyn ProviderAdapter,
        access_token: &str,
        account_map: &HashMap<String, (Uuid, crate::domain::AccountType)>,
        rules: &[CategorizationRule],
        user_id: Uuid,
        summary: &mut SyncSummary,
    ) {
        for provider_account_id in account_map.keys() {
            let page = match adapter
                .fetch_transactions_page(access_token, PageRequest::Account(provider_account_id))
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        provider_account_id = %provider_account_id,
                        error = %e,
                        "skipping account: transaction fetch failed"
                    );
                    summary
                        .skipped_accounts
                        .push((provider_account_id.clone(), e.to_string()));
                    continue;
                }
            };

            for raw in &page.added {
                match self.ingest_transaction(raw, account_map, rules, user_id, summary) {
                    Ok(true) => summary.added += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(
                            provider_account_id = %provider_account_id,
                            error = %e,
                            "skipping account mid-ingest"
                        );
                        summary
                            .skipped_accounts
                            .push((provider_account_id.clone(), e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    fn upsert_raw_account(
        &self,
        connection: &crate::domain::Connection,
        raw: &RawAccount,
        balance_source: BalanceSource,
        user_id: Uuid,
    ) -> Result<(Uuid, crate::domain::AccountType)> {
        let account_type =
            normalize_account_type(connection.provider, &raw.raw_type, &raw.raw_subtype);

        let source_field = match balance_source {
            BalanceSource::Current => raw.current_balance.as_deref(),
            BalanceSource::Available => raw.available_balance.as_deref(),
        };
        // Fall back to whichever field the provider did report
        let balance = match source_field
            .or(raw.current_balance.as_deref())
            .or(raw.available_balance.as_deref())
        {
            Some(s) => parse_signed_amount(s)?,
            None => Decimal::ZERO,
        };
        let available_balance = raw
            .available_balance
            .as_deref()
            .map(parse_signed_amount)
            .transpose()?;

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            user_id,
            connection_id: Some(connection.id),
            provider_account_id: raw.provider_account_id.clone(),
            name: raw.name.clone(),
            mask: raw.mask.clone(),
            account_type,
            balance,
            available_balance,
            currency: raw.currency.clone(),
            institution_name: if raw.institution_name.is_empty() {
                connection.institution_name.clone()
            } else {
                raw.institution_name.clone()
            },
            is_manual: false,
            created_at: now,
            updated_at: now,
        };

        let internal_id = self.repository.upsert_account(&account)?;
        Ok((internal_id, account_type))
    }

    /// Normalize, classify, categorize (first sighting only) and upsert one
    /// raw transaction. Returns false when the row was skipped.
    fn ingest_transaction(
        &self,
        raw: &RawTransaction,
        account_map: &HashMap<String, (Uuid, crate::domain::AccountType)>,
        rules: &[CategorizationRule],
        user_id: Uuid,
        summary: &mut SyncSummary,
    ) -> Result<bool> {
        // Transactions for accounts that were skipped above have nowhere to go
        let Some(&(account_id, account_type)) = account_map.get(&raw.provider_account_id) else {
            summary.skipped_transactions += 1;
            return Ok(false);
        };

        // Unparseable amount is data-scoped: drop this row, keep the run
        let signed = match parse_signed_amount(&raw.amount) {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    provider_transaction_id = %raw.provider_transaction_id,
                    error = %e,
                    "skipping transaction"
                );
                summary.skipped_transactions += 1;
                return Ok(false);
            }
        };

        let transaction_flow = flow::classify(
            signed,
            account_type,
            raw.type_hint.as_deref(),
            raw.category_hint.as_deref(),
        );

        let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d")
            .unwrap_or_else(|_| Utc::now().date_naive());

        // Categorize only on first sighting; the upsert's update arm omits
        // the category columns, so existing assignments are untouchable here.
        let category_id = if self
            .repository
            .transaction_exists_by_provider_id(&raw.provider_transaction_id)?
        {
            None
        } else {
            self.categorizer.resolve(&raw.description, rules)?
        };

        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id,
            account_id,
            provider_transaction_id: raw.provider_transaction_id.clone(),
            amount: signed.abs(),
            currency: raw.currency.clone(),
            date,
            description: raw.description.clone(),
            merchant_name: raw.merchant_name.clone(),
            flow: transaction_flow,
            category_id,
            subcategory_id: None,
            pending: raw.pending,
            is_manual: false,
            hidden: false,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        self.repository.upsert_transaction(&transaction)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, Connection, Flow, User};
    use crate::ports::{FetchedAccounts, SkippedAccount, TransactionsPage};
    use std::sync::Mutex;

    fn raw_account(id: &str, raw_type: &str, raw_subtype: &str) -> RawAccount {
        RawAccount {
            provider_account_id: id.to_string(),
            name: format!("Account {id}"),
            mask: None,
            raw_type: raw_type.to_string(),
            raw_subtype: raw_subtype.to_string(),
            current_balance: Some("100.00".to_string()),
            available_balance: Some("90.00".to_string()),
            currency: "USD".to_string(),
            institution_name: "Test Bank".to_string(),
        }
    }

    fn raw_txn(id: &str, account: &str, amount: &str, description: &str) -> RawTransaction {
        RawTransaction {
            provider_transaction_id: id.to_string(),
            provider_account_id: account.to_string(),
            amount: amount.to_string(),
            currency: "USD".to_string(),
            date: "2025-03-01".to_string(),
            description: description.to_string(),
            merchant_name: None,
            type_hint: None,
            category_hint: None,
            pending: false,
        }
    }

    /// Scripted cursor-incremental adapter: pops one page per call and
    /// records the cursor each call arrived with.
    struct ScriptedIncremental {
        pages: Mutex<Vec<TransactionsPage>>,
        accounts: Vec<RawAccount>,
        seen_cursors: Mutex<Vec<Option<String>>>,
    }

    impl ProviderAdapter for ScriptedIncremental {
        fn provider(&self) -> Provider {
            Provider::Plaid
        }
        fn strategy(&self) -> SyncStrategy {
            SyncStrategy::CursorIncremental
        }
        fn fetch_accounts(&self, _token: &str) -> crate::domain::result::Result<FetchedAccounts> {
            Ok(FetchedAccounts {
                accounts: self.accounts.clone(),
                skipped: Vec::new(),
            })
        }
        fn fetch_transactions_page(
            &self,
            _token: &str,
            request: PageRequest<'_>,
        ) -> crate::domain::result::Result<TransactionsPage> {
            let PageRequest::Cursor(cursor) = request else {
                return Err(Error::provider("plaid", None, "wrong request shape"));
            };
            self.seen_cursors
                .lock()
                .unwrap()
                .push(cursor.map(str::to_string));
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(TransactionsPage::default());
            }
            Ok(pages.remove(0))
        }
    }

    /// Full-refetch adapter where one named account always errors
    struct ScriptedFullRefetch {
        accounts: Vec<RawAccount>,
        failing_account: String,
        skipped: Vec<SkippedAccount>,
    }

    impl ProviderAdapter for ScriptedFullRefetch {
        fn provider(&self) -> Provider {
            Provider::Teller
        }
        fn strategy(&self) -> SyncStrategy {
            SyncStrategy::FullRefetch
        }
        fn fetch_accounts(&self, _token: &str) -> crate::domain::result::Result<FetchedAccounts> {
            Ok(FetchedAccounts {
                accounts: self.accounts.clone(),
                skipped: self.skipped.clone(),
            })
        }
        fn fetch_transactions_page(
            &self,
            _token: &str,
            request: PageRequest<'_>,
        ) -> crate::domain::result::Result<TransactionsPage> {
            let PageRequest::Account(id) = request else {
                return Err(Error::provider("teller", None, "wrong request shape"));
            };
            if id == self.failing_account {
                return Err(Error::provider("teller", Some(410), "account closed"));
            }
            Ok(TransactionsPage {
                added: vec![raw_txn(&format!("txn-{id}"), id, "-10.00", "CARD PURCHASE")],
                modified: Vec::new(),
                next_cursor: None,
                has_more: false,
            })
        }
    }

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    struct Harness {
        repository: Arc<LedgerRepository>,
        service: SyncService,
        user: User,
        connection: Connection,
    }

    fn harness(provider: Provider) -> Harness {
        let repository = Arc::new(LedgerRepository::in_memory().unwrap());
        repository.ensure_schema().unwrap();
        let categorizer = Arc::new(CategorizationService::new(Arc::clone(&repository)));
        let cipher = Arc::new(TokenCipher::new(TEST_KEY).unwrap());
        let encrypted = cipher.encrypt("access-token").unwrap();
        let service = SyncService::new(
            Arc::clone(&repository),
            categorizer,
            cipher,
            Config::default(),
        );

        let user = User::new("sync@example.com");
        repository.insert_user(&user).unwrap();
        let connection = Connection::new(user.id, provider, "Test Bank", encrypted);
        repository.insert_connection(&connection).unwrap();

        Harness {
            repository,
            service,
            user,
            connection,
        }
    }

    #[test]
    fn test_incremental_sync_stores_magnitude_flow_and_cursor() {
        let mut h = harness(Provider::Plaid);
        h.service.register_adapter(Arc::new(ScriptedIncremental {
            pages: Mutex::new(vec![TransactionsPage {
                added: vec![raw_txn("t1", "acc-1", "-50", "MYSTERY DEBIT")],
                modified: Vec::new(),
                next_cursor: Some("abc".to_string()),
                has_more: false,
            }]),
            accounts: vec![raw_account("acc-1", "depository", "checking")],
            seen_cursors: Mutex::new(Vec::new()),
        }));

        let summary = h
            .service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();
        assert_eq!(summary.added, 1);

        let stored = h
            .repository
            .get_transaction_by_provider_id("t1")
            .unwrap()
            .unwrap();
        assert_eq!(stored.amount, Decimal::new(5000, 2));
        // Negative on a depository account without a transfer hint
        assert_eq!(stored.flow, Flow::Expense);

        let connection = h.repository.get_connection(h.connection.id).unwrap().unwrap();
        assert_eq!(connection.cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_second_sync_passes_stored_cursor_back() {
        let mut h = harness(Provider::Plaid);
        h.repository
            .update_connection_cursor(h.connection.id, "abc")
            .unwrap();

        let adapter = Arc::new(ScriptedIncremental {
            pages: Mutex::new(vec![TransactionsPage {
                added: Vec::new(),
                modified: Vec::new(),
                next_cursor: Some("def".to_string()),
                has_more: false,
            }]),
            accounts: vec![raw_account("acc-1", "depository", "checking")],
            seen_cursors: Mutex::new(Vec::new()),
        });
        h.service.register_adapter(adapter.clone());

        h.service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();

        let seen = adapter.seen_cursors.lock().unwrap();
        assert_eq!(seen.as_slice(), &[Some("abc".to_string())]);
        drop(seen);

        let connection = h.repository.get_connection(h.connection.id).unwrap().unwrap();
        assert_eq!(connection.cursor.as_deref(), Some("def"));
    }

    #[test]
    fn test_multi_page_accumulates_before_cursor_write() {
        let mut h = harness(Provider::Plaid);
        h.service.register_adapter(Arc::new(ScriptedIncremental {
            pages: Mutex::new(vec![
                TransactionsPage {
                    added: vec![raw_txn("t1", "acc-1", "-10", "PAGE ONE")],
                    modified: Vec::new(),
                    next_cursor: Some("mid".to_string()),
                    has_more: true,
                },
                TransactionsPage {
                    added: vec![raw_txn("t2", "acc-1", "-20", "PAGE TWO")],
                    modified: Vec::new(),
                    next_cursor: Some("end".to_string()),
                    has_more: false,
                },
            ]),
            accounts: vec![raw_account("acc-1", "depository", "checking")],
            seen_cursors: Mutex::new(Vec::new()),
        }));

        let summary = h
            .service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();
        assert_eq!(summary.added, 2);
        let connection = h.repository.get_connection(h.connection.id).unwrap().unwrap();
        assert_eq!(connection.cursor.as_deref(), Some("end"));
    }

    #[test]
    fn test_partial_failure_isolation_across_accounts() {
        let mut h = harness(Provider::Teller);
        h.service.register_adapter(Arc::new(ScriptedFullRefetch {
            accounts: vec![
                raw_account("acc-1", "depository", "checking"),
                raw_account("acc-2", "depository", "checking"),
                raw_account("acc-3", "depository", "savings"),
            ],
            failing_account: "acc-2".to_string(),
            skipped: Vec::new(),
        }));

        let summary = h
            .service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();

        // Accounts 1 and 3 still landed with their transactions
        assert_eq!(summary.added, 2);
        assert_eq!(summary.skipped_accounts.len(), 1);
        assert_eq!(summary.skipped_accounts[0].0, "acc-2");
        assert!(h
            .repository
            .get_transaction_by_provider_id("txn-acc-1")
            .unwrap()
            .is_some());
        assert!(h
            .repository
            .get_transaction_by_provider_id("txn-acc-3")
            .unwrap()
            .is_some());
        assert!(h
            .repository
            .get_transaction_by_provider_id("txn-acc-2")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_idempotent_rerun_leaves_state_unchanged() {
        let mut h = harness(Provider::Plaid);
        let page = || TransactionsPage {
            added: vec![raw_txn("t1", "acc-1", "-50", "COFFEE")],
            modified: Vec::new(),
            next_cursor: Some("abc".to_string()),
            has_more: false,
        };
        h.service.register_adapter(Arc::new(ScriptedIncremental {
            pages: Mutex::new(vec![page(), page()]),
            accounts: vec![raw_account("acc-1", "depository", "checking")],
            seen_cursors: Mutex::new(Vec::new()),
        }));

        h.service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();
        let first = h.repository.get_transactions_for_user(h.user.id).unwrap();

        h.service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();
        let second = h.repository.get_transactions_for_user(h.user.id).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].category_id, second[0].category_id);
    }

    #[test]
    fn test_resync_preserves_manual_category() {
        let mut h = harness(Provider::Plaid);
        h.service.register_adapter(Arc::new(ScriptedIncremental {
            pages: Mutex::new(vec![
                TransactionsPage {
                    added: vec![raw_txn("t1", "acc-1", "-50", "COFFEE SHOP")],
                    modified: Vec::new(),
                    next_cursor: Some("abc".to_string()),
                    has_more: false,
                },
                TransactionsPage {
                    added: Vec::new(),
                    modified: vec![raw_txn("t1", "acc-1", "-50", "COFFEE SHOP #42")],
                    next_cursor: Some("def".to_string()),
                    has_more: false,
                },
            ]),
            accounts: vec![raw_account("acc-1", "depository", "checking")],
            seen_cursors: Mutex::new(Vec::new()),
        }));

        h.service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();

        // User reassigns the category by hand between syncs
        let stored = h
            .repository
            .get_transaction_by_provider_id("t1")
            .unwrap()
            .unwrap();
        let manual = crate::domain::Category::user(h.user.id, "Coffee");
        h.repository.insert_category(&manual).unwrap();
        h.repository
            .update_transaction_category(stored.id, Some(manual.id), None)
            .unwrap();

        let summary = h
            .service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();
        assert_eq!(summary.modified, 1);

        let after = h
            .repository
            .get_transaction_by_provider_id("t1")
            .unwrap()
            .unwrap();
        assert_eq!(after.description, "COFFEE SHOP #42");
        assert_eq!(after.category_id, Some(manual.id));
    }

    #[test]
    fn test_unparseable_amount_skips_only_that_transaction() {
        let mut h = harness(Provider::Plaid);
        h.service.register_adapter(Arc::new(ScriptedIncremental {
            pages: Mutex::new(vec![TransactionsPage {
                added: vec![
                    raw_txn("bad", "acc-1", "12,34 EUR", "MALFORMED"),
                    raw_txn("good", "acc-1", "-5.00", "FINE"),
                ],
                modified: Vec::new(),
                next_cursor: Some("abc".to_string()),
                has_more: false,
            }]),
            accounts: vec![raw_account("acc-1", "depository", "checking")],
            seen_cursors: Mutex::new(Vec::new()),
        }));

        let summary = h
            .service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped_transactions, 1);
        assert!(h
            .repository
            .get_transaction_by_provider_id("good")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_wrong_owner_is_forbidden() {
        let mut h = harness(Provider::Plaid);
        h.service.register_adapter(Arc::new(ScriptedIncremental {
            pages: Mutex::new(Vec::new()),
            accounts: Vec::new(),
            seen_cursors: Mutex::new(Vec::new()),
        }));
        let stranger = User::new("stranger@example.com");
        h.repository.insert_user(&stranger).unwrap();

        let result = h.service.sync_connection(h.connection.id, stranger.id);
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_unknown_connection_is_not_found() {
        let h = harness(Provider::Plaid);
        let result = h.service.sync_connection(Uuid::new_v4(), h.user.id);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_categorization_runs_once_per_rule_load() {
        let mut h = harness(Provider::Plaid);
        // A user rule targeting the incoming description
        let custom = crate::domain::Category::user(h.user.id, "Caffeine");
        h.repository.insert_category(&custom).unwrap();
        h.repository
            .insert_rule(&crate::domain::CategorizationRule::new(
                h.user.id, "coffee", custom.id, 0,
            ))
            .unwrap();

        h.service.register_adapter(Arc::new(ScriptedIncremental {
            pages: Mutex::new(vec![TransactionsPage {
                added: vec![raw_txn("t1", "acc-1", "-4.50", "COFFEE SHOP")],
                modified: Vec::new(),
                next_cursor: Some("abc".to_string()),
                has_more: false,
            }]),
            accounts: vec![raw_account("acc-1", "depository", "checking")],
            seen_cursors: Mutex::new(Vec::new()),
        }));

        h.service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();
        let stored = h
            .repository
            .get_transaction_by_provider_id("t1")
            .unwrap()
            .unwrap();
        assert_eq!(stored.category_id, Some(custom.id));
    }

    #[test]
    fn test_account_types_normalized_through_sync() {
        let mut h = harness(Provider::Plaid);
        h.service.register_adapter(Arc::new(ScriptedIncremental {
            pages: Mutex::new(Vec::new()),
            accounts: vec![
                raw_account("acc-1", "depository", "savings"),
                raw_account("acc-2", "credit", "credit card"),
            ],
            seen_cursors: Mutex::new(Vec::new()),
        }));

        h.service
            .sync_connection(h.connection.id, h.user.id)
            .unwrap();
        let accounts = h.repository.get_accounts_for_user(h.user.id).unwrap();
        let types: Vec<AccountType> = accounts.iter().map(|a| a.account_type).collect();
        assert!(types.contains(&AccountType::Savings));
        assert!(types.contains(&AccountType::Credit));
    }
}
