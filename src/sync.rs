//! Aggregator sync: refresh an item, map its accounts, and apply each
//! external transaction to the ledger at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

use crate::aggregator::{Aggregator, ExternalAccount, ExternalTransaction, ExternalTxnStatus, ItemSnapshot, ItemStatus};
use crate::error::{PennyError, Result};
use crate::ledger;
use crate::mapper::{map_account, MatchKind};
use crate::models::{BankConnection, Transaction, TxnSource, TxnType};
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Trailing window of transactions fetched per account.
    pub window_days: i64,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            window_days: 7,
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl SyncOptions {
    /// A hand-edited window below one day is raised to one.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            window_days: settings.sync_window_days.max(1),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            max_wait: Duration::from_secs(settings.max_wait_secs),
        }
    }
}

/// Cooperative cancellation shared between the caller and a running sync.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PennyError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Background run: failures are logged, not surfaced.
    Silent,
    /// User-initiated run: failures are surfaced to the caller.
    Interactive,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub item_id: String,
    pub connection_id: i64,
    pub item_status: Option<ItemStatus>,
    pub refresh_timed_out: bool,
    pub accounts_mapped: usize,
    pub accounts_created: usize,
    pub balances_updated: usize,
    pub fetched: usize,
    pub skipped_pending: usize,
    pub inserted: usize,
    pub duplicates_avoided: usize,
    pub last_transaction_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Refresh polling
// ---------------------------------------------------------------------------

/// Poll the item until the aggregator stops working on it.
///
/// Gives up with `AggregatorTimeout` after `max_wait`; failure statuses end
/// the poll with `AggregatorRequestFailed`.
pub fn refresh_item(
    aggregator: &dyn Aggregator,
    item_id: &str,
    options: &SyncOptions,
    cancel: &CancelToken,
) -> Result<ItemSnapshot> {
    let started = Instant::now();
    loop {
        cancel.check()?;
        let snapshot = aggregator.get_item_status(item_id)?;
        if snapshot.status.is_failure() {
            return Err(PennyError::AggregatorRequestFailed {
                item_id: item_id.to_string(),
                reason: snapshot
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("item status {:?}", snapshot.status)),
            });
        }
        if !snapshot.status.is_pending() {
            return Ok(snapshot);
        }
        if started.elapsed() >= options.max_wait {
            return Err(PennyError::AggregatorTimeout {
                item_id: item_id.to_string(),
                waited_secs: started.elapsed().as_secs(),
            });
        }
        tracing::debug!(item = item_id, status = ?snapshot.status, "item still refreshing");
        let remaining = options.max_wait.saturating_sub(started.elapsed());
        std::thread::sleep(options.poll_interval.min(remaining));
    }
}

// ---------------------------------------------------------------------------
// Single item
// ---------------------------------------------------------------------------

/// Sync one aggregator item into the ledger and record the outcome on its
/// connection.
///
/// The connection row is created by the first successful sync. A failure for
/// an item with no connection yet is returned without writing anything.
pub fn sync_item(
    conn: &mut Connection,
    aggregator: &dyn Aggregator,
    item_id: &str,
    existing: Option<&BankConnection>,
    options: &SyncOptions,
    cancel: &CancelToken,
    now: DateTime<Utc>,
) -> Result<SyncReport> {
    match run_item(conn, aggregator, item_id, existing, options, cancel, now) {
        Ok(report) => {
            tracing::info!(
                item = item_id,
                inserted = report.inserted,
                duplicates = report.duplicates_avoided,
                pending = report.skipped_pending,
                "item synced"
            );
            Ok(report)
        }
        Err(PennyError::Cancelled) => Err(PennyError::Cancelled),
        Err(e) => {
            match existing {
                Some(connection) => {
                    if let Err(record_err) = ledger::record_sync_error(conn, connection.id, now, &e.to_string()) {
                        tracing::error!(item = item_id, error = %record_err, "could not record sync failure");
                    }
                }
                None => tracing::debug!(item = item_id, "first sync failed; no connection recorded"),
            }
            Err(e)
        }
    }
}

fn run_item(
    conn: &mut Connection,
    aggregator: &dyn Aggregator,
    item_id: &str,
    existing: Option<&BankConnection>,
    options: &SyncOptions,
    cancel: &CancelToken,
    now: DateTime<Utc>,
) -> Result<SyncReport> {
    let mut report = SyncReport {
        item_id: item_id.to_string(),
        ..Default::default()
    };

    let mut connector_name = None;
    match refresh_item(aggregator, item_id, options, cancel) {
        Ok(snapshot) => {
            report.item_status = Some(snapshot.status);
            connector_name = snapshot.connector_name.filter(|n| !n.trim().is_empty());
        }
        Err(e) if e.is_soft() => {
            tracing::warn!(item = item_id, error = %e, "continuing with possibly stale item data");
            report.refresh_timed_out = true;
        }
        Err(e) => return Err(e),
    }

    cancel.check()?;
    let accounts = aggregator.list_accounts(item_id)?;
    let from = now - chrono::Duration::days(options.window_days);
    let mut fetched: Vec<(ExternalAccount, Vec<ExternalTransaction>)> = Vec::with_capacity(accounts.len());
    for account in accounts {
        cancel.check()?;
        let txns = aggregator.list_transactions(&account.id, from, now)?;
        report.fetched += txns.len();
        fetched.push((account, txns));
    }

    cancel.check()?;
    let tx = conn.transaction()?;
    let mut connection = match existing {
        Some(c) => c.clone(),
        None => ledger::ensure_connection(&tx, item_id)?,
    };
    report.connection_id = connection.id;
    if let Some(name) = connector_name {
        if connection.institution.as_deref() != Some(name.as_str()) {
            ledger::set_connection_institution(&tx, connection.id, &name)?;
            connection.institution = Some(name);
        }
    }

    let mut max_date: Option<NaiveDate> = None;
    for (external, txns) in &fetched {
        let mapped = map_account(&tx, &connection, external)?;
        report.accounts_mapped += 1;
        if mapped.matched == MatchKind::Created {
            report.accounts_created += 1;
        }
        if mapped.balance_updated {
            report.balances_updated += 1;
        }

        for ext in txns {
            if ext.status != ExternalTxnStatus::Posted {
                report.skipped_pending += 1;
                continue;
            }
            if !ledger::mark_applied(&tx, connection.id, &ext.id)? {
                report.duplicates_avoided += 1;
                continue;
            }
            let amount = ext.signed_amount();
            let date = ext.date.date_naive();
            let written = ledger::upsert_transaction(
                &tx,
                &Transaction {
                    id: ext.id.clone(),
                    account_id: mapped.account_id,
                    title: ext.title(),
                    amount,
                    date,
                    txn_type: TxnType::for_amount(amount),
                    category: None,
                    source: TxnSource::Sync,
                },
            )?;
            if written {
                report.inserted += 1;
            } else {
                report.duplicates_avoided += 1;
            }
            max_date = max_date.max(Some(date));
        }
    }
    if let Some(date) = max_date {
        ledger::advance_transaction_watermark(&tx, connection.id, date)?;
    }
    ledger::record_sync_success(&tx, connection.id, now)?;
    tx.commit()?;

    report.last_transaction_date = max_date.or(connection.last_transaction_date);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Multi-item runs
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ItemOutcome {
    pub item_id: String,
    pub result: Result<SyncReport>,
}

#[derive(Debug, Default)]
pub struct SyncRun {
    pub outcomes: Vec<ItemOutcome>,
}

impl SyncRun {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &PennyError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.item_id.as_str(), e)))
    }

    pub fn reports(&self) -> impl Iterator<Item = &SyncReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }
}

/// Sync the given items one after another. A failing item does not stop the
/// run; cancellation does.
pub fn sync_items(
    conn: &mut Connection,
    aggregator: &dyn Aggregator,
    item_ids: &[String],
    mode: SyncMode,
    options: &SyncOptions,
    cancel: &CancelToken,
    now: DateTime<Utc>,
) -> Result<SyncRun> {
    let mut run = SyncRun::default();
    for item_id in item_ids {
        cancel.check()?;
        let existing = ledger::find_connection(conn, item_id)?;
        let result = sync_item(conn, aggregator, item_id, existing.as_ref(), options, cancel, now);
        match &result {
            Err(PennyError::Cancelled) => return Err(PennyError::Cancelled),
            Err(e) => match mode {
                SyncMode::Silent => tracing::warn!(item = %item_id, error = %e, "background sync failed"),
                SyncMode::Interactive => tracing::error!(item = %item_id, error = %e, "sync failed"),
            },
            Ok(_) => {}
        }
        run.outcomes.push(ItemOutcome {
            item_id: item_id.clone(),
            result,
        });
    }
    Ok(run)
}

/// Sync every stored connection.
pub fn sync_all(
    conn: &mut Connection,
    aggregator: &dyn Aggregator,
    mode: SyncMode,
    options: &SyncOptions,
    cancel: &CancelToken,
    now: DateTime<Utc>,
) -> Result<SyncRun> {
    let item_ids: Vec<String> = ledger::list_connections(conn)?
        .into_iter()
        .map(|c| c.item_id)
        .collect();
    sync_items(conn, aggregator, &item_ids, mode, options, cancel, now)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet, VecDeque};

    use super::*;
    use crate::aggregator::{Direction, ExternalAccountKind};
    use crate::db::test_db;
    use crate::models::ConnectionStatus;

    #[derive(Default)]
    struct MockAggregator {
        statuses: RefCell<VecDeque<ItemStatus>>,
        accounts: Vec<ExternalAccount>,
        txns: HashMap<String, Vec<ExternalTransaction>>,
        broken_items: HashSet<String>,
        polls: Cell<usize>,
    }

    impl MockAggregator {
        fn with_account(mut self, id: &str, name: &str, balance: f64, txns: Vec<ExternalTransaction>) -> Self {
            self.accounts.push(ExternalAccount {
                id: id.to_string(),
                name: name.to_string(),
                kind: ExternalAccountKind::Bank,
                balance,
                institution: None,
                available_credit_limit: None,
            });
            self.txns.insert(id.to_string(), txns);
            self
        }

        fn with_statuses(self, statuses: &[ItemStatus]) -> Self {
            *self.statuses.borrow_mut() = statuses.iter().copied().collect();
            self
        }
    }

    impl Aggregator for MockAggregator {
        fn get_item_status(&self, item_id: &str) -> Result<ItemSnapshot> {
            self.polls.set(self.polls.get() + 1);
            if self.broken_items.contains(item_id) {
                return Err(PennyError::AggregatorRequestFailed {
                    item_id: item_id.to_string(),
                    reason: "503".to_string(),
                });
            }
            let mut statuses = self.statuses.borrow_mut();
            let status = if statuses.len() > 1 {
                statuses.pop_front().unwrap_or(ItemStatus::Updated)
            } else {
                statuses.front().copied().unwrap_or(ItemStatus::Updated)
            };
            Ok(ItemSnapshot {
                id: item_id.to_string(),
                status,
                connector_name: Some("Acme Bank".to_string()),
                error_message: None,
            })
        }

        fn list_accounts(&self, _item_id: &str) -> Result<Vec<ExternalAccount>> {
            Ok(self.accounts.clone())
        }

        fn list_transactions(
            &self,
            account_id: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<ExternalTransaction>> {
            Ok(self
                .txns
                .get(account_id)
                .map(|t| t.iter().filter(|t| t.date >= from && t.date <= to).cloned().collect())
                .unwrap_or_default())
        }
    }

    fn now() -> DateTime<Utc> {
        "2025-03-10T12:00:00Z".parse().unwrap()
    }

    fn fast() -> SyncOptions {
        SyncOptions {
            window_days: 7,
            poll_interval: Duration::ZERO,
            max_wait: Duration::from_secs(60),
        }
    }

    fn ext_txn(id: &str, date: &str, amount: f64, direction: Direction, status: ExternalTxnStatus) -> ExternalTransaction {
        ExternalTransaction {
            id: id.to_string(),
            date: format!("{date}T09:30:00Z").parse().unwrap(),
            description: Some(format!("Txn {id}")),
            merchant: None,
            amount,
            direction,
            status,
        }
    }

    fn posted(id: &str, date: &str, amount: f64) -> ExternalTransaction {
        ext_txn(id, date, amount, Direction::Debit, ExternalTxnStatus::Posted)
    }

    fn sync(conn: &mut Connection, agg: &MockAggregator, item: &str) -> Result<SyncReport> {
        let existing = ledger::find_connection(conn, item).unwrap();
        sync_item(conn, agg, item, existing.as_ref(), &fast(), &CancelToken::default(), now())
    }

    #[test]
    fn test_first_sync_creates_connection_account_and_transactions() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default().with_account(
            "acc-1",
            "Everyday",
            840.0,
            vec![posted("t1", "2025-03-08", 12.0), posted("t2", "2025-03-09", 30.0)],
        );
        let report = sync(&mut conn, &agg, "item-1").unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.accounts_created, 1);
        assert_eq!(report.last_transaction_date, NaiveDate::from_ymd_opt(2025, 3, 9));

        let c = ledger::find_connection(&conn, "item-1").unwrap().unwrap();
        assert_eq!(c.status, ConnectionStatus::Active);
        assert_eq!(c.institution.as_deref(), Some("Acme Bank"));
        assert_eq!(c.last_synced_at, Some(now()));
        assert_eq!(c.last_transaction_date, NaiveDate::from_ymd_opt(2025, 3, 9));

        let account = ledger::find_account_by_external_id(&conn, "acc-1").unwrap().unwrap();
        let txns = ledger::list_transactions(&conn, account.id).unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[0].id, "t1");
        assert_eq!(txns[0].amount, -12.0);
        assert_eq!(txns[0].txn_type, TxnType::Expense);
        assert_eq!(txns[0].source, TxnSource::Sync);
    }

    #[test]
    fn test_second_sync_inserts_nothing() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default().with_account(
            "acc-1",
            "Everyday",
            840.0,
            vec![posted("t1", "2025-03-08", 12.0), posted("t2", "2025-03-09", 30.0)],
        );
        sync(&mut conn, &agg, "item-1").unwrap();
        let second = sync(&mut conn, &agg, "item-1").unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates_avoided, 2);
        assert_eq!(ledger::count_transactions(&conn).unwrap(), 2);
        assert_eq!(ledger::list_accounts(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_pending_transactions_are_skipped() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default().with_account(
            "acc-1",
            "Everyday",
            0.0,
            vec![
                ext_txn("p1", "2025-03-09", 5.0, Direction::Debit, ExternalTxnStatus::Pending),
                posted("t1", "2025-03-09", 7.0),
            ],
        );
        let report = sync(&mut conn, &agg, "item-1").unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped_pending, 1);
        let account = ledger::find_account_by_external_id(&conn, "acc-1").unwrap().unwrap();
        let ids: Vec<String> = ledger::list_transactions(&conn, account.id)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["t1".to_string()]);
    }

    #[test]
    fn test_pending_then_posted_is_applied_later() {
        let (_dir, mut conn) = test_db();
        let pending = MockAggregator::default().with_account(
            "acc-1",
            "Everyday",
            0.0,
            vec![ext_txn("t1", "2025-03-09", 5.0, Direction::Debit, ExternalTxnStatus::Pending)],
        );
        sync(&mut conn, &pending, "item-1").unwrap();
        let cleared = MockAggregator::default().with_account("acc-1", "Everyday", 0.0, vec![posted("t1", "2025-03-09", 5.0)]);
        let report = sync(&mut conn, &cleared, "item-1").unwrap();
        assert_eq!(report.inserted, 1);
    }

    #[test]
    fn test_credit_indicator_yields_income() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default().with_account(
            "acc-1",
            "Everyday",
            0.0,
            vec![ext_txn("s1", "2025-03-05", 2500.0, Direction::Credit, ExternalTxnStatus::Posted)],
        );
        sync(&mut conn, &agg, "item-1").unwrap();
        let account = ledger::find_account_by_external_id(&conn, "acc-1").unwrap().unwrap();
        let txns = ledger::list_transactions(&conn, account.id).unwrap();
        assert_eq!(txns[0].amount, 2500.0);
        assert_eq!(txns[0].txn_type, TxnType::Income);
    }

    #[test]
    fn test_transactions_outside_window_are_not_fetched() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default().with_account(
            "acc-1",
            "Everyday",
            0.0,
            vec![posted("old", "2025-02-01", 1.0), posted("new", "2025-03-09", 1.0)],
        );
        let report = sync(&mut conn, &agg, "item-1").unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.inserted, 1);
    }

    #[test]
    fn test_refresh_waits_for_pending_statuses() {
        let agg = MockAggregator::default().with_statuses(&[
            ItemStatus::Updating,
            ItemStatus::Merging,
            ItemStatus::Updated,
        ]);
        let snap = refresh_item(&agg, "item-1", &fast(), &CancelToken::default()).unwrap();
        assert_eq!(snap.status, ItemStatus::Updated);
        assert_eq!(agg.polls.get(), 3);
    }

    #[test]
    fn test_refresh_timeout_is_soft() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default()
            .with_statuses(&[ItemStatus::Updating])
            .with_account("acc-1", "Everyday", 0.0, vec![posted("t1", "2025-03-09", 3.0)]);
        let options = SyncOptions {
            max_wait: Duration::ZERO,
            ..fast()
        };
        let err = refresh_item(&agg, "item-1", &options, &CancelToken::default()).unwrap_err();
        assert!(matches!(err, PennyError::AggregatorTimeout { .. }));

        let report = sync_item(&mut conn, &agg, "item-1", None, &options, &CancelToken::default(), now()).unwrap();
        assert!(report.refresh_timed_out);
        assert_eq!(report.inserted, 1);
    }

    #[test]
    fn test_login_error_marks_connection_error() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default()
            .with_statuses(&[ItemStatus::LoginError])
            .with_account("acc-1", "Everyday", 0.0, vec![posted("t1", "2025-03-09", 3.0)]);
        ledger::ensure_connection(&conn, "item-1").unwrap();
        let err = sync(&mut conn, &agg, "item-1").unwrap_err();
        assert!(matches!(err, PennyError::AggregatorRequestFailed { .. }));
        let c = ledger::find_connection(&conn, "item-1").unwrap().unwrap();
        assert_eq!(c.status, ConnectionStatus::Error);
        assert!(c.last_error.is_some());
        assert_eq!(ledger::count_transactions(&conn).unwrap(), 0);
    }

    #[test]
    fn test_failed_first_sync_records_no_connection() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default().with_statuses(&[ItemStatus::LoginError]);
        assert!(sync(&mut conn, &agg, "item-new").is_err());
        assert!(ledger::find_connection(&conn, "item-new").unwrap().is_none());

        let healthy = MockAggregator::default().with_account("acc-1", "Everyday", 0.0, vec![]);
        sync(&mut conn, &healthy, "item-new").unwrap();
        let c = ledger::find_connection(&conn, "item-new").unwrap().unwrap();
        assert_eq!(c.status, ConnectionStatus::Active);
    }

    #[test]
    fn test_cancelled_sync_writes_nothing() {
        let (_dir, mut conn) = test_db();
        let agg = MockAggregator::default().with_account("acc-1", "Everyday", 0.0, vec![posted("t1", "2025-03-09", 3.0)]);
        let cancel = CancelToken::default();
        cancel.cancel();
        let err = sync_item(&mut conn, &agg, "item-1", None, &fast(), &cancel, now()).unwrap_err();
        assert!(matches!(err, PennyError::Cancelled));
        assert_eq!(ledger::count_transactions(&conn).unwrap(), 0);
        assert!(ledger::find_connection(&conn, "item-1").unwrap().is_none());
    }

    #[test]
    fn test_poll_sleep_stops_at_max_wait() {
        let agg = MockAggregator::default().with_statuses(&[ItemStatus::Updating]);
        let options = SyncOptions {
            window_days: 7,
            poll_interval: Duration::from_secs(30),
            max_wait: Duration::from_millis(50),
        };
        let started = Instant::now();
        let err = refresh_item(&agg, "item-1", &options, &CancelToken::default()).unwrap_err();
        assert!(matches!(err, PennyError::AggregatorTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(agg.polls.get(), 2);
    }

    #[test]
    fn test_window_from_settings_is_at_least_one_day() {
        for days in [0, -3] {
            let settings = Settings {
                sync_window_days: days,
                ..Settings::default()
            };
            assert_eq!(SyncOptions::from_settings(&settings).window_days, 1);
        }
        let settings = Settings {
            sync_window_days: 14,
            ..Settings::default()
        };
        assert_eq!(SyncOptions::from_settings(&settings).window_days, 14);
    }

    #[test]
    fn test_one_failing_item_does_not_stop_the_run() {
        let (_dir, mut conn) = test_db();
        let mut agg = MockAggregator::default().with_account("acc-1", "Everyday", 0.0, vec![posted("t1", "2025-03-09", 3.0)]);
        agg.broken_items.insert("item-bad".to_string());
        ledger::ensure_connection(&conn, "item-bad").unwrap();
        ledger::ensure_connection(&conn, "item-good").unwrap();

        for mode in [SyncMode::Silent, SyncMode::Interactive] {
            let run = sync_all(&mut conn, &agg, mode, &fast(), &CancelToken::default(), now()).unwrap();
            assert_eq!(run.outcomes.len(), 2);
            let failures: Vec<&str> = run.failures().map(|(item, _)| item).collect();
            assert_eq!(failures, vec!["item-bad"]);
            assert_eq!(run.reports().count(), 1);
        }
        assert_eq!(ledger::count_transactions(&conn).unwrap(), 1);
        let bad = ledger::find_connection(&conn, "item-bad").unwrap().unwrap();
        assert_eq!(bad.status, ConnectionStatus::Error);
        let good = ledger::find_connection(&conn, "item-good").unwrap().unwrap();
        assert_eq!(good.status, ConnectionStatus::Active);
    }

    #[test]
    fn test_balance_is_reconciled_on_resync() {
        let (_dir, mut conn) = test_db();
        let first = MockAggregator::default().with_account("acc-1", "Everyday", 100.0, vec![]);
        sync(&mut conn, &first, "item-1").unwrap();
        let second = MockAggregator::default().with_account("acc-1", "Everyday", 80.0, vec![]);
        let report = sync(&mut conn, &second, "item-1").unwrap();
        assert_eq!(report.balances_updated, 1);
        let account = ledger::find_account_by_external_id(&conn, "acc-1").unwrap().unwrap();
        assert_eq!(account.balance, 80.0);
    }
}
