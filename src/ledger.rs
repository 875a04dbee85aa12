//! Persistence boundary for the engine.
//!
//! Every write that touches shared state (balances, credit limits, the
//! applied-id set) is a single SQL statement so concurrent writers cannot lose
//! updates. Callers that need several writes to land together pass a
//! `rusqlite::Transaction`, which derefs to `Connection`.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{PennyError, Result};
use crate::models::{
    Account, AccountType, BankConnection, CategoryKind, ConnectionStatus, CreditInstallment,
    Frequency, PaymentMethod, RecurringBill, Transaction,
};

pub fn new_txn_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

const ACCOUNT_COLS: &str =
    "id, name, account_type, balance, institution, connection_id, external_id, credit_limit";

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_type: row.get(2)?,
        balance: row.get(3)?,
        institution: row.get(4)?,
        connection_id: row.get(5)?,
        external_id: row.get(6)?,
        credit_limit: row.get(7)?,
    })
}

pub struct NewAccount<'a> {
    pub name: &'a str,
    pub account_type: AccountType,
    pub balance: f64,
    pub institution: Option<&'a str>,
    pub connection_id: Option<i64>,
    pub external_id: Option<&'a str>,
    pub credit_limit: Option<f64>,
}

pub fn insert_account(conn: &Connection, account: &NewAccount) -> Result<i64> {
    conn.execute(
        "INSERT INTO accounts (name, account_type, balance, institution, connection_id, external_id, credit_limit) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            account.name,
            account.account_type,
            account.balance,
            account.institution,
            account.connection_id,
            account.external_id,
            account.credit_limit,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_account(conn: &Connection, id: i64) -> Result<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE id = ?1"),
        [id],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| PennyError::UnknownAccount(id.to_string()))
}

pub fn find_account_by_name(conn: &Connection, name: &str) -> Result<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE name = ?1 ORDER BY id LIMIT 1"),
        [name],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| PennyError::UnknownAccount(name.to_string()))
}

pub fn find_account_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<Account>> {
    Ok(conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE external_id = ?1"),
            [external_id],
            account_from_row,
        )
        .optional()?)
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!("SELECT {ACCOUNT_COLS} FROM accounts ORDER BY id"))?;
    let rows = stmt
        .query_map([], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Accounts with no aggregator mapping yet, candidates for reconciliation.
pub fn list_unmapped_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLS} FROM accounts WHERE external_id IS NULL ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn adjust_balance(conn: &Connection, account_id: i64, delta: f64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE accounts SET balance = balance + ?1 WHERE id = ?2",
        params![delta, account_id],
    )?;
    if changed == 0 {
        return Err(PennyError::UnknownAccount(account_id.to_string()));
    }
    Ok(())
}

pub fn adjust_credit_limit(conn: &Connection, account_id: i64, delta: f64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE accounts SET credit_limit = COALESCE(credit_limit, 0) + ?1 WHERE id = ?2",
        params![delta, account_id],
    )?;
    if changed == 0 {
        return Err(PennyError::UnknownAccount(account_id.to_string()));
    }
    Ok(())
}

/// Field updates the account mapper applies to a matched account.
#[derive(Debug, Default)]
pub struct AccountPatch<'a> {
    pub balance: Option<f64>,
    pub institution: Option<&'a str>,
    pub connection_id: Option<i64>,
    pub external_id: Option<&'a str>,
}

pub fn patch_account(conn: &Connection, account_id: i64, patch: &AccountPatch) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET \
            balance = COALESCE(?1, balance), \
            institution = COALESCE(?2, institution), \
            connection_id = COALESCE(connection_id, ?3), \
            external_id = COALESCE(?4, external_id) \
         WHERE id = ?5",
        params![
            patch.balance,
            patch.institution,
            patch.connection_id,
            patch.external_id,
            account_id,
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        title: row.get(2)?,
        amount: row.get(3)?,
        date: row.get(4)?,
        txn_type: row.get(5)?,
        category: row.get(6)?,
        source: row.get(7)?,
    })
}

pub fn insert_transaction(conn: &Connection, txn: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (id, account_id, title, amount, date, txn_type, category, source) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            txn.id,
            txn.account_id,
            txn.title,
            txn.amount,
            txn.date,
            txn.txn_type,
            txn.category,
            txn.source,
        ],
    )?;
    Ok(())
}

/// Insert keyed by id; an existing row with the same id is left untouched.
/// Returns whether a row was written.
pub fn upsert_transaction(conn: &Connection, txn: &Transaction) -> Result<bool> {
    let changed = conn.execute(
        "INSERT INTO transactions (id, account_id, title, amount, date, txn_type, category, source) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT(id) DO NOTHING",
        params![
            txn.id,
            txn.account_id,
            txn.title,
            txn.amount,
            txn.date,
            txn.txn_type,
            txn.category,
            txn.source,
        ],
    )?;
    Ok(changed == 1)
}

pub fn list_transactions(conn: &Connection, account_id: i64) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, title, amount, date, txn_type, category, source \
         FROM transactions WHERE account_id = ?1 ORDER BY date, id",
    )?;
    let rows = stmt
        .query_map([account_id], transaction_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_transactions(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?)
}

// ---------------------------------------------------------------------------
// Connections and the applied-id watermark
// ---------------------------------------------------------------------------

const CONNECTION_COLS: &str =
    "id, item_id, institution, status, last_synced_at, last_transaction_date, last_error";

fn connection_from_row(row: &Row) -> rusqlite::Result<BankConnection> {
    Ok(BankConnection {
        id: row.get(0)?,
        item_id: row.get(1)?,
        institution: row.get(2)?,
        status: row.get(3)?,
        last_synced_at: row.get(4)?,
        last_transaction_date: row.get(5)?,
        last_error: row.get(6)?,
    })
}

pub fn find_connection(conn: &Connection, item_id: &str) -> Result<Option<BankConnection>> {
    Ok(conn
        .query_row(
            &format!("SELECT {CONNECTION_COLS} FROM connections WHERE item_id = ?1"),
            [item_id],
            connection_from_row,
        )
        .optional()?)
}

pub fn list_connections(conn: &Connection) -> Result<Vec<BankConnection>> {
    let mut stmt = conn.prepare(&format!("SELECT {CONNECTION_COLS} FROM connections ORDER BY id"))?;
    let rows = stmt
        .query_map([], connection_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Find the connection for `item_id`, creating it in `pending` state on first sight.
pub fn ensure_connection(conn: &Connection, item_id: &str) -> Result<BankConnection> {
    conn.execute(
        "INSERT INTO connections (item_id, status) VALUES (?1, ?2) ON CONFLICT(item_id) DO NOTHING",
        params![item_id, ConnectionStatus::Pending],
    )?;
    find_connection(conn, item_id)?
        .ok_or_else(|| PennyError::Validation(format!("connection {item_id} vanished after insert")))
}

pub fn set_connection_institution(conn: &Connection, connection_id: i64, institution: &str) -> Result<()> {
    conn.execute(
        "UPDATE connections SET institution = ?1 WHERE id = ?2",
        params![institution, connection_id],
    )?;
    Ok(())
}

pub fn record_sync_success(conn: &Connection, connection_id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE connections SET status = ?1, last_synced_at = ?2, last_error = NULL WHERE id = ?3",
        params![ConnectionStatus::Active, now, connection_id],
    )?;
    Ok(())
}

pub fn record_sync_error(
    conn: &Connection,
    connection_id: i64,
    now: DateTime<Utc>,
    message: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE connections SET status = ?1, last_synced_at = ?2, last_error = ?3 WHERE id = ?4",
        params![ConnectionStatus::Error, now, message, connection_id],
    )?;
    Ok(())
}

/// Move the processed-date watermark forward; never moves it back.
pub fn advance_transaction_watermark(conn: &Connection, connection_id: i64, date: NaiveDate) -> Result<()> {
    conn.execute(
        "UPDATE connections SET last_transaction_date = ?1 \
         WHERE id = ?2 AND (last_transaction_date IS NULL OR last_transaction_date < ?1)",
        params![date, connection_id],
    )?;
    Ok(())
}

/// Atomic check-and-insert into the connection's applied-id set.
/// Returns `true` the first time an id is seen.
pub fn mark_applied(conn: &Connection, connection_id: i64, external_id: &str) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO applied_external_ids (connection_id, external_id) VALUES (?1, ?2)",
        params![connection_id, external_id],
    )?;
    Ok(changed == 1)
}

// ---------------------------------------------------------------------------
// Recurring bills
// ---------------------------------------------------------------------------

const BILL_COLS: &str = "id, title, amount, frequency, next_due_date, start_date, account_id, \
     category, payment_method, last_paid_cycle_due_date, version";

fn bill_from_row(row: &Row) -> rusqlite::Result<RecurringBill> {
    Ok(RecurringBill {
        id: row.get(0)?,
        title: row.get(1)?,
        amount: row.get(2)?,
        frequency: row.get(3)?,
        next_due_date: row.get(4)?,
        start_date: row.get(5)?,
        account_id: row.get(6)?,
        category: row.get(7)?,
        payment_method: row.get(8)?,
        last_paid_cycle_due_date: row.get(9)?,
        version: row.get(10)?,
    })
}

pub struct NewBill<'a> {
    pub title: &'a str,
    pub amount: f64,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub next_due_date: Option<NaiveDate>,
    pub account_id: Option<i64>,
    pub category: Option<CategoryKind>,
    pub payment_method: Option<PaymentMethod>,
}

pub fn insert_bill(conn: &Connection, bill: &NewBill) -> Result<i64> {
    conn.execute(
        "INSERT INTO recurring_bills \
            (title, amount, frequency, next_due_date, start_date, account_id, category, payment_method) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            bill.title,
            bill.amount,
            bill.frequency,
            bill.next_due_date,
            bill.start_date,
            bill.account_id,
            bill.category,
            bill.payment_method,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_bill(conn: &Connection, bill_id: i64) -> Result<RecurringBill> {
    conn.query_row(
        &format!("SELECT {BILL_COLS} FROM recurring_bills WHERE id = ?1"),
        [bill_id],
        bill_from_row,
    )
    .optional()?
    .ok_or(PennyError::UnknownBill(bill_id))
}

pub fn list_bills(conn: &Connection) -> Result<Vec<RecurringBill>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BILL_COLS} FROM recurring_bills ORDER BY next_due_date IS NULL, next_due_date, id"
    ))?;
    let rows = stmt
        .query_map([], bill_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Linked credit bill for an installment that was not created from one.
pub fn find_credit_bill(conn: &Connection, account_id: i64, title: &str) -> Result<Option<RecurringBill>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {BILL_COLS} FROM recurring_bills \
                 WHERE account_id = ?1 AND title = ?2 AND payment_method = ?3 ORDER BY id LIMIT 1"
            ),
            params![account_id, title, PaymentMethod::CreditCard],
            bill_from_row,
        )
        .optional()?)
}

pub struct BillCycleUpdate {
    pub next_due_date: NaiveDate,
    pub account_id: Option<i64>,
    pub payment_method: PaymentMethod,
    pub last_paid_cycle_due_date: NaiveDate,
}

/// Advance a bill's cycle with an optimistic version check.
pub fn update_bill_cycle(
    conn: &Connection,
    bill: &RecurringBill,
    update: &BillCycleUpdate,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE recurring_bills SET \
            next_due_date = ?1, \
            account_id = ?2, \
            payment_method = ?3, \
            last_paid_cycle_due_date = ?4, \
            version = version + 1 \
         WHERE id = ?5 AND version = ?6",
        params![
            update.next_due_date,
            update.account_id,
            update.payment_method,
            update.last_paid_cycle_due_date,
            bill.id,
            bill.version,
        ],
    )?;
    if changed == 0 {
        return Err(PennyError::StaleBill(bill.id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Credit installments
// ---------------------------------------------------------------------------

const INSTALLMENT_COLS: &str = "id, account_id, title, amount, installment_number, \
     total_installments, due_date, paid, paid_date, bill_id";

fn installment_from_row(row: &Row) -> rusqlite::Result<CreditInstallment> {
    Ok(CreditInstallment {
        id: row.get(0)?,
        account_id: row.get(1)?,
        title: row.get(2)?,
        amount: row.get(3)?,
        installment_number: row.get(4)?,
        total_installments: row.get(5)?,
        due_date: row.get(6)?,
        paid: row.get(7)?,
        paid_date: row.get(8)?,
        bill_id: row.get(9)?,
    })
}

pub struct NewInstallment<'a> {
    pub account_id: i64,
    pub title: &'a str,
    pub amount: f64,
    pub installment_number: i64,
    pub total_installments: i64,
    pub due_date: NaiveDate,
    pub bill_id: Option<i64>,
    pub cycle_key: Option<&'a str>,
}

/// Returns the new row id, or `None` when the installment's cycle slot is taken.
pub fn insert_installment(conn: &Connection, inst: &NewInstallment) -> Result<Option<i64>> {
    let changed = conn.execute(
        "INSERT INTO credit_installments \
            (account_id, title, amount, installment_number, total_installments, due_date, bill_id, cycle_key) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT DO NOTHING",
        params![
            inst.account_id,
            inst.title,
            inst.amount,
            inst.installment_number,
            inst.total_installments,
            inst.due_date,
            inst.bill_id,
            inst.cycle_key,
        ],
    )?;
    Ok((changed == 1).then(|| conn.last_insert_rowid()))
}

pub fn get_installment(conn: &Connection, id: i64) -> Result<CreditInstallment> {
    conn.query_row(
        &format!("SELECT {INSTALLMENT_COLS} FROM credit_installments WHERE id = ?1"),
        [id],
        installment_from_row,
    )
    .optional()?
    .ok_or(PennyError::UnknownInstallment(id))
}

/// Any installment for (card, title) due within the given `YYYY-MM` month.
pub fn find_installment_in_month(
    conn: &Connection,
    account_id: i64,
    title: &str,
    month: &str,
) -> Result<Option<CreditInstallment>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {INSTALLMENT_COLS} FROM credit_installments \
                 WHERE account_id = ?1 AND title = ?2 AND substr(due_date, 1, 7) = ?3 \
                 ORDER BY paid, id LIMIT 1"
            ),
            params![account_id, title, month],
            installment_from_row,
        )
        .optional()?)
}

/// The installment holding a card-payment cycle slot (`cycle_key`), if any.
pub fn find_installment_by_cycle(
    conn: &Connection,
    account_id: i64,
    title: &str,
    cycle_key: &str,
) -> Result<Option<CreditInstallment>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {INSTALLMENT_COLS} FROM credit_installments \
                 WHERE account_id = ?1 AND title = ?2 AND cycle_key = ?3 AND bill_id IS NULL"
            ),
            params![account_id, title, cycle_key],
            installment_from_row,
        )
        .optional()?)
}

/// The installment generated for one cycle of a bill.
pub fn find_bill_installment(
    conn: &Connection,
    bill_id: i64,
    due_date: NaiveDate,
) -> Result<Option<CreditInstallment>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {INSTALLMENT_COLS} FROM credit_installments \
                 WHERE bill_id = ?1 AND cycle_key = ?2"
            ),
            params![bill_id, due_date.to_string()],
            installment_from_row,
        )
        .optional()?)
}

pub fn earliest_unpaid_installment(
    conn: &Connection,
    account_id: i64,
    title: &str,
) -> Result<Option<CreditInstallment>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {INSTALLMENT_COLS} FROM credit_installments \
                 WHERE account_id = ?1 AND title = ?2 AND paid = 0 \
                 ORDER BY due_date, installment_number, id LIMIT 1"
            ),
            params![account_id, title],
            installment_from_row,
        )
        .optional()?)
}

pub fn list_installments(conn: &Connection, account_id: Option<i64>) -> Result<Vec<CreditInstallment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INSTALLMENT_COLS} FROM credit_installments \
         WHERE ?1 IS NULL OR account_id = ?1 ORDER BY due_date, id"
    ))?;
    let rows = stmt
        .query_map([account_id], installment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Flip an installment to paid. Returns `false` if it already was.
pub fn mark_installment_paid(conn: &Connection, id: i64, paid_date: NaiveDate) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE credit_installments SET paid = 1, paid_date = ?1 WHERE id = ?2 AND paid = 0",
        params![paid_date, id],
    )?;
    Ok(changed == 1)
}
