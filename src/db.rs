use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS connections (
    id INTEGER PRIMARY KEY,
    item_id TEXT NOT NULL UNIQUE,
    institution TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    last_synced_at TEXT,
    last_transaction_date TEXT,
    last_error TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    account_type TEXT NOT NULL,
    balance REAL NOT NULL DEFAULT 0,
    institution TEXT,
    connection_id INTEGER,
    external_id TEXT UNIQUE,
    credit_limit REAL,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (connection_id) REFERENCES connections(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    account_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    amount REAL NOT NULL,
    date TEXT NOT NULL,
    txn_type TEXT NOT NULL,
    category TEXT,
    source TEXT NOT NULL DEFAULT 'manual',
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS applied_external_ids (
    connection_id INTEGER NOT NULL,
    external_id TEXT NOT NULL,
    applied_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (connection_id, external_id),
    FOREIGN KEY (connection_id) REFERENCES connections(id)
);

CREATE TABLE IF NOT EXISTS recurring_bills (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    amount REAL NOT NULL,
    frequency TEXT NOT NULL,
    next_due_date TEXT,
    start_date TEXT NOT NULL,
    account_id INTEGER,
    category TEXT,
    payment_method TEXT,
    last_paid_cycle_due_date TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS credit_installments (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    amount REAL NOT NULL,
    installment_number INTEGER NOT NULL,
    total_installments INTEGER NOT NULL,
    due_date TEXT NOT NULL,
    paid INTEGER NOT NULL DEFAULT 0,
    paid_date TEXT,
    bill_id INTEGER,
    cycle_key TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (bill_id) REFERENCES recurring_bills(id)
);

-- cycle_key is YYYY-MM for card payments and the exact due date for bill cycles.
CREATE UNIQUE INDEX IF NOT EXISTS idx_installments_cycle
    ON credit_installments (account_id, title, cycle_key) WHERE bill_id IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_installments_bill_cycle
    ON credit_installments (bill_id, cycle_key) WHERE bill_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_transactions_account_date
    ON transactions (account_id, date);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &[
            "connections",
            "accounts",
            "transactions",
            "applied_external_ids",
            "recurring_bills",
            "credit_installments",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_cycle_index_allows_untagged_duplicates() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO accounts (name, account_type) VALUES ('Card', 'credit')", []).unwrap();
        let insert = "INSERT INTO credit_installments \
            (account_id, title, amount, installment_number, total_installments, due_date, cycle_key) \
            VALUES (1, 'TV', 10.0, 1, 1, '2025-01-15', ?1)";
        conn.execute(insert, [Option::<String>::None]).unwrap();
        conn.execute(insert, [Option::<String>::None]).unwrap();
        conn.execute(insert, [Some("2025-01")]).unwrap();
        assert!(conn.execute(insert, [Some("2025-01")]).is_err());
    }

    #[test]
    fn test_bill_cycle_index_is_per_due_date() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO accounts (name, account_type) VALUES ('Card', 'credit')", []).unwrap();
        conn.execute(
            "INSERT INTO recurring_bills (title, amount, frequency, start_date) VALUES ('Gym', 10.0, 'weekly', '2025-06-02')",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO credit_installments \
            (account_id, title, amount, installment_number, total_installments, due_date, bill_id, cycle_key) \
            VALUES (1, 'Gym', 10.0, 1, 1, ?1, 1, ?1)";
        conn.execute(insert, ["2025-06-02"]).unwrap();
        conn.execute(insert, ["2025-06-09"]).unwrap();
        assert!(conn.execute(insert, ["2025-06-09"]).is_err());
    }
}
