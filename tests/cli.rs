use std::path::Path;

use assert_cmd::Command;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use tempfile::TempDir;

struct Env {
    root: TempDir,
}

impl Env {
    fn new() -> Self {
        let env = Self {
            root: tempfile::tempdir().unwrap(),
        };
        let data_dir = env.root.path().join("data");
        env.penny()
            .args(["init", "--data-dir", data_dir.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized penny"));
        env
    }

    fn penny(&self) -> Command {
        let mut cmd = Command::cargo_bin("penny").unwrap();
        cmd.env("PENNY_CONFIG_DIR", self.root.path().join("config"))
            .env("PENNY_LOG", "off")
            .env("NO_COLOR", "1");
        cmd
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.root.path().join(name)
    }
}

fn write_snapshot(path: &Path) {
    let recent = (Utc::now() - Duration::days(1)).to_rfc3339();
    let json = format!(
        r#"{{
        "items": [{{
            "id": "item-1",
            "status": "UPDATED",
            "connectorName": "Acme Bank",
            "accounts": [{{
                "id": "ext-acc-1",
                "name": "Everyday",
                "type": "BANK",
                "balance": 820.5,
                "transactions": [
                    {{"id": "t1", "date": "{recent}", "description": "Grocer",
                      "amount": 42.1, "type": "DEBIT", "status": "POSTED"}},
                    {{"id": "t2", "date": "{recent}", "merchant": "Employer",
                      "amount": 1000.0, "type": "CREDIT", "status": "POSTED"}},
                    {{"id": "t3", "date": "{recent}", "description": "Hold",
                      "amount": 9.0, "type": "DEBIT", "status": "PENDING"}}
                ]
            }}]
        }}]
    }}"#
    );
    std::fs::write(path, json).unwrap();
}

#[test]
fn test_status_after_init() {
    let env = Env::new();
    env.penny()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Accounts:      0"))
        .stdout(predicate::str::contains("Transactions:  0"));
}

#[test]
fn test_pay_bill_advances_month_end_due_date() {
    let env = Env::new();
    env.penny()
        .args(["accounts", "add", "Checking", "--type", "bank", "--balance", "500"])
        .assert()
        .success();
    env.penny()
        .args([
            "bills", "add", "Rent", "--amount", "50", "--frequency", "monthly", "--start", "2025-01-31",
            "--account", "Checking", "--method", "debit_card",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added bill #1"));
    env.penny()
        .args(["bills", "pay", "1", "--date", "2025-01-30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Next due: 2025-02-28"));
    env.penny()
        .args(["accounts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$450.00"));
}

#[test]
fn test_credit_method_rejected_for_direct_payment() {
    let env = Env::new();
    env.penny()
        .args([
            "bills", "add", "Streaming", "--amount", "15", "--frequency", "monthly", "--start", "2025-03-01",
        ])
        .assert()
        .success();
    env.penny()
        .args(["bills", "pay", "1", "--method", "credit_card"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("credit payments go through installments"));
}

#[test]
fn test_installment_plan_listed() {
    let env = Env::new();
    env.penny()
        .args(["accounts", "add", "Visa", "--type", "credit", "--credit-limit", "1000"])
        .assert()
        .success();
    env.penny()
        .args([
            "installments", "create", "Laptop", "--card", "Visa", "--total", "300", "--count", "3", "--start",
            "2025-01-15",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created 3 installment(s) of $100.00"));
    env.penny()
        .args(["installments", "list", "--card", "Visa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3/3"))
        .stdout(predicate::str::contains("2025-03-15"));
    env.penny()
        .args(["installments", "pay", "1", "--date", "2025-01-20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Paid installment #1 (-$100.00)"));
}

#[test]
fn test_snapshot_sync_is_idempotent() {
    let env = Env::new();
    let snapshot = env.path("snapshot.json");
    write_snapshot(&snapshot);

    for _ in 0..2 {
        env.penny()
            .args(["sync", "--snapshot", snapshot.to_str().unwrap()])
            .assert()
            .success();
        env.penny()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Accounts:      1"))
            .stdout(predicate::str::contains("Transactions:  2"));
    }
}

#[test]
fn test_interactive_sync_reports_failed_item() {
    let env = Env::new();
    let snapshot = env.path("snapshot.json");
    write_snapshot(&snapshot);
    env.penny()
        .args(["sync", "--snapshot", snapshot.to_str().unwrap(), "--item", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 item(s) failed to sync"));
    env.penny()
        .args(["sync", "--snapshot", snapshot.to_str().unwrap(), "--item", "missing", "--silent"])
        .assert()
        .success();
}
