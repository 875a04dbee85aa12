pub mod accounts;
pub mod bills;
pub mod init;
pub mod installments;
pub mod status;
pub mod sync;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::models::{AccountType, CategoryKind, Frequency, PaymentMethod};

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| format!("expected YYYY-MM-DD, got '{raw}'"))
}

fn parse_frequency(raw: &str) -> Result<Frequency, String> {
    Frequency::from_key(raw).ok_or_else(|| "expected weekly, monthly or yearly".to_string())
}

fn parse_method(raw: &str) -> Result<PaymentMethod, String> {
    PaymentMethod::from_key(raw)
        .ok_or_else(|| "expected cash, debit_card, bank_transfer, direct_debit or credit_card".to_string())
}

fn parse_account_type(raw: &str) -> Result<AccountType, String> {
    AccountType::from_key(raw).ok_or_else(|| "expected bank, credit, cash, e_wallet or investment".to_string())
}

fn parse_category(raw: &str) -> Result<CategoryKind, String> {
    CategoryKind::from_key(raw).ok_or_else(|| format!("unknown category '{raw}'"))
}

#[derive(Parser)]
#[command(name = "penny", about = "Bank sync, recurring bills and card installments for a personal ledger.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for penny data (default: ~/.local/share/penny)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Pull recent transactions and balances from the aggregator.
    Sync {
        /// Sync only this aggregator item id
        #[arg(long)]
        item: Option<String>,
        /// Read aggregator data from a JSON snapshot instead of the API
        #[arg(long)]
        snapshot: Option<String>,
        /// Log failures instead of reporting them (background mode)
        #[arg(long)]
        silent: bool,
    },
    /// Manage recurring bills.
    Bills {
        #[command(subcommand)]
        command: BillsCommands,
    },
    /// Manage credit card installments.
    Installments {
        #[command(subcommand)]
        command: InstallmentsCommands,
    },
    /// Show database location and summary counts.
    Status,
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Everyday Checking'
        name: String,
        /// Account type: bank, credit, cash, e_wallet, investment
        #[arg(long = "type", value_parser = parse_account_type)]
        account_type: AccountType,
        /// Institution name
        #[arg(long)]
        institution: Option<String>,
        /// Opening balance
        #[arg(long, default_value_t = 0.0)]
        balance: f64,
        /// Available credit (credit accounts)
        #[arg(long = "credit-limit")]
        credit_limit: Option<f64>,
    },
    /// List all accounts.
    List,
}

#[derive(Subcommand)]
pub enum BillsCommands {
    /// Add a recurring bill.
    Add {
        title: String,
        #[arg(long)]
        amount: f64,
        /// weekly, monthly or yearly
        #[arg(long, value_parser = parse_frequency)]
        frequency: Frequency,
        /// First due date: YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,
        /// Funding account name
        #[arg(long)]
        account: Option<String>,
        /// Payment method key
        #[arg(long, value_parser = parse_method)]
        method: Option<PaymentMethod>,
        /// Category key, e.g. utilities
        #[arg(long, value_parser = parse_category)]
        category: Option<CategoryKind>,
    },
    /// List bills with their current status.
    List,
    /// Record a non-credit payment for a bill.
    Pay {
        id: i64,
        /// Funding account name (defaults to the bill's account)
        #[arg(long)]
        account: Option<String>,
        /// Payment method key (defaults to the bill's method)
        #[arg(long, value_parser = parse_method)]
        method: Option<PaymentMethod>,
        /// Payment date: YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Create the current cycle's installment for a credit card bill.
    Process { id: i64 },
}

#[derive(Subcommand)]
pub enum InstallmentsCommands {
    /// Split a card purchase into monthly installments.
    Create {
        title: String,
        /// Card account name
        #[arg(long)]
        card: String,
        #[arg(long)]
        total: f64,
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// First due date: YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,
    },
    /// List installments.
    List {
        /// Card account name
        #[arg(long)]
        card: Option<String>,
    },
    /// Pay one installment by id.
    Pay {
        id: i64,
        /// Payment date: YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Pay the current installment of a credit card bill.
    PayBill {
        bill: i64,
        /// Payment date: YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}
