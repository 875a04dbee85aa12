use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// Implements SQLite text conversion for a closed enum via its `key()`/`from_key()` pair.
macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.key()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::from_key(raw).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {} '{raw}'", stringify!($ty)).into())
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Accounts and connections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Bank,
    Credit,
    Cash,
    EWallet,
    Investment,
}

impl AccountType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Credit => "credit",
            Self::Cash => "cash",
            Self::EWallet => "e_wallet",
            Self::Investment => "investment",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "bank" => Some(Self::Bank),
            "credit" => Some(Self::Credit),
            "cash" => Some(Self::Cash),
            "e_wallet" | "e-wallet" => Some(Self::EWallet),
            "investment" => Some(Self::Investment),
            _ => None,
        }
    }
}

sql_text_enum!(AccountType);

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: AccountType,
    pub balance: f64,
    pub institution: Option<String>,
    pub connection_id: Option<i64>,
    /// Aggregator account id this account is explicitly mapped to.
    pub external_id: Option<String>,
    /// Available credit, credit accounts only.
    pub credit_limit: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Pending,
    Active,
    Error,
}

impl ConnectionStatus {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Error => "error",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

sql_text_enum!(ConnectionStatus);

/// One linked item at the aggregator.
#[derive(Debug, Clone)]
pub struct BankConnection {
    pub id: i64,
    pub item_id: String,
    pub institution: Option<String>,
    pub status: ConnectionStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_transaction_date: Option<NaiveDate>,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnType {
    Income,
    Expense,
}

impl TxnType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn for_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Expense
        } else {
            Self::Income
        }
    }
}

sql_text_enum!(TxnType);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnSource {
    Manual,
    Sync,
    Bill,
    Installment,
}

impl TxnSource {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Sync => "sync",
            Self::Bill => "bill",
            Self::Installment => "installment",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "manual" => Some(Self::Manual),
            "sync" => Some(Self::Sync),
            "bill" => Some(Self::Bill),
            "installment" => Some(Self::Installment),
            _ => None,
        }
    }
}

sql_text_enum!(TxnSource);

#[derive(Debug, Clone)]
pub struct Transaction {
    /// External transaction id for synced rows, a generated UUID otherwise.
    pub id: String,
    pub account_id: i64,
    pub title: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub txn_type: TxnType,
    pub category: Option<CategoryKind>,
    pub source: TxnSource,
}

// ---------------------------------------------------------------------------
// Categories: a closed set with a compile-time label/icon table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Housing,
    Utilities,
    Groceries,
    Transport,
    Health,
    Education,
    Entertainment,
    Subscriptions,
    Insurance,
    Salary,
    Transfer,
    Other,
}

pub const ALL_CATEGORIES: &[CategoryKind] = &[
    CategoryKind::Housing,
    CategoryKind::Utilities,
    CategoryKind::Groceries,
    CategoryKind::Transport,
    CategoryKind::Health,
    CategoryKind::Education,
    CategoryKind::Entertainment,
    CategoryKind::Subscriptions,
    CategoryKind::Insurance,
    CategoryKind::Salary,
    CategoryKind::Transfer,
    CategoryKind::Other,
];

impl CategoryKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Housing => "housing",
            Self::Utilities => "utilities",
            Self::Groceries => "groceries",
            Self::Transport => "transport",
            Self::Health => "health",
            Self::Education => "education",
            Self::Entertainment => "entertainment",
            Self::Subscriptions => "subscriptions",
            Self::Insurance => "insurance",
            Self::Salary => "salary",
            Self::Transfer => "transfer",
            Self::Other => "other",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        ALL_CATEGORIES.iter().find(|c| c.key() == key).copied()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Housing => "Housing",
            Self::Utilities => "Utilities",
            Self::Groceries => "Groceries",
            Self::Transport => "Transport",
            Self::Health => "Health",
            Self::Education => "Education",
            Self::Entertainment => "Entertainment",
            Self::Subscriptions => "Subscriptions",
            Self::Insurance => "Insurance",
            Self::Salary => "Salary",
            Self::Transfer => "Transfer",
            Self::Other => "Other",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Housing => "home",
            Self::Utilities => "zap",
            Self::Groceries => "shopping-cart",
            Self::Transport => "car",
            Self::Health => "heart-pulse",
            Self::Education => "graduation-cap",
            Self::Entertainment => "clapperboard",
            Self::Subscriptions => "repeat",
            Self::Insurance => "shield",
            Self::Salary => "wallet",
            Self::Transfer => "arrow-left-right",
            Self::Other => "circle",
        }
    }
}

sql_text_enum!(CategoryKind);

// ---------------------------------------------------------------------------
// Recurring bills
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

sql_text_enum!(Frequency);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    BankTransfer,
    DirectDebit,
    CreditCard,
}

impl PaymentMethod {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::DebitCard => "debit_card",
            Self::BankTransfer => "bank_transfer",
            Self::DirectDebit => "direct_debit",
            Self::CreditCard => "credit_card",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "cash" => Some(Self::Cash),
            "debit_card" => Some(Self::DebitCard),
            "bank_transfer" => Some(Self::BankTransfer),
            "direct_debit" => Some(Self::DirectDebit),
            "credit_card" => Some(Self::CreditCard),
            _ => None,
        }
    }

    pub fn requires_account(&self) -> bool {
        !matches!(self, Self::Cash)
    }

    pub fn is_credit(&self) -> bool {
        matches!(self, Self::CreditCard)
    }
}

sql_text_enum!(PaymentMethod);

#[derive(Debug, Clone)]
pub struct RecurringBill {
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub next_due_date: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub account_id: Option<i64>,
    pub category: Option<CategoryKind>,
    pub payment_method: Option<PaymentMethod>,
    /// Due date the bill pointed at right after its last recorded payment.
    pub last_paid_cycle_due_date: Option<NaiveDate>,
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillStatus {
    Paid,
    Pending,
    Overdue,
}

impl BillStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::Pending => "Pending",
            Self::Overdue => "Overdue",
        }
    }
}

// ---------------------------------------------------------------------------
// Credit installments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CreditInstallment {
    pub id: i64,
    pub account_id: i64,
    pub title: String,
    pub amount: f64,
    pub installment_number: i64,
    pub total_installments: i64,
    pub due_date: NaiveDate,
    pub paid: bool,
    pub paid_date: Option<NaiveDate>,
    pub bill_id: Option<i64>,
}
