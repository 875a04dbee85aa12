//! Client side of the account aggregator.
//!
//! The engine only talks to the [`Aggregator`] trait. [`HttpAggregator`] speaks
//! the aggregator's REST API; [`SnapshotAggregator`] serves a JSON dump of the
//! same shapes for offline runs.

use std::path::Path;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{PennyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Updating,
    Merging,
    WaitingUserInput,
    Updated,
    Outdated,
    LoginError,
    Error,
}

impl ItemStatus {
    /// The aggregator is still working on the item.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Updating | Self::Merging | Self::WaitingUserInput)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::LoginError | Self::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub id: String,
    pub status: ItemStatus,
    #[serde(default)]
    pub connector_name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalAccountKind {
    Bank,
    Credit,
    Investment,
    Wallet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAccount {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ExternalAccountKind,
    pub balance: f64,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub available_credit_limit: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalTxnStatus {
    Pending,
    Posted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTransaction {
    pub id: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub status: ExternalTxnStatus,
}

impl ExternalTransaction {
    /// Amount with the sign taken from the debit/credit indicator.
    pub fn signed_amount(&self) -> f64 {
        match self.direction {
            Direction::Debit => -self.amount.abs(),
            Direction::Credit => self.amount.abs(),
        }
    }

    pub fn title(&self) -> String {
        [&self.description, &self.merchant]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("Bank transaction")
            .to_string()
    }
}

pub trait Aggregator {
    fn get_item_status(&self, item_id: &str) -> Result<ItemSnapshot>;

    fn list_accounts(&self, item_id: &str) -> Result<Vec<ExternalAccount>>;

    fn list_transactions(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalTransaction>>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpAggregatorConfig {
    pub base_url: String,
    pub api_key: String,
}

impl HttpAggregatorConfig {
    /// Reads the key from `PENNY_AGGREGATOR_API_KEY`.
    pub fn from_env(base_url: &str) -> Result<Self> {
        let api_key = std::env::var("PENNY_AGGREGATOR_API_KEY").map_err(|_| {
            PennyError::Settings("PENNY_AGGREGATOR_API_KEY is not set".to_string())
        })?;
        Ok(Self {
            base_url: base_url.to_string(),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    results: Vec<T>,
    #[serde(default)]
    total_pages: Option<u32>,
}

pub struct HttpAggregator {
    http: Client,
    base_url: Url,
}

impl HttpAggregator {
    pub fn new(config: HttpAggregatorConfig) -> Result<Self> {
        // Endpoints are joined relative to the base, which needs a trailing slash
        // to keep its last path segment.
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|e| PennyError::Settings(format!("invalid aggregator URL: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| PennyError::Settings("API key is not a valid header value".to_string()))?;
        headers.insert("x-api-key", key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PennyError::Settings(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base_url })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        subject: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let failed = |reason: String| PennyError::AggregatorRequestFailed {
            item_id: subject.to_string(),
            reason,
        };
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|e| failed(format!("bad endpoint {path}: {e}")))?;
        tracing::debug!(%endpoint, "aggregator request");
        self.http
            .get(endpoint.clone())
            .query(query)
            .send()
            .map_err(|e| failed(format!("GET {endpoint} failed: {e}")))?
            .error_for_status()
            .map_err(|e| failed(format!("GET {endpoint} returned {e}")))?
            .json()
            .map_err(|e| failed(format!("unreadable response from {endpoint}: {e}")))
    }
}

impl Aggregator for HttpAggregator {
    fn get_item_status(&self, item_id: &str) -> Result<ItemSnapshot> {
        self.get_json(item_id, &format!("items/{item_id}"), &[])
    }

    fn list_accounts(&self, item_id: &str) -> Result<Vec<ExternalAccount>> {
        let page: Page<ExternalAccount> =
            self.get_json(item_id, "accounts", &[("itemId", item_id.to_string())])?;
        Ok(page.results)
    }

    fn list_transactions(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalTransaction>> {
        let mut out = Vec::new();
        let mut page_no = 1u32;
        loop {
            let page: Page<ExternalTransaction> = self.get_json(
                account_id,
                "transactions",
                &[
                    ("accountId", account_id.to_string()),
                    ("from", from.to_rfc3339()),
                    ("to", to.to_rfc3339()),
                    ("page", page_no.to_string()),
                ],
            )?;
            out.extend(page.results);
            match page.total_pages {
                Some(total) if page_no < total => page_no += 1,
                _ => break,
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// JSON snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub items: Vec<SnapshotItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotItem {
    #[serde(flatten)]
    pub item: ItemSnapshot,
    #[serde(default)]
    pub accounts: Vec<SnapshotAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAccount {
    #[serde(flatten)]
    pub account: ExternalAccount,
    #[serde(default)]
    pub transactions: Vec<ExternalTransaction>,
}

pub struct SnapshotAggregator {
    snapshot: Snapshot,
}

impl SnapshotAggregator {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&content)?))
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.snapshot.items.iter().map(|i| i.item.id.clone()).collect()
    }

    fn item(&self, item_id: &str) -> Result<&SnapshotItem> {
        self.snapshot
            .items
            .iter()
            .find(|i| i.item.id == item_id)
            .ok_or_else(|| PennyError::AggregatorRequestFailed {
                item_id: item_id.to_string(),
                reason: "item not found in snapshot".to_string(),
            })
    }
}

impl Aggregator for SnapshotAggregator {
    fn get_item_status(&self, item_id: &str) -> Result<ItemSnapshot> {
        Ok(self.item(item_id)?.item.clone())
    }

    fn list_accounts(&self, item_id: &str) -> Result<Vec<ExternalAccount>> {
        let item = self.item(item_id)?;
        Ok(item.accounts.iter().map(|a| a.account.clone()).collect())
    }

    fn list_transactions(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalTransaction>> {
        let txns = self
            .snapshot
            .items
            .iter()
            .flat_map(|i| i.accounts.iter())
            .filter(|a| a.account.id == account_id)
            .flat_map(|a| a.transactions.iter())
            .filter(|t| t.date >= from && t.date <= to)
            .cloned()
            .collect();
        Ok(txns)
    }
}
