use rusqlite::Connection;

use crate::aggregator::{ExternalAccount, ExternalAccountKind};
use crate::error::Result;
use crate::ledger::{self, AccountPatch, NewAccount};
use crate::models::{Account, AccountType, BankConnection};

const BALANCE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Mapped,
    ByName,
    ByInstitution,
    Created,
}

#[derive(Debug, Clone)]
pub struct MappedAccount {
    pub account_id: i64,
    pub matched: MatchKind,
    pub balance_updated: bool,
}

pub fn account_type_for(kind: ExternalAccountKind) -> AccountType {
    match kind {
        ExternalAccountKind::Bank => AccountType::Bank,
        ExternalAccountKind::Credit => AccountType::Credit,
        ExternalAccountKind::Investment => AccountType::Investment,
        ExternalAccountKind::Wallet => AccountType::EWallet,
    }
}

pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve an aggregator account to an internal one, creating it when no
/// unambiguous match exists.
pub fn map_account(
    conn: &Connection,
    connection: &BankConnection,
    external: &ExternalAccount,
) -> Result<MappedAccount> {
    let institution = external
        .institution
        .as_deref()
        .or(connection.institution.as_deref());

    if let Some(account) = ledger::find_account_by_external_id(conn, &external.id)? {
        let balance_updated = reconcile(conn, &account, connection, external, institution)?;
        return Ok(MappedAccount {
            account_id: account.id,
            matched: MatchKind::Mapped,
            balance_updated,
        });
    }

    let candidates = ledger::list_unmapped_accounts(conn)?;

    if let Some(account) = match_by_name(&candidates, connection, external) {
        tracing::debug!(account = account.id, external = %external.id, "matched account by name");
        let balance_updated = reconcile(conn, account, connection, external, institution)?;
        return Ok(MappedAccount {
            account_id: account.id,
            matched: MatchKind::ByName,
            balance_updated,
        });
    }

    if let Some(account) = institution.and_then(|inst| match_by_institution(&candidates, inst, external)) {
        tracing::debug!(account = account.id, external = %external.id, "matched account by institution");
        let balance_updated = reconcile(conn, account, connection, external, institution)?;
        return Ok(MappedAccount {
            account_id: account.id,
            matched: MatchKind::ByInstitution,
            balance_updated,
        });
    }

    let account_id = ledger::insert_account(
        conn,
        &NewAccount {
            name: external.name.trim(),
            account_type: account_type_for(external.kind),
            balance: external.balance,
            institution,
            connection_id: Some(connection.id),
            external_id: Some(&external.id),
            credit_limit: external.available_credit_limit,
        },
    )?;
    tracing::info!(account = account_id, name = %external.name, "created account from aggregator");
    Ok(MappedAccount {
        account_id,
        matched: MatchKind::Created,
        balance_updated: false,
    })
}

/// Exactly one unmapped account of the same type and normalized name that is
/// not tied to a different connection.
fn match_by_name<'a>(
    candidates: &'a [Account],
    connection: &BankConnection,
    external: &ExternalAccount,
) -> Option<&'a Account> {
    let wanted = normalize(&external.name);
    let account_type = account_type_for(external.kind);
    let hits: Vec<&Account> = candidates
        .iter()
        .filter(|a| a.account_type == account_type)
        .filter(|a| a.connection_id.map_or(true, |c| c == connection.id))
        .filter(|a| normalize(&a.name) == wanted)
        .collect();
    single(hits)
}

/// Exactly one unconnected account of the same type at the same institution.
fn match_by_institution<'a>(
    candidates: &'a [Account],
    institution: &str,
    external: &ExternalAccount,
) -> Option<&'a Account> {
    let wanted = normalize(institution);
    let account_type = account_type_for(external.kind);
    let hits: Vec<&Account> = candidates
        .iter()
        .filter(|a| a.connection_id.is_none() && a.account_type == account_type)
        .filter(|a| a.institution.as_deref().map(normalize).as_deref() == Some(wanted.as_str()))
        .collect();
    single(hits)
}

fn single(hits: Vec<&Account>) -> Option<&Account> {
    match hits.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn reconcile(
    conn: &Connection,
    account: &Account,
    connection: &BankConnection,
    external: &ExternalAccount,
    institution: Option<&str>,
) -> Result<bool> {
    let balance_changed = (account.balance - external.balance).abs() > BALANCE_TOLERANCE;
    let institution_changed = institution.is_some() && institution != account.institution.as_deref();
    let needs_mapping = account.external_id.is_none();
    let needs_connection = account.connection_id.is_none();

    if !(balance_changed || institution_changed || needs_mapping || needs_connection) {
        return Ok(false);
    }

    ledger::patch_account(
        conn,
        account.id,
        &AccountPatch {
            balance: balance_changed.then_some(external.balance),
            institution: if institution_changed { institution } else { None },
            connection_id: Some(connection.id),
            external_id: needs_mapping.then_some(external.id.as_str()),
        },
    )?;
    if balance_changed {
        tracing::info!(
            account = account.id,
            from = account.balance,
            to = external.balance,
            "balance reconciled from aggregator"
        );
    }
    Ok(balance_changed)
}
