use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::money;
use crate::ledger::{self, NewAccount};
use crate::models::AccountType;
use crate::settings::db_path;

pub fn add(
    name: &str,
    account_type: AccountType,
    institution: Option<&str>,
    balance: f64,
    credit_limit: Option<f64>,
) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let id = ledger::insert_account(
        &conn,
        &NewAccount {
            name,
            account_type,
            balance,
            institution,
            connection_id: None,
            external_id: None,
            credit_limit,
        },
    )?;
    println!("Added account #{id}: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let accounts = ledger::list_accounts(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Institution", "Balance", "Credit", "Linked"]);
    for a in accounts {
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(&a.name),
            Cell::new(a.account_type.key()),
            Cell::new(a.institution.as_deref().unwrap_or_default()),
            Cell::new(money(a.balance)),
            Cell::new(a.credit_limit.map(money).unwrap_or_default()),
            Cell::new(if a.external_id.is_some() { "yes" } else { "" }),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
