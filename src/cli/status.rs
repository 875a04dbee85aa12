use colored::Colorize;

use crate::cli::today;
use crate::db::get_connection;
use crate::error::Result;
use crate::ledger;
use crate::models::{BillStatus, ConnectionStatus};
use crate::scheduler;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join("penny.db");

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `penny init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let accounts = ledger::list_accounts(&conn)?.len();
    let transactions = ledger::count_transactions(&conn)?;
    let bills = scheduler::list_bills(&conn, today())?;
    let overdue = bills.iter().filter(|(_, s)| *s == BillStatus::Overdue).count();
    let open_installments = ledger::list_installments(&conn, None)?
        .iter()
        .filter(|i| !i.paid)
        .count();

    println!();
    println!("Accounts:      {accounts}");
    println!("Transactions:  {transactions}");
    println!("Bills:         {} ({overdue} overdue)", bills.len());
    println!("Installments:  {open_installments} unpaid");

    let connections = ledger::list_connections(&conn)?;
    if !connections.is_empty() {
        println!();
        for c in connections {
            let state = match c.status {
                ConnectionStatus::Active => c.status.key().green(),
                ConnectionStatus::Pending => c.status.key().yellow(),
                ConnectionStatus::Error => c.status.key().red(),
            };
            let synced = c
                .last_synced_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!("{}  {state}  last sync {synced}", c.item_id);
            if let Some(err) = c.last_error {
                println!("    {}", err.dimmed());
            }
        }
    }
    Ok(())
}
