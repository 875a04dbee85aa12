use std::path::Path;

use chrono::Utc;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregator::{Aggregator, HttpAggregator, HttpAggregatorConfig, SnapshotAggregator};
use crate::db::get_connection;
use crate::error::{PennyError, Result};
use crate::ledger;
use crate::settings::{db_path, load_settings};
use crate::sync::{sync_items, CancelToken, SyncMode, SyncOptions, SyncRun};

pub fn run(item: Option<String>, snapshot: Option<String>, silent: bool) -> Result<()> {
    let settings = load_settings();
    let options = SyncOptions::from_settings(&settings);
    let mode = if silent { SyncMode::Silent } else { SyncMode::Interactive };
    let mut conn = get_connection(&db_path())?;

    let mut item_ids: Vec<String> = match &item {
        Some(id) => vec![id.clone()],
        None => ledger::list_connections(&conn)?
            .into_iter()
            .map(|c| c.item_id)
            .collect(),
    };

    let aggregator: Box<dyn Aggregator> = match snapshot {
        Some(path) => {
            let snap = SnapshotAggregator::from_file(Path::new(&path))?;
            if item.is_none() {
                for id in snap.item_ids() {
                    if !item_ids.contains(&id) {
                        item_ids.push(id);
                    }
                }
            }
            Box::new(snap)
        }
        None => Box::new(HttpAggregator::new(HttpAggregatorConfig::from_env(
            &settings.aggregator_base_url,
        )?)?),
    };

    if item_ids.is_empty() {
        println!("No bank connections to sync.");
        return Ok(());
    }

    let cancel = CancelToken::default();
    let run = sync_items(&mut conn, aggregator.as_ref(), &item_ids, mode, &options, &cancel, Utc::now())?;

    if mode == SyncMode::Silent {
        return Ok(());
    }
    print_run(&run);
    let failed = run.failures().count();
    if failed > 0 {
        return Err(PennyError::Validation(format!("{failed} item(s) failed to sync")));
    }
    Ok(())
}

fn print_run(run: &SyncRun) {
    let mut table = Table::new();
    table.set_header(vec!["Item", "Accounts", "New", "Fetched", "Skipped", "Duplicates", "Last Txn"]);
    for report in run.reports() {
        let item = if report.refresh_timed_out {
            format!("{} {}", report.item_id, "(refresh timed out)".yellow())
        } else {
            report.item_id.clone()
        };
        table.add_row(vec![
            Cell::new(item),
            Cell::new(report.accounts_mapped),
            Cell::new(report.inserted),
            Cell::new(report.fetched),
            Cell::new(report.skipped_pending),
            Cell::new(report.duplicates_avoided),
            Cell::new(report.last_transaction_date.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Sync\n{table}");
    for (item_id, err) in run.failures() {
        println!("{} {item_id}: {err}", "Failed".red());
    }
}
