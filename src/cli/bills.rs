use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::today;
use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::money;
use crate::installments::{process_credit_bill, Ensured};
use crate::ledger::{self, NewBill};
use crate::models::{BillStatus, CategoryKind, Frequency, PaymentMethod};
use crate::scheduler::{self, PayBillRequest};
use crate::settings::db_path;

#[allow(clippy::too_many_arguments)]
pub fn add(
    title: &str,
    amount: f64,
    frequency: Frequency,
    start: NaiveDate,
    account: Option<&str>,
    method: Option<PaymentMethod>,
    category: Option<CategoryKind>,
) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account_id = match account {
        Some(name) => Some(ledger::find_account_by_name(&conn, name)?.id),
        None => None,
    };
    let id = scheduler::create_bill(
        &conn,
        &NewBill {
            title,
            amount,
            frequency,
            start_date: start,
            next_due_date: None,
            account_id,
            category,
            payment_method: method,
        },
    )?;
    println!("Added bill #{id}: {title} ({} {})", money(amount), frequency.key());
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let bills = scheduler::list_bills(&conn, today())?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Amount", "Frequency", "Next Due", "Method", "Status"]);
    for (bill, status) in bills {
        let label = match status {
            BillStatus::Paid => status.label().green().to_string(),
            BillStatus::Pending => status.label().yellow().to_string(),
            BillStatus::Overdue => status.label().red().bold().to_string(),
        };
        table.add_row(vec![
            Cell::new(bill.id),
            Cell::new(&bill.title),
            Cell::new(money(bill.amount)),
            Cell::new(bill.frequency.key()),
            Cell::new(bill.next_due_date.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(bill.payment_method.map(|m| m.key()).unwrap_or_default()),
            Cell::new(label),
        ]);
    }
    println!("Bills\n{table}");
    Ok(())
}

pub fn pay(
    id: i64,
    account: Option<&str>,
    method: Option<PaymentMethod>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let mut conn = get_connection(&db_path())?;
    let account_id = match account {
        Some(name) => Some(ledger::find_account_by_name(&conn, name)?.id),
        None => None,
    };
    let request = PayBillRequest {
        account_id,
        payment_method: method,
        payment_date: date,
    };
    let outcome = scheduler::pay_bill(&mut conn, id, &request, today())?;
    println!(
        "{} bill #{id} (due {}). Next due: {}",
        "Paid".green(),
        outcome.paid_due_date,
        outcome.next_due_date
    );
    Ok(())
}

pub fn process(id: i64) -> Result<()> {
    let conn = get_connection(&db_path())?;
    match process_credit_bill(&conn, id)? {
        Ensured::Created(inst) => println!(
            "Created installment #{} for {} due {}",
            inst.id,
            money(inst.amount),
            inst.due_date
        ),
        Ensured::Existing(inst) => println!(
            "Installment #{} already exists for this cycle (due {})",
            inst.id, inst.due_date
        ),
    }
    Ok(())
}
