use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::today;
use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::{money, signed_money};
use crate::installments::{self, InstallmentPayment, PaymentTarget};
use crate::ledger;
use crate::settings::db_path;

pub fn create(title: &str, card: &str, total: f64, count: u32, start: NaiveDate) -> Result<()> {
    let mut conn = get_connection(&db_path())?;
    let card_id = ledger::find_account_by_name(&conn, card)?.id;
    let created = installments::create_installments(&mut conn, card_id, title, total, count, start)?;

    let per = created.first().map(|i| i.amount).unwrap_or_default();
    println!(
        "Created {} installment(s) of {} on {card}",
        created.len(),
        money(per)
    );
    Ok(())
}

pub fn list(card: Option<&str>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let card_id = match card {
        Some(name) => Some(ledger::find_account_by_name(&conn, name)?.id),
        None => None,
    };
    let rows = ledger::list_installments(&conn, card_id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "#", "Amount", "Due", "Paid"]);
    for inst in rows {
        let paid = match inst.paid_date {
            Some(d) if inst.paid => d.to_string().green().to_string(),
            _ if inst.paid => "yes".green().to_string(),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(inst.id),
            Cell::new(&inst.title),
            Cell::new(format!("{}/{}", inst.installment_number, inst.total_installments)),
            Cell::new(money(inst.amount)),
            Cell::new(inst.due_date),
            Cell::new(paid),
        ]);
    }
    println!("Installments\n{table}");
    Ok(())
}

pub fn pay(id: i64, date: Option<NaiveDate>) -> Result<()> {
    pay_target(PaymentTarget::Installment(id), date)
}

pub fn pay_bill(bill_id: i64, date: Option<NaiveDate>) -> Result<()> {
    pay_target(PaymentTarget::Bill(bill_id), date)
}

fn pay_target(target: PaymentTarget, date: Option<NaiveDate>) -> Result<()> {
    let mut conn = get_connection(&db_path())?;
    let InstallmentPayment {
        installment_id,
        amount,
        bill_next_due,
        ..
    } = installments::record_payment(&mut conn, target, date.unwrap_or_else(today))?;

    println!("{} installment #{installment_id} ({})", "Paid".green(), signed_money(-amount));
    if let Some(next) = bill_next_due {
        println!("Bill advanced. Next due: {next}");
    }
    Ok(())
}
