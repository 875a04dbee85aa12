use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{PennyError, Result};
use crate::ledger::{self, NewInstallment};
use crate::models::{
    AccountType, CreditInstallment, Frequency, PaymentMethod, RecurringBill, Transaction, TxnSource,
    TxnType,
};
use crate::schedule::{add_months, cycle_key};
use crate::scheduler::advance_cycle;

fn require_credit_account(conn: &Connection, account_id: i64) -> Result<()> {
    let account = ledger::get_account(conn, account_id)?;
    if account.account_type != AccountType::Credit {
        return Err(PennyError::Validation(format!(
            "Account '{}' is not a credit account",
            account.name
        )));
    }
    Ok(())
}

/// Split a card purchase into monthly installments starting at `base_date`.
///
/// Each installment is `total / count`; no remainder is redistributed. The
/// card's available credit drops by the summed amount in the same transaction.
pub fn create_installments(
    conn: &mut Connection,
    card_id: i64,
    title: &str,
    total: f64,
    count: u32,
    base_date: NaiveDate,
) -> Result<Vec<CreditInstallment>> {
    if count == 0 {
        return Err(PennyError::Validation("Installment count must be at least 1".to_string()));
    }
    if total <= 0.0 {
        return Err(PennyError::Validation("Purchase total must be positive".to_string()));
    }
    let title = title.trim();
    if title.is_empty() {
        return Err(PennyError::Validation("Purchase title is required".to_string()));
    }

    let tx = conn.transaction()?;
    require_credit_account(&tx, card_id)?;

    let per_installment = total / f64::from(count);
    let mut ids = Vec::with_capacity(count as usize);
    for i in 0..count {
        let id = ledger::insert_installment(
            &tx,
            &NewInstallment {
                account_id: card_id,
                title,
                amount: per_installment,
                installment_number: i64::from(i) + 1,
                total_installments: i64::from(count),
                due_date: add_months(base_date, i),
                bill_id: None,
                cycle_key: None,
            },
        )?
        .ok_or_else(|| PennyError::Validation(format!("Installment {} of '{title}' was not stored", i + 1)))?;
        ids.push(id);
    }
    ledger::adjust_credit_limit(&tx, card_id, -(per_installment * f64::from(count)))?;

    let installments = ids
        .into_iter()
        .map(|id| ledger::get_installment(&tx, id))
        .collect::<Result<Vec<_>>>()?;
    tx.commit()?;

    tracing::info!(card = card_id, title, total, count, "installments created");
    Ok(installments)
}

#[derive(Debug, Clone)]
pub enum Ensured {
    Created(CreditInstallment),
    /// Already present for this cycle; nothing was written.
    Existing(CreditInstallment),
}

impl Ensured {
    pub fn installment(&self) -> &CreditInstallment {
        match self {
            Self::Created(i) | Self::Existing(i) => i,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Find or create the single installment for (card, title, month of `due_date`).
pub fn ensure_credit_card_payment(
    conn: &Connection,
    card_id: i64,
    title: &str,
    amount: f64,
    due_date: NaiveDate,
) -> Result<Ensured> {
    ensure_cycle_installment(conn, card_id, title, amount, due_date, None)
}

fn ensure_cycle_installment(
    conn: &Connection,
    card_id: i64,
    title: &str,
    amount: f64,
    due_date: NaiveDate,
    bill_id: Option<i64>,
) -> Result<Ensured> {
    // Card payments share a calendar-month slot; each bill cycle owns its due date.
    let slot = match bill_id {
        Some(_) => due_date.to_string(),
        None => cycle_key(due_date),
    };
    let existing = match bill_id {
        Some(id) => ledger::find_bill_installment(conn, id, due_date)?,
        None => ledger::find_installment_in_month(conn, card_id, title, &slot)?,
    };
    if let Some(existing) = existing {
        tracing::debug!(card = card_id, title, %slot, "installment already present");
        return Ok(Ensured::Existing(existing));
    }

    require_credit_account(conn, card_id)?;
    let inserted = ledger::insert_installment(
        conn,
        &NewInstallment {
            account_id: card_id,
            title,
            amount,
            installment_number: 1,
            total_installments: 1,
            due_date,
            bill_id,
            cycle_key: Some(&slot),
        },
    )?;
    match inserted {
        Some(id) => {
            ledger::adjust_credit_limit(conn, card_id, -amount)?;
            Ok(Ensured::Created(ledger::get_installment(conn, id)?))
        }
        // Lost a race with a concurrent writer for the same cycle.
        None => {
            let winner = match bill_id {
                Some(id) => ledger::find_bill_installment(conn, id, due_date)?,
                None => ledger::find_installment_by_cycle(conn, card_id, title, &slot)?,
            };
            winner
                .map(Ensured::Existing)
                .ok_or_else(|| PennyError::Validation(format!("Installment for '{title}' in {slot} vanished")))
        }
    }
}

/// Whether paying `installment` settles the bill's current cycle.
fn covers_cycle(bill: &RecurringBill, installment: &CreditInstallment) -> bool {
    let Some(due) = bill.next_due_date else {
        return false;
    };
    if installment.bill_id == Some(bill.id) || bill.frequency == Frequency::Weekly {
        installment.due_date == due
    } else {
        cycle_key(installment.due_date) == cycle_key(due)
    }
}

fn credit_bill_parts(bill: &RecurringBill) -> Result<(i64, NaiveDate)> {
    if bill.payment_method != Some(PaymentMethod::CreditCard) {
        return Err(PennyError::Validation(format!(
            "Bill '{}' is not paid by credit card",
            bill.title
        )));
    }
    let card_id = bill.account_id.ok_or_else(|| {
        PennyError::Validation(format!("Bill '{}' has no card account", bill.title))
    })?;
    Ok((card_id, bill.next_due_date.unwrap_or(bill.start_date)))
}

/// Make sure a credit-funded bill has an installment for its current cycle.
pub fn process_credit_bill(conn: &Connection, bill_id: i64) -> Result<Ensured> {
    let bill = ledger::get_bill(conn, bill_id)?;
    let (card_id, due) = credit_bill_parts(&bill)?;
    ensure_cycle_installment(conn, card_id, &bill.title, bill.amount, due, Some(bill.id))
}

#[derive(Debug, Clone, Copy)]
pub enum PaymentTarget {
    Installment(i64),
    Bill(i64),
}

#[derive(Debug, Clone)]
pub struct InstallmentPayment {
    pub installment_id: i64,
    pub transaction_id: String,
    pub amount: f64,
    /// New due date of the linked bill, when this payment advanced it.
    pub bill_next_due: Option<NaiveDate>,
}

/// Pay one installment and advance its linked bill's cycle when the
/// installment covers that cycle. All writes commit together.
pub fn record_payment(
    conn: &mut Connection,
    target: PaymentTarget,
    payment_date: NaiveDate,
) -> Result<InstallmentPayment> {
    let tx = conn.transaction()?;

    let installment = match target {
        PaymentTarget::Installment(id) => ledger::get_installment(&tx, id)?,
        PaymentTarget::Bill(bill_id) => {
            let bill = ledger::get_bill(&tx, bill_id)?;
            let (card_id, due) = credit_bill_parts(&bill)?;
            ensure_cycle_installment(&tx, card_id, &bill.title, bill.amount, due, Some(bill.id))?;
            ledger::earliest_unpaid_installment(&tx, card_id, &bill.title)?.ok_or_else(|| {
                PennyError::Validation(format!("No unpaid installment for '{}'", bill.title))
            })?
        }
    };
    if installment.paid {
        return Err(PennyError::Validation(format!(
            "Installment {} of '{}' is already paid",
            installment.installment_number, installment.title
        )));
    }

    let title = if installment.total_installments > 1 {
        format!(
            "{} ({}/{})",
            installment.title, installment.installment_number, installment.total_installments
        )
    } else {
        installment.title.clone()
    };
    let txn = Transaction {
        id: ledger::new_txn_id(),
        account_id: installment.account_id,
        title,
        amount: -installment.amount.abs(),
        date: payment_date,
        txn_type: TxnType::Expense,
        category: None,
        source: TxnSource::Installment,
    };
    ledger::insert_transaction(&tx, &txn)?;
    if !ledger::mark_installment_paid(&tx, installment.id, payment_date)? {
        return Err(PennyError::Validation(format!(
            "Installment {} was paid concurrently",
            installment.id
        )));
    }
    ledger::adjust_credit_limit(&tx, installment.account_id, installment.amount)?;

    let linked = match installment.bill_id {
        Some(bill_id) => Some(ledger::get_bill(&tx, bill_id)?),
        None => ledger::find_credit_bill(&tx, installment.account_id, &installment.title)?,
    };
    let mut bill_next_due = None;
    if let Some(bill) = linked {
        if covers_cycle(&bill, &installment) {
            bill_next_due = Some(advance_cycle(&tx, &bill, bill.account_id, PaymentMethod::CreditCard)?);
        }
    }
    tx.commit()?;

    tracing::info!(
        installment = installment.id,
        title = %installment.title,
        amount = installment.amount,
        "installment paid"
    );
    Ok(InstallmentPayment {
        installment_id: installment.id,
        transaction_id: txn.id,
        amount: installment.amount,
        bill_next_due,
    })
}
