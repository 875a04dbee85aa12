use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{PennyError, Result};
use crate::ledger::{self, BillCycleUpdate, NewBill};
use crate::models::{
    AccountType, BillStatus, PaymentMethod, RecurringBill, Transaction, TxnSource, TxnType,
};
use crate::schedule::next_due;

/// Derived cycle status of a bill on `today`.
pub fn bill_status(bill: &RecurringBill, today: NaiveDate) -> BillStatus {
    let Some(due) = bill.next_due_date else {
        return BillStatus::Pending;
    };
    if bill.last_paid_cycle_due_date == Some(due) && due >= today {
        BillStatus::Paid
    } else if due < today {
        BillStatus::Overdue
    } else {
        BillStatus::Pending
    }
}

pub fn create_bill(conn: &Connection, bill: &NewBill) -> Result<i64> {
    if bill.amount <= 0.0 {
        return Err(PennyError::Validation("Bill amount must be positive".to_string()));
    }
    let bill = NewBill {
        next_due_date: bill.next_due_date.or(Some(bill.start_date)),
        ..*bill
    };
    ledger::insert_bill(conn, &bill)
}

pub fn list_bills(conn: &Connection, today: NaiveDate) -> Result<Vec<(RecurringBill, BillStatus)>> {
    Ok(ledger::list_bills(conn)?
        .into_iter()
        .map(|b| {
            let status = bill_status(&b, today);
            (b, status)
        })
        .collect())
}

/// Move a bill to its next cycle and mark the new cycle as paid.
///
/// Seeds from the stored due date, or the start date when none is set.
/// Returns the new due date.
pub fn advance_cycle(
    conn: &Connection,
    bill: &RecurringBill,
    account_id: Option<i64>,
    method: PaymentMethod,
) -> Result<NaiveDate> {
    let seed = bill.next_due_date.unwrap_or(bill.start_date);
    let new_due = next_due(seed, bill.frequency);
    ledger::update_bill_cycle(
        conn,
        bill,
        &BillCycleUpdate {
            next_due_date: new_due,
            account_id,
            payment_method: method,
            last_paid_cycle_due_date: new_due,
        },
    )?;
    tracing::debug!(bill = bill.id, from = %seed, to = %new_due, "bill cycle advanced");
    Ok(new_due)
}

#[derive(Debug, Clone, Default)]
pub struct PayBillRequest {
    pub account_id: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct PayBillOutcome {
    pub transaction_id: String,
    pub paid_due_date: NaiveDate,
    pub next_due_date: NaiveDate,
}

/// Record a non-credit payment for a bill.
///
/// The ledger entry, the balance change and the cycle advance commit together
/// or not at all.
pub fn pay_bill(
    conn: &mut Connection,
    bill_id: i64,
    request: &PayBillRequest,
    today: NaiveDate,
) -> Result<PayBillOutcome> {
    let bill = ledger::get_bill(conn, bill_id)?;

    let method = request
        .payment_method
        .or(bill.payment_method)
        .ok_or_else(|| PennyError::Validation(format!("Bill '{}' has no payment method", bill.title)))?;
    if method.is_credit() {
        return Err(PennyError::UnsupportedMethod(method.key().to_string()));
    }
    let account_id = request.account_id.or(bill.account_id);
    if method.requires_account() && account_id.is_none() {
        return Err(PennyError::Validation(format!(
            "Payment method '{}' needs a funding account",
            method.key()
        )));
    }
    let account_id = if method.requires_account() { account_id } else { request.account_id };
    let payment_date = request.payment_date.unwrap_or(today);

    let tx = conn.transaction()?;
    let txn = Transaction {
        id: ledger::new_txn_id(),
        account_id: match account_id {
            Some(id) => id,
            None => cash_account_for(&tx)?,
        },
        title: bill.title.clone(),
        amount: -bill.amount.abs(),
        date: payment_date,
        txn_type: TxnType::Expense,
        category: bill.category,
        source: TxnSource::Bill,
    };
    ledger::insert_transaction(&tx, &txn)?;
    ledger::adjust_balance(&tx, txn.account_id, txn.amount)?;
    let new_due = advance_cycle(&tx, &bill, Some(txn.account_id), method)?;
    tx.commit()?;

    tracing::info!(bill = bill.id, title = %bill.title, next_due = %new_due, "bill paid");
    Ok(PayBillOutcome {
        transaction_id: txn.id,
        paid_due_date: bill.next_due_date.unwrap_or(bill.start_date),
        next_due_date: new_due,
    })
}

/// Cash payments without an explicit account land in the first cash account.
fn cash_account_for(conn: &Connection) -> Result<i64> {
    ledger::list_accounts(conn)?
        .into_iter()
        .find(|a| a.account_type == AccountType::Cash)
        .map(|a| a.id)
        .ok_or_else(|| PennyError::Validation("No cash account to record a cash payment in".to_string()))
}
