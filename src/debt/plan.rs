// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Turning a chosen projection into real books: a liability account, a
//! persisted `Debt`, and payment/interest transactions posted over time.

use chrono::NaiveDate;
use tracing::info;

use crate::debt::amortize::periodic_rate;
use crate::debt::compare::{DebtInputs, MethodProjection};
use crate::error::{Result, ValidationError};
use crate::ledger::service::{Ledger, PostOutcome};
use crate::ledger::shapes::Posting;
use crate::models::{AccountId, AccountType, Debt, DebtId, EntryDraft, NewDebt, OwnerId};
use crate::money::Money;

/// Category given to liability accounts opened for a debt.
pub const DEBT_CATEGORY: &str = "debt";

/// Where the borrowed money shows up when a debt is adopted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    /// An existing loan: the principal is the liability's opening balance.
    Existing,
    /// A new loan whose proceeds land in this asset account.
    Proceeds(AccountId),
}

pub fn debt(ledger: &Ledger, owner: &OwnerId, id: DebtId) -> Result<Debt> {
    match ledger.store().debt(id)? {
        Some(d) if d.owner_id == *owner => Ok(d),
        _ => Err(ValidationError::UnknownDebt(id).into()),
    }
}

pub fn debts(ledger: &Ledger, owner: &OwnerId) -> Result<Vec<Debt>> {
    Ok(ledger.store().debts(owner)?)
}

/// Persists the chosen method. Opens a liability account named after the
/// debt, books the principal against it, and stores the plan.
pub fn adopt(
    ledger: &Ledger,
    owner: &OwnerId,
    name: &str,
    inputs: &DebtInputs,
    chosen: &MethodProjection,
    funding: Funding,
) -> Result<Debt> {
    if chosen.hidden {
        return Err(ValidationError::InfeasibleMethod(chosen.method).into());
    }
    if !inputs.principal.is_positive() {
        return Err(ValidationError::NonPositive(inputs.principal).into());
    }
    let date = inputs.start_date;
    let principal = inputs.principal;
    let description = match funding {
        Funding::Existing => format!("Opening balance: {}", name.trim()),
        Funding::Proceeds(_) => format!("Loan proceeds: {}", name.trim()),
    };
    // the liability only survives if its principal is booked
    let (liability, _) = ledger.open_funded_account(
        owner,
        name,
        AccountType::Liability,
        Some(DEBT_CATEGORY.to_string()),
        date,
        Some(&description),
        |liability| match funding {
            Funding::Existing => Posting::OpeningBalance {
                account: liability.id,
                amount: principal,
            },
            Funding::Proceeds(asset) => Posting::Manual {
                entries: vec![
                    EntryDraft::debit(asset, principal),
                    EntryDraft::credit(liability.id, principal),
                ],
            },
        },
    )?;

    let current_balance = ledger.projector().balance(owner, liability.id)?;
    let debt = ledger.store().insert_debt(NewDebt {
        owner_id: owner.clone(),
        name: liability.name.clone(),
        liability_account_id: liability.id,
        principal: inputs.principal,
        current_balance,
        interest_rate: inputs.rate,
        rate_frequency: inputs.rate_frequency,
        repayment_method: chosen.method,
        payment_amount: chosen.payment,
        payment_frequency: inputs.payment_frequency,
        start_date: date,
        total_periods: chosen.periods,
    })?;
    info!(owner = %owner, debt = %debt.id, method = %debt.repayment_method, payment = %debt.payment_amount, "debt adopted");
    Ok(debt)
}

/// Posts one payment from `from` against the debt. Without an explicit amount
/// the planned payment is used, capped at what is still owed when the posting
/// commits.
pub fn record_payment(
    ledger: &Ledger,
    owner: &OwnerId,
    id: DebtId,
    from: AccountId,
    amount: Option<Money>,
    date: NaiveDate,
) -> Result<PostOutcome> {
    let debt = debt(ledger, owner, id)?;
    let (amount, up_to_owed) = match amount {
        Some(a) => (a, false),
        None => (debt.payment_amount, true),
    };
    let description = format!("Payment: {}", debt.name);
    ledger.post(
        owner,
        date,
        Some(&description),
        &Posting::DebtPayment {
            liability: debt.liability_account_id,
            from,
            amount,
            up_to_owed,
        },
    )
}

/// Charges one period of interest on the balance as of `date`. Nothing is
/// posted when that interest rounds to zero.
pub fn accrue_interest(
    ledger: &Ledger,
    owner: &OwnerId,
    id: DebtId,
    expense: AccountId,
    date: NaiveDate,
) -> Result<PostOutcome> {
    let debt = debt(ledger, owner, id)?;
    let r = periodic_rate(debt.interest_rate, debt.rate_frequency, debt.payment_frequency);
    let description = format!("Interest: {}", debt.name);
    ledger.post(
        owner,
        date,
        Some(&description),
        &Posting::InterestAccrual {
            liability: debt.liability_account_id,
            expense,
            periodic_rate: r,
        },
    )
}

/// Rebuilds the cached balance from the ledger and stores it.
pub fn refresh_balance(ledger: &Ledger, owner: &OwnerId, id: DebtId) -> Result<Money> {
    let debt = debt(ledger, owner, id)?;
    let balance = ledger.projector().balance(owner, debt.liability_account_id)?;
    if balance != debt.current_balance {
        info!(debt = %debt.id, cached = %debt.current_balance, derived = %balance, "debt balance cache rebuilt");
    }
    ledger.store().set_debt_balance(debt.id, balance)?;
    Ok(balance)
}
