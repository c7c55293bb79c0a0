// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Read side of the ledger. Every number here is folded from the entry log;
//! nothing is read from a stored balance.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::error;

use crate::error::{IntegrityViolation, LedgerError, Result, ValidationError};
use crate::ledger::store::LedgerStore;
use crate::models::{Account, AccountId, AccountType, EntryFilter, OwnerId, PostedEntry, Side};
use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub name: String,
    pub r#type: AccountType,
    pub is_active: bool,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetWorth {
    pub as_of: NaiveDate,
    pub assets: Money,
    pub liabilities: Money,
    pub net_worth: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub balance: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub transactions_checked: usize,
    pub accounts_checked: usize,
    pub debts_checked: usize,
}

/// Folds entries for one account in the order given.
pub fn fold(account_type: AccountType, entries: &[PostedEntry]) -> Money {
    entries
        .iter()
        .map(|e| account_type.signed(e.side, e.amount))
        .sum()
}

fn alarm(violation: IntegrityViolation) -> LedgerError {
    error!(%violation, "ledger integrity violation");
    LedgerError::Integrity(violation)
}

pub struct Projector<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> Projector<'a> {
    pub fn new(store: &'a dyn LedgerStore) -> Self {
        Self { store }
    }

    fn owned_account(&self, owner: &OwnerId, id: AccountId) -> Result<Account> {
        let account = self
            .store
            .account(id)?
            .ok_or(ValidationError::UnknownAccount(id))?;
        if account.owner_id != *owner {
            return Err(ValidationError::ForeignAccount(id).into());
        }
        Ok(account)
    }

    /// Balance including every transaction dated on or before `date`.
    pub fn balance_as_of(&self, owner: &OwnerId, id: AccountId, date: NaiveDate) -> Result<Money> {
        let account = self.owned_account(owner, id)?;
        let entries = self
            .store
            .query_entries(&EntryFilter::owner(owner).account(id).until(date))?;
        Ok(fold(account.r#type, &entries))
    }

    /// Balance over the whole log, future-dated entries included.
    pub fn balance(&self, owner: &OwnerId, id: AccountId) -> Result<Money> {
        let account = self.owned_account(owner, id)?;
        let entries = self
            .store
            .query_entries(&EntryFilter::owner(owner).account(id))?;
        Ok(fold(account.r#type, &entries))
    }

    fn fold_owner(
        &self,
        accounts: &[Account],
        filter: &EntryFilter,
    ) -> Result<HashMap<AccountId, Money>> {
        let types: HashMap<AccountId, AccountType> =
            accounts.iter().map(|a| (a.id, a.r#type)).collect();
        let mut totals: HashMap<AccountId, Money> =
            accounts.iter().map(|a| (a.id, Money::ZERO)).collect();
        for e in self.store.query_entries(filter)? {
            let account_type = types.get(&e.account_id).copied().ok_or_else(|| {
                alarm(IntegrityViolation::DanglingEntry {
                    id: e.transaction_id,
                    account: e.account_id,
                })
            })?;
            *totals.entry(e.account_id).or_default() += account_type.signed(e.side, e.amount);
        }
        Ok(totals)
    }

    /// Every account of `owner` with its balance as of `date`.
    pub fn balances(&self, owner: &OwnerId, date: NaiveDate) -> Result<Vec<AccountBalance>> {
        let accounts = self.store.accounts(owner)?;
        let totals = self.fold_owner(&accounts, &EntryFilter::owner(owner).until(date))?;
        Ok(accounts
            .into_iter()
            .map(|a| AccountBalance {
                balance: totals.get(&a.id).copied().unwrap_or_default(),
                account_id: a.id,
                name: a.name,
                r#type: a.r#type,
                is_active: a.is_active,
            })
            .collect())
    }

    pub fn net_worth_breakdown(&self, owner: &OwnerId, date: NaiveDate) -> Result<NetWorth> {
        let mut assets = Money::ZERO;
        let mut liabilities = Money::ZERO;
        for b in self.balances(owner, date)? {
            match b.r#type {
                AccountType::Asset => assets += b.balance,
                AccountType::Liability => liabilities += b.balance,
                _ => {}
            }
        }
        Ok(NetWorth {
            as_of: date,
            assets,
            liabilities,
            net_worth: assets - liabilities,
        })
    }

    /// Assets minus liabilities as of `date`.
    pub fn net_worth(&self, owner: &OwnerId, date: NaiveDate) -> Result<Money> {
        Ok(self.net_worth_breakdown(owner, date)?.net_worth)
    }

    /// Balance at `from`, then the closing balance of every later day in
    /// `(from, to]` that has activity.
    pub fn history(
        &self,
        owner: &OwnerId,
        id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BalancePoint>> {
        let account = self.owned_account(owner, id)?;
        let entries = self
            .store
            .query_entries(&EntryFilter::owner(owner).account(id).until(to))?;

        let mut running = Money::ZERO;
        let mut by_day: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        let mut opening = Money::ZERO;
        for e in &entries {
            running += account.r#type.signed(e.side, e.amount);
            if e.date <= from {
                opening = running;
            } else {
                by_day.insert(e.date, running);
            }
        }

        let mut points = vec![BalancePoint {
            date: from,
            balance: opening,
        }];
        points.extend(
            by_day
                .into_iter()
                .map(|(date, balance)| BalancePoint { date, balance }),
        );
        Ok(points)
    }

    /// Checks the stored books against themselves. The first disagreement is
    /// returned as an integrity violation; nothing is repaired.
    pub fn verify(&self, owner: &OwnerId) -> Result<IntegrityReport> {
        let mut report = IntegrityReport::default();

        let transactions = self.store.transactions(owner)?;
        for t in &transactions {
            if t.entries.len() < 2 {
                return Err(alarm(IntegrityViolation::TooFewEntries {
                    id: t.id,
                    count: t.entries.len(),
                }));
            }
            let mut debits = Money::ZERO;
            let mut credits = Money::ZERO;
            for e in &t.entries {
                match e.side {
                    Side::Debit => debits += e.amount,
                    Side::Credit => credits += e.amount,
                }
            }
            if debits != credits {
                return Err(alarm(IntegrityViolation::UnbalancedTransaction {
                    id: t.id,
                    debits,
                    credits,
                }));
            }
            report.transactions_checked += 1;
        }

        // owner-wide replay against an entry-by-entry walk of each account's own query
        let accounts = self.store.accounts(owner)?;
        let replayed = self.fold_owner(&accounts, &EntryFilter::owner(owner))?;
        for account in &accounts {
            let mut incremental = Money::ZERO;
            for e in self
                .store
                .query_entries(&EntryFilter::owner(owner).account(account.id))?
            {
                incremental += account.r#type.signed(e.side, e.amount);
            }
            let full = replayed.get(&account.id).copied().unwrap_or_default();
            if full != incremental {
                return Err(alarm(IntegrityViolation::ReplayMismatch {
                    account: account.id,
                    replayed: full,
                    incremental,
                }));
            }
            report.accounts_checked += 1;
        }

        for debt in self.store.debts(owner)? {
            let derived = replayed
                .get(&debt.liability_account_id)
                .copied()
                .unwrap_or_default();
            if derived != debt.current_balance {
                return Err(alarm(IntegrityViolation::CachedBalanceMismatch {
                    debt: debt.id,
                    cached: debt.current_balance,
                    derived,
                }));
            }
            report.debts_checked += 1;
        }

        Ok(report)
    }
}
