// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::RwLock;

use chrono::Utc;

use crate::error::StoreError;
use crate::models::{
    Account, AccountId, AccountPatch, Debt, DebtId, Entry, EntryDraft, EntryFilter, NewAccount,
    NewDebt, NewTransaction, OwnerId, PostedEntry, SystemAccount, Transaction, TransactionId,
};
use crate::money::Money;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence collaborator behind the ledger.
///
/// `append_transaction` must be atomic: a reader either sees the header with
/// every entry or nothing. `append_batch` extends that to several transactions
/// at once. `query_entries` returns entries ordered by transaction date, then
/// commit order.
pub trait LedgerStore: Send + Sync {
    fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;
    fn account(&self, id: AccountId) -> StoreResult<Option<Account>>;
    fn accounts(&self, owner: &OwnerId) -> StoreResult<Vec<Account>>;
    fn system_account(&self, owner: &OwnerId, kind: SystemAccount) -> StoreResult<Option<Account>>;
    fn update_account(&self, id: AccountId, patch: &AccountPatch) -> StoreResult<()>;
    fn set_account_active(&self, id: AccountId, active: bool) -> StoreResult<()>;
    fn delete_account(&self, id: AccountId) -> StoreResult<()>;

    fn append_transaction(
        &self,
        header: &NewTransaction,
        entries: &[EntryDraft],
    ) -> StoreResult<TransactionId>;
    fn append_batch(
        &self,
        batch: &[(NewTransaction, Vec<EntryDraft>)],
    ) -> StoreResult<Vec<TransactionId>>;
    fn transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>>;
    fn transactions(&self, owner: &OwnerId) -> StoreResult<Vec<Transaction>>;
    fn reversal_of(&self, id: TransactionId) -> StoreResult<Option<TransactionId>>;
    fn query_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<PostedEntry>>;

    fn insert_debt(&self, debt: NewDebt) -> StoreResult<Debt>;
    fn debt(&self, id: DebtId) -> StoreResult<Option<Debt>>;
    fn debts(&self, owner: &OwnerId) -> StoreResult<Vec<Debt>>;
    fn set_debt_balance(&self, id: DebtId, balance: Money) -> StoreResult<()>;
}

#[derive(Default)]
struct Inner {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    entries: Vec<PostedEntry>,
    debts: Vec<Debt>,
    last_account_id: i64,
}

impl Inner {
    fn push_transaction(&mut self, header: &NewTransaction, entries: &[EntryDraft]) -> TransactionId {
        let id = TransactionId(self.transactions.len() as i64 + 1);
        let mut seq = self.entries.len() as i64;
        let stored: Vec<Entry> = entries
            .iter()
            .map(|e| Entry {
                transaction_id: id,
                account_id: e.account_id,
                side: e.side,
                amount: e.amount,
            })
            .collect();
        for e in entries {
            seq += 1;
            self.entries.push(PostedEntry {
                seq,
                transaction_id: id,
                owner_id: header.owner_id.clone(),
                date: header.date,
                account_id: e.account_id,
                side: e.side,
                amount: e.amount,
            });
        }
        self.transactions.push(Transaction {
            id,
            owner_id: header.owner_id.clone(),
            date: header.date,
            description: header.description.clone(),
            notes: header.notes.clone(),
            created_at: Utc::now(),
            reverses: header.reverses,
            entries: stored,
        });
        id
    }
}

/// In-process store. One write lock per append (or batch) keeps commits atomic
/// for readers.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl LedgerStore for MemoryStore {
    fn insert_account(&self, new: NewAccount) -> StoreResult<Account> {
        let mut inner = self.write()?;
        inner.last_account_id += 1;
        let account = Account {
            id: AccountId(inner.last_account_id),
            owner_id: new.owner_id,
            name: new.name,
            r#type: new.r#type,
            category: new.category,
            is_active: true,
            opened_at: new.opened_at,
            system: new.system,
        };
        inner.accounts.push(account.clone());
        Ok(account)
    }

    fn account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.read()?.accounts.iter().find(|a| a.id == id).cloned())
    }

    fn accounts(&self, owner: &OwnerId) -> StoreResult<Vec<Account>> {
        let mut out: Vec<Account> = self
            .read()?
            .accounts
            .iter()
            .filter(|a| a.owner_id == *owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn system_account(&self, owner: &OwnerId, kind: SystemAccount) -> StoreResult<Option<Account>> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .find(|a| a.owner_id == *owner && a.system == Some(kind))
            .cloned())
    }

    fn update_account(&self, id: AccountId, patch: &AccountPatch) -> StoreResult<()> {
        let mut inner = self.write()?;
        let account = inner
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", id)))?;
        if let Some(name) = &patch.name {
            account.name = name.clone();
        }
        if let Some(category) = &patch.category {
            account.category = category.clone();
        }
        Ok(())
    }

    fn set_account_active(&self, id: AccountId, active: bool) -> StoreResult<()> {
        let mut inner = self.write()?;
        let account = inner
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", id)))?;
        account.is_active = active;
        Ok(())
    }

    fn delete_account(&self, id: AccountId) -> StoreResult<()> {
        let mut inner = self.write()?;
        let before = inner.accounts.len();
        inner.accounts.retain(|a| a.id != id);
        if inner.accounts.len() == before {
            return Err(StoreError::NotFound(format!("account {}", id)));
        }
        Ok(())
    }

    fn append_transaction(
        &self,
        header: &NewTransaction,
        entries: &[EntryDraft],
    ) -> StoreResult<TransactionId> {
        Ok(self.write()?.push_transaction(header, entries))
    }

    fn append_batch(
        &self,
        batch: &[(NewTransaction, Vec<EntryDraft>)],
    ) -> StoreResult<Vec<TransactionId>> {
        let mut inner = self.write()?;
        Ok(batch
            .iter()
            .map(|(header, entries)| inner.push_transaction(header, entries))
            .collect())
    }

    fn transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        Ok(self.read()?.transactions.iter().find(|t| t.id == id).cloned())
    }

    fn transactions(&self, owner: &OwnerId) -> StoreResult<Vec<Transaction>> {
        let mut out: Vec<Transaction> = self
            .read()?
            .transactions
            .iter()
            .filter(|t| t.owner_id == *owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    fn reversal_of(&self, id: TransactionId) -> StoreResult<Option<TransactionId>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .find(|t| t.reverses == Some(id))
            .map(|t| t.id))
    }

    fn query_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<PostedEntry>> {
        let mut out: Vec<PostedEntry> = self
            .read()?
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then(a.seq.cmp(&b.seq)));
        Ok(out)
    }

    fn insert_debt(&self, new: NewDebt) -> StoreResult<Debt> {
        let mut inner = self.write()?;
        let debt = Debt {
            id: DebtId(inner.debts.len() as i64 + 1),
            owner_id: new.owner_id,
            name: new.name,
            liability_account_id: new.liability_account_id,
            principal: new.principal,
            current_balance: new.current_balance,
            interest_rate: new.interest_rate,
            rate_frequency: new.rate_frequency,
            repayment_method: new.repayment_method,
            payment_amount: new.payment_amount,
            payment_frequency: new.payment_frequency,
            start_date: new.start_date,
            total_periods: new.total_periods,
        };
        inner.debts.push(debt.clone());
        Ok(debt)
    }

    fn debt(&self, id: DebtId) -> StoreResult<Option<Debt>> {
        Ok(self.read()?.debts.iter().find(|d| d.id == id).cloned())
    }

    fn debts(&self, owner: &OwnerId) -> StoreResult<Vec<Debt>> {
        Ok(self
            .read()?
            .debts
            .iter()
            .filter(|d| d.owner_id == *owner)
            .cloned()
            .collect())
    }

    fn set_debt_balance(&self, id: DebtId, balance: Money) -> StoreResult<()> {
        let mut inner = self.write()?;
        let debt = inner
            .debts
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("debt {}", id)))?;
        debt.current_balance = balance;
        Ok(())
    }
}
