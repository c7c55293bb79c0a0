// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use ledgerwise::debt::compare::{compare_all, DebtInputs};
use ledgerwise::debt::plan::{self, Funding};
use ledgerwise::error::{IntegrityViolation, LedgerError, StoreError};
use ledgerwise::ledger::store::StoreResult;
use ledgerwise::ledger::{
    Allocation, Ledger, LedgerConfig, LedgerStore, MemoryStore, PostOutcome, WindfallSplit,
};
use ledgerwise::models::{
    Account, AccountId, AccountPatch, AccountType, Debt, DebtId, EntryDraft, EntryFilter,
    NewAccount, NewDebt, NewTransaction, OwnerId, PaymentFrequency, PostedEntry, RateFrequency,
    RepaymentMethod, SystemAccount, Transaction, TransactionId,
};
use ledgerwise::money::Money;
use rust_decimal_macros::dec;

/// A `MemoryStore` whose batch appends or cache writes can be switched off.
#[derive(Default)]
struct Flaky {
    inner: MemoryStore,
    batches_fail: AtomicBool,
    cache_writes_fail: AtomicBool,
}

fn refused(what: &str) -> StoreError {
    StoreError::NotFound(format!("{} refused", what))
}

impl LedgerStore for Flaky {
    fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        self.inner.insert_account(account)
    }
    fn account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.inner.account(id)
    }
    fn accounts(&self, owner: &OwnerId) -> StoreResult<Vec<Account>> {
        self.inner.accounts(owner)
    }
    fn system_account(&self, owner: &OwnerId, kind: SystemAccount) -> StoreResult<Option<Account>> {
        self.inner.system_account(owner, kind)
    }
    fn update_account(&self, id: AccountId, patch: &AccountPatch) -> StoreResult<()> {
        self.inner.update_account(id, patch)
    }
    fn set_account_active(&self, id: AccountId, active: bool) -> StoreResult<()> {
        self.inner.set_account_active(id, active)
    }
    fn delete_account(&self, id: AccountId) -> StoreResult<()> {
        self.inner.delete_account(id)
    }
    fn append_transaction(&self, header: &NewTransaction, entries: &[EntryDraft]) -> StoreResult<TransactionId> {
        self.inner.append_transaction(header, entries)
    }
    fn append_batch(&self, batch: &[(NewTransaction, Vec<EntryDraft>)]) -> StoreResult<Vec<TransactionId>> {
        if self.batches_fail.load(Ordering::SeqCst) {
            return Err(refused("batch"));
        }
        self.inner.append_batch(batch)
    }
    fn transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        self.inner.transaction(id)
    }
    fn transactions(&self, owner: &OwnerId) -> StoreResult<Vec<Transaction>> {
        self.inner.transactions(owner)
    }
    fn reversal_of(&self, id: TransactionId) -> StoreResult<Option<TransactionId>> {
        self.inner.reversal_of(id)
    }
    fn query_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<PostedEntry>> {
        self.inner.query_entries(filter)
    }
    fn insert_debt(&self, debt: NewDebt) -> StoreResult<Debt> {
        self.inner.insert_debt(debt)
    }
    fn debt(&self, id: DebtId) -> StoreResult<Option<Debt>> {
        self.inner.debt(id)
    }
    fn debts(&self, owner: &OwnerId) -> StoreResult<Vec<Debt>> {
        self.inner.debts(owner)
    }
    fn set_debt_balance(&self, id: DebtId, balance: Money) -> StoreResult<()> {
        if self.cache_writes_fail.load(Ordering::SeqCst) {
            return Err(refused("cache write"));
        }
        self.inner.set_debt_balance(id, balance)
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
}

fn books() -> (Arc<Flaky>, Ledger) {
    let store = Arc::new(Flaky::default());
    let ledger = Ledger::new(store.clone(), LedgerConfig::default());
    (store, ledger)
}

#[test]
fn split_is_written_as_one_batch() {
    let (store, l) = books();
    let o = OwnerId::new("o");
    let checking = l.open_account(&o, "Checking", AccountType::Asset, None, day(1)).unwrap();
    let savings = l.open_account(&o, "Savings", AccountType::Asset, None, day(1)).unwrap();
    let bonus = l.open_account(&o, "Bonus", AccountType::Income, None, day(1)).unwrap();
    let split = WindfallSplit {
        deposit: checking.id,
        income: bonus.id,
        amount: Money::new(dec!(800)),
        allocations: vec![Allocation { target: savings.id, share: dec!(0.25) }],
    };

    store.batches_fail.store(true, Ordering::SeqCst);
    let err = l.post_split(&o, day(2), None, &split).unwrap_err();
    assert!(matches!(err, LedgerError::Store(_)));
    // neither the deposit nor the transfer was written
    assert!(l.transactions(&o).unwrap().is_empty());

    store.batches_fail.store(false, Ordering::SeqCst);
    let ids = l.post_split(&o, day(2), None, &split).unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(l.projector().balance(&o, savings.id).unwrap(), Money::new(dec!(200)));
}

#[test]
fn committed_payment_survives_a_failed_cache_write() {
    let (store, l) = books();
    let o = OwnerId::new("o");
    let checking = l.open_account(&o, "Checking", AccountType::Asset, None, day(1)).unwrap();
    let inputs = DebtInputs {
        principal: Money::new(dec!(1200)),
        rate: dec!(12),
        rate_frequency: RateFrequency::Annual,
        payment_frequency: PaymentFrequency::Monthly,
        start_date: day(1),
        term_periods: 12,
        stated_minimum: None,
        cash_flow: None,
        max_periods: 600,
        long_horizon_periods: 360,
        minor_units: 2,
    };
    let c = compare_all(&inputs);
    let debt = plan::adopt(&l, &o, "Loan", &inputs, c.get(RepaymentMethod::FixedTerm).unwrap(), Funding::Proceeds(checking.id))
        .unwrap();

    store.cache_writes_fail.store(true, Ordering::SeqCst);
    let outcome = plan::record_payment(&l, &o, debt.id, checking.id, None, day(30)).unwrap();
    assert!(matches!(outcome, PostOutcome::Committed(_)));
    assert_eq!(
        l.projector().balance(&o, debt.liability_account_id).unwrap(),
        Money::new(dec!(1093.38))
    );
    // the stale cache is an integrity finding, not a lost payment
    assert!(matches!(
        l.projector().verify(&o),
        Err(LedgerError::Integrity(IntegrityViolation::CachedBalanceMismatch { .. }))
    ));

    store.cache_writes_fail.store(false, Ordering::SeqCst);
    assert_eq!(plan::refresh_balance(&l, &o, debt.id).unwrap(), Money::new(dec!(1093.38)));
    l.projector().verify(&o).unwrap();
}
