// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::error::{LedgerError, Result, StoreError, ValidationError};
use crate::ledger::projector::Projector;
use crate::ledger::shapes::{reversal_entries, Drafted, Posting, ShapeContext, WindfallSplit};
use crate::ledger::store::LedgerStore;
use crate::ledger::validator;
use crate::models::{
    Account, AccountId, AccountPatch, AccountType, EntryDraft, EntryFilter, NewAccount,
    NewTransaction, OwnerId, SystemAccount, Transaction, TransactionId,
};
use crate::money::{Money, DEFAULT_MINOR_UNITS};

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub minor_units: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            minor_units: DEFAULT_MINOR_UNITS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionHeader {
    pub date: NaiveDate,
    pub description: String,
    pub notes: Option<String>,
}

impl TransactionHeader {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            date,
            description: description.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    Committed(TransactionId),
    NoChange { reason: String },
}

impl PostOutcome {
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            PostOutcome::Committed(id) => Some(*id),
            PostOutcome::NoChange { .. } => None,
        }
    }
}

/// One mutex per owner. Same-owner commits serialize; different owners never
/// wait on each other.
#[derive(Default)]
struct OwnerLocks {
    locks: Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    fn handle(&self, owner: &OwnerId) -> Result<Arc<Mutex<()>>> {
        let mut map = self.locks.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.entry(owner.clone()).or_default().clone())
    }
}

fn acquire(handle: &Mutex<()>) -> Result<MutexGuard<'_, ()>> {
    handle
        .lock()
        .map_err(|_| LedgerError::Store(StoreError::Poisoned))
}

/// Validate-then-commit front door to the books.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
    locks: OwnerLocks,
}

struct Context<'a> {
    ledger: &'a Ledger,
    owner: &'a OwnerId,
}

impl ShapeContext for Context<'_> {
    fn account(&self, id: AccountId) -> Result<Account> {
        self.ledger.owned_account(self.owner, id)
    }

    fn system_account(&self, kind: SystemAccount) -> Result<AccountId> {
        self.ledger.ensure_system_account(self.owner, kind)
    }

    fn balance_as_of(&self, id: AccountId, date: NaiveDate) -> Result<Money> {
        self.ledger.projector().balance_as_of(self.owner, id, date)
    }

    fn minor_units(&self) -> u32 {
        self.ledger.config.minor_units
    }
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            locks: OwnerLocks::default(),
        }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn projector(&self) -> Projector<'_> {
        Projector::new(self.store.as_ref())
    }

    pub fn minor_units(&self) -> u32 {
        self.config.minor_units
    }

    /// Parses a user-supplied amount at this ledger's precision.
    pub fn parse_amount(&self, s: &str) -> Result<Money> {
        Ok(Money::parse(s, self.config.minor_units)?)
    }

    // ---- account registry ----

    /// Names are unique per owner, ignoring ASCII case. The check and the
    /// insert run under the owner's lock.
    pub fn open_account(
        &self,
        owner: &OwnerId,
        name: &str,
        account_type: AccountType,
        category: Option<String>,
        opened_at: NaiveDate,
    ) -> Result<Account> {
        let handle = self.locks.handle(owner)?;
        let _guard = acquire(&handle)?;
        self.open_account_locked(owner, name, account_type, category, opened_at)
    }

    /// Opens an account and posts the transaction that funds it as one step.
    /// `funding` builds the posting once the account id is known. If drafting,
    /// validating or appending fails the account is deleted again and the
    /// posting's error is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn open_funded_account(
        &self,
        owner: &OwnerId,
        name: &str,
        account_type: AccountType,
        category: Option<String>,
        opened_at: NaiveDate,
        description: Option<&str>,
        funding: impl FnOnce(&Account) -> Posting,
    ) -> Result<(Account, PostOutcome)> {
        let handle = self.locks.handle(owner)?;
        let _guard = acquire(&handle)?;
        let account = self.open_account_locked(owner, name, account_type, category, opened_at)?;
        let posting = funding(&account);
        match self.post_locked(owner, opened_at, description, &posting) {
            Ok(outcome) => Ok((account, outcome)),
            Err(err) => {
                match self.store.delete_account(account.id) {
                    Ok(()) => {
                        info!(owner = %owner, account = %account.id, %err, "account withdrawn, funding rejected")
                    }
                    Err(cleanup) => {
                        error!(owner = %owner, account = %account.id, %err, %cleanup, "funding rejected and account could not be withdrawn")
                    }
                }
                Err(err)
            }
        }
    }

    fn open_account_locked(
        &self,
        owner: &OwnerId,
        name: &str,
        account_type: AccountType,
        category: Option<String>,
        opened_at: NaiveDate,
    ) -> Result<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if account_type == AccountType::Equity {
            return Err(ValidationError::ReservedType(account_type).into());
        }
        if self.account_by_name(owner, name)?.is_some() {
            return Err(ValidationError::DuplicateName(name.to_string()).into());
        }
        let account = self.store.insert_account(NewAccount {
            owner_id: owner.clone(),
            name: name.to_string(),
            r#type: account_type,
            category,
            opened_at,
            system: None,
        })?;
        info!(owner = %owner, account = %account.id, kind = %account_type, "account opened");
        Ok(account)
    }

    pub fn owned_account(&self, owner: &OwnerId, id: AccountId) -> Result<Account> {
        let account = self
            .store
            .account(id)?
            .ok_or(ValidationError::UnknownAccount(id))?;
        if account.owner_id != *owner {
            return Err(ValidationError::ForeignAccount(id).into());
        }
        Ok(account)
    }

    pub fn accounts(&self, owner: &OwnerId) -> Result<Vec<Account>> {
        Ok(self.store.accounts(owner)?)
    }

    pub fn account_by_name(&self, owner: &OwnerId, name: &str) -> Result<Option<Account>> {
        let wanted = name.trim();
        Ok(self
            .store
            .accounts(owner)?
            .into_iter()
            .find(|a| a.name.eq_ignore_ascii_case(wanted)))
    }

    /// Renames or recategorizes. The account type is fixed at creation.
    pub fn update_account(&self, owner: &OwnerId, id: AccountId, mut patch: AccountPatch) -> Result<()> {
        let handle = self.locks.handle(owner)?;
        let _guard = acquire(&handle)?;
        let account = self.owned_account(owner, id)?;
        if account.system.is_some() {
            return Err(ValidationError::SystemAccount(id).into());
        }
        if let Some(name) = patch.name.as_deref().map(str::trim) {
            if name.is_empty() {
                return Err(ValidationError::EmptyName.into());
            }
            if self.account_by_name(owner, name)?.is_some_and(|a| a.id != id) {
                return Err(ValidationError::DuplicateName(name.to_string()).into());
            }
            patch.name = Some(name.to_string());
        }
        self.store.update_account(id, &patch)?;
        Ok(())
    }

    pub fn deactivate_account(&self, owner: &OwnerId, id: AccountId) -> Result<()> {
        self.owned_account(owner, id)?;
        self.store.set_account_active(id, false)?;
        info!(owner = %owner, account = %id, "account deactivated");
        Ok(())
    }

    pub fn reactivate_account(&self, owner: &OwnerId, id: AccountId) -> Result<()> {
        self.owned_account(owner, id)?;
        self.store.set_account_active(id, true)?;
        Ok(())
    }

    /// Hard delete, only for accounts no entry has ever touched.
    pub fn remove_account(&self, owner: &OwnerId, id: AccountId) -> Result<()> {
        let handle = self.locks.handle(owner)?;
        let _guard = acquire(&handle)?;
        let account = self.owned_account(owner, id)?;
        if account.system.is_some() {
            return Err(ValidationError::SystemAccount(id).into());
        }
        let referenced = !self
            .store
            .query_entries(&EntryFilter::owner(owner).account(id))?
            .is_empty();
        if referenced {
            return Err(ValidationError::AccountInUse(id).into());
        }
        self.store.delete_account(id)?;
        info!(owner = %owner, account = %id, "account removed");
        Ok(())
    }

    pub fn ensure_system_account(&self, owner: &OwnerId, kind: SystemAccount) -> Result<AccountId> {
        if let Some(existing) = self.store.system_account(owner, kind)? {
            return Ok(existing.id);
        }
        let account = self.store.insert_account(NewAccount {
            owner_id: owner.clone(),
            name: kind.name().to_string(),
            r#type: AccountType::Equity,
            category: None,
            opened_at: chrono::Utc::now().date_naive(),
            system: Some(kind),
        })?;
        debug!(owner = %owner, account = %account.id, kind = kind.key(), "system account created");
        Ok(account.id)
    }

    // ---- commits ----

    /// Validates and appends one balanced transaction.
    pub fn commit(
        &self,
        owner: &OwnerId,
        header: TransactionHeader,
        entries: Vec<EntryDraft>,
    ) -> Result<TransactionId> {
        let handle = self.locks.handle(owner)?;
        let _guard = acquire(&handle)?;
        self.commit_locked(owner, &header, &entries, None)
    }

    fn commit_locked(
        &self,
        owner: &OwnerId,
        header: &TransactionHeader,
        entries: &[EntryDraft],
        reverses: Option<TransactionId>,
    ) -> Result<TransactionId> {
        if let Err(err) = validator::validate(self.store.as_ref(), owner, entries, self.config.minor_units) {
            if let LedgerError::Validation(rule) = &err {
                warn!(owner = %owner, %rule, "transaction rejected");
            }
            return Err(err);
        }
        self.append_locked(owner, header, entries, reverses)
    }

    fn append_locked(
        &self,
        owner: &OwnerId,
        header: &TransactionHeader,
        entries: &[EntryDraft],
        reverses: Option<TransactionId>,
    ) -> Result<TransactionId> {
        let id = self
            .store
            .append_transaction(&Self::new_transaction(owner, header, reverses), entries)?;
        info!(owner = %owner, transaction = %id, entries = entries.len(), date = %header.date, "transaction committed");
        self.after_commit(owner, entries.iter().map(|e| e.account_id).collect());
        Ok(id)
    }

    fn new_transaction(owner: &OwnerId, header: &TransactionHeader, reverses: Option<TransactionId>) -> NewTransaction {
        NewTransaction {
            owner_id: owner.clone(),
            date: header.date,
            description: header.description.clone(),
            notes: header.notes.clone(),
            reverses,
        }
    }

    /// Runs once the append is durable, so it never turns a commit into an
    /// error. A cache left stale is reported by `verify` and fixed by
    /// `plan::refresh_balance`.
    fn after_commit(&self, owner: &OwnerId, touched: HashSet<AccountId>) {
        if let Err(err) = self.refresh_debt_caches(owner, &touched) {
            warn!(owner = %owner, %err, "debt balance cache left stale");
        }
    }

    /// Recomputes the cached balance of every debt whose liability was touched.
    fn refresh_debt_caches(&self, owner: &OwnerId, touched: &HashSet<AccountId>) -> Result<()> {
        for debt in self.store.debts(owner)? {
            if touched.contains(&debt.liability_account_id) {
                let balance = self.projector().balance(owner, debt.liability_account_id)?;
                self.store.set_debt_balance(debt.id, balance)?;
            }
        }
        Ok(())
    }

    fn header_for(posting: &Posting, date: NaiveDate, description: Option<&str>) -> TransactionHeader {
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(posting.default_description());
        TransactionHeader::new(date, description)
    }

    /// Drafts a shaped posting and commits it. Shapes that would change nothing
    /// (a zero adjustment) report that instead of committing.
    pub fn post(
        &self,
        owner: &OwnerId,
        date: NaiveDate,
        description: Option<&str>,
        posting: &Posting,
    ) -> Result<PostOutcome> {
        let handle = self.locks.handle(owner)?;
        let _guard = acquire(&handle)?;
        self.post_locked(owner, date, description, posting)
    }

    fn post_locked(
        &self,
        owner: &OwnerId,
        date: NaiveDate,
        description: Option<&str>,
        posting: &Posting,
    ) -> Result<PostOutcome> {
        let ctx = Context {
            ledger: self,
            owner,
        };
        match posting.draft(&ctx, date)? {
            Drafted::NoChange { reason } => {
                debug!(owner = %owner, shape = posting.label(), %reason, "posting skipped");
                Ok(PostOutcome::NoChange { reason })
            }
            Drafted::Entries { entries, notes } => {
                let mut header = Self::header_for(posting, date, description);
                header.notes = notes;
                let id = self.commit_locked(owner, &header, &entries, None)?;
                Ok(PostOutcome::Committed(id))
            }
        }
    }

    /// Posts a windfall and its allocations as separate balanced transactions.
    /// Every leg is validated first, then all of them are appended in one
    /// store batch: either every leg commits or none does.
    pub fn post_split(
        &self,
        owner: &OwnerId,
        date: NaiveDate,
        description: Option<&str>,
        split: &WindfallSplit,
    ) -> Result<Vec<TransactionId>> {
        let handle = self.locks.handle(owner)?;
        let _guard = acquire(&handle)?;
        let ctx = Context {
            ledger: self,
            owner,
        };
        let mut batch = Vec::new();
        for leg in split.legs(&ctx, self.config.minor_units)? {
            if let Drafted::Entries { entries, .. } = leg.draft(&ctx, date)? {
                validator::validate(self.store.as_ref(), owner, &entries, self.config.minor_units)?;
                let header = Self::header_for(&leg, date, description);
                batch.push((Self::new_transaction(owner, &header, None), entries));
            }
        }
        let ids = self.store.append_batch(&batch)?;
        info!(owner = %owner, transactions = ids.len(), date = %date, "windfall split committed");
        self.after_commit(
            owner,
            batch
                .iter()
                .flat_map(|(_, entries)| entries.iter().map(|e| e.account_id))
                .collect(),
        );
        Ok(ids)
    }

    /// Appends the compensating transaction for `id`. History is never edited.
    pub fn void(&self, owner: &OwnerId, id: TransactionId, date: NaiveDate) -> Result<TransactionId> {
        let handle = self.locks.handle(owner)?;
        let _guard = acquire(&handle)?;
        let original = self.transaction(owner, id)?;
        if original.reverses.is_some() {
            return Err(ValidationError::VoidOfReversal(id).into());
        }
        if self.store.reversal_of(id)?.is_some() {
            return Err(ValidationError::AlreadyVoided(id).into());
        }
        let header = TransactionHeader::new(date, format!("Void: {}", original.description))
            .with_notes(format!("reverses transaction {}", id));
        let entries = reversal_entries(&original.entries);
        self.commit_locked(owner, &header, &entries, Some(id))
    }

    pub fn transaction(&self, owner: &OwnerId, id: TransactionId) -> Result<Transaction> {
        match self.store.transaction(id)? {
            Some(t) if t.owner_id == *owner => Ok(t),
            _ => Err(ValidationError::UnknownTransaction(id).into()),
        }
    }

    pub fn transactions(&self, owner: &OwnerId) -> Result<Vec<Transaction>> {
        Ok(self.store.transactions(owner)?)
    }
}
