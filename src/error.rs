// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

use crate::models::{AccountId, AccountType, DebtId, TransactionId};
use crate::money::{Money, MoneyError};

/// A rule a posting broke. Nothing has been written when one of these is returned.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Transaction needs at least 2 entries, got {count}")]
    TooFewEntries { count: usize },
    #[error("Transaction must touch at least 2 distinct accounts")]
    SingleAccount,
    #[error("Entry amount on account {account} must be positive, got {amount}")]
    NonPositiveAmount { account: AccountId, amount: Money },
    #[error("Entry amount {amount} exceeds {minor_units} decimal places")]
    ExcessPrecision { amount: Money, minor_units: u32 },
    #[error("Amount {amount} on account {account} is outside the supported range")]
    AmountOutOfRange { account: AccountId, amount: Money },
    #[error("Transaction is unbalanced: debits ({debits}) != credits ({credits})")]
    Unbalanced { debits: Money, credits: Money },
    #[error("Unknown account {0}")]
    UnknownAccount(AccountId),
    #[error("Account {0} belongs to another owner")]
    ForeignAccount(AccountId),
    #[error("Account {0} is inactive")]
    InactiveAccount(AccountId),
    #[error("Account {account} is {found}, expected {expected}")]
    AccountTypeMismatch {
        account: AccountId,
        expected: &'static str,
        found: AccountType,
    },
    #[error("Account {0} is referenced by ledger entries and cannot be removed")]
    AccountInUse(AccountId),
    #[error("Account {0} is managed by the ledger")]
    SystemAccount(AccountId),
    #[error("Account type {0} is reserved for ledger-managed accounts")]
    ReservedType(AccountType),
    #[error("An account named '{0}' already exists")]
    DuplicateName(String),
    #[error("Account name must not be empty")]
    EmptyName,
    #[error("Amount must be positive, got {0}")]
    NonPositive(Money),
    #[error("{0} is too large to compute")]
    Overflow(String),
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),
    #[error("Unknown transaction {0}")]
    UnknownTransaction(TransactionId),
    #[error("Transaction {0} has already been voided")]
    AlreadyVoided(TransactionId),
    #[error("Transaction {0} is a reversal and cannot be voided")]
    VoidOfReversal(TransactionId),
    #[error("Unknown debt {0}")]
    UnknownDebt(DebtId),
    #[error("Repayment method {0} has no viable schedule")]
    InfeasibleMethod(crate::models::RepaymentMethod),
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// The stored books disagree with themselves. Never corrected automatically.
#[derive(Debug, Error, PartialEq)]
pub enum IntegrityViolation {
    #[error("Transaction {id} is unbalanced in storage: debits ({debits}) != credits ({credits})")]
    UnbalancedTransaction {
        id: TransactionId,
        debits: Money,
        credits: Money,
    },
    #[error("Transaction {id} has {count} entries in storage")]
    TooFewEntries { id: TransactionId, count: usize },
    #[error("Entry references unknown account {account} in transaction {id}")]
    DanglingEntry { id: TransactionId, account: AccountId },
    #[error("Balance of account {account} differs: replay {replayed}, incremental {incremental}")]
    ReplayMismatch {
        account: AccountId,
        replayed: Money,
        incremental: Money,
    },
    #[error("Debt {debt} cached balance {cached} differs from ledger balance {derived}")]
    CachedBalanceMismatch {
        debt: DebtId,
        cached: Money,
        derived: Money,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, LedgerError::Integrity(_))
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        LedgerError::Validation(ValidationError::Money(err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
