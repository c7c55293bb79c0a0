// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(AccountId);
id_type!(TransactionId);
id_type!(DebtId);

/// Owner of a set of books, as handed to us by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Debit => "debit",
            Side::Credit => "credit",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit" | "dr" => Ok(Side::Debit),
            "credit" | "cr" => Ok(Side::Credit),
            other => Err(format!("Unknown entry side '{}'", other)),
        }
    }
}

/// Equity is reserved for the system-managed offset accounts
/// (opening balances, reconciliation); users open the other four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Income,
    Expense,
    Equity,
}

impl AccountType {
    /// The side that increases an account of this type.
    pub fn normal_side(self) -> Side {
        match self {
            AccountType::Asset | AccountType::Expense => Side::Debit,
            AccountType::Liability | AccountType::Income | AccountType::Equity => Side::Credit,
        }
    }

    /// Amount as seen from this account's point of view.
    pub fn signed(self, side: Side, amount: Money) -> Money {
        if side == self.normal_side() {
            amount
        } else {
            -amount
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Income => "income",
            AccountType::Expense => "expense",
            AccountType::Equity => "equity",
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "income" => Ok(AccountType::Income),
            "expense" => Ok(AccountType::Expense),
            "equity" => Ok(AccountType::Equity),
            other => Err(format!("Unknown account type '{}'", other)),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System accounts created on demand for each owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemAccount {
    OpeningBalances,
    Reconciliation,
}

impl SystemAccount {
    pub fn name(self) -> &'static str {
        match self {
            SystemAccount::OpeningBalances => "Opening Balances",
            SystemAccount::Reconciliation => "Reconciliation",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            SystemAccount::OpeningBalances => "opening_balances",
            SystemAccount::Reconciliation => "reconciliation",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "opening_balances" => Some(SystemAccount::OpeningBalances),
            "reconciliation" => Some(SystemAccount::Reconciliation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: OwnerId,
    pub name: String,
    pub r#type: AccountType,
    pub category: Option<String>,
    pub is_active: bool,
    pub opened_at: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemAccount>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner_id: OwnerId,
    pub name: String,
    pub r#type: AccountType,
    pub category: Option<String>,
    pub opened_at: NaiveDate,
    pub system: Option<SystemAccount>,
}

/// Fields of an account that may change after creation. Type is not one of them.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub category: Option<Option<String>>,
}

/// One leg of a transaction before it is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub account_id: AccountId,
    pub side: Side,
    pub amount: Money,
}

impl EntryDraft {
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            side: Side::Debit,
            amount,
        }
    }

    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            side: Side::Credit,
            amount,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub owner_id: OwnerId,
    pub date: NaiveDate,
    pub description: String,
    pub notes: Option<String>,
    pub reverses: Option<TransactionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub side: Side,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner_id: OwnerId,
    pub date: NaiveDate,
    pub description: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverses: Option<TransactionId>,
    pub entries: Vec<Entry>,
}

/// An entry joined with the header fields needed to fold balances.
/// `seq` is the commit order and breaks ties between same-date transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedEntry {
    pub seq: i64,
    pub transaction_id: TransactionId,
    pub owner_id: OwnerId,
    pub date: NaiveDate,
    pub account_id: AccountId,
    pub side: Side,
    pub amount: Money,
}

#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub owner_id: Option<OwnerId>,
    pub account_id: Option<AccountId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl EntryFilter {
    pub fn owner(owner: &OwnerId) -> Self {
        Self {
            owner_id: Some(owner.clone()),
            ..Self::default()
        }
    }

    pub fn account(mut self, id: AccountId) -> Self {
        self.account_id = Some(id);
        self
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.to = Some(date);
        self
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.from = Some(date);
        self
    }

    pub fn matches(&self, e: &PostedEntry) -> bool {
        self.owner_id.as_ref().is_none_or(|o| *o == e.owner_id)
            && self.account_id.is_none_or(|a| a == e.account_id)
            && self.from.is_none_or(|d| e.date >= d)
            && self.to.is_none_or(|d| e.date <= d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateFrequency {
    Annual,
    Monthly,
}

impl RateFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            RateFrequency::Annual => "annual",
            RateFrequency::Monthly => "monthly",
        }
    }
}

impl FromStr for RateFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "annual" | "yearly" => Ok(RateFrequency::Annual),
            "monthly" => Ok(RateFrequency::Monthly),
            other => Err(format!("Unknown rate frequency '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentFrequency {
    Weekly,
    Fortnightly,
    Monthly,
    Quarterly,
    Annually,
}

impl PaymentFrequency {
    pub fn periods_per_year(self) -> u32 {
        match self {
            PaymentFrequency::Weekly => 52,
            PaymentFrequency::Fortnightly => 26,
            PaymentFrequency::Monthly => 12,
            PaymentFrequency::Quarterly => 4,
            PaymentFrequency::Annually => 1,
        }
    }

    /// Date of the `n`th payment after `start`, always computed from `start`
    /// so month-end dates do not drift.
    pub fn nth_date(self, start: NaiveDate, n: u32) -> Option<NaiveDate> {
        use chrono::{Days, Months};
        match self {
            PaymentFrequency::Weekly => start.checked_add_days(Days::new(7 * u64::from(n))),
            PaymentFrequency::Fortnightly => start.checked_add_days(Days::new(14 * u64::from(n))),
            PaymentFrequency::Monthly => start.checked_add_months(Months::new(n)),
            PaymentFrequency::Quarterly => start.checked_add_months(Months::new(3 * n)),
            PaymentFrequency::Annually => start.checked_add_months(Months::new(12 * n)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentFrequency::Weekly => "weekly",
            PaymentFrequency::Fortnightly => "fortnightly",
            PaymentFrequency::Monthly => "monthly",
            PaymentFrequency::Quarterly => "quarterly",
            PaymentFrequency::Annually => "annually",
        }
    }
}

impl FromStr for PaymentFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(PaymentFrequency::Weekly),
            "fortnightly" | "biweekly" => Ok(PaymentFrequency::Fortnightly),
            "monthly" => Ok(PaymentFrequency::Monthly),
            "quarterly" => Ok(PaymentFrequency::Quarterly),
            "annually" | "yearly" => Ok(PaymentFrequency::Annually),
            other => Err(format!("Unknown payment frequency '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentMethod {
    FixedTerm,
    Minimum,
    Aggressive,
}

impl RepaymentMethod {
    pub const ALL: [RepaymentMethod; 3] = [
        RepaymentMethod::FixedTerm,
        RepaymentMethod::Minimum,
        RepaymentMethod::Aggressive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RepaymentMethod::FixedTerm => "fixed_term",
            RepaymentMethod::Minimum => "minimum",
            RepaymentMethod::Aggressive => "aggressive",
        }
    }
}

impl FromStr for RepaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fixed_term" | "fixed" => Ok(RepaymentMethod::FixedTerm),
            "minimum" | "min" => Ok(RepaymentMethod::Minimum),
            "aggressive" => Ok(RepaymentMethod::Aggressive),
            other => Err(format!("Unknown repayment method '{}'", other)),
        }
    }
}

impl fmt::Display for RepaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub id: DebtId,
    pub owner_id: OwnerId,
    pub name: String,
    pub liability_account_id: AccountId,
    pub principal: Money,
    /// Cache of the liability account's projected balance.
    pub current_balance: Money,
    pub interest_rate: rust_decimal::Decimal,
    pub rate_frequency: RateFrequency,
    pub repayment_method: RepaymentMethod,
    pub payment_amount: Money,
    pub payment_frequency: PaymentFrequency,
    pub start_date: NaiveDate,
    pub total_periods: u32,
}

#[derive(Debug, Clone)]
pub struct NewDebt {
    pub owner_id: OwnerId,
    pub name: String,
    pub liability_account_id: AccountId,
    pub principal: Money,
    pub current_balance: Money,
    pub interest_rate: rust_decimal::Decimal,
    pub rate_frequency: RateFrequency,
    pub repayment_method: RepaymentMethod,
    pub payment_amount: Money,
    pub payment_frequency: PaymentFrequency,
    pub start_date: NaiveDate,
    pub total_periods: u32,
}
