// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The closed set of posting shapes. Each one turns into entry drafts before
//! it reaches the generic commit path.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, ValidationError};
use crate::models::{Account, AccountId, AccountType, EntryDraft, SystemAccount};
use crate::money::Money;

/// What a shape needs to know about the books to draft its entries.
pub trait ShapeContext {
    fn account(&self, id: AccountId) -> Result<Account, LedgerError>;
    fn system_account(&self, kind: SystemAccount) -> Result<AccountId, LedgerError>;
    fn balance_as_of(&self, id: AccountId, date: NaiveDate) -> Result<Money, LedgerError>;
    fn minor_units(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Posting {
    Manual {
        entries: Vec<EntryDraft>,
    },
    /// Starting balance of a fresh account, offset against opening-balance equity.
    /// A negative amount opens an overdrawn asset or a credit-balance liability.
    OpeningBalance {
        account: AccountId,
        amount: Money,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Money,
    },
    Expense {
        from: AccountId,
        expense: AccountId,
        amount: Money,
    },
    Income {
        to: AccountId,
        income: AccountId,
        amount: Money,
    },
    /// Moves `account` to `stated_actual` as of the posting date.
    Adjustment {
        account: AccountId,
        stated_actual: Money,
    },
    /// With `up_to_owed`, `amount` is capped at what the liability stands at
    /// on the posting date, read while the posting holds the owner's lock.
    DebtPayment {
        liability: AccountId,
        from: AccountId,
        amount: Money,
        #[serde(default)]
        up_to_owed: bool,
    },
    /// One period of interest on the liability's balance at the posting date.
    InterestAccrual {
        liability: AccountId,
        expense: AccountId,
        /// Fraction per period, `0.01` for 1%.
        periodic_rate: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Drafted {
    Entries {
        entries: Vec<EntryDraft>,
        notes: Option<String>,
    },
    NoChange {
        reason: String,
    },
}

fn expect_type(
    account: &Account,
    allowed: &[AccountType],
    expected: &'static str,
) -> Result<(), ValidationError> {
    if allowed.contains(&account.r#type) {
        Ok(())
    } else {
        Err(ValidationError::AccountTypeMismatch {
            account: account.id,
            expected,
            found: account.r#type,
        })
    }
}

fn positive(amount: Money) -> Result<Money, ValidationError> {
    if amount.is_positive() {
        Ok(amount)
    } else {
        Err(ValidationError::NonPositive(amount))
    }
}

/// Two legs that move `account` by `delta` in its own sign convention.
fn move_against(account: &Account, offset: AccountId, delta: Money) -> Vec<EntryDraft> {
    let side = if delta.is_positive() {
        account.r#type.normal_side()
    } else {
        account.r#type.normal_side().opposite()
    };
    let amount = delta.abs();
    vec![
        EntryDraft {
            account_id: account.id,
            side,
            amount,
        },
        EntryDraft {
            account_id: offset,
            side: side.opposite(),
            amount,
        },
    ]
}

impl Posting {
    pub fn label(&self) -> &'static str {
        match self {
            Posting::Manual { .. } => "manual",
            Posting::OpeningBalance { .. } => "opening_balance",
            Posting::Transfer { .. } => "transfer",
            Posting::Expense { .. } => "expense",
            Posting::Income { .. } => "income",
            Posting::Adjustment { .. } => "adjustment",
            Posting::DebtPayment { .. } => "debt_payment",
            Posting::InterestAccrual { .. } => "interest_accrual",
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            Posting::Manual { .. } => "Journal entry",
            Posting::OpeningBalance { .. } => "Opening balance",
            Posting::Transfer { .. } => "Transfer",
            Posting::Expense { .. } => "Expense",
            Posting::Income { .. } => "Income",
            Posting::Adjustment { .. } => "Balance adjustment",
            Posting::DebtPayment { .. } => "Debt payment",
            Posting::InterestAccrual { .. } => "Interest accrued",
        }
    }

    pub fn draft(&self, ctx: &dyn ShapeContext, date: NaiveDate) -> Result<Drafted, LedgerError> {
        const BALANCE_SHEET: &[AccountType] = &[AccountType::Asset, AccountType::Liability];

        let entries = match self {
            Posting::Manual { entries } => entries.clone(),
            Posting::OpeningBalance { account, amount } => {
                let account = ctx.account(*account)?;
                expect_type(&account, BALANCE_SHEET, "asset or liability")?;
                if amount.is_zero() {
                    return Ok(Drafted::NoChange {
                        reason: format!("Opening balance of '{}' is zero", account.name),
                    });
                }
                let equity = ctx.system_account(SystemAccount::OpeningBalances)?;
                move_against(&account, equity, *amount)
            }
            Posting::Transfer { from, to, amount } => {
                let amount = positive(*amount)?;
                let source = ctx.account(*from)?;
                let target = ctx.account(*to)?;
                expect_type(&source, &[AccountType::Asset], "asset")?;
                expect_type(&target, &[AccountType::Asset], "asset")?;
                vec![
                    EntryDraft::debit(target.id, amount),
                    EntryDraft::credit(source.id, amount),
                ]
            }
            Posting::Expense {
                from,
                expense,
                amount,
            } => {
                let amount = positive(*amount)?;
                let source = ctx.account(*from)?;
                let expense = ctx.account(*expense)?;
                expect_type(&source, BALANCE_SHEET, "asset or liability")?;
                expect_type(&expense, &[AccountType::Expense], "expense")?;
                vec![
                    EntryDraft::debit(expense.id, amount),
                    EntryDraft::credit(source.id, amount),
                ]
            }
            Posting::Income { to, income, amount } => {
                let amount = positive(*amount)?;
                let target = ctx.account(*to)?;
                let income = ctx.account(*income)?;
                expect_type(&target, &[AccountType::Asset], "asset")?;
                expect_type(&income, &[AccountType::Income], "income")?;
                vec![
                    EntryDraft::debit(target.id, amount),
                    EntryDraft::credit(income.id, amount),
                ]
            }
            Posting::Adjustment {
                account,
                stated_actual,
            } => {
                let account = ctx.account(*account)?;
                expect_type(&account, BALANCE_SHEET, "asset or liability")?;
                let current = ctx.balance_as_of(account.id, date)?;
                let difference = stated_actual
                    .checked_sub(current)
                    .ok_or_else(|| ValidationError::Overflow(format!("Adjustment of '{}'", account.name)))?;
                if difference.is_zero() {
                    return Ok(Drafted::NoChange {
                        reason: format!(
                            "'{}' already stands at {} on {}",
                            account.name, current, date
                        ),
                    });
                }
                let offset = ctx.system_account(SystemAccount::Reconciliation)?;
                return Ok(Drafted::Entries {
                    entries: move_against(&account, offset, difference),
                    notes: Some(format!(
                        "reconciliation: stated {}, derived {}, difference {}",
                        stated_actual, current, difference
                    )),
                });
            }
            Posting::DebtPayment {
                liability,
                from,
                amount,
                up_to_owed,
            } => {
                let liability = ctx.account(*liability)?;
                let source = ctx.account(*from)?;
                expect_type(&liability, &[AccountType::Liability], "liability")?;
                expect_type(&source, &[AccountType::Asset], "asset")?;
                let amount = if *up_to_owed {
                    let owed = ctx.balance_as_of(liability.id, date)?;
                    if !owed.is_positive() {
                        return Ok(Drafted::NoChange {
                            reason: format!("Nothing is owed on '{}' as of {}", liability.name, date),
                        });
                    }
                    (*amount).min(owed)
                } else {
                    *amount
                };
                let amount = positive(amount)?;
                vec![
                    EntryDraft::debit(liability.id, amount),
                    EntryDraft::credit(source.id, amount),
                ]
            }
            Posting::InterestAccrual {
                liability,
                expense,
                periodic_rate,
            } => {
                let liability = ctx.account(*liability)?;
                let expense = ctx.account(*expense)?;
                expect_type(&liability, &[AccountType::Liability], "liability")?;
                expect_type(&expense, &[AccountType::Expense], "expense")?;
                let balance = ctx.balance_as_of(liability.id, date)?;
                let interest = balance
                    .checked_mul(*periodic_rate)
                    .map(|i| Money::round(i.amount(), ctx.minor_units()))
                    .ok_or_else(|| ValidationError::Overflow(format!("Interest on '{}'", liability.name)))?;
                if !interest.is_positive() {
                    return Ok(Drafted::NoChange {
                        reason: format!("No interest due on '{}' at balance {}", liability.name, balance),
                    });
                }
                vec![
                    EntryDraft::debit(expense.id, interest),
                    EntryDraft::credit(liability.id, interest),
                ]
            }
        };
        Ok(Drafted::Entries {
            entries,
            notes: None,
        })
    }
}

/// Share of a windfall routed to one target. `share` is a fraction in (0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub target: AccountId,
    pub share: Decimal,
}

/// One external inflow fanned out to several targets. Each leg becomes its own
/// balanced transaction; the remainder stays in the deposit account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindfallSplit {
    pub deposit: AccountId,
    pub income: AccountId,
    pub amount: Money,
    pub allocations: Vec<Allocation>,
}

impl WindfallSplit {
    pub fn legs(
        &self,
        ctx: &dyn ShapeContext,
        minor_units: u32,
    ) -> Result<Vec<Posting>, LedgerError> {
        positive(self.amount)?;
        let mut total_share = Decimal::ZERO;
        for a in &self.allocations {
            if a.share <= Decimal::ZERO || a.share > Decimal::ONE {
                return Err(ValidationError::InvalidAllocation(format!(
                    "share {} for account {} must be in (0, 1]",
                    a.share, a.target
                ))
                .into());
            }
            total_share += a.share;
        }
        if total_share > Decimal::ONE {
            return Err(ValidationError::InvalidAllocation(format!(
                "shares add up to {}",
                total_share
            ))
            .into());
        }

        let mut legs = vec![Posting::Income {
            to: self.deposit,
            income: self.income,
            amount: self.amount,
        }];
        for a in &self.allocations {
            // rounding half away from zero can overshoot by a minor unit when shares sum to 1
            let allocated: Money = legs
                .iter()
                .skip(1)
                .map(|p| match p {
                    Posting::Transfer { amount, .. } | Posting::Expense { amount, .. } => *amount,
                    _ => Money::ZERO,
                })
                .sum();
            let remaining = self.amount - allocated;
            let mut portion = Money::round(self.amount.amount() * a.share, minor_units);
            if portion > remaining {
                portion = remaining;
            }
            if !portion.is_positive() {
                continue;
            }
            let target = ctx.account(a.target)?;
            let leg = match target.r#type {
                AccountType::Asset => Posting::Transfer {
                    from: self.deposit,
                    to: target.id,
                    amount: portion,
                },
                AccountType::Expense => Posting::Expense {
                    from: self.deposit,
                    expense: target.id,
                    amount: portion,
                },
                found => {
                    return Err(ValidationError::AccountTypeMismatch {
                        account: target.id,
                        expected: "asset or expense",
                        found,
                    }
                    .into());
                }
            };
            legs.push(leg);
        }
        Ok(legs)
    }
}

/// Mirror image of committed entries, used to void a transaction.
pub fn reversal_entries(entries: &[crate::models::Entry]) -> Vec<EntryDraft> {
    entries
        .iter()
        .map(|e| EntryDraft {
            account_id: e.account_id,
            side: e.side.opposite(),
            amount: e.amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OwnerId, Side};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    struct Fixture {
        accounts: HashMap<AccountId, Account>,
        balance: Money,
    }

    impl Fixture {
        fn new() -> Self {
            let mut accounts = HashMap::new();
            let mk = |id: i64, t: AccountType, system: Option<SystemAccount>| Account {
                id: AccountId(id),
                owner_id: OwnerId::new("o"),
                name: format!("a{}", id),
                r#type: t,
                category: None,
                is_active: true,
                opened_at: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                system,
            };
            accounts.insert(AccountId(1), mk(1, AccountType::Asset, None));
            accounts.insert(AccountId(2), mk(2, AccountType::Asset, None));
            accounts.insert(AccountId(3), mk(3, AccountType::Liability, None));
            accounts.insert(AccountId(4), mk(4, AccountType::Expense, None));
            accounts.insert(AccountId(5), mk(5, AccountType::Income, None));
            accounts.insert(
                AccountId(90),
                mk(90, AccountType::Equity, Some(SystemAccount::OpeningBalances)),
            );
            accounts.insert(
                AccountId(91),
                mk(91, AccountType::Equity, Some(SystemAccount::Reconciliation)),
            );
            Self {
                accounts,
                balance: Money::ZERO,
            }
        }
    }

    impl ShapeContext for Fixture {
        fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
            self.accounts
                .get(&id)
                .cloned()
                .ok_or_else(|| ValidationError::UnknownAccount(id).into())
        }

        fn system_account(&self, kind: SystemAccount) -> Result<AccountId, LedgerError> {
            Ok(match kind {
                SystemAccount::OpeningBalances => AccountId(90),
                SystemAccount::Reconciliation => AccountId(91),
            })
        }

        fn balance_as_of(&self, _id: AccountId, _date: NaiveDate) -> Result<Money, LedgerError> {
            Ok(self.balance)
        }

        fn minor_units(&self) -> u32 {
            2
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn entries(d: Drafted) -> Vec<EntryDraft> {
        match d {
            Drafted::Entries { entries, .. } => entries,
            Drafted::NoChange { reason } => panic!("unexpected no-op: {}", reason),
        }
    }

    #[test]
    fn opening_balance_of_liability_credits_the_liability() {
        let fx = Fixture::new();
        let posting = Posting::OpeningBalance {
            account: AccountId(3),
            amount: Money::new(dec!(500)),
        };
        let legs = entries(posting.draft(&fx, date()).unwrap());
        assert_eq!(legs[0], EntryDraft::credit(AccountId(3), Money::new(dec!(500))));
        assert_eq!(legs[1], EntryDraft::debit(AccountId(90), Money::new(dec!(500))));
    }

    #[test]
    fn transfer_requires_two_assets() {
        let fx = Fixture::new();
        let bad = Posting::Transfer {
            from: AccountId(1),
            to: AccountId(4),
            amount: Money::new(dec!(10)),
        };
        let err = bad.draft(&fx, date()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::AccountTypeMismatch { .. })
        ));
    }

    #[test]
    fn expense_always_debits_the_expense_account() {
        let fx = Fixture::new();
        let posting = Posting::Expense {
            from: AccountId(3),
            expense: AccountId(4),
            amount: Money::new(dec!(42.10)),
        };
        let legs = entries(posting.draft(&fx, date()).unwrap());
        assert_eq!(legs[0].account_id, AccountId(4));
        assert_eq!(legs[0].side, Side::Debit);
    }

    #[test]
    fn adjustment_is_a_no_op_when_already_reconciled() {
        let mut fx = Fixture::new();
        fx.balance = Money::new(dec!(250));
        let same = Posting::Adjustment {
            account: AccountId(1),
            stated_actual: Money::new(dec!(250)),
        };
        assert!(matches!(
            same.draft(&fx, date()).unwrap(),
            Drafted::NoChange { .. }
        ));

        let lower = Posting::Adjustment {
            account: AccountId(1),
            stated_actual: Money::new(dec!(200)),
        };
        match lower.draft(&fx, date()).unwrap() {
            Drafted::Entries { entries, notes } => {
                assert_eq!(entries[0], EntryDraft::credit(AccountId(1), Money::new(dec!(50))));
                assert_eq!(entries[1], EntryDraft::debit(AccountId(91), Money::new(dec!(50))));
                assert!(notes.unwrap().starts_with("reconciliation"));
            }
            other => panic!("expected entries, got {:?}", other),
        }
    }

    #[test]
    fn default_payment_is_capped_at_the_balance_owed() {
        let mut fx = Fixture::new();
        fx.balance = Money::new(dec!(40));
        let payment = Posting::DebtPayment {
            liability: AccountId(3),
            from: AccountId(1),
            amount: Money::new(dec!(106.62)),
            up_to_owed: true,
        };
        let legs = entries(payment.draft(&fx, date()).unwrap());
        assert_eq!(legs[0], EntryDraft::debit(AccountId(3), Money::new(dec!(40))));

        fx.balance = Money::ZERO;
        assert!(matches!(
            payment.draft(&fx, date()).unwrap(),
            Drafted::NoChange { .. }
        ));

        // an explicit amount is taken as given
        let explicit = Posting::DebtPayment {
            liability: AccountId(3),
            from: AccountId(1),
            amount: Money::new(dec!(106.62)),
            up_to_owed: false,
        };
        let legs = entries(explicit.draft(&fx, date()).unwrap());
        assert_eq!(legs[1], EntryDraft::credit(AccountId(1), Money::new(dec!(106.62))));
    }

    #[test]
    fn interest_is_charged_on_the_balance_at_the_posting_date() {
        let mut fx = Fixture::new();
        fx.balance = Money::new(dec!(1105.38));
        let accrual = Posting::InterestAccrual {
            liability: AccountId(3),
            expense: AccountId(4),
            periodic_rate: dec!(0.01),
        };
        let legs = entries(accrual.draft(&fx, date()).unwrap());
        assert_eq!(legs[0], EntryDraft::debit(AccountId(4), Money::new(dec!(11.05))));
        assert_eq!(legs[1], EntryDraft::credit(AccountId(3), Money::new(dec!(11.05))));

        fx.balance = Money::new(dec!(0.40));
        assert!(matches!(
            accrual.draft(&fx, date()).unwrap(),
            Drafted::NoChange { .. }
        ));

        fx.balance = Money::new(rust_decimal::Decimal::MAX);
        let huge = Posting::InterestAccrual {
            liability: AccountId(3),
            expense: AccountId(4),
            periodic_rate: dec!(2),
        };
        assert!(matches!(
            huge.draft(&fx, date()),
            Err(LedgerError::Validation(ValidationError::Overflow(_)))
        ));
    }

    #[test]
    fn windfall_split_routes_by_target_type() {
        let fx = Fixture::new();
        let split = WindfallSplit {
            deposit: AccountId(1),
            income: AccountId(5),
            amount: Money::new(dec!(1000)),
            allocations: vec![
                Allocation {
                    target: AccountId(2),
                    share: dec!(0.5),
                },
                Allocation {
                    target: AccountId(4),
                    share: dec!(0.1),
                },
            ],
        };
        let legs = split.legs(&fx, 2).unwrap();
        assert_eq!(legs.len(), 3);
        assert_eq!(
            legs[1],
            Posting::Transfer {
                from: AccountId(1),
                to: AccountId(2),
                amount: Money::new(dec!(500.00)),
            }
        );
        assert_eq!(
            legs[2],
            Posting::Expense {
                from: AccountId(1),
                expense: AccountId(4),
                amount: Money::new(dec!(100.00)),
            }
        );
    }

    #[test]
    fn windfall_shares_over_one_are_rejected() {
        let fx = Fixture::new();
        let split = WindfallSplit {
            deposit: AccountId(1),
            income: AccountId(5),
            amount: Money::new(dec!(100)),
            allocations: vec![
                Allocation {
                    target: AccountId(2),
                    share: dec!(0.7),
                },
                Allocation {
                    target: AccountId(4),
                    share: dec!(0.4),
                },
            ],
        };
        assert!(matches!(
            split.legs(&fx, 2),
            Err(LedgerError::Validation(ValidationError::InvalidAllocation(_)))
        ));
    }

    #[test]
    fn thirds_never_allocate_more_than_the_windfall() {
        let fx = Fixture::new();
        let third = dec!(1) / dec!(3);
        let split = WindfallSplit {
            deposit: AccountId(1),
            income: AccountId(5),
            amount: Money::new(dec!(0.02)),
            allocations: vec![
                Allocation { target: AccountId(2), share: third },
                Allocation { target: AccountId(4), share: third },
                Allocation { target: AccountId(2), share: third },
            ],
        };
        let legs = split.legs(&fx, 2).unwrap();
        let routed: Money = legs
            .iter()
            .skip(1)
            .map(|p| match p {
                Posting::Transfer { amount, .. } | Posting::Expense { amount, .. } => *amount,
                _ => Money::ZERO,
            })
            .sum();
        assert!(routed <= Money::new(dec!(0.02)));
    }
}
