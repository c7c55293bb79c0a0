// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Pre-commit rules for a set of entry drafts.

use std::collections::{HashMap, HashSet};

use crate::error::{LedgerError, ValidationError};
use crate::ledger::store::LedgerStore;
use crate::models::{Account, AccountId, EntryDraft, OwnerId, Side};
use crate::money::Money;

/// Structural checks that need no account lookups.
pub fn check_entries(entries: &[EntryDraft], minor_units: u32) -> Result<(), ValidationError> {
    if entries.len() < 2 {
        return Err(ValidationError::TooFewEntries {
            count: entries.len(),
        });
    }

    let distinct: HashSet<AccountId> = entries.iter().map(|e| e.account_id).collect();
    if distinct.len() < 2 {
        return Err(ValidationError::SingleAccount);
    }

    let mut debits = Money::ZERO;
    let mut credits = Money::ZERO;
    for e in entries {
        if !e.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount {
                account: e.account_id,
                amount: e.amount,
            });
        }
        if !e.amount.fits_minor_units(minor_units) {
            return Err(ValidationError::ExcessPrecision {
                amount: e.amount,
                minor_units,
            });
        }
        if !e.amount.within_limit() {
            return Err(ValidationError::AmountOutOfRange {
                account: e.account_id,
                amount: e.amount,
            });
        }
        let total = match e.side {
            Side::Debit => &mut debits,
            Side::Credit => &mut credits,
        };
        *total = total
            .checked_add(e.amount)
            .ok_or_else(|| ValidationError::Overflow(format!("{} total", e.side.as_str())))?;
    }

    if debits != credits {
        return Err(ValidationError::Unbalanced { debits, credits });
    }
    Ok(())
}

/// Account checks: every referenced account exists, is the owner's and is active.
pub fn check_accounts(
    owner: &OwnerId,
    entries: &[EntryDraft],
    accounts: &HashMap<AccountId, Account>,
) -> Result<(), ValidationError> {
    for e in entries {
        let account = accounts
            .get(&e.account_id)
            .ok_or(ValidationError::UnknownAccount(e.account_id))?;
        if account.owner_id != *owner {
            return Err(ValidationError::ForeignAccount(e.account_id));
        }
        if !account.is_active {
            return Err(ValidationError::InactiveAccount(e.account_id));
        }
    }
    Ok(())
}

/// Runs every rule against the store. Nothing is written here.
pub fn validate(
    store: &dyn LedgerStore,
    owner: &OwnerId,
    entries: &[EntryDraft],
    minor_units: u32,
) -> Result<(), LedgerError> {
    check_entries(entries, minor_units)?;
    let mut accounts = HashMap::new();
    for e in entries {
        if accounts.contains_key(&e.account_id) {
            continue;
        }
        if let Some(account) = store.account(e.account_id)? {
            accounts.insert(account.id, account);
        }
    }
    check_accounts(owner, entries, &accounts)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn m(v: rust_decimal::Decimal) -> Money {
        Money::new(v)
    }

    fn account(id: i64, owner: &str, active: bool) -> Account {
        Account {
            id: AccountId(id),
            owner_id: OwnerId::new(owner),
            name: format!("acct-{}", id),
            r#type: AccountType::Asset,
            category: None,
            is_active: active,
            opened_at: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            system: None,
        }
    }

    #[test]
    fn amounts_beyond_the_limit_are_rejected() {
        let huge = m(dec!(50000000000000000000000000000));
        let entries = vec![
            EntryDraft::debit(AccountId(1), huge),
            EntryDraft::debit(AccountId(3), huge),
            EntryDraft::credit(AccountId(2), huge),
            EntryDraft::credit(AccountId(4), huge),
        ];
        assert_eq!(
            check_entries(&entries, 2),
            Err(ValidationError::AmountOutOfRange {
                account: AccountId(1),
                amount: huge,
            })
        );

        let at_limit = vec![
            EntryDraft::debit(AccountId(1), Money::limit()),
            EntryDraft::credit(AccountId(2), Money::limit()),
        ];
        assert!(check_entries(&at_limit, 2).is_ok());
    }

    #[test]
    fn balanced_pair_passes() {
        let entries = vec![
            EntryDraft::debit(AccountId(1), m(dec!(100.00))),
            EntryDraft::credit(AccountId(2), m(dec!(100.00))),
        ];
        assert!(check_entries(&entries, 2).is_ok());
    }

    #[test]
    fn compound_entry_with_three_legs_passes() {
        let entries = vec![
            EntryDraft::debit(AccountId(1), m(dec!(70.00))),
            EntryDraft::debit(AccountId(3), m(dec!(30.00))),
            EntryDraft::credit(AccountId(2), m(dec!(100.00))),
        ];
        assert!(check_entries(&entries, 2).is_ok());
    }

    #[test]
    fn unbalanced_is_rejected_without_tolerance() {
        let entries = vec![
            EntryDraft::debit(AccountId(1), m(dec!(100.00))),
            EntryDraft::credit(AccountId(2), m(dec!(99.99))),
        ];
        assert_eq!(
            check_entries(&entries, 2),
            Err(ValidationError::Unbalanced {
                debits: m(dec!(100.00)),
                credits: m(dec!(99.99)),
            })
        );
    }

    #[test]
    fn single_entry_and_single_account_are_rejected() {
        let one = vec![EntryDraft::debit(AccountId(1), m(dec!(5)))];
        assert_eq!(
            check_entries(&one, 2),
            Err(ValidationError::TooFewEntries { count: 1 })
        );

        let same = vec![
            EntryDraft::debit(AccountId(1), m(dec!(5))),
            EntryDraft::credit(AccountId(1), m(dec!(5))),
        ];
        assert_eq!(check_entries(&same, 2), Err(ValidationError::SingleAccount));
    }

    #[test]
    fn zero_negative_and_sub_cent_amounts_are_rejected() {
        let zero = vec![
            EntryDraft::debit(AccountId(1), Money::ZERO),
            EntryDraft::credit(AccountId(2), Money::ZERO),
        ];
        assert!(matches!(
            check_entries(&zero, 2),
            Err(ValidationError::NonPositiveAmount { .. })
        ));

        let negative = vec![
            EntryDraft::debit(AccountId(1), m(dec!(-5))),
            EntryDraft::credit(AccountId(2), m(dec!(-5))),
        ];
        assert!(matches!(
            check_entries(&negative, 2),
            Err(ValidationError::NonPositiveAmount { .. })
        ));

        let fine = vec![
            EntryDraft::debit(AccountId(1), m(dec!(1.005))),
            EntryDraft::credit(AccountId(2), m(dec!(1.005))),
        ];
        assert!(matches!(
            check_entries(&fine, 2),
            Err(ValidationError::ExcessPrecision { .. })
        ));
    }

    #[test]
    fn account_rules() {
        let owner = OwnerId::new("alice");
        let entries = vec![
            EntryDraft::debit(AccountId(1), m(dec!(5))),
            EntryDraft::credit(AccountId(2), m(dec!(5))),
        ];

        let mut accounts = HashMap::new();
        accounts.insert(AccountId(1), account(1, "alice", true));
        assert_eq!(
            check_accounts(&owner, &entries, &accounts),
            Err(ValidationError::UnknownAccount(AccountId(2)))
        );

        accounts.insert(AccountId(2), account(2, "bob", true));
        assert_eq!(
            check_accounts(&owner, &entries, &accounts),
            Err(ValidationError::ForeignAccount(AccountId(2)))
        );

        accounts.insert(AccountId(2), account(2, "alice", false));
        assert_eq!(
            check_accounts(&owner, &entries, &accounts),
            Err(ValidationError::InactiveAccount(AccountId(2)))
        );

        accounts.insert(AccountId(2), account(2, "alice", true));
        assert!(check_accounts(&owner, &entries, &accounts).is_ok());
    }
}
