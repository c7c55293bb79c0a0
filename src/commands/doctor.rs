// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use crate::commands::Session;
use crate::error::LedgerError;
use crate::ledger::projector::IntegrityReport;
use crate::utils::pretty_table;

/// Replays the owner's books and reports the first disagreement, if any.
pub fn check(s: &Session) -> Result<std::result::Result<IntegrityReport, LedgerError>> {
    match s.ledger.projector().verify(&s.owner) {
        Ok(report) => Ok(Ok(report)),
        Err(err) if err.is_integrity() => Ok(Err(err)),
        Err(err) => Err(err.into()),
    }
}

pub fn handle(s: &Session) -> Result<()> {
    match check(s)? {
        Ok(report) => {
            let rows = vec![
                vec!["transactions".into(), report.transactions_checked.to_string()],
                vec!["accounts".into(), report.accounts_checked.to_string()],
                vec!["debts".into(), report.debts_checked.to_string()],
            ];
            println!("{}", pretty_table(&["Checked", "Count"], rows));
            println!("doctor: no issues found");
            Ok(())
        }
        Err(violation) => {
            println!("{}", pretty_table(&["Issue"], vec![vec![violation.to_string()]]));
            Err(anyhow::anyhow!("ledger integrity check failed"))
        }
    }
}
