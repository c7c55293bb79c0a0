// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use crate::ledger::service::Ledger;
use crate::models::OwnerId;
use crate::settings::Settings;

pub mod accounts;
pub mod config;
pub mod debts;
pub mod doctor;
pub mod reports;
pub mod transactions;

/// What every handler works against: the books, the settings they were opened
/// with, and the owner the session layer vouched for.
pub struct Session<'a> {
    pub ledger: &'a Ledger,
    pub settings: &'a Settings,
    pub owner: OwnerId,
}

impl<'a> Session<'a> {
    pub fn new(ledger: &'a Ledger, settings: &'a Settings) -> Self {
        Self {
            ledger,
            settings,
            owner: settings.owner_id(),
        }
    }

    pub fn money(&self, amount: crate::money::Money) -> String {
        amount.display(self.settings.minor_units)
    }
}

/// Routes a ledger subcommand to its handler. `false` when `m` names none.
pub fn dispatch(s: &Session, m: &clap::ArgMatches) -> Result<bool> {
    match m.subcommand() {
        Some(("account", sub)) => accounts::handle(s, sub)?,
        Some(("tx", sub)) => transactions::handle(s, sub)?,
        Some(("report", sub)) => reports::handle(s, sub)?,
        Some(("debt", sub)) => debts::handle(s, sub)?,
        Some(("doctor", _)) => doctor::handle(s)?,
        _ => return Ok(false),
    }
    Ok(true)
}
