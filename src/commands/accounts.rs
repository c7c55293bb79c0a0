// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::commands::Session;
use crate::ledger::service::PostOutcome;
use crate::ledger::shapes::Posting;
use crate::models::{AccountPatch, AccountType};
use crate::money::Money;
use crate::utils::{account_named, arg, date_arg, maybe_print_json, opt_arg, parse_date, pretty_table};

pub fn handle(s: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(s, sub)?,
        Some(("list", sub)) => list(s, sub)?,
        Some(("rename", sub)) => {
            let account = account_named(s.ledger, &s.owner, arg(sub, "name")?)?;
            let new_name = arg(sub, "new_name")?;
            let patch = AccountPatch {
                name: Some(new_name.trim().to_string()),
                ..AccountPatch::default()
            };
            s.ledger.update_account(&s.owner, account.id, patch)?;
            println!("Renamed '{}' to '{}'", account.name, new_name.trim());
        }
        Some(("categorize", sub)) => {
            let account = account_named(s.ledger, &s.owner, arg(sub, "name")?)?;
            let category = opt_arg(sub, "category").map(str::to_string);
            let patch = AccountPatch {
                category: Some(category.clone()),
                ..AccountPatch::default()
            };
            s.ledger.update_account(&s.owner, account.id, patch)?;
            println!(
                "'{}' category: {}",
                account.name,
                category.as_deref().unwrap_or("(none)")
            );
        }
        Some(("deactivate", sub)) => {
            let account = account_named(s.ledger, &s.owner, arg(sub, "name")?)?;
            s.ledger.deactivate_account(&s.owner, account.id)?;
            println!("Deactivated '{}'", account.name);
        }
        Some(("reactivate", sub)) => {
            let account = account_named(s.ledger, &s.owner, arg(sub, "name")?)?;
            s.ledger.reactivate_account(&s.owner, account.id)?;
            println!("Reactivated '{}'", account.name);
        }
        Some(("rm", sub)) => {
            let account = account_named(s.ledger, &s.owner, arg(sub, "name")?)?;
            s.ledger.remove_account(&s.owner, account.id)?;
            println!("Removed account '{}'", account.name);
        }
        _ => {}
    }
    Ok(())
}

fn add(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let name = arg(sub, "name")?;
    let account_type: AccountType = arg(sub, "type")?
        .parse()
        .map_err(anyhow::Error::msg)?;
    let category = opt_arg(sub, "category").map(str::to_string);
    let opened = date_arg(sub, "opened")?;
    let opening = opt_arg(sub, "opening")
        .map(|a| s.ledger.parse_amount(a))
        .transpose()?;

    let Some(amount) = opening else {
        let account = s
            .ledger
            .open_account(&s.owner, name, account_type, category, opened)?;
        println!("Added account '{}' ({})", account.name, account.r#type);
        return Ok(());
    };

    let (account, outcome) = s.ledger.open_funded_account(
        &s.owner,
        name,
        account_type,
        category,
        opened,
        None,
        |account| Posting::OpeningBalance {
            account: account.id,
            amount,
        },
    )?;
    println!("Added account '{}' ({})", account.name, account.r#type);
    match outcome {
        PostOutcome::Committed(id) => {
            println!("Opening balance {} (transaction {})", s.money(amount), id)
        }
        PostOutcome::NoChange { reason } => println!("{}", reason),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct AccountRow {
    pub id: i64,
    pub name: String,
    pub r#type: AccountType,
    pub category: Option<String>,
    pub active: bool,
    pub opened_at: String,
    pub balance: Money,
}

pub fn query_rows(s: &Session, sub: &clap::ArgMatches) -> Result<Vec<AccountRow>> {
    let as_of = match opt_arg(sub, "as-of") {
        Some(d) => parse_date(d)?,
        None => chrono::Local::now().date_naive(),
    };
    let balances = s
        .ledger
        .projector()
        .balances(&s.owner, as_of)
        .context("Project balances")?;
    let accounts = s.ledger.accounts(&s.owner)?;
    Ok(accounts
        .into_iter()
        .map(|a| {
            let balance = balances
                .iter()
                .find(|b| b.account_id == a.id)
                .map(|b| b.balance)
                .unwrap_or(Money::ZERO);
            AccountRow {
                id: a.id.0,
                name: a.name,
                r#type: a.r#type,
                category: a.category,
                active: a.is_active,
                opened_at: a.opened_at.to_string(),
                balance,
            }
        })
        .collect())
}

fn list(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(s, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|r| {
                vec![
                    r.name.clone(),
                    r.r#type.to_string(),
                    r.category.clone().unwrap_or_default(),
                    if r.active { "yes" } else { "no" }.to_string(),
                    r.opened_at.clone(),
                    s.money(r.balance),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Name", "Type", "Category", "Active", "Opened", "Balance"],
                rows
            )
        );
    }
    Ok(())
}
