// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::commands::Session;
use crate::ledger::service::{PostOutcome, TransactionHeader};
use crate::ledger::shapes::{Allocation, Posting, WindfallSplit};
use crate::models::{AccountId, EntryDraft, EntryFilter, Side, TransactionId};
use crate::money::Money;
use crate::utils::{
    arg, date_arg, id_for_account, maybe_print_json, opt_arg, parse_date, parse_decimal,
    pretty_table,
};

pub fn handle(s: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(s, sub)?,
        Some(("transfer", sub)) => {
            let posting = Posting::Transfer {
                from: id_for_account(s.ledger, &s.owner, arg(sub, "from")?)?,
                to: id_for_account(s.ledger, &s.owner, arg(sub, "to")?)?,
                amount: s.ledger.parse_amount(arg(sub, "amount")?)?,
            };
            post(s, sub, &posting)?;
        }
        Some(("expense", sub)) => {
            let posting = Posting::Expense {
                from: id_for_account(s.ledger, &s.owner, arg(sub, "from")?)?,
                expense: id_for_account(s.ledger, &s.owner, arg(sub, "expense")?)?,
                amount: s.ledger.parse_amount(arg(sub, "amount")?)?,
            };
            post(s, sub, &posting)?;
        }
        Some(("income", sub)) => {
            let posting = Posting::Income {
                to: id_for_account(s.ledger, &s.owner, arg(sub, "to")?)?,
                income: id_for_account(s.ledger, &s.owner, arg(sub, "income")?)?,
                amount: s.ledger.parse_amount(arg(sub, "amount")?)?,
            };
            post(s, sub, &posting)?;
        }
        Some(("adjust", sub)) => {
            let posting = Posting::Adjustment {
                account: id_for_account(s.ledger, &s.owner, arg(sub, "account")?)?,
                stated_actual: s.ledger.parse_amount(arg(sub, "actual")?)?,
            };
            post(s, sub, &posting)?;
        }
        Some(("split", sub)) => split(s, sub)?,
        Some(("void", sub)) => {
            let id = sub
                .get_one::<i64>("id")
                .copied()
                .context("Missing transaction id")?;
            let date = date_arg(sub, "date")?;
            let reversal = s.ledger.void(&s.owner, TransactionId(id), date)?;
            println!("Voided transaction {} (reversal {})", id, reversal);
        }
        Some(("list", sub)) => list(s, sub)?,
        Some(("show", sub)) => show(s, sub)?,
        _ => {}
    }
    Ok(())
}

fn post(s: &Session, sub: &clap::ArgMatches, posting: &Posting) -> Result<()> {
    let date = date_arg(sub, "date")?;
    match s
        .ledger
        .post(&s.owner, date, opt_arg(sub, "desc"), posting)?
    {
        PostOutcome::Committed(id) => println!("Recorded {} on {} (transaction {})", posting.label(), date, id),
        PostOutcome::NoChange { reason } => println!("Nothing to record: {}", reason),
    }
    Ok(())
}

/// Splits `ACCOUNT=VALUE` on the last `=` so account names may contain one.
fn split_pair(raw: &str) -> Result<(&str, &str)> {
    raw.rsplit_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .with_context(|| format!("Expected ACCOUNT=VALUE, got '{}'", raw))
}

pub fn parse_legs(s: &Session, sub: &clap::ArgMatches) -> Result<Vec<EntryDraft>> {
    let mut legs = Vec::new();
    for (id, side) in [("debit", Side::Debit), ("credit", Side::Credit)] {
        for raw in sub.get_many::<String>(id).into_iter().flatten() {
            let (name, amount) = split_pair(raw)?;
            legs.push(EntryDraft {
                account_id: id_for_account(s.ledger, &s.owner, name)?,
                side,
                amount: s.ledger.parse_amount(amount)?,
            });
        }
    }
    Ok(legs)
}

fn add(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let date = date_arg(sub, "date")?;
    let mut header = TransactionHeader::new(date, arg(sub, "desc")?);
    if let Some(note) = opt_arg(sub, "note") {
        header = header.with_notes(note);
    }
    let legs = parse_legs(s, sub)?;
    let id = s.ledger.commit(&s.owner, header, legs)?;
    println!("Recorded transaction {} on {}", id, date);
    Ok(())
}

fn split(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let mut allocations = Vec::new();
    for raw in sub.get_many::<String>("alloc").into_iter().flatten() {
        let (name, share) = split_pair(raw)?;
        allocations.push(Allocation {
            target: id_for_account(s.ledger, &s.owner, name)?,
            share: parse_decimal(share)?,
        });
    }
    let windfall = WindfallSplit {
        deposit: id_for_account(s.ledger, &s.owner, arg(sub, "deposit")?)?,
        income: id_for_account(s.ledger, &s.owner, arg(sub, "income")?)?,
        amount: s.ledger.parse_amount(arg(sub, "amount")?)?,
        allocations,
    };
    let date = date_arg(sub, "date")?;
    let ids = s
        .ledger
        .post_split(&s.owner, date, opt_arg(sub, "desc"), &windfall)?;
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    println!("Recorded windfall as transactions {}", ids.join(", "));
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct EntryRow {
    pub transaction_id: i64,
    pub date: String,
    pub description: String,
    pub account: String,
    pub side: Side,
    pub amount: Money,
}

/// Entries newest first, filtered like `tx list`.
pub fn query_rows(s: &Session, sub: &clap::ArgMatches) -> Result<Vec<EntryRow>> {
    let mut filter = EntryFilter::owner(&s.owner);
    if let Some(name) = opt_arg(sub, "account") {
        filter = filter.account(id_for_account(s.ledger, &s.owner, name)?);
    }
    if let Some(from) = opt_arg(sub, "from") {
        filter = filter.since(parse_date(from)?);
    }
    if let Some(to) = opt_arg(sub, "to") {
        filter = filter.until(parse_date(to)?);
    }

    let names: HashMap<AccountId, String> = s
        .ledger
        .accounts(&s.owner)?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();
    let descriptions: HashMap<TransactionId, String> = s
        .ledger
        .transactions(&s.owner)?
        .into_iter()
        .map(|t| (t.id, t.description))
        .collect();

    let mut entries = s.ledger.store().query_entries(&filter)?;
    entries.reverse();
    if let Some(limit) = sub.get_one::<usize>("limit") {
        entries.truncate(*limit);
    }
    Ok(entries
        .into_iter()
        .map(|e| EntryRow {
            transaction_id: e.transaction_id.0,
            date: e.date.to_string(),
            description: descriptions
                .get(&e.transaction_id)
                .cloned()
                .unwrap_or_default(),
            account: names.get(&e.account_id).cloned().unwrap_or_default(),
            side: e.side,
            amount: e.amount,
        })
        .collect())
}

fn list(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(s, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|r| {
                let (debit, credit) = match r.side {
                    Side::Debit => (s.money(r.amount), String::new()),
                    Side::Credit => (String::new(), s.money(r.amount)),
                };
                vec![
                    r.transaction_id.to_string(),
                    r.date.clone(),
                    r.description.clone(),
                    r.account.clone(),
                    debit,
                    credit,
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Tx", "Date", "Description", "Account", "Debit", "Credit"], rows)
        );
    }
    Ok(())
}

fn show(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let Some(id) = sub.get_one::<i64>("id").copied() else {
        bail!("Missing transaction id");
    };
    let t = s.ledger.transaction(&s.owner, TransactionId(id))?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &t)? {
        return Ok(());
    }
    println!("Transaction {} on {}: {}", t.id, t.date, t.description);
    if let Some(notes) = &t.notes {
        println!("  {}", notes);
    }
    if let Some(original) = t.reverses {
        println!("  reverses {}", original);
    }
    let names: HashMap<AccountId, String> = s
        .ledger
        .accounts(&s.owner)?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();
    let rows = t
        .entries
        .iter()
        .map(|e| {
            vec![
                names.get(&e.account_id).cloned().unwrap_or_default(),
                e.side.as_str().to_string(),
                s.money(e.amount),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Account", "Side", "Amount"], rows));
    Ok(())
}
