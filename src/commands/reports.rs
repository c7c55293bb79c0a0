// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::commands::Session;
use crate::ledger::projector::{AccountBalance, BalancePoint, NetWorth};
use crate::utils::{arg, id_for_account, maybe_print_json, opt_arg, parse_date, pretty_table};

pub fn handle(s: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("balances", sub)) => balances(s, sub)?,
        Some(("networth", sub)) => networth(s, sub)?,
        Some(("history", sub)) => history(s, sub)?,
        _ => {}
    }
    Ok(())
}

fn as_of(sub: &clap::ArgMatches, id: &str) -> Result<NaiveDate> {
    match opt_arg(sub, id) {
        Some(d) => parse_date(d),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

pub fn balance_rows(s: &Session, sub: &clap::ArgMatches) -> Result<Vec<AccountBalance>> {
    let date = as_of(sub, "as-of")?;
    s.ledger
        .projector()
        .balances(&s.owner, date)
        .with_context(|| format!("Project balances as of {}", date))
}

fn balances(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let data = balance_rows(s, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|b| {
                vec![
                    b.name.clone(),
                    b.r#type.to_string(),
                    s.money(b.balance),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Account", "Type", "Balance"], rows));
    }
    Ok(())
}

pub fn networth_report(s: &Session, sub: &clap::ArgMatches) -> Result<NetWorth> {
    let date = as_of(sub, "as-of")?;
    Ok(s.ledger.projector().net_worth_breakdown(&s.owner, date)?)
}

fn networth(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let nw = networth_report(s, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &nw)? {
        let ccy = &s.settings.base_currency;
        let rows = vec![
            vec!["Assets".into(), format!("{} {}", ccy, s.money(nw.assets))],
            vec!["Liabilities".into(), format!("{} {}", ccy, s.money(nw.liabilities))],
            vec!["Net worth".into(), format!("{} {}", ccy, s.money(nw.net_worth))],
        ];
        println!("As of {}", nw.as_of);
        println!("{}", pretty_table(&["", "Amount"], rows));
    }
    Ok(())
}

pub fn history_points(s: &Session, sub: &clap::ArgMatches) -> Result<Vec<BalancePoint>> {
    let account = id_for_account(s.ledger, &s.owner, arg(sub, "account")?)?;
    let from = parse_date(arg(sub, "from")?)?;
    let to = as_of(sub, "to")?;
    if to < from {
        anyhow::bail!("--to {} is before --from {}", to, from);
    }
    Ok(s.ledger.projector().history(&s.owner, account, from, to)?)
}

fn history(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let points = history_points(s, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &points)? {
        let rows = points
            .iter()
            .map(|p| vec![p.date.to_string(), s.money(p.balance)])
            .collect();
        println!("{}", pretty_table(&["Date", "Balance"], rows));
    }
    Ok(())
}
