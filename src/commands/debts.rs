// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{anyhow, bail, Context, Result};

use crate::commands::Session;
use crate::debt::amortize::{amortize, AmortizationRequest, Schedule, ScheduleRow, MAX_SCHEDULE_PERIODS};
use crate::debt::compare::{compare_all, CashFlow, Comparison, DebtInputs};
use crate::debt::plan::{self, Funding};
use crate::ledger::service::PostOutcome;
use crate::models::{DebtId, PaymentFrequency, RateFrequency, RepaymentMethod};
use crate::money::Money;
use crate::utils::{
    arg, date_arg, id_for_account, maybe_print_json, opt_arg, parse_date, parse_decimal,
    pretty_table,
};

pub fn handle(s: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("compare", sub)) => compare(s, sub)?,
        Some(("adopt", sub)) => adopt(s, sub)?,
        Some(("list", sub)) => list(s, sub)?,
        Some(("pay", sub)) => {
            let id = debt_id(sub)?;
            let from = id_for_account(s.ledger, &s.owner, arg(sub, "from")?)?;
            let amount = opt_arg(sub, "amount")
                .map(|a| s.ledger.parse_amount(a))
                .transpose()?;
            let date = date_arg(sub, "date")?;
            report_outcome(plan::record_payment(s.ledger, &s.owner, id, from, amount, date)?, "Payment");
            balance_line(s, id)?;
        }
        Some(("accrue", sub)) => {
            let id = debt_id(sub)?;
            let expense = id_for_account(s.ledger, &s.owner, arg(sub, "expense")?)?;
            let date = date_arg(sub, "date")?;
            report_outcome(plan::accrue_interest(s.ledger, &s.owner, id, expense, date)?, "Interest");
            balance_line(s, id)?;
        }
        Some(("refresh", sub)) => {
            let id = debt_id(sub)?;
            let balance = plan::refresh_balance(s.ledger, &s.owner, id)?;
            println!("Debt {} balance rebuilt from the ledger: {}", id, s.money(balance));
        }
        Some(("schedule", sub)) => schedule(s, sub)?,
        _ => {}
    }
    Ok(())
}

fn debt_id(sub: &clap::ArgMatches) -> Result<DebtId> {
    sub.get_one::<i64>("debt")
        .copied()
        .map(DebtId)
        .context("Missing debt id")
}

fn report_outcome(outcome: PostOutcome, what: &str) {
    match outcome {
        PostOutcome::Committed(id) => println!("{} recorded (transaction {})", what, id),
        PostOutcome::NoChange { reason } => println!("Nothing to record: {}", reason),
    }
}

fn balance_line(s: &Session, id: DebtId) -> Result<()> {
    let debt = plan::debt(s.ledger, &s.owner, id)?;
    println!("'{}' now owes {}", debt.name, s.money(debt.current_balance));
    Ok(())
}

fn money_opt(s: &Session, sub: &clap::ArgMatches, id: &str) -> Result<Option<Money>> {
    opt_arg(sub, id)
        .map(|a| s.ledger.parse_amount(a).with_context(|| format!("--{}", id)))
        .transpose()
}

/// Builds comparison inputs from `debt compare`/`debt adopt` arguments.
pub fn inputs_from(s: &Session, sub: &clap::ArgMatches) -> Result<DebtInputs> {
    let principal = s
        .ledger
        .parse_amount(arg(sub, "principal")?)
        .context("--principal")?;
    let rate = parse_decimal(arg(sub, "rate")?)?;
    let rate_frequency: RateFrequency = arg(sub, "rate-frequency")?
        .parse()
        .map_err(anyhow::Error::msg)?;
    let payment_frequency: PaymentFrequency = arg(sub, "frequency")?
        .parse()
        .map_err(anyhow::Error::msg)?;
    let term_periods = sub
        .get_one::<u32>("term")
        .copied()
        .ok_or_else(|| anyhow!("Missing argument 'term'"))?;
    let max_periods = sub
        .get_one::<u32>("max-periods")
        .copied()
        .unwrap_or(MAX_SCHEDULE_PERIODS);

    let income = money_opt(s, sub, "income")?;
    let living = money_opt(s, sub, "living")?;
    let obligations = money_opt(s, sub, "obligations")?;
    let cash_flow = if income.is_some() || living.is_some() || obligations.is_some() {
        Some(CashFlow {
            income: income.unwrap_or(Money::ZERO),
            living_costs: living.unwrap_or(Money::ZERO),
            other_obligations: obligations.unwrap_or(Money::ZERO),
        })
    } else {
        None
    };

    let start_date = match opt_arg(sub, "start") {
        Some(d) => parse_date(d)?,
        None => chrono::Local::now().date_naive(),
    };

    Ok(DebtInputs {
        principal,
        rate,
        rate_frequency,
        payment_frequency,
        start_date,
        term_periods,
        stated_minimum: money_opt(s, sub, "minimum")?,
        cash_flow,
        max_periods,
        long_horizon_periods: s.settings.long_horizon_periods,
        minor_units: s.settings.minor_units,
    })
}

fn print_comparison(s: &Session, comparison: &Comparison) {
    if !comparison.is_viable() {
        println!("No viable repayment option: every method is infeasible.");
    }
    let rows = comparison
        .projections()
        .iter()
        .map(|p| {
            let sparkline: Vec<String> = p.sparkline.iter().map(|b| s.money(*b)).collect();
            vec![
                p.method.to_string(),
                if p.hidden { "hidden" } else { "visible" }.to_string(),
                s.money(p.payment),
                s.money(p.highest_payment),
                p.periods.to_string(),
                p.payoff_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                s.money(p.total_interest),
                sparkline.join(" "),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Method", "Status", "Payment", "Highest", "Periods", "Payoff", "Interest", "Balance trend"],
            rows
        )
    );
    for p in comparison.projections() {
        for w in &p.warnings {
            let level = if w.is_critical() { "critical" } else { "warning" };
            println!("[{}] {}: {}", level, p.method, w.message);
        }
    }
}

fn compare(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let inputs = inputs_from(s, sub)?;
    let comparison = compare_all(&inputs);
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &comparison)? {
        print_comparison(s, &comparison);
    }
    Ok(())
}

fn adopt(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let inputs = inputs_from(s, sub)?;
    let method: RepaymentMethod = arg(sub, "method")?.parse().map_err(anyhow::Error::msg)?;
    let comparison = compare_all(&inputs);
    let Some(chosen) = comparison.get(method) else {
        bail!("Method {} was not projected", method);
    };
    let funding = match opt_arg(sub, "proceeds") {
        Some(name) => Funding::Proceeds(id_for_account(s.ledger, &s.owner, name)?),
        None => Funding::Existing,
    };
    let debt = plan::adopt(s.ledger, &s.owner, arg(sub, "name")?, &inputs, chosen, funding)?;
    println!(
        "Adopted debt {} '{}': {} {} payments of {}",
        debt.id,
        debt.name,
        debt.total_periods,
        debt.payment_frequency.as_str(),
        s.money(debt.payment_amount)
    );
    Ok(())
}

fn list(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let debts = plan::debts(s.ledger, &s.owner)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &debts)? {
        let rows = debts
            .iter()
            .map(|d| {
                vec![
                    d.id.to_string(),
                    d.name.clone(),
                    d.repayment_method.to_string(),
                    s.money(d.principal),
                    s.money(d.current_balance),
                    format!("{}%", d.interest_rate),
                    format!("{} {}", s.money(d.payment_amount), d.payment_frequency.as_str()),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Name", "Method", "Principal", "Balance", "Rate", "Payment"],
                rows
            )
        );
    }
    Ok(())
}

/// Remaining schedule for an adopted debt, from its cached balance.
pub fn remaining_schedule(s: &Session, sub: &clap::ArgMatches) -> Result<Schedule> {
    let id = debt_id(sub)?;
    let debt = plan::debt(s.ledger, &s.owner, id)?;
    let start_date = date_arg(sub, "start")?;
    let request = AmortizationRequest {
        principal: debt.current_balance,
        rate: debt.interest_rate,
        rate_frequency: debt.rate_frequency,
        payment: debt.payment_amount,
        payment_frequency: debt.payment_frequency,
        start_date,
        max_periods: MAX_SCHEDULE_PERIODS,
        term_periods: None,
        long_horizon_periods: Some(s.settings.long_horizon_periods),
        cash_margin: None,
        minor_units: s.settings.minor_units,
    };
    amortize(&request).map_err(|infeasible| anyhow!("Debt {}: {}", id, infeasible))
}

fn schedule(s: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let schedule = remaining_schedule(s, sub)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &schedule.rows)? {
        return Ok(());
    }
    let rows = schedule
        .rows
        .iter()
        .map(|r: &ScheduleRow| {
            vec![
                r.period.to_string(),
                r.date.to_string(),
                s.money(r.payment),
                s.money(r.interest),
                s.money(r.principal_portion),
                s.money(r.balance),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["#", "Date", "Payment", "Interest", "Principal", "Balance"],
            rows
        )
    );
    println!(
        "Total interest {}; payoff {}",
        s.money(schedule.total_interest),
        schedule
            .payoff_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "not within the schedule".into())
    );
    for w in &schedule.warnings {
        println!("[warning] {}", w.message);
    }
    Ok(())
}
