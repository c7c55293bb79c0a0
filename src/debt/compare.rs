// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::debt::amortize::{
    amortize, annuity_payment, period_interest, periodic_rate, AmortizationRequest, ScheduleRow,
    Warning,
};
use crate::models::{PaymentFrequency, RateFrequency, RepaymentMethod};
use crate::money::Money;

/// Points in the sampled balance series.
pub const SPARKLINE_POINTS: usize = 10;

/// Share of principal added to the period's interest for a rate-driven minimum (1%).
fn minimum_principal_share() -> Decimal {
    Decimal::new(1, 2)
}

/// Per-period cash flow declared by the borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CashFlow {
    pub income: Money,
    pub living_costs: Money,
    pub other_obligations: Money,
}

impl CashFlow {
    /// What is left after living costs; payments above this are warned about.
    pub fn margin(&self) -> Option<Money> {
        self.income.checked_sub(self.living_costs)
    }

    pub fn spare(&self) -> Option<Money> {
        self.margin()?.checked_sub(self.other_obligations)
    }
}

#[derive(Debug, Clone)]
pub struct DebtInputs {
    pub principal: Money,
    /// Percentage.
    pub rate: Decimal,
    pub rate_frequency: RateFrequency,
    pub payment_frequency: PaymentFrequency,
    pub start_date: NaiveDate,
    /// Length for the fixed-term method, in payment periods.
    pub term_periods: u32,
    /// Lender-stated minimum payment; rate-driven when absent.
    pub stated_minimum: Option<Money>,
    pub cash_flow: Option<CashFlow>,
    pub max_periods: u32,
    pub long_horizon_periods: u32,
    pub minor_units: u32,
}

impl DebtInputs {
    fn periodic_rate(&self) -> Decimal {
        periodic_rate(self.rate, self.rate_frequency, self.payment_frequency)
    }

    /// First period's interest plus a slice of principal, rounded up.
    pub fn minimum_payment(&self) -> Option<Money> {
        if let Some(stated) = self.stated_minimum {
            return Some(stated);
        }
        let interest = period_interest(self.principal, self.periodic_rate(), self.minor_units)?;
        let share = self.principal.checked_mul(minimum_principal_share())?;
        Some(Money::round_up(
            interest.checked_add(share)?.amount(),
            self.minor_units,
        ))
    }

    fn too_large(&self) -> Warning {
        Warning::critical(format!(
            "Principal {} at {}% is too large to schedule",
            self.principal.display(self.minor_units),
            self.rate
        ))
    }

    /// Annuity payment over the term, rounded up so the term is met.
    pub fn fixed_term_payment(&self) -> Option<Money> {
        annuity_payment(self.principal.amount(), self.periodic_rate(), self.term_periods)
            .map(|p| Money::round_up(p, self.minor_units))
    }

    fn request(&self, payment: Money, term: Option<u32>) -> AmortizationRequest {
        AmortizationRequest {
            principal: self.principal,
            rate: self.rate,
            rate_frequency: self.rate_frequency,
            payment,
            payment_frequency: self.payment_frequency,
            start_date: self.start_date,
            max_periods: self.max_periods,
            term_periods: term,
            long_horizon_periods: Some(self.long_horizon_periods),
            cash_margin: self.cash_flow.and_then(|c| c.margin()),
            minor_units: self.minor_units,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodProjection {
    pub method: RepaymentMethod,
    pub payment: Money,
    pub schedule: Vec<ScheduleRow>,
    pub total_interest: Money,
    pub total_paid: Money,
    pub payoff_date: Option<NaiveDate>,
    pub periods: u32,
    pub highest_payment: Money,
    pub sparkline: Vec<Money>,
    pub warnings: Vec<Warning>,
    pub hidden: bool,
}

impl MethodProjection {
    fn infeasible(method: RepaymentMethod, payment: Money, principal: Money, warning: Warning) -> Self {
        Self {
            method,
            payment,
            schedule: Vec::new(),
            total_interest: Money::ZERO,
            total_paid: Money::ZERO,
            payoff_date: None,
            periods: 0,
            highest_payment: payment,
            sparkline: vec![principal],
            warnings: vec![warning],
            hidden: true,
        }
    }
}

/// Ranked projections, or the distinct signal that every method is infeasible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "projections", rename_all = "snake_case")]
pub enum Comparison {
    Ranked(Vec<MethodProjection>),
    NoViableOption(Vec<MethodProjection>),
}

impl Comparison {
    pub fn projections(&self) -> &[MethodProjection] {
        match self {
            Comparison::Ranked(p) | Comparison::NoViableOption(p) => p,
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = &MethodProjection> {
        self.projections().iter().filter(|p| !p.hidden)
    }

    pub fn best(&self) -> Option<&MethodProjection> {
        self.visible().next()
    }

    pub fn get(&self, method: RepaymentMethod) -> Option<&MethodProjection> {
        self.projections().iter().find(|p| p.method == method)
    }

    pub fn is_viable(&self) -> bool {
        matches!(self, Comparison::Ranked(_))
    }
}

/// Even-stride sample of `[principal, balance_1, .., balance_n]`, always
/// keeping the first and last points.
pub fn sparkline(principal: Money, rows: &[ScheduleRow]) -> Vec<Money> {
    let series: Vec<Money> = std::iter::once(principal)
        .chain(rows.iter().map(|r| r.balance))
        .collect();
    if series.len() <= SPARKLINE_POINTS {
        return series;
    }
    let last = series.len() - 1;
    (0..SPARKLINE_POINTS)
        .map(|i| series[i * last / (SPARKLINE_POINTS - 1)])
        .collect()
}

fn project(inputs: &DebtInputs, method: RepaymentMethod) -> MethodProjection {
    let mu = inputs.minor_units;
    let (payment, term) = match method {
        RepaymentMethod::FixedTerm => match inputs.fixed_term_payment() {
            Some(p) => (p, Some(inputs.term_periods)),
            None => {
                return MethodProjection::infeasible(
                    method,
                    Money::ZERO,
                    inputs.principal,
                    Warning::critical(format!(
                        "No level payment retires the debt over {} periods",
                        inputs.term_periods
                    )),
                );
            }
        },
        RepaymentMethod::Minimum => match inputs.minimum_payment() {
            Some(p) => (p, None),
            None => {
                return MethodProjection::infeasible(method, Money::ZERO, inputs.principal, inputs.too_large());
            }
        },
        RepaymentMethod::Aggressive => {
            let Some(minimum) = inputs.minimum_payment() else {
                return MethodProjection::infeasible(method, Money::ZERO, inputs.principal, inputs.too_large());
            };
            let Some(cash) = inputs.cash_flow else {
                return MethodProjection::infeasible(
                    method,
                    minimum,
                    inputs.principal,
                    Warning::critical("No income or living costs declared, so there is no spare cash"),
                );
            };
            let Some(spare) = cash.spare() else {
                return MethodProjection::infeasible(
                    method,
                    minimum,
                    inputs.principal,
                    Warning::critical("Declared cash flow is too large to compute"),
                );
            };
            if spare.is_negative() {
                return MethodProjection::infeasible(
                    method,
                    minimum,
                    inputs.principal,
                    Warning::critical(format!(
                        "Spare cash is negative ({}); nothing is left to pay down faster",
                        spare.display(mu)
                    )),
                );
            }
            match minimum.checked_add(spare) {
                Some(payment) => (payment, None),
                None => {
                    return MethodProjection::infeasible(method, minimum, inputs.principal, inputs.too_large());
                }
            }
        }
    };

    match amortize(&inputs.request(payment, term)) {
        Ok(schedule) => MethodProjection {
            method,
            payment,
            total_interest: schedule.total_interest,
            total_paid: schedule.total_paid,
            payoff_date: schedule.payoff_date,
            periods: schedule.periods(),
            highest_payment: schedule.highest_payment(),
            sparkline: sparkline(inputs.principal, &schedule.rows),
            warnings: schedule.warnings,
            hidden: false,
            schedule: schedule.rows,
        },
        Err(infeasible) => {
            MethodProjection::infeasible(method, payment, inputs.principal, infeasible.warning)
        }
    }
}

/// Orders visible projections by total interest, then length, then method;
/// unfinished schedules after finished ones and hidden projections last.
pub fn rank(mut projections: Vec<MethodProjection>) -> Comparison {
    projections.sort_by_key(|p| {
        (
            p.hidden,
            p.payoff_date.is_none(),
            p.total_interest,
            p.periods,
            p.method,
        )
    });
    if projections.iter().all(|p| p.hidden) {
        Comparison::NoViableOption(projections)
    } else {
        Comparison::Ranked(projections)
    }
}

/// Runs every repayment method against the same inputs. Pure: the same inputs
/// always yield the same comparison.
pub fn compare_all(inputs: &DebtInputs) -> Comparison {
    let projections: Vec<MethodProjection> = RepaymentMethod::ALL
        .iter()
        .map(|&m| project(inputs, m))
        .collect();
    let comparison = rank(projections);
    debug!(
        viable = comparison.is_viable(),
        visible = comparison.visible().count(),
        "repayment methods compared"
    );
    comparison
}
