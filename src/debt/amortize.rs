// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Single-strategy amortization.
//!
//! Interest is computed on the running balance each period and rounded to
//! minor units, so the schedule is exactly what a lender's statement would
//! show. The final period pays `balance + interest` instead of the nominal
//! payment.

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use serde::Serialize;
use thiserror::Error;

use crate::models::{PaymentFrequency, RateFrequency};
use crate::money::Money;

/// Hard cap on schedule length, whatever the caller asks for.
pub const MAX_SCHEDULE_PERIODS: u32 = 1200;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub level: WarningLevel,
    pub message: String,
}

impl Warning {
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            level: WarningLevel::Critical,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarningLevel::Warning,
            message: message.into(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.level == WarningLevel::Critical
    }
}

#[derive(Debug, Clone)]
pub struct AmortizationRequest {
    pub principal: Money,
    /// Percentage, e.g. `12` for 12%.
    pub rate: Decimal,
    pub rate_frequency: RateFrequency,
    pub payment: Money,
    pub payment_frequency: PaymentFrequency,
    pub start_date: NaiveDate,
    pub max_periods: u32,
    /// The term the borrower asked for; a longer payoff is warned about.
    pub term_periods: Option<u32>,
    /// Payoff beyond this many periods is warned about when no term is given.
    pub long_horizon_periods: Option<u32>,
    /// Income minus living costs, per payment period.
    pub cash_margin: Option<Money>,
    pub minor_units: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub period: u32,
    pub date: NaiveDate,
    /// Balance after this period's payment.
    pub balance: Money,
    pub payment: Money,
    pub interest: Money,
    pub principal_portion: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub rows: Vec<ScheduleRow>,
    pub total_interest: Money,
    pub total_paid: Money,
    pub payoff_date: Option<NaiveDate>,
    pub warnings: Vec<Warning>,
}

impl Schedule {
    pub fn periods(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn highest_payment(&self) -> Money {
        self.rows
            .iter()
            .map(|r| r.payment)
            .max()
            .unwrap_or(Money::ZERO)
    }

    pub fn remaining_balance(&self) -> Option<Money> {
        self.rows.last().map(|r| r.balance)
    }
}

/// The payment can never retire the debt, or the figures are too large to
/// compute. Detected without iterating past the first overflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", warning.message)]
pub struct Infeasible {
    pub payment: Money,
    pub first_interest: Money,
    pub warning: Warning,
}

impl Infeasible {
    fn new(payment: Money, first_interest: Money, message: String) -> Self {
        Self {
            payment,
            first_interest,
            warning: Warning::critical(message),
        }
    }
}

/// Rate per payment period as a fraction (not a percentage).
pub fn periodic_rate(rate: Decimal, frequency: RateFrequency, payments: PaymentFrequency) -> Decimal {
    let annual = match frequency {
        RateFrequency::Annual => rate,
        RateFrequency::Monthly => rate.saturating_mul(Decimal::from(12)),
    };
    annual / HUNDRED / Decimal::from(payments.periods_per_year())
}

/// Level payment that retires `principal` over `periods` at periodic rate `r`:
/// `P * r / (1 - (1 + r)^-n)`, or `P / n` when `r` is zero. Unrounded.
/// `None` when `periods` is zero or the power overflows.
pub fn annuity_payment(principal: Decimal, r: Decimal, periods: u32) -> Option<Decimal> {
    if periods == 0 {
        return None;
    }
    if r.is_zero() {
        return principal.checked_div(Decimal::from(periods));
    }
    let growth = (Decimal::ONE + r).checked_powu(u64::from(periods))?;
    let discount = Decimal::ONE.checked_div(growth)?;
    let denominator = Decimal::ONE - discount;
    if denominator.is_zero() {
        return None;
    }
    principal.checked_mul(r)?.checked_div(denominator)
}

/// Interest charged for one period on `balance`, rounded to minor units.
/// `None` when the product does not fit in a `Decimal`.
pub fn period_interest(balance: Money, r: Decimal, minor_units: u32) -> Option<Money> {
    balance
        .checked_mul(r)
        .map(|interest| Money::round(interest.amount(), minor_units))
}

fn out_of_range(req: &AmortizationRequest) -> Infeasible {
    Infeasible::new(
        req.payment,
        Money::ZERO,
        format!(
            "Principal {} at {}% is too large to schedule",
            req.principal.display(req.minor_units),
            req.rate
        ),
    )
}

pub fn amortize(req: &AmortizationRequest) -> Result<Schedule, Infeasible> {
    let mu = req.minor_units;
    let r = periodic_rate(req.rate, req.rate_frequency, req.payment_frequency);

    if req.rate < Decimal::ZERO {
        return Err(Infeasible::new(
            req.payment,
            Money::ZERO,
            format!("Interest rate {}% is negative", req.rate),
        ));
    }
    if !req.payment.is_positive() {
        return Err(Infeasible::new(
            req.payment,
            Money::ZERO,
            format!("Payment {} is not positive", req.payment.display(mu)),
        ));
    }
    if !req.principal.is_positive() {
        return Ok(Schedule {
            rows: Vec::new(),
            total_interest: Money::ZERO,
            total_paid: Money::ZERO,
            payoff_date: Some(req.start_date),
            warnings: Vec::new(),
        });
    }

    // Interest only falls as the balance falls, so a payment that beats the
    // first period's interest beats every later one.
    let first_interest = period_interest(req.principal, r, mu).ok_or_else(|| out_of_range(req))?;
    if req.payment <= first_interest {
        return Err(Infeasible::new(
            req.payment,
            first_interest,
            format!(
                "Payment {} does not cover the first period's interest of {}; the balance never falls",
                req.payment.display(mu),
                first_interest.display(mu)
            ),
        ));
    }

    let limit = req.max_periods.min(MAX_SCHEDULE_PERIODS);
    let mut rows = Vec::new();
    let mut balance = req.principal;
    let mut total_interest = Money::ZERO;
    let mut total_paid = Money::ZERO;
    let mut payoff_date = None;

    for period in 1..=limit {
        let Some(date) = req.payment_frequency.nth_date(req.start_date, period) else {
            break;
        };
        let step = period_interest(balance, r, mu).and_then(|interest| {
            let payment = req.payment.min(balance.checked_add(interest)?);
            let principal_portion = payment.checked_sub(interest)?;
            Some((
                interest,
                payment,
                principal_portion,
                balance.checked_sub(principal_portion)?,
                total_interest.checked_add(interest)?,
                total_paid.checked_add(payment)?,
            ))
        });
        let Some((interest, payment, principal_portion, next_balance, interest_so_far, paid_so_far)) = step
        else {
            return Err(out_of_range(req));
        };
        balance = next_balance;
        total_interest = interest_so_far;
        total_paid = paid_so_far;
        rows.push(ScheduleRow {
            period,
            date,
            balance,
            payment,
            interest,
            principal_portion,
        });
        if balance.is_zero() {
            payoff_date = Some(date);
            break;
        }
    }

    let mut warnings = Vec::new();
    let periods = rows.len() as u32;
    match payoff_date {
        None => warnings.push(Warning::warning(format!(
            "Not paid off within {} periods; {} still owed",
            periods,
            balance.display(mu)
        ))),
        Some(_) => {
            if let Some(term) = req.term_periods {
                if periods > term {
                    warnings.push(Warning::warning(format!(
                        "Payoff takes {} periods, beyond the requested term of {}",
                        periods, term
                    )));
                }
            } else if let Some(horizon) = req.long_horizon_periods {
                if periods > horizon {
                    warnings.push(Warning::warning(format!(
                        "Payoff takes {} periods, beyond the {} period horizon",
                        periods, horizon
                    )));
                }
            }
        }
    }
    if let Some(margin) = req.cash_margin {
        if req.payment > margin {
            warnings.push(Warning::warning(format!(
                "Payment {} exceeds the available cash margin of {}",
                req.payment.display(mu),
                margin.display(mu)
            )));
        }
    }

    Ok(Schedule {
        rows,
        total_interest,
        total_paid,
        payoff_date,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(principal: Decimal, rate: Decimal, payment: Decimal, max: u32) -> AmortizationRequest {
        AmortizationRequest {
            principal: Money::new(principal),
            rate,
            rate_frequency: RateFrequency::Annual,
            payment: Money::new(payment),
            payment_frequency: PaymentFrequency::Monthly,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            max_periods: max,
            term_periods: None,
            long_horizon_periods: None,
            cash_margin: None,
            minor_units: 2,
        }
    }

    #[test]
    fn periodic_rate_conversions() {
        assert_eq!(
            periodic_rate(dec!(12), RateFrequency::Annual, PaymentFrequency::Monthly),
            dec!(0.01)
        );
        assert_eq!(
            periodic_rate(dec!(1), RateFrequency::Monthly, PaymentFrequency::Monthly),
            dec!(0.01)
        );
        assert_eq!(
            periodic_rate(dec!(12), RateFrequency::Annual, PaymentFrequency::Quarterly),
            dec!(0.03)
        );
    }

    #[test]
    fn annuity_payment_zero_rate_divides_evenly() {
        assert_eq!(annuity_payment(dec!(1200), Decimal::ZERO, 12), Some(dec!(100)));
        assert_eq!(annuity_payment(dec!(1200), dec!(0.01), 0), None);
    }

    #[test]
    fn annuity_payment_matches_closed_form() {
        let p = annuity_payment(dec!(1200), dec!(0.01), 12).unwrap();
        assert_eq!(Money::round_up(p, 2), Money::new(dec!(106.62)));
        assert!((p - dec!(106.6185)).abs() < dec!(0.0001));
    }

    #[test]
    fn last_payment_is_partial() {
        let s = amortize(&request(dec!(1200), dec!(12), dec!(106.62), 24)).unwrap();
        assert_eq!(s.periods(), 12);
        let last = s.rows.last().unwrap();
        assert_eq!(last.payment, Money::new(dec!(106.60)));
        assert_eq!(last.interest, Money::new(dec!(1.06)));
        assert_eq!(last.balance, Money::ZERO);
        assert_eq!(s.highest_payment(), Money::new(dec!(106.62)));
    }

    #[test]
    fn payment_equal_to_interest_is_infeasible() {
        // 1000 at 12% monthly accrues exactly 10.00 in the first period
        let err = amortize(&request(dec!(1000), dec!(12), dec!(10), 600)).unwrap_err();
        assert!(err.warning.is_critical());
        assert_eq!(err.first_interest, Money::new(dec!(10.00)));
    }

    #[test]
    fn zero_principal_is_already_paid() {
        let s = amortize(&request(dec!(0), dec!(12), dec!(50), 12)).unwrap();
        assert!(s.rows.is_empty());
        assert_eq!(s.payoff_date, NaiveDate::from_ymd_opt(2025, 1, 15));
    }

    #[test]
    fn cap_applies_to_huge_horizons() {
        let s = amortize(&request(dec!(1000000), dec!(0), dec!(1), u32::MAX)).unwrap();
        assert_eq!(s.periods(), MAX_SCHEDULE_PERIODS);
        assert!(s.payoff_date.is_none());
    }

    #[test]
    fn figures_beyond_decimal_range_are_infeasible() {
        let req = request(dec!(79000000000000000000000000000), dec!(12), dec!(10000000000000000000000000000), 600);
        let err = amortize(&req).unwrap_err();
        assert!(err.warning.is_critical());
        assert!(err.warning.message.contains("too large"));

        assert_eq!(annuity_payment(dec!(79000000000000000000000000000), dec!(2), 12), None);
        assert_eq!(period_interest(Money::new(Decimal::MAX), dec!(1.5), 2), None);
        assert_eq!(
            periodic_rate(Decimal::MAX, RateFrequency::Monthly, PaymentFrequency::Monthly),
            Decimal::MAX / Decimal::ONE_HUNDRED / Decimal::from(12)
        );
    }
}
