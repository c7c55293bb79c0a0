// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use ledgerwise::debt::amortize::{amortize, annuity_payment, AmortizationRequest, WarningLevel};
use ledgerwise::debt::compare::{compare_all, CashFlow, Comparison, DebtInputs};
use ledgerwise::debt::plan::{self, Funding};
use ledgerwise::error::{IntegrityViolation, LedgerError, ValidationError};
use ledgerwise::ledger::{Ledger, LedgerConfig, MemoryStore, PostOutcome};
use ledgerwise::models::{AccountType, OwnerId, PaymentFrequency, RateFrequency, RepaymentMethod};
use ledgerwise::money::Money;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
}

fn m(v: Decimal) -> Money {
    Money::new(v)
}

fn request(principal: Decimal, rate: Decimal, payment: Decimal, max_periods: u32) -> AmortizationRequest {
    AmortizationRequest {
        principal: m(principal),
        rate,
        rate_frequency: RateFrequency::Annual,
        payment: m(payment),
        payment_frequency: PaymentFrequency::Monthly,
        start_date: start(),
        max_periods,
        term_periods: None,
        long_horizon_periods: None,
        cash_margin: None,
        minor_units: 2,
    }
}

fn inputs() -> DebtInputs {
    DebtInputs {
        principal: m(dec!(1200)),
        rate: dec!(12),
        rate_frequency: RateFrequency::Annual,
        payment_frequency: PaymentFrequency::Monthly,
        start_date: start(),
        term_periods: 12,
        stated_minimum: None,
        cash_flow: Some(CashFlow {
            income: m(dec!(2000)),
            living_costs: m(dec!(1500)),
            other_obligations: m(dec!(200)),
        }),
        max_periods: 600,
        long_horizon_periods: 360,
        minor_units: 2,
    }
}

#[test]
fn twelve_month_loan_pays_off_at_period_twelve() {
    let exact = annuity_payment(dec!(1200), dec!(0.01), 12).unwrap();
    let payment = Money::round_up(exact, 2);
    assert_eq!(payment, m(dec!(106.62)));

    let s = amortize(&request(dec!(1200), dec!(12), payment.amount(), 12)).unwrap();
    assert_eq!(s.periods(), 12);
    assert_eq!(s.payoff_date, NaiveDate::from_ymd_opt(2026, 1, 31));
    assert_eq!(s.total_interest, m(dec!(79.42)));

    let closed_form = exact * dec!(12) - dec!(1200);
    assert!((s.total_interest.amount() - closed_form).abs() <= dec!(0.01));
    assert!(s.warnings.is_empty());
}

#[test]
fn month_end_dates_do_not_drift() {
    let s = amortize(&request(dec!(1200), dec!(12), dec!(106.62), 12)).unwrap();
    let dates: Vec<String> = s.rows.iter().take(3).map(|r| r.date.to_string()).collect();
    assert_eq!(dates, ["2025-02-28", "2025-03-31", "2025-04-30"]);
}

#[test]
fn payment_of_one_hundred_needs_a_thirteenth_period() {
    let capped = amortize(&request(dec!(1200), dec!(12), dec!(100), 12)).unwrap();
    assert_eq!(capped.payoff_date, None);
    assert_eq!(capped.remaining_balance(), Some(m(dec!(83.94))));
    assert_eq!(capped.warnings.len(), 1);

    let s = amortize(&request(dec!(1200), dec!(12), dec!(100), 24)).unwrap();
    assert_eq!(s.periods(), 13);
    assert_eq!(s.total_interest, m(dec!(84.78)));
    let last = s.rows.last().unwrap();
    assert_eq!(last.payment, m(dec!(84.78)));
    assert_eq!(last.balance, Money::ZERO);
}

#[test]
fn payment_below_interest_is_infeasible_without_iterating() {
    let err = amortize(&request(dec!(10000), dec!(24), dec!(50), u32::MAX)).unwrap_err();
    assert_eq!(err.warning.level, WarningLevel::Critical);
    assert_eq!(err.first_interest, m(dec!(200.00)));
    assert_eq!(err.payment, m(dec!(50)));
}

#[test]
fn monthly_rates_are_annualised_before_splitting_by_period() {
    let mut req = request(dec!(1200), dec!(1), dec!(106.62), 24);
    req.rate_frequency = RateFrequency::Monthly;
    let s = amortize(&req).unwrap();
    assert_eq!(s.total_interest, m(dec!(79.42)));
}

#[test]
fn zero_rate_divides_principal_evenly() {
    let mut i = inputs();
    i.rate = Decimal::ZERO;
    assert_eq!(i.fixed_term_payment(), Some(m(dec!(100))));
    let c = compare_all(&i);
    let fixed = c.get(RepaymentMethod::FixedTerm).unwrap();
    assert_eq!(fixed.periods, 12);
    assert_eq!(fixed.total_interest, Money::ZERO);
}

#[test]
fn warnings_for_cash_margin_and_long_horizon() {
    let mut req = request(dec!(1200), dec!(12), dec!(24), 600);
    req.long_horizon_periods = Some(60);
    req.cash_margin = Some(m(dec!(20)));
    let s = amortize(&req).unwrap();
    assert_eq!(s.periods(), 70);
    assert_eq!(s.total_interest, m(dec!(471.88)));
    assert_eq!(s.warnings.len(), 2);
    assert!(s.warnings.iter().all(|w| w.level == WarningLevel::Warning));

    let mut req = request(dec!(1200), dec!(12), dec!(100), 24);
    req.term_periods = Some(12);
    let s = amortize(&req).unwrap();
    assert!(s.warnings[0].message.contains("beyond the requested term"));
}

#[test]
fn one_infeasible_method_is_hidden_and_the_rest_ranked() {
    let mut i = inputs();
    // below the first month's 12.00 of interest
    i.stated_minimum = Some(m(dec!(10)));

    let c = compare_all(&i);
    assert!(c.is_viable());
    let visible: Vec<RepaymentMethod> = c.visible().map(|p| p.method).collect();
    assert_eq!(visible, [RepaymentMethod::Aggressive, RepaymentMethod::FixedTerm]);
    let hidden: Vec<_> = c.projections().iter().filter(|p| p.hidden).collect();
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].method, RepaymentMethod::Minimum);
    assert_eq!(hidden[0].warnings[0].level, WarningLevel::Critical);

    let aggressive = c.best().unwrap();
    assert_eq!(aggressive.payment, m(dec!(310)));
    assert_eq!(aggressive.periods, 4);
    assert_eq!(aggressive.total_interest, m(dec!(30.00)));
    assert_eq!(aggressive.highest_payment, m(dec!(310)));
    assert_eq!(aggressive.schedule.last().unwrap().payment, m(dec!(300.00)));
}

#[test]
fn every_method_infeasible_is_a_distinct_result() {
    let mut i = inputs();
    i.stated_minimum = Some(m(dec!(10)));
    i.term_periods = 0;
    i.cash_flow = Some(CashFlow {
        income: m(dec!(1000)),
        living_costs: m(dec!(1200)),
        other_obligations: Money::ZERO,
    });

    let c = compare_all(&i);
    assert!(matches!(c, Comparison::NoViableOption(_)));
    assert_eq!(c.projections().len(), 3);
    assert!(c.best().is_none());
    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json["status"], "no_viable_option");
}

#[test]
fn rate_driven_minimum_is_slowest_and_sparkline_is_sampled() {
    let c = compare_all(&inputs());
    let minimum = c.get(RepaymentMethod::Minimum).unwrap();
    assert_eq!(minimum.payment, m(dec!(24.00)));
    assert_eq!(minimum.periods, 70);
    assert_eq!(c.projections().last().unwrap().method, RepaymentMethod::Minimum);

    let fixed = c.get(RepaymentMethod::FixedTerm).unwrap();
    assert_eq!(fixed.sparkline.len(), 10);
    assert_eq!(fixed.sparkline[0], m(dec!(1200)));
    assert_eq!(fixed.sparkline[1], m(dec!(1105.38)));
    assert_eq!(fixed.sparkline[9], Money::ZERO);
}

#[test]
fn comparison_is_deterministic() {
    let a = serde_json::to_string(&compare_all(&inputs())).unwrap();
    let b = serde_json::to_string(&compare_all(&inputs())).unwrap();
    assert_eq!(a, b);
}

fn ledger() -> Ledger {
    Ledger::new(Arc::new(MemoryStore::new()), LedgerConfig::default())
}

#[test]
fn adopted_debt_tracks_payments_through_the_ledger() {
    let l = ledger();
    let o = OwnerId::new("o");
    let checking = l.open_account(&o, "Checking", AccountType::Asset, None, start()).unwrap();
    let interest = l.open_account(&o, "Interest", AccountType::Expense, None, start()).unwrap();

    let i = inputs();
    let c = compare_all(&i);
    let fixed = c.get(RepaymentMethod::FixedTerm).unwrap();
    let debt = plan::adopt(&l, &o, "Car loan", &i, fixed, Funding::Proceeds(checking.id)).unwrap();
    assert_eq!(debt.current_balance, m(dec!(1200)));
    assert_eq!(debt.payment_amount, m(dec!(106.62)));
    assert_eq!(debt.total_periods, 12);
    // borrowed cash and the liability cancel out
    assert_eq!(l.projector().net_worth(&o, start()).unwrap(), Money::ZERO);

    let feb = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
    let accrued = plan::accrue_interest(&l, &o, debt.id, interest.id, feb).unwrap();
    assert!(matches!(accrued, PostOutcome::Committed(_)));
    plan::record_payment(&l, &o, debt.id, checking.id, None, feb).unwrap();

    let debt = plan::debt(&l, &o, debt.id).unwrap();
    assert_eq!(debt.current_balance, m(dec!(1105.38)));
    assert_eq!(
        l.projector().balance(&o, debt.liability_account_id).unwrap(),
        debt.current_balance
    );
    assert_eq!(l.projector().balance(&o, interest.id).unwrap(), m(dec!(12.00)));
    let report = l.projector().verify(&o).unwrap();
    assert_eq!(report.debts_checked, 1);
}

#[test]
fn default_payment_is_capped_at_what_is_owed() {
    let l = ledger();
    let o = OwnerId::new("o");
    let checking = l.open_account(&o, "Checking", AccountType::Asset, None, start()).unwrap();
    let mut i = inputs();
    i.principal = m(dec!(50));
    let c = compare_all(&i);
    let debt = plan::adopt(&l, &o, "Small", &i, c.get(RepaymentMethod::Aggressive).unwrap(), Funding::Existing)
        .unwrap();
    assert!(debt.payment_amount > m(dec!(50)));
    plan::record_payment(&l, &o, debt.id, checking.id, None, start()).unwrap();
    assert_eq!(plan::debt(&l, &o, debt.id).unwrap().current_balance, Money::ZERO);
}

#[test]
fn stale_cache_is_reported_then_rebuilt() {
    let l = ledger();
    let o = OwnerId::new("o");
    let i = inputs();
    let c = compare_all(&i);
    let debt = plan::adopt(&l, &o, "Card", &i, c.get(RepaymentMethod::FixedTerm).unwrap(), Funding::Existing)
        .unwrap();

    l.store().set_debt_balance(debt.id, m(dec!(999))).unwrap();
    assert!(matches!(
        l.projector().verify(&o),
        Err(LedgerError::Integrity(IntegrityViolation::CachedBalanceMismatch { .. }))
    ));

    assert_eq!(plan::refresh_balance(&l, &o, debt.id).unwrap(), m(dec!(1200)));
    l.projector().verify(&o).unwrap();
}

#[test]
fn hidden_methods_cannot_be_adopted() {
    let l = ledger();
    let o = OwnerId::new("o");
    let mut i = inputs();
    i.stated_minimum = Some(m(dec!(1)));
    let c = compare_all(&i);
    let err = plan::adopt(&l, &o, "Loan", &i, c.get(RepaymentMethod::Minimum).unwrap(), Funding::Existing)
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::InfeasibleMethod(RepaymentMethod::Minimum))
    ));
    assert!(l.accounts(&o).unwrap().is_empty());
}

#[test]
fn debts_are_scoped_to_their_owner() {
    let l = ledger();
    let o = OwnerId::new("o");
    let i = inputs();
    let c = compare_all(&i);
    let debt = plan::adopt(&l, &o, "Loan", &i, c.best().unwrap(), Funding::Existing).unwrap();
    let other = OwnerId::new("someone-else");
    assert!(matches!(
        plan::debt(&l, &other, debt.id),
        Err(LedgerError::Validation(ValidationError::UnknownDebt(_)))
    ));
    assert_eq!(plan::debts(&l, &o).unwrap().len(), 1);
    assert!(plan::debts(&l, &other).unwrap().is_empty());
}

#[test]
fn concurrent_default_payments_never_overpay() {
    let l = Arc::new(ledger());
    let o = OwnerId::new("o");
    let checking = l.open_account(&o, "Checking", AccountType::Asset, None, start()).unwrap();
    let mut i = inputs();
    i.principal = m(dec!(50));
    let c = compare_all(&i);
    let debt = plan::adopt(&l, &o, "Small", &i, c.get(RepaymentMethod::Aggressive).unwrap(), Funding::Existing)
        .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let l = Arc::clone(&l);
            let o = o.clone();
            thread::spawn(move || plan::record_payment(&l, &o, debt.id, checking.id, None, start()).unwrap())
        })
        .collect();
    let outcomes: Vec<PostOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|out| matches!(out, PostOutcome::Committed(_))).count(), 1);
    assert_eq!(l.projector().balance(&o, debt.liability_account_id).unwrap(), Money::ZERO);
    assert_eq!(l.projector().balance(&o, checking.id).unwrap(), m(dec!(-50)));
    l.projector().verify(&o).unwrap();
}

#[test]
fn rejected_proceeds_leave_no_liability_behind() {
    let l = ledger();
    let o = OwnerId::new("o");
    let checking = l.open_account(&o, "Checking", AccountType::Asset, None, start()).unwrap();
    l.deactivate_account(&o, checking.id).unwrap();
    let i = inputs();
    let c = compare_all(&i);
    let fixed = c.get(RepaymentMethod::FixedTerm).unwrap();

    let err = plan::adopt(&l, &o, "Car loan", &i, fixed, Funding::Proceeds(checking.id)).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::InactiveAccount(_))
    ));
    let names: Vec<String> = l.accounts(&o).unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["Checking".to_string()]);
    assert!(plan::debts(&l, &o).unwrap().is_empty());

    // the same name is free for a retry
    l.reactivate_account(&o, checking.id).unwrap();
    let debt = plan::adopt(&l, &o, "Car loan", &i, fixed, Funding::Proceeds(checking.id)).unwrap();
    assert_eq!(debt.current_balance, m(dec!(1200)));
}

#[test]
fn interest_accrues_on_the_balance_at_posting_time() {
    let l = ledger();
    let o = OwnerId::new("o");
    let interest = l.open_account(&o, "Interest", AccountType::Expense, None, start()).unwrap();
    let i = inputs();
    let c = compare_all(&i);
    let debt = plan::adopt(&l, &o, "Loan", &i, c.get(RepaymentMethod::FixedTerm).unwrap(), Funding::Existing)
        .unwrap();

    let feb = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
    plan::accrue_interest(&l, &o, debt.id, interest.id, feb).unwrap();
    plan::accrue_interest(&l, &o, debt.id, interest.id, feb).unwrap();
    // the second charge compounds on the first
    assert_eq!(l.projector().balance(&o, interest.id).unwrap(), m(dec!(24.12)));
    assert_eq!(plan::debt(&l, &o, debt.id).unwrap().current_balance, m(dec!(1224.12)));
}
