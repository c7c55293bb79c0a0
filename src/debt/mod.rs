// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod amortize;
pub mod compare;
pub mod plan;

pub use amortize::{amortize, AmortizationRequest, Infeasible, Schedule, Warning, WarningLevel};
pub use compare::{compare_all, CashFlow, Comparison, DebtInputs, MethodProjection};
