// src/ledger.rs

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;
use tracing::warn;

use crate::model::{
    round2, Adjustment, AdjustmentKind, AdjustmentTotals, Currency, Direction, EmployeeProfile,
};

/// User-facing rejection of an adjustment or loan at entry time. Nothing is
/// partially applied; the caller surfaces the message inline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
    #[error("No employee with id {employee_id}")]
    UnknownEmployee { employee_id: i64 },
    #[error("Custom adjustments require a label")]
    MissingCustomLabel,
    #[error("USD entries require a USD base salary (employee {employee_id})")]
    UsdNotEligible { employee_id: i64 },
    #[error("Salary advances are LYD-only")]
    UsdAdvance,
    #[error(
        "Advance total {requested} LYD exceeds {max_percent}% of base salary (limit {limit} LYD)"
    )]
    AdvanceCapExceeded {
        requested: Decimal,
        max_percent: Decimal,
        limit: Decimal,
    },
    #[error("Loan principal {principal} exceeds {max_multiple}x base salary (limit {limit})")]
    LoanCapExceeded {
        principal: Decimal,
        max_multiple: Decimal,
        limit: Decimal,
    },
    #[error("Loans require one full year of service (contract started {contract_start})")]
    LoanServiceTooShort { contract_start: NaiveDate },
    #[error("Loan eligibility cannot be established without a contract start date")]
    LoanMissingContractStart,
}

/// Advance/loan policy limits, externally supplied with documented defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCaps {
    /// Monthly advance ceiling as a percentage of base salary.
    pub advance_max_percent: Decimal,
    /// Loan principal ceiling as a multiple of base salary.
    pub loan_max_multiple: Decimal,
}

impl Default for PolicyCaps {
    fn default() -> Self {
        Self {
            advance_max_percent: dec!(50),
            loan_max_multiple: dec!(3),
        }
    }
}

/// Folds a month's applicable adjustments into per-currency earnings and
/// deduction sums. Zero and negative amounts are dropped silently; advances
/// are tracked separately and never enter the general buckets.
pub fn classify_adjustments(adjustments: &[Adjustment]) -> AdjustmentTotals {
    let mut totals = AdjustmentTotals::default();
    for adj in adjustments {
        if adj.amount <= Decimal::ZERO {
            continue;
        }
        if adj.kind == AdjustmentKind::Advance {
            match adj.currency {
                Currency::Lyd => totals.advance_lyd += adj.amount,
                // USD advances are not modeled; entry validation rejects
                // them, so anything here is legacy data.
                Currency::Usd => warn!(adjustment_id = adj.id, "ignoring USD advance entry"),
            }
            continue;
        }
        let bucket = match (adj.effective_direction(), adj.currency) {
            (Direction::Deduct, Currency::Lyd) => &mut totals.deductions_lyd,
            (Direction::Deduct, Currency::Usd) => &mut totals.deductions_usd,
            (Direction::Add, Currency::Lyd) => &mut totals.earnings_lyd,
            (Direction::Add, Currency::Usd) => &mut totals.earnings_usd,
        };
        *bucket += adj.amount;
    }
    totals.earnings_lyd = round2(totals.earnings_lyd);
    totals.earnings_usd = round2(totals.earnings_usd);
    totals.deductions_lyd = round2(totals.deductions_lyd);
    totals.deductions_usd = round2(totals.deductions_usd);
    totals.advance_lyd = round2(totals.advance_lyd);
    totals
}

/// Entry-time validation of a new adjustment. `month_advance_total` is the
/// employee's already-persisted advance sum for the same month.
pub fn validate_adjustment(
    adj: &Adjustment,
    profile: &EmployeeProfile,
    month_advance_total: Decimal,
    caps: &PolicyCaps,
) -> Result<(), ValidationError> {
    if adj.amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }
    if adj.kind == AdjustmentKind::Custom
        && adj.label.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        return Err(ValidationError::MissingCustomLabel);
    }
    if adj.currency == Currency::Usd {
        if adj.kind == AdjustmentKind::Advance {
            return Err(ValidationError::UsdAdvance);
        }
        if !profile.usd_eligible() {
            return Err(ValidationError::UsdNotEligible {
                employee_id: profile.id,
            });
        }
    }
    if adj.kind == AdjustmentKind::Advance {
        let limit = round2(profile.base_salary_lyd * caps.advance_max_percent / dec!(100));
        let requested = month_advance_total + adj.amount;
        if requested > limit {
            return Err(ValidationError::AdvanceCapExceeded {
                requested,
                max_percent: caps.advance_max_percent,
                limit,
            });
        }
    }
    Ok(())
}

/// Entry-time validation of a new loan: principal cap and the one-year
/// service requirement.
pub fn validate_loan(
    principal: Decimal,
    profile: &EmployeeProfile,
    caps: &PolicyCaps,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    if principal <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }
    let limit = round2(profile.base_salary_lyd * caps.loan_max_multiple);
    if principal > limit {
        return Err(ValidationError::LoanCapExceeded {
            principal,
            max_multiple: caps.loan_max_multiple,
            limit,
        });
    }
    let Some(contract_start) = profile.contract_start else {
        return Err(ValidationError::LoanMissingContractStart);
    };
    let eligible_from = contract_start
        .checked_add_months(Months::new(12))
        .unwrap_or(NaiveDate::MAX);
    if today < eligible_from {
        return Err(ValidationError::LoanServiceTooShort { contract_start });
    }
    Ok(())
}
