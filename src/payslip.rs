// src/payslip.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;

use crate::classifier::{classify, ClassifyContext};
use crate::model::{
    AdjustmentTotals, AttendanceAggregate, AttendanceDay, CommissionResult, EmployeeProfile,
    PayBreakdown, PayComponents,
};

/// One earnings or deduction line on the payslip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayslipLine {
    pub label: &'static str,
    pub amount_lyd: Decimal,
    pub amount_usd: Decimal,
}

impl PayslipLine {
    fn new(label: &'static str, amount_lyd: Decimal, amount_usd: Decimal) -> Self {
        Self {
            label,
            amount_lyd,
            amount_usd,
        }
    }

    fn is_zero(&self) -> bool {
        self.amount_lyd == Decimal::ZERO && self.amount_usd == Decimal::ZERO
    }
}

/// One cell of the payslip's attendance grid, document-intent codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayslipDayCell {
    pub date: NaiveDate,
    pub code: String,
}

/// Structured, printable payslip breakdown. Layout and typography are the
/// renderer's problem; this is pure data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayslipDocument {
    pub employee_id: i64,
    pub display_name: String,
    pub title: Option<String>,
    pub year: i32,
    pub month: u32,
    pub earnings: Vec<PayslipLine>,
    pub deductions: Vec<PayslipLine>,
    pub attendance: Vec<PayslipDayCell>,
    pub missing_hours: Decimal,
    pub totals: PayBreakdown,
}

/// Assembles the payslip from computed pieces plus the month's attendance
/// detail. `ctx` must carry the document intent so holiday and leave codes
/// render with the payslip normalization.
#[allow(clippy::too_many_arguments)]
pub fn build_payslip(
    profile: &EmployeeProfile,
    year: i32,
    month: u32,
    days: &[AttendanceDay],
    ctx: &ClassifyContext<'_>,
    aggregate: Option<&AttendanceAggregate>,
    components: &PayComponents,
    commission: &CommissionResult,
    adjustments: &AdjustmentTotals,
    loan_payment_lyd: Decimal,
    breakdown: &PayBreakdown,
) -> PayslipDocument {
    let by_date: HashMap<NaiveDate, &AttendanceDay> = days.iter().map(|d| (d.date, d)).collect();
    let attendance = crate::attendance::month_days(year, month)
        .into_iter()
        .map(|date| PayslipDayCell {
            date,
            code: classify(by_date.get(&date).copied(), date, ctx)
                .as_str()
                .to_string(),
        })
        .collect();

    let earnings = [
        PayslipLine::new("Base pay", components.p_pay_lyd, components.p_pay_usd),
        PayslipLine::new("Paid holiday", components.ph_pay_lyd, components.ph_pay_usd),
        PayslipLine::new(
            "Paid holiday (full day)",
            components.phf_pay_lyd,
            components.phf_pay_usd,
        ),
        PayslipLine::new("Food allowance", components.food_lyd, dec!(0)),
        PayslipLine::new("Transport allowance", components.transport_lyd, dec!(0)),
        PayslipLine::new("Communication allowance", components.communication_lyd, dec!(0)),
        PayslipLine::new("Gold commission", commission.gold_bonus_lyd, dec!(0)),
        PayslipLine::new(
            "Diamond commission",
            commission.diamond_bonus_lyd,
            commission.diamond_bonus_usd,
        ),
        PayslipLine::new("Other additions", adjustments.earnings_lyd, adjustments.earnings_usd),
    ]
    .into_iter()
    .filter(|l| !l.is_zero())
    .collect();

    let deductions = [
        PayslipLine::new("Absence", components.absence_lyd, components.absence_usd),
        PayslipLine::new("Latency", components.latency_lyd, components.latency_usd),
        PayslipLine::new("Salary advance", adjustments.advance_lyd, dec!(0)),
        PayslipLine::new("Loan installment", loan_payment_lyd, dec!(0)),
        PayslipLine::new(
            "Other deductions",
            adjustments.deductions_lyd,
            adjustments.deductions_usd,
        ),
    ]
    .into_iter()
    .filter(|l| !l.is_zero())
    .collect();

    let missing_hours = aggregate
        .map(crate::attendance::missing_hours)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2);

    PayslipDocument {
        employee_id: profile.id,
        display_name: profile.display_name(),
        title: profile.title.clone(),
        year,
        month,
        earnings,
        deductions,
        attendance,
        missing_hours,
        totals: breakdown.clone(),
    }
}
