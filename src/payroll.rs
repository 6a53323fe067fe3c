// src/payroll.rs

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::model::{
    max_of_defined, round2, AdjustmentTotals, CommissionResult, PayBreakdown, PayComponents,
    PayrollRow,
};

/// Normalizes an upstream row for an employee without fingerprint tracking:
/// absence and latency penalties are zeroed and the would-be penalty amounts
/// are folded back into the salary totals (and the internal subtotal fields
/// when the row carries them), making the employee whole.
///
/// Must run once per row before any component calculation reads it. Running
/// it again is a no-op because the penalty fields are already zero, and for
/// tracked employees the row is returned untouched.
pub fn normalize_row(row: &mut PayrollRow, fingerprint_required: bool) {
    if fingerprint_required {
        return;
    }

    let reimburse_lyd = row.absence_lyd + row.missing_lyd;
    let reimburse_usd = row.absence_usd + row.missing_usd;
    if reimburse_lyd != Decimal::ZERO || reimburse_usd != Decimal::ZERO {
        debug!(
            employee_id = row.employee_id,
            lyd = %reimburse_lyd,
            usd = %reimburse_usd,
            "folding absence/latency reimbursement back for untracked employee"
        );
    }

    row.total_salary_lyd = round2(row.total_salary_lyd + reimburse_lyd);
    row.net_salary_lyd = round2(row.net_salary_lyd + reimburse_lyd);
    row.total_salary_usd = round2(row.total_salary_usd + reimburse_usd);
    row.net_salary_usd = round2(row.net_salary_usd + reimburse_usd);
    if let Some(d7) = row.d7 {
        row.d7 = Some(round2(d7 + reimburse_lyd));
    }
    if let Some(c7) = row.c7 {
        row.c7 = Some(round2(c7 + reimburse_lyd));
    }
    if let Some(d16) = row.d16 {
        row.d16 = Some(round2(d16 + reimburse_usd));
    }
    if let Some(c16) = row.c16 {
        row.c16 = Some(round2(c16 + reimburse_usd));
    }

    row.absence_days = Decimal::ZERO;
    row.absence_lyd = Decimal::ZERO;
    row.absence_usd = Decimal::ZERO;
    row.missing_lyd = Decimal::ZERO;
    row.missing_usd = Decimal::ZERO;
}

/// Composes the per-employee breakdown from components, commission,
/// adjustments and the monthly loan installment.
///
/// Commission follows the prefer-max policy: when the locally resolved value
/// and the persisted row disagree, the larger non-negative one wins,
/// independent of arrival order. The same merge applies to the loan
/// installment.
pub fn aggregate_breakdown(
    row: &PayrollRow,
    components: &PayComponents,
    commission: &CommissionResult,
    adjustments: &AdjustmentTotals,
    loan_payment_lyd: Decimal,
) -> PayBreakdown {
    let gold_lyd = max_of_defined(&[Some(commission.gold_bonus_lyd), Some(row.gold_bonus_lyd)]);
    let diamond_lyd = max_of_defined(&[Some(commission.diamond_bonus_lyd), Some(row.diamond_bonus_lyd)]);
    let diamond_usd = max_of_defined(&[Some(commission.diamond_bonus_usd), Some(row.diamond_bonus_usd)]);
    let loan_lyd = max_of_defined(&[Some(loan_payment_lyd), Some(row.loan_credit_lyd)]);

    // Legacy rows predate the adjustment ledger; when the ledger is empty
    // for a currency, its backend bonus/addition fields stand in.
    let ledger_lyd_empty = adjustments.earnings_lyd == Decimal::ZERO
        && adjustments.deductions_lyd == Decimal::ZERO
        && adjustments.advance_lyd == Decimal::ZERO;
    let ledger_usd_empty =
        adjustments.earnings_usd == Decimal::ZERO && adjustments.deductions_usd == Decimal::ZERO;

    let (adj_earn_lyd, adj_deduct_lyd, advance_lyd) = if ledger_lyd_empty {
        (
            row.other_bonus1_lyd + row.other_bonus2_lyd + row.other_additions_lyd,
            row.other_deductions_lyd,
            Decimal::ZERO,
        )
    } else {
        (
            adjustments.earnings_lyd,
            adjustments.deductions_lyd,
            adjustments.advance_lyd,
        )
    };
    let (adj_earn_usd, adj_deduct_usd) = if ledger_usd_empty {
        (
            row.other_bonus1_usd + row.other_bonus2_usd + row.other_additions_usd,
            row.other_deductions_usd,
        )
    } else {
        (adjustments.earnings_usd, adjustments.deductions_usd)
    };

    let earnings_lyd = components.p_pay_lyd
        + components.ph_pay_lyd
        + components.phf_pay_lyd
        + components.food_lyd
        + components.transport_lyd
        + components.communication_lyd
        + gold_lyd
        + diamond_lyd
        + adj_earn_lyd;
    let deductions_lyd = components.absence_lyd
        + components.latency_lyd
        + advance_lyd
        + loan_lyd
        + adj_deduct_lyd;

    // USD carries no transport, communication, food or gold.
    let earnings_usd = components.p_pay_usd
        + components.ph_pay_usd
        + components.phf_pay_usd
        + diamond_usd
        + adj_earn_usd;
    let deductions_usd = components.absence_usd + components.latency_usd + adj_deduct_usd;

    PayBreakdown {
        earnings_lyd,
        earnings_usd,
        deductions_lyd,
        deductions_usd,
        ..Default::default()
    }
    .finalize()
}

/// Cross-employee totals for one run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RunTotals {
    pub employees: usize,
    pub gross_lyd: Decimal,
    pub gross_usd: Decimal,
    pub net_lyd: Decimal,
    pub net_usd: Decimal,
}

impl RunTotals {
    pub fn add(&mut self, breakdown: &PayBreakdown) {
        self.employees += 1;
        self.gross_lyd = round2(self.gross_lyd + breakdown.gross_lyd);
        self.gross_usd = round2(self.gross_usd + breakdown.gross_usd);
        self.net_lyd = round2(self.net_lyd + breakdown.net_lyd);
        self.net_usd = round2(self.net_usd + breakdown.net_usd);
    }
}

/// Monthly loan installment: `monthly_percent` of the principal, capped by
/// what remains outstanding.
pub fn loan_installment(principal: Decimal, monthly_percent: Decimal, remaining: Decimal) -> Decimal {
    if remaining <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round2((principal * monthly_percent / dec!(100)).min(remaining))
}
