// src/components.rs

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::model::{round2, AttendanceAggregate, EmployeeProfile, PayComponents, PayrollRow};

/// All daily-rate prorations divide by a fixed 30-day month regardless of
/// calendar length. Deliberate simplification, applied uniformly.
pub const FIXED_MONTH_DAYS: Decimal = Decimal::from_parts(30, 0, 0, false, 0);

fn daily_rate(base: Decimal) -> Decimal {
    round2(base / FIXED_MONTH_DAYS)
}

/// Food allowance per day: the explicit per-day figure when configured,
/// otherwise the monthly total spread over the schedule.
fn food_per_day(profile: &EmployeeProfile) -> Decimal {
    if let Some(per_day) = profile.food_per_day {
        return per_day;
    }
    match profile.food_monthly {
        Some(monthly) if profile.working_days > 0 => {
            round2(monthly / Decimal::from(profile.working_days))
        }
        _ => Decimal::ZERO,
    }
}

/// Derives the named pay lines from the attendance aggregate, the employee
/// profile and the upstream row. `aggregate` is `None` when the timesheet
/// fetch failed for this employee; day counters then fall back to the row.
pub fn compute_components(
    profile: &EmployeeProfile,
    row: &PayrollRow,
    aggregate: Option<&AttendanceAggregate>,
    fingerprint_required: bool,
) -> PayComponents {
    let rate_lyd = daily_rate(profile.base_salary_lyd);
    let rate_usd = daily_rate(profile.base_salary_usd);
    let schedule_days = Decimal::from(profile.working_days);

    // Present days prefer the local aggregate, then the backend counter.
    let present_days = aggregate
        .map(|a| Decimal::from(a.present_p))
        .or(row.p_days)
        .unwrap_or(Decimal::ZERO);
    let ph_part_days = aggregate
        .map(|a| Decimal::from(a.ph_part_days))
        .unwrap_or(row.ph_days);
    let phf_days = aggregate
        .map(|a| Decimal::from(a.ph_full_days))
        .unwrap_or(row.phf_days);
    let absence_days = aggregate.map(|a| a.absence_days).unwrap_or(row.absence_days);

    let food_rate = food_per_day(profile);

    let mut out = PayComponents {
        daily_rate_lyd: rate_lyd,
        daily_rate_usd: rate_usd,
        p_pay_lyd: round2(present_days * rate_lyd),
        p_pay_usd: round2(present_days * rate_usd),
        // Paid holidays earn double rate; the part-day variant carries no
        // food, the full-day variant does (LYD only).
        ph_pay_lyd: round2(ph_part_days * dec!(2) * rate_lyd),
        ph_pay_usd: round2(ph_part_days * dec!(2) * rate_usd),
        phf_pay_lyd: round2(phf_days * (dec!(2) * rate_lyd + food_rate)),
        phf_pay_usd: round2(phf_days * dec!(2) * rate_usd),
        transport_lyd: round2(profile.fuel_monthly),
        communication_lyd: round2(profile.communication_monthly),
        ..PayComponents::default()
    };

    // Food-paid days branch on fingerprint tracking.
    let paid_days = if fingerprint_required {
        // Tracked employees are paid food strictly for verified-present
        // days, never beyond the schedule.
        let attended = match aggregate {
            Some(a) if a.present_strict > 0 => Decimal::from(a.present_strict),
            Some(a) if a.present_p > 0 => Decimal::from(a.present_p),
            _ => row
                .p_days
                .unwrap_or_else(|| (schedule_days - absence_days).max(Decimal::ZERO)),
        };
        schedule_days.min(attended).max(Decimal::ZERO)
    } else {
        // Untracked employees default to the full schedule minus confirmed
        // leave, taking the most generous attendance baseline available.
        let baseline = aggregate
            .map(|a| Decimal::from(a.food_eligible_non_fp_days))
            .unwrap_or(Decimal::ZERO)
            .max(schedule_days)
            .max(row.food_days);
        let leave_units = aggregate.map(|a| a.leave_units).unwrap_or(Decimal::ZERO);
        (baseline - leave_units).max(Decimal::ZERO)
    };
    out.food_paid_days = paid_days;
    out.food_lyd = round2(food_rate * paid_days);

    // Absence and latency are fingerprint-gated; untracked employees are
    // never penalized through this path. Monetary latency always comes from
    // the upstream engine so the figures match to the cent.
    if fingerprint_required {
        out.absence_lyd = if row.absence_lyd > Decimal::ZERO {
            round2(row.absence_lyd)
        } else {
            round2(absence_days * rate_lyd)
        };
        out.absence_usd = if row.absence_usd > Decimal::ZERO {
            round2(row.absence_usd)
        } else {
            round2(absence_days * rate_usd)
        };
        out.latency_lyd = round2(row.missing_lyd);
        out.latency_usd = round2(row.missing_usd);
    }

    debug!(
        employee_id = profile.id,
        p_pay = %out.p_pay_lyd,
        food = %out.food_lyd,
        absence = %out.absence_lyd,
        "computed pay components"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommissionProfile;

    fn profile(base_lyd: Decimal) -> EmployeeProfile {
        EmployeeProfile {
            id: 1,
            name_ar: None,
            name_en: Some("Test".into()),
            base_salary_lyd: base_lyd,
            base_salary_usd: dec!(0),
            working_days: 26,
            food_per_day: Some(dec!(10)),
            food_monthly: None,
            fuel_monthly: dec!(120),
            communication_monthly: dec!(40),
            fingerprint_required: true,
            contract_start: None,
            title: None,
            ps: None,
            commission: CommissionProfile::default(),
        }
    }

    #[test]
    fn p_pay_uses_fixed_thirty_day_month() {
        // 900 LYD base, 26 present days -> 26 * 30 = 780.00
        let agg = AttendanceAggregate {
            present_p: 26,
            present_strict: 26,
            ..Default::default()
        };
        let out = compute_components(&profile(dec!(900)), &PayrollRow::default(), Some(&agg), true);
        assert_eq!(out.daily_rate_lyd, dec!(30.00));
        assert_eq!(out.p_pay_lyd, dec!(780.00));
    }

    #[test]
    fn ph_pay_is_double_rate() {
        let agg = AttendanceAggregate {
            present_p: 27,
            present_strict: 26,
            ph_part_days: 1,
            ..Default::default()
        };
        let out = compute_components(&profile(dec!(900)), &PayrollRow::default(), Some(&agg), true);
        assert_eq!(out.ph_pay_lyd, dec!(60.00));
        // PHF additionally includes food on top of the double rate.
        let agg_full = AttendanceAggregate {
            ph_full_days: 1,
            ..agg
        };
        let out =
            compute_components(&profile(dec!(900)), &PayrollRow::default(), Some(&agg_full), true);
        assert_eq!(out.phf_pay_lyd, dec!(70.00));
    }

    #[test]
    fn untracked_employee_is_not_absence_penalized() {
        let agg = AttendanceAggregate {
            absence_days: dec!(4),
            ..Default::default()
        };
        let row = PayrollRow {
            absence_lyd: dec!(120),
            missing_lyd: dec!(15),
            ..Default::default()
        };
        let out = compute_components(&profile(dec!(900)), &row, Some(&agg), false);
        assert_eq!(out.absence_lyd, dec!(0));
        assert_eq!(out.latency_lyd, dec!(0));
    }

    #[test]
    fn untracked_food_days_subtract_leave_from_schedule() {
        let agg = AttendanceAggregate {
            food_eligible_non_fp_days: 24,
            leave_units: dec!(2),
            ..Default::default()
        };
        let out = compute_components(&profile(dec!(900)), &PayrollRow::default(), Some(&agg), false);
        // max(24, 26, 0) - 2 = 24
        assert_eq!(out.food_paid_days, dec!(24));
        assert_eq!(out.food_lyd, dec!(240.00));
    }

    #[test]
    fn tracked_food_days_clamp_at_schedule() {
        let agg = AttendanceAggregate {
            present_p: 28,
            present_strict: 28,
            ..Default::default()
        };
        let out = compute_components(&profile(dec!(900)), &PayrollRow::default(), Some(&agg), true);
        assert_eq!(out.food_paid_days, dec!(26));
    }

    #[test]
    fn latency_comes_from_upstream_row_only() {
        let agg = AttendanceAggregate {
            missing_minutes_total: 600,
            ..Default::default()
        };
        let row = PayrollRow {
            missing_lyd: dec!(12.34),
            ..Default::default()
        };
        let out = compute_components(&profile(dec!(900)), &row, Some(&agg), true);
        assert_eq!(out.latency_lyd, dec!(12.34));
    }
}
