// src/attendance.rs

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::debug;

use crate::classifier::{classify, ClassifyContext};
use crate::codes::AttendanceCode;
use crate::model::{AttendanceAggregate, AttendanceDay};

/// Days of the given calendar month, first to last.
pub fn month_days(year: i32, month: u32) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(31);
    let mut current = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(d) => d,
        None => return days,
    };
    while current.month() == month {
        days.push(current);
        current = match current.succ_opt() {
            Some(d) => d,
            None => break,
        };
    }
    days
}

/// Folds one employee-month of classified days into the counters the pay
/// component calculator reads. Classification runs with the caller's
/// context; payroll aggregation uses the grid intent.
pub fn aggregate_month(
    year: i32,
    month: u32,
    days: &[AttendanceDay],
    ctx: &ClassifyContext<'_>,
) -> AttendanceAggregate {
    let by_date: HashMap<NaiveDate, &AttendanceDay> = days.iter().map(|d| (d.date, d)).collect();

    let mut agg = AttendanceAggregate::default();
    for date in month_days(year, month) {
        let record = by_date.get(&date).copied();
        let code = classify(record, date, ctx);
        let is_friday = date.weekday() == Weekday::Fri;

        if code.is_present_paid() {
            agg.present_p += 1;
        }
        match code {
            AttendanceCode::P => agg.present_strict += 1,
            AttendanceCode::Phf => agg.ph_full_days += 1,
            AttendanceCode::Ph => agg.ph_part_days += 1,
            _ => {}
        }

        if !is_friday {
            match code {
                AttendanceCode::A | AttendanceCode::Ul => agg.absence_days += dec!(1),
                AttendanceCode::Hl => agg.absence_days += dec!(0.5),
                _ => {}
            }
            if !code.is_leave() {
                agg.food_eligible_non_fp_days += 1;
            }
        }

        if code.is_full_leave() {
            agg.leave_units += dec!(1);
        } else if code.is_half_leave() {
            agg.leave_units += dec!(0.5);
        }

        if let Some(day) = record {
            let miss = (-day.delta_minutes).max(0);
            agg.missing_minutes_total += miss;
            // Display sum keeps only the portion beyond the display
            // threshold, per day.
            agg.missing_minutes_display +=
                (miss - ctx.config.display_miss_threshold_min).max(0);
        }
    }

    debug!(
        year,
        month,
        present_p = agg.present_p,
        absence_days = %agg.absence_days,
        leave_units = %agg.leave_units,
        "aggregated attendance month"
    );
    agg
}

/// Convenience used by display surfaces: missing time expressed in hours,
/// derived from locally aggregated minutes. Monetary latency always comes
/// from the upstream row instead.
pub fn missing_hours(agg: &AttendanceAggregate) -> Decimal {
    Decimal::from(agg.missing_minutes_total) / dec!(60)
}
