// src/classifier.rs

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use std::collections::HashSet;

use crate::codes::AttendanceCode;
use crate::model::{ApprovedLeavePeriod, AttendanceDay};

/// Default schedule window (09:00-17:00) when neither the day nor the
/// employee carries one.
pub fn default_scheduled_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).expect("09:00 is a valid time")
}

pub fn default_scheduled_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).expect("17:00 is a valid time")
}

/// Classification thresholds, in minutes. The grid and document paths use
/// different miss thresholds on purpose; both are configuration, never
/// hardcoded at call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub late_threshold_min: i64,
    pub grid_miss_threshold_min: i64,
    pub display_miss_threshold_min: i64,
    pub full_day_tolerance_min: i64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            late_threshold_min: 5,
            grid_miss_threshold_min: 5,
            display_miss_threshold_min: 30,
            full_day_tolerance_min: 5,
        }
    }
}

/// Who the classification is for. The grid blanks holidays; documents render
/// the generic `H` marker and use the wider miss threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Grid,
    Document,
}

impl ClassifierConfig {
    pub fn miss_threshold(&self, intent: Intent) -> i64 {
        match intent {
            Intent::Grid => self.grid_miss_threshold_min,
            Intent::Document => self.display_miss_threshold_min,
        }
    }
}

/// Per-employee classification context, shared across the days of one month.
pub struct ClassifyContext<'a> {
    pub config: &'a ClassifierConfig,
    pub intent: Intent,
    /// Employee- or row-level schedule; days may still override per-day.
    pub scheduled_start: Option<NaiveTime>,
    pub scheduled_end: Option<NaiveTime>,
    pub leaves: &'a [ApprovedLeavePeriod],
    pub holidays: &'a HashSet<NaiveDate>,
}

impl<'a> ClassifyContext<'a> {
    /// First leave period covering the date wins; slice order follows
    /// catalog iteration order.
    fn leave_for(&self, date: NaiveDate) -> Option<AttendanceCode> {
        self.leaves.iter().find(|p| p.covers(date)).map(|p| p.code)
    }

    fn is_holiday(&self, date: NaiveDate, record: Option<&AttendanceDay>) -> bool {
        record.map(|d| d.is_holiday).unwrap_or(false) || self.holidays.contains(&date)
    }
}

/// Classifies one calendar day. `record` is `None` when the timesheet has no
/// row for the date at all; missing records are never forced to `A`.
///
/// Precedence, first match wins:
/// 1. missing record -> leave code if covered, else blank
/// 2. recognized backend code, verbatim (leave codes still normalized)
/// 3. approved leave, with Friday/holiday fall-through for non-sick codes
/// 4. Friday, not present -> blank
/// 5. holiday, not present -> blank (grid) / H (document)
/// 6-11. punch-derived: A / PHF / PH / PL / PT / P
pub fn classify(
    record: Option<&AttendanceDay>,
    date: NaiveDate,
    ctx: &ClassifyContext<'_>,
) -> AttendanceCode {
    let is_friday = date.weekday() == Weekday::Fri;
    let is_holiday = ctx.is_holiday(date, record);
    let present = record.map(|d| d.present).unwrap_or(false);

    // 1. Missing record: blank unless an approved leave covers the date.
    let Some(day) = record else {
        return match ctx.leave_for(date) {
            Some(code) => render_leave(code, present, is_friday, is_holiday, ctx.intent)
                .unwrap_or(AttendanceCode::Blank),
            None => AttendanceCode::Blank,
        };
    };

    // 2. Recognized backend codes win verbatim. Leave codes still go through
    //    the non-working-day normalization so a manual AL on a Friday does
    //    not render on the payslip.
    if let Some(code) = day.backend_code {
        if code.is_leave() {
            if let Some(rendered) = render_leave(code, present, is_friday, is_holiday, ctx.intent) {
                return rendered;
            }
        } else {
            return code;
        }
    } else if let Some(code) = ctx.leave_for(date) {
        // 3. Approved leave, same normalization.
        if let Some(rendered) = render_leave(code, present, is_friday, is_holiday, ctx.intent) {
            return rendered;
        }
    }

    // 4. Fridays without presence stay blank, not absent.
    if is_friday && !present {
        return AttendanceCode::Blank;
    }

    // 5. Holidays without presence: blank in the grid, crossed-out H on the
    //    payslip.
    if is_holiday && !present {
        return match ctx.intent {
            Intent::Grid => AttendanceCode::Blank,
            Intent::Document => AttendanceCode::H,
        };
    }

    // 6. Expected window: per-day override, then schedule, then 09:00-17:00.
    let expected_start = day
        .scheduled_start
        .or(ctx.scheduled_start)
        .unwrap_or_else(default_scheduled_start);
    let expected_end = day
        .scheduled_end
        .or(ctx.scheduled_end)
        .unwrap_or_else(default_scheduled_end);
    let expected_minutes = (expected_end - expected_start).num_minutes().max(0);

    let worked_minutes = match (day.entry_time, day.exit_time) {
        (Some(entry), Some(exit)) if exit > entry => (exit - entry).num_minutes(),
        _ => 0,
    };
    let late_minutes = day
        .entry_time
        .map(|entry| (entry - expected_start).num_minutes().max(0))
        .unwrap_or(0);
    let miss_minutes = (-day.delta_minutes).max(0);

    // 7. Not present on a plain workday.
    if !present {
        return AttendanceCode::A;
    }

    // 8. Present on a holiday: full day within tolerance earns PHF.
    if is_holiday {
        return if worked_minutes >= expected_minutes - ctx.config.full_day_tolerance_min {
            AttendanceCode::Phf
        } else {
            AttendanceCode::Ph
        };
    }

    // 9-11. Late, short, or clean.
    if late_minutes > ctx.config.late_threshold_min {
        AttendanceCode::Pl
    } else if miss_minutes > ctx.config.miss_threshold(ctx.intent) {
        AttendanceCode::Pt
    } else {
        AttendanceCode::P
    }
}

/// Decides how a leave code renders given the day it landed on. `None` means
/// the leave does not apply here and the punch-derived cascade continues
/// (a present employee on a Friday still classifies from punches).
///
/// Sick leave is the only leave code allowed on non-working days; other
/// codes are blanked on Fridays and rewritten to PH/H (by presence and
/// intent) on holidays.
fn render_leave(
    code: AttendanceCode,
    present: bool,
    is_friday: bool,
    is_holiday: bool,
    intent: Intent,
) -> Option<AttendanceCode> {
    if code == AttendanceCode::Sl {
        return Some(code);
    }
    if is_friday {
        if present {
            return None;
        }
        return Some(AttendanceCode::Blank);
    }
    if is_holiday {
        if present {
            return Some(AttendanceCode::Ph);
        }
        return Some(match intent {
            Intent::Grid => AttendanceCode::Blank,
            Intent::Document => AttendanceCode::H,
        });
    }
    Some(code)
}
