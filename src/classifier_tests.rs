// src/classifier_tests.rs

#[cfg(test)]
mod tests {
    use crate::classifier::*;
    use crate::codes::AttendanceCode;
    use crate::model::{ApprovedLeavePeriod, AttendanceDay};
    use chrono::{NaiveDate, NaiveTime};
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(d: NaiveDate, present: bool) -> AttendanceDay {
        AttendanceDay {
            date: d,
            present,
            entry_time: present.then(|| time(9, 0)),
            exit_time: present.then(|| time(17, 0)),
            scheduled_start: None,
            scheduled_end: None,
            delta_minutes: 0,
            is_holiday: false,
            backend_code: None,
        }
    }

    fn leave(start: NaiveDate, end: NaiveDate, code: AttendanceCode) -> ApprovedLeavePeriod {
        ApprovedLeavePeriod { start, end, code }
    }

    struct Fixture {
        config: ClassifierConfig,
        leaves: Vec<ApprovedLeavePeriod>,
        holidays: HashSet<NaiveDate>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: ClassifierConfig::default(),
                leaves: Vec::new(),
                holidays: HashSet::new(),
            }
        }

        fn ctx(&self, intent: Intent) -> ClassifyContext<'_> {
            ClassifyContext {
                config: &self.config,
                intent,
                scheduled_start: None,
                scheduled_end: None,
                leaves: &self.leaves,
                holidays: &self.holidays,
            }
        }
    }

    // 2025-03-03 is a Monday, 2025-03-07 a Friday.
    const Y: i32 = 2025;
    const M: u32 = 3;

    #[test]
    fn missing_record_is_blank_not_absent() {
        let fx = Fixture::new();
        let code = classify(None, date(Y, M, 3), &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Blank);
    }

    #[test]
    fn missing_record_covered_by_leave_renders_leave() {
        let mut fx = Fixture::new();
        fx.leaves
            .push(leave(date(Y, M, 3), date(Y, M, 5), AttendanceCode::Al));
        let code = classify(None, date(Y, M, 4), &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Al);
    }

    #[test]
    fn backend_code_wins_over_punches() {
        let fx = Fixture::new();
        let mut d = day(date(Y, M, 3), true);
        d.backend_code = Some(AttendanceCode::Bm);
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Bm);
    }

    #[test]
    fn backend_leave_code_on_friday_is_normalized_away() {
        // A manually entered AL on a Friday must not show as leave.
        let fx = Fixture::new();
        let mut d = day(date(Y, M, 7), false);
        d.backend_code = Some(AttendanceCode::Al);
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Document));
        assert_eq!(code, AttendanceCode::Blank);
    }

    #[test]
    fn sick_leave_renders_even_on_friday() {
        let mut fx = Fixture::new();
        fx.leaves
            .push(leave(date(Y, M, 1), date(Y, M, 10), AttendanceCode::Sl));
        let code = classify(None, date(Y, M, 7), &fx.ctx(Intent::Document));
        assert_eq!(code, AttendanceCode::Sl);
    }

    #[test]
    fn present_on_friday_during_leave_classifies_from_punches() {
        // Leave covering a Friday does not hide actual work.
        let mut fx = Fixture::new();
        fx.leaves
            .push(leave(date(Y, M, 1), date(Y, M, 10), AttendanceCode::Al));
        let d = day(date(Y, M, 7), true);
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::P);
    }

    #[test]
    fn leave_on_workday_renders_leave_code() {
        let mut fx = Fixture::new();
        fx.leaves
            .push(leave(date(Y, M, 3), date(Y, M, 5), AttendanceCode::Ul));
        let d = day(date(Y, M, 4), false);
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Ul);
    }

    #[test]
    fn friday_without_presence_is_blank() {
        let fx = Fixture::new();
        let d = day(date(Y, M, 7), false);
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Blank);
    }

    #[test]
    fn holiday_without_presence_differs_by_intent() {
        let mut fx = Fixture::new();
        fx.holidays.insert(date(Y, M, 4));
        let d = day(date(Y, M, 4), false);
        assert_eq!(
            classify(Some(&d), d.date, &fx.ctx(Intent::Grid)),
            AttendanceCode::Blank
        );
        assert_eq!(
            classify(Some(&d), d.date, &fx.ctx(Intent::Document)),
            AttendanceCode::H
        );
    }

    #[test]
    fn absent_workday_is_a() {
        let fx = Fixture::new();
        let d = day(date(Y, M, 3), false);
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::A);
    }

    #[test]
    fn full_holiday_work_within_tolerance_is_phf() {
        let mut fx = Fixture::new();
        fx.holidays.insert(date(Y, M, 4));
        let d = day(date(Y, M, 4), true);
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Phf);
    }

    #[test]
    fn partial_holiday_work_is_ph() {
        let mut fx = Fixture::new();
        fx.holidays.insert(date(Y, M, 4));
        let mut d = day(date(Y, M, 4), true);
        d.exit_time = Some(time(13, 0));
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Ph);
    }

    #[test]
    fn late_entry_beyond_threshold_is_pl() {
        let fx = Fixture::new();
        let mut d = day(date(Y, M, 3), true);
        d.entry_time = Some(time(9, 10));
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Pl);
    }

    #[test]
    fn late_within_threshold_is_p() {
        let fx = Fixture::new();
        let mut d = day(date(Y, M, 3), true);
        d.entry_time = Some(time(9, 4));
        let code = classify(Some(&d), d.date, &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::P);
    }

    #[test]
    fn missing_minutes_threshold_depends_on_intent() {
        // 10 missing minutes exceed the grid threshold (5) but not the
        // payslip threshold (30).
        let fx = Fixture::new();
        let mut d = day(date(Y, M, 3), true);
        d.delta_minutes = -10;
        assert_eq!(
            classify(Some(&d), d.date, &fx.ctx(Intent::Grid)),
            AttendanceCode::Pt
        );
        assert_eq!(
            classify(Some(&d), d.date, &fx.ctx(Intent::Document)),
            AttendanceCode::P
        );
    }

    #[test]
    fn per_day_schedule_overrides_context_schedule() {
        let fx = Fixture::new();
        let mut ctx = fx.ctx(Intent::Grid);
        ctx.scheduled_start = Some(time(8, 0));
        let mut d = day(date(Y, M, 3), true);
        d.scheduled_start = Some(time(10, 0));
        d.entry_time = Some(time(10, 2));
        // Against the per-day 10:00 start this is on time; against the
        // context 08:00 start it would be PL.
        assert_eq!(classify(Some(&d), d.date, &ctx), AttendanceCode::P);
    }

    #[test]
    fn first_covering_leave_period_wins() {
        let mut fx = Fixture::new();
        fx.leaves
            .push(leave(date(Y, M, 3), date(Y, M, 5), AttendanceCode::Sl));
        fx.leaves
            .push(leave(date(Y, M, 4), date(Y, M, 6), AttendanceCode::Al));
        let code = classify(None, date(Y, M, 4), &fx.ctx(Intent::Grid));
        assert_eq!(code, AttendanceCode::Sl);
    }
}
