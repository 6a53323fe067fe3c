// src/codes.rs

use serde::{Deserialize, Serialize};

/// One day's classified attendance outcome.
///
/// Attendance-derived codes come out of the classifier cascade; leave codes
/// come from approved leave periods (or backend overrides); exception codes
/// only ever arrive pre-classified from the backend and are passed through
/// verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceCode {
    /// No code rendered (missing record, Friday, holiday in grid view).
    Blank,
    /// Present, on time, full hours.
    P,
    /// Absent on a scheduled workday.
    A,
    /// Present but short of schedule beyond the miss threshold.
    Pt,
    /// Present but late beyond the late threshold.
    Pl,
    /// Worked part of a public holiday (double rate, no food).
    Ph,
    /// Worked a full public holiday (double rate plus food).
    Phf,
    /// Generic holiday marker, document rendering only.
    H,

    // Leave codes (two-letter, from the leave-type catalog).
    Al,
    Sl,
    El,
    Ml,
    Ul,
    Hl,
    Bm,
    Xl,
    B1,
    B2,
    Pp,

    // Exception codes, backend-assigned only.
    Ni,
    No,
    Mo,
    Ip,
    Li,
    Eo,
    W,
}

/// Full-day leave codes, each worth 1.0 leave-unit per day.
pub const LEAVE_FULL_CODES: [AttendanceCode; 10] = [
    AttendanceCode::Al,
    AttendanceCode::Sl,
    AttendanceCode::El,
    AttendanceCode::Ml,
    AttendanceCode::Ul,
    AttendanceCode::Bm,
    AttendanceCode::Xl,
    AttendanceCode::B1,
    AttendanceCode::B2,
    AttendanceCode::Pp,
];

/// Half-day leave codes, worth 0.5 leave-unit per day.
pub const LEAVE_HALF_CODES: [AttendanceCode; 1] = [AttendanceCode::Hl];

impl AttendanceCode {
    /// Parses a backend code string. Unknown strings yield `None` so that
    /// unrecognized backend values never short-circuit the classifier.
    pub fn parse(s: &str) -> Option<Self> {
        use AttendanceCode::*;
        let code = match s.trim().to_ascii_uppercase().as_str() {
            "P" => P,
            "A" => A,
            "PT" => Pt,
            "PL" => Pl,
            "PH" => Ph,
            "PHF" => Phf,
            "H" => H,
            "AL" => Al,
            "SL" => Sl,
            "EL" => El,
            "ML" => Ml,
            "UL" => Ul,
            "HL" => Hl,
            "BM" => Bm,
            "XL" => Xl,
            "B1" => B1,
            "B2" => B2,
            "PP" => Pp,
            "NI" => Ni,
            "NO" => No,
            "MO" => Mo,
            "IP" => Ip,
            "LI" => Li,
            "EO" => Eo,
            "W" => W,
            _ => return None,
        };
        Some(code)
    }

    pub fn as_str(&self) -> &'static str {
        use AttendanceCode::*;
        match self {
            Blank => "",
            P => "P",
            A => "A",
            Pt => "PT",
            Pl => "PL",
            Ph => "PH",
            Phf => "PHF",
            H => "H",
            Al => "AL",
            Sl => "SL",
            El => "EL",
            Ml => "ML",
            Ul => "UL",
            Hl => "HL",
            Bm => "BM",
            Xl => "XL",
            B1 => "B1",
            B2 => "B2",
            Pp => "PP",
            Ni => "NI",
            No => "NO",
            Mo => "MO",
            Ip => "IP",
            Li => "LI",
            Eo => "EO",
            W => "W",
        }
    }

    pub fn is_leave(&self) -> bool {
        self.is_full_leave() || self.is_half_leave()
    }

    pub fn is_full_leave(&self) -> bool {
        LEAVE_FULL_CODES.contains(self)
    }

    pub fn is_half_leave(&self) -> bool {
        LEAVE_HALF_CODES.contains(self)
    }

    /// Leave-unit weight of the code: 1.0 for full-day leave, 0.5 for
    /// half-day leave, 0 otherwise.
    pub fn leave_units(&self) -> f64 {
        if self.is_full_leave() {
            1.0
        } else if self.is_half_leave() {
            0.5
        } else {
            0.0
        }
    }

    /// Present-for-pay codes: P plus both paid-holiday variants.
    pub fn is_present_paid(&self) -> bool {
        matches!(
            self,
            AttendanceCode::P | AttendanceCode::Ph | AttendanceCode::Phf
        )
    }
}

impl std::fmt::Display for AttendanceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_known_codes() {
        for code in [
            AttendanceCode::P,
            AttendanceCode::Phf,
            AttendanceCode::Hl,
            AttendanceCode::B2,
            AttendanceCode::Ni,
        ] {
            assert_eq!(AttendanceCode::parse(code.as_str()), Some(code));
        }
    }

    #[test]
    fn parse_rejects_unknown_strings() {
        assert_eq!(AttendanceCode::parse("ZZ"), None);
        assert_eq!(AttendanceCode::parse(""), None);
        assert_eq!(AttendanceCode::parse("present"), None);
    }

    #[test]
    fn leave_units_by_code_class() {
        assert_eq!(AttendanceCode::Al.leave_units(), 1.0);
        assert_eq!(AttendanceCode::Hl.leave_units(), 0.5);
        assert_eq!(AttendanceCode::P.leave_units(), 0.0);
    }
}
