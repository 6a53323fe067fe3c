// src/model.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::codes::AttendanceCode;

// --- Money helpers ---

/// Rounds to 2 decimal places, half away from zero. Applied at every
/// computation boundary so cumulative rounding matches the upstream engine.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Maximum of the defined, non-negative candidates; zero when none qualify.
///
/// This is the single conflict-resolution rule for the same fact arriving
/// from multiple sources (recomputed value vs. persisted row vs. raw field).
/// Commutative and associative, so safe under any merge order.
pub fn max_of_defined(candidates: &[Option<Decimal>]) -> Decimal {
    candidates
        .iter()
        .filter_map(|c| *c)
        .filter(|v| *v >= Decimal::ZERO)
        .max()
        .unwrap_or(Decimal::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Lyd,
    Usd,
}

// --- Attendance inputs ---

/// One calendar day of raw attendance facts for one employee. Immutable for
/// the duration of a payroll run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceDay {
    pub date: NaiveDate,
    pub present: bool,
    pub entry_time: Option<NaiveTime>,
    pub exit_time: Option<NaiveTime>,
    pub scheduled_start: Option<NaiveTime>,
    pub scheduled_end: Option<NaiveTime>,
    /// Signed minutes versus schedule; negative means minutes missing.
    pub delta_minutes: i64,
    pub is_holiday: bool,
    /// Pre-classified code from upstream; wins verbatim when recognized.
    pub backend_code: Option<AttendanceCode>,
}

/// One approved leave period, `[start, end]` inclusive. The code has already
/// been resolved at ingest (direct field, catalog lookup, keyword match, or
/// the `AL` default) and is always a leave code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedLeavePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub code: AttendanceCode,
}

impl ApprovedLeavePeriod {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveType {
    pub code: Option<AttendanceCode>,
    pub name: String,
    pub color: Option<String>,
}

/// Leave-type catalog, loaded once per session. Insertion order is preserved
/// because "first match wins" for a day covered by several periods follows
/// catalog iteration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveTypeCatalog {
    entries: Vec<(i64, LeaveType)>,
}

impl LeaveTypeCatalog {
    pub fn new(entries: Vec<(i64, LeaveType)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: i64) -> Option<&LeaveType> {
        self.entries.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(i64, LeaveType)> {
        self.entries.iter()
    }
}

// --- Employees ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesRole {
    SalesRep,
    SeniorSalesRep,
    SalesLead,
    SalesManager,
}

impl SalesRole {
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim() {
            "sales_rep" => Some(Self::SalesRep),
            "senior_sales_rep" => Some(Self::SeniorSalesRep),
            "sales_lead" => Some(Self::SalesLead),
            "sales_manager" => Some(Self::SalesManager),
            _ => None,
        }
    }

    /// Lead and manager roles earn gold commission on branch volume rather
    /// than self-attributed sales.
    pub fn has_scope_commission(&self) -> bool {
        matches!(self, Self::SalesLead | Self::SalesManager)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionProfile {
    /// Seller account id on invoices. Absent means no self-attributed sales
    /// lookup and therefore no commission.
    pub seller_user_id: Option<i64>,
    pub role: Option<SalesRole>,
    /// Point-of-sale ids whose volume counts for scope commission. Empty
    /// falls back to the employee's own PS.
    pub ps_scope: Vec<i64>,
    /// Per-employee overrides on top of the role rate table.
    pub gold_rate_per_gram: Option<Decimal>,
    pub diamond_percent: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub id: i64,
    pub name_ar: Option<String>,
    pub name_en: Option<String>,
    pub base_salary_lyd: Decimal,
    pub base_salary_usd: Decimal,
    /// Month-specific schedule length in days.
    pub working_days: u32,
    pub food_per_day: Option<Decimal>,
    pub food_monthly: Option<Decimal>,
    pub fuel_monthly: Decimal,
    pub communication_monthly: Decimal,
    pub fingerprint_required: bool,
    pub contract_start: Option<NaiveDate>,
    pub title: Option<String>,
    pub ps: Option<i64>,
    pub commission: CommissionProfile,
}

/// A name consisting only of `?` characters and whitespace is an upstream
/// encoding casualty and must not be displayed.
pub fn is_corrupted_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '?' || c.is_whitespace())
}

impl EmployeeProfile {
    /// Arabic name preferred, then English, then a synthetic `ID: {id}`
    /// label when both are missing or corrupted.
    pub fn display_name(&self) -> String {
        for candidate in [&self.name_ar, &self.name_en].into_iter().flatten() {
            let trimmed = candidate.trim();
            if !trimmed.is_empty() && !is_corrupted_name(trimmed) {
                return trimmed.to_string();
            }
        }
        format!("ID: {}", self.id)
    }

    /// USD eligibility gates USD-denominated adjustments.
    pub fn usd_eligible(&self) -> bool {
        self.base_salary_usd > Decimal::ZERO
    }
}

// --- Payroll rows ---

/// One employee-month row as persisted by the upstream payroll computation.
/// Produced fresh on each run and reconciled against locally computed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayrollRow {
    pub employee_id: i64,
    pub base_salary_lyd: Decimal,
    pub base_salary_usd: Decimal,
    pub absence_lyd: Decimal,
    pub absence_usd: Decimal,
    pub ph_lyd: Decimal,
    pub ph_usd: Decimal,
    pub phf_lyd: Decimal,
    pub phf_usd: Decimal,
    /// Latency (missing-time) deduction, computed upstream.
    pub missing_lyd: Decimal,
    pub missing_usd: Decimal,
    pub total_salary_lyd: Decimal,
    pub total_salary_usd: Decimal,
    pub net_salary_lyd: Decimal,
    pub net_salary_usd: Decimal,
    pub gold_bonus_lyd: Decimal,
    pub gold_bonus_usd: Decimal,
    pub diamond_bonus_lyd: Decimal,
    pub diamond_bonus_usd: Decimal,
    pub other_bonus1_lyd: Decimal,
    pub other_bonus1_usd: Decimal,
    pub other_bonus2_lyd: Decimal,
    pub other_bonus2_usd: Decimal,
    pub other_additions_lyd: Decimal,
    pub other_additions_usd: Decimal,
    pub other_deductions_lyd: Decimal,
    pub other_deductions_usd: Decimal,
    pub loan_debit_lyd: Decimal,
    pub loan_debit_usd: Decimal,
    pub loan_credit_lyd: Decimal,
    pub loan_credit_usd: Decimal,
    /// Day counters; absence can carry halves (HL).
    pub absence_days: Decimal,
    pub food_days: Decimal,
    pub working_days: u32,
    pub p_days: Option<Decimal>,
    pub ph_days: Decimal,
    pub phf_days: Decimal,
    /// Internal subtotal fields carried by some upstream rows; the
    /// fingerprint fold-back must adjust them when present.
    pub d7: Option<Decimal>,
    pub d16: Option<Decimal>,
    pub c7: Option<Decimal>,
    pub c16: Option<Decimal>,
}

// --- Adjustments and loans ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Bonus,
    Deduction,
    EidBonus,
    RamadanBonus,
    Custom,
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Add,
    Deduct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: i64,
    pub employee_id: i64,
    pub kind: AdjustmentKind,
    /// Required when `kind` is `Custom`.
    pub label: Option<String>,
    pub direction: Direction,
    pub amount: Decimal,
    pub currency: Currency,
    pub recurring: bool,
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: Option<i32>,
    pub end_month: Option<u32>,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Adjustment {
    /// Deduction-kind and advance-kind entries deduct regardless of the
    /// stored direction.
    pub fn effective_direction(&self) -> Direction {
        match self.kind {
            AdjustmentKind::Deduction | AdjustmentKind::Advance => Direction::Deduct,
            _ => self.direction,
        }
    }

    /// Whether this entry applies to the given run month. One-off entries
    /// match only their start month; recurring entries match the window
    /// `[start, end]`, open-ended when no end is set.
    pub fn applies_to(&self, year: i32, month: u32) -> bool {
        let target = (year, month);
        let start = (self.start_year, self.start_month);
        if !self.recurring {
            return target == start;
        }
        if target < start {
            return false;
        }
        match (self.end_year, self.end_month) {
            (Some(ey), Some(em)) => target <= (ey, em),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayment {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub employee_id: i64,
    pub principal: Decimal,
    pub start_year: i32,
    pub start_month: u32,
    /// Monthly installment as a percentage of the principal.
    pub monthly_percent: Decimal,
    /// Per-loan principal cap as a multiple of base salary; overrides the
    /// policy-level multiple when set.
    #[serde(default)]
    pub cap_multiple: Option<Decimal>,
    pub remaining: Decimal,
    /// Months where collection was suspended; no installment is deducted.
    #[serde(default)]
    pub skipped_months: Vec<(i32, u32)>,
    pub history: Vec<LoanPayment>,
}

impl Loan {
    pub fn is_skipped(&self, year: i32, month: u32) -> bool {
        self.skipped_months.contains(&(year, month))
    }
}

// --- Sales / invoices ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub supplier_type: Option<String>,
    /// Grams for gold supplier lines.
    pub qty: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub seller_user_id: Option<i64>,
    pub ps: Option<i64>,
    pub supplier_type: Option<String>,
    pub lines: Vec<PurchaseLine>,
    pub amount_lyd: Decimal,
    pub amount_usd: Decimal,
}

// --- Computed outputs ---

/// Per-employee monthly attendance counters consumed by the pay component
/// calculator and exposed for display/export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceAggregate {
    /// Days classified P, PH or PHF.
    pub present_p: u32,
    /// Days classified exactly P.
    pub present_strict: u32,
    pub ph_full_days: u32,
    pub ph_part_days: u32,
    /// Non-Friday A/UL days (1.0) and HL days (0.5).
    pub absence_days: Decimal,
    pub leave_units: Decimal,
    pub missing_minutes_total: i64,
    /// Only the portion of each day's miss exceeding the display threshold.
    pub missing_minutes_display: i64,
    /// Non-Friday, non-leave days; the attendance baseline for employees
    /// without fingerprint tracking.
    pub food_eligible_non_fp_days: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayComponents {
    pub daily_rate_lyd: Decimal,
    pub daily_rate_usd: Decimal,
    pub p_pay_lyd: Decimal,
    pub p_pay_usd: Decimal,
    pub ph_pay_lyd: Decimal,
    pub ph_pay_usd: Decimal,
    pub phf_pay_lyd: Decimal,
    pub phf_pay_usd: Decimal,
    pub food_lyd: Decimal,
    pub food_paid_days: Decimal,
    pub absence_lyd: Decimal,
    pub absence_usd: Decimal,
    pub latency_lyd: Decimal,
    pub latency_usd: Decimal,
    pub transport_lyd: Decimal,
    pub communication_lyd: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionResult {
    pub gold_grams_used: Decimal,
    pub gold_bonus_lyd: Decimal,
    pub diamond_items: u32,
    pub diamond_bonus_lyd: Decimal,
    pub diamond_bonus_usd: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentTotals {
    pub earnings_lyd: Decimal,
    pub earnings_usd: Decimal,
    pub deductions_lyd: Decimal,
    pub deductions_usd: Decimal,
    /// Salary advances, tracked separately and LYD-only.
    pub advance_lyd: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayBreakdown {
    pub earnings_lyd: Decimal,
    pub earnings_usd: Decimal,
    pub deductions_lyd: Decimal,
    pub deductions_usd: Decimal,
    pub gross_lyd: Decimal,
    pub gross_usd: Decimal,
    pub net_lyd: Decimal,
    pub net_usd: Decimal,
}

impl PayBreakdown {
    /// Net is clamped to zero per currency; an employee never owes payroll.
    pub fn finalize(mut self) -> Self {
        self.gross_lyd = round2(self.earnings_lyd);
        self.gross_usd = round2(self.earnings_usd);
        self.net_lyd = round2((self.earnings_lyd - self.deductions_lyd).max(dec!(0)));
        self.net_usd = round2((self.earnings_usd - self.deductions_usd).max(dec!(0)));
        self.earnings_lyd = round2(self.earnings_lyd);
        self.earnings_usd = round2(self.earnings_usd);
        self.deductions_lyd = round2(self.deductions_lyd);
        self.deductions_usd = round2(self.deductions_usd);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_half_away_from_zero() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round2(dec!(2.004)), dec!(2.00));
    }

    #[test]
    fn max_of_defined_ignores_missing_and_negative() {
        assert_eq!(
            max_of_defined(&[None, Some(dec!(3)), Some(dec!(-7)), Some(dec!(5))]),
            dec!(5)
        );
        assert_eq!(max_of_defined(&[None, None]), dec!(0));
        assert_eq!(max_of_defined(&[Some(dec!(-1))]), dec!(0));
    }

    #[test]
    fn display_name_fallback_chain() {
        let mut profile = EmployeeProfile {
            id: 42,
            name_ar: Some("???? ??".to_string()),
            name_en: Some("Omar K".to_string()),
            base_salary_lyd: dec!(900),
            base_salary_usd: dec!(0),
            working_days: 26,
            food_per_day: None,
            food_monthly: None,
            fuel_monthly: dec!(0),
            communication_monthly: dec!(0),
            fingerprint_required: true,
            contract_start: None,
            title: None,
            ps: None,
            commission: CommissionProfile::default(),
        };
        assert_eq!(profile.display_name(), "Omar K");
        profile.name_en = Some("  ?? ? ".to_string());
        assert_eq!(profile.display_name(), "ID: 42");
        profile.name_ar = Some("سالم".to_string());
        assert_eq!(profile.display_name(), "سالم");
    }

    #[test]
    fn adjustment_recurring_window() {
        let adj = Adjustment {
            id: 1,
            employee_id: 7,
            kind: AdjustmentKind::Bonus,
            label: None,
            direction: Direction::Add,
            amount: dec!(50),
            currency: Currency::Lyd,
            recurring: true,
            start_year: 2025,
            start_month: 3,
            end_year: Some(2025),
            end_month: Some(6),
            note: None,
            timestamp: Utc::now(),
        };
        assert!(!adj.applies_to(2025, 2));
        assert!(adj.applies_to(2025, 3));
        assert!(adj.applies_to(2025, 6));
        assert!(!adj.applies_to(2025, 7));

        let one_off = Adjustment {
            recurring: false,
            ..adj.clone()
        };
        assert!(one_off.applies_to(2025, 3));
        assert!(!one_off.applies_to(2025, 4));

        let open_ended = Adjustment {
            end_year: None,
            end_month: None,
            ..adj
        };
        assert!(open_ended.applies_to(2031, 12));
    }
}
