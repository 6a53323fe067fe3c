// src/ingest.rs
//
// The upstream HR API grew its payloads over years and the same fact often
// lives under several historical field names. Everything alias-shaped is
// resolved here, once, into the canonical `model` types; business rules never
// see aliases.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::codes::AttendanceCode;
use crate::model::{
    Adjustment, AdjustmentKind, ApprovedLeavePeriod, AttendanceDay, CommissionProfile, Currency,
    Direction, EmployeeProfile, InvoiceLine, LeaveType, LeaveTypeCatalog, Loan, LoanPayment,
    PayrollRow, PurchaseLine, SalesRole,
};

// --- Timesheet days ---

#[derive(Debug, Clone, Deserialize)]
pub struct RawTimesheetDay {
    pub date: NaiveDate,
    #[serde(default)]
    pub present: bool,
    #[serde(default, alias = "checkin", alias = "entry")]
    pub entry_time: Option<NaiveTime>,
    #[serde(default, alias = "checkout", alias = "exit")]
    pub exit_time: Option<NaiveTime>,
    #[serde(default, alias = "shift_start", alias = "schedule_start")]
    pub scheduled_start: Option<NaiveTime>,
    #[serde(default, alias = "shift_end", alias = "schedule_end")]
    pub scheduled_end: Option<NaiveTime>,
    #[serde(default, alias = "delta_min", alias = "deltaMinutes")]
    pub delta_minutes: i64,
    #[serde(default, alias = "holiday")]
    pub is_holiday: bool,
    #[serde(default, alias = "code", alias = "status_code")]
    pub backend_code: Option<String>,
}

impl From<RawTimesheetDay> for AttendanceDay {
    fn from(raw: RawTimesheetDay) -> Self {
        // Unknown backend codes are dropped so they never short-circuit the
        // classifier cascade.
        let backend_code = raw.backend_code.as_deref().and_then(AttendanceCode::parse);
        AttendanceDay {
            date: raw.date,
            present: raw.present,
            entry_time: raw.entry_time,
            exit_time: raw.exit_time,
            scheduled_start: raw.scheduled_start,
            scheduled_end: raw.scheduled_end,
            delta_minutes: raw.delta_minutes,
            is_holiday: raw.is_holiday,
            backend_code,
        }
    }
}

// --- Leave requests and vacations ---

#[derive(Debug, Clone, Deserialize)]
pub struct RawLeaveType {
    pub id: i64,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "type_name")]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

pub fn build_leave_catalog(raw: Vec<RawLeaveType>) -> LeaveTypeCatalog {
    LeaveTypeCatalog::new(
        raw.into_iter()
            .map(|t| {
                (
                    t.id,
                    LeaveType {
                        code: t.code.as_deref().and_then(AttendanceCode::parse),
                        name: t.name,
                        color: t.color,
                    },
                )
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLeaveRequest {
    #[serde(alias = "from", alias = "start")]
    pub start_date: NaiveDate,
    #[serde(alias = "to", alias = "end")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "leave_code")]
    pub code: Option<String>,
    #[serde(default, alias = "type_id")]
    pub leave_type_id: Option<i64>,
    #[serde(default, alias = "leave_type", alias = "type_name")]
    pub type_name: Option<String>,
}

fn status_is_approved(status: &str) -> bool {
    matches!(status.trim(), "approved" | "موافق" | "accepted")
}

/// Keyword fallback when a request carries neither a code nor a known
/// type id. Matches the upstream catalog's free-text names.
fn code_from_type_name(name: &str) -> Option<AttendanceCode> {
    let lower = name.to_lowercase();
    let table: [(&[&str], AttendanceCode); 6] = [
        (&["sick", "مرضية", "مرض"], AttendanceCode::Sl),
        (&["annual", "سنوية"], AttendanceCode::Al),
        (&["emergency", "طارئة"], AttendanceCode::El),
        (&["maternity", "أمومة", "وضع"], AttendanceCode::Ml),
        (&["unpaid", "بدون مرتب", "بدون راتب"], AttendanceCode::Ul),
        (&["half", "نصف"], AttendanceCode::Hl),
    ];
    for (keywords, code) in table {
        if keywords.iter().any(|k| lower.contains(k)) {
            return Some(code);
        }
    }
    None
}

/// Leave-code resolution chain: direct code field, catalog lookup by type
/// id, keyword match on the free-text name, then the `AL` default.
pub fn resolve_leave_code(raw: &RawLeaveRequest, catalog: &LeaveTypeCatalog) -> AttendanceCode {
    if let Some(code) = raw.code.as_deref().and_then(AttendanceCode::parse) {
        if code.is_leave() {
            return code;
        }
    }
    if let Some(code) = raw
        .leave_type_id
        .and_then(|id| catalog.get(id))
        .and_then(|t| t.code)
    {
        return code;
    }
    if let Some(code) = raw.type_name.as_deref().and_then(code_from_type_name) {
        return code;
    }
    AttendanceCode::Al
}

/// Approved requests become leave periods; everything else is dropped.
pub fn leave_periods(
    raw: Vec<RawLeaveRequest>,
    catalog: &LeaveTypeCatalog,
) -> Vec<ApprovedLeavePeriod> {
    raw.into_iter()
        .filter(|r| status_is_approved(&r.status))
        .map(|r| ApprovedLeavePeriod {
            start: r.start_date,
            end: r.end_date,
            code: resolve_leave_code(&r, catalog),
        })
        .collect()
}

// --- Employees ---

#[derive(Debug, Clone, Deserialize)]
pub struct RawEmployee {
    pub id: i64,
    #[serde(default, alias = "arabic_name")]
    pub name_ar: Option<String>,
    #[serde(default, alias = "english_name", alias = "name")]
    pub name_en: Option<String>,
    #[serde(default, alias = "salary_lyd", alias = "salary")]
    pub base_salary_lyd: Decimal,
    #[serde(default, alias = "salary_usd")]
    pub base_salary_usd: Decimal,
    #[serde(default = "default_working_days", alias = "work_days")]
    pub working_days: u32,
    #[serde(default, alias = "food_daily")]
    pub food_per_day: Option<Decimal>,
    #[serde(default, alias = "food_allowance")]
    pub food_monthly: Option<Decimal>,
    #[serde(default, alias = "transport_allowance", alias = "fuel")]
    pub fuel_monthly: Decimal,
    #[serde(default, alias = "comm_allowance", alias = "communication")]
    pub communication_monthly: Decimal,
    /// Absent means tracked; only an explicit false turns tracking off.
    #[serde(default, alias = "fp_required", alias = "fingerprint")]
    pub fingerprint_required: Option<bool>,
    #[serde(default, alias = "hire_date")]
    pub contract_start: Option<NaiveDate>,
    #[serde(default, alias = "designation")]
    pub title: Option<String>,
    #[serde(default, alias = "pos_id", alias = "branch_id")]
    pub ps: Option<i64>,
    #[serde(default, alias = "seller_id")]
    pub seller_user_id: Option<i64>,
    #[serde(default, alias = "sales_role")]
    pub role_key: Option<String>,
    #[serde(default, alias = "commission_ps")]
    pub commission_ps_scope: Vec<i64>,
    #[serde(default)]
    pub gold_rate_per_gram: Option<Decimal>,
    #[serde(default)]
    pub diamond_percent: Option<Decimal>,
}

fn default_working_days() -> u32 {
    26
}

impl From<RawEmployee> for EmployeeProfile {
    fn from(raw: RawEmployee) -> Self {
        let role = raw.role_key.as_deref().and_then(|key| {
            let parsed = SalesRole::parse(key);
            if parsed.is_none() && !key.trim().is_empty() {
                warn!(employee_id = raw.id, role = key, "unknown sales role key");
            }
            parsed
        });
        EmployeeProfile {
            id: raw.id,
            name_ar: raw.name_ar,
            name_en: raw.name_en,
            base_salary_lyd: raw.base_salary_lyd,
            base_salary_usd: raw.base_salary_usd,
            working_days: raw.working_days,
            food_per_day: raw.food_per_day,
            food_monthly: raw.food_monthly,
            fuel_monthly: raw.fuel_monthly,
            communication_monthly: raw.communication_monthly,
            fingerprint_required: raw.fingerprint_required.unwrap_or(true),
            contract_start: raw.contract_start,
            title: raw.title,
            ps: raw.ps,
            commission: CommissionProfile {
                seller_user_id: raw.seller_user_id,
                role,
                ps_scope: raw.commission_ps_scope,
                gold_rate_per_gram: raw.gold_rate_per_gram,
                diamond_percent: raw.diamond_percent,
            },
        }
    }
}

// --- Payroll rows ---

/// Wire shape of one upstream payroll row. Monetary pairs default to zero;
/// `p_days` keeps its legacy `present_workdays` spelling as an alias.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPayrollRow {
    #[serde(alias = "emp_id")]
    pub employee_id: i64,
    #[serde(default)]
    pub base_salary_lyd: Decimal,
    #[serde(default)]
    pub base_salary_usd: Decimal,
    #[serde(default)]
    pub absence_lyd: Decimal,
    #[serde(default)]
    pub absence_usd: Decimal,
    #[serde(default)]
    pub ph_lyd: Decimal,
    #[serde(default)]
    pub ph_usd: Decimal,
    #[serde(default)]
    pub phf_lyd: Decimal,
    #[serde(default)]
    pub phf_usd: Decimal,
    #[serde(default, alias = "latency_lyd")]
    pub missing_lyd: Decimal,
    #[serde(default, alias = "latency_usd")]
    pub missing_usd: Decimal,
    #[serde(default)]
    pub total_salary_lyd: Decimal,
    #[serde(default)]
    pub total_salary_usd: Decimal,
    #[serde(default)]
    pub net_salary_lyd: Decimal,
    #[serde(default)]
    pub net_salary_usd: Decimal,
    #[serde(default)]
    pub gold_bonus_lyd: Decimal,
    #[serde(default)]
    pub gold_bonus_usd: Decimal,
    #[serde(default)]
    pub diamond_bonus_lyd: Decimal,
    #[serde(default)]
    pub diamond_bonus_usd: Decimal,
    #[serde(default)]
    pub other_bonus1_lyd: Decimal,
    #[serde(default)]
    pub other_bonus1_usd: Decimal,
    #[serde(default)]
    pub other_bonus2_lyd: Decimal,
    #[serde(default)]
    pub other_bonus2_usd: Decimal,
    #[serde(default)]
    pub other_additions_lyd: Decimal,
    #[serde(default)]
    pub other_additions_usd: Decimal,
    #[serde(default)]
    pub other_deductions_lyd: Decimal,
    #[serde(default)]
    pub other_deductions_usd: Decimal,
    #[serde(default)]
    pub loan_debit_lyd: Decimal,
    #[serde(default)]
    pub loan_debit_usd: Decimal,
    #[serde(default)]
    pub loan_credit_lyd: Decimal,
    #[serde(default)]
    pub loan_credit_usd: Decimal,
    #[serde(default)]
    pub absence_days: Decimal,
    #[serde(default)]
    pub food_days: Decimal,
    #[serde(default = "default_working_days")]
    pub working_days: u32,
    #[serde(default, alias = "present_workdays")]
    pub p_days: Option<Decimal>,
    #[serde(default)]
    pub ph_days: Decimal,
    #[serde(default)]
    pub phf_days: Decimal,
    #[serde(default, alias = "D7")]
    pub d7: Option<Decimal>,
    #[serde(default, alias = "D16")]
    pub d16: Option<Decimal>,
    #[serde(default, alias = "C7")]
    pub c7: Option<Decimal>,
    #[serde(default, alias = "C16")]
    pub c16: Option<Decimal>,
}

impl From<RawPayrollRow> for PayrollRow {
    fn from(raw: RawPayrollRow) -> Self {
        PayrollRow {
            employee_id: raw.employee_id,
            base_salary_lyd: raw.base_salary_lyd,
            base_salary_usd: raw.base_salary_usd,
            absence_lyd: raw.absence_lyd,
            absence_usd: raw.absence_usd,
            ph_lyd: raw.ph_lyd,
            ph_usd: raw.ph_usd,
            phf_lyd: raw.phf_lyd,
            phf_usd: raw.phf_usd,
            missing_lyd: raw.missing_lyd,
            missing_usd: raw.missing_usd,
            total_salary_lyd: raw.total_salary_lyd,
            total_salary_usd: raw.total_salary_usd,
            net_salary_lyd: raw.net_salary_lyd,
            net_salary_usd: raw.net_salary_usd,
            gold_bonus_lyd: raw.gold_bonus_lyd,
            gold_bonus_usd: raw.gold_bonus_usd,
            diamond_bonus_lyd: raw.diamond_bonus_lyd,
            diamond_bonus_usd: raw.diamond_bonus_usd,
            other_bonus1_lyd: raw.other_bonus1_lyd,
            other_bonus1_usd: raw.other_bonus1_usd,
            other_bonus2_lyd: raw.other_bonus2_lyd,
            other_bonus2_usd: raw.other_bonus2_usd,
            other_additions_lyd: raw.other_additions_lyd,
            other_additions_usd: raw.other_additions_usd,
            other_deductions_lyd: raw.other_deductions_lyd,
            other_deductions_usd: raw.other_deductions_usd,
            loan_debit_lyd: raw.loan_debit_lyd,
            loan_debit_usd: raw.loan_debit_usd,
            loan_credit_lyd: raw.loan_credit_lyd,
            loan_credit_usd: raw.loan_credit_usd,
            absence_days: raw.absence_days,
            food_days: raw.food_days,
            working_days: raw.working_days,
            p_days: raw.p_days,
            ph_days: raw.ph_days,
            phf_days: raw.phf_days,
            d7: raw.d7,
            d16: raw.d16,
            c7: raw.c7,
            c16: raw.c16,
        }
    }
}

// --- Adjustments and loans ---

#[derive(Debug, Clone, Deserialize)]
pub struct RawAdjustment {
    pub id: i64,
    #[serde(alias = "emp_id")]
    pub employee_id: i64,
    #[serde(alias = "kind")]
    pub r#type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub recurring: bool,
    pub start_year: i32,
    pub start_month: u32,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub end_month: Option<u32>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn adjustment_kind(type_: &str) -> Option<AdjustmentKind> {
    match type_.trim() {
        "bonus" => Some(AdjustmentKind::Bonus),
        "deduction" => Some(AdjustmentKind::Deduction),
        "eid_bonus" => Some(AdjustmentKind::EidBonus),
        "ramadan_bonus" => Some(AdjustmentKind::RamadanBonus),
        "custom" => Some(AdjustmentKind::Custom),
        "advance" => Some(AdjustmentKind::Advance),
        _ => None,
    }
}

impl RawAdjustment {
    /// Canonicalize; unknown type or currency strings drop the entry.
    pub fn canonicalize(self) -> Option<Adjustment> {
        let kind = match adjustment_kind(&self.r#type) {
            Some(kind) => kind,
            None => {
                warn!(adjustment_id = self.id, kind = self.r#type, "unknown adjustment type");
                return None;
            }
        };
        let direction = match self.direction.as_deref().map(str::trim) {
            Some("DEDUCT") => Direction::Deduct,
            _ => Direction::Add,
        };
        let currency = match self.currency.as_deref().map(str::trim) {
            None | Some("LYD") | Some("lyd") => Currency::Lyd,
            Some("USD") | Some("usd") => Currency::Usd,
            Some(other) => {
                warn!(adjustment_id = self.id, currency = other, "unknown currency");
                return None;
            }
        };
        Some(Adjustment {
            id: self.id,
            employee_id: self.employee_id,
            kind,
            label: self.label,
            direction,
            amount: self.amount,
            currency,
            recurring: self.recurring,
            start_year: self.start_year,
            start_month: self.start_month,
            end_year: self.end_year,
            end_month: self.end_month,
            note: self.note,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLoan {
    pub id: i64,
    #[serde(alias = "emp_id")]
    pub employee_id: i64,
    pub principal: Decimal,
    pub start_year: i32,
    pub start_month: u32,
    #[serde(default, alias = "installment_percent")]
    pub monthly_percent: Decimal,
    #[serde(default, alias = "max_multiple")]
    pub cap_multiple: Option<Decimal>,
    #[serde(default)]
    pub remaining: Decimal,
    #[serde(default, alias = "skipped")]
    pub skipped_months: Vec<(i32, u32)>,
    #[serde(default)]
    pub history: Vec<LoanPayment>,
}

impl From<RawLoan> for Loan {
    fn from(raw: RawLoan) -> Self {
        Loan {
            id: raw.id,
            employee_id: raw.employee_id,
            principal: raw.principal,
            start_year: raw.start_year,
            start_month: raw.start_month,
            monthly_percent: raw.monthly_percent,
            cap_multiple: raw.cap_multiple,
            remaining: raw.remaining,
            skipped_months: raw.skipped_months,
            history: raw.history,
        }
    }
}

// --- Invoices ---

#[derive(Debug, Clone, Deserialize)]
pub struct RawPurchaseLine {
    #[serde(default, alias = "supplier")]
    pub supplier_type: Option<String>,
    #[serde(default, alias = "quantity")]
    pub qty: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInvoiceLine {
    #[serde(default, alias = "seller_id")]
    pub seller_user_id: Option<i64>,
    #[serde(default, alias = "pos_id", alias = "branch_id")]
    pub ps: Option<i64>,
    #[serde(default, alias = "supplier")]
    pub supplier_type: Option<String>,
    #[serde(default, alias = "po_lines", alias = "items")]
    pub lines: Vec<RawPurchaseLine>,
    #[serde(default)]
    pub amount_lyd: Decimal,
    #[serde(default, alias = "amount_currency")]
    pub amount_usd: Decimal,
}

impl From<RawInvoiceLine> for InvoiceLine {
    fn from(raw: RawInvoiceLine) -> Self {
        InvoiceLine {
            seller_user_id: raw.seller_user_id,
            ps: raw.ps,
            supplier_type: raw.supplier_type,
            lines: raw
                .lines
                .into_iter()
                .map(|l| PurchaseLine {
                    supplier_type: l.supplier_type,
                    qty: l.qty,
                })
                .collect(),
            amount_lyd: raw.amount_lyd,
            amount_usd: raw.amount_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_code_resolution_chain() {
        let catalog = build_leave_catalog(vec![RawLeaveType {
            id: 3,
            code: Some("SL".into()),
            name: "Sick leave".into(),
            color: None,
        }]);

        let direct = RawLeaveRequest {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            status: "approved".into(),
            code: Some("UL".into()),
            leave_type_id: Some(3),
            type_name: Some("Sick leave".into()),
        };
        assert_eq!(resolve_leave_code(&direct, &catalog), AttendanceCode::Ul);

        let by_id = RawLeaveRequest {
            code: None,
            ..direct.clone()
        };
        assert_eq!(resolve_leave_code(&by_id, &catalog), AttendanceCode::Sl);

        let by_name = RawLeaveRequest {
            code: None,
            leave_type_id: None,
            type_name: Some("إجازة مرضية".into()),
            ..direct.clone()
        };
        assert_eq!(resolve_leave_code(&by_name, &catalog), AttendanceCode::Sl);

        let fallback = RawLeaveRequest {
            code: None,
            leave_type_id: None,
            type_name: Some("something else".into()),
            ..direct
        };
        assert_eq!(resolve_leave_code(&fallback, &catalog), AttendanceCode::Al);
    }

    #[test]
    fn only_approved_statuses_become_periods() {
        let catalog = LeaveTypeCatalog::default();
        let mk = |status: &str| RawLeaveRequest {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            status: status.into(),
            code: Some("AL".into()),
            leave_type_id: None,
            type_name: None,
        };
        let periods = leave_periods(
            vec![mk("approved"), mk("موافق"), mk("pending"), mk("rejected"), mk("accepted")],
            &catalog,
        );
        assert_eq!(periods.len(), 3);
    }

    #[test]
    fn employee_aliases_and_defaults() {
        let raw: RawEmployee = serde_json::from_str(
            r#"{
                "id": 11,
                "name": "Huda",
                "salary": "1200",
                "work_days": 24,
                "transport_allowance": "100",
                "branch_id": 2,
                "seller_id": 55,
                "sales_role": "sales_lead"
            }"#,
        )
        .unwrap();
        let profile: EmployeeProfile = raw.into();
        assert_eq!(profile.name_en.as_deref(), Some("Huda"));
        assert_eq!(profile.base_salary_lyd, Decimal::from(1200));
        assert_eq!(profile.working_days, 24);
        assert!(profile.fingerprint_required, "unknown tracking defaults to true");
        assert_eq!(profile.ps, Some(2));
        assert_eq!(profile.commission.seller_user_id, Some(55));
        assert_eq!(profile.commission.role, Some(SalesRole::SalesLead));
    }

    #[test]
    fn payroll_row_legacy_present_workdays_alias() {
        let raw: RawPayrollRow = serde_json::from_str(
            r#"{"employee_id": 4, "present_workdays": "22"}"#,
        )
        .unwrap();
        let row: PayrollRow = raw.into();
        assert_eq!(row.p_days, Some(Decimal::from(22)));
    }

    #[test]
    fn unknown_adjustment_type_is_dropped() {
        let raw = RawAdjustment {
            id: 1,
            employee_id: 2,
            r#type: "mystery".into(),
            label: None,
            direction: None,
            amount: Decimal::from(10),
            currency: None,
            recurring: false,
            start_year: 2025,
            start_month: 1,
            end_year: None,
            end_month: None,
            note: None,
            timestamp: Utc::now(),
        };
        assert!(raw.canonicalize().is_none());
    }
}
