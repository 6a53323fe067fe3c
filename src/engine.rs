// src/engine.rs

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::attendance::aggregate_month;
use crate::backend::BackendError;
use crate::classifier::{ClassifierConfig, ClassifyContext, Intent};
use crate::commission::{resolve_commission, CommissionRates};
use crate::components::compute_components;
use crate::ledger::{
    classify_adjustments, validate_adjustment, validate_loan, PolicyCaps, ValidationError,
};
use crate::model::{
    Adjustment, ApprovedLeavePeriod, AttendanceAggregate, AttendanceDay, EmployeeProfile,
    InvoiceLine, Loan, PayrollRow,
};
use crate::payroll::{aggregate_breakdown, loan_installment, normalize_row, RunTotals};
use crate::payslip::{build_payslip, PayslipDocument};

/// Injected clock: production uses the system clock, tests pin a date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Fixed-date clock for tests and replays.
#[derive(Debug, Clone)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

// --- Collaborator interfaces ---

#[async_trait]
pub trait TimesheetSource: Send + Sync {
    async fn timesheet_month(
        &self,
        employee_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Vec<AttendanceDay>, BackendError>;
}

#[async_trait]
pub trait LeaveSource: Send + Sync {
    async fn leave_requests(
        &self,
        employee_id: i64,
    ) -> Result<Vec<ApprovedLeavePeriod>, BackendError>;

    /// Alternate leave representation; consulted when leave-request data is
    /// absent. Same precedence rules apply downstream.
    async fn vacations_in_range(
        &self,
        employee_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ApprovedLeavePeriod>, BackendError>;

    async fn holidays(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, BackendError>;
}

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn list_employees(&self) -> Result<Vec<EmployeeProfile>, BackendError>;

    async fn employee_by_id(&self, id: i64) -> Result<Option<EmployeeProfile>, BackendError>;
}

#[async_trait]
pub trait InvoiceSource: Send + Sync {
    async fn invoices_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InvoiceLine>, BackendError>;
}

#[async_trait]
pub trait AdjustmentStore: Send + Sync {
    async fn adjustments(
        &self,
        employee_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Vec<Adjustment>, BackendError>;

    async fn save_adjustment(&self, adjustment: &Adjustment) -> Result<(), BackendError>;
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn loans(&self, employee_id: i64) -> Result<Vec<Loan>, BackendError>;

    async fn save_loan(&self, loan: &Loan) -> Result<(), BackendError>;

    /// Suspends collection for one month; the installment resumes after.
    async fn skip_month(&self, loan_id: i64, year: i32, month: u32) -> Result<(), BackendError>;

    /// Settles the outstanding balance in full outside payroll.
    async fn pay_off(&self, loan_id: i64) -> Result<(), BackendError>;
}

/// Coarse per-employee totals from the legacy aggregate endpoint; the
/// degraded-mode stand-in when the authoritative computation is down.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LegacyEmployeeTotal {
    pub employee_id: i64,
    pub total_lyd: Decimal,
    pub total_usd: Decimal,
}

#[async_trait]
pub trait PayrollStore: Send + Sync {
    /// Authoritative upstream computation; must run first, and its rows are
    /// the source of truth the engine reconciles against.
    async fn compute_payroll(&self, year: i32, month: u32)
        -> Result<Vec<PayrollRow>, BackendError>;

    /// Idempotent upsert.
    async fn save_payroll(
        &self,
        year: i32,
        month: u32,
        rows: &[PayrollRow],
    ) -> Result<(), BackendError>;

    async fn legacy_totals(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<LegacyEmployeeTotal>, BackendError>;
}

#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn commission_rates(&self) -> Result<CommissionRates, BackendError>;
    async fn policy_caps(&self) -> Result<PolicyCaps, BackendError>;
}

// --- Engine ---

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("employee directory unavailable")]
    DirectoryUnavailable(#[source] BackendError),
    #[error("payroll computation unavailable (authoritative and legacy)")]
    PayrollUnavailable(#[source] BackendError),
}

/// Everything the engine needs from the outside world. One `Arc` per
/// collaborator so per-employee tasks can share them.
#[derive(Clone)]
pub struct Collaborators {
    pub timesheets: Arc<dyn TimesheetSource>,
    pub leaves: Arc<dyn LeaveSource>,
    pub employees: Arc<dyn EmployeeDirectory>,
    pub invoices: Arc<dyn InvoiceSource>,
    pub adjustments: Arc<dyn AdjustmentStore>,
    pub loans: Arc<dyn LoanStore>,
    pub payroll: Arc<dyn PayrollStore>,
    pub settings: Arc<dyn SettingsSource>,
}

/// Per-employee run output: the breakdown plus everything display and export
/// surfaces consume.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeRun {
    pub profile: EmployeeProfile,
    pub row: PayrollRow,
    pub aggregate: Option<AttendanceAggregate>,
    pub payslip: PayslipDocument,
    /// Non-fatal fetch problems for this employee; affected fields fell
    /// back to zero/defaults.
    pub soft_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayrollRunResult {
    pub year: i32,
    pub month: u32,
    /// True when the authoritative computation was unavailable and the run
    /// fell back to legacy totals without component detail.
    pub degraded: bool,
    pub employees: Vec<EmployeeRun>,
    pub totals: RunTotals,
}

/// The payroll computation engine. Holds read-only configuration only; every
/// run recomputes fully for its (year, month, PS) selection.
pub struct PayrollEngine {
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    classifier: ClassifierConfig,
    /// Bounded fan-out for per-employee fetch/compute.
    concurrency: usize,
}

impl PayrollEngine {
    pub fn new(collaborators: Collaborators, clock: Arc<dyn Clock>) -> Self {
        Self {
            collaborators,
            clock,
            classifier: ClassifierConfig::default(),
            concurrency: 8,
        }
    }

    pub fn with_classifier(mut self, config: ClassifierConfig) -> Self {
        self.classifier = config;
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Validates and persists a new adjustment. Rejection is synchronous and
    /// nothing is written.
    pub async fn submit_adjustment(
        &self,
        adjustment: &Adjustment,
    ) -> Result<Result<(), ValidationError>, BackendError> {
        let Some(profile) = self
            .collaborators
            .employees
            .employee_by_id(adjustment.employee_id)
            .await?
        else {
            return Ok(Err(ValidationError::UnknownEmployee {
                employee_id: adjustment.employee_id,
            }));
        };
        let caps = self.policy_caps().await;
        let existing = self
            .collaborators
            .adjustments
            .adjustments(profile.id, adjustment.start_year, adjustment.start_month)
            .await?;
        let month_advance_total = classify_adjustments(&existing).advance_lyd;
        if let Err(rejection) =
            validate_adjustment(adjustment, &profile, month_advance_total, &caps)
        {
            return Ok(Err(rejection));
        }
        self.collaborators
            .adjustments
            .save_adjustment(adjustment)
            .await?;
        Ok(Ok(()))
    }

    /// Validates and persists a new loan against the caps and the one-year
    /// service requirement. A per-loan cap multiple overrides the policy one.
    pub async fn submit_loan(
        &self,
        loan: &Loan,
    ) -> Result<Result<(), ValidationError>, BackendError> {
        let Some(profile) = self
            .collaborators
            .employees
            .employee_by_id(loan.employee_id)
            .await?
        else {
            return Ok(Err(ValidationError::UnknownEmployee {
                employee_id: loan.employee_id,
            }));
        };
        let mut caps = self.policy_caps().await;
        if let Some(multiple) = loan.cap_multiple {
            caps.loan_max_multiple = multiple;
        }
        if let Err(rejection) =
            validate_loan(loan.principal, &profile, &caps, self.clock.today())
        {
            return Ok(Err(rejection));
        }
        self.collaborators.loans.save_loan(loan).await?;
        Ok(Ok(()))
    }

    /// Suspends one month of loan collection.
    pub async fn skip_loan_month(
        &self,
        loan_id: i64,
        year: i32,
        month: u32,
    ) -> Result<(), BackendError> {
        self.collaborators.loans.skip_month(loan_id, year, month).await
    }

    /// Settles a loan in full.
    pub async fn pay_off_loan(&self, loan_id: i64) -> Result<(), BackendError> {
        self.collaborators.loans.pay_off(loan_id).await
    }

    async fn policy_caps(&self) -> PolicyCaps {
        match self.collaborators.settings.policy_caps().await {
            Ok(caps) => caps,
            Err(e) => {
                warn!("policy caps unavailable, using defaults: {e}");
                PolicyCaps::default()
            }
        }
    }

    /// Runs the full payroll for a month, optionally restricted to one
    /// point of sale. A single employee's fetch failure never aborts the
    /// run; the employee falls back to zero/defaults and is flagged.
    pub async fn run(
        &self,
        year: i32,
        month: u32,
        ps_filter: Option<i64>,
    ) -> Result<PayrollRunResult, EngineError> {
        let month_dates = crate::attendance::month_days(year, month);
        let (month_start, month_end) = match (month_dates.first(), month_dates.last()) {
            (Some(s), Some(e)) => (*s, *e),
            _ => {
                return Ok(PayrollRunResult {
                    year,
                    month,
                    degraded: false,
                    employees: Vec::new(),
                    totals: RunTotals::default(),
                })
            }
        };

        info!(year, month, ?ps_filter, "starting payroll run");

        let employees = self
            .collaborators
            .employees
            .list_employees()
            .await
            .map_err(EngineError::DirectoryUnavailable)?;
        let employees: Vec<EmployeeProfile> = employees
            .into_iter()
            .filter(|e| ps_filter.is_none() || e.ps == ps_filter)
            .collect();

        // Authoritative rows first; legacy totals are the degraded fallback.
        let (rows, degraded) = match self.collaborators.payroll.compute_payroll(year, month).await {
            Ok(rows) => (rows, false),
            Err(primary) => {
                warn!("authoritative payroll computation unavailable, falling back: {primary}");
                let totals = self
                    .collaborators
                    .payroll
                    .legacy_totals(year, month)
                    .await
                    .map_err(|legacy| {
                        error!("legacy aggregate endpoint also failed: {legacy}");
                        EngineError::PayrollUnavailable(legacy)
                    })?;
                let rows = totals
                    .into_iter()
                    .map(|t| PayrollRow {
                        employee_id: t.employee_id,
                        total_salary_lyd: t.total_lyd,
                        net_salary_lyd: t.total_lyd,
                        total_salary_usd: t.total_usd,
                        net_salary_usd: t.total_usd,
                        ..PayrollRow::default()
                    })
                    .collect();
                (rows, true)
            }
        };
        let rows_by_employee: HashMap<i64, PayrollRow> =
            rows.into_iter().map(|r| (r.employee_id, r)).collect();

        // Shared lookups; each degrades to empty on failure.
        let holidays: HashSet<NaiveDate> = match self
            .collaborators
            .leaves
            .holidays(month_start, month_end)
            .await
        {
            Ok(dates) => dates.into_iter().collect(),
            Err(e) => {
                warn!("holiday lookup failed, treating month as holiday-free: {e}");
                HashSet::new()
            }
        };
        let invoices: Arc<Vec<InvoiceLine>> = Arc::new(
            match self
                .collaborators
                .invoices
                .invoices_in_range(month_start, month_end)
                .await
            {
                Ok(lines) => lines,
                Err(e) => {
                    warn!("invoice lookup failed, commissions resolve to zero: {e}");
                    Vec::new()
                }
            },
        );
        let rates = match self.collaborators.settings.commission_rates().await {
            Ok(rates) => rates,
            Err(e) => {
                warn!("commission settings unavailable, using defaults: {e}");
                CommissionRates::default()
            }
        };

        // Per-employee computation is embarrassingly parallel; bound the
        // fan-out so the collaborator API is not overwhelmed.
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let holidays = Arc::new(holidays);
        let rates = Arc::new(rates);
        let classifier = Arc::new(self.classifier.clone());
        let mut tasks: JoinSet<EmployeeRun> = JoinSet::new();
        for profile in employees {
            let semaphore = semaphore.clone();
            let collaborators = self.collaborators.clone();
            let holidays = holidays.clone();
            let invoices = invoices.clone();
            let rates = rates.clone();
            let classifier = classifier.clone();
            let row = rows_by_employee
                .get(&profile.id)
                .cloned()
                .unwrap_or_else(|| PayrollRow {
                    employee_id: profile.id,
                    base_salary_lyd: profile.base_salary_lyd,
                    base_salary_usd: profile.base_salary_usd,
                    working_days: profile.working_days,
                    ..PayrollRow::default()
                });
            tasks.spawn(async move {
                // Acquire inside the task so spawning stays cheap.
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                compute_employee(
                    profile,
                    row,
                    year,
                    month,
                    month_start,
                    month_end,
                    &collaborators,
                    &holidays,
                    &invoices,
                    &rates,
                    &classifier,
                )
                .await
            });
        }

        let mut employee_runs = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(run) => employee_runs.push(run),
                Err(e) => error!("employee computation task panicked: {e}"),
            }
        }
        employee_runs.sort_by_key(|r| r.profile.id);

        let mut totals = RunTotals::default();
        for run in &employee_runs {
            totals.add(&run.payslip.totals);
        }

        info!(
            year,
            month,
            employees = totals.employees,
            net_lyd = %totals.net_lyd,
            degraded,
            "payroll run finished"
        );
        Ok(PayrollRunResult {
            year,
            month,
            degraded,
            employees: employee_runs,
            totals,
        })
    }
}

/// One employee's full pipeline: fetch, normalize, classify, compute,
/// compose. Fetch failures are soft; the affected input defaults to empty.
#[allow(clippy::too_many_arguments)]
async fn compute_employee(
    profile: EmployeeProfile,
    mut row: PayrollRow,
    year: i32,
    month: u32,
    month_start: NaiveDate,
    month_end: NaiveDate,
    collaborators: &Collaborators,
    holidays: &HashSet<NaiveDate>,
    invoices: &[InvoiceLine],
    rates: &CommissionRates,
    classifier: &ClassifierConfig,
) -> EmployeeRun {
    let mut soft_errors = Vec::new();

    // Normalization must run before anything reads the row.
    normalize_row(&mut row, profile.fingerprint_required);

    let timesheet: Option<Vec<AttendanceDay>> = match collaborators
        .timesheets
        .timesheet_month(profile.id, year, month)
        .await
    {
        Ok(days) => Some(days),
        Err(e) => {
            warn!(employee_id = profile.id, "timesheet fetch failed: {e}");
            soft_errors.push(format!("timesheet: {e}"));
            None
        }
    };

    let leaves: Vec<ApprovedLeavePeriod> =
        match collaborators.leaves.leave_requests(profile.id).await {
            Ok(periods) if !periods.is_empty() => periods,
            Ok(_) => {
                // Leave-request data absent; try the vacation representation.
                match collaborators
                    .leaves
                    .vacations_in_range(profile.id, month_start, month_end)
                    .await
                {
                    Ok(periods) => periods,
                    Err(e) => {
                        soft_errors.push(format!("vacations: {e}"));
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                warn!(employee_id = profile.id, "leave fetch failed: {e}");
                soft_errors.push(format!("leaves: {e}"));
                Vec::new()
            }
        };

    let adjustments_raw: Vec<Adjustment> = match collaborators
        .adjustments
        .adjustments(profile.id, year, month)
        .await
    {
        Ok(entries) => entries,
        Err(e) => {
            warn!(employee_id = profile.id, "adjustment fetch failed: {e}");
            soft_errors.push(format!("adjustments: {e}"));
            Vec::new()
        }
    };

    let loans: Vec<Loan> = match collaborators.loans.loans(profile.id).await {
        Ok(loans) => loans,
        Err(e) => {
            warn!(employee_id = profile.id, "loan fetch failed: {e}");
            soft_errors.push(format!("loans: {e}"));
            Vec::new()
        }
    };

    // Pure pipeline from here down.
    let grid_ctx = ClassifyContext {
        config: classifier,
        intent: Intent::Grid,
        scheduled_start: None,
        scheduled_end: None,
        leaves: &leaves,
        holidays,
    };
    let aggregate: Option<AttendanceAggregate> = timesheet
        .as_deref()
        .map(|days| aggregate_month(year, month, days, &grid_ctx));

    let components = compute_components(
        &profile,
        &row,
        aggregate.as_ref(),
        profile.fingerprint_required,
    );
    let commission = resolve_commission(&profile.commission, profile.ps, invoices, rates);

    let applicable: Vec<Adjustment> = adjustments_raw
        .into_iter()
        .filter(|a| a.applies_to(year, month))
        .collect();
    let adjustment_totals = classify_adjustments(&applicable);

    let loan_payment: Decimal = loans
        .iter()
        .filter(|l| (l.start_year, l.start_month) <= (year, month))
        .filter(|l| !l.is_skipped(year, month))
        .map(|l| loan_installment(l.principal, l.monthly_percent, l.remaining))
        .sum();

    let breakdown = aggregate_breakdown(
        &row,
        &components,
        &commission,
        &adjustment_totals,
        loan_payment,
    );

    let doc_ctx = ClassifyContext {
        intent: Intent::Document,
        ..grid_ctx
    };
    let payslip = build_payslip(
        &profile,
        year,
        month,
        timesheet.as_deref().unwrap_or(&[]),
        &doc_ctx,
        aggregate.as_ref(),
        &components,
        &commission,
        &adjustment_totals,
        loan_payment,
        &breakdown,
    );

    EmployeeRun {
        profile,
        row,
        aggregate,
        payslip,
        soft_errors,
    }
}
