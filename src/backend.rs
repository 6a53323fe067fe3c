// src/backend.rs
//
// HTTP client for the HR backend. All collaborator traits from `engine` are
// implemented here against the REST endpoints; raw payloads are canonicalized
// through `ingest` before anything downstream sees them.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use crate::commission::CommissionRates;
use crate::engine::{
    AdjustmentStore, EmployeeDirectory, InvoiceSource, LeaveSource, LegacyEmployeeTotal,
    LoanStore, PayrollStore, SettingsSource, TimesheetSource,
};
use crate::ingest::{
    build_leave_catalog, leave_periods, RawAdjustment, RawEmployee, RawInvoiceLine,
    RawLeaveRequest, RawLeaveType, RawLoan, RawPayrollRow, RawTimesheetDay,
};
use crate::ledger::PolicyCaps;
use crate::model::{
    Adjustment, ApprovedLeavePeriod, AttendanceDay, EmployeeProfile, InvoiceLine,
    LeaveTypeCatalog, Loan, PayrollRow, SalesRole,
};

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Authentication rejected by backend (Status {0})")]
    Auth(StatusCode),

    #[error("Rate limit exceeded (Status 429)")]
    RateLimitExceeded,

    #[error("API error: Status={status}, Message='{message}'")]
    Api { status: StatusCode, message: String },
}

impl BackendError {
    /// Transport failures, 429s and 5xx responses are worth retrying;
    /// everything else is a caller problem.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Request(e) => e.is_timeout() || e.is_connect(),
            BackendError::RateLimitExceeded => true,
            BackendError::Api { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

const DEFAULT_MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct HrApiClient {
    http_client: Client,
    base_url: Url,
    api_token: String,
    max_retries: u32,
    leave_catalog: OnceCell<LeaveTypeCatalog>,
}

impl HrApiClient {
    pub fn new(base_url: Url, api_token: String) -> Result<Self, BackendError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http_client,
            base_url,
            api_token,
            max_retries: DEFAULT_MAX_RETRIES,
            leave_catalog: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path)?)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_token)
    }

    /// Send a request and deserialize the JSON body, retrying retryable
    /// failures with a doubling backoff.
    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, BackendError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let builder = request_builder
                .try_clone()
                .ok_or_else(|| BackendError::Api {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: format!("unclonable request for {context_msg}"),
                })?;
            match self.send_once(builder, context_msg).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt <= self.max_retries => {
                    warn!(
                        context = context_msg,
                        attempt,
                        "retryable backend error, backing off {}ms: {e}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, BackendError> {
        let response = self.authed(builder).send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Auth(status));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimitExceeded);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, message });
        }
        let body = response.text().await?;
        debug!(context = context_msg, bytes = body.len(), "backend response");
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context_msg: &str,
    ) -> Result<T, BackendError> {
        let url = self.url(path)?;
        let builder = self.http_client.get(url).query(query);
        self.send_and_deserialize(builder, context_msg).await
    }

    async fn post_json<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
        context_msg: &str,
    ) -> Result<(), BackendError> {
        let url = self.url(path)?;
        let builder = self.http_client.post(url).json(body);
        // Mutating endpoints return an envelope we don't need.
        let _: serde_json::Value = self.send_and_deserialize(builder, context_msg).await?;
        Ok(())
    }

    async fn put_json<B: serde::Serialize>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
        context_msg: &str,
    ) -> Result<(), BackendError> {
        let url = self.url(path)?;
        let builder = self.http_client.put(url).query(query).json(body);
        let _: serde_json::Value = self.send_and_deserialize(builder, context_msg).await?;
        Ok(())
    }

    /// Leave types change rarely; fetch once and reuse for the session.
    async fn leave_catalog(&self) -> Result<&LeaveTypeCatalog, BackendError> {
        self.leave_catalog
            .get_or_try_init(|| async {
                let raw: Vec<RawLeaveType> =
                    self.get("leave/types", &[], "fetch leave types").await?;
                Ok(build_leave_catalog(raw))
            })
            .await
    }
}

#[async_trait]
impl TimesheetSource for HrApiClient {
    async fn timesheet_month(
        &self,
        employee_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Vec<AttendanceDay>, BackendError> {
        let raw: Vec<RawTimesheetDay> = self
            .get(
                &format!("timesheets/{employee_id}"),
                &[("year", year.to_string()), ("month", month.to_string())],
                "fetch timesheet month",
            )
            .await?;
        Ok(raw.into_iter().map(AttendanceDay::from).collect())
    }
}

#[async_trait]
impl LeaveSource for HrApiClient {
    async fn leave_requests(
        &self,
        employee_id: i64,
    ) -> Result<Vec<ApprovedLeavePeriod>, BackendError> {
        let raw: Vec<RawLeaveRequest> = self
            .get(
                "leave/requests",
                &[("employee_id", employee_id.to_string())],
                "fetch leave requests",
            )
            .await?;
        let catalog = self.leave_catalog().await?;
        Ok(leave_periods(raw, catalog))
    }

    async fn vacations_in_range(
        &self,
        employee_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ApprovedLeavePeriod>, BackendError> {
        let raw: Vec<RawLeaveRequest> = self
            .get(
                "vacations",
                &[
                    ("employee_id", employee_id.to_string()),
                    ("from", start.to_string()),
                    ("to", end.to_string()),
                ],
                "fetch vacations",
            )
            .await?;
        let catalog = self.leave_catalog().await?;
        Ok(leave_periods(raw, catalog))
    }

    async fn holidays(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, BackendError> {
        self.get(
            "holidays",
            &[("from", start.to_string()), ("to", end.to_string())],
            "fetch public holidays",
        )
        .await
    }
}

#[async_trait]
impl EmployeeDirectory for HrApiClient {
    async fn list_employees(&self) -> Result<Vec<EmployeeProfile>, BackendError> {
        let raw: Vec<RawEmployee> = self.get("employees", &[], "fetch employees").await?;
        Ok(raw.into_iter().map(EmployeeProfile::from).collect())
    }

    async fn employee_by_id(&self, id: i64) -> Result<Option<EmployeeProfile>, BackendError> {
        let result: Result<RawEmployee, _> = self
            .get(&format!("employees/{id}"), &[], "fetch employee")
            .await;
        match result {
            Ok(raw) => Ok(Some(raw.into())),
            Err(BackendError::Api { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl InvoiceSource for HrApiClient {
    async fn invoices_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InvoiceLine>, BackendError> {
        let raw: Vec<RawInvoiceLine> = self
            .get(
                "invoices",
                &[("from", start.to_string()), ("to", end.to_string())],
                "fetch invoices",
            )
            .await?;
        Ok(raw.into_iter().map(InvoiceLine::from).collect())
    }
}

#[async_trait]
impl AdjustmentStore for HrApiClient {
    async fn adjustments(
        &self,
        employee_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Vec<Adjustment>, BackendError> {
        let raw: Vec<RawAdjustment> = self
            .get(
                "adjustments",
                &[
                    ("employee_id", employee_id.to_string()),
                    ("year", year.to_string()),
                    ("month", month.to_string()),
                ],
                "fetch adjustments",
            )
            .await?;
        Ok(raw.into_iter().filter_map(RawAdjustment::canonicalize).collect())
    }

    async fn save_adjustment(&self, adjustment: &Adjustment) -> Result<(), BackendError> {
        self.post_json("adjustments", adjustment, "save adjustment")
            .await
    }
}

#[async_trait]
impl LoanStore for HrApiClient {
    async fn loans(&self, employee_id: i64) -> Result<Vec<Loan>, BackendError> {
        let raw: Vec<RawLoan> = self
            .get(
                "loans",
                &[("employee_id", employee_id.to_string())],
                "fetch loans",
            )
            .await?;
        Ok(raw.into_iter().map(Loan::from).collect())
    }

    async fn save_loan(&self, loan: &Loan) -> Result<(), BackendError> {
        self.post_json("loans", loan, "save loan").await
    }

    async fn skip_month(&self, loan_id: i64, year: i32, month: u32) -> Result<(), BackendError> {
        let url = self.url(&format!("loans/{loan_id}/skip"))?;
        let builder = self
            .http_client
            .post(url)
            .query(&[("year", year.to_string()), ("month", month.to_string())]);
        let _: serde_json::Value = self.send_and_deserialize(builder, "skip loan month").await?;
        Ok(())
    }

    async fn pay_off(&self, loan_id: i64) -> Result<(), BackendError> {
        self.post_json(
            &format!("loans/{loan_id}/payoff"),
            &serde_json::json!({}),
            "pay off loan",
        )
        .await
    }
}

#[async_trait]
impl PayrollStore for HrApiClient {
    async fn compute_payroll(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<PayrollRow>, BackendError> {
        let url = self.url("payroll/v2/compute")?;
        let builder = self
            .http_client
            .post(url)
            .query(&[("year", year.to_string()), ("month", month.to_string())]);
        let raw: Vec<RawPayrollRow> = self
            .send_and_deserialize(builder, "compute payroll")
            .await?;
        Ok(raw.into_iter().map(PayrollRow::from).collect())
    }

    async fn save_payroll(
        &self,
        year: i32,
        month: u32,
        rows: &[PayrollRow],
    ) -> Result<(), BackendError> {
        self.put_json(
            "payroll/v2",
            &[("year", year.to_string()), ("month", month.to_string())],
            &rows,
            "save payroll rows",
        )
        .await
    }

    async fn legacy_totals(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<LegacyEmployeeTotal>, BackendError> {
        #[derive(Deserialize)]
        struct RawLegacyTotal {
            #[serde(alias = "emp_id")]
            employee_id: i64,
            #[serde(default)]
            total_lyd: Decimal,
            #[serde(default)]
            total_usd: Decimal,
        }
        let raw: Vec<RawLegacyTotal> = self
            .get(
                "payroll/legacy",
                &[("year", year.to_string()), ("month", month.to_string())],
                "fetch legacy totals",
            )
            .await?;
        Ok(raw
            .into_iter()
            .map(|t| LegacyEmployeeTotal {
                employee_id: t.employee_id,
                total_lyd: t.total_lyd,
                total_usd: t.total_usd,
            })
            .collect())
    }
}

#[async_trait]
impl SettingsSource for HrApiClient {
    async fn commission_rates(&self) -> Result<CommissionRates, BackendError> {
        #[derive(Deserialize, Default)]
        struct RawCommissionSettings {
            #[serde(default)]
            gold_per_gram: HashMap<String, Decimal>,
            #[serde(default)]
            diamond_percent: HashMap<String, Decimal>,
        }
        let raw: RawCommissionSettings = self
            .get("settings/commission", &[], "fetch commission settings")
            .await?;
        let parse_table = |table: HashMap<String, Decimal>| {
            table
                .into_iter()
                .filter_map(|(key, rate)| match SalesRole::parse(&key) {
                    Some(role) => Some((role, rate)),
                    None => {
                        warn!(role = key, "unknown role in commission settings");
                        None
                    }
                })
                .collect::<HashMap<SalesRole, Decimal>>()
        };
        Ok(CommissionRates::with_overrides(
            parse_table(raw.gold_per_gram),
            parse_table(raw.diamond_percent),
        ))
    }

    async fn policy_caps(&self) -> Result<PolicyCaps, BackendError> {
        #[derive(Deserialize)]
        struct RawPolicyCaps {
            #[serde(default = "default_advance_percent")]
            advance_max_percent: Decimal,
            #[serde(default = "default_loan_multiple")]
            loan_max_multiple: Decimal,
        }
        fn default_advance_percent() -> Decimal {
            PolicyCaps::default().advance_max_percent
        }
        fn default_loan_multiple() -> Decimal {
            PolicyCaps::default().loan_max_multiple
        }
        let raw: RawPolicyCaps = self
            .get("settings/policy", &[], "fetch policy caps")
            .await?;
        Ok(PolicyCaps {
            advance_max_percent: raw.advance_max_percent,
            loan_max_multiple: raw.loan_max_multiple,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(BackendError::RateLimitExceeded.is_retryable());
        assert!(BackendError::Api {
            status: StatusCode::BAD_GATEWAY,
            message: String::new()
        }
        .is_retryable());
        assert!(!BackendError::Api {
            status: StatusCode::NOT_FOUND,
            message: String::new()
        }
        .is_retryable());
        assert!(!BackendError::Auth(StatusCode::UNAUTHORIZED).is_retryable());
    }
}
