// src/lib.rs
//
// Monthly payroll computation for a dual-currency (LYD/USD) jewelry retail
// business: attendance classification, pay components, sales commissions,
// the adjustment/loan ledger, and payslip assembly.

pub mod attendance;
pub mod autosave;
pub mod backend;
pub mod classifier;
pub mod codes;
pub mod commission;
pub mod components;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod ledger;
pub mod model;
pub mod payroll;
pub mod payslip;

mod classifier_tests;
mod commission_tests;

pub use backend::{BackendError, HrApiClient};
pub use config::Config;
pub use engine::{Collaborators, PayrollEngine, PayrollRunResult, SystemClock};
