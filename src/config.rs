// src/config.rs

use std::env;

use url::Url;

use crate::classifier::ClassifierConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnvVar { name: String, value: String },
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub hr_api_base_url: Url,
    pub hr_api_token: String,
    /// Concurrent per-employee computations.
    pub concurrency: usize,
    pub classifier: ClassifierConfig,
}

impl Config {
    /// Reads `.env` first so local runs work without an exported shell
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let base_url_raw = required("HR_API_BASE_URL")?;
        let hr_api_base_url =
            Url::parse(&base_url_raw).map_err(|_| ConfigError::InvalidEnvVar {
                name: "HR_API_BASE_URL".to_string(),
                value: base_url_raw,
            })?;
        let hr_api_token = required("HR_API_TOKEN")?;
        let concurrency = optional_parsed("PAYROLL_CONCURRENCY")?.unwrap_or(8);

        let mut classifier = ClassifierConfig::default();
        if let Some(v) = optional_parsed("LATE_THRESHOLD_MIN")? {
            classifier.late_threshold_min = v;
        }
        if let Some(v) = optional_parsed("GRID_MISS_THRESHOLD_MIN")? {
            classifier.grid_miss_threshold_min = v;
        }
        if let Some(v) = optional_parsed("DISPLAY_MISS_THRESHOLD_MIN")? {
            classifier.display_miss_threshold_min = v;
        }
        if let Some(v) = optional_parsed("FULL_DAY_TOLERANCE_MIN")? {
            classifier.full_day_tolerance_min = v;
        }

        Ok(Self {
            hr_api_base_url,
            hr_api_token,
            concurrency,
            classifier,
        })
    }
}
