use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::batch::BatchOptions;
use crate::retrieval::europepmc::{self, MAX_PAGE_SIZE};
use crate::retrieval::RetrievalSettings;
use crate::synonyms::{OLS_API_BASE, UNIPROT_API_BASE};

pub const ENV_EPMC_URL: &str = "LITSPY_EPMC_URL";
pub const ENV_UNIPROT_URL: &str = "LITSPY_UNIPROT_URL";
pub const ENV_OLS_URL: &str = "LITSPY_OLS_URL";

/// Worker count used when the core count cannot be determined.
const FALLBACK_WORKERS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },

    #[error("{var} must be an http(s) URL, got '{value}'")]
    UnsupportedScheme { var: &'static str, value: String },

    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("page size must be at most {max}, got {got}")]
    PageSize { got: u32, max: u32 },
}

/// Base URLs of the three external services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub europepmc: String,
    pub uniprot: String,
    pub ols: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            europepmc: europepmc::API_BASE.to_string(),
            uniprot: UNIPROT_API_BASE.to_string(),
            ols: OLS_API_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Defaults, overridden by `LITSPY_EPMC_URL`, `LITSPY_UNIPROT_URL` and `LITSPY_OLS_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let pick = |var: &'static str, default: String| -> Result<String, ConfigError> {
            match get(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(value) => validate_url(var, &value).map(|()| value),
                None => Ok(default),
            }
        };
        Ok(Self {
            europepmc: pick(ENV_EPMC_URL, defaults.europepmc)?,
            uniprot: pick(ENV_UNIPROT_URL, defaults.uniprot)?,
            ols: pick(ENV_OLS_URL, defaults.ols)?,
        })
    }
}

fn validate_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl { var, source })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::UnsupportedScheme {
            var,
            value: value.to_string(),
        }),
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(FALLBACK_WORKERS)
}

/// Everything a run needs, passed explicitly to each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: Endpoints,
    pub retrieval: RetrievalSettings,
    /// Per-request timeout for literature searches.
    pub request_timeout: Duration,
    /// Overall budget for one synonym lookup.
    pub lookup_timeout: Duration,
    pub batch: BatchOptions,
    /// Article links listed per expression in the Markdown report.
    pub hits_shown: usize,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.workers == 0 {
            return Err(ConfigError::Zero("worker count"));
        }
        if self.retrieval.page_size == 0 {
            return Err(ConfigError::Zero("page size"));
        }
        if self.retrieval.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::PageSize {
                got: self.retrieval.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        if self.retrieval.max_pages == 0 {
            return Err(ConfigError::Zero("maximum pages"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request timeout"));
        }
        if self.lookup_timeout.is_zero() {
            return Err(ConfigError::Zero("lookup timeout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::retrieval::RetryPolicy;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| vars.get(k).cloned()
    }

    fn config() -> Config {
        Config {
            endpoints: Endpoints::default(),
            retrieval: RetrievalSettings {
                workers: 2,
                page_size: MAX_PAGE_SIZE,
                max_pages: 10,
                retry: RetryPolicy::default(),
            },
            request_timeout: Duration::from_secs(30),
            lookup_timeout: Duration::from_secs(10),
            batch: BatchOptions::default(),
            hits_shown: 5,
        }
    }

    #[test]
    fn endpoints_default_without_overrides() {
        let endpoints = Endpoints::from_lookup(lookup(&[])).unwrap();
        assert_eq!(endpoints, Endpoints::default());
        assert!(endpoints.europepmc.starts_with("https://www.ebi.ac.uk/"));
    }

    #[test]
    fn endpoint_override_is_validated() {
        let endpoints =
            Endpoints::from_lookup(lookup(&[(ENV_OLS_URL, "http://localhost:8080/api")])).unwrap();
        assert_eq!(endpoints.ols, "http://localhost:8080/api");

        let err = Endpoints::from_lookup(lookup(&[(ENV_EPMC_URL, "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { var: ENV_EPMC_URL, .. }));

        let err = Endpoints::from_lookup(lookup(&[(ENV_UNIPROT_URL, "ftp://example.org")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));
    }

    #[test]
    fn blank_override_falls_back_to_default() {
        let endpoints = Endpoints::from_lookup(lookup(&[(ENV_OLS_URL, "  ")])).unwrap();
        assert_eq!(endpoints.ols, OLS_API_BASE);
    }

    #[test]
    fn validate_rejects_zero_and_oversized_settings() {
        assert!(config().validate().is_ok());

        let mut c = config();
        c.retrieval.workers = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Zero("worker count"))));

        let mut c = config();
        c.retrieval.page_size = 5000;
        assert!(matches!(c.validate(), Err(ConfigError::PageSize { got: 5000, .. })));

        let mut c = config();
        c.retrieval.max_pages = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn default_workers_is_positive() {
        assert!(default_workers() >= 1);
    }
}
