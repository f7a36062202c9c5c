//! Controller configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_FINALIZE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

/// Whether a rejected document may go back to pending with a fresh placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResubmissionPolicy {
    #[default]
    Disallow,
    Allow,
}

impl ResubmissionPolicy {
    pub fn allows_resubmission(&self) -> bool {
        matches!(self, ResubmissionPolicy::Allow)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Upper bound for every backend call except finalize
    pub request_timeout: Duration,

    /// Upper bound for finalize, which bakes the artifact
    pub finalize_timeout: Duration,

    pub resubmission: ResubmissionPolicy,

    /// Base URL of the signing API, used by the HTTP backend
    pub api_url: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            finalize_timeout: Duration::from_millis(DEFAULT_FINALIZE_TIMEOUT_MS),
            resubmission: ResubmissionPolicy::Disallow,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unparseable values fall back to the
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(default))
        };

        let resubmission = match lookup("DOCSIGN_ALLOW_RESUBMISSION").as_deref().map(str::trim) {
            Some("true") | Some("1") => ResubmissionPolicy::Allow,
            _ => ResubmissionPolicy::Disallow,
        };

        Self {
            request_timeout: millis("DOCSIGN_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS),
            finalize_timeout: millis("DOCSIGN_FINALIZE_TIMEOUT_MS", DEFAULT_FINALIZE_TIMEOUT_MS),
            resubmission,
            api_url: lookup("DOCSIGN_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_finalize_timeout(mut self, timeout: Duration) -> Self {
        self.finalize_timeout = timeout;
        self
    }

    pub fn with_resubmission(mut self, policy: ResubmissionPolicy) -> Self {
        self.resubmission = policy;
        self
    }
}
