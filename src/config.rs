//! Runtime settings and assignment configuration.
//!
//! Environment variables:
//! - `SERVER_IP` - host of the grading service
//! - `SERVER_PORT` - port of the grading service (default 3000)
//! - `AUTH_TOKEN` - authorization token sent verbatim on every request
//!
//! Settings are loaded once in `main` and threaded through the pipeline
//! explicitly; nothing in this crate reads the environment after startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_service_port() -> String {
    "3000".to_string()
}

fn default_service_timeout() -> u64 {
    30
}

fn default_test_timeout() -> u64 {
    30
}

fn default_settle() -> u64 {
    5
}

/// Runtime settings for a grading run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Grading service host. When unset the service is simply unreachable
    /// and the run degrades to a sample-only report.
    pub service_host: String,
    /// Grading service port.
    pub service_port: String,
    /// Token sent as the `Authorization` header value. `None` omits the
    /// header and the service rejects the request.
    pub auth_token: Option<String>,
    /// Timeout in seconds for each grading service request.
    pub service_timeout_secs: u64,
    /// Timeout in seconds for each executed test command.
    pub test_timeout_secs: u64,
    /// Seconds to wait after launching a server with no readiness probe.
    pub settle_secs: u64,
    /// Assignment configuration (`config.json`).
    pub config_path: PathBuf,
    /// Student-authored test suite (`tests.json`).
    pub tests_path: PathBuf,
    /// Instructor default test suite (`default-tests.json`).
    pub default_tests_path: PathBuf,
    /// Platform submission metadata.
    pub metadata_path: PathBuf,
    /// Feedback report destination.
    pub results_path: PathBuf,
    /// Instructor sample solution directory.
    pub sample_server_dir: PathBuf,
    /// Student submission directory.
    pub submission_dir: PathBuf,
}

impl Settings {
    /// Loads settings from the environment, with platform-layout defaults
    /// for every path.
    pub fn from_env() -> Self {
        Self {
            service_host: std::env::var("SERVER_IP").unwrap_or_default(),
            service_port: std::env::var("SERVER_PORT").unwrap_or_else(|_| default_service_port()),
            auth_token: std::env::var("AUTH_TOKEN").ok(),
            service_timeout_secs: default_service_timeout(),
            test_timeout_secs: default_test_timeout(),
            settle_secs: default_settle(),
            config_path: PathBuf::from("config.json"),
            tests_path: PathBuf::from("tests.json"),
            default_tests_path: PathBuf::from("default-tests.json"),
            metadata_path: PathBuf::from("/autograder/submission_metadata.json"),
            results_path: PathBuf::from("/autograder/results/results.json"),
            sample_server_dir: PathBuf::from("/autograder/source/sample-server"),
            submission_dir: PathBuf::from("/autograder/submission"),
        }
    }

    /// Base URL of the grading service.
    pub fn service_base_url(&self) -> String {
        format!("http://{}:{}", self.service_host, self.service_port)
    }

    /// Returns the per-request service timeout as a Duration.
    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    /// Returns the per-test command timeout as a Duration.
    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    /// Returns the post-launch settle delay as a Duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

/// Per-assignment configuration shipped alongside the grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentConfig {
    /// How many of a student's passing tests the service marks public.
    pub num_public_tests_for_access: u32,
}

impl AssignmentConfig {
    /// Loads the assignment configuration. A missing or malformed file is
    /// fatal: without it the upload request cannot be formed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}
