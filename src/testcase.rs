//! Declarative HTTP test cases.
//!
//! A suite is a JSON array of test cases. Each case names a shell command
//! (today always curl), the expected status, and optionally an expected
//! body compared as text or as parsed JSON.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Wire tag identifying a curl-backed test.
pub const CURL_TEST: &str = "curl";

/// How the response body is compared against the expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Parse the body as JSON and compare structurally.
    Json,
    /// Compare the body byte for byte.
    Text,
}

/// Expected response for a test command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedResponse {
    /// Expected HTTP status code.
    pub status: u16,
    /// Expected body for text comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Expected body for structural JSON comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
}

/// The executable half of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Full curl invocation as the author wrote it.
    pub command: String,
    /// Body comparison mode.
    #[serde(rename = "response-type")]
    pub response_type: ResponseType,
    /// Expected response.
    pub response: ExpectedResponse,
}

/// A single declarative test case.
///
/// Unknown fields are dropped at this boundary; the grading service adds
/// bookkeeping fields (author, visibility) to cases it returns, and those
/// never influence execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique name; the grading service keys storage on it.
    pub name: String,
    /// Optional human description surfaced in feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Test kind tag. Anything other than [`CURL_TEST`] fails at run time
    /// with a diagnostic naming the tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Command and expectation.
    pub test: CommandSpec,
    /// Whether the service should expose this case to other students.
    /// Absent means the service default (public).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

/// Loads a test suite leniently: a missing or unparsable file is an empty
/// suite, not an error, so a submission without tests still gets a report.
pub fn load_tests(path: &Path) -> Vec<TestCase> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "no test suite loaded");
            return Vec::new();
        }
    };
    let tests: Vec<TestCase> = match serde_json::from_str(&contents) {
        Ok(tests) => tests,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "test suite did not parse; treating as empty"
            );
            return Vec::new();
        }
    };
    for name in duplicate_names(&tests) {
        tracing::warn!(name = %name, "duplicate test name; the service keeps only one");
    }
    tests
}

/// Returns each name that appears more than once, in first-seen order.
pub fn duplicate_names(tests: &[TestCase]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for test in tests {
        if !seen.insert(test.name.as_str()) && !duplicates.contains(&test.name) {
            duplicates.push(test.name.clone());
        }
    }
    duplicates
}
