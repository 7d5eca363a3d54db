//! Client for the testit grading service.
//!
//! The service stores every student's admissible tests per assignment and
//! hands back the merged set to run. Requests go through curl with the
//! same status-trailer convention the executor uses, and replies are
//! parsed into typed records at this boundary; anything else is a
//! [`Error::MalformedResponse`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::executor::{split_status_trailer, STATUS_TRAILER_FORMAT};
use crate::testcase::TestCase;

/// A test the service refused to store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedTest {
    /// Name of the refused test.
    pub name: String,
    /// Service-supplied reason, surfaced to the student verbatim.
    pub reason: String,
}

/// Reply from the submit-tests endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Whether the service processed the upload.
    #[serde(default)]
    pub success: bool,
    /// Tests the service refused, with reasons.
    #[serde(default)]
    pub failed_to_add: Vec<RejectedTest>,
    /// The merged set of tests this student must now run.
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// Status and parsed reply of a test upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// HTTP status of the reply.
    pub status: u16,
    /// Parsed reply body.
    pub response: UploadResponse,
}

impl UploadOutcome {
    /// True when the service accepted the upload.
    pub fn accepted(&self) -> bool {
        (200..300).contains(&self.status) && self.response.success
    }
}

/// One per-test outcome reported back to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportedResult {
    /// Test name as stored by the service.
    pub name: String,
    /// Whether the student's implementation passed it.
    pub passed: bool,
}

/// Remote grading service operations used by the pipeline.
#[async_trait]
pub trait GradingService: Send + Sync {
    /// True when the service answers its health endpoint with a 200.
    async fn health_check(&self) -> bool;

    /// Uploads admissible tests and returns the service's verdict along
    /// with the merged set of tests to run.
    async fn upload_tests(
        &self,
        assignment: &str,
        student_id: i64,
        tests: &[TestCase],
        num_public_tests: u32,
    ) -> Result<UploadOutcome>;

    /// Reports per-test outcomes. Returns the reply's HTTP status; the
    /// body is not consumed.
    async fn upload_results(
        &self,
        assignment: &str,
        student_id: i64,
        results: &[ReportedResult],
    ) -> Result<u16>;
}

/// Curl-backed client for the testit service.
pub struct TestitClient {
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl TestitClient {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token,
            timeout,
        }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            "-S".to_string(),
            "--max-time".to_string(),
            self.timeout.as_secs().to_string(),
            "-w".to_string(),
            STATUS_TRAILER_FORMAT.to_string(),
        ];
        if let Some(token) = &self.auth_token {
            args.push("-H".to_string());
            args.push(format!("Authorization: {}", token));
        }
        args
    }

    fn submit_tests_url(&self, assignment: &str, student_id: i64, num_public_tests: u32) -> String {
        format!(
            "{}/submit-tests/{}?student_id={}&num_public_tests={}",
            self.base_url, assignment, student_id, num_public_tests
        )
    }

    fn submit_results_url(&self, assignment: &str, student_id: i64) -> String {
        format!(
            "{}/submit-results/{}?student_id={}",
            self.base_url, assignment, student_id
        )
    }

    /// Runs one curl request, optionally streaming `body` over stdin, and
    /// returns the reply status and body.
    async fn request(&self, args: &[String], body: Option<&str>) -> Result<(u16, String)> {
        let mut command = Command::new("curl");
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command.stdin(if body.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command
            .spawn()
            .map_err(|e| Error::Service(format!("failed to run curl: {}", e)))?;

        if let Some(body) = body {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::Service("curl stdin unavailable".to_string()))?;
            stdin
                .write_all(body.as_bytes())
                .await
                .map_err(|e| Error::Service(format!("failed to send request body: {}", e)))?;
            // Closing stdin lets curl finish reading the body.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Service(format!("failed to wait for curl: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Service(format!(
                "curl failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        split_status_trailer(&stdout)
            .map(|(reply, status)| (status, reply))
            .ok_or_else(|| Error::Service("reply did not include a status code".to_string()))
    }
}

#[async_trait]
impl GradingService for TestitClient {
    async fn health_check(&self) -> bool {
        let mut args = self.base_args();
        args.push(format!("{}/", self.base_url));

        match self.request(&args, None).await {
            Ok((status, _)) => status == 200,
            Err(e) => {
                tracing::warn!(error = %e, "grading service health check failed");
                false
            }
        }
    }

    async fn upload_tests(
        &self,
        assignment: &str,
        student_id: i64,
        tests: &[TestCase],
        num_public_tests: u32,
    ) -> Result<UploadOutcome> {
        let body = serde_json::to_string(tests)
            .map_err(|e| Error::Service(format!("failed to encode tests: {}", e)))?;

        let mut args = self.base_args();
        args.push("-H".to_string());
        args.push("Content-Type: application/json".to_string());
        args.push("-d".to_string());
        args.push("@-".to_string());
        args.push(self.submit_tests_url(assignment, student_id, num_public_tests));

        tracing::info!(
            assignment = %assignment,
            student_id,
            count = tests.len(),
            "uploading tests"
        );
        let (status, reply) = self.request(&args, Some(&body)).await?;

        let response: UploadResponse = serde_json::from_str(&reply)
            .map_err(|e| Error::MalformedResponse(format!("submit-tests reply: {}", e)))?;
        Ok(UploadOutcome { status, response })
    }

    async fn upload_results(
        &self,
        assignment: &str,
        student_id: i64,
        results: &[ReportedResult],
    ) -> Result<u16> {
        let body = serde_json::to_string(results)
            .map_err(|e| Error::Service(format!("failed to encode results: {}", e)))?;

        let mut args = self.base_args();
        args.push("-H".to_string());
        args.push("Content-Type: application/json".to_string());
        args.push("-d".to_string());
        args.push("@-".to_string());
        args.push(self.submit_results_url(assignment, student_id));

        tracing::info!(
            assignment = %assignment,
            student_id,
            count = results.len(),
            "uploading results"
        );
        let (status, _) = self.request(&args, Some(&body)).await?;
        Ok(status)
    }
}
