//! Test command execution.
//!
//! Each test case carries a full curl command line. The executor appends
//! `-w "\n%{http_code}"` so the status code arrives as a trailer line on
//! stdout, runs the command, and compares status and body against the
//! test's expectation. Every failure mode becomes a failing verdict with
//! a student-readable reason; `Err` is reserved for harness faults.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::Result;
use crate::testcase::{ResponseType, TestCase, CURL_TEST};

/// Format argument handed to curl so the status code trails the body.
pub const STATUS_TRAILER_FORMAT: &str = "\\n%{http_code}";

/// Verdict for one executed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Whether the test passed.
    pub success: bool,
    /// Student-facing explanation of the verdict.
    pub reason: String,
}

impl TestResult {
    /// Passing verdict with the standard reason line.
    pub fn passed(name: &str) -> Self {
        Self {
            success: true,
            reason: format!("Test '{}' Passed", name),
        }
    }

    /// Failing verdict.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
        }
    }
}

/// Trait for running a single declarative test case.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Executes one test and returns its verdict.
    ///
    /// Command failures, timeouts, and expectation mismatches are all
    /// verdicts, never errors, so one broken test cannot abort a run.
    async fn execute(&self, test: &TestCase) -> Result<TestResult>;
}

/// Executor that runs curl test commands as child processes.
pub struct CurlExecutor {
    /// Wall-clock limit per command.
    timeout: Duration,
}

impl CurlExecutor {
    /// Creates an executor with the given per-command timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_command(&self, args: &[String]) -> std::io::Result<Output> {
        Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }

    async fn run_curl_test(&self, test: &TestCase) -> TestResult {
        let spec = &test.test;

        let mut args = match split_command(&spec.command) {
            Ok(args) if !args.is_empty() => args,
            Ok(_) => {
                return TestResult::failed(format!(
                    "Error executing test '{}':\nempty command",
                    test.name
                ))
            }
            Err(reason) => {
                return TestResult::failed(format!(
                    "Error executing test '{}':\n{}",
                    test.name, reason
                ))
            }
        };
        args.push("-w".to_string());
        args.push(STATUS_TRAILER_FORMAT.to_string());

        let output = match tokio::time::timeout(self.timeout, self.run_command(&args)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return TestResult::failed(format!(
                    "Error executing test '{}':\n{}",
                    test.name, e
                ))
            }
            Err(_) => {
                return TestResult::failed(format!(
                    "Error executing test '{}':\ntimed out after {:?}",
                    test.name, self.timeout
                ))
            }
        };

        if !output.status.success() {
            return TestResult::failed(format!(
                "Error executing test '{}':\n{}",
                test.name,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (body, status) = match split_status_trailer(&stdout) {
            Some(parts) => parts,
            None => {
                return TestResult::failed(format!(
                    "Test '{}' failed: Response did not include a status code",
                    test.name
                ))
            }
        };

        if status != spec.response.status {
            return TestResult::failed(format!(
                "Test '{}' failed: Expected status {}, got {}",
                test.name, spec.response.status, status
            ));
        }

        match spec.response_type {
            ResponseType::Json => {
                let actual: serde_json::Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        return TestResult::failed(format!(
                            "Test '{}' failed: Response body is not valid JSON",
                            test.name
                        ))
                    }
                };
                let expected = match &spec.response.json {
                    Some(expected) => expected,
                    None => {
                        return TestResult::failed(format!(
                            "Test '{}' failed: Test declares a json response but no expected json",
                            test.name
                        ))
                    }
                };
                if &actual != expected {
                    return TestResult::failed(format!(
                        "Test '{}' failed: Expected body {}, got {}",
                        test.name, expected, actual
                    ));
                }
            }
            ResponseType::Text => {
                let expected = match &spec.response.body {
                    Some(expected) => expected,
                    None => {
                        return TestResult::failed(format!(
                            "Test '{}' failed: Test declares a text response but no expected body",
                            test.name
                        ))
                    }
                };
                if &body != expected {
                    return TestResult::failed(format!(
                        "Test '{}' failed: Expected body {}, got {}",
                        test.name, expected, body
                    ));
                }
            }
        }

        TestResult::passed(&test.name)
    }
}

#[async_trait]
impl TestExecutor for CurlExecutor {
    async fn execute(&self, test: &TestCase) -> Result<TestResult> {
        if test.kind != CURL_TEST {
            return Ok(TestResult::failed(format!(
                "Unknown test type '{}'",
                test.kind
            )));
        }
        tracing::debug!(name = %test.name, "running curl test");
        Ok(self.run_curl_test(test).await)
    }
}

/// Splits captured stdout into the response body and the trailing status
/// code. Returns `None` when the trailer is missing or not a number.
pub fn split_status_trailer(stdout: &str) -> Option<(String, u16)> {
    let trimmed = stdout.trim();
    let (body, code) = match trimmed.rsplit_once('\n') {
        Some((body, code)) => (body, code),
        None => ("", trimmed),
    };
    code.trim()
        .parse::<u16>()
        .ok()
        .map(|status| (body.to_string(), status))
}

/// Splits a command string into arguments with shell-style quoting rules:
/// whitespace separates, single quotes are literal, double quotes allow
/// `\"` and `\\`, and a bare backslash escapes the next character.
pub fn split_command(command: &str) -> std::result::Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err("no closing quotation".to_string()),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err("no closing quotation".to_string()),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err("no closing quotation".to_string()),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(ch) => current.push(ch),
                    None => return Err("no escaped character".to_string()),
                }
            }
            _ => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcase::{CommandSpec, ExpectedResponse};

    fn shell_case(name: &str, script: &str, response_type: ResponseType) -> TestCase {
        TestCase {
            name: name.to_string(),
            description: None,
            kind: CURL_TEST.to_string(),
            test: CommandSpec {
                command: format!("sh -c '{}'", script),
                response_type,
                response: ExpectedResponse {
                    status: 200,
                    body: None,
                    json: None,
                },
            },
            public: None,
        }
    }

    #[test]
    fn split_command_handles_plain_words() {
        assert_eq!(
            split_command("curl -s http://localhost:8000/").unwrap(),
            vec!["curl", "-s", "http://localhost:8000/"]
        );
    }

    #[test]
    fn split_command_preserves_single_quoted_spaces() {
        assert_eq!(
            split_command("curl -d 'a b c' url").unwrap(),
            vec!["curl", "-d", "a b c", "url"]
        );
    }

    #[test]
    fn split_command_handles_double_quotes_with_escapes() {
        assert_eq!(
            split_command(r#"curl -d "{\"key\": \"value\"}" url"#).unwrap(),
            vec!["curl", "-d", r#"{"key": "value"}"#, "url"]
        );
    }

    #[test]
    fn split_command_keeps_backslash_before_ordinary_chars_in_quotes() {
        assert_eq!(split_command(r#""a\nb""#).unwrap(), vec![r"a\nb"]);
    }

    #[test]
    fn split_command_joins_adjacent_quoted_parts() {
        assert_eq!(split_command("a''b 'c'\"d\"").unwrap(), vec!["ab", "cd"]);
    }

    #[test]
    fn split_command_allows_empty_quoted_argument() {
        assert_eq!(split_command("curl '' url").unwrap(), vec!["curl", "", "url"]);
    }

    #[test]
    fn split_command_rejects_unterminated_quote() {
        assert_eq!(
            split_command("curl 'oops").unwrap_err(),
            "no closing quotation"
        );
    }

    #[test]
    fn split_command_rejects_trailing_backslash() {
        assert_eq!(split_command("curl \\").unwrap_err(), "no escaped character");
    }

    #[test]
    fn trailer_splits_body_and_status() {
        assert_eq!(
            split_status_trailer("{\"ok\":true}\n200"),
            Some(("{\"ok\":true}".to_string(), 200))
        );
    }

    #[test]
    fn trailer_handles_empty_body() {
        assert_eq!(split_status_trailer("\n404"), Some((String::new(), 404)));
    }

    #[test]
    fn trailer_keeps_multiline_bodies_intact() {
        assert_eq!(
            split_status_trailer("line one\nline two\n201"),
            Some(("line one\nline two".to_string(), 201))
        );
    }

    #[test]
    fn trailer_rejects_non_numeric_status() {
        assert_eq!(split_status_trailer("no status here"), None);
    }

    #[tokio::test]
    async fn unknown_test_type_fails_with_tag_in_reason() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("t", "true", ResponseType::Text);
        test.kind = "selenium".to_string();

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.reason, "Unknown test type 'selenium'");
    }

    #[tokio::test]
    async fn malformed_command_fails_without_running() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("bad", "true", ResponseType::Text);
        test.test.command = "curl 'unterminated".to_string();

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.reason,
            "Error executing test 'bad':\nno closing quotation"
        );
    }

    #[tokio::test]
    async fn empty_command_fails_without_running() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("empty", "true", ResponseType::Text);
        test.test.command = "   ".to_string();

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert!(result.reason.contains("empty command"));
    }

    #[tokio::test]
    async fn text_body_and_status_match_passes() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("hello", r#"printf "hello\n200""#, ResponseType::Text);
        test.test.response.body = Some("hello".to_string());

        let result = executor.execute(&test).await.unwrap();
        assert!(result.success, "unexpected failure: {}", result.reason);
        assert_eq!(result.reason, "Test 'hello' Passed");
    }

    #[tokio::test]
    async fn status_mismatch_names_both_codes() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("status", r#"printf "nope\n500""#, ResponseType::Text);
        test.test.response.status = 200;
        test.test.response.body = Some("nope".to_string());

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.reason,
            "Test 'status' failed: Expected status 200, got 500"
        );
    }

    #[tokio::test]
    async fn text_body_mismatch_reports_expected_and_actual() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("greet", r#"printf "goodbye\n200""#, ResponseType::Text);
        test.test.response.body = Some("hello".to_string());

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.reason,
            "Test 'greet' failed: Expected body hello, got goodbye"
        );
    }

    #[tokio::test]
    async fn json_comparison_is_structural() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case(
            "json",
            r#"printf "{\"b\": 2, \"a\": 1}\n200""#,
            ResponseType::Json,
        );
        test.test.response.json = Some(serde_json::json!({"a": 1, "b": 2}));

        let result = executor.execute(&test).await.unwrap();
        assert!(result.success, "unexpected failure: {}", result.reason);
    }

    #[tokio::test]
    async fn invalid_json_body_is_named() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("badjson", r#"printf "not json\n200""#, ResponseType::Json);
        test.test.response.json = Some(serde_json::json!({}));

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.reason,
            "Test 'badjson' failed: Response body is not valid JSON"
        );
    }

    #[tokio::test]
    async fn json_mismatch_reports_expected_and_actual() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("diff", r#"printf "{\"a\": 2}\n200""#, ResponseType::Json);
        test.test.response.json = Some(serde_json::json!({"a": 1}));

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.reason,
            "Test 'diff' failed: Expected body {\"a\":1}, got {\"a\":2}"
        );
    }

    #[tokio::test]
    async fn missing_expected_json_is_a_verdict_not_a_crash() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let test = shell_case("nojson", r#"printf "{}\n200""#, ResponseType::Json);

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.reason,
            "Test 'nojson' failed: Test declares a json response but no expected json"
        );
    }

    #[tokio::test]
    async fn missing_expected_text_body_is_a_verdict() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let test = shell_case("nobody", r#"printf "x\n200""#, ResponseType::Text);

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.reason,
            "Test 'nobody' failed: Test declares a text response but no expected body"
        );
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let test = shell_case("boom", "echo kaput >&2; exit 3", ResponseType::Text);

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert!(result.reason.starts_with("Error executing test 'boom':"));
        assert!(result.reason.contains("kaput"));
    }

    #[tokio::test]
    async fn missing_status_trailer_is_reported() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let test = shell_case("notrailer", "printf nothing-numeric", ResponseType::Text);

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.reason,
            "Test 'notrailer' failed: Response did not include a status code"
        );
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let executor = CurlExecutor::new(Duration::from_millis(100));
        let test = shell_case("slow", "sleep 5", ResponseType::Text);

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert!(result.reason.contains("timed out"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_verdict() {
        let executor = CurlExecutor::new(Duration::from_secs(5));
        let mut test = shell_case("nobin", "true", ResponseType::Text);
        test.test.command = "definitely-not-a-real-binary-xyz http://x/".to_string();

        let result = executor.execute(&test).await.unwrap();
        assert!(!result.success);
        assert!(result.reason.starts_with("Error executing test 'nobin':"));
    }
}
