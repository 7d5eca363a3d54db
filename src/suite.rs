//! Sequential execution of a test suite.
//!
//! Tests run one at a time in authored order, so suites may rely on
//! earlier tests mutating server state.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::executor::{TestExecutor, TestResult};
use crate::testcase::TestCase;

/// One executed test with its verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedTest {
    /// The test as it was run.
    pub test: TestCase,
    /// The verdict.
    pub result: TestResult,
}

/// Outcome of running a whole suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of passing tests.
    pub passed: usize,
    /// Number of failing tests.
    pub failed: usize,
    /// Per-test outcomes in execution order.
    pub results: Vec<ExecutedTest>,
}

impl RunSummary {
    /// Total number of executed tests.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// True when every executed test passed (vacuously true when empty).
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// The tests that passed, in execution order.
    pub fn passing_tests(&self) -> Vec<TestCase> {
        self.results
            .iter()
            .filter(|executed| executed.result.success)
            .map(|executed| executed.test.clone())
            .collect()
    }

    fn record(&mut self, test: TestCase, result: TestResult) {
        if result.success {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(ExecutedTest { test, result });
    }
}

/// Runs every test in order against whatever server is currently up.
pub async fn run_suite<E: TestExecutor>(executor: &E, tests: &[TestCase]) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    for test in tests {
        let result = executor.execute(test).await?;
        tracing::info!(name = %test.name, success = result.success, "test finished");
        summary.record(test.clone(), result);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcase::{CommandSpec, ExpectedResponse, ResponseType, CURL_TEST};
    use async_trait::async_trait;
    use std::collections::HashSet;

    fn case(name: &str) -> TestCase {
        TestCase {
            name: name.to_string(),
            description: None,
            kind: CURL_TEST.to_string(),
            test: CommandSpec {
                command: "curl http://localhost:8000/".to_string(),
                response_type: ResponseType::Text,
                response: ExpectedResponse {
                    status: 200,
                    body: Some("ok".to_string()),
                    json: None,
                },
            },
            public: None,
        }
    }

    struct ScriptedExecutor {
        failing: HashSet<String>,
    }

    impl ScriptedExecutor {
        fn failing(names: &[&str]) -> Self {
            Self {
                failing: names.iter().map(|n| n.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl TestExecutor for ScriptedExecutor {
        async fn execute(&self, test: &TestCase) -> Result<TestResult> {
            if self.failing.contains(&test.name) {
                Ok(TestResult::failed(format!(
                    "Test '{}' failed: scripted failure",
                    test.name
                )))
            } else {
                Ok(TestResult::passed(&test.name))
            }
        }
    }

    #[tokio::test]
    async fn counts_passes_and_failures() {
        let executor = ScriptedExecutor::failing(&["b"]);
        let tests = vec![case("a"), case("b"), case("c")];

        let summary = run_suite(&executor, &tests).await.unwrap();
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_passed());
    }

    #[tokio::test]
    async fn preserves_execution_order() {
        let executor = ScriptedExecutor::failing(&[]);
        let tests = vec![case("first"), case("second"), case("third")];

        let summary = run_suite(&executor, &tests).await.unwrap();
        let names: Vec<_> = summary
            .results
            .iter()
            .map(|executed| executed.test.name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn passing_tests_keeps_only_successes() {
        let executor = ScriptedExecutor::failing(&["drop me"]);
        let tests = vec![case("keep"), case("drop me"), case("keep too")];

        let summary = run_suite(&executor, &tests).await.unwrap();
        let kept: Vec<_> = summary
            .passing_tests()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(kept, vec!["keep", "keep too"]);
    }

    #[tokio::test]
    async fn empty_suite_passes_vacuously() {
        let executor = ScriptedExecutor::failing(&[]);

        let summary = run_suite(&executor, &[]).await.unwrap();
        assert_eq!(summary.total(), 0);
        assert!(summary.all_passed());
        assert!(summary.passing_tests().is_empty());
    }
}
