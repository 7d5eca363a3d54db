//! Feedback report assembly.
//!
//! The platform reads a single results.json: a narrative `output` string,
//! a `tests` array of per-test feedback entries, and an optional overall
//! `score`. The narrative paragraphs live here so every run assembles its
//! story from the same wording.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::service::RejectedTest;
use crate::suite::ExecutedTest;

/// Prefix marking feedback entries that came from the sample run.
pub const SAMPLE_PREFIX: &str = "SAMPLE SOLUTION RESULT: ";

/// Sample run had failures; only passing tests are uploaded.
pub const SAMPLE_FAILURES_PARAGRAPH: &str = "Some test cases did not pass sample implementation. If you believe any of these to be a mistake, please contact the assignment administrators. Only test cases that pass this sample may be uploaded. You can find the outcomes of running your tests on THE SAMPLE SOLUTION below.\n";

/// Sample run passed everything.
pub const SAMPLE_ALL_PASSED_PARAGRAPH: &str =
    "All uploaded tests passed the sample implementation!\n";

/// The submission contained no tests.
pub const NO_TESTS_PARAGRAPH: &str = "No tests were uploaded. You must have submitted at least one working test at some point to be able to run other students' tests.\n";

/// Grading service failed its health check.
pub const SERVICE_UNHEALTHY_PARAGRAPH: &str = "Server is not running or not healthy. Please contact the assignment administrators. In the meantime, here are the outcomes of running your tests on THE SAMPLE SOLUTION.\n";

/// Test upload was not accepted.
pub const UPLOAD_ERROR_PARAGRAPH: &str = "Error uploading tests to the database. Please contact the assignment administrators. In the meantime, here are the outcomes of running your tests on THE SAMPLE SOLUTION.\n";

/// Upload was accepted and nothing was rejected.
pub const ALL_UPLOADED_PARAGRAPH: &str = "All tests successfully uploaded to the database!\n";

/// The submission failed some of the merged test set.
pub const STUDENT_FAILURES_PARAGRAPH: &str =
    "\nNot all available test cases passed your implementation. Please see the following breakdown.\n";

/// The merged test set was empty.
pub const NO_AVAILABLE_TESTS_PARAGRAPH: &str = "\nNo available tests to run on your implementation. You must have submitted at least one working test at some point to be able to run other students' tests.\n";

/// The submission passed the whole merged test set.
pub const STUDENT_ALL_PASSED_PARAGRAPH: &str =
    "\nAll available test cases passed your implementation!\n";

/// Results upload failed; scores shown here are still valid.
pub const RESULTS_UPLOAD_ERROR_PARAGRAPH: &str = "\nError uploading results to the database. Please contact the assignment administrators. You can still see the results of the test cases below, but the updated statistics have not been uploaded.\n";

/// Setup-run variant of [`SAMPLE_FAILURES_PARAGRAPH`].
pub const SETUP_SAMPLE_FAILURES_PARAGRAPH: &str = "Some test cases did not pass sample implementation. Only test cases that pass this sample may be uploaded. You can find the outcomes of running your tests on THE SAMPLE SOLUTION below.\n";

/// Setup run found no default test suite.
pub const NO_DEFAULT_TESTS_PARAGRAPH: &str = "No default tests were uploaded.\n";

/// Setup-run variant of [`SERVICE_UNHEALTHY_PARAGRAPH`].
pub const SETUP_SERVICE_UNHEALTHY_PARAGRAPH: &str = "Server is not running or not healthy. Please contact the database administrators. In the meantime, here are the outcomes of running your tests on THE SAMPLE SOLUTION.\n";

/// Setup-run variant of [`UPLOAD_ERROR_PARAGRAPH`].
pub const SETUP_UPLOAD_ERROR_PARAGRAPH: &str = "Error uploading tests to the database. Please contact the database administrators. In the meantime, here are the outcomes of running your tests on THE SAMPLE SOLUTION.\n";

/// Paragraph listing tests the service rejected, with its reasons quoted
/// verbatim.
pub fn rejected_tests_paragraph(rejected: &[RejectedTest]) -> String {
    let mut paragraph = String::from(
        "Failed to upload all tests to the database. Make sure test names are unique if you want them to be counted separately! Please see the following reasons:\n\n",
    );
    for rejection in rejected {
        paragraph.push_str(&format!("{}: \t{}\n", rejection.name, rejection.reason));
    }
    paragraph.push('\n');
    paragraph
}

/// Verdict label on a feedback entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Passed,
    Failed,
}

impl FeedbackStatus {
    /// Returns the string value used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Passed => "passed",
            FeedbackStatus::Failed => "failed",
        }
    }
}

/// One per-test entry in the feedback report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Display name; sample-run entries carry [`SAMPLE_PREFIX`].
    pub name: String,
    /// Verdict label.
    pub status: FeedbackStatus,
    /// Per-test score. Always zero: passing grants service access, not
    /// points.
    pub score: u32,
    /// Description (when the author wrote one) followed by the verdict
    /// reason.
    pub output: String,
    /// Platform visibility; every entry is shown to the student.
    pub visibility: String,
}

impl FeedbackEntry {
    /// Builds the entry for one executed test.
    pub fn from_executed(executed: &ExecutedTest) -> Self {
        Self::with_name(executed.test.name.clone(), executed)
    }

    /// Builds the entry for a sample-run test, prefixed so students can
    /// tell the two phases apart.
    pub fn from_sample_run(executed: &ExecutedTest) -> Self {
        Self::with_name(
            format!("{}{}", SAMPLE_PREFIX, executed.test.name),
            executed,
        )
    }

    fn with_name(name: String, executed: &ExecutedTest) -> Self {
        let output = match &executed.test.description {
            Some(description) if !description.is_empty() => {
                format!("Description: {}\n\n{}", description, executed.result.reason)
            }
            _ => executed.result.reason.clone(),
        };
        Self {
            name,
            status: if executed.result.success {
                FeedbackStatus::Passed
            } else {
                FeedbackStatus::Failed
            },
            score: 0,
            output,
            visibility: "visible".to_string(),
        }
    }
}

/// The complete feedback report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsRecord {
    /// Narrative assembled from the paragraphs above.
    pub output: String,
    /// Per-test feedback entries.
    pub tests: Vec<FeedbackEntry>,
    /// Overall score. Present (and zero) only when there are no entries,
    /// so the platform records a grade instead of an empty report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

impl ResultsRecord {
    /// Builds a record, forcing a zero score when there is no feedback.
    pub fn new(output: String, tests: Vec<FeedbackEntry>) -> Self {
        let score = if tests.is_empty() { Some(0) } else { None };
        Self {
            output,
            tests,
            score,
        }
    }

    /// Writes the report as JSON, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(self).map_err(std::io::Error::from)?;
        fs::write(path, contents)?;
        tracing::info!(path = %path.display(), tests = self.tests.len(), "wrote feedback report");
        Ok(())
    }
}

/// Renders feedback entries as plain text for the setup run, which prints
/// to the console instead of writing results.json.
pub fn render_feedback_text(entries: &[FeedbackEntry]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&format!(
            "{}: {}\n{}\n\n",
            entry.name,
            entry.status.as_str(),
            entry.output
        ));
    }
    text
}
