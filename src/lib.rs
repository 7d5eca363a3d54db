//! Testit grader - autograder harness for student-authored HTTP test suites.
//!
//! Students submit declarative curl test cases alongside their server
//! implementation. The harness vets the tests against an instructor
//! sample solution, shares the admissible ones through a central grading
//! service, runs the merged set the service hands back against the
//! submission, and writes the platform feedback report.

pub mod config;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod service;
pub mod suite;
pub mod testcase;

pub use config::{AssignmentConfig, Settings};
pub use error::{Error, Result};
pub use executor::{split_command, split_status_trailer, CurlExecutor, TestExecutor, TestResult};
pub use metadata::{sanitize_title, SubmissionMetadata, SETUP_STUDENT_ID};
pub use pipeline::Grader;
pub use report::{FeedbackEntry, FeedbackStatus, ResultsRecord};
pub use server::{NodeServerHandle, NodeServerLauncher, RunningServer, ServerLifecycle};
pub use service::{
    GradingService, RejectedTest, ReportedResult, TestitClient, UploadOutcome, UploadResponse,
};
pub use suite::{run_suite, ExecutedTest, RunSummary};
pub use testcase::{load_tests, CommandSpec, ExpectedResponse, ResponseType, TestCase, CURL_TEST};
