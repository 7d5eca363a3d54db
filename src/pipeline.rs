//! Grading pipeline.
//!
//! Grading mode runs the student's tests against the instructor sample,
//! uploads the admissible ones to the grading service, runs the merged
//! set the service hands back against the student submission, reports the
//! outcomes, and writes the feedback report. Every service failure past
//! the sample run degrades to a report that still shows the sample
//! outcomes instead of aborting.
//!
//! Setup mode seeds the service with instructor defaults under a sentinel
//! student id and prints its narrative instead of writing a report.

use std::path::Path;

use uuid::Uuid;

use crate::config::{AssignmentConfig, Settings};
use crate::error::Result;
use crate::executor::TestExecutor;
use crate::metadata::{SubmissionMetadata, SETUP_STUDENT_ID};
use crate::report::{
    rejected_tests_paragraph, render_feedback_text, FeedbackEntry, ResultsRecord,
    ALL_UPLOADED_PARAGRAPH, NO_AVAILABLE_TESTS_PARAGRAPH, NO_DEFAULT_TESTS_PARAGRAPH,
    NO_TESTS_PARAGRAPH, RESULTS_UPLOAD_ERROR_PARAGRAPH, SAMPLE_ALL_PASSED_PARAGRAPH,
    SAMPLE_FAILURES_PARAGRAPH, SERVICE_UNHEALTHY_PARAGRAPH, SETUP_SAMPLE_FAILURES_PARAGRAPH,
    SETUP_SERVICE_UNHEALTHY_PARAGRAPH, SETUP_UPLOAD_ERROR_PARAGRAPH, STUDENT_ALL_PASSED_PARAGRAPH,
    STUDENT_FAILURES_PARAGRAPH, UPLOAD_ERROR_PARAGRAPH,
};
use crate::server::{RunningServer, ServerLifecycle};
use crate::service::{GradingService, ReportedResult};
use crate::suite::{run_suite, RunSummary};
use crate::testcase::{load_tests, TestCase};

/// Orchestrates one grading run end to end.
pub struct Grader<S, L, E> {
    settings: Settings,
    service: S,
    lifecycle: L,
    executor: E,
}

impl<S, L, E> Grader<S, L, E>
where
    S: GradingService,
    L: ServerLifecycle,
    E: TestExecutor,
{
    /// Creates a grader from explicit collaborators.
    pub fn new(settings: Settings, service: S, lifecycle: L, executor: E) -> Self {
        Self {
            settings,
            service,
            lifecycle,
            executor,
        }
    }

    /// Grades the submission and writes the feedback report.
    pub async fn run(&self) -> Result<()> {
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, "starting grading run");

        let assignment_config = AssignmentConfig::load(&self.settings.config_path)?;
        let tests = load_tests(&self.settings.tests_path);

        let mut output = String::new();
        let mut feedback = Vec::new();
        let admissible: Vec<TestCase>;

        if tests.is_empty() {
            output.push_str(NO_TESTS_PARAGRAPH);
            admissible = Vec::new();
        } else {
            tracing::info!(count = tests.len(), "running tests against sample solution");
            let sample_summary = self
                .run_against(&self.settings.sample_server_dir, false, &tests)
                .await?;
            feedback.extend(
                sample_summary
                    .results
                    .iter()
                    .map(FeedbackEntry::from_sample_run),
            );
            admissible = sample_summary.passing_tests();
            if sample_summary.all_passed() {
                output.push_str(SAMPLE_ALL_PASSED_PARAGRAPH);
            } else {
                output.push_str(SAMPLE_FAILURES_PARAGRAPH);
            }
        }

        if !self.service.health_check().await {
            return self.write_degraded(SERVICE_UNHEALTHY_PARAGRAPH, &output, feedback);
        }

        let metadata = SubmissionMetadata::load(&self.settings.metadata_path)?;
        let student_id = metadata.student_id()?;
        let assignment = metadata.assignment_slug();

        let outcome = match self
            .service
            .upload_tests(
                &assignment,
                student_id,
                &admissible,
                assignment_config.num_public_tests_for_access,
            )
            .await
        {
            Ok(outcome) if outcome.accepted() => outcome,
            Ok(outcome) => {
                tracing::warn!(status = outcome.status, "test upload rejected");
                return self.write_degraded(UPLOAD_ERROR_PARAGRAPH, &output, feedback);
            }
            Err(e) => {
                tracing::warn!(error = %e, "test upload failed");
                return self.write_degraded(UPLOAD_ERROR_PARAGRAPH, &output, feedback);
            }
        };

        if !outcome.response.failed_to_add.is_empty() {
            output.push_str(&rejected_tests_paragraph(&outcome.response.failed_to_add));
        } else if !admissible.is_empty() {
            output.push_str(ALL_UPLOADED_PARAGRAPH);
        }
        let merged = outcome.response.tests;

        tracing::info!(count = merged.len(), "running merged set against submission");
        let student_summary = self
            .run_against(&self.settings.submission_dir, true, &merged)
            .await?;
        feedback.extend(
            student_summary
                .results
                .iter()
                .map(FeedbackEntry::from_executed),
        );

        if !student_summary.all_passed() {
            output.push_str(STUDENT_FAILURES_PARAGRAPH);
        } else if student_summary.total() == 0 {
            output.push_str(NO_AVAILABLE_TESTS_PARAGRAPH);
        } else {
            output.push_str(STUDENT_ALL_PASSED_PARAGRAPH);
        }

        let reported: Vec<ReportedResult> = student_summary
            .results
            .iter()
            .map(|executed| ReportedResult {
                name: executed.test.name.clone(),
                passed: executed.result.success,
            })
            .collect();
        match self
            .service
            .upload_results(&assignment, student_id, &reported)
            .await
        {
            Ok(200) => {}
            Ok(status) => {
                tracing::warn!(status, "results upload rejected");
                output.push_str(RESULTS_UPLOAD_ERROR_PARAGRAPH);
            }
            Err(e) => {
                tracing::warn!(error = %e, "results upload failed");
                output.push_str(RESULTS_UPLOAD_ERROR_PARAGRAPH);
            }
        }

        ResultsRecord::new(output, feedback).write(&self.settings.results_path)
    }

    /// Seeds instructor default tests under the sentinel student id.
    /// Returns the console narrative for the caller to print.
    pub async fn run_setup(&self) -> Result<String> {
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, "starting setup run");

        let assignment_config = AssignmentConfig::load(&self.settings.config_path)?;
        let tests = load_tests(&self.settings.default_tests_path);

        let mut output = String::new();
        let mut feedback = Vec::new();
        let admissible: Vec<TestCase>;

        if tests.is_empty() {
            output.push_str(NO_DEFAULT_TESTS_PARAGRAPH);
            admissible = Vec::new();
        } else {
            tracing::info!(count = tests.len(), "running default tests against sample solution");
            let sample_summary = self
                .run_against(&self.settings.sample_server_dir, false, &tests)
                .await?;
            feedback.extend(
                sample_summary
                    .results
                    .iter()
                    .map(FeedbackEntry::from_sample_run),
            );
            admissible = sample_summary.passing_tests();
            if sample_summary.all_passed() {
                output.push_str(SAMPLE_ALL_PASSED_PARAGRAPH);
            } else {
                output.push_str(SETUP_SAMPLE_FAILURES_PARAGRAPH);
            }
        }

        let rendered = render_feedback_text(&feedback);

        if !self.service.health_check().await {
            return Ok(format!(
                "{}{}\n{}",
                SETUP_SERVICE_UNHEALTHY_PARAGRAPH, output, rendered
            ));
        }

        let metadata = SubmissionMetadata::load(&self.settings.metadata_path)?;
        let assignment = metadata.assignment_slug();

        match self
            .service
            .upload_tests(
                &assignment,
                SETUP_STUDENT_ID,
                &admissible,
                assignment_config.num_public_tests_for_access,
            )
            .await
        {
            Ok(outcome) if outcome.accepted() => {
                if !outcome.response.failed_to_add.is_empty() {
                    output.push_str(&rejected_tests_paragraph(&outcome.response.failed_to_add));
                } else if !admissible.is_empty() {
                    output.push_str(ALL_UPLOADED_PARAGRAPH);
                }
            }
            Ok(outcome) => {
                tracing::warn!(status = outcome.status, "default test upload rejected");
                return Ok(format!(
                    "{}{}\n{}",
                    SETUP_UPLOAD_ERROR_PARAGRAPH, output, rendered
                ));
            }
            Err(e) => {
                tracing::warn!(error = %e, "default test upload failed");
                return Ok(format!(
                    "{}{}\n{}",
                    SETUP_UPLOAD_ERROR_PARAGRAPH, output, rendered
                ));
            }
        }

        Ok(output)
    }

    /// Launches the server in `dir`, runs the tests against it, and stops
    /// the server before reporting either outcome.
    async fn run_against(
        &self,
        dir: &Path,
        install_deps: bool,
        tests: &[TestCase],
    ) -> Result<RunSummary> {
        let mut server = self.lifecycle.launch(dir, install_deps).await?;
        let summary = run_suite(&self.executor, tests).await;
        let stop_result = server.stop().await;
        let summary = summary?;
        stop_result?;
        Ok(summary)
    }

    fn write_degraded(
        &self,
        paragraph: &str,
        narrative: &str,
        feedback: Vec<FeedbackEntry>,
    ) -> Result<()> {
        ResultsRecord::new(format!("{}{}", paragraph, narrative), feedback)
            .write(&self.settings.results_path)
    }
}
