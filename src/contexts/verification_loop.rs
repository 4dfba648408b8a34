//! Bounded compile-then-test verification with automatic repair.
//!
//! Each phase runs `attempting -> succeeded | retrying | exhausted`. A phase
//! never makes more than `max_retries` toolchain attempts, and a failure with
//! no applicable repair exhausts the phase immediately.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::data::VerificationReport;
use crate::error::ToolchainFailure;

use super::project_paths::test_class_name;
use super::repair_classifier::{Phase, RepairClassifier};
use super::toolchain::{TestCounts, Toolchain};

/// Retry bookkeeping for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_retries: u32,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            max_retries: max_retries.max(1),
        }
    }

    pub fn is_last_attempt(&self) -> bool {
        self.attempt + 1 >= self.max_retries
    }

    fn advance(&mut self) {
        self.attempt += 1;
    }
}

#[derive(Debug)]
pub enum PhaseOutcome {
    Succeeded { retries: u32, counts: Option<TestCounts> },
    Exhausted { retries: u32, failure: ToolchainFailure },
}

/// Writes each failed attempt's diagnostics under
/// `<root>/.testsmith/validation/<ts>/<TestClass>/<phase>_attempt_<n>/`.
#[derive(Debug, Clone)]
pub struct AttemptRecorder {
    session_dir: PathBuf,
}

impl AttemptRecorder {
    pub fn new(project_root: &Path, target: &str) -> Self {
        let ts = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        Self {
            session_dir: project_root
                .join(".testsmith")
                .join("validation")
                .join(ts)
                .join(test_class_name(target)),
        }
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    fn record(&self, phase: Phase, attempt: u32, failure: &ToolchainFailure) {
        let dir = self
            .session_dir
            .join(format!("{}_attempt_{}", phase.label(), attempt + 1));
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "Failed to create attempt directory");
            return;
        }
        std::fs::write(dir.join("diagnostics.txt"), failure.diagnostic_text()).ok();
    }
}

pub struct VerificationLoop<'a> {
    toolchain: &'a dyn Toolchain,
    classifier: &'a RepairClassifier,
    record_attempts: bool,
}

impl<'a> VerificationLoop<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, classifier: &'a RepairClassifier) -> Self {
        Self {
            toolchain,
            classifier,
            record_attempts: false,
        }
    }

    pub fn record_attempts(mut self, enabled: bool) -> Self {
        self.record_attempts = enabled;
        self
    }

    /// Verifies the artifact at `target` (relative to `project_root`).
    ///
    /// Appends one step per phase entered. The test phase is skipped when
    /// compilation is exhausted.
    pub async fn verify(&self, project_root: &Path, target: &str, max_retries: u32) -> VerificationReport {
        let recorder = self
            .record_attempts
            .then(|| AttemptRecorder::new(project_root, target));
        let mut report = VerificationReport::new();

        for phase in [Phase::Compile, Phase::Test] {
            report.begin(
                phase.step_name(),
                match phase {
                    Phase::Compile => format!("Validating compilation (max {} attempts)", max_retries),
                    Phase::Test => format!("Running tests (max {} attempts)", max_retries),
                },
            );

            match self
                .run_phase(phase, project_root, target, max_retries, recorder.as_ref())
                .await
            {
                PhaseOutcome::Succeeded { retries, counts } => {
                    let result = match counts {
                        Some(counts) => json!({
                            "retries": retries,
                            "passed_tests": counts.passed,
                            "failed_tests": counts.failed,
                        }),
                        None => json!({
                            "retries": retries,
                            "message": "Compilation successful",
                        }),
                    };
                    report.complete(result);
                }
                PhaseOutcome::Exhausted { retries, failure } => {
                    report.note(&format!(" - failed after {} attempt(s)", retries + 1));
                    report.fail(failure.to_string());
                    break;
                }
            }
        }

        report
    }

    pub async fn run_phase(
        &self,
        phase: Phase,
        project_root: &Path,
        target: &str,
        max_retries: u32,
        recorder: Option<&AttemptRecorder>,
    ) -> PhaseOutcome {
        let artifact_path = project_root.join(target);
        let mut state = RetryState::new(max_retries);

        loop {
            debug!(
                phase = phase.label(),
                attempt = state.attempt + 1,
                max = state.max_retries,
                "Invoking toolchain"
            );
            let failure = match self.attempt(phase, project_root, target).await {
                Ok(counts) => {
                    info!(phase = phase.label(), retries = state.attempt, "Phase succeeded");
                    return PhaseOutcome::Succeeded {
                        retries: state.attempt,
                        counts,
                    };
                }
                Err(failure) => failure,
            };

            warn!(
                phase = phase.label(),
                attempt = state.attempt + 1,
                error = %failure,
                "Attempt failed"
            );
            if let Some(recorder) = recorder {
                recorder.record(phase, state.attempt, &failure);
            }

            if state.is_last_attempt() {
                warn!(phase = phase.label(), "Retry budget exhausted");
                return PhaseOutcome::Exhausted {
                    retries: state.attempt,
                    failure,
                };
            }

            match self.classifier.repair(phase, &artifact_path, &failure).await {
                Ok(true) => state.advance(),
                Ok(false) => {
                    info!(phase = phase.label(), "No automatic repair available");
                    return PhaseOutcome::Exhausted {
                        retries: state.attempt,
                        failure,
                    };
                }
                Err(e) => {
                    warn!(phase = phase.label(), error = %e, "Repair failed");
                    return PhaseOutcome::Exhausted {
                        retries: state.attempt,
                        failure,
                    };
                }
            }
        }
    }

    async fn attempt(
        &self,
        phase: Phase,
        project_root: &Path,
        target: &str,
    ) -> Result<Option<TestCounts>, ToolchainFailure> {
        match phase {
            Phase::Compile => self.toolchain.compile(project_root, target).await.map(|_| None),
            Phase::Test => self.toolchain.run(project_root, target).await.map(Some),
        }
    }
}
