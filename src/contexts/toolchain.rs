use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

use crate::error::ToolchainFailure;

/// Marker the build tool prints for a compiler error, even on a zero exit.
pub const ERROR_MARKER: &str = "error:";

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub status_success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestCounts {
    pub passed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub report_path: String,
}

/// External build and test runner, keyed by a target path relative to the
/// project root.
///
/// Calls are awaited to completion; one implementation never runs two
/// invocations concurrently for the same phase.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Compiles the test sources of the module owning `target`.
    async fn compile(&self, project_root: &Path, target: &str) -> Result<ToolOutput, ToolchainFailure>;

    /// Runs the test class named after `target`'s file stem.
    async fn run(&self, project_root: &Path, target: &str) -> Result<TestCounts, ToolchainFailure>;

    async fn coverage(&self, project_root: &Path, target: &str) -> Result<CoverageReport, ToolchainFailure>;
}

fn passed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+) passed").expect("valid regex"))
}

fn failed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+) failed").expect("valid regex"))
}

fn first_count(re: &Regex, text: &str) -> u32 {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Pass/fail counts from the runner's stdout; 0 when a count is absent.
pub fn parse_test_counts(stdout: &str) -> TestCounts {
    TestCounts {
        passed: first_count(passed_re(), stdout),
        failed: first_count(failed_re(), stdout),
    }
}

/// Classifies a finished compile invocation. Diagnostic text wins over the
/// exit status.
pub fn interpret_compile(command: &str, output: ToolOutput) -> Result<ToolOutput, ToolchainFailure> {
    if output.stderr.contains(ERROR_MARKER) || output.stdout.contains(ERROR_MARKER) {
        return Err(ToolchainFailure::Diagnostics {
            output: output.combined(),
        });
    }
    if !output.status_success {
        return Err(ToolchainFailure::NonZeroExit {
            command: command.to_string(),
            status: "failure".to_string(),
            output: output.combined(),
        });
    }
    Ok(output)
}

/// Classifies a finished test invocation. Any failed test is a failure.
pub fn interpret_test_run(command: &str, output: ToolOutput) -> Result<TestCounts, ToolchainFailure> {
    let counts = parse_test_counts(&output.stdout);
    if counts.failed > 0 {
        return Err(ToolchainFailure::TestsFailed {
            failed: counts.failed,
            output: output.combined(),
        });
    }
    if !output.status_success {
        return Err(ToolchainFailure::NonZeroExit {
            command: command.to_string(),
            status: "failure".to_string(),
            output: output.combined(),
        });
    }
    Ok(counts)
}
