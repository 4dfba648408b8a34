//! Error taxonomy shared by the verification loop and the operation dispatcher.

use thiserror::Error;

/// Failure reported by a toolchain invocation.
///
/// Every variant keeps the raw tool output so the repair classifier can match
/// against the same text the developer would read.
#[derive(Debug, Clone, Error)]
pub enum ToolchainFailure {
    #[error("Compilation failed: {output}")]
    Diagnostics { output: String },

    #[error("Tests failed: {failed} test(s) failed")]
    TestsFailed { failed: u32, output: String },

    #[error("{command} exited with status {status}: {output}")]
    NonZeroExit {
        command: String,
        status: String,
        output: String,
    },

    #[error("Failed to spawn {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("{command} did not finish within {secs}s")]
    Timeout { command: String, secs: u64 },
}

impl ToolchainFailure {
    /// Text the repair rules are matched against. The raw output appears once,
    /// under a one-line header.
    pub fn diagnostic_text(&self) -> String {
        match self {
            ToolchainFailure::Diagnostics { output } => format!("Compilation failed\n{}", output),
            ToolchainFailure::TestsFailed { output, .. } => format!("{}\n{}", self, output),
            ToolchainFailure::NonZeroExit {
                command,
                status,
                output,
            } => format!("{} exited with status {}\n{}", command, status, output),
            ToolchainFailure::Spawn { .. } | ToolchainFailure::Timeout { .. } => self.to_string(),
        }
    }
}

/// Errors rejected before any pipeline stage runs.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownOperation(String),
}

impl OperationError {
    pub fn invalid(operation: &str, reason: impl Into<String>) -> Self {
        OperationError::InvalidArguments {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

/// Renders an error and its cause chain, one cause per line.
pub fn cause_chain(err: &anyhow::Error) -> String {
    err.chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn diagnostic_text_includes_raw_output() {
        let failure = ToolchainFailure::Diagnostics {
            output: "e: type mismatch: inferred type is Unit but Long was expected".to_string(),
        };
        assert!(failure.diagnostic_text().contains("Unit but Long"));
    }

    #[test]
    fn diagnostic_text_carries_output_once() {
        let output = "e: Foo.kt:3:5 error: unresolved reference: bar".to_string();
        let failures = [
            ToolchainFailure::Diagnostics {
                output: output.clone(),
            },
            ToolchainFailure::NonZeroExit {
                command: "./gradlew".to_string(),
                status: "exit status: 1".to_string(),
                output: output.clone(),
            },
            ToolchainFailure::TestsFailed {
                failed: 1,
                output: output.clone(),
            },
        ];
        for failure in failures {
            let text = failure.diagnostic_text();
            assert_eq!(text.matches(output.as_str()).count(), 1, "{}", text);
            assert!(text.lines().count() >= 2);
        }
    }

    #[test]
    fn cause_chain_lists_every_layer() {
        let err = std::fs::read_to_string("/definitely/not/here.kt")
            .context("Failed to read service")
            .unwrap_err();
        let chain = cause_chain(&err);
        assert!(chain.starts_with("Failed to read service\n"));
        assert_eq!(chain.lines().count(), 2);
    }
}
