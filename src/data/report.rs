use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One pipeline stage as reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub step: usize,
    pub name: String,
    pub status: StepStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ordered step log of a single request.
///
/// Steps are only ever appended, and only the most recent step can change
/// status. Once that step is `Failed` or `Completed` it is frozen.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct VerificationReport {
    steps: Vec<Step>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new in-progress step and returns its ordinal.
    pub fn begin(&mut self, name: &str, message: impl Into<String>) -> usize {
        let ordinal = self.steps.len() + 1;
        self.steps.push(Step {
            step: ordinal,
            name: name.to_string(),
            status: StepStatus::InProgress,
            message: message.into(),
            result: None,
            error: None,
        });
        ordinal
    }

    pub fn note(&mut self, suffix: &str) {
        if let Some(step) = self.open_step() {
            step.message.push_str(suffix);
        }
    }

    pub fn complete(&mut self, result: Value) {
        if let Some(step) = self.open_step() {
            step.status = StepStatus::Completed;
            step.result = Some(result);
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if let Some(step) = self.open_step() {
            step.status = StepStatus::Failed;
            step.error = Some(error.into());
        }
    }

    /// Appends the steps of a sub-report, renumbering them to follow ours.
    pub fn absorb(&mut self, other: VerificationReport) {
        for mut step in other.steps {
            step.step = self.steps.len() + 1;
            self.steps.push(step);
        }
    }

    /// True when no step failed and nothing is left in progress.
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    pub fn has_failure(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    fn open_step(&mut self) -> Option<&mut Step> {
        self.steps
            .last_mut()
            .filter(|s| matches!(s.status, StepStatus::Pending | StepStatus::InProgress))
    }
}
