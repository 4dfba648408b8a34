//! Narrow, pattern-keyed rewrites of a generated artifact.
//!
//! Rules are tried in list order and every enabled rule whose trigger
//! matches the diagnostic text rewrites the artifact in the same pass.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::error::ToolchainFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compile,
    Test,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Compile => "compile",
            Phase::Test => "test",
        }
    }

    /// Name of the report step recording this phase.
    pub fn step_name(self) -> &'static str {
        match self {
            Phase::Compile => "compile_validation",
            Phase::Test => "test_execution",
        }
    }
}

#[derive(Clone)]
pub struct RepairRule {
    pub name: &'static str,
    pub enabled: bool,
    trigger: fn(&str) -> bool,
    rewrite: fn(&str) -> String,
}

impl RepairRule {
    pub fn new(name: &'static str, trigger: fn(&str) -> bool, rewrite: fn(&str) -> String) -> Self {
        Self {
            name,
            enabled: true,
            trigger,
            rewrite,
        }
    }

    pub fn matches(&self, diagnostic: &str) -> bool {
        self.enabled && (self.trigger)(diagnostic)
    }
}

impl std::fmt::Debug for RepairRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairRule")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Stubbed `Unit` answers where a numeric result is expected.
fn unit_for_long(diagnostic: &str) -> bool {
    diagnostic.contains("Unit but Long")
}

fn rewrite_unit_returns(artifact: &str) -> String {
    artifact.replace("returns Unit", "returns 1L")
}

/// `"Y"`/`"N"` flag literals where a `Boolean` is expected.
fn string_for_boolean(diagnostic: &str) -> bool {
    diagnostic.contains("String but Boolean")
}

fn rewrite_flag_literals(artifact: &str) -> String {
    artifact.replace("\"Y\"", "true").replace("\"N\"", "false")
}

#[derive(Debug, Clone)]
pub struct RepairClassifier {
    compile_rules: Vec<RepairRule>,
    test_rules: Vec<RepairRule>,
}

impl Default for RepairClassifier {
    fn default() -> Self {
        Self {
            compile_rules: vec![
                RepairRule::new("unit_for_long", unit_for_long, rewrite_unit_returns),
                RepairRule::new("string_for_boolean", string_for_boolean, rewrite_flag_literals),
            ],
            // Test failures are detected but never repaired.
            test_rules: Vec::new(),
        }
    }
}

impl RepairClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self, phase: Phase) -> &[RepairRule] {
        match phase {
            Phase::Compile => &self.compile_rules,
            Phase::Test => &self.test_rules,
        }
    }

    /// Enables or disables a rule by name. Returns false if no rule has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let mut found = false;
        for rule in self
            .compile_rules
            .iter_mut()
            .chain(self.test_rules.iter_mut())
            .filter(|r| r.name == name)
        {
            rule.enabled = enabled;
            found = true;
        }
        found
    }

    /// One rewrite pass over `artifact`. `None` when no rule applies.
    pub fn rewrite(&self, phase: Phase, diagnostic: &str, artifact: &str) -> Option<String> {
        let mut applied = false;
        let mut text = artifact.to_string();
        for rule in self.rules(phase).iter().filter(|r| r.matches(diagnostic)) {
            debug!(rule = rule.name, phase = phase.label(), "Applying repair rule");
            text = (rule.rewrite)(&text);
            applied = true;
        }
        applied.then_some(text)
    }

    /// Rewrites the artifact file in place. Returns true iff a rule applied.
    pub async fn repair(&self, phase: Phase, artifact_path: &Path, failure: &ToolchainFailure) -> Result<bool> {
        let diagnostic = failure.diagnostic_text();
        if !self.rules(phase).iter().any(|r| r.matches(&diagnostic)) {
            return Ok(false);
        }

        let artifact = tokio::fs::read_to_string(artifact_path)
            .await
            .with_context(|| format!("Failed to read artifact {}", artifact_path.display()))?;
        let Some(rewritten) = self.rewrite(phase, &diagnostic, &artifact) else {
            return Ok(false);
        };
        tokio::fs::write(artifact_path, rewritten)
            .await
            .with_context(|| format!("Failed to write artifact {}", artifact_path.display()))?;

        info!(path = %artifact_path.display(), phase = phase.label(), "Applied automatic repair");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = "every { repo.count() } returns Unit\nevery { repo.flag() } returns \"Y\"\n";

    #[test]
    fn unit_for_long_rewrites_only_unit_returns() {
        let classifier = RepairClassifier::new();
        let out = classifier
            .rewrite(Phase::Compile, "e: type mismatch: inferred type is Unit but Long was expected", ARTIFACT)
            .unwrap();
        assert!(out.contains("returns 1L"));
        assert!(out.contains("returns \"Y\""));
    }

    #[test]
    fn both_rules_may_fire_in_one_pass() {
        let classifier = RepairClassifier::new();
        let diagnostic = "Unit but Long was expected\nString but Boolean was expected";
        let out = classifier.rewrite(Phase::Compile, diagnostic, ARTIFACT).unwrap();
        assert_eq!(out, "every { repo.count() } returns 1L\nevery { repo.flag() } returns true\n");
    }

    #[test]
    fn unknown_diagnostic_has_no_repair() {
        let classifier = RepairClassifier::new();
        assert!(classifier
            .rewrite(Phase::Compile, "unresolved reference: foo", ARTIFACT)
            .is_none());
    }

    #[test]
    fn test_phase_never_repairs() {
        let classifier = RepairClassifier::new();
        assert!(classifier.rules(Phase::Test).is_empty());
        assert!(classifier
            .rewrite(Phase::Test, "Unit but Long", ARTIFACT)
            .is_none());
    }

    #[test]
    fn disabled_rule_does_not_fire() {
        let mut classifier = RepairClassifier::new();
        assert!(classifier.set_enabled("unit_for_long", false));
        assert!(!classifier.set_enabled("no_such_rule", false));
        assert!(classifier
            .rewrite(Phase::Compile, "Unit but Long", ARTIFACT)
            .is_none());
    }

    #[tokio::test]
    async fn scenario_c_repair_overwrites_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FooServiceTest.kt");
        std::fs::write(&path, ARTIFACT).unwrap();

        let failure = ToolchainFailure::Diagnostics {
            output: "error: type mismatch: inferred type is Unit but Long was expected".to_string(),
        };
        let applied = RepairClassifier::new()
            .repair(Phase::Compile, &path, &failure)
            .await
            .unwrap();

        assert!(applied);
        assert!(std::fs::read_to_string(&path).unwrap().contains("returns 1L"));
    }

    #[tokio::test]
    async fn scenario_d_failed_tests_are_unrepairable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FooServiceTest.kt");
        std::fs::write(&path, ARTIFACT).unwrap();

        let failure = ToolchainFailure::TestsFailed {
            failed: 2,
            output: "3 passed, 2 failed".to_string(),
        };
        let applied = RepairClassifier::new()
            .repair(Phase::Test, &path, &failure)
            .await
            .unwrap();

        assert!(!applied);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ARTIFACT);
    }
}
