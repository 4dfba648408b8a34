//! The five remote operations and the per-request pipeline behind them.
//!
//! Every operation returns a report. Failures inside a stage land in that
//! stage's step; anything else is caught at the operation boundary and turned
//! into `success: false` with the error message and its cause chain.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::GenerationConfig;
use crate::data::{
    AnalysisReport, AnalyzeRequest, BatchItem, BatchReport, BatchRequest, CoverageOutcome,
    GenerateRequest, GenerationReport, StandardsRegistry, ValidateRequest, ValidationReport,
    VerificationReport,
};
use crate::error::{cause_chain, OperationError};

use super::batch_progress::BatchProgress;
use super::project_paths::infer_test_path;
use super::repair_classifier::RepairClassifier;
use super::source_extractor::{ModelSource, SourceModelExtractor};
use super::template_synthesizer::{render, TemplateStyle, TestIntent};
use super::toolchain::Toolchain;
use super::verification_loop::VerificationLoop;

pub const ANALYZE_SERVICE: &str = "analyze_service";
pub const GENERATE_UNIT_TEST: &str = "generate_unit_test";
pub const GENERATE_INTEGRATION_TEST: &str = "generate_integration_test";
pub const GENERATE_BATCH_TESTS: &str = "generate_batch_tests";
pub const VALIDATE_TEST: &str = "validate_test";

/// Reports whether a project has a framework entrypoint, which selects the
/// framework-integrated template.
#[async_trait]
pub trait FrameworkDetector: Send + Sync {
    async fn has_framework_entrypoint(&self, project_root: &Path) -> bool;
}

pub struct OperationDispatcher {
    toolchain: Box<dyn Toolchain>,
    detector: Box<dyn FrameworkDetector>,
    standards: Box<dyn StandardsRegistry>,
    extractor: SourceModelExtractor,
    classifier: RepairClassifier,
    record_attempts: bool,
}

impl OperationDispatcher {
    pub fn new(
        toolchain: Box<dyn Toolchain>,
        detector: Box<dyn FrameworkDetector>,
        standards: Box<dyn StandardsRegistry>,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            toolchain,
            detector,
            standards,
            extractor: SourceModelExtractor::new(generation.default_package.clone()),
            classifier: RepairClassifier::new(),
            record_attempts: generation.record_attempts,
        }
    }

    pub fn with_classifier(mut self, classifier: RepairClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Dispatches an operation by name with JSON arguments.
    ///
    /// Only unknown names and undecodable arguments are errors; everything
    /// else is reported inside the returned report.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, OperationError> {
        match name {
            ANALYZE_SERVICE => Ok(to_json(&self.analyze_service(parse(name, arguments)?).await)),
            GENERATE_UNIT_TEST => Ok(to_json(
                &self
                    .generate_test(parse(name, arguments)?, TestIntent::Unit)
                    .await,
            )),
            GENERATE_INTEGRATION_TEST => Ok(to_json(
                &self
                    .generate_test(parse(name, arguments)?, TestIntent::Integration)
                    .await,
            )),
            GENERATE_BATCH_TESTS => Ok(to_json(&self.generate_batch_tests(parse(name, arguments)?).await)),
            VALIDATE_TEST => Ok(to_json(&self.validate_test(parse(name, arguments)?).await)),
            other => Err(OperationError::UnknownOperation(other.to_string())),
        }
    }

    pub async fn analyze_service(&self, req: AnalyzeRequest) -> AnalysisReport {
        let started = Instant::now();
        let span = info_span!("analyze_service", service = %req.service_path);
        let outcome = async {
            require_path(ANALYZE_SERVICE, "project_root", &req.project_root)?;
            require_text(ANALYZE_SERVICE, "service_path", &req.service_path)?;
            let extraction = self
                .extractor
                .extract(&req.project_root, &req.service_path, None)
                .await?;
            info!(
                class = %extraction.model.class_name,
                methods = extraction.model.methods.len(),
                dependencies = extraction.model.dependencies.len(),
                "Analysis complete"
            );
            Ok::<_, anyhow::Error>(extraction.model)
        }
        .instrument(span)
        .await;

        match outcome {
            Ok(model) => AnalysisReport {
                success: true,
                duration_ms: elapsed_ms(started),
                message: format!(
                    "Found {} method(s) and {} dependency(ies) in {}",
                    model.methods.len(),
                    model.dependencies.len(),
                    model.class_name
                ),
                analysis: Some(model.into()),
                error: None,
                stack: None,
            },
            Err(e) => AnalysisReport {
                success: false,
                duration_ms: elapsed_ms(started),
                analysis: None,
                message: "Analysis failed".to_string(),
                error: Some(e.to_string()),
                stack: Some(cause_chain(&e)),
            },
        }
    }

    /// Unit and integration generation share this pipeline; `intent` only
    /// changes the rendered template.
    pub async fn generate_test(&self, req: GenerateRequest, intent: TestIntent) -> GenerationReport {
        let operation = match intent {
            TestIntent::Unit => GENERATE_UNIT_TEST,
            TestIntent::Integration => GENERATE_INTEGRATION_TEST,
        };
        let span = info_span!("generate", operation, service = %req.service_path);
        self.generate_one(operation, &req, intent).instrument(span).await
    }

    async fn generate_one(&self, operation: &str, req: &GenerateRequest, intent: TestIntent) -> GenerationReport {
        let started = Instant::now();
        let test_path = req
            .test_path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| infer_test_path(&req.service_path));
        let mut steps = VerificationReport::new();

        let outcome = self
            .run_generation(operation, req, intent, &test_path, &mut steps)
            .await;

        let (error, stack) = match outcome {
            Ok(()) => (None, None),
            Err(e) => {
                warn!(error = %e, "Generation failed");
                steps.fail(e.to_string());
                (Some(e.to_string()), Some(cause_chain(&e)))
            }
        };

        GenerationReport {
            success: error.is_none() && !steps.has_failure(),
            duration_ms: elapsed_ms(started),
            service_path: req.service_path.clone(),
            test_path,
            steps,
            error,
            stack,
        }
    }

    async fn run_generation(
        &self,
        operation: &str,
        req: &GenerateRequest,
        intent: TestIntent,
        test_path: &str,
        steps: &mut VerificationReport,
    ) -> Result<()> {
        require_path(operation, "project_root", &req.project_root)?;
        require_text(operation, "service_path", &req.service_path)?;
        require_retries(operation, req.max_retries)?;
        self.warm_standards();

        steps.begin(ANALYZE_SERVICE, "Analyzing service structure");
        let extraction = self
            .extractor
            .extract(&req.project_root, &req.service_path, req.serena_analysis.as_ref())
            .await?;
        let source = match extraction.source {
            ModelSource::SymbolTree => "symbol_tree",
            ModelSource::SourcePatterns => "source_patterns",
        };
        let model = extraction.model;
        steps.complete(json!({
            "methods_found": model.methods.len(),
            "dependencies_found": model.dependencies.len(),
            "source": source,
        }));

        steps.begin("generate_test_code", "Generating test code");
        let style = TemplateStyle::for_framework(
            self.detector.has_framework_entrypoint(&req.project_root).await,
        );
        let artifact = render(&model, style, intent);
        let written = write_artifact(&req.project_root, test_path, &artifact).await?;
        info!(
            path = %written.display(),
            cases = model.expected_test_case_count(),
            ?style,
            "Wrote test artifact"
        );
        let fingerprint = hex::encode(Sha256::digest(artifact.as_bytes()));
        steps.complete(json!({
            "test_file": test_path,
            "test_methods_generated": model.expected_test_case_count(),
            "artifact_sha256": fingerprint,
            "framework_integrated": style == TemplateStyle::FrameworkIntegrated,
        }));

        if req.validate {
            let verification = VerificationLoop::new(self.toolchain.as_ref(), &self.classifier)
                .record_attempts(self.record_attempts)
                .verify(&req.project_root, test_path, req.max_retries)
                .await;
            steps.absorb(verification);
        }

        Ok(())
    }

    /// Runs the unit pipeline per service path, strictly in order.
    pub async fn generate_batch_tests(&self, req: BatchRequest) -> BatchReport {
        let started = Instant::now();
        let mut progress = BatchProgress::new(req.service_paths.len());
        let mut items = Vec::with_capacity(req.service_paths.len());

        let precheck = require_path(GENERATE_BATCH_TESTS, "project_root", &req.project_root)
            .and_then(|_| require_retries(GENERATE_BATCH_TESTS, req.max_retries))
            .and_then(|_| {
                if req.service_paths.is_empty() {
                    Err(OperationError::invalid(GENERATE_BATCH_TESTS, "service_paths must not be empty"))
                } else {
                    Ok(())
                }
            });
        if let Err(e) = precheck {
            warn!(error = %e, "Rejected batch request");
            return BatchReport {
                success: false,
                duration_ms: elapsed_ms(started),
                summary: e.to_string(),
                total: req.service_paths.len(),
                succeeded: 0,
                failed: 0,
                items,
            };
        }

        let total = req.service_paths.len();
        for (index, service_path) in req.service_paths.iter().enumerate() {
            progress.start_item(service_path);
            let item_req = GenerateRequest {
                project_root: req.project_root.clone(),
                service_path: service_path.clone(),
                serena_analysis: None,
                test_path: None,
                validate: req.validate,
                max_retries: req.max_retries,
            };
            let span = info_span!("batch_item", item = %format!("{}/{}", index + 1, total), service = %service_path);
            let report = self
                .generate_one(GENERATE_BATCH_TESTS, &item_req, TestIntent::Unit)
                .instrument(span)
                .await;

            let success = report.success;
            progress.complete_item(service_path, success);
            items.push(BatchItem::from(report));

            if !success && !req.continue_on_error {
                warn!(service = %service_path, "Stopping batch after first failure");
                break;
            }
        }

        let summary = progress.finish();
        BatchReport {
            success: progress.failed() == 0 && progress.skipped() == 0,
            duration_ms: elapsed_ms(started),
            summary,
            total,
            succeeded: progress.succeeded(),
            failed: progress.failed(),
            items,
        }
    }

    pub async fn validate_test(&self, req: ValidateRequest) -> ValidationReport {
        let started = Instant::now();
        let span = info_span!("validate_test", test = %req.test_path);
        let outcome = self.run_validation(&req).instrument(span).await;

        match outcome {
            Ok((steps, coverage)) => ValidationReport {
                success: steps.succeeded(),
                duration_ms: elapsed_ms(started),
                test_path: req.test_path,
                steps,
                coverage,
                error: None,
                stack: None,
            },
            Err(e) => ValidationReport {
                success: false,
                duration_ms: elapsed_ms(started),
                test_path: req.test_path,
                steps: VerificationReport::new(),
                coverage: None,
                error: Some(e.to_string()),
                stack: Some(cause_chain(&e)),
            },
        }
    }

    async fn run_validation(&self, req: &ValidateRequest) -> Result<(VerificationReport, Option<CoverageOutcome>)> {
        require_path(VALIDATE_TEST, "project_root", &req.project_root)?;
        require_text(VALIDATE_TEST, "test_path", &req.test_path)?;
        require_retries(VALIDATE_TEST, req.max_retries)?;
        let artifact = req.project_root.join(&req.test_path);
        tokio::fs::metadata(&artifact)
            .await
            .with_context(|| format!("Test file not found: {}", artifact.display()))?;
        self.warm_standards();

        let steps = VerificationLoop::new(self.toolchain.as_ref(), &self.classifier)
            .record_attempts(self.record_attempts)
            .verify(&req.project_root, &req.test_path, req.max_retries)
            .await;

        let coverage = if req.check_coverage && steps.succeeded() {
            Some(match self.toolchain.coverage(&req.project_root, &req.test_path).await {
                Ok(report) => {
                    info!(report = %report.report_path, "Coverage report generated");
                    CoverageOutcome {
                        success: true,
                        report_path: Some(report.report_path),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Coverage report failed");
                    CoverageOutcome {
                        success: false,
                        report_path: None,
                        error: Some(e.to_string()),
                    }
                }
            })
        } else {
            None
        };

        Ok((steps, coverage))
    }

    fn warm_standards(&self) {
        let standards = self.standards.test_standards().len();
        let validation = self.standards.validation_loop().len();
        debug!(standards, validation, "Standards documents loaded");
    }
}

fn parse<T: DeserializeOwned>(operation: &str, arguments: Value) -> Result<T, OperationError> {
    serde_json::from_value(arguments).map_err(|e| OperationError::invalid(operation, e.to_string()))
}

fn to_json<T: Serialize>(report: &T) -> Value {
    serde_json::to_value(report).unwrap_or_else(|e| json!({ "success": false, "error": e.to_string() }))
}

fn require_path(operation: &str, field: &str, path: &Path) -> Result<(), OperationError> {
    if path.as_os_str().is_empty() {
        return Err(OperationError::invalid(operation, format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_text(operation: &str, field: &str, value: &str) -> Result<(), OperationError> {
    if value.trim().is_empty() {
        return Err(OperationError::invalid(operation, format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_retries(operation: &str, max_retries: u32) -> Result<(), OperationError> {
    if max_retries == 0 {
        return Err(OperationError::invalid(operation, "max_retries must be at least 1"));
    }
    Ok(())
}

async fn write_artifact(project_root: &Path, test_path: &str, artifact: &str) -> Result<PathBuf> {
    let path = project_root.join(test_path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, artifact)
        .await
        .with_context(|| format!("Failed to write test file {}", path.display()))?;
    Ok(path)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contexts::toolchain::{CoverageReport, TestCounts, ToolOutput};
    use crate::error::ToolchainFailure;

    struct Passing;

    #[async_trait]
    impl Toolchain for Passing {
        async fn compile(&self, _root: &Path, _target: &str) -> Result<ToolOutput, ToolchainFailure> {
            Ok(ToolOutput::default())
        }

        async fn run(&self, _root: &Path, _target: &str) -> Result<TestCounts, ToolchainFailure> {
            Ok(TestCounts { passed: 2, failed: 0 })
        }

        async fn coverage(&self, _root: &Path, _target: &str) -> Result<CoverageReport, ToolchainFailure> {
            Ok(CoverageReport {
                report_path: "app/build/reports/jacoco/test/html/index.html".to_string(),
            })
        }
    }

    struct NoFramework;

    #[async_trait]
    impl FrameworkDetector for NoFramework {
        async fn has_framework_entrypoint(&self, _project_root: &Path) -> bool {
            false
        }
    }

    struct NoStandards;

    impl StandardsRegistry for NoStandards {
        fn test_standards(&self) -> &str {
            ""
        }

        fn validation_loop(&self) -> &str {
            ""
        }
    }

    const SERVICE: &str = "app/src/main/kotlin/com/acme/FooService.kt";

    fn dispatcher() -> OperationDispatcher {
        OperationDispatcher::new(
            Box::new(Passing),
            Box::new(NoFramework),
            Box::new(NoStandards),
            &GenerationConfig {
                record_attempts: false,
                ..Default::default()
            },
        )
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SERVICE);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "package com.acme\n\nclass FooService(val bar: BarRepo) : Base {\n    fun getX(): Long { return 1 }\n}\n",
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected() {
        let err = dispatcher().call("delete_everything", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: delete_everything");
    }

    #[tokio::test]
    async fn undecodable_arguments_are_rejected() {
        let err = dispatcher()
            .call(GENERATE_UNIT_TEST, json!({"project_root": 3}))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn generation_writes_inferred_test_path() {
        let dir = project();
        let report = dispatcher()
            .call(
                GENERATE_UNIT_TEST,
                json!({"project_root": dir.path(), "service_path": SERVICE}),
            )
            .await
            .unwrap();

        assert_eq!(report["success"], true);
        assert_eq!(report["test_path"], "app/src/test/kotlin/com/acme/FooServiceTest.kt");
        let names: Vec<&str> = report["steps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["analyze_service", "generate_test_code", "compile_validation", "test_execution"]
        );
        assert_eq!(report["steps"][1]["result"]["test_methods_generated"], 2);
        assert_eq!(
            report["steps"][1]["result"]["artifact_sha256"].as_str().unwrap().len(),
            64
        );
        assert!(dir
            .path()
            .join("app/src/test/kotlin/com/acme/FooServiceTest.kt")
            .exists());
    }

    #[tokio::test]
    async fn missing_service_file_fails_the_analysis_step() {
        let dir = tempfile::tempdir().unwrap();
        let report = dispatcher()
            .generate_test(
                GenerateRequest {
                    project_root: dir.path().to_path_buf(),
                    service_path: "app/src/main/kotlin/Missing.kt".to_string(),
                    serena_analysis: None,
                    test_path: None,
                    validate: true,
                    max_retries: 3,
                },
                TestIntent::Unit,
            )
            .await;

        assert!(!report.success);
        assert!(report.error.as_deref().unwrap().starts_with("Failed to read service file"));
        assert!(report.stack.as_deref().unwrap().lines().count() >= 2);
        assert_eq!(report.steps.steps().len(), 1);
        assert!(report.steps.has_failure());
    }

    #[tokio::test]
    async fn zero_retries_is_an_input_error() {
        let dir = project();
        let report = dispatcher()
            .call(
                VALIDATE_TEST,
                json!({"project_root": dir.path(), "test_path": SERVICE, "max_retries": 0}),
            )
            .await
            .unwrap();
        assert_eq!(report["success"], false);
        assert!(report["error"].as_str().unwrap().contains("max_retries"));
    }

    #[tokio::test]
    async fn analysis_reports_model() {
        let dir = project();
        let report = dispatcher()
            .analyze_service(AnalyzeRequest {
                project_root: dir.path().to_path_buf(),
                service_path: SERVICE.to_string(),
            })
            .await;
        assert!(report.success);
        let analysis = report.analysis.unwrap();
        assert_eq!(analysis.class_name, "FooService");
        assert_eq!(analysis.package_name, "com.acme");
        assert_eq!(analysis.dependencies[0].name, "bar");
    }

    #[tokio::test]
    async fn validation_runs_coverage_on_success() {
        let dir = project();
        let report = dispatcher()
            .validate_test(ValidateRequest {
                project_root: dir.path().to_path_buf(),
                test_path: SERVICE.to_string(),
                max_retries: 1,
                check_coverage: true,
            })
            .await;
        assert!(report.success);
        assert_eq!(report.steps.steps()[0].step, 1);
        let coverage = report.coverage.unwrap();
        assert!(coverage.success);
        assert!(coverage.report_path.unwrap().ends_with("index.html"));
    }

    #[tokio::test]
    async fn validation_of_missing_test_file_fails_early() {
        let dir = project();
        let report = dispatcher()
            .validate_test(ValidateRequest {
                project_root: dir.path().to_path_buf(),
                test_path: "app/src/test/kotlin/com/acme/MissingTest.kt".to_string(),
                max_retries: 3,
                check_coverage: false,
            })
            .await;
        assert!(!report.success);
        assert!(report.steps.steps().is_empty());
        assert!(report.error.unwrap().contains("Test file not found"));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let dir = project();
        let report = dispatcher()
            .generate_batch_tests(BatchRequest {
                project_root: dir.path().to_path_buf(),
                service_paths: Vec::new(),
                validate: false,
                max_retries: 3,
                continue_on_error: true,
            })
            .await;
        assert!(!report.success);
        assert!(report.summary.contains("service_paths"));
    }
}
