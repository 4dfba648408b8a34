use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use testsmith::config::AppConfig;
use testsmith::contexts::{OperationDispatcher, RepairClassifier, TestIntent};
use testsmith::data::{AnalyzeRequest, BatchRequest, GenerateRequest, StandardsRegistry, ValidateRequest};
use testsmith::registries::{
    FileStandardsRegistry, GradleToolchain, MarkerScanDetector, TEST_STANDARDS_FILE, VALIDATION_LOOP_FILE,
};

mod server;

pub struct Config {
    pub verbose: bool,
    pub app: AppConfig,
}

pub struct GenerateOptions {
    pub project_root: PathBuf,
    pub service_path: String,
    pub test_path: Option<String>,
    pub symbols: Option<PathBuf>,
    pub integration: bool,
    pub validate: bool,
    pub max_retries: u32,
}

pub struct BatchOptions {
    pub project_root: PathBuf,
    pub service_paths: Vec<String>,
    pub validate: bool,
    pub max_retries: u32,
    pub continue_on_error: bool,
}

fn build_dispatcher(config: &Config) -> OperationDispatcher {
    let mut classifier = RepairClassifier::new();
    for rule in &config.app.generation.disabled_repair_rules {
        if !classifier.set_enabled(rule, false) {
            warn!(rule = %rule, "Ignoring unknown repair rule in config");
        }
    }

    OperationDispatcher::new(
        Box::new(GradleToolchain::new(config.app.toolchain.clone())),
        Box::new(MarkerScanDetector::new(config.app.generation.framework_marker.clone())),
        Box::new(FileStandardsRegistry::new(config.app.standards_dir.0.clone())),
        &config.app.generation,
    )
    .with_classifier(classifier)
}

pub async fn serve(config: &Config) -> Result<()> {
    server::serve(build_dispatcher(config)).await
}

pub async fn analyze(project_root: PathBuf, service_path: String, config: &Config) -> Result<()> {
    let report = build_dispatcher(config)
        .analyze_service(AnalyzeRequest {
            project_root,
            service_path,
        })
        .await;
    print_report(&report)?;
    ensure_success(report.success, "Analysis")
}

pub async fn generate(options: GenerateOptions, config: &Config) -> Result<()> {
    let serena_analysis = match &options.symbols {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read symbol overview {}", path.display()))?;
            Some(
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid symbol overview {}", path.display()))?,
            )
        }
        None => None,
    };
    let intent = if options.integration {
        TestIntent::Integration
    } else {
        TestIntent::Unit
    };

    let report = build_dispatcher(config)
        .generate_test(
            GenerateRequest {
                project_root: options.project_root,
                service_path: options.service_path,
                serena_analysis,
                test_path: options.test_path,
                validate: options.validate,
                max_retries: options.max_retries,
            },
            intent,
        )
        .await;
    print_report(&report)?;
    ensure_success(report.success, "Test generation")
}

pub async fn batch(options: BatchOptions, config: &Config) -> Result<()> {
    let report = build_dispatcher(config)
        .generate_batch_tests(BatchRequest {
            project_root: options.project_root,
            service_paths: options.service_paths,
            validate: options.validate,
            max_retries: options.max_retries,
            continue_on_error: options.continue_on_error,
        })
        .await;
    print_report(&report)?;
    ensure_success(report.success, "Batch generation")
}

pub async fn validate(
    project_root: PathBuf,
    test_path: String,
    max_retries: u32,
    check_coverage: bool,
    config: &Config,
) -> Result<()> {
    let report = build_dispatcher(config)
        .validate_test(ValidateRequest {
            project_root,
            test_path,
            max_retries,
            check_coverage,
        })
        .await;
    print_report(&report)?;
    ensure_success(report.success, "Validation")
}

pub fn standards(config: &Config) -> Result<()> {
    let registry = FileStandardsRegistry::new(config.app.standards_dir.0.clone());
    if config.verbose {
        eprintln!("Reading standards from {}", registry.standards_dir().display());
    }
    for (file, content) in [
        (TEST_STANDARDS_FILE, registry.test_standards()),
        (VALIDATION_LOOP_FILE, registry.validation_loop()),
    ] {
        println!("==> {} <==", file);
        if content.is_empty() {
            println!("(not found)");
        } else {
            println!("{}", content.trim_end());
        }
        println!();
    }
    Ok(())
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

fn ensure_success(success: bool, what: &str) -> Result<()> {
    if success {
        Ok(())
    } else {
        anyhow::bail!("{} failed; see the report above", what);
    }
}
