//! Arguments and reports of the five remote operations.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::report::VerificationReport;
use super::service_model::{Dependency, Method, ServiceModel};
use super::symbol_tree::SymbolTree;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Number of imports echoed back by `analyze_service`.
pub const ANALYSIS_IMPORT_LIMIT: usize = 10;

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeRequest {
    /// Absolute path of the Gradle project
    pub project_root: PathBuf,
    /// Service source path relative to project_root
    pub service_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateRequest {
    /// Absolute path of the Gradle project
    pub project_root: PathBuf,
    /// Service source path relative to project_root
    pub service_path: String,
    /// Optional symbol overview ({name, children: [{kind, name, detail}]})
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<serde_json::Value>")]
    pub serena_analysis: Option<SymbolTree>,
    /// Output path; inferred from service_path when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_path: Option<String>,
    /// Compile and run the test after writing it
    #[serde(default = "default_true")]
    pub validate: bool,
    /// Attempts per verification phase
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchRequest {
    /// Absolute path of the Gradle project
    pub project_root: PathBuf,
    /// Service source paths, processed in order
    pub service_paths: Vec<String>,
    #[serde(default = "default_true")]
    pub validate: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Keep going after a failed service
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValidateRequest {
    /// Absolute path of the Gradle project
    pub project_root: PathBuf,
    /// Test source path relative to project_root
    pub test_path: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Produce a JaCoCo report once the tests pass
    #[serde(default)]
    pub check_coverage: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub class_name: String,
    pub package_name: String,
    pub methods: Vec<Method>,
    pub dependencies: Vec<Dependency>,
    pub imports: Vec<String>,
}

impl From<ServiceModel> for AnalysisSummary {
    fn from(model: ServiceModel) -> Self {
        let mut imports = model.imports;
        imports.truncate(ANALYSIS_IMPORT_LIMIT);
        Self {
            class_name: model.class_name,
            package_name: model.package_name,
            methods: model.methods,
            dependencies: model.dependencies,
            imports,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisSummary>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub success: bool,
    pub duration_ms: u64,
    pub service_path: String,
    pub test_path: String,
    pub steps: VerificationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub success: bool,
    pub duration_ms: u64,
    pub test_path: String,
    pub steps: VerificationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub service_path: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<GenerationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<GenerationReport> for BatchItem {
    fn from(report: GenerationReport) -> Self {
        let status = if report.success {
            ItemStatus::Success
        } else {
            ItemStatus::Failed
        };
        Self {
            service_path: report.service_path.clone(),
            status,
            error: report.error.clone(),
            report: Some(report),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub duration_ms: u64,
    pub summary: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}
