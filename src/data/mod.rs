mod operations;
mod report;
mod service_model;
mod standards;
mod symbol_tree;

pub use operations::{
    AnalysisReport, AnalysisSummary, AnalyzeRequest, BatchItem, BatchReport, BatchRequest,
    CoverageOutcome, GenerateRequest, GenerationReport, ItemStatus, ValidateRequest,
    ValidationReport, ANALYSIS_IMPORT_LIMIT, DEFAULT_MAX_RETRIES,
};
pub use report::{Step, StepStatus, VerificationReport};
pub use service_model::{resolve_import_paths, Dependency, Method, Parameter, ServiceModel};
pub use standards::StandardsRegistry;
pub use symbol_tree::{KindTag, SymbolKind, SymbolNode, SymbolTree};
