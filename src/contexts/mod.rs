mod batch_progress;
mod operation_dispatcher;
mod project_paths;
mod repair_classifier;
mod source_extractor;
mod template_synthesizer;
mod toolchain;
mod verification_loop;

pub use batch_progress::BatchProgress;
pub use operation_dispatcher::{
    FrameworkDetector, OperationDispatcher, ANALYZE_SERVICE, GENERATE_BATCH_TESTS,
    GENERATE_INTEGRATION_TEST, GENERATE_UNIT_TEST, VALIDATE_TEST,
};
pub use project_paths::{infer_test_path, module_of, test_class_name};
pub use repair_classifier::{Phase, RepairClassifier, RepairRule};
pub use source_extractor::{model_from_source, Extraction, ModelSource, SourceModelExtractor};
pub use template_synthesizer::{render, Cardinality, Slot, TemplateStyle, TestIntent};
pub use toolchain::{
    interpret_compile, interpret_test_run, parse_test_counts, CoverageReport, TestCounts,
    ToolOutput, Toolchain, ERROR_MARKER,
};
pub use verification_loop::{AttemptRecorder, PhaseOutcome, RetryState, VerificationLoop};
