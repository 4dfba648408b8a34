/// Read-only access to the testing standards documents.
///
/// Implementations load each document at most once per process and return
/// empty text when a document is unavailable.
pub trait StandardsRegistry: Send + Sync {
    /// Contents of `TEST_STANDARDS.md`.
    fn test_standards(&self) -> &str;

    /// Contents of `VALIDATION_LOOP.md`.
    fn validation_loop(&self) -> &str;
}
