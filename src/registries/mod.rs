mod gradle_toolchain;
mod marker_scan_detector;
mod standards_registry;

pub use gradle_toolchain::GradleToolchain;
pub use marker_scan_detector::{find_marker, MarkerScanDetector};
pub use standards_registry::{FileStandardsRegistry, TEST_STANDARDS_FILE, VALIDATION_LOOP_FILE};
