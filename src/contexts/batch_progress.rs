use std::time::Instant;

use tracing::info;

/// Running tally of a batch, logged as items start and finish.
pub struct BatchProgress {
    total: usize,
    succeeded: usize,
    failed: usize,
    start_time: Instant,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            start_time: Instant::now(),
        }
    }

    pub fn start_item(&self, name: &str) {
        info!(
            "Processing: {} ({}/{})",
            name,
            self.succeeded + self.failed + 1,
            self.total
        );
    }

    pub fn complete_item(&mut self, name: &str, success: bool) {
        if success {
            self.succeeded += 1;
            info!("✓ {}", name);
        } else {
            self.failed += 1;
            info!("✗ {}", name);
        }
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Items never reached because the batch stopped early.
    pub fn skipped(&self) -> usize {
        self.total - self.succeeded - self.failed
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Batch test generation summary:".to_string(),
            format!("  Total:     {}", self.total),
            format!("  Succeeded: {}", self.succeeded),
            format!("  Failed:    {}", self.failed),
        ];
        if self.skipped() > 0 {
            lines.push(format!("  Skipped:   {}", self.skipped()));
        }
        lines.push(format!("  Duration:  {:.2}s", self.start_time.elapsed().as_secs_f64()));
        lines.join("\n")
    }

    pub fn finish(&self) -> String {
        let summary = self.summary();
        info!("\n{}", summary);
        summary
    }
}
