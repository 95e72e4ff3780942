//! Fractional progress reporting.

/// A progress update for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub run_id: String,
    /// Completion in `[0, 1]`.
    pub fraction: f32,
    pub label: String,
}

/// Callback for progress updates.
pub type ProgressCallback = std::sync::Arc<dyn Fn(Progress) + Send + Sync>;

/// Emits monotonically non-decreasing progress for one run.
pub struct ProgressReporter {
    run_id: String,
    callback: Option<ProgressCallback>,
    last: f32,
}

impl ProgressReporter {
    pub fn new(run_id: impl Into<String>, callback: Option<ProgressCallback>) -> Self {
        Self {
            run_id: run_id.into(),
            callback,
            last: 0.0,
        }
    }

    /// Report `fraction`, clamped to `[0, 1]` and never below the last value.
    pub fn report(&mut self, fraction: f32, label: impl Into<String>) {
        let fraction = fraction.clamp(0.0, 1.0).max(self.last);
        self.last = fraction;

        let label = label.into();
        tracing::info!(progress = fraction, "{}", label);

        if let Some(ref callback) = self.callback {
            callback(Progress {
                run_id: self.run_id.clone(),
                fraction,
                label,
            });
        }
    }

    pub fn last(&self) -> f32 {
        self.last
    }
}

/// Position of step `done` of `total` inside `[start, start + span]`.
pub fn subrange(start: f32, span: f32, done: usize, total: usize) -> f32 {
    if total == 0 {
        return start + span;
    }
    start + done as f32 * span / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_progress_never_decreases() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut reporter = ProgressReporter::new(
            "run",
            Some(Arc::new(move |p: Progress| sink.lock().unwrap().push(p.fraction))),
        );

        reporter.report(0.4, "images");
        reporter.report(0.2, "late");
        reporter.report(1.5, "done");

        assert_eq!(*seen.lock().unwrap(), vec![0.4, 0.4, 1.0]);
    }

    #[test]
    fn test_subrange_splits_evenly() {
        assert!((subrange(0.2, 0.1, 1, 2) - 0.25).abs() < 1e-6);
        assert!((subrange(0.2, 0.1, 2, 2) - 0.3).abs() < 1e-6);
        assert!((subrange(0.4, 0.5, 0, 0) - 0.9).abs() < 1e-6);
    }
}
