//! Reporter trait for dependency injection
//!
//! Core logic reports progress through this trait so it is not coupled to
//! a terminal. Download events address a fixed slot allocated up front by
//! [`Reporter::prepare`], so concurrent tasks never share a display row.

use std::time::Duration;

pub trait Reporter: Send + Sync {
    /// Reserve one display slot per file, in order. Slot `i` belongs to `files[i]`.
    fn prepare(&self, files: &[String]);

    /// Bytes transferred so far for the task in `slot`.
    fn downloading(&self, slot: usize, current: u64, total: Option<u64>);

    /// A transient failure; the task sleeps `delay` before attempt `attempt`.
    fn retrying(&self, slot: usize, attempt: u32, delay: Duration);

    /// The task in `slot` finished.
    fn done(&self, slot: usize, detail: &str, size: Option<u64>);

    /// The task in `slot` gave up.
    fn failed(&self, slot: usize, reason: &str);

    fn info(&self, msg: &str);

    fn success(&self, msg: &str);

    fn warning(&self, msg: &str);

    fn error(&self, msg: &str);

    /// Final line after a batch.
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn prepare(&self, files: &[String]) {
        (**self).prepare(files)
    }
    fn downloading(&self, slot: usize, current: u64, total: Option<u64>) {
        (**self).downloading(slot, current, total)
    }
    fn retrying(&self, slot: usize, attempt: u32, delay: Duration) {
        (**self).retrying(slot, attempt, delay)
    }
    fn done(&self, slot: usize, detail: &str, size: Option<u64>) {
        (**self).done(slot, detail, size)
    }
    fn failed(&self, slot: usize, reason: &str) {
        (**self).failed(slot, reason)
    }
    fn info(&self, msg: &str) {
        (**self).info(msg)
    }
    fn success(&self, msg: &str) {
        (**self).success(msg)
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg)
    }
    fn error(&self, msg: &str) {
        (**self).error(msg)
    }
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        (**self).summary(count, action, elapsed_secs)
    }
}

/// A no-op reporter for silent operations (e.g., `--json` output, testing).
#[derive(Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn prepare(&self, _: &[String]) {}
    fn downloading(&self, _: usize, _: u64, _: Option<u64>) {}
    fn retrying(&self, _: usize, _: u32, _: Duration) {}
    fn done(&self, _: usize, _: &str, _: Option<u64>) {}
    fn failed(&self, _: usize, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn summary(&self, _: usize, _: &str, _: f64) {}
}
