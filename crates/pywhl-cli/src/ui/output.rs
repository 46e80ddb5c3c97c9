//! Handle commands use to talk to the UI actor.

use super::actor::{UiActor, UiEvent};
use pywhl_core::Reporter;
use std::sync::{OnceLock, mpsc};
use std::time::Duration;

static UI_ACTOR: OnceLock<mpsc::Sender<UiEvent>> = OnceLock::new();

fn actor_sender() -> mpsc::Sender<UiEvent> {
    UI_ACTOR
        .get_or_init(|| {
            let actor = UiActor::spawn();
            let sender = actor.sender();
            // Lives for the rest of the process.
            std::mem::forget(actor);
            sender
        })
        .clone()
}

/// Cloneable sender of UI events. With `quiet`, progress rows, info lines
/// and summaries are dropped; success, warning and error footers still show.
#[derive(Clone, Debug)]
pub struct Output {
    sender: mpsc::Sender<UiEvent>,
    quiet: bool,
}

impl Output {
    pub fn new() -> Self {
        Self {
            sender: actor_sender(),
            quiet: false,
        }
    }

    pub fn quiet(quiet: bool) -> Self {
        Self {
            quiet,
            ..Self::new()
        }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.sender.send(event);
    }

    fn send_progress(&self, event: UiEvent) {
        if !self.quiet {
            self.send(event);
        }
    }

    /// Print `text` as is. Dropped when quiet.
    pub fn line(&self, text: &str) {
        self.send_progress(UiEvent::Line(text.to_string()));
    }

    /// Closing tally for a run where `failed` items did not make it.
    /// Dropped when quiet.
    pub fn summary_with_failures(&self, count: usize, failed: usize, action: &str, elapsed_secs: f64) {
        self.send_progress(UiEvent::Summary {
            count,
            failed,
            action: action.to_string(),
            elapsed_secs,
        });
    }

    /// Block until every event sent so far has been drawn.
    pub fn wait(&self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(UiEvent::Sync(tx));
        let _ = rx.blocking_recv();
    }

    pub async fn wait_async(&self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(UiEvent::Sync(tx));
        let _ = rx.await;
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for Output {
    fn prepare(&self, files: &[String]) {
        self.send_progress(UiEvent::Prepare {
            files: files.to_vec(),
        });
    }

    fn downloading(&self, slot: usize, current: u64, total: Option<u64>) {
        self.send_progress(UiEvent::Downloading {
            slot,
            current,
            total,
        });
    }

    fn retrying(&self, slot: usize, attempt: u32, delay: Duration) {
        self.send_progress(UiEvent::Retrying {
            slot,
            attempt,
            delay,
        });
    }

    fn done(&self, slot: usize, detail: &str, size: Option<u64>) {
        self.send_progress(UiEvent::Done {
            slot,
            detail: detail.to_string(),
            size,
        });
    }

    fn failed(&self, slot: usize, reason: &str) {
        self.send_progress(UiEvent::Failed {
            slot,
            reason: reason.to_string(),
        });
    }

    fn info(&self, msg: &str) {
        self.send_progress(UiEvent::Info(msg.to_string()));
    }

    fn success(&self, msg: &str) {
        self.send(UiEvent::Success(msg.to_string()));
    }

    fn warning(&self, msg: &str) {
        self.send(UiEvent::Warning(msg.to_string()));
    }

    fn error(&self, msg: &str) {
        self.send(UiEvent::Error(msg.to_string()));
    }

    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        self.summary_with_failures(count, 0, action, elapsed_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_clone_shares_actor() {
        let output = Output::new();
        let other = output.clone();
        output.info("from original");
        other.info("from clone");
        other.wait();
    }

    #[tokio::test]
    async fn test_quiet_still_syncs() {
        let output = Output::quiet(true);
        output.prepare(&["a.whl".to_string()]);
        output.downloading(0, 1, Some(2));
        output.wait_async().await;
    }
}
