//! UI actor: the only thread that writes to the terminal.
//!
//! Download tasks run concurrently on the tokio runtime and each reports
//! against its own slot. They only clone the sender and fire events; the
//! actor thread owns the [`SlotTable`] outright and applies events in
//! arrival order, so no row is ever written by two tasks at once and the
//! table needs no lock.

use super::buffer::OutputBuffer;
use super::table::{Severity, SlotState, SlotTable};
use super::theme::Theme;
use std::io::IsTerminal;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Redraw interval for animated rows.
const TICK: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum UiEvent {
    /// Allocate one row per file
    Prepare { files: Vec<String> },
    Downloading {
        slot: usize,
        current: u64,
        total: Option<u64>,
    },
    Retrying {
        slot: usize,
        attempt: u32,
        delay: Duration,
    },
    Done {
        slot: usize,
        detail: String,
        size: Option<u64>,
    },
    Failed { slot: usize, reason: String },
    /// Unstyled line, such as a tree row
    Line(String),
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    /// Closing tally. Any `failed` item makes the run an error.
    Summary {
        count: usize,
        failed: usize,
        action: String,
        elapsed_secs: f64,
    },
    /// Answer once every earlier event has been applied
    Sync(tokio::sync::oneshot::Sender<()>),
    Shutdown,
}

pub struct UiActor {
    sender: mpsc::Sender<UiEvent>,
    _handle: thread::JoinHandle<()>,
}

impl UiActor {
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel();
        let interactive = std::io::stdout().is_terminal();
        let handle = thread::spawn(move || run_event_loop(&receiver, interactive));
        Self {
            sender,
            _handle: handle,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<UiEvent> {
        self.sender.clone()
    }
}

impl Drop for UiActor {
    fn drop(&mut self) {
        let _ = self.sender.send(UiEvent::Shutdown);
    }
}

fn run_event_loop(receiver: &mpsc::Receiver<UiEvent>, interactive: bool) {
    let mut buffer = OutputBuffer::new(std::io::stdout(), interactive);
    let theme = Theme::default();
    let mut table = SlotTable::new(theme.clone(), interactive);

    loop {
        let event = match receiver.recv_timeout(TICK) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                table.render_active();
                continue;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        match event {
            UiEvent::Prepare { files } => table.prepare(&mut buffer, &files),
            UiEvent::Downloading {
                slot,
                current,
                total,
            } => table.update(slot, SlotState::Transferring { current, total }),
            UiEvent::Retrying {
                slot,
                attempt,
                delay,
            } => table.update(slot, SlotState::Retrying { attempt, delay }),
            UiEvent::Done { slot, detail, size } => {
                table.update(slot, SlotState::Done { detail, size });
            }
            UiEvent::Failed { slot, reason } => table.update(slot, SlotState::Failed { reason }),
            UiEvent::Line(text) => {
                table.close(&mut buffer);
                println!("{text}");
            }
            UiEvent::Info(msg) => {
                // Plain lines would tear the frame, so it closes first.
                table.close(&mut buffer);
                buffer.write_line(&format!("  {} {msg}", theme.icons.info), theme.colors.secondary);
            }
            UiEvent::Success(msg) => table.print_footer(&mut buffer, &msg, Severity::Success),
            UiEvent::Warning(msg) => table.print_footer(&mut buffer, &msg, Severity::Warning),
            UiEvent::Error(msg) => table.print_footer(&mut buffer, &msg, Severity::Error),
            UiEvent::Summary {
                count,
                failed,
                action,
                elapsed_secs,
            } => {
                let mut msg = format!("{} {count}", action.to_uppercase());
                if failed > 0 {
                    msg.push_str(&format!(", FAILED {failed}"));
                }
                msg.push_str(&format!(", elapsed {elapsed_secs:.1}s"));
                let severity = if failed > 0 { Severity::Error } else { Severity::Success };
                table.print_footer(&mut buffer, &msg, severity);

                // Machine-readable line for CI logs.
                println!("RESULT {}", result_json(&action, count, failed, elapsed_secs));
            }
            UiEvent::Sync(tx) => {
                let _ = tx.send(());
            }
            UiEvent::Shutdown => break,
        }
    }
    table.close(&mut buffer);
}

fn result_json(action: &str, count: usize, failed: usize, elapsed_secs: f64) -> serde_json::Value {
    serde_json::json!({
        "operation": action,
        "status": if failed == 0 { "success" } else { "error" },
        "count": count,
        "failed": failed,
        "elapsed": elapsed_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_event_variants() {
        let event = UiEvent::Downloading {
            slot: 0,
            current: 100,
            total: Some(200),
        };
        assert!(matches!(event, UiEvent::Downloading { slot: 0, .. }));
    }

    #[test]
    fn test_sync_after_events() {
        let actor = UiActor::spawn();
        let sender = actor.sender();
        sender
            .send(UiEvent::Prepare {
                files: vec!["a.whl".to_string()],
            })
            .unwrap();
        sender
            .send(UiEvent::Done {
                slot: 0,
                detail: "downloaded".to_string(),
                size: Some(3),
            })
            .unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        sender.send(UiEvent::Sync(tx)).unwrap();
        rx.blocking_recv().unwrap();
        drop(actor);
    }

    #[test]
    fn test_result_status_follows_failures() {
        let ok = result_json("downloaded", 3, 0, 1.5);
        assert_eq!(ok["status"], "success");
        assert_eq!(ok["count"], 3);

        let failed = result_json("downloaded", 2, 1, 1.5);
        assert_eq!(failed["status"], "error");
        assert_eq!(failed["failed"], 1);
    }
}
