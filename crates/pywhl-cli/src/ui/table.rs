//! Download table: one row per file, addressed by slot.
//!
//! Slots are handed out once by [`SlotTable::prepare`] and never move, so
//! concurrent downloads each redraw only their own row. When stdout is not
//! a terminal the table degrades to one plain line per finished file.

use super::buffer::OutputBuffer;
use super::engine::RowFrame;
use super::progress::{Spinner, format_retry, format_transfer};
use super::theme::{Theme, format_size, truncate};
use crossterm::style::{Color, Stylize};
use std::io::Write;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum SlotState {
    Queued,
    Transferring { current: u64, total: Option<u64> },
    Retrying { attempt: u32, delay: Duration },
    Done { detail: String, size: Option<u64> },
    Failed { reason: String },
}

impl SlotState {
    fn is_active(&self) -> bool {
        matches!(self, Self::Transferring { .. } | Self::Retrying { .. })
    }

    fn is_finished(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

/// Status column text for a state.
pub fn status_text(state: &SlotState) -> String {
    match state {
        SlotState::Queued => "queued".to_string(),
        SlotState::Transferring { current, total } => format_transfer(*current, *total),
        SlotState::Retrying { attempt, delay } => format_retry(*attempt, *delay),
        SlotState::Done { detail, size: Some(size) } => format!("{detail} {}", format_size(*size)),
        SlotState::Done { detail, size: None } => detail.clone(),
        SlotState::Failed { reason } => format!("failed: {reason}"),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[derive(Debug)]
struct Row {
    file: String,
    state: SlotState,
    /// Non-interactive mode prints each row once, when it finishes.
    printed: bool,
}

pub struct SlotTable {
    rows: Vec<Row>,
    theme: Theme,
    spinner: Spinner,
    frame: Option<RowFrame>,
    interactive: bool,
}

impl SlotTable {
    pub fn new(theme: Theme, interactive: bool) -> Self {
        Self {
            rows: Vec::new(),
            spinner: Spinner::new(theme.icons.clone()),
            theme,
            frame: None,
            interactive,
        }
    }

    /// Allocate one row per file, in order.
    pub fn prepare(&mut self, buffer: &mut OutputBuffer, files: &[String]) {
        self.close(buffer);
        self.rows = files
            .iter()
            .map(|file| Row {
                file: file.clone(),
                state: SlotState::Queued,
                printed: false,
            })
            .collect();

        if self.interactive && !self.rows.is_empty() {
            buffer.hide_cursor();
            let mut frame = RowFrame::new(self.rows.len() as u16);
            let _ = frame.reserve();
            self.frame = Some(frame);
            self.render_all();
        }
    }

    /// Set the state of `slot`. Unknown slots are ignored.
    pub fn update(&mut self, slot: usize, state: SlotState) {
        let Some(row) = self.rows.get_mut(slot) else {
            tracing::debug!(slot, "update for unknown slot");
            return;
        };
        row.state = state;

        if self.frame.is_some() {
            self.render_row(slot);
            self.flush_frame();
        } else if !self.interactive && row.state.is_finished() && !row.printed {
            row.printed = true;
            println!("  {} {}", row.file, status_text(&row.state));
        }
    }

    pub fn state(&self, slot: usize) -> Option<&SlotState> {
        self.rows.get(slot).map(|r| &r.state)
    }

    /// Redraw only rows that animate.
    pub fn render_active(&mut self) {
        if self.frame.is_none() {
            return;
        }
        let active: Vec<usize> = (0..self.rows.len())
            .filter(|&i| self.rows[i].state.is_active())
            .collect();
        if active.is_empty() {
            return;
        }
        for slot in active {
            self.render_row(slot);
        }
        self.flush_frame();
    }

    pub fn render_all(&mut self) {
        for slot in 0..self.rows.len() {
            self.render_row(slot);
        }
        self.flush_frame();
    }

    fn flush_frame(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            let _ = frame.flush();
        }
    }

    fn render_row(&mut self, slot: usize) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let row = &self.rows[slot];
        let colors = &self.theme.colors;
        let icons = &self.theme.icons;

        let (icon, color): (&str, Color) = match &row.state {
            SlotState::Queued => (icons.pending, colors.secondary),
            SlotState::Transferring { .. } => (self.spinner.icon(), colors.active),
            SlotState::Retrying { .. } => (self.spinner.icon(), colors.warning),
            SlotState::Done { .. } => (icons.success, colors.success),
            SlotState::Failed { .. } => (icons.error, colors.error),
        };
        let width = self.theme.layout.file_width;
        let file = format!("{:<width$}", truncate(&row.file, width));
        let status = status_text(&row.state);
        let primary = colors.primary;

        let _ = frame.draw(slot as u16, |out| {
            write!(
                out,
                "  {} {} {}",
                icon.with(color),
                file.with(primary),
                status.with(color)
            )
        });
    }

    /// Stop redrawing and move below the table.
    pub fn close(&mut self, buffer: &mut OutputBuffer) {
        if let Some(mut frame) = self.frame.take() {
            let _ = frame.close();
            buffer.show_cursor();
        }
    }

    pub fn print_footer(&mut self, buffer: &mut OutputBuffer, message: &str, severity: Severity) {
        self.close(buffer);
        let (icons, colors) = (&self.theme.icons, &self.theme.colors);
        let (icon, color) = match severity {
            Severity::Success => (icons.success, colors.success),
            Severity::Warning => (icons.warning, colors.warning),
            Severity::Error => (icons.error, colors.error),
        };
        buffer.write_line(&format!("{icon} {message}"), color);
        buffer.flush();
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new(Theme::default(), false)
    }
}

impl Drop for SlotTable {
    fn drop(&mut self) {
        if let Some(mut frame) = self.frame.take() {
            let _ = frame.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(&SlotState::Queued), "queued");
        assert_eq!(
            status_text(&SlotState::Done {
                detail: "downloaded".to_string(),
                size: Some(2048)
            }),
            "downloaded 2.0 KB"
        );
        assert_eq!(
            status_text(&SlotState::Failed {
                reason: "HTTP status 404".to_string()
            }),
            "failed: HTTP status 404"
        );
        assert_eq!(
            status_text(&SlotState::Retrying {
                attempt: 2,
                delay: Duration::from_secs(1)
            }),
            "retry 2 in 1.0s"
        );
    }

    #[test]
    fn test_slots_are_independent() {
        let mut buffer = OutputBuffer::default();
        let mut table = SlotTable::default();
        table.prepare(&mut buffer, &files(&["a.whl", "b.whl"]));

        table.update(
            1,
            SlotState::Transferring {
                current: 10,
                total: Some(20),
            },
        );
        assert_eq!(table.state(0), Some(&SlotState::Queued));
        assert!(matches!(table.state(1), Some(SlotState::Transferring { current: 10, .. })));

        // Out of range is ignored.
        table.update(7, SlotState::Queued);
        assert_eq!(table.state(7), None);
    }

    #[test]
    fn test_prepare_resets_rows() {
        let mut buffer = OutputBuffer::default();
        let mut table = SlotTable::default();
        table.prepare(&mut buffer, &files(&["a.whl"]));
        table.update(
            0,
            SlotState::Failed {
                reason: "x".to_string(),
            },
        );
        table.prepare(&mut buffer, &files(&["c.whl", "d.whl"]));
        assert_eq!(table.state(0), Some(&SlotState::Queued));
        assert_eq!(table.state(1), Some(&SlotState::Queued));
    }
}
