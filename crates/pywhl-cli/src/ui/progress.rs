//! Spinner and transfer status text.

use super::theme::{Icons, format_size};
use std::time::{Duration, Instant};

/// Blinking icon for in-flight rows. Driven by wall-clock time, so the
/// blink rate does not depend on how often rows are redrawn.
#[derive(Debug, Clone)]
pub struct Spinner {
    started: Instant,
    icons: Icons,
}

impl Spinner {
    /// Time each icon stays up.
    const FRAME: Duration = Duration::from_millis(200);

    pub fn new(icons: Icons) -> Self {
        Self {
            started: Instant::now(),
            icons,
        }
    }

    pub fn frame(&self) -> u128 {
        self.started.elapsed().as_millis() / Self::FRAME.as_millis()
    }

    pub fn icon(&self) -> &'static str {
        if self.frame() % 2 == 0 {
            self.icons.active
        } else {
            self.icons.pending
        }
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new(Icons::default())
    }
}

/// `1.5 MB / 3.0 MB  50%`, or just the byte count when the server sent no
/// length.
pub fn format_transfer(current: u64, total: Option<u64>) -> String {
    match total.filter(|&t| t > 0) {
        Some(total) => {
            let percent = (current.min(total) * 100) / total;
            format!("{} / {}  {percent}%", format_size(current), format_size(total))
        }
        None if current == 0 => "connecting".to_string(),
        None => format_size(current),
    }
}

pub fn format_retry(attempt: u32, delay: Duration) -> String {
    format!("retry {attempt} in {:.1}s", delay.as_secs_f64())
}
