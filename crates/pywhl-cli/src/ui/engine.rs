//! Fixed-height drawing region addressed by row.
//!
//! The frame reserves `rows` blank lines below the cursor, anchors on the
//! first of them, and every draw jumps relative to that anchor. Nothing
//! here knows absolute terminal coordinates, so scrollback above the frame
//! is left alone.

use crossterm::{
    QueueableCommand,
    cursor::{MoveDown, MoveToColumn, MoveUp, RestorePosition, SavePosition},
    terminal::{Clear, ClearType},
};
use std::io::{Result, Stdout, Write, stdout};

pub struct RowFrame {
    stdout: Stdout,
    rows: u16,
    anchored: bool,
}

impl RowFrame {
    pub fn new(rows: u16) -> Self {
        Self {
            stdout: stdout(),
            rows,
            anchored: false,
        }
    }

    /// Reserve the rows and remember where they start.
    pub fn reserve(&mut self) -> Result<()> {
        for _ in 0..self.rows {
            writeln!(self.stdout)?;
        }
        if self.rows > 0 {
            self.stdout.queue(MoveUp(self.rows))?;
        }
        self.stdout.queue(MoveToColumn(0))?;
        self.stdout.queue(SavePosition)?;
        self.stdout.flush()?;
        self.anchored = true;
        Ok(())
    }

    /// Overwrite row `row` with whatever `draw` writes. Queued only; call
    /// [`RowFrame::flush`] to show it.
    pub fn draw(&mut self, row: u16, draw: impl FnOnce(&mut Stdout) -> Result<()>) -> Result<()> {
        if !self.anchored {
            self.reserve()?;
        }
        if row >= self.rows {
            return Ok(());
        }

        self.stdout.queue(RestorePosition)?;
        if row > 0 {
            self.stdout.queue(MoveDown(row))?;
        }
        self.stdout.queue(MoveToColumn(0))?;
        draw(&mut self.stdout)?;
        // Clear after drawing so a shorter line never flashes blank first.
        self.stdout.queue(Clear(ClearType::UntilNewLine))?;
        self.stdout.queue(RestorePosition)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stdout.flush()
    }

    /// Leave the cursor on the line below the frame.
    pub fn close(&mut self) -> Result<()> {
        if !self.anchored {
            return Ok(());
        }
        self.stdout.queue(RestorePosition)?;
        if self.rows > 0 {
            self.stdout.queue(MoveDown(self.rows))?;
        }
        self.stdout.queue(MoveToColumn(0))?;
        self.stdout.flush()?;
        self.anchored = false;
        Ok(())
    }
}
