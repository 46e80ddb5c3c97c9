//! Line writer owned by the UI thread.
//!
//! Color and cursor codes are only emitted when the target is a terminal,
//! so piped output stays plain text. The first failed write (usually a
//! closed pipe) marks the buffer broken and every later write is dropped.

use crossterm::cursor::{Hide, Show};
use crossterm::queue;
use crossterm::style::{Color, Print, SetForegroundColor};
use std::io::{self, IsTerminal, Stdout, Write};

#[derive(Debug)]
pub struct OutputBuffer<W: Write = Stdout> {
    out: W,
    styled: bool,
    broken: bool,
}

impl OutputBuffer<Stdout> {
    /// Stdout, styled when it is a terminal.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let styled = out.is_terminal();
        Self::new(out, styled)
    }
}

impl<W: Write> OutputBuffer<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self {
            out,
            styled,
            broken: false,
        }
    }

    /// Write one line, colored when styled.
    pub fn write_line(&mut self, text: &str, color: Color) {
        if self.broken {
            return;
        }
        let result = if self.styled {
            queue!(
                self.out,
                SetForegroundColor(color),
                Print(text),
                SetForegroundColor(Color::Reset),
                Print("\n")
            )
        } else {
            writeln!(self.out, "{text}")
        };
        self.check(result);
    }

    pub fn hide_cursor(&mut self) {
        if self.styled && !self.broken {
            let result = queue!(self.out, Hide);
            self.check(result);
        }
    }

    pub fn show_cursor(&mut self) {
        if self.styled && !self.broken {
            let result = queue!(self.out, Show);
            self.check(result);
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        if !self.broken {
            let result = self.out.flush();
            self.check(result);
        }
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn check(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            tracing::debug!(error = %e, "terminal write failed, dropping further output");
            self.broken = true;
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl Default for OutputBuffer<Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_plain_lines_have_no_escapes() {
        let mut buffer = OutputBuffer::new(Vec::new(), false);
        buffer.hide_cursor();
        buffer.write_line("six-1.16.0-py2.py3-none-any.whl", Color::Green);
        buffer.show_cursor();
        buffer.flush();
        assert_eq!(buffer.into_inner(), b"six-1.16.0-py2.py3-none-any.whl\n");
    }

    #[test]
    fn test_styled_lines_are_colored() {
        let mut buffer = OutputBuffer::new(Vec::new(), true);
        buffer.write_line("done", Color::Green);
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(text.contains("\x1b["));
        assert!(text.contains("done"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_closed_pipe_stops_output() {
        let mut buffer = OutputBuffer::new(ClosedPipe, false);
        assert!(!buffer.is_broken());
        buffer.write_line("lost", Color::Reset);
        assert!(buffer.is_broken());
        buffer.write_line("also lost", Color::Reset);
        buffer.flush();
    }
}
