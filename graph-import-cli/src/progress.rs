use std::io::{self, Write};
use std::time::Duration;

use colored::Colorize;
use graph_import::{Phase, Progress};

/// Prints `Uploading nodes... 41ms` style lines to stderr.
pub struct TerminalProgress<W: Write = io::Stderr> {
    out: W,
    line_open: bool,
}

impl TerminalProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(io::stderr())
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> TerminalProgress<W> {
    #[must_use]
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            line_open: false,
        }
    }

    /// Terminate a phase line left open by a failed phase.
    pub fn close_line(&mut self) {
        if self.line_open {
            let _ = writeln!(self.out);
            self.line_open = false;
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Progress for TerminalProgress<W> {
    fn phase_started(&mut self, phase: Phase) {
        self.close_line();
        let _ = write!(self.out, "{}...", phase.label());
        let _ = self.out.flush();
        self.line_open = true;
    }

    fn phase_finished(&mut self, _phase: Phase, elapsed: Duration) {
        let elapsed = format!("{}ms", elapsed.as_millis());
        let _ = writeln!(self.out, " {}", elapsed.cyan());
        self.line_open = false;
    }
}
