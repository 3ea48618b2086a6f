// Terminal rendering of a running draw.

use std::io::{self, Write};
use std::sync::Mutex;

use crossterm::cursor::MoveToColumn;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};
use meetraffle_core::{Attendee, DrawObserver, DrawOutcome};
use tracing::debug;

/// Rewrites a single terminal line with each new selection.
pub struct TerminalDisplay<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        TerminalDisplay {
            out: Mutex::new(out),
        }
    }

    fn redraw(&self, text: &str) -> io::Result<()> {
        let mut guard = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let out = &mut *guard;
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(text))?;
        out.flush()
    }

    /// Replace the rolling line with the final result.
    pub fn show_winner(&self, outcome: &DrawOutcome) -> io::Result<()> {
        let mut guard = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let out = &mut *guard;
        execute!(
            out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print("Winner: "),
            Print(outcome.winner.name.as_str().bold().green()),
            Print("\n")
        )
    }

    /// Leave the rolling line and print a message on the next one.
    pub fn show_message(&self, message: &str) -> io::Result<()> {
        let mut guard = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let out = &mut *guard;
        execute!(out, Print("\n"), Print(message), Print("\n"))
    }
}

impl<W: Write + Send> DrawObserver for TerminalDisplay<W> {
    fn selected_attendee_changed(&self, attendee: &Attendee) {
        // The terminal is best-effort; a broken pipe must not stop the draw.
        if let Err(e) = self.redraw(&attendee.name) {
            debug!("failed to render selection: {}", e);
        }
    }
}
