//! Interactive gate in front of a send batch.

use std::io::{self, BufRead, Write};

/// Asked once per batch, before any transport call. Declining aborts the
/// whole batch.
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> io::Result<bool>;
}

/// Reads a yes/no answer from the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt} [y/N] ")?;
        stdout.flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

/// Non-interactive approval, for dry runs and scripted use.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirmation for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> io::Result<bool> {
        Ok(true)
    }
}
