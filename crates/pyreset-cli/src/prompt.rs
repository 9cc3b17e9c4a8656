use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pyreset_core::ConsentSource;

/// Reads consent answers from stdin. Closed input, a read error or an
/// interrupt while waiting all count as no answer.
pub(crate) struct TerminalConsent {
    cancelled: Arc<AtomicBool>,
}

impl TerminalConsent {
    pub(crate) fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled }
    }
}

impl ConsentSource for TerminalConsent {
    fn respond(&mut self, prompt: &str) -> Option<String> {
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        print!("{prompt}");
        io::stdout().flush().ok()?;

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) if self.cancelled.load(Ordering::SeqCst) => None,
            Ok(_) => Some(answer),
        }
    }
}
