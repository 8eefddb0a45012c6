//! User-facing translation diagnostics tied to a source position.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

/// Logs every diagnostic and returns how many there were.
pub fn report(diags: &[Diagnostic]) -> usize {
    for d in diags {
        tracing::error!("[GOSL] {}", d);
    }
    diags.len()
}
