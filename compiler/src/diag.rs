// diag.rs — Unified diagnostics model
//
// Provides the diagnostic types every pass reports through. Errors raised
// by the partitioner, mesh, and switch synthesizer are converted into a
// `Diagnostic` before they reach the driver.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`).
///
/// Once assigned, a code must never be reassigned to a different semantic
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Code table. `E01xx` feasibility, `E02xx` mesh and routing,
/// `E03xx` flow and rates, `E04xx` input and configuration, `E05xx`
/// internal errors. `W01xx` warnings about tile usage.
pub mod codes {
    use super::DiagCode;

    pub const E0100: DiagCode = DiagCode("E0100"); // infeasible tile budget
    pub const E0101: DiagCode = DiagCode("E0101"); // oversized leaf
    pub const E0102: DiagCode = DiagCode("E0102"); // more partitions than tiles
    pub const E0200: DiagCode = DiagCode("E0200"); // malformed route
    pub const E0201: DiagCode = DiagCode("E0201"); // tiles not adjacent
    pub const E0300: DiagCode = DiagCode("E0300"); // flow index out of range
    pub const E0301: DiagCode = DiagCode("E0301"); // unbalanced rates
    pub const E0400: DiagCode = DiagCode("E0400"); // invalid stream graph
    pub const E0401: DiagCode = DiagCode("E0401"); // invalid configuration
    pub const E0402: DiagCode = DiagCode("E0402"); // malformed JSON input
    pub const E0500: DiagCode = DiagCode("E0500"); // pass ran without its inputs
    pub const W0100: DiagCode = DiagCode("W0100"); // budget leaves tiles idle
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Cause record ─────────────────────────────────────────────────────────

/// One link in a cause chain explaining a failure.
#[derive(Debug, Clone)]
pub struct CauseRecord {
    pub message: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by any pass.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    /// Subtree, filter, or tile the diagnostic is about.
    pub subject: Option<String>,
    pub message: String,
    pub hint: Option<String>,
    pub cause_chain: Vec<CauseRecord>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, subject, hint, or causes.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            subject: None,
            message: message.into(),
            hint: None,
            cause_chain: Vec::new(),
        }
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach the identity of the offending subtree or tile.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a cause record to the chain.
    pub fn with_cause(mut self, message: impl Into<String>) -> Self {
        self.cause_chain.push(CauseRecord {
            message: message.into(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(subject) = &self.subject {
            write!(f, "\n  --> {}", subject)?;
        }
        for cause in &self.cause_chain {
            write!(f, "\n  cause: {}", cause.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code_and_subject() {
        let d = Diagnostic::new(DiagLevel::Error, "budget too small")
            .with_code(codes::E0100)
            .with_subject("split_join 'sj'");
        assert_eq!(
            format!("{d}"),
            "error[E0100]: budget too small\n  --> split_join 'sj'"
        );
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::new(DiagLevel::Warning, "unused tile")
            .with_code(DiagCode("W0001"))
            .with_hint("lower the tile budget")
            .with_cause("only 3 partitions were produced");

        assert_eq!(d.code, Some(DiagCode("W0001")));
        assert_eq!(d.hint.as_deref(), Some("lower the tile budget"));
        assert_eq!(d.cause_chain.len(), 1);
        assert_eq!(
            format!("{d}"),
            "warning[W0001]: unused tile\n  cause: only 3 partitions were produced\n  hint: lower the tile budget"
        );
    }
}
