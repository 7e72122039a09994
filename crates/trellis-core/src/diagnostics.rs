//! Fatal composition diagnostics.
//!
//! # Overview
//!
//! Only two conditions abort normalization, and both mean the composition
//! itself is unsound: the same key bound twice with different bindings, and a
//! module that transitively installs itself. Neither is recoverable, so the
//! public pipeline renders the report to stderr and terminates the process.
//! Everything here is plain data plus rendering, which keeps the exact output
//! under test.

use std::fmt;

use thiserror::Error;

use crate::key::TypeKey;

// ---------------------------------------------------------------------------
// Install trace
// ---------------------------------------------------------------------------

/// The install chain from the top-level composition down to a repeated
/// module, captured at the moment a loop is detected.
///
/// `frames` lists the modules whose expansion was in progress, outermost
/// first; `loop_start` indexes the frame where the repetition begins;
/// `repeated` is the module that was about to be installed a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTrace {
    pub root: &'static str,
    pub frames: Vec<&'static str>,
    pub loop_start: usize,
    pub repeated: &'static str,
}

impl fmt::Display for InstallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found a loop while expanding installed modules.")?;
        writeln!(f, "Install trace (from the top level to the most deeply nested):")?;
        writeln!(f, "{}", self.root)?;
        for (i, frame) in self.frames.iter().enumerate() {
            if i == self.loop_start {
                writeln!(f, "<-- the loop starts here")?;
            }
            writeln!(f, "{frame}")?;
        }
        if self.loop_start >= self.frames.len() {
            writeln!(f, "<-- the loop starts here")?;
        }
        write!(f, "{}", self.repeated)
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A provably broken composition.
///
/// The public pipeline never returns one of these; it renders the report and
/// exits. The type exists so detection and reporting stay separately
/// testable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalDiagnostic {
    /// `key` was bound more than once, with bindings that are not the same
    /// binding (different recipe functions, or different instance pointers).
    #[error("the type '{key}' is bound more than once, with different bindings")]
    InconsistentBinding { key: TypeKey },
    /// A module install chain reached a module whose expansion was already
    /// in progress.
    #[error("found a loop while expanding the modules installed by '{}'", .trace.root)]
    InstallCycle { trace: InstallTrace },
}

impl FatalDiagnostic {
    /// Stable `N####` identifier for machine parsing.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InconsistentBinding { .. } => "N0001",
            Self::InstallCycle { .. } => "N0002",
        }
    }

    /// One-line suggestion for fixing the composition.
    #[must_use]
    pub const fn hint(&self) -> &'static str {
        match self {
            Self::InconsistentBinding { .. } => {
                "expose the type in the signature of every module that binds it"
            }
            Self::InstallCycle { .. } => {
                "move the shared bindings into a module that both sides install"
            }
        }
    }

    /// The full human-readable report, exactly as written to stderr.
    #[must_use]
    pub fn report(&self) -> String {
        match self {
            Self::InconsistentBinding { key } => format!(
                "error[{code}]: the type '{key}' is bound more than once, with different bindings.\n\
                 The conflict was not caught when the modules were combined because at least\n\
                 one of the involved modules binds the type without exposing it in its\n\
                 signature. If the type is auto-injectable this can happen even when only one\n\
                 module binds it explicitly.\n\
                 hint: {hint}",
                code = self.code(),
                hint = self.hint(),
            ),
            Self::InstallCycle { trace } => format!(
                "error[{code}]: module install loop.\n{trace}\nhint: {hint}",
                code = self.code(),
                hint = self.hint(),
            ),
        }
    }

    /// Writes the report to stderr and terminates the process.
    ///
    /// Composition errors are programming errors in the graph, not runtime
    /// conditions; no caller can make progress past one.
    pub fn report_and_exit(&self) -> ! {
        tracing::error!(code = self.code(), "fatal composition error");
        eprintln!("{}", self.report());
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
