//! Recoverable conditions met during an import.
//!
//! Each condition is logged once through `log::warn!` and kept as a
//! [`Warning`] so callers can inspect what was dropped or approximated.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// A vocabulary string with no mapping
    UnknownValue,
    /// A feature the importer deliberately does not handle
    Unsupported,
    /// A spanner end (or start) without its counterpart
    Unmatched,
    /// Staff or voice number outside the declared range
    OutOfRange,
    /// An expected element is missing
    Missing,
    /// Structural inconsistency in the document
    Structure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Measure being translated when the warning was raised
    pub measure: Option<i32>,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
    measure: Option<i32>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag subsequent warnings with a measure number.
    pub fn set_measure(&mut self, measure: Option<i32>) {
        self.measure = measure;
    }

    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        match self.measure {
            Some(n) => log::warn!("measure {n}: {message}"),
            None => log::warn!("{message}"),
        }
        self.warnings.push(Warning {
            kind,
            measure: self.measure,
            message,
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}
