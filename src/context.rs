//! Conversion state threaded through every handler.
//!
//! One [`ImportContext`] exists per conversion; nothing is shared between
//! two imports, so independent documents can be converted in parallel.

use std::collections::HashSet;

use roxmltree::NodeId;
use serde::{Deserialize, Serialize};

use crate::cursor::DurationCursor;
use crate::diagnostics::Diagnostics;
use crate::nesting::NestingStack;
use crate::resolver::Resolver;

/// Options controlling an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Longest filler element, in quarter notes
    pub max_filler_quarters: u32,
    /// Longest gap filled with spacers, in quarter notes; longer gaps are cut
    pub max_gap_quarters: u32,
    /// Staff line count when `staff-details` does not give one
    pub default_staff_lines: u8,
    /// Prepended to every generated identifier
    pub id_prefix: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_filler_quarters: 2,
            max_gap_quarters: 64,
            default_staff_lines: 5,
            id_prefix: String::new(),
        }
    }
}

impl ImportOptions {
    /// Load options from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Deterministic identifier source, one counter per conversion.
#[derive(Debug, Default)]
pub struct IdGenerator {
    prefix: String,
    next: u64,
}

impl IdGenerator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: 0,
        }
    }

    /// Next identifier for an element of `kind`, e.g. `note-0000000003`.
    pub fn next(&mut self, kind: &str) -> String {
        self.next += 1;
        format!("{}{}-{:010}", self.prefix, kind, self.next)
    }
}

#[derive(Debug)]
pub struct ImportContext {
    pub options: ImportOptions,
    pub ids: IdGenerator,
    pub diag: Diagnostics,
    /// Divisions per quarter note
    pub ppq: i32,
    /// Beat count of the last time signature read, for barline fermatas
    pub meter_count: i32,
    pub cursor: DurationCursor,
    pub nesting: NestingStack,
    pub resolver: Resolver,
    /// Inside a `measure-repeat` run
    pub measure_repeat: bool,
    /// `attributes` already turned into staff definitions
    pub consumed: HashSet<NodeId>,
}

impl ImportContext {
    pub fn new(options: ImportOptions) -> Self {
        let ids = IdGenerator::new(&options.id_prefix);
        Self {
            options,
            ids,
            diag: Diagnostics::new(),
            ppq: 1,
            meter_count: 0,
            cursor: DurationCursor::default(),
            nesting: NestingStack::default(),
            resolver: Resolver::new(),
            measure_repeat: false,
            consumed: HashSet::new(),
        }
    }

    /// Start translating a measure: empty nesting stack, cursor at zero.
    pub fn begin_measure(&mut self, measure_n: i32) {
        self.nesting.clear();
        self.cursor.reset();
        self.diag.set_measure(Some(measure_n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_reproducible_per_instance() {
        let mut a = IdGenerator::new("");
        let mut b = IdGenerator::new("");
        assert_eq!(a.next("note"), "note-0000000001");
        assert_eq!(a.next("rest"), "rest-0000000002");
        assert_eq!(b.next("note"), "note-0000000001");
    }

    #[test]
    fn id_prefix_is_prepended() {
        let mut ids = IdGenerator::new("p1-");
        assert_eq!(ids.next("tie"), "p1-tie-0000000001");
    }

    #[test]
    fn options_from_partial_json() {
        let options = ImportOptions::from_json(r#"{"max_filler_quarters": 4}"#).unwrap();
        assert_eq!(options.max_filler_quarters, 4);
        assert_eq!(options.max_gap_quarters, 64);
        assert_eq!(options.default_staff_lines, 5);
        assert_eq!(options.id_prefix, "");
        assert!(ImportOptions::from_json("not json").is_err());
    }
}
