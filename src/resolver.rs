//! Deferred cross-references between notes and floating annotations.
//!
//! Control elements are created while measures are scanned and stored here
//! in creation order, tagged with the measure number they were read in.
//! Open spanners are remembered by index until their closing counterpart
//! arrives; annotations that precede their note wait on a pending list
//! until the next note is read.

use std::collections::HashMap;

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::model::{ControlElement, PitchName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTie {
    pub staff: u32,
    pub layer: u32,
    pub pname: Option<PitchName>,
    pub oct: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSlur {
    pub staff: u32,
    pub layer: u32,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenHairpin {
    pub number: i32,
    /// Last note read while the hairpin was open
    pub end_id: Option<String>,
}

/// Annotations that attach to the next note read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Dir,
    Dynam,
    Harm,
    Octave,
    Pedal,
    Tempo,
}

#[derive(Debug, Default)]
pub struct Resolver {
    elements: Vec<(i32, ControlElement)>,
    ties: Vec<(usize, OpenTie)>,
    slurs: Vec<(usize, OpenSlur)>,
    hairpins: Vec<(usize, OpenHairpin)>,
    octaves: Vec<(usize, u32)>,
    pending: Vec<(PendingKind, usize)>,
    octave_dis: HashMap<u32, i32>,
    last_id: Option<String>,
}

/// `#id` reference to an element identifier.
pub fn reference(id: &str) -> String {
    format!("#{id}")
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a control element read in measure `measure_n`.
    pub fn add(&mut self, measure_n: i32, element: ControlElement) -> usize {
        self.elements.push((measure_n, element));
        self.elements.len() - 1
    }

    /// Store a control element that waits for the next note.
    pub fn add_pending(&mut self, measure_n: i32, kind: PendingKind, element: ControlElement) -> usize {
        let idx = self.add(measure_n, element);
        self.pending.push((kind, idx));
        idx
    }

    pub fn get(&self, idx: usize) -> Option<&ControlElement> {
        self.elements.get(idx).map(|(_, e)| e)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut ControlElement> {
        self.elements.get_mut(idx).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn pending_count(&self, kind: PendingKind) -> usize {
        self.pending.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn open_ties(&self) -> &[(usize, OpenTie)] {
        &self.ties
    }

    pub fn open_slurs(&self) -> &[(usize, OpenSlur)] {
        &self.slurs
    }

    pub fn open_hairpins(&self) -> &[(usize, OpenHairpin)] {
        &self.hairpins
    }

    /// Reference (`#id`) of the last note, rest or chord read.
    pub fn last_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    pub fn set_last_id(&mut self, id: &str) {
        self.last_id = Some(reference(id));
    }

    // ─── Ties ────────────────────────────────────────────────────────

    /// Register a tie starting at `note_id`.
    pub fn open_tie(&mut self, measure_n: i32, mut tie: ControlElement, note_id: &str, key: OpenTie) {
        tie.start_id = Some(reference(note_id));
        let idx = self.add(measure_n, tie);
        self.ties.push((idx, key));
    }

    /// Close the first open tie matching `key` on `note_id`.
    ///
    /// Every pitched note tries to close a tie; `explicit` tells whether the
    /// note actually carried a tie stop. Returns whether a tie was closed.
    pub fn close_tie(&mut self, key: &OpenTie, note_id: &str, explicit: bool, diag: &mut Diagnostics) -> bool {
        let Some(pos) = self.ties.iter().position(|(_, open)| open == key) else {
            if explicit {
                diag.warn(
                    WarningKind::Unmatched,
                    format!("Tie stop on note '{note_id}' could not be matched"),
                );
            }
            return false;
        };
        let (idx, _) = self.ties.remove(pos);
        if let Some(tie) = self.get_mut(idx) {
            tie.end_id = Some(reference(note_id));
        }
        if !explicit {
            diag.warn(
                WarningKind::Unmatched,
                format!("Closing tie for note '{note_id}' even though tie stop is missing"),
            );
        }
        true
    }

    // ─── Slurs ───────────────────────────────────────────────────────

    /// Register a slur starting at the last element read.
    pub fn open_slur(&mut self, measure_n: i32, mut slur: ControlElement, key: OpenSlur) {
        slur.start_id = self.last_id.clone();
        let idx = self.add(measure_n, slur);
        self.slurs.push((idx, key));
    }

    pub fn close_slur(&mut self, key: &OpenSlur, element_id: &str, diag: &mut Diagnostics) -> bool {
        let Some(pos) = self.slurs.iter().position(|(_, open)| open == key) else {
            diag.warn(
                WarningKind::Unmatched,
                format!("Closing slur for element '{element_id}' could not be matched"),
            );
            return false;
        };
        let (idx, _) = self.slurs.remove(pos);
        if let Some(slur) = self.get_mut(idx) {
            slur.end_id = Some(reference(element_id));
        }
        true
    }

    // ─── Hairpins ────────────────────────────────────────────────────

    pub fn open_hairpin(&mut self, measure_n: i32, hairpin: ControlElement, number: i32) {
        let idx = self.add(measure_n, hairpin);
        self.hairpins.push((idx, OpenHairpin { number, end_id: None }));
    }

    /// Close the first open hairpin with `number`; it ends on the last note
    /// read while it was open.
    pub fn close_hairpin(&mut self, number: i32, diag: &mut Diagnostics) -> bool {
        let Some(pos) = self.hairpins.iter().position(|(_, open)| open.number == number) else {
            diag.warn(
                WarningKind::Unmatched,
                format!("Closing hairpin {number} could not be matched"),
            );
            return false;
        };
        let (idx, open) = self.hairpins.remove(pos);
        if let Some(hairpin) = self.get_mut(idx) {
            hairpin.end_id = open.end_id;
        }
        true
    }

    // ─── Octave shifts ───────────────────────────────────────────────

    /// Active octave displacement of a global staff.
    pub fn octave_displacement(&self, staff: u32) -> i32 {
        self.octave_dis.get(&staff).copied().unwrap_or(0)
    }

    pub fn start_octave(&mut self, measure_n: i32, octave: ControlElement, staff: u32, displacement: i32) {
        self.octave_dis.insert(staff, displacement);
        let idx = self.add_pending(measure_n, PendingKind::Octave, octave);
        self.octaves.push((idx, staff));
    }

    /// Clear the displacement of `staff` and end its most recent open octave
    /// on the last note read.
    pub fn stop_octave(&mut self, staff: u32, diag: &mut Diagnostics) -> bool {
        self.octave_dis.insert(staff, 0);
        let Some(pos) = self.octaves.iter().rposition(|&(_, s)| s == staff) else {
            diag.warn(
                WarningKind::Unmatched,
                format!("Octave shift stop on staff {staff} could not be matched"),
            );
            return false;
        };
        let (idx, _) = self.octaves.remove(pos);
        let end_id = self.last_id.clone();
        if let Some(octave) = self.get_mut(idx) {
            octave.end_id = end_id;
        }
        true
    }

    // ─── Note attachment ─────────────────────────────────────────────

    /// Attach every pending annotation to the note `note_id` on `staff`, and
    /// extend open hairpins to it.
    pub fn attach_pending(&mut self, note_id: &str, staff: u32) {
        let start = reference(note_id);
        for (_, idx) in std::mem::take(&mut self.pending) {
            if let Some((_, element)) = self.elements.get_mut(idx) {
                element.staff = vec![staff];
                element.start_id = Some(start.clone());
            }
        }
        for (idx, open) in &mut self.hairpins {
            if let Some((_, hairpin)) = self.elements.get_mut(*idx) {
                if hairpin.start_id.is_none() {
                    hairpin.staff = vec![staff];
                    hairpin.start_id = Some(start.clone());
                }
            }
            open.end_id = Some(start.clone());
        }
    }

    /// Hand over all control elements in creation order.
    pub fn into_elements(self) -> Vec<(i32, ControlElement)> {
        self.elements
    }
}
