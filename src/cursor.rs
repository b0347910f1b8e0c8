//! Elapsed-time tracking within a measure, and sizing of invisible fillers.

use crate::model::Duration;

/// Signed accumulator of elapsed divisions in the current measure.
///
/// Never used to reject input, only to size fillers after `<backup>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DurationCursor {
    total: i32,
}

impl DurationCursor {
    pub fn reset(&mut self) {
        self.total = 0;
    }

    pub fn advance(&mut self, divisions: i32) {
        self.total = self.total.saturating_add(divisions);
    }

    pub fn rewind(&mut self, divisions: i32) {
        self.total = self.total.saturating_sub(divisions);
    }

    pub fn position(&self) -> i32 {
        self.total
    }
}

/// Sub-units of a quarter note used for filler arithmetic (one 256th note).
const UNITS_PER_QUARTER: i64 = 64;

/// Power-of-two note values, longest first, with their length in units.
const FILLER_VALUES: [(Duration, i64); 9] = [
    (Duration::Whole, 256),
    (Duration::Half, 128),
    (Duration::Quarter, 64),
    (Duration::Eighth, 32),
    (Duration::D16, 16),
    (Duration::D32, 8),
    (Duration::D64, 4),
    (Duration::D128, 2),
    (Duration::D256, 1),
];

/// Result of splitting a time gap into filler durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filler {
    pub durations: Vec<Duration>,
    /// Divisions that could not be expressed (shorter than a 256th note)
    pub remainder: i32,
}

/// Split `gap` divisions into filler note values, longest first.
///
/// Whole quarters are used while the gap is at least a quarter, each element
/// capped at `max_quarters` (2 gives at most a half note per element).
/// Shorter gaps fall back to the largest fitting sub-quarter value.
pub fn filler_durations(gap: i32, ppq: i32, max_quarters: u32) -> Filler {
    if gap <= 0 || ppq <= 0 {
        return Filler {
            durations: Vec::new(),
            remainder: gap.max(0),
        };
    }
    let ppq = ppq as i64;
    let cap = (max_quarters.max(1) as i64) * UNITS_PER_QUARTER;
    let mut units = gap as i64 * UNITS_PER_QUARTER / ppq;
    let lost = gap as i64 * UNITS_PER_QUARTER % ppq;

    let mut durations = Vec::new();
    while units > 0 {
        let limit = units.min(cap);
        match FILLER_VALUES.iter().find(|(_, len)| *len <= limit) {
            Some(&(dur, len)) => {
                durations.push(dur);
                units -= len;
            }
            None => break,
        }
    }

    Filler {
        durations,
        remainder: (lost / UNITS_PER_QUARTER) as i32,
    }
}

/// Length of a filler sequence in divisions.
#[cfg(test)]
fn filler_length(durations: &[Duration], ppq: i32) -> i32 {
    durations
        .iter()
        .filter_map(|d| d.quarters())
        .map(|q| (q * ppq as f64).round() as i32)
        .sum()
}
