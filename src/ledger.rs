use std::collections::BTreeMap;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{Assignment, LoadSegment, TimeRange};

/// One allocation interval held by an engineer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub assignment_id: Ulid,
    pub range: TimeRange,
    pub allocation: u32,
}

impl From<&Assignment> for LedgerEntry {
    fn from(a: &Assignment) -> Self {
        Self {
            assignment_id: a.id,
            range: a.range,
            allocation: a.allocation_percentage,
        }
    }
}

/// Capacity index for a single engineer: allocation intervals sorted by
/// `range.start`. Derived from the assignment set and replayed from it on load.
#[derive(Debug, Clone, Default)]
pub struct EngineerLedger {
    entries: Vec<LedgerEntry>,
}

impl EngineerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert entry maintaining sort order by range start. O(k) in the
    /// number of entries held (binary search, then a shift).
    pub fn add(&mut self, entry: LedgerEntry) {
        let pos = self
            .entries
            .partition_point(|e| e.range.start() <= entry.range.start());
        self.entries.insert(pos, entry);
    }

    /// Remove entry by assignment id. O(k): linear scan, then a shift.
    pub fn remove(&mut self, assignment_id: Ulid) -> Option<LedgerEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.assignment_id == assignment_id)?;
        Some(self.entries.remove(pos))
    }

    /// Entries whose range shares at least one date with `query`.
    /// Everything starting after `query.end` is skipped via binary search.
    pub fn overlapping(&self, query: &TimeRange) -> impl Iterator<Item = &LedgerEntry> {
        let right_bound = self
            .entries
            .partition_point(|e| e.range.start() <= query.end());
        self.entries[..right_bound]
            .iter()
            .filter(move |e| e.range.end() >= query.start())
    }

    /// Summed allocation of every entry overlapping `query`, optionally
    /// ignoring one assignment (the record being updated).
    pub fn allocated(&self, query: &TimeRange, exclude: Option<Ulid>) -> u32 {
        self.overlapping(query)
            .filter(|e| Some(e.assignment_id) != exclude)
            .map(|e| e.allocation)
            .sum()
    }

    /// `max_capacity` minus the summed allocation of everything overlapping
    /// `query`. Allocations are flat over their range, so this is the room
    /// left for a new flat allocation across all of `query`.
    pub fn free_capacity(
        &self,
        query: &TimeRange,
        max_capacity: u32,
        exclude: Option<Ulid>,
    ) -> u32 {
        max_capacity.saturating_sub(self.allocated(query, exclude))
    }

    /// Summed allocation of every entry active on `date`.
    pub fn allocated_on(&self, date: NaiveDate) -> u32 {
        self.allocated(&TimeRange::single_day(date), None)
    }

    /// Sweep line over the entries: maximal sub-ranges of `query` with a
    /// constant summed allocation, covering `query` end to end.
    pub fn load_profile(&self, query: &TimeRange) -> Vec<LoadSegment> {
        // +allocation on the first day, -allocation the day after the last.
        let mut deltas: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for e in self.overlapping(query) {
            let Some(clamped) = e.range.intersection(query) else {
                continue;
            };
            *deltas.entry(clamped.start()).or_default() += i64::from(e.allocation);
            if let Some(after) = clamped.end().succ_opt() {
                *deltas.entry(after).or_default() -= i64::from(e.allocation);
            }
        }

        let mut segments: Vec<LoadSegment> = Vec::new();
        let mut cursor = query.start();
        let mut load: i64 = 0;

        for (&date, &delta) in &deltas {
            if date > cursor
                && let Some(last_day) = date.pred_opt()
            {
                push_segment(&mut segments, cursor, last_day.min(query.end()), load);
                cursor = date;
            }
            load += delta;
        }
        if cursor <= query.end() {
            push_segment(&mut segments, cursor, query.end(), load);
        }
        segments
    }

    /// Highest summed allocation on any single date of `query`.
    pub fn peak_load(&self, query: &TimeRange) -> u32 {
        self.load_profile(query)
            .iter()
            .map(|s| s.allocated)
            .max()
            .unwrap_or(0)
    }
}

/// Append a segment, merging into the previous one when the load is unchanged.
fn push_segment(segments: &mut Vec<LoadSegment>, start: NaiveDate, end: NaiveDate, load: i64) {
    if start > end {
        return;
    }
    let allocated = u32::try_from(load.max(0)).unwrap_or(u32::MAX);
    if let Some(last) = segments.last_mut()
        && last.allocated == allocated
        && last.range.end().succ_opt() == Some(start)
    {
        last.range = TimeRange::ordered(last.range.start(), end);
        return;
    }
    segments.push(LoadSegment {
        range: TimeRange::ordered(start, end),
        allocated,
    });
}
