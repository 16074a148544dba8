use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::classify::Bucket;
use crate::error::AllocationError;

/// Inclusive calendar-date interval `[start, end]`.
///
/// Dates carry no time-of-day, so two ranges touching on a single day overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeRepr", into = "RangeRepr")]
pub struct TimeRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Serialize, Deserialize)]
struct RangeRepr {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RangeRepr> for TimeRange {
    type Error = AllocationError;

    fn try_from(repr: RangeRepr) -> Result<Self, Self::Error> {
        TimeRange::new(repr.start, repr.end)
    }
}

impl From<TimeRange> for RangeRepr {
    fn from(range: TimeRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AllocationError> {
        if end < start {
            return Err(AllocationError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build a range the caller already knows is ordered.
    pub(crate) fn ordered(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "TimeRange start must not be after end");
        Self { start, end }
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns true if `self` fully contains `inner`.
    pub fn contains(&self, inner: &TimeRange) -> bool {
        self.start <= inner.start && inner.end <= self.end
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self::ordered(
            self.start.max(other.start),
            self.end.min(other.end),
        ))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Junior,
    Mid,
    Senior,
}

/// Project lifecycle. Transitions only move forward one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Planning,
    Active,
    Completed,
}

impl ProjectStatus {
    pub fn next(self) -> Option<ProjectStatus> {
        match self {
            ProjectStatus::Planning => Some(ProjectStatus::Active),
            ProjectStatus::Active => Some(ProjectStatus::Completed),
            ProjectStatus::Completed => None,
        }
    }

    pub fn advance_to(self, to: ProjectStatus) -> Result<ProjectStatus, AllocationError> {
        if self.next() == Some(to) {
            Ok(to)
        } else {
            Err(AllocationError::InvalidTransition { from: self, to })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engineer {
    pub id: Ulid,
    pub name: String,
    /// Capacity ceiling in percent units, typically 100.
    pub max_capacity: u32,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    pub seniority: Seniority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Ulid,
    pub name: String,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
    pub team_size: u32,
    pub status: ProjectStatus,
    pub window: TimeRange,
}

/// A time-bounded share of one engineer's capacity committed to one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Ulid,
    pub engineer_id: Ulid,
    pub project_id: Ulid,
    pub role: String,
    pub allocation_percentage: u32,
    pub range: TimeRange,
}

/// Flat persisted form of an [`Assignment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub id: Ulid,
    pub engineer_id: Ulid,
    pub project_id: Ulid,
    pub role: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub allocation_percentage: u32,
}

impl From<&Assignment> for AssignmentRecord {
    fn from(a: &Assignment) -> Self {
        Self {
            id: a.id,
            engineer_id: a.engineer_id,
            project_id: a.project_id,
            role: a.role.clone(),
            start_date: a.range.start(),
            end_date: a.range.end(),
            allocation_percentage: a.allocation_percentage,
        }
    }
}

impl TryFrom<AssignmentRecord> for Assignment {
    type Error = AllocationError;

    fn try_from(r: AssignmentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            engineer_id: r.engineer_id,
            project_id: r.project_id,
            role: r.role,
            allocation_percentage: r.allocation_percentage,
            range: TimeRange::new(r.start_date, r.end_date)?,
        })
    }
}

/// Partial update of an assignment. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPatch {
    pub engineer_id: Option<Ulid>,
    pub project_id: Option<Ulid>,
    pub role: Option<String>,
    pub range: Option<TimeRange>,
    pub allocation_percentage: Option<u32>,
}

impl AssignmentPatch {
    /// The assignment as it would look after this patch.
    pub fn apply(&self, current: &Assignment) -> Assignment {
        Assignment {
            id: current.id,
            engineer_id: self.engineer_id.unwrap_or(current.engineer_id),
            project_id: self.project_id.unwrap_or(current.project_id),
            role: self.role.clone().unwrap_or_else(|| current.role.clone()),
            allocation_percentage: self
                .allocation_percentage
                .unwrap_or(current.allocation_percentage),
            range: self.range.unwrap_or(current.range),
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// A maximal sub-range over which an engineer's summed allocation is constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadSegment {
    pub range: TimeRange,
    pub allocated: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineerSnapshot {
    pub engineer_id: Ulid,
    pub date: NaiveDate,
    pub max_capacity: u32,
    pub used_percent: u32,
    pub free_capacity: u32,
    pub bucket: Bucket,
    pub active_assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineerCapacity {
    pub engineer_id: Ulid,
    pub name: String,
    pub max_capacity: u32,
    pub available_capacity: u32,
    pub used_percent: u32,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineerFilter {
    /// Case-insensitive substring of the engineer's name.
    pub name_contains: Option<String>,
    pub skill: Option<String>,
}

impl EngineerFilter {
    pub fn matches(&self, engineer: &Engineer) -> bool {
        let name_ok = self.name_contains.as_ref().is_none_or(|needle| {
            engineer
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        let skill_ok = self
            .skill
            .as_ref()
            .is_none_or(|skill| engineer.skills.contains(skill));
        name_ok && skill_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub engineer_id: Ulid,
    pub name: String,
    pub matched_skills: usize,
    pub free_capacity: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub planning: usize,
    pub active: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ProjectStatus) {
        match status {
            ProjectStatus::Planning => self.planning += 1,
            ProjectStatus::Active => self.active += 1,
            ProjectStatus::Completed => self.completed += 1,
        }
    }
}
