use std::fmt;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{ProjectStatus, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Engineer,
    Project,
    Assignment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Engineer => "engineer",
            EntityKind::Project => "project",
            EntityKind::Assignment => "assignment",
        })
    }
}

/// Every failure the allocation core can report. Validation failures never
/// change stored state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("invalid range: end {end} is before start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Ulid },

    #[error("allocation {0}% outside (0, 100]")]
    InvalidAllocation(u32),

    #[error("range {range} outside project window {window}")]
    OutOfProjectWindow { range: TimeRange, window: TimeRange },

    #[error("capacity exceeded: requested {requested}%, only {available}% available")]
    CapacityExceeded { requested: u32, available: u32 },

    #[error("project {0} is completed")]
    ProjectClosed(Ulid),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: ProjectStatus, to: ProjectStatus },

    #[error("engineer {0} still has assignments")]
    HasAssignments(Ulid),

    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl AllocationError {
    pub fn engineer_not_found(id: Ulid) -> Self {
        AllocationError::NotFound {
            kind: EntityKind::Engineer,
            id,
        }
    }

    pub fn project_not_found(id: Ulid) -> Self {
        AllocationError::NotFound {
            kind: EntityKind::Project,
            id,
        }
    }

    pub fn assignment_not_found(id: Ulid) -> Self {
        AllocationError::NotFound {
            kind: EntityKind::Assignment,
            id,
        }
    }

    /// Short label for metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            AllocationError::InvalidRange { .. } => "invalid_range",
            AllocationError::NotFound { .. } => "not_found",
            AllocationError::InvalidAllocation(_) => "invalid_allocation",
            AllocationError::OutOfProjectWindow { .. } => "out_of_project_window",
            AllocationError::CapacityExceeded { .. } => "capacity_exceeded",
            AllocationError::ProjectClosed(_) => "project_closed",
            AllocationError::InvalidTransition { .. } => "invalid_transition",
            AllocationError::HasAssignments(_) => "has_assignments",
            AllocationError::LimitExceeded(_) => "limit_exceeded",
            AllocationError::Persistence(_) => "persistence",
        }
    }
}

impl From<std::io::Error> for AllocationError {
    fn from(e: std::io::Error) -> Self {
        AllocationError::Persistence(e.to_string())
    }
}
