use ulid::Ulid;

use crate::directory::Directory;
use crate::error::AllocationError;
use crate::limits::*;
use crate::model::{Assignment, ProjectStatus, TimeRange};

use super::{AssignmentStore, EngineerBook};

pub fn validate_allocation(pct: u32) -> Result<(), AllocationError> {
    if pct == 0 || pct > MAX_ALLOCATION_PERCENT {
        return Err(AllocationError::InvalidAllocation(pct));
    }
    Ok(())
}

pub fn validate_role(role: &str) -> Result<(), AllocationError> {
    if role.len() > MAX_ROLE_LEN {
        return Err(AllocationError::LimitExceeded("role too long"));
    }
    Ok(())
}

pub fn validate_range(range: &TimeRange) -> Result<(), AllocationError> {
    if range.days() > MAX_RANGE_DAYS {
        return Err(AllocationError::LimitExceeded("range too wide"));
    }
    Ok(())
}

/// Reject `candidate` if it would push its engineer past `max_capacity`.
/// `exclude` names a record already in the book that the candidate replaces.
pub(crate) fn check_capacity(
    book: &EngineerBook,
    candidate: &Assignment,
    max_capacity: u32,
    exclude: Option<Ulid>,
) -> Result<(), AllocationError> {
    let replaced = exclude.is_some_and(|id| book.assignments.contains_key(&id));
    let held = book.ledger.len() - usize::from(replaced);
    if held >= MAX_ASSIGNMENTS_PER_ENGINEER {
        return Err(AllocationError::LimitExceeded("too many assignments for engineer"));
    }
    let available = book
        .ledger
        .free_capacity(&candidate.range, max_capacity, exclude);
    if available < candidate.allocation_percentage {
        return Err(AllocationError::CapacityExceeded {
            requested: candidate.allocation_percentage,
            available,
        });
    }
    Ok(())
}

impl<D: Directory> AssignmentStore<D> {
    /// Preconditions shared by create, update and rebuild, in order:
    /// engineer exists, project exists, project still open (when
    /// `require_open`), allocation in (0, 100], range inside the project
    /// window, enough free capacity.
    ///
    /// Caller holds the write lock on `book`, which must be the candidate
    /// engineer's book. Rebuild passes `require_open = false` so records of
    /// completed projects survive a reload.
    pub(super) fn validate(
        &self,
        candidate: &Assignment,
        book: &EngineerBook,
        exclude: Option<Ulid>,
        require_open: bool,
    ) -> Result<(), AllocationError> {
        debug_assert_eq!(book.engineer_id, candidate.engineer_id);
        let engineer = self
            .directory()
            .engineer(&candidate.engineer_id)
            .ok_or(AllocationError::engineer_not_found(candidate.engineer_id))?;
        let project = self
            .directory()
            .project(&candidate.project_id)
            .ok_or(AllocationError::project_not_found(candidate.project_id))?;
        if require_open && project.status == ProjectStatus::Completed {
            return Err(AllocationError::ProjectClosed(project.id));
        }
        validate_allocation(candidate.allocation_percentage)?;
        validate_role(&candidate.role)?;
        validate_range(&candidate.range)?;
        if !project.window.contains(&candidate.range) {
            return Err(AllocationError::OutOfProjectWindow {
                range: candidate.range,
                window: project.window,
            });
        }
        check_capacity(book, candidate, engineer.max_capacity, exclude)
    }
}
