use tracing::{debug, info};
use ulid::Ulid;

use crate::directory::Directory;
use crate::error::AllocationError;
use crate::model::{Assignment, AssignmentPatch, TimeRange};

use super::AssignmentStore;

impl<D: Directory> AssignmentStore<D> {
    pub async fn create(
        &self,
        engineer_id: Ulid,
        project_id: Ulid,
        role: String,
        range: TimeRange,
        allocation_percentage: u32,
    ) -> Result<Assignment, AllocationError> {
        // Checked before locking so unknown ids never get a book.
        if self.directory().engineer(&engineer_id).is_none() {
            return Err(AllocationError::engineer_not_found(engineer_id));
        }
        let candidate = Assignment {
            id: Ulid::new(),
            engineer_id,
            project_id,
            role,
            allocation_percentage,
            range,
        };

        let book = self.book(engineer_id);
        let mut guard = book.write().await;
        if let Err(e) = self.validate(&candidate, &guard, None, true) {
            debug!("create rejected for engineer {engineer_id}: {e}");
            return Err(e);
        }

        self.assignment_index.insert(candidate.id, engineer_id);
        guard.insert(candidate.clone());
        info!(
            "assignment {} created: engineer {engineer_id}, project {project_id}, {}% over {}",
            candidate.id, candidate.allocation_percentage, candidate.range
        );
        Ok(candidate)
    }

    /// Validate the patched assignment as if the original were already gone,
    /// then swap it in. On any failure the original stays as it was.
    pub async fn update(
        &self,
        id: Ulid,
        patch: AssignmentPatch,
    ) -> Result<Assignment, AllocationError> {
        loop {
            let current_engineer = self
                .engineer_for(&id)
                .ok_or(AllocationError::assignment_not_found(id))?;
            let target_engineer = patch.engineer_id.unwrap_or(current_engineer);
            if target_engineer != current_engineer
                && self.directory().engineer(&target_engineer).is_none()
            {
                return Err(AllocationError::engineer_not_found(target_engineer));
            }

            let mut guards = self.lock_books(&[current_engineer, target_engineer]).await;
            let current_idx = guards
                .iter()
                .position(|(eid, _)| *eid == current_engineer)
                .ok_or(AllocationError::assignment_not_found(id))?;
            let target_idx = guards
                .iter()
                .position(|(eid, _)| *eid == target_engineer)
                .ok_or(AllocationError::engineer_not_found(target_engineer))?;

            let Some(original) = guards[current_idx].1.assignments.get(&id).cloned() else {
                // Moved or deleted while we waited for the locks.
                if self.engineer_for(&id).is_none() {
                    return Err(AllocationError::assignment_not_found(id));
                }
                continue;
            };

            let candidate = patch.apply(&original);
            if let Err(e) = self.validate(&candidate, &guards[target_idx].1, Some(id), true) {
                debug!("update of {id} rejected: {e}");
                return Err(e);
            }

            guards[current_idx].1.remove(id);
            guards[target_idx].1.insert(candidate.clone());
            if target_engineer != current_engineer {
                self.assignment_index.insert(id, target_engineer);
            }
            info!(
                "assignment {id} updated: engineer {target_engineer}, {}% over {}",
                candidate.allocation_percentage, candidate.range
            );
            return Ok(candidate);
        }
    }

    pub async fn delete(&self, id: Ulid) -> Result<Assignment, AllocationError> {
        let (engineer_id, mut guard) = self.resolve_assignment_write(&id).await?;
        let removed = guard
            .remove(id)
            .ok_or(AllocationError::assignment_not_found(id))?;
        self.assignment_index.remove(&id);
        info!("assignment {id} deleted from engineer {engineer_id}");
        Ok(removed)
    }
}
