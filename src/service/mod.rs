mod analytics;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::classify::classify;
use crate::directory::{Directory, DirectoryAdmin};
use crate::error::AllocationError;
use crate::model::*;
use crate::observability::{self, record_mutation};
use crate::snapshot;
use crate::store::{AssignmentStore, LoadReport};

/// Entry point for callers (request handlers, analytics). Wraps the
/// assignment store with persistence, directory administration and derived
/// views so callers never recompute capacity or buckets themselves.
pub struct AllocationService<D> {
    store: AssignmentStore<D>,
}

impl<D: Directory> AllocationService<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            store: AssignmentStore::new(directory),
        }
    }

    /// Load the persisted assignment list and rebuild the ledger before
    /// returning, so no request is validated against a partial ledger.
    pub async fn open(
        directory: Arc<D>,
        snapshot_path: &Path,
    ) -> Result<(Self, LoadReport), AllocationError> {
        let path = snapshot_path.to_path_buf();
        let records = tokio::task::spawn_blocking(move || snapshot::load(&path))
            .await
            .map_err(|e| AllocationError::Persistence(e.to_string()))??;
        let service = Self::new(directory);
        let report = service.reload(records).await;
        Ok((service, report))
    }

    /// Replace all assignments with `records` (consistency repair).
    pub async fn reload(&self, records: Vec<AssignmentRecord>) -> LoadReport {
        let started = Instant::now();
        let report = self.store.rebuild(records).await;
        metrics::histogram!(observability::LEDGER_REBUILD_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(observability::RECORDS_SKIPPED_TOTAL)
            .increment(report.skipped.len() as u64);
        self.publish_count();
        report
    }

    /// Write every committed assignment to `path`. Returns the record count.
    pub async fn save(&self, path: &Path) -> Result<usize, AllocationError> {
        let records = self.store.records().await;
        let count = records.len();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || snapshot::save(&path, &records))
            .await
            .map_err(|e| AllocationError::Persistence(e.to_string()))??;
        info!("saved {count} assignments");
        Ok(count)
    }

    pub fn directory(&self) -> &D {
        self.store.directory()
    }

    pub fn store(&self) -> &AssignmentStore<D> {
        &self.store
    }

    fn publish_count(&self) {
        metrics::gauge!(observability::ASSIGNMENTS_ACTIVE).set(self.store.count() as f64);
    }

    fn engineer(&self, id: Ulid) -> Result<Engineer, AllocationError> {
        self.directory()
            .engineer(&id)
            .ok_or(AllocationError::engineer_not_found(id))
    }

    /// Project that still accepts assignment changes.
    fn open_project(&self, id: Ulid) -> Result<Project, AllocationError> {
        let project = self
            .directory()
            .project(&id)
            .ok_or(AllocationError::project_not_found(id))?;
        if project.status == ProjectStatus::Completed {
            return Err(AllocationError::ProjectClosed(id));
        }
        Ok(project)
    }

    // ── Mutations ────────────────────────────────────────────

    pub async fn create(
        &self,
        engineer_id: Ulid,
        project_id: Ulid,
        role: impl Into<String>,
        range: TimeRange,
        allocation_percentage: u32,
    ) -> Result<Assignment, AllocationError> {
        let result = self
            .store
            .create(engineer_id, project_id, role.into(), range, allocation_percentage)
            .await;
        record_mutation("create", &result);
        self.publish_count();
        result
    }

    pub async fn update(
        &self,
        id: Ulid,
        patch: AssignmentPatch,
    ) -> Result<Assignment, AllocationError> {
        let result = self.store.update(id, patch).await;
        record_mutation("update", &result);
        result
    }

    pub async fn delete(&self, id: Ulid) -> Result<Assignment, AllocationError> {
        let result = self.store.delete(id).await;
        record_mutation("delete", &result);
        self.publish_count();
        result
    }

    // ── Queries ──────────────────────────────────────────────

    pub async fn get(&self, id: Ulid) -> Result<Assignment, AllocationError> {
        self.store.get(id).await
    }

    pub async fn list_by_engineer(&self, engineer_id: Ulid) -> Vec<Assignment> {
        self.store.list_by_engineer(engineer_id).await
    }

    pub async fn list_by_project(&self, project_id: Ulid) -> Vec<Assignment> {
        self.store.list_by_project(project_id).await
    }

    pub async fn list_all(&self) -> Vec<Assignment> {
        self.store.list_all().await
    }

    /// Room left for a flat allocation across all of `range`.
    pub async fn free_capacity(
        &self,
        engineer_id: Ulid,
        range: &TimeRange,
    ) -> Result<u32, AllocationError> {
        let engineer = self.engineer(engineer_id)?;
        Ok(self
            .store
            .free_capacity(engineer_id, range, engineer.max_capacity)
            .await)
    }

    pub async fn free_capacity_on(
        &self,
        engineer_id: Ulid,
        date: NaiveDate,
    ) -> Result<u32, AllocationError> {
        self.free_capacity(engineer_id, &TimeRange::single_day(date)).await
    }

    pub async fn load_profile(
        &self,
        engineer_id: Ulid,
        range: &TimeRange,
    ) -> Result<Vec<LoadSegment>, AllocationError> {
        self.engineer(engineer_id)?;
        Ok(self.store.load_profile(engineer_id, range).await)
    }

    pub async fn peak_load(
        &self,
        engineer_id: Ulid,
        range: &TimeRange,
    ) -> Result<u32, AllocationError> {
        self.engineer(engineer_id)?;
        Ok(self.store.peak_load(engineer_id, range).await)
    }

    pub async fn engineer_snapshot(
        &self,
        engineer_id: Ulid,
        date: NaiveDate,
    ) -> Result<EngineerSnapshot, AllocationError> {
        let engineer = self.engineer(engineer_id)?;
        let active = self.store.active_on(engineer_id, date).await;
        let used: u32 = active.iter().map(|a| a.allocation_percentage).sum();
        Ok(EngineerSnapshot {
            engineer_id,
            date,
            max_capacity: engineer.max_capacity,
            used_percent: used,
            free_capacity: engineer.max_capacity.saturating_sub(used),
            bucket: classify(used, engineer.max_capacity),
            active_assignments: active,
        })
    }
}

impl<D: DirectoryAdmin> AllocationService<D> {
    /// Remove an engineer from the directory. Refused while any assignment
    /// still references them.
    pub async fn retire_engineer(&self, engineer_id: Ulid) -> Result<Engineer, AllocationError> {
        self.engineer(engineer_id)?;
        // Holding the book's write lock keeps a concurrent create out.
        let book = self.store.book(engineer_id);
        let guard = book.write().await;
        if !guard.ledger.is_empty() {
            return Err(AllocationError::HasAssignments(engineer_id));
        }
        let engineer = self
            .directory()
            .remove_engineer(&engineer_id)
            .ok_or(AllocationError::engineer_not_found(engineer_id))?;
        self.store.discard_book(&engineer_id);
        drop(guard);
        info!("engineer {engineer_id} retired");
        Ok(engineer)
    }

    pub fn advance_project(
        &self,
        project_id: Ulid,
        status: ProjectStatus,
    ) -> Result<Project, AllocationError> {
        let project = self.directory().set_project_status(&project_id, status)?;
        info!("project {project_id} moved to {status}");
        Ok(project)
    }
}
