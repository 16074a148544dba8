use chrono::NaiveDate;
use ulid::Ulid;

use crate::directory::Directory;
use crate::error::AllocationError;
use crate::model::{Assignment, AssignmentRecord, LoadSegment, TimeRange};

use super::{sort_assignments, AssignmentStore};

impl<D: Directory> AssignmentStore<D> {
    pub async fn get(&self, id: Ulid) -> Result<Assignment, AllocationError> {
        let guard = self.resolve_assignment_read(&id).await?;
        guard
            .assignments
            .get(&id)
            .cloned()
            .ok_or(AllocationError::assignment_not_found(id))
    }

    pub async fn list_by_engineer(&self, engineer_id: Ulid) -> Vec<Assignment> {
        match self.existing_book(&engineer_id) {
            Some(book) => book.read().await.sorted(),
            None => Vec::new(),
        }
    }

    pub async fn list_by_project(&self, project_id: Ulid) -> Vec<Assignment> {
        let mut out = Vec::new();
        for book in self.all_books() {
            let guard = book.read().await;
            out.extend(
                guard
                    .assignments
                    .values()
                    .filter(|a| a.project_id == project_id)
                    .cloned(),
            );
        }
        sort_assignments(&mut out);
        out
    }

    pub async fn list_all(&self) -> Vec<Assignment> {
        let mut out = Vec::new();
        for book in self.all_books() {
            let guard = book.read().await;
            out.extend(guard.assignments.values().cloned());
        }
        sort_assignments(&mut out);
        out
    }

    /// Flat records in listing order, ready for [`crate::snapshot::save`].
    pub async fn records(&self) -> Vec<AssignmentRecord> {
        self.list_all()
            .await
            .iter()
            .map(AssignmentRecord::from)
            .collect()
    }

    /// Summed allocation of `engineer_id` on `date`.
    pub async fn allocated_on(&self, engineer_id: Ulid, date: NaiveDate) -> u32 {
        match self.existing_book(&engineer_id) {
            Some(book) => book.read().await.ledger.allocated_on(date),
            None => 0,
        }
    }

    pub async fn has_assignments(&self, engineer_id: Ulid) -> bool {
        match self.existing_book(&engineer_id) {
            Some(book) => !book.read().await.ledger.is_empty(),
            None => false,
        }
    }

    pub async fn free_capacity(
        &self,
        engineer_id: Ulid,
        range: &TimeRange,
        max_capacity: u32,
    ) -> u32 {
        match self.existing_book(&engineer_id) {
            Some(book) => book
                .read()
                .await
                .ledger
                .free_capacity(range, max_capacity, None),
            None => max_capacity,
        }
    }

    /// Assignments of `engineer_id` covering `date`, read under one lock.
    pub async fn active_on(&self, engineer_id: Ulid, date: NaiveDate) -> Vec<Assignment> {
        let Some(book) = self.existing_book(&engineer_id) else {
            return Vec::new();
        };
        let guard = book.read().await;
        let day = TimeRange::single_day(date);
        let mut active: Vec<Assignment> = guard
            .ledger
            .overlapping(&day)
            .filter_map(|e| guard.assignments.get(&e.assignment_id).cloned())
            .collect();
        sort_assignments(&mut active);
        active
    }

    pub async fn load_profile(&self, engineer_id: Ulid, range: &TimeRange) -> Vec<LoadSegment> {
        match self.existing_book(&engineer_id) {
            Some(book) => book.read().await.ledger.load_profile(range),
            None => vec![LoadSegment {
                range: *range,
                allocated: 0,
            }],
        }
    }

    /// Highest summed allocation on any single day of `range`.
    pub async fn peak_load(&self, engineer_id: Ulid, range: &TimeRange) -> u32 {
        match self.existing_book(&engineer_id) {
            Some(book) => book.read().await.ledger.peak_load(range),
            None => 0,
        }
    }
}
