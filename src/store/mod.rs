mod mutations;
mod queries;
mod validate;
#[cfg(test)]
mod tests;

pub use validate::{validate_allocation, validate_range, validate_role};

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{info, warn};
use ulid::Ulid;

use crate::directory::Directory;
use crate::error::AllocationError;
use crate::ledger::{EngineerLedger, LedgerEntry};
use crate::model::{Assignment, AssignmentRecord};

pub type SharedBook = Arc<RwLock<EngineerBook>>;

/// Everything held for one engineer: the assignment records and the
/// capacity ledger derived from them. One lock guards both so a mutation
/// validates and commits against the same view.
#[derive(Debug)]
pub struct EngineerBook {
    pub engineer_id: Ulid,
    pub ledger: EngineerLedger,
    pub assignments: HashMap<Ulid, Assignment>,
}

impl EngineerBook {
    pub fn new(engineer_id: Ulid) -> Self {
        Self {
            engineer_id,
            ledger: EngineerLedger::new(),
            assignments: HashMap::new(),
        }
    }

    pub fn insert(&mut self, assignment: Assignment) {
        self.ledger.add(LedgerEntry::from(&assignment));
        self.assignments.insert(assignment.id, assignment);
    }

    pub fn remove(&mut self, id: Ulid) -> Option<Assignment> {
        self.ledger.remove(id);
        self.assignments.remove(&id)
    }

    /// Records ordered by start date, ties broken by id.
    pub fn sorted(&self) -> Vec<Assignment> {
        let mut all: Vec<Assignment> = self.assignments.values().cloned().collect();
        sort_assignments(&mut all);
        all
    }
}

pub(crate) fn sort_assignments(assignments: &mut [Assignment]) {
    assignments.sort_by(|a, b| {
        a.range
            .start()
            .cmp(&b.range.start())
            .then(a.id.cmp(&b.id))
    });
}

/// Outcome of replaying persisted records into the store.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<(Ulid, AllocationError)>,
}

/// Owns assignment records and is the only writer of the capacity ledgers.
pub struct AssignmentStore<D> {
    directory: Arc<D>,
    pub(super) books: DashMap<Ulid, SharedBook>,
    /// Reverse lookup: assignment id → engineer id
    pub(super) assignment_index: DashMap<Ulid, Ulid>,
}

impl<D: Directory> AssignmentStore<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            directory,
            books: DashMap::new(),
            assignment_index: DashMap::new(),
        }
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// Number of committed assignments.
    pub fn count(&self) -> usize {
        self.assignment_index.len()
    }

    pub fn engineer_for(&self, assignment_id: &Ulid) -> Option<Ulid> {
        self.assignment_index.get(assignment_id).map(|e| *e.value())
    }

    /// Book for `engineer_id`, created empty on first use.
    pub fn book(&self, engineer_id: Ulid) -> SharedBook {
        self.books
            .entry(engineer_id)
            .or_insert_with(|| Arc::new(RwLock::new(EngineerBook::new(engineer_id))))
            .value()
            .clone()
    }

    pub(crate) fn existing_book(&self, engineer_id: &Ulid) -> Option<SharedBook> {
        self.books.get(engineer_id).map(|e| e.value().clone())
    }

    /// Forget an engineer's book. Caller holds its write lock and has
    /// checked it is empty.
    pub(crate) fn discard_book(&self, engineer_id: &Ulid) {
        self.books.remove(engineer_id);
    }

    /// Snapshot of all book handles. Never hold DashMap refs across an await.
    pub(super) fn all_books(&self) -> Vec<SharedBook> {
        self.books.iter().map(|e| e.value().clone()).collect()
    }

    /// Acquire write locks on several books in sorted id order to prevent deadlocks.
    pub(super) async fn lock_books(
        &self,
        engineer_ids: &[Ulid],
    ) -> Vec<(Ulid, OwnedRwLockWriteGuard<EngineerBook>)> {
        let mut ids = engineer_ids.to_vec();
        ids.sort();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let guard = self.book(id).write_owned().await;
            guards.push((id, guard));
        }
        guards
    }

    /// Lookup assignment → engineer, acquire that engineer's write lock, and
    /// confirm the record is still there (it may have moved while we waited).
    pub(super) async fn resolve_assignment_write(
        &self,
        assignment_id: &Ulid,
    ) -> Result<(Ulid, OwnedRwLockWriteGuard<EngineerBook>), AllocationError> {
        loop {
            let engineer_id = self
                .engineer_for(assignment_id)
                .ok_or(AllocationError::assignment_not_found(*assignment_id))?;
            let guard = self.book(engineer_id).write_owned().await;
            if guard.assignments.contains_key(assignment_id) {
                return Ok((engineer_id, guard));
            }
            if self.engineer_for(assignment_id) == Some(engineer_id) {
                return Err(AllocationError::assignment_not_found(*assignment_id));
            }
        }
    }

    pub(super) async fn resolve_assignment_read(
        &self,
        assignment_id: &Ulid,
    ) -> Result<OwnedRwLockReadGuard<EngineerBook>, AllocationError> {
        loop {
            let engineer_id = self
                .engineer_for(assignment_id)
                .ok_or(AllocationError::assignment_not_found(*assignment_id))?;
            let guard = self.book(engineer_id).read_owned().await;
            if guard.assignments.contains_key(assignment_id) {
                return Ok(guard);
            }
            if self.engineer_for(assignment_id) == Some(engineer_id) {
                return Err(AllocationError::assignment_not_found(*assignment_id));
            }
        }
    }

    /// Clear all books and replay `records` in start-date order, validating
    /// each against the directory and the ledger built so far. Records that
    /// fail are logged and left out; the rest are loaded.
    pub async fn rebuild(&self, records: Vec<AssignmentRecord>) -> LoadReport {
        self.books.clear();
        self.assignment_index.clear();

        let mut report = LoadReport::default();
        let mut assignments = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id;
            match Assignment::try_from(record) {
                Ok(a) => assignments.push(a),
                Err(e) => {
                    warn!("skipping persisted assignment {id}: {e}");
                    report.skipped.push((id, e));
                }
            }
        }
        sort_assignments(&mut assignments);

        for assignment in assignments {
            let id = assignment.id;
            if self.assignment_index.contains_key(&id) {
                let e = AllocationError::Persistence(format!("duplicate assignment id {id}"));
                warn!("skipping persisted assignment {id}: {e}");
                report.skipped.push((id, e));
                continue;
            }
            if self.directory.engineer(&assignment.engineer_id).is_none() {
                let e = AllocationError::engineer_not_found(assignment.engineer_id);
                warn!("skipping persisted assignment {id}: {e}");
                report.skipped.push((id, e));
                continue;
            }
            let book = self.book(assignment.engineer_id);
            let mut guard = book.write().await;
            if let Err(e) = self.validate(&assignment, &guard, None, false) {
                warn!("skipping persisted assignment {id}: {e}");
                report.skipped.push((id, e));
                continue;
            }
            self.assignment_index.insert(id, assignment.engineer_id);
            guard.insert(assignment);
            report.loaded += 1;
        }

        info!(
            "ledger rebuilt: {} assignments loaded, {} skipped",
            report.loaded,
            report.skipped.len()
        );
        report
    }
}
