use std::cmp::Reverse;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::classify::{classify, BucketCounts};
use crate::directory::Directory;
use crate::error::AllocationError;
use crate::model::*;
use crate::store::validate_allocation;

use super::AllocationService;

impl<D: Directory> AllocationService<D> {
    /// Every engineer with their used/available capacity on `date`,
    /// ordered by name.
    pub async fn engineers_with_capacity(&self, date: NaiveDate) -> Vec<EngineerCapacity> {
        let mut rows = Vec::new();
        for engineer in self.directory().engineers() {
            let used = self.store().allocated_on(engineer.id, date).await;
            rows.push(EngineerCapacity {
                engineer_id: engineer.id,
                available_capacity: engineer.max_capacity.saturating_sub(used),
                used_percent: used,
                bucket: classify(used, engineer.max_capacity),
                max_capacity: engineer.max_capacity,
                name: engineer.name,
            });
        }
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.engineer_id.cmp(&b.engineer_id)));
        rows
    }

    /// Engineer count per utilization bucket on `date`.
    pub async fn team_utilization(&self, date: NaiveDate) -> BucketCounts {
        self.engineers_with_capacity(date)
            .await
            .into_iter()
            .map(|row| row.bucket)
            .collect()
    }

    pub fn find_engineers(&self, filter: &EngineerFilter) -> Vec<Engineer> {
        let mut found: Vec<Engineer> = self
            .directory()
            .engineers()
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        found
    }

    pub fn project_status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for project in self.directory().projects() {
            counts.record(project.status);
        }
        counts
    }

    /// Engineers who share at least one required skill with the project and
    /// have room for `allocation_percentage` over the whole project window.
    /// Best skill match first, then most free capacity.
    ///
    /// A project with no required skills accepts every engineer.
    pub async fn candidates_for(
        &self,
        project_id: Ulid,
        allocation_percentage: u32,
    ) -> Result<Vec<Candidate>, AllocationError> {
        let project = self.open_project(project_id)?;
        validate_allocation(allocation_percentage)?;

        let mut candidates = Vec::new();
        for engineer in self.directory().engineers() {
            let matched_skills = engineer
                .skills
                .intersection(&project.required_skills)
                .count();
            if !project.required_skills.is_empty() && matched_skills == 0 {
                continue;
            }
            let free_capacity = self
                .store()
                .free_capacity(engineer.id, &project.window, engineer.max_capacity)
                .await;
            if free_capacity < allocation_percentage {
                continue;
            }
            candidates.push(Candidate {
                engineer_id: engineer.id,
                name: engineer.name,
                matched_skills,
                free_capacity,
            });
        }
        candidates.sort_by_key(|c| {
            (
                Reverse(c.matched_skills),
                Reverse(c.free_capacity),
                c.name.clone(),
            )
        });
        Ok(candidates)
    }
}
