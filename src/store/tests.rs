use std::sync::Arc;

use chrono::NaiveDate;
use ulid::Ulid;

use super::*;
use crate::directory::InMemoryDirectory;
use crate::model::*;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, day).unwrap()
}

fn r(from: (u32, u32), to: (u32, u32)) -> TimeRange {
    TimeRange::new(d(from.0, from.1), d(to.0, to.1)).unwrap()
}

fn add_engineer(dir: &InMemoryDirectory, max_capacity: u32) -> Ulid {
    let id = Ulid::new();
    dir.upsert_engineer(Engineer {
        id,
        name: format!("eng-{id}"),
        max_capacity,
        skills: Default::default(),
        seniority: Seniority::Mid,
    })
    .unwrap();
    id
}

fn add_project(dir: &InMemoryDirectory, window: TimeRange) -> Ulid {
    let id = Ulid::new();
    dir.upsert_project(Project {
        id,
        name: format!("proj-{id}"),
        required_skills: Default::default(),
        team_size: 4,
        status: ProjectStatus::Active,
        window,
    })
    .unwrap();
    id
}

fn setup() -> (Arc<InMemoryDirectory>, AssignmentStore<InMemoryDirectory>) {
    let dir = Arc::new(InMemoryDirectory::new());
    let store = AssignmentStore::new(dir.clone());
    (dir, store)
}

#[tokio::test]
async fn create_and_get() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (12, 31)));

    let a = store
        .create(e, p, "backend".into(), r((1, 1), (1, 31)), 60)
        .await
        .unwrap();
    assert_eq!(store.get(a.id).await.unwrap(), a);
    assert_eq!(store.engineer_for(&a.id), Some(e));
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn create_checks_preconditions_in_order() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((2, 1), (2, 28)));

    // unknown engineer wins over unknown project
    let err = store
        .create(Ulid::new(), Ulid::new(), "x".into(), r((2, 1), (2, 2)), 500)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::NotFound { kind: crate::EntityKind::Engineer, .. }));

    let err = store
        .create(e, Ulid::new(), "x".into(), r((2, 1), (2, 2)), 500)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::NotFound { kind: crate::EntityKind::Project, .. }));

    // bad percentage wins over bad window
    let err = store
        .create(e, p, "x".into(), r((1, 1), (1, 10)), 0)
        .await
        .unwrap_err();
    assert_eq!(err, AllocationError::InvalidAllocation(0));
    let err = store
        .create(e, p, "x".into(), r((1, 1), (1, 10)), 101)
        .await
        .unwrap_err();
    assert_eq!(err, AllocationError::InvalidAllocation(101));

    let err = store
        .create(e, p, "x".into(), r((1, 1), (1, 10)), 50)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::OutOfProjectWindow { .. }));
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn capacity_exceeded_reports_available() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    store.create(e, p, "a".into(), r((1, 1), (1, 31)), 60).await.unwrap();
    let err = store
        .create(e, p, "b".into(), r((1, 15), (2, 15)), 50)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AllocationError::CapacityExceeded {
            requested: 50,
            available: 40
        }
    );

    store.create(e, p, "b".into(), r((1, 15), (2, 15)), 40).await.unwrap();
    assert_eq!(store.free_capacity(e, &TimeRange::single_day(d(1, 20)), 100).await, 0);
    assert_eq!(store.free_capacity(e, &TimeRange::single_day(d(2, 20)), 100).await, 100);
}

#[tokio::test]
async fn adjacent_ranges_do_not_conflict() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    store.create(e, p, "a".into(), r((1, 1), (1, 31)), 100).await.unwrap();
    store.create(e, p, "b".into(), r((2, 1), (2, 28)), 100).await.unwrap();
    // one shared day is an overlap
    let err = store
        .create(e, p, "c".into(), r((2, 28), (3, 5)), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::CapacityExceeded { available: 0, .. }));
}

#[tokio::test]
async fn custom_ceiling_is_respected() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 50);
    let p = add_project(&dir, r((1, 1), (1, 31)));

    store.create(e, p, "half".into(), r((1, 1), (1, 31)), 30).await.unwrap();
    let err = store
        .create(e, p, "more".into(), r((1, 1), (1, 31)), 30)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::CapacityExceeded { available: 20, .. }));
}

#[tokio::test]
async fn update_does_not_conflict_with_itself() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    let a = store.create(e, p, "a".into(), r((1, 1), (1, 31)), 80).await.unwrap();
    let updated = store
        .update(
            a.id,
            AssignmentPatch {
                allocation_percentage: Some(100),
                range: Some(r((1, 10), (2, 10))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.allocation_percentage, 100);
    assert_eq!(updated.id, a.id);
    assert_eq!(store.get(a.id).await.unwrap(), updated);
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn rejected_update_leaves_original() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    let a = store.create(e, p, "a".into(), r((1, 1), (1, 31)), 50).await.unwrap();
    store.create(e, p, "b".into(), r((1, 1), (1, 31)), 50).await.unwrap();

    let err = store
        .update(
            a.id,
            AssignmentPatch {
                allocation_percentage: Some(60),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::CapacityExceeded { available: 50, .. }));
    assert_eq!(store.get(a.id).await.unwrap(), a);

    let err = store
        .update(
            a.id,
            AssignmentPatch {
                range: Some(r((4, 1), (4, 2))),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::OutOfProjectWindow { .. }));
    assert_eq!(store.get(a.id).await.unwrap(), a);
}

#[tokio::test]
async fn update_unknown_is_not_found() {
    let (_dir, store) = setup();
    let err = store
        .update(Ulid::new(), AssignmentPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::NotFound { kind: crate::EntityKind::Assignment, .. }));
}

#[tokio::test]
async fn update_moves_between_engineers() {
    let (dir, store) = setup();
    let e1 = add_engineer(&dir, 100);
    let e2 = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    let a = store.create(e1, p, "a".into(), r((1, 1), (1, 31)), 70).await.unwrap();
    store.create(e2, p, "b".into(), r((1, 1), (1, 31)), 50).await.unwrap();

    // e2 only has 50 left
    let err = store
        .update(
            a.id,
            AssignmentPatch {
                engineer_id: Some(e2),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::CapacityExceeded { available: 50, .. }));
    assert_eq!(store.engineer_for(&a.id), Some(e1));

    let moved = store
        .update(
            a.id,
            AssignmentPatch {
                engineer_id: Some(e2),
                allocation_percentage: Some(50),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.engineer_id, e2);
    assert_eq!(store.engineer_for(&a.id), Some(e2));
    assert!(store.list_by_engineer(e1).await.is_empty());
    assert_eq!(store.list_by_engineer(e2).await.len(), 2);
    assert_eq!(store.free_capacity(e1, &r((1, 1), (1, 31)), 100).await, 100);
    assert_eq!(store.free_capacity(e2, &r((1, 1), (1, 31)), 100).await, 0);
}

#[tokio::test]
async fn delete_twice_is_not_found() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    assert!(!store.has_assignments(e).await);
    let a = store.create(e, p, "a".into(), r((1, 1), (1, 31)), 60).await.unwrap();
    assert!(store.has_assignments(e).await);
    assert_eq!(store.delete(a.id).await.unwrap(), a);
    assert!(!store.has_assignments(e).await);
    let err = store.delete(a.id).await.unwrap_err();
    assert!(matches!(err, AllocationError::NotFound { .. }));
    assert!(store.get(a.id).await.is_err());
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn listings_are_ordered_by_start() {
    let (dir, store) = setup();
    let e1 = add_engineer(&dir, 100);
    let e2 = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (12, 31)));
    let q = add_project(&dir, r((1, 1), (12, 31)));

    let march = store.create(e1, p, "m".into(), r((3, 1), (3, 31)), 20).await.unwrap();
    let jan = store.create(e2, p, "j".into(), r((1, 1), (1, 31)), 20).await.unwrap();
    let feb = store.create(e1, q, "f".into(), r((2, 1), (2, 28)), 20).await.unwrap();

    let all: Vec<Ulid> = store.list_all().await.iter().map(|a| a.id).collect();
    assert_eq!(all, vec![jan.id, feb.id, march.id]);

    let by_e1: Vec<Ulid> = store.list_by_engineer(e1).await.iter().map(|a| a.id).collect();
    assert_eq!(by_e1, vec![feb.id, march.id]);

    let by_p: Vec<Ulid> = store.list_by_project(p).await.iter().map(|a| a.id).collect();
    assert_eq!(by_p, vec![jan.id, march.id]);

    assert!(store.list_by_engineer(Ulid::new()).await.is_empty());
}

#[tokio::test]
async fn active_on_filters_by_date() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (12, 31)));

    let jan = store.create(e, p, "j".into(), r((1, 1), (1, 31)), 30).await.unwrap();
    store.create(e, p, "f".into(), r((2, 1), (2, 28)), 30).await.unwrap();

    let active = store.active_on(e, d(1, 31)).await;
    assert_eq!(active, vec![jan]);
    assert!(store.active_on(e, d(3, 1)).await.is_empty());
}

#[tokio::test]
async fn rebuild_skips_corrupt_records() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    let record = |engineer_id: Ulid, project_id: Ulid, start: NaiveDate, end: NaiveDate, pct: u32| {
        AssignmentRecord {
            id: Ulid::new(),
            engineer_id,
            project_id,
            role: "r".into(),
            start_date: start,
            end_date: end,
            allocation_percentage: pct,
        }
    };

    let good = record(e, p, d(1, 1), d(1, 31), 60);
    let records = vec![
        good.clone(),
        record(Ulid::new(), p, d(1, 1), d(1, 31), 10), // deleted engineer
        record(e, Ulid::new(), d(1, 1), d(1, 31), 10), // deleted project
        record(e, p, d(2, 1), d(1, 1), 10),            // inverted range
        record(e, p, d(1, 15), d(2, 15), 50),          // would overflow
        record(e, p, d(5, 1), d(5, 2), 10),            // outside window
    ];

    let report = store.rebuild(records).await;
    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped.len(), 5);
    assert_eq!(store.count(), 1);
    assert_eq!(store.records().await, vec![good]);
    assert_eq!(store.free_capacity(e, &r((1, 1), (1, 31)), 100).await, 40);
}

#[tokio::test]
async fn rebuild_clears_previous_state() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    store.create(e, p, "a".into(), r((1, 1), (1, 31)), 60).await.unwrap();
    let report = store.rebuild(Vec::new()).await;
    assert_eq!(report.loaded, 0);
    assert_eq!(store.count(), 0);
    assert_eq!(store.free_capacity(e, &r((1, 1), (1, 31)), 100).await, 100);
}

#[tokio::test]
async fn rebuild_reports_duplicate_ids_as_persistence_errors() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));

    let first = AssignmentRecord {
        id: Ulid::new(),
        engineer_id: e,
        project_id: p,
        role: "r".into(),
        start_date: d(1, 1),
        end_date: d(1, 10),
        allocation_percentage: 20,
    };
    let mut copy = first.clone();
    copy.start_date = d(2, 1);
    copy.end_date = d(2, 10);

    let report = store.rebuild(vec![first.clone(), copy]).await;
    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, first.id);
    assert!(matches!(report.skipped[0].1, AllocationError::Persistence(_)));
    assert_eq!(store.records().await, vec![first]);
}

#[tokio::test]
async fn completed_projects_reject_writes_but_survive_rebuild() {
    let (dir, store) = setup();
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (3, 31)));
    let a = store.create(e, p, "a".into(), r((1, 1), (1, 31)), 60).await.unwrap();
    let records = store.records().await;

    let mut project = dir.project(&p).unwrap();
    project.status = ProjectStatus::Completed;
    dir.upsert_project(project).unwrap();

    let err = store
        .create(e, p, "b".into(), r((2, 1), (2, 10)), 10)
        .await
        .unwrap_err();
    assert_eq!(err, AllocationError::ProjectClosed(p));
    let patch = AssignmentPatch {
        allocation_percentage: Some(30),
        ..Default::default()
    };
    assert_eq!(store.update(a.id, patch).await.unwrap_err(), AllocationError::ProjectClosed(p));
    assert_eq!(store.get(a.id).await.unwrap(), a);

    let report = store.rebuild(records).await;
    assert_eq!(report.loaded, 1);
    assert!(report.skipped.is_empty());
    assert_eq!(store.allocated_on(e, d(1, 15)).await, 60);
}

#[tokio::test]
async fn concurrent_creates_never_overbook() {
    let (dir, store) = setup();
    let store = Arc::new(store);
    let e = add_engineer(&dir, 100);
    let p = add_project(&dir, r((1, 1), (12, 31)));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.create(e, p, "race".into(), r((1, 1), (1, 31)), 30).await
        }));
    }
    let mut ok = 0;
    for h in handles {
        if h.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(store.free_capacity(e, &r((1, 1), (1, 31)), 100).await, 10);
}

#[test]
fn validators() {
    assert!(validate_allocation(1).is_ok());
    assert!(validate_allocation(100).is_ok());
    assert!(validate_allocation(0).is_err());
    assert!(validate_role(&"x".repeat(crate::limits::MAX_ROLE_LEN)).is_ok());
    assert!(validate_role(&"x".repeat(crate::limits::MAX_ROLE_LEN + 1)).is_err());
    let wide = TimeRange::new(
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
    )
    .unwrap();
    assert!(matches!(validate_range(&wide), Err(AllocationError::LimitExceeded(_))));
}
