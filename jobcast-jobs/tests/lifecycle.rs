mod common;

use common::{drain, Harness};
use jobcast_jobs::{JobError, JobSpec, JobStatus};
use serde_json::{json, Map};

async fn stored(h: &Harness, job_id: &str) -> jobcast_jobs::JobSnapshot {
    h.registry
        .get_job(job_id)
        .await
        .unwrap()
        .expect("job is persisted")
}

#[tokio::test]
async fn import_job_runs_to_completion() {
    let h = Harness::new();
    let mut rx = h.admin();

    let job = h
        .registry
        .create_job(JobSpec::new("Job 1", "plugin-a").with_type("import"))
        .await
        .unwrap();
    let id = job.id();
    assert_eq!(job.status(), JobStatus::Pending);
    assert_eq!(job.progress(), 0);
    assert!(h.registry.active_job(&id).is_some());

    job.start().await.unwrap();
    assert_eq!(stored(&h, &id).await.status, JobStatus::Running);

    job.update_progress(50, None).await.unwrap();
    assert_eq!(stored(&h, &id).await.progress, 50);

    job.complete(Some(json!({ "itemsImported": 100 })))
        .await
        .unwrap();
    let done = stored(&h, &id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.result, Some(json!({ "itemsImported": 100 })));
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert!(h.registry.active_job(&id).is_none());

    let statuses: Vec<JobStatus> = drain(&mut rx).iter().map(|m| m.job().status).collect();
    assert_eq!(
        statuses,
        vec![
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Running,
            JobStatus::Completed
        ]
    );
}

#[tokio::test]
async fn progress_is_clamped_when_stored() {
    let h = Harness::new();
    let job = h
        .registry
        .create_job(JobSpec::new("Clamp", "core"))
        .await
        .unwrap();
    job.start().await.unwrap();

    for (input, expected) in [(-5, 0), (0, 0), (42, 42), (100, 100), (250, 100)] {
        job.update_progress(input, None).await.unwrap();
        assert_eq!(stored(&h, &job.id()).await.progress, expected, "input {input}");
    }
}

#[tokio::test]
async fn complete_forces_full_progress_from_any_point() {
    let h = Harness::new();
    for before in [0, 13, 99] {
        let job = h
            .registry
            .create_job(JobSpec::new("Export", "plugin-b"))
            .await
            .unwrap();
        job.update_progress(before, None).await.unwrap();
        job.complete(None).await.unwrap();
        assert_eq!(stored(&h, &job.id()).await.progress, 100);
    }
}

#[tokio::test]
async fn metadata_patches_merge_shallowly() {
    let h = Harness::new();
    let mut initial = Map::new();
    initial.insert("batch".into(), json!(1));
    initial.insert("dryRun".into(), json!(false));
    let job = h
        .registry
        .create_job(JobSpec::new("Sync", "plugin-c").with_metadata(initial))
        .await
        .unwrap();

    let mut patch = Map::new();
    patch.insert("batch".into(), json!(2));
    patch.insert("cursor".into(), json!({ "page": 4 }));
    job.update_progress(20, Some(patch)).await.unwrap();

    let metadata = stored(&h, &job.id()).await.metadata;
    assert_eq!(metadata["batch"], json!(2));
    assert_eq!(metadata["dryRun"], json!(false));
    assert_eq!(metadata["cursor"], json!({ "page": 4 }));
}

#[tokio::test]
async fn fail_keeps_progress_and_records_message() {
    let h = Harness::new();
    let job = h
        .registry
        .create_job(JobSpec::new("Backup", "core").with_type("backup"))
        .await
        .unwrap();
    job.start().await.unwrap();
    job.update_progress(70, None).await.unwrap();
    job.fail("disk quota exceeded").await.unwrap();

    let failed = stored(&h, &job.id()).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.progress, 70);
    assert_eq!(failed.error_message.as_deref(), Some("disk quota exceeded"));
    assert!(failed.completed_at.is_some());
    assert!(failed.result.is_none());
    assert!(!h.registry.active_job_ids().contains(&job.id()));
}

#[tokio::test]
async fn cache_tracks_exactly_the_active_jobs() {
    let h = Harness::new();
    let pending = h.registry.create_job(JobSpec::new("a", "s")).await.unwrap();
    let running = h.registry.create_job(JobSpec::new("b", "s")).await.unwrap();
    let cancelled = h.registry.create_job(JobSpec::new("c", "s")).await.unwrap();
    let failed = h.registry.create_job(JobSpec::new("d", "s")).await.unwrap();

    running.start().await.unwrap();
    cancelled.cancel().await.unwrap();
    failed.start().await.unwrap();
    failed.fail("boom").await.unwrap();

    let mut active = h.registry.active_job_ids();
    active.sort();
    let mut expected = vec![pending.id(), running.id()];
    expected.sort();
    assert_eq!(active, expected);

    let cancelled_state = stored(&h, &cancelled.id()).await;
    assert_eq!(cancelled_state.status, JobStatus::Cancelled);
    assert!(cancelled_state.completed_at.is_some());
    assert!(cancelled_state.started_at.is_none());
}

#[tokio::test]
async fn terminal_jobs_reject_further_mutation() {
    let h = Harness::new();
    let mut rx = h.admin();
    let job = h.registry.create_job(JobSpec::new("x", "s")).await.unwrap();
    job.complete(None).await.unwrap();
    drain(&mut rx);

    for err in [
        job.start().await.unwrap_err(),
        job.update_progress(10, None).await.unwrap_err(),
        job.fail("late").await.unwrap_err(),
        job.cancel().await.unwrap_err(),
        job.complete(None).await.unwrap_err(),
    ] {
        assert!(
            matches!(err, JobError::InvalidTransition { from: JobStatus::Completed, .. }),
            "unexpected error: {err}"
        );
    }
    assert!(drain(&mut rx).is_empty());
    assert_eq!(stored(&h, &job.id()).await.progress, 100);
}

#[tokio::test]
async fn start_requires_pending() {
    let h = Harness::new();
    let job = h.registry.create_job(JobSpec::new("x", "s")).await.unwrap();
    job.start().await.unwrap();
    let err = job.start().await.unwrap_err();
    assert!(matches!(
        err,
        JobError::InvalidTransition {
            from: JobStatus::Running,
            operation: "start",
            ..
        }
    ));
}

#[tokio::test]
async fn create_rejects_missing_name_or_source() {
    let h = Harness::new();
    let mut rx = h.admin();

    for spec in [JobSpec::new("  ", "plugin-a"), JobSpec::new("Import", "")] {
        let err = h.registry.create_job(spec).await.unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    assert!(h.store.inner.is_empty().await);
    assert!(drain(&mut rx).is_empty());
    assert!(h.registry.active_job_ids().is_empty());
}

#[tokio::test]
async fn create_applies_defaults() {
    let h = Harness::new();
    let job = h
        .registry
        .create_job(
            JobSpec::new("Rebuild index", "core")
                .with_description("full rebuild")
                .created_by("user-3"),
        )
        .await
        .unwrap();

    let snapshot = stored(&h, &job.id()).await;
    assert_eq!(snapshot.job_type, jobcast_jobs::DEFAULT_JOB_TYPE);
    assert_eq!(snapshot.status, JobStatus::Pending);
    assert_eq!(snapshot.progress, 0);
    assert!(snapshot.metadata.is_empty());
    assert_eq!(snapshot.description.as_deref(), Some("full rebuild"));
    assert_eq!(snapshot.created_by.as_deref(), Some("user-3"));
    assert_eq!(snapshot, job.snapshot());
}

#[tokio::test]
async fn persistence_failure_reverts_and_skips_broadcast() {
    let h = Harness::new();
    let mut rx = h.admin();
    let job = h.registry.create_job(JobSpec::new("x", "s")).await.unwrap();
    job.start().await.unwrap();
    drain(&mut rx);

    h.store.set_failing(true);
    let err = job.complete(Some(json!("ok"))).await.unwrap_err();
    assert!(matches!(err, JobError::Store(_)));

    assert_eq!(job.status(), JobStatus::Running);
    assert!(job.snapshot().completed_at.is_none());
    assert!(h.registry.active_job(&job.id()).is_some());
    assert!(drain(&mut rx).is_empty());
    assert_eq!(stored(&h, &job.id()).await.status, JobStatus::Running);

    h.store.set_failing(false);
    job.complete(Some(json!("ok"))).await.unwrap();
    assert_eq!(stored(&h, &job.id()).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn attach_job_resumes_tracking_of_stored_jobs() {
    let h = Harness::new();
    let job = h.registry.create_job(JobSpec::new("x", "s")).await.unwrap();
    let id = job.id();

    // a second registry over the same store stands in for a restarted worker
    let other = jobcast_jobs::JobRegistry::new(
        std::sync::Arc::new(h.store.clone()),
        h.registry.emitter().clone(),
    );
    assert!(other.active_job(&id).is_none());

    let attached = other.attach_job(&id).await.unwrap().expect("stored job");
    assert!(other.active_job(&id).is_some());
    attached.start().await.unwrap();
    attached.complete(None).await.unwrap();
    assert!(other.active_job(&id).is_none());
    assert_eq!(stored(&h, &id).await.status, JobStatus::Completed);

    assert!(other.attach_job("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn attached_terminal_job_stays_uncached_and_read_only() {
    let h = Harness::new();
    let job = h.registry.create_job(JobSpec::new("x", "s")).await.unwrap();
    job.cancel().await.unwrap();

    let attached = h.registry.attach_job(&job.id()).await.unwrap().expect("stored job");
    assert_eq!(attached.status(), JobStatus::Cancelled);
    assert!(h.registry.active_job(&job.id()).is_none());
    assert!(matches!(
        attached.start().await,
        Err(JobError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn concurrent_attaches_share_one_live_state() {
    let h = Harness::new();
    let id = h
        .registry
        .create_job(JobSpec::new("x", "s"))
        .await
        .unwrap()
        .id();
    let restarted = jobcast_jobs::JobRegistry::new(
        std::sync::Arc::new(h.store.clone()),
        h.registry.emitter().clone(),
    );

    let (a, b) = tokio::join!(restarted.attach_job(&id), restarted.attach_job(&id));
    let a = a.unwrap().expect("stored job");
    let b = b.unwrap().expect("stored job");

    a.complete(None).await.unwrap();
    assert_eq!(b.status(), JobStatus::Completed);
    assert!(matches!(
        b.fail("boom").await,
        Err(JobError::InvalidTransition { from: JobStatus::Completed, .. })
    ));
    assert_eq!(stored(&h, &id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn failed_write_overtaken_by_newer_update_still_reaches_the_store() {
    let h = Harness::new();
    let job = h.registry.create_job(JobSpec::new("x", "s")).await.unwrap();

    h.store.hold_next_write();
    let held = tokio::spawn({
        let job = job.clone();
        async move { job.update_progress(50, None).await }
    });
    h.store.write_held().await;
    job.start().await.unwrap();
    h.store.fail_held_write();
    assert!(matches!(held.await.unwrap(), Err(JobError::Store(_))));

    // the newer mutation was not rolled back, so memory keeps both changes
    assert_eq!(job.status(), JobStatus::Running);
    assert_eq!(job.progress(), 50);
    let persisted = stored(&h, &job.id()).await;
    assert_eq!(persisted.status, JobStatus::Running);
    assert_eq!(persisted.progress, 50);
}
