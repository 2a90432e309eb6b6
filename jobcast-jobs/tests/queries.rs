mod common;

use chrono::{Duration, Utc};
use common::Harness;
use jobcast_jobs::{Job, JobFilter, JobSpec, JobStatus, CLEANUP_BATCH};

async fn seed(h: &Harness) -> Vec<Job> {
    let mut jobs = Vec::new();
    for (name, kind, source) in [
        ("Job 1", "import", "plugin-a"),
        ("Job 2", "export", "plugin-b"),
        ("Job 3", "import", "plugin-a"),
        ("Job 4", "backup", "plugin-c"),
    ] {
        jobs.push(
            h.registry
                .create_job(JobSpec::new(name, source).with_type(kind))
                .await
                .unwrap(),
        );
    }
    jobs
}

async fn age(h: &Harness, job: &Job, days: i64) {
    h.store
        .inner
        .backdate(job.snapshot().internal_id, Utc::now() - Duration::days(days))
        .await
        .unwrap();
}

fn names(jobs: &[jobcast_jobs::JobSnapshot]) -> Vec<&str> {
    jobs.iter().map(|j| j.name.as_str()).collect()
}

#[tokio::test]
async fn type_and_source_filters() {
    let h = Harness::new();
    seed(&h).await;

    let imports = h
        .registry
        .get_jobs(&JobFilter::new().job_type("import"))
        .await
        .unwrap();
    assert_eq!(imports.len(), 2);
    assert!(imports.iter().all(|j| j.job_type == "import"));

    let plugin_a = h
        .registry
        .get_jobs(&JobFilter::new().source("plugin-a"))
        .await
        .unwrap();
    assert_eq!(plugin_a.len(), 2);

    let none = h
        .registry
        .get_jobs(&JobFilter::new().job_type("import").source("plugin-b"))
        .await
        .unwrap();
    assert!(none.is_empty());

    let all = h.registry.get_jobs(&JobFilter::new()).await.unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn status_filter_matches_stored_status_exactly() {
    let h = Harness::new();
    let jobs = seed(&h).await;
    jobs[0].start().await.unwrap();
    jobs[1].start().await.unwrap();
    jobs[1].complete(None).await.unwrap();
    jobs[2].fail("bad input").await.unwrap();

    let expect = [
        (JobStatus::Pending, vec!["Job 4"]),
        (JobStatus::Running, vec!["Job 1"]),
        (JobStatus::Completed, vec!["Job 2"]),
        (JobStatus::Failed, vec!["Job 3"]),
        (JobStatus::Cancelled, vec![]),
    ];
    for (status, expected) in expect {
        let found = h
            .registry
            .get_jobs(&JobFilter::new().status(status))
            .await
            .unwrap();
        assert_eq!(names(&found), expected, "status {status}");
        assert_eq!(
            h.registry
                .count_jobs(&JobFilter::new().status(status))
                .await
                .unwrap(),
            expected.len() as u64
        );
    }

    let imports_running = h
        .registry
        .get_jobs(&JobFilter::new().job_type("import").status(JobStatus::Running))
        .await
        .unwrap();
    assert_eq!(names(&imports_running), vec!["Job 1"]);
}

#[tokio::test]
async fn results_are_newest_first_and_paginated() {
    let h = Harness::new();
    let jobs = seed(&h).await;
    for (job, days) in jobs.iter().zip([4, 3, 2, 1]) {
        age(&h, job, days).await;
    }

    let page = h
        .registry
        .get_jobs(&JobFilter::new().limit(2).offset(1))
        .await
        .unwrap();
    assert_eq!(names(&page), vec!["Job 3", "Job 2"]);
    assert_eq!(
        h.registry
            .count_jobs(&JobFilter::new().limit(2).offset(1))
            .await
            .unwrap(),
        4
    );
}

#[tokio::test]
async fn unknown_job_is_absent_not_an_error() {
    let h = Harness::new();
    seed(&h).await;
    assert!(h.registry.get_job("does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn cleanup_removes_only_old_terminal_jobs() {
    let h = Harness::new();

    let old_done = h.registry.create_job(JobSpec::new("old done", "s")).await.unwrap();
    old_done.complete(None).await.unwrap();
    let old_failed = h.registry.create_job(JobSpec::new("old failed", "s")).await.unwrap();
    old_failed.fail("x").await.unwrap();
    let old_cancelled = h.registry.create_job(JobSpec::new("old cancelled", "s")).await.unwrap();
    old_cancelled.cancel().await.unwrap();
    let old_running = h.registry.create_job(JobSpec::new("old running", "s")).await.unwrap();
    old_running.start().await.unwrap();
    let old_pending = h.registry.create_job(JobSpec::new("old pending", "s")).await.unwrap();
    let young_done = h.registry.create_job(JobSpec::new("young done", "s")).await.unwrap();
    young_done.complete(None).await.unwrap();

    for job in [&old_done, &old_failed, &old_cancelled, &old_running, &old_pending] {
        age(&h, job, 45).await;
    }
    age(&h, &young_done, 29).await;

    let deleted = h.registry.cleanup_old_jobs(30).await.unwrap();
    assert_eq!(deleted, 3);

    let mut remaining: Vec<String> = h
        .registry
        .get_jobs(&JobFilter::new())
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.name)
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["old pending", "old running", "young done"]);

    assert_eq!(h.registry.cleanup_old_jobs(30).await.unwrap(), 0);
}

#[tokio::test]
async fn cleanup_never_touches_running_jobs_of_any_age() {
    let h = Harness::new();
    let ancient = h.registry.create_job(JobSpec::new("ancient", "s")).await.unwrap();
    ancient.start().await.unwrap();
    age(&h, &ancient, 3650).await;

    assert_eq!(h.registry.cleanup_old_jobs(0).await.unwrap(), 0);
    assert!(h.registry.get_job(&ancient.id()).await.unwrap().is_some());
}

#[tokio::test]
async fn cleanup_window_beyond_the_calendar_deletes_nothing() {
    let h = Harness::new();
    let job = h.registry.create_job(JobSpec::new("done", "s")).await.unwrap();
    job.complete(None).await.unwrap();
    age(&h, &job, 3650).await;

    assert_eq!(h.registry.cleanup_old_jobs(u32::MAX).await.unwrap(), 0);
    assert!(h.registry.get_job(&job.id()).await.unwrap().is_some());
}

#[tokio::test]
async fn cleanup_drains_backlogs_larger_than_one_batch() {
    let h = Harness::new();
    let backlog = CLEANUP_BATCH * 2 + 7;
    for i in 0..backlog {
        let job = h
            .registry
            .create_job(JobSpec::new(format!("old {i}"), "s"))
            .await
            .unwrap();
        job.cancel().await.unwrap();
        age(&h, &job, 60).await;
    }
    let young = h.registry.create_job(JobSpec::new("young", "s")).await.unwrap();
    young.cancel().await.unwrap();

    assert_eq!(h.registry.cleanup_old_jobs(30).await.unwrap(), backlog as u64);
    let left = h.registry.get_jobs(&JobFilter::new()).await.unwrap();
    assert_eq!(names(&left), vec!["young"]);
}
