//! Tests for the one-off task runner.

#![allow(clippy::expect_used)]

use std::collections::BTreeMap;
use std::time::Duration;

use ecs_rollout::application::services::one_off::{RetryPolicy, run_tasks};
use ecs_rollout::domain::{
    CommandSpec, DeployError, OneOffTask, Registration, TaskDefinition,
};
use tokio::time::Instant;

use crate::fakes::{FakeCluster, RecordingReporter, failure};

const TEMPLATE: &str = r#"{"containerDefinitions": [{"name": "web", "image": "app:1"}]}"#;

fn registered() -> BTreeMap<String, TaskDefinition> {
    let mut def = TaskDefinition::from_template_str(TEMPLATE, "web.json").expect("parses");
    def.family = "web".into();
    def.mark_registered(Registration {
        family: "web".into(),
        revision: 7,
        arn: "arn:aws:ecs:us-east-1:000000000000:task-definition/web:7".into(),
    });
    BTreeMap::from([("web".to_string(), def)])
}

fn task(command: &str) -> OneOffTask {
    OneOffTask {
        task_definition: "web".into(),
        container: "web".into(),
        command: CommandSpec::Line(command.into()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_tasks_run_in_order_with_command_override() {
    let cluster = FakeCluster::new();
    let reporter = RecordingReporter::default();
    let tasks = vec![
        task("manage.py migrate --noinput"),
        OneOffTask {
            command: CommandSpec::Args(vec!["manage.py".into(), "clearsessions".into()]),
            ..task("")
        },
    ];

    run_tasks(&cluster, &reporter, "default", &registered(), &tasks, RetryPolicy::default())
        .await
        .expect("runs");

    let requests = cluster.run_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].cluster, "default");
    assert_eq!(requests[0].task_definition, "web:7");
    assert_eq!(requests[0].container, "web");
    assert_eq!(requests[0].command, vec!["manage.py", "migrate", "--noinput"]);
    assert_eq!(requests[0].started_by, "ecs-rollout");
    assert_eq!(requests[1].command, vec!["manage.py", "clearsessions"]);
    assert!(reporter.contains("Starting one-off task 'manage.py migrate --noinput' via web:7 (web)"));
}

#[tokio::test(start_paused = true)]
async fn test_first_task_failure_is_fatal_without_retry() {
    let cluster = FakeCluster::new();
    cluster.script_run_results(vec![vec![failure("RESOURCE:MEMORY")]]);
    let reporter = RecordingReporter::default();
    let start = Instant::now();

    let err = run_tasks(
        &cluster,
        &reporter,
        "default",
        &registered(),
        &[task("migrate"), task("collectstatic")],
        RetryPolicy::default(),
    )
    .await
    .expect_err("must fail");

    assert_eq!(
        err.downcast_ref::<DeployError>(),
        Some(&DeployError::OneOffTask {
            command: "migrate".into(),
            reason: "RESOURCE:MEMORY".into()
        })
    );
    assert_eq!(cluster.run_requests().len(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(reporter.contains("Error starting one-off task: RESOURCE:MEMORY"));
}

#[tokio::test(start_paused = true)]
async fn test_later_task_is_retried_after_backoff() {
    let cluster = FakeCluster::new();
    cluster.script_run_results(vec![
        vec![],
        vec![failure("RESOURCE:CPU")],
        vec![failure("RESOURCE:CPU")],
        vec![],
    ]);
    let reporter = RecordingReporter::default();
    let start = Instant::now();

    run_tasks(
        &cluster,
        &reporter,
        "default",
        &registered(),
        &[task("migrate"), task("collectstatic")],
        RetryPolicy::default(),
    )
    .await
    .expect("eventually runs");

    let commands: Vec<Vec<String>> = cluster.run_requests().into_iter().map(|r| r.command).collect();
    assert_eq!(
        commands,
        vec![
            vec!["migrate".to_string()],
            vec!["collectstatic".to_string()],
            vec!["collectstatic".to_string()],
            vec!["collectstatic".to_string()],
        ]
    );
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_is_shared_within_a_task_list() {
    let cluster = FakeCluster::new();
    cluster.script_run_results(vec![
        vec![],
        vec![failure("RESOURCE:CPU")],
        vec![],
        vec![failure("RESOURCE:CPU")],
        vec![failure("RESOURCE:CPU")],
    ]);
    let reporter = RecordingReporter::default();
    let policy = RetryPolicy {
        max_retries: 2,
        backoff: Duration::from_secs(1),
    };

    let err = run_tasks(
        &cluster,
        &reporter,
        "default",
        &registered(),
        &[task("a"), task("b"), task("c")],
        policy,
    )
    .await
    .expect_err("budget exhausted");

    assert!(matches!(
        err.downcast_ref::<DeployError>(),
        Some(DeployError::OneOffTask { command, .. }) if command == "c"
    ));
    assert_eq!(cluster.run_requests().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_each_task_list_gets_a_fresh_budget() {
    let cluster = FakeCluster::new();
    cluster.script_run_results(vec![
        vec![],
        vec![failure("RESOURCE:CPU")],
        vec![],
        vec![],
        vec![failure("RESOURCE:CPU")],
        vec![],
    ]);
    let reporter = RecordingReporter::default();
    let policy = RetryPolicy {
        max_retries: 1,
        backoff: Duration::from_secs(1),
    };

    for list in [[task("migrate"), task("seed")], [task("warm"), task("notify")]] {
        run_tasks(&cluster, &reporter, "default", &registered(), &list, policy)
            .await
            .expect("one retry per list fits the budget");
    }

    assert_eq!(cluster.run_requests().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_unit_is_rejected() {
    let cluster = FakeCluster::new();
    let reporter = RecordingReporter::default();
    let orphan = OneOffTask {
        task_definition: "worker".into(),
        ..task("migrate")
    };

    let err = run_tasks(
        &cluster,
        &reporter,
        "default",
        &registered(),
        &[orphan],
        RetryPolicy::default(),
    )
    .await
    .expect_err("must fail");

    assert_eq!(
        err.downcast_ref::<DeployError>(),
        Some(&DeployError::UnregisteredDefinition("worker".into()))
    );
    assert!(cluster.run_requests().is_empty());
}
