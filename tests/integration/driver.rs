use std::time::Duration;

use stack_deployer::core::DeployError;
use stack_deployer::deploy::{DeploymentDriver, DeploymentOutcome, WorkerSettings};
use stack_deployer::test_utils::{ScriptedStatus, ScriptedWorker, WorkerReply, fast_settings};

use crate::common::TestProject;

fn deploy_error(err: &anyhow::Error) -> &DeployError {
    err.chain().find_map(|e| e.downcast_ref::<DeployError>()).expect("DeployError in chain")
}

#[tokio::test]
async fn test_single_stack_is_invoked_once_with_suffixed_name() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "test_stack.yaml", &["Environment"]).unwrap();
    project.layout.write_config("environment: devops\nstacks:\n  - stack_name: test-stack\n").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    let status = ScriptedStatus::new();
    let report = DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, None).await.unwrap();

    assert_eq!(worker.invoked_stacks(), vec!["test-stack-devops"]);
    let invocation = &worker.invocations()[0];
    assert_eq!(invocation.message.parameters["Environment"], "devops");
    assert!(invocation.message.template.contains("AWS::SNS::Topic"));
    assert_eq!(report.outcomes, vec![("test-stack-devops".to_string(), DeploymentOutcome::Succeeded)]);
    assert_eq!(status.poll_count("test-stack-devops"), 1);
}

#[tokio::test]
async fn test_generations_run_in_dependency_order() {
    let project = TestProject::chain("devops").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    let status = ScriptedStatus::new();
    let report = DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, None).await.unwrap();

    assert_eq!(worker.invoked_stacks(), vec!["network-devops", "backend-devops", "frontend-devops"]);
    assert_eq!(report.succeeded(), vec!["network-devops", "backend-devops", "frontend-devops"]);
}

#[tokio::test]
async fn test_failed_dependency_aborts_later_generations() {
    let project = TestProject::chain("devops").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    worker.script("network-devops", [WorkerReply::error("quota exceeded")]);
    let status = ScriptedStatus::new();

    let err = DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, None).await.unwrap_err();
    match deploy_error(&err) {
        DeployError::DependencyNotSucceeded { stack, missing } => {
            assert_eq!(stack, "backend-devops");
            assert_eq!(missing, &["network-devops"]);
        }
        other => panic!("Expected DependencyNotSucceeded, got {other:?}"),
    }
    assert_eq!(worker.invoked_stacks(), vec!["network-devops"]);
}

#[tokio::test]
async fn test_independent_failure_is_reported_at_the_end() {
    let project = TestProject::new("devops").unwrap();
    for file in ["a.yaml", "b.yaml", "c.yaml"] {
        project.layout.write_template("devops", file, &[]).unwrap();
    }
    project
        .layout
        .write_config(
            "environment: devops\nstacks:\n  - stack_name: a\n  - stack_name: b\n  - stack_name: c\n    dependencies: [a]\n",
        )
        .unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    worker.script("b-devops", [WorkerReply::Fail("access denied".to_string())]);
    let status = ScriptedStatus::new();

    let err = DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, None).await.unwrap_err();
    assert!(matches!(
        deploy_error(&err),
        DeployError::FailedStacks { stacks } if stacks == &["b-devops"]
    ));
    assert_eq!(worker.invocation_count("c-devops"), 1);
}

#[tokio::test]
async fn test_error_state_fails_the_stack() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "api.yaml", &[]).unwrap();
    project.layout.write_config("environment: devops\nstacks:\n  - stack_name: api\n").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    let status = ScriptedStatus::new();
    status.script("api-devops", &["UPDATE_IN_PROGRESS", "UPDATE_ROLLBACK_COMPLETE"]);

    let err = DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, None).await.unwrap_err();
    assert!(matches!(deploy_error(&err), DeployError::FailedStacks { .. }));
    assert_eq!(status.poll_count("api-devops"), 2);
}

#[tokio::test]
async fn test_rate_limited_invocation_is_retried() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "api.yaml", &[]).unwrap();
    project.layout.write_config("environment: devops\nstacks:\n  - stack_name: api\n").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    worker.script("api-devops", [WorkerReply::RateLimited, WorkerReply::RateLimited]);
    let status = ScriptedStatus::new();

    DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, None).await.unwrap();
    assert_eq!(worker.invocation_count("api-devops"), 3);
}

#[tokio::test]
async fn test_rate_limit_budget_exhaustion_fails_the_stack() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "api.yaml", &[]).unwrap();
    project.layout.write_config("environment: devops\nstacks:\n  - stack_name: api\n").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    worker.script("api-devops", std::iter::repeat_n(WorkerReply::RateLimited, 10));
    let status = ScriptedStatus::new();
    let settings = WorkerSettings {
        max_invoke_attempts: 4,
        ..fast_settings()
    };

    let err = DeploymentDriver::new(&worker, &status, settings).deploy(&plan, None).await.unwrap_err();
    assert!(matches!(deploy_error(&err), DeployError::FailedStacks { .. }));
    assert_eq!(worker.invocation_count("api-devops"), 4);
    assert_eq!(status.poll_count("api-devops"), 0);
}

#[tokio::test]
async fn test_stacks_of_one_generation_run_concurrently() {
    let project = TestProject::new("devops").unwrap();
    for file in ["a.yaml", "b.yaml", "c.yaml"] {
        project.layout.write_template("devops", file, &[]).unwrap();
    }
    project
        .layout
        .write_config("environment: devops\nstacks:\n  - stack_name: a\n  - stack_name: b\n  - stack_name: c\n")
        .unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn").with_delay(Duration::from_millis(50));
    let status = ScriptedStatus::new();
    DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, None).await.unwrap();

    assert_eq!(worker.max_in_flight(), 3);
}

#[tokio::test]
async fn test_targeted_deploy_skips_dependency_check() {
    let project = TestProject::chain("devops").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    let status = ScriptedStatus::new();
    let report =
        DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, Some("frontend")).await.unwrap();

    assert_eq!(worker.invoked_stacks(), vec!["frontend-devops"]);
    assert_eq!(report.outcomes.len(), 1);
}

#[tokio::test]
async fn test_unknown_target_is_rejected() {
    let project = TestProject::chain("devops").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    let status = ScriptedStatus::new();
    let err =
        DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, Some("frontnd")).await.unwrap_err();

    match deploy_error(&err) {
        DeployError::StackNotFound { name, available } => {
            assert_eq!(name, "frontnd");
            assert_eq!(available.len(), 3);
        }
        other => panic!("Expected StackNotFound, got {other:?}"),
    }
    assert!(worker.invocations().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_fails_the_stack() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "api.yaml", &[]).unwrap();
    project.layout.write_config("environment: devops\nstacks:\n  - stack_name: api\n").unwrap();
    let plan = project.plan().unwrap();

    let worker = ScriptedWorker::new("deployer-fn");
    worker.script("api-devops", [WorkerReply::Payload(serde_json::json!({"status": "ok"}))]);
    let status = ScriptedStatus::new();

    let err = DeploymentDriver::new(&worker, &status, fast_settings()).deploy(&plan, None).await.unwrap_err();
    assert!(matches!(
        deploy_error(&err),
        DeployError::FailedStacks { stacks } if stacks == &["api-devops"]
    ));
}
