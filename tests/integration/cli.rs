use predicates::prelude::*;

use crate::common::TestProject;

#[test]
fn test_dump_prints_one_line_per_stack() {
    let project = TestProject::chain("devops").unwrap();
    let config = project.config_path();

    let output = project.run(&["dump", config.to_str().unwrap()]).unwrap();
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("network-devops using network.yaml (2 parameters)"));
    assert!(output.stdout.contains("frontend-devops using frontend.yaml (2 parameters)"));
    assert!(output.stdout.contains("Summary: processed 3/3 templates"));
}

#[test]
fn test_dump_verbose_single_stack() {
    let project = TestProject::chain("devops").unwrap();
    let config = project.config_path();

    let output = project
        .run(&["--verbose", "dump", config.to_str().unwrap(), "--stack-name", "backend-staging"])
        .unwrap();
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("*** Generation 1:"));
    assert!(output.stdout.contains("using template backend.yaml:"));
    assert!(output.stdout.contains("  ImageTag: 0123456"));
    assert!(output.stdout.contains("AWS::SNS::Topic"));
    assert!(!output.stdout.contains("network-devops"));
    assert!(output.stdout.contains("Summary: processed 1/3 templates"));
}

#[test]
fn test_dump_unknown_stack_suggests_names() {
    let project = TestProject::chain("devops").unwrap();
    let config = project.config_path();

    let output = project.run(&["dump", config.to_str().unwrap(), "--stack-name", "frontnd"]).unwrap();
    assert!(!output.success);
    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Stack name 'frontnd' does not match any available stacks"));
    assert!(output.stderr.contains("Did you mean: frontend?"));
    assert!(output.stderr.contains("Stack frontnd not found in config file"));
}

#[test]
fn test_dump_graph_lists_generations_and_descendants() {
    let project = TestProject::chain("devops").unwrap();
    let config = project.config_path();

    for command in ["dump-graph", "dump_graph"] {
        let output = project.run(&[command, config.to_str().unwrap()]).unwrap();
        assert!(output.success, "stderr: {}", output.stderr);
        assert!(output.stdout.contains("*** Generation 0:\nStack network-devops\n"));
        assert!(
            output
                .stdout
                .contains("*** Generation 2:\nStack frontend-devops\n  - backend-devops\n  - network-devops\n")
        );
    }
}

#[test]
fn test_override_globals_file_is_applied() {
    let project = TestProject::chain("devops").unwrap();
    let overrides = project.layout.write_file("overrides.env", "# local\nVpcCidr=172.16.0.0/12\n").unwrap();
    let config = project.config_path();

    let output = project
        .run(&[
            "--verbose",
            "--override-globals-file",
            overrides.to_str().unwrap(),
            "dump",
            config.to_str().unwrap(),
            "--stack-name",
            "network",
        ])
        .unwrap();
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("  VpcCidr: 172.16.0.0/12"));
}

#[test]
fn test_missing_environment_is_a_configuration_error() {
    let project = TestProject::new("devops").unwrap();
    let config = project.layout.write_config("stacks:\n  - stack_name: api\n").unwrap();

    let output = project.run(&["dump", config.to_str().unwrap()]).unwrap();
    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Environment not found in config file"));
}

#[test]
fn test_missing_config_file() {
    let project = TestProject::new("devops").unwrap();

    assert_cmd::Command::cargo_bin("stack-deployer")
        .unwrap()
        .current_dir(project.layout.root())
        .args(["dump-graph", "devops/nope.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nope.yaml"));
}

#[test]
fn test_help_lists_commands() {
    assert_cmd::Command::cargo_bin("stack-deployer")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy").and(predicate::str::contains("dump-graph")));
}

#[cfg(unix)]
mod with_fake_aws {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use crate::common::TestProject;

    /// `aws` stand-in answering invocations with `lambda_payload`, reporting
    /// every stack as `UPDATE_COMPLETE` and logging each call to `calls.log`.
    fn fake_aws(project: &TestProject, lambda_payload: &str) -> PathBuf {
        let log = project.layout.root().join("calls.log");
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
case "$1" in
  lambda)
    for last; do :; done
    echo '{lambda_payload}' > "$last"
    echo '{{"StatusCode": 200}}'
    ;;
  cloudformation)
    echo UPDATE_COMPLETE
    ;;
esac
"#,
            log = log.display()
        );
        let path = project.layout.write_file("bin/aws", &script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn calls(project: &TestProject) -> Vec<String> {
        std::fs::read_to_string(project.layout.root().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_deploy_invokes_worker_for_every_stack() {
        let project = TestProject::chain("devops").unwrap();
        let aws = fake_aws(&project, r#"[{"status": "ok"}]"#);
        let config = project.config_path();

        let output = project
            .run_with_env(
                &["deploy", "deployer-fn", config.to_str().unwrap(), "--region", "eu-west-1"],
                &[("STACK_DEPLOYER_AWS_BINARY", aws.to_str().unwrap())],
            )
            .unwrap();
        assert!(output.success, "stderr: {}", output.stderr);
        assert!(output.stdout.contains("Deployed 3 stack(s)"));
        assert!(output.stderr.contains("*** Deploying generation 0"));
        assert!(output.stderr.contains("stack network-devops : Invoking worker deployer-fn"));

        let calls = calls(&project);
        let invoked: Vec<&String> = calls.iter().filter(|c| c.starts_with("lambda invoke")).collect();
        assert_eq!(invoked.len(), 3);
        assert!(invoked.iter().all(|c| c.contains("--function-name deployer-fn") && c.contains("--region eu-west-1")));
        assert!(calls.iter().any(|c| c.contains("describe-stacks --stack-name frontend-devops")));
    }

    #[test]
    fn test_deploy_reports_failed_stacks() {
        let project = TestProject::new("devops").unwrap();
        project.layout.write_template("devops", "api.yaml", &[]).unwrap();
        project.layout.write_config("environment: devops\nstacks:\n  - stack_name: api\n").unwrap();
        let aws = fake_aws(&project, r#"[{"status": "error", "reason": "boom"}]"#);
        let config = project.config_path();

        let output = project
            .run_with_env(
                &["deploy", "deployer-fn", config.to_str().unwrap()],
                &[("STACK_DEPLOYER_AWS_BINARY", aws.to_str().unwrap())],
            )
            .unwrap();
        assert_eq!(output.code, Some(1));
        assert!(output.stderr.contains("Failed stacks: api-devops"));
    }
}
