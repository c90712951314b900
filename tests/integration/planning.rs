use stack_deployer::constants::TIMESTAMP_GLOBAL;
use stack_deployer::core::DeployError;
use stack_deployer::resolver::PlannedStack;
use stack_deployer::templating::content_hash;

use crate::common::{TEST_TIMESTAMP, TestProject};

fn deploy_error(err: &anyhow::Error) -> &DeployError {
    err.chain().find_map(|e| e.downcast_ref::<DeployError>()).expect("DeployError in chain")
}

#[test]
fn test_chain_is_planned_dependencies_first() {
    let project = TestProject::chain("devops").unwrap();
    let plan = project.plan().unwrap();

    let generations: Vec<Vec<&str>> =
        plan.generations.iter().map(|g| g.iter().map(PlannedStack::stack_name).collect()).collect();
    assert_eq!(generations, vec![vec!["network-devops"], vec!["backend-devops"], vec!["frontend-devops"]]);

    let backend = plan.find("backend").unwrap();
    assert_eq!(backend.message.parameters["ImageTag"], "0123456");
    assert_eq!(backend.message.parameters["Environment"], "devops");
    assert_eq!(backend.template_file, "backend.yaml");
    assert_eq!(backend.message.template_content_hash, content_hash(&backend.message.template));

    let frontend = plan.find("frontend-devops").unwrap();
    assert_eq!(frontend.message.parameters["BucketName"], "assets-devops");
    assert_eq!((frontend.sequence, frontend.total), (2, 3));

    let deps: Vec<String> = plan.graph.transitive_deps("frontend-devops").into_iter().collect();
    assert_eq!(deps, vec!["backend-devops", "network-devops"]);
    assert!(plan.unused_globals.is_empty());
}

#[test]
fn test_templates_fall_back_to_later_tiers() {
    let project = TestProject::new("staging").unwrap();
    project.layout.write_template("staging", "api.yaml", &[]).unwrap();
    project.layout.write_template("production", "worker.yaml", &[]).unwrap();
    project.layout.write_template("devops", "worker.yaml", &["Unreachable"]).unwrap();
    project.layout.write_template("devops", "dns.yaml", &[]).unwrap();
    project.layout.write_template("development", "dns.yaml", &["Unreachable"]).unwrap();
    project
        .layout
        .write_config(
            "environment: staging\nstacks:\n  - stack_name: api\n  - stack_name: worker\n  - stack_name: dns\n",
        )
        .unwrap();

    let plan = project.plan().unwrap();
    assert_eq!(plan.template_sources.tier_of("api.yaml"), Some("staging"));
    assert_eq!(plan.template_sources.tier_of("worker.yaml"), Some("production"));
    assert_eq!(plan.template_sources.tier_of("dns.yaml"), Some("devops"));
    assert!(plan.find("worker").unwrap().message.parameters.is_empty());
}

#[test]
fn test_explicit_parameters_and_directives() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "job.yaml", &["Name", "Stamp", "Tag", "Label"]).unwrap();
    project.layout.write_versions(&[("org/job", "fedcba9876543210")]).unwrap();
    project
        .layout
        .write_config(&format!(
            r#"
environment: devops
repo_versions_file: ../versions.yaml
globals:
  Team: platform
stacks:
  - stack_name: nightly-job
    template_file: job.yaml
    parameters:
      Name: literal
      Stamp: {{ $ref: {TIMESTAMP_GLOBAL} }}
      Tag: {{ $version: org/job }}
      Label: {{ $sub: "$Team-${{Environment}}" }}
"#
        ))
        .unwrap();

    let plan = project.plan().unwrap();
    let job = plan.find("nightly-job").unwrap();
    assert_eq!(job.message.parameters["Name"], "literal");
    assert_eq!(job.message.parameters["Stamp"], TEST_TIMESTAMP.to_string());
    assert_eq!(job.message.parameters["Tag"], "fedcba9");
    assert_eq!(job.message.parameters["Label"], "platform-devops");
    assert!(plan.unused_globals.is_empty());
}

#[test]
fn test_disabled_and_unnamed_stacks_are_not_planned() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "api.yaml", &[]).unwrap();
    project.layout.write_template("devops", "legacy.yaml", &[]).unwrap();
    project.layout.write_template("devops", "orphan.yaml", &[]).unwrap();
    project
        .layout
        .write_config(
            "environment: devops\nstacks:\n  - stack_name: api\n  - stack_name: legacy\n    disabled: true\n  - template_file: orphan.yaml\n",
        )
        .unwrap();

    let plan = project.plan().unwrap();
    assert_eq!(plan.stack_names(), vec!["api-devops"]);
}

#[test]
fn test_dependency_on_disabled_stack_is_rejected() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "api.yaml", &[]).unwrap();
    project.layout.write_template("devops", "db.yaml", &[]).unwrap();
    project
        .layout
        .write_config(
            "environment: devops\nstacks:\n  - stack_name: api\n    dependencies: [db]\n  - stack_name: db\n    disabled: true\n",
        )
        .unwrap();

    let err = project.plan().unwrap_err();
    assert!(matches!(
        deploy_error(&err),
        DeployError::DisabledDependency { stack, dependency }
            if stack == "api-devops" && dependency == "db-devops"
    ));
}

#[test]
fn test_missing_and_superfluous_parameters() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "api.yaml", &["Needed"]).unwrap();
    project.layout.write_config("environment: devops\nstacks:\n  - stack_name: api\n").unwrap();
    let err = project.plan().unwrap_err();
    assert!(matches!(
        deploy_error(&err),
        DeployError::MissingParameters { parameters, .. } if parameters == &["Needed"]
    ));

    project
        .layout
        .write_config(
            "environment: devops\nstacks:\n  - stack_name: api\n    parameters:\n      Needed: x\n      Extra: y\n",
        )
        .unwrap();
    let err = project.plan().unwrap_err();
    assert!(matches!(
        deploy_error(&err),
        DeployError::SuperfluousParameters { parameters, .. } if parameters == &["Extra"]
    ));
}

#[test]
fn test_cycle_is_reported_before_dispatch() {
    let project = TestProject::new("devops").unwrap();
    project.layout.write_template("devops", "a.yaml", &[]).unwrap();
    project.layout.write_template("devops", "b.yaml", &[]).unwrap();
    project
        .layout
        .write_config(
            "environment: devops\nstacks:\n  - stack_name: a\n    dependencies: [b]\n  - stack_name: b\n    dependencies: [a]\n",
        )
        .unwrap();

    let err = project.plan().unwrap_err();
    assert!(matches!(deploy_error(&err), DeployError::CircularDependency { .. }));
}

#[test]
fn test_override_globals_take_precedence() {
    let project = TestProject::chain("devops").unwrap();
    let mut config = project.config().unwrap();
    config.apply_overrides(vec![("VpcCidr".to_string(), "192.168.0.0/16".to_string())]);

    let plan = stack_deployer::resolver::prepare_plan_at(&config, TEST_TIMESTAMP).unwrap();
    assert_eq!(plan.find("network").unwrap().message.parameters["VpcCidr"], "192.168.0.0/16");
}
