//! Per-stack parameter materialization.
//!
//! Turns one [`StackDefinition`] into a [`ResolvedMessage`]: locate and parse
//! its template, resolve every configured parameter, backfill undeclared
//! ones from globals with the same name and check that the result matches
//! the template's declared parameters exactly.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::config::{StackDefinition, ValueSpec};
use crate::core::DeployError;
use crate::resolver::globals::{GlobalUsage, ResolvedGlobals};
use crate::templating::{Substitution, TemplateDocument, TemplateLocator, TemplateSources};
use crate::version::{VersionTable, short_version};

/// The deployment request sent to the worker for one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMessage {
    /// Environment-suffixed stack name
    pub stack_name: String,
    /// Raw template body
    pub template: String,
    /// Final parameters, exactly the template's declared set
    pub parameters: BTreeMap<String, String>,
    /// SHA-256 hex of the template body
    pub template_content_hash: String,
}

/// A materialized stack together with where its template came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStack {
    /// Message for the worker
    pub message: ResolvedMessage,
    /// Template file name as configured or derived
    pub template_file: String,
    /// Path the template was read from
    pub template_path: PathBuf,
}

/// Outcome of materializing one stack definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// The stack takes part in the run
    Ready(Box<PreparedStack>),
    /// The stack has no name and is silently left out
    SkippedUnnamed,
    /// The stack is disabled
    SkippedDisabled(String),
}

/// Read-only inputs shared by every stack of a run.
#[derive(Debug, Clone, Copy)]
pub struct MaterializeContext<'a> {
    /// Resolved globals
    pub globals: &'a ResolvedGlobals,
    /// Version table for `$version` parameters
    pub versions: &'a VersionTable,
    /// Run environment
    pub environment: &'a str,
    /// Template lookup
    pub locator: &'a TemplateLocator,
}

/// Materialize one stack.
///
/// Global usage and template sources are recorded into the accumulators
/// passed by the caller.
pub fn materialize(
    stack: &StackDefinition,
    ctx: MaterializeContext<'_>,
    usage: &mut GlobalUsage,
    sources: &mut TemplateSources,
) -> Result<Materialized> {
    let (Some(name), Some(template_file)) = (stack.name.as_deref(), stack.template_file_name())
    else {
        tracing::debug!("Skipping stack without a name");
        return Ok(Materialized::SkippedUnnamed);
    };

    let located = ctx.locator.locate(&template_file, sources)?;
    let document = TemplateDocument::load(&located.path)?;
    let template_display = located.path.display().to_string();

    let stack_name = crate::config::suffixed_stack_name(name, Some(ctx.environment));
    if stack.disabled {
        tracing::debug!("Skipping {stack_name} as it is disabled");
        return Ok(Materialized::SkippedDisabled(stack_name));
    }

    let mut parameters = BTreeMap::new();
    for (key, spec) in &stack.parameters {
        let value = resolve_parameter(&stack_name, spec, ctx, usage)?;
        tracing::debug!("Resolved parameter {key} of {stack_name} from {spec} to {value}");
        parameters.insert(key.clone(), value);
    }

    for declared in &document.parameters {
        if parameters.contains_key(declared) {
            continue;
        }
        if let Some(value) = ctx.globals.get(declared) {
            tracing::debug!("Missing parameter {declared:<20} found in globals, using global value");
            parameters.insert(declared.clone(), value.to_string());
            usage.mark(declared);
        }
    }

    let supplied: BTreeSet<String> = parameters.keys().cloned().collect();

    let missing: Vec<String> = document.parameters.difference(&supplied).cloned().collect();
    if !missing.is_empty() {
        return Err(DeployError::MissingParameters {
            stack: stack_name,
            template: template_display,
            parameters: missing,
        }
        .into());
    }

    let superfluous: Vec<String> = supplied.difference(&document.parameters).cloned().collect();
    if !superfluous.is_empty() {
        return Err(DeployError::SuperfluousParameters {
            stack: stack_name,
            template: template_display,
            parameters: superfluous,
        }
        .into());
    }

    let template_content_hash = document.content_hash();
    Ok(Materialized::Ready(Box::new(PreparedStack {
        message: ResolvedMessage {
            stack_name,
            template: document.body,
            parameters,
            template_content_hash,
        },
        template_file,
        template_path: located.path,
    })))
}

fn resolve_parameter(
    stack_name: &str,
    spec: &ValueSpec,
    ctx: MaterializeContext<'_>,
    usage: &mut GlobalUsage,
) -> Result<String> {
    match spec {
        ValueSpec::Literal(value) => Ok(value.clone()),
        ValueSpec::Ref(reference) => {
            let value = ctx.globals.get(reference).ok_or_else(|| DeployError::GlobalNotFound {
                owner: stack_name.to_string(),
                reference: reference.clone(),
            })?;
            usage.mark(reference);
            Ok(value.to_string())
        }
        ValueSpec::Sub(pattern) => {
            let sub = Substitution::new(pattern);
            let identifiers = sub.identifiers();
            if identifiers.is_empty() {
                return Err(DeployError::SubstitutionWithoutIdentifiers {
                    owner: stack_name.to_string(),
                    pattern: pattern.clone(),
                }
                .into());
            }
            if let Some(missing) = identifiers.iter().find(|id| !ctx.globals.contains(id)) {
                return Err(DeployError::IdentifierNotFound {
                    owner: stack_name.to_string(),
                    identifier: (*missing).to_string(),
                }
                .into());
            }
            for identifier in identifiers {
                usage.mark(identifier);
            }
            Ok(sub.safe_substitute(|name| ctx.globals.get(name)))
        }
        ValueSpec::Version(repository) => ctx
            .versions
            .lookup(repository)
            .map(|version| short_version(version).to_string())
            .ok_or_else(|| {
                DeployError::VersionNotFound {
                    owner: stack_name.to_string(),
                    repository: repository.clone(),
                    known: ctx.versions.known_keys(),
                }
                .into()
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::globals::resolve_globals;
    use std::fs;
    use std::path::Path;

    struct Fixture {
        temp: tempfile::TempDir,
        globals: ResolvedGlobals,
        usage: GlobalUsage,
        versions: VersionTable,
    }

    impl Fixture {
        fn new(globals: &[(&str, &str)]) -> Self {
            let temp = tempfile::tempdir().unwrap();
            fs::create_dir_all(temp.path().join("devops")).unwrap();
            let specs: Vec<_> = globals
                .iter()
                .map(|(k, v)| (k.to_string(), ValueSpec::Literal(v.to_string())))
                .collect();
            let versions = VersionTable::new(
                [("org/app".to_string(), "abcdef1234567890".to_string())].into_iter().collect(),
            );
            let (globals, usage) = resolve_globals(&specs, &versions, "devops", 42).unwrap();
            Self {
                temp,
                globals,
                usage,
                versions,
            }
        }

        fn template(&self, file: &str, body: &str) {
            fs::write(self.temp.path().join("devops").join(file), body).unwrap();
        }

        fn run(&mut self, stack: &StackDefinition) -> Result<Materialized> {
            let locator = TemplateLocator::new(&self.temp.path().join("devops"), "devops");
            let ctx = MaterializeContext {
                globals: &self.globals,
                versions: &self.versions,
                environment: "devops",
                locator: &locator,
            };
            materialize(stack, ctx, &mut self.usage, &mut TemplateSources::new())
        }
    }

    fn stack(name: &str, parameters: &[(&str, ValueSpec)]) -> StackDefinition {
        StackDefinition {
            name: Some(name.to_string()),
            template_file: None,
            parameters: parameters.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            dependencies: Vec::new(),
            disabled: false,
        }
    }

    const TEMPLATE: &str = "Parameters:\n  Bucket:\n    Type: String\n  Tag:\n    Type: String\n  Vpc:\n    Type: String\n  Name:\n    Type: String\nResources: {}\n";

    fn ready(result: Materialized) -> PreparedStack {
        match result {
            Materialized::Ready(prepared) => *prepared,
            other => panic!("Expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_every_directive_and_backfill() {
        let mut fixture = Fixture::new(&[("VpcId", "vpc-1"), ("Vpc", "vpc-global"), ("Bucket", "b1")]);
        fixture.template("api_service.yaml", TEMPLATE);

        let prepared = ready(
            fixture
                .run(&stack(
                    "api-service",
                    &[
                        ("Vpc", ValueSpec::Ref("VpcId".to_string())),
                        ("Name", ValueSpec::Sub("${Environment}-api".to_string())),
                        ("Tag", ValueSpec::Version("org/app".to_string())),
                    ],
                ))
                .unwrap(),
        );

        let message = &prepared.message;
        assert_eq!(message.stack_name, "api-service-devops");
        assert_eq!(prepared.template_file, "api_service.yaml");
        assert_eq!(message.parameters["Vpc"], "vpc-1");
        assert_eq!(message.parameters["Name"], "devops-api");
        assert_eq!(message.parameters["Tag"], "abcdef1");
        assert_eq!(message.parameters["Bucket"], "b1");
        assert_eq!(message.parameters.len(), 4);
        assert_eq!(message.template, TEMPLATE);
        assert_eq!(message.template_content_hash, crate::templating::content_hash(TEMPLATE));

        assert!(fixture.usage.is_referenced("VpcId"));
        assert!(fixture.usage.is_referenced("Bucket"));
        assert!(!fixture.usage.is_referenced("Vpc"));
    }

    #[test]
    fn test_missing_parameters_are_named() {
        let mut fixture = Fixture::new(&[]);
        fixture.template("api.yaml", TEMPLATE);
        let err = fixture.run(&stack("api", &[("Tag", ValueSpec::Literal("t".to_string()))])).unwrap_err();
        match err.downcast_ref::<DeployError>() {
            Some(DeployError::MissingParameters { stack, template, parameters }) => {
                assert_eq!(stack, "api-devops");
                assert!(template.ends_with("api.yaml"));
                assert_eq!(parameters, &["Bucket", "Name", "Vpc"]);
            }
            other => panic!("Expected MissingParameters, got {other:?}"),
        }
    }

    #[test]
    fn test_superfluous_parameters_are_named() {
        let mut fixture = Fixture::new(&[]);
        fixture.template("api.yaml", "Resources: {}\n");
        let err = fixture
            .run(&stack(
                "api",
                &[("Extra", ValueSpec::Literal("1".to_string())), ("Also", ValueSpec::Literal("2".to_string()))],
            ))
            .unwrap_err();
        match err.downcast_ref::<DeployError>() {
            Some(DeployError::SuperfluousParameters { parameters, .. }) => {
                assert_eq!(parameters, &["Also", "Extra"]);
            }
            other => panic!("Expected SuperfluousParameters, got {other:?}"),
        }
    }

    #[test]
    fn test_unnamed_and_disabled_stacks_are_skipped() {
        let mut fixture = Fixture::new(&[]);
        fixture.template("legacy.yaml", "Resources: {}\n");

        let mut unnamed = stack("x", &[]);
        unnamed.name = None;
        assert_eq!(fixture.run(&unnamed).unwrap(), Materialized::SkippedUnnamed);

        let mut disabled = stack("legacy", &[]);
        disabled.disabled = true;
        assert_eq!(
            fixture.run(&disabled).unwrap(),
            Materialized::SkippedDisabled("legacy-devops".to_string())
        );
    }

    #[test]
    fn test_disabled_stack_still_needs_its_template() {
        let mut fixture = Fixture::new(&[]);
        let mut disabled = stack("gone", &[]);
        disabled.disabled = true;
        let err = fixture.run(&disabled).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn test_parameter_directive_errors() {
        let mut fixture = Fixture::new(&[]);
        fixture.template("api.yaml", "Parameters:\n  P:\n    Type: String\n");

        let cases = [
            (ValueSpec::Ref("Nope".to_string()), "GlobalNotFound"),
            (ValueSpec::Sub("static".to_string()), "SubstitutionWithoutIdentifiers"),
            (ValueSpec::Sub("$Nope".to_string()), "IdentifierNotFound"),
            (ValueSpec::Version("org/none".to_string()), "VersionNotFound"),
        ];
        for (spec, expected) in cases {
            let err = fixture.run(&stack("api", &[("P", spec)])).unwrap_err();
            let debug = format!("{:?}", err.downcast_ref::<DeployError>().unwrap());
            assert!(debug.starts_with(expected), "{debug} should be {expected}");
            assert!(debug.contains("api-devops"));
        }
    }

    #[test]
    fn test_materialization_is_idempotent() {
        let mut fixture = Fixture::new(&[("Bucket", "b")]);
        fixture.template("api.yaml", "Parameters:\n  Bucket:\n    Type: String\n");
        let definition = stack("api", &[]);
        let first = ready(fixture.run(&definition).unwrap());
        let second = ready(fixture.run(&definition).unwrap());
        assert_eq!(first, second);
        assert_eq!(first.template_path, fixture.temp.path().join(Path::new("devops/api.yaml")));
    }

    #[test]
    fn test_message_json_field_names() {
        let message = ResolvedMessage {
            stack_name: "a-devops".to_string(),
            template: "Resources: {}".to_string(),
            parameters: BTreeMap::from([("K".to_string(), "V".to_string())]),
            template_content_hash: "h".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["stack_name"], "a-devops");
        assert_eq!(json["template"], "Resources: {}");
        assert_eq!(json["parameters"]["K"], "V");
        assert_eq!(json["template_content_hash"], "h");
    }
}
