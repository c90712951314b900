//! Error handling for the stack deployer
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`DeployError`]) so callers and tests can match on
//!    the exact failure (missing parameter, disabled dependency, failed stacks, ...)
//! 2. **User-friendly reporting** ([`ErrorContext`]) with details and suggestions
//!    for the CLI
//!
//! # Error Categories
//!
//! - **Configuration**: everything detected before the first dispatch. These abort
//!   the run immediately, no stack is deployed.
//! - **Dispatch**: worker invocation and status polling failures. These are
//!   caught at the per-stack boundary by the deployment driver and converted
//!   into a failed outcome for that stack.
//! - **Aggregate**: [`DeployError::FailedStacks`] and
//!   [`DeployError::DependencyNotSucceeded`] summarise a run that could not
//!   complete.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stack_deployer::core::{DeployError, user_friendly_error};
//!
//! let error = DeployError::EnvironmentMissing {
//!     file: "devops/stacks.yaml".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Joins a list of names for inclusion in an error message.
fn join_names(names: &[String]) -> String {
    names.join(", ")
}

/// The main error type for deployer operations
///
/// Every configuration error carries enough context (stack name, template path,
/// offending key) to be actionable without re-running in verbose mode.
#[derive(Error, Debug, Clone)]
pub enum DeployError {
    /// The configuration has no `environment` key.
    #[error("Environment not found in config file {file}")]
    EnvironmentMissing {
        /// Path of the configuration file
        file: String,
    },

    /// Configuration file does not exist
    #[error("Config file {path} not found")]
    ConfigNotFound {
        /// Path that was checked
        path: String,
    },

    /// Configuration file could not be parsed
    #[error("Invalid configuration syntax in {file}")]
    ConfigParseError {
        /// Path of the configuration file
        file: String,
        /// Parser message, with surrounding lines when available
        reason: String,
    },

    /// Two stacks share the same base name
    #[error("Stack '{name}' is defined more than once")]
    DuplicateStack {
        /// Duplicated base name
        name: String,
    },

    /// The `repo_versions_file` referenced by the config does not exist
    #[error("repo_versions_file {path} not found")]
    VersionsFileNotFound {
        /// Resolved path of the versions file
        path: String,
    },

    /// Template file not found in any environment tier
    #[error("File {file} not found in any environment of {environments:?}, checked {checked:?}")]
    TemplateNotFound {
        /// Template file name
        file: String,
        /// Environment tiers that were searched
        environments: Vec<String>,
        /// Every path that was checked
        checked: Vec<String>,
    },

    /// Template is empty or not mapping-shaped
    #[error("Template file {file} is not a valid template: {reason}")]
    InvalidTemplate {
        /// Template path
        file: String,
        /// Why it was rejected
        reason: String,
    },

    /// Declared template parameters that nothing supplies
    #[error("Missing parameters for {stack} loaded from {template}: {}", join_names(.parameters))]
    MissingParameters {
        /// Environment-suffixed stack name
        stack: String,
        /// Template path
        template: String,
        /// Missing parameter names, sorted
        parameters: Vec<String>,
    },

    /// Supplied parameters that the template does not declare
    #[error("Superfluous parameters for {stack} loaded from {template}: {}", join_names(.parameters))]
    SuperfluousParameters {
        /// Environment-suffixed stack name
        stack: String,
        /// Template path
        template: String,
        /// Extra parameter names, sorted
        parameters: Vec<String>,
    },

    /// A parameter or global value is not a string-coercible scalar or directive
    #[error("Parameter {key} for {owner} is not a string, but {actual_type}")]
    InvalidParameterType {
        /// Stack name or `globals`
        owner: String,
        /// Offending key
        key: String,
        /// Type that was found
        actual_type: String,
    },

    /// `$ref` target missing from globals
    #[error("Global reference {reference} not found in globals for {owner}")]
    GlobalNotFound {
        /// Stack name or global key holding the reference
        owner: String,
        /// Referenced global key
        reference: String,
    },

    /// `$ref`/`$sub` target exists but is itself still an unresolved directive
    #[error("Global {reference} used by {owner} is not resolved yet; {owner} would need a later resolution pass")]
    UnresolvedGlobal {
        /// Global holding the reference
        owner: String,
        /// Referenced global key
        reference: String,
    },

    /// `$sub` template without any `$identifier`
    #[error("Template {pattern} has no identifiers for {owner}")]
    SubstitutionWithoutIdentifiers {
        /// Stack name or global key
        owner: String,
        /// The substitution pattern
        pattern: String,
    },

    /// `$sub` identifier missing from globals
    #[error("Identifier {identifier} not found in globals for {owner}")]
    IdentifierNotFound {
        /// Stack name or global key
        owner: String,
        /// Missing identifier
        identifier: String,
    },

    /// `$version` lookup failed
    #[error("Version for repo {repository} not found (needed by {owner}); known repos: {}", join_names(.known))]
    VersionNotFound {
        /// Stack name or global key
        owner: String,
        /// Repository or repository#component identifier
        repository: String,
        /// Keys present in the version table
        known: Vec<String>,
    },

    /// Dependency name does not refer to any stack in the config
    #[error("Dependency {dependency} of {stack} not found in stacks")]
    DependencyNotFound {
        /// Dependent stack
        stack: String,
        /// Environment-suffixed dependency name
        dependency: String,
    },

    /// Dependency refers to a disabled stack
    #[error(
        "Stack {stack} depends on disabled stack {dependency}. Cannot deploy a stack that depends on a disabled stack. Either enable the dependency or remove the dependency."
    )]
    DisabledDependency {
        /// Dependent stack
        stack: String,
        /// Disabled dependency
        dependency: String,
    },

    /// Circular dependency detected in the stack graph
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// Cycle path rendered as `a → b → a`
        chain: String,
    },

    /// Stack name filter matched nothing
    #[error("Stack {name} not found in config file. Available stacks: {}", join_names(.available))]
    StackNotFound {
        /// Requested filter
        name: String,
        /// Environment-suffixed names in the plan
        available: Vec<String>,
    },

    /// A stack is about to be dispatched but an upstream stack did not succeed
    #[error(
        "Cannot deploy {stack} because the following dependencies have not been successfully deployed: {}. This indicates a deployment failure in earlier generations.",
        join_names(.missing)
    )]
    DependencyNotSucceeded {
        /// Stack that cannot proceed
        stack: String,
        /// Transitive dependencies without a successful outcome, sorted
        missing: Vec<String>,
    },

    /// Worker invocation failed for a reason other than rate limiting
    #[error("Failed to invoke worker {worker} for {stack}: {reason}")]
    WorkerInvocationFailed {
        /// Worker (function) name
        worker: String,
        /// Stack being deployed
        stack: String,
        /// Collaborator message
        reason: String,
    },

    /// Worker kept answering with a rate-limit signal
    #[error("Rate exceeded invoking worker {worker} for {stack} after {attempts} attempts")]
    RateLimited {
        /// Worker (function) name
        worker: String,
        /// Stack being deployed
        stack: String,
        /// Attempts made
        attempts: u32,
    },

    /// Worker response did not have the expected shape
    #[error("Unexpected worker response for {stack}: {reason}")]
    InvalidWorkerResponse {
        /// Stack being deployed
        stack: String,
        /// What was wrong
        reason: String,
    },

    /// Status poll reported a terminal error state
    #[error("Stack {stack} in error state {status}")]
    StackErrorState {
        /// Stack being deployed
        stack: String,
        /// Reported status
        status: String,
    },

    /// Status poll budget exhausted
    #[error("Stack {stack} never reached stable state, is in state {status} after {polls} polls")]
    StackNotStable {
        /// Stack being deployed
        stack: String,
        /// Last reported status
        status: String,
        /// Number of polls made
        polls: u32,
    },

    /// External command (aws, cfn-lint) failed
    #[error("Command failed: {command}")]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Captured stderr
        stderr: String,
    },

    /// Run completed but some stacks failed
    #[error("Failed stacks: {}", join_names(.stacks))]
    FailedStacks {
        /// Every failed stack name
        stacks: Vec<String>,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show the main message in red, optional details in
/// yellow and an optional suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: DeployError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: DeployError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognises [`DeployError`] anywhere in the chain, I/O errors and YAML
/// errors. Anything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(deploy_error) = error.chain().find_map(|e| e.downcast_ref::<DeployError>()) {
        let mut ctx = create_error_context(deploy_error);
        let outer = error.to_string();
        if outer != deploy_error.to_string() && ctx.details.is_none() {
            ctx.details = Some(outer);
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::NotFound
    {
        return ErrorContext::new(DeployError::Other {
            message: format!("{error:#}"),
        })
        .with_suggestion("Check that the file or directory exists and the path is correct");
    }

    if let Some(yaml_error) = error.downcast_ref::<serde_yaml::Error>() {
        return ErrorContext::new(DeployError::Other {
            message: format!("YAML error: {yaml_error}"),
        })
        .with_suggestion("Check the YAML syntax: indentation, quoting and list markers");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(DeployError::Other {
        message,
    })
}

/// Map a [`DeployError`] to a context with tailored suggestions.
fn create_error_context(error: &DeployError) -> ErrorContext {
    let base = ErrorContext::new(error.clone());
    match error {
        DeployError::EnvironmentMissing { .. } => base
            .with_suggestion("Add a top-level 'environment: <name>' key to the config file")
            .with_details("The environment name is appended to every stack name and selects the template tiers"),

        DeployError::ConfigParseError { reason, .. } => base
            .with_details(reason.clone())
            .with_suggestion("Fix the syntax error shown above and run 'stack-deployer dump' to validate"),

        DeployError::TemplateNotFound { file, .. } => base
            .with_suggestion(format!(
                "Create {file} in the environment directory, or set 'template_file' on the stack"
            ))
            .with_details("Templates are searched from the run environment towards devops"),

        DeployError::MissingParameters { .. } => base
            .with_suggestion("Supply the parameters on the stack, or define globals with the same names")
            .with_details("Every parameter declared by the template must be supplied explicitly or through a global"),

        DeployError::SuperfluousParameters { .. } => base
            .with_suggestion("Remove the parameters from the stack or declare them in the template's Parameters section"),

        DeployError::VersionNotFound { .. } => base
            .with_suggestion("Check 'repo_versions_file' in the config and the repository name of the $version directive"),

        DeployError::DisabledDependency { .. } => base
            .with_suggestion("Either enable the dependency or remove the dependency"),

        DeployError::CircularDependency { .. } => base
            .with_suggestion("Review the 'dependencies' lists and remove the cycle"),

        DeployError::StackNotFound { .. } => base
            .with_suggestion("Use either the full stack name (with environment suffix) or just the base name"),

        DeployError::DependencyNotSucceeded { .. } => base
            .with_details("A stack in an earlier generation failed; later generations were not dispatched")
            .with_suggestion("Fix the failed upstream stack and re-run the deployment"),

        DeployError::FailedStacks { .. } => base
            .with_suggestion("Inspect the stack events of the failed stacks and re-run the deployment"),

        _ => base,
    }
}
