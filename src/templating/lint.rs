//! Template linting through the external `cfn-lint` binary.
//!
//! Linting is advisory: findings and failures to run the linter are logged,
//! never fatal.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::constants::{LINT_IGNORED_CHECKS, LINT_REGION};
use crate::utils::ExternalCommand;

/// Name of the linter executable looked up on `PATH`.
pub const LINTER_BINARY: &str = "cfn-lint";

/// Runs `cfn-lint` on template files.
#[derive(Debug, Clone)]
pub struct TemplateLinter {
    binary: PathBuf,
}

impl TemplateLinter {
    /// Find `cfn-lint` on `PATH`.
    pub fn discover() -> Option<Self> {
        which::which(LINTER_BINARY).ok().map(Self::with_binary)
    }

    /// Use an explicit linter executable.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Lint one template.
    ///
    /// Returns `None` for a clean template and the framed linter output
    /// otherwise.
    pub async fn lint(&self, template: &Path) -> Result<Option<String>> {
        let output = ExternalCommand::new(self.binary.as_os_str())
            .args(["--regions", LINT_REGION, "--ignore-checks"])
            .args(LINT_IGNORED_CHECKS)
            .arg("--")
            .arg(template.display().to_string())
            .with_context(template.display().to_string())
            .execute()
            .await?;

        let findings = if output.stdout.trim().is_empty() {
            output.stderr.trim()
        } else {
            output.stdout.trim()
        };

        if output.success && findings.is_empty() {
            return Ok(None);
        }

        Ok(Some(format!(
            "\n-------- START cfn-lint check result --------\n{findings}\n-------- END cfn-lint check result --------"
        )))
    }
}

/// Lint `(file name, path)` pairs and log the findings.
///
/// Returns the number of templates with findings. A missing linter is
/// reported once as a warning.
pub async fn lint_templates(linter: Option<&TemplateLinter>, templates: &[(String, PathBuf)]) -> usize {
    let Some(linter) = linter else {
        tracing::warn!("{LINTER_BINARY} not found on PATH, skipping template linting");
        return 0;
    };

    let mut with_issues = 0;
    for (file_name, path) in templates {
        match linter.lint(path).await {
            Ok(None) => tracing::debug!("No lint issues in {file_name}"),
            Ok(Some(report)) => {
                with_issues += 1;
                tracing::info!("Found issues in file {file_name}:\n{report}");
            }
            Err(e) => {
                with_issues += 1;
                tracing::error!("Failed to run {LINTER_BINARY} on {file_name}: {e:#}");
            }
        }
    }
    with_issues
}
