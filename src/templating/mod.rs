//! Template handling
//!
//! - [`lookup`] finds template files across environment tiers and records
//!   which tier each file came from
//! - [`document`] parses a template, extracts its declared parameters and
//!   computes the content hash
//! - [`substitution`] implements the `$identifier` substitution used by
//!   `$sub` directives
//! - [`lint`] runs `cfn-lint` on templates

pub mod document;
pub mod lint;
pub mod lookup;
pub mod substitution;

pub use document::{TemplateDocument, content_hash};
pub use lint::{TemplateLinter, lint_templates};
pub use lookup::{LocatedTemplate, TemplateLocator, TemplateSources};
pub use substitution::Substitution;
