//! Global variable resolution.
//!
//! Globals resolve in three passes over declaration order:
//!
//! 1. `$version` directives, against the version table
//! 2. `$sub` directives, which may use `$version` results
//! 3. `$ref` directives, which may use either
//!
//! Each pass takes the table produced by the previous one and returns a new
//! table. Within a pass a directive sees the results of directives declared
//! before it; referring to a directive that is still pending (a later pass,
//! or later in the same pass) is an error rather than a silent copy of an
//! unresolved value.
//!
//! Before resolution the run timestamp and the environment name are injected
//! as globals. Both always count as used.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ValueSpec;
use crate::constants::{ENVIRONMENT_GLOBAL, TIMESTAMP_GLOBAL};
use crate::core::DeployError;
use crate::templating::Substitution;
use crate::version::VersionTable;

/// Fully resolved globals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedGlobals {
    values: BTreeMap<String, String>,
}

impl ResolvedGlobals {
    /// Value of a global.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether a global exists.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Every key, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of globals.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no globals.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Set of globals consumed by stacks or by other globals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalUsage {
    referenced: BTreeSet<String>,
}

impl GlobalUsage {
    /// Mark a global as used.
    pub fn mark(&mut self, key: &str) {
        if !self.referenced.contains(key) {
            self.referenced.insert(key.to_string());
        }
    }

    /// Whether a global was used.
    pub fn is_referenced(&self, key: &str) -> bool {
        self.referenced.contains(key)
    }

    /// Globals that nothing used, sorted.
    pub fn unused(&self, globals: &ResolvedGlobals) -> Vec<String> {
        globals.keys().filter(|k| !self.is_referenced(k)).map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Resolved(String),
    Pending(ValueSpec),
}

type Table = Vec<(String, Slot)>;

/// Resolve configured globals.
///
/// `timestamp` is the run timestamp in epoch seconds. Returns the resolved
/// globals and the usage collected during resolution; the caller keeps
/// marking usage while materializing stacks.
pub fn resolve_globals(
    globals: &[(String, ValueSpec)],
    versions: &VersionTable,
    environment: &str,
    timestamp: i64,
) -> Result<(ResolvedGlobals, GlobalUsage)> {
    let mut usage = GlobalUsage::default();

    let mut table: Table = globals
        .iter()
        .map(|(key, spec)| {
            let slot = match spec {
                ValueSpec::Literal(value) => Slot::Resolved(value.clone()),
                other => Slot::Pending(other.clone()),
            };
            (key.clone(), slot)
        })
        .collect();

    inject(&mut table, TIMESTAMP_GLOBAL, timestamp.to_string());
    usage.mark(TIMESTAMP_GLOBAL);
    inject(&mut table, ENVIRONMENT_GLOBAL, environment.to_string());
    usage.mark(ENVIRONMENT_GLOBAL);

    let table = resolve_versions(table, versions)?;
    let table = resolve_substitutions(table, &mut usage)?;
    let table = resolve_references(table, &mut usage)?;

    let mut values = BTreeMap::new();
    for (key, slot) in table {
        match slot {
            Slot::Resolved(value) => {
                values.insert(key, value);
            }
            Slot::Pending(spec) => {
                return Err(DeployError::Other {
                    message: format!("Global {key} left unresolved: {spec}"),
                }
                .into());
            }
        }
    }

    Ok((
        ResolvedGlobals {
            values,
        },
        usage,
    ))
}

fn inject(table: &mut Table, key: &str, value: String) {
    match table.iter_mut().find(|(k, _)| k == key) {
        Some((_, slot)) => *slot = Slot::Resolved(value),
        None => table.push((key.to_string(), Slot::Resolved(value))),
    }
}

fn resolve_versions(table: Table, versions: &VersionTable) -> Result<Table> {
    table
        .into_iter()
        .map(|(key, slot)| match slot {
            Slot::Pending(ValueSpec::Version(repository)) => match versions.resolve(&repository) {
                Some(version) => {
                    tracing::debug!("Calculated global {key} from {repository} yielding {version}");
                    Ok((key, Slot::Resolved(version)))
                }
                None => Err(DeployError::VersionNotFound {
                    owner: key,
                    repository,
                    known: versions.known_keys(),
                }
                .into()),
            },
            other => Ok((key, other)),
        })
        .collect()
}

/// Look up a global that must already be resolved.
fn resolved<'t>(table: &'t Table, owner: &str, reference: &str) -> Result<Option<&'t str>> {
    match table.iter().find(|(k, _)| k == reference) {
        None => Ok(None),
        Some((_, Slot::Resolved(value))) => Ok(Some(value)),
        Some((_, Slot::Pending(_))) => Err(DeployError::UnresolvedGlobal {
            owner: owner.to_string(),
            reference: reference.to_string(),
        }
        .into()),
    }
}

fn resolve_substitutions(mut table: Table, usage: &mut GlobalUsage) -> Result<Table> {
    for idx in 0..table.len() {
        let (key, slot) = &table[idx];
        let Slot::Pending(ValueSpec::Sub(pattern)) = slot else {
            continue;
        };

        let sub = Substitution::new(pattern);
        let identifiers = sub.identifiers();
        if identifiers.is_empty() {
            return Err(DeployError::SubstitutionWithoutIdentifiers {
                owner: key.clone(),
                pattern: pattern.clone(),
            }
            .into());
        }

        let mut values = BTreeMap::new();
        for identifier in identifiers {
            let Some(value) = resolved(&table, key, identifier)? else {
                return Err(DeployError::IdentifierNotFound {
                    owner: key.clone(),
                    identifier: identifier.to_string(),
                }
                .into());
            };
            values.insert(identifier, value);
            usage.mark(identifier);
        }

        let value = sub.safe_substitute(|name| values.get(name).copied());
        tracing::debug!("Calculated global {key} from the pattern {pattern} yielding {value}");
        table[idx].1 = Slot::Resolved(value);
    }
    Ok(table)
}

fn resolve_references(mut table: Table, usage: &mut GlobalUsage) -> Result<Table> {
    for idx in 0..table.len() {
        let (key, slot) = &table[idx];
        let Slot::Pending(ValueSpec::Ref(target)) = slot else {
            continue;
        };

        let Some(value) = resolved(&table, key, target)? else {
            return Err(DeployError::GlobalNotFound {
                owner: key.clone(),
                reference: target.clone(),
            }
            .into());
        };
        let value = value.to_string();
        usage.mark(target);
        tracing::debug!("Calculated global {key} from the reference {target} yielding {value}");
        table[idx].1 = Slot::Resolved(value);
    }
    Ok(table)
}
