//! Parameter and global value specifications.
//!
//! A value in `globals` or in a stack's `parameters` is either a literal or a
//! single-key directive mapping:
//!
//! ```yaml
//! globals:
//!   Bucket: my-bucket                      # literal
//!   AppVersion: { $version: org/app }      # version table lookup
//!   LambdaVersion: { $version: org/lambdas#bot_admin }
//!   Prefix: { $sub: "${Environment}-app" } # substitution over globals
//!   Alias: { $ref: Bucket }                # copy of another global
//! ```
//!
//! The bare forms `ref`, `sub` and `version` are accepted as aliases.
//! Directives are parsed once at load time; nothing downstream inspects raw
//! YAML shapes.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;

/// A literal or a reference directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSpec {
    /// Plain value, already coerced to a string
    Literal(String),
    /// Copy the resolved value of another global
    Ref(String),
    /// `$identifier` substitution over resolved globals
    Sub(String),
    /// Version table lookup for `repo` or `repo#component`
    Version(String),
}

impl ValueSpec {
    /// Convert a raw YAML value.
    ///
    /// Scalars become [`ValueSpec::Literal`]; single-key directive mappings
    /// become the matching variant. Anything else is rejected with the name
    /// of the type that was found.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, String> {
        use serde_yaml::Value;

        match value {
            Value::String(s) => Ok(Self::Literal(s)),
            Value::Number(n) => Ok(Self::Literal(n.to_string())),
            Value::Bool(b) => Ok(Self::Literal(b.to_string())),
            Value::Mapping(map) => {
                if map.len() != 1 {
                    return Err(format!("mapping with {} keys", map.len()));
                }
                let Some((key, target)) = map.into_iter().next() else {
                    return Err("empty mapping".to_string());
                };
                let Some(directive) = key.as_str() else {
                    return Err(format!("mapping keyed by {}", value_type_name(&key)));
                };
                let target = match target {
                    Value::String(s) => s,
                    other => {
                        return Err(format!(
                            "{directive} directive with {} argument",
                            value_type_name(&other)
                        ));
                    }
                };
                match directive.strip_prefix('$').unwrap_or(directive) {
                    "ref" => Ok(Self::Ref(target)),
                    "sub" => Ok(Self::Sub(target)),
                    "version" => Ok(Self::Version(target)),
                    _ => Err(format!("mapping with unsupported directive '{directive}'")),
                }
            }
            other => Err(value_type_name(&other).to_string()),
        }
    }
}

impl fmt::Display for ValueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Ref(v) => write!(f, "{{$ref: {v}}}"),
            Self::Sub(v) => write!(f, "{{$sub: {v}}}"),
            Self::Version(v) => write!(f, "{{$version: {v}}}"),
        }
    }
}

/// Human readable name of a YAML value's type.
pub fn value_type_name(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// A mapping of raw values that keeps document order.
///
/// Directive resolution walks globals in declaration order, so the order of
/// the source document must survive deserialization for both YAML and JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedValues(pub Vec<(String, serde_yaml::Value)>);

impl<'de> Deserialize<'de> for OrderedValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedValues;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of names to values")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(OrderedValues::default())
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(OrderedValues::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, serde_yaml::Value>()? {
                    entries.push((key, value));
                }
                Ok(OrderedValues(entries))
            }
        }

        deserializer.deserialize_any(OrderedVisitor)
    }
}
