pub mod defaults;
#[cfg(test)]
mod resolver_test;

pub use defaults::{DefaultOptions, OptionSet};

use itertools::Itertools;
use serde::{Serialize, Serializer};
use std::{collections::BTreeMap, fmt};
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("Option --{name} expects {expected} but got '{value}'")]
    TypeMismatch {
        name: String,
        value: String,
        expected: &'static str,
    },
    #[error("Option --{name} requires a value")]
    MissingValue { name: String },
}

/// Value of a launcher option, the variant of a default also determines how overrides
/// for it are coerced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// flag without a default value
    Absent,
    /// flag that was given without a value
    Present,
    Integer(i64),
    Text(String),
}

impl OptionValue {
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_owned())
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, Self::Absent | Self::Present)
    }

    /// whether the token following an option can be its value, anything else starting with
    /// `-` is a launcher option of its own, e.g., `-x NAME=VALUE`
    fn accepts_value(&self, token: &str) -> bool {
        if !token.starts_with('-') {
            return true;
        }

        match self {
            Self::Absent | Self::Present => false,
            Self::Integer(_) | Self::Text(_) => token.parse::<f64>().is_ok(),
        }
    }

    /// coerce an override to the kind of `self`
    fn coerce(&self, name: &str, value: Option<&str>) -> Result<Self, OptionError> {
        match (self, value) {
            // flags are never coerced
            (Self::Absent | Self::Present, None) => Ok(Self::Present),
            (Self::Absent | Self::Present, Some(value)) => Ok(Self::Text(value.to_owned())),
            (_, None) => Err(OptionError::MissingValue {
                name: name.to_owned(),
            }),
            (Self::Integer(_), Some(value)) => {
                value
                    .parse::<i64>()
                    .map(Self::Integer)
                    .map_err(|_| OptionError::TypeMismatch {
                        name: name.to_owned(),
                        value: value.to_owned(),
                        expected: "an integer",
                    })
            }
            (Self::Text(_), Some(value)) => Ok(Self::Text(value.to_owned())),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "<absent>"),
            Self::Present => write!(f, "<present>"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Present => serializer.serialize_bool(true),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Text(value) => serializer.serialize_str(value),
        }
    }
}

/// Defaults merged with the overrides of a single invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOptions {
    pub known: BTreeMap<String, OptionValue>,
    /// tokens not matching any default, in the order they were given
    pub unknown: Vec<String>,
}

impl ResolvedOptions {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.known.get(name)
    }

    /// unknown tokens joined for passing them on to the launcher verbatim
    pub fn unknown_args(&self) -> String {
        self.unknown.iter().join(" ")
    }
}

/// Resolves user overrides against an immutable schema built from the default sets
#[derive(Debug, Clone)]
pub struct OptionResolver {
    schema: BTreeMap<String, OptionValue>,
}

impl OptionResolver {
    pub fn new(defaults: &DefaultOptions) -> Self {
        let mut schema = BTreeMap::new();

        for set in defaults.sets() {
            for (name, value) in set.iter() {
                if let Some(shadowed) = schema.insert(name.to_owned(), value.clone()) {
                    debug!(
                        set = set.name,
                        "Default for --{name} ({shadowed}) replaced with {value}"
                    );
                }
            }
        }

        Self { schema }
    }

    pub fn defaults(&self) -> &BTreeMap<String, OptionValue> {
        &self.schema
    }

    /// Merge a whitespace delimited override string into the defaults.
    ///
    /// All coercion errors are collected instead of stopping at the first one, so a user
    /// can fix every override in one go.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve(&self, overrides: &str) -> Result<ResolvedOptions, Vec<OptionError>> {
        let mut known = self.schema.clone();
        let mut unknown = Vec::new();
        let mut errors = Vec::new();
        let mut tokens = overrides.split_whitespace().peekable();

        while let Some(token) = tokens.next() {
            let Some((name, inline_value)) = split_option(token) else {
                unknown.push(token.to_owned());
                continue;
            };

            let Some(default) = self.schema.get(name) else {
                unknown.push(token.to_owned());
                continue;
            };

            let value = match inline_value {
                Some(value) => Some(value),
                None => tokens.next_if(|next| default.accepts_value(next)),
            };

            match default.coerce(name, value) {
                Ok(value) => {
                    known.insert(name.to_owned(), value);
                }
                Err(error) => {
                    warn!("Failed to apply override: {error}");
                    errors.push(error);
                }
            }
        }

        if !unknown.is_empty() {
            debug!(unknown = ?unknown, "Collected unknown launcher options");
        }

        if errors.is_empty() {
            Ok(ResolvedOptions { known, unknown })
        } else {
            Err(errors)
        }
    }
}

/// split `--name` or `--name=value` into its parts
fn split_option(token: &str) -> Option<(&str, Option<&str>)> {
    let option = token.strip_prefix("--").filter(|option| !option.is_empty())?;

    match option.split_once('=') {
        Some((name, value)) => Some((name, Some(value))),
        None => Some((option, None)),
    }
}
