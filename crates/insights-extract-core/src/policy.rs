//! Per-category filter policies.
//!
//! A [`FilterPolicy`] tells the file filter which timestamp column to read and
//! what to do when a payload does not have it. Policies are looked up by
//! category name in a [`PolicyTable`]; categories without an override use the
//! table's default. Adding a category rule is a data change: insert another
//! override, either in code or from the command line via [`PolicyOverride`].

use std::{collections::HashMap, str::FromStr};

use snafu::prelude::*;

/// Timestamp column used by every category without an override.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "edited_date";

/// Category holding view events, which are timestamped differently.
pub const VIEW_EVENTS_CATEGORY: &str = "view_events";

/// Timestamp column of the view-events category.
pub const VIEW_EVENTS_TIMESTAMP_COLUMN: &str = "event_time";

/// Modifier in a policy override that marks the column as optional.
const SKIP_MISSING_SUFFIX: &str = "skip-missing";

/// What the filter does with a payload that lacks the timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingColumn {
    /// Record a file-level error and leave the file out of the output.
    #[default]
    Fail,
    /// Treat the file as having zero matching rows; nothing is reported.
    TreatAsEmpty,
}

/// Filtering rule for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Column whose calendar date is compared with the target date.
    pub timestamp_column: String,
    /// Behavior when `timestamp_column` is absent from a payload.
    pub missing_column: MissingColumn,
}

impl FilterPolicy {
    /// A policy whose column must be present in every payload.
    pub fn required(timestamp_column: impl Into<String>) -> Self {
        FilterPolicy {
            timestamp_column: timestamp_column.into(),
            missing_column: MissingColumn::Fail,
        }
    }

    /// A policy that silently yields zero rows when the column is absent.
    pub fn optional(timestamp_column: impl Into<String>) -> Self {
        FilterPolicy {
            timestamp_column: timestamp_column.into(),
            missing_column: MissingColumn::TreatAsEmpty,
        }
    }

    /// Whether a missing timestamp column is reported as a file error.
    pub fn missing_column_is_fatal(&self) -> bool {
        self.missing_column == MissingColumn::Fail
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        FilterPolicy::required(DEFAULT_TIMESTAMP_COLUMN)
    }
}

/// Lookup table from category name to [`FilterPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    default: FilterPolicy,
    overrides: HashMap<String, FilterPolicy>,
}

impl PolicyTable {
    /// A table with no overrides: every category uses `default`.
    pub fn new(default: FilterPolicy) -> Self {
        PolicyTable {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Builder-style variant of [`PolicyTable::insert`].
    pub fn with_override(mut self, category: impl Into<String>, policy: FilterPolicy) -> Self {
        self.insert(category, policy);
        self
    }

    /// Add or replace the policy for `category`, returning the previous override.
    pub fn insert(
        &mut self,
        category: impl Into<String>,
        policy: FilterPolicy,
    ) -> Option<FilterPolicy> {
        self.overrides.insert(category.into(), policy)
    }

    /// Policy that applies to `category`.
    pub fn policy_for(&self, category: &str) -> &FilterPolicy {
        self.overrides.get(category).unwrap_or(&self.default)
    }

    /// Policy used for categories without an override.
    pub fn default_policy(&self) -> &FilterPolicy {
        &self.default
    }
}

impl Default for PolicyTable {
    /// `edited_date` (required) everywhere, `event_time` (optional) for view events.
    fn default() -> Self {
        PolicyTable::new(FilterPolicy::default()).with_override(
            VIEW_EVENTS_CATEGORY,
            FilterPolicy::optional(VIEW_EVENTS_TIMESTAMP_COLUMN),
        )
    }
}

/// Errors produced when parsing a `CATEGORY=COLUMN[:skip-missing]` override.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParsePolicyError {
    /// The override has no `=` separating category and column.
    #[snafu(display("policy '{spec}' is missing '=' (expected CATEGORY=COLUMN[:skip-missing])"))]
    MissingSeparator {
        /// The override as given.
        spec: String,
    },

    /// The category part is empty.
    #[snafu(display("policy '{spec}' has an empty category"))]
    EmptyCategory {
        /// The override as given.
        spec: String,
    },

    /// The column part is empty.
    #[snafu(display("policy '{spec}' has an empty column"))]
    EmptyColumn {
        /// The override as given.
        spec: String,
    },

    /// The part after `:` is not a known modifier.
    #[snafu(display("unknown policy modifier '{modifier}' in '{spec}' (expected skip-missing)"))]
    UnknownModifier {
        /// The override as given.
        spec: String,
        /// The unrecognized modifier.
        modifier: String,
    },
}

/// A single category override, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOverride {
    /// Category the override applies to.
    pub category: String,
    /// Policy for that category.
    pub policy: FilterPolicy,
}

impl FromStr for PolicyOverride {
    type Err = ParsePolicyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let spec = input.trim();
        let Some((category, rest)) = spec.split_once('=') else {
            return MissingSeparatorSnafu { spec }.fail();
        };

        let category = category.trim();
        ensure!(!category.is_empty(), EmptyCategorySnafu { spec });

        let (column, modifier) = match rest.split_once(':') {
            Some((column, modifier)) => (column.trim(), Some(modifier.trim())),
            None => (rest.trim(), None),
        };
        ensure!(!column.is_empty(), EmptyColumnSnafu { spec });

        let policy = match modifier {
            None => FilterPolicy::required(column),
            Some(m) if m.eq_ignore_ascii_case(SKIP_MISSING_SUFFIX) => FilterPolicy::optional(column),
            Some(m) => {
                return UnknownModifierSnafu { spec, modifier: m }.fail();
            }
        };

        Ok(PolicyOverride {
            category: category.to_string(),
            policy,
        })
    }
}

impl Extend<PolicyOverride> for PolicyTable {
    fn extend<I: IntoIterator<Item = PolicyOverride>>(&mut self, iter: I) {
        for o in iter {
            self.insert(o.category, o.policy);
        }
    }
}
