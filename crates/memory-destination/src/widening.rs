//! Type-widening policy of the in-memory backend.
//!
//! Decides, per changed column, whether its values can be converted in place
//! or whether the column has to be rebuilt from scratch.

use crate::types::{BIGINT, BOOLEAN, DATE, DECIMAL, JSONB, TIME, TIMESTAMP, TIMESTAMPTZ, TIMETZ, VARCHAR};
use serde_json::Value;
use std::collections::BTreeSet;
use sync_core::ColumnChange;

/// How a changed column is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStrategy {
    /// Values are kept and converted.
    InPlace,

    /// Values cannot be converted; only allowed while the column holds no data.
    Rebuild,
}

/// Table of value-preserving type changes.
#[derive(Debug, Clone)]
pub struct WideningPolicy {
    widenings: BTreeSet<(String, String)>,
}

impl Default for WideningPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl WideningPolicy {
    /// No type change is in place; only nullability relaxation is.
    pub fn strict() -> Self {
        Self {
            widenings: BTreeSet::new(),
        }
    }

    /// BIGINT to DECIMAL, any scalar to VARCHAR, anything to JSONB, and
    /// timestamp/time without zone to their zoned forms.
    pub fn standard() -> Self {
        let scalars = [BOOLEAN, BIGINT, DECIMAL, DATE, TIME, TIMETZ, TIMESTAMP, TIMESTAMPTZ];
        let mut policy = Self::strict()
            .with_widening(BIGINT, DECIMAL)
            .with_widening(TIMESTAMP, TIMESTAMPTZ)
            .with_widening(TIME, TIMETZ);
        for scalar in scalars {
            policy = policy.with_widening(scalar, VARCHAR);
        }
        for any in scalars.into_iter().chain([VARCHAR]) {
            policy = policy.with_widening(any, JSONB);
        }
        policy
    }

    /// Allow `from -> to` in place.
    pub fn with_widening(mut self, from: &str, to: &str) -> Self {
        self.widenings.insert((from.to_string(), to.to_string()));
        self
    }

    pub fn classify(&self, change: &ColumnChange) -> ChangeStrategy {
        let (from, to) = (&change.old.type_name, &change.new.type_name);
        if from == to || self.widenings.contains(&(from.clone(), to.clone())) {
            ChangeStrategy::InPlace
        } else {
            ChangeStrategy::Rebuild
        }
    }
}

/// Convert a value to `type_name` during an in-place change.
pub(crate) fn convert_value(value: Value, type_name: &str) -> Value {
    match (value, type_name) {
        (Value::Null, _) => Value::Null,
        (Value::String(s), VARCHAR) => Value::String(s),
        (other, VARCHAR) => Value::String(other.to_string()),
        (other, _) => other,
    }
}
