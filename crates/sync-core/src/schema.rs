//! Table schemas and the column-level diff between them.
//!
//! ## Type Hierarchy
//!
//! - `ColumnType` - Dialect-specific column declaration (type name + nullability)
//! - `ColumnDefinition` - A named column
//! - `TableSchema` - Ordered list of columns, either introspected or computed
//! - `TableSchemaDiff` - Minimal column changes reconciling an actual schema with an expected one
//! - `PrimaryKeyDiff` - Added/removed primary-key columns between two syncs
//!
//! The diff is purely set-based. Whether a changed column can be altered in place
//! is decided by the backend when it applies the diff, not here.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Physical identifier of a table in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    /// Namespace (schema/dataset/database, depending on the backend)
    pub namespace: String,

    /// Table name inside the namespace
    pub name: String,
}

impl TableName {
    /// Create a new table name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Sibling table in the same namespace with `suffix` appended to the name.
    ///
    /// Used for temp, staging and dedupe tables.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name: format!("{}{}", self.name, suffix),
        }
    }
}

/// Suffix of the table a sync loads into before promoting to the final table.
pub const TMP_TABLE_SUFFIX: &str = "_airbyte_tmp";
/// Suffix of the table a dedupe-and-overwrite merges into.
pub const DEDUP_TABLE_SUFFIX: &str = "_airbyte_tmp_dedup";
/// Prefix of tables written by the legacy single-table layout.
pub const LEGACY_RAW_PREFIX: &str = "_airbyte_raw_";

impl TableName {
    /// Temp/staging table for this final table.
    pub fn temp_table(&self) -> Self {
        self.with_suffix(TMP_TABLE_SUFFIX)
    }

    /// Scratch table used when deduplicating this final table.
    pub fn dedup_table(&self) -> Self {
        self.with_suffix(DEDUP_TABLE_SUFFIX)
    }

    /// Table the legacy single-table layout used for this final table.
    pub fn legacy_raw_table(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name: format!("{LEGACY_RAW_PREFIX}{}", self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Logical field name -> physical column name.
///
/// Produced by the naming mapper that sits outside this crate. Fields absent
/// from the mapping keep their logical name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNameMapping(BTreeMap<String, String>);

impl ColumnNameMapping {
    /// Create a mapping from (logical, physical) pairs.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Mapping where every logical name maps to itself.
    pub fn identity<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            names
                .into_iter()
                .map(|n| {
                    let n = n.into();
                    (n.clone(), n)
                })
                .collect(),
        )
    }

    /// Physical column for a logical field.
    pub fn get(&self, logical: &str) -> Option<&str> {
        self.0.get(logical).map(String::as_str)
    }

    /// Iterate (logical, physical) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Column and table schemas
// ============================================================================

/// Column type as declared in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnType {
    /// Dialect-specific type name, e.g. `VARCHAR` or `DECIMAL(38, 9)`
    #[serde(rename = "type")]
    pub type_name: String,

    /// Whether the column accepts NULL
    pub nullable: bool,
}

impl ColumnType {
    /// Create a column type.
    pub fn new(type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            type_name: type_name.into(),
            nullable,
        }
    }

    /// Create a nullable column type.
    pub fn nullable(type_name: impl Into<String>) -> Self {
        Self::new(type_name, true)
    }

    /// Create a NOT NULL column type.
    pub fn not_null(type_name: impl Into<String>) -> Self {
        Self::new(type_name, false)
    }

    /// Render the column declaration used in DDL, e.g. `BIGINT NOT NULL`.
    pub fn declaration(&self) -> String {
        if self.nullable {
            self.type_name.clone()
        } else {
            format!("{} NOT NULL", self.type_name)
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration())
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Physical column name
    pub name: String,

    /// Column type
    #[serde(flatten)]
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column name -> type mapping of a table.
///
/// Column names are unique; inserting an existing name replaces its type in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, column_type: ColumnType) {
        let name = name.into();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.column_type = column_type,
            None => self.columns.push(ColumnDefinition::new(name, column_type)),
        }
    }

    /// Builder-style insert.
    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.insert(name, column_type);
        self
    }

    /// Remove a column, returning its type if it was present.
    pub fn remove(&mut self, name: &str) -> Option<ColumnType> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx).column_type)
    }

    /// Get the type of a column by name.
    pub fn get(&self, name: &str) -> Option<&ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.column_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Diff this (actual) schema against an expected one.
    pub fn diff(&self, expected: &TableSchema) -> TableSchemaDiff {
        diff(self, expected)
    }
}

impl<S: Into<String>> FromIterator<(S, ColumnType)> for TableSchema {
    fn from_iter<I: IntoIterator<Item = (S, ColumnType)>>(iter: I) -> Self {
        let mut schema = TableSchema::new();
        for (name, column_type) in iter {
            schema.insert(name, column_type);
        }
        schema
    }
}

// ============================================================================
// Diffs
// ============================================================================

/// Old and new type of a column whose declaration changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChange {
    pub old: ColumnType,
    pub new: ColumnType,
}

/// Column-level changes needed to turn an actual table into the expected one.
///
/// Every column name of either schema appears in exactly one of the four sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchemaDiff {
    /// Columns expected but missing from the actual table
    pub columns_to_add: BTreeMap<String, ColumnType>,

    /// Columns present in the actual table but no longer expected
    pub columns_to_drop: BTreeSet<String>,

    /// Columns present in both with differing declarations
    pub columns_to_change: BTreeMap<String, ColumnChange>,

    /// Columns present in both with identical declarations
    pub columns_to_retain: BTreeSet<String>,
}

impl TableSchemaDiff {
    /// True when applying this diff would not touch the table.
    pub fn is_noop(&self) -> bool {
        self.columns_to_add.is_empty()
            && self.columns_to_drop.is_empty()
            && self.columns_to_change.is_empty()
    }
}

/// Compute the column diff between an `actual` and an `expected` schema.
pub fn diff(actual: &TableSchema, expected: &TableSchema) -> TableSchemaDiff {
    let mut result = TableSchemaDiff::default();

    for column in expected.columns() {
        match actual.get(&column.name) {
            None => {
                result
                    .columns_to_add
                    .insert(column.name.clone(), column.column_type.clone());
            }
            Some(old) if *old == column.column_type => {
                result.columns_to_retain.insert(column.name.clone());
            }
            Some(old) => {
                result.columns_to_change.insert(
                    column.name.clone(),
                    ColumnChange {
                        old: old.clone(),
                        new: column.column_type.clone(),
                    },
                );
            }
        }
    }

    for column in actual.columns() {
        if !expected.contains(&column.name) {
            result.columns_to_drop.insert(column.name.clone());
        }
    }

    result
}

/// Primary-key columns added and removed between two declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyDiff {
    pub columns_to_add: BTreeSet<String>,
    pub columns_to_remove: BTreeSet<String>,
}

impl PrimaryKeyDiff {
    /// Compute the diff between the previously stored key and the declared one.
    pub fn between(actual: &[String], expected: &[String]) -> Self {
        let actual: BTreeSet<&String> = actual.iter().collect();
        let expected: BTreeSet<&String> = expected.iter().collect();
        Self {
            columns_to_add: expected
                .difference(&actual)
                .map(|s| (*s).clone())
                .collect(),
            columns_to_remove: actual
                .difference(&expected)
                .map(|s| (*s).clone())
                .collect(),
        }
    }

    /// True when no constraint-altering step is needed.
    pub fn is_noop(&self) -> bool {
        self.columns_to_add.is_empty() && self.columns_to_remove.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_not_null() -> ColumnType {
        ColumnType::not_null("INTEGER")
    }

    fn varchar() -> ColumnType {
        ColumnType::nullable("VARCHAR")
    }

    #[test]
    fn test_diff_rename_scenario() {
        let expected = TableSchema::new()
            .with_column("id", int_not_null())
            .with_column("name", varchar());
        let actual = TableSchema::new()
            .with_column("id", int_not_null())
            .with_column("old_name", varchar());

        let d = diff(&actual, &expected);

        assert_eq!(
            d.columns_to_add,
            BTreeMap::from([("name".to_string(), varchar())])
        );
        assert_eq!(d.columns_to_drop, BTreeSet::from(["old_name".to_string()]));
        assert!(d.columns_to_change.is_empty());
        assert_eq!(d.columns_to_retain, BTreeSet::from(["id".to_string()]));
        assert!(!d.is_noop());
    }

    #[test]
    fn test_diff_detects_type_and_nullability_changes() {
        let actual = TableSchema::new()
            .with_column("a", ColumnType::nullable("BIGINT"))
            .with_column("b", ColumnType::not_null("VARCHAR"));
        let expected = TableSchema::new()
            .with_column("a", ColumnType::nullable("DECIMAL(38, 9)"))
            .with_column("b", ColumnType::nullable("VARCHAR"));

        let d = actual.diff(&expected);
        assert_eq!(d.columns_to_change.len(), 2);
        assert_eq!(
            d.columns_to_change["a"],
            ColumnChange {
                old: ColumnType::nullable("BIGINT"),
                new: ColumnType::nullable("DECIMAL(38, 9)"),
            }
        );
        assert!(d.columns_to_retain.is_empty());
    }

    #[test]
    fn test_diff_of_identical_schemas_is_noop() {
        let schemas = [
            TableSchema::new(),
            TableSchema::new().with_column("id", int_not_null()),
            TableSchema::new()
                .with_column("id", int_not_null())
                .with_column("name", varchar())
                .with_column("payload", ColumnType::nullable("JSONB")),
        ];
        for schema in &schemas {
            let d = diff(schema, schema);
            assert!(d.is_noop(), "expected noop, got {d:?}");
            assert_eq!(d.columns_to_retain.len(), schema.len());
        }
    }

    #[test]
    fn test_every_column_lands_in_exactly_one_bucket() {
        // Every subset of four column slots, each slot either absent or holding one of two types.
        let types = [None, Some(int_not_null()), Some(varchar())];
        let names = ["a", "b", "c", "d"];
        let mut schemas = vec![];
        let mut idx = [0usize; 4];
        loop {
            let schema: TableSchema = names
                .iter()
                .zip(idx.iter())
                .filter_map(|(name, &i)| types[i].clone().map(|t| (*name, t)))
                .collect();
            schemas.push(schema);

            let mut pos = 0;
            loop {
                if pos == idx.len() {
                    break;
                }
                idx[pos] += 1;
                if idx[pos] < types.len() {
                    break;
                }
                idx[pos] = 0;
                pos += 1;
            }
            if pos == idx.len() {
                break;
            }
        }
        assert_eq!(schemas.len(), 81);

        for actual in &schemas {
            for expected in &schemas {
                let d = diff(actual, expected);
                let union: BTreeSet<&str> = actual
                    .column_names()
                    .into_iter()
                    .chain(expected.column_names())
                    .collect();
                for name in union {
                    let hits = usize::from(d.columns_to_add.contains_key(name))
                        + usize::from(d.columns_to_drop.contains(name))
                        + usize::from(d.columns_to_change.contains_key(name))
                        + usize::from(d.columns_to_retain.contains(name));
                    assert_eq!(hits, 1, "column {name} in {hits} buckets: {d:?}");
                }
                let total = d.columns_to_add.len()
                    + d.columns_to_drop.len()
                    + d.columns_to_change.len()
                    + d.columns_to_retain.len();
                assert_eq!(
                    total,
                    actual
                        .column_names()
                        .into_iter()
                        .chain(expected.column_names())
                        .collect::<BTreeSet<_>>()
                        .len()
                );
            }
        }
    }

    #[test]
    fn test_schema_insert_replaces_in_place() {
        let mut schema = TableSchema::new()
            .with_column("a", varchar())
            .with_column("b", varchar());
        schema.insert("a", int_not_null());
        assert_eq!(schema.column_names(), vec!["a", "b"]);
        assert_eq!(schema.get("a"), Some(&int_not_null()));
        assert_eq!(schema.remove("a"), Some(int_not_null()));
        assert_eq!(schema.column_names(), vec!["b"]);
    }

    #[test]
    fn test_primary_key_diff() {
        let old = vec!["id".to_string()];
        let new = vec!["id".to_string(), "tenant".to_string()];

        let d = PrimaryKeyDiff::between(&old, &new);
        assert_eq!(d.columns_to_add, BTreeSet::from(["tenant".to_string()]));
        assert!(d.columns_to_remove.is_empty());
        assert!(!d.is_noop());

        assert!(PrimaryKeyDiff::between(&new, &new).is_noop());
        // Order is irrelevant for a key set
        let reordered = vec!["tenant".to_string(), "id".to_string()];
        assert!(PrimaryKeyDiff::between(&new, &reordered).is_noop());
    }

    #[test]
    fn test_column_declaration() {
        assert_eq!(ColumnType::nullable("VARCHAR").declaration(), "VARCHAR");
        assert_eq!(
            ColumnType::not_null("BIGINT").to_string(),
            "BIGINT NOT NULL"
        );
    }

    #[test]
    fn test_table_name_suffix() {
        let t = TableName::new("public", "users");
        assert_eq!(t.with_suffix("_x").to_string(), "public.users_x");
        assert_eq!(t.temp_table().to_string(), "public.users_airbyte_tmp");
        assert_eq!(t.dedup_table().name, "users_airbyte_tmp_dedup");
        assert_eq!(t.legacy_raw_table().name, "_airbyte_raw_users");
    }
}
