//! ANSI DDL rendering of schemas and schema diffs.
//!
//! Dialect-specific backends may render their own statements; these are the
//! portable forms, used for execution by ANSI backends and for logging by the rest.

use sync_core::{TableName, TableSchema, TableSchemaDiff};

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Fully qualified, quoted table name.
pub fn qualified(table: &TableName) -> String {
    format!("{}.{}", quote_ident(&table.namespace), quote_ident(&table.name))
}

/// `CREATE TABLE` for a schema; `replace` drops any existing table first.
pub fn render_create_table(table: &TableName, schema: &TableSchema, replace: bool) -> Vec<String> {
    let columns = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.declaration()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut statements = Vec::new();
    if replace {
        statements.push(format!("DROP TABLE IF EXISTS {}", qualified(table)));
        statements.push(format!("CREATE TABLE {} ({columns})", qualified(table)));
    } else {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} ({columns})",
            qualified(table)
        ));
    }
    statements
}

/// `ALTER TABLE` statements reconciling a table with a diff.
///
/// Order: adds, then drops, then type and nullability changes. A changed
/// column yields a `TYPE` clause only when the type name differs and a
/// `NOT NULL` clause only when nullability differs.
pub fn render_schema_diff(table: &TableName, diff: &TableSchemaDiff) -> Vec<String> {
    let target = qualified(table);
    let mut statements = Vec::new();

    for (name, column_type) in &diff.columns_to_add {
        statements.push(format!(
            "ALTER TABLE {target} ADD COLUMN {} {}",
            quote_ident(name),
            column_type.declaration()
        ));
    }

    for name in &diff.columns_to_drop {
        statements.push(format!("ALTER TABLE {target} DROP COLUMN {}", quote_ident(name)));
    }

    for (name, change) in &diff.columns_to_change {
        let column = quote_ident(name);
        if change.old.type_name != change.new.type_name {
            statements.push(format!(
                "ALTER TABLE {target} ALTER COLUMN {column} TYPE {}",
                change.new.type_name
            ));
        }
        if change.old.nullable != change.new.nullable {
            let clause = if change.new.nullable {
                "DROP NOT NULL"
            } else {
                "SET NOT NULL"
            };
            statements.push(format!("ALTER TABLE {target} ALTER COLUMN {column} {clause}"));
        }
    }

    statements
}
