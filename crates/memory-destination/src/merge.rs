//! Deduplicating merge used by `upsert_table`.

use crate::Row;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use sync_core::record::COLUMN_EXTRACTED_AT;

/// Physical columns driving a merge.
pub(crate) struct MergeKeys<'a> {
    pub primary_key: Vec<&'a str>,
    pub cursor: Option<&'a str>,
    pub cdc_deleted_at: &'a str,
}

impl MergeKeys<'_> {
    fn key_of(&self, row: &Row) -> String {
        let values: Vec<&Value> = self
            .primary_key
            .iter()
            .map(|c| row.get(*c).unwrap_or(&Value::Null))
            .collect();
        // Serializing `&Value`s cannot fail.
        serde_json::to_string(&values).unwrap_or_default()
    }

    /// Ordering of two versions of the same key: cursor first, then extraction time.
    fn compare_versions(&self, a: &Row, b: &Row) -> Ordering {
        let cursor = match self.cursor {
            Some(c) => compare_values(field(a, c), field(b, c)),
            None => Ordering::Equal,
        };
        cursor.then_with(|| compare_values(field(a, COLUMN_EXTRACTED_AT), field(b, COLUMN_EXTRACTED_AT)))
    }

    fn is_deleted(&self, row: &Row) -> bool {
        !field(row, self.cdc_deleted_at).is_null()
    }
}

fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

/// Total order over JSON values: null < bool < number < string < array < object.
///
/// Strings compare lexically, which orders RFC 3339 timestamps written in a
/// single fixed format chronologically.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(0.0)
                .total_cmp(&y.as_f64().unwrap_or(0.0)),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Keep the latest version of each key; later rows win ties.
pub(crate) fn dedupe(rows: Vec<Row>, keys: &MergeKeys<'_>) -> Vec<Row> {
    let mut order: Vec<String> = Vec::new();
    let mut winners: HashMap<String, Row> = HashMap::new();
    for row in rows {
        let key = keys.key_of(&row);
        match winners.get(&key) {
            Some(current) if keys.compare_versions(&row, current) == Ordering::Less => {}
            Some(_) => {
                winners.insert(key, row);
            }
            None => {
                order.push(key.clone());
                winners.insert(key, row);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|k| winners.remove(&k))
        .collect()
}

/// Merge deduplicated `incoming` rows into `target`.
///
/// An incoming row replaces an existing one when it is not older. A winning
/// row marked as CDC-deleted removes the key instead of being written.
pub(crate) fn merge(target: &mut Vec<Row>, incoming: Vec<Row>, keys: &MergeKeys<'_>) -> MergeStats {
    let mut stats = MergeStats::default();
    let mut index: HashMap<String, usize> = target
        .iter()
        .enumerate()
        .map(|(i, row)| (keys.key_of(row), i))
        .collect();
    let mut deleted = vec![false; target.len()];

    for row in dedupe(incoming, keys) {
        let key = keys.key_of(&row);
        match index.get(&key).copied() {
            Some(i) => {
                if keys.compare_versions(&row, &target[i]) == Ordering::Less {
                    stats.skipped += 1;
                } else if keys.is_deleted(&row) {
                    deleted[i] = true;
                    stats.deleted += 1;
                } else {
                    target[i] = row;
                    stats.updated += 1;
                }
            }
            None if keys.is_deleted(&row) => stats.skipped += 1,
            None => {
                index.insert(key, target.len());
                target.push(row);
                deleted.push(false);
                stats.inserted += 1;
            }
        }
    }

    let mut flags = deleted.into_iter();
    target.retain(|_| !flags.next().unwrap_or(false));
    stats
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
}
