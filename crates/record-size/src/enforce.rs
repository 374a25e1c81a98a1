use serde_json::{Map, Value};
use sync_core::record::serialized_len;
use sync_core::{Change, ChangeKind, ChangeReason, DestinationStream, Record, SyncError};

/// Result of enforcing a size budget on one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Enforced {
    /// Transformed record, local changes first
    pub record: Record,

    /// Serialized size of the record's data before the transform
    pub original_bytes: usize,

    /// Bytes removed; `original_bytes - removed_bytes` is the serialized size
    /// of the output. Negative only when the record fallback replaces values
    /// that serialize shorter than `null`.
    pub removed_bytes: i64,
}

/// A nullable leaf and its serialized length.
struct Candidate {
    path: Vec<String>,
    len: usize,
}

impl Candidate {
    fn display(&self) -> String {
        self.path.join(".")
    }
}

/// Bring `record` under `budget` bytes.
///
/// `is_large` receives a leaf's serialized length and decides whether the leaf
/// may be nulled in the field pass. Records already within budget are returned
/// unchanged.
///
/// Fails with `SyncError::MissingPrimaryKey` when the record is over budget and
/// the stream deduplicates without a declared primary key.
pub fn enforce<P>(
    record: Record,
    budget: usize,
    is_large: P,
    stream: &DestinationStream,
) -> Result<Enforced, SyncError>
where
    P: Fn(usize) -> bool,
{
    let original_bytes = record.serialized_size();
    if original_bytes <= budget {
        return Ok(Enforced {
            record,
            original_bytes,
            removed_bytes: 0,
        });
    }

    let primary_key = stream.primary_key();
    if stream.is_dedupe() && primary_key.is_empty() {
        return Err(SyncError::MissingPrimaryKey {
            stream: stream.id.to_string(),
        });
    }

    let Record {
        raw_id,
        extracted_at,
        mut data,
        meta,
    } = record;
    let upstream = meta.changes;

    let mut candidates = Vec::new();
    for (key, value) in &data {
        if primary_key.iter().any(|pk| pk == key) {
            continue;
        }
        collect_candidates(value, vec![key.clone()], &is_large, &mut candidates);
    }
    candidates.sort_by(|a, b| b.len.cmp(&a.len).then_with(|| a.path.cmp(&b.path)));

    let mut current = original_bytes as i64;
    let mut removed = 0i64;
    let mut local = Vec::new();

    for candidate in candidates {
        if current <= budget as i64 {
            break;
        }
        if let Some(slot) = lookup_mut(&mut data, &candidate.path) {
            *slot = Value::Null;
            let saved = candidate.len as i64 - NULL_LEN;
            current -= saved;
            removed += saved;
            tracing::warn!(
                "Nulling oversized field {} ({} bytes) in stream {}",
                candidate.display(),
                candidate.len,
                stream.id
            );
            local.push(Change::new(
                candidate.display(),
                ChangeKind::Nulled,
                ChangeReason::DestinationFieldSizeLimitation,
            ));
        }
    }

    if current > budget as i64 {
        tracing::warn!(
            "Record in stream {} still {} bytes after nulling large fields (budget {}); nulling whole record",
            stream.id,
            current,
            budget
        );
        for (key, value) in data.iter_mut() {
            if primary_key.iter().any(|pk| pk == key) || value.is_null() {
                continue;
            }
            let saved = serialized_len(value) as i64 - NULL_LEN;
            *value = Value::Null;
            current -= saved;
            removed += saved;
        }
        local = vec![Change::new(
            "all",
            ChangeKind::Nulled,
            ChangeReason::DestinationRecordSizeLimitation,
        )];
    }

    tracing::debug!(
        "Enforced record size in stream {}: {} bytes, {} removed, {} changes",
        stream.id,
        original_bytes,
        removed,
        local.len()
    );

    let mut record = Record {
        raw_id,
        extracted_at,
        data,
        meta: Default::default(),
    };
    record.meta.changes = local;
    record.meta.changes.extend(upstream);

    Ok(Enforced {
        record,
        original_bytes,
        removed_bytes: removed,
    })
}

const NULL_LEN: i64 = 4;

fn collect_candidates<P>(value: &Value, path: Vec<String>, is_large: &P, out: &mut Vec<Candidate>)
where
    P: Fn(usize) -> bool,
{
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let mut child_path = path.clone();
                child_path.push(key.clone());
                collect_candidates(child, child_path, is_large, out);
            }
        }
        Value::Null => {}
        _ => {
            let len = serialized_len(value);
            // Values no longer than `null` cannot shrink the record.
            if len as i64 > NULL_LEN && is_large(len) {
                out.push(Candidate { path, len });
            }
        }
    }
}

fn lookup_mut<'a>(data: &'a mut Map<String, Value>, path: &[String]) -> Option<&'a mut Value> {
    let (first, rest) = path.split_first()?;
    let mut current = data.get_mut(first)?;
    for key in rest {
        current = current.as_object_mut()?.get_mut(key)?;
    }
    Some(current)
}
