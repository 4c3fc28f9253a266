use crate::types::{Record, SourceResult, Table};

/// Copies every field of `source` into `target`. Fields with the same name are
/// overwritten (last writer wins); fields only in `target` are left alone.
pub fn merge(target: &mut Record, source: &Record) {
    for (name, value) in source {
        target.set(name.clone(), value.clone());
    }
}

/// Owning form of [`merge`].
pub fn merged(mut target: Record, source: &Record) -> Record {
    merge(&mut target, source);
    target
}

/// Coerces a data-source result into a table. A single record becomes a
/// one-row table; a table passes through untouched.
pub fn normalize(result: impl Into<SourceResult>) -> Table {
    match result.into() {
        SourceResult::Single(record) => vec![record],
        SourceResult::Many(table) => table,
    }
}
