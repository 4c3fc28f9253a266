use crate::common::Result;
use crate::runtime::row::merged;
use crate::types::{Field, Record, Table};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;


/// Which left rows survive a join when they have no match on the right.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    /// Unmatched left rows are dropped.
    Inner,
    /// Unmatched left rows are emitted unmodified.
    LeftOuter,
}

impl JoinType {
    /// Maps the `inner` flag emitted by generated code to a join type.
    pub fn from_inner(inner: bool) -> Self {
        match inner {
            true => JoinType::Inner,
            false => JoinType::LeftOuter,
        }
    }
}

/// Executes a hash equi-join. This builds a hash table over the right table
/// keyed on `right_key`, then iterates over the left table in order and looks
/// up each row's `left_key`. A matched pair is emitted as a copy of the left
/// row with the right row merged over it, so right values win on name
/// conflicts. An unmatched left row is dropped for an inner join and emitted
/// as-is for a left outer join.
///
/// Each key indexes a single right row: when several right rows share a key,
/// the last one in table order is the one every matching left row joins
/// against. There is no fan-out to multiple right matches.
///
/// Errors from either key extractor are returned as-is and abort the join.
pub fn hash<K, L, R>(
    join_type: JoinType,
    left_key: L,
    right_key: R,
    left: &[Record],
    right: &[Record],
) -> Result<Table>
where
    K: Hash + Eq,
    L: Fn(&Record) -> Result<K>,
    R: Fn(&Record) -> Result<K>,
{
    // Build the hash table from the right source. Later rows overwrite earlier ones.
    let mut index: HashMap<K, usize> = HashMap::with_capacity(right.len());
    for (i, row) in right.iter().enumerate() {
        index.insert(right_key(row)?, i);
    }

    let mut output = Table::with_capacity(left.len());
    for row in left {
        match index.get(&left_key(row)?) {
            Some(&matched) => output.push(merged(row.clone(), &right[matched])),
            None if join_type == JoinType::LeftOuter => output.push(row.clone()),
            None => {}
        }
    }

    log::trace!(
        "{:?} hash join: indexed {} right rows ({} keys), probed {} left rows, emitted {}",
        join_type,
        right.len(),
        index.len(),
        left.len(),
        output.len()
    );
    Ok(output)
}

/// A key extractor reading a single field. A missing field reads as NULL.
/// Keys compare by type as well as value, so `1` and `1.0` do not match.
pub fn field_key(name: impl Into<String>) -> impl Fn(&Record) -> Result<Field> {
    let name = name.into();
    move |row: &Record| Ok(row.get(&name).cloned().unwrap_or(Field::Null))
}

/// Returns the distinct keys of a table in first-seen order. Generated code
/// uses this to batch a keyed lookup against a second source before joining
/// its result back onto the table.
pub fn distinct_keys<K, F>(table: &[Record], key: F) -> Result<Vec<K>>
where
    K: Hash + Eq + Clone,
    F: Fn(&Record) -> Result<K>,
{
    let mut seen = HashSet::with_capacity(table.len());
    let mut keys = Vec::new();
    for row in table {
        let k = key(row)?;
        if seen.insert(k.clone()) {
            keys.push(k);
        }
    }
    Ok(keys)
}
