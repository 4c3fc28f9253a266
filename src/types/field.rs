use crate::common::{Error, Result};
use crate::errdata;
use crate::types::record::{Record, SourceResult, Table};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A dynamically-typed record value, as produced by a data source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Field>),
    Record(Record),
}

impl PartialEq for Field {
    fn eq(&self, other: &Field) -> bool {
        match (self, other) {
            (Field::Null, Field::Null) => true,
            (Field::Boolean(b), Field::Boolean(b2)) => b == b2,
            (Field::Integer(i), Field::Integer(i2)) => i == i2,
            // match on NaN as well as equality
            (Field::Float(f), Field::Float(f2)) => (f == f2) || (f.is_nan() && f2.is_nan()),
            (Field::String(s), Field::String(s2)) => s == s2,
            (Field::List(l), Field::List(l2)) => l == l2,
            (Field::Record(r), Field::Record(r2)) => r == r2,
            _ => false,
        }
    }
}

impl Eq for Field {}

impl std::hash::Hash for Field {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Field::Null => {}
            Field::Boolean(b) => b.hash(state),
            Field::Integer(i) => i.hash(state),
            Field::Float(f) => {
                if f.is_nan() {
                    0.hash(state);
                } else if *f == 0.0 {
                    // 0.0 and -0.0 are equal, so they must hash alike
                    0.0f64.to_bits().hash(state);
                } else {
                    f.to_bits().hash(state);
                }
            }
            Field::String(s) => s.hash(state),
            Field::List(l) => l.hash(state),
            Field::Record(r) => r.hash(state),
        }
    }
}

// for use in sorting
impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Field::Null, Field::Null) => Ordering::Equal,
            (Field::Boolean(b), Field::Boolean(b2)) => b.cmp(b2),
            (Field::Integer(i), Field::Integer(i2)) => i.cmp(i2),
            (Field::Float(f), Field::Float(f2)) => match (f.is_nan(), f2.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => f.partial_cmp(f2).unwrap_or(Ordering::Equal),
            },
            (Field::String(s), Field::String(s2)) => s.cmp(s2),
            (Field::List(l), Field::List(l2)) => l.cmp(l2),
            (Field::Record(r), Field::Record(r2)) => r.cmp(r2),
            (lhs, rhs) => lhs.rank().cmp(&rhs.rank()),
        }
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(true) => f.write_str("TRUE"),
            Self::Boolean(false) => f.write_str("FALSE"),
            Self::Integer(integer) => write!(f, "{integer}"),
            Self::Float(float) => write!(f, "{float:?}"),
            Self::String(string) => write!(f, "'{}'", string.escape_debug()),
            Self::List(list) => write!(f, "[{}]", list.iter().join(", ")),
            Self::Record(record) => write!(f, "{record}"),
        }
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Field::Float(v)
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Field::Integer(v)
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Integer(v.into())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Field::String(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Field::String(v.to_owned())
    }
}

impl From<bool> for Field {
    fn from(v: bool) -> Self {
        Field::Boolean(v)
    }
}

impl From<Record> for Field {
    fn from(v: Record) -> Self {
        Field::Record(v)
    }
}

impl<T: Into<Field>> From<Option<T>> for Field {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Field::Null)
    }
}

impl<T: Into<Field>> From<Vec<T>> for Field {
    fn from(v: Vec<T>) -> Self {
        Field::List(v.into_iter().map(Into::into).collect())
    }
}

impl Field {
    /// Sort rank of each variant, used when comparing values of different types.
    fn rank(&self) -> u8 {
        match self {
            Field::Null => 0,
            Field::Boolean(_) => 1,
            Field::Integer(_) => 2,
            Field::Float(_) => 3,
            Field::String(_) => 4,
            Field::List(_) => 5,
            Field::Record(_) => 6,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Returns true if the value is undefined (NULL or NaN).
    pub fn is_undefined(&self) -> bool {
        *self == Self::Null || matches!(self, Self::Float(f) if f.is_nan())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Field::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// A record field holding a data-source result, e.g. one branch's output
/// carried through a join barrier.
impl TryFrom<Field> for SourceResult {
    type Error = Error;

    fn try_from(field: Field) -> Result<Self> {
        match field {
            Field::Record(record) => Ok(SourceResult::Single(record)),
            Field::List(items) => items
                .into_iter()
                .map(|item| match item {
                    Field::Record(record) => Ok(record),
                    other => Err(Error::InvalidData(format!("expected a record, found {other}"))),
                })
                .collect::<Result<Table>>()
                .map(SourceResult::Many),
            other => errdata!("expected a record or a list of records, found {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Field;
    use crate::types::record::{Record, SourceResult};
    use std::collections::HashSet;

    #[test]
    pub fn test_init() {
        let v = Field::default();
        assert_eq!(v, Field::Null);
        assert!(v.is_null());
    }

    #[test]
    pub fn test_no_cross_type_equality() {
        assert_ne!(Field::Integer(1), Field::Float(1.0));
        assert_ne!(Field::String("1".into()), Field::Integer(1));
        assert_ne!(Field::Null, Field::Boolean(false));
    }

    #[test]
    pub fn test_nan_is_a_usable_key() {
        let mut keys = HashSet::new();
        keys.insert(Field::Float(f64::NAN));
        assert!(keys.contains(&Field::Float(f64::NAN)));
        assert!(Field::Float(f64::NAN).is_undefined());

        keys.insert(Field::Float(0.0));
        assert!(keys.contains(&Field::Float(-0.0)));
    }

    #[test]
    pub fn test_comparison() {
        assert!(Field::Integer(10) > Field::Integer(7));
        assert!(Field::Float(10.0) > Field::Float(7.0));
        assert!(Field::Null < Field::Boolean(false));
        assert!(Field::Float(f64::NAN) > Field::Float(f64::INFINITY));
        assert!(Field::from("b") > Field::from("a"));
    }

    #[test]
    pub fn test_display() {
        assert_eq!(Field::Null.to_string(), "NULL");
        assert_eq!(Field::from(true).to_string(), "TRUE");
        assert_eq!(Field::from(3).to_string(), "3");
        assert_eq!(Field::from(2.5).to_string(), "2.5");
        assert_eq!(Field::from("x").to_string(), "'x'");
        assert_eq!(Field::from(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(Field::from(None::<i64>), Field::Null);
        assert_eq!(
            Field::from(vec![Record::new().with("id", "a")]).to_string(),
            "[{id: 'a'}]"
        );
    }

    #[test]
    pub fn test_source_result_from_field() {
        let row = Record::new().with("id", "a");
        assert_eq!(
            SourceResult::try_from(Field::from(row.clone())),
            Ok(SourceResult::Single(row.clone()))
        );
        assert_eq!(
            SourceResult::try_from(Field::from(vec![row.clone(), row.clone()])),
            Ok(SourceResult::Many(vec![row.clone(), row]))
        );
        assert_eq!(
            SourceResult::try_from(Field::List(vec![])),
            Ok(SourceResult::Many(vec![]))
        );
        assert!(SourceResult::try_from(Field::from(1)).is_err());
        assert!(SourceResult::try_from(Field::from(vec![1])).is_err());
    }
}
