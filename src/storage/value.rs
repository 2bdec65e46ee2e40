use rusqlite::types::ToSqlOutput;
use rusqlite::{Row, ToSql};

/// Tagged value bound into or read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Column-type tag directing read-back, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Text,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Bool(value) => ToSqlOutput::from(*value),
            Value::Int(value) => ToSqlOutput::from(*value),
            Value::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

/// Reads column `index` of `row` as `kind`.
pub(crate) fn column_value(row: &Row<'_>, index: usize, kind: ValueKind) -> rusqlite::Result<Value> {
    match kind {
        ValueKind::Bool => row.get(index).map(Value::Bool),
        ValueKind::Int => row.get(index).map(Value::Int),
        ValueKind::Text => row.get(index).map(Value::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Value::from(true).kind(), ValueKind::Bool);
        assert_eq!(Value::from(7i64).kind(), ValueKind::Int);
        assert_eq!(Value::from("seven").kind(), ValueKind::Text);
    }

    #[test]
    fn accessors_reject_other_variants() {
        let text = Value::from("hello");
        assert_eq!(text.as_text(), Some("hello"));
        assert_eq!(text.as_int(), None);
        assert_eq!(text.as_bool(), None);
    }
}
