use crate::core::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

/// One result row: an ordered mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(field_values: Vec<FieldValue>) -> Self {
        RowData { field_values }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let field_values = pairs
            .into_iter()
            .map(|(name, value)| FieldValue {
                name: name.into(),
                value,
            })
            .collect();
        RowData { field_values }
    }

    /// Looks a field up by exact name, falling back to a case-insensitive match.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name == field)
            .or_else(|| {
                self.field_values
                    .iter()
                    .find(|f| f.name.eq_ignore_ascii_case(field))
            })
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_prefers_exact_name() {
        let row = RowData::from_pairs([
            ("Id", Value::Int(1)),
            ("id", Value::Int(2)),
        ]);
        assert_eq!(row.get_value("id"), Value::Int(2));
        assert_eq!(row.get_value("ID"), Value::Int(1));
        assert_eq!(row.get_value("missing"), Value::Null);
    }
}
