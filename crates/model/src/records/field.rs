use serde::{Deserialize, Serialize};

/// Field metadata returned by query validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl FieldMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        FieldMetadata {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Ordered field names of one query binding; defines the grid's columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
    names: Vec<String>,
}

impl FieldSchema {
    pub fn from_metadata(fields: &[FieldMetadata]) -> Self {
        FieldSchema {
            names: fields.iter().map(|f| f.name.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, column: usize) -> Option<&str> {
        self.names.get(column).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
