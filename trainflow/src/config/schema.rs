//! Schema declaration loaded from YAML.
//!
//! ```yaml
//! columns:
//!   - Gender: category
//!   - Age: int
//! numerical_columns: [Age]
//! categorical_columns: [Gender]
//! drop_columns: _id
//! num_features: [Age]
//! mm_columns: []
//! ```

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One declared column: a bare name or a `name: type` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawColumn", into = "RawColumn")]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Declared type, informational only.
    pub dtype: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawColumn {
    Name(String),
    Typed(BTreeMap<String, String>),
}

impl TryFrom<RawColumn> for ColumnSpec {
    type Error = String;

    fn try_from(raw: RawColumn) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawColumn::Name(name) => Ok(Self { name, dtype: None }),
            RawColumn::Typed(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "column entry must have exactly one `name: type` pair, got {}",
                        map.len()
                    ));
                }
                let (name, dtype) = map.into_iter().next().ok_or("empty column entry")?;
                Ok(Self {
                    name,
                    dtype: Some(dtype),
                })
            }
        }
    }
}

impl From<ColumnSpec> for RawColumn {
    fn from(spec: ColumnSpec) -> Self {
        match spec.dtype {
            Some(dtype) => Self::Typed(BTreeMap::from([(spec.name, dtype)])),
            None => Self::Name(spec.name),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

/// Expected column structure of the ingested tables.
///
/// Loaded once per run and shared read-only by validation and transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDeclaration {
    /// Ordered column list; its length is the expected column count.
    pub columns: Vec<ColumnSpec>,
    /// Columns that must be present and hold numbers.
    #[serde(default)]
    pub numerical_columns: Vec<String>,
    /// Columns that must be present and hold category labels.
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    /// Identifier columns removed during feature engineering.
    #[serde(default, deserialize_with = "one_or_many")]
    pub drop_columns: Vec<String>,
    /// Columns standard-scaled by the preprocessor.
    #[serde(default)]
    pub num_features: Vec<String>,
    /// Columns min-max scaled by the preprocessor.
    #[serde(default)]
    pub mm_columns: Vec<String>,
}

impl SchemaDeclaration {
    /// Reads and parses a schema file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let schema = Self::from_yaml_str(&text)?;
        tracing::debug!(
            path = %path.display(),
            columns = schema.expected_column_count(),
            "Loaded schema declaration"
        );
        Ok(schema)
    }

    /// Parses a schema from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    #[must_use]
    pub fn expected_column_count(&self) -> usize {
        self.columns.len()
    }

    /// Declared column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Numeric then categorical column names.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.numerical_columns
            .iter()
            .chain(&self.categorical_columns)
            .map(String::as_str)
    }

    /// Required columns absent from `present`, in declaration order.
    #[must_use]
    pub fn missing_columns<S: AsRef<str>>(&self, present: &[S]) -> Vec<&str> {
        self.required_columns()
            .filter(|name| !present.iter().any(|p| p.as_ref() == *name))
            .collect()
    }

    /// Whether `name` is one of the identifier columns to drop.
    #[must_use]
    pub fn is_dropped(&self, name: &str) -> bool {
        self.drop_columns.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = r#"
columns:
  - _id: object
  - Gender: category
  - Age: int
  - Vehicle_Age: category
  - Response: int
numerical_columns:
  - Age
  - Response
categorical_columns:
  - Gender
  - Vehicle_Age
drop_columns: _id
num_features:
  - Age
mm_columns: []
"#;

    #[test]
    fn test_parse_schema() {
        let schema = SchemaDeclaration::from_yaml_str(SCHEMA).unwrap();
        assert_eq!(schema.expected_column_count(), 5);
        assert_eq!(
            schema.columns[1],
            ColumnSpec {
                name: "Gender".to_string(),
                dtype: Some("category".to_string())
            }
        );
        assert_eq!(schema.drop_columns, vec!["_id".to_string()]);
        assert_eq!(
            schema.required_columns().collect::<Vec<_>>(),
            vec!["Age", "Response", "Gender", "Vehicle_Age"]
        );
        assert!(schema.is_dropped("_id"));
    }

    #[test]
    fn test_drop_columns_as_list_and_bare_names() {
        let schema = SchemaDeclaration::from_yaml_str(
            "columns: [a, b]\ndrop_columns: [a, b]\n",
        )
        .unwrap();
        assert_eq!(schema.drop_columns.len(), 2);
        assert_eq!(schema.columns[0].dtype, None);
        assert!(schema.num_features.is_empty());
    }

    #[test]
    fn test_missing_columns() {
        let schema = SchemaDeclaration::from_yaml_str(SCHEMA).unwrap();
        let present = ["_id", "Gender", "Age", "Response"];
        assert_eq!(schema.missing_columns(&present), vec!["Vehicle_Age"]);
    }

    #[test]
    fn test_multi_entry_column_rejected() {
        let err = SchemaDeclaration::from_yaml_str("columns:\n  - {a: int, b: int}\n").unwrap_err();
        assert!(matches!(err, PipelineError::Serialization(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = SchemaDeclaration::load(Path::new("/no/such/schema.yaml")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
