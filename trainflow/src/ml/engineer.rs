//! Column-level feature engineering applied before scaling.
//!
//! Order: binary mapping, identifier drop, one-hot encoding (first level
//! dropped), dummy renames, then conversion to a numeric matrix. One-hot levels
//! are learned on the training table and reused unchanged afterwards, so every
//! table engineered by one fitted instance has the same column layout.

use crate::config::{BinaryMapping, SchemaDeclaration, TransformationSettings};
use crate::data::{Cell, Table};
use crate::errors::{PipelineError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Dummy columns generated for one categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoding {
    /// Source column.
    pub column: String,
    /// Levels that get an indicator column; the first sorted level is omitted.
    pub levels: Vec<String>,
}

impl OneHotEncoding {
    fn dummy_name(&self, level: &str) -> String {
        format!("{}_{level}", self.column)
    }
}

/// Engineered features: column names and a dense numeric matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredFeatures {
    /// Column names in matrix order.
    pub columns: Vec<String>,
    /// One row per input row.
    pub values: Array2<f64>,
}

/// Fitted feature engineering step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEngineer {
    target_column: String,
    binary: BinaryMapping,
    drop_columns: Vec<String>,
    encodings: Vec<OneHotEncoding>,
    renames: BTreeMap<String, String>,
    feature_columns: Vec<String>,
}

fn level_of(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Missing => None,
        Cell::Number(n) => Some(n.to_string()),
        Cell::Text(s) => Some(s.clone()),
    }
}

impl FeatureEngineer {
    /// Learns one-hot levels from the training table.
    pub fn fit(
        train: &Table,
        schema: &SchemaDeclaration,
        options: &TransformationSettings,
    ) -> Result<Self> {
        let mut encodings = Vec::new();
        for column in &schema.categorical_columns {
            if *column == options.binary_mapping.column
                || *column == options.target_column
                || schema.is_dropped(column)
            {
                continue;
            }
            let cells = train.column(column).ok_or_else(|| {
                PipelineError::data(format!("categorical column '{column}' is missing"))
            })?;
            let levels: BTreeSet<String> = cells.filter_map(level_of).collect();
            encodings.push(OneHotEncoding {
                column: column.clone(),
                levels: levels.into_iter().skip(1).collect(),
            });
        }

        let mut engineer = Self {
            target_column: options.target_column.clone(),
            binary: options.binary_mapping.clone(),
            drop_columns: schema.drop_columns.clone(),
            encodings,
            renames: options.renames.clone(),
            feature_columns: Vec::new(),
        };
        engineer.feature_columns = engineer.transform(train)?.columns;

        tracing::debug!(
            features = engineer.feature_columns.len(),
            encoded = engineer.encodings.len(),
            "Fitted feature engineer"
        );
        Ok(engineer)
    }

    /// Column names produced for the training table.
    #[must_use]
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    #[must_use]
    pub fn encodings(&self) -> &[OneHotEncoding] {
        &self.encodings
    }

    /// Engineers a table. The target column is ignored when present.
    pub fn transform(&self, table: &Table) -> Result<EngineeredFeatures> {
        let mut table = table.clone();
        table.drop_column(&self.target_column);

        self.map_binary(&mut table)?;

        for column in &self.drop_columns {
            table.drop_column(column);
        }

        for encoding in &self.encodings {
            let cells = table.take_column(&encoding.column).ok_or_else(|| {
                PipelineError::data(format!("categorical column '{}' is missing", encoding.column))
            })?;
            for level in &encoding.levels {
                let indicator = cells
                    .iter()
                    .map(|cell| {
                        let hit = level_of(cell).as_deref() == Some(level.as_str());
                        Cell::Number(if hit { 1.0 } else { 0.0 })
                    })
                    .collect();
                table.push_column(encoding.dummy_name(level), indicator)?;
            }
        }

        for (from, to) in &self.renames {
            table.rename_column(from, to.clone());
        }

        to_matrix(&table)
    }

    fn map_binary(&self, table: &mut Table) -> Result<()> {
        let mapping = &self.binary;
        let found = table.map_column(&mapping.column, |cell| match cell {
            Cell::Text(v) if *v == mapping.positive => Ok(Cell::Number(1.0)),
            Cell::Text(v) if *v == mapping.negative => Ok(Cell::Number(0.0)),
            Cell::Number(n) if *n == 0.0 || *n == 1.0 => Ok(cell.clone()),
            other => Err(PipelineError::data(format!(
                "column '{}' holds {other:?}, expected '{}' or '{}'",
                mapping.column, mapping.positive, mapping.negative
            ))),
        })?;
        if found {
            Ok(())
        } else {
            Err(PipelineError::data(format!(
                "binary column '{}' is missing",
                mapping.column
            )))
        }
    }
}

fn to_matrix(table: &Table) -> Result<EngineeredFeatures> {
    let mut values = Array2::zeros((table.n_rows(), table.n_cols()));
    for (r, row) in table.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            values[[r, c]] = match cell {
                Cell::Number(n) => *n,
                Cell::Missing => {
                    return Err(PipelineError::data(format!(
                        "missing value in column '{}' at row {r}",
                        table.columns()[c]
                    )))
                }
                Cell::Text(s) => {
                    return Err(PipelineError::data(format!(
                        "non-numeric value '{s}' in column '{}' at row {r}",
                        table.columns()[c]
                    )))
                }
            };
        }
    }
    Ok(EngineeredFeatures {
        columns: table.columns().to_vec(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    fn schema() -> SchemaDeclaration {
        SchemaDeclaration::from_yaml_str(
            r"
columns: [_id, Gender, Age, Vehicle_Age, Vehicle_Damage, Response]
numerical_columns: [Age, Response]
categorical_columns: [Gender, Vehicle_Age, Vehicle_Damage]
drop_columns: _id
",
        )
        .unwrap()
    }

    fn table(rows: &[(&str, f64, &str, &str)]) -> Table {
        let mut table = Table::new(["_id", "Gender", "Age", "Vehicle_Age", "Vehicle_Damage", "Response"]);
        for (i, (gender, age, vehicle_age, damage)) in rows.iter().enumerate() {
            table
                .push_row(vec![
                    Cell::Number(f64::from(u32::try_from(i).unwrap())),
                    Cell::text(*gender),
                    Cell::Number(*age),
                    Cell::text(*vehicle_age),
                    Cell::text(*damage),
                    Cell::Number(0.0),
                ])
                .unwrap();
        }
        table
    }

    fn train() -> Table {
        table(&[
            ("Male", 44.0, "> 2 Year", "Yes"),
            ("Female", 23.0, "< 1 Year", "No"),
            ("Male", 35.0, "1-2 Year", "Yes"),
        ])
    }

    #[test]
    fn test_gender_mapping() {
        let engineer = FeatureEngineer::fit(&train(), &schema(), &TransformationSettings::default()).unwrap();
        let out = engineer.transform(&train()).unwrap();

        let gender = out.columns.iter().position(|c| c == "Gender").unwrap();
        assert_eq!(out.values.column(gender).to_owned(), array![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_layout_drops_first_level_and_renames() {
        let engineer = FeatureEngineer::fit(&train(), &schema(), &TransformationSettings::default()).unwrap();

        assert_eq!(
            engineer.feature_columns(),
            [
                "Gender",
                "Age",
                "Vehicle_Age_lt_1_Year",
                "Vehicle_Age_gt_2_Year",
                "Vehicle_Damage_Yes"
            ]
        );
        let out = engineer.transform(&train()).unwrap();
        assert_eq!(out.values.row(0).to_owned(), array![1.0, 44.0, 0.0, 1.0, 1.0]);
        assert_eq!(out.values.row(2).to_owned(), array![1.0, 35.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_test_table_reuses_train_levels() {
        let engineer = FeatureEngineer::fit(&train(), &schema(), &TransformationSettings::default()).unwrap();
        // Only one level present, plus an unseen one.
        let test = table(&[("Female", 50.0, "> 2 Year", "No"), ("Male", 51.0, "new", "No")]);

        let out = engineer.transform(&test).unwrap();
        assert_eq!(out.columns, engineer.feature_columns());
        assert_eq!(out.values.row(1).to_owned(), array![1.0, 51.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unmapped_gender_is_data_error() {
        let bad = table(&[("Other", 30.0, "> 2 Year", "No")]);
        let err = FeatureEngineer::fit(&bad, &schema(), &TransformationSettings::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn test_missing_numeric_is_data_error() {
        let mut bad = train();
        bad.map_column("Age", |_| Ok(Cell::Missing)).unwrap();
        let err = FeatureEngineer::fit(&bad, &schema(), &TransformationSettings::default()).unwrap_err();
        assert!(err.to_string().contains("Age"));
    }
}
