//! The fitted preprocessor and the deployable model bundle.

use super::engineer::FeatureEngineer;
use super::forest::{Classifier, RandomForest};
use super::scaler::ColumnTransformer;
use crate::config::{SchemaDeclaration, TransformationSettings};
use crate::data::Table;
use crate::errors::Result;
use crate::utils::{read_json, write_json};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Feature engineering followed by column scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    engineer: FeatureEngineer,
    transformer: ColumnTransformer,
}

impl Preprocessor {
    /// Fits on the training features and returns them transformed.
    pub fn fit_transform(
        train: &Table,
        schema: &SchemaDeclaration,
        options: &TransformationSettings,
    ) -> Result<(Self, Array2<f64>)> {
        let engineer = FeatureEngineer::fit(train, schema, options)?;
        let engineered = engineer.transform(train)?;
        let transformer = ColumnTransformer::fit(
            &engineered.columns,
            engineered.values.view(),
            &schema.num_features,
            &schema.mm_columns,
        )?;
        let transformed = transformer.transform(&engineered.columns, engineered.values.view())?;
        Ok((
            Self {
                engineer,
                transformer,
            },
            transformed,
        ))
    }

    /// Applies the fitted steps to a raw table without refitting.
    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        let engineered = self.engineer.transform(table)?;
        self.transformer
            .transform(&engineered.columns, engineered.values.view())
    }

    /// Names of the transformed columns, in matrix order.
    #[must_use]
    pub fn output_columns(&self) -> Vec<String> {
        self.transformer.output_columns()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

/// The fitted preprocessor and classifier persisted as one unit.
///
/// Its only capability is [`ModelBundle::predict`] on a raw table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    preprocessor: Preprocessor,
    model: RandomForest,
}

impl ModelBundle {
    #[must_use]
    pub fn new(preprocessor: Preprocessor, model: RandomForest) -> Self {
        Self {
            preprocessor,
            model,
        }
    }

    /// Predicts one label per row of a raw, not yet engineered, table.
    pub fn predict(&self, raw: &Table) -> Result<Array1<f64>> {
        let features = self.preprocessor.transform(raw)?;
        tracing::debug!(rows = features.nrows(), "Predicting");
        self.model.predict(features.view())
    }

    #[must_use]
    pub fn model(&self) -> &RandomForest {
        &self.model
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cell;
    use crate::ml::{accuracy, ForestParams};
    use ndarray::Axis;

    fn schema() -> SchemaDeclaration {
        SchemaDeclaration::from_yaml_str(
            r"
columns: [Gender, Age, Vehicle_Damage, Response]
numerical_columns: [Age, Response]
categorical_columns: [Gender, Vehicle_Damage]
drop_columns: []
num_features: [Age]
",
        )
        .unwrap()
    }

    fn raw(n: u32) -> Table {
        let mut table = Table::new(["Gender", "Age", "Vehicle_Damage", "Response"]);
        for i in 0..n {
            let damaged = i % 2 == 0;
            table
                .push_row(vec![
                    Cell::text(if damaged { "Male" } else { "Female" }),
                    Cell::Number(f64::from(20 + i)),
                    Cell::text(if damaged { "Yes" } else { "No" }),
                    Cell::Number(if damaged { 1.0 } else { 0.0 }),
                ])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_preprocessor_fit_is_deterministic() {
        let options = TransformationSettings::default();
        let (first, x1) = Preprocessor::fit_transform(&raw(12), &schema(), &options).unwrap();
        let (second, x2) = Preprocessor::fit_transform(&raw(12), &schema(), &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(x1, x2);
        assert_eq!(first.output_columns(), ["Age", "Gender", "Vehicle_Damage_Yes"]);
        // Standard-scaled column has zero mean.
        assert!(x1.column(0).mean().unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_bundle_predicts_after_reload() {
        let table = raw(40);
        let options = TransformationSettings::default();
        let (preprocessor, x) = Preprocessor::fit_transform(&table, &schema(), &options).unwrap();
        let y: Array1<f64> = table
            .column("Response")
            .unwrap()
            .map(|c| c.as_f64().unwrap())
            .collect();

        let params = ForestParams {
            n_estimators: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(params, x.view(), y.view()).unwrap();
        let bundle = ModelBundle::new(preprocessor, forest);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trained_model/model.json");
        bundle.save(&path).unwrap();
        let restored = ModelBundle::load(&path).unwrap();
        assert_eq!(restored, bundle);

        let predicted = restored.predict(&table).unwrap();
        assert_eq!(predicted.len_of(Axis(0)), 40);
        assert_eq!(predicted, bundle.predict(&table).unwrap());
        assert!(accuracy(y.view(), predicted.view()) >= 0.9);
    }
}
