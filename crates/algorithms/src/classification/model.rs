//! Land-cover classifier: training, prediction, importance and persistence

use super::dataset::TrainingSet;
use super::forest::{ForestParams, RandomForest};
use crate::maybe_rayon::*;
use landshift_core::landcover::{is_class_label, LabelGrid, BACKGROUND};
use landshift_core::raster::{Raster, RasterStack};
use landshift_core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::info;

const MODEL_FORMAT: &str = "landshift-random-forest";
const MODEL_VERSION: u32 = 1;

/// Fitted ensemble together with the feature layout it was trained on.
///
/// Holds no reference to the training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    forest: RandomForest,
    feature_names: Vec<String>,
    classes: Vec<u8>,
    params: ForestParams,
}

#[derive(Serialize, Deserialize)]
struct ModelEnvelope {
    format: String,
    version: u32,
    model: TrainedModel,
}

impl TrainedModel {
    /// Fit a forest on `set`.
    ///
    /// Fails with `EmptyLabelSet` for an empty set, `InsufficientClasses`
    /// when fewer than two classes are present, and `InvalidParameter` for
    /// background or unknown labels and non-finite feature values.
    pub fn train(set: &TrainingSet, params: &ForestParams) -> Result<Self> {
        if set.is_empty() {
            return Err(Error::EmptyLabelSet { context: "training" });
        }
        if let Some(&bad) = set.labels.iter().find(|&&l| !is_class_label(l)) {
            return Err(Error::InvalidParameter {
                name: "labels",
                value: bad.to_string(),
                reason: "training labels must be land-cover classes, not background".into(),
            });
        }
        if set.features.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "features",
                value: "non-finite".into(),
                reason: "training rows must be finite; drop them when extracting samples".into(),
            });
        }
        let classes = set.classes();
        if classes.len() < 2 {
            return Err(Error::InsufficientClasses {
                found: classes.len(),
            });
        }

        let forest = RandomForest::fit(&set.features, &set.labels, params)?;
        info!(
            samples = set.len(),
            features = set.num_features(),
            classes = ?classes,
            trees = params.n_trees,
            mode = ?params.mode,
            "trained land-cover classifier"
        );

        Ok(Self {
            forest,
            feature_names: set.feature_names.clone(),
            classes,
            params: *params,
        })
    }

    /// Feature layer names, in training order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Classes seen during training, ascending
    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Class per feature row; rows with any non-finite value get background (0)
    pub fn predict_rows(&self, rows: &Array2<f64>) -> Result<Vec<u8>> {
        if rows.ncols() != self.feature_names.len() {
            return Err(Error::FeatureMismatch {
                expected: self.feature_names.clone(),
                found: (1..=rows.ncols()).map(|i| format!("column_{i}")).collect(),
            });
        }
        Ok((0..rows.nrows())
            .into_par_iter()
            .map(|i| {
                let row = rows.row(i);
                if row.iter().all(|v| v.is_finite()) {
                    self.forest.predict_row(row)
                } else {
                    BACKGROUND
                }
            })
            .collect())
    }

    /// Classify every pixel of a feature stack.
    ///
    /// The stack must have the training layer count and, when its layers are
    /// named, the training layer names in the same order.
    pub fn predict(&self, features: &RasterStack) -> Result<LabelGrid> {
        let names = features.layer_names();
        let count_ok = features.num_bands() == self.feature_names.len();
        if !count_ok || (features.has_layer_names() && names != self.feature_names) {
            return Err(Error::FeatureMismatch {
                expected: self.feature_names.clone(),
                found: names,
            });
        }

        let labels = self.predict_rows(&features.to_rows())?;
        let data = Array2::from_shape_vec(features.shape(), labels)
            .map_err(|e| Error::Other(e.to_string()))?;
        let mut grid = Raster::from_array(data);
        grid.set_transform(*features.transform());
        grid.set_crs(features.crs().cloned());
        grid.set_nodata(Some(BACKGROUND));
        Ok(grid)
    }

    /// Fraction of rows whose prediction equals the label
    pub fn score(&self, set: &TrainingSet) -> Result<f64> {
        if set.is_empty() {
            return Err(Error::EmptyLabelSet { context: "scoring" });
        }
        let predicted = self.predict_rows(&set.features)?;
        let correct = predicted
            .iter()
            .zip(&set.labels)
            .filter(|(p, l)| p == l)
            .count();
        Ok(correct as f64 / set.len() as f64)
    }

    /// Mean decrease in impurity per feature
    pub fn feature_importance(&self) -> FeatureImportance {
        FeatureImportance {
            scores: self
                .feature_names
                .iter()
                .cloned()
                .zip(self.forest.feature_importance())
                .collect(),
        }
    }

    // ----- Persistence -----

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.envelope()).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: ModelEnvelope =
            serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::open(envelope)
    }

    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &self.envelope())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let envelope: ModelEnvelope =
            serde_json::from_reader(reader).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::open(envelope)
    }

    fn envelope(&self) -> ModelEnvelope {
        ModelEnvelope {
            format: MODEL_FORMAT.to_string(),
            version: MODEL_VERSION,
            model: self.clone(),
        }
    }

    fn open(envelope: ModelEnvelope) -> Result<Self> {
        if envelope.format != MODEL_FORMAT || envelope.version != MODEL_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported model format {} v{}",
                envelope.format, envelope.version
            )));
        }
        Ok(envelope.model)
    }
}

/// Per-feature importance scores, non-negative and summing to 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    scores: Vec<(String, f64)>,
}

impl FeatureImportance {
    /// Scores in feature order
    pub fn scores(&self) -> &[(String, f64)] {
        &self.scores
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.scores.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    /// Scores sorted from most to least important
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut ranked = self.scores.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn total(&self) -> f64 {
        self.scores.iter().map(|(_, s)| s).sum()
    }
}

/// Classifier with an untrained and a trained state.
///
/// Training never mutates: [`LandCoverClassifier::train`] returns a new,
/// trained classifier.
#[derive(Debug, Clone, Default)]
pub struct LandCoverClassifier {
    params: ForestParams,
    model: Option<TrainedModel>,
}

impl LandCoverClassifier {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            model: None,
        }
    }

    /// Wrap an already trained (e.g. loaded) model
    pub fn from_model(model: TrainedModel) -> Self {
        Self {
            params: model.params,
            model: Some(model),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Result<&TrainedModel> {
        self.model.as_ref().ok_or(Error::NotTrained)
    }

    pub fn into_model(self) -> Result<TrainedModel> {
        self.model.ok_or(Error::NotTrained)
    }

    /// Fit on `set` and return the trained classifier
    pub fn train(&self, set: &TrainingSet) -> Result<Self> {
        Ok(Self {
            params: self.params,
            model: Some(TrainedModel::train(set, &self.params)?),
        })
    }

    pub fn predict(&self, features: &RasterStack) -> Result<LabelGrid> {
        self.model()?.predict(features)
    }

    pub fn predict_rows(&self, rows: &Array2<f64>) -> Result<Vec<u8>> {
        self.model()?.predict_rows(rows)
    }

    pub fn score(&self, set: &TrainingSet) -> Result<f64> {
        self.model()?.score(set)
    }

    pub fn feature_importance(&self) -> Result<FeatureImportance> {
        Ok(self.model()?.feature_importance())
    }
}
