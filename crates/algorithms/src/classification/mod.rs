//! Supervised land-cover classification
//!
//! - **Dataset**: labelled pixel extraction and seeded train/test split
//! - **Random forest**: bagged Gini CART trees with majority vote
//! - **Model**: prediction to label grids, impurity-based feature
//!   importance and JSON persistence

mod dataset;
mod forest;
mod model;
mod tree;

pub use dataset::{
    labelled_pixels, prepare_training_data, train_test_split, SplitParams, TrainTestSplit,
    TrainingSet,
};
pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use model::{FeatureImportance, LandCoverClassifier, TrainedModel};
pub use tree::DecisionTree;
