//! Random forests for the amlb framework adapters: train, predict, score.
//!
//! Provides CART classification and regression forests with Gini/Entropy or
//! variance splits, parallel training via rayon, k-fold splitting for
//! hyper-parameter search, and higher-is-better scoring metrics.

mod config;
mod error;
mod eval;
mod forest;
mod metric;
mod node;
mod split;
mod tree;

pub use config::{MaxFeatures, RandomForestConfig};
pub use error::RfError;
pub use eval::{CrossValidation, Fold};
pub use forest::{RandomForestClassifier, RandomForestRegressor};
pub use metric::Metric;
pub use node::{FeatureIndex, Impurity, LeafOutput, Node, NodeIndex};
pub use split::SplitCriterion;
pub use tree::DecisionTree;
