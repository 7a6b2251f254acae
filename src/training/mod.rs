//! Model training module
//!
//! - Decision trees and the random forest used for feature ranking
//! - Gradient boosted classifier
//! - Stratified cross-validation and randomized hyperparameter search
//! - Binary classification metrics
//! - [`ModelTrainer`], the training stage of the pipeline

pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod metrics;
pub mod random_forest;
pub mod search;
mod trainer;

pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use metrics::{ClassificationReport, ConfusionCounts};
pub use random_forest::{MaxFeatures, RandomForest};
pub use search::{ParamDistribution, ParameterValue, RandomizedSearch, Scoring, SearchOutcome, TrialParams, TrialResult};
pub use trainer::{ModelTrainer, TrainTestSplit, TrainingSummary};
