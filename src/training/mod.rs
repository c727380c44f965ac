//! Model training module
//!
//! Binary classifiers behind the [`Classifier`] trait:
//! - Decision trees, Random Forest and Extra Trees
//! - Gradient boosting
//! - AdaBoost (SAMME)
//! - Support Vector Machines (RBF and linear kernels)
//! - Neural networks (MLP)
//! - Logistic regression

mod models;
pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod extra_trees;
pub mod gradient_boosting;
pub mod linear_models;
pub mod neural_network;
pub mod random_forest;
pub mod svm;

pub use adaboost::AdaBoostClassifier;
pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, MaxFeatures, Splitter, TreeNode};
pub use extra_trees::ExtraTrees;
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::LogisticRegression;
pub use models::{accuracy, confusion_matrix, roc_auc, ClassMetrics, ClassificationReport, Classifier};
pub use neural_network::{Activation, MLPClassifier, MLPConfig};
pub use random_forest::RandomForest;
pub use svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
