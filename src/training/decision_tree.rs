//! CART decision tree shared by the forest and boosting models
//!
//! Leaves store the (weighted) mean target of their samples. For 0/1
//! labels that is the positive-class probability, so the same tree serves
//! classification (Gini/entropy) and residual regression (MSE).

use crate::error::{EnsembleError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn predict_sample(&self, sample: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Route `rows` down the tree and reset each reached leaf to `value(rows_in_leaf)`
    fn refit_leaves(&mut self, x: &Array2<f64>, rows: &[usize], value: &dyn Fn(&[usize]) -> f64) {
        match self {
            TreeNode::Leaf { value: v, .. } => {
                if !rows.is_empty() {
                    *v = value(rows);
                }
            }
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                let (f, t) = (*feature_idx, *threshold);
                let (l, r): (Vec<usize>, Vec<usize>) = rows.iter().partition(|&&i| x[[i, f]] <= t);
                left.refit_leaves(x, &l, value);
                right.refit_leaves(x, &r, value);
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    Mse,
}

impl Criterion {
    /// Impurity from weighted sufficient statistics
    fn impurity(self, w: f64, sum: f64, sq_sum: f64) -> f64 {
        if w <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Mse => (sq_sum / w - (sum / w).powi(2)).max(0.0),
            Criterion::Gini => {
                let p = (sum / w).clamp(0.0, 1.0);
                2.0 * p * (1.0 - p)
            }
            Criterion::Entropy => {
                let p = (sum / w).clamp(0.0, 1.0);
                let h = |q: f64| if q > 0.0 { -q * q.log2() } else { 0.0 };
                h(p) + h(1.0 - p)
            }
        }
    }
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Fixed(usize),
    Fraction(f64),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(k) => k,
            MaxFeatures::Fraction(f) => (n_features as f64 * f) as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// How split thresholds are chosen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Splitter {
    /// Exhaustive scan over sorted values
    Best,
    /// One uniform threshold per candidate feature (extremely randomized)
    Random,
}

/// Running weighted statistics of a node side
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    count: usize,
    w: f64,
    sum: f64,
    sq_sum: f64,
}

impl Stats {
    fn push(&mut self, y: f64, w: f64) {
        self.count += 1;
        self.w += w;
        self.sum += w * y;
        self.sq_sum += w * y * y;
    }

    fn minus(&self, other: &Stats) -> Stats {
        Stats {
            count: self.count - other.count,
            w: self.w - other.w,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity, lower is better
    score: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub criterion: Criterion,
    pub splitter: Splitter,
    pub random_state: u64,
    n_features: usize,
    /// Unnormalized weighted impurity decrease per feature
    importances: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            criterion: Criterion::Gini,
            splitter: Splitter::Best,
            random_state: 42,
            n_features: 0,
            importances: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::Mse,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on every row with unit weights
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        self.fit_rows(x, y, &indices, None, &mut rng)?;
        Ok(self)
    }

    /// Fit on every row with per-sample weights
    pub fn fit_weighted(&mut self, x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>) -> Result<&mut Self> {
        if weights.len() != x.nrows() {
            return Err(EnsembleError::ShapeError {
                expected: format!("weights length = {}", x.nrows()),
                actual: format!("weights length = {}", weights.len()),
            });
        }
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        self.fit_rows(x, y, &indices, Some(weights), &mut rng)?;
        Ok(self)
    }

    /// Fit on a subset of rows (bootstrap samples may repeat indices)
    pub(crate) fn fit_rows<R: Rng>(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        weights: Option<&Array1<f64>>,
        rng: &mut R,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(EnsembleError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if rows.is_empty() {
            return Err(EnsembleError::TrainingError("Cannot fit tree on zero samples".to_string()));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let mut rows = rows.to_vec();
        let root = self.build(x, y, weights, &mut rows, 0, &mut importances, rng);
        self.root = Some(root);
        self.importances = importances;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build<R: Rng>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: Option<&Array1<f64>>,
        rows: &mut [usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut R,
    ) -> TreeNode {
        let weight = |i: usize| weights.map_or(1.0, |w| w[i]);
        let mut node = Stats::default();
        for &i in rows.iter() {
            node.push(y[i], weight(i));
        }
        let value = if node.w > 0.0 { node.sum / node.w } else { 0.0 };
        let n_samples = rows.len();
        let impurity = self.criterion.impurity(node.w, node.sum, node.sq_sum);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;
        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let Some(split) = self.find_split(x, y, weights, rows, &node, rng) else {
            return TreeNode::Leaf { value, n_samples };
        };

        // Partition rows in place: left side first
        let mut mid = 0;
        for k in 0..rows.len() {
            if x[[rows[k], split.feature]] <= split.threshold {
                rows.swap(mid, k);
                mid += 1;
            }
        }
        if mid == 0 || mid == rows.len() {
            return TreeNode::Leaf { value, n_samples };
        }

        importances[split.feature] += node.w * (impurity - split.score);

        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.build(x, y, weights, left_rows, depth + 1, importances, rng);
        let right = self.build(x, y, weights, right_rows, depth + 1, importances, rng);

        TreeNode::Split {
            feature_idx: split.feature,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples,
            impurity,
        }
    }

    fn find_split<R: Rng>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: Option<&Array1<f64>>,
        rows: &[usize],
        node: &Stats,
        rng: &mut R,
    ) -> Option<SplitCandidate> {
        let n_features = x.ncols();
        let k = self.max_features.resolve(n_features);
        let candidates: Vec<usize> = if k >= n_features {
            (0..n_features).collect()
        } else {
            rand::seq::index::sample(rng, n_features, k).into_vec()
        };

        let weight = |i: usize| weights.map_or(1.0, |w| w[i]);
        let mut best: Option<SplitCandidate> = None;
        let mut consider = |cand: SplitCandidate| {
            if best.as_ref().map_or(true, |b| cand.score < b.score) {
                best = Some(cand);
            }
        };

        for feature in candidates {
            match self.splitter {
                Splitter::Best => {
                    let mut pairs: Vec<(f64, usize)> = rows.iter().map(|&i| (x[[i, feature]], i)).collect();
                    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

                    let mut left = Stats::default();
                    for k in 0..pairs.len() - 1 {
                        let (v, i) = pairs[k];
                        left.push(y[i], weight(i));
                        if v == pairs[k + 1].0 {
                            continue;
                        }
                        let right = node.minus(&left);
                        if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                            continue;
                        }
                        consider(SplitCandidate {
                            feature,
                            threshold: (v + pairs[k + 1].0) / 2.0,
                            score: self.children_impurity(node, &left, &right),
                        });
                    }
                }
                Splitter::Random => {
                    let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                        let v = x[[i, feature]];
                        (lo.min(v), hi.max(v))
                    });
                    if hi <= lo {
                        continue;
                    }
                    let threshold = rng.gen_range(lo..hi);
                    let mut left = Stats::default();
                    for &i in rows {
                        if x[[i, feature]] <= threshold {
                            left.push(y[i], weight(i));
                        }
                    }
                    let right = node.minus(&left);
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }
                    consider(SplitCandidate {
                        feature,
                        threshold,
                        score: self.children_impurity(node, &left, &right),
                    });
                }
            }
        }

        best
    }

    fn children_impurity(&self, node: &Stats, left: &Stats, right: &Stats) -> f64 {
        let li = self.criterion.impurity(left.w, left.sum, left.sq_sum);
        let ri = self.criterion.impurity(right.w, right.sum, right.sq_sum);
        (left.w * li + right.w * ri) / node.w
    }

    /// Leaf values for every row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(EnsembleError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(EnsembleError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let sample = row.to_vec();
                root.predict_sample(&sample)
            })
            .collect())
    }

    pub(crate) fn predict_row(&self, sample: &[f64]) -> Result<f64> {
        let root = self.root.as_ref().ok_or(EnsembleError::ModelNotFitted)?;
        Ok(root.predict_sample(sample))
    }

    /// Replace leaf values, keeping the split structure. Leaves no row reaches keep their value.
    pub(crate) fn refit_leaves(&mut self, x: &Array2<f64>, rows: &[usize], value: &dyn Fn(&[usize]) -> f64) -> Result<()> {
        let root = self.root.as_mut().ok_or(EnsembleError::ModelNotFitted)?;
        root.refit_leaves(x, rows, value);
        Ok(())
    }

    /// Raw impurity decrease per feature
    pub(crate) fn raw_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Impurity-decrease importances normalized to sum to 1
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.root.as_ref()?;
        let total: f64 = self.importances.iter().sum();
        let imp = if total > 0.0 {
            self.importances.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.n_features]
        };
        Some(Array1::from_vec(imp))
    }

    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, |r| r.depth())
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions.to_vec(), vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(tree.get_depth(), 1);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_refit_leaves_keeps_splits() {
        let x = array![[0.0], [0.0], [1.0], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();
        tree.refit_leaves(&x, &[0, 1, 2, 3], &|rows: &[usize]| rows.len() as f64 * if rows[0] < 2 { -1.0 } else { 1.0 })
            .unwrap();
        assert_eq!(tree.predict(&x).unwrap().to_vec(), vec![-2.0, -2.0, 2.0, 2.0]);
        assert_eq!(tree.get_depth(), 1);
    }

    #[test]
    fn test_leaf_holds_class_share() {
        let x = array![[0.0], [0.0], [0.0], [0.0], [1.0], [1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        let p = tree.predict(&array![[0.0], [1.0]]).unwrap();
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert!((p[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_and_min_leaf() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 1.0], [6.0, 0.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(Some(2));
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 2);

        let mut tree = DecisionTree::new_classifier().with_min_samples_leaf(3);
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 1);
    }

    #[test]
    fn test_weighted_fit_follows_heavy_samples() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let w = array![1.0, 1.0, 10.0, 1.0];
        let mut stump = DecisionTree::new_classifier().with_max_depth(Some(1));
        stump.fit_weighted(&x, &y, &w).unwrap();
        // the heavy negative at x=2 must land in a leaf voting 0
        assert!(stump.predict(&array![[2.0]]).unwrap()[0] < 0.5);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_random_splitter_separates_blocks() {
        let x = array![[0.0], [0.1], [0.2], [5.0], [5.1], [5.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_classifier().with_splitter(Splitter::Random);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap().to_vec(), y.to_vec());
    }

    #[test]
    fn test_unfitted_predict_errors() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(EnsembleError::ModelNotFitted)));
    }
}
