//! Random forest classifier
//!
//! An ensemble of CART trees, each grown to purity on a bootstrap sample
//! with Gini impurity and `√p` candidate features per split. Class
//! probabilities are the mean of the per-tree leaf distributions. Training
//! data holding a single class produces a degenerate forest that always
//! answers that class.

use crate::error::{PipelineError, Result};
use crate::models::POSITIVE_CLASS;
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Forest hyperparameters
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
        }
    }
}

/// Classifier answer before it is collapsed into a rain probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassPrediction {
    /// Training saw only this class
    SingleClass(i64),
    /// Probability mass on the positive class
    TwoClassProbability(f64),
}

impl ClassPrediction {
    /// Probability of the positive class, always within [0, 1]
    pub fn positive_probability(&self) -> f64 {
        match *self {
            ClassPrediction::SingleClass(class) if class == POSITIVE_CLASS => 1.0,
            ClassPrediction::SingleClass(_) => 0.0,
            ClassPrediction::TwoClassProbability(p) => p.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    /// Observed classes, ascending
    classes: Vec<i64>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

impl RandomForestClassifier {
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<i64>, params: &ForestParams) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(PipelineError::Training(
                "cannot fit a classifier on zero rows".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(PipelineError::Training(format!(
                "feature rows ({}) and labels ({}) differ in length",
                x.nrows(),
                y.len()
            )));
        }
        let n_features = x.ncols();

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();

        if classes.len() == 1 {
            return Ok(Self {
                classes,
                n_features,
                trees: Vec::new(),
            });
        }

        let labels: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or(0))
            .collect();
        let max_features = ((n_features as f64).sqrt() as usize).max(1);
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let n = x.nrows();
                let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    x,
                    labels: &labels,
                    n_classes: classes.len(),
                    max_features,
                    nodes: Vec::new(),
                };
                builder.grow(&mut sample, &mut rng);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Ok(Self {
            classes,
            n_features,
            trees,
        })
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Check the structure of a forest that did not come from [`Self::fit`]
    ///
    /// Child links must point forward within their tree, so traversal always
    /// reaches a leaf, and every leaf must carry one probability per class.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.classes.is_empty() {
            return Err("forest has no classes".to_string());
        }
        if self.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!("classes {:?} are not strictly ascending", self.classes));
        }
        if self.classes.len() > 1 && self.trees.is_empty() {
            return Err(format!("{} classes but no trees", self.classes.len()));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(format!("tree {t} has no nodes"));
            }
            for (idx, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= self.n_features {
                            return Err(format!(
                                "tree {t} node {idx} splits on feature {feature} of {}",
                                self.n_features
                            ));
                        }
                        for child in [*left, *right] {
                            if child <= idx || child >= tree.nodes.len() {
                                return Err(format!("tree {t} node {idx} links to node {child}"));
                            }
                        }
                    }
                    Node::Leaf { distribution } => {
                        if distribution.len() != self.classes.len() {
                            return Err(format!(
                                "tree {t} leaf {idx} has {} probabilities for {} classes",
                                distribution.len(),
                                self.classes.len()
                            ));
                        }
                        if distribution.iter().any(|p| !p.is_finite()) {
                            return Err(format!("tree {t} leaf {idx} has a non-finite probability"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Probability per observed class, in the order of [`Self::classes`]
    pub fn predict_proba(&self, features: ArrayView1<f64>) -> Vec<f64> {
        if self.trees.is_empty() {
            return vec![1.0; self.classes.len().min(1)];
        }
        let mut totals = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.leaf_distribution(features)) {
                *total += p;
            }
        }
        let n = self.trees.len() as f64;
        totals.iter_mut().for_each(|t| *t /= n);
        totals
    }

    /// Most probable class, the lowest one on ties
    pub fn predict(&self, features: ArrayView1<f64>) -> i64 {
        let proba = self.predict_proba(features);
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }
        self.classes[best]
    }

    pub fn classify(&self, features: ArrayView1<f64>) -> ClassPrediction {
        if self.classes.len() == 1 {
            return ClassPrediction::SingleClass(self.classes[0]);
        }
        let proba = self.predict_proba(features);
        let positive = self
            .classes
            .iter()
            .position(|c| *c == POSITIVE_CLASS)
            .map(|idx| proba[idx])
            .unwrap_or(0.0);
        ClassPrediction::TwoClassProbability(positive)
    }

    /// Accuracy on the given rows
    pub fn score(&self, x: ArrayView2<f64>, y: ArrayView1<i64>) -> f64 {
        let predicted: Vec<i64> = x.rows().into_iter().map(|row| self.predict(row)).collect();
        super::accuracy(y, ArrayView1::from(&predicted))
    }
}

impl DecisionTree {
    fn leaf_distribution(&self, features: ArrayView1<f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

struct TreeBuilder<'a, 'l> {
    x: ArrayView2<'a, f64>,
    labels: &'l [usize],
    n_classes: usize,
    max_features: usize,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_, '_> {
    /// Grow the subtree over `samples`, returning its root node index
    fn grow(&mut self, samples: &mut [usize], rng: &mut StdRng) -> usize {
        let counts = self.class_counts(samples);
        let node = self.nodes.len();
        self.nodes.push(leaf(&counts, samples.len()));

        let pure = counts.iter().filter(|c| **c > 0).count() <= 1;
        if pure || samples.len() < 2 {
            return node;
        }

        let Some((feature, threshold)) = self.best_split(samples, &counts, rng) else {
            return node;
        };

        let mut mid = 0;
        for i in 0..samples.len() {
            if self.x[[samples[i], feature]] <= threshold {
                samples.swap(i, mid);
                mid += 1;
            }
        }
        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(left_samples, rng);
        let right = self.grow(right_samples, rng);

        self.nodes[node] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node
    }

    /// Lowest weighted Gini split over a random subset of informative features
    fn best_split(
        &self,
        samples: &[usize],
        counts: &[usize],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let n = samples.len();
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let mut best: Option<(f64, usize, f64)> = None;
        let mut informative = 0;
        for feature in features {
            if informative >= self.max_features {
                break;
            }
            let mut ordered: Vec<(f64, usize)> = samples
                .iter()
                .map(|&s| (self.x[[s, feature]], self.labels[s]))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));
            if ordered[0].0 == ordered[n - 1].0 {
                continue;
            }
            informative += 1;

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();
            for i in 0..n - 1 {
                let class = ordered[i].1;
                left[class] += 1;
                right[class] -= 1;
                if ordered[i].0 == ordered[i + 1].0 {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                if best.map_or(true, |(b, _, _)| impurity < b) {
                    let (lo, hi) = (ordered[i].0, ordered[i + 1].0);
                    let mut threshold = lo / 2.0 + hi / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some((impurity, feature, threshold));
                }
            }
        }
        best.map(|(_, feature, threshold)| (feature, threshold))
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &s in samples {
            counts[self.labels[s]] += 1;
        }
        counts
    }
}

fn leaf(counts: &[usize], total: usize) -> Node {
    let total = total.max(1) as f64;
    Node::Leaf {
        distribution: counts.iter().map(|c| *c as f64 / total).collect(),
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|c| {
            let p = *c as f64 / total;
            p * p
        })
        .sum::<f64>()
}
