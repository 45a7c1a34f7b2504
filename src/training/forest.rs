//! Random forest classifier: bagged CART trees split on Gini impurity.
//!
//! Trees are stored as flat node arenas (root at index 0, children always at
//! larger indices) so prediction is iterative and persisted artefacts do not
//! nest one JSON object per tree level.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::common::config::TrainingCfg;
use crate::common::error::{ScreenError, ScreenResult};
use crate::features::ScaledFeatures;

use super::domain::{Classifier, Trainer};

/// Forest hyper-parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Root has depth 0. `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features examined per split; defaults to `floor(sqrt(n_features))`.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::from(&TrainingCfg::default())
    }
}

impl From<&TrainingCfg> for ForestParams {
    fn from(cfg: &TrainingCfg) -> Self {
        Self {
            n_estimators: cfg.n_estimators,
            max_depth: cfg.max_depth,
            min_samples_split: cfg.min_samples_split,
            max_features: None,
            seed: cfg.forest_seed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: usize,
        n_samples: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn predict(&self, x: &[f64]) -> ScreenResult<usize> {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { class, .. }) => return Ok(*class),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let next = if x.get(*feature).copied().unwrap_or(f64::NAN) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                    if next <= idx {
                        return Err(ScreenError::not_ready("corrupt tree: child precedes parent"));
                    }
                    idx = next;
                }
                None => return Err(ScreenError::not_ready("corrupt tree: dangling node index")),
            }
        }
    }

    fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Copy, Clone, Debug)]
struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a [ScaledFeatures],
    y: &'a [usize],
    n_classes: usize,
    n_features: usize,
    max_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self, rows: Vec<usize>, rng: &mut StdRng) -> DecisionTree {
        self.grow(rows, 0, rng);
        DecisionTree { nodes: self.nodes }
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let counts = self.class_counts(&rows);
        let leaf = Node::Leaf {
            class: majority(&counts),
            n_samples: rows.len(),
        };

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let at_depth = self.max_depth.map_or(false, |d| depth >= d);
        if pure || at_depth || rows.len() < self.min_samples_split {
            return self.push(leaf);
        }

        let Some(split) = self.best_split(&rows, &counts, rng) else {
            return self.push(leaf);
        };

        let x = self.x;
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| x[r].as_slice()[split.feature] <= split.threshold);
        if left.is_empty() || right.is_empty() {
            return self.push(leaf);
        }

        // reserve the parent slot so children land at larger indices
        let id = self.push(leaf);
        let l = self.grow(left, depth + 1, rng);
        let r = self.grow(right, depth + 1, rng);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: l,
            right: r,
        };
        id
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &r in rows {
            counts[self.y[r]] += 1;
        }
        counts
    }

    /// Sorted sweep over a random feature order. Keeps drawing features past
    /// `max_features` until at least one valid split exists.
    fn best_split(&self, rows: &[usize], parent: &[usize], rng: &mut StdRng) -> Option<Split> {
        let n = rows.len();
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);

        let mut best: Option<Split> = None;
        let mut column: Vec<(f64, usize)> = Vec::with_capacity(n);

        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            column.clear();
            column.extend(rows.iter().map(|&r| (self.x[r].as_slice()[feature], self.y[r])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent.to_vec();
            for i in 0..n - 1 {
                let (value, label) = column[i];
                left[label] += 1;
                right[label] -= 1;

                let next = column[i + 1].0;
                if next <= value {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;

                if best.map_or(true, |b| impurity < b.impurity) {
                    let mid = value + (next - value) / 2.0;
                    best = Some(Split {
                        feature,
                        threshold: if mid < next { mid } else { value },
                        impurity,
                    });
                }
            }
        }
        best
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Index of the largest count; ties go to the lowest label.
fn majority(counts: &[usize]) -> usize {
    let mut best = 0;
    for (label, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = label;
        }
    }
    best
}

/// Bagged ensemble of CART trees with majority voting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    n_features: usize,
    classes: Vec<usize>,
}

impl RandomForestClassifier {
    /// Fit on scaled rows. Empty or single-class data is rejected.
    pub fn fit(x: &[ScaledFeatures], y: &[usize], params: &ForestParams) -> ScreenResult<Self> {
        if x.len() != y.len() {
            return Err(ScreenError::schema(
                format!("{} labels", x.len()),
                format!("{} labels", y.len()),
            ));
        }
        let Some(first) = x.first() else {
            return Err(ScreenError::degenerate("zero training rows"));
        };
        let n_features = first.len();
        if n_features == 0 {
            return Err(ScreenError::schema("at least one feature", 0));
        }
        if let Some(bad) = x.iter().find(|r| r.len() != n_features) {
            return Err(ScreenError::schema(n_features, bad.len()));
        }
        if params.n_estimators == 0 {
            return Err(ScreenError::config("n_estimators must be at least 1"));
        }

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(ScreenError::degenerate(format!(
                "single class {:?} in {} rows",
                classes,
                y.len()
            )));
        }
        let n_classes = classes.last().map_or(0, |c| c + 1);

        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt() as usize)
            .clamp(1, n_features);

        let n = x.len();
        let trees = (0..params.n_estimators)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                TreeBuilder {
                    x,
                    y,
                    n_classes,
                    n_features,
                    max_features,
                    max_depth: params.max_depth,
                    min_samples_split: params.min_samples_split.max(2),
                    nodes: Vec::new(),
                }
                .build(rows, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_features,
            classes,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Deepest tree in the ensemble.
    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(DecisionTree::depth).max().unwrap_or(0)
    }
}

impl Classifier for RandomForestClassifier {
    fn predict(&self, x: &ScaledFeatures) -> ScreenResult<usize> {
        if x.len() != self.n_features {
            return Err(ScreenError::schema(self.n_features, x.len()));
        }
        if self.trees.is_empty() {
            return Err(ScreenError::not_ready("forest has no trees"));
        }
        let n_votes = self.classes.last().map_or(0, |c| c + 1);
        let mut votes = vec![0usize; n_votes];
        for tree in &self.trees {
            let label = tree.predict(x.as_slice())?;
            match votes.get_mut(label) {
                Some(v) => *v += 1,
                None => return Err(ScreenError::not_ready("corrupt tree: unknown leaf label")),
            }
        }
        Ok(majority(&votes))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[usize] {
        &self.classes
    }
}

/// [`Trainer`] backed by [`RandomForestClassifier`].
#[derive(Clone, Debug, Default)]
pub struct ForestTrainer {
    params: ForestParams,
}

impl ForestTrainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }
}

impl Trainer for ForestTrainer {
    type Model = RandomForestClassifier;

    fn train(&self, x: &[ScaledFeatures], y: &[usize]) -> ScreenResult<Self::Model> {
        RandomForestClassifier::fit(x, y, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n_estimators: usize) -> ForestParams {
        ForestParams {
            n_estimators,
            max_depth: Some(8),
            min_samples_split: 2,
            max_features: None,
            seed: 7,
        }
    }

    fn row(values: &[f64]) -> ScaledFeatures {
        ScaledFeatures::new(values.to_vec())
    }

    /// Label is 1 when the first feature is positive; second feature is noise.
    fn threshold_data(n: usize) -> (Vec<ScaledFeatures>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(99);
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for _ in 0..n {
            let a: f64 = rng.gen_range(-1.0..1.0);
            let b: f64 = rng.gen_range(-1.0..1.0);
            x.push(row(&[a, b]));
            y.push(usize::from(a > 0.0));
        }
        (x, y)
    }

    #[test]
    fn gini_and_majority() {
        assert_eq!(gini(&[5, 0], 5), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(majority(&[3, 3, 1]), 0);
        assert_eq!(majority(&[1, 3, 3]), 1);
    }

    #[test]
    fn learns_a_threshold() {
        let (x, y) = threshold_data(300);
        let forest = RandomForestClassifier::fit(&x, &y, &params(15)).unwrap();
        assert_eq!(forest.classes(), &[0, 1]);
        assert_eq!(forest.n_trees(), 15);
        assert_eq!(forest.predict(&row(&[0.8, 0.0])).unwrap(), 1);
        assert_eq!(forest.predict(&row(&[-0.8, 0.0])).unwrap(), 0);

        let preds = forest.predict_all(&x).unwrap();
        let correct = preds.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.95);
    }

    #[test]
    fn depth_is_capped() {
        let (x, y) = threshold_data(200);
        let mut p = params(3);
        p.max_depth = Some(2);
        let forest = RandomForestClassifier::fit(&x, &y, &p).unwrap();
        assert!(forest.max_tree_depth() <= 2);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = threshold_data(120);
        let a = RandomForestClassifier::fit(&x, &y, &params(5)).unwrap();
        let b = RandomForestClassifier::fit(&x, &y, &params(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_training_rejected() {
        assert!(matches!(
            RandomForestClassifier::fit(&[], &[], &params(3)),
            Err(ScreenError::DegenerateTraining(_))
        ));

        let x = vec![row(&[0.0]), row(&[1.0]), row(&[2.0])];
        assert!(matches!(
            RandomForestClassifier::fit(&x, &[1, 1, 1], &params(3)),
            Err(ScreenError::DegenerateTraining(_))
        ));
    }

    #[test]
    fn mismatched_shapes_rejected() {
        let x = vec![row(&[0.0, 1.0]), row(&[1.0])];
        assert!(matches!(
            RandomForestClassifier::fit(&x, &[0, 1], &params(3)),
            Err(ScreenError::SchemaMismatch { .. })
        ));
        assert!(RandomForestClassifier::fit(&x[..1], &[0, 1], &params(3)).is_err());
    }

    #[test]
    fn predict_rejects_wrong_arity() {
        let (x, y) = threshold_data(60);
        let forest = RandomForestClassifier::fit(&x, &y, &params(3)).unwrap();
        assert!(matches!(
            forest.predict(&row(&[0.5])),
            Err(ScreenError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn survives_json_round_trip() {
        let (x, y) = threshold_data(80);
        let forest = RandomForestClassifier::fit(&x, &y, &params(4)).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let back: RandomForestClassifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict_all(&x).unwrap(), forest.predict_all(&x).unwrap());
    }

    #[test]
    fn tied_vote_goes_to_lowest_label() {
        let leaf = |class| DecisionTree {
            nodes: vec![Node::Leaf {
                class,
                n_samples: 1,
            }],
        };
        let forest = RandomForestClassifier {
            trees: vec![leaf(2), leaf(1), leaf(1), leaf(2)],
            n_features: 1,
            classes: vec![0, 1, 2],
        };
        for _ in 0..20 {
            assert_eq!(forest.predict(&row(&[0.0])).unwrap(), 1);
        }
    }

    #[test]
    fn artifact_holds_only_the_trees() {
        let (x, y) = threshold_data(80);
        let forest = RandomForestClassifier::fit(&x, &y, &params(2)).unwrap();
        let json = serde_json::to_value(&forest).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["classes", "n_features", "trees"]);
    }

    #[test]
    fn trainer_uses_its_params() {
        let (x, y) = threshold_data(50);
        let trainer = ForestTrainer::new(params(6));
        let model = trainer.train(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 6);
    }
}
