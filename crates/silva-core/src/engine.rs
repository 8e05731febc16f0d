//! Built-in random-forest engine.
//!
//! A seeded bagging ensemble of Gini-split CART trees with per-split random
//! feature subsets and majority voting. It exists so the pipeline and the
//! `classify` tool run end-to-end out of the box; the `ClassifierEngine`
//! trait remains the seam for an external backend.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::classify::{ClassifierEngine, Model, TrainConfig};
use crate::error::{Error, Result};
use crate::sample::SampleSet;

const MAX_DEPTH: usize = 12;
const MIN_SPLIT: usize = 4;

/// Seeded random-forest trainer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForestEngine;

enum Node {
    Leaf(u8),
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn classify(&self, features: &[f32]) -> u8 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf(label) => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct Forest {
    trees: Vec<Tree>,
}

impl Model for Forest {
    fn classify(&self, features: &[f32]) -> u8 {
        let mut votes: BTreeMap<u8, u32> = BTreeMap::new();
        for tree in &self.trees {
            *votes.entry(tree.classify(features)).or_insert(0) += 1;
        }
        // Ascending label order keeps ties deterministic.
        let mut winner = 0;
        let mut best = 0;
        for (label, count) in votes {
            if count > best {
                best = count;
                winner = label;
            }
        }
        winner
    }
}

impl ClassifierEngine for ForestEngine {
    fn train(
        &self,
        samples: &SampleSet,
        _label_field: &str,
        feature_names: &[String],
        config: &TrainConfig,
    ) -> Result<Box<dyn Model>> {
        if config.trees == 0 {
            return Err(Error::Train("ensemble size is zero".to_string()));
        }
        let n = samples.len();
        let n_features = feature_names.len();
        let mtry = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);

        let mut trees = Vec::with_capacity(config.trees as usize);
        for t in 0..config.trees as u64 {
            let mut rng =
                ChaCha8Rng::seed_from_u64(config.seed ^ t.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut nodes = Vec::new();
            grow(samples, &bootstrap, 0, mtry, &mut rng, &mut nodes);
            trees.push(Tree { nodes });
        }

        Ok(Box::new(Forest { trees }))
    }
}

/// Grow a subtree over `indices`; returns the created node's index.
fn grow(
    samples: &SampleSet,
    indices: &[usize],
    depth: usize,
    mtry: usize,
    rng: &mut ChaCha8Rng,
    nodes: &mut Vec<Node>,
) -> usize {
    let parent_impurity = gini(samples, indices);

    if depth >= MAX_DEPTH || indices.len() < MIN_SPLIT || parent_impurity < 1e-7 {
        nodes.push(Node::Leaf(majority(samples, indices)));
        return nodes.len() - 1;
    }

    let n_features = samples.feature_names.len();
    let candidates = rand::seq::index::sample(rng, n_features, mtry);

    let mut best: Option<(usize, f32, f64)> = None;
    let mut pairs: Vec<(f32, u8)> = Vec::with_capacity(indices.len());
    for feature in candidates {
        pairs.clear();
        pairs.extend(
            indices
                .iter()
                .map(|&i| (samples.features[i][feature], samples.labels[i])),
        );
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut right: BTreeMap<u8, u32> = BTreeMap::new();
        for &(_, label) in &pairs {
            *right.entry(label).or_insert(0) += 1;
        }
        let mut left: BTreeMap<u8, u32> = BTreeMap::new();
        let n = pairs.len() as f64;

        for i in 1..pairs.len() {
            let label = pairs[i - 1].1;
            *left.entry(label).or_insert(0) += 1;
            if let Some(c) = right.get_mut(&label) {
                *c -= 1;
            }
            // No threshold exists between equal values.
            if pairs[i].0 <= pairs[i - 1].0 {
                continue;
            }
            let nl = i as f64;
            let nr = n - nl;
            let weighted =
                nl / n * gini_counts(&left, nl) + nr / n * gini_counts(&right, nr);
            if best.map_or(true, |(_, _, b)| weighted < b) {
                let threshold = (pairs[i - 1].0 + pairs[i].0) / 2.0;
                best = Some((feature, threshold, weighted));
            }
        }
    }

    match best {
        Some((feature, threshold, weighted)) if weighted < parent_impurity - 1e-9 => {
            let (lhs, rhs): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .copied()
                .partition(|&i| samples.features[i][feature] <= threshold);

            let me = nodes.len();
            nodes.push(Node::Leaf(0)); // placeholder, patched below
            let left = grow(samples, &lhs, depth + 1, mtry, rng, nodes);
            let right = grow(samples, &rhs, depth + 1, mtry, rng, nodes);
            nodes[me] = Node::Split {
                feature,
                threshold,
                left,
                right,
            };
            me
        }
        _ => {
            nodes.push(Node::Leaf(majority(samples, indices)));
            nodes.len() - 1
        }
    }
}

fn majority(samples: &SampleSet, indices: &[usize]) -> u8 {
    let mut counts: BTreeMap<u8, u32> = BTreeMap::new();
    for &i in indices {
        *counts.entry(samples.labels[i]).or_insert(0) += 1;
    }
    let mut winner = 0;
    let mut best = 0;
    for (label, count) in counts {
        if count > best {
            best = count;
            winner = label;
        }
    }
    winner
}

fn gini(samples: &SampleSet, indices: &[usize]) -> f64 {
    let mut counts: BTreeMap<u8, u32> = BTreeMap::new();
    for &i in indices {
        *counts.entry(samples.labels[i]).or_insert(0) += 1;
    }
    gini_counts(&counts, indices.len() as f64)
}

fn gini_counts(counts: &BTreeMap<u8, u32>, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    1.0 - counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::train_classifier;

    /// Two well-separated clusters in a 2-feature space.
    fn separable(n_per_class: usize) -> SampleSet {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let jitter = (i % 7) as f32 * 0.01;
            features.push(vec![100.0 + jitter, 200.0 - jitter]);
            labels.push(0);
            features.push(vec![900.0 - jitter, 800.0 + jitter]);
            labels.push(1);
        }
        SampleSet {
            feature_names: vec!["WET1_NIR_qmo".to_string(), "WET1_NDVI_qmo".to_string()],
            features,
            labels,
        }
    }

    fn config() -> TrainConfig {
        TrainConfig {
            trees: 25,
            seed: 42,
        }
    }

    #[test]
    fn forest_separates_two_clusters() {
        let samples = separable(40);
        let names = samples.feature_names.clone();
        let model =
            train_classifier(&ForestEngine, &samples, "class", &names, &config()).unwrap();
        assert_eq!(model.classify(&[120.0, 210.0]), 0);
        assert_eq!(model.classify(&[880.0, 790.0]), 1);
    }

    #[test]
    fn training_is_deterministic_under_a_fixed_seed() {
        let samples = separable(25);
        let names = samples.feature_names.clone();
        let a = train_classifier(&ForestEngine, &samples, "class", &names, &config()).unwrap();
        let b = train_classifier(&ForestEngine, &samples, "class", &names, &config()).unwrap();
        for probe in [[150.0, 250.0], [500.0, 500.0], [850.0, 750.0]] {
            assert_eq!(a.classify(&probe), b.classify(&probe));
        }
    }

    #[test]
    fn zero_trees_is_a_training_error() {
        let samples = separable(10);
        let names = samples.feature_names.clone();
        let err = train_classifier(
            &ForestEngine,
            &samples,
            "class",
            &names,
            &TrainConfig { trees: 0, seed: 1 },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Train(_)));
    }
}
