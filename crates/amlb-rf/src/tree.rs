use ndarray::ArrayView1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::node::{LeafOutput, Node, NodeIndex};
use crate::split::{Objective, find_best_split};

/// Growth limits for one CART tree, resolved from a forest config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: usize,
}

/// A fitted CART decision tree.
///
/// Stored as an arena-based `Vec<Node>` with index references; the root is
/// at index 0.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

impl DecisionTree {
    /// Grow a tree on `samples` (indices into the columns; repeats allowed).
    ///
    /// Inputs are validated by the forest before any tree is grown.
    pub(crate) fn grow<O: Objective>(
        columns: &[Vec<f64>],
        samples: &[usize],
        objective: &O,
        params: TreeParams,
        seed: u64,
    ) -> Self {
        let mut builder = TreeBuilder {
            columns,
            objective,
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
            arena: Vec::new(),
        };
        builder.build(samples, 0);
        trace!(n_nodes = builder.arena.len(), "decision tree built");
        Self {
            nodes: builder.arena,
            n_features: columns.len(),
        }
    }

    /// Return the leaf output reached by `sample`.
    ///
    /// At each split goes left when `sample[feature] <= threshold`.
    pub(crate) fn leaf(&self, sample: ArrayView1<'_, f64>) -> &LeafOutput {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { output, .. } => return output,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Return the arena of nodes.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the number of feature columns the tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree (a single leaf has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }
}

struct TreeBuilder<'a, O: Objective> {
    columns: &'a [Vec<f64>],
    objective: &'a O,
    params: TreeParams,
    rng: ChaCha8Rng,
    arena: Vec<Node>,
}

impl<O: Objective> TreeBuilder<'_, O> {
    /// Recursively build the subtree for `samples`, returning its root index.
    fn build(&mut self, samples: &[usize], depth: usize) -> NodeIndex {
        let n_samples = samples.len();
        let stats = self.objective.stats(samples);
        let impurity = self.objective.impurity(&stats, n_samples);

        let depth_exceeded = self.params.max_depth.is_some_and(|max_d| depth >= max_d);
        let too_few = n_samples < self.params.min_samples_split;
        let pure = impurity.value() <= 1e-12;

        let split = if too_few || pure || depth_exceeded {
            None
        } else {
            find_best_split(
                self.columns,
                samples,
                self.objective,
                self.params.max_features,
                self.params.min_samples_leaf,
                &mut self.rng,
            )
        };

        let Some(split) = split else {
            let idx = self.arena.len();
            self.arena.push(Node::Leaf {
                output: self.objective.leaf(&stats, n_samples),
                impurity,
                n_samples,
            });
            return NodeIndex::new(idx);
        };

        // Reserve the index, recurse, then overwrite the placeholder.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            output: LeafOutput::Mean(0.0),
            impurity,
            n_samples,
        });
        let left = self.build(&split.left_indices, depth + 1);
        let right = self.build(&split.right_indices, depth + 1);
        self.arena[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            impurity,
            n_samples,
        };
        NodeIndex::new(node_idx)
    }
}
