/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the top-level HODLR solver tree: compute, solve and log-determinant.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    coordinates::CoordinateStore,
    error::{Result, SolverError},
    low_rank::LowRankApproximator,
    node::{BuildContext, CompressionHook, HierarchyNode, NodeSummary},
    random::{RandomSource, ROOT_NODE_ID},
    traits::KernelFunction,
};
use faer::{ColRef, Mat, MatMut, MatRef};
use std::{sync::Arc, time::Instant};

/// Parameters controlling construction of the HODLR tree.
///
/// ### Default Values
/// - `min_size`: `100`
/// - `tol`: `1e-8`
/// - `seed`: `0`
/// - `max_rank`: `None`
/// - `parallel`: `true`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TreeConfig {
    /// Ranges with at most this many rows become dense leaves.
    /// Values below 1 are treated as 1.
    pub min_size: usize,

    /// Relative Frobenius-norm tolerance for off-diagonal compression.
    pub tol: f64,

    /// Seed for the random pivots used during compression.
    pub seed: u64,

    /// Hard cap on the off-diagonal rank at every node.
    /// `None` lets the rank grow to the block size, so compression never fails.
    pub max_rank: Option<usize>,

    /// Build and apply sibling subtrees concurrently.
    pub parallel: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            min_size: 100,
            tol: 1e-8,
            seed: 0,
            max_rank: None,
            parallel: true,
        }
    }
}

/// A HODLR factorisation of `K + diag(noise)` for a kernel matrix `K`.
///
/// The solver is only usable after a successful [`SolverTree::compute`];
/// every query before that fails with [`SolverError::NotComputed`].
pub struct SolverTree<K: KernelFunction> {
    store: CoordinateStore<K>,
    config: TreeConfig,
    root: Option<HierarchyNode>,
    log_det: f64,
    on_compressed: Option<Arc<CompressionHook>>,
}

impl<K: KernelFunction> SolverTree<K> {
    pub fn new(kernel: K, config: TreeConfig) -> Self {
        Self {
            store: CoordinateStore::new(kernel),
            config,
            root: None,
            log_det: 0.0,
            on_compressed: None,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Replaces the configuration. Any existing factorisation is discarded.
    pub fn set_config(&mut self, config: TreeConfig) {
        self.config = config;
        self.root = None;
    }

    pub fn kernel(&self) -> &K {
        self.store.kernel()
    }

    /// Installs a callback observing every compression of the next `compute` calls.
    pub fn set_compression_hook(&mut self, hook: Option<Arc<CompressionHook>>) {
        self.on_compressed = hook;
    }

    /// Factorises the covariance matrix of `coordinates` with `noise` added to
    /// its diagonal.
    ///
    /// Any previous factorisation is discarded first, so on failure the solver is
    /// left uncomputed.
    ///
    /// # Errors
    /// - [`SolverError::DimensionMismatch`] if `coordinates` has the wrong number of
    ///   columns, is empty, or `noise` has a different length.
    /// - [`SolverError::NonPositiveDefinite`] if a leaf cannot be Cholesky factorised.
    /// - [`SolverError::CorrectionNotPositiveDefinite`] if an internal node's
    ///   correction matrix cannot be, typically because `tol` is too loose.
    /// - [`SolverError::ApproximationFailed`] if `max_rank` is too small.
    pub fn compute(&mut self, coordinates: MatRef<f64>, noise: &[f64]) -> Result<()> {
        self.root = None;
        self.log_det = 0.0;

        let n = coordinates.nrows();
        if n == 0 {
            return Err(SolverError::DimensionMismatch {
                context: "number of input coordinates",
                expected: 1,
                found: 0,
            });
        }
        if noise.len() != n {
            return Err(SolverError::DimensionMismatch {
                context: "diagonal noise",
                expected: n,
                found: noise.len(),
            });
        }

        self.store.set_coordinates(coordinates.to_owned())?;

        let build_start = Instant::now();
        let random = RandomSource::new(self.config.seed);
        let ctx = BuildContext {
            store: &self.store,
            noise,
            random: &random,
            approximator: LowRankApproximator::new(self.config.tol, self.config.max_rank),
            min_size: self.config.min_size.max(1),
            parallel: self.config.parallel,
            on_compressed: self.on_compressed.as_deref(),
        };

        let root = HierarchyNode::compute(&ctx, 0, n, ROOT_NODE_ID, 0)?;
        let log_det = root.log_determinant();

        tracing::debug!(
            size = n,
            min_size = ctx.min_size,
            tol = self.config.tol,
            log_det,
            elapsed = ?build_start.elapsed(),
            "computed HODLR factorisation"
        );

        self.log_det = log_det;
        self.root = Some(root);
        Ok(())
    }

    /// Whether a successful `compute` has happened since construction.
    pub fn is_computed(&self) -> bool {
        self.root.is_some()
    }

    /// Number of rows of the factorised matrix, 0 if not computed.
    pub fn size(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.size())
    }

    fn root(&self) -> Result<&HierarchyNode> {
        self.root.as_ref().ok_or(SolverError::NotComputed)
    }

    fn check_rows(&self, root: &HierarchyNode, rows: usize) -> Result<()> {
        match rows == root.size() {
            true => Ok(()),
            false => Err(SolverError::DimensionMismatch {
                context: "right-hand side rows",
                expected: root.size(),
                found: rows,
            }),
        }
    }

    /// `log det (K + diag(noise))`.
    pub fn log_determinant(&self) -> Result<f64> {
        self.root()?;
        Ok(self.log_det)
    }

    /// Overwrites `x` with `K^-1 x`.
    pub fn solve_in_place(&self, x: MatMut<f64>) -> Result<()> {
        let root = self.root()?;
        self.check_rows(root, x.nrows())?;
        root.apply_inverse(x, self.config.parallel);
        Ok(())
    }

    /// Returns `K^-1 x`.
    pub fn solve(&self, x: MatRef<f64>) -> Result<Mat<f64>> {
        let mut alpha = x.to_owned();
        self.solve_in_place(alpha.as_mut())?;
        Ok(alpha)
    }

    /// Returns `x^T K^-1 x`.
    pub fn dot_solve(&self, x: ColRef<f64>) -> Result<f64> {
        let mut alpha = Mat::<f64>::zeros(x.nrows(), 1);
        alpha.col_mut(0).copy_from(x);
        self.solve_in_place(alpha.as_mut())?;
        Ok((0..x.nrows()).map(|i| x[i] * alpha[(i, 0)]).sum())
    }

    /// Returns the dense `K^-1`.
    pub fn inverse(&self) -> Result<Mat<f64>> {
        let n = self.root()?.size();
        let mut eye = Mat::<f64>::identity(n, n);
        self.solve_in_place(eye.as_mut())?;
        Ok(eye)
    }

    /// Pre-order summary of every node in the computed tree.
    pub fn node_summaries(&self) -> Result<Vec<NodeSummary>> {
        let mut out = Vec::new();
        self.root()?.collect_summaries(&mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;
    use faer::RowRef;

    struct SquaredExponential;

    impl KernelFunction for SquaredExponential {
        fn dimension(&self) -> usize {
            1
        }

        fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
            let r = a[0] - b[0];
            (-0.5 * r * r).exp()
        }
    }

    /// Unit diagonal with off-diagonal coupling 2, so any pair is indefinite.
    struct StrongCoupling;

    impl KernelFunction for StrongCoupling {
        fn dimension(&self) -> usize {
            1
        }

        fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
            match a[0] == b[0] {
                true => 1.0,
                false => 2.0,
            }
        }
    }

    fn line(n: usize) -> Mat<f64> {
        Mat::from_fn(n, 1, |i, _| i as f64)
    }

    #[test]
    fn queries_before_compute_fail() {
        let tree = SolverTree::new(SquaredExponential, TreeConfig::default());

        assert!(!tree.is_computed());
        assert!(tree.size() == 0);
        assert!(tree.log_determinant() == Err(SolverError::NotComputed));
        assert!(tree.solve(Mat::<f64>::zeros(3, 1).as_ref()).unwrap_err() == SolverError::NotComputed);
        assert!(tree.inverse().unwrap_err() == SolverError::NotComputed);
        assert!(tree.node_summaries().unwrap_err() == SolverError::NotComputed);
    }

    #[test]
    fn wrong_noise_length_is_rejected() {
        let mut tree = SolverTree::new(SquaredExponential, TreeConfig::default());
        let err = tree.compute(line(4).as_ref(), &[0.1; 3]).unwrap_err();

        assert_eq!(
            err,
            SolverError::DimensionMismatch {
                context: "diagonal noise",
                expected: 4,
                found: 3
            }
        );
        assert!(!tree.is_computed());
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut tree = SolverTree::new(SquaredExponential, TreeConfig::default());
        assert!(tree.compute(Mat::<f64>::zeros(0, 1).as_ref(), &[]).is_err());
    }

    #[test]
    fn indefinite_correction_reports_the_node() {
        let config = TreeConfig {
            min_size: 1,
            ..TreeConfig::default()
        };
        let mut tree = SolverTree::new(StrongCoupling, config);

        // Both leaves are positive, the coupling makes [[1, 2], [2, 1]] indefinite.
        let err = tree.compute(line(2).as_ref(), &[0.0; 2]).unwrap_err();

        assert_eq!(
            err,
            SolverError::CorrectionNotPositiveDefinite {
                start: 0,
                size: 2,
                rank: 1
            }
        );
        assert!(!tree.is_computed());
    }

    #[test]
    fn wrong_rhs_rows_are_rejected() {
        let mut tree = SolverTree::new(SquaredExponential, TreeConfig::default());
        tree.compute(line(10).as_ref(), &[1.0; 10]).unwrap();

        let err = tree.solve(Mat::<f64>::zeros(9, 2).as_ref()).unwrap_err();
        assert_eq!(
            err,
            SolverError::DimensionMismatch {
                context: "right-hand side rows",
                expected: 10,
                found: 9
            }
        );
    }

    #[test]
    fn tree_ranges_partition_rows() {
        let config = TreeConfig {
            min_size: 3,
            tol: 1e-8,
            ..TreeConfig::default()
        };
        let mut tree = SolverTree::new(SquaredExponential, config);
        tree.compute(line(23).as_ref(), &[0.5; 23]).unwrap();

        let summaries = tree.node_summaries().unwrap();
        let root = summaries[0];
        assert!(root.level == 0);
        assert!(root.start == 0);
        assert!(root.size == 23);

        // Leaves cover every row exactly once, in order.
        let leaves: Vec<_> = summaries.iter().filter(|s| s.rank.is_none()).collect();
        let mut next = 0;
        for leaf in &leaves {
            assert!(leaf.start == next);
            assert!(leaf.size > 0);
            assert!(leaf.size <= 3);
            next += leaf.size;
        }
        assert!(next == 23);

        // Local contributions sum to the total log-determinant.
        let total: f64 = summaries.iter().map(|s| s.log_det).sum();
        assert!((total - tree.log_determinant().unwrap()).abs() < 1e-10);
    }

    #[test]
    fn compression_hook_sees_every_internal_node() {
        use crate::node::CompressedBlock;
        use std::sync::Mutex;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let config = TreeConfig {
            min_size: 4,
            tol: 1e-8,
            ..TreeConfig::default()
        };
        let mut tree = SolverTree::new(SquaredExponential, config);
        tree.set_compression_hook(Some(Arc::new(move |block: CompressedBlock| {
            sink.lock().unwrap().push(block)
        })));
        tree.compute(line(16).as_ref(), &[0.5; 16]).unwrap();

        let seen = seen.lock().unwrap();
        let internal: Vec<_> = tree
            .node_summaries()
            .unwrap()
            .into_iter()
            .filter(|s| s.rank.is_some())
            .collect();

        assert!(seen.len() == internal.len());
        // Children finish before their parent, so the root comes last.
        let last = seen[seen.len() - 1];
        assert!(last.level == 0);
        assert!(last.start == 0);
        assert!(last.size == 16);
        assert!(Some(last.rank) == internal[0].rank);
    }

    #[test]
    fn odd_split_gives_left_the_ceiling() {
        let config = TreeConfig {
            min_size: 4,
            ..TreeConfig::default()
        };
        let mut tree = SolverTree::new(SquaredExponential, config);
        tree.compute(line(7).as_ref(), &[1.0; 7]).unwrap();

        let summaries = tree.node_summaries().unwrap();
        assert!(summaries[1].start == 0);
        assert!(summaries[1].size == 4);
        assert!(summaries[2].start == 4);
        assert!(summaries[2].size == 3);
    }
}
