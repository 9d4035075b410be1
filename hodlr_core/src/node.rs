/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements HODLR tree nodes: dense leaves and Woodbury-corrected internal nodes.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # node
//!
//! An internal node over rows `[start, start + size)` represents
//!
//! ```text
//!     K = | A    U V^T |  =  D + Z E Z^T,   Z = | U 0 |,  E = | 0 I |
//!         | V U^T   B  |                       | 0 V |       | I 0 |
//! ```
//!
//! where `A` and `B` are the (already factorised) children. With
//! `P = U^T A^-1 U = Lp Lp^T` and `Q = V^T B^-1 V`, the matrix determinant lemma gives
//!
//! ```text
//!     det K = det A * det B * det M,    M = I - Lp^T Q Lp
//! ```
//!
//! and the Sherman-Morrison-Woodbury identity gives
//! `K^-1 = D^-1 - D^-1 Z S^-1 Z^T D^-1` with `S = [[P, I], [I, Q]]`. `S` is
//! indefinite, but its solve only needs the Cholesky factors of `P` and `M`,
//! both of which are SPD exactly when `K` is.

use crate::{
    coordinates::CoordinateStore,
    error::{Result, SolverError},
    linalg::{symmetrise, DenseCholesky},
    low_rank::{LowRankApproximator, LowRankFactors},
    random::RandomSource,
    traits::KernelFunction,
};
use faer::{linalg::matmul, reborrow::*, Accum, Mat, MatMut};

/// Subtrees smaller than this are always processed sequentially.
pub const PARALLEL_THRESHOLD: usize = 512;

/// Callback run once per internal node, right after its coupling block is
/// compressed. May be called from several threads at once.
pub type CompressionHook = dyn Fn(CompressedBlock) + Send + Sync;

/// Read-only state shared by every node during one `compute` call.
pub(crate) struct BuildContext<'a, K: KernelFunction> {
    pub store: &'a CoordinateStore<K>,
    pub noise: &'a [f64],
    pub random: &'a RandomSource,
    pub approximator: LowRankApproximator,
    pub min_size: usize,
    pub parallel: bool,
    pub on_compressed: Option<&'a CompressionHook>,
}

/// An off-diagonal block that has just been compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedBlock {
    pub level: usize,

    /// First row of the node owning the block.
    pub start: usize,

    /// Number of rows of the owning node.
    pub size: usize,
    pub rank: usize,
}

/// Summary of one node of a computed tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSummary {
    /// Depth below the root (root = 0).
    pub level: usize,

    /// First row covered by the node.
    pub start: usize,

    /// Number of rows covered by the node.
    pub size: usize,

    /// Rank of the off-diagonal approximation, `None` for leaves.
    pub rank: Option<usize>,

    /// Local log-determinant contribution of this node alone.
    pub log_det: f64,
}

/// A node of the HODLR tree. Nodes only exist in the computed state.
#[derive(Debug)]
pub(crate) struct HierarchyNode {
    start: usize,
    size: usize,
    level: usize,
    kind: NodeKind,

    /// Log-determinant of the whole subtree.
    log_det: f64,
}

#[derive(Debug)]
enum NodeKind {
    Leaf(DenseCholesky),
    Internal {
        children: Box<[HierarchyNode; 2]>,
        correction: Option<WoodburyCorrection>,
    },
}

/// Cached factors of the Woodbury update at an internal node.
#[derive(Debug)]
struct WoodburyCorrection {
    /// Orthonormal left factor of the coupling block (rows of the first child).
    u: Mat<f64>,

    /// Right factor of the coupling block (rows of the second child).
    v: Mat<f64>,

    /// `A^-1 U`
    a_inv_u: Mat<f64>,

    /// `B^-1 V`
    b_inv_v: Mat<f64>,

    /// Cholesky factor of `P = U^T A^-1 U`.
    p_factor: DenseCholesky,

    /// Cholesky factor of `M = I - Lp^T Q Lp`.
    m_factor: DenseCholesky,
}

impl HierarchyNode {
    /// Builds and factorises the subtree over `[start, start + size)`.
    ///
    /// `node_id` is the heap index used to select the node's random stream.
    pub(crate) fn compute<K: KernelFunction>(
        ctx: &BuildContext<'_, K>,
        start: usize,
        size: usize,
        node_id: u64,
        level: usize,
    ) -> Result<Self> {
        if size <= ctx.min_size {
            return Self::compute_leaf(ctx, start, size, level);
        }

        // Left child takes the ceiling when size is odd.
        let left_size = (size + 1) / 2;
        let right_size = size - left_size;
        let right_start = start + left_size;

        let (left, right) = match ctx.parallel && size >= PARALLEL_THRESHOLD {
            true => rayon::join(
                || Self::compute(ctx, start, left_size, 2 * node_id, level + 1),
                || Self::compute(ctx, right_start, right_size, 2 * node_id + 1, level + 1),
            ),
            false => (
                Self::compute(ctx, start, left_size, 2 * node_id, level + 1),
                Self::compute(ctx, right_start, right_size, 2 * node_id + 1, level + 1),
            ),
        };
        let (left, right) = (left?, right?);

        let mut rng = ctx.random.stream(node_id);
        let factors = ctx.approximator.approximate(
            ctx.store,
            start..right_start,
            right_start..start + size,
            &mut rng,
        )?;

        tracing::trace!(
            level,
            start,
            size,
            rank = factors.rank(),
            "compressed off-diagonal block"
        );
        if let Some(hook) = ctx.on_compressed {
            hook(CompressedBlock {
                level,
                start,
                size,
                rank: factors.rank(),
            });
        }

        let correction = match factors.rank() {
            0 => None,
            _ => Some(WoodburyCorrection::new(
                &left,
                &right,
                factors,
                start,
                ctx.parallel,
            )?),
        };

        let log_det = left.log_det
            + right.log_det
            + correction
                .as_ref()
                .map_or(0.0, |c| c.m_factor.log_determinant());

        Ok(Self {
            start,
            size,
            level,
            kind: NodeKind::Internal {
                children: Box::new([left, right]),
                correction,
            },
            log_det,
        })
    }

    fn compute_leaf<K: KernelFunction>(
        ctx: &BuildContext<'_, K>,
        start: usize,
        size: usize,
        level: usize,
    ) -> Result<Self> {
        let mut block = ctx.store.block(start..start + size, start..start + size)?;
        for i in 0..size {
            block[(i, i)] += ctx.noise[start + i];
        }

        let factor = DenseCholesky::try_new(block.as_ref(), start)?;
        let log_det = factor.log_determinant();

        tracing::trace!(level, start, size, log_det, "factorised leaf");

        Ok(Self {
            start,
            size,
            level,
            kind: NodeKind::Leaf(factor),
            log_det,
        })
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn log_determinant(&self) -> f64 {
        self.log_det
    }

    /// Overwrites `x` (with `size` rows) by `K^-1 x`.
    pub(crate) fn apply_inverse(&self, x: MatMut<f64>, parallel: bool) {
        match &self.kind {
            NodeKind::Leaf(factor) => factor.solve_in_place(x),
            NodeKind::Internal {
                children,
                correction,
            } => {
                let [left, right] = &**children;
                let mut x = x;

                // y = D^-1 x
                {
                    let (top, bottom) = x.rb_mut().split_at_row_mut(left.size);
                    match parallel && self.size >= PARALLEL_THRESHOLD {
                        true => {
                            rayon::join(
                                || left.apply_inverse(top, parallel),
                                || right.apply_inverse(bottom, parallel),
                            );
                        }
                        false => {
                            left.apply_inverse(top, parallel);
                            right.apply_inverse(bottom, parallel);
                        }
                    }
                }

                if let Some(correction) = correction {
                    correction.apply(x, left.size);
                }
            }
        }
    }

    /// Appends a summary of every node, in pre-order, to `out`.
    pub(crate) fn collect_summaries(&self, out: &mut Vec<NodeSummary>) {
        match &self.kind {
            NodeKind::Leaf(_) => out.push(NodeSummary {
                level: self.level,
                start: self.start,
                size: self.size,
                rank: None,
                log_det: self.log_det,
            }),
            NodeKind::Internal {
                children,
                correction,
            } => {
                out.push(NodeSummary {
                    level: self.level,
                    start: self.start,
                    size: self.size,
                    rank: Some(correction.as_ref().map_or(0, |c| c.u.ncols())),
                    log_det: correction
                        .as_ref()
                        .map_or(0.0, |c| c.m_factor.log_determinant()),
                });
                for child in children.iter() {
                    child.collect_summaries(out);
                }
            }
        }
    }
}

impl WoodburyCorrection {
    fn new(
        left: &HierarchyNode,
        right: &HierarchyNode,
        factors: LowRankFactors,
        start: usize,
        parallel: bool,
    ) -> Result<Self> {
        let LowRankFactors { u, v } = factors;
        let rank = u.ncols();
        let not_positive_definite = |_: SolverError| SolverError::CorrectionNotPositiveDefinite {
            start,
            size: left.size + right.size,
            rank,
        };

        let mut a_inv_u = u.clone();
        let mut b_inv_v = v.clone();
        match parallel && left.size + right.size >= PARALLEL_THRESHOLD {
            true => {
                rayon::join(
                    || left.apply_inverse(a_inv_u.as_mut(), parallel),
                    || right.apply_inverse(b_inv_v.as_mut(), parallel),
                );
            }
            false => {
                left.apply_inverse(a_inv_u.as_mut(), parallel);
                right.apply_inverse(b_inv_v.as_mut(), parallel);
            }
        }

        // P = U^T A^-1 U
        let p = symmetrise((u.transpose() * &a_inv_u).as_ref());
        let p_factor = DenseCholesky::try_new(p.as_ref(), start).map_err(not_positive_definite)?;

        // M = I - Lp^T Q Lp, Q = V^T B^-1 V
        let q = v.transpose() * &b_inv_v;
        let lp = p_factor.factor();
        let lq = lp.transpose() * &q;
        let lql = lq.as_ref() * lp;

        let mut m = Mat::<f64>::identity(rank, rank);
        m -= symmetrise(lql.as_ref());
        let m_factor = DenseCholesky::try_new(m.as_ref(), start).map_err(not_positive_definite)?;

        Ok(Self {
            u,
            v,
            a_inv_u,
            b_inv_v,
            p_factor,
            m_factor,
        })
    }

    /// Applies the Woodbury update to `y = D^-1 x` in place, where the first
    /// `split` rows belong to the first child.
    ///
    /// Solving `S [a; b] = [f; g]` with `f = U^T y1`, `g = V^T y2`:
    /// `s = Lp M^-1 Lp^T (g - P^-1 f)`, `b = -s`, `a = P^-1 (f + s)`.
    fn apply(&self, x: MatMut<f64>, split: usize) {
        let par = faer::get_global_parallelism();
        let (mut y1, mut y2) = x.split_at_row_mut(split);

        let f = self.u.transpose() * y1.rb();
        let g = self.v.transpose() * y2.rb();

        let lp = self.p_factor.factor();

        let p_inv_f = self.p_factor.solve(f.as_ref());
        let t = &g - &p_inv_f;
        let mut s = lp.transpose() * &t;
        self.m_factor.solve_in_place(s.as_mut());
        let s = lp * &s;

        let a = self.p_factor.solve((&f + &s).as_ref());

        // y1 -= A^-1 U a
        matmul::matmul(
            y1.rb_mut(),
            Accum::Add,
            self.a_inv_u.as_ref(),
            a.as_ref(),
            -1.0,
            par,
        );

        // y2 -= B^-1 V b = y2 + B^-1 V s
        matmul::matmul(
            y2.rb_mut(),
            Accum::Add,
            self.b_inv_v.as_ref(),
            s.as_ref(),
            1.0,
            par,
        );
    }
}
