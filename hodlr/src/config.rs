/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares configuration types for the HODLR solver.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Declares configuration types for the HODLR solver.
use crate::progress::ProgressSink;
use hodlr_core::TreeConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters controlling construction of the **HODLR tree**.
///
/// The solver recursively bisects the input points into a binary tree. Ranges
/// no larger than `min_size` are factorised densely, and the block coupling the
/// two halves of every larger range is compressed to low rank with a relative
/// tolerance of `tol`.
///
/// ### Intended Usage
/// Points should be ordered so that nearby indices are nearby in space (for
/// example sorted along the longest axis), otherwise off-diagonal blocks are not
/// low rank and the factorisation degrades towards dense cost.
///
/// A smaller `tol` gives a more accurate solve and log-determinant at the cost
/// of higher ranks. The compression error must stay well below the diagonal
/// noise or the Woodbury corrections lose positive definiteness, which is why
/// the default is `1e-8`.
///
/// ### Default Values
/// - `min_size`: `100`
/// - `tol`: `1e-8`
/// - `seed`: `0`
/// - `max_rank`: `None`
/// - `parallel`: `true`
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SolverParams {
    /// Maximum number of points in a dense leaf. Values below 1 are treated as 1.
    pub min_size: usize,

    /// Relative tolerance for the low-rank compression of off-diagonal blocks.
    pub tol: f64,

    /// Seed for the random pivots used during compression. Identical inputs and
    /// seed always give identical results.
    pub seed: u64,

    /// Optional hard cap on the off-diagonal rank. Reaching it without meeting
    /// `tol` fails the computation.
    pub max_rank: Option<usize>,

    /// Build and apply sibling subtrees concurrently.
    pub parallel: bool,

    /// Optional callback for reporting progress.
    ///
    /// Skipped during serialization.
    #[serde(skip, default)]
    pub progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            min_size: 100,
            tol: 1e-8,
            seed: 0,
            max_rank: None,
            parallel: true,
            progress_callback: None,
        }
    }
}

impl SolverParams {
    /// Begins building a [`SolverParams`] instance from the defaults.
    pub fn builder() -> SolverParamsBuilder {
        SolverParamsBuilder {
            params: SolverParams::default(),
        }
    }

    /// The part of the parameters consumed by the factorisation itself.
    pub fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            min_size: self.min_size,
            tol: self.tol,
            seed: self.seed,
            max_rank: self.max_rank,
            parallel: self.parallel,
        }
    }
}

impl From<&SolverParams> for TreeConfig {
    fn from(params: &SolverParams) -> Self {
        params.tree_config()
    }
}

/// Builder for [`SolverParams`].
#[derive(Clone, Debug)]
pub struct SolverParamsBuilder {
    params: SolverParams,
}

impl SolverParamsBuilder {
    /// Sets the maximum dense leaf size.
    pub fn min_size(mut self, v: usize) -> Self {
        self.params.min_size = v;
        self
    }

    /// Sets the relative compression tolerance.
    pub fn tol(mut self, v: f64) -> Self {
        self.params.tol = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.params.seed = v;
        self
    }

    /// Caps the off-diagonal rank.
    pub fn max_rank(mut self, v: usize) -> Self {
        self.params.max_rank = Some(v);
        self
    }

    /// Enables or disables parallel tree traversal.
    pub fn parallel(mut self, v: bool) -> Self {
        self.params.parallel = v;
        self
    }

    /// Attaches a progress sink.
    pub fn progress_callback(mut self, v: Arc<dyn ProgressSink>) -> Self {
        self.params.progress_callback = Some(v);
        self
    }

    /// Finalises the builder into a [`SolverParams`] value.
    pub fn build(self) -> SolverParams {
        self.params
    }
}
