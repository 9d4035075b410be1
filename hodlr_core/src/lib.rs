/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API for the HODLR factorisation crate.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Hierarchical Off-Diagonal Low-Rank (HODLR) factorisation
//!
//! This crate factorises dense, symmetric positive definite kernel matrices of the form
//! `K[i, j] = k(x_i, x_j) + delta_ij * noise_i`, as they arise in Gaussian-process
//! regression, in close to linear time.
//!
//! The index range is bisected recursively into a binary tree. At every internal node
//! the block coupling the two children is compressed to low rank with a randomised
//! adaptive cross approximation, and a small Woodbury correction is factorised on the
//! way back up. The resulting tree applies `K^-1` and yields `log det K`.
//!
//! # Features:
//! - Black-box kernels through the [`KernelFunction`] trait
//! - Reproducible results for a given seed, independent of thread count
//! - Parallel construction and solves over sibling subtrees
//! - Multiple right-hand sides
//!
//! # Example
//!
//! ```
//! use hodlr_core::{KernelFunction, SolverTree, TreeConfig};
//! use faer::{Mat, RowRef};
//!
//! pub struct SquaredExponential;
//!
//! impl KernelFunction for SquaredExponential {
//!     fn dimension(&self) -> usize {
//!         1
//!     }
//!
//!     fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
//!         let r = a[0] - b[0];
//!         (-0.5 * r * r).exp()
//!     }
//! }
//!
//! let n = 1000;
//! let x = Mat::from_fn(n, 1, |i, _| 10.0 * i as f64 / n as f64);
//! let noise = vec![0.1; n];
//!
//! let config = TreeConfig { min_size: 64, tol: 1e-8, ..TreeConfig::default() };
//! let mut solver = SolverTree::new(SquaredExponential, config);
//! solver.compute(x.as_ref(), &noise)?;
//!
//! let y = Mat::from_fn(n, 1, |i, _| (i as f64).sin());
//! let alpha = solver.solve(y.as_ref())?;
//! let log_det = solver.log_determinant()?;
//!
//! println!("log det = {log_det}, alpha[0] = {}", alpha[(0, 0)]);
//! # Ok::<(), hodlr_core::SolverError>(())
//! ```
//!
//! # References
//!
//! 1. Ambikasaran, S., Foreman-Mackey, D., Greengard, L., Hogg, D. W., & O'Neil, M. (2016).
//!    *Fast direct methods for Gaussian processes.*
//!    *IEEE Transactions on Pattern Analysis and Machine Intelligence*, **38**(2), 252–265.
//!
//! 2. Bebendorf, M. (2000).
//!    *Approximation of boundary element matrices.*
//!    *Numerische Mathematik*, **86**(4), 565–589.

mod coordinates;
mod error;
mod linalg;
mod low_rank;
mod node;
mod random;
mod traits;
mod tree;

#[doc(inline)]
pub use {
    coordinates::CoordinateStore,
    error::{Result, SolverError},
    linalg::DenseCholesky,
    low_rank::{LowRankApproximator, LowRankFactors, EXACT_BLOCK_SIZE},
    node::{CompressedBlock, CompressionHook, NodeSummary, PARALLEL_THRESHOLD},
    random::{NodeStream, RandomSource, ROOT_NODE_ID},
    traits::KernelFunction,
    tree::{SolverTree, TreeConfig},
};
