/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API and high-level documentation for fast Gaussian-process solves.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Fast Gaussian-process solves
//!
//! `hodlr` evaluates the two expensive pieces of a Gaussian-process likelihood,
//! `y^T K^-1 y` and `log det K`, for covariance matrices of tens or hundreds of
//! thousands of points.
//!
//! The covariance matrix is never formed. Instead [`hodlr_core`] builds a
//! Hierarchical Off-Diagonal Low-Rank factorisation: the points are bisected
//! recursively, dense blocks are only formed at the leaves, and every
//! off-diagonal block is compressed to low rank. This works best when points
//! that are close in index are close in space, so sort one-dimensional inputs
//! (or order higher-dimensional inputs along a space-filling curve) first.
//!
//! # Features:
//! - Kernels described by a serialisable [`hodlr_kernels::KernelSpec`]
//! - Solves with multiple right-hand sides, in place or copying
//! - Deterministic results for a given seed
//! - Progress reporting through [`progress::closure_sink`]
//! - Persisting the solver configuration as versioned JSON
//!
//! # Example
//!
//! ```
//! use faer::Mat;
//! use hodlr::{HodlrSolver, SolverParams};
//! use hodlr_kernels::{KernelSpec, KernelType};
//!
//! let n = 2000;
//! let x = Mat::from_fn(n, 1, |i, _| 20.0 * i as f64 / n as f64);
//! let yerr = vec![0.05; n];
//! let y: Vec<f64> = (0..n).map(|i| (x[(i, 0)]).sin()).collect();
//!
//! let kernel = KernelSpec::builder(KernelType::SquaredExponential)
//!     .amplitude(1.0)
//!     .length_scale(2.0)
//!     .build()?;
//!
//! let params = SolverParams::builder().tol(1e-10).build();
//!
//! let mut solver = HodlrSolver::new(kernel, params)?;
//! solver.compute(x.as_ref(), &yerr)?;
//!
//! let log_likelihood = -0.5
//!     * (solver.dot_solve(&y)?
//!         + solver.log_determinant()?
//!         + n as f64 * (2.0 * std::f64::consts::PI).ln());
//!
//! println!("ln L = {log_likelihood}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # References
//!
//! 1. Ambikasaran, S., Foreman-Mackey, D., Greengard, L., Hogg, D. W., & O'Neil, M. (2016).
//!    *Fast direct methods for Gaussian processes.*
//!    *IEEE Transactions on Pattern Analysis and Machine Intelligence*, **38**(2), 252–265.

mod solver;

pub mod progress;

pub mod config;

pub use {
    config::{SolverParams, SolverParamsBuilder},
    solver::{HodlrError, HodlrResult, HodlrSolver, SolverState, StateIOError},
};
