/////////////////////////////////////////////////////////////////////////////////////////////
//
// Adds dense Cholesky factorisation, solve and log-determinant helpers for tree nodes.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # linalg
//!
//! Dense helpers used by the leaves of the HODLR tree and by the small
//! Woodbury correction matrices at internal nodes.

use crate::error::{Result, SolverError};
use faer::{
    dyn_stack::{MemBuffer, MemStack},
    linalg::{cholesky::llt, triangular_solve},
    prelude::*,
    Mat, MatMut, MatRef,
};

/// Lower Cholesky factor `L` of a symmetric positive definite block, `A = L L^T`.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct DenseCholesky {
    L: Mat<f64>,
}

#[allow(non_snake_case)]
impl DenseCholesky {
    /// Factorises the lower triangle of `A`.
    ///
    /// `start` is the global row offset of the block and is only used to
    /// report where a non-positive pivot was met.
    pub fn try_new(A: MatRef<f64>, start: usize) -> Result<Self> {
        let n = A.nrows();
        assert!(A.ncols() == n);

        let par = faer::get_global_parallelism();

        let mut L = Mat::<f64>::zeros(n, n);
        L.copy_from_triangular_lower(A);

        if n > 0 {
            let mut memory = MemBuffer::new(llt::factor::cholesky_in_place_scratch::<f64>(
                n,
                par,
                default(),
            ));
            let stack = MemStack::new(&mut memory);

            llt::factor::cholesky_in_place(L.rb_mut(), default(), par, stack, default())
                .map_err(|_| SolverError::NonPositiveDefinite { start, size: n })?;

            // The factorisation leaves the input in the strict upper triangle.
            for j in 1..n {
                for i in 0..j {
                    L[(i, j)] = 0.0;
                }
            }
        }

        Ok(Self { L })
    }

    /// Size of the factorised block.
    #[inline]
    pub fn dim(&self) -> usize {
        self.L.nrows()
    }

    /// The lower-triangular factor.
    #[inline]
    pub fn factor(&self) -> MatRef<'_, f64> {
        self.L.as_ref()
    }

    /// `log det A = 2 * sum(log L_ii)`.
    pub fn log_determinant(&self) -> f64 {
        2.0 * (0..self.dim()).map(|i| self.L[(i, i)].ln()).sum::<f64>()
    }

    /// Overwrites `rhs` with `A^-1 rhs`.
    pub fn solve_in_place(&self, mut rhs: MatMut<f64>) {
        if self.dim() == 0 {
            return;
        }
        let par = faer::get_global_parallelism();

        // Forward substitution: L Y = B
        triangular_solve::solve_lower_triangular_in_place(self.L.as_ref(), rhs.rb_mut(), par);

        // Backward substitution: L^T X = Y
        triangular_solve::solve_upper_triangular_in_place(
            self.L.as_ref().transpose(),
            rhs.rb_mut(),
            par,
        );
    }

    /// Returns `A^-1 rhs`.
    pub fn solve(&self, rhs: MatRef<f64>) -> Mat<f64> {
        let mut x = rhs.to_owned();
        self.solve_in_place(x.as_mut());
        x
    }
}

/// Returns `(A + A^T) / 2`, removing round-off asymmetry before factorisation.
pub(crate) fn symmetrise(a: MatRef<f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| 0.5 * (a[(i, j)] + a[(j, i)]))
}
