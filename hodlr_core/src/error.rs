/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines the error kinds reported by the HODLR factorisation and solve routines.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use thiserror::Error;

/// Errors that can occur while building or applying a HODLR factorisation.
///
/// None of these are retried internally: repeating a failed call with the
/// same inputs fails identically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// Coordinate columns do not match the kernel dimension, or an input to
    /// `solve` has the wrong number of rows.
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    /// A covariance lookup referenced a row outside the stored coordinates.
    #[error("Index ({row}, {col}) is out of range for {size} input coordinates")]
    IndexOutOfRange { row: usize, col: usize, size: usize },

    /// The operation requires a prior successful `compute`.
    #[error("The solver has not been computed")]
    NotComputed,

    /// A Cholesky factorisation met a non-positive pivot.
    #[error("Matrix block of size {size} starting at row {start} is not numerically positive definite")]
    NonPositiveDefinite { start: usize, size: usize },

    /// The rank-sized correction of an internal node lost positive definiteness,
    /// usually because `tol` is too loose relative to the diagonal noise.
    #[error(
        "Rank {rank} correction of the node covering {size} rows from row {start} \
         is not numerically positive definite"
    )]
    CorrectionNotPositiveDefinite {
        start: usize,
        size: usize,
        rank: usize,
    },

    /// The low-rank compression reached its rank cap without meeting the tolerance.
    #[error(
        "Low-rank approximation of the {rows}x{cols} block starting at ({row_start}, {col_start}) \
         did not reach tolerance within rank {rank_cap}"
    )]
    ApproximationFailed {
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
        rank_cap: usize,
    },
}

/// Result type for HODLR operations.
pub type Result<T> = std::result::Result<T, SolverError>;
