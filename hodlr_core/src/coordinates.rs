/////////////////////////////////////////////////////////////////////////////////////////////
//
// Stores input coordinates and exposes pairwise covariance lookups through the kernel.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    error::{Result, SolverError},
    traits::KernelFunction,
};
use faer::Mat;
use std::ops::Range;

/// Input coordinates paired with the kernel used to evaluate their covariance.
///
/// Coordinates are replaced wholesale by [`CoordinateStore::set_coordinates`].
/// Individual covariance entries are never cached.
#[derive(Debug)]
pub struct CoordinateStore<K: KernelFunction> {
    kernel: K,
    points: Mat<f64>,
}

impl<K: KernelFunction> CoordinateStore<K> {
    /// Creates an empty store for the given kernel.
    pub fn new(kernel: K) -> Self {
        let dim = kernel.dimension();
        Self {
            kernel,
            points: Mat::zeros(0, dim),
        }
    }

    /// Replaces the stored coordinates.
    ///
    /// Fails with [`SolverError::DimensionMismatch`] if the number of columns
    /// differs from the kernel dimension, in which case the previous
    /// coordinates are kept.
    pub fn set_coordinates(&mut self, points: Mat<f64>) -> Result<()> {
        let expected = self.kernel.dimension();
        if points.ncols() != expected {
            return Err(SolverError::DimensionMismatch {
                context: "input coordinates",
                expected,
                found: points.ncols(),
            });
        }
        self.points = points;
        Ok(())
    }

    /// Number of stored points.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    /// Kernel dimension.
    #[inline(always)]
    pub fn dimension(&self) -> usize {
        self.kernel.dimension()
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Covariance between stored rows `i` and `j`.
    #[inline(always)]
    pub fn covariance(&self, i: usize, j: usize) -> Result<f64> {
        let size = self.points.nrows();
        if i >= size || j >= size {
            return Err(SolverError::IndexOutOfRange { row: i, col: j, size });
        }
        Ok(self.kernel.evaluate(self.points.row(i), self.points.row(j)))
    }

    /// Dense covariance block between two index ranges.
    pub fn block(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Mat<f64>> {
        let size = self.points.nrows();
        if rows.end > size || cols.end > size {
            return Err(SolverError::IndexOutOfRange {
                row: rows.end.saturating_sub(1),
                col: cols.end.saturating_sub(1),
                size,
            });
        }

        Ok(Mat::from_fn(rows.len(), cols.len(), |i, j| {
            self.kernel.evaluate(
                self.points.row(rows.start + i),
                self.points.row(cols.start + j),
            )
        }))
    }
}
