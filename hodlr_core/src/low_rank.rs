/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements randomised adaptive cross approximation of off-diagonal covariance blocks.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # low_rank
//!
//! Compresses the coupling block `C[i, j] = k(x[R1[i]], x[R2[j]])` between two
//! disjoint index ranges into `C ≈ U V^T`, sampling only the rows and columns
//! that the approximation actually visits.
//!
//! The first pivot row, and every restart after a residual row vanishes, are
//! drawn from the node's random stream. The cross factors are then recompressed
//! with QR + SVD so that `U` has orthonormal columns.
//!
//! # References
//! 1. Bebendorf, M. (2000). Approximation of boundary element matrices.
//!    *Numerische Mathematik*, **86**(4), 565–589.
//! 2. Ambikasaran, S., Foreman-Mackey, D., Greengard, L., Hogg, D. W., & O'Neil, M. (2016).
//!    Fast direct methods for Gaussian processes. *IEEE TPAMI*, **38**(2), 252–265.

use crate::{
    coordinates::CoordinateStore,
    error::{Result, SolverError},
    random::NodeStream,
    traits::KernelFunction,
};
use faer::{Mat, RowRef};
use std::ops::Range;

/// Blocks whose smaller side is at most this size are formed densely
/// instead of being sampled.
pub const EXACT_BLOCK_SIZE: usize = 8;

/// Cross factors are recompressed at this fraction of `tol`, so the
/// truncation does not add an error comparable to the one ACA stopped at.
const RECOMPRESSION_FACTOR: f64 = 0.1;

/// Low-rank factors `(U, V)` with `C ≈ U V^T`.
///
/// `U` has orthonormal columns.
#[derive(Debug, Clone)]
pub struct LowRankFactors {
    pub u: Mat<f64>,
    pub v: Mat<f64>,
}

impl LowRankFactors {
    fn empty(num_rows: usize, num_columns: usize) -> Self {
        Self {
            u: Mat::zeros(num_rows, 0),
            v: Mat::zeros(num_columns, 0),
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.u.ncols()
    }
}

/// Adaptive low-rank compressor for off-diagonal kernel blocks.
#[derive(Debug, Clone, Copy)]
pub struct LowRankApproximator {
    /// Relative Frobenius-norm tolerance.
    tol: f64,

    /// Hard cap on the rank. `None` allows up to `min(m, k)`.
    max_rank: Option<usize>,
}

impl LowRankApproximator {
    pub fn new(tol: f64, max_rank: Option<usize>) -> Self {
        Self { tol, max_rank }
    }

    /// Approximates the block coupling `rows` to `cols`.
    ///
    /// # Errors
    /// - [`SolverError::ApproximationFailed`] if the rank cap is reached before the
    ///   residual estimate drops below `tol` times the running norm estimate.
    /// - [`SolverError::IndexOutOfRange`] if either range leaves the stored coordinates.
    pub fn approximate<K: KernelFunction>(
        &self,
        store: &CoordinateStore<K>,
        rows: Range<usize>,
        cols: Range<usize>,
        rng: &mut NodeStream,
    ) -> Result<LowRankFactors> {
        let num_rows = rows.len();
        let num_columns = cols.len();
        let full_rank = num_rows.min(num_columns);

        if full_rank == 0 {
            return Ok(LowRankFactors::empty(num_rows, num_columns));
        }

        let rank_cap = self
            .max_rank
            .map_or(full_rank, |cap| cap.clamp(1, full_rank));

        let failure = || SolverError::ApproximationFailed {
            row_start: rows.start,
            col_start: cols.start,
            rows: num_rows,
            cols: num_columns,
            rank_cap,
        };

        // Too small to be worth sampling: take the exact block and only drop
        // directions that are numerically zero.
        if full_rank <= EXACT_BLOCK_SIZE {
            let block = store.block(rows.clone(), cols.clone())?;
            let exact = match num_rows <= num_columns {
                true => recompress(
                    Mat::identity(num_rows, num_rows),
                    block.transpose().to_owned(),
                    f64::EPSILON,
                ),
                false => recompress(block, Mat::identity(num_columns, num_columns), f64::EPSILON),
            }
            .ok_or_else(failure)?;

            if exact.rank() <= rank_cap {
                return Ok(exact);
            }

            // Over the cap: fall back to the requested tolerance.
            let truncated = recompress(exact.u, exact.v, self.tol).ok_or_else(failure)?;
            if truncated.rank() > rank_cap {
                return Err(failure());
            }
            return Ok(truncated);
        }

        let (u, v, converged) = aca_partial_pivoting(store, &rows, &cols, rank_cap, self.tol, rng)?;

        if !converged && u.ncols() < full_rank {
            return Err(failure());
        }

        recompress(u, v, RECOMPRESSION_FACTOR * self.tol).ok_or_else(failure)
    }
}

/// Adaptive Cross Approximation (ACA) with partial pivoting and random restarts.
///
/// # Returns
/// Cross factors `(U, V)` with `C ≈ U V^T`, and whether the stopping criterion
///   `||u_k|| ||v_k|| <= tol ||S_k||_F`
/// was met before `rank_cap` terms were taken.
fn aca_partial_pivoting<K: KernelFunction>(
    store: &CoordinateStore<K>,
    rows: &Range<usize>,
    cols: &Range<usize>,
    rank_cap: usize,
    epsilon: f64,
    rng: &mut NodeStream,
) -> Result<(Mat<f64>, Mat<f64>, bool)> {
    let num_rows = rows.len();
    let num_columns = cols.len();

    let mut unused_rows = vec![true; num_rows];
    let mut unused_columns = vec![true; num_columns];

    // Relative tolerance on squared residual norm
    let tolerance = epsilon * epsilon;

    // U and V store the rank-1 updates: C ≈ ∑ u_k v_k^T
    let mut u = Mat::<f64>::zeros(num_rows, rank_cap);
    let mut v = Mat::<f64>::zeros(num_columns, rank_cap);

    // Running estimate of ||S_k||_F^2
    let mut norm_sq = 0.0f64;

    let mut converged = false;
    let mut k = 0usize;
    let mut i = rng.index(num_rows);

    while k < rank_cap {
        // Residual of row i across all columns
        let row = rows.start + i;
        let mut v_row = store.block(row..row + 1, cols.clone())?;
        if k > 0 {
            v_row -= u.submatrix(i, 0, 1, k) * v.submatrix(0, 0, num_columns, k).transpose();
        }
        unused_rows[i] = false;

        let threshold = f64::EPSILON * norm_sq.sqrt();
        let pivot_column = argmax_masked(&v_row.row(0), &unused_columns)
            .filter(|&j| v_row[(0, j)].abs() > threshold);

        let j = match pivot_column {
            Some(j) => j,
            // The residual row vanished: restart from a random unused row.
            None => match rng.choose_unused(&unused_rows) {
                Some(next) => {
                    i = next;
                    continue;
                }
                None => {
                    converged = true;
                    break;
                }
            },
        };

        // Normalise v_k so v_k[j] = 1
        let pivot = 1.0 / v_row[(0, j)];
        v_row *= pivot;

        // Residual of column j across all rows
        let column = cols.start + j;
        let mut u_column = store.block(rows.clone(), column..column + 1)?;
        if k > 0 {
            u_column -=
                (v.submatrix(j, 0, 1, k) * u.submatrix(0, 0, num_rows, k).transpose()).transpose();
        }
        unused_columns[j] = false;

        // Cross terms: sum_{l<k} <u_l, u_k> <v_l, v_k>
        let cross = match k {
            0 => 0.0,
            _ => {
                let part1 = u.subcols(0, k).transpose() * &u_column;
                let part2 = v.subcols(0, k).transpose() * v_row.transpose();
                let part3 = part1.transpose() * &part2;
                part3[(0, 0)]
            }
        };

        let norm_u_v_2 = (u_column.col(0).transpose() * u_column.col(0))
            * (v_row.row(0) * v_row.row(0).transpose());

        norm_sq += norm_u_v_2 + 2.0 * cross;

        u.col_mut(k).copy_from(&u_column.col(0));
        v.col_mut(k).copy_from(&v_row.row(0).transpose());
        k += 1;

        if norm_u_v_2 <= tolerance * norm_sq {
            converged = true;
            break;
        }

        // Next pivot row: largest residual in column j among unused rows
        i = match argmax_masked(&u_column.col(0).transpose(), &unused_rows)
            .filter(|&r| u_column[(r, 0)] != 0.0)
        {
            Some(next) => next,
            None => match rng.choose_unused(&unused_rows) {
                Some(next) => next,
                None => {
                    converged = true;
                    break;
                }
            },
        };
    }

    Ok((u.subcols(0, k).to_owned(), v.subcols(0, k).to_owned(), converged))
}

/// Index of the largest absolute value among the entries still marked unused.
fn argmax_masked(data: &RowRef<f64>, mask: &[bool]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (idx, &value) in data.iter().enumerate() {
        if !mask[idx] {
            continue;
        }
        let magnitude = value.abs();
        if best.map_or(true, |(_, max_value)| magnitude > max_value) {
            best = Some((idx, magnitude));
        }
    }

    best.map(|(idx, _)| idx)
}

/// Recompress cross factors using QR + SVD.
///
/// Returns `(U, V)` with `U = Q_u U_r` orthonormal and `V = Q_v V_r diag(sigma)`,
/// truncated to the smallest rank whose discarded singular values carry at most
/// `epsilon` of the total Frobenius norm. `None` if the SVD fails to converge.
fn recompress(u_aca: Mat<f64>, v_aca: Mat<f64>, epsilon: f64) -> Option<LowRankFactors> {
    let num_rows = u_aca.nrows();
    let num_columns = v_aca.nrows();

    if u_aca.ncols() == 0 {
        return Some(LowRankFactors::empty(num_rows, num_columns));
    }

    let u_qr = u_aca.qr();
    let qu = u_qr.compute_thin_Q();
    let ru = u_qr.thin_R();

    let v_qr = v_aca.qr();
    let qv = v_qr.compute_thin_Q();
    let rv = v_qr.thin_R();

    let ur_vrt = &ru * &rv.transpose();

    let svd = ur_vrt.svd().ok()?;
    let sr = svd.S().column_vector();

    let sigma: Vec<f64> = sr.iter().cloned().collect();
    let new_rank = calculate_singular_values_cutoff(&sigma, epsilon);

    if new_rank == 0 {
        return Some(LowRankFactors::empty(num_rows, num_columns));
    }

    let u = qu.as_ref() * svd.U().subcols(0, new_rank);
    let vr = svd.V().subcols(0, new_rank) * sr.subrows(0, new_rank).as_diagonal();
    let v = qv.as_ref() * vr.as_ref();

    Some(LowRankFactors { u, v })
}

/// Determine the cutoff rank for a truncated SVD using the cumulative sum of squares.
///
/// Returns the minimum rank `r` such that the residual Frobenius norm is
/// at most `epsilon` times the total norm. A zero spectrum has rank 0.
pub fn calculate_singular_values_cutoff(sigma: &[f64], epsilon: f64) -> usize {
    let cumulative_sum_sqr = inverse_cumulative_sum_of_squares(sigma);

    let total = match cumulative_sum_sqr.first() {
        Some(&total) if total > 0.0 => total,
        _ => return 0,
    };

    let threshold = total * epsilon * epsilon;

    cumulative_sum_sqr
        .iter()
        .position(|&x| x <= threshold)
        .unwrap_or(cumulative_sum_sqr.len())
}

/// result[i] = sum_{j=i}^{n-1} sigma[j]^2
fn inverse_cumulative_sum_of_squares(sigma: &[f64]) -> Vec<f64> {
    let cumulative_sum_squared: Vec<f64> = sigma
        .iter()
        .rev()
        .scan(0.0, |acc, &x| {
            *acc += x * x;
            Some(*acc)
        })
        .collect();

    cumulative_sum_squared.into_iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{RandomSource, ROOT_NODE_ID};
    use equator::assert;

    struct SquaredExponential {
        length_scale: f64,
    }

    impl KernelFunction for SquaredExponential {
        fn dimension(&self) -> usize {
            1
        }

        fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
            let r = a[0] - b[0];
            (-0.5 * r * r / (self.length_scale * self.length_scale)).exp()
        }
    }

    /// Off-diagonal entries look like noise, so blocks are effectively full rank.
    struct HashKernel;

    impl KernelFunction for HashKernel {
        fn dimension(&self) -> usize {
            1
        }

        fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
            ((a[0] * 12.9898 + b[0] * 78.233).sin() * 43758.5453).fract()
        }
    }

    struct ZeroKernel;

    impl KernelFunction for ZeroKernel {
        fn dimension(&self) -> usize {
            1
        }

        fn evaluate(&self, _: RowRef<f64>, _: RowRef<f64>) -> f64 {
            0.0
        }
    }

    fn line_store<K: KernelFunction>(kernel: K, n: usize) -> CoordinateStore<K> {
        let mut store = CoordinateStore::new(kernel);
        store
            .set_coordinates(Mat::from_fn(n, 1, |i, _| i as f64 / n as f64))
            .unwrap();
        store
    }

    fn relative_error<K: KernelFunction>(
        store: &CoordinateStore<K>,
        rows: Range<usize>,
        cols: Range<usize>,
        factors: &LowRankFactors,
    ) -> f64 {
        let exact = store.block(rows, cols).unwrap();
        let approx = &factors.u * factors.v.transpose();
        (&exact - &approx).norm_l2() / exact.norm_l2()
    }

    #[test]
    fn smooth_block_is_low_rank() {
        let store = line_store(SquaredExponential { length_scale: 0.3 }, 200);
        let approximator = LowRankApproximator::new(1e-8, None);
        let mut rng = RandomSource::new(0).stream(ROOT_NODE_ID);

        let factors = approximator.approximate(&store, 0..100, 100..200, &mut rng).unwrap();

        assert!(factors.rank() > 0);
        assert!(factors.rank() < 30);
        assert!(relative_error(&store, 0..100, 100..200, &factors) < 1e-6);
    }

    #[test]
    fn left_factor_is_orthonormal() {
        let store = line_store(SquaredExponential { length_scale: 0.2 }, 120);
        let approximator = LowRankApproximator::new(1e-10, None);
        let mut rng = RandomSource::new(4).stream(ROOT_NODE_ID);

        let factors = approximator.approximate(&store, 0..60, 60..120, &mut rng).unwrap();
        let gram = factors.u.transpose() * &factors.u;
        let identity = Mat::<f64>::identity(factors.rank(), factors.rank());

        assert!((&gram - &identity).norm_l2() < 1e-10);
    }

    #[test]
    fn small_blocks_are_exact() {
        let store = line_store(HashKernel, 20);
        let approximator = LowRankApproximator::new(0.5, None);
        let mut rng = RandomSource::new(1).stream(ROOT_NODE_ID);

        let factors = approximator.approximate(&store, 0..3, 3..20, &mut rng).unwrap();

        assert!(factors.rank() <= 3);
        assert!(relative_error(&store, 0..3, 3..20, &factors) < 1e-12);
    }

    #[test]
    fn small_block_over_rank_cap_is_truncated_to_tolerance() {
        // Spacing 0.1 with unit length scale: the 8x8 coupling block has full
        // numerical rank but a rank-2 truncation error of about 1e-3.
        let mut store = CoordinateStore::new(SquaredExponential { length_scale: 1.0 });
        store
            .set_coordinates(Mat::from_fn(16, 1, |i, _| 0.1 * i as f64))
            .unwrap();
        let approximator = LowRankApproximator::new(0.1, Some(2));
        let mut rng = RandomSource::new(0).stream(ROOT_NODE_ID);

        let factors = approximator.approximate(&store, 0..8, 8..16, &mut rng).unwrap();

        assert!(factors.rank() <= 2);
        assert!(relative_error(&store, 0..8, 8..16, &factors) < 0.1);
    }

    #[test]
    fn small_block_over_rank_cap_fails_at_tight_tolerance() {
        let store = line_store(HashKernel, 16);
        let approximator = LowRankApproximator::new(1e-3, Some(2));
        let mut rng = RandomSource::new(0).stream(ROOT_NODE_ID);

        let err = approximator.approximate(&store, 0..8, 8..16, &mut rng).unwrap_err();

        assert_eq!(
            err,
            SolverError::ApproximationFailed {
                row_start: 0,
                col_start: 8,
                rows: 8,
                cols: 8,
                rank_cap: 2,
            }
        );
    }

    #[test]
    fn zero_block_has_rank_zero() {
        let store = line_store(ZeroKernel, 64);
        let approximator = LowRankApproximator::new(1e-6, None);
        let mut rng = RandomSource::new(2).stream(ROOT_NODE_ID);

        let factors = approximator.approximate(&store, 0..32, 32..64, &mut rng).unwrap();

        assert!(factors.rank() == 0);
        assert!(factors.u.nrows() == 32);
        assert!(factors.v.nrows() == 32);
    }

    #[test]
    fn rank_cap_reports_failure() {
        let store = line_store(HashKernel, 40);
        let approximator = LowRankApproximator::new(1e-10, Some(3));
        let mut rng = RandomSource::new(3).stream(ROOT_NODE_ID);

        let err = approximator.approximate(&store, 0..20, 20..40, &mut rng).unwrap_err();

        assert_eq!(
            err,
            SolverError::ApproximationFailed {
                row_start: 0,
                col_start: 20,
                rows: 20,
                cols: 20,
                rank_cap: 3,
            }
        );
    }

    #[test]
    fn same_stream_gives_identical_factors() {
        let store = line_store(SquaredExponential { length_scale: 0.25 }, 150);
        let approximator = LowRankApproximator::new(1e-6, None);
        let source = RandomSource::new(9);

        let a = approximator
            .approximate(&store, 0..75, 75..150, &mut source.stream(6))
            .unwrap();
        let b = approximator
            .approximate(&store, 0..75, 75..150, &mut source.stream(6))
            .unwrap();

        assert!(a.u == b.u);
        assert!(a.v == b.v);
    }

    #[test]
    fn cutoff_drops_small_tail() {
        let sigma = [10.0, 1.0, 1e-6, 1e-9];
        assert!(calculate_singular_values_cutoff(&sigma, 1e-3) == 2);
        assert!(calculate_singular_values_cutoff(&sigma, 1e-12) == 4);
        assert!(calculate_singular_values_cutoff(&[0.0, 0.0], 1e-3) == 0);
        assert!(calculate_singular_values_cutoff(&[], 1e-3) == 0);
    }
}
