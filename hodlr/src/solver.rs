/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the user-facing HODLR solver with boundary validation and state persistence.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    config::SolverParams,
    progress::{ProgressMsg, ProgressSink},
};
use faer::{ColRef, Mat, MatRef};
use hodlr_core::{CompressedBlock, CompressionHook, KernelFunction, SolverError, SolverTree};
use hodlr_kernels::{KernelSpec, KernelSpecError};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use thiserror::Error;

/// Errors returned by [`HodlrSolver`].
#[derive(Debug, Error)]
pub enum HodlrError {
    /// Failure inside the factorisation or solve.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// The kernel specification is invalid.
    #[error(transparent)]
    Kernel(#[from] KernelSpecError),

    /// Saving or loading solver state failed.
    #[error(transparent)]
    StateIO(#[from] StateIOError),
}

pub type HodlrResult<T> = std::result::Result<T, HodlrError>;

/// Reconstructable state of a [`HodlrSolver`].
///
/// The factorised tree is never persisted. A solver rebuilt from this state is
/// uncomputed and must be given its inputs through [`HodlrSolver::compute`] again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverState {
    pub kernel: KernelSpec,
    pub min_size: usize,
    pub tol: f64,
    pub seed: u64,
}

/// Fast solves and log-determinants for Gaussian-process covariance matrices.
///
/// The covariance matrix is `K[i, j] = k(x_i, x_j) + delta_ij * yerr_i^2` where `k`
/// is described by a [`KernelSpec`].
///
/// ### Example
/// ```
/// use faer::Mat;
/// use hodlr::{HodlrSolver, SolverParams};
/// use hodlr_kernels::{KernelSpec, KernelType};
///
/// let kernel = KernelSpec::builder(KernelType::Matern32).length_scale(0.5).build()?;
/// let params = SolverParams::builder().min_size(50).tol(1e-8).build();
/// let mut solver = HodlrSolver::new(kernel, params)?;
///
/// let x = Mat::from_fn(500, 1, |i, _| i as f64 / 50.0);
/// let yerr = vec![0.1; 500];
/// solver.compute(x.as_ref(), &yerr)?;
///
/// let y: Vec<f64> = (0..500).map(|i| (i as f64 / 50.0).sin()).collect();
/// let log_likelihood = -0.5 * (solver.dot_solve(&y)? + solver.log_determinant()?);
/// # let _ = log_likelihood;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct HodlrSolver {
    kernel_spec: KernelSpec,
    params: SolverParams,
    tree: SolverTree<Box<dyn KernelFunction>>,
}

impl Debug for HodlrSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HodlrSolver")
            .field("kernel_spec", &self.kernel_spec)
            .field("params", &self.params)
            .field("computed", &self.tree.is_computed())
            .field("size", &self.tree.size())
            .finish()
    }
}

impl HodlrSolver {
    /// Creates an uncomputed solver for the given kernel.
    ///
    /// ### Errors
    /// - [`HodlrError::Kernel`] if the kernel specification is invalid.
    pub fn new(kernel_spec: KernelSpec, params: SolverParams) -> HodlrResult<Self> {
        let kernel = kernel_spec.kernel()?;
        let tree = SolverTree::new(kernel, params.tree_config());
        Ok(Self {
            kernel_spec,
            params,
            tree,
        })
    }

    pub fn kernel_spec(&self) -> &KernelSpec {
        &self.kernel_spec
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Attaches or replaces the progress sink.
    pub fn set_progress_callback(&mut self, progress_callback: Option<Arc<dyn ProgressSink>>) {
        self.params.progress_callback = progress_callback;
    }

    fn emit(&self, msg: ProgressMsg) {
        if let Some(sink) = &self.params.progress_callback {
            sink.emit(msg);
        }
    }

    /// Factorises the covariance matrix of the points `x` (one point per row)
    /// with `yerr^2` added to the diagonal.
    ///
    /// Any previous factorisation is discarded first. On failure the solver is
    /// left uncomputed.
    ///
    /// ### Errors
    /// - [`SolverError::DimensionMismatch`] if `yerr` and `x` disagree on the
    ///   number of points, or `x` has the wrong number of columns for the kernel.
    /// - [`SolverError::NonPositiveDefinite`] if the matrix is not numerically
    ///   positive definite.
    /// - [`SolverError::CorrectionNotPositiveDefinite`] if `tol` is too loose for
    ///   the noise level.
    /// - [`SolverError::ApproximationFailed`] if `max_rank` was set too low.
    pub fn compute(&mut self, x: MatRef<f64>, yerr: &[f64]) -> HodlrResult<()> {
        if yerr.len() != x.nrows() {
            // Drop any previous factorisation so a failed call never leaves stale state.
            self.tree.set_config(self.params.tree_config());
            return Err(SolverError::DimensionMismatch {
                context: "yerr",
                expected: x.nrows(),
                found: yerr.len(),
            }
            .into());
        }

        let noise: Vec<f64> = yerr.iter().map(|e| e * e).collect();

        self.emit(ProgressMsg::Message {
            message: format!("Building HODLR tree over {} points", x.nrows()),
        });

        let start = Instant::now();
        self.tree.set_config(self.params.tree_config());
        self.tree
            .set_compression_hook(self.params.progress_callback.clone().map(|sink| {
                let hook: Arc<CompressionHook> = Arc::new(move |block: CompressedBlock| {
                    sink.emit(ProgressMsg::NodeCompressed {
                        level: block.level,
                        rank: block.rank,
                    })
                });
                hook
            }));
        self.tree.compute(x, &noise)?;

        let log_det = self.tree.log_determinant()?;
        tracing::debug!(
            size = x.nrows(),
            log_det,
            elapsed = ?start.elapsed(),
            "hodlr solver computed"
        );

        if self.params.progress_callback.is_some() {
            self.report_tree()?;
            self.emit(ProgressMsg::Computed { log_det });
        }

        Ok(())
    }

    fn report_tree(&self) -> HodlrResult<()> {
        let summaries = self.tree.node_summaries()?;

        let num_leaves = summaries.iter().filter(|s| s.rank.is_none()).count();
        let depth = summaries.iter().map(|s| s.level).max().unwrap_or(0);
        self.emit(ProgressMsg::TreeBuilt {
            num_leaves,
            num_internal: summaries.len() - num_leaves,
            depth,
        });
        Ok(())
    }

    /// Whether a successful [`HodlrSolver::compute`] has happened.
    pub fn computed(&self) -> bool {
        self.tree.is_computed()
    }

    /// Number of points in the current factorisation, 0 if not computed.
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    /// `log det K`.
    pub fn log_determinant(&self) -> HodlrResult<f64> {
        Ok(self.tree.log_determinant()?)
    }

    /// Overwrites `y` with `K^-1 y`. `y` may hold several right-hand sides.
    pub fn apply_inverse(&self, y: &mut Mat<f64>) -> HodlrResult<()> {
        Ok(self.tree.solve_in_place(y.as_mut())?)
    }

    /// Returns `K^-1 y`, leaving `y` untouched.
    pub fn apply_inverse_copy(&self, y: MatRef<f64>) -> HodlrResult<Mat<f64>> {
        Ok(self.tree.solve(y)?)
    }

    /// Returns `y^T K^-1 y`.
    pub fn dot_solve(&self, y: &[f64]) -> HodlrResult<f64> {
        Ok(self.tree.dot_solve(ColRef::from_slice(y))?)
    }

    /// Returns the dense `K^-1`.
    pub fn get_inverse(&self) -> HodlrResult<Mat<f64>> {
        Ok(self.tree.inverse()?)
    }

    /// Reconstructable state of this solver.
    pub fn serialize(&self) -> SolverState {
        SolverState {
            kernel: self.kernel_spec,
            min_size: self.params.min_size,
            tol: self.params.tol,
            seed: self.params.seed,
        }
    }

    /// Rebuilds an uncomputed solver from `state`, taking the remaining
    /// parameters from their defaults.
    pub fn deserialize(state: SolverState) -> HodlrResult<Self> {
        let params = SolverParams {
            min_size: state.min_size,
            tol: state.tol,
            seed: state.seed,
            ..SolverParams::default()
        };
        Self::new(state.kernel, params)
    }

    /// Save this solver's state to a **JSON envelope** `{ format, version, state }`.
    ///
    /// Only the [`SolverState`] is written; the factorisation is not.
    ///
    /// ### Errors
    /// - Returns `StateIOError::{Create, Serialize, Flush}` on I/O or serialization
    ///   failures.
    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<(), StateIOError> {
        let path_ref = path.as_ref();
        let file = File::create(path_ref).map_err(|e| StateIOError::Create {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        let mut w = BufWriter::new(file);

        let env = JsonEnvelope {
            format: JSON_FORMAT_NAME.to_owned(),
            version: JSON_VERSION,
            state: self.serialize(),
        };

        serde_json::to_writer_pretty(&mut w, &env).map_err(|e| StateIOError::Serialize {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        w.flush().map_err(|e| StateIOError::Flush {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Load an uncomputed solver from a versioned **JSON envelope**, validating
    /// format and version.
    ///
    /// If `progress` is `Some`, installs the sink on the returned solver.
    ///
    /// ### Errors
    /// - [`HodlrError::StateIO`] for `Open`, `Parse`, `FormatMismatch` or
    ///   `VersionMismatch` failures.
    /// - [`HodlrError::Kernel`] if the stored kernel specification is invalid.
    pub fn load_state<P: AsRef<Path>>(
        path: P,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> HodlrResult<Self> {
        let path_ref = path.as_ref();

        let file = File::open(path_ref).map_err(|e| StateIOError::Open {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let env: JsonEnvelope =
            serde_json::from_reader(reader).map_err(|e| StateIOError::Parse {
                path: path_ref.to_path_buf(),
                source: e,
            })?;

        // Validate envelope
        if env.format != JSON_FORMAT_NAME {
            return Err(StateIOError::FormatMismatch {
                path: path_ref.to_path_buf(),
                found: env.format,
                expected: JSON_FORMAT_NAME,
            }
            .into());
        }

        if env.version != JSON_VERSION {
            return Err(StateIOError::VersionMismatch {
                path: path_ref.to_path_buf(),
                found: env.version,
                expected: JSON_VERSION,
            }
            .into());
        }

        let mut solver = Self::deserialize(env.state)?;
        solver.set_progress_callback(progress);
        Ok(solver)
    }
}

const JSON_FORMAT_NAME: &str = "hodlr_state.json";
const JSON_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct JsonEnvelope {
    format: String,
    version: u32,
    state: SolverState,
}

/// Errors that can occur when saving or loading a [`SolverState`].
#[derive(Debug, Error)]
pub enum StateIOError {
    /// Failed to create the target file before writing the state.
    #[error("creating {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    /// Failed to open an existing state file for reading.
    #[error("opening {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    /// Failed to flush buffered output when finishing a write.
    #[error("flushing {}: {source}", path.display())]
    Flush { path: PathBuf, source: io::Error },

    /// Error serializing the state to JSON.
    #[error("serializing JSON to {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Error parsing JSON when reading a state file.
    #[error("parsing JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The JSON `format` field does not match the expected format.
    #[error("unexpected format in {}: found '{found}', expected '{expected}'", path.display())]
    FormatMismatch {
        path: PathBuf,
        found: String,
        expected: &'static str,
    },

    /// The JSON `version` field does not match the supported version.
    #[error("unsupported version in {}: found {found}, expected {expected}", path.display())]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}
