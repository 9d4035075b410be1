/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides the serialisable kernel specification and its builder.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::utils::KernelType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by an invalid [`KernelSpec`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelSpecError {
    #[error("Kernel parameter `{name}` must be finite and positive, found {value}")]
    NonPositiveParameter { name: &'static str, value: f64 },

    #[error("Kernel dimension must be at least 1")]
    ZeroDimension,
}

/// Defines the [`KernelType`] to use, along with its hyperparameters.
///
/// Together with the solver's `min_size`, `tol` and `seed` this is all that is
/// needed to rebuild a solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// KernelType enum variant to use.
    pub kernel_type: KernelType,

    /// Variance of the process, `k(x, x)`.
    pub amplitude: f64,

    /// Distance over which the covariance decays. Smaller values give rougher,
    /// more local structure and higher off-diagonal rank.
    ///
    /// Not used by the white-noise kernel.
    pub length_scale: f64,

    /// Scale-mixture parameter. Only used by the rational quadratic kernel.
    pub alpha: f64,

    /// Number of coordinates per point.
    pub ndim: usize,
}

impl KernelSpec {
    /// Begins building a [`KernelSpec`] for the given kernel type.
    pub fn builder(kernel_type: KernelType) -> KernelSpecBuilder {
        KernelSpecBuilder {
            kernel_type,
            amplitude: 1.0,
            length_scale: 1.0,
            alpha: 1.0,
            ndim: 1,
        }
    }

    /// Checks every hyperparameter. Specs that arrive through deserialisation
    /// bypass the builder, so this runs again before a kernel is instantiated.
    pub fn validate(&self) -> Result<(), KernelSpecError> {
        let positive = |name: &'static str, value: f64| match value.is_finite() && value > 0.0 {
            true => Ok(()),
            false => Err(KernelSpecError::NonPositiveParameter { name, value }),
        };

        positive("amplitude", self.amplitude)?;
        positive("length_scale", self.length_scale)?;
        positive("alpha", self.alpha)?;

        if self.ndim == 0 {
            return Err(KernelSpecError::ZeroDimension);
        }
        Ok(())
    }
}

/// Builder for [`KernelSpec`] that provides sensible defaults.
#[derive(Debug, Clone, Copy)]
pub struct KernelSpecBuilder {
    kernel_type: KernelType,
    amplitude: f64,
    length_scale: f64,
    alpha: f64,
    ndim: usize,
}

impl KernelSpecBuilder {
    /// Sets the `amplitude` parameter on the builder.
    pub fn amplitude(mut self, v: f64) -> Self {
        self.amplitude = v;
        self
    }

    /// Sets the `length_scale` parameter on the builder.
    pub fn length_scale(mut self, v: f64) -> Self {
        self.length_scale = v;
        self
    }

    /// Sets the `alpha` parameter on the builder.
    pub fn alpha(mut self, v: f64) -> Self {
        self.alpha = v;
        self
    }

    /// Sets the `ndim` parameter on the builder.
    pub fn ndim(mut self, v: usize) -> Self {
        self.ndim = v;
        self
    }

    /// Finalises the builder into a validated [`KernelSpec`].
    pub fn build(self) -> Result<KernelSpec, KernelSpecError> {
        let spec = KernelSpec {
            kernel_type: self.kernel_type,
            amplitude: self.amplitude,
            length_scale: self.length_scale,
            alpha: self.alpha,
            ndim: self.ndim,
        };
        spec.validate()?;
        Ok(spec)
    }
}
