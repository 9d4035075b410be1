/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the stationary covariance kernels and their faer-compatible evaluations.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{KernelFromSpec, KernelSpec};
use faer::RowRef;
use hodlr_core::KernelFunction;

const SQRT_3: f64 = 1.732_050_807_568_877_2;
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Squared-exponential kernel with `phi(r) = a exp(-r^2 / (2 l^2))`.
#[derive(Clone, Debug, Copy)]
pub struct SquaredExponentialKernel {
    amplitude: f64,
    inv_length_scale_sq: f64,
    ndim: usize,
}

impl SquaredExponentialKernel {
    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        self.amplitude * (-0.5 * r * r * self.inv_length_scale_sq).exp()
    }
}

impl KernelFunction for SquaredExponentialKernel {
    #[inline(always)]
    fn dimension(&self) -> usize {
        self.ndim
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        let r = crate::get_distance(a, b);
        self.phi(r)
    }
}

impl KernelFromSpec for SquaredExponentialKernel {
    #[inline(always)]
    fn from_spec(spec: &KernelSpec) -> Self {
        SquaredExponentialKernel {
            amplitude: spec.amplitude,
            inv_length_scale_sq: 1.0 / (spec.length_scale * spec.length_scale),
            ndim: spec.ndim,
        }
    }
}

/// Exponential (Matern 1/2) kernel with `phi(r) = a exp(-r / l)`.
#[derive(Clone, Debug, Copy)]
pub struct ExponentialKernel {
    amplitude: f64,
    length_scale: f64,
    ndim: usize,
}

impl ExponentialKernel {
    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        self.amplitude * (-r / self.length_scale).exp()
    }
}

impl KernelFunction for ExponentialKernel {
    #[inline(always)]
    fn dimension(&self) -> usize {
        self.ndim
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        let r = crate::get_distance(a, b);
        self.phi(r)
    }
}

impl KernelFromSpec for ExponentialKernel {
    #[inline(always)]
    fn from_spec(spec: &KernelSpec) -> Self {
        ExponentialKernel {
            amplitude: spec.amplitude,
            length_scale: spec.length_scale,
            ndim: spec.ndim,
        }
    }
}

/// Matern 3/2 kernel with `phi(r) = a (1 + sqrt(3) r / l) exp(-sqrt(3) r / l)`.
#[derive(Clone, Debug, Copy)]
pub struct Matern32Kernel {
    amplitude: f64,
    length_scale: f64,
    ndim: usize,
}

impl Matern32Kernel {
    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        let s = SQRT_3 * r / self.length_scale;
        self.amplitude * (1.0 + s) * (-s).exp()
    }
}

impl KernelFunction for Matern32Kernel {
    #[inline(always)]
    fn dimension(&self) -> usize {
        self.ndim
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        let r = crate::get_distance(a, b);
        self.phi(r)
    }
}

impl KernelFromSpec for Matern32Kernel {
    #[inline(always)]
    fn from_spec(spec: &KernelSpec) -> Self {
        Matern32Kernel {
            amplitude: spec.amplitude,
            length_scale: spec.length_scale,
            ndim: spec.ndim,
        }
    }
}

/// Matern 5/2 kernel with
/// `phi(r) = a (1 + sqrt(5) r / l + 5 r^2 / (3 l^2)) exp(-sqrt(5) r / l)`.
#[derive(Clone, Debug, Copy)]
pub struct Matern52Kernel {
    amplitude: f64,
    length_scale: f64,
    ndim: usize,
}

impl Matern52Kernel {
    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        let s = SQRT_5 * r / self.length_scale;
        self.amplitude * (1.0 + s + s * s / 3.0) * (-s).exp()
    }
}

impl KernelFunction for Matern52Kernel {
    #[inline(always)]
    fn dimension(&self) -> usize {
        self.ndim
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        let r = crate::get_distance(a, b);
        self.phi(r)
    }
}

impl KernelFromSpec for Matern52Kernel {
    #[inline(always)]
    fn from_spec(spec: &KernelSpec) -> Self {
        Matern52Kernel {
            amplitude: spec.amplitude,
            length_scale: spec.length_scale,
            ndim: spec.ndim,
        }
    }
}

/// Rational quadratic kernel with `phi(r) = a (1 + r^2 / (2 alpha l^2))^-alpha`.
///
/// Tends to the squared-exponential kernel as `alpha` grows.
#[derive(Clone, Debug, Copy)]
pub struct RationalQuadraticKernel {
    amplitude: f64,
    length_scale: f64,
    alpha: f64,
    ndim: usize,
}

impl RationalQuadraticKernel {
    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        let scaled = r / self.length_scale;
        self.amplitude * (1.0 + 0.5 * scaled * scaled / self.alpha).powf(-self.alpha)
    }
}

impl KernelFunction for RationalQuadraticKernel {
    #[inline(always)]
    fn dimension(&self) -> usize {
        self.ndim
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        let r = crate::get_distance(a, b);
        self.phi(r)
    }
}

impl KernelFromSpec for RationalQuadraticKernel {
    #[inline(always)]
    fn from_spec(spec: &KernelSpec) -> Self {
        RationalQuadraticKernel {
            amplitude: spec.amplitude,
            length_scale: spec.length_scale,
            alpha: spec.alpha,
            ndim: spec.ndim,
        }
    }
}

/// White-noise kernel: `a` for coincident points and zero elsewhere.
#[derive(Clone, Debug, Copy)]
pub struct WhiteKernel {
    amplitude: f64,
    ndim: usize,
}

impl WhiteKernel {
    #[inline(always)]
    pub fn phi(&self, r: f64) -> f64 {
        match r.abs() < f64::EPSILON {
            true => self.amplitude,
            false => 0.0,
        }
    }
}

impl KernelFunction for WhiteKernel {
    #[inline(always)]
    fn dimension(&self) -> usize {
        self.ndim
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        let r = crate::get_distance(a, b);
        self.phi(r)
    }
}

impl KernelFromSpec for WhiteKernel {
    #[inline(always)]
    fn from_spec(spec: &KernelSpec) -> Self {
        WhiteKernel {
            amplitude: spec.amplitude,
            ndim: spec.ndim,
        }
    }
}
