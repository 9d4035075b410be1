/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the covariance kernel capability consumed by the HODLR solver.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use faer::RowRef;
use std::sync::Arc;

/// Evaluates a covariance kernel between two points.
///
/// Implementors define the covariance given two
/// [`faer::RowRef<f64>`](https://docs.rs/faer/latest/faer/row/type.RowRef.html)
/// arguments, and report the number of coordinates each point is expected to have.
/// The solver never inspects the kernel beyond these two methods.
///
/// Kernels must be `Send + Sync` as sibling subtrees may be evaluated concurrently.
pub trait KernelFunction: Send + Sync {
    /// Number of coordinates per point.
    fn dimension(&self) -> usize;

    /// Covariance between points `a` and `b`.
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64;
}

impl<K: KernelFunction + ?Sized> KernelFunction for Box<K> {
    #[inline(always)]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        (**self).evaluate(a, b)
    }
}

impl<K: KernelFunction + ?Sized> KernelFunction for Arc<K> {
    #[inline(always)]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        (**self).evaluate(a, b)
    }
}

impl<K: KernelFunction + ?Sized> KernelFunction for &K {
    #[inline(always)]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline(always)]
    fn evaluate(&self, a: RowRef<f64>, b: RowRef<f64>) -> f64 {
        (**self).evaluate(a, b)
    }
}
