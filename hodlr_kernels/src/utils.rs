/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements distance helpers and the registry-driven kernel dispatch.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{KernelSpec, KernelSpecError};
use faer::{Mat, RowRef};
use hodlr_core::KernelFunction;
use serde::{Deserialize, Serialize};

/// Euclidean distance between two points.
#[inline(always)]
pub fn get_distance(target: RowRef<f64>, source: RowRef<f64>) -> f64 {
    let mut dist = 0.0;
    for (t, s) in target.iter().zip(source.iter()) {
        let diff = t - s;
        dist += diff * diff;
    }
    dist.sqrt()
}

/// Builds a dense covariance matrix between two point sets using a typed kernel.
#[inline(always)]
pub(crate) fn get_covariance_matrix_typed<K>(
    target_points: &Mat<f64>,
    source_points: &Mat<f64>,
    kernel_function: &K,
) -> Mat<f64>
where
    K: KernelFunction + ?Sized,
{
    Mat::from_fn(target_points.nrows(), source_points.nrows(), |i, j| {
        kernel_function.evaluate(target_points.row(i), source_points.row(j))
    })
}

// K-free dispatcher generated from the kernel registry below.
// Assumes each kernel type implements `KernelFromSpec::from_spec(&KernelSpec) -> K`.
macro_rules! for_each_kernel {
    ( registry = [ $( ($V:ident, $Kty:path) ),* $(,)? ] ) => {

        /// Runtime kernel selector built from the kernel registry
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum KernelType {
            $( $V, )*
        }

        impl KernelType {
            /// Every registered kernel type.
            pub const ALL: &'static [KernelType] = &[ $( KernelType::$V, )* ];
        }

        impl KernelSpec {
            /// Validates the parameters and instantiates the selected kernel.
            pub fn kernel(&self) -> Result<Box<dyn KernelFunction>, KernelSpecError> {
                self.validate()?;
                match self.kernel_type {
                    $(
                        KernelType::$V => {
                            let k = <$Kty as crate::KernelFromSpec>::from_spec(self);
                            Ok(Box::new(k))
                        }
                    ),*
                }
            }
        }

        /// Builds a dense covariance matrix for the selected [`KernelType`].
        #[inline(always)]
        pub fn get_covariance_matrix(
            target_points: &Mat<f64>,
            source_points: &Mat<f64>,
            spec: &KernelSpec,
        ) -> Mat<f64> {
            match spec.kernel_type {
                $(
                    KernelType::$V => {
                        // Convert the shared spec -> concrete kernel type
                        let k = <$Kty as crate::KernelFromSpec>::from_spec(spec);
                        get_covariance_matrix_typed(target_points, source_points, &k)
                    }
                ),*
            }
        }
    };
}

for_each_kernel! {
    registry = [
        (SquaredExponential, crate::kernels::SquaredExponentialKernel),
        (Exponential,        crate::kernels::ExponentialKernel),
        (Matern32,           crate::kernels::Matern32Kernel),
        (Matern52,           crate::kernels::Matern52Kernel),
        (RationalQuadratic,  crate::kernels::RationalQuadraticKernel),
        (White,              crate::kernels::WhiteKernel),
    ]
}
