/////////////////////////////////////////////////////////////////////////////////////////////
//
// Re-exports the covariance kernels and kernel specification used across the hodlr crates.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Covariance kernels for the [`hodlr`] crate
mod kernel_spec;
mod kernels;
mod traits;
mod utils;

/// Implemented stationary covariance kernels.
pub mod kernel_types {
    pub use super::kernels::*;
}

pub use {
    kernel_spec::{KernelSpec, KernelSpecBuilder, KernelSpecError},
    traits::KernelFromSpec,
    utils::{get_covariance_matrix, get_distance, KernelType},
};
