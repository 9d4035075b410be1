/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the trait for building kernels from a shared specification.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::kernel_spec::KernelSpec;

/// Converts a shared [`KernelSpec`] into a concrete kernel type.
pub trait KernelFromSpec: Sized {
    /// Constructs `Self` from a validated kernel specification.
    fn from_spec(spec: &KernelSpec) -> Self;
}
