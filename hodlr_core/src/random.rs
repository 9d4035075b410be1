/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides seeded, per-node random streams for reproducible low-rank sampling.
//
// Created on: 18 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Deterministic randomness shared down the HODLR tree.
//!
//! A single [`RandomSource`] is seeded once per `compute`. Every tree node
//! draws from its own ChaCha stream, selected by the node's heap index, so
//! the sequence a node sees does not depend on the order (or the thread) in
//! which its siblings were built.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Heap index of the root node. Children of node `i` are `2i` and `2i + 1`.
pub const ROOT_NODE_ID: u64 = 1;

/// Seeded generator from which per-node streams are derived.
#[derive(Debug, Clone)]
pub struct RandomSource {
    base: ChaCha8Rng,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            base: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Returns the independent stream reserved for `node_id`.
    pub fn stream(&self, node_id: u64) -> NodeStream {
        let mut rng = self.base.clone();
        rng.set_stream(node_id);
        rng.set_word_pos(0);
        NodeStream { rng }
    }
}

/// Random stream owned by a single tree node for the duration of its compression.
#[derive(Debug, Clone)]
pub struct NodeStream {
    rng: ChaCha8Rng,
}

impl NodeStream {
    /// Uniform index in `0..upper`. `upper` must be non-zero.
    #[inline]
    pub fn index(&mut self, upper: usize) -> usize {
        self.rng.random_range(0..upper)
    }

    /// Uniformly chosen index among the entries of `mask` that are still `true`.
    pub fn choose_unused(&mut self, mask: &[bool]) -> Option<usize> {
        let remaining = mask.iter().filter(|&&unused| unused).count();
        if remaining == 0 {
            return None;
        }
        let target = self.index(remaining);
        mask.iter()
            .enumerate()
            .filter(|(_, unused)| **unused)
            .nth(target)
            .map(|(idx, _)| idx)
    }
}
