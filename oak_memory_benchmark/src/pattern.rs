//
// Copyright 2026 The Project Oak Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Access pattern generation.
//!
//! Index sequences are always generated before timing starts, so neither the
//! RNG nor the allocation of the sequence is ever part of a measurement.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    BenchmarkError,
    config::{AccessPattern, BenchmarkConfig, ELEMENT_SIZE},
    executor::AccessKind,
};

/// Element offsets to visit, in order. Every offset is below `bound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIndexSequence {
    indices: Vec<usize>,
    bound: usize,
}

impl AccessIndexSequence {
    /// Wrap precomputed offsets, checking that each is below `bound`.
    pub fn new(indices: Vec<usize>, bound: usize) -> Result<Self, BenchmarkError> {
        if let Some(&index) = indices.iter().find(|&&index| index >= bound) {
            return Err(BenchmarkError::invalid_config(format!(
                "index {index} is outside a region of {bound} elements"
            )));
        }
        Ok(Self { indices, bound })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Exclusive upper bound of every offset.
    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }
}

/// Produces index sequences and read/write plans.
pub struct AccessPatternGenerator {
    rng: StdRng,
}

impl AccessPatternGenerator {
    /// A generator seeded with `seed`, or from OS entropy when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// `length` offsets drawn uniformly from `[0, bound)`.
    pub fn generate(
        &mut self,
        length: usize,
        bound: usize,
    ) -> Result<AccessIndexSequence, BenchmarkError> {
        check_bound(bound)?;
        let indices = (0..length).map(|_| self.rng.gen_range(0..bound)).collect();
        Ok(AccessIndexSequence { indices, bound })
    }

    /// Offsets advancing by `stride` elements and wrapping at `bound`.
    ///
    /// Fails if the stride is a multiple of `bound`, since every access would
    /// then land on the first element.
    pub fn sequential(
        length: usize,
        bound: usize,
        stride: usize,
    ) -> Result<AccessIndexSequence, BenchmarkError> {
        check_bound(bound)?;
        let stride = stride % bound;
        if stride == 0 {
            return Err(BenchmarkError::invalid_config(format!(
                "stride is a multiple of the {bound} element bound"
            )));
        }
        let indices = core::iter::successors(Some(0), |&index| Some((index + stride) % bound))
            .take(length)
            .collect();
        Ok(AccessIndexSequence { indices, bound })
    }

    /// Offsets that visit a different page on every access.
    ///
    /// The sequence walks one element on each page in turn, then moves to
    /// the next element within every page, so consecutive accesses never
    /// share a translation.
    pub fn page_striped(
        length: usize,
        bound: usize,
        page_elements: usize,
    ) -> Result<AccessIndexSequence, BenchmarkError> {
        check_bound(bound)?;
        let pages = if page_elements == 0 { 0 } else { bound / page_elements };
        if pages == 0 {
            return Err(BenchmarkError::invalid_config(format!(
                "a region of {bound} elements holds no page of {page_elements} elements"
            )));
        }
        let indices = (0..length)
            .map(|i| {
                let page = i % pages;
                let offset = (i / pages) % page_elements;
                page * page_elements + offset
            })
            .collect();
        Ok(AccessIndexSequence { indices, bound })
    }

    /// The sequence `config` asks for, over its whole region.
    pub fn generate_for(
        &mut self,
        config: &BenchmarkConfig,
        length: usize,
    ) -> Result<AccessIndexSequence, BenchmarkError> {
        let bound = config.elements();
        match config.pattern() {
            AccessPattern::Random => self.generate(length, bound),
            AccessPattern::Sequential { stride_bytes } => {
                Self::sequential(length, bound, stride_bytes / ELEMENT_SIZE)
            }
            AccessPattern::PageStriped => {
                Self::page_striped(length, bound, config.page_elements())
            }
        }
    }

    /// A per-access read/write plan where each access is a read with
    /// probability `read_ratio`.
    pub fn access_plan(
        &mut self,
        length: usize,
        read_ratio: f64,
    ) -> Result<Vec<AccessKind>, BenchmarkError> {
        if !(0.0..=1.0).contains(&read_ratio) {
            return Err(BenchmarkError::invalid_config(format!(
                "read ratio {read_ratio} is outside [0, 1]"
            )));
        }
        let plan = (0..length)
            .map(|_| match self.rng.gen_bool(read_ratio) {
                true => AccessKind::Read,
                false => AccessKind::Write,
            })
            .collect();
        Ok(plan)
    }
}

fn check_bound(bound: usize) -> Result<(), BenchmarkError> {
    if bound == 0 {
        return Err(BenchmarkError::invalid_config("index bound must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    #[googletest::test]
    fn test_random_indices_in_range() {
        let mut generator = AccessPatternGenerator::new(None);
        for (length, bound) in [(0, 1), (1, 1), (1000, 7), (100_000, 12 * 1024)] {
            let sequence = generator.generate(length, bound).unwrap();
            assert_that!(sequence.len(), eq(length));
            assert_that!(sequence.as_slice().iter().filter(|&&i| i >= bound).count(), eq(0));
        }
    }

    #[googletest::test]
    fn test_zero_bound_rejected() {
        let mut generator = AccessPatternGenerator::new(Some(1));
        assert!(matches!(generator.generate(10, 0), Err(BenchmarkError::InvalidConfig(_))));
        assert_that!(AccessPatternGenerator::sequential(10, 0, 1), err(anything()));
        assert_that!(AccessPatternGenerator::page_striped(10, 0, 1024), err(anything()));
    }

    #[googletest::test]
    fn test_seeded_generators_agree() {
        let first = AccessPatternGenerator::new(Some(99)).generate(256, 4096).unwrap();
        let second = AccessPatternGenerator::new(Some(99)).generate(256, 4096).unwrap();
        assert_eq!(first, second);
    }

    #[googletest::test]
    fn test_sequential_wraps() {
        let sequence = AccessPatternGenerator::sequential(6, 10, 4).unwrap();
        assert_eq!(sequence.as_slice(), [0, 4, 8, 2, 6, 0]);
    }

    #[googletest::test]
    fn test_sequential_rejects_degenerate_strides() {
        for (bound, stride) in [(16, 0), (16, 16), (16, 32), (1, 1)] {
            assert!(matches!(
                AccessPatternGenerator::sequential(8, bound, stride),
                Err(BenchmarkError::InvalidConfig(_))
            ));
        }
        let wrapped = AccessPatternGenerator::sequential(4, 16, 17).unwrap();
        assert_eq!(wrapped.as_slice(), [0, 1, 2, 3]);
    }

    #[googletest::test]
    fn test_page_striped_changes_page_every_access() {
        let page_elements = 1024;
        let bound = 8 * page_elements;
        let sequence =
            AccessPatternGenerator::page_striped(10_000, bound, page_elements).unwrap();

        assert_that!(sequence.len(), eq(10_000));
        assert_that!(sequence.as_slice().iter().filter(|&&i| i >= bound).count(), eq(0));
        let same_page = sequence
            .as_slice()
            .windows(2)
            .filter(|pair| pair[0] / page_elements == pair[1] / page_elements)
            .count();
        assert_that!(same_page, eq(0));
    }

    #[googletest::test]
    fn test_page_striped_needs_a_whole_page() {
        assert_that!(AccessPatternGenerator::page_striped(10, 512, 1024), err(anything()));
    }

    #[googletest::test]
    fn test_access_plan_extremes() {
        let mut generator = AccessPatternGenerator::new(Some(5));
        let reads = generator.access_plan(100, 1.0).unwrap();
        let writes = generator.access_plan(100, 0.0).unwrap();
        assert_that!(reads.iter().filter(|&&kind| kind == AccessKind::Read).count(), eq(100));
        assert_that!(writes.iter().filter(|&&kind| kind == AccessKind::Write).count(), eq(100));
        assert_that!(generator.access_plan(1, -0.5), err(anything()));
    }

    #[googletest::test]
    fn test_sequence_constructor_checks_bound() {
        assert_that!(AccessIndexSequence::new(vec![0, 1, 2], 3), ok(anything()));
        assert_that!(AccessIndexSequence::new(vec![0, 3], 3), err(anything()));
    }
}
