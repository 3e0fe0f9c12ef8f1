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

//! Timed read and write loops over a region.

use core::marker::PhantomData;
use std::hint::black_box;

use strum::{Display, EnumIter, EnumString};

use crate::{
    BenchmarkError,
    eviction::CacheEvictionController,
    pattern::AccessIndexSequence,
    region::MemoryRegion,
    timer::{BenchmarkTimer, NativeTimer, TimerReading, measure},
};

/// What a single access, or a whole worker, does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum AccessKind {
    Read,
    Write,
}

/// Performs accesses over one region, timed with `T`.
///
/// Each worker owns its own executor; executors only borrow the region and
/// the eviction controller, so any number of them can share both.
pub struct WorkloadExecutor<'a, T: BenchmarkTimer = NativeTimer> {
    region: &'a MemoryRegion,
    eviction: &'a CacheEvictionController,
    _timer: PhantomData<fn() -> T>,
}

impl<'a, T: BenchmarkTimer> WorkloadExecutor<'a, T> {
    pub fn new(region: &'a MemoryRegion, eviction: &'a CacheEvictionController) -> Self {
        Self { region, eviction, _timer: PhantomData }
    }

    /// Perform one `kind` access per index and time the whole loop.
    pub fn run(
        &self,
        indices: &AccessIndexSequence,
        kind: AccessKind,
    ) -> Result<TimerReading, BenchmarkError> {
        self.check_bound(indices)?;
        let indices = indices.as_slice();
        let (timing, ()) = match kind {
            AccessKind::Read => measure::<T, _>(|| self.read_loop(indices)),
            AccessKind::Write => measure::<T, _>(|| self.write_loop(indices)),
        };
        Ok(timing)
    }

    /// Perform `plan[i]` at `indices[i]` and time the whole loop.
    pub fn run_mixed(
        &self,
        indices: &AccessIndexSequence,
        plan: &[AccessKind],
    ) -> Result<TimerReading, BenchmarkError> {
        self.check_bound(indices)?;
        if plan.len() != indices.len() {
            return Err(BenchmarkError::invalid_config(format!(
                "access plan has {} entries for {} indices",
                plan.len(),
                indices.len()
            )));
        }
        let indices = indices.as_slice();
        let (timing, ()) = measure::<T, _>(|| self.mixed_loop(indices, plan));
        Ok(timing)
    }

    fn check_bound(&self, indices: &AccessIndexSequence) -> Result<(), BenchmarkError> {
        if indices.bound() > self.region.len() {
            return Err(BenchmarkError::invalid_config(format!(
                "indices up to {} do not fit a region of {} elements",
                indices.bound(),
                self.region.len()
            )));
        }
        Ok(())
    }

    #[inline(always)]
    fn read_loop(&self, indices: &[usize]) {
        for &index in indices {
            self.read(index);
        }
    }

    #[inline(always)]
    fn write_loop(&self, indices: &[usize]) {
        for (iteration, &index) in indices.iter().enumerate() {
            self.write(index, iteration);
        }
    }

    #[inline(always)]
    fn mixed_loop(&self, indices: &[usize], plan: &[AccessKind]) {
        for (iteration, (&index, &kind)) in indices.iter().zip(plan).enumerate() {
            match kind {
                AccessKind::Read => self.read(index),
                AccessKind::Write => self.write(index, iteration),
            }
        }
    }

    #[inline(always)]
    fn read(&self, index: usize) {
        self.eviction.flush(self.region.element_addr(index));
        black_box(self.region.load(index));
    }

    /// Read-modify-write whose stored value depends on the loop counter, so
    /// the store can be neither folded nor elided.
    #[inline(always)]
    fn write(&self, index: usize, iteration: usize) {
        self.eviction.flush(self.region.element_addr(index));
        let value = self.region.load(index) ^ ((iteration as u32) << 13);
        self.region.store(index, black_box(value));
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;
    use crate::{pattern::AccessPatternGenerator, timer::MonotonicTimer};

    fn warmed_region(size: usize) -> MemoryRegion {
        let mut region = MemoryRegion::allocate(size).unwrap();
        region.warm(11);
        region
    }

    #[googletest::test]
    fn test_read_leaves_region_untouched() {
        let region = warmed_region(4096);
        let before: Vec<u32> = region.values().collect();
        let eviction = CacheEvictionController::disabled();
        let indices = AccessPatternGenerator::new(Some(1)).generate(10_000, region.len()).unwrap();

        let timing = WorkloadExecutor::<NativeTimer>::new(&region, &eviction)
            .run(&indices, AccessKind::Read)
            .unwrap();

        assert_that!(timing.elapsed_ns, gt(0));
        let after: Vec<u32> = region.values().collect();
        assert_eq!(before, after);
    }

    #[googletest::test]
    fn test_write_stores_counter_dependent_values() {
        let region = MemoryRegion::allocate(64).unwrap();
        let eviction = CacheEvictionController::disabled();
        let indices = AccessPatternGenerator::sequential(3, region.len(), 1).unwrap();

        WorkloadExecutor::<MonotonicTimer>::new(&region, &eviction)
            .run(&indices, AccessKind::Write)
            .unwrap();

        assert_that!(region.load(0), eq(0));
        assert_that!(region.load(1), eq(1 << 13));
        assert_that!(region.load(2), eq(2 << 13));
    }

    #[googletest::test]
    fn test_mixed_follows_plan() {
        let region = MemoryRegion::allocate(64).unwrap();
        let eviction = CacheEvictionController::for_host(true).unwrap();
        let indices = AccessPatternGenerator::sequential(4, region.len(), 1).unwrap();
        let plan = [AccessKind::Write, AccessKind::Read, AccessKind::Write, AccessKind::Read];

        WorkloadExecutor::<NativeTimer>::new(&region, &eviction)
            .run_mixed(&indices, &plan)
            .unwrap();

        assert_that!(region.load(1), eq(0));
        assert_that!(region.load(2), eq(2 << 13));
        assert_that!(region.load(3), eq(0));
    }

    #[googletest::test]
    fn test_plan_length_must_match() {
        let region = MemoryRegion::allocate(64).unwrap();
        let eviction = CacheEvictionController::disabled();
        let indices = AccessPatternGenerator::sequential(4, region.len(), 1).unwrap();

        let result = WorkloadExecutor::<NativeTimer>::new(&region, &eviction)
            .run_mixed(&indices, &[AccessKind::Read]);

        assert_that!(result, err(anything()));
    }

    #[googletest::test]
    fn test_indices_must_fit_region() {
        let region = MemoryRegion::allocate(64).unwrap();
        let eviction = CacheEvictionController::disabled();
        let indices = AccessPatternGenerator::new(Some(2)).generate(8, 1024).unwrap();

        let executor = WorkloadExecutor::<NativeTimer>::new(&region, &eviction);
        let result = executor.run(&indices, AccessKind::Read);

        assert!(matches!(result, Err(BenchmarkError::InvalidConfig(_))));
    }
}
