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

//! Aligned memory regions shared by benchmark workers.
//!
//! Elements are `AtomicU32` accessed with `Relaxed` ordering, which compiles
//! to plain loads and stores. Workers share a region through `&MemoryRegion`
//! without any locking; the values they write are never checked.

use std::{
    alloc::{Layout, alloc_zeroed, dealloc},
    ptr::NonNull,
    sync::atomic::{AtomicU32, Ordering},
};

use log::debug;

use crate::{BenchmarkError, CACHE_LINE_SIZE, LCG_MULTIPLIER, config::ELEMENT_SIZE};

/// An owned, aligned buffer of `u32` elements.
pub struct MemoryRegion {
    ptr: NonNull<AtomicU32>,
    len: usize,
    layout: Layout,
    warmed: bool,
}

// SAFETY: The region exclusively owns its allocation and every element is an
// atomic, so sharing references across threads cannot cause a data race.
unsafe impl Send for MemoryRegion {}
// SAFETY: See above.
unsafe impl Sync for MemoryRegion {}

impl MemoryRegion {
    /// Allocate a cache-line aligned region of `size_bytes`, rounded down to
    /// whole elements.
    pub fn allocate(size_bytes: usize) -> Result<Self, BenchmarkError> {
        Self::allocate_aligned(size_bytes, CACHE_LINE_SIZE)
    }

    /// Allocate a region whose first element is aligned to `align` bytes.
    pub fn allocate_aligned(size_bytes: usize, align: usize) -> Result<Self, BenchmarkError> {
        if size_bytes < ELEMENT_SIZE {
            return Err(BenchmarkError::invalid_config(format!(
                "region size {size_bytes} is smaller than one element"
            )));
        }
        if !align.is_power_of_two() {
            return Err(BenchmarkError::invalid_config(format!(
                "alignment {align} is not a power of two"
            )));
        }

        let len = size_bytes / ELEMENT_SIZE;
        let requested = len * ELEMENT_SIZE;
        let align = align.max(core::mem::align_of::<AtomicU32>());
        let layout = Layout::from_size_align(requested, align)
            .map_err(|_| BenchmarkError::OutOfMemory { requested })?;

        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        // An all-zero bit pattern is a valid `AtomicU32`.
        let ptr = NonNull::new(raw.cast::<AtomicU32>())
            .ok_or(BenchmarkError::OutOfMemory { requested })?;

        debug!("allocated {} byte region aligned to {}", requested, layout.align());
        Ok(Self { ptr, len, layout, warmed: false })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.layout.size()
    }

    pub fn is_warmed(&self) -> bool {
        self.warmed
    }

    /// Write a pseudo-random value to every element.
    ///
    /// This commits every physical page before measurement starts, so the
    /// first timed access does not pay for a page fault. Written values are
    /// always below `2^31`.
    pub fn warm(&mut self, seed: u64) {
        let mut state = seed;
        for element in self.elements() {
            state = state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(1);
            element.store((state >> 33) as u32, Ordering::Relaxed);
        }
        self.warmed = true;
    }

    /// Write `value` to every element. Clears the warmed flag.
    pub fn fill(&mut self, value: u32) {
        for element in self.elements() {
            element.store(value, Ordering::Relaxed);
        }
        self.warmed = false;
    }

    #[inline(always)]
    pub fn load(&self, index: usize) -> u32 {
        self.elements()[index].load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn store(&self, index: usize, value: u32) {
        self.elements()[index].store(value, Ordering::Relaxed);
    }

    /// Address of element `index`, for cache line eviction.
    #[inline(always)]
    pub fn element_addr(&self, index: usize) -> *const u8 {
        core::ptr::from_ref(&self.elements()[index]).cast()
    }

    /// Snapshot of every element value.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        self.elements().iter().map(|element| element.load(Ordering::Relaxed))
    }

    #[inline(always)]
    fn elements(&self) -> &[AtomicU32] {
        // SAFETY: `ptr` points to `len` initialized elements owned by `self`
        // for as long as `self` is alive.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MemoryRegion {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc_zeroed` with exactly `layout`
        // and is freed only here.
        unsafe { dealloc(self.ptr.as_ptr().cast(), self.layout) };
    }
}
