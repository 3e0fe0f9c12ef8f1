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

//! Cache line eviction.
//!
//! When eviction is enabled the executor calls [`CacheEvictionController::flush`]
//! right before every access, so every access misses all cache levels. The
//! cost of the flush itself is included in the measured time.

use std::hint::black_box;

use log::debug;

use crate::{BenchmarkError, CACHE_LINE_SIZE};

/// Size of the sacrificial buffer used where no flush instruction exists.
pub const DEFAULT_SCAN_SIZE: usize = 64 * 1024 * 1024;

/// Forces the next access to an address to miss every cache level.
pub struct CacheEvictionController {
    backend: Backend,
}

enum Backend {
    Disabled,
    LineFlush,
    Scan(ScanEviction),
}

impl CacheEvictionController {
    /// The best backend for this target, or a no-op when `enabled` is false.
    pub fn for_host(enabled: bool) -> Result<Self, BenchmarkError> {
        let backend = match (enabled, LINE_FLUSH_AVAILABLE) {
            (false, _) => Backend::Disabled,
            (true, true) => Backend::LineFlush,
            (true, false) => Backend::Scan(ScanEviction::new(DEFAULT_SCAN_SIZE)?),
        };
        let controller = Self { backend };
        debug!("cache eviction backend: {}", controller.backend_name());
        Ok(controller)
    }

    pub fn disabled() -> Self {
        Self { backend: Backend::Disabled }
    }

    /// Evict by scanning a buffer of `size` bytes, regardless of target.
    pub fn scan(size: usize) -> Result<Self, BenchmarkError> {
        Ok(Self { backend: Backend::Scan(ScanEviction::new(size)?) })
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, Backend::Disabled)
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Disabled => "disabled",
            Backend::LineFlush => LINE_FLUSH_NAME,
            Backend::Scan(_) => "scan",
        }
    }

    /// Evict the cache line holding `addr`.
    ///
    /// `addr` must point into a live allocation.
    #[inline(always)]
    pub fn flush(&self, addr: *const u8) {
        match &self.backend {
            Backend::Disabled => {}
            Backend::LineFlush => flush_line(addr),
            Backend::Scan(scan) => scan.evict(),
        }
    }
}

/// Eviction surrogate: reading a buffer larger than the last level cache
/// displaces everything that was cached before.
pub struct ScanEviction {
    buffer: Vec<u8>,
}

impl ScanEviction {
    pub fn new(size: usize) -> Result<Self, BenchmarkError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| BenchmarkError::OutOfMemory { requested: size })?;
        buffer.resize(size, 1);
        Ok(Self { buffer })
    }

    #[inline(always)]
    fn evict(&self) {
        let mut sum = 0u8;
        for line in self.buffer.chunks(CACHE_LINE_SIZE) {
            sum = sum.wrapping_add(line[0]);
        }
        black_box(sum);
    }
}

#[cfg(target_arch = "x86_64")]
const LINE_FLUSH_AVAILABLE: bool = true;
#[cfg(target_arch = "x86_64")]
const LINE_FLUSH_NAME: &str = "clflush";

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn flush_line(addr: *const u8) {
    // SAFETY: CLFLUSH is part of SSE2, which every x86_64 CPU has, and the
    // caller guarantees `addr` is mapped.
    unsafe { core::arch::x86_64::_mm_clflush(addr) };
}

#[cfg(target_arch = "aarch64")]
const LINE_FLUSH_AVAILABLE: bool = true;
#[cfg(target_arch = "aarch64")]
const LINE_FLUSH_NAME: &str = "dc civac";

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn flush_line(addr: *const u8) {
    // SAFETY: DC CIVAC is permitted at EL0 on Linux and macOS and only cleans
    // and invalidates the line; the caller guarantees `addr` is mapped.
    unsafe {
        core::arch::asm!(
            "dc civac, {addr}",
            "dsb ish",
            addr = in(reg) addr,
            options(nostack, preserves_flags),
        );
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
const LINE_FLUSH_AVAILABLE: bool = false;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
const LINE_FLUSH_NAME: &str = "none";

// Never selected: `for_host` falls back to `ScanEviction` on these targets.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn flush_line(_addr: *const u8) {}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;
    use crate::region::MemoryRegion;

    #[googletest::test]
    fn test_disabled_controller() {
        let controller = CacheEvictionController::for_host(false).unwrap();
        assert_that!(controller.is_enabled(), eq(false));
        assert_that!(controller.backend_name(), eq("disabled"));
    }

    #[googletest::test]
    fn test_flush_preserves_contents() {
        let mut region = MemoryRegion::allocate(4096).unwrap();
        region.warm(3);
        let before: Vec<u32> = region.values().collect();

        let controller = CacheEvictionController::for_host(true).unwrap();
        assert_that!(controller.is_enabled(), eq(true));
        for index in 0..region.len() {
            controller.flush(region.element_addr(index));
        }

        let after: Vec<u32> = region.values().collect();
        assert_eq!(before, after);
    }

    #[googletest::test]
    fn test_scan_backend() {
        let region = MemoryRegion::allocate(256).unwrap();
        let controller = CacheEvictionController::scan(64 * 1024).unwrap();
        assert_that!(controller.backend_name(), eq("scan"));
        controller.flush(region.element_addr(0));
    }

    #[googletest::test]
    fn test_scan_buffer_allocation_failure() {
        assert!(matches!(
            CacheEvictionController::scan(usize::MAX),
            Err(BenchmarkError::OutOfMemory { .. })
        ));
    }
}
