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

//! Run configuration.
//!
//! A [`BenchmarkConfig`] is the single immutable record that describes one
//! run. It is built through [`BenchmarkConfigBuilder`], which rejects every
//! out-of-range value before any memory is allocated.

use core::fmt;

use strum::{Display, EnumIter, EnumString};

use crate::BenchmarkError;

/// Size in bytes of one region element.
pub const ELEMENT_SIZE: usize = core::mem::size_of::<u32>();

/// Upper bound on the number of threads per configuration.
///
/// Worker handles live on the heap, so this bounds resource usage rather than
/// stack depth. Combined mode runs twice this many workers at most.
pub const MAX_THREADS: usize = 512;

/// Default page size for TLB-pressure variants (4 KiB).
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024;

/// How workers touch the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum AccessMode {
    /// Every worker loads.
    Read,
    /// Every worker performs read-modify-write.
    Write,
    /// Half of the workers read and half write, over the same region.
    Combined,
    /// Every access is a read with probability `read_ratio`, else a write.
    Mixed,
}

impl AccessMode {
    /// Number of workers spawned for `threads` configured threads.
    pub fn worker_count(self, threads: usize) -> usize {
        match self {
            AccessMode::Combined => threads * 2,
            AccessMode::Read | AccessMode::Write | AccessMode::Mixed => threads,
        }
    }
}

/// Order in which element offsets are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessPattern {
    /// Uniformly random offsets, defeating spatial locality and prefetching.
    Random,
    /// Fixed stride through the region, wrapping at the end.
    Sequential { stride_bytes: usize },
    /// Consecutive accesses land on consecutive pages.
    PageStriped,
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPattern::Random => write!(f, "random"),
            AccessPattern::Sequential { stride_bytes } => write!(f, "sequential/{stride_bytes}"),
            AccessPattern::PageStriped => write!(f, "page_striped"),
        }
    }
}

/// Named memory tiers with the footprints used by the standard experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CacheTier {
    L1d,
    L2,
    L3,
    MainMemory,
}

impl CacheTier {
    /// Region size that fits (or, for main memory, overflows) the tier.
    pub const fn default_size(self) -> usize {
        match self {
            CacheTier::L1d => 48 * 1024,
            CacheTier::L2 => 1280 * 1024,
            CacheTier::L3 => 24 * 1024 * 1024,
            CacheTier::MainMemory => 64 * 1024 * 1024,
        }
    }
}

/// Immutable description of one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    region_size: usize,
    mode: AccessMode,
    threads: usize,
    page_size: usize,
    eviction: bool,
    operations: usize,
    pattern: AccessPattern,
    read_ratio: f64,
    seed: Option<u64>,
}

impl BenchmarkConfig {
    /// Start building a configuration over a region of `region_size` bytes.
    pub fn builder(region_size: usize) -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder::new(region_size)
    }

    pub fn region_size(&self) -> usize {
        self.region_size
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn eviction(&self) -> bool {
        self.eviction
    }

    /// Total operations planned for the run, across all workers.
    pub fn operations(&self) -> usize {
        self.operations
    }

    pub fn pattern(&self) -> AccessPattern {
        self.pattern
    }

    pub fn read_ratio(&self) -> f64 {
        self.read_ratio
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// The same configuration with a different RNG seed.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.mode.worker_count(self.threads)
    }

    /// Equal share of the planned operations for each worker.
    pub fn operations_per_worker(&self) -> usize {
        self.operations / self.worker_count()
    }

    /// Number of `u32` elements in the region.
    pub fn elements(&self) -> usize {
        self.region_size / ELEMENT_SIZE
    }

    pub fn page_elements(&self) -> usize {
        self.page_size / ELEMENT_SIZE
    }

    /// Bytes moved by one access, where that is meaningful.
    ///
    /// Only sequential runs advance by a known chunk per access.
    pub fn bytes_per_operation(&self) -> Option<usize> {
        match self.pattern {
            AccessPattern::Sequential { stride_bytes } => Some(stride_bytes),
            AccessPattern::Random | AccessPattern::PageStriped => None,
        }
    }

    /// Alignment of the region allocation.
    pub fn alignment(&self) -> usize {
        match self.pattern {
            AccessPattern::PageStriped => self.page_size.max(crate::CACHE_LINE_SIZE),
            AccessPattern::Random | AccessPattern::Sequential { .. } => crate::CACHE_LINE_SIZE,
        }
    }
}

impl fmt::Display for BenchmarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={} threads={} mode={} pattern={} ops={}",
            self.region_size, self.threads, self.mode, self.pattern, self.operations
        )?;
        if self.mode == AccessMode::Mixed {
            write!(f, " read_ratio={:.2}", self.read_ratio)?;
        }
        if self.eviction {
            write!(f, " evict")?;
        }
        Ok(())
    }
}

/// Builder for [`BenchmarkConfig`].
#[derive(Debug, Clone)]
pub struct BenchmarkConfigBuilder {
    config: BenchmarkConfig,
}

impl BenchmarkConfigBuilder {
    fn new(region_size: usize) -> Self {
        Self {
            config: BenchmarkConfig {
                region_size,
                mode: AccessMode::Read,
                threads: 1,
                page_size: DEFAULT_PAGE_SIZE,
                eviction: false,
                operations: 100_000,
                pattern: AccessPattern::Random,
                read_ratio: 1.0,
                seed: None,
            },
        }
    }

    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn eviction(mut self, eviction: bool) -> Self {
        self.config.eviction = eviction;
        self
    }

    pub fn operations(mut self, operations: usize) -> Self {
        self.config.operations = operations;
        self
    }

    pub fn pattern(mut self, pattern: AccessPattern) -> Self {
        self.config.pattern = pattern;
        self
    }

    pub fn read_ratio(mut self, read_ratio: f64) -> Self {
        self.config.read_ratio = read_ratio;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.config.seed = seed;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<BenchmarkConfig, BenchmarkError> {
        let config = self.config;

        if config.region_size < ELEMENT_SIZE {
            return Err(BenchmarkError::invalid_config(format!(
                "region size {} is smaller than one element",
                config.region_size
            )));
        }
        if config.threads == 0 {
            return Err(BenchmarkError::invalid_config("thread count must be at least 1"));
        }
        if config.threads > MAX_THREADS {
            return Err(BenchmarkError::invalid_config(format!(
                "thread count {} exceeds the limit of {MAX_THREADS}",
                config.threads
            )));
        }
        if config.operations < config.worker_count() {
            return Err(BenchmarkError::invalid_config(format!(
                "{} operations cannot be shared among {} workers",
                config.operations,
                config.worker_count()
            )));
        }
        if !config.page_size.is_power_of_two() || config.page_size < ELEMENT_SIZE {
            return Err(BenchmarkError::invalid_config(format!(
                "page size {} must be a power of two of at least {ELEMENT_SIZE} bytes",
                config.page_size
            )));
        }
        if !(0.0..=1.0).contains(&config.read_ratio) {
            return Err(BenchmarkError::invalid_config(format!(
                "read ratio {} is outside [0, 1]",
                config.read_ratio
            )));
        }
        match config.pattern {
            AccessPattern::Sequential { stride_bytes }
                if stride_bytes == 0 || stride_bytes % ELEMENT_SIZE != 0 =>
            {
                return Err(BenchmarkError::invalid_config(format!(
                    "stride {stride_bytes} is not a positive multiple of {ELEMENT_SIZE} bytes"
                )));
            }
            // A stride spanning the whole region would revisit the first element forever.
            AccessPattern::Sequential { stride_bytes }
                if stride_bytes / ELEMENT_SIZE >= config.elements() =>
            {
                return Err(BenchmarkError::invalid_config(format!(
                    "stride {stride_bytes} is not smaller than the region of {} bytes",
                    config.region_size
                )));
            }
            AccessPattern::PageStriped if config.region_size < config.page_size => {
                return Err(BenchmarkError::invalid_config(format!(
                    "region size {} is smaller than one page of {} bytes",
                    config.region_size, config.page_size
                )));
            }
            _ => {}
        }

        Ok(config)
    }
}
