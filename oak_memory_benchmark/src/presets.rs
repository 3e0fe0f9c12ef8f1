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

//! Configuration lists for the standard memory hierarchy experiments.
//!
//! Each preset only builds configurations; running them is up to a
//! [`crate::Sweep`].

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    BenchmarkError,
    config::{
        AccessMode, AccessPattern, BenchmarkConfig, CacheTier, DEFAULT_PAGE_SIZE, ELEMENT_SIZE,
    },
};

/// Operations per run for the per-tier latency experiment.
pub const TIER_LATENCY_OPERATIONS: usize = 100_000;

/// Region size for the bandwidth and concurrency experiments (256 MiB).
pub const LARGE_REGION_SIZE: usize = 256 * 1024 * 1024;

/// Bytes advanced per access in the bandwidth experiment.
pub const BANDWIDTH_CHUNK_SIZES: [usize; 6] = [64, 256, 512, 1024, 2048, 4096];

/// Total operations shared by all workers in the concurrency experiment.
pub const CONCURRENCY_OPERATIONS: usize = 500;

/// Accesses made to each page in the TLB experiment.
pub const TLB_TOUCHES_PER_PAGE: usize = 16;

/// The experiment families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Preset {
    TierLatency,
    Bandwidth,
    Concurrency,
    CachePressure,
    TlbPressure,
}

/// Tunables for the presets that take parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetOptions {
    pub max_threads: usize,
    pub passes: usize,
    pub page_step: usize,
    pub max_pages: usize,
}

impl Default for PresetOptions {
    fn default() -> Self {
        Self { max_threads: 16, passes: 8, page_step: 500, max_pages: 100_000 }
    }
}

impl Preset {
    /// Every configuration of this experiment, with `seed` applied to each.
    pub fn configs(
        self,
        options: &PresetOptions,
        seed: Option<u64>,
    ) -> Result<Vec<BenchmarkConfig>, BenchmarkError> {
        let configs = match self {
            Preset::TierLatency => tier_latency()?,
            Preset::Bandwidth => bandwidth()?,
            Preset::Concurrency => concurrency(options.max_threads)?,
            Preset::CachePressure => cache_pressure(options.passes)?,
            Preset::TlbPressure => tlb_pressure(options.page_step, options.max_pages)?,
        };
        Ok(configs.into_iter().map(|config| config.with_seed(seed)).collect())
    }
}

/// Random reads and then random writes in a region sized for each tier.
pub fn tier_latency() -> Result<Vec<BenchmarkConfig>, BenchmarkError> {
    CacheTier::iter()
        .flat_map(|tier| {
            [AccessMode::Read, AccessMode::Write].map(|mode| {
                BenchmarkConfig::builder(tier.default_size())
                    .mode(mode)
                    .operations(TIER_LATENCY_OPERATIONS)
                    .build()
            })
        })
        .collect()
}

/// Sequential chunked accesses with a falling read ratio, every access
/// preceded by an eviction.
pub fn bandwidth() -> Result<Vec<BenchmarkConfig>, BenchmarkError> {
    BANDWIDTH_CHUNK_SIZES
        .into_iter()
        .flat_map(|chunk| {
            (0..=10).rev().map(move |tenths| {
                BenchmarkConfig::builder(LARGE_REGION_SIZE)
                    .mode(AccessMode::Mixed)
                    .pattern(AccessPattern::Sequential { stride_bytes: chunk })
                    .read_ratio(f64::from(tenths) / 10.0)
                    .eviction(true)
                    .operations(LARGE_REGION_SIZE / chunk)
                    .build()
            })
        })
        .collect()
}

/// Reads, writes and combined reads and writes from 1 to `max_threads`
/// threads over one large region.
pub fn concurrency(max_threads: usize) -> Result<Vec<BenchmarkConfig>, BenchmarkError> {
    if max_threads == 0 {
        return Err(BenchmarkError::invalid_config("max_threads must be at least 1"));
    }
    [AccessMode::Read, AccessMode::Write, AccessMode::Combined]
        .into_iter()
        .flat_map(|mode| {
            (1..=max_threads).map(move |threads| {
                BenchmarkConfig::builder(LARGE_REGION_SIZE)
                    .mode(mode)
                    .threads(threads)
                    .operations(CONCURRENCY_OPERATIONS)
                    .build()
            })
        })
        .collect()
}

/// Repeated sequential writes over regions from a quarter to twice each
/// cache tier, in quarter-tier steps.
pub fn cache_pressure(passes: usize) -> Result<Vec<BenchmarkConfig>, BenchmarkError> {
    if passes == 0 {
        return Err(BenchmarkError::invalid_config("passes must be at least 1"));
    }
    [CacheTier::L1d, CacheTier::L2, CacheTier::L3]
        .into_iter()
        .flat_map(|tier| {
            let quarter = tier.default_size() / 4;
            (1..=8).map(move |quarters| {
                let size = quarter * quarters;
                BenchmarkConfig::builder(size)
                    .mode(AccessMode::Write)
                    .pattern(AccessPattern::Sequential { stride_bytes: ELEMENT_SIZE })
                    .operations(passes * (size / ELEMENT_SIZE))
                    .build()
            })
        })
        .collect()
}

/// Page-striped writes over `page_step, 2 * page_step, ..` pages up to
/// `max_pages`, so every access needs a different translation.
pub fn tlb_pressure(
    page_step: usize,
    max_pages: usize,
) -> Result<Vec<BenchmarkConfig>, BenchmarkError> {
    if page_step == 0 {
        return Err(BenchmarkError::invalid_config("page step must be at least 1"));
    }
    (page_step..=max_pages)
        .step_by(page_step)
        .map(|pages| {
            BenchmarkConfig::builder(pages * DEFAULT_PAGE_SIZE)
                .mode(AccessMode::Write)
                .pattern(AccessPattern::PageStriped)
                .page_size(DEFAULT_PAGE_SIZE)
                .operations(pages * TLB_TOUCHES_PER_PAGE)
                .build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use googletest::prelude::*;

    use super::*;

    #[googletest::test]
    fn test_tier_latency() {
        let configs = tier_latency().unwrap();
        assert_that!(configs.len(), eq(8));
        assert_that!(configs[0].region_size(), eq(48 * 1024));
        assert_that!(configs[0].mode(), eq(AccessMode::Read));
        assert_that!(configs[1].mode(), eq(AccessMode::Write));
        assert_that!(configs[7].region_size(), eq(CacheTier::MainMemory.default_size()));
    }

    #[googletest::test]
    fn test_bandwidth_ratios_fall() {
        let configs = bandwidth().unwrap();
        assert_that!(configs.len(), eq(BANDWIDTH_CHUNK_SIZES.len() * 11));
        assert_that!(configs[0].read_ratio(), eq(1.0));
        assert_that!(configs[10].read_ratio(), eq(0.0));
        assert_that!(configs[0].bytes_per_operation(), some(eq(64)));
        assert_that!(configs[0].operations(), eq(LARGE_REGION_SIZE / 64));
        assert_that!(configs.iter().filter(|config| !config.eviction()).count(), eq(0));
    }

    #[googletest::test]
    fn test_concurrency() {
        let configs = concurrency(4).unwrap();
        assert_that!(configs.len(), eq(12));
        assert_that!(configs[11].mode(), eq(AccessMode::Combined));
        assert_that!(configs[11].worker_count(), eq(8));
        assert_that!(concurrency(0), err(anything()));
    }

    #[googletest::test]
    fn test_cache_pressure_spans_quarter_to_double() {
        let configs = cache_pressure(2).unwrap();
        assert_that!(configs.len(), eq(24));
        assert_that!(configs[0].region_size(), eq(12 * 1024));
        assert_that!(configs[7].region_size(), eq(96 * 1024));
        assert_that!(configs[0].operations(), eq(2 * 3 * 1024));
    }

    #[googletest::test]
    fn test_tlb_pressure() {
        let configs = tlb_pressure(500, 1500).unwrap();
        assert_that!(configs.len(), eq(3));
        assert_that!(configs[2].region_size(), eq(1500 * DEFAULT_PAGE_SIZE));
        assert_that!(configs[2].alignment(), eq(DEFAULT_PAGE_SIZE));
        assert_that!(tlb_pressure(0, 10), err(anything()));
    }

    #[googletest::test]
    fn test_preset_seed_and_names() {
        let options = PresetOptions { max_threads: 2, ..PresetOptions::default() };
        let configs = Preset::from_str("concurrency").unwrap().configs(&options, Some(9)).unwrap();
        assert_that!(configs.iter().filter(|config| config.seed() == Some(9)).count(), eq(6));
        assert_that!(Preset::TlbPressure.to_string(), eq("tlb_pressure"));
    }
}
