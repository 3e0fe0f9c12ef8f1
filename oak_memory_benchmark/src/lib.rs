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

//! Memory hierarchy measurement engine.
//!
//! This crate measures per-access latency at each cache level and main
//! memory, sustained bandwidth under read/write mixes, and latency/throughput
//! under concurrent access to a shared region.
//!
//! # Organization
//!
//! - `config`: Validated, immutable description of one run
//! - `pattern`: Random, sequential and page-striped index sequences
//! - `timer`: Monotonic clock and cycle counter timing
//! - `region`: Aligned, pre-warmed buffers shared by workers
//! - `eviction`: Per-architecture cache line eviction
//! - `executor`: Timed read/write loops over a region
//! - `coordinator`: Spawns and joins workers over one region
//! - `aggregate`: Reduces worker samples into a result
//! - `sweep`: Runs many configurations and hands records to a sink
//! - `presets`: Configuration lists for the standard experiments

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod eviction;
pub mod executor;
pub mod pattern;
pub mod presets;
pub mod region;
pub mod sweep;
pub mod timer;

// Re-exports for convenience.
pub use aggregate::{AggregateResult, BenchmarkRecord, aggregate};
pub use config::{AccessMode, AccessPattern, BenchmarkConfig, CacheTier};
pub use coordinator::{
    ConcurrentBenchmarkCoordinator, CoordinatorRun, CoordinatorState, ThreadSample,
};
pub use eviction::CacheEvictionController;
pub use executor::{AccessKind, WorkloadExecutor};
pub use pattern::{AccessIndexSequence, AccessPatternGenerator};
pub use presets::{Preset, PresetOptions};
pub use region::MemoryRegion;
pub use sweep::{CollectingSink, ResultSink, Sweep, SweepFailure, SweepSummary, run_benchmark};
pub use timer::{BenchmarkTimer, MonotonicTimer, NativeTimer, TimerReading, read_cycles};

/// Size of a cache line in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Multiplier for the 64-bit LCG (Linear Congruential Generator).
///
/// This is the multiplier from Knuth's MMIX LCG, also used by the PCG
/// family of random number generators.
///
/// Source: Knuth, "The Art of Computer Programming", Vol. 2, 3rd ed., p. 106.
pub const LCG_MULTIPLIER: u64 = 6364136223846793005;

/// Error kinds for benchmark operations.
///
/// Every variant is fatal to the configuration that produced it and to
/// nothing else: a sweep records the failure and moves on.
#[derive(thiserror::Error, Debug)]
pub enum BenchmarkError {
    /// A size, thread count, ratio or bound is out of range.
    #[error("invalid benchmark configuration: {0}")]
    InvalidConfig(String),
    /// The allocator could not satisfy a region or scratch buffer request.
    #[error("failed to allocate {requested} bytes")]
    OutOfMemory { requested: usize },
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker {worker}")]
    ThreadSpawnFailure {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
    /// A worker thread panicked before producing its sample.
    #[error("worker {worker} panicked before producing a sample")]
    WorkerPanicked { worker: usize },
}

impl BenchmarkError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
