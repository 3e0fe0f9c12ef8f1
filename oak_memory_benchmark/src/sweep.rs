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

//! Running lists of configurations.

use core::marker::PhantomData;

use log::{info, warn};

use crate::{
    BenchmarkError,
    aggregate::{BenchmarkRecord, aggregate},
    config::BenchmarkConfig,
    coordinator::ConcurrentBenchmarkCoordinator,
    timer::{BenchmarkTimer, NativeTimer},
};

/// Run a single configuration end to end.
pub fn run_benchmark<T: BenchmarkTimer>(
    config: &BenchmarkConfig,
) -> Result<BenchmarkRecord, BenchmarkError> {
    let mut coordinator = ConcurrentBenchmarkCoordinator::<T>::new(config.clone());
    let run = coordinator.run()?;
    let result = aggregate(
        &run.samples,
        config.operations(),
        run.wall_clock,
        config.bytes_per_operation(),
    )?;
    let record = BenchmarkRecord::new(config, result);
    info!("{}", record);
    Ok(record)
}

/// A configuration that could not be run, with the reason.
#[derive(thiserror::Error, Debug)]
#[error(
    "benchmark with size={} threads={} mode={} failed: {error}",
    .config.region_size(),
    .config.threads(),
    .config.mode()
)]
pub struct SweepFailure {
    pub config: BenchmarkConfig,
    pub error: BenchmarkError,
}

/// Receives the outcome of every configuration in a sweep, in order.
pub trait ResultSink {
    fn record(&mut self, record: BenchmarkRecord);

    fn failure(&mut self, _failure: SweepFailure) {}
}

/// Keeps every outcome in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub records: Vec<BenchmarkRecord>,
    pub failures: Vec<SweepFailure>,
}

impl ResultSink for CollectingSink {
    fn record(&mut self, record: BenchmarkRecord) {
        self.records.push(record);
    }

    fn failure(&mut self, failure: SweepFailure) {
        self.failures.push(failure);
    }
}

/// Counts of a finished sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub completed: usize,
    pub failed: usize,
}

/// Runs configurations one after another.
///
/// A failing configuration is reported to the sink and skipped; the rest of
/// the sweep still runs. Nothing is retried.
pub struct Sweep<T: BenchmarkTimer = NativeTimer> {
    configs: Vec<BenchmarkConfig>,
    _timer: PhantomData<fn() -> T>,
}

impl<T: BenchmarkTimer> Sweep<T> {
    pub fn new(configs: Vec<BenchmarkConfig>) -> Self {
        Self { configs, _timer: PhantomData }
    }

    pub fn configs(&self) -> &[BenchmarkConfig] {
        &self.configs
    }

    pub fn run(&self, sink: &mut impl ResultSink) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for (position, config) in self.configs.iter().enumerate() {
            info!("running {}/{}: {}", position + 1, self.configs.len(), config);
            match run_benchmark::<T>(config) {
                Ok(record) => {
                    summary.completed += 1;
                    sink.record(record);
                }
                Err(error) => {
                    summary.failed += 1;
                    let failure = SweepFailure { config: config.clone(), error };
                    warn!("skipping: {}", failure);
                    sink.failure(failure);
                }
            }
        }
        summary
    }
}
