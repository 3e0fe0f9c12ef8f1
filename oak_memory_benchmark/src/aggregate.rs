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

//! Reduction of worker samples into one result per run.

use core::fmt;

use crate::{
    BenchmarkError,
    config::{AccessMode, AccessPattern, BenchmarkConfig},
    coordinator::ThreadSample,
    timer::TimerReading,
};

/// Summary statistics of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateResult {
    /// Arithmetic mean of the per-worker latencies, in nanoseconds.
    pub mean_latency_ns: f64,
    /// Planned operations divided by the mean latency.
    ///
    /// This treats the mean per-operation latency as the time for the whole
    /// run, so it is not a wall-clock rate; see `wall_clock_throughput`.
    pub throughput_ops_per_sec: f64,
    /// Operations performed divided by the coordinator's elapsed time.
    pub wall_clock_throughput: f64,
    /// Only for a single sequential worker, where bytes moved are known.
    pub bandwidth_gb_per_sec: Option<f64>,
    pub cycles_per_op: Option<f64>,
    pub sample_count: usize,
}

/// Reduce `samples` into an [`AggregateResult`].
///
/// `bytes_per_op` is the chunk moved by one access, if the pattern has one.
pub fn aggregate(
    samples: &[ThreadSample],
    planned_ops: usize,
    wall_clock: TimerReading,
    bytes_per_op: Option<usize>,
) -> Result<AggregateResult, BenchmarkError> {
    if samples.is_empty() {
        return Err(BenchmarkError::invalid_config("no samples to aggregate"));
    }
    if let Some(sample) = samples.iter().find(|sample| sample.operations == 0) {
        return Err(BenchmarkError::invalid_config(format!(
            "worker {} performed no operations",
            sample.worker
        )));
    }

    let count = samples.len() as f64;
    let mean_latency_ns = sorted_sum(samples.iter().map(ThreadSample::latency_ns)) / count;
    let throughput_ops_per_sec = planned_ops as f64 / (mean_latency_ns / 1e9);

    let performed: usize = samples.iter().map(|sample| sample.operations).sum();
    let wall_clock_throughput = performed as f64 / nonzero_secs(wall_clock);

    let bandwidth_gb_per_sec = match (samples, bytes_per_op) {
        ([sample], Some(bytes)) => {
            let moved = (sample.operations * bytes) as f64;
            Some(moved / nonzero_secs(sample.timing) / 1e9)
        }
        _ => None,
    };

    let cycles_per_op = samples
        .iter()
        .map(ThreadSample::cycles_per_operation)
        .collect::<Option<Vec<f64>>>()
        .map(|cycles| sorted_sum(cycles.into_iter()) / count);

    Ok(AggregateResult {
        mean_latency_ns,
        throughput_ops_per_sec,
        wall_clock_throughput,
        bandwidth_gb_per_sec,
        cycles_per_op,
        sample_count: samples.len(),
    })
}

// Readings below the clock's resolution count as one nanosecond, so rates
// stay finite.
fn nonzero_secs(timing: TimerReading) -> f64 {
    timing.elapsed_ns.max(1) as f64 / 1e9
}

// Floating point addition is not associative; summing in a fixed order makes
// the result independent of the order workers were joined in.
fn sorted_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values.into_iter().sum()
}

/// The terminal artifact of one completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRecord {
    pub region_size: usize,
    pub threads: usize,
    pub mode: AccessMode,
    pub pattern: AccessPattern,
    pub read_ratio: f64,
    pub eviction: bool,
    pub result: AggregateResult,
}

impl BenchmarkRecord {
    pub fn new(config: &BenchmarkConfig, result: AggregateResult) -> Self {
        Self {
            region_size: config.region_size(),
            threads: config.threads(),
            mode: config.mode(),
            pattern: config.pattern(),
            read_ratio: config.read_ratio(),
            eviction: config.eviction(),
            result,
        }
    }
}

impl fmt::Display for BenchmarkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={} threads={} mode={} pattern={}",
            self.region_size, self.threads, self.mode, self.pattern
        )?;
        if self.mode == AccessMode::Mixed {
            write!(f, " read_ratio={:.1}", self.read_ratio)?;
        }
        write!(
            f,
            ": latency={:.2} ns/op throughput={:.0} ops/s wall_clock={:.0} ops/s",
            self.result.mean_latency_ns,
            self.result.throughput_ops_per_sec,
            self.result.wall_clock_throughput
        )?;
        if let Some(bandwidth) = self.result.bandwidth_gb_per_sec {
            write!(f, " bandwidth={bandwidth:.3} GB/s")?;
        }
        if let Some(cycles) = self.result.cycles_per_op {
            write!(f, " cycles={cycles:.1}/op")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;
    use crate::executor::AccessKind;

    fn sample(worker: usize, operations: usize, elapsed_ns: u64) -> ThreadSample {
        ThreadSample {
            worker,
            kind: Some(AccessKind::Read),
            operations,
            timing: TimerReading { elapsed_ns, elapsed_cycles: Some(elapsed_ns * 3) },
        }
    }

    fn wall(elapsed_ns: u64) -> TimerReading {
        TimerReading { elapsed_ns, elapsed_cycles: None }
    }

    #[googletest::test]
    fn test_single_sample() {
        let result = aggregate(&[sample(0, 1000, 50_000)], 1000, wall(100_000), None).unwrap();

        assert_that!(result.mean_latency_ns, eq(50.0));
        assert_that!(result.throughput_ops_per_sec, eq(1000.0 / 50e-9));
        assert_that!(result.wall_clock_throughput, eq(1000.0 / 100e-6));
        assert_that!(result.bandwidth_gb_per_sec, none());
        assert_that!(result.cycles_per_op, some(eq(150.0)));
        assert_that!(result.sample_count, eq(1));
    }

    #[googletest::test]
    fn test_mean_of_latencies() {
        let samples = [sample(0, 100, 1000), sample(1, 100, 3000)];
        let result = aggregate(&samples, 200, wall(3000), None).unwrap();
        assert_that!(result.mean_latency_ns, eq(20.0));
        assert_that!(result.throughput_ops_per_sec, eq(200.0 / 20e-9));
    }

    #[googletest::test]
    fn test_order_independent() {
        let samples = [sample(0, 3, 1000), sample(1, 7, 1000), sample(2, 11, 1000)];
        let reversed = [samples[2], samples[1], samples[0]];
        let forward = aggregate(&samples, 21, wall(1000), None).unwrap();
        let backward = aggregate(&reversed, 21, wall(1000), None).unwrap();
        assert_that!(forward.mean_latency_ns, eq(backward.mean_latency_ns));
    }

    #[googletest::test]
    fn test_bandwidth_single_sequential_worker() {
        let result = aggregate(&[sample(0, 1000, 1_000_000)], 1000, wall(1_000_000), Some(64))
            .unwrap();
        assert_that!(result.bandwidth_gb_per_sec, some(eq(64_000.0 / 1e-3 / 1e9)));

        let samples = [sample(0, 500, 1_000_000), sample(1, 500, 1_000_000)];
        let result = aggregate(&samples, 1000, wall(1_000_000), Some(64)).unwrap();
        assert_that!(result.bandwidth_gb_per_sec, none());
    }

    #[googletest::test]
    fn test_cycles_need_every_sample() {
        let mut uncounted = sample(1, 10, 100);
        uncounted.timing.elapsed_cycles = None;
        let result = aggregate(&[sample(0, 10, 100), uncounted], 20, wall(100), None).unwrap();
        assert_that!(result.cycles_per_op, none());
    }

    #[googletest::test]
    fn test_zero_elapsed_stays_finite() {
        let result = aggregate(&[sample(0, 10, 0)], 10, wall(0), Some(64)).unwrap();

        assert_that!(result.mean_latency_ns, eq(0.1));
        assert_that!(result.throughput_ops_per_sec.is_finite(), eq(true));
        assert_that!(result.wall_clock_throughput, eq(10.0 / 1e-9));
        assert_that!(result.bandwidth_gb_per_sec.map(f64::is_finite), some(eq(true)));
    }

    #[googletest::test]
    fn test_empty_samples_rejected() {
        assert!(matches!(
            aggregate(&[], 10, wall(1), None),
            Err(BenchmarkError::InvalidConfig(_))
        ));
        assert_that!(aggregate(&[sample(0, 0, 10)], 10, wall(1), None), err(anything()));
    }

    #[googletest::test]
    fn test_record_display() {
        let config = BenchmarkConfig::builder(4096).operations(10).build().unwrap();
        let result = aggregate(&[sample(0, 10, 100)], 10, wall(100), None).unwrap();
        let record = BenchmarkRecord::new(&config, result);
        assert_that!(
            record.to_string(),
            starts_with("size=4096 threads=1 mode=read pattern=random: latency=10.00 ns/op")
        );
    }
}
