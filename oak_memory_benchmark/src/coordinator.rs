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

//! Concurrent benchmark coordination.
//!
//! The coordinator owns the region for the whole run. Workers borrow it
//! inside a [`std::thread::scope`], so the region cannot be freed while any
//! worker is still alive. Joining the workers is the only synchronization
//! point; there is no barrier while they run and no timeout on the join. A
//! worker that never returns hangs the run.

use core::marker::PhantomData;
use std::thread;

use log::{debug, warn};
use strum::Display;

use crate::{
    BenchmarkError,
    config::{AccessMode, BenchmarkConfig},
    eviction::CacheEvictionController,
    executor::{AccessKind, WorkloadExecutor},
    pattern::AccessPatternGenerator,
    region::MemoryRegion,
    timer::{BenchmarkTimer, NativeTimer, TimerReading},
};

/// Seed used to warm the region when the configuration has none.
const DEFAULT_WARM_SEED: u64 = 0x5eed;

/// Lifecycle of one coordinated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Spawning,
    Running,
    Joining,
    Aggregated,
    Failed,
}

/// Timing produced by one worker, handed to the coordinator on join.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadSample {
    pub worker: usize,
    /// `None` for mixed-mode workers, which both read and write.
    pub kind: Option<AccessKind>,
    pub operations: usize,
    pub timing: TimerReading,
}

impl ThreadSample {
    /// Mean time per operation in nanoseconds.
    ///
    /// An interval below the clock's resolution counts as one nanosecond.
    pub fn latency_ns(&self) -> f64 {
        self.timing.elapsed_ns.max(1) as f64 / self.operations as f64
    }

    /// Mean hardware counter ticks per operation, if counted.
    pub fn cycles_per_operation(&self) -> Option<f64> {
        self.timing.elapsed_cycles.map(|cycles| cycles as f64 / self.operations as f64)
    }
}

/// Every sample of a completed run plus the coordinator's own timing.
#[derive(Debug, Clone)]
pub struct CoordinatorRun {
    pub samples: Vec<ThreadSample>,
    /// From just before the first spawn to just after the last join.
    pub wall_clock: TimerReading,
}

/// Runs one configuration's workers against a single shared region.
pub struct ConcurrentBenchmarkCoordinator<T: BenchmarkTimer = NativeTimer> {
    config: BenchmarkConfig,
    state: CoordinatorState,
    _timer: PhantomData<fn() -> T>,
}

impl<T: BenchmarkTimer> ConcurrentBenchmarkCoordinator<T> {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config, state: CoordinatorState::Idle, _timer: PhantomData }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Allocate and warm the region, run every worker to completion and
    /// collect their samples.
    ///
    /// Either every worker produces a sample or the run fails as a whole.
    pub fn run(&mut self) -> Result<CoordinatorRun, BenchmarkError> {
        let result = self.execute();
        let next = match result {
            Ok(_) => CoordinatorState::Aggregated,
            Err(_) => CoordinatorState::Failed,
        };
        transition(&mut self.state, next);
        result
    }

    fn execute(&mut self) -> Result<CoordinatorRun, BenchmarkError> {
        let config = &self.config;
        let state = &mut self.state;

        let mut region = MemoryRegion::allocate_aligned(config.region_size(), config.alignment())?;
        region.warm(config.seed().unwrap_or(DEFAULT_WARM_SEED));
        let eviction = CacheEvictionController::for_host(config.eviction())?;
        let roles = worker_roles(config);

        if let Ok(cpus) = thread::available_parallelism() {
            if roles.len() > cpus.get() {
                warn!(
                    "{} workers exceed the {} available CPUs; results include contention for cores",
                    roles.len(),
                    cpus
                );
            }
        }

        let region = &region;
        let eviction = &eviction;

        transition(state, CoordinatorState::Spawning);
        let wall_timer = T::start();
        let samples = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(roles.len());
            let mut spawn_error = None;
            for (worker, &role) in roles.iter().enumerate() {
                let spawned = thread::Builder::new()
                    .name(format!("memory-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        run_worker::<T>(config, region, eviction, worker, role)
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        spawn_error = Some(BenchmarkError::ThreadSpawnFailure { worker, source });
                        break;
                    }
                }
            }

            if spawn_error.is_none() {
                transition(state, CoordinatorState::Running);
            }
            transition(state, CoordinatorState::Joining);

            // Join everything that was started before reporting any error, so
            // that no worker outlives the decision to fail the run.
            let joined: Vec<Result<ThreadSample, BenchmarkError>> = handles
                .into_iter()
                .enumerate()
                .map(|(worker, handle)| {
                    handle.join().map_err(|_| BenchmarkError::WorkerPanicked { worker })?
                })
                .collect();

            match spawn_error {
                Some(error) => Err(error),
                None => joined.into_iter().collect::<Result<Vec<_>, _>>(),
            }
        })?;
        let wall_clock = wall_timer.stop();

        Ok(CoordinatorRun { samples, wall_clock })
    }
}

/// The tag of each worker for `config`, in spawn order.
///
/// Combined mode places every reader before every writer.
pub fn worker_roles(config: &BenchmarkConfig) -> Vec<Option<AccessKind>> {
    let threads = config.threads();
    match config.mode() {
        AccessMode::Read => vec![Some(AccessKind::Read); threads],
        AccessMode::Write => vec![Some(AccessKind::Write); threads],
        AccessMode::Combined => {
            let mut roles = vec![Some(AccessKind::Read); threads];
            roles.resize(threads * 2, Some(AccessKind::Write));
            roles
        }
        AccessMode::Mixed => vec![None; threads],
    }
}

fn run_worker<T: BenchmarkTimer>(
    config: &BenchmarkConfig,
    region: &MemoryRegion,
    eviction: &CacheEvictionController,
    worker: usize,
    role: Option<AccessKind>,
) -> Result<ThreadSample, BenchmarkError> {
    let operations = config.operations_per_worker();
    let mut generator =
        AccessPatternGenerator::new(config.seed().map(|seed| seed.wrapping_add(worker as u64)));
    let indices = generator.generate_for(config, operations)?;
    let executor = WorkloadExecutor::<T>::new(region, eviction);

    let timing = match role {
        Some(kind) => executor.run(&indices, kind)?,
        None => {
            let plan = generator.access_plan(operations, config.read_ratio())?;
            executor.run_mixed(&indices, &plan)?
        }
    };

    Ok(ThreadSample { worker, kind: role, operations, timing })
}

fn transition(state: &mut CoordinatorState, next: CoordinatorState) {
    debug!("coordinator: {} -> {}", state, next);
    *state = next;
}
