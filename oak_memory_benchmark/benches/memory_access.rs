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

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oak_memory_benchmark::{
    AccessKind, AccessPatternGenerator, CacheEvictionController, CacheTier, MemoryRegion,
    NativeTimer, WorkloadExecutor, config::ELEMENT_SIZE,
};
use strum::IntoEnumIterator;

const OPERATIONS: usize = 10_000;

fn bench_tier_reads(c: &mut Criterion) {
    let eviction = CacheEvictionController::disabled();

    let mut group = c.benchmark_group("random reads");
    group.throughput(Throughput::Elements(OPERATIONS as u64));
    for tier in CacheTier::iter() {
        let mut region = MemoryRegion::allocate(tier.default_size()).unwrap();
        region.warm(1);
        let indices =
            AccessPatternGenerator::new(Some(1)).generate(OPERATIONS, region.len()).unwrap();
        let executor = WorkloadExecutor::<NativeTimer>::new(&region, &eviction);

        group.bench_with_input(BenchmarkId::from_parameter(tier), &indices, |b, indices| {
            // Report the executor's own reading rather than criterion's, so the
            // numbers match what the runner prints.
            b.iter_custom(|iterations| {
                (0..iterations)
                    .map(|_| executor.run(indices, AccessKind::Read).unwrap().elapsed())
                    .sum::<Duration>()
            })
        });
    }
    group.finish();
}

fn bench_sequential_writes(c: &mut Criterion) {
    let eviction = CacheEvictionController::disabled();
    let region = MemoryRegion::allocate(CacheTier::L2.default_size()).unwrap();

    let mut group = c.benchmark_group("sequential writes");
    for stride_bytes in [4, 64, 256, 4096] {
        let stride = stride_bytes / ELEMENT_SIZE;
        let indices = AccessPatternGenerator::sequential(OPERATIONS, region.len(), stride).unwrap();
        let executor = WorkloadExecutor::<NativeTimer>::new(&region, &eviction);
        group.throughput(Throughput::Bytes((OPERATIONS * stride_bytes) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(stride_bytes), &indices, |b, indices| {
            b.iter(|| executor.run(indices, AccessKind::Write).unwrap())
        });
    }
    group.finish();
}

fn bench_evicted_reads(c: &mut Criterion) {
    let eviction = CacheEvictionController::for_host(true).unwrap();
    let mut region = MemoryRegion::allocate(CacheTier::L1d.default_size()).unwrap();
    region.warm(2);
    let indices = AccessPatternGenerator::new(Some(2)).generate(1000, region.len()).unwrap();
    let executor = WorkloadExecutor::<NativeTimer>::new(&region, &eviction);

    c.bench_function(&format!("evicted reads ({})", eviction.backend_name()), |b| {
        b.iter(|| executor.run(&indices, AccessKind::Read).unwrap())
    });
}

criterion_group!(benches, bench_tier_reads, bench_sequential_writes, bench_evicted_reads);
criterion_main!(benches);
