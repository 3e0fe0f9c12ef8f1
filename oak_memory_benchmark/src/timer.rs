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

//! Timing utilities.
//!
//! Elapsed time always comes from the monotonic clock (`std::time::Instant`),
//! which is immune to wall-clock adjustment. Where the target exposes a
//! hardware counter it is sampled as well, innermost, so the clock reads are
//! outside the counted interval.
//!
//! Code measured with a [`BenchmarkTimer`] must not perform I/O, allocate or
//! take locks, otherwise the reading is meaningless.

use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

/// Timing data for one measured interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerReading {
    /// Elapsed monotonic time in nanoseconds.
    pub elapsed_ns: u64,
    /// Elapsed hardware counter ticks, if the target has a counter.
    pub elapsed_cycles: Option<u64>,
}

impl TimerReading {
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ns as f64 / 1e9
    }
}

/// A timer that is started before and stopped after the measured code.
pub trait BenchmarkTimer: Sized {
    fn start() -> Self;

    fn stop(self) -> TimerReading;
}

/// Monotonic clock plus the hardware cycle counter, where available.
pub struct NativeTimer {
    start: Instant,
    start_cycles: Option<u64>,
}

impl BenchmarkTimer for NativeTimer {
    #[inline(always)]
    fn start() -> Self {
        let start = Instant::now();
        let start_cycles = read_cycles();
        Self { start, start_cycles }
    }

    #[inline(always)]
    fn stop(self) -> TimerReading {
        let end_cycles = read_cycles();
        let elapsed = self.start.elapsed();
        let elapsed_cycles = match (self.start_cycles, end_cycles) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        };
        TimerReading { elapsed_ns: duration_to_ns(elapsed), elapsed_cycles }
    }
}

/// Monotonic clock only.
pub struct MonotonicTimer {
    start: Instant,
}

impl BenchmarkTimer for MonotonicTimer {
    #[inline(always)]
    fn start() -> Self {
        Self { start: Instant::now() }
    }

    #[inline(always)]
    fn stop(self) -> TimerReading {
        TimerReading { elapsed_ns: duration_to_ns(self.start.elapsed()), elapsed_cycles: None }
    }
}

/// Time `operation` with `T`, returning the reading and the operation's value.
#[inline(always)]
pub fn measure<T: BenchmarkTimer, R>(operation: impl FnOnce() -> R) -> (TimerReading, R) {
    let timer = T::start();
    let result = operation();
    let timing = timer.stop();
    (timing, result)
}

/// Nanoseconds since the first call in this process. Never decreases.
pub fn timestamp_ns() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    duration_to_ns(epoch.elapsed())
}

/// Whether [`read_cycles`] returns a value on this target.
pub const fn has_cycle_counter() -> bool {
    cfg!(any(target_arch = "x86_64", target_arch = "aarch64"))
}

/// Read the timestamp counter, fenced on both sides so that loads before
/// and after the read cannot be reordered across it.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn read_cycles() -> Option<u64> {
    use core::arch::x86_64::{_mm_lfence, _rdtsc};

    // SAFETY: LFENCE and RDTSC are always available on x86_64 and have no
    // side effects beyond serializing loads and reading the counter.
    let cycles = unsafe {
        _mm_lfence();
        let cycles = _rdtsc();
        _mm_lfence();
        cycles
    };
    Some(cycles)
}

/// Read the virtual counter after an instruction barrier.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn read_cycles() -> Option<u64> {
    let ticks: u64;
    // SAFETY: CNTVCT_EL0 is readable from EL0 on every supported OS; ISB only
    // flushes the pipeline.
    unsafe {
        core::arch::asm!(
            "isb",
            "mrs {ticks}, cntvct_el0",
            ticks = out(reg) ticks,
            options(nomem, nostack, preserves_flags),
        );
    }
    Some(ticks)
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
pub fn read_cycles() -> Option<u64> {
    None
}

fn duration_to_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
