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

//! Memory hierarchy benchmark runner.
//!
//! Runs either a single configuration described on the command line or one
//! of the preset experiment families, and prints one line per completed run
//! to stdout.

use std::{fmt::Display, str::FromStr};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;
use oak_memory_benchmark::{
    AccessMode, AccessPattern, BenchmarkConfig, BenchmarkRecord, CacheTier, NativeTimer, Preset,
    PresetOptions, ResultSink, Sweep, SweepFailure, config::DEFAULT_PAGE_SIZE,
};
use strum::IntoEnumIterator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Csv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PatternArg {
    Random,
    Sequential,
    PageStriped,
}

#[derive(Parser, Debug)]
#[command(name = "memory_benchmark")]
#[command(about = "Measure memory hierarchy latency, bandwidth and throughput")]
struct Args {
    /// Run a whole experiment family; the single-run options below are
    /// ignored except for the seed.
    #[arg(long, value_parser = parse_enum::<Preset>)]
    preset: Option<Preset>,

    /// Region size in bytes (with optional k/m/g suffix) or a cache tier name.
    #[arg(long, value_parser = parse_region_size, default_value = "l1d")]
    size: usize,

    #[arg(long, value_parser = parse_enum::<AccessMode>, default_value = "read")]
    mode: AccessMode,

    /// Worker threads; combined mode starts twice as many.
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Operations shared among all workers.
    #[arg(long, default_value = "100000")]
    operations: usize,

    #[arg(long, value_enum, default_value = "random")]
    pattern: PatternArg,

    /// Bytes advanced per access by the sequential pattern.
    #[arg(long, default_value = "64")]
    stride: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Evict the target cache line before every access.
    #[arg(long)]
    evict: bool,

    /// Probability that an access is a read, for the mixed mode.
    #[arg(long, default_value = "1.0")]
    read_ratio: f64,

    /// Seed for index generation; a random seed from the OS when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Largest thread count of the concurrency preset.
    #[arg(long, default_value = "16")]
    max_threads: usize,

    /// Passes over each region of the cache pressure preset.
    #[arg(long, default_value = "8")]
    passes: usize,

    /// Page count step of the TLB pressure preset.
    #[arg(long, default_value = "500")]
    page_step: usize,

    /// Largest page count of the TLB pressure preset.
    #[arg(long, default_value = "100000")]
    max_pages: usize,

    #[arg(long, value_enum, default_value = "human")]
    output: OutputFormat,
}

fn parse_enum<T>(value: &str) -> Result<T, String>
where
    T: FromStr + IntoEnumIterator + Display,
{
    T::from_str(value).map_err(|_| {
        let expected: Vec<String> = T::iter().map(|variant| variant.to_string()).collect();
        format!("unknown value {value:?}, expected one of: {}", expected.join(", "))
    })
}

fn parse_region_size(value: &str) -> Result<usize, String> {
    if let Ok(tier) = CacheTier::from_str(value) {
        return Ok(tier.default_size());
    }
    let lower = value.to_ascii_lowercase();
    let (digits, multiplier) = match lower.strip_suffix(['k', 'm', 'g']) {
        Some(digits) if lower.ends_with('k') => (digits, 1 << 10),
        Some(digits) if lower.ends_with('m') => (digits, 1 << 20),
        Some(digits) => (digits, 1 << 30),
        None => (lower.as_str(), 1),
    };
    digits
        .parse::<usize>()
        .ok()
        .and_then(|size| size.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid region size {value:?}"))
}

impl Args {
    fn preset_options(&self) -> PresetOptions {
        PresetOptions {
            max_threads: self.max_threads,
            passes: self.passes,
            page_step: self.page_step,
            max_pages: self.max_pages,
        }
    }

    fn single_config(&self) -> anyhow::Result<BenchmarkConfig> {
        let pattern = match self.pattern {
            PatternArg::Random => AccessPattern::Random,
            PatternArg::Sequential => AccessPattern::Sequential { stride_bytes: self.stride },
            PatternArg::PageStriped => AccessPattern::PageStriped,
        };
        let config = BenchmarkConfig::builder(self.size)
            .mode(self.mode)
            .threads(self.threads)
            .operations(self.operations)
            .pattern(pattern)
            .page_size(self.page_size)
            .eviction(self.evict)
            .read_ratio(self.read_ratio)
            .seed(self.seed)
            .build()?;
        Ok(config)
    }
}

/// Prints records to stdout as they complete.
struct StdoutSink {
    format: OutputFormat,
    header_written: bool,
}

impl StdoutSink {
    fn new(format: OutputFormat) -> Self {
        Self { format, header_written: false }
    }
}

const CSV_HEADER: &str = "region_size,threads,mode,pattern,read_ratio,eviction,latency_ns,\
                          throughput_ops_per_sec,wall_clock_ops_per_sec,bandwidth_gb_per_sec,\
                          cycles_per_op";

fn format_csv(record: &BenchmarkRecord) -> String {
    let optional = |value: Option<f64>| value.map(|value| value.to_string()).unwrap_or_default();
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}",
        record.region_size,
        record.threads,
        record.mode,
        record.pattern,
        record.read_ratio,
        record.eviction,
        record.result.mean_latency_ns,
        record.result.throughput_ops_per_sec,
        record.result.wall_clock_throughput,
        optional(record.result.bandwidth_gb_per_sec),
        optional(record.result.cycles_per_op),
    )
}

impl ResultSink for StdoutSink {
    fn record(&mut self, record: BenchmarkRecord) {
        match self.format {
            OutputFormat::Human => println!("{record}"),
            OutputFormat::Csv => {
                if !self.header_written {
                    println!("{CSV_HEADER}");
                    self.header_written = true;
                }
                println!("{}", format_csv(&record));
            }
        }
    }

    fn failure(&mut self, failure: SweepFailure) {
        eprintln!("{:#}", anyhow::Error::new(failure));
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let configs = match args.preset {
        Some(preset) => preset
            .configs(&args.preset_options(), args.seed)
            .with_context(|| format!("couldn't build the {preset} preset"))?,
        None => vec![args.single_config().context("invalid benchmark options")?],
    };

    let sweep = Sweep::<NativeTimer>::new(configs);
    let summary = sweep.run(&mut StdoutSink::new(args.output));
    info!("{} runs completed, {} failed", summary.completed, summary.failed);

    Ok(())
}
