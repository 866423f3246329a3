//! mtrana CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use mtrana::analysis::config::AnalysisConfig;
use mtrana::analysis::pass::Analysis;
use mtrana::io::events::{load_events, save_events};
use mtrana::io::rpc_map::read_rpc_partition_file;
use mtrana::io::snapshot::{load_snapshot, save_snapshot};
use mtrana::io::table_txt::{read_efficiency_table_file, write_efficiency_table_file};
use mtrcore::algorithm::combinatorics::fire_probability;
use mtrcore::algorithm::decision::KeepPolicy;
use mtrcore::chamber::rpc::RpcPartition;
use mtrcore::efficiency::averaging::AveragedEfficiencies;
use mtrcore::efficiency::table::{EfficiencyTable, ValueCheck};

#[derive(Parser)]
#[command(name = "mtrana")]
#[command(about = "Apply muon trigger chamber efficiencies to muon track samples")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide for every track whether it would have fired the trigger
    Apply {
        /// Input events (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Efficiency table, text (.txt) or binary snapshot
        #[arg(short, long)]
        table: PathBuf,

        /// Output events (pretty JSON), kept tracks are marked
        #[arg(short, long)]
        output: PathBuf,

        /// Analysis configuration (JSON). Flags below override it.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Local board to RPC mapping, defaults to the built-in partition
        #[arg(long)]
        rpc_map: Option<PathBuf>,

        /// Seed of the random stream
        #[arg(long)]
        seed: Option<u64>,

        /// Keep decision policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Threads (0 = auto). With more than one thread every event gets its own stream.
        #[arg(long)]
        threads: Option<usize>,

        /// Count every eligible track as kept without sampling
        #[arg(long)]
        no_efficiencies: bool,

        /// Do not write rejected tracks
        #[arg(long)]
        drop_rejected: bool,

        /// Summary output (pretty JSON). Defaults to stdout.
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Chamber and RPC averages of an efficiency table
    Average {
        /// Efficiency table, text (.txt) or binary snapshot
        #[arg(short, long)]
        table: PathBuf,

        /// Local board to RPC mapping, defaults to the built-in partition
        #[arg(long)]
        rpc_map: Option<PathBuf>,

        /// Cathode number of the bending plane in text tables
        #[arg(long, default_value = "0")]
        bending_cathode: u8,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert an efficiency table between text and binary snapshot
    Convert {
        /// Input table, the format follows the extension (.txt is text)
        #[arg(short, long)]
        input: PathBuf,

        /// Output table, the format follows the extension (.txt is text)
        #[arg(short, long)]
        output: PathBuf,

        /// Cathode number of the bending plane in text tables
        #[arg(long, default_value = "0")]
        bending_cathode: u8,

        /// Decimals of each efficiency in text output
        #[arg(long, default_value = "4")]
        decimals: usize,

        /// Compress binary snapshots with zstd
        #[arg(long)]
        compress: bool,

        /// Clamp out of range efficiencies instead of failing
        #[arg(long)]
        clamp: bool,
    },

    /// Probability of a 3/4 coincidence for four plane efficiencies
    Probability {
        /// Efficiencies of the four planes
        #[arg(num_args = 4, required = true)]
        effs: Vec<f64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    CrossedElements,
    Resampled,
}

impl From<PolicyArg> for KeepPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::CrossedElements => KeepPolicy::CrossedElements,
            PolicyArg::Resampled => KeepPolicy::Resampled,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Apply {
            input,
            table,
            output,
            config,
            rpc_map,
            seed,
            policy,
            threads,
            no_efficiencies,
            drop_rejected,
            summary,
        } => {
            let mut config = match config {
                Some(path) => AnalysisConfig::from_json_file(&path)
                    .with_context(|| format!("reading configuration {}", path.display()))?,
                None => AnalysisConfig::default(),
            };
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(policy) = policy {
                config.policy = policy.into();
            }
            if let Some(threads) = threads {
                config.threads = threads;
            }
            config.apply_efficiencies &= !no_efficiencies;
            config.drop_rejected |= drop_rejected;
            cmd_apply(&input, &table, &output, rpc_map.as_ref(), config, summary.as_ref())
        }
        Commands::Average { table, rpc_map, bending_cathode, output } => {
            cmd_average(&table, rpc_map.as_ref(), bending_cathode, output.as_ref())
        }
        Commands::Convert { input, output, bending_cathode, decimals, compress, clamp } => {
            let check = if clamp { ValueCheck::Clamp } else { ValueCheck::Reject };
            cmd_convert(&input, &output, bending_cathode, decimals, compress, check)
        }
        Commands::Probability { effs } => cmd_probability(&effs),
    }
}

fn cmd_apply(
    input: &PathBuf,
    table: &PathBuf,
    output: &PathBuf,
    rpc_map: Option<&PathBuf>,
    config: AnalysisConfig,
    summary: Option<&PathBuf>,
) -> Result<()> {
    config.validate()?;
    let table = load_table(table, config.bending_cathode, config.value_check)?;
    let partition = load_partition(rpc_map)?;
    let events = load_events(input).with_context(|| format!("reading events {}", input.display()))?;

    let confidence_level = config.confidence_level;
    let threads = config.threads;
    let analysis = Analysis::new(table, &partition, config)?;
    let result = if threads == 1 {
        analysis.run_pass(&events)?
    } else {
        analysis.run_pass_par(&events, threads)?
    };

    save_events(output, &result.events).with_context(|| format!("writing events {}", output.display()))?;
    info!(seed = result.seed, output = %output.display(), "events written");

    let mut report = serde_json::to_value(result.counters.summary(confidence_level))?;
    report["seed"] = serde_json::json!(result.seed);
    write_json(summary, report)
}

fn cmd_average(table: &PathBuf, rpc_map: Option<&PathBuf>, bending_cathode: u8, output: Option<&PathBuf>) -> Result<()> {
    let table = load_table(table, bending_cathode, ValueCheck::Reject)?;
    let partition = load_partition(rpc_map)?;
    let averages = AveragedEfficiencies::from_table(&table, &partition);
    write_json(output, serde_json::to_value(&averages)?)
}

fn cmd_convert(input: &PathBuf, output: &PathBuf, bending_cathode: u8, decimals: usize, compress: bool, check: ValueCheck) -> Result<()> {
    let table = load_table(input, bending_cathode, check)?;
    if is_text(output) {
        write_efficiency_table_file(output, &table, decimals, bending_cathode)?;
    } else {
        save_snapshot(output, &table, compress)?;
    }
    info!(input = %input.display(), output = %output.display(), "table converted");
    Ok(())
}

fn cmd_probability(effs: &[f64]) -> Result<()> {
    let effs: [f64; 4] = effs.try_into().context("exactly four efficiencies are required")?;
    write_json(None, serde_json::json!({ "effs": effs, "fire_probability": fire_probability(effs) }))
}

fn is_text(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "txt")
}

fn load_table(path: &PathBuf, bending_cathode: u8, check: ValueCheck) -> Result<EfficiencyTable> {
    let table = if is_text(path) {
        read_efficiency_table_file(path, bending_cathode, check)?
    } else {
        load_snapshot(path)?.check_values(check)?
    };
    Ok(table)
}

fn load_partition(rpc_map: Option<&PathBuf>) -> Result<RpcPartition> {
    match rpc_map {
        Some(path) => read_rpc_partition_file(path).with_context(|| format!("reading RPC mapping {}", path.display())),
        None => Ok(RpcPartition::standard()),
    }
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
