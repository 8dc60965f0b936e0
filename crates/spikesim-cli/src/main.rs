//! `spikesim` — simulate a spiking neural network on a neuromorphic chip.
//!
//! ```text
//! USAGE:
//!   spikesim [FLAGS] <ARCH> <NET> <TIMESTEPS>
//!
//!   -s, --spikes       Trace every logged neuron's fires
//!   -v, --potentials   Trace probed membrane potentials
//!   -m, --messages     Trace every spike message
//!   -p, --perf         Trace per-timestep performance counters
//!   -o, --out <DIR>    Output directory (default .)
//! ```
//!
//! Exits 0 on success; any configuration, mapping or I/O problem is
//! reported and exits nonzero.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spikesim_chip::{
    format_run_summary, write_run_summary, ModelRegistry, SpikingChip, TraceConfig,
    DEFAULT_HEARTBEAT_TIMESTEPS,
};

#[derive(Parser)]
#[command(name = "spikesim", about = "Cycle-level spiking neuromorphic chip simulator", version)]
struct Cli {
    /// Architecture description file (YAML).
    arch: PathBuf,

    /// Spiking network description file (YAML).
    net: PathBuf,

    /// Number of timesteps to simulate.
    timesteps: u64,

    /// Record fired neurons to spikes.csv.
    #[arg(short = 's', long)]
    spikes: bool,

    /// Record probed membrane potentials to potentials.csv.
    #[arg(short = 'v', long)]
    potentials: bool,

    /// Record every spike message to messages.csv.
    #[arg(short = 'm', long)]
    messages: bool,

    /// Record per-timestep performance counters to perf.csv.
    #[arg(short = 'p', long)]
    perf: bool,

    /// Output directory for traces and the run summary.
    #[arg(short = 'o', long, default_value = ".")]
    out: PathBuf,

    /// Progress heartbeat period in timesteps (0 disables).
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_TIMESTEPS)]
    heartbeat: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let arch = spikesim_desc::load_arch(&cli.arch)
        .with_context(|| format!("loading architecture {}", cli.arch.display()))?;
    let net = spikesim_desc::load_net(&cli.net)
        .with_context(|| format!("loading network {}", cli.net.display()))?;

    let registry = ModelRegistry::with_builtins();
    let mut chip = SpikingChip::new(&arch, &registry)?;
    chip.load(&net)?;

    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("creating output directory {}", cli.out.display()))?;
    let trace_config = TraceConfig {
        out_dir: cli.out.clone(),
        spikes: cli.spikes,
        potentials: cli.potentials,
        messages: cli.messages,
        perf: cli.perf,
    };
    chip.enable_tracing(&trace_config)?;

    let results = chip.sim(cli.timesteps, cli.heartbeat)?;

    write_run_summary(&cli.out, &results)?;
    format_run_summary(&mut std::io::stdout().lock(), &results)?;
    Ok(())
}
