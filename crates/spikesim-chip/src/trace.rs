//! CSV trace writers and the run summary.
//!
//! Four traces can be enabled per run, matching the simulator's output
//! contract:
//!
//! | File | Row |
//! |------|-----|
//! | `spikes.csv` | `gid.nid,timestep` per fired neuron with `log_spikes` |
//! | `potentials.csv` | one row per timestep, a column per probed neuron |
//! | `messages.csv` | one row per real spike message |
//! | `perf.csv` | per-timestep performance counters |
//!
//! A failed write logs a warning and disables that trace for the rest of
//! the run; simulation itself continues.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::chip::SpikingChip;
use crate::message::Timestep;
use crate::models::NeuronStatus;
use crate::{Result, RunData};

/// Which traces to write, and where.
#[derive(Debug, Clone, Default)]
pub struct TraceConfig {
    /// Directory receiving the trace files.
    pub out_dir: PathBuf,
    /// Enable `spikes.csv`.
    pub spikes: bool,
    /// Enable `potentials.csv`.
    pub potentials: bool,
    /// Enable `messages.csv`.
    pub messages: bool,
    /// Enable `perf.csv`.
    pub perf: bool,
}

impl TraceConfig {
    /// All traces disabled, writing into `out_dir` when enabled.
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into(), ..Self::default() }
    }
}

/// One trace file; drops its writer permanently after a failed write.
#[derive(Debug)]
struct TraceFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl TraceFile {
    fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path)
            .map_err(|source| crate::SimError::TraceIo { path: path.clone(), source })?;
        Ok(Self { path, writer: Some(BufWriter::new(file)) })
    }

    fn write_line(&mut self, line: std::fmt::Arguments) {
        if let Some(w) = &mut self.writer {
            if let Err(source) = writeln!(w, "{line}") {
                warn!(path = %self.path.display(), %source, "trace write failed; trace disabled");
                self.writer = None;
            }
        }
    }

    fn flush(&mut self) {
        if let Some(w) = &mut self.writer {
            if let Err(source) = w.flush() {
                warn!(path = %self.path.display(), %source, "trace flush failed; trace disabled");
                self.writer = None;
            }
        }
    }
}

/// The set of open trace files for a run.
#[derive(Debug, Default)]
pub(crate) struct Traces {
    spike: Option<TraceFile>,
    potential: Option<TraceFile>,
    message: Option<TraceFile>,
    perf: Option<TraceFile>,
    probe_count: usize,
}

impl Traces {
    /// Open the enabled trace files and write their headers. `probes`
    /// lists the potential-trace columns (`group.nid`, mapping order).
    pub(crate) fn open(config: &TraceConfig, probes: &[String]) -> Result<Self> {
        let mut traces = Self::default();
        if config.spikes {
            let mut file = TraceFile::create(config.out_dir.join("spikes.csv"))?;
            file.write_line(format_args!("gid.nid,timestep"));
            traces.spike = Some(file);
        }
        if config.potentials {
            let mut file = TraceFile::create(config.out_dir.join("potentials.csv"))?;
            file.write_line(format_args!("{}", probes.join(",")));
            traces.potential = Some(file);
            traces.probe_count = probes.len();
        }
        if config.messages {
            let mut file = TraceFile::create(config.out_dir.join("messages.csv"))?;
            file.write_line(format_args!(
                "timestep,src_neuron,src_hw,dest_hw,hops,spikes,generation_delay,\
                 network_delay,receive_delay,blocked_delay,sent_timestamp,processed_timestamp"
            ));
            traces.message = Some(file);
        }
        if config.perf {
            let mut file = TraceFile::create(config.out_dir.join("perf.csv"))?;
            file.write_line(format_args!("sim_time,neurons_fired,packets_sent,total_hops,energy"));
            traces.perf = Some(file);
        }
        Ok(traces)
    }

    /// Append one timestep's rows to every enabled trace.
    pub(crate) fn record_timestep(&mut self, chip: &SpikingChip, ts: &Timestep) {
        if let Some(file) = &mut self.spike {
            for &(core_id, address) in chip.mapping_order() {
                let neuron = &chip.core(core_id).neurons[address];
                if neuron.log_spikes && neuron.status == NeuronStatus::Fired {
                    file.write_line(format_args!(
                        "{}.{},{}",
                        neuron.group_name, neuron.neuron_id, ts.timestep
                    ));
                }
            }
        }

        if let Some(file) = &mut self.potential {
            if self.probe_count > 0 {
                let mut row = String::new();
                for &(core_id, address) in chip.mapping_order() {
                    let core = chip.core(core_id);
                    let neuron = &core.neurons[address];
                    if !neuron.log_potential {
                        continue;
                    }
                    let potential =
                        core.somas[neuron.soma_unit].model.potential(neuron.mapped_address);
                    if !row.is_empty() {
                        row.push(',');
                    }
                    row.push_str(&format!("{potential:.6}"));
                }
                file.write_line(format_args!("{row}"));
            }
        }

        if let Some(file) = &mut self.message {
            for m in ts.spike_messages() {
                file.write_line(format_args!(
                    "{},{}.{},{}.{},{}.{},{},{},{:e},{:e},{:e},{:e},{:e},{:e}",
                    m.timestep,
                    m.src_group,
                    m.src_neuron_id,
                    m.src.tile_id,
                    m.src.core_offset,
                    m.dest.tile_id,
                    m.dest.core_offset,
                    m.hops,
                    m.spikes,
                    m.generation_delay,
                    m.network_delay,
                    m.receive_delay,
                    m.blocked_delay,
                    m.sent_timestamp,
                    m.processed_timestamp
                ));
            }
        }

        if let Some(file) = &mut self.perf {
            file.write_line(format_args!(
                "{:e},{},{},{},{:e}",
                ts.sim_time, ts.neurons_fired, ts.packets_sent, ts.total_hops, ts.energy
            ));
        }
    }

    /// Flush all open traces; called at the end of a `sim()` batch.
    pub(crate) fn flush(&mut self) {
        for file in [&mut self.spike, &mut self.potential, &mut self.message, &mut self.perf]
            .into_iter()
            .flatten()
        {
            file.flush();
        }
    }
}

/// Write the run summary key/value file into `out_dir`.
///
/// # Errors
///
/// Fails when the file cannot be created or written.
pub fn write_run_summary(out_dir: &Path, run: &RunData) -> Result<()> {
    let path = out_dir.join("run_summary.yaml");
    let file = File::create(&path)
        .map_err(|source| crate::SimError::TraceIo { path: path.clone(), source })?;
    let mut writer = BufWriter::new(file);
    format_run_summary(&mut writer, run)
        .map_err(|source| crate::SimError::TraceIo { path, source })?;
    Ok(())
}

/// Format the run summary as `key: value` lines.
///
/// # Errors
///
/// Propagates writer errors.
pub fn format_run_summary(out: &mut impl Write, run: &RunData) -> std::io::Result<()> {
    writeln!(out, "energy: {:e}", run.energy)?;
    writeln!(out, "sim_time: {:e}", run.sim_time)?;
    writeln!(out, "total_spikes: {}", run.spikes)?;
    writeln!(out, "total_messages: {}", run.packets_sent)?;
    writeln!(out, "total_neurons_fired: {}", run.neurons_fired)?;
    writeln!(out, "wall_time: {}", run.wall_time)?;
    writeln!(out, "timesteps: {}", run.timesteps_executed)?;
    Ok(())
}
