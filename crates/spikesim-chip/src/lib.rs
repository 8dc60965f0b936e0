//! Cycle-level simulation kernel for spiking neuromorphic chips.
//!
//! A [`SpikingChip`] is built from an architecture description
//! (`spikesim-desc`), loaded with a mapped spiking network, and stepped
//! one discrete timestep at a time. Each step:
//!
//! 1. **Process neurons** — every core walks its mapped neurons through
//!    the process-side pipeline units, producing spike messages plus one
//!    placeholder per core for latency that generated no spike.
//! 2. **Process messages** — each message is routed to its destination
//!    core, which computes the receive-side latency through its units.
//! 3. **Schedule** — the NoC scheduler serializes all messages into a
//!    global timeline with link-density congestion modeling; the last
//!    timestamp is the step's wall-clock-equivalent latency.
//! 4. **Reduce** — per-unit counters become the step's energy figure and
//!    trace rows.
//!
//! ```no_run
//! use spikesim_chip::{ModelRegistry, SpikingChip};
//!
//! # fn main() -> spikesim_chip::Result<()> {
//! let arch = spikesim_desc::load_arch("arch.yaml").expect("architecture");
//! let net = spikesim_desc::load_net("snn.yaml").expect("network");
//!
//! let registry = ModelRegistry::with_builtins();
//! let mut chip = SpikingChip::new(&arch, &registry)?;
//! chip.load(&net)?;
//!
//! let results = chip.sim(1000, 100)?;
//! println!("simulated time: {:e} s, energy: {:e} J", results.sim_time, results.energy);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::float_cmp)]

mod chip;
mod error;
mod message;
mod models;
mod pipeline;
mod registry;
mod schedule;
mod trace;
mod units;

pub use chip::{
    Core, InAxon, MappedConnection, MappedNeuron, OutAxon, SpikingChip, Tile,
    DEFAULT_HEARTBEAT_TIMESTEPS,
};
pub use error::{Result, SimError};
pub use message::{DestinationAddress, Message, SourceAddress, Timestep};
pub use models::{
    AccumulatorDendrite, CurrentBasedSynapse, DendriteInput, DendriteModel, DendriteResult,
    InputSoma, LoihiLifSoma, MultiTapDendrite, NeuronStatus, ResetMode, SomaModel, SomaResult,
    SynapseModel, SynapseResult, TrueNorthSoma,
};
pub use registry::{DendriteFactory, ModelRegistry, SomaFactory, SynapseFactory};
pub use schedule::{schedule_messages, Scheduler};
pub use trace::{format_run_summary, write_run_summary, TraceConfig};
pub use units::{AxonInUnit, AxonOutUnit, DendriteUnit, SomaUnit, SynapseUnit};

/// Aggregate results of a simulated run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunData {
    /// Total energy (J).
    pub energy: f64,
    /// Total modeled time (s).
    pub sim_time: f64,
    /// Host wall-clock time spent simulating (s).
    pub wall_time: f64,
    /// Synaptic spike events processed.
    pub spikes: u64,
    /// Packets sent into the NoC.
    pub packets_sent: u64,
    /// Neuron fire events.
    pub neurons_fired: u64,
    /// Timesteps executed.
    pub timesteps_executed: u64,
}

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ModelRegistry, Result, RunData, SimError, SpikingChip, Timestep, TraceConfig,
    };
}
