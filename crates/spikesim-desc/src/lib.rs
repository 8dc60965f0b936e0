//! Description model for spikesim: architectures and spiking networks.
//!
//! Two document kinds are handled here, both YAML:
//!
//! - **Architecture**: the chip being modeled — NoC dimensions, tiles with
//!   per-direction hop costs, cores with a pipeline buffer position and
//!   five named hardware units each.
//! - **Network**: the workload — neuron groups, directed edges, and an
//!   explicit mapping of every neuron onto a `(tile, core)` slot.
//!
//! The parsed forms ([`Architecture`], [`SpikingNetwork`]) can equally be
//! built programmatically, which is how the kernel's tests construct
//! fixtures. Configuration and mapping problems are caught here, at load
//! time, with errors naming the offending field; nothing in these types
//! carries simulation state.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_wrap)]

mod arch;
mod error;
mod network;
mod parse;

pub use arch::{
    Architecture, AttributeMap, AttributeValue, AxonInConfiguration, AxonOutConfiguration,
    BufferPosition, CoreConfiguration, CorePipelineConfiguration, DendriteConfiguration,
    ModelInfo, NocConfiguration, SomaConfiguration, SomaEnergyMetrics, SomaLatencyMetrics,
    SynapseConfiguration, TileConfiguration, TilePowerMetrics,
};
pub use error::{DescError, Result};
pub use network::{
    Connection, NeuronAddress, NeuronConfiguration, NeuronGroup, NeuronMapping, NeuronParameters,
    SpikingNetwork,
};
pub use parse::{load_arch, load_net, parse_arch, parse_net, serialize_arch};
