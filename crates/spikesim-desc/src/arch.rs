//! Architecture description model.
//!
//! An [`Architecture`] is the parsed, validated form of an architecture
//! file: the NoC dimensions, every tile with its per-direction hop costs,
//! every core with its pipeline configuration, and the five named hardware
//! units each core carries. It is a pure description — the simulation
//! kernel instantiates its own state from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use spikesim_noc::MeshGeometry;

use crate::error::{DescError, Result};

/// A single attribute value from a description file.
///
/// Attribute maps are intentionally open-ended: structural keys are
/// validated by the parser, everything else is forwarded untouched to the
/// hardware-unit models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Real(f64),
    /// String value.
    Text(String),
    /// Homogeneous or mixed list.
    List(Vec<AttributeValue>),
}

/// Attribute map keyed by attribute name, in sorted order for stable
/// iteration.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    /// Interpret as a float, accepting integers.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Interpret as an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Interpret as a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Interpret as a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Interpret as a list of floats.
    #[must_use]
    pub fn as_f64_list(&self) -> Option<Vec<f64>> {
        match self {
            Self::List(items) => items.iter().map(AttributeValue::as_f64).collect(),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// Where the per-timestep buffer sits in a core's five-unit pipeline.
///
/// Units before the buffer run at message-receive time; units at or after
/// it run when neurons are processed. The derived ordering follows the
/// pipeline direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPosition {
    /// Receive side stops after the synapse unit.
    BeforeDendrite,
    /// Receive side runs synapse and dendrite units.
    BeforeSoma,
    /// Receive side runs synapse, dendrite and soma units.
    BeforeAxonOut,
}

impl BufferPosition {
    /// Parse the description-file spelling (`dendrite`, `soma`,
    /// `axon_out`).
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "dendrite" => Ok(Self::BeforeDendrite),
            "soma" => Ok(Self::BeforeSoma),
            "axon_out" => Ok(Self::BeforeAxonOut),
            other => Err(DescError::config(
                "core.attributes.buffer_position",
                format!("unsupported buffer position `{other}`"),
            )),
        }
    }

    /// The description-file spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeDendrite => "dendrite",
            Self::BeforeSoma => "soma",
            Self::BeforeAxonOut => "axon_out",
        }
    }
}

/// Network-on-chip configuration from the top-level architecture node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NocConfiguration {
    /// Mesh width in tiles.
    pub width: usize,
    /// Mesh height in tiles.
    pub height: usize,
    /// Core slots per tile.
    pub max_cores_per_tile: usize,
    /// Per-link buffer capacity used by the scheduler's back-pressure
    /// model.
    pub link_buffer_size: usize,
}

impl NocConfiguration {
    /// The mesh geometry this configuration describes.
    #[must_use]
    pub const fn geometry(&self) -> MeshGeometry {
        MeshGeometry::new(self.width, self.height, self.max_cores_per_tile)
    }
}

/// Per-direction hop energy and latency for one tile's router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TilePowerMetrics {
    /// Energy per northward hop (J).
    pub energy_north_hop: f64,
    /// Latency per northward hop (s).
    pub latency_north_hop: f64,
    /// Energy per eastward hop (J).
    pub energy_east_hop: f64,
    /// Latency per eastward hop (s).
    pub latency_east_hop: f64,
    /// Energy per southward hop (J).
    pub energy_south_hop: f64,
    /// Latency per southward hop (s).
    pub latency_south_hop: f64,
    /// Energy per westward hop (J).
    pub energy_west_hop: f64,
    /// Latency per westward hop (s).
    pub latency_west_hop: f64,
}

/// Model selection for a hardware unit: a model name plus the attribute
/// map handed to the model factory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Registered model name, e.g. `current_based` or `loihi_lif`.
    pub name: String,
    /// Model attributes, forwarded verbatim.
    pub attributes: AttributeMap,
}

/// Axon-input unit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxonInConfiguration {
    /// Unit name within the core.
    pub name: String,
    /// Energy per received spike message (J).
    pub energy_spike_message: f64,
    /// Latency per received spike message (s).
    pub latency_spike_message: f64,
}

/// Synapse unit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseConfiguration {
    /// Unit name within the core.
    pub name: String,
    /// Model powering this unit.
    pub model: ModelInfo,
    /// Default energy per processed spike, used when the model does not
    /// report energy itself.
    pub energy_process_spike: Option<f64>,
    /// Default latency per processed spike.
    pub latency_process_spike: Option<f64>,
}

/// Dendrite unit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DendriteConfiguration {
    /// Unit name within the core.
    pub name: String,
    /// Model powering this unit.
    pub model: ModelInfo,
    /// Default energy per dendrite update.
    pub energy_update: Option<f64>,
    /// Default latency per dendrite update.
    pub latency_update: Option<f64>,
}

/// Per-event soma energy costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SomaEnergyMetrics {
    /// Energy to access one neuron's state (J).
    pub energy_access_neuron: f64,
    /// Additional energy when the neuron state is written back (J).
    pub energy_update_neuron: f64,
    /// Additional energy when the neuron fires (J).
    pub energy_spike_out: f64,
}

/// Per-event soma latency costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SomaLatencyMetrics {
    /// Latency to access one neuron's state (s).
    pub latency_access_neuron: f64,
    /// Additional latency when the neuron state is written back (s).
    pub latency_update_neuron: f64,
    /// Additional latency when the neuron fires (s).
    pub latency_spike_out: f64,
}

/// Soma unit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SomaConfiguration {
    /// Unit name within the core.
    pub name: String,
    /// Model powering this unit.
    pub model: ModelInfo,
    /// Default per-event energies.
    pub energy_metrics: Option<SomaEnergyMetrics>,
    /// Default per-event latencies.
    pub latency_metrics: Option<SomaLatencyMetrics>,
}

/// Axon-output unit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxonOutConfiguration {
    /// Unit name within the core.
    pub name: String,
    /// Energy per sent packet (J).
    pub energy_access: f64,
    /// Latency per sent packet (s).
    pub latency_access: f64,
}

/// Core pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorePipelineConfiguration {
    /// Split between receive-side and process-side pipeline work.
    pub buffer_position: BufferPosition,
    /// Maximum neurons mappable to this core.
    pub max_neurons_supported: usize,
}

impl Default for CorePipelineConfiguration {
    fn default() -> Self {
        Self { buffer_position: BufferPosition::BeforeSoma, max_neurons_supported: 1024 }
    }
}

/// One core: pipeline configuration plus its five hardware units.
///
/// Exactly one axon-in and one axon-out unit per core; synapse, dendrite
/// and soma units may be replicated under distinct names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfiguration {
    /// Core name, unique within its tile.
    pub name: String,
    /// Core offset within the parent tile.
    pub offset: usize,
    /// Pipeline configuration.
    pub pipeline: CorePipelineConfiguration,
    /// The axon-input unit.
    pub axon_in: AxonInConfiguration,
    /// Synapse units, in declaration order.
    pub synapses: Vec<SynapseConfiguration>,
    /// Dendrite units, in declaration order.
    pub dendrites: Vec<DendriteConfiguration>,
    /// Soma units, in declaration order.
    pub somas: Vec<SomaConfiguration>,
    /// The axon-output unit.
    pub axon_out: AxonOutConfiguration,
}

/// One tile: router hop costs plus its cores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileConfiguration {
    /// Tile name, unique within the architecture.
    pub name: String,
    /// Tile id; also its index in [`Architecture::tiles`].
    pub id: usize,
    /// Per-direction hop costs.
    pub metrics: TilePowerMetrics,
    /// Cores on this tile, in offset order.
    pub cores: Vec<CoreConfiguration>,
}

/// A parsed, validated architecture description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    /// Architecture name.
    pub name: String,
    /// NoC configuration.
    pub noc: NocConfiguration,
    /// Tiles in id order.
    pub tiles: Vec<TileConfiguration>,
}

impl Architecture {
    /// Create an architecture with no tiles yet.
    #[must_use]
    pub fn new(name: impl Into<String>, noc: NocConfiguration) -> Self {
        Self { name: name.into(), noc, tiles: Vec::new() }
    }

    /// Append a tile, assigning the next id.
    ///
    /// # Errors
    ///
    /// Fails when the mesh is already full.
    pub fn add_tile(
        &mut self,
        name: impl Into<String>,
        metrics: TilePowerMetrics,
    ) -> Result<&mut TileConfiguration> {
        let id = self.tiles.len();
        if id >= self.noc.geometry().tile_count() {
            return Err(DescError::config(
                "architecture.tile",
                format!(
                    "tile count exceeds {}x{} mesh",
                    self.noc.width, self.noc.height
                ),
            ));
        }
        self.tiles.push(TileConfiguration { name: name.into(), id, metrics, cores: Vec::new() });
        Ok(self.tiles.last_mut().expect("tile just pushed"))
    }

    /// Total core count across all tiles.
    #[must_use]
    pub fn core_count(&self) -> usize {
        self.tiles.iter().map(|t| t.cores.len()).sum()
    }

    /// Look up a core configuration by tile id and core offset.
    #[must_use]
    pub fn core(&self, tile_id: usize, core_offset: usize) -> Option<&CoreConfiguration> {
        self.tiles.get(tile_id)?.cores.get(core_offset)
    }
}

impl TileConfiguration {
    /// Append a core. The `max_cores_per_tile` limit is checked by the
    /// parser, which knows the NoC configuration.
    pub fn add_core(&mut self, core: CoreConfiguration) -> &mut CoreConfiguration {
        self.cores.push(core);
        self.cores.last_mut().expect("core just pushed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_value_coercions() {
        assert_eq!(AttributeValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(AttributeValue::Real(0.5).as_f64(), Some(0.5));
        assert_eq!(AttributeValue::Bool(true).as_bool(), Some(true));
        assert_eq!(AttributeValue::Text("lif".into()).as_str(), Some("lif"));
        assert!(AttributeValue::Text("x".into()).as_f64().is_none());
        let list = AttributeValue::List(vec![1i64.into(), 0.5.into()]);
        assert_eq!(list.as_f64_list(), Some(vec![1.0, 0.5]));
    }

    #[test]
    fn buffer_position_spellings_round_trip() {
        for pos in
            [BufferPosition::BeforeDendrite, BufferPosition::BeforeSoma, BufferPosition::BeforeAxonOut]
        {
            assert_eq!(BufferPosition::parse(pos.as_str()).unwrap(), pos);
        }
        assert!(BufferPosition::parse("synapse").is_err());
    }

    #[test]
    fn buffer_positions_order_along_the_pipeline() {
        assert!(BufferPosition::BeforeDendrite < BufferPosition::BeforeSoma);
        assert!(BufferPosition::BeforeSoma < BufferPosition::BeforeAxonOut);
    }

    #[test]
    fn tile_limit_enforced() {
        let noc =
            NocConfiguration { width: 1, height: 1, max_cores_per_tile: 1, link_buffer_size: 1 };
        let mut arch = Architecture::new("tiny", noc);
        arch.add_tile("tile[0]", TilePowerMetrics::default()).unwrap();
        assert!(arch.add_tile("tile[1]", TilePowerMetrics::default()).is_err());
    }
}
