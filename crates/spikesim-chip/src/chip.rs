//! The simulated chip: tiles, cores, mapped network and timestep driver.
//!
//! A [`SpikingChip`] is instantiated from an architecture description,
//! loaded once with a mapped network, then stepped. Ownership is strict:
//! the chip owns tiles, tiles own cores, cores own their hardware units,
//! mapped neurons, in-bound connections and axon tables. All
//! cross-references are stable indices resolved at mapping time — a
//! neuron names its units by index within its own core, a connection
//! lives in the arena of the core it terminates at.
//!
//! Per timestep the driver resets the per-step counters, runs the
//! [pipeline](crate::pipeline) phases, hands the per-core message queues
//! to the [scheduler](crate::schedule), reduces energy, and appends to
//! any enabled traces.

use std::collections::BTreeMap;
use std::time::Instant;

use spikesim_noc::{MeshGeometry, MeshLocation};
use tracing::{debug, info};

use spikesim_desc::{
    Architecture, AttributeMap, CorePipelineConfiguration, NeuronParameters, SpikingNetwork,
};

use crate::error::{Result, SimError};
use crate::message::Timestep;
use crate::models::NeuronStatus;
use crate::registry::ModelRegistry;
use crate::schedule::{schedule_messages, Scheduler};
use crate::trace::{TraceConfig, Traces};
use crate::units::{AxonInUnit, AxonOutUnit, DendriteUnit, SomaUnit, SynapseUnit};
use crate::{pipeline, RunData};

/// Default heartbeat period for [`SpikingChip::sim`].
pub const DEFAULT_HEARTBEAT_TIMESTEPS: u64 = 100;

/// One out-axon record on a source neuron: a single packet destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutAxon {
    /// Destination tile x coordinate.
    pub dest_x: usize,
    /// Destination tile y coordinate.
    pub dest_y: usize,
    /// Destination tile id.
    pub dest_tile_id: usize,
    /// Destination core id (global).
    pub dest_core_id: usize,
    /// Destination core offset within its tile.
    pub dest_core_offset: usize,
    /// In-axon entry on the destination core.
    pub dest_axon_id: usize,
    /// Synapses addressed by one packet on this axon.
    pub spikes: usize,
}

/// One in-axon entry on a destination core: the synapse addresses a
/// packet from one source neuron fans out to.
#[derive(Debug, Clone, Default)]
pub struct InAxon {
    /// Synapse addresses into the core's connection arena.
    pub synapse_addresses: Vec<usize>,
    /// Packets received on this axon this timestep.
    pub spikes_received: u64,
}

/// A connection resolved onto hardware, stored at its destination core.
#[derive(Debug)]
pub struct MappedConnection {
    /// Stable id from the network description.
    pub id: usize,
    /// Destination neuron's address within the owning core.
    pub post_neuron: usize,
    /// Synapse unit index within the owning core.
    pub synapse_unit: usize,
    /// Address within the synapse unit; equals this connection's index in
    /// the core's arena.
    pub synapse_address: usize,
    /// Opaque parameters forwarded to the dendrite model per spike.
    pub dendrite_params: AttributeMap,
    /// Last timestep the synapse state at this address was advanced to.
    pub last_updated: u64,
}

/// A neuron placed on a core, with bindings and per-timestep state.
#[derive(Debug)]
pub struct MappedNeuron {
    /// Parent group name.
    pub group_name: String,
    /// Neuron id within the group.
    pub neuron_id: usize,
    /// Address within the core; also the soma/dendrite model address.
    pub mapped_address: usize,
    /// Global mapping order.
    pub mapping_order: usize,
    /// Dendrite unit index within the core.
    pub dendrite_unit: usize,
    /// Soma unit index within the core.
    pub soma_unit: usize,
    /// Record fires in the spike trace.
    pub log_spikes: bool,
    /// Record this neuron in the potential trace.
    pub log_potential: bool,
    /// Pass input charge to the soma even when none accumulated.
    pub force_update: bool,
    /// Remaining unconditional fires.
    pub forced_spikes: u32,
    /// Outgoing connections as `(dest_core_id, synapse_address)`.
    pub connections_out: Vec<(usize, usize)>,
    /// One packet destination per distinct target core.
    pub axons_out: Vec<OutAxon>,
    /// Status from the most recent soma update.
    pub status: NeuronStatus,
    /// Spikes received this timestep.
    pub spike_count: u32,
    /// Buffered synaptic inputs as `(current, connection_index)`.
    pub dendrite_input_synapses: Vec<(f64, usize)>,
    /// Charge presented to the soma at its next update.
    pub soma_input_charge: f64,
    /// Set when the soma fired and the axon-out unit has not yet sent.
    pub axon_out_input_spike: bool,
    /// Last timestep the dendrite state was advanced to.
    pub dendrite_last_updated: u64,
    /// Last timestep the soma state was advanced to.
    pub soma_last_updated: u64,
}

/// One core and everything mapped to it.
#[derive(Debug)]
pub struct Core {
    /// Core name from the description.
    pub name: String,
    /// Global core id.
    pub id: usize,
    /// Offset within the parent tile.
    pub offset: usize,
    /// Parent tile id.
    pub parent_tile_id: usize,
    /// Mesh position, cached for message construction.
    pub location: MeshLocation,
    /// Pipeline configuration (buffer position, capacity).
    pub pipeline: CorePipelineConfiguration,
    /// Axon-input unit.
    pub axon_in: AxonInUnit,
    /// Synapse units in declaration order.
    pub synapses: Vec<SynapseUnit>,
    /// Dendrite units in declaration order.
    pub dendrites: Vec<DendriteUnit>,
    /// Soma units in declaration order.
    pub somas: Vec<SomaUnit>,
    /// Axon-output unit.
    pub axon_out: AxonOutUnit,
    /// Mapped neurons in mapping order.
    pub neurons: Vec<MappedNeuron>,
    /// Connection arena; index is the synapse address.
    pub connections_in: Vec<MappedConnection>,
    /// In-axon table; index is the dest-axon id carried by messages.
    pub axons_in: Vec<InAxon>,
    /// Messages to process this timestep, as `(src_core_id, queue_index)`
    /// into the timestep container, in arrival order.
    pub messages_in: Vec<(usize, usize)>,
    /// Latency accumulated since the last message was generated.
    pub next_message_generation_delay: f64,
}

/// One tile: router costs, hop counters and its cores.
#[derive(Debug)]
pub struct Tile {
    /// Tile name from the description.
    pub name: String,
    /// Tile id.
    pub id: usize,
    /// Tile x coordinate.
    pub x: usize,
    /// Tile y coordinate.
    pub y: usize,
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
    /// Hops into this tile this timestep.
    pub hops: u64,
    /// Northward hops this timestep.
    pub north_hops: u64,
    /// Eastward hops this timestep.
    pub east_hops: u64,
    /// Southward hops this timestep.
    pub south_hops: u64,
    /// Westward hops this timestep.
    pub west_hops: u64,
    /// Messages terminating at this tile this timestep.
    pub messages_received: u64,
    /// Cores in offset order.
    pub cores: Vec<Core>,
}

/// The simulated chip.
#[derive(Debug)]
pub struct SpikingChip {
    geometry: MeshGeometry,
    link_buffer_size: usize,
    /// Tiles in id order.
    pub tiles: Vec<Tile>,
    /// All mapped neurons as `(core_id, address)`, in mapping order.
    mapping_order: Vec<(usize, usize)>,
    loaded: bool,
    total_timesteps: u64,
    total_energy: f64,
    total_sim_time: f64,
    total_spikes: u64,
    total_messages_sent: u64,
    total_neurons_fired: u64,
    wall_time: f64,
    traces: Traces,
}

impl SpikingChip {
    /// Instantiate the hardware described by `arch`, resolving every unit
    /// model through `registry`.
    ///
    /// # Errors
    ///
    /// Configuration errors: unknown model names, rejected model
    /// attributes.
    pub fn new(arch: &Architecture, registry: &ModelRegistry) -> Result<Self> {
        let geometry = arch.noc.geometry();
        let mut tiles = Vec::with_capacity(arch.tiles.len());
        for tile_config in &arch.tiles {
            let (x, y) = geometry.tile_coordinates(tile_config.id);
            let mut tile = Tile {
                name: tile_config.name.clone(),
                id: tile_config.id,
                x,
                y,
                energy_north_hop: tile_config.metrics.energy_north_hop,
                latency_north_hop: tile_config.metrics.latency_north_hop,
                energy_east_hop: tile_config.metrics.energy_east_hop,
                latency_east_hop: tile_config.metrics.latency_east_hop,
                energy_south_hop: tile_config.metrics.energy_south_hop,
                latency_south_hop: tile_config.metrics.latency_south_hop,
                energy_west_hop: tile_config.metrics.energy_west_hop,
                latency_west_hop: tile_config.metrics.latency_west_hop,
                hops: 0,
                north_hops: 0,
                east_hops: 0,
                south_hops: 0,
                west_hops: 0,
                messages_received: 0,
                cores: Vec::with_capacity(tile_config.cores.len()),
            };
            for core_config in &tile_config.cores {
                let synapses = core_config
                    .synapses
                    .iter()
                    .map(|c| Ok(SynapseUnit::new(c, registry.build_synapse(&c.model)?)))
                    .collect::<Result<Vec<_>>>()?;
                let dendrites = core_config
                    .dendrites
                    .iter()
                    .map(|c| Ok(DendriteUnit::new(c, registry.build_dendrite(&c.model)?)))
                    .collect::<Result<Vec<_>>>()?;
                let somas = core_config
                    .somas
                    .iter()
                    .map(|c| Ok(SomaUnit::new(c, registry.build_soma(&c.model)?)))
                    .collect::<Result<Vec<_>>>()?;
                tile.cores.push(Core {
                    name: core_config.name.clone(),
                    id: geometry.core_id(tile_config.id, core_config.offset),
                    offset: core_config.offset,
                    parent_tile_id: tile_config.id,
                    location: MeshLocation { x, y, core_offset: core_config.offset },
                    pipeline: core_config.pipeline,
                    axon_in: AxonInUnit::new(&core_config.axon_in),
                    synapses,
                    dendrites,
                    somas,
                    axon_out: AxonOutUnit::new(&core_config.axon_out),
                    neurons: Vec::new(),
                    connections_in: Vec::new(),
                    axons_in: Vec::new(),
                    messages_in: Vec::new(),
                    next_message_generation_delay: 0.0,
                });
            }
            tiles.push(tile);
        }

        Ok(Self {
            geometry,
            link_buffer_size: arch.noc.link_buffer_size,
            tiles,
            mapping_order: Vec::new(),
            loaded: false,
            total_timesteps: 0,
            total_energy: 0.0,
            total_sim_time: 0.0,
            total_spikes: 0,
            total_messages_sent: 0,
            total_neurons_fired: 0,
            wall_time: 0.0,
            traces: Traces::default(),
        })
    }

    /// The mesh geometry this chip was built with.
    #[must_use]
    pub fn geometry(&self) -> MeshGeometry {
        self.geometry
    }

    /// Shared access to a core by global id.
    ///
    /// # Panics
    ///
    /// Panics when the id does not name an instantiated core.
    #[must_use]
    pub fn core(&self, core_id: usize) -> &Core {
        let tile = &self.tiles[core_id / self.geometry.max_cores_per_tile];
        &tile.cores[core_id % self.geometry.max_cores_per_tile]
    }

    pub(crate) fn core_mut(&mut self, core_id: usize) -> &mut Core {
        let tile = &mut self.tiles[core_id / self.geometry.max_cores_per_tile];
        &mut tile.cores[core_id % self.geometry.max_cores_per_tile]
    }

    /// Iterate all cores in global id order.
    pub fn cores(&self) -> impl Iterator<Item = &Core> {
        self.tiles.iter().flat_map(|t| t.cores.iter())
    }

    // -----------------------------------------------------------------
    // Mapping
    // -----------------------------------------------------------------

    /// Load a network: map every neuron, resolve every connection, and
    /// build the axon tables.
    ///
    /// # Errors
    ///
    /// Mapping errors name the neuron or connection that failed; the chip
    /// should be discarded after a failed load.
    pub fn load(&mut self, net: &SpikingNetwork) -> Result<()> {
        if self.loaded {
            return Err(SimError::mapping(net.name.clone(), "chip already has a network loaded"));
        }
        net.check_fully_mapped().map_err(|e| SimError::mapping(net.name.clone(), e.to_string()))?;

        let mut lookup: BTreeMap<(String, usize), (usize, usize)> = BTreeMap::new();

        for mapping in &net.mappings {
            let group = net
                .group(&mapping.neuron.group)
                .expect("checked by check_fully_mapped");
            let params = &group.neurons[mapping.neuron.neuron].params;
            let placement = self.map_neuron(mapping, params)?;
            lookup.insert((mapping.neuron.group.clone(), mapping.neuron.neuron), placement);
        }

        for con in &net.connections {
            self.map_connection(con, &lookup)?;
        }

        self.create_axons();
        self.loaded = true;
        info!(
            neurons = self.mapping_order.len(),
            connections = net.connections.len(),
            "network `{}` mapped",
            net.name
        );
        Ok(())
    }

    fn map_neuron(
        &mut self,
        mapping: &spikesim_desc::NeuronMapping,
        params: &NeuronParameters,
    ) -> Result<(usize, usize)> {
        let subject = mapping.neuron.to_string();
        let max_cores = self.geometry.max_cores_per_tile;
        let tile = self
            .tiles
            .get_mut(mapping.tile)
            .ok_or_else(|| SimError::mapping(subject.as_str(), format!("no tile {}", mapping.tile)))?;
        let core = tile.cores.get_mut(mapping.core_offset).ok_or_else(|| {
            SimError::mapping(
                subject.as_str(),
                format!("tile {} has no core offset {}", mapping.tile, mapping.core_offset),
            )
        })?;
        debug_assert_eq!(core.id, mapping.tile * max_cores + mapping.core_offset);

        if core.neurons.len() >= core.pipeline.max_neurons_supported {
            return Err(SimError::mapping(
                subject.as_str(),
                format!("core {} is full ({} neurons)", core.id, core.neurons.len()),
            ));
        }

        let find_unit = |names: Vec<&String>, wanted: &Option<String>, kind: &str| -> Result<usize> {
            match wanted {
                None => Ok(0),
                Some(name) => names.iter().position(|n| *n == name).ok_or_else(|| {
                    SimError::mapping(subject.as_str(), format!("core has no {kind} unit `{name}`"))
                }),
            }
        };
        let dendrite_unit =
            find_unit(core.dendrites.iter().map(|u| &u.name).collect(), &params.dendrite_hw_name, "dendrite")?;
        let soma_unit =
            find_unit(core.somas.iter().map(|u| &u.name).collect(), &params.soma_hw_name, "soma")?;

        // Attributes prefixed `dendrite_` or `soma_` are routed to that
        // unit alone (stripped); everything else goes to both models,
        // which ignore names they do not know.
        let mapped_address = core.neurons.len();
        for (name, value) in &params.attributes {
            if let Some(stripped) = name.strip_prefix("dendrite_") {
                core.dendrites[dendrite_unit].model.set_attribute(mapped_address, stripped, value);
            } else if let Some(stripped) = name.strip_prefix("soma_") {
                core.somas[soma_unit].model.set_attribute(mapped_address, stripped, value);
            } else {
                core.dendrites[dendrite_unit].model.set_attribute(mapped_address, name, value);
                core.somas[soma_unit].model.set_attribute(mapped_address, name, value);
            }
        }
        core.somas[soma_unit].neuron_count += 1;

        core.neurons.push(MappedNeuron {
            group_name: mapping.neuron.group.clone(),
            neuron_id: mapping.neuron.neuron,
            mapped_address,
            mapping_order: self.mapping_order.len(),
            dendrite_unit,
            soma_unit,
            log_spikes: params.log_spikes,
            log_potential: params.log_potential,
            force_update: params.force_update,
            forced_spikes: params.forced_spikes,
            connections_out: Vec::new(),
            axons_out: Vec::new(),
            status: NeuronStatus::Idle,
            spike_count: 0,
            dendrite_input_synapses: Vec::new(),
            soma_input_charge: 0.0,
            axon_out_input_spike: false,
            dendrite_last_updated: 0,
            soma_last_updated: 0,
        });
        let core_id = core.id;
        self.mapping_order.push((core_id, mapped_address));
        Ok((core_id, mapped_address))
    }

    fn map_connection(
        &mut self,
        con: &spikesim_desc::Connection,
        lookup: &BTreeMap<(String, usize), (usize, usize)>,
    ) -> Result<()> {
        let subject = format!("{} -> {}", con.pre, con.post);
        let &(pre_core, pre_addr) = lookup
            .get(&(con.pre.group.clone(), con.pre.neuron))
            .ok_or_else(|| SimError::mapping(subject.as_str(), "source neuron is not mapped"))?;
        let &(post_core, post_addr) = lookup
            .get(&(con.post.group.clone(), con.post.neuron))
            .ok_or_else(|| SimError::mapping(subject.as_str(), "destination neuron is not mapped"))?;

        let dest = self.core_mut(post_core);
        let synapse_unit = match &con.synapse_hw_name {
            None => 0,
            Some(name) => dest
                .synapses
                .iter()
                .position(|u| &u.name == name)
                .ok_or_else(|| {
                    SimError::mapping(subject.as_str(), format!("core has no synapse unit `{name}`"))
                })?,
        };

        let synapse_address = dest.connections_in.len();
        let mut dendrite_params = con.attributes.clone();
        for weight_key in ["weight", "w"] {
            if let Some(value) = dendrite_params.remove(weight_key) {
                dest.synapses[synapse_unit]
                    .model
                    .set_attribute(synapse_address, weight_key, &value);
            }
        }
        dest.connections_in.push(MappedConnection {
            id: con.id,
            post_neuron: post_addr,
            synapse_unit,
            synapse_address,
            dendrite_params,
            last_updated: 0,
        });

        self.core_mut(pre_core).neurons[pre_addr]
            .connections_out
            .push((post_core, synapse_address));
        Ok(())
    }

    /// Deduplicate every neuron's destinations into one out-axon per
    /// `(neuron, destination core)` and fill the destination in-axon
    /// tables.
    fn create_axons(&mut self) {
        let order = self.mapping_order.clone();
        for (core_id, address) in order {
            let cons = self.core(core_id).neurons[address].connections_out.clone();
            let mut axons: Vec<OutAxon> = Vec::new();
            let mut by_dest: BTreeMap<usize, usize> = BTreeMap::new();

            for (dest_core_id, synapse_address) in cons {
                let axon_index = match by_dest.get(&dest_core_id) {
                    Some(&idx) => idx,
                    None => {
                        let dest = self.core_mut(dest_core_id);
                        let dest_axon_id = dest.axons_in.len();
                        dest.axons_in.push(InAxon::default());
                        axons.push(OutAxon {
                            dest_x: dest.location.x,
                            dest_y: dest.location.y,
                            dest_tile_id: dest.parent_tile_id,
                            dest_core_id,
                            dest_core_offset: dest.offset,
                            dest_axon_id,
                            spikes: 0,
                        });
                        by_dest.insert(dest_core_id, axons.len() - 1);
                        axons.len() - 1
                    }
                };
                let axon = &mut axons[axon_index];
                axon.spikes += 1;
                let dest_axon_id = axon.dest_axon_id;
                self.core_mut(dest_core_id).axons_in[dest_axon_id]
                    .synapse_addresses
                    .push(synapse_address);
            }

            debug!(core_id, address, axons = axons.len(), "out-axons created");
            self.core_mut(core_id).neurons[address].axons_out = axons;
        }
    }

    // -----------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------

    /// Open trace files per `config`. Call after [`SpikingChip::load`] so
    /// the potential-trace header can list the probed neurons.
    ///
    /// # Errors
    ///
    /// Fails when a trace file cannot be created.
    pub fn enable_tracing(&mut self, config: &TraceConfig) -> Result<()> {
        let probes = self.probed_neuron_names();
        self.traces = Traces::open(config, &probes)?;
        Ok(())
    }

    fn probed_neuron_names(&self) -> Vec<String> {
        self.mapping_order
            .iter()
            .map(|&(core_id, addr)| &self.core(core_id).neurons[addr])
            .filter(|n| n.log_potential)
            .map(|n| format!("{}.{}", n.group_name, n.neuron_id))
            .collect()
    }

    /// Run `timesteps` steps, logging a heartbeat every `heartbeat`
    /// steps. Returns the aggregate results of this call only.
    ///
    /// # Errors
    ///
    /// Currently infallible at runtime; the `Result` covers future I/O.
    pub fn sim(&mut self, timesteps: u64, heartbeat: u64) -> Result<RunData> {
        let start = RunSnapshot::of(self);
        let wall_start = Instant::now();

        for _ in 0..timesteps {
            if heartbeat != 0 && self.total_timesteps % heartbeat == 0 && self.total_timesteps != 0 {
                info!(
                    timestep = self.total_timesteps,
                    sim_time = self.total_sim_time,
                    "heartbeat"
                );
            }
            self.step();
        }

        self.traces.flush();
        let wall = wall_start.elapsed().as_secs_f64();
        self.wall_time += wall;
        Ok(start.delta(self, wall))
    }

    /// Execute one timestep and return everything it produced.
    pub fn step(&mut self) -> Timestep {
        self.total_timesteps += 1;
        let mut ts = Timestep::new(self.total_timesteps, self.geometry.core_count());

        self.reset_measurements();
        pipeline::process_neurons(&mut ts, self);
        pipeline::process_messages(&mut ts, self);

        let scheduler = Scheduler {
            noc_width: self.geometry.width,
            noc_height: self.geometry.height,
            core_count: self.geometry.core_count(),
            max_cores_per_tile: self.geometry.max_cores_per_tile,
            buffer_size: self.link_buffer_size,
        };
        ts.sim_time = schedule_messages(&mut ts.messages, &scheduler);

        for tile in &self.tiles {
            ts.total_hops += tile.hops;
            for core in &tile.cores {
                for synapse in &core.synapses {
                    ts.spike_count += synapse.spikes_processed;
                }
                for soma in &core.somas {
                    ts.neurons_fired += soma.neurons_fired;
                }
                ts.packets_sent += core.axon_out.packets_out;
            }
        }
        ts.energy = self.calculate_energy();

        self.total_energy += ts.energy;
        self.total_sim_time += ts.sim_time;
        self.total_spikes += ts.spike_count;
        self.total_neurons_fired += ts.neurons_fired;
        self.total_messages_sent += ts.packets_sent;

        let mut traces = std::mem::take(&mut self.traces);
        traces.record_timestep(self, &ts);
        self.traces = traces;

        ts
    }

    /// Reset per-timestep counters and per-neuron flags. Pipeline state
    /// that crosses the timestep buffer (input charge, pending spikes,
    /// the axon-out flag) is carried over, not cleared.
    fn reset_measurements(&mut self) {
        for tile in &mut self.tiles {
            tile.hops = 0;
            tile.north_hops = 0;
            tile.east_hops = 0;
            tile.south_hops = 0;
            tile.west_hops = 0;
            tile.messages_received = 0;
            for core in &mut tile.cores {
                core.axon_in.reset_counters();
                for synapse in &mut core.synapses {
                    synapse.reset_counters();
                }
                for dendrite in &mut core.dendrites {
                    dendrite.reset_counters();
                }
                for soma in &mut core.somas {
                    soma.reset_counters();
                }
                core.axon_out.reset_counters();
                core.messages_in.clear();
                core.next_message_generation_delay = 0.0;
                for axon in &mut core.axons_in {
                    axon.spikes_received = 0;
                }
                for neuron in &mut core.neurons {
                    neuron.status = NeuronStatus::Idle;
                }
            }
        }
    }

    /// Total energy for the current timestep: per-op unit energies plus
    /// counter-based axon and hop costs.
    fn calculate_energy(&self) -> f64 {
        let mut network_energy = 0.0;
        let mut axon_in_energy = 0.0;
        let mut unit_energy = 0.0;
        let mut axon_out_energy = 0.0;

        for tile in &self.tiles {
            #[allow(clippy::cast_precision_loss)]
            {
                network_energy += tile.east_hops as f64 * tile.energy_east_hop
                    + tile.west_hops as f64 * tile.energy_west_hop
                    + tile.north_hops as f64 * tile.energy_north_hop
                    + tile.south_hops as f64 * tile.energy_south_hop;
            }
            for core in &tile.cores {
                #[allow(clippy::cast_precision_loss)]
                {
                    axon_in_energy +=
                        core.axon_in.spike_messages_in as f64 * core.axon_in.energy_spike_message;
                    axon_out_energy +=
                        core.axon_out.packets_out as f64 * core.axon_out.energy_access;
                }
                unit_energy += core.synapses.iter().map(|u| u.energy).sum::<f64>();
                unit_energy += core.dendrites.iter().map(|u| u.energy).sum::<f64>();
                unit_energy += core.somas.iter().map(|u| u.energy).sum::<f64>();
            }
        }

        network_energy + axon_in_energy + unit_energy + axon_out_energy
    }

    /// Totals across every timestep simulated so far.
    #[must_use]
    pub fn run_summary(&self) -> RunData {
        RunData {
            energy: self.total_energy,
            sim_time: self.total_sim_time,
            wall_time: self.wall_time,
            spikes: self.total_spikes,
            packets_sent: self.total_messages_sent,
            neurons_fired: self.total_neurons_fired,
            timesteps_executed: self.total_timesteps,
        }
    }

    /// Average power over the simulated time, in watts.
    #[must_use]
    pub fn get_power(&self) -> f64 {
        if self.total_sim_time > 0.0 {
            self.total_energy / self.total_sim_time
        } else {
            0.0
        }
    }

    /// Clear all dynamic state: totals, counters, neuron and model state.
    /// The mapped network itself stays in place.
    pub fn reset(&mut self) {
        self.total_timesteps = 0;
        self.total_energy = 0.0;
        self.total_sim_time = 0.0;
        self.total_spikes = 0;
        self.total_messages_sent = 0;
        self.total_neurons_fired = 0;
        self.wall_time = 0.0;
        self.reset_measurements();
        for tile in &mut self.tiles {
            for core in &mut tile.cores {
                for synapse in &mut core.synapses {
                    synapse.model.reset();
                }
                for dendrite in &mut core.dendrites {
                    dendrite.model.reset();
                }
                for soma in &mut core.somas {
                    soma.model.reset();
                }
                for con in &mut core.connections_in {
                    con.last_updated = 0;
                }
                for neuron in &mut core.neurons {
                    neuron.status = NeuronStatus::Idle;
                    neuron.spike_count = 0;
                    neuron.dendrite_input_synapses.clear();
                    neuron.soma_input_charge = 0.0;
                    neuron.axon_out_input_spike = false;
                    neuron.dendrite_last_updated = 0;
                    neuron.soma_last_updated = 0;
                }
            }
        }
    }

    pub(crate) fn mapping_order(&self) -> &[(usize, usize)] {
        &self.mapping_order
    }
}

/// Snapshot of run totals, for computing per-call deltas.
struct RunSnapshot {
    energy: f64,
    sim_time: f64,
    spikes: u64,
    packets: u64,
    fired: u64,
    timesteps: u64,
}

impl RunSnapshot {
    fn of(chip: &SpikingChip) -> Self {
        Self {
            energy: chip.total_energy,
            sim_time: chip.total_sim_time,
            spikes: chip.total_spikes,
            packets: chip.total_messages_sent,
            fired: chip.total_neurons_fired,
            timesteps: chip.total_timesteps,
        }
    }

    fn delta(&self, chip: &SpikingChip, wall_time: f64) -> RunData {
        RunData {
            energy: chip.total_energy - self.energy,
            sim_time: chip.total_sim_time - self.sim_time,
            wall_time,
            spikes: chip.total_spikes - self.spikes,
            packets_sent: chip.total_messages_sent - self.packets,
            neurons_fired: chip.total_neurons_fired - self.fired,
            timesteps_executed: chip.total_timesteps - self.timesteps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{simple_arch, simple_net};

    #[test]
    fn axon_tables_deduplicate_destination_cores() {
        let arch = simple_arch(2, 1, 2, 2);
        let mut net = simple_net(&["a"], &[4]);
        // Neuron a.0 targets two neurons on core 2 and one back on its
        // own core: expect two out-axons, with spike counts 2 and 1.
        for post in 1..4 {
            net.connect(
                spikesim_desc::NeuronAddress::new("a", 0),
                spikesim_desc::NeuronAddress::new("a", post),
                AttributeMap::new(),
            )
            .unwrap();
        }
        net.map_neuron(spikesim_desc::NeuronAddress::new("a", 0), 0, 0).unwrap();
        net.map_neuron(spikesim_desc::NeuronAddress::new("a", 1), 1, 0).unwrap();
        net.map_neuron(spikesim_desc::NeuronAddress::new("a", 2), 1, 0).unwrap();
        net.map_neuron(spikesim_desc::NeuronAddress::new("a", 3), 0, 0).unwrap();

        let registry = ModelRegistry::with_builtins();
        let mut chip = SpikingChip::new(&arch, &registry).unwrap();
        chip.load(&net).unwrap();

        let pre = &chip.core(0).neurons[0];
        assert_eq!(pre.axons_out.len(), 2);
        let to_remote = pre.axons_out.iter().find(|a| a.dest_core_id == 2).unwrap();
        assert_eq!(to_remote.spikes, 2);
        let to_local = pre.axons_out.iter().find(|a| a.dest_core_id == 0).unwrap();
        assert_eq!(to_local.spikes, 1);

        // In-axon tables mirror the out-axons and stay dense.
        let remote = chip.core(2);
        assert_eq!(remote.axons_in.len(), 1);
        assert_eq!(remote.axons_in[0].synapse_addresses.len(), 2);
    }

    #[test]
    fn mapping_to_missing_core_fails() {
        let arch = simple_arch(1, 1, 1, 2);
        let mut net = simple_net(&["a"], &[1]);
        net.map_neuron(spikesim_desc::NeuronAddress::new("a", 0), 3, 0).unwrap();
        let registry = ModelRegistry::with_builtins();
        let mut chip = SpikingChip::new(&arch, &registry).unwrap();
        let err = chip.load(&net).unwrap_err();
        assert!(matches!(err, SimError::Mapping { .. }));
    }

    #[test]
    fn double_load_is_rejected() {
        let arch = simple_arch(1, 1, 1, 2);
        let mut net = simple_net(&["a"], &[1]);
        net.map_neuron(spikesim_desc::NeuronAddress::new("a", 0), 0, 0).unwrap();
        let registry = ModelRegistry::with_builtins();
        let mut chip = SpikingChip::new(&arch, &registry).unwrap();
        chip.load(&net).unwrap();
        assert!(chip.load(&net).is_err());
    }

    #[test]
    fn core_capacity_is_enforced() {
        let mut arch = simple_arch(1, 1, 1, 2);
        arch.tiles[0].cores[0].pipeline.max_neurons_supported = 1;
        let mut net = simple_net(&["a"], &[2]);
        net.map_neuron(spikesim_desc::NeuronAddress::new("a", 0), 0, 0).unwrap();
        net.map_neuron(spikesim_desc::NeuronAddress::new("a", 1), 0, 0).unwrap();
        let registry = ModelRegistry::with_builtins();
        let mut chip = SpikingChip::new(&arch, &registry).unwrap();
        let err = chip.load(&net).unwrap_err();
        assert!(err.to_string().contains("full"));
    }
}
