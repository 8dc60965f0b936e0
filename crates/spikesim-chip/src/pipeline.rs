//! The per-timestep processing pipeline.
//!
//! Every core runs the fixed unit order axon-in → synapse → dendrite →
//! soma → axon-out, split in two by the core's buffer position:
//!
//! | buffer | receive side (per spike) | process side (per neuron) |
//! |--------|--------------------------|---------------------------|
//! | `before_dendrite` | synapse | dendrite, soma, axon-out |
//! | `before_soma` | synapse, dendrite | soma, axon-out |
//! | `before_axon_out` | synapse, dendrite, soma | axon-out |
//!
//! [`process_neurons`] walks every mapped neuron and materializes spike
//! messages (plus one trailing placeholder per core for latency that
//! produced no spike). [`process_messages`] then routes each message to
//! its destination core and accumulates its receive-side latency.
//!
//! Dendrite and soma state is advanced lazily: each unit catches up one
//! model invocation per missed timestep before integrating new input, so
//! decay behaves identically whether or not a core saw traffic.

use spikesim_desc::BufferPosition;
use tracing::trace;

use crate::chip::{Core, MappedConnection, MappedNeuron, SpikingChip};
use crate::message::{DestinationAddress, Message, SourceAddress, Timestep};
use crate::models::{DendriteInput, NeuronStatus};
use crate::units::{DendriteUnit, SomaUnit, SynapseUnit};

/// Phase one: process every mapped neuron on every core, in mapping
/// order, appending generated messages to the timestep's per-core
/// queues.
pub(crate) fn process_neurons(ts: &mut Timestep, chip: &mut SpikingChip) {
    for tile in &mut chip.tiles {
        for core in &mut tile.cores {
            let queue = &mut ts.messages[core.id];
            for address in 0..core.neurons.len() {
                process_neuron(ts.timestep, core, address, queue);
            }

            // Any latency not attributed to a spike message still
            // occupies the core; a placeholder carries it into the
            // schedule.
            if core.next_message_generation_delay != 0.0 {
                let last = core.neurons.last().expect("latency implies mapped neurons");
                queue.push(Message::placeholder(
                    last.group_name.clone(),
                    last.neuron_id,
                    source_of(core),
                    ts.timestep,
                    core.next_message_generation_delay,
                ));
                core.next_message_generation_delay = 0.0;
            }
        }
    }
}

/// Phase two: resolve network costs for every spike message, deliver it
/// to its destination core, and accumulate its receive-side latency.
pub(crate) fn process_messages(ts: &mut Timestep, chip: &mut SpikingChip) {
    // Fan-out: fill in hops and the uncongested network delay, then
    // enqueue on the destination core in deterministic source order.
    for src_core in 0..ts.messages.len() {
        for index in 0..ts.messages[src_core].len() {
            let (placeholder, src_tile, dest_tile, dest_core) = {
                let m = &ts.messages[src_core][index];
                (m.placeholder, m.src.tile_id, m.dest.tile_id, m.dest.core_id)
            };
            if placeholder {
                continue;
            }
            let (network_delay, hops) = estimate_network_costs(chip, src_tile, dest_tile);
            let m = &mut ts.messages[src_core][index];
            m.network_delay = network_delay;
            m.hops = hops;
            chip.core_mut(dest_core).messages_in.push((src_core, index));
        }
    }

    // Receive processing, per core, in arrival order.
    for tile in &mut chip.tiles {
        for core in &mut tile.cores {
            let pending = std::mem::take(&mut core.messages_in);
            trace!(core = core.id, messages = pending.len(), "receiving");
            for &(src_core, index) in &pending {
                let m = &mut ts.messages[src_core][index];
                let delay = process_message(ts.timestep, core, m);
                m.receive_delay += delay;
            }
            core.messages_in = pending;
        }
    }
}

fn source_of(core: &Core) -> SourceAddress {
    SourceAddress {
        x: core.location.x,
        y: core.location.y,
        tile_id: core.parent_tile_id,
        core_id: core.id,
        core_offset: core.offset,
    }
}

/// Per-direction hop latencies come from the source tile; hop counters
/// land on the destination tile for the energy reduction.
#[allow(clippy::cast_precision_loss)]
fn estimate_network_costs(
    chip: &mut SpikingChip,
    src_tile_id: usize,
    dest_tile_id: usize,
) -> (f64, usize) {
    let (src_x, src_y, lat_east, lat_west, lat_north, lat_south) = {
        let src = &chip.tiles[src_tile_id];
        (
            src.x,
            src.y,
            src.latency_east_hop,
            src.latency_west_hop,
            src.latency_north_hop,
            src.latency_south_hop,
        )
    };
    let dest = &mut chip.tiles[dest_tile_id];
    let x_hops = src_x.abs_diff(dest.x);
    let y_hops = src_y.abs_diff(dest.y);

    let mut network_delay = 0.0;
    if src_x < dest.x {
        dest.east_hops += x_hops as u64;
        network_delay += x_hops as f64 * lat_east;
    } else {
        dest.west_hops += x_hops as u64;
        network_delay += x_hops as f64 * lat_west;
    }
    if src_y < dest.y {
        dest.north_hops += y_hops as u64;
        network_delay += y_hops as f64 * lat_north;
    } else {
        dest.south_hops += y_hops as u64;
        network_delay += y_hops as f64 * lat_south;
    }
    dest.hops += (x_hops + y_hops) as u64;
    dest.messages_received += 1;

    (network_delay, x_hops + y_hops)
}

/// Run the process-side units for one neuron and emit its messages.
fn process_neuron(timestep: u64, core: &mut Core, address: usize, queue: &mut Vec<Message>) {
    let source = source_of(core);
    let Core {
        pipeline,
        neurons,
        dendrites,
        somas,
        connections_in,
        axon_out,
        next_message_generation_delay,
        ..
    } = core;
    let buffer = pipeline.buffer_position;
    let neuron = &mut neurons[address];

    let dendrite_unit = neuron.dendrite_unit;
    let soma_unit = neuron.soma_unit;
    let mut latency = 0.0;
    if buffer == BufferPosition::BeforeDendrite {
        latency += process_dendrite(timestep, neuron, &mut dendrites[dendrite_unit], connections_in);
    }
    if buffer <= BufferPosition::BeforeSoma {
        latency += process_soma(timestep, neuron, &mut somas[soma_unit]);
    }
    *next_message_generation_delay += latency;

    // Axon-out: one message per out-axon, each draining the accumulated
    // generation delay so the sum over all messages stays conserved.
    if neuron.axon_out_input_spike {
        trace!(
            group = %neuron.group_name,
            neuron = neuron.neuron_id,
            axons = neuron.axons_out.len(),
            "sending spike messages"
        );
        for axon in &neuron.axons_out {
            let dest = DestinationAddress {
                x: axon.dest_x,
                y: axon.dest_y,
                tile_id: axon.dest_tile_id,
                core_id: axon.dest_core_id,
                core_offset: axon.dest_core_offset,
                axon_id: axon.dest_axon_id,
            };
            let mut m = Message::spike(
                neuron.group_name.clone(),
                neuron.neuron_id,
                source,
                dest,
                timestep,
                axon.spikes,
            );
            m.generation_delay = *next_message_generation_delay + axon_out.latency_access;
            *next_message_generation_delay = 0.0;
            queue.push(m);
            axon_out.packets_out += 1;
        }
        neuron.axon_out_input_spike = false;
    }

    neuron.spike_count = 0;
}

/// Receive-side processing for one message: axon-in, then every synapse
/// the in-axon fans out to, then dendrite/soma as far as the buffer
/// position allows. Returns the accumulated latency.
fn process_message(timestep: u64, core: &mut Core, m: &Message) -> f64 {
    let Core {
        pipeline,
        axon_in,
        synapses,
        dendrites,
        somas,
        neurons,
        connections_in,
        axons_in,
        ..
    } = core;
    let buffer = pipeline.buffer_position;

    axon_in.spike_messages_in += 1;
    let mut latency = axon_in.latency_spike_message;

    assert!(m.dest.axon_id < axons_in.len(), "message addresses an unknown in-axon");
    axons_in[m.dest.axon_id].spikes_received += 1;

    for k in 0..axons_in[m.dest.axon_id].synapse_addresses.len() {
        let synapse_address = axons_in[m.dest.axon_id].synapse_addresses[k];
        latency += process_synapse(timestep, connections_in, synapses, neurons, synapse_address);
        if buffer == BufferPosition::BeforeDendrite {
            continue;
        }
        let post = connections_in[synapse_address].post_neuron;
        let neuron = &mut neurons[post];
        let dendrite_unit = neuron.dendrite_unit;
        let soma_unit = neuron.soma_unit;
        latency += process_dendrite(timestep, neuron, &mut dendrites[dendrite_unit], connections_in);
        if buffer == BufferPosition::BeforeSoma {
            continue;
        }
        debug_assert_eq!(buffer, BufferPosition::BeforeAxonOut);
        latency += process_soma(timestep, neuron, &mut somas[soma_unit]);
    }

    latency
}

/// Advance one synapse to the current timestep and process a spike
/// through it, buffering the resulting current at the post-neuron's
/// dendrite.
fn process_synapse(
    timestep: u64,
    connections: &mut [MappedConnection],
    synapses: &mut [SynapseUnit],
    neurons: &mut [MappedNeuron],
    synapse_address: usize,
) -> f64 {
    let con = &mut connections[synapse_address];
    let unit = &mut synapses[con.synapse_unit];

    while con.last_updated < timestep {
        con.last_updated += 1;
        let _ = unit.model.update(synapse_address, false);
    }

    let result = unit.model.update(synapse_address, true);
    let latency = result.latency.or(unit.default_latency_process_spike).unwrap_or(0.0);
    let energy = result.energy.or(unit.default_energy_process_spike).unwrap_or(0.0);
    unit.spikes_processed += 1;
    unit.energy += energy;
    unit.time += latency;

    let post = &mut neurons[con.post_neuron];
    post.dendrite_input_synapses.push((result.current, synapse_address));
    post.spike_count += 1;

    latency
}

/// Catch the dendrite up one decay step per missed timestep, then
/// integrate any buffered synaptic inputs. The last result is the charge
/// the soma will see.
fn process_dendrite(
    timestep: u64,
    neuron: &mut MappedNeuron,
    unit: &mut DendriteUnit,
    connections: &[MappedConnection],
) -> f64 {
    let mut latency = 0.0;
    while neuron.dendrite_last_updated < timestep {
        neuron.dendrite_last_updated += 1;
        let result = unit.model.update(neuron.mapped_address, None);
        neuron.soma_input_charge = result.current;
        latency += account_dendrite(unit, result.energy, result.latency);
    }

    let inputs = std::mem::take(&mut neuron.dendrite_input_synapses);
    for (current, connection_index) in inputs {
        let input =
            DendriteInput { current, params: &connections[connection_index].dendrite_params };
        let result = unit.model.update(neuron.mapped_address, Some(input));
        neuron.soma_input_charge = result.current;
        latency += account_dendrite(unit, result.energy, result.latency);
    }

    latency
}

fn account_dendrite(unit: &mut DendriteUnit, energy: Option<f64>, latency: Option<f64>) -> f64 {
    let energy = energy.or(unit.default_energy_update).unwrap_or(0.0);
    let latency = latency.or(unit.default_latency_update).unwrap_or(0.0);
    unit.energy += energy;
    unit.time += latency;
    latency
}

/// Advance the soma to the current timestep. Charge is passed only when
/// something accumulated, a spike arrived this step, or the neuron is
/// forced to update; forced spikes override the model's verdict.
fn process_soma(timestep: u64, neuron: &mut MappedNeuron, unit: &mut SomaUnit) -> f64 {
    let mut latency = 0.0;
    while neuron.soma_last_updated < timestep {
        neuron.soma_last_updated += 1;

        let current_in = if neuron.spike_count > 0
            || neuron.soma_input_charge.abs() > 0.0
            || neuron.force_update
        {
            let charge = neuron.soma_input_charge;
            neuron.soma_input_charge = 0.0;
            Some(charge)
        } else {
            None
        };

        let result = unit.model.update(neuron.mapped_address, current_in);
        let mut status = result.status;
        if neuron.forced_spikes > 0 {
            status = NeuronStatus::Fired;
            neuron.forced_spikes -= 1;
        }

        let metrics_l = unit.default_latency_metrics;
        let metrics_e = unit.default_energy_metrics;
        let mut default_latency = metrics_l.latency_access_neuron;
        let mut default_energy = metrics_e.energy_access_neuron;
        if matches!(status, NeuronStatus::Updated | NeuronStatus::Fired) {
            default_latency += metrics_l.latency_update_neuron;
            default_energy += metrics_e.energy_update_neuron;
            unit.neuron_updates += 1;
        }
        if status == NeuronStatus::Fired {
            default_latency += metrics_l.latency_spike_out;
            default_energy += metrics_e.energy_spike_out;
            unit.neurons_fired += 1;
            neuron.axon_out_input_spike = true;
        }

        let step_latency = result.latency.unwrap_or(default_latency);
        let step_energy = result.energy.unwrap_or(default_energy);
        unit.time += step_latency;
        unit.energy += step_energy;
        latency += step_latency;

        neuron.status = status;
    }

    latency
}
