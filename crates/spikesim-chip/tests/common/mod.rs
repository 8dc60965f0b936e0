//! Shared fixtures for the end-to-end tests.
#![allow(dead_code)]

use spikesim_desc::{
    Architecture, AttributeMap, AttributeValue, AxonInConfiguration, AxonOutConfiguration,
    BufferPosition, CoreConfiguration, CorePipelineConfiguration, DendriteConfiguration,
    ModelInfo, NeuronParameters, NocConfiguration, SomaConfiguration, SomaLatencyMetrics,
    SynapseConfiguration, TilePowerMetrics,
};

/// Per-event latencies for the fixture architecture. Energies stay zero;
/// the scenarios check timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Costs {
    pub axon_in: f64,
    pub synapse: f64,
    pub soma_access: f64,
    pub soma_update: f64,
    pub soma_spike: f64,
    pub axon_out: f64,
    /// Hop latency, identical in all four directions.
    pub hop: f64,
}

/// A full mesh where every core carries a `current_based` synapse, an
/// `accumulator` dendrite, a `lif` soma plus an `input` soma, with the
/// given per-event latencies.
pub fn build_arch(
    width: usize,
    height: usize,
    cores: usize,
    buffer_size: usize,
    costs: &Costs,
    buffer_position: BufferPosition,
) -> Architecture {
    let noc =
        NocConfiguration { width, height, max_cores_per_tile: cores, link_buffer_size: buffer_size };
    let metrics = TilePowerMetrics {
        latency_north_hop: costs.hop,
        latency_east_hop: costs.hop,
        latency_south_hop: costs.hop,
        latency_west_hop: costs.hop,
        ..TilePowerMetrics::default()
    };
    let soma_latency = SomaLatencyMetrics {
        latency_access_neuron: costs.soma_access,
        latency_update_neuron: costs.soma_update,
        latency_spike_out: costs.soma_spike,
    };

    let mut arch = Architecture::new("fixture", noc);
    for t in 0..width * height {
        let tile = arch.add_tile(format!("tile[{t}]"), metrics).unwrap();
        for c in 0..cores {
            tile.add_core(CoreConfiguration {
                name: format!("core[{c}]"),
                offset: c,
                pipeline: CorePipelineConfiguration {
                    buffer_position,
                    max_neurons_supported: 1024,
                },
                axon_in: AxonInConfiguration {
                    name: "axon_in".into(),
                    energy_spike_message: 0.0,
                    latency_spike_message: costs.axon_in,
                },
                synapses: vec![SynapseConfiguration {
                    name: "synapse".into(),
                    model: ModelInfo { name: "current_based".into(), attributes: AttributeMap::new() },
                    energy_process_spike: None,
                    latency_process_spike: Some(costs.synapse),
                }],
                dendrites: vec![DendriteConfiguration {
                    name: "dendrite".into(),
                    model: ModelInfo { name: "accumulator".into(), attributes: AttributeMap::new() },
                    energy_update: None,
                    latency_update: None,
                }],
                somas: vec![
                    SomaConfiguration {
                        name: "lif".into(),
                        model: ModelInfo { name: "loihi_lif".into(), attributes: AttributeMap::new() },
                        energy_metrics: None,
                        latency_metrics: Some(soma_latency),
                    },
                    SomaConfiguration {
                        name: "input".into(),
                        model: ModelInfo { name: "input".into(), attributes: AttributeMap::new() },
                        energy_metrics: None,
                        latency_metrics: Some(soma_latency),
                    },
                ],
                axon_out: AxonOutConfiguration {
                    name: "axon_out".into(),
                    energy_access: 0.0,
                    latency_access: costs.axon_out,
                },
            });
        }
    }
    arch
}

/// LIF neuron with hard reset to zero.
pub fn lif_neuron(threshold: f64, bias: f64) -> NeuronParameters {
    let mut attributes = AttributeMap::new();
    attributes.insert("threshold".into(), threshold.into());
    attributes.insert("bias".into(), bias.into());
    attributes.insert("reset".into(), 0.0.into());
    NeuronParameters { attributes, ..NeuronParameters::default() }
}

/// Neuron bound to the `input` soma unit, replaying the given 0/1 train.
pub fn input_neuron(spikes: &[i64]) -> NeuronParameters {
    let mut attributes = AttributeMap::new();
    attributes.insert(
        "spikes".into(),
        AttributeValue::List(spikes.iter().map(|&s| AttributeValue::Int(s)).collect()),
    );
    NeuronParameters {
        soma_hw_name: Some("input".into()),
        attributes,
        ..NeuronParameters::default()
    }
}

/// Edge attribute map carrying only a weight.
pub fn weight(w: f64) -> AttributeMap {
    let mut attributes = AttributeMap::new();
    attributes.insert("weight".into(), w.into());
    attributes
}

pub fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < 1e-15,
        "{what}: expected {expected:e}, got {actual:e}"
    );
}
