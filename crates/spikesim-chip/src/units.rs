//! Per-core hardware unit instances.
//!
//! Units pair a model (trait object) with the per-timestep counters and
//! the default per-event energy/latency metrics from the architecture
//! description. The pipeline drives the models and books costs into the
//! counters; the driver resets them at the start of every timestep and
//! reduces them into the step's energy figure.

use spikesim_desc::{
    AxonInConfiguration, AxonOutConfiguration, DendriteConfiguration, SomaConfiguration,
    SomaEnergyMetrics, SomaLatencyMetrics, SynapseConfiguration,
};

use crate::models::{DendriteModel, SomaModel, SynapseModel};

/// Axon-input unit: receives spike packets for the core.
#[derive(Debug)]
pub struct AxonInUnit {
    /// Unit name from the description.
    pub name: String,
    /// Packets received this timestep.
    pub spike_messages_in: u64,
    /// Energy per received packet (J).
    pub energy_spike_message: f64,
    /// Latency per received packet (s).
    pub latency_spike_message: f64,
}

impl AxonInUnit {
    pub(crate) fn new(config: &AxonInConfiguration) -> Self {
        Self {
            name: config.name.clone(),
            spike_messages_in: 0,
            energy_spike_message: config.energy_spike_message,
            latency_spike_message: config.latency_spike_message,
        }
    }

    pub(crate) fn reset_counters(&mut self) {
        self.spike_messages_in = 0;
    }
}

/// Synapse unit: weight storage plus the spike-processing cost model.
#[derive(Debug)]
pub struct SynapseUnit {
    /// Unit name from the description.
    pub name: String,
    /// Model name this unit was configured with.
    pub model_name: String,
    /// Synaptic spike lookups this timestep.
    pub spikes_processed: u64,
    /// Energy booked this timestep (J).
    pub energy: f64,
    /// Busy time booked this timestep (s).
    pub time: f64,
    /// Default energy per processed spike when the model reports none.
    pub default_energy_process_spike: Option<f64>,
    /// Default latency per processed spike when the model reports none.
    pub default_latency_process_spike: Option<f64>,
    /// The model instance.
    pub model: Box<dyn SynapseModel>,
}

impl SynapseUnit {
    pub(crate) fn new(config: &SynapseConfiguration, model: Box<dyn SynapseModel>) -> Self {
        Self {
            name: config.name.clone(),
            model_name: config.model.name.clone(),
            spikes_processed: 0,
            energy: 0.0,
            time: 0.0,
            default_energy_process_spike: config.energy_process_spike,
            default_latency_process_spike: config.latency_process_spike,
            model,
        }
    }

    pub(crate) fn reset_counters(&mut self) {
        self.spikes_processed = 0;
        self.energy = 0.0;
        self.time = 0.0;
    }
}

/// Dendrite unit: per-neuron charge integration.
#[derive(Debug)]
pub struct DendriteUnit {
    /// Unit name from the description.
    pub name: String,
    /// Model name this unit was configured with.
    pub model_name: String,
    /// Energy booked this timestep (J).
    pub energy: f64,
    /// Busy time booked this timestep (s).
    pub time: f64,
    /// Default energy per update when the model reports none.
    pub default_energy_update: Option<f64>,
    /// Default latency per update when the model reports none.
    pub default_latency_update: Option<f64>,
    /// The model instance.
    pub model: Box<dyn DendriteModel>,
}

impl DendriteUnit {
    pub(crate) fn new(config: &DendriteConfiguration, model: Box<dyn DendriteModel>) -> Self {
        Self {
            name: config.name.clone(),
            model_name: config.model.name.clone(),
            energy: 0.0,
            time: 0.0,
            default_energy_update: config.energy_update,
            default_latency_update: config.latency_update,
            model,
        }
    }

    pub(crate) fn reset_counters(&mut self) {
        self.energy = 0.0;
        self.time = 0.0;
    }
}

/// Soma unit: membrane dynamics and firing decisions.
#[derive(Debug)]
pub struct SomaUnit {
    /// Unit name from the description.
    pub name: String,
    /// Model name this unit was configured with.
    pub model_name: String,
    /// Neurons whose state was written back this timestep.
    pub neuron_updates: u64,
    /// Neurons that fired this timestep.
    pub neurons_fired: u64,
    /// Neurons mapped to this unit.
    pub neuron_count: u64,
    /// Energy booked this timestep (J).
    pub energy: f64,
    /// Busy time booked this timestep (s).
    pub time: f64,
    /// Default per-event energies when the model reports none.
    pub default_energy_metrics: SomaEnergyMetrics,
    /// Default per-event latencies when the model reports none.
    pub default_latency_metrics: SomaLatencyMetrics,
    /// The model instance.
    pub model: Box<dyn SomaModel>,
}

impl SomaUnit {
    pub(crate) fn new(config: &SomaConfiguration, model: Box<dyn SomaModel>) -> Self {
        Self {
            name: config.name.clone(),
            model_name: config.model.name.clone(),
            neuron_updates: 0,
            neurons_fired: 0,
            neuron_count: 0,
            energy: 0.0,
            time: 0.0,
            default_energy_metrics: config.energy_metrics.unwrap_or_default(),
            default_latency_metrics: config.latency_metrics.unwrap_or_default(),
            model,
        }
    }

    pub(crate) fn reset_counters(&mut self) {
        self.neuron_updates = 0;
        self.neurons_fired = 0;
        self.energy = 0.0;
        self.time = 0.0;
    }
}

/// Axon-output unit: packet emission.
#[derive(Debug)]
pub struct AxonOutUnit {
    /// Unit name from the description.
    pub name: String,
    /// Packets sent this timestep.
    pub packets_out: u64,
    /// Energy per sent packet (J).
    pub energy_access: f64,
    /// Latency per sent packet (s).
    pub latency_access: f64,
}

impl AxonOutUnit {
    pub(crate) fn new(config: &AxonOutConfiguration) -> Self {
        Self {
            name: config.name.clone(),
            packets_out: 0,
            energy_access: config.energy_access,
            latency_access: config.latency_access,
        }
    }

    pub(crate) fn reset_counters(&mut self) {
        self.packets_out = 0;
    }
}
