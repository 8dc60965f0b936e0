//! Spike messages and the per-timestep container.

/// Hardware address of a message source: tile coordinates plus core ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceAddress {
    /// Source tile x coordinate.
    pub x: usize,
    /// Source tile y coordinate.
    pub y: usize,
    /// Source tile id.
    pub tile_id: usize,
    /// Source core id (global).
    pub core_id: usize,
    /// Source core offset within its tile.
    pub core_offset: usize,
}

/// Destination side of a spike message, resolved from the sending
/// neuron's out-axon record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationAddress {
    /// Destination tile x coordinate.
    pub x: usize,
    /// Destination tile y coordinate.
    pub y: usize,
    /// Destination tile id.
    pub tile_id: usize,
    /// Destination core id (global).
    pub core_id: usize,
    /// Destination core offset within its tile.
    pub core_offset: usize,
    /// In-axon entry on the destination core.
    pub axon_id: usize,
}

/// One spike packet, or a placeholder carrying processing time that
/// produced no spike.
///
/// Identity fields are set at creation by the pipeline; the scheduling
/// fields are filled in by the NoC scheduler, which consumes each message
/// exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Source neuron's group name.
    pub src_group: String,
    /// Source neuron id within its group.
    pub src_neuron_id: usize,
    /// Source hardware address.
    pub src: SourceAddress,
    /// Destination hardware address. Meaningless for placeholders.
    pub dest: DestinationAddress,
    /// Timestep this message belongs to.
    pub timestep: u64,
    /// Manhattan hop count from source to destination tile.
    pub hops: usize,
    /// Number of synapses addressed at the destination.
    pub spikes: usize,
    /// Time the source core spent producing this message (s).
    pub generation_delay: f64,
    /// Estimated uncongested network traversal time (s).
    pub network_delay: f64,
    /// Time the destination core spends processing this message (s).
    pub receive_delay: f64,
    /// Extra sending delay imposed by congestion back-pressure (s).
    pub blocked_delay: f64,
    /// When the message enters the NoC.
    pub sent_timestamp: f64,
    /// When the last flit reaches the destination core.
    pub received_timestamp: f64,
    /// When the destination core finishes processing it.
    pub processed_timestamp: f64,
    /// True while the message occupies the NoC.
    pub in_noc: bool,
    /// True for the per-core placeholder that carries leftover
    /// processing latency.
    pub placeholder: bool,
}

impl Message {
    fn base(src_group: String, src_neuron_id: usize, src: SourceAddress, timestep: u64) -> Self {
        Self {
            src_group,
            src_neuron_id,
            src,
            dest: DestinationAddress {
                x: 0,
                y: 0,
                tile_id: 0,
                core_id: 0,
                core_offset: 0,
                axon_id: 0,
            },
            timestep,
            hops: 0,
            spikes: 0,
            generation_delay: 0.0,
            network_delay: 0.0,
            receive_delay: 0.0,
            blocked_delay: 0.0,
            sent_timestamp: f64::NEG_INFINITY,
            received_timestamp: f64::NEG_INFINITY,
            processed_timestamp: f64::NEG_INFINITY,
            in_noc: false,
            placeholder: true,
        }
    }

    /// A placeholder event: advances the source core's clock by
    /// `generation_delay` without entering the NoC.
    #[must_use]
    pub fn placeholder(
        src_group: String,
        src_neuron_id: usize,
        src: SourceAddress,
        timestep: u64,
        generation_delay: f64,
    ) -> Self {
        let mut m = Self::base(src_group, src_neuron_id, src, timestep);
        m.generation_delay = generation_delay;
        m
    }

    /// A real spike packet addressed at one destination core's in-axon.
    #[must_use]
    pub fn spike(
        src_group: String,
        src_neuron_id: usize,
        src: SourceAddress,
        dest: DestinationAddress,
        timestep: u64,
        spikes: usize,
    ) -> Self {
        let mut m = Self::base(src_group, src_neuron_id, src, timestep);
        m.dest = dest;
        m.spikes = spikes;
        m.placeholder = false;
        m
    }
}

/// Everything produced within one timestep: the per-source-core message
/// queues plus the step's aggregate counters.
#[derive(Debug)]
pub struct Timestep {
    /// Timestep number, starting at 1.
    pub timestep: u64,
    /// Ordered message queues indexed by source core id.
    pub messages: Vec<Vec<Message>>,
    /// Synaptic spike events processed.
    pub spike_count: u64,
    /// Neurons that fired.
    pub neurons_fired: u64,
    /// Real packets sent into the NoC.
    pub packets_sent: u64,
    /// Inter-tile hops across all messages.
    pub total_hops: u64,
    /// Energy consumed this step (J).
    pub energy: f64,
    /// Modeled duration of this step (s).
    pub sim_time: f64,
}

impl Timestep {
    /// Create an empty container for `core_count` source cores.
    #[must_use]
    pub fn new(timestep: u64, core_count: usize) -> Self {
        Self {
            timestep,
            messages: (0..core_count).map(|_| Vec::new()).collect(),
            spike_count: 0,
            neurons_fired: 0,
            packets_sent: 0,
            total_hops: 0,
            energy: 0.0,
            sim_time: 0.0,
        }
    }

    /// Iterate all real (non-placeholder) messages in source-core order.
    pub fn spike_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().flatten().filter(|m| !m.placeholder)
    }
}
