//! Spiking-network description model.
//!
//! A [`SpikingNetwork`] is the hardware-independent form of a network: a
//! set of neuron groups, the directed connections between neurons, and an
//! explicit mapping of every neuron onto a `(tile, core)` slot. The
//! simulation kernel consumes it once, at load time.

use std::collections::BTreeSet;
use std::fmt;

use crate::arch::AttributeMap;
use crate::error::{DescError, Result};

/// A neuron referenced as `group.nid`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NeuronAddress {
    /// Parent group name.
    pub group: String,
    /// Neuron id within the group.
    pub neuron: usize,
}

impl NeuronAddress {
    /// Build an address from its parts.
    #[must_use]
    pub fn new(group: impl Into<String>, neuron: usize) -> Self {
        Self { group: group.into(), neuron }
    }

    /// Parse the `group.nid` spelling. The neuron id follows the last dot.
    pub fn parse(s: &str) -> Result<Self> {
        let (group, nid) = s
            .rsplit_once('.')
            .ok_or_else(|| DescError::unknown(s, "expected `group.neuron_id`"))?;
        let neuron = nid
            .parse::<usize>()
            .map_err(|_| DescError::unknown(s, "neuron id is not an integer"))?;
        if group.is_empty() {
            return Err(DescError::unknown(s, "empty group name"));
        }
        Ok(Self { group: group.to_owned(), neuron })
    }
}

impl fmt::Display for NeuronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.neuron)
    }
}

/// Per-neuron parameters: hardware unit bindings, trace flags, and the
/// attribute map forwarded to the soma/dendrite models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeuronParameters {
    /// Soma unit to bind to; first soma unit on the core when `None`.
    pub soma_hw_name: Option<String>,
    /// Dendrite unit to bind to; first dendrite unit when `None`.
    pub dendrite_hw_name: Option<String>,
    /// Default synapse unit for this neuron's outgoing connections.
    pub synapse_hw_name: Option<String>,
    /// Record this neuron in the spike trace.
    pub log_spikes: bool,
    /// Record this neuron's potential in the potential trace.
    pub log_potential: bool,
    /// Update the soma every timestep even without input charge.
    pub force_update: bool,
    /// Fire unconditionally for this many timesteps.
    pub forced_spikes: u32,
    /// Model attributes (threshold, bias, leak, ...), forwarded verbatim.
    pub attributes: AttributeMap,
}

/// One neuron of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronConfiguration {
    /// Neuron id, dense within the group.
    pub id: usize,
    /// Resolved parameters (group defaults plus per-neuron overrides).
    pub params: NeuronParameters,
}

/// A group of neurons sharing default parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronGroup {
    /// Group name, unique within the network.
    pub name: String,
    /// Defaults applied to every neuron at creation.
    pub defaults: NeuronParameters,
    /// Neurons in id order.
    pub neurons: Vec<NeuronConfiguration>,
}

impl NeuronGroup {
    /// Append `count` neurons cloned from the group defaults.
    pub fn add_neurons(&mut self, count: usize) {
        let base = self.neurons.len();
        for i in 0..count {
            self.neurons
                .push(NeuronConfiguration { id: base + i, params: self.defaults.clone() });
        }
    }

    /// Mutable access to one neuron, for per-neuron overrides.
    pub fn neuron_mut(&mut self, id: usize) -> Option<&mut NeuronConfiguration> {
        self.neurons.get_mut(id)
    }
}

/// A directed edge between two neurons.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    /// Stable id, dense in declaration order.
    pub id: usize,
    /// Source neuron.
    pub pre: NeuronAddress,
    /// Destination neuron.
    pub post: NeuronAddress,
    /// Synapse unit on the destination core holding this edge's weight;
    /// falls back to the pre-neuron's default, then the core's first unit.
    pub synapse_hw_name: Option<String>,
    /// Edge attributes: `weight`/`w` goes to the synapse model, everything
    /// else is carried as dendrite parameters.
    pub attributes: AttributeMap,
}

/// Assignment of one neuron to a core slot.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronMapping {
    /// The neuron being placed.
    pub neuron: NeuronAddress,
    /// Destination tile id.
    pub tile: usize,
    /// Destination core offset within the tile.
    pub core_offset: usize,
}

/// A complete network description: groups, connections and mappings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpikingNetwork {
    /// Network name.
    pub name: String,
    /// Groups in declaration order.
    pub groups: Vec<NeuronGroup>,
    /// Connections in declaration order.
    pub connections: Vec<Connection>,
    /// Mappings in declaration order; this order is the mapping order the
    /// kernel preserves.
    pub mappings: Vec<NeuronMapping>,
}

impl SpikingNetwork {
    /// Create an empty network.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Add a group with the given defaults.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate group name.
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        defaults: NeuronParameters,
    ) -> Result<&mut NeuronGroup> {
        let name = name.into();
        if self.groups.iter().any(|g| g.name == name) {
            return Err(DescError::config("network.groups", format!("duplicate group `{name}`")));
        }
        self.groups.push(NeuronGroup { name, defaults, neurons: Vec::new() });
        Ok(self.groups.last_mut().expect("group just pushed"))
    }

    /// Look up a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&NeuronGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Mutable group lookup.
    pub fn group_mut(&mut self, name: &str) -> Option<&mut NeuronGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    fn check_neuron(&self, address: &NeuronAddress) -> Result<()> {
        let group = self
            .group(&address.group)
            .ok_or_else(|| DescError::unknown(address.to_string(), "no such group"))?;
        if address.neuron >= group.neurons.len() {
            return Err(DescError::unknown(
                address.to_string(),
                format!("group `{}` has {} neurons", group.name, group.neurons.len()),
            ));
        }
        Ok(())
    }

    /// Add a connection after validating both endpoints. Returns its id.
    ///
    /// # Errors
    ///
    /// Fails when either endpoint does not exist.
    pub fn connect(
        &mut self,
        pre: NeuronAddress,
        post: NeuronAddress,
        attributes: AttributeMap,
    ) -> Result<usize> {
        self.check_neuron(&pre)?;
        self.check_neuron(&post)?;
        let synapse_hw_name = self
            .group(&pre.group)
            .and_then(|g| g.neurons.get(pre.neuron))
            .and_then(|n| n.params.synapse_hw_name.clone());
        let id = self.connections.len();
        self.connections.push(Connection { id, pre, post, synapse_hw_name, attributes });
        Ok(id)
    }

    /// Map one neuron onto `(tile, core_offset)`.
    ///
    /// # Errors
    ///
    /// Fails when the neuron does not exist or is already mapped.
    pub fn map_neuron(&mut self, neuron: NeuronAddress, tile: usize, core_offset: usize) -> Result<()> {
        self.check_neuron(&neuron)?;
        if self.mappings.iter().any(|m| m.neuron == neuron) {
            return Err(DescError::config(
                "network.mappings",
                format!("neuron `{neuron}` mapped twice"),
            ));
        }
        self.mappings.push(NeuronMapping { neuron, tile, core_offset });
        Ok(())
    }

    /// Check that every neuron has exactly one mapping.
    ///
    /// # Errors
    ///
    /// Names the first unmapped neuron found.
    pub fn check_fully_mapped(&self) -> Result<()> {
        let mapped: BTreeSet<&NeuronAddress> = self.mappings.iter().map(|m| &m.neuron).collect();
        for group in &self.groups {
            for n in &group.neurons {
                let address = NeuronAddress::new(group.name.clone(), n.id);
                if !mapped.contains(&address) {
                    return Err(DescError::config(
                        "network.mappings",
                        format!("neuron `{address}` is not mapped to any core"),
                    ));
                }
            }
        }
        Ok(())
    }
}
