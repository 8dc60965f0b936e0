//! YAML loading for architecture and network descriptions.
//!
//! Both formats are parsed in two stages: serde deserializes the document
//! shape (unknown *sections* are rejected by serde itself), then the
//! attribute maps are validated key-by-key so an unrecognized structural
//! attribute fails with an error naming the field. Model attributes are
//! deliberately open-ended and pass through untouched.
//!
//! Tile and core names may declare instance ranges: `core[0..3]` expands
//! to four cores named `core[0]` ... `core[3]` with identical
//! configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::arch::{
    Architecture, AttributeMap, AttributeValue, AxonInConfiguration, AxonOutConfiguration,
    BufferPosition, CoreConfiguration, CorePipelineConfiguration, DendriteConfiguration,
    ModelInfo, NocConfiguration, SomaConfiguration, SomaEnergyMetrics, SomaLatencyMetrics,
    SynapseConfiguration, TileConfiguration, TilePowerMetrics,
};
use crate::error::{DescError, Result};
use crate::network::{NeuronAddress, NeuronParameters, SpikingNetwork};

// ---------------------------------------------------------------------------
// Raw document shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArchFile {
    architecture: ArchSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArchSection {
    name: String,
    #[serde(default)]
    attributes: AttributeMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tile: Vec<TileSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TileSection {
    name: String,
    #[serde(default)]
    attributes: AttributeMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    core: Vec<CoreSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CoreSection {
    name: String,
    #[serde(default)]
    attributes: AttributeMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    axon_in: Vec<UnitSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    synapse: Vec<UnitSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dendrite: Vec<UnitSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    soma: Vec<UnitSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    axon_out: Vec<UnitSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitSection {
    name: String,
    #[serde(default)]
    attributes: AttributeMap,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetFile {
    network: NetSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetSection {
    name: String,
    #[serde(default)]
    groups: Vec<GroupSection>,
    #[serde(default)]
    edges: Vec<EdgeSection>,
    #[serde(default)]
    mappings: Vec<MappingSection>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupSection {
    name: String,
    neurons: usize,
    #[serde(default)]
    attributes: AttributeMap,
    #[serde(default)]
    overrides: Vec<OverrideSection>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct OverrideSection {
    neuron: usize,
    #[serde(default)]
    attributes: AttributeMap,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeSection {
    source: String,
    dest: String,
    #[serde(default)]
    attributes: AttributeMap,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingSection {
    neuron: String,
    core: String,
}

// ---------------------------------------------------------------------------
// Attribute helpers
// ---------------------------------------------------------------------------

fn take_f64(map: &mut AttributeMap, field: &str, key: &str) -> Result<Option<f64>> {
    match map.remove(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| DescError::config(format!("{field}.{key}"), "expected a number")),
    }
}

fn take_usize(map: &mut AttributeMap, field: &str, key: &str) -> Result<Option<usize>> {
    match map.remove(key) {
        None => Ok(None),
        Some(v) => match v.as_i64() {
            Some(i) if i >= 0 => Ok(Some(usize::try_from(i).expect("checked non-negative"))),
            _ => Err(DescError::config(
                format!("{field}.{key}"),
                "expected a non-negative integer",
            )),
        },
    }
}

fn take_bool(map: &mut AttributeMap, field: &str, key: &str) -> Result<Option<bool>> {
    match map.remove(key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| DescError::config(format!("{field}.{key}"), "expected a boolean")),
    }
}

fn take_string(map: &mut AttributeMap, field: &str, key: &str) -> Result<Option<String>> {
    match map.remove(key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(str::to_owned)
            .map(Some)
            .ok_or_else(|| DescError::config(format!("{field}.{key}"), "expected a string")),
    }
}

/// After all known keys are consumed, anything left over is a user error.
fn reject_leftovers(map: &AttributeMap, field: &str) -> Result<()> {
    if let Some(key) = map.keys().next() {
        return Err(DescError::config(
            format!("{field}.{key}"),
            "unrecognized attribute",
        ));
    }
    Ok(())
}

/// Split a `base`, `base[i]` or `base[lo..hi]` name into its instances.
fn expand_instances(name: &str) -> Result<Vec<String>> {
    let Some(open) = name.find('[') else {
        return Ok(vec![name.to_owned()]);
    };
    let base = &name[..open];
    let inner = name[open..]
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| DescError::Range { name: name.to_owned() })?;
    if let Some((lo, hi)) = inner.split_once("..") {
        let lo: usize = lo.parse().map_err(|_| DescError::Range { name: name.to_owned() })?;
        let hi: usize = hi.parse().map_err(|_| DescError::Range { name: name.to_owned() })?;
        if hi < lo {
            return Err(DescError::Range { name: name.to_owned() });
        }
        Ok((lo..=hi).map(|i| format!("{base}[{i}]")).collect())
    } else {
        let i: usize = inner.parse().map_err(|_| DescError::Range { name: name.to_owned() })?;
        Ok(vec![format!("{base}[{i}]")])
    }
}

// ---------------------------------------------------------------------------
// Architecture conversion
// ---------------------------------------------------------------------------

const TILE_METRIC_KEYS: [&str; 8] = [
    "energy_north_hop",
    "latency_north_hop",
    "energy_east_hop",
    "latency_east_hop",
    "energy_south_hop",
    "latency_south_hop",
    "energy_west_hop",
    "latency_west_hop",
];

fn take_tile_metrics(
    map: &mut AttributeMap,
    field: &str,
    base: TilePowerMetrics,
) -> Result<TilePowerMetrics> {
    let mut m = base;
    let slots: [&mut f64; 8] = [
        &mut m.energy_north_hop,
        &mut m.latency_north_hop,
        &mut m.energy_east_hop,
        &mut m.latency_east_hop,
        &mut m.energy_south_hop,
        &mut m.latency_south_hop,
        &mut m.energy_west_hop,
        &mut m.latency_west_hop,
    ];
    for (key, slot) in TILE_METRIC_KEYS.iter().zip(slots) {
        if let Some(v) = take_f64(map, field, key)? {
            *slot = v;
        }
    }
    Ok(m)
}

fn convert_unit_model(mut attributes: AttributeMap, field: &str) -> Result<(ModelInfo, AttributeMap)> {
    let name = take_string(&mut attributes, field, "model")?
        .ok_or_else(|| DescError::config(format!("{field}.model"), "missing required model name"))?;
    Ok((ModelInfo { name, attributes: AttributeMap::new() }, attributes))
}

fn convert_axon_in(section: &UnitSection, field: &str) -> Result<AxonInConfiguration> {
    let mut attrs = section.attributes.clone();
    let energy = take_f64(&mut attrs, field, "energy_message_in")?.unwrap_or(0.0);
    let latency = take_f64(&mut attrs, field, "latency_message_in")?.unwrap_or(0.0);
    reject_leftovers(&attrs, field)?;
    Ok(AxonInConfiguration {
        name: section.name.clone(),
        energy_spike_message: energy,
        latency_spike_message: latency,
    })
}

fn convert_axon_out(section: &UnitSection, field: &str) -> Result<AxonOutConfiguration> {
    let mut attrs = section.attributes.clone();
    let energy = take_f64(&mut attrs, field, "energy_message_out")?.unwrap_or(0.0);
    let latency = take_f64(&mut attrs, field, "latency_message_out")?.unwrap_or(0.0);
    reject_leftovers(&attrs, field)?;
    Ok(AxonOutConfiguration {
        name: section.name.clone(),
        energy_access: energy,
        latency_access: latency,
    })
}

fn convert_synapse(section: &UnitSection, field: &str) -> Result<SynapseConfiguration> {
    let (mut model, mut attrs) = convert_unit_model(section.attributes.clone(), field)?;
    let energy = take_f64(&mut attrs, field, "energy_process_spike")?;
    let latency = take_f64(&mut attrs, field, "latency_process_spike")?;
    model.attributes = attrs;
    Ok(SynapseConfiguration {
        name: section.name.clone(),
        model,
        energy_process_spike: energy,
        latency_process_spike: latency,
    })
}

fn convert_dendrite(section: &UnitSection, field: &str) -> Result<DendriteConfiguration> {
    let (mut model, mut attrs) = convert_unit_model(section.attributes.clone(), field)?;
    let energy = take_f64(&mut attrs, field, "energy_update")?;
    let latency = take_f64(&mut attrs, field, "latency_update")?;
    model.attributes = attrs;
    Ok(DendriteConfiguration {
        name: section.name.clone(),
        model,
        energy_update: energy,
        latency_update: latency,
    })
}

fn convert_soma(section: &UnitSection, field: &str) -> Result<SomaConfiguration> {
    let (mut model, mut attrs) = convert_unit_model(section.attributes.clone(), field)?;
    let e_access = take_f64(&mut attrs, field, "energy_access_neuron")?;
    let e_update = take_f64(&mut attrs, field, "energy_update_neuron")?;
    let e_spike = take_f64(&mut attrs, field, "energy_spike_out")?;
    let l_access = take_f64(&mut attrs, field, "latency_access_neuron")?;
    let l_update = take_f64(&mut attrs, field, "latency_update_neuron")?;
    let l_spike = take_f64(&mut attrs, field, "latency_spike_out")?;
    model.attributes = attrs;

    let energy_metrics = (e_access.is_some() || e_update.is_some() || e_spike.is_some()).then(
        || SomaEnergyMetrics {
            energy_access_neuron: e_access.unwrap_or(0.0),
            energy_update_neuron: e_update.unwrap_or(0.0),
            energy_spike_out: e_spike.unwrap_or(0.0),
        },
    );
    let latency_metrics = (l_access.is_some() || l_update.is_some() || l_spike.is_some()).then(
        || SomaLatencyMetrics {
            latency_access_neuron: l_access.unwrap_or(0.0),
            latency_update_neuron: l_update.unwrap_or(0.0),
            latency_spike_out: l_spike.unwrap_or(0.0),
        },
    );
    Ok(SomaConfiguration { name: section.name.clone(), model, energy_metrics, latency_metrics })
}

fn exactly_one<'a>(units: &'a [UnitSection], field: &str) -> Result<&'a UnitSection> {
    match units {
        [unit] => Ok(unit),
        [] => Err(DescError::config(field, "missing required unit")),
        _ => Err(DescError::config(field, "exactly one unit expected")),
    }
}

fn convert_core(section: &CoreSection, offset: usize, name: String) -> Result<CoreConfiguration> {
    let field = format!("core.{name}");
    let mut attrs = section.attributes.clone();
    let buffer_position = match take_string(&mut attrs, &field, "buffer_position")? {
        Some(s) => BufferPosition::parse(&s)?,
        None => BufferPosition::BeforeSoma,
    };
    let max_neurons = take_usize(&mut attrs, &field, "max_neurons_supported")?
        .unwrap_or_else(|| CorePipelineConfiguration::default().max_neurons_supported);
    reject_leftovers(&attrs, &field)?;

    let axon_in = convert_axon_in(
        exactly_one(&section.axon_in, &format!("{field}.axon_in"))?,
        &format!("{field}.axon_in"),
    )?;
    let axon_out = convert_axon_out(
        exactly_one(&section.axon_out, &format!("{field}.axon_out"))?,
        &format!("{field}.axon_out"),
    )?;

    if section.synapse.is_empty() || section.dendrite.is_empty() || section.soma.is_empty() {
        return Err(DescError::config(
            field,
            "a core needs at least one synapse, dendrite and soma unit",
        ));
    }
    let synapses = section
        .synapse
        .iter()
        .map(|u| convert_synapse(u, &format!("{field}.synapse.{}", u.name)))
        .collect::<Result<Vec<_>>>()?;
    let dendrites = section
        .dendrite
        .iter()
        .map(|u| convert_dendrite(u, &format!("{field}.dendrite.{}", u.name)))
        .collect::<Result<Vec<_>>>()?;
    let somas = section
        .soma
        .iter()
        .map(|u| convert_soma(u, &format!("{field}.soma.{}", u.name)))
        .collect::<Result<Vec<_>>>()?;

    Ok(CoreConfiguration {
        name,
        offset,
        pipeline: CorePipelineConfiguration {
            buffer_position,
            max_neurons_supported: max_neurons,
        },
        axon_in,
        synapses,
        dendrites,
        somas,
        axon_out,
    })
}

fn convert_arch(doc: &ArchFile) -> Result<Architecture> {
    let section = &doc.architecture;
    let field = "architecture.attributes";
    let mut attrs = section.attributes.clone();

    if let Some(topology) = take_string(&mut attrs, field, "topology")? {
        if topology != "mesh" {
            return Err(DescError::config(
                format!("{field}.topology"),
                format!("unsupported topology `{topology}`"),
            ));
        }
    }
    let width = take_usize(&mut attrs, field, "width")?
        .ok_or_else(|| DescError::config(format!("{field}.width"), "missing required field"))?;
    let height = take_usize(&mut attrs, field, "height")?
        .ok_or_else(|| DescError::config(format!("{field}.height"), "missing required field"))?;
    let max_cores = take_usize(&mut attrs, field, "max_cores_per_tile")?.unwrap_or(1);
    let buffer_size = take_usize(&mut attrs, field, "link_buffer_size")?.unwrap_or(1);
    if width == 0 || height == 0 || max_cores == 0 || buffer_size == 0 {
        return Err(DescError::config(field, "NoC dimensions must be nonzero"));
    }
    let default_metrics = take_tile_metrics(&mut attrs, field, TilePowerMetrics::default())?;
    reject_leftovers(&attrs, field)?;

    let noc = NocConfiguration {
        width,
        height,
        max_cores_per_tile: max_cores,
        link_buffer_size: buffer_size,
    };
    let mut arch = Architecture::new(section.name.clone(), noc);

    for tile_section in &section.tile {
        for instance in expand_instances(&tile_section.name)? {
            let tile_field = format!("tile.{instance}.attributes");
            let mut tile_attrs = tile_section.attributes.clone();
            let metrics = take_tile_metrics(&mut tile_attrs, &tile_field, default_metrics)?;
            reject_leftovers(&tile_attrs, &tile_field)?;
            let tile: &mut TileConfiguration = arch.add_tile(instance, metrics)?;

            for core_section in &tile_section.core {
                for core_instance in expand_instances(&core_section.name)? {
                    let offset = tile.cores.len();
                    if offset >= max_cores {
                        return Err(DescError::config(
                            format!("tile.{}.core", tile.name),
                            format!("more than max_cores_per_tile={max_cores} cores"),
                        ));
                    }
                    let core = convert_core(core_section, offset, core_instance)?;
                    tile.add_core(core);
                }
            }
        }
    }

    Ok(arch)
}

// ---------------------------------------------------------------------------
// Architecture serialization (round-trip support)
// ---------------------------------------------------------------------------

fn metrics_to_attrs(m: &TilePowerMetrics) -> AttributeMap {
    let values = [
        m.energy_north_hop,
        m.latency_north_hop,
        m.energy_east_hop,
        m.latency_east_hop,
        m.energy_south_hop,
        m.latency_south_hop,
        m.energy_west_hop,
        m.latency_west_hop,
    ];
    TILE_METRIC_KEYS
        .iter()
        .zip(values)
        .map(|(k, v)| ((*k).to_owned(), AttributeValue::Real(v)))
        .collect()
}

fn core_to_section(core: &CoreConfiguration) -> CoreSection {
    let mut attributes = AttributeMap::new();
    attributes.insert(
        "buffer_position".into(),
        AttributeValue::Text(core.pipeline.buffer_position.as_str().into()),
    );
    attributes.insert(
        "max_neurons_supported".into(),
        AttributeValue::Int(i64::try_from(core.pipeline.max_neurons_supported).unwrap_or(i64::MAX)),
    );

    let unit = |name: &str, attrs: AttributeMap| UnitSection { name: name.to_owned(), attributes: attrs };

    let mut axon_in_attrs = AttributeMap::new();
    axon_in_attrs.insert("energy_message_in".into(), core.axon_in.energy_spike_message.into());
    axon_in_attrs.insert("latency_message_in".into(), core.axon_in.latency_spike_message.into());

    let mut axon_out_attrs = AttributeMap::new();
    axon_out_attrs.insert("energy_message_out".into(), core.axon_out.energy_access.into());
    axon_out_attrs.insert("latency_message_out".into(), core.axon_out.latency_access.into());

    let synapse = core
        .synapses
        .iter()
        .map(|s| {
            let mut attrs = s.model.attributes.clone();
            attrs.insert("model".into(), AttributeValue::Text(s.model.name.clone()));
            if let Some(e) = s.energy_process_spike {
                attrs.insert("energy_process_spike".into(), e.into());
            }
            if let Some(l) = s.latency_process_spike {
                attrs.insert("latency_process_spike".into(), l.into());
            }
            unit(&s.name, attrs)
        })
        .collect();

    let dendrite = core
        .dendrites
        .iter()
        .map(|d| {
            let mut attrs = d.model.attributes.clone();
            attrs.insert("model".into(), AttributeValue::Text(d.model.name.clone()));
            if let Some(e) = d.energy_update {
                attrs.insert("energy_update".into(), e.into());
            }
            if let Some(l) = d.latency_update {
                attrs.insert("latency_update".into(), l.into());
            }
            unit(&d.name, attrs)
        })
        .collect();

    let soma = core
        .somas
        .iter()
        .map(|s| {
            let mut attrs = s.model.attributes.clone();
            attrs.insert("model".into(), AttributeValue::Text(s.model.name.clone()));
            if let Some(e) = s.energy_metrics {
                attrs.insert("energy_access_neuron".into(), e.energy_access_neuron.into());
                attrs.insert("energy_update_neuron".into(), e.energy_update_neuron.into());
                attrs.insert("energy_spike_out".into(), e.energy_spike_out.into());
            }
            if let Some(l) = s.latency_metrics {
                attrs.insert("latency_access_neuron".into(), l.latency_access_neuron.into());
                attrs.insert("latency_update_neuron".into(), l.latency_update_neuron.into());
                attrs.insert("latency_spike_out".into(), l.latency_spike_out.into());
            }
            unit(&s.name, attrs)
        })
        .collect();

    CoreSection {
        name: core.name.clone(),
        attributes,
        axon_in: vec![unit(&core.axon_in.name, axon_in_attrs)],
        synapse,
        dendrite,
        soma,
        axon_out: vec![unit(&core.axon_out.name, axon_out_attrs)],
    }
}

/// Serialize an architecture back to its YAML document form.
///
/// Instance ranges are not reconstructed; every tile and core appears as
/// its own section. Parsing the output yields an equivalent architecture.
///
/// # Errors
///
/// Fails only if YAML emission fails.
pub fn serialize_arch(arch: &Architecture) -> Result<String> {
    let mut attributes = AttributeMap::new();
    attributes.insert("topology".into(), AttributeValue::Text("mesh".into()));
    attributes.insert("width".into(), AttributeValue::Int(arch.noc.width as i64));
    attributes.insert("height".into(), AttributeValue::Int(arch.noc.height as i64));
    attributes.insert(
        "max_cores_per_tile".into(),
        AttributeValue::Int(arch.noc.max_cores_per_tile as i64),
    );
    attributes.insert(
        "link_buffer_size".into(),
        AttributeValue::Int(arch.noc.link_buffer_size as i64),
    );

    let tile = arch
        .tiles
        .iter()
        .map(|t| TileSection {
            name: t.name.clone(),
            attributes: metrics_to_attrs(&t.metrics),
            core: t.cores.iter().map(core_to_section).collect(),
        })
        .collect();

    let doc = ArchFile { architecture: ArchSection { name: arch.name.clone(), attributes, tile } };
    serde_yaml::to_string(&doc).map_err(|source| DescError::Parse {
        path: PathBuf::from("<serialize>"),
        source,
    })
}

// ---------------------------------------------------------------------------
// Network conversion
// ---------------------------------------------------------------------------

fn convert_neuron_params(
    mut attrs: AttributeMap,
    base: &NeuronParameters,
    field: &str,
) -> Result<NeuronParameters> {
    let mut params = base.clone();
    if let Some(v) = take_string(&mut attrs, field, "soma_hw_name")? {
        params.soma_hw_name = Some(v);
    }
    if let Some(v) = take_string(&mut attrs, field, "dendrite_hw_name")? {
        params.dendrite_hw_name = Some(v);
    }
    if let Some(v) = take_string(&mut attrs, field, "synapse_hw_name")? {
        params.synapse_hw_name = Some(v);
    }
    if let Some(v) = take_bool(&mut attrs, field, "log_spikes")? {
        params.log_spikes = v;
    }
    if let Some(v) = take_bool(&mut attrs, field, "log_potential")? {
        params.log_potential = v;
    }
    if let Some(v) = take_bool(&mut attrs, field, "force_update")? {
        params.force_update = v;
    }
    if let Some(v) = take_usize(&mut attrs, field, "forced_spikes")? {
        params.forced_spikes = u32::try_from(v)
            .map_err(|_| DescError::config(format!("{field}.forced_spikes"), "value too large"))?;
    }
    // Everything else is a model attribute.
    params.attributes.append(&mut attrs);
    Ok(params)
}

fn parse_core_slot(s: &str, field: &str) -> Result<(usize, usize)> {
    let parse = |part: &str| part.parse::<usize>().ok();
    s.split_once('.')
        .and_then(|(t, c)| Some((parse(t)?, parse(c)?)))
        .ok_or_else(|| DescError::config(field, format!("expected `tile.core_offset`, got `{s}`")))
}

fn convert_net(doc: &NetFile) -> Result<SpikingNetwork> {
    let section = &doc.network;
    let mut net = SpikingNetwork::new(section.name.clone());

    for group_section in &section.groups {
        let field = format!("network.groups.{}", group_section.name);
        let defaults = convert_neuron_params(
            group_section.attributes.clone(),
            &NeuronParameters::default(),
            &field,
        )?;
        let group = net.add_group(group_section.name.clone(), defaults)?;
        group.add_neurons(group_section.neurons);
        for override_section in &group_section.overrides {
            let override_field = format!("{field}.overrides.{}", override_section.neuron);
            let base = group
                .neurons
                .get(override_section.neuron)
                .ok_or_else(|| {
                    DescError::config(&override_field, "override targets a nonexistent neuron")
                })?
                .params
                .clone();
            let params =
                convert_neuron_params(override_section.attributes.clone(), &base, &override_field)?;
            group
                .neuron_mut(override_section.neuron)
                .expect("checked above")
                .params = params;
        }
    }

    for edge in &section.edges {
        let pre = NeuronAddress::parse(&edge.source)?;
        let post = NeuronAddress::parse(&edge.dest)?;
        net.connect(pre, post, edge.attributes.clone())?;
    }

    for mapping in &section.mappings {
        let neuron = NeuronAddress::parse(&mapping.neuron)?;
        let (tile, core_offset) = parse_core_slot(&mapping.core, "network.mappings.core")?;
        net.map_neuron(neuron, tile, core_offset)?;
    }

    Ok(net)
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|source| DescError::Io { path: path.to_owned(), source })?;
    serde_yaml::from_reader(BufReader::new(file))
        .map_err(|source| DescError::Parse { path: path.to_owned(), source })
}

/// Load and validate an architecture description file.
///
/// # Errors
///
/// I/O, YAML and validation errors, with the offending field named.
pub fn load_arch(path: impl AsRef<Path>) -> Result<Architecture> {
    let doc: ArchFile = read_yaml(path.as_ref())?;
    convert_arch(&doc)
}

/// Parse an architecture description from a YAML string.
///
/// # Errors
///
/// Same failure modes as [`load_arch`].
pub fn parse_arch(yaml: &str) -> Result<Architecture> {
    let doc: ArchFile = serde_yaml::from_str(yaml).map_err(|source| DescError::Parse {
        path: PathBuf::from("<inline>"),
        source,
    })?;
    convert_arch(&doc)
}

/// Load and validate a network description file.
///
/// # Errors
///
/// I/O, YAML and validation errors, with the offending field named.
pub fn load_net(path: impl AsRef<Path>) -> Result<SpikingNetwork> {
    let doc: NetFile = read_yaml(path.as_ref())?;
    convert_net(&doc)
}

/// Parse a network description from a YAML string.
///
/// # Errors
///
/// Same failure modes as [`load_net`].
pub fn parse_net(yaml: &str) -> Result<SpikingNetwork> {
    let doc: NetFile = serde_yaml::from_str(yaml).map_err(|source| DescError::Parse {
        path: PathBuf::from("<inline>"),
        source,
    })?;
    convert_net(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCH_YAML: &str = r"
architecture:
  name: example
  attributes:
    topology: mesh
    width: 2
    height: 2
    max_cores_per_tile: 2
    link_buffer_size: 2
    energy_east_hop: 2.0e-12
    latency_east_hop: 5.0e-9
  tile:
    - name: tile[0..3]
      attributes:
        energy_north_hop: 1.0e-12
        latency_north_hop: 4.0e-9
      core:
        - name: core[0..1]
          attributes:
            buffer_position: soma
          axon_in:
            - name: axon_in
              attributes:
                latency_message_in: 1.0e-9
          synapse:
            - name: dense
              attributes:
                model: current_based
                latency_process_spike: 2.0e-9
                weight_bits: 8
          dendrite:
            - name: accumulator
              attributes:
                model: accumulator
          soma:
            - name: lif
              attributes:
                model: loihi_lif
                latency_access_neuron: 1.0e-9
                latency_update_neuron: 2.0e-9
                latency_spike_out: 3.0e-9
          axon_out:
            - name: axon_out
              attributes:
                latency_message_out: 5.0e-10
";

    #[test]
    fn parses_ranged_architecture() {
        let arch = parse_arch(ARCH_YAML).unwrap();
        assert_eq!(arch.tiles.len(), 4);
        assert_eq!(arch.tiles[3].name, "tile[3]");
        assert_eq!(arch.core_count(), 8);

        let core = arch.core(0, 1).unwrap();
        assert_eq!(core.name, "core[1]");
        assert_eq!(core.pipeline.buffer_position, BufferPosition::BeforeSoma);
        assert_eq!(core.synapses[0].model.name, "current_based");
        assert_eq!(
            core.synapses[0].model.attributes.get("weight_bits"),
            Some(&AttributeValue::Int(8))
        );
        assert_eq!(core.synapses[0].latency_process_spike, Some(2.0e-9));

        // Tile defaults come from the architecture node, overrides win.
        let tile = &arch.tiles[0];
        assert_eq!(tile.metrics.energy_east_hop, 2.0e-12);
        assert_eq!(tile.metrics.latency_north_hop, 4.0e-9);
    }

    #[test]
    fn unknown_attribute_is_named() {
        let bad = ARCH_YAML.replace("buffer_position: soma", "buffer_pos: soma");
        let err = parse_arch(&bad).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("buffer_pos"), "{msg}");
    }

    #[test]
    fn missing_width_is_an_error() {
        let bad = ARCH_YAML.replace("    width: 2\n", "");
        let err = parse_arch(&bad).unwrap_err();
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn arch_round_trips() {
        let arch = parse_arch(ARCH_YAML).unwrap();
        let reparsed = parse_arch(&serialize_arch(&arch).unwrap()).unwrap();
        assert_eq!(arch, reparsed);
    }

    #[test]
    fn instance_expansion_forms() {
        assert_eq!(expand_instances("tile").unwrap(), vec!["tile"]);
        assert_eq!(expand_instances("tile[2]").unwrap(), vec!["tile[2]"]);
        assert_eq!(
            expand_instances("c[1..3]").unwrap(),
            vec!["c[1]", "c[2]", "c[3]"]
        );
        assert!(expand_instances("tile[").is_err());
        assert!(expand_instances("tile[3..1]").is_err());
    }

    const NET_YAML: &str = r"
network:
  name: demo
  groups:
    - name: in
      neurons: 2
      attributes:
        log_spikes: true
        threshold: 1.0
      overrides:
        - neuron: 1
          attributes:
            bias: 0.5
    - name: out
      neurons: 1
  edges:
    - source: in.0
      dest: out.0
      attributes:
        weight: 2.0
        tap: 1
  mappings:
    - neuron: in.0
      core: '0.0'
    - neuron: in.1
      core: '0.0'
    - neuron: out.0
      core: '1.1'
";

    #[test]
    fn parses_network() {
        let net = parse_net(NET_YAML).unwrap();
        assert_eq!(net.groups.len(), 2);
        let group = net.group("in").unwrap();
        assert!(group.defaults.log_spikes);
        assert_eq!(
            group.neurons[1].params.attributes.get("bias"),
            Some(&AttributeValue::Real(0.5))
        );
        // Defaults survive overrides.
        assert_eq!(
            group.neurons[1].params.attributes.get("threshold"),
            Some(&AttributeValue::Real(1.0))
        );
        assert_eq!(net.connections.len(), 1);
        assert_eq!(net.mappings.len(), 3);
        assert_eq!(net.mappings[2].tile, 1);
        assert_eq!(net.mappings[2].core_offset, 1);
        net.check_fully_mapped().unwrap();
    }

    #[test]
    fn edge_to_missing_neuron_fails() {
        let bad = NET_YAML.replace("dest: out.0", "dest: out.7");
        assert!(parse_net(&bad).is_err());
    }
}
