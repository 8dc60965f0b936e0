//! Model factory registry.
//!
//! Unit models are looked up by name when a chip is built from an
//! architecture description. The built-in set is pre-registered;
//! user-defined models plug in by registering another factory under a new
//! name before the chip is constructed. An unknown name is a load-time
//! configuration error, never a runtime one.

use std::collections::BTreeMap;

use spikesim_desc::ModelInfo;

use crate::error::{Result, SimError};
use crate::models::{
    AccumulatorDendrite, CurrentBasedSynapse, DendriteModel, InputSoma, LoihiLifSoma,
    MultiTapDendrite, SomaModel, SynapseModel, TrueNorthSoma,
};

/// Factory for synapse models.
pub type SynapseFactory = Box<dyn Fn(&ModelInfo) -> Result<Box<dyn SynapseModel>> + Send + Sync>;
/// Factory for dendrite models.
pub type DendriteFactory = Box<dyn Fn(&ModelInfo) -> Result<Box<dyn DendriteModel>> + Send + Sync>;
/// Factory for soma models.
pub type SomaFactory = Box<dyn Fn(&ModelInfo) -> Result<Box<dyn SomaModel>> + Send + Sync>;

/// Name → factory tables for the three model kinds.
pub struct ModelRegistry {
    synapses: BTreeMap<String, SynapseFactory>,
    dendrites: BTreeMap<String, DendriteFactory>,
    somas: BTreeMap<String, SomaFactory>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut registry = Self {
            synapses: BTreeMap::new(),
            dendrites: BTreeMap::new(),
            somas: BTreeMap::new(),
        };
        registry.register_synapse("current_based", |info| {
            Ok(Box::new(CurrentBasedSynapse::new(info)?))
        });
        registry.register_dendrite("accumulator", |info| {
            Ok(Box::new(AccumulatorDendrite::new(info)?))
        });
        registry.register_dendrite("multi_tap", |info| Ok(Box::new(MultiTapDendrite::new(info)?)));
        registry.register_soma("loihi_lif", |info| Ok(Box::new(LoihiLifSoma::new(info)?)));
        registry.register_soma("truenorth", |info| Ok(Box::new(TrueNorthSoma::new(info)?)));
        registry.register_soma("input", |info| Ok(Box::new(InputSoma::new(info)?)));
        registry
    }
}

impl ModelRegistry {
    /// Registry with the built-in models only.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::default()
    }

    /// Register (or replace) a synapse model factory.
    pub fn register_synapse<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ModelInfo) -> Result<Box<dyn SynapseModel>> + Send + Sync + 'static,
    {
        self.synapses.insert(name.into(), Box::new(factory));
    }

    /// Register (or replace) a dendrite model factory.
    pub fn register_dendrite<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ModelInfo) -> Result<Box<dyn DendriteModel>> + Send + Sync + 'static,
    {
        self.dendrites.insert(name.into(), Box::new(factory));
    }

    /// Register (or replace) a soma model factory.
    pub fn register_soma<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ModelInfo) -> Result<Box<dyn SomaModel>> + Send + Sync + 'static,
    {
        self.somas.insert(name.into(), Box::new(factory));
    }

    /// Build a synapse model.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownModel`] when no factory is registered under the
    /// requested name.
    pub fn build_synapse(&self, info: &ModelInfo) -> Result<Box<dyn SynapseModel>> {
        let factory = self
            .synapses
            .get(&info.name)
            .ok_or_else(|| SimError::UnknownModel { kind: "synapse", name: info.name.clone() })?;
        factory(info)
    }

    /// Build a dendrite model.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownModel`] when no factory is registered under the
    /// requested name.
    pub fn build_dendrite(&self, info: &ModelInfo) -> Result<Box<dyn DendriteModel>> {
        let factory = self
            .dendrites
            .get(&info.name)
            .ok_or_else(|| SimError::UnknownModel { kind: "dendrite", name: info.name.clone() })?;
        factory(info)
    }

    /// Build a soma model.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownModel`] when no factory is registered under the
    /// requested name.
    pub fn build_soma(&self, info: &ModelInfo) -> Result<Box<dyn SomaModel>> {
        let factory = self
            .somas
            .get(&info.name)
            .ok_or_else(|| SimError::UnknownModel { kind: "soma", name: info.name.clone() })?;
        factory(info)
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("synapses", &self.synapses.keys().collect::<Vec<_>>())
            .field("dendrites", &self.dendrites.keys().collect::<Vec<_>>())
            .field("somas", &self.somas.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve() {
        let registry = ModelRegistry::with_builtins();
        let info = ModelInfo { name: "current_based".into(), ..ModelInfo::default() };
        registry.build_synapse(&info).unwrap();
        for name in ["accumulator", "multi_tap"] {
            let info = ModelInfo { name: name.into(), ..ModelInfo::default() };
            registry.build_dendrite(&info).unwrap();
        }
        for name in ["loihi_lif", "truenorth", "input"] {
            let info = ModelInfo { name: name.into(), ..ModelInfo::default() };
            registry.build_soma(&info).unwrap();
        }
    }

    #[test]
    fn unknown_model_is_a_config_error() {
        let registry = ModelRegistry::with_builtins();
        let info = ModelInfo { name: "hodgkin_huxley".into(), ..ModelInfo::default() };
        let err = registry.build_soma(&info).unwrap_err();
        assert!(matches!(err, SimError::UnknownModel { kind: "soma", .. }));
    }

    #[test]
    fn user_factories_can_shadow_builtins() {
        let mut registry = ModelRegistry::with_builtins();
        registry.register_soma("input", |info| Ok(Box::new(LoihiLifSoma::new(info)?)));
        let info = ModelInfo { name: "input".into(), ..ModelInfo::default() };
        registry.build_soma(&info).unwrap();
    }
}
