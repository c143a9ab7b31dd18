use crate::component::ComponentKind;
use crate::error::{Result, ShellyError};
use std::collections::BTreeMap;

/// A component slot in a model: kind plus instance id
pub type ComponentRef = (ComponentKind, Option<u32>);

/// Components carried by one device model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    /// Upper-cased model id, e.g. `SNSW-001P16EU`
    pub model: String,
    /// Marketing name
    pub name: String,
    pub components: Vec<ComponentRef>,
}

/// Catalog mapping model ids to their component lists
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelDefinition>,
}

const COMMON: &[&str] = &["sys", "wifi", "cloud", "mqtt", "ws"];

/// Built-in catalog: model id, name, components beyond `COMMON`
const BUILTIN: &[(&str, &str, &[&str])] = &[
    ("SNSW-001X16EU", "Shelly Plus 1", &["switch:0", "input:0"]),
    ("SNSW-001P16EU", "Shelly Plus 1PM", &["switch:0", "input:0"]),
    (
        "SNSW-002P16EU",
        "Shelly Plus 2PM",
        &["switch:0", "switch:1", "input:0", "input:1"],
    ),
    (
        "SNSW-102P16EU",
        "Shelly Plus 2PM",
        &["switch:0", "switch:1", "input:0", "input:1"],
    ),
    (
        "SNSN-0024X",
        "Shelly Plus i4",
        &["input:0", "input:1", "input:2", "input:3"],
    ),
    (
        "SNSN-0013A",
        "Shelly Plus H&T",
        &["temperature:0", "humidity:0", "devicepower:0"],
    ),
    (
        "SPSW-001XE16EU",
        "Shelly Pro 1",
        &["eth", "switch:0", "input:0", "input:1"],
    ),
    (
        "SPSW-004PE16EU",
        "Shelly Pro 4PM",
        &[
            "eth", "switch:0", "switch:1", "switch:2", "switch:3", "input:0", "input:1", "input:2",
            "input:3",
        ],
    ),
    (
        "SPSH-002PE16EU",
        "Shelly Pro Dual Cover PM",
        &["eth", "cover:0", "cover:1", "input:0", "input:1", "input:2", "input:3"],
    ),
    ("SNPL-00112EU", "Shelly Plus Plug S", &["switch:0"]),
    ("SNDM-0013US", "Shelly Plus Wall Dimmer", &["light:0"]),
];

impl ModelRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with common Plus and Pro models
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (model, name, components) in BUILTIN {
            let keys = COMMON.iter().chain(components.iter()).copied();
            // Entries are fixed and valid
            if let Err(e) = registry.register(model, name, keys) {
                tracing::error!("Built-in model {} rejected: {}", model, e);
            }
        }
        registry
    }

    /// Register a model.
    ///
    /// Fails with `DuplicateModel` if the id is already registered and with
    /// `InvalidModel` if a component key is unknown or repeated.
    pub fn register<'a>(
        &mut self,
        model: &str,
        name: &str,
        component_keys: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let model = model.trim().to_uppercase();
        if model.is_empty() {
            return Err(ShellyError::InvalidModel {
                model,
                reason: "empty model id".to_string(),
            });
        }
        if self.models.contains_key(&model) {
            return Err(ShellyError::DuplicateModel(model));
        }

        let mut components: Vec<ComponentRef> = Vec::new();
        for key in component_keys {
            let Some(component) = ComponentKind::parse_key(key) else {
                return Err(ShellyError::InvalidModel {
                    model,
                    reason: format!("unknown component {}", key),
                });
            };
            if components.contains(&component) {
                return Err(ShellyError::InvalidModel {
                    model,
                    reason: format!("component {} listed twice", key),
                });
            }
            components.push(component);
        }

        tracing::debug!("Registered model {} ({} components)", model, components.len());
        self.models.insert(
            model.clone(),
            ModelDefinition {
                model,
                name: name.to_string(),
                components,
            },
        );
        Ok(())
    }

    /// Find a model by id, ignoring case
    pub fn lookup(&self, model: &str) -> Option<&ModelDefinition> {
        self.models.get(&model.trim().to_uppercase())
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
