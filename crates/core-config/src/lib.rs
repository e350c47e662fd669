//! Configuration loading for the event-routing engine.
//!
//! The file is TOML: a `[constants]` table of integer literals, an `[enums]`
//! table whose members mint qualified `enum.member` constants with
//! auto-incrementing values, an ordered `[[predicates]]` array building the
//! predicate registry, `[[nodes]]` entries handed opaquely to node
//! constructors, and `[[channels]]` wiring node output slots to input
//! slots. Numeric fields accept either an integer literal or the name of a
//! constant; per the resolver contract an unknown name falls back to the
//! caller-supplied default, while structural references (node names,
//! predicate names, node types) are fatal with a diagnostic naming the
//! offending entity.
//!
//! Everything here is resolved at load/build time; the engine core only
//! ever sees the [`FullConfig`] views and the [`InitEnv`] handed to node
//! constructors.

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use core_events::MODIFIER_MAX;
use core_predicate::{Predicate, PredicateHandle, PredicateKind, PredicateRegistry};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

// -------------------------------------------------------------------------
// Raw file model (serde)
// -------------------------------------------------------------------------

/// An integer field that may be written as a literal or as the name of a
/// constant.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ConstantRef {
    Literal(i64),
    Named(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnumMember {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        value: Option<ConstantRef>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PredicateChild {
    Name(String),
    Inline(Box<PredicateConfig>),
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredicateConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub min: Option<ConstantRef>,
    #[serde(default)]
    pub max: Option<ConstantRef>,
    #[serde(default)]
    pub modifier: Option<ConstantRef>,
    #[serde(default)]
    pub children: Vec<PredicateChild>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub inverted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Opaque subtree interpreted by the node type's constructor.
    #[serde(default)]
    pub options: Option<toml::Value>,
}

impl NodeConfig {
    /// Display name for diagnostics: the configured name, or the type.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.type_name)
    }

    pub fn option(&self, key: &str) -> Option<&toml::Value> {
        self.options.as_ref()?.get(key)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChannelEnd {
    /// `["node", slot]`
    Pair(String, ConstantRef),
    /// `{ node = "...", slot = ... }`
    Table {
        node: String,
        #[serde(default)]
        slot: Option<ConstantRef>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub from: ChannelEnd,
    pub to: ChannelEnd,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub constants: std::collections::HashMap<String, i64>,
    #[serde(default)]
    pub enums: std::collections::HashMap<String, Vec<EnumMember>>,
    #[serde(default)]
    pub predicates: Vec<PredicateConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

// -------------------------------------------------------------------------
// Errors
// -------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration syntax error")]
    Parse(#[from] toml::de::Error),
    #[error("unknown predicate \"{0}\"")]
    UnknownPredicate(String),
    #[error("duplicate predicate name \"{0}\"")]
    DuplicatePredicateName(String),
    #[error("unknown predicate type \"{kind}\" for predicate \"{name}\"")]
    UnknownPredicateKind { kind: String, name: String },
    #[error("modifier {value} out of range for predicate \"{name}\"")]
    ModifierOutOfRange { value: i64, name: String },
    #[error("predicate reference must be a name or an inline table")]
    BadPredicateRef,
    #[error("malformed inline predicate")]
    BadInlinePredicate(#[source] toml::de::Error),
}

// -------------------------------------------------------------------------
// Constant registry
// -------------------------------------------------------------------------

/// Name-to-integer registry fed by `[constants]` and `[enums]`.
#[derive(Debug, Default)]
pub struct ConstantRegistry {
    values: AHashMap<String, i64>,
}

impl ConstantRegistry {
    pub fn new() -> Self {
        ConstantRegistry::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: i64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    /// Resolver contract: `None` or an unresolvable name yields `dflt`.
    pub fn resolve_or(&self, reference: Option<&ConstantRef>, dflt: i64) -> i64 {
        match reference {
            None => dflt,
            Some(ConstantRef::Literal(v)) => *v,
            Some(ConstantRef::Named(name)) => self.get(name).unwrap_or(dflt),
        }
    }

    /// Same contract applied to an opaque TOML value from a node's
    /// `options` subtree: integers pass through, strings go through the
    /// registry, anything else is the default.
    pub fn resolve_value_or(&self, value: Option<&toml::Value>, dflt: i64) -> i64 {
        match value {
            Some(toml::Value::Integer(v)) => *v,
            Some(toml::Value::String(name)) => self.get(name).unwrap_or(dflt),
            Some(toml::Value::Boolean(b)) => *b as i64,
            _ => dflt,
        }
    }
}

// -------------------------------------------------------------------------
// Initialisation environment
// -------------------------------------------------------------------------

/// Name resolution handed to node constructors: constants by value,
/// predicates by handle (registering inline definitions on the fly).
pub struct InitEnv<'a> {
    pub constants: &'a ConstantRegistry,
    pub predicate_names: &'a mut AHashMap<String, PredicateHandle>,
    pub predicates: &'a mut PredicateRegistry,
}

impl InitEnv<'_> {
    pub fn resolve_constant_or(&self, value: Option<&toml::Value>, dflt: i64) -> i64 {
        self.constants.resolve_value_or(value, dflt)
    }

    pub fn resolve_constant(&self, value: Option<&toml::Value>) -> i64 {
        self.resolve_constant_or(value, 0)
    }

    /// A predicate option is either the name of a `[[predicates]]` entry or
    /// an inline predicate table registered anonymously.
    pub fn resolve_predicate(&mut self, value: &toml::Value) -> Result<PredicateHandle, ConfigError> {
        match value {
            toml::Value::String(name) => self
                .predicate_names
                .get(name.as_str())
                .copied()
                .ok_or_else(|| ConfigError::UnknownPredicate(name.clone())),
            toml::Value::Table(_) => {
                let config: PredicateConfig = value
                    .clone()
                    .try_into()
                    .map_err(ConfigError::BadInlinePredicate)?;
                build_predicate(&config, self.constants, self.predicate_names, self.predicates)
            }
            _ => Err(ConfigError::BadPredicateRef),
        }
    }

    pub fn resolve_predicate_opt(
        &mut self,
        value: Option<&toml::Value>,
    ) -> Result<Option<PredicateHandle>, ConfigError> {
        match value {
            None => Ok(None),
            Some(v) => self.resolve_predicate(v).map(Some),
        }
    }
}

// -------------------------------------------------------------------------
// Building
// -------------------------------------------------------------------------

/// Fully resolved configuration views consumed by the graph builder.
#[derive(Debug)]
pub struct FullConfig {
    pub constants: ConstantRegistry,
    pub predicate_names: AHashMap<String, PredicateHandle>,
    pub nodes: Vec<NodeConfig>,
    pub channels: Vec<ResolvedChannel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub from: (String, usize),
    pub to: (String, usize),
}

pub fn load_str(text: &str) -> Result<ConfigFile, ConfigError> {
    Ok(toml::from_str(text)?)
}

pub fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&text)
}

fn build_predicate(
    config: &PredicateConfig,
    constants: &ConstantRegistry,
    names: &mut AHashMap<String, PredicateHandle>,
    registry: &mut PredicateRegistry,
) -> Result<PredicateHandle, ConfigError> {
    let display = config.name.as_deref().unwrap_or("<anonymous>");
    let range = |dflt_min: i64, dflt_max: i64| {
        (
            constants.resolve_or(config.min.as_ref(), dflt_min),
            constants.resolve_or(config.max.as_ref(), dflt_max),
        )
    };

    let kind = match config.kind.as_str() {
        "accept" => PredicateKind::Accept,
        "code_ns" => {
            let (min, max) = range(i64::MIN, i64::MAX);
            PredicateKind::CodeNs { min, max }
        }
        "code_major" => {
            let (min, max) = range(i64::MIN, i64::MAX);
            PredicateKind::CodeMajor { min, max }
        }
        "code_minor" => {
            let (min, max) = range(i64::MIN, i64::MAX);
            PredicateKind::CodeMinor { min, max }
        }
        "payload" => {
            let (min, max) = range(i64::MIN, i64::MAX);
            PredicateKind::Payload { min, max }
        }
        "input_index" => {
            let (min, max) = range(i64::MIN, i64::MAX);
            PredicateKind::InputIndex { min, max }
        }
        "modifier" => {
            let value = constants.resolve_or(config.modifier.as_ref(), -1);
            if !(0..=MODIFIER_MAX as i64).contains(&value) {
                return Err(ConfigError::ModifierOutOfRange {
                    value,
                    name: display.to_owned(),
                });
            }
            PredicateKind::Modifier(value as i32)
        }
        "conjunction" | "disjunction" => {
            let mut handles = Vec::with_capacity(config.children.len());
            for child in &config.children {
                let handle = match child {
                    PredicateChild::Name(name) => names
                        .get(name.as_str())
                        .copied()
                        .ok_or_else(|| ConfigError::UnknownPredicate(name.clone()))?,
                    PredicateChild::Inline(inline) => {
                        build_predicate(inline, constants, names, registry)?
                    }
                };
                handles.push(handle);
            }
            if config.kind == "conjunction" {
                PredicateKind::Conjunction(handles)
            } else {
                PredicateKind::Disjunction(handles)
            }
        }
        other => {
            return Err(ConfigError::UnknownPredicateKind {
                kind: other.to_owned(),
                name: display.to_owned(),
            });
        }
    };

    let handle = registry.register(Predicate {
        kind,
        enabled: config.enabled,
        inverted: config.inverted,
    });
    if let Some(name) = &config.name {
        if names.insert(name.clone(), handle).is_some() {
            return Err(ConfigError::DuplicatePredicateName(name.clone()));
        }
    }
    Ok(handle)
}

fn resolve_channel_end(end: &ChannelEnd, constants: &ConstantRegistry) -> (String, usize) {
    match end {
        ChannelEnd::Pair(node, slot) => {
            (node.clone(), constants.resolve_or(Some(slot), 0).max(0) as usize)
        }
        ChannelEnd::Table { node, slot } => {
            (node.clone(), constants.resolve_or(slot.as_ref(), 0).max(0) as usize)
        }
    }
}

/// Resolve a parsed file into the views the engine consumes, registering
/// every `[[predicates]]` entry (in file order) into `predicates`.
pub fn build(
    file: &ConfigFile,
    predicates: &mut PredicateRegistry,
) -> Result<FullConfig, ConfigError> {
    let mut constants = ConstantRegistry::new();
    for (name, value) in &file.constants {
        constants.insert(name.clone(), *value);
    }

    // Enums are processed in name order (the map is unordered); member
    // values may reference plain constants and earlier-processed enums.
    let mut enum_names: Vec<&String> = file.enums.keys().collect();
    enum_names.sort();
    for enum_name in enum_names {
        let mut prev = -1i64;
        for member in &file.enums[enum_name] {
            let (member_name, value) = match member {
                EnumMember::Name(name) => (name, prev + 1),
                EnumMember::Full { name, value } => {
                    (name, constants.resolve_or(value.as_ref(), prev + 1))
                }
            };
            prev = value;
            constants.insert(format!("{enum_name}.{member_name}"), value);
        }
    }

    let mut predicate_names: AHashMap<String, PredicateHandle> = AHashMap::new();
    for config in &file.predicates {
        let handle = build_predicate(config, &constants, &mut predicate_names, predicates)?;
        debug!(
            target: "config",
            predicate = config.name.as_deref().unwrap_or("<anonymous>"),
            handle = handle.index(),
            "registered predicate"
        );
    }

    let channels = file
        .channels
        .iter()
        .map(|ch| ResolvedChannel {
            from: resolve_channel_end(&ch.from, &constants),
            to: resolve_channel_end(&ch.to, &constants),
        })
        .collect();

    Ok(FullConfig {
        constants,
        predicate_names,
        nodes: file.nodes.clone(),
        channels,
    })
}
