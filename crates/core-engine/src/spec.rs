//! Node type descriptors and the registry the graph builder consults.

use ahash::AHashMap;
use core_config::{ConfigError, InitEnv, NodeConfig};
use thiserror::Error;

use crate::node::NodeBehavior;

#[derive(Debug, Error)]
pub enum NodeCreateError {
    #[error("missing required option \"{0}\"")]
    MissingOption(&'static str),
    #[error("invalid option \"{option}\": {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

pub type NodeCreateFn =
    fn(&NodeConfig, &mut InitEnv<'_>) -> Result<Box<dyn NodeBehavior>, NodeCreateError>;

/// One node type: its unique name, its user-facing help text, and its
/// constructor. The other half of the contract (event/IO handling and
/// teardown) lives on the constructed [`NodeBehavior`] itself.
pub struct NodeSpecification {
    pub name: &'static str,
    pub documentation: &'static str,
    pub create: NodeCreateFn,
}

/// Type-name lookup for the graph builder and the CLI's module listing.
#[derive(Default)]
pub struct NodeRegistry {
    specs: AHashMap<&'static str, &'static NodeSpecification>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry::default()
    }

    pub fn register(&mut self, spec: &'static NodeSpecification) {
        self.specs.insert(spec.name, spec);
    }

    pub fn lookup(&self, name: &str) -> Option<&'static NodeSpecification> {
        self.specs.get(name).copied()
    }

    /// Registered type names, sorted for stable listings.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.specs.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
