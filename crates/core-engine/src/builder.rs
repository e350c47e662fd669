//! Graph construction from resolved configuration: nodes, then channels,
//! then I/O registration. Every failure names the offending entity.

use ahash::AHashMap;
use core_config::{FullConfig, InitEnv};
use core_events::NodeId;
use thiserror::Error;
use tracing::info;

use crate::Engine;
use crate::dispatch::ProcessingState;
use crate::spec::{NodeCreateError, NodeRegistry};

#[derive(Debug, Error)]
pub enum GraphBuildError {
    #[error("unknown node type \"{type_name}\" for node \"{node}\"")]
    UnknownNodeType { type_name: String, node: String },
    #[error("failed to create node \"{node}\"")]
    CreateNode {
        node: String,
        #[source]
        source: NodeCreateError,
    },
    #[error("duplicate node name \"{0}\"")]
    DuplicateNodeName(String),
    #[error("channel {index} references unknown node \"{name}\"")]
    UnknownChannelEndpoint { index: usize, name: String },
}

/// Build the configured graph into `engine`, register node I/O with
/// `state`, and return the created node ids in configuration order.
pub fn build_graph(
    engine: &mut Engine,
    state: &mut ProcessingState,
    registry: &NodeRegistry,
    config: &FullConfig,
) -> Result<Vec<NodeId>, GraphBuildError> {
    let mut predicate_names = config.predicate_names.clone();
    let mut named: AHashMap<&str, NodeId> = AHashMap::new();
    let mut ids = Vec::with_capacity(config.nodes.len());

    for node_config in &config.nodes {
        let display_name = node_config.display_name().to_owned();
        let spec = registry.lookup(&node_config.type_name).ok_or_else(|| {
            GraphBuildError::UnknownNodeType {
                type_name: node_config.type_name.clone(),
                node: display_name.clone(),
            }
        })?;
        let mut env = InitEnv {
            constants: &config.constants,
            predicate_names: &mut predicate_names,
            predicates: &mut engine.predicates,
        };
        let behavior = (spec.create)(node_config, &mut env).map_err(|source| {
            GraphBuildError::CreateNode {
                node: display_name.clone(),
                source,
            }
        })?;
        let id = engine.graph.add_node(spec.name, behavior);
        if let Some(name) = &node_config.name {
            if named.insert(name.as_str(), id).is_some() {
                return Err(GraphBuildError::DuplicateNodeName(name.clone()));
            }
        }
        info!(target: "engine.graph", node = %display_name, r#type = spec.name, "created node");
        ids.push(id);
    }

    for (index, channel) in config.channels.iter().enumerate() {
        let resolve = |name: &str| {
            named
                .get(name)
                .copied()
                .ok_or_else(|| GraphBuildError::UnknownChannelEndpoint {
                    index,
                    name: name.to_owned(),
                })
        };
        let from = resolve(&channel.from.0)?;
        let to = resolve(&channel.to.0)?;
        engine
            .graph
            .connect(Some((from, channel.from.1)), Some((to, channel.to.1)));
    }

    for id in &ids {
        if let Some(behavior) = engine.graph.node(*id).and_then(|n| n.behavior.as_ref()) {
            behavior.register_io(*id, state);
        }
    }

    Ok(ids)
}
