//! Predicate-gated copying: one predicate per output connector; the
//! original is always consumed.

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::{EventKey, PositionRef};
use core_predicate::PredicateHandle;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "router",
    documentation: "Conditionally copies the received events\n\
                    Accepts events on any connector\n\
                    Sends events on all connectors with configured predicates\n\
                    Option 'predicates' (required): collection of predicates in the order of output connectors from zero, a received event is copied to the given connector iff it satisfies the predicate",
    create,
};

struct Router {
    predicates: Vec<PredicateHandle>,
}

impl NodeBehavior for Router {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        for index in (0..self.predicates.len()).rev() {
            if index >= ctx.outputs_len() {
                continue;
            }
            let verdict = ctx.predicates.apply(self.predicates[index], ctx.target(event));
            if !verdict.accepted() {
                continue;
            }
            if ctx.events.replicate(event, 1) == 1 {
                let Some(replica) = ctx.events.next(event) else {
                    continue;
                };
                match ctx.output(index) {
                    Some(channel) => {
                        if let Some(ev) = ctx.events.get_mut(replica) {
                            ev.position = Some(PositionRef::Channel(channel));
                        }
                    }
                    None => {
                        ctx.events.destroy(replica);
                    }
                }
            }
        }
        ctx.events.destroy(event);
        HandleOutcome::Rewind
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    let entries = config
        .option("predicates")
        .and_then(|v| v.as_array())
        .ok_or(NodeCreateError::MissingOption("predicates"))?;
    let mut predicates = Vec::with_capacity(entries.len());
    for entry in entries {
        predicates.push(env.resolve_predicate(entry)?);
    }
    Ok(Box::new(Router { predicates }))
}
