//! Unconditional fan-out.

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::EventKey;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "tee",
    documentation: "Forwards received events to every connector\n\
                    Accepts events on any connector\n\
                    Sends events on all connectors",
    create,
};

struct Tee;

impl NodeBehavior for Tee {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        ctx.broadcast_forward(event);
        HandleOutcome::Rewind
    }
}

fn create(
    _config: &NodeConfig,
    _env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    Ok(Box::new(Tee))
}
