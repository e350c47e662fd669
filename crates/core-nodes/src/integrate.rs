//! Running sum over payloads.

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::EventKey;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "integrate",
    documentation: "Calculates a running sum of previous event payloads and replaces with it the current one\n\
                    Accepts events on any connector\n\
                    Sends events on all connectors\n\
                    Option 'initial' (optional): the initial partial sum value",
    create,
};

struct Integrate {
    total: i64,
}

impl NodeBehavior for Integrate {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        if ctx.outputs_len() == 0 {
            ctx.events.destroy(event);
            return HandleOutcome::Rewind;
        }
        if let Some(ev) = ctx.events.get_mut(event) {
            self.total = self.total.wrapping_add(ev.data.payload);
            ev.data.payload = self.total;
        }
        ctx.broadcast_forward(event);
        HandleOutcome::Rewind
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    Ok(Box::new(Integrate {
        total: env.resolve_constant(config.option("initial")),
    }))
}
