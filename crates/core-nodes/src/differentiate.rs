//! Successive difference of payloads.

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::EventKey;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "differentiate",
    documentation: "Subtracts the previous event payload from the current one\n\
                    Accepts events on any connector\n\
                    Sends events on all connectors\n\
                    Option 'initial' (optional): the value to subtract from the first event payload",
    create,
};

struct Differentiate {
    previous: i64,
}

impl NodeBehavior for Differentiate {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        if ctx.outputs_len() == 0 {
            ctx.events.destroy(event);
            return HandleOutcome::Rewind;
        }
        if let Some(ev) = ctx.events.get_mut(event) {
            let current = ev.data.payload;
            ev.data.payload = current.wrapping_sub(self.previous);
            self.previous = current;
        }
        ctx.broadcast_forward(event);
        HandleOutcome::Rewind
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    Ok(Box::new(Differentiate {
        previous: env.resolve_constant(config.option("initial")),
    }))
}
