//! Payload scaling by a constant fraction around a configurable center,
//! optionally carrying the integer-division defect into the next event.

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::EventKey;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "scale",
    documentation: "Multiplies event payload by a constant fraction\n\
                    Accepts events on any connector\n\
                    Sends events on all connectors\n\
                    Option 'numerator' (optional): an integer to multiply by\n\
                    Option 'denominator' (optional): an integer to divide by\n\
                    Option 'center' (optional): an integer to scale around\n\
                    Option 'amortize_rounding_error' (optional): whether to adjust the new event value by the rounding error of the previous event value",
    create,
};

struct Scale {
    numerator: i64,
    denominator: i64,
    center: i64,
    defect: i64,
    amortize_rounding_error: bool,
}

impl NodeBehavior for Scale {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        if ctx.outputs_len() == 0 {
            ctx.events.destroy(event);
            return HandleOutcome::Rewind;
        }
        if let Some(ev) = ctx.events.get_mut(event) {
            let mut value = ev.data.payload.wrapping_sub(self.center);
            value = value.wrapping_mul(self.numerator);
            if self.amortize_rounding_error {
                value = value.wrapping_add(self.defect);
            }
            if self.denominator != 0 {
                let undivided = value;
                value /= self.denominator;
                self.defect = undivided.wrapping_sub(value.wrapping_mul(self.denominator));
            }
            ev.data.payload = value.wrapping_add(self.center);
        }
        ctx.broadcast_forward(event);
        HandleOutcome::Rewind
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    Ok(Box::new(Scale {
        numerator: env.resolve_constant_or(config.option("numerator"), 1),
        denominator: env.resolve_constant_or(config.option("denominator"), 1),
        center: env.resolve_constant_or(config.option("center"), 0),
        amortize_rounding_error: env.resolve_constant(config.option("amortize_rounding_error")) != 0,
        defect: 0,
    }))
}
