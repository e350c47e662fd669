//! Set, unset or toggle a fixed modifier set on passing events.

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::{EventKey, MODIFIER_MAX, ModifierOperation, ModifierSet};

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "modifiers",
    documentation: "Applies a modifier operation to received events\n\
                    Accepts events on any connector\n\
                    Sends events on all connectors\n\
                    Option 'operation' (required): one of 'set', 'unset' ('reset'), 'toggle'\n\
                    Option 'modifiers' (required): collection of modifier ids (out-of-range entries are skipped)",
    create,
};

struct Modifiers {
    modifiers: ModifierSet,
    operation: ModifierOperation,
}

impl NodeBehavior for Modifiers {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        if ctx.outputs_len() == 0 {
            ctx.events.destroy(event);
            return HandleOutcome::Rewind;
        }
        if let Some(ev) = ctx.events.get_mut(event) {
            ev.data.modifiers.apply_from(&self.modifiers, self.operation);
        }
        ctx.broadcast_forward(event);
        HandleOutcome::Rewind
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    let operation_name = config
        .option("operation")
        .and_then(|v| v.as_str())
        .ok_or(NodeCreateError::MissingOption("operation"))?;
    let operation = ModifierOperation::parse(operation_name).ok_or_else(|| {
        NodeCreateError::InvalidOption {
            option: "operation",
            reason: format!("unknown operation \"{operation_name}\""),
        }
    })?;

    let members = config
        .option("modifiers")
        .and_then(|v| v.as_array())
        .ok_or(NodeCreateError::MissingOption("modifiers"))?;
    let mut modifiers = ModifierSet::new();
    for member in members {
        let value = env.resolve_constant_or(Some(member), -1);
        if (0..=MODIFIER_MAX as i64).contains(&value) {
            modifiers.set(value as i32);
        }
    }

    Ok(Box::new(Modifiers {
        modifiers,
        operation,
    }))
}
