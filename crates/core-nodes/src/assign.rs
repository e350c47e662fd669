//! Field overwrite: stamp configured code/payload values onto every event
//! passing through.

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::EventKey;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "assign",
    documentation: "Assigns field(s) in an event\n\
                    Accepts events on any connector\n\
                    Sends events on all connectors\n\
                    Option 'namespace' (optional): new event code namespace\n\
                    Option 'major' (optional): new event code major\n\
                    Option 'minor' (optional): new event code minor\n\
                    Option 'payload' (optional): new event payload",
    create,
};

struct Assign {
    ns: Option<u32>,
    major: Option<u16>,
    minor: Option<u16>,
    payload: Option<i64>,
}

impl NodeBehavior for Assign {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        if ctx.outputs_len() == 0 {
            ctx.events.destroy(event);
            return HandleOutcome::Rewind;
        }
        if let Some(ev) = ctx.events.get_mut(event) {
            if let Some(ns) = self.ns {
                ev.data.code.ns = ns;
            }
            if let Some(major) = self.major {
                ev.data.code.major = major;
            }
            if let Some(minor) = self.minor {
                ev.data.code.minor = minor;
            }
            if let Some(payload) = self.payload {
                ev.data.payload = payload;
            }
        }
        ctx.broadcast_forward(event);
        HandleOutcome::Rewind
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    let field = |key| {
        config
            .option(key)
            .map(|value| env.resolve_constant_or(Some(value), 0))
    };
    Ok(Box::new(Assign {
        ns: field("namespace").map(|v| v as u32),
        major: field("major").map(|v| v as u16),
        minor: field("minor").map(|v| v as u16),
        payload: field("payload"),
    }))
}
