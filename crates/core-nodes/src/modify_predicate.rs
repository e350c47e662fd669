//! Runtime predicate mutation: trigger predicates flip the target's
//! `enabled`/`inverted` flags; every received event is consumed.

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::EventKey;
use core_predicate::PredicateHandle;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "modify_predicate",
    documentation: "Changes 'enabled' and 'inverted' flags of a predicate\n\
                    Accepts events on any connector\n\
                    Does not send events\n\
                    Option 'target' (required): the predicate to modify\n\
                    Option 'enable_on' (optional): the predicate, satisfying events of which set 'enabled' flag of the target predicate to 1\n\
                    Option 'disable_on' (optional): the predicate, satisfying events of which set 'enabled' flag of the target predicate to 0\n\
                    Option 'invert_on' (optional): the predicate, satisfying events of which set 'inverted' flag of the target predicate to 1\n\
                    Option 'uninvert_on' (optional): the predicate, satisfying events of which set 'inverted' flag of the target predicate to 0",
    create,
};

struct ModifyPredicate {
    target: PredicateHandle,
    enable_on: Option<PredicateHandle>,
    disable_on: Option<PredicateHandle>,
    invert_on: Option<PredicateHandle>,
    uninvert_on: Option<PredicateHandle>,
}

impl ModifyPredicate {
    fn triggered(
        &self,
        ctx: &NodeCtx<'_>,
        trigger: Option<PredicateHandle>,
        event: EventKey,
    ) -> bool {
        trigger.is_some_and(|handle| ctx.predicates.apply(handle, ctx.target(event)).accepted())
    }
}

impl NodeBehavior for ModifyPredicate {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        let (enabled, inverted) = match ctx.predicates.get(self.target) {
            Some(p) => (p.enabled, p.inverted),
            None => {
                ctx.events.destroy(event);
                return HandleOutcome::Rewind;
            }
        };

        // The current state selects which transitions are even considered,
        // so a single event cannot both disable and re-enable the target.
        let should_disable = enabled && self.triggered(ctx, self.disable_on, event);
        let should_enable = !enabled && self.triggered(ctx, self.enable_on, event);
        let should_uninvert = inverted && self.triggered(ctx, self.uninvert_on, event);
        let should_invert = !inverted && self.triggered(ctx, self.invert_on, event);

        if should_enable {
            ctx.predicates.set_enabled(self.target, true);
        }
        if should_disable {
            ctx.predicates.set_enabled(self.target, false);
        }
        if should_invert {
            ctx.predicates.set_inverted(self.target, true);
        }
        if should_uninvert {
            ctx.predicates.set_inverted(self.target, false);
        }

        ctx.events.destroy(event);
        HandleOutcome::Rewind
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    let target = env
        .resolve_predicate_opt(config.option("target"))?
        .ok_or(NodeCreateError::MissingOption("target"))?;
    Ok(Box::new(ModifyPredicate {
        target,
        enable_on: env.resolve_predicate_opt(config.option("enable_on"))?,
        disable_on: env.resolve_predicate_opt(config.option("disable_on"))?,
        invert_on: env.resolve_predicate_opt(config.option("invert_on"))?,
        uninvert_on: env.resolve_predicate_opt(config.option("uninvert_on"))?,
    }))
}
