//! The node catalog: concrete sources, transformers, routers and sinks
//! built on the engine's node contract.
//!
//! Every type lives in its own module with a `SPEC` static describing it
//! (name, help text, constructor); [`builtin_registry`] collects them for
//! the graph builder and the CLI's module listing.

pub mod assign;
pub mod differentiate;
pub mod evdev;
pub mod getchar;
pub mod integrate;
pub mod modifiers;
pub mod modify_predicate;
pub mod print;
pub mod router;
pub mod scale;
pub mod tee;
pub mod uinput;
pub mod window;

use core_engine::NodeRegistry;

/// Registry with every built-in node type.
pub fn builtin_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register(&tee::SPEC);
    registry.register(&assign::SPEC);
    registry.register(&scale::SPEC);
    registry.register(&integrate::SPEC);
    registry.register(&differentiate::SPEC);
    registry.register(&modifiers::SPEC);
    registry.register(&router::SPEC);
    registry.register(&modify_predicate::SPEC);
    registry.register(&window::SPEC);
    registry.register(&getchar::SPEC);
    registry.register(&evdev::SPEC);
    registry.register(&print::SPEC);
    registry.register(&uinput::SPEC);
    registry
}
