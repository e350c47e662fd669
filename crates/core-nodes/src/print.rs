//! Textual dump sink.

use std::io::Write;

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::{Event, EventKey};
use tracing::warn;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "print",
    documentation: "Prints received events\n\
                    Accepts events on any connector\n\
                    Does not send events",
    create,
};

/// Public so embedders and tests can aim the dump at any writer; the
/// configured node writes to standard output.
pub struct Print {
    out: Box<dyn Write>,
}

impl Print {
    pub fn new() -> Self {
        Print {
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn with_writer(out: Box<dyn Write>) -> Self {
        Print { out }
    }

    fn dump(&mut self, event: &Event) -> std::io::Result<()> {
        let data = &event.data;
        writeln!(self.out, "Event from connector {}:", event.input_index)?;
        writeln!(self.out, "code.ns = {}", data.code.ns)?;
        writeln!(self.out, "code.major = {}", data.code.major)?;
        writeln!(self.out, "code.minor = {}", data.code.minor)?;
        writeln!(self.out, "ttl = {}", data.ttl)?;
        writeln!(self.out, "priority = {}", data.priority)?;
        writeln!(self.out, "payload = {}", data.payload)?;
        write!(self.out, "modifiers = ")?;
        for byte in data.modifiers.bytes().iter().rev() {
            write!(self.out, "{byte:02x}")?;
        }
        writeln!(self.out)?;
        writeln!(
            self.out,
            "time = {}.{:09}",
            data.time.secs(),
            data.time.subsec_nanos()
        )?;
        writeln!(self.out, "---")?;
        writeln!(self.out)
    }
}

impl Default for Print {
    fn default() -> Self {
        Print::new()
    }
}

impl NodeBehavior for Print {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        if let Some(ev) = ctx.events.get(event) {
            if let Err(error) = self.dump(ev) {
                warn!(target: "node.print", %error, "dump failed");
            }
        }
        ctx.events.destroy(event);
        HandleOutcome::Rewind
    }
}

fn create(
    _config: &NodeConfig,
    _env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    Ok(Box::new(Print::new()))
}
