//! Byte-stream source: one event per byte read from a descriptor
//! (standard input by default).

use std::os::fd::RawFd;

use core_config::{InitEnv, NodeConfig};
use core_engine::{
    IoStatus, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification, ProcessingState,
};
use core_events::{EventCode, EventData, NodeId, PositionRef};
use core_time::AbsoluteTime;
use tracing::warn;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "getchar",
    documentation: "Reads bytes from a file descriptor (standard input by default) and emits one event per byte: code (namespace, 0, 1) with the byte as payload, or (namespace, 0, 2) with payload 0 on end of input\n\
                    Does not accept events\n\
                    Sends events on all connectors\n\
                    Option 'namespace' (optional): event code namespace\n\
                    Option 'fd' (optional): file descriptor to read instead of standard input",
    create,
};

struct Getchar {
    namespace: u32,
    fd: RawFd,
}

impl Getchar {
    fn emit(&self, ctx: &mut NodeCtx<'_>, minor: u16, payload: i64) {
        let data = EventData {
            code: EventCode::new(self.namespace, 0, minor),
            ttl: 100,
            priority: 10,
            payload,
            modifiers: core_events::ModifierSet::new(),
            time: AbsoluteTime::now(),
        };
        for index in 0..ctx.outputs_len() {
            let Some(channel) = ctx.output(index) else {
                continue;
            };
            let key = ctx.events.create(data.clone());
            if let Some(ev) = ctx.events.get_mut(key) {
                ev.position = Some(PositionRef::Channel(channel));
            }
        }
    }
}

impl NodeBehavior for Getchar {
    fn handle_io(&mut self, ctx: &mut NodeCtx<'_>, fd: RawFd, _is_write: bool) -> IoStatus {
        let mut buf = [0u8; 1];
        // SAFETY: one-byte read into a local buffer.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), 1) };
        if n < 0 {
            warn!(
                target: "node.getchar",
                fd,
                errno = std::io::Error::last_os_error().raw_os_error(),
                "read failed"
            );
            return IoStatus::Continue;
        }
        if n == 0 {
            // End of input: a final sentinel event, then stop listening.
            self.emit(ctx, 2, 0);
            return IoStatus::Disable;
        }
        self.emit(ctx, 1, buf[0] as i64);
        IoStatus::Continue
    }

    fn register_io(&self, node: NodeId, state: &mut ProcessingState) {
        state.wait_input.add(self.fd, node);
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    Ok(Box::new(Getchar {
        namespace: env.resolve_constant(config.option("namespace")) as u32,
        fd: env.resolve_constant_or(config.option("fd"), 0) as RawFd,
    }))
}
