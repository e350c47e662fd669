//! Kernel input device source: reads `input_event` records from an evdev
//! character device and rebases their realtime stamps onto the monotonic
//! clock the engine schedules by.

use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::fd::RawFd;

use core_config::{InitEnv, NodeConfig};
use core_engine::{
    IoStatus, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification, ProcessingState,
};
use core_events::{EventCode, EventData, NodeId, PositionRef};
use core_time::AbsoluteTime;
use tracing::warn;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "evdev",
    documentation: "Reads events from an evdev input device\n\
                    Does not accept events\n\
                    Sends events on all connectors; event code is (namespace, type, code), payload is the value\n\
                    Option 'file' (required): device file to open, e.g. /dev/input/event3\n\
                    Option 'namespace' (optional): event code namespace, default 1",
    create,
};

struct Evdev {
    namespace: u32,
    fd: RawFd,
}

impl Drop for Evdev {
    fn drop(&mut self) {
        // SAFETY: fd was opened by create and is owned by this node.
        unsafe { libc::close(self.fd) };
    }
}

fn realtime_now() -> AbsoluteTime {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid, writable timespec.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    if rc < 0 {
        return AbsoluteTime::ZERO;
    }
    AbsoluteTime::new(ts.tv_sec as i64, ts.tv_nsec as i64)
}

impl NodeBehavior for Evdev {
    fn handle_io(&mut self, ctx: &mut NodeCtx<'_>, fd: RawFd, _is_write: bool) -> IoStatus {
        // Kernel stamps are CLOCK_REALTIME; the engine orders by the
        // monotonic clock. Sample the offset once per readiness burst.
        let realtime_adj = realtime_now() - AbsoluteTime::now();

        loop {
            let mut record = MaybeUninit::<libc::input_event>::uninit();
            let size = std::mem::size_of::<libc::input_event>();
            // SAFETY: reading at most `size` bytes into a buffer of that size.
            let n = unsafe { libc::read(fd, record.as_mut_ptr().cast(), size) };
            if n == 0 {
                return IoStatus::Disable;
            }
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return IoStatus::Continue;
                }
                warn!(target: "node.evdev", fd, error = %err, "read failed");
                return IoStatus::Disable;
            }
            if n as usize != size {
                warn!(target: "node.evdev", fd, bytes = n, "short input_event read");
                return IoStatus::Disable;
            }
            // SAFETY: the kernel filled a complete input_event record.
            let record = unsafe { record.assume_init() };

            let stamped = AbsoluteTime::new(
                record.time.tv_sec as i64,
                record.time.tv_usec as i64 * 1_000,
            );
            let data = EventData {
                code: EventCode::new(self.namespace, record.type_, record.code),
                ttl: 100,
                priority: 10,
                payload: record.value as i64,
                modifiers: core_events::ModifierSet::new(),
                time: stamped - realtime_adj,
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

    fn register_io(&self, node: NodeId, state: &mut ProcessingState) {
        state.wait_input.add(self.fd, node);
    }
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    let file = config
        .option("file")
        .and_then(|v| v.as_str())
        .ok_or(NodeCreateError::MissingOption("file"))?;
    let path = CString::new(file).map_err(|_| NodeCreateError::InvalidOption {
        option: "file",
        reason: "path contains an interior NUL".to_owned(),
    })?;
    // SAFETY: path is a valid NUL-terminated string.
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY | libc::O_NONBLOCK) };
    if fd < 0 {
        return Err(NodeCreateError::Io(std::io::Error::last_os_error()));
    }
    Ok(Box::new(Evdev {
        namespace: env.resolve_constant_or(config.option("namespace"), 1) as u32,
        fd,
    }))
}
