//! Synthetic input device sink: creates a uinput device at construction
//! time and writes every delivered event to it as a kernel `input_event`.

use std::os::fd::RawFd;

use core_config::{InitEnv, NodeConfig};
use core_engine::{HandleOutcome, NodeBehavior, NodeCreateError, NodeCtx, NodeSpecification};
use core_events::EventKey;
use tracing::warn;

pub static SPEC: NodeSpecification = NodeSpecification {
    name: "uinput",
    documentation: "Writes received events to a synthetic uinput device\n\
                    Accepts events on any connector; event code major/minor become the input event type/code, payload the value\n\
                    Does not send events\n\
                    Option 'name' (required): device name\n\
                    Option 'enabled_codes' (required): collection of { major, minor } code pairs the device is declared to emit",
    create,
};

// input.h event type identifiers; only these have per-code enable ioctls.
const EV_KEY: i64 = 0x01;
const EV_REL: i64 = 0x02;
const EV_ABS: i64 = 0x03;
const EV_MSC: i64 = 0x04;
const BUS_VIRTUAL: u16 = 0x06;

// linux/uinput.h ioctl request codes; not provided by the libc crate.
const UI_DEV_CREATE: libc::Ioctl = 0x5501;
const UI_DEV_DESTROY: libc::Ioctl = 0x5502;
const UI_DEV_SETUP: libc::Ioctl = 0x405c5503;
const UI_SET_EVBIT: libc::Ioctl = 0x40045564;
const UI_SET_KEYBIT: libc::Ioctl = 0x40045565;
const UI_SET_RELBIT: libc::Ioctl = 0x40045566;
const UI_SET_ABSBIT: libc::Ioctl = 0x40045567;
const UI_SET_MSCBIT: libc::Ioctl = 0x40045568;

struct Uinput {
    fd: RawFd,
}

impl Drop for Uinput {
    fn drop(&mut self) {
        // SAFETY: tearing down the device we created on our own fd.
        unsafe {
            libc::ioctl(self.fd, UI_DEV_DESTROY);
            libc::close(self.fd);
        }
    }
}

impl NodeBehavior for Uinput {
    fn handle_event(&mut self, ctx: &mut NodeCtx<'_>, event: EventKey) -> HandleOutcome {
        if let Some(ev) = ctx.events.get(event) {
            // SAFETY: input_event is plain old data; zeroing leaves the
            // timestamp for the kernel to fill.
            let mut record: libc::input_event = unsafe { std::mem::zeroed() };
            record.type_ = ev.data.code.major;
            record.code = ev.data.code.minor;
            record.value = ev.data.payload as i32;
            // SAFETY: writing one complete record from a local value.
            let n = unsafe {
                libc::write(
                    self.fd,
                    (&record as *const libc::input_event).cast(),
                    std::mem::size_of::<libc::input_event>(),
                )
            };
            if n < 0 {
                warn!(
                    target: "node.uinput",
                    errno = std::io::Error::last_os_error().raw_os_error(),
                    "device write failed"
                );
            }
        }
        ctx.events.destroy(event);
        HandleOutcome::Rewind
    }
}

fn enable_code(fd: RawFd, major: i64, minor: i64) -> std::io::Result<()> {
    // SAFETY: plain integer ioctls on the uinput fd we own.
    unsafe {
        if libc::ioctl(fd, UI_SET_EVBIT, major as libc::c_int) < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let rc = match major {
            EV_KEY => libc::ioctl(fd, UI_SET_KEYBIT, minor as libc::c_int),
            EV_REL => libc::ioctl(fd, UI_SET_RELBIT, minor as libc::c_int),
            EV_ABS => libc::ioctl(fd, UI_SET_ABSBIT, minor as libc::c_int),
            EV_MSC => libc::ioctl(fd, UI_SET_MSCBIT, minor as libc::c_int),
            // EV_SYN and the remaining types need no per-code enabling.
            _ => 0,
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

fn create(
    config: &NodeConfig,
    env: &mut InitEnv<'_>,
) -> Result<Box<dyn NodeBehavior>, NodeCreateError> {
    let name = config
        .option("name")
        .and_then(|v| v.as_str())
        .ok_or(NodeCreateError::MissingOption("name"))?;
    let enabled_codes = config
        .option("enabled_codes")
        .and_then(|v| v.as_array())
        .ok_or(NodeCreateError::MissingOption("enabled_codes"))?;

    // SAFETY: opening the uinput control device.
    let fd = unsafe {
        libc::open(
            c"/dev/uinput".as_ptr(),
            libc::O_WRONLY | libc::O_NONBLOCK,
        )
    };
    if fd < 0 {
        return Err(NodeCreateError::Io(std::io::Error::last_os_error()));
    }
    let device = Uinput { fd };

    for code in enabled_codes {
        let major = env.resolve_constant(code.get("major"));
        let minor = env.resolve_constant(code.get("minor"));
        enable_code(fd, major, minor)?;
    }

    let mut setup: libc::uinput_setup = unsafe { std::mem::zeroed() };
    setup.id.bustype = BUS_VIRTUAL;
    // Keep at least one trailing NUL in the fixed-size name field.
    let copy_len = name.len().min(setup.name.len() - 1);
    for (dst, src) in setup.name.iter_mut().zip(&name.as_bytes()[..copy_len]) {
        *dst = *src as libc::c_char;
    }
    // SAFETY: setup is a fully initialised uinput_setup owned by this frame.
    unsafe {
        if libc::ioctl(fd, UI_DEV_SETUP, &setup) < 0 {
            return Err(NodeCreateError::Io(std::io::Error::last_os_error()));
        }
        if libc::ioctl(fd, UI_DEV_CREATE) < 0 {
            return Err(NodeCreateError::Io(std::io::Error::last_os_error()));
        }
    }

    Ok(Box::new(device))
}
