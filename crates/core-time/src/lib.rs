//! Monotonic time primitives for the event engine.
//!
//! Two wrapper types keep points on the monotonic clock (`AbsoluteTime`) and
//! durations (`RelativeTime`) apart at the type level; only the mixed-type
//! arithmetic that makes sense is implemented (`Absolute - Absolute ->
//! Relative`, `Absolute ± Relative -> Absolute`, `Relative ± Relative ->
//! Relative`). Both types store a `(secs, nanos)` pair normalized so that
//! `nanos ∈ [0, 10⁹)`; a subtraction that would go below zero borrows from
//! the seconds field, so negative durations carry negative `secs` with a
//! still-normalized `nanos`, the same representation a normalized
//! `timespec` uses. Ordering is lexicographic on `(secs, nanos)`.

pub const NANOS_IN_SECOND: i64 = 1_000_000_000;
pub const MILLIS_IN_SECOND: i64 = 1_000;

/// A point on `CLOCK_MONOTONIC`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsoluteTime {
    secs: i64,
    nanos: u32,
}

/// A signed duration between two [`AbsoluteTime`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativeTime {
    secs: i64,
    nanos: u32,
}

fn normalize(secs: i64, nanos: i64) -> (i64, u32) {
    let carry = nanos.div_euclid(NANOS_IN_SECOND);
    let nanos = nanos.rem_euclid(NANOS_IN_SECOND);
    (secs + carry, nanos as u32)
}

impl AbsoluteTime {
    pub const ZERO: AbsoluteTime = AbsoluteTime { secs: 0, nanos: 0 };

    pub fn new(secs: i64, nanos: i64) -> Self {
        let (secs, nanos) = normalize(secs, nanos);
        AbsoluteTime { secs, nanos }
    }

    /// Current monotonic time. A failing clock read yields the zero time
    /// rather than an error; the engine treats time as advisory ordering
    /// data, not as a fallible resource.
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid, writable timespec for the duration of the call.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        if rc < 0 {
            return AbsoluteTime::ZERO;
        }
        AbsoluteTime::new(ts.tv_sec as i64, ts.tv_nsec as i64)
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }
}

impl RelativeTime {
    pub const ZERO: RelativeTime = RelativeTime { secs: 0, nanos: 0 };

    pub fn new(secs: i64, nanos: i64) -> Self {
        let (secs, nanos) = normalize(secs, nanos);
        RelativeTime { secs, nanos }
    }

    pub fn from_nanos(nanos: i64) -> Self {
        RelativeTime::new(0, nanos)
    }

    pub fn from_millis(millis: i64) -> Self {
        let secs = millis.div_euclid(MILLIS_IN_SECOND);
        let sub = millis.rem_euclid(MILLIS_IN_SECOND);
        RelativeTime::new(secs, sub * (NANOS_IN_SECOND / MILLIS_IN_SECOND))
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// True for durations strictly below zero. `nanos` is always
    /// non-negative, so the sign lives entirely in `secs`.
    pub fn is_negative(&self) -> bool {
        self.secs < 0
    }

    /// Poll timeout conversion. Negative durations clamp to zero: a
    /// deadline in the past means "do not block".
    pub fn to_timespec(self) -> libc::timespec {
        if self.is_negative() {
            return libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            };
        }
        libc::timespec {
            tv_sec: self.secs as libc::time_t,
            tv_nsec: self.nanos as libc::c_long,
        }
    }
}

impl std::ops::Sub for AbsoluteTime {
    type Output = RelativeTime;

    fn sub(self, rhs: AbsoluteTime) -> RelativeTime {
        RelativeTime::new(
            self.secs - rhs.secs,
            self.nanos as i64 - rhs.nanos as i64,
        )
    }
}

impl std::ops::Add<RelativeTime> for AbsoluteTime {
    type Output = AbsoluteTime;

    fn add(self, rhs: RelativeTime) -> AbsoluteTime {
        AbsoluteTime::new(self.secs + rhs.secs, self.nanos as i64 + rhs.nanos as i64)
    }
}

impl std::ops::Sub<RelativeTime> for AbsoluteTime {
    type Output = AbsoluteTime;

    fn sub(self, rhs: RelativeTime) -> AbsoluteTime {
        AbsoluteTime::new(self.secs - rhs.secs, self.nanos as i64 - rhs.nanos as i64)
    }
}

impl std::ops::Add for RelativeTime {
    type Output = RelativeTime;

    fn add(self, rhs: RelativeTime) -> RelativeTime {
        RelativeTime::new(self.secs + rhs.secs, self.nanos as i64 + rhs.nanos as i64)
    }
}

impl std::ops::Sub for RelativeTime {
    type Output = RelativeTime;

    fn sub(self, rhs: RelativeTime) -> RelativeTime {
        RelativeTime::new(self.secs - rhs.secs, self.nanos as i64 - rhs.nanos as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_borrows_from_seconds() {
        let d = RelativeTime::from_nanos(-1);
        assert_eq!(d.secs(), -1);
        assert_eq!(d.subsec_nanos(), 999_999_999);
        assert!(d.is_negative());
    }

    #[test]
    fn normalization_carries_into_seconds() {
        let d = RelativeTime::new(1, NANOS_IN_SECOND + 5);
        assert_eq!(d.secs(), 2);
        assert_eq!(d.subsec_nanos(), 5);
    }

    #[test]
    fn from_millis_handles_negative_values() {
        let d = RelativeTime::from_millis(-1500);
        assert_eq!(d.secs(), -2);
        assert_eq!(d.subsec_nanos(), 500_000_000);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = AbsoluteTime::new(1, 999_999_999);
        let b = AbsoluteTime::new(2, 0);
        assert!(a < b);
        // A nanoseconds-only comparison would order these the other way.
        let c = AbsoluteTime::new(3, 1);
        assert!(b < c);
    }

    #[test]
    fn absolute_difference_round_trips() {
        let a = AbsoluteTime::new(5, 100);
        let b = AbsoluteTime::new(3, 999_999_950);
        let d = a - b;
        assert_eq!(b + d, a);
    }

    #[test]
    fn negative_timeout_clamps_to_zero() {
        let ts = RelativeTime::from_millis(-20).to_timespec();
        assert_eq!(ts.tv_sec, 0);
        assert_eq!(ts.tv_nsec, 0);
    }

    #[test]
    fn monotonic_now_is_nondecreasing() {
        let a = AbsoluteTime::now();
        let b = AbsoluteTime::now();
        assert!(a <= b);
    }
}
