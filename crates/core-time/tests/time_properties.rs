//! Property coverage for the time arithmetic: round trips and normalization
//! must hold for arbitrary (bounded) inputs, not just the hand-picked cases
//! in the unit tests.

use core_time::{AbsoluteTime, NANOS_IN_SECOND, RelativeTime};
use proptest::prelude::*;

// Bounded so that intermediate second arithmetic cannot overflow i64.
const SEC_RANGE: std::ops::RangeInclusive<i64> = -1_000_000_000..=1_000_000_000;
const NANO_RANGE: std::ops::RangeInclusive<i64> = -10_000_000_000..=10_000_000_000;

fn abs_time() -> impl Strategy<Value = AbsoluteTime> {
    (SEC_RANGE, NANO_RANGE).prop_map(|(s, n)| AbsoluteTime::new(s, n))
}

fn rel_time() -> impl Strategy<Value = RelativeTime> {
    (SEC_RANGE, NANO_RANGE).prop_map(|(s, n)| RelativeTime::new(s, n))
}

proptest! {
    #[test]
    fn nanos_stay_normalized(t in rel_time()) {
        prop_assert!((t.subsec_nanos() as i64) < NANOS_IN_SECOND);
    }

    #[test]
    fn add_then_sub_restores_absolute(a in abs_time(), d in rel_time()) {
        prop_assert_eq!((a + d) - a, d);
    }

    #[test]
    fn sub_then_add_restores_absolute(a in abs_time(), b in abs_time()) {
        prop_assert_eq!((a - b) + b, a);
    }

    #[test]
    fn relative_sum_is_commutative(a in rel_time(), b in rel_time()) {
        prop_assert_eq!(a + b, b + a);
    }

    #[test]
    fn ordering_agrees_with_difference_sign(a in abs_time(), b in abs_time()) {
        let d = a - b;
        match a.cmp(&b) {
            std::cmp::Ordering::Less => prop_assert!(d.is_negative()),
            std::cmp::Ordering::Equal => prop_assert_eq!(d, RelativeTime::ZERO),
            std::cmp::Ordering::Greater => {
                prop_assert!(!d.is_negative() && d != RelativeTime::ZERO)
            }
        }
    }
}
