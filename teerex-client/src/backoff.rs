//! Exponential backoff between `/prove` retry attempts (spec §4.7: "retry up
//! to 2 times on transport errors").

use std::cmp::min;
use std::time::Duration;

const INITIAL_WAIT_MS: u64 = 250;
const MAXIMUM_WAIT_MS: u64 = 4_000;
const EXP_BASE: u64 = 2;

/// An iterator of backoff durations: 250ms, 500ms, 1s, 2s, 4s, 4s, ...
pub fn get_backoff_iter() -> impl Iterator<Item = Duration> {
    (0u32..).map(|index| {
        let factor = EXP_BASE.saturating_pow(index);
        let wait_ms = INITIAL_WAIT_MS.saturating_mul(factor);
        Duration::from_millis(min(wait_ms, MAXIMUM_WAIT_MS))
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_integer_overflow() {
        let mut durations = get_backoff_iter();
        for _ in 0..200 {
            durations.next();
        }
    }

    #[test]
    fn grows_then_caps() {
        let durations: Vec<_> = get_backoff_iter().take(5).collect();
        assert_eq!(durations[0], Duration::from_millis(250));
        assert_eq!(durations[1], Duration::from_millis(500));
        assert_eq!(durations[4], Duration::from_millis(MAXIMUM_WAIT_MS));
    }
}
