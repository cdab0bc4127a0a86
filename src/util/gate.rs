/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Boolean rate limiter with normal (non-atomic) semantics.
///
/// The session manager is driven by a single-threaded cooperative event loop (no
/// concurrent mutation), so only the non-atomic form is needed here.
#[repr(transparent)]
pub struct IntervalGate<const FREQ_MS: i64>(i64);

impl<const FREQ_MS: i64> Default for IntervalGate<FREQ_MS> {
    #[inline(always)]
    fn default() -> Self {
        Self(0)
    }
}

impl<const FREQ_MS: i64> IntervalGate<FREQ_MS> {
    #[inline(always)]
    pub fn new(initial_ts: i64) -> Self {
        Self(initial_ts)
    }

    /// Returns true (and latches `time`) if at least `FREQ_MS` has elapsed since the last true.
    #[inline(always)]
    pub fn gate(&mut self, time: i64) -> bool {
        if (time - self.0) >= FREQ_MS {
            self.0 = time;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_at_frequency() {
        let mut g: IntervalGate<1000> = IntervalGate::new(0);
        assert!(!g.gate(500));
        assert!(g.gate(1000));
        assert!(!g.gate(1999));
        assert!(g.gate(2000));
    }
}
