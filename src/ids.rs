/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// Lowest handle value the manager will ever assign. Values 0-3 are reserved
/// by the cryptographic protocol to denote handshake nonces in-band.
pub const FIRST_ASSIGNABLE_HANDLE: u32 = 4;

/// Lower bound (inclusive) for the random `firstHandle` offset.
pub const FIRST_HANDLE_RANGE_MIN: u32 = 4;

/// Upper bound (inclusive) for the random `firstHandle` offset.
pub const FIRST_HANDLE_RANGE_MAX: u32 = 100_000;

/// A 32-bit opaque identifier a peer stamps on packets so the manager can look
/// up the owning session without re-parsing identity. Handles are always
/// `>= FIRST_ASSIGNABLE_HANDLE`; the manager never assigns 0-3, which the
/// crypto protocol reserves for handshake nonces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// Wrap a raw handle value. Returns `None` if it falls in the reserved
    /// nonce range (0-3): such a value can never have been assigned by this
    /// manager and must be treated as a handshake nonce instead.
    #[inline]
    pub fn new(raw: u32) -> Option<Self> {
        if raw >= FIRST_ASSIGNABLE_HANDLE {
            Some(Self(raw))
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn get(self) -> u32 {
        self.0
    }

    /// True if `raw` falls in 0-3, the in-band handshake nonce range.
    #[inline(always)]
    pub fn is_reserved_nonce(raw: u32) -> bool {
        raw < FIRST_ASSIGNABLE_HANDLE
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reserved_nonce_values() {
        for raw in 0..4u32 {
            assert!(Handle::new(raw).is_none());
            assert!(Handle::is_reserved_nonce(raw));
        }
    }

    #[test]
    fn accepts_values_at_and_above_four() {
        assert_eq!(Handle::new(4).unwrap().get(), 4);
        assert_eq!(Handle::new(100_000).unwrap().get(), 100_000);
    }
}
