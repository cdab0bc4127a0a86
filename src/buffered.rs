/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;
use std::net::Ipv6Addr;

use crate::util::packet::Packet;

/// How long a buffered packet is allowed to wait for its route before a prune
/// sweep discards it.
pub const BUFFERED_MESSAGE_TTL_SECONDS: u64 = 10;

/// A packet parked while waiting for Pathfinder to resolve a route, keyed by
/// destination IPv6.
pub struct BufferedMessage {
    pub packet: Packet,
    pub insertion_time_seconds: u64,
}

/// Bounded IPv6 → pending-packet map. A new entry for an IPv6 that already
/// has one replaces the older entry outright; the map never holds more than
/// one buffered packet per destination.
pub struct BufferedMessageStore {
    max: usize,
    entries: HashMap<Ipv6Addr, BufferedMessage>,
}

impl BufferedMessageStore {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, ip6: &Ipv6Addr) -> bool {
        self.entries.contains_key(ip6)
    }

    /// Remove expired entries (age ≥ [`BUFFERED_MESSAGE_TTL_SECONDS`]).
    pub fn prune(&mut self, now_seconds: u64) {
        self.entries
            .retain(|_, msg| now_seconds.saturating_sub(msg.insertion_time_seconds) < BUFFERED_MESSAGE_TTL_SECONDS);
    }

    /// Insert `packet` for `ip6`, replacing any existing entry for the same
    /// destination. If the map is at capacity, a TTL sweep runs first and the
    /// ceiling is re-checked; returns `false` (and drops `packet`) if the map
    /// is still full afterward.
    pub fn insert(&mut self, ip6: Ipv6Addr, packet: Packet, now_seconds: u64) -> bool {
        if !self.entries.contains_key(&ip6) && self.entries.len() >= self.max {
            self.prune(now_seconds);
        }
        if !self.entries.contains_key(&ip6) && self.entries.len() >= self.max {
            return false;
        }
        self.entries.insert(
            ip6,
            BufferedMessage {
                packet,
                insertion_time_seconds: now_seconds,
            },
        );
        true
    }

    /// Remove and return the buffered packet for `ip6`, if any, e.g. to drain
    /// it once a route has been discovered.
    pub fn drain(&mut self, ip6: &Ipv6Addr) -> Option<Packet> {
        self.entries.remove(ip6).map(|msg| msg.packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_existing_entry_for_same_ip6() {
        let mut store = BufferedMessageStore::new(4);
        let ip6: Ipv6Addr = "fc00::1".parse().unwrap();
        assert!(store.insert(ip6, Packet::from_wire(&[1]), 0));
        assert!(store.insert(ip6, Packet::from_wire(&[2]), 1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.drain(&ip6).unwrap().as_bytes(), &[2]);
    }

    #[test]
    fn prune_removes_entries_past_ttl() {
        let mut store = BufferedMessageStore::new(4);
        let ip6: Ipv6Addr = "fc00::1".parse().unwrap();
        store.insert(ip6, Packet::from_wire(&[1]), 0);
        store.prune(9);
        assert!(store.contains(&ip6));
        store.prune(10);
        assert!(!store.contains(&ip6));
    }

    #[test]
    fn overflow_at_capacity_prunes_then_drops_if_still_full() {
        let mut store = BufferedMessageStore::new(2);
        let a: Ipv6Addr = "fc00::1".parse().unwrap();
        let b: Ipv6Addr = "fc00::2".parse().unwrap();
        let c: Ipv6Addr = "fc00::3".parse().unwrap();
        assert!(store.insert(a, Packet::from_wire(&[1]), 0));
        assert!(store.insert(b, Packet::from_wire(&[2]), 0));
        // Both entries are fresh, so the sweep won't free a slot.
        assert!(!store.insert(c, Packet::from_wire(&[3]), 1));
        assert_eq!(store.len(), 2);
    }
}
