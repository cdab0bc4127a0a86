/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;
use std::net::Ipv6Addr;

use rand::Rng;

use crate::crypto::CryptoAuth;
use crate::ids::{Handle, FIRST_HANDLE_RANGE_MAX, FIRST_HANDLE_RANGE_MIN};
use crate::session::Session;

/// Dual-keyed session table: IPv6 → session, and stable handle → session.
///
/// Handles must survive rehashing of the IPv6 index, so sessions live in a
/// tagged-index slab (`Vec<Option<Session>>` plus a free list) rather than
/// directly in a `HashMap<Handle, _>`; a handle is recovered from a slot index
/// as `first_handle + internal_index`, which stays valid even as the IPv6 map
/// is rehashed around it.
pub struct SessionTable<CA: CryptoAuth> {
    first_handle: u32,
    slots: Vec<Option<Session<CA>>>,
    free: Vec<usize>,
    by_ip6: HashMap<Ipv6Addr, usize>,
}

impl<CA: CryptoAuth> SessionTable<CA> {
    /// Build a new table with `first_handle` drawn uniformly from
    /// `[4, 100000]`, per the spec's boundary behavior.
    pub fn new() -> Self {
        let first_handle = rand::thread_rng().gen_range(FIRST_HANDLE_RANGE_MIN..=FIRST_HANDLE_RANGE_MAX);
        Self::with_first_handle(first_handle)
    }

    /// Build a table with an explicit `first_handle`, bypassing randomness.
    /// Used by tests that need deterministic handle values.
    pub fn with_first_handle(first_handle: u32) -> Self {
        Self {
            first_handle,
            slots: Vec::new(),
            free: Vec::new(),
            by_ip6: HashMap::new(),
        }
    }

    #[inline]
    fn handle_for_index(&self, index: usize) -> Handle {
        Handle::new(self.first_handle + index as u32).expect("first_handle is always >= 4")
    }

    #[inline]
    fn index_for_handle(&self, handle: Handle) -> Option<usize> {
        handle.get().checked_sub(self.first_handle).map(|n| n as usize)
    }

    pub fn lookup_by_ip6(&self, ip6: &Ipv6Addr) -> Option<&Session<CA>> {
        let idx = *self.by_ip6.get(ip6)?;
        self.slots[idx].as_ref()
    }

    pub fn lookup_by_ip6_mut(&mut self, ip6: &Ipv6Addr) -> Option<&mut Session<CA>> {
        let idx = *self.by_ip6.get(ip6)?;
        self.slots[idx].as_mut()
    }

    pub fn lookup_by_handle(&self, handle: Handle) -> Option<&Session<CA>> {
        let idx = self.index_for_handle(handle)?;
        self.slots.get(idx)?.as_ref()
    }

    pub fn lookup_by_handle_mut(&mut self, handle: Handle) -> Option<&mut Session<CA>> {
        let idx = self.index_for_handle(handle)?;
        self.slots.get_mut(idx)?.as_mut()
    }

    /// Insert a new session for `ip6`, returning its freshly allocated
    /// `receive_handle`. Panics if `ip6` is already present: callers must
    /// check with [`Self::lookup_by_ip6`] first, per the spec's contract
    /// that `insert` fails only when the caller didn't pre-check (a
    /// programming error in this crate's own call sites, not a recoverable
    /// per-packet condition).
    pub fn insert(&mut self, ip6: Ipv6Addr, build: impl FnOnce(Handle) -> Session<CA>) -> Handle {
        assert!(
            !self.by_ip6.contains_key(&ip6),
            "session table insert called for an ip6 that already has a live session"
        );
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        let handle = self.handle_for_index(idx);
        let session = build(handle);
        debug_assert_eq!(session.her_ip6(), ip6, "session's derived ip6 must match the table key");
        self.slots[idx] = Some(session);
        self.by_ip6.insert(ip6, idx);
        handle
    }

    /// Remove and return the session for `ip6`, if any, freeing its slot for
    /// reuse. `internal_index` values are never reused until explicitly
    /// freed here, per the spec's invariant on handle stability.
    pub fn remove(&mut self, ip6: &Ipv6Addr) -> Option<Session<CA>> {
        let idx = self.by_ip6.remove(ip6)?;
        let session = self.slots[idx].take();
        self.free.push(idx);
        session
    }

    /// Snapshot the handles of every live session. Stable against concurrent
    /// mutation within the caller's own ingress call since the manager is
    /// single-threaded (§5).
    pub fn enumerate(&self) -> Vec<Handle> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|_| self.handle_for_index(idx)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session<CA>> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session<CA>> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }
}

impl<CA: CryptoAuth> Default for SessionTable<CA> {
    fn default() -> Self {
        Self::new()
    }
}
