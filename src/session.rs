/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::net::Ipv6Addr;

use crate::crypto::{CaSession, CryptoAuth};
use crate::ids::Handle;

/// Per-peer state owned by the session table. One `Session` exists for every
/// live entry in both the IPv6 and handle indices (they are created and
/// destroyed together; see [`crate::table::SessionTable`]).
pub struct Session<CA: CryptoAuth> {
    /// Owned CryptoAuth session state; `her_ip6()`/`her_public_key()` derive
    /// from it rather than being stored redundantly here.
    pub ca_session: CA::Session,

    /// The handle we expect the peer to stamp on packets addressed to us.
    /// Fixed for the session's lifetime.
    pub receive_handle: Handle,

    /// The handle we must stamp on packets to the peer. Learned from the
    /// first four plaintext bytes of the handshake's setup payload; `None`
    /// until then.
    pub send_handle: Option<Handle>,

    /// Routing label we use to reach the peer. Seeded from the discovery
    /// event or handshake packet that created the session; may be
    /// overwritten by a later Pathfinder NODE update.
    pub send_switch_label: Option<u64>,

    /// Last label observed on an incoming packet from this peer. `None`
    /// until the first switch-ingress packet arrives; transitions emit
    /// DISCOVERED_PATH.
    pub recv_switch_label: Option<u64>,

    /// Peer protocol version; 0 until learned from a route header.
    pub version: u32,

    /// Milliseconds at allocation time, for diagnostics only.
    pub time_of_creation: i64,
}

impl<CA: CryptoAuth> Session<CA> {
    pub fn new(ca_session: CA::Session, receive_handle: Handle, now_ms: i64) -> Self {
        Self {
            ca_session,
            receive_handle,
            send_handle: None,
            send_switch_label: None,
            recv_switch_label: None,
            version: 0,
            time_of_creation: now_ms,
        }
    }

    #[inline]
    pub fn her_ip6(&self) -> Ipv6Addr {
        self.ca_session.her_ip6()
    }

    /// Record an incoming label, returning true if it differs from the last
    /// one seen (the caller uses this to decide whether to emit
    /// DISCOVERED_PATH).
    pub fn observe_recv_label(&mut self, label: u64) -> bool {
        let changed = self.recv_switch_label != Some(label);
        self.recv_switch_label = Some(label);
        changed
    }
}
