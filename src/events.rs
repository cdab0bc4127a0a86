/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::net::Ipv6Addr;

use crate::crypto::PublicKey;

/// Destination Pathfinder id meaning "all subscribers", used both as a valid
/// `dest_pf` on outbound events and a valid `source_pf` on inbound ones.
pub const PATHFINDER_BROADCAST: u32 = 0xffff_ffff;

/// Fixed-size peer record shared across event payloads. The manager always
/// emits `metric_be = 0xffffffff` (metric unknown): path-quality metrics are
/// out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub path: u64,
    pub metric: u32,
    pub version: u32,
    pub ip6: Ipv6Addr,
    pub public_key: PublicKey,
}

impl NodeRecord {
    pub const METRIC_UNKNOWN: u32 = 0xffff_ffff;
}

/// Messages the event bus delivers to the manager.
#[derive(Debug, Clone, Copy)]
pub enum InboundEvent {
    /// Pathfinder has resolved (or refreshed) a path and key for a peer.
    Node {
        source_pf: u32,
        ip6: Ipv6Addr,
        path: u64,
        public_key: PublicKey,
        version: u32,
    },
    /// Pathfinder is requesting a full dump of known sessions.
    Sessions { source_pf: u32 },
}

/// Messages the manager emits to the event bus.
#[derive(Debug, Clone, Copy)]
pub enum OutboundEvent {
    /// A session was created, either freshly or in response to a SESSIONS
    /// enumeration request.
    Session { dest_pf: u32, node: NodeRecord },
    /// A session was torn down; `node.path` carries its last known
    /// `send_switch_label`.
    SessionEnded { dest_pf: u32, node: NodeRecord },
    /// A session's `recv_switch_label` changed.
    DiscoveredPath { dest_pf: u32, node: NodeRecord },
    /// Inside ingress needs a route for an IPv6 with no known session.
    SearchReq { dest_pf: u32, ip6: Ipv6Addr },
}
