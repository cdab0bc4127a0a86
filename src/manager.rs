/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::net::Ipv6Addr;

use crate::buffered::BufferedMessageStore;
use crate::config::SessionManagerConfig;
use crate::crypto::{ip6_from_public_key, CaState, CryptoAuth, PublicKey};
use crate::error::{DropReason, Logger};
use crate::events::{InboundEvent, NodeRecord, OutboundEvent, PATHFINDER_BROADCAST};
use crate::ids::Handle;
use crate::router::EventSink;
use crate::session::Session;
use crate::table::SessionTable;
use crate::util::gate::IntervalGate;
use crate::util::packet::Packet;

const SWITCH_HEADER_LEN: usize = 12;
const HANDLE_LEN: usize = 4;
/// Minimum size of a handshake's own framing, past the leading nonce word.
/// Chosen so that a packet below `switchHeader + 4 + HANDSHAKE_MIN_LEN`
/// can be rejected as runt before either ingress branch looks at it.
const HANDSHAKE_MIN_LEN: usize = 20;

const ROUTE_HEADER_VERSION_OFFSET: usize = SWITCH_HEADER_LEN;
const ROUTE_HEADER_IP6_OFFSET: usize = SWITCH_HEADER_LEN + 8;
const ROUTE_HEADER_PUBLIC_KEY_OFFSET: usize = ROUTE_HEADER_IP6_OFFSET + 16;
const ROUTE_HEADER_LEN: usize = ROUTE_HEADER_PUBLIC_KEY_OFFSET + 32;

const BUFFER_PRUNE_INTERVAL_MS: i64 = 10_000;

#[inline]
fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().expect("slice must be 4 bytes"))
}

#[inline]
fn read_u64_be(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes.try_into().expect("slice must be 8 bytes"))
}

/// Result of handing a packet to [`SessionManager::switch_ingress`] or
/// [`SessionManager::inside_ingress`]. Dropping is the common case for the
/// conditions in `DropReason`, not exceptional, so it's a plain variant
/// rather than an `Err`.
#[derive(Debug)]
pub enum IngressOutcome {
    /// Ready to hand to the opposite interface.
    Forwarded(Packet),
    /// No route known yet; the packet was buffered and a `SEARCH_REQ` was
    /// emitted for its destination.
    SearchRequested,
    Dropped(DropReason),
}

/// Outcome of [`SessionManager::handle_event`].
#[derive(Debug)]
pub enum EventOutcome {
    /// A buffered packet was drained and is ready for the switch interface.
    Drained(Packet),
    /// The event was processed but produced no packet (session updated, or a
    /// SESSIONS enumeration was emitted directly to the bus).
    Handled,
    /// A NODE event for a peer we have no buffered packet and no session
    /// for; we have no interest in it.
    Ignored,
}

/// Owns per-peer cryptographic session state and the dual-keyed lookup that
/// demultiplexes switch traffic, plus the buffered-message store used while a
/// route is unknown. Driven synchronously by a single-threaded event loop;
/// see the crate's module docs for the collaborator traits it depends on.
pub struct SessionManager<CA: CryptoAuth> {
    ca: CA,
    config: SessionManagerConfig,
    table: SessionTable<CA>,
    buffered: BufferedMessageStore,
    local_public_key: PublicKey,
    prune_gate: IntervalGate<BUFFER_PRUNE_INTERVAL_MS>,
}

impl<CA: CryptoAuth> SessionManager<CA> {
    pub fn new(ca: CA, local_public_key: PublicKey, config: SessionManagerConfig) -> Self {
        Self {
            ca,
            buffered: BufferedMessageStore::new(config.max_buffered_messages),
            config,
            table: SessionTable::new(),
            local_public_key,
            prune_gate: IntervalGate::default(),
        }
    }

    pub fn lookup_by_ip6(&self, ip6: &Ipv6Addr) -> Option<&Session<CA>> {
        self.table.lookup_by_ip6(ip6)
    }

    pub fn lookup_by_handle(&self, handle: Handle) -> Option<&Session<CA>> {
        self.table.lookup_by_handle(handle)
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    /// Look up a session by IPv6, creating one if absent. Emits `SESSION`
    /// before returning whenever a session is freshly created, so the bus
    /// always sees the peer before any application packet (§9 Design Notes).
    fn get_or_create_session(
        &mut self,
        ip6: Ipv6Addr,
        public_key: PublicKey,
        version: u32,
        label: Option<u64>,
        now_ms: i64,
        events: &mut impl EventSink,
    ) -> Handle {
        if let Some(existing) = self.table.lookup_by_ip6(&ip6) {
            return existing.receive_handle;
        }

        let ca_session = self.ca.new_session(&public_key);
        let handle = self.table.insert(ip6, |receive_handle| {
            let mut session = Session::new(ca_session, receive_handle, now_ms);
            session.version = version;
            session.send_switch_label = label;
            session
        });

        events.emit(OutboundEvent::Session {
            dest_pf: PATHFINDER_BROADCAST,
            node: NodeRecord {
                path: label.unwrap_or(0),
                metric: NodeRecord::METRIC_UNKNOWN,
                version,
                ip6,
                public_key,
            },
        });

        handle
    }

    /// §4.2: decode a switch-plane packet, resolve or create its session,
    /// decrypt, and rewrite it into inside-plane (route-header-prefixed)
    /// form.
    pub fn switch_ingress(
        &mut self,
        mut packet: Packet,
        now_ms: i64,
        events: &mut impl EventSink,
        logger: &mut impl Logger,
    ) -> IngressOutcome {
        if packet.len() < SWITCH_HEADER_LEN + HANDLE_LEN + HANDSHAKE_MIN_LEN {
            logger.debug("switch ingress: runt packet");
            return IngressOutcome::Dropped(DropReason::Runt);
        }

        let label = read_u64_be(packet.peek_front(8).expect("length checked above"));
        packet.strip_front(SWITCH_HEADER_LEN).expect("length checked above");
        let switch_header = packet
            .peek_stripped(SWITCH_HEADER_LEN)
            .expect("just stripped this many bytes")
            .to_vec();

        let n = read_u32_be(packet.peek_front(HANDLE_LEN).expect("length checked above"));

        let ip6 = if n > 3 {
            let handle = Handle::new(n).expect("n > 3 checked above");
            let her_ip6 = match self.table.lookup_by_handle(handle) {
                Some(session) => session.her_ip6(),
                None => {
                    logger.debug("switch ingress: unrecognized handle");
                    return IngressOutcome::Dropped(DropReason::UnrecognizedHandle);
                }
            };
            packet.strip_front(HANDLE_LEN).expect("length checked above");
            her_ip6
        } else {
            let her_public_key = match self.ca.peek_handshake_public_key(&packet) {
                Some(key) => key,
                None => {
                    logger.debug("switch ingress: runt handshake header");
                    return IngressOutcome::Dropped(DropReason::Runt);
                }
            };
            if her_public_key == self.local_public_key {
                logger.debug("switch ingress: handshake key is our own");
                return IngressOutcome::Dropped(DropReason::HandshakeFromSelf);
            }
            let ip6 = match ip6_from_public_key(&her_public_key) {
                Some(ip6) => ip6,
                None => {
                    logger.debug("switch ingress: handshake key is not fc-prefixed");
                    return IngressOutcome::Dropped(DropReason::InvalidHandshakeKey);
                }
            };
            self.get_or_create_session(ip6, her_public_key, 0, Some(label), now_ms, events);
            ip6
        };

        let session = self
            .table
            .lookup_by_ip6_mut(&ip6)
            .expect("session exists by construction above");

        if let Err(e) = self.ca.decrypt(&mut session.ca_session, &mut packet) {
            logger.debug(&format!(
                "switch ingress: decrypt failed in state {:?}",
                session.ca_session.state()
            ));
            return IngressOutcome::Dropped(DropReason::DecryptFailed(e));
        }

        if n <= 3 {
            // Setup packet: the first four decrypted bytes are the handle the
            // peer wants us to use when sending to her.
            let raw = read_u32_be(packet.peek_front(HANDLE_LEN).expect(
                "a handshake's first decrypted payload carries a 4-byte handle prefix",
            ));
            packet.strip_front(HANDLE_LEN).expect("just peeked");
            if let Some(h) = Handle::new(raw) {
                session.send_handle = Some(h);
            }
        }

        let version = session.version;
        let her_ip6 = session.her_ip6();
        let her_public_key = session.ca_session.her_public_key();
        let label_changed = session.observe_recv_label(label);

        let mut route_header = [0u8; ROUTE_HEADER_LEN];
        route_header[0..SWITCH_HEADER_LEN].copy_from_slice(&switch_header);
        route_header[ROUTE_HEADER_VERSION_OFFSET..ROUTE_HEADER_VERSION_OFFSET + 4]
            .copy_from_slice(&version.to_be_bytes());
        route_header[ROUTE_HEADER_IP6_OFFSET..ROUTE_HEADER_IP6_OFFSET + 16]
            .copy_from_slice(&her_ip6.octets());
        route_header[ROUTE_HEADER_PUBLIC_KEY_OFFSET..ROUTE_HEADER_PUBLIC_KEY_OFFSET + 32]
            .copy_from_slice(&her_public_key);
        packet
            .push_front(&route_header)
            .expect("packet headroom sized for route header growth");

        if label_changed {
            events.emit(OutboundEvent::DiscoveredPath {
                dest_pf: PATHFINDER_BROADCAST,
                node: NodeRecord {
                    path: label,
                    metric: NodeRecord::METRIC_UNKNOWN,
                    version,
                    ip6: her_ip6,
                    public_key: her_public_key,
                },
            });
        }

        IngressOutcome::Forwarded(packet)
    }

    /// §4.3: decode a route-header-prefixed packet from the inside
    /// interface, resolve or create its session (or buffer-and-search), and
    /// prepare it for the switch interface.
    pub fn inside_ingress(
        &mut self,
        packet: Packet,
        now_ms: i64,
        events: &mut impl EventSink,
        logger: &mut impl Logger,
    ) -> IngressOutcome {
        assert!(
            packet.len() >= ROUTE_HEADER_LEN,
            "inside ingress: packet shorter than a route header is a programming error upstream"
        );

        let header = packet.peek_front(ROUTE_HEADER_LEN).expect("length asserted above");
        let label_field = read_u64_be(&header[0..8]);
        let version_field = read_u32_be(
            &header[ROUTE_HEADER_VERSION_OFFSET..ROUTE_HEADER_VERSION_OFFSET + 4],
        );
        let mut ip6_bytes = [0u8; 16];
        ip6_bytes.copy_from_slice(&header[ROUTE_HEADER_IP6_OFFSET..ROUTE_HEADER_IP6_OFFSET + 16]);
        let ip6 = Ipv6Addr::from(ip6_bytes);
        let mut public_key: PublicKey = [0u8; 32];
        public_key.copy_from_slice(
            &header[ROUTE_HEADER_PUBLIC_KEY_OFFSET..ROUTE_HEADER_PUBLIC_KEY_OFFSET + 32],
        );
        let public_key_is_zero = public_key == [0u8; 32];

        if self.table.lookup_by_ip6(&ip6).is_none() {
            if public_key_is_zero {
                return self.buffer_and_search(ip6, packet, now_ms, events, logger);
            }
            let label = (label_field != 0).then_some(label_field);
            self.get_or_create_session(ip6, public_key, version_field, label, now_ms, events);
        }

        let session = self
            .table
            .lookup_by_ip6_mut(&ip6)
            .expect("session exists or was just created above");
        if version_field != 0 {
            session.version = version_field;
        }

        let label = if label_field != 0 {
            Some(label_field)
        } else {
            session.send_switch_label
        };

        let label = match label {
            Some(l) => l,
            None => return self.buffer_and_search(ip6, packet, now_ms, events, logger),
        };

        let mut packet = packet;
        packet
            .strip_front(ROUTE_HEADER_LEN)
            .expect("length asserted above");
        self.ready_to_send(ip6, label, packet, logger)
    }

    fn buffer_and_search(
        &mut self,
        ip6: Ipv6Addr,
        mut packet: Packet,
        now_ms: i64,
        events: &mut impl EventSink,
        logger: &mut impl Logger,
    ) -> IngressOutcome {
        packet
            .strip_front(ROUTE_HEADER_LEN)
            .expect("caller already verified the route header's length");
        let now_s = (now_ms.max(0) / 1000) as u64;
        if !self.buffered.insert(ip6, packet, now_s) {
            logger.debug("inside ingress: buffered-message map full even after a prune sweep");
            return IngressOutcome::Dropped(DropReason::BufferFull);
        }
        events.emit(OutboundEvent::SearchReq {
            dest_pf: PATHFINDER_BROADCAST,
            ip6,
        });
        IngressOutcome::SearchRequested
    }

    /// Encrypt a plaintext application packet and frame it for the switch
    /// interface, per §4.3's "Ready-to-send" subsection.
    fn ready_to_send(
        &mut self,
        ip6: Ipv6Addr,
        label: u64,
        mut packet: Packet,
        _logger: &mut impl Logger,
    ) -> IngressOutcome {
        let session = self
            .table
            .lookup_by_ip6_mut(&ip6)
            .expect("caller holds a live session for this ip6");
        session.send_switch_label = Some(label);

        let pre_handshake3 = session.ca_session.state() != CaState::Established;

        if pre_handshake3 {
            let prefix = session.receive_handle.get().to_be_bytes();
            packet
                .push_front(&prefix)
                .expect("packet headroom sized for handle prefix");
        }

        self.ca
            .encrypt(&mut session.ca_session, &mut packet)
            .expect("post-route-header encrypt failure is a programming error, not recoverable");

        if !pre_handshake3 {
            let send_handle = session
                .send_handle
                .expect("an established session must already have learned its send handle");
            packet
                .push_front(&send_handle.get().to_be_bytes())
                .expect("packet headroom sized for handle prefix");
        }

        let mut switch_header = [0u8; SWITCH_HEADER_LEN];
        switch_header[0..8].copy_from_slice(&label.to_be_bytes());
        packet
            .push_front(&switch_header)
            .expect("packet headroom sized for switch header");

        IngressOutcome::Forwarded(packet)
    }

    /// §4.4: handle an inbound Pathfinder event.
    pub fn handle_event(
        &mut self,
        event: InboundEvent,
        now_ms: i64,
        events: &mut impl EventSink,
        logger: &mut impl Logger,
    ) -> EventOutcome {
        match event {
            InboundEvent::Node {
                source_pf: _,
                ip6,
                path,
                public_key,
                version,
            } => self.handle_node_event(ip6, path, public_key, version, now_ms, events, logger),
            InboundEvent::Sessions { source_pf } => {
                let handles = self.table.enumerate();
                for handle in handles {
                    if let Some(session) = self.table.lookup_by_handle(handle) {
                        events.emit(OutboundEvent::Session {
                            dest_pf: source_pf,
                            node: NodeRecord {
                                path: session.send_switch_label.unwrap_or(0),
                                metric: NodeRecord::METRIC_UNKNOWN,
                                version: session.version,
                                ip6: session.her_ip6(),
                                public_key: session.ca_session.her_public_key(),
                            },
                        });
                    }
                }
                EventOutcome::Handled
            }
        }
    }

    fn handle_node_event(
        &mut self,
        ip6: Ipv6Addr,
        path: u64,
        public_key: PublicKey,
        version: u32,
        now_ms: i64,
        events: &mut impl EventSink,
        logger: &mut impl Logger,
    ) -> EventOutcome {
        if self.buffered.contains(&ip6) {
            self.get_or_create_session(ip6, public_key, version, Some(path), now_ms, events);
            {
                let session = self
                    .table
                    .lookup_by_ip6_mut(&ip6)
                    .expect("just created or already present");
                session.send_switch_label = Some(path);
                session.version = version;
            }
            let packet = self.buffered.drain(&ip6).expect("checked contains above");
            return match self.ready_to_send(ip6, path, packet, logger) {
                IngressOutcome::Forwarded(packet) => EventOutcome::Drained(packet),
                IngressOutcome::Dropped(_) | IngressOutcome::SearchRequested => {
                    EventOutcome::Handled
                }
            };
        }

        if let Some(session) = self.table.lookup_by_ip6_mut(&ip6) {
            session.send_switch_label = Some(path);
            session.version = version;
            return EventOutcome::Handled;
        }

        EventOutcome::Ignored
    }

    /// Background tick: prunes expired buffered messages at most once every
    /// ten seconds, and drives every live session's handshake-timeout check
    /// unconditionally (§10.5). The embedder is expected to call this on
    /// some periodic schedule of its own choosing; calling it more often than
    /// the prune interval is harmless.
    pub fn on_tick(&mut self, now_ms: i64) {
        if self.prune_gate.gate(now_ms) {
            let now_s = (now_ms.max(0) / 1000) as u64;
            self.buffered.prune(now_s);
        }

        let SessionManager { ca, table, .. } = self;
        for session in table.iter_mut() {
            ca.reset_if_timeout(&mut session.ca_session, now_ms);
        }
    }

    /// Explicit session teardown, replacing the source domain's
    /// scope-release model (see the crate's grounding notes): emits exactly
    /// one `SESSION_ENDED` carrying the session's last known
    /// `send_switch_label`.
    pub fn end_session(&mut self, ip6: &Ipv6Addr, events: &mut impl EventSink) -> Option<Session<CA>> {
        let session = self.table.remove(ip6)?;
        events.emit(OutboundEvent::SessionEnded {
            dest_pf: PATHFINDER_BROADCAST,
            node: NodeRecord {
                path: session.send_switch_label.unwrap_or(0),
                metric: NodeRecord::METRIC_UNKNOWN,
                version: session.version,
                ip6: *ip6,
                public_key: session.ca_session.her_public_key(),
            },
        });
        Some(session)
    }
}
