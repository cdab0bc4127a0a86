/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! End-to-end scenarios against the public API, one per case in the crate's
//! testable-properties section. Exercises `SessionManager` directly (rather
//! than through `Router`) so each assertion can inspect the returned
//! `IngressOutcome`/`EventOutcome` without an extra layer of indirection.

use std::net::Ipv6Addr;

use session_manager::{
    ip6_from_public_key, CaSession, CaState, CryptoAuth, CryptoAuthError, DropReason, EventOutcome,
    EventSink, Handle, InboundEvent, IngressOutcome, NullLogger, OutboundEvent, Packet, PublicKey,
    Session, SessionManager, SessionManagerConfig,
};

mod support {
    use super::*;

    /// Brute-force a key whose double-SHA-512 hash lands in fc00::/8, the way
    /// a node's real identity generation would. `seed` just varies the
    /// search starting point so distinct test peers get distinct keys.
    pub fn find_fc_key(seed: u8) -> PublicKey {
        let mut key = [0u8; 32];
        key[0] = seed;
        for i in 0..1_000_000u32 {
            key[28..32].copy_from_slice(&i.to_be_bytes());
            if ip6_from_public_key(&key).is_some() {
                return key;
            }
        }
        panic!("no fc-prefixed key found; widen the search range");
    }

    pub fn switch_header(label: u64) -> [u8; 12] {
        let mut h = [0u8; 12];
        h[0..8].copy_from_slice(&label.to_be_bytes());
        h
    }

    /// Build a `{ sh, version, _pad, ip6, publicKey }` route header as
    /// described for the inside interface.
    pub fn route_header(label: u64, version: u32, ip6: Ipv6Addr, public_key: PublicKey) -> Vec<u8> {
        let mut buf = Vec::with_capacity(68);
        buf.extend_from_slice(&switch_header(label));
        buf.extend_from_slice(&version.to_be_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&ip6.octets());
        buf.extend_from_slice(&public_key);
        buf
    }

    #[derive(Clone)]
    pub struct MockSession {
        her_public_key: PublicKey,
        her_ip6: Ipv6Addr,
        state: CaState,
    }

    impl CaSession for MockSession {
        fn her_ip6(&self) -> Ipv6Addr {
            self.her_ip6
        }
        fn her_public_key(&self) -> PublicKey {
            self.her_public_key
        }
        fn state(&self) -> CaState {
            self.state
        }
    }

    /// A CryptoAuth stand-in with a one-round handshake: the setup payload
    /// is `[nonce:4][public_key:32]`; once a session has seen one `decrypt`
    /// it's Established and further traffic is passed through unmodified.
    pub struct MockCryptoAuth {
        pub local_public_key: PublicKey,
    }

    impl CryptoAuth for MockCryptoAuth {
        type Session = MockSession;

        fn new_session(&mut self, her_public_key: &PublicKey) -> MockSession {
            MockSession {
                her_public_key: *her_public_key,
                her_ip6: ip6_from_public_key(her_public_key).expect("test keys are fc-prefixed"),
                state: CaState::Handshake1,
            }
        }

        fn peek_handshake_public_key(&self, packet: &Packet) -> Option<PublicKey> {
            let bytes = packet.as_bytes();
            if bytes.len() < 4 + 32 {
                return None;
            }
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes[4..36]);
            Some(key)
        }

        fn decrypt(
            &mut self,
            session: &mut MockSession,
            packet: &mut Packet,
        ) -> Result<(), CryptoAuthError> {
            if session.state != CaState::Established {
                packet
                    .strip_front(4 + 32)
                    .map_err(|_| CryptoAuthError::HandshakeRejected)?;
                session.state = CaState::Established;
            }
            Ok(())
        }

        fn encrypt(
            &mut self,
            session: &mut MockSession,
            packet: &mut Packet,
        ) -> Result<(), CryptoAuthError> {
            if session.state != CaState::Established {
                let mut framing = Vec::with_capacity(36);
                framing.extend_from_slice(&0u32.to_be_bytes());
                framing.extend_from_slice(&self.local_public_key);
                packet
                    .push_front(&framing)
                    .map_err(|_| CryptoAuthError::WrongState)?;
            }
            Ok(())
        }

        fn reset_if_timeout(&mut self, _session: &mut MockSession, _now_ms: i64) -> bool {
            false
        }
    }

    #[derive(Default)]
    pub struct RecordingEventSink(pub Vec<OutboundEvent>);

    impl EventSink for RecordingEventSink {
        fn emit(&mut self, event: OutboundEvent) {
            self.0.push(event);
        }
    }

    pub fn new_manager(local_key: PublicKey, config: SessionManagerConfig) -> SessionManager<MockCryptoAuth> {
        SessionManager::new(
            MockCryptoAuth {
                local_public_key: local_key,
            },
            local_key,
            config,
        )
    }
}

use support::*;

#[test]
fn first_contact_outbound_buffers_then_drains_on_node_event() {
    let key_a = find_fc_key(1);
    let key_b = find_fc_key(2);
    let ip6_b = ip6_from_public_key(&key_b).unwrap();

    let mut mgr = new_manager(key_a, SessionManagerConfig::default());
    let mut events = RecordingEventSink::default();
    let mut logger = NullLogger;

    let packet = Packet::from_wire(&route_header(0, 0, ip6_b, [0u8; 32]));
    let outcome = mgr.inside_ingress(packet, 0, &mut events, &mut logger);
    assert!(matches!(outcome, IngressOutcome::SearchRequested));
    assert!(events
        .0
        .iter()
        .any(|e| matches!(e, OutboundEvent::SearchReq { ip6, .. } if *ip6 == ip6_b)));

    let outcome = mgr.handle_event(
        InboundEvent::Node {
            source_pf: 7,
            ip6: ip6_b,
            path: 0x13,
            public_key: key_b,
            version: 18,
        },
        1_000,
        &mut events,
        &mut logger,
    );
    match outcome {
        EventOutcome::Drained(packet) => {
            let label = u64::from_be_bytes(packet.as_bytes()[0..8].try_into().unwrap());
            assert_eq!(label, 0x13);
        }
        other => panic!("expected a drained packet, got {:?}", other),
    }
    assert!(events.0.iter().any(|e| matches!(e, OutboundEvent::Session { .. })));
}

#[test]
fn first_contact_inbound_creates_session_and_learns_send_handle() {
    let key_a = find_fc_key(3);
    let key_b = find_fc_key(4);
    let ip6_b = ip6_from_public_key(&key_b).unwrap();

    let mut mgr = new_manager(key_a, SessionManagerConfig::default());
    let mut events = RecordingEventSink::default();
    let mut logger = NullLogger;

    let mut wire = Vec::new();
    wire.extend_from_slice(&switch_header(0x42));
    wire.extend_from_slice(&0u32.to_be_bytes());
    wire.extend_from_slice(&key_b);
    wire.extend_from_slice(&0x99u32.to_be_bytes());

    let outcome = mgr.switch_ingress(Packet::from_wire(&wire), 0, &mut events, &mut logger);
    match outcome {
        IngressOutcome::Forwarded(packet) => {
            let bytes = packet.as_bytes();
            let label = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
            assert_eq!(label, 0x42);
            let ip6_bytes: [u8; 16] = bytes[20..36].try_into().unwrap();
            assert_eq!(Ipv6Addr::from(ip6_bytes), ip6_b);
        }
        other => panic!("expected forwarded packet, got {:?}", other),
    }
    assert!(events.0.iter().any(|e| matches!(e, OutboundEvent::Session { .. })));
    assert!(events
        .0
        .iter()
        .any(|e| matches!(e, OutboundEvent::DiscoveredPath { node, .. } if node.path == 0x42)));

    let session = mgr.lookup_by_ip6(&ip6_b).expect("session created");
    assert_eq!(session.send_handle, Handle::new(0x99));
}

fn establish_session(mgr: &mut SessionManager<MockCryptoAuth>, key_b: PublicKey) {
    let mut events = RecordingEventSink::default();
    let mut logger = NullLogger;
    let mut wire = Vec::new();
    wire.extend_from_slice(&switch_header(0x42));
    wire.extend_from_slice(&0u32.to_be_bytes());
    wire.extend_from_slice(&key_b);
    wire.extend_from_slice(&0x99u32.to_be_bytes());
    match mgr.switch_ingress(Packet::from_wire(&wire), 0, &mut events, &mut logger) {
        IngressOutcome::Forwarded(_) => {}
        other => panic!("setup failed: {:?}", other),
    }
}

#[test]
fn steady_state_run_packet_forwards_without_new_discovered_path() {
    let key_a = find_fc_key(5);
    let key_b = find_fc_key(6);
    let ip6_b = ip6_from_public_key(&key_b).unwrap();

    let mut mgr = new_manager(key_a, SessionManagerConfig::default());
    establish_session(&mut mgr, key_b);

    let handle = mgr.lookup_by_ip6(&ip6_b).unwrap().receive_handle;

    let mut events = RecordingEventSink::default();
    let mut logger = NullLogger;
    let mut wire = Vec::new();
    wire.extend_from_slice(&switch_header(0x42));
    wire.extend_from_slice(&handle.get().to_be_bytes());
    wire.extend_from_slice(&[0xAAu8; 24]);

    let outcome = mgr.switch_ingress(Packet::from_wire(&wire), 2_000, &mut events, &mut logger);
    assert!(matches!(outcome, IngressOutcome::Forwarded(_)));
    assert!(!events.0.iter().any(|e| matches!(e, OutboundEvent::DiscoveredPath { .. })));
}

#[test]
fn path_change_emits_exactly_one_discovered_path() {
    let key_a = find_fc_key(7);
    let key_b = find_fc_key(8);
    let ip6_b = ip6_from_public_key(&key_b).unwrap();

    let mut mgr = new_manager(key_a, SessionManagerConfig::default());
    establish_session(&mut mgr, key_b);

    let handle = mgr.lookup_by_ip6(&ip6_b).unwrap().receive_handle;

    let mut events = RecordingEventSink::default();
    let mut logger = NullLogger;
    let mut wire = Vec::new();
    wire.extend_from_slice(&switch_header(0x99));
    wire.extend_from_slice(&handle.get().to_be_bytes());
    wire.extend_from_slice(&[0xBBu8; 24]);

    let outcome = mgr.switch_ingress(Packet::from_wire(&wire), 3_000, &mut events, &mut logger);
    assert!(matches!(outcome, IngressOutcome::Forwarded(_)));
    let discovered: Vec<_> = events
        .0
        .iter()
        .filter(|e| matches!(e, OutboundEvent::DiscoveredPath { .. }))
        .collect();
    assert_eq!(discovered.len(), 1);
    assert!(matches!(discovered[0], OutboundEvent::DiscoveredPath { node, .. } if node.path == 0x99));
}

#[test]
fn buffer_overflow_drops_the_third_unroutable_packet() {
    let key_a = find_fc_key(9);
    let ip6_x = ip6_from_public_key(&find_fc_key(10)).unwrap();
    let ip6_y = ip6_from_public_key(&find_fc_key(11)).unwrap();
    let ip6_z = ip6_from_public_key(&find_fc_key(12)).unwrap();

    let mut mgr = new_manager(
        key_a,
        SessionManagerConfig {
            max_buffered_messages: 2,
            ..Default::default()
        },
    );
    let mut events = RecordingEventSink::default();
    let mut logger = NullLogger;

    for ip6 in [ip6_x, ip6_y] {
        let packet = Packet::from_wire(&route_header(0, 0, ip6, [0u8; 32]));
        let outcome = mgr.inside_ingress(packet, 0, &mut events, &mut logger);
        assert!(matches!(outcome, IngressOutcome::SearchRequested));
    }

    let packet = Packet::from_wire(&route_header(0, 0, ip6_z, [0u8; 32]));
    let outcome = mgr.inside_ingress(packet, 0, &mut events, &mut logger);
    assert!(matches!(outcome, IngressOutcome::Dropped(DropReason::BufferFull)));
}

#[test]
fn teardown_emits_exactly_one_session_ended_with_last_label() {
    let key_a = find_fc_key(13);
    let key_b = find_fc_key(14);
    let ip6_b = ip6_from_public_key(&key_b).unwrap();

    let mut mgr = new_manager(key_a, SessionManagerConfig::default());
    establish_session(&mut mgr, key_b);

    let mut events = RecordingEventSink::default();
    let removed: Option<Session<MockCryptoAuth>> = mgr.end_session(&ip6_b, &mut events);
    assert!(removed.is_some());
    assert_eq!(events.0.len(), 1);
    match &events.0[0] {
        OutboundEvent::SessionEnded { node, .. } => assert_eq!(node.path, 0x42),
        other => panic!("expected SessionEnded, got {:?}", other),
    }
    assert!(mgr.lookup_by_ip6(&ip6_b).is_none());
}
