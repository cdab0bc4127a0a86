/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::net::Ipv6Addr;

use sha2::{Digest, Sha512};

use crate::error::CryptoAuthError;

/// A CryptoAuth public key. Opaque to this crate beyond its byte
/// representation and its role as an `ip6_from_public_key` input: the
/// handshake itself is the out-of-scope collaborator's business.
pub type PublicKey = [u8; 32];

/// Where a [`CaSession`] sits in the handshake. Established is the only state
/// in which the session manager will hand a packet to `CryptoAuth::encrypt`
/// for anything other than a fresh hello.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaState {
    Handshake1,
    Handshake2,
    Handshake3,
    Established,
}

impl CaState {
    #[inline(always)]
    pub fn is_established(self) -> bool {
        matches!(self, CaState::Established)
    }
}

/// A live CryptoAuth session with one peer, as the session manager sees it.
/// The manager stores one of these per [`crate::Session`]; it never inspects
/// key material directly, only derives identity from it via
/// [`ip6_from_public_key`].
pub trait CaSession {
    /// The peer's IPv6 address, derived from her public key.
    fn her_ip6(&self) -> Ipv6Addr;

    /// The peer's raw public key, as embedded in the handshake.
    fn her_public_key(&self) -> PublicKey;

    /// Current handshake state.
    fn state(&self) -> CaState;
}

/// The CryptoAuth collaborator: out of scope per the spec, modeled as a trait
/// so the wiring layer can supply a real implementation. The session manager
/// calls this for every encrypt/decrypt on the switch side; it never reaches
/// into key material or handshake framing itself.
pub trait CryptoAuth {
    type Session: CaSession;

    /// Begin (or resume) a session keyed by the peer's public key, as seen in
    /// an inbound handshake packet or requested by the inside interface.
    fn new_session(&mut self, her_public_key: &PublicKey) -> Self::Session;

    /// Read the peer's public key out of a still-encrypted handshake packet
    /// without advancing any state, so the manager can derive an IPv6 and
    /// look up (or create) a session before committing to `decrypt`. Returns
    /// `None` if the packet is too short to carry a handshake header.
    fn peek_handshake_public_key(&self, packet: &crate::util::packet::Packet) -> Option<PublicKey>;

    /// Decrypt a switch-side packet in place, consuming and validating any
    /// handshake framing as a side effect of advancing the handshake state.
    fn decrypt(
        &mut self,
        session: &mut Self::Session,
        packet: &mut crate::util::packet::Packet,
    ) -> Result<(), CryptoAuthError>;

    /// Encrypt an inside-side packet in place, prepending whatever handshake
    /// framing the current state calls for.
    fn encrypt(
        &mut self,
        session: &mut Self::Session,
        packet: &mut crate::util::packet::Packet,
    ) -> Result<(), CryptoAuthError>;

    /// Reset the session to `Handshake1` if no progress has been made within
    /// the collaborator's own timeout policy. Returns true if a reset
    /// occurred, so the manager can treat it as equivalent to session loss
    /// for the purposes of re-announcing state to Pathfinder.
    fn reset_if_timeout(&mut self, session: &mut Self::Session, now_ms: i64) -> bool;
}

/// Derive a peer's IPv6 address from her public key the way the routing
/// fabric's `fc00::/8` address space is constructed: double SHA-512 of the
/// key, first 16 bytes of the second hash, with the high nibble of the first
/// byte forced to `0xfc`. Returns `None` if the key's natural hash doesn't
/// already land in the `fc00::/8` allocation (the embedding node's own
/// identity generation is expected to have searched for a key with this
/// property; this function only verifies it).
pub fn ip6_from_public_key(key: &PublicKey) -> Option<Ipv6Addr> {
    let first = Sha512::digest(key);
    let second = Sha512::digest(first);
    if second[0] != 0xfc {
        return None;
    }
    let mut addr = [0u8; 16];
    addr.copy_from_slice(&second[0..16]);
    Some(Ipv6Addr::from(addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Brute-force a key whose double-SHA-512 hash lands in fc00::/8, the way
    /// a real node's identity generation would. Kept small for test speed;
    /// a real node searches far longer.
    pub(crate) fn find_fc_key(seed: u8) -> PublicKey {
        let mut key = [0u8; 32];
        key[0] = seed;
        for i in 0..1_000_000u32 {
            key[28..32].copy_from_slice(&i.to_be_bytes());
            if ip6_from_public_key(&key).is_some() {
                return key;
            }
        }
        panic!("no fc-prefixed key found in search space; widen the brute-force range");
    }

    #[test]
    fn non_fc_key_returns_none() {
        let key = [0u8; 32];
        // A zero key is astronomically unlikely to hash into fc00::/8.
        assert!(ip6_from_public_key(&key).is_none());
    }

    #[test]
    fn fc_key_roundtrips_into_fc_prefixed_address() {
        let key = find_fc_key(1);
        let ip6 = ip6_from_public_key(&key).expect("brute-forced key must be fc-prefixed");
        assert_eq!(ip6.octets()[0], 0xfc);
    }
}
