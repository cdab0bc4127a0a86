/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// Failure returned by the [`crate::CryptoAuth`] collaborator. Opaque: the
/// session manager only ever branches on ok-vs-fail, never on the reason.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoAuthError {
    #[error("handshake rejected")]
    HandshakeRejected,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("session in wrong state for this operation")]
    WrongState,
}

/// A header or buffer layout violation internal to this crate.
///
/// These are "programming error" tier per the spec's error design: they
/// indicate corruption (a caller handed in a packet shorter than the header
/// it claims to carry, or pushed a header that doesn't fit in headroom), not a
/// recoverable per-packet condition. Call sites that can reach them in normal
/// operation convert them to a panic via `.expect(...)`; `Runt` is the one
/// variant that legitimately surfaces to a caller as a `DropReason` instead,
/// since a runt packet arriving on the wire is attacker/network controlled.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet shorter than required header")]
    Runt,
    #[error("insufficient headroom to prepend header")]
    InsufficientHeadroom,
    #[error("route header layout assertion failed")]
    LayoutViolation,
}

/// Why a packet was dropped. Logged at debug, never propagated as an `Err`:
/// dropping is the expected, common-case outcome of ingress for the conditions
/// listed here, not an exceptional one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Switch packet shorter than `switchHeader + 4 + 20` bytes.
    Runt,
    /// A run (non-handshake) packet's handle didn't match any live session.
    UnrecognizedHandle,
    /// A handshake packet's embedded key didn't hash to an fc-prefixed IPv6.
    InvalidHandshakeKey,
    /// A handshake packet's embedded key was this node's own public key.
    HandshakeFromSelf,
    /// `CryptoAuth::decrypt` rejected the packet.
    DecryptFailed(CryptoAuthError),
    /// The buffered-message map was full even after a TTL sweep.
    BufferFull,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Runt => write!(f, "runt packet"),
            DropReason::UnrecognizedHandle => write!(f, "unrecognized handle"),
            DropReason::InvalidHandshakeKey => write!(f, "handshake key is not fc-prefixed"),
            DropReason::HandshakeFromSelf => write!(f, "handshake key equals our own public key"),
            DropReason::DecryptFailed(e) => write!(f, "decrypt failed: {}", e),
            DropReason::BufferFull => write!(f, "buffered-message map full"),
        }
    }
}

/// Logging sink collaborator. Out of scope per the spec (§1); the manager only
/// ever calls `debug` on the drop path (§7) and `trace` for finer diagnostics.
pub trait Logger {
    fn debug(&mut self, message: &str);

    fn trace(&mut self, _message: &str) {}
}

/// A [`Logger`] that discards everything. Used in tests and by embedders that
/// don't want session-manager diagnostics.
#[derive(Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    #[inline(always)]
    fn debug(&mut self, _message: &str) {}
}
