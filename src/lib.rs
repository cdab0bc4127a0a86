/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Session manager for a dual-plane crypto router: an "inside" plane that carries
//! plaintext packets addressed to IPv6 peers, and a "switch" plane that carries
//! ciphertext labelled by an opaque 64-bit routing path.
//!
//! This crate owns per-peer cryptographic session state and the dual-keyed
//! (IPv6, handle) lookup that demultiplexes switch traffic without re-parsing
//! identity on every packet. It does not implement cryptography, packet
//! transport, or path discovery itself: those are supplied by the embedder
//! through the collaborator traits in [`crypto`], [`router`], and [`error`].

pub mod buffered;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod ids;
pub mod manager;
pub mod router;
pub mod session;
pub mod table;
pub mod util;

pub use buffered::BufferedMessageStore;
pub use config::SessionManagerConfig;
pub use crypto::{ip6_from_public_key, CaSession, CaState, CryptoAuth, PublicKey};
pub use error::{CryptoAuthError, DropReason, Logger, NullLogger, PacketError};
pub use events::{InboundEvent, NodeRecord, OutboundEvent, PATHFINDER_BROADCAST};
pub use ids::Handle;
pub use manager::{EventOutcome, IngressOutcome, SessionManager};
pub use router::{EventSink, InsideTx, Router, SwitchTx};
pub use session::Session;
pub use util::packet::Packet;
